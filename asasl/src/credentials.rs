use securefmt::Debug;

/// The credentials a mechanism authenticates with.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub(crate) username: String,
    #[sensitive]
    pub(crate) password: String,
    pub(crate) authzid: Option<String>,
    pub(crate) host: String,
}

impl Credentials {
    /// Create [`Credentials`] from an _username_ and a _password_.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            ..Default::default()
        }
    }

    /// Request to act as the provided authorization identity instead of the authenticated one.
    pub fn with_authzid(mut self, authzid: impl Into<String>) -> Self {
        self.authzid = Some(authzid.into());

        self
    }

    /// Set the host of the service being authenticated to (the XMPP domain).
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();

        self
    }

    /// The authentication identity.
    pub fn username(&self) -> &str {
        &self.username
    }

    /// The requested authorization identity, if any.
    pub fn authzid(&self) -> Option<&str> {
        self.authzid.as_deref()
    }

    /// The host of the service being authenticated to.
    pub fn host(&self) -> &str {
        &self.host
    }
}

impl<U, P> From<(U, P)> for Credentials
where
    U: Into<String>,
    P: Into<String>,
{
    fn from((username, password): (U, P)) -> Self {
        Self::new(username, password)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_hides_the_password() {
        let credentials = Credentials::new("juliet", "r0m30myr0m30");

        let rendered = format!("{credentials:?}");

        assert!(rendered.contains("juliet"));
        assert!(!rendered.contains("r0m30myr0m30"));
    }

    #[test]
    fn from_user_pass() {
        assert_eq!(
            Credentials::new("alice", "wonderland"),
            Credentials::from(("alice", "wonderland"))
        );
    }
}
