//! The `PLAIN` mechanism, defined in [RFC 4616](https://tools.ietf.org/html/rfc4616).

use crate::{Credentials, Result};

use super::{Mechanism, State};

/// The `PLAIN` mechanism, sending the credentials as-is in the initial response.
#[derive(Debug)]
pub struct Plain {
    credentials: Credentials,
    state: State,
}

impl Plain {
    /// Name of the mechanism.
    pub const NAME: &'static str = "PLAIN";

    /// Create a `PLAIN` mechanism for the provided _credentials_.
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            state: State::Initial,
        }
    }
}

impl Mechanism for Plain {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn state(&self) -> State {
        self.state
    }

    fn start(&mut self) -> Result<Option<Vec<u8>>> {
        if self.state != State::Initial {
            return Err(self.state.reject("start"));
        }

        let Credentials {
            username,
            password,
            authzid,
            ..
        } = &self.credentials;

        let message = format!(
            "{}\u{0}{username}\u{0}{password}",
            authzid.as_deref().unwrap_or_default()
        );
        self.state = State::Completed;

        Ok(Some(message.into_bytes()))
    }

    fn step(&mut self, _challenge: &[u8]) -> Result<Vec<u8>> {
        Err(self.state.reject("step"))
    }
}
