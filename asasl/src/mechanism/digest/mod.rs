//! The `DIGEST-MD5` mechanism, defined in [RFC 2831](https://tools.ietf.org/html/rfc2831).
//!
//! Only the `auth` quality of protection is supported, no security layer is negotiated.

use std::borrow::Cow;

use md5::{Digest, Md5};
use subtle::ConstantTimeEq;

use crate::{Config, Credentials, Error, Result};

use super::{Mechanism, State};

mod directives;
use directives::{quote, Directives};

#[derive(Debug)]
enum Round {
    Initial,
    Challenged,
    Completed { rspauth: String },
    Failed,
}

/// The `DIGEST-MD5` mechanism, answering a single server challenge.
///
/// # Note
/// The server proves the knowledge of the password with the `rspauth` directive,
/// which is expected in the additional data passed to [`Mechanism::success`].
/// XMPP servers usually send it as a second challenge, see [`Mechanism::respond`].
#[derive(Debug)]
pub struct DigestMd5 {
    credentials: Credentials,
    service: String,
    cnonce: String,
    nc: u32,
    round: Round,
}

impl DigestMd5 {
    /// Name of the mechanism.
    pub const NAME: &'static str = "DIGEST-MD5";

    /// Create a `DIGEST-MD5` mechanism for the provided _credentials_,
    /// with a random client nonce.
    pub fn new(credentials: Credentials, config: &Config) -> Self {
        Self {
            credentials,
            service: config.digest_service.clone(),
            cnonce: config.nonce(),
            nc: 0,
            round: Round::Initial,
        }
    }

    /// Replace the client nonce, making the exchange deterministic.
    pub fn with_cnonce(mut self, cnonce: impl Into<String>) -> Self {
        self.cnonce = cnonce.into();

        self
    }

    fn answer(&mut self, challenge: &[u8]) -> Result<(Vec<u8>, String)> {
        let challenge = std::str::from_utf8(challenge)
            .map_err(|_| Error::MalformedChallenge("challenge is not valid UTF-8"))?;
        let directives = Directives::parse(challenge)
            .ok_or(Error::MalformedChallenge("unparsable directives"))?;

        let nonce = directives
            .get("nonce")
            .ok_or(Error::MalformedChallenge("missing `nonce` directive"))?;

        match directives.get("algorithm") {
            Some(algorithm) if algorithm.eq_ignore_ascii_case("md5-sess") => (),
            Some(_) => return Err(Error::MalformedChallenge("unsupported `algorithm` directive")),
            None => return Err(Error::MalformedChallenge("missing `algorithm` directive")),
        }

        if let Some(qop) = directives.get("qop") {
            if !qop
                .split(',')
                .any(|qop| qop.trim().eq_ignore_ascii_case("auth"))
            {
                return Err(Error::MalformedChallenge("no supported `qop` offered"));
            }
        }

        let utf8 = directives
            .get("charset")
            .is_some_and(|charset| charset.eq_ignore_ascii_case("utf-8"));
        let host = self.credentials.host.as_str();
        let realm = directives
            .all("realm")
            .next()
            .filter(|realm| !realm.is_empty())
            .unwrap_or(host);
        if realm.is_empty() {
            return Err(Error::MalformedChallenge(
                "missing `realm` directive, without a host to fall back on",
            ));
        }
        let digest_uri = format!(
            "{}/{}",
            self.service,
            if host.is_empty() { realm } else { host }
        );

        self.nc += 1;
        let nc = format!("{:08x}", self.nc);

        let session = Session {
            credentials: &self.credentials,
            realm,
            nonce,
            cnonce: &self.cnonce,
            nc: &nc,
            digest_uri: &digest_uri,
        };
        let ha1 = session.ha1();

        let mut response = Vec::with_capacity(10);
        if utf8 {
            response.push("charset=utf-8".to_string());
        }
        response.extend([
            format!("username={}", quote(&self.credentials.username)),
            format!("realm={}", quote(realm)),
            format!("nonce={}", quote(nonce)),
            format!("nc={nc}"),
            format!("cnonce={}", quote(&self.cnonce)),
            format!("digest-uri={}", quote(&digest_uri)),
            format!("response={}", session.kd(&ha1, "AUTHENTICATE:")),
            "qop=auth".to_string(),
        ]);
        if let Some(authzid) = &self.credentials.authzid {
            response.push(format!("authzid={}", quote(authzid)));
        }

        Ok((response.join(",").into_bytes(), session.kd(&ha1, ":")))
    }

    fn verify(expected: &str, additional: &[u8]) -> Result<()> {
        let additional = std::str::from_utf8(additional)
            .map_err(|_| Error::MalformedChallenge("additional data is not valid UTF-8"))?;
        let rspauth = Directives::parse(additional)
            .as_ref()
            .and_then(|directives| directives.get("rspauth").map(str::to_owned))
            .ok_or(Error::MalformedChallenge("missing `rspauth` directive"))?;

        if bool::from(rspauth.as_bytes().ct_eq(expected.as_bytes())) {
            Ok(())
        } else {
            Err(Error::ServerVerification)
        }
    }
}

impl Mechanism for DigestMd5 {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn state(&self) -> State {
        match self.round {
            Round::Initial => State::Initial,
            Round::Challenged => State::InProgress,
            Round::Completed { .. } => State::Completed,
            Round::Failed => State::Failed,
        }
    }

    fn start(&mut self) -> Result<Option<Vec<u8>>> {
        match self.round {
            Round::Initial => {
                self.round = Round::Challenged;

                Ok(None)
            }
            _ => Err(self.state().reject("start")),
        }
    }

    fn step(&mut self, challenge: &[u8]) -> Result<Vec<u8>> {
        if !matches!(self.round, Round::Challenged) {
            return Err(self.state().reject("step"));
        }

        match self.answer(challenge) {
            Ok((response, rspauth)) => {
                tracing::debug!("Answered the `{}` challenge", Self::NAME);

                self.round = Round::Completed { rspauth };

                Ok(response)
            }
            Err(err) => {
                tracing::warn!("Unable to answer the `{}` challenge: {err}", Self::NAME);

                self.round = Round::Failed;

                Err(err)
            }
        }
    }

    fn success(&mut self, additional: &[u8]) -> Result<()> {
        let Round::Completed { rspauth } = &self.round else {
            return Err(self.state().reject("succeed"));
        };

        if additional.is_empty() {
            return Ok(());
        }

        let verified = Self::verify(rspauth, additional);
        if let Err(err) = &verified {
            tracing::warn!("Server response authentication failed: {err}");

            self.round = Round::Failed;
        }

        verified
    }
}

/// Everything entering the `response` and `rspauth` digests.
struct Session<'s> {
    credentials: &'s Credentials,
    realm: &'s str,
    nonce: &'s str,
    cnonce: &'s str,
    nc: &'s str,
    digest_uri: &'s str,
}

impl Session<'_> {
    /// `HEX(H(A1))`, where `A1 = { H({ username-value, ":", realm-value, ":", passwd }), ":", nonce-value, ":", cnonce-value [, ":", authzid-value ] }`.
    fn ha1(&self) -> String {
        let Credentials {
            username,
            password,
            authzid,
            ..
        } = self.credentials;

        let secret = Md5::new()
            .chain_update(latin1(username))
            .chain_update(b":")
            .chain_update(latin1(self.realm))
            .chain_update(b":")
            .chain_update(latin1(password))
            .finalize();

        let mut a1 = Md5::new()
            .chain_update(secret)
            .chain_update(b":")
            .chain_update(self.nonce)
            .chain_update(b":")
            .chain_update(self.cnonce);
        if let Some(authzid) = authzid {
            a1.update(b":");
            a1.update(authzid);
        }

        format!("{:x}", a1.finalize())
    }

    /// `HEX(KD(HEX(H(A1)), { nonce-value, ":" nc-value, ":", cnonce-value, ":", qop-value, ":", HEX(H(A2)) }))`,
    /// where `A2 = { prefix, digest-uri-value }`.
    fn kd(&self, ha1: &str, prefix: &str) -> String {
        let ha2 = Md5::new()
            .chain_update(prefix)
            .chain_update(self.digest_uri)
            .finalize();

        let kd = Md5::new()
            .chain_update(ha1)
            .chain_update(b":")
            .chain_update(self.nonce)
            .chain_update(b":")
            .chain_update(self.nc)
            .chain_update(b":")
            .chain_update(self.cnonce)
            .chain_update(b":auth:")
            .chain_update(format!("{ha2:x}"))
            .finalize();

        format!("{kd:x}")
    }
}

/// Strings fitting in ISO-8859-1 are hashed in that charset, per RFC 2831 §2.1.2.1.
fn latin1(value: &str) -> Cow<'_, [u8]> {
    if value.is_ascii() || value.chars().any(|c| u32::from(c) > 0xff) {
        Cow::Borrowed(value.as_bytes())
    } else {
        Cow::Owned(value.chars().map(|c| u32::from(c) as u8).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHALLENGE: &[u8] = br#"realm="elwood.innosoft.com",nonce="OA6MG9tEQGm2hh",qop="auth",algorithm=md5-sess,charset=utf-8"#;

    fn mechanism() -> DigestMd5 {
        let config = Config {
            digest_service: "imap".into(),
            ..Default::default()
        };

        DigestMd5::new(
            Credentials::new("chris", "secret").with_host("elwood.innosoft.com"),
            &config,
        )
        .with_cnonce("OA6MHXh6VqTrRk")
    }

    #[test]
    fn waits_for_the_server() {
        let mut digest = mechanism();

        assert_eq!(digest.state(), State::Initial);
        assert_eq!(digest.start().unwrap(), None);
        assert_eq!(digest.state(), State::InProgress);
    }

    #[test]
    fn counts_nonces() {
        let mut digest = mechanism();
        digest.start().unwrap();

        let response = String::from_utf8(digest.step(CHALLENGE).unwrap()).unwrap();

        assert!(response.contains(",nc=00000001,"));
        assert_eq!(digest.nc, 1);
    }

    #[test]
    fn hashes_latin1_when_possible() {
        assert_eq!(latin1("chris"), b"chris".as_slice());
        assert_eq!(latin1("café"), b"caf\xe9".as_slice());
        assert_eq!(latin1("日本"), "日本".as_bytes());
    }

    #[test]
    fn falls_back_to_the_host_realm() {
        let mut digest = mechanism();
        digest.start().unwrap();

        let response = String::from_utf8(
            digest
                .step(br#"nonce="OA6MG9tEQGm2hh",algorithm=md5-sess"#)
                .unwrap(),
        )
        .unwrap();

        assert!(response.contains(r#"realm="elwood.innosoft.com""#));
        assert!(!response.contains("charset"));
    }

    #[test]
    fn mismatching_rspauth_fails() {
        let mut digest = mechanism();
        digest.start().unwrap();
        digest.step(CHALLENGE).unwrap();

        assert!(matches!(
            digest.success(b"rspauth=00000000000000000000000000000000"),
            Err(Error::ServerVerification)
        ));
        assert!(digest.is_failed());
    }

    #[test]
    fn requires_a_realm_or_a_host() {
        let mut digest = DigestMd5::new(Credentials::new("u", "p"), &Config::default());
        digest.start().unwrap();

        assert!(matches!(
            digest.step(br#"nonce="OA6MG9tEQGm2hh",algorithm=md5-sess"#),
            Err(Error::MalformedChallenge(_))
        ));
        assert!(digest.is_failed());
    }

    #[test]
    fn offered_realm_stands_in_for_the_host() {
        let mut digest = DigestMd5::new(Credentials::new("u", "p"), &Config::default());
        digest.start().unwrap();

        let response = String::from_utf8(
            digest
                .step(br#"realm="capulet.lit",nonce="OA6MG9tEQGm2hh",algorithm=md5-sess"#)
                .unwrap(),
        )
        .unwrap();

        assert!(response.contains(r#"realm="capulet.lit""#));
        assert!(response.contains(r#"digest-uri="xmpp/capulet.lit""#));
    }
}
