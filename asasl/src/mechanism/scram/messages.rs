//! Definitions and parsing of the SCRAM messages (RFC 5802 §7).

use std::borrow::Cow;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};

use crate::{Credentials, Error, Result};

/// Escape a `saslname`, replacing `=` with `=3D` and `,` with `=2C`.
pub(super) fn escape(name: &str) -> Cow<'_, str> {
    if name.contains(|c: char| c == '=' || c == ',') {
        Cow::Owned(name.replace('=', "=3D").replace(',', "=2C"))
    } else {
        Cow::Borrowed(name)
    }
}

fn attributes(message: &str) -> impl Iterator<Item = Result<(char, &str)>> {
    message.split(',').map(|attribute| {
        let mut chars = attribute.chars();

        match (chars.next(), chars.next()) {
            (Some(name), Some('=')) if name.is_ascii_alphabetic() => Ok((name, &attribute[2..])),
            _ => Err(Error::MalformedChallenge("invalid attribute")),
        }
    })
}

/// The `client-first-message`, split into its header and bare parts.
#[derive(Debug)]
pub(super) struct ClientFirst {
    pub gs2_header: String,
    pub bare: String,
    pub nonce: String,
}

impl ClientFirst {
    pub fn new(credentials: &Credentials, nonce: String) -> Self {
        let gs2_header = match &credentials.authzid {
            Some(authzid) => format!("n,a={},", escape(authzid)),
            None => "n,,".into(),
        };
        let bare = format!("n={},r={nonce}", escape(&credentials.username));

        Self {
            gs2_header,
            bare,
            nonce,
        }
    }

    pub fn message(&self) -> String {
        format!("{}{}", self.gs2_header, self.bare)
    }

    /// The `client-final-message-without-proof` answering the provided combined _nonce_.
    pub fn without_proof(&self, nonce: &str) -> String {
        format!("c={},r={nonce}", BASE64.encode(&self.gs2_header))
    }
}

/// The `server-first-message`.
#[derive(Debug)]
pub(super) struct ServerFirst<'s> {
    pub nonce: &'s str,
    pub salt: Vec<u8>,
    pub iterations: u32,
}

impl<'s> ServerFirst<'s> {
    pub fn parse(message: &'s str) -> Result<Self> {
        let (mut nonce, mut salt, mut iterations) = (None, None, None);

        for attribute in attributes(message) {
            match attribute? {
                ('m', _) => {
                    return Err(Error::MalformedChallenge(
                        "unsupported mandatory extension",
                    ))
                }
                ('r', value) => nonce = Some(value),
                ('s', value) => salt = Some(value),
                ('i', value) => iterations = Some(value),
                _ => (),
            }
        }

        let nonce = nonce
            .filter(|nonce| !nonce.is_empty())
            .ok_or(Error::MalformedChallenge("missing nonce"))?;
        let salt = BASE64
            .decode(salt.ok_or(Error::MalformedChallenge("missing salt"))?)
            .map_err(|_| Error::MalformedChallenge("invalid salt encoding"))?;
        let iterations = iterations
            .ok_or(Error::MalformedChallenge("missing iteration count"))?
            .parse()
            .map_err(|_| Error::MalformedChallenge("invalid iteration count"))?;

        Ok(Self {
            nonce,
            salt,
            iterations,
        })
    }
}

/// The `server-final-message`.
#[derive(Debug, PartialEq)]
pub(super) enum ServerFinal {
    Verifier(Vec<u8>),
    Error(String),
}

impl ServerFinal {
    pub fn parse(message: &str) -> Result<Self> {
        match attributes(message).next() {
            Some(Ok(('v', verifier))) => BASE64
                .decode(verifier)
                .map(Self::Verifier)
                .map_err(|_| Error::MalformedChallenge("invalid verifier encoding")),
            Some(Ok(('e', error))) => Ok(Self::Error(error.to_owned())),
            Some(Err(err)) => Err(err),
            _ => Err(Error::MalformedChallenge(
                "expected a verifier or an error in server-final-message",
            )),
        }
    }
}
