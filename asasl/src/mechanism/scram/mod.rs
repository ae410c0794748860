//! Salted Challenge Response Authentication Mechanism.
//!
//! RFC: <https://datatracker.ietf.org/doc/html/rfc5802>.
//!
//! Channel binding is not supported, the client always sends the `n` gs2 flag.

use std::{borrow::Cow, marker::PhantomData};

use digest::{core_api::BlockSizeUser, Digest};
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use crate::{Config, Credentials, Error, Result};

use super::{Mechanism, State};

mod key;
use key::{Keys, SignatureBuilder};

mod messages;
use messages::{ClientFirst, ServerFirst, ServerFinal};

/// A hash function usable in a SCRAM mechanism.
pub trait ScramDigest: Digest + BlockSizeUser + Clone {
    /// Name of the SCRAM mechanism built on this hash function.
    const NAME: &'static str;
}

impl ScramDigest for sha1::Sha1 {
    const NAME: &'static str = "SCRAM-SHA-1";
}

/// The `SCRAM-SHA-1` mechanism.
pub type ScramSha1 = Scram<sha1::Sha1>;

enum Round {
    Initial,
    ServerFirst(ClientFirst),
    ServerFinal(Zeroizing<Vec<u8>>),
    Completed(Zeroizing<Vec<u8>>),
    Failed,
}

impl Round {
    fn state(&self) -> State {
        match self {
            Self::Initial => State::Initial,
            Self::ServerFirst(_) | Self::ServerFinal(_) => State::InProgress,
            Self::Completed(_) => State::Completed,
            Self::Failed => State::Failed,
        }
    }
}

struct Context {
    credentials: Credentials,
    nonce: String,
    min_iterations: u32,
    max_iterations: u32,
}

/// The SCRAM mechanism, over the `D` hash function.
pub struct Scram<D> {
    context: Context,
    round: Round,
    digest: PhantomData<fn() -> D>,
}

impl<D: ScramDigest> Scram<D> {
    /// Create a SCRAM mechanism for the provided _credentials_, with a random client nonce.
    pub fn new(credentials: Credentials, config: &Config) -> Self {
        Self {
            context: Context {
                credentials,
                nonce: config.nonce(),
                min_iterations: config.scram_min_iterations,
                max_iterations: config.scram_max_iterations,
            },
            round: Round::Initial,
            digest: PhantomData,
        }
    }

    /// Replace the client nonce, making the exchange deterministic.
    ///
    /// # Note
    /// The nonce must be made of printable characters, excluding `,`.
    pub fn with_nonce(mut self, nonce: impl Into<String>) -> Self {
        self.context.nonce = nonce.into();

        self
    }
}

impl<D> std::fmt::Debug for Scram<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scram")
            .field("credentials", &self.context.credentials)
            .field("state", &self.round.state())
            .finish_non_exhaustive()
    }
}

fn utf8(challenge: &[u8]) -> Result<&str> {
    std::str::from_utf8(challenge)
        .map_err(|_| Error::MalformedChallenge("challenge is not valid UTF-8"))
}

impl Context {
    fn client_final<D: ScramDigest>(
        &self,
        client_first: &ClientFirst,
        challenge: &[u8],
    ) -> Result<(Round, Vec<u8>)> {
        let server_first_message = utf8(challenge)?;
        let server_first = ServerFirst::parse(server_first_message)?;

        if server_first.nonce.len() <= client_first.nonce.len()
            || !server_first.nonce.starts_with(&client_first.nonce)
        {
            return Err(Error::NonceMismatch);
        }

        match server_first.iterations {
            iterations if iterations == 0 || iterations < self.min_iterations => {
                return Err(Error::WeakIterationCount(iterations))
            }
            iterations if iterations > self.max_iterations => {
                return Err(Error::ExcessiveIterationCount(iterations))
            }
            _ => (),
        }

        let password = &self.credentials.password;
        let password = match stringprep::saslprep(password) {
            Ok(password) => password,
            // contains prohibited characters; skip saslprep
            Err(_) => Cow::Borrowed(password.as_str()),
        };

        let salted_password = key::hi::<D>(
            password.as_bytes(),
            &server_first.salt,
            server_first.iterations,
        );
        let keys = Keys::derive::<D>(&salted_password);

        let client_final_message_without_proof = client_first.without_proof(server_first.nonce);
        let auth = SignatureBuilder {
            client_first_message_bare: &client_first.bare,
            server_first_message,
            client_final_message_without_proof: &client_final_message_without_proof,
        };

        let proof = keys.client_proof::<D>(&auth);
        let message = format!(
            "{client_final_message_without_proof},p={}",
            base64::Engine::encode(&base64::engine::general_purpose::STANDARD, proof)
        );

        Ok((
            Round::ServerFinal(keys.server_signature::<D>(&auth)),
            message.into_bytes(),
        ))
    }
}

fn server_final(signature: Zeroizing<Vec<u8>>, challenge: &[u8]) -> Result<(Round, Vec<u8>)> {
    verify(&signature, utf8(challenge)?)?;

    Ok((Round::Completed(signature), Vec::new()))
}

fn verify(expected: &[u8], server_final_message: &str) -> Result<()> {
    match ServerFinal::parse(server_final_message)? {
        ServerFinal::Verifier(verifier) if bool::from(verifier.ct_eq(expected)) => Ok(()),
        ServerFinal::Verifier(_) => Err(Error::ServerVerification),
        ServerFinal::Error(error) => Err(Error::ServerRejected(error)),
    }
}

impl<D: ScramDigest> Mechanism for Scram<D> {
    fn name(&self) -> &str {
        D::NAME
    }

    fn state(&self) -> State {
        self.round.state()
    }

    fn start(&mut self) -> Result<Option<Vec<u8>>> {
        if !matches!(self.round, Round::Initial) {
            return Err(self.state().reject("start"));
        }

        let client_first = ClientFirst::new(&self.context.credentials, self.context.nonce.clone());
        let message = client_first.message();

        self.round = Round::ServerFirst(client_first);

        Ok(Some(message.into_bytes()))
    }

    fn step(&mut self, challenge: &[u8]) -> Result<Vec<u8>> {
        replace_with::replace_with_and_return(
            &mut self.round,
            || Round::Failed,
            |round| {
                let advanced = match round {
                    Round::ServerFirst(client_first) => {
                        self.context.client_final::<D>(&client_first, challenge)
                    }
                    Round::ServerFinal(signature) => server_final(signature, challenge),
                    round => return (Err(round.state().reject("step")), round),
                };

                match advanced {
                    Ok((round, response)) => {
                        tracing::debug!(
                            "`{}` exchange advanced to the {:?} state",
                            D::NAME,
                            round.state()
                        );

                        (Ok(response), round)
                    }
                    Err(err) => {
                        tracing::warn!("`{}` exchange failed: {err}", D::NAME);

                        (Err(err), Round::Failed)
                    }
                }
            },
        )
    }

    fn success(&mut self, additional: &[u8]) -> Result<()> {
        match &self.round {
            Round::ServerFinal(_) if additional.is_empty() => {
                tracing::warn!("Server reported success without a `server-final-message`");

                self.round = Round::Failed;

                Err(Error::ServerVerification)
            }
            Round::ServerFinal(_) => self.step(additional).map(drop),
            Round::Completed(_) if additional.is_empty() => Ok(()),
            Round::Completed(signature) => {
                let verified = std::str::from_utf8(additional)
                    .map_err(|_| Error::MalformedChallenge("additional data is not valid UTF-8"))
                    .and_then(|additional| verify(signature, additional));

                if let Err(err) = &verified {
                    tracing::warn!("`{}` exchange failed: {err}", D::NAME);

                    self.round = Round::Failed;
                }

                verified
            }
            round => Err(round.state().reject("succeed")),
        }
    }
}

#[cfg(test)]
mod tests {
    use base64::{engine::general_purpose::STANDARD as BASE64, Engine};

    use super::*;

    impl ScramDigest for sha2::Sha256 {
        const NAME: &'static str = "SCRAM-SHA-256";
    }

    /// <https://datatracker.ietf.org/doc/html/rfc5802#section-5>
    #[test]
    fn rfc5802_snapshot() {
        let mut scram = ScramSha1::new(Credentials::new("user", "pencil"), &Config::default())
            .with_nonce("fyko+d2lbbFgONRv9qkxdawL");

        assert_eq!(
            scram.start().unwrap().unwrap(),
            b"n,,n=user,r=fyko+d2lbbFgONRv9qkxdawL"
        );

        let client_final = scram
            .step(b"r=fyko+d2lbbFgONRv9qkxdawL3rfcNHYJY1ZVvWVs7j,s=QSXCR+Q6sek8bf92,i=4096")
            .unwrap();
        assert_eq!(
            client_final,
            b"c=biws,r=fyko+d2lbbFgONRv9qkxdawL3rfcNHYJY1ZVvWVs7j,p=v0X8v3Bz2T0CJGbJQyF0X+HI4Ts="
        );
        assert_eq!(scram.state(), State::InProgress);

        let last = scram.step(b"v=rmF9pqV8S7suAoZWja4dJRkFsKQ=").unwrap();
        assert!(last.is_empty());
        assert!(scram.is_completed());
    }

    /// <https://datatracker.ietf.org/doc/html/rfc7677#section-3>
    #[test]
    fn rfc7677_snapshot() {
        let mut scram =
            Scram::<sha2::Sha256>::new(Credentials::new("user", "pencil"), &Config::default())
                .with_nonce("rOprNGfwEbeRWgbNEkqO");

        assert_eq!(scram.name(), "SCRAM-SHA-256");
        assert_eq!(
            scram.start().unwrap().unwrap(),
            b"n,,n=user,r=rOprNGfwEbeRWgbNEkqO"
        );

        let client_final = scram
            .step(b"r=rOprNGfwEbeRWgbNEkqO%hvYDpWUa2RaTCAfuxFIlj)hNlF$k0,s=W22ZaJ0SNY7soEsUEjb6gQ==,i=4096")
            .unwrap();
        assert_eq!(
            client_final,
            b"c=biws,r=rOprNGfwEbeRWgbNEkqO%hvYDpWUa2RaTCAfuxFIlj)hNlF$k0,p=dHzbZapWIk4jUhN+Ute9ytag9zjfMHgsqmmiz7AndVQ="
        );

        scram
            .success(b"v=6rriTRBi23WpRR/wtup+mMhUZUn/dB5nLTJRsjl95G4=")
            .unwrap();
        assert!(scram.is_completed());
    }

    fn exchanged() -> ScramSha1 {
        let mut scram = ScramSha1::new(Credentials::new("user", "pencil"), &Config::default())
            .with_nonce("fyko+d2lbbFgONRv9qkxdawL");

        scram.start().unwrap();
        scram
            .step(b"r=fyko+d2lbbFgONRv9qkxdawL3rfcNHYJY1ZVvWVs7j,s=QSXCR+Q6sek8bf92,i=4096")
            .unwrap();

        scram
    }

    #[test]
    fn server_error_fails() {
        let mut scram = exchanged();

        assert!(matches!(
            scram.step(b"e=invalid-proof"),
            Err(Error::ServerRejected(error)) if error == "invalid-proof"
        ));
        assert!(scram.is_failed());
    }

    #[test]
    fn success_without_server_final_fails() {
        let mut scram = exchanged();

        assert!(matches!(scram.success(b""), Err(Error::ServerVerification)));
        assert!(scram.is_failed());
    }

    #[test]
    fn success_repeating_server_final() {
        let mut scram = exchanged();
        scram.step(b"v=rmF9pqV8S7suAoZWja4dJRkFsKQ=").unwrap();

        scram.success(b"v=rmF9pqV8S7suAoZWja4dJRkFsKQ=").unwrap();
        scram.success(b"").unwrap();
        assert!(scram.is_completed());

        let mut forged = BASE64.decode("rmF9pqV8S7suAoZWja4dJRkFsKQ=").unwrap();
        forged[0] ^= 1;
        let forged = format!("v={}", BASE64.encode(forged));

        assert!(matches!(
            scram.success(forged.as_bytes()),
            Err(Error::ServerVerification)
        ));
        assert!(scram.is_failed());
    }

    #[test]
    fn rejects_low_iteration_counts() {
        let mut scram = ScramSha1::new(Credentials::new("user", "pencil"), &Config::default())
            .with_nonce("fyko+d2lbbFgONRv9qkxdawL");
        scram.start().unwrap();

        assert!(matches!(
            scram.step(b"r=fyko+d2lbbFgONRv9qkxdawL3rfcNHYJY1ZVvWVs7j,s=QSXCR+Q6sek8bf92,i=4095"),
            Err(Error::WeakIterationCount(4095))
        ));
        assert!(scram.is_failed());
    }

    #[test]
    fn zero_iterations_are_rejected_even_when_allowed() {
        let config = Config {
            scram_min_iterations: 0,
            ..Default::default()
        };
        let mut scram = ScramSha1::new(Credentials::new("user", "pencil"), &config)
            .with_nonce("fyko+d2lbbFgONRv9qkxdawL");
        scram.start().unwrap();

        assert!(matches!(
            scram.step(b"r=fyko+d2lbbFgONRv9qkxdawL3rfcNHYJY1ZVvWVs7j,s=QSXCR+Q6sek8bf92,i=0"),
            Err(Error::WeakIterationCount(0))
        ));
    }

    #[test]
    fn rejects_excessive_iteration_counts() {
        let mut scram = ScramSha1::new(Credentials::new("user", "pencil"), &Config::default())
            .with_nonce("fyko+d2lbbFgONRv9qkxdawL");
        scram.start().unwrap();

        assert!(matches!(
            scram.step(b"r=fyko+d2lbbFgONRv9qkxdawL3rfcNHYJY1ZVvWVs7j,s=QSXCR+Q6sek8bf92,i=4294967295"),
            Err(Error::ExcessiveIterationCount(u32::MAX))
        ));
    }

    #[test]
    fn an_unextended_nonce_is_a_mismatch() {
        let mut scram = ScramSha1::new(Credentials::new("user", "pencil"), &Config::default())
            .with_nonce("fyko+d2lbbFgONRv9qkxdawL");
        scram.start().unwrap();

        assert!(matches!(
            scram.step(b"r=fyko+d2lbbFgONRv9qkxdawL,s=QSXCR+Q6sek8bf92,i=4096"),
            Err(Error::NonceMismatch)
        ));
    }

    #[test]
    fn stepping_outside_a_round_keeps_the_state() {
        let mut scram = ScramSha1::new(Credentials::new("user", "pencil"), &Config::default());

        assert!(matches!(
            scram.step(b"r=abc,s=QSXCR+Q6sek8bf92,i=4096"),
            Err(Error::ProtocolState {
                state: State::Initial,
                operation: "step"
            })
        ));
        assert_eq!(scram.state(), State::Initial);
        assert!(scram.start().unwrap().is_some());
    }
}
