//! The contract every SASL mechanism implements, and the built-in mechanisms.
//!
//! A [`Mechanism`] is a state machine driven by the caller, round by round:
//!
//! ```text
//! Initial ── start() ──> InProgress ── step(challenge)* ──> Completed | Failed
//! ```
//!
//! The caller only ever exchanges bytes with it; base64 encoding and the
//! framing of the surrounding protocol are left to the stream layer.

use crate::{Error, Result};

pub mod digest;
pub use digest::DigestMd5;

pub mod plain;
pub use plain::Plain;

pub mod scram;
pub use scram::{Scram, ScramSha1};

/// The state of a [`Mechanism`] in the negotiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum State {
    /// The mechanism has not been started yet.
    Initial,

    /// The mechanism awaits a server challenge.
    InProgress,

    /// The mechanism successfully finished the exchange.
    Completed,

    /// The mechanism aborted the exchange, no further operation is possible.
    Failed,
}

impl State {
    /// Whether no further round can happen from this state.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    pub(crate) fn reject(self, operation: &'static str) -> Error {
        tracing::debug!("Rejected `{operation}` on a mechanism in the {self:?} state");

        Error::ProtocolState {
            state: self,
            operation,
        }
    }
}

/// A SASL mechanism, driven through a challenge/response exchange.
///
/// # Note
/// Each instance is bound to a single negotiation, it is never reused nor shared.
pub trait Mechanism: Send {
    /// The name of the mechanism, as advertised by the server.
    fn name(&self) -> &str;

    /// The current state of the negotiation.
    fn state(&self) -> State;

    /// Start the negotiation, returning the initial response if the mechanism sends one.
    ///
    /// Only valid in the [`State::Initial`] state.
    fn start(&mut self) -> Result<Option<Vec<u8>>>;

    /// Process a server challenge and produce the client response.
    ///
    /// Only valid in the [`State::InProgress`] state, any error that isn't
    /// a [`Error::ProtocolState`] leaves the mechanism in the [`State::Failed`] state.
    ///
    /// # Note
    /// Some servers send their final proof as one more challenge, after the mechanism
    /// is already [`State::Completed`] (the `rspauth` of `DIGEST-MD5` in XMPP).
    /// Such a challenge belongs to [`Mechanism::success`], answered with an empty response,
    /// which [`Mechanism::respond`] does for any mechanism.
    fn step(&mut self, challenge: &[u8]) -> Result<Vec<u8>>;

    /// Process the outcome of a successful negotiation, as reported by the server
    /// with its optional _additional data_.
    ///
    /// Mechanisms without a server proof to check only accept empty data,
    /// and reject anything else without changing state.
    fn success(&mut self, additional: &[u8]) -> Result<()> {
        match self.state() {
            State::Completed if additional.is_empty() => Ok(()),
            State::Completed => Err(State::Completed.reject("accept additional data on")),
            state => Err(state.reject("succeed")),
        }
    }

    /// Answer any server challenge, whatever the mechanism.
    ///
    /// Challenges are stepped through while [`State::InProgress`],
    /// and handed to [`Mechanism::success`] once [`State::Completed`].
    fn respond(&mut self, challenge: &[u8]) -> Result<Vec<u8>> {
        if self.is_completed() {
            self.success(challenge)?;

            Ok(Vec::new())
        } else {
            self.step(challenge)
        }
    }

    /// Whether the negotiation has successfully finished.
    fn is_completed(&self) -> bool {
        self.state() == State::Completed
    }

    /// Whether the negotiation has failed.
    fn is_failed(&self) -> bool {
        self.state() == State::Failed
    }
}

impl std::fmt::Debug for dyn Mechanism {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mechanism")
            .field("name", &self.name())
            .field("state", &self.state())
            .finish()
    }
}
