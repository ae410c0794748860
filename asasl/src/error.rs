use thiserror::Error;

use crate::State;

/// A boxed error, as returned by external mechanism constructors.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The error types that can occur when manipulating this crate.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum Error {
    /// The caller provided an unusable argument.
    #[error("Invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// No built-in nor registered mechanism goes by this name.
    #[error("Unknown mechanism `{0}`")]
    UnknownMechanism(String),

    /// A mechanism with the same name is already registered.
    #[error("Mechanism `{0}` is already registered")]
    DuplicateMechanism(String),

    /// A registered constructor failed to produce a fresh instance.
    #[error("Unable to construct mechanism `{name}`")]
    MechanismConstruction {
        /// Name of the mechanism that failed to construct.
        name: String,

        /// The underlying fault.
        #[source]
        source: BoxError,
    },

    /// None of the mechanisms offered by the server are acceptable.
    #[error("Unable to negotiate a common mechanism")]
    NoCommonMechanism,

    /// The operation is not allowed in the current state of the mechanism.
    #[error("Unable to {operation} a mechanism in the {state:?} state")]
    ProtocolState {
        /// State the mechanism was in.
        state: State,

        /// The rejected operation.
        operation: &'static str,
    },

    /// The server challenge could not be understood.
    #[error("Malformed challenge: {0}")]
    MalformedChallenge(&'static str),

    /// The server nonce does not extend the client nonce.
    #[error("The server nonce does not extend the client nonce")]
    NonceMismatch,

    /// The server failed to prove the knowledge of the credentials.
    #[error("The server signature did not verify")]
    ServerVerification,

    /// The server rejected the authentication with an error value.
    #[error("The server rejected the authentication: {0}")]
    ServerRejected(String),

    /// The iteration count sent by the server is below the configured policy.
    #[error("Iteration count {0} is too low")]
    WeakIterationCount(u32),

    /// The iteration count sent by the server is above the configured policy.
    #[error("Iteration count {0} is too high")]
    ExcessiveIterationCount(u32),
}

impl Error {
    /// Whether the error ended the negotiation, leaving the mechanism in the [`State::Failed`] state.
    ///
    /// Such errors must fail the whole authentication attempt,
    /// while the other ones let the caller retry with another mechanism.
    pub fn is_negotiation_failure(&self) -> bool {
        matches!(
            self,
            Self::MalformedChallenge(_)
                | Self::NonceMismatch
                | Self::ServerVerification
                | Self::ServerRejected(_)
                | Self::WeakIterationCount(_)
                | Self::ExcessiveIterationCount(_)
        )
    }
}

/// A handy [`std::result::Result`] type alias bounding the [`enum@Error`] struct as `E`.
pub type Result<T, E = Error> = std::result::Result<T, E>;
