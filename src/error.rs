//! Error types for Pyra.

use std::time::Duration;

use serde::Serialize;

/// Top-level error type for the runtime.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("Dispatch error: {0}")]
    Dispatch(#[from] DispatchError),

    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),
}

/// Why a pending command was terminated before execution.
///
/// Every gate-level failure maps to exactly one kind. User-driven exits
/// (`UserRejected`, `UserCancelled`) share the same terminal handling.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    ResolutionFailure,
    InvalidAddressFormat,
    ContractLookupFailure,
    UnverifiedSource,
    SecurityBlock,
    SecurityWarning,
    ProviderUnavailable,
    UserRejected,
    UserCancelled,
    DispatchFailed,
}

impl FailureKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ResolutionFailure => "resolution_failure",
            Self::InvalidAddressFormat => "invalid_address_format",
            Self::ContractLookupFailure => "contract_lookup_failure",
            Self::UnverifiedSource => "unverified_source",
            Self::SecurityBlock => "security_block",
            Self::SecurityWarning => "security_warning",
            Self::ProviderUnavailable => "provider_unavailable",
            Self::UserRejected => "user_rejected",
            Self::UserCancelled => "user_cancelled",
            Self::DispatchFailed => "dispatch_failed",
        }
    }

    /// Outcomes the user may explicitly acknowledge and proceed past.
    pub fn is_acknowledgeable(self) -> bool {
        matches!(self, Self::SecurityWarning | Self::ProviderUnavailable)
    }
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required configuration: {key}. {hint}")]
    MissingRequired { key: String, hint: String },

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures talking to an external collaborator (RPC node, explorer,
/// scanner). Gates convert these into safe outcomes; they never reach the
/// session as faults.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("{provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("{provider} returned HTTP {status}")]
    HttpStatus { provider: String, status: u16 },

    #[error("{provider} RPC error {code}: {message}")]
    Rpc {
        provider: String,
        code: i64,
        message: String,
    },

    #[error("{provider} returned an invalid response: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("{provider} timed out after {timeout:?}")]
    Timeout { provider: String, timeout: Duration },

    #[error("{0}")]
    Unsupported(String),
}

impl ProviderError {
    pub fn request_failed(provider: &str, reason: impl std::fmt::Display) -> Self {
        Self::RequestFailed {
            provider: provider.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn invalid_response(provider: &str, reason: impl std::fmt::Display) -> Self {
        Self::InvalidResponse {
            provider: provider.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Protocol violations: a phase transition was requested that the current
/// session phase does not allow, or the request itself was malformed.
///
/// The display strings are spoken back to the user verbatim.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PipelineError {
    #[error("There is no pending command. Tell me what you would like to do first.")]
    NoPendingCommand,

    #[error("Please confirm the command before proceeding.")]
    NotConfirmed,

    #[error("Security checks have not passed for this command, so I cannot execute it.")]
    ChecksNotPassed,

    #[error("The target has not been resolved to an address, so I cannot execute this command.")]
    UnresolvedTarget,

    #[error("Security checks are already complete. Say execute to proceed or cancel to abort.")]
    ChecksAlreadyComplete,

    #[error(
        "A command is already confirmed and in progress. Say cancel before starting a new one."
    )]
    CommandInFlight,

    #[error(
        "A security warning is waiting for your acknowledgement. Say acknowledge to proceed or cancel to abort."
    )]
    AwaitingAcknowledgement,

    #[error("There is no security warning to acknowledge.")]
    NothingToAcknowledge,

    #[error("{0}")]
    InvalidRequest(String),
}

impl PipelineError {
    /// True for the state-machine violations (as opposed to malformed input).
    pub fn is_state_error(&self) -> bool {
        !matches!(self, Self::InvalidRequest(_))
    }
}

/// Transaction dispatch errors.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("only native ETH transfers can be sent by the live signer, not {0}")]
    UnsupportedDenomination(String),

    #[error("amount {0} cannot be expressed in wei")]
    InvalidAmount(String),

    #[error("insufficient balance: wallet holds {available} ETH, transfer needs {required} ETH")]
    InsufficientFunds { available: String, required: String },

    #[error("transaction {hash} was submitted but not confirmed")]
    Unconfirmed { hash: String },

    #[error("signer failure: {0}")]
    Signer(#[from] ProviderError),
}

/// Tool-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("Tool {0} not found")]
    NotFound(String),

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Tool execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Tool {name} timed out after {timeout:?}")]
    Timeout { name: String, timeout: Duration },
}

/// Front-end channel errors.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Channel {name} failed to start: {reason}")]
    StartupFailed { name: String, reason: String },

    #[error("Channel {name} disconnected: {reason}")]
    Disconnected { name: String, reason: String },
}

/// Result type alias for the runtime.
pub type Result<T> = std::result::Result<T, Error>;
