use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GovernanceError {
    /// A malformed on-chain payload. The affected output is skipped.
    #[error("malformed governance payload: {0}")]
    Parse(String),
    /// A rule violation in an otherwise well-formed object. The object is skipped.
    #[error("governance validation failed: {0}")]
    Validation(String),
    /// A block could not be read during the initial chain load.
    #[error("failed to read block {height}: {reason}")]
    ChainIo { height: u64, reason: String },
    /// A superblock's coinstake does not pay the expected proposal set.
    #[error("invalid superblock payment: {0}")]
    ConsensusViolation(String),
    /// The initial chain load was interrupted by shutdown.
    #[error("governance load interrupted by shutdown")]
    Cancelled,
}
