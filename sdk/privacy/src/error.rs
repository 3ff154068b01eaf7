//! Error definitions for note construction, encoding and transaction assembly.
use thiserror::Error;

/// Coarse classification of a [`PrivacyError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad lengths or shapes, rejected before any cryptographic work
    Validation,
    /// Builder used out of order
    State,
    /// The spend plan does not balance
    Arithmetic,
    /// A ledger log could not be turned into records
    Decode,
    /// A collaborator or primitive failed
    External,
}

/// Errors raised by the shielded pool engine
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PrivacyError {
    #[error("Random must be {expected} bytes, got {got}")]
    InvalidRandomLength { expected: usize, got: usize },

    #[error("Unsupported token kind: {0}")]
    UnsupportedTokenKind(u8),

    #[error("Fungible token sub ID must be zero")]
    InvalidTokenSubId,

    #[error("Relay random tag must be 31 bytes, got {0}")]
    InvalidTagLength(usize),

    #[error("Can not add more than {max} outputs, got {got}")]
    TooManyOutputs { max: usize, got: usize },

    #[error("Note from tree {got} cannot be spent in tree {expected}")]
    TreeMismatch { expected: u32, got: u32 },

    #[error("Invalid contract address: {0}")]
    InvalidAddress(String),

    #[error("Exit may only be attached once per transaction")]
    ExitAlreadyAttached,

    #[error("Exit token does not match transaction token")]
    TokenMismatch,

    #[error("Negative change value: inputs {total_in} < outputs {total_out}")]
    InsufficientFunds { total_in: u128, total_out: u128 },

    #[error("Value overflow while summing notes")]
    ValueOverflow,

    #[error("Cannot prove transaction with null (zero value) inputs and outputs")]
    NullInputsOutputs,

    #[error("{event} arrays disagree in length: expected {expected}, got {got}")]
    ArgumentCountMismatch {
        event: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("Args required for {0} events")]
    MissingEventArgs(&'static str),

    #[error("Failed to decode {event} log: {reason}")]
    EventDecode { event: &'static str, reason: String },

    #[error("Token hash does not match any known token")]
    UnknownToken,

    #[error("Decrypted note does not match its commitment")]
    CommitmentMismatch,

    #[error("Ciphertext must have {expected} data blocks, got {got}")]
    CiphertextShape { expected: usize, got: usize },

    #[error("Key agreement produced a non-contributory shared secret")]
    KeyAgreementFailure,

    #[error("Note encryption failed")]
    EncryptionFailed,

    #[error("Note decryption failed")]
    DecryptionFailed,

    #[error("Merkle root unavailable for tree {tree}: {reason}")]
    MerkleRoot { tree: u32, reason: String },

    #[error("Merkle witness unavailable for tree {tree} position {position}: {reason}")]
    WitnessFetch {
        tree: u32,
        position: u64,
        reason: String,
    },

    #[error("Prover failed: {0}")]
    Prover(String),

    #[error("Balance lookup failed: {0}")]
    BalanceLookup(String),
}

impl PrivacyError {
    /// Taxonomy bucket this error belongs to
    pub fn kind(&self) -> ErrorKind {
        use PrivacyError::*;
        match self {
            InvalidRandomLength { .. }
            | UnsupportedTokenKind(_)
            | InvalidTokenSubId
            | InvalidTagLength(_)
            | TooManyOutputs { .. }
            | TreeMismatch { .. }
            | InvalidAddress(_)
            | TokenMismatch
            | CiphertextShape { .. } => ErrorKind::Validation,
            ExitAlreadyAttached => ErrorKind::State,
            InsufficientFunds { .. } | ValueOverflow | NullInputsOutputs => ErrorKind::Arithmetic,
            ArgumentCountMismatch { .. }
            | MissingEventArgs(_)
            | EventDecode { .. }
            | UnknownToken
            | CommitmentMismatch => ErrorKind::Decode,
            KeyAgreementFailure
            | EncryptionFailed
            | DecryptionFailed
            | MerkleRoot { .. }
            | WitnessFetch { .. }
            | Prover(_)
            | BalanceLookup(_) => ErrorKind::External,
        }
    }
}

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, PrivacyError>;
