use crate::OracleError;

use thiserror::Error;

/// Why an attack could not recover the plaintext.
///
/// No partial plaintext is ever returned alongside an error.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AttackError {
    /// No candidate byte produced valid padding. The oracle, ciphertext or
    /// chaining arithmetic is inconsistent, so retrying cannot help.
    #[error("no candidate produced valid padding for byte {index} of block {block}")]
    OracleInconsistency { block: usize, index: usize },
    #[error("recovered plaintext has invalid padding")]
    InvalidRecoveredPadding,
    #[error("ciphertext length did not change within {max_probe_len} bytes of input, ECB mode not detected")]
    BlockSizeNotDetected { max_probe_len: usize },
    #[error("ciphertext grows {block_size} byte(s) at a time, oracle is not a block cipher")]
    NotABlockCipher { block_size: usize },
    #[error("repeated input blocks do not give repeated ciphertext blocks, ECB mode not detected")]
    NoRepeatedBlock,
    #[error("could not align attacker input to a block boundary")]
    AlignmentNotFound,
    #[error("no candidate matched secret byte {position}")]
    NoMatchingByte { position: usize },
    #[error("malformed input: {0}")]
    MalformedInput(String),
    #[error("query budget of {limit} oracle queries exhausted")]
    QueryBudgetExhausted { limit: usize },
    #[error(transparent)]
    Oracle(#[from] OracleError),
}
