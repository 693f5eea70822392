// The capabilities the attacks are driven through.
//
// Attacks only ever see these traits, never a key, so they can be pointed at
// a simulated oracle, a test double or a remote service alike.
use crate::aes::BLOCK_SIZE;

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OracleError {
    #[error("oracle unavailable after {attempts} attempt(s): {reason}")]
    Unavailable { attempts: usize, reason: String },
    #[error("unexpected oracle response: {0}")]
    BadResponse(String),
    #[error("oracle could not process input: {0}")]
    Cipher(String),
}

/// A CBC padding oracle.
pub trait PaddingOracle {
    fn block_size(&self) -> usize {
        BLOCK_SIZE
    }

    /// Return the challenge `(ciphertext, iv)` pair.
    fn encrypt(&self) -> Result<(Vec<u8>, Vec<u8>), OracleError>;

    /// Whether `ciphertext` decrypts under `iv` to correctly padded plaintext.
    ///
    /// Invalid padding is `Ok(false)`; errors are reserved for the oracle
    /// itself failing.
    fn validate(&self, ciphertext: &[u8], iv: &[u8]) -> Result<bool, OracleError>;
}

/// An ECB encryption oracle that wraps attacker input in secret bytes.
///
/// Implementations must be deterministic: the same input always produces the
/// same ciphertext for the lifetime of the oracle.
pub trait EcbOracle {
    fn encrypt(&self, input: &[u8]) -> Result<Vec<u8>, OracleError>;
}

impl<T: PaddingOracle + ?Sized> PaddingOracle for &T {
    fn block_size(&self) -> usize {
        (**self).block_size()
    }

    fn encrypt(&self) -> Result<(Vec<u8>, Vec<u8>), OracleError> {
        (**self).encrypt()
    }

    fn validate(&self, ciphertext: &[u8], iv: &[u8]) -> Result<bool, OracleError> {
        (**self).validate(ciphertext, iv)
    }
}

impl<T: EcbOracle + ?Sized> EcbOracle for &T {
    fn encrypt(&self, input: &[u8]) -> Result<Vec<u8>, OracleError> {
        (**self).encrypt(input)
    }
}
