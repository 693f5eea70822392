pub mod aes;
mod error;
mod oracle;
mod search;
mod set01;
mod set02;
mod set03;

pub use aes::{
    decrypt_aes_128_cbc, decrypt_aes_128_ecb, encrypt_aes_128_cbc, encrypt_aes_128_ecb,
    random_bytes,
};
pub use error::AttackError;
pub use oracle::{EcbOracle, OracleError, PaddingOracle};
pub use search::{find_candidate, QueryCounter};
pub use set01::c03::candidate_order;
pub use set01::c08::{is_ecb_encrypted, score_aes_ecb_likelihood};
pub use set02::c09::pkcs7_pad;
pub use set02::c14::{
    ecb_byte_at_a_time_attack, AesEcbPrefixOracle, Alignment, EcbAttackOptions,
    EcbByteAtATimeAttack, MAX_PROBE_LEN,
};
pub use set02::c15::{is_pkcs7_padded, pkcs7_unpad, PaddingError};
pub use set03::c17::{
    client, decrypt_with_padding_oracle, padding_oracle_attack, server, AesCbcPaddingOracle,
    PaddingOracleAttack, PaddingOracleAttackOptions,
};
