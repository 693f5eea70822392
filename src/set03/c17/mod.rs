// Implementation of a padding oracle and a CBC padding oracle attack.
//
// The formula for CBC decryption is
//
//                 P_i = D(C_i) ⊕ C_{i-1},
//
// with the IV standing in for C_{-1}. If we take a block C_i and put a block
// 'X' that we control in front of it, the oracle decrypts
//
//                 P' = D(C_i) ⊕ X = P_i ⊕ C_{i-1} ⊕ X.
//
// There is no key in that formula, only the unknown P_i. We cannot see P',
// but the oracle tells us whether P' ends in valid padding.
//
// To find the final byte of P_i we guess a value g and set
// X[15] = C_{i-1}[15] ⊕ g ⊕ 1. If the guess is right then P'[15] = 1, valid
// padding, and the oracle says so. For the second-to-last byte we want P' to
// end in '\x02\x02': we already know P_i[15], so X[15] = C_{i-1}[15] ⊕ P_i[15]
// ⊕ 2 and we guess X[14] the same way as before. Repeat for every byte, then
// for every block, last to first.
//
// The final byte of a block is the awkward one. A wrong guess can still give
// valid padding if P' happens to end in '\x02\x02', '\x03\x03\x03' and so on.
// That happens all the time on the last block of a message, which ends in
// real padding. So every hit on the final byte is double checked by flipping
// X[14]: padding of '\x01' does not care about byte 14, any longer padding
// is broken by it.
//
// Below we call 'X' the trial block, as it acts as the IV of the single block
// query we make to the oracle.
pub mod client;
pub mod server;

use crate::{
    aes::{random_bytes, random_bytes_with_rng, BLOCK_SIZE},
    candidate_order, decrypt_aes_128_cbc, encrypt_aes_128_cbc, find_candidate, pkcs7_unpad,
    AttackError, OracleError, PaddingError, PaddingOracle, QueryCounter,
};

use base64::{engine::general_purpose::STANDARD, Engine};
use rand::{rngs::StdRng, Rng, SeedableRng};
use tracing::{debug, trace};

const PLAINTEXTS: [&str; 10] = [
    "MDAwMDAwTm93IHRoYXQgdGhlIHBhcnR5IGlzIGp1bXBpbmc=",
    "MDAwMDAxV2l0aCB0aGUgYmFzcyBraWNrZWQgaW4gYW5kIHRoZSBWZWdhJ3MgYXJlIHB1bXBpbic=",
    "MDAwMDAyUXVpY2sgdG8gdGhlIHBvaW50LCB0byB0aGUgcG9pbnQsIG5vIGZha2luZw==",
    "MDAwMDAzQ29va2luZyBNQydzIGxpa2UgYSBwb3VuZCBvZiBiYWNvbg==",
    "MDAwMDA0QnVybmluZyAnZW0sIGlmIHlvdSBhaW4ndCBxdWljayBhbmQgbmltYmxl",
    "MDAwMDA1SSBnbyBjcmF6eSB3aGVuIEkgaGVhciBhIGN5bWJhbA==",
    "MDAwMDA2QW5kIGEgaGlnaCBoYXQgd2l0aCBhIHNvdXBlZCB1cCB0ZW1wbw==",
    "MDAwMDA3SSdtIG9uIGEgcm9sbCwgaXQncyB0aW1lIHRvIGdvIHNvbG8=",
    "MDAwMDA4b2xsaW4nIGluIG15IGZpdmUgcG9pbnQgb2g=",
    "MDAwMDA5aXRoIG15IHJhZy10b3AgZG93biBzbyBteSBoYWlyIGNhbiBibG93",
];

/// A padding oracle holding a secret plaintext, key and IV.
///
/// All three are fixed when the oracle is made, so every call to `encrypt`
/// returns the same challenge.
pub struct AesCbcPaddingOracle {
    key: [u8; BLOCK_SIZE],
    iv: [u8; BLOCK_SIZE],
    plaintext: Vec<u8>,
}

impl AesCbcPaddingOracle {
    /// An oracle holding one of the ten challenge plaintexts at random.
    pub fn new() -> Self {
        let idx = rand::thread_rng().gen_range(0..PLAINTEXTS.len());
        Self::with_plaintext(random_bytes(), random_bytes(), challenge_plaintext(idx))
    }

    pub fn with_seed(seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let key = random_bytes_with_rng(&mut rng);
        let iv = random_bytes_with_rng(&mut rng);
        let idx = rng.gen_range(0..PLAINTEXTS.len());
        Self::with_plaintext(key, iv, challenge_plaintext(idx))
    }

    pub fn with_plaintext(
        key: [u8; BLOCK_SIZE],
        iv: [u8; BLOCK_SIZE],
        plaintext: Vec<u8>,
    ) -> Self {
        Self { key, iv, plaintext }
    }
}

impl Default for AesCbcPaddingOracle {
    fn default() -> Self {
        Self::new()
    }
}

impl PaddingOracle for AesCbcPaddingOracle {
    fn encrypt(&self) -> Result<(Vec<u8>, Vec<u8>), OracleError> {
        let ciphertext = encrypt_aes_128_cbc(&self.plaintext, &self.key, &self.iv);
        Ok((ciphertext, self.iv.to_vec()))
    }

    fn validate(&self, ciphertext: &[u8], iv: &[u8]) -> Result<bool, OracleError> {
        let iv: &[u8; BLOCK_SIZE] = iv
            .try_into()
            .map_err(|_| OracleError::Cipher(format!("IV must be {BLOCK_SIZE} bytes")))?;
        match decrypt_aes_128_cbc(ciphertext, &self.key, iv) {
            Ok(_) => Ok(true),
            Err(PaddingError::InvalidPadding) => Ok(false),
            Err(e) => Err(OracleError::Cipher(e.to_string())),
        }
    }
}

fn challenge_plaintext(idx: usize) -> Vec<u8> {
    // The strings are constants, they always decode.
    STANDARD.decode(PLAINTEXTS[idx]).unwrap_or_default()
}

#[derive(Debug, Clone, Default)]
pub struct PaddingOracleAttackOptions {
    /// Try the candidates for each byte on the rayon thread pool.
    pub parallel: bool,
    pub max_queries: Option<usize>,
}

/// Decrypt the oracle's challenge ciphertext, returning the unpadded
/// plaintext.
pub fn padding_oracle_attack<O>(
    oracle: &O,
    options: &PaddingOracleAttackOptions,
) -> Result<Vec<u8>, AttackError>
where
    O: PaddingOracle + Sync + ?Sized,
{
    let (ciphertext, iv) = oracle.encrypt()?;
    decrypt_with_padding_oracle(&ciphertext, &iv, oracle, options)
}

pub fn decrypt_with_padding_oracle<O>(
    ciphertext: &[u8],
    iv: &[u8],
    oracle: &O,
    options: &PaddingOracleAttackOptions,
) -> Result<Vec<u8>, AttackError>
where
    O: PaddingOracle + Sync + ?Sized,
{
    PaddingOracleAttack::new(oracle, options.clone()).decrypt(ciphertext, iv)
}

pub struct PaddingOracleAttack<'a, O: ?Sized> {
    oracle: &'a O,
    options: PaddingOracleAttackOptions,
    queries: QueryCounter,
    candidates: [u8; 256],
}

impl<'a, O> PaddingOracleAttack<'a, O>
where
    O: PaddingOracle + Sync + ?Sized,
{
    pub fn new(oracle: &'a O, options: PaddingOracleAttackOptions) -> Self {
        let queries = QueryCounter::new(options.max_queries);
        Self {
            oracle,
            options,
            queries,
            candidates: candidate_order(),
        }
    }

    pub fn query_count(&self) -> usize {
        self.queries.count()
    }

    pub fn decrypt(&self, ciphertext: &[u8], iv: &[u8]) -> Result<Vec<u8>, AttackError> {
        let block_size = self.oracle.block_size();
        check_input(ciphertext, iv, block_size)?;

        let blocks: Vec<&[u8]> = ciphertext.chunks_exact(block_size).collect();
        let mut plaintext = vec![0u8; ciphertext.len()];
        let plaintext_blocks = plaintext.chunks_exact_mut(block_size).enumerate().rev();
        for (block_idx, plaintext_block) in plaintext_blocks {
            let chaining_block = if block_idx == 0 {
                iv
            } else {
                blocks[block_idx - 1]
            };
            self.decrypt_block(block_idx, chaining_block, blocks[block_idx], plaintext_block)?;
            debug!(block = block_idx, "decrypted block");
        }

        pkcs7_unpad(&mut plaintext, block_size)
            .map_err(|_| AttackError::InvalidRecoveredPadding)?;
        debug!(queries = self.queries.count(), "padding oracle attack finished");
        Ok(plaintext)
    }

    fn decrypt_block(
        &self,
        block_idx: usize,
        chaining_block: &[u8],
        ciphertext_block: &[u8],
        plaintext_block: &mut [u8],
    ) -> Result<(), AttackError> {
        let block_size = ciphertext_block.len();
        for byte_idx in (0..block_size).rev() {
            let padding_len = (block_size - byte_idx) as u8;
            let mut trial_block = chaining_block.to_vec();
            for j in (byte_idx + 1)..block_size {
                trial_block[j] ^= plaintext_block[j] ^ padding_len;
            }

            let found = find_candidate(&self.candidates, self.options.parallel, |guess| {
                let mut trial_block = trial_block.clone();
                trial_block[byte_idx] ^= guess ^ padding_len;
                if !self.validate(ciphertext_block, &trial_block)? {
                    return Ok(false);
                }
                if byte_idx == block_size - 1 {
                    trial_block[byte_idx - 1] ^= 0xFF;
                    return self.validate(ciphertext_block, &trial_block);
                }
                Ok(true)
            })?;

            match found {
                Some(byte) => {
                    trace!(block = block_idx, byte_idx, byte, "recovered plaintext byte");
                    plaintext_block[byte_idx] = byte;
                }
                None => {
                    return Err(AttackError::OracleInconsistency {
                        block: block_idx,
                        index: byte_idx,
                    })
                }
            }
        }
        Ok(())
    }

    fn validate(&self, ciphertext: &[u8], iv: &[u8]) -> Result<bool, AttackError> {
        self.queries.record()?;
        Ok(self.oracle.validate(ciphertext, iv)?)
    }
}

fn check_input(ciphertext: &[u8], iv: &[u8], block_size: usize) -> Result<(), AttackError> {
    if !(2..=u8::MAX as usize).contains(&block_size) {
        return Err(AttackError::MalformedInput(format!(
            "unsupported block size {block_size}"
        )));
    }
    if ciphertext.is_empty() {
        return Err(AttackError::MalformedInput("empty ciphertext".to_string()));
    }
    if ciphertext.len() % block_size != 0 {
        return Err(AttackError::MalformedInput(format!(
            "ciphertext length {} is not a multiple of the block size {block_size}",
            ciphertext.len()
        )));
    }
    if iv.len() != block_size {
        return Err(AttackError::MalformedInput(format!(
            "IV length {} does not match the block size {block_size}",
            iv.len()
        )));
    }
    Ok(())
}
