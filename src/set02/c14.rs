// Byte-at-a-time ECB decryption (Harder)
//
// The oracle encrypts `prefix || input || secret` under a fixed key in ECB
// mode, where the prefix has an unknown length and the secret is what we are
// after. ECB encrypts every block on its own, so equal plaintext blocks give
// equal ciphertext blocks. Everything below leans on that one fact.
//
// First we find the block size by growing our input until the ciphertext
// grows, the jump in length is one block.
//
// Then we find where our input starts relative to a block boundary. We
// encrypt three blocks of filler to learn what a block of pure filler
// encrypts to (the "blank" block). The prefix may hold repeated blocks of
// its own, so the blank block is the first repeated block that changes when
// the filler byte does. Then we feed `block_size + fill` bytes of
// filler for increasing `fill` until the blank block turns up. At that point
// the prefix plus `fill` bytes ends exactly on a block boundary at `start`.
// We do this with two different filler bytes at once, otherwise a prefix that
// happens to end with filler bytes would fake an early boundary.
//
// From there it is the simple attack shifted to `start`. To learn byte `i` of
// the secret we send `fill + block_size - 1 - (i % block_size)` filler bytes,
// which pushes byte `i` to the end of a block whose other bytes we know. We
// encrypt every candidate `filler || recovered || candidate` and the one whose
// block matches is the secret byte.
//
// The ciphertext length only tells us the length of the secret plus its
// padding. Once we run past the secret we recover a single `\x01` padding
// byte, after which nothing matches any more since the real padding changes
// as our input shrinks. That `\x01` is stripped at the end.
use crate::{
    aes::{random_bytes, random_bytes_with_rng, BLOCK_SIZE},
    candidate_order, encrypt_aes_128_ecb, find_candidate, pkcs7_unpad, AttackError, EcbOracle,
    OracleError, QueryCounter,
};

use rand::{rngs::StdRng, Rng, SeedableRng};
use tracing::{debug, trace};

/// Longest input used while probing for the block size.
pub const MAX_PROBE_LEN: usize = 2048;

pub struct AesEcbPrefixOracle {
    key: [u8; BLOCK_SIZE],
    prefix: Vec<u8>,
    secret: Vec<u8>,
}

impl AesEcbPrefixOracle {
    /// An oracle with a random key and a random prefix of 5 to 10 bytes.
    pub fn new(secret: Vec<u8>) -> Self {
        let mut rng = rand::thread_rng();
        let prefix_len = rng.gen_range(5..=10);
        let prefix = (0..prefix_len).map(|_| rng.gen()).collect();
        Self::with_prefix(random_bytes(), prefix, secret)
    }

    pub fn with_seed(seed: u64, secret: Vec<u8>) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let key = random_bytes_with_rng(&mut rng);
        let prefix_len = rng.gen_range(5..=10);
        let prefix = (0..prefix_len).map(|_| rng.gen()).collect();
        Self::with_prefix(key, prefix, secret)
    }

    pub fn with_prefix(key: [u8; BLOCK_SIZE], prefix: Vec<u8>, secret: Vec<u8>) -> Self {
        Self {
            key,
            prefix,
            secret,
        }
    }
}

impl EcbOracle for AesEcbPrefixOracle {
    fn encrypt(&self, input: &[u8]) -> Result<Vec<u8>, OracleError> {
        let plaintext = [self.prefix.as_slice(), input, self.secret.as_slice()].concat();
        Ok(encrypt_aes_128_ecb(&plaintext, &self.key))
    }
}

#[derive(Debug, Clone)]
pub struct EcbAttackOptions {
    /// Give up looking for the block size after this many bytes of input.
    pub max_probe_len: usize,
    pub filler: u8,
    /// Try the candidates for each byte on the rayon thread pool.
    pub parallel: bool,
    pub max_queries: Option<usize>,
}

impl Default for EcbAttackOptions {
    fn default() -> Self {
        Self {
            max_probe_len: MAX_PROBE_LEN,
            filler: b'A',
            parallel: false,
            max_queries: None,
        }
    }
}

/// Where attacker input lines up with the oracle's blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Alignment {
    /// Filler bytes needed to complete the block the prefix ends in.
    pub fill: usize,
    /// Offset of the first block after the prefix and `fill`.
    pub start: usize,
    /// Length of the secret plus its padding.
    pub recoverable_len: usize,
}

/// Recover the secret suffix appended by an ECB oracle.
pub fn ecb_byte_at_a_time_attack<O>(
    oracle: &O,
    options: &EcbAttackOptions,
) -> Result<Vec<u8>, AttackError>
where
    O: EcbOracle + Sync + ?Sized,
{
    EcbByteAtATimeAttack::new(oracle, options.clone()).run()
}

pub struct EcbByteAtATimeAttack<'a, O: ?Sized> {
    oracle: &'a O,
    options: EcbAttackOptions,
    queries: QueryCounter,
    candidates: [u8; 256],
}

impl<'a, O> EcbByteAtATimeAttack<'a, O>
where
    O: EcbOracle + Sync + ?Sized,
{
    pub fn new(oracle: &'a O, options: EcbAttackOptions) -> Self {
        let queries = QueryCounter::new(options.max_queries);
        Self {
            oracle,
            options,
            queries,
            candidates: candidate_order(),
        }
    }

    pub fn run(&self) -> Result<Vec<u8>, AttackError> {
        let block_size = self.detect_block_size()?;
        let alignment = self.find_alignment(block_size)?;
        debug!(block_size, ?alignment, "oracle input aligned");

        let secret = self.recover_secret(block_size, &alignment)?;
        debug!(
            queries = self.queries.count(),
            "recovered {} secret bytes",
            secret.len()
        );
        Ok(secret)
    }

    pub fn query_count(&self) -> usize {
        self.queries.count()
    }

    pub fn detect_block_size(&self) -> Result<usize, AttackError> {
        let initial_len = self.encrypt(&[])?.len();
        let mut input = Vec::with_capacity(self.options.max_probe_len);
        for _ in 0..self.options.max_probe_len {
            input.push(self.options.filler);
            let ciphertext_len = self.encrypt(&input)?.len();
            if ciphertext_len > initial_len {
                let block_size = ciphertext_len - initial_len;
                if block_size < 2 {
                    return Err(AttackError::NotABlockCipher { block_size });
                }
                return Ok(block_size);
            }
        }
        Err(AttackError::BlockSizeNotDetected {
            max_probe_len: self.options.max_probe_len,
        })
    }

    /// The ciphertexts of a block made only of `filler` and of a block made
    /// only of `filler ^ 1`.
    pub fn find_blank_blocks(
        &self,
        block_size: usize,
        filler: u8,
    ) -> Result<(Vec<u8>, Vec<u8>), AttackError> {
        // Three blocks of filler always contain two whole aligned blocks,
        // wherever the prefix ends.
        let ciphertext = self.encrypt(&vec![filler; 3 * block_size])?;
        let alt_ciphertext = self.encrypt(&vec![filler ^ 0x01; 3 * block_size])?;
        let blocks: Vec<&[u8]> = ciphertext.chunks_exact(block_size).collect();
        let alt_blocks: Vec<&[u8]> = alt_ciphertext.chunks_exact(block_size).collect();

        // Repeated blocks inside the prefix encrypt the same under both
        // fillers, only blocks of filler change with it.
        (1..blocks.len().min(alt_blocks.len()))
            .find(|&i| {
                blocks[i - 1] == blocks[i]
                    && alt_blocks[i - 1] == alt_blocks[i]
                    && blocks[i] != alt_blocks[i]
            })
            .map(|i| (blocks[i].to_vec(), alt_blocks[i].to_vec()))
            .ok_or(AttackError::NoRepeatedBlock)
    }

    pub fn find_alignment(&self, block_size: usize) -> Result<Alignment, AttackError> {
        let filler = self.options.filler;
        let alt_filler = filler ^ 0x01;
        let (blank_block, alt_blank_block) = self.find_blank_blocks(block_size, filler)?;

        for fill in 0..block_size {
            let ciphertext = self.encrypt(&vec![filler; block_size + fill])?;
            let alt_ciphertext = self.encrypt(&vec![alt_filler; block_size + fill])?;
            let start_block = ciphertext
                .chunks_exact(block_size)
                .zip(alt_ciphertext.chunks_exact(block_size))
                .position(|(block, alt_block)| {
                    block == blank_block.as_slice() && alt_block == alt_blank_block.as_slice()
                });
            if let Some(start_block) = start_block {
                let start = start_block * block_size;
                return Ok(Alignment {
                    fill,
                    start,
                    recoverable_len: ciphertext.len() - block_size - start,
                });
            }
        }
        Err(AttackError::AlignmentNotFound)
    }

    fn recover_secret(
        &self,
        block_size: usize,
        alignment: &Alignment,
    ) -> Result<Vec<u8>, AttackError> {
        let mut recovered = vec![0u8; alignment.recoverable_len];
        let mut n_recovered = 0;
        while n_recovered < recovered.len() {
            let position = n_recovered;
            let block_start = alignment.start + (position / block_size) * block_size;
            let block_range = block_start..(block_start + block_size);

            let mut input =
                vec![self.options.filler; alignment.fill + block_size - 1 - position % block_size];
            let target_block = self
                .encrypt(&input)?
                .get(block_range.clone())
                .map(<[u8]>::to_vec)
                .ok_or(AttackError::NoMatchingByte { position })?;

            input.extend_from_slice(&recovered[..position]);
            input.push(0);
            let found = find_candidate(&self.candidates, self.options.parallel, |candidate| {
                let mut guess = input.clone();
                if let Some(last) = guess.last_mut() {
                    *last = candidate;
                }
                let ciphertext = self.encrypt(&guess)?;
                Ok(ciphertext.get(block_range.clone()) == Some(target_block.as_slice()))
            })?;

            match found {
                Some(byte) => {
                    trace!(position, byte, "recovered secret byte");
                    recovered[position] = byte;
                    n_recovered += 1;
                }
                // We have walked off the end of the secret into its padding.
                None if position > 0 && recovered[position - 1] == 0x01 => break,
                None => return Err(AttackError::NoMatchingByte { position }),
            }
        }

        recovered.truncate(n_recovered);
        pkcs7_unpad(&mut recovered, block_size)
            .map_err(|_| AttackError::InvalidRecoveredPadding)?;
        Ok(recovered)
    }

    fn encrypt(&self, input: &[u8]) -> Result<Vec<u8>, AttackError> {
        self.queries.record()?;
        Ok(self.oracle.encrypt(input)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::encrypt_aes_128_cbc;

    use base64::{engine::general_purpose::STANDARD, Engine};
    use rstest::rstest;

    use std::sync::atomic::{AtomicUsize, Ordering};

    const UNKNOWN_STRING: &str = "Um9sbGluJyBpbiBteSA1LjAKV2l0aCBteSByYWctdG9wIGRvd24gc28gbXkg\
aGFpciBjYW4gYmxvdwpUaGUgZ2lybGllcyBvbiBzdGFuZGJ5IHdhdmluZyBq\
dXN0IHRvIHNheSBoaQpEaWQgeW91IHN0b3A/IE5vLCBJIGp1c3QgZHJvdmUg\
YnkK";

    fn unknown_bytes() -> Vec<u8> {
        STANDARD.decode(UNKNOWN_STRING).unwrap()
    }

    fn random_prefix(len: usize) -> Vec<u8> {
        let mut rng = StdRng::seed_from_u64(len as u64);
        (0..len).map(|_| rng.gen()).collect()
    }

    #[test]
    fn byte_at_a_time_ecb_decrypt_decrypts_message_with_oracle() {
        let oracle = AesEcbPrefixOracle::new(unknown_bytes());

        let secret = ecb_byte_at_a_time_attack(&oracle, &EcbAttackOptions::default()).unwrap();

        assert!(String::from_utf8_lossy(&secret).starts_with("Rollin' in my 5.0"));
        assert_eq!(secret, unknown_bytes());
    }

    #[rstest]
    fn recovers_secret_for_any_prefix_length(
        #[values(0, 1, 5, 6, 7, 8, 9, 10, 15, 16, 17)] prefix_len: usize,
    ) {
        let prefix = random_prefix(prefix_len);
        let oracle = AesEcbPrefixOracle::with_prefix(random_bytes(), prefix, unknown_bytes());

        let secret = ecb_byte_at_a_time_attack(&oracle, &EcbAttackOptions::default()).unwrap();

        assert_eq!(secret, unknown_bytes());
    }

    #[rstest]
    #[case(b"")]
    #[case(b"x")]
    #[case(b"YELLOW SUBMARINE")]
    #[case(b"ends with a pad-like byte\x01")]
    #[case(b"\x02\x02")]
    fn recovers_secrets_of_awkward_lengths(#[case] secret: &[u8]) {
        let oracle = AesEcbPrefixOracle::with_seed(7, secret.to_vec());

        let recovered = ecb_byte_at_a_time_attack(&oracle, &EcbAttackOptions::default()).unwrap();

        assert_eq!(recovered, secret);
    }

    #[test]
    fn prefix_ending_in_filler_does_not_break_alignment() {
        let prefix = b"random-ish prefAAAAA".to_vec();
        let secret = b"AAAA secret that starts with filler".to_vec();
        let oracle = AesEcbPrefixOracle::with_prefix(random_bytes(), prefix, secret.clone());
        let attack = EcbByteAtATimeAttack::new(&oracle, EcbAttackOptions::default());

        let alignment = attack.find_alignment(16).unwrap();
        let recovered = attack.run().unwrap();

        assert_eq!(alignment.fill, 12);
        assert_eq!(alignment.start, 32);
        assert_eq!(recovered, secret);
    }

    #[test]
    fn prefix_with_repeated_blocks_does_not_break_alignment() {
        let secret = b"the secret suffix".to_vec();
        let oracle = AesEcbPrefixOracle::with_prefix(random_bytes(), vec![0; 37], secret.clone());
        let attack = EcbByteAtATimeAttack::new(&oracle, EcbAttackOptions::default());

        let alignment = attack.find_alignment(16).unwrap();
        let recovered = attack.run().unwrap();

        assert_eq!(
            alignment,
            Alignment {
                fill: 11,
                start: 48,
                recoverable_len: 32,
            }
        );
        assert_eq!(recovered, secret);
    }

    #[test]
    fn blank_blocks_differ_between_fillers() {
        let oracle = AesEcbPrefixOracle::with_prefix(random_bytes(), vec![b'A'; 40], vec![1; 3]);
        let attack = EcbByteAtATimeAttack::new(&oracle, EcbAttackOptions::default());

        let (blank_block, alt_blank_block) = attack.find_blank_blocks(16, b'A').unwrap();

        assert_eq!(blank_block, encrypt_aes_128_ecb(&[b'A'; 16], &oracle.key)[..16]);
        assert_ne!(blank_block, alt_blank_block);
    }

    #[test]
    fn parallel_search_recovers_the_same_secret() {
        let oracle = AesEcbPrefixOracle::with_seed(101, unknown_bytes());
        let options = EcbAttackOptions {
            parallel: true,
            ..Default::default()
        };

        let secret = ecb_byte_at_a_time_attack(&oracle, &options).unwrap();

        assert_eq!(secret, unknown_bytes());
    }

    #[test]
    fn oracle_is_deterministic() {
        let oracle = AesEcbPrefixOracle::new(unknown_bytes());

        let first = oracle.encrypt(b"some input").unwrap();
        let second = oracle.encrypt(b"some input").unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn detect_block_size_finds_aes_block_size() {
        let oracle = AesEcbPrefixOracle::with_seed(3, unknown_bytes());
        let attack = EcbByteAtATimeAttack::new(&oracle, EcbAttackOptions::default());

        assert_eq!(attack.detect_block_size(), Ok(16));
    }

    #[test]
    fn alignment_reports_secret_and_padding_length() {
        let oracle = AesEcbPrefixOracle::with_prefix(random_bytes(), vec![7; 5], vec![1; 20]);
        let attack = EcbByteAtATimeAttack::new(&oracle, EcbAttackOptions::default());

        let alignment = attack.find_alignment(16).unwrap();

        assert_eq!(
            alignment,
            Alignment {
                fill: 11,
                start: 16,
                recoverable_len: 32,
            }
        );
    }

    struct FixedLengthOracle;

    impl EcbOracle for FixedLengthOracle {
        fn encrypt(&self, _input: &[u8]) -> Result<Vec<u8>, OracleError> {
            Ok(vec![0; 32])
        }
    }

    struct StreamOracle;

    impl EcbOracle for StreamOracle {
        fn encrypt(&self, input: &[u8]) -> Result<Vec<u8>, OracleError> {
            Ok([input, &b"secret"[..]]
                .concat()
                .iter()
                .enumerate()
                .map(|(i, b)| b ^ (i as u8).wrapping_mul(31))
                .collect())
        }
    }

    struct CbcOracle {
        key: [u8; 16],
        iv: [u8; 16],
    }

    impl EcbOracle for CbcOracle {
        fn encrypt(&self, input: &[u8]) -> Result<Vec<u8>, OracleError> {
            let plaintext = [&b"prefix"[..], input, &b"secret"[..]].concat();
            Ok(encrypt_aes_128_cbc(&plaintext, &self.key, &self.iv))
        }
    }

    /// Encrypts 15 byte inputs under a different key, so the block we are
    /// trying to match for the first secret byte never comes up again.
    struct KeySwitchingOracle {
        inner: AesEcbPrefixOracle,
        other: AesEcbPrefixOracle,
    }

    impl EcbOracle for KeySwitchingOracle {
        fn encrypt(&self, input: &[u8]) -> Result<Vec<u8>, OracleError> {
            if input.len() == 15 {
                self.other.encrypt(input)
            } else {
                self.inner.encrypt(input)
            }
        }
    }

    struct FailingOracle {
        calls: AtomicUsize,
    }

    impl EcbOracle for FailingOracle {
        fn encrypt(&self, _input: &[u8]) -> Result<Vec<u8>, OracleError> {
            let attempts = self.calls.fetch_add(1, Ordering::Relaxed) + 1;
            Err(OracleError::Unavailable {
                attempts,
                reason: "connection refused".to_string(),
            })
        }
    }

    #[test]
    fn constant_length_oracle_fails_block_size_detection() {
        let options = EcbAttackOptions {
            max_probe_len: 64,
            ..Default::default()
        };

        let result = ecb_byte_at_a_time_attack(&FixedLengthOracle, &options);

        assert_eq!(
            result,
            Err(AttackError::BlockSizeNotDetected { max_probe_len: 64 })
        );
    }

    #[test]
    fn stream_cipher_oracle_is_not_a_block_cipher() {
        let result = ecb_byte_at_a_time_attack(&StreamOracle, &EcbAttackOptions::default());

        assert_eq!(result, Err(AttackError::NotABlockCipher { block_size: 1 }));
    }

    #[test]
    fn cbc_oracle_is_not_detected_as_ecb() {
        let oracle = CbcOracle {
            key: random_bytes(),
            iv: random_bytes(),
        };

        let result = ecb_byte_at_a_time_attack(&oracle, &EcbAttackOptions::default());

        assert_eq!(result, Err(AttackError::NoRepeatedBlock));
    }

    #[test]
    fn inconsistent_oracle_reports_unmatched_byte() {
        let secret = b"twenty bytes secret!".to_vec();
        let oracle = KeySwitchingOracle {
            inner: AesEcbPrefixOracle::with_prefix(random_bytes(), vec![], secret.clone()),
            other: AesEcbPrefixOracle::with_prefix(random_bytes(), vec![], secret),
        };

        let result = ecb_byte_at_a_time_attack(&oracle, &EcbAttackOptions::default());

        assert_eq!(result, Err(AttackError::NoMatchingByte { position: 0 }));
    }

    #[test]
    fn oracle_errors_are_propagated() {
        let oracle = FailingOracle {
            calls: AtomicUsize::new(0),
        };

        let result = ecb_byte_at_a_time_attack(&oracle, &EcbAttackOptions::default());

        assert_eq!(
            result,
            Err(AttackError::Oracle(OracleError::Unavailable {
                attempts: 1,
                reason: "connection refused".to_string(),
            }))
        );
    }

    #[test]
    fn query_budget_is_enforced() {
        let oracle = AesEcbPrefixOracle::with_seed(5, unknown_bytes());
        let options = EcbAttackOptions {
            max_queries: Some(100),
            ..Default::default()
        };

        let result = ecb_byte_at_a_time_attack(&oracle, &options);

        assert_eq!(result, Err(AttackError::QueryBudgetExhausted { limit: 100 }));
    }

    #[test]
    fn queries_stay_within_worst_case_bound() {
        let secret = unknown_bytes();
        let oracle = AesEcbPrefixOracle::with_seed(11, secret.clone());
        let attack = EcbByteAtATimeAttack::new(&oracle, EcbAttackOptions::default());

        attack.run().unwrap();

        // Probing plus one target query and at most 256 guesses per byte,
        // for the secret and the single padding byte we walk into.
        let bound = 64 + (secret.len() + 2) * 257;
        assert!(attack.query_count() < bound);
    }
}
