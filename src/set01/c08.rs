// Detect AES in ECB mode

use std::collections::HashSet;

/// Return a score for how likely some bytes were encrypted using ECB.
///
/// The score will be between 0 and 1, but does not indicate a probability.
/// The score is the ratio of repeated blocks to blocks. As the same plaintext
/// block will result in the same ciphertext when using ECB, you are likely to
/// get the same fraction of repeated blocks as you would in English. This
/// fraction will almost certainly be higher than some random string of bytes.
pub fn score_aes_ecb_likelihood(bytes: &[u8], block_size: usize) -> f64 {
    if bytes.len() < block_size || block_size == 0 {
        return 0.;
    }
    let n_block_repetitions = count_block_repetitions(bytes, block_size);
    n_block_repetitions as f64 / (bytes.len() / block_size) as f64
}

pub fn is_ecb_encrypted(bytes: &[u8], block_size: usize) -> bool {
    score_aes_ecb_likelihood(bytes, block_size) > 0.
}

fn count_block_repetitions(bytes: &[u8], block_size: usize) -> usize {
    let mut seen_blocks = HashSet::new();
    bytes
        .chunks_exact(block_size)
        .filter(|block| !seen_blocks.insert(*block))
        .count()
}
