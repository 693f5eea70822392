/// Implement PKCS#7 padding

/// Pad `bytes` to a multiple of `block_size`.
///
/// A message that is already aligned gets a whole block of padding, so the
/// padding can always be removed unambiguously.
pub fn pkcs7_pad(bytes: &[u8], block_size: u8) -> Vec<u8> {
    let n_pad = block_size - (bytes.len() % block_size as usize) as u8;
    let mut out = Vec::with_capacity(bytes.len() + n_pad as usize);
    out.extend_from_slice(bytes);
    out.resize(bytes.len() + n_pad as usize, n_pad);
    out
}
