// PKCS#7 padding validation

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PaddingError {
    #[error("invalid pkcs7 padding")]
    InvalidPadding,
    #[error("input of {0} bytes is not a whole number of blocks")]
    UnalignedInput(usize),
}

/// Strip the PKCS#7 padding from `bytes` in place.
///
/// The buffer is left untouched if the padding is invalid.
pub fn pkcs7_unpad(bytes: &mut Vec<u8>, block_size: usize) -> Result<(), PaddingError> {
    let n_pad = pkcs7_padding_len(bytes, block_size).ok_or(PaddingError::InvalidPadding)?;
    bytes.truncate(bytes.len() - n_pad);
    Ok(())
}

pub fn is_pkcs7_padded(bytes: &[u8], block_size: usize) -> bool {
    pkcs7_padding_len(bytes, block_size).is_some()
}

fn pkcs7_padding_len(bytes: &[u8], block_size: usize) -> Option<usize> {
    let n_pad = *bytes.last()? as usize;
    if n_pad == 0 || n_pad > block_size || n_pad > bytes.len() {
        return None;
    }
    let padding = &bytes[(bytes.len() - n_pad)..];
    if padding.iter().all(|&el| el as usize == n_pad) {
        Some(n_pad)
    } else {
        None
    }
}
