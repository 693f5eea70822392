// AES-128 in ECB and CBC modes.
//
// The block cipher itself comes from the `aes` crate, only the modes of
// operation live here.
use crate::{pkcs7_pad, pkcs7_unpad, PaddingError};

use aes::{
    cipher::{generic_array::GenericArray, BlockDecrypt, BlockEncrypt, KeyInit},
    Aes128,
};
use rand::RngCore;

pub const BLOCK_SIZE: usize = 16;

pub fn random_bytes<const N: usize>() -> [u8; N] {
    let mut bytes = [0u8; N];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes
}

pub fn random_bytes_with_rng<const N: usize>(rng: &mut impl RngCore) -> [u8; N] {
    let mut bytes = [0u8; N];
    rng.fill_bytes(&mut bytes);
    bytes
}

/// Encrypt with AES-128 in ECB mode, padding the message with PKCS#7.
pub fn encrypt_aes_128_ecb(message: &[u8], key: &[u8; BLOCK_SIZE]) -> Vec<u8> {
    let cipher = Aes128::new(GenericArray::from_slice(key));
    let mut ciphertext = pkcs7_pad(message, BLOCK_SIZE as u8);
    for block in ciphertext.chunks_exact_mut(BLOCK_SIZE) {
        cipher.encrypt_block(GenericArray::from_mut_slice(block));
    }
    ciphertext
}

/// Decrypt AES-128 ECB and strip the PKCS#7 padding.
pub fn decrypt_aes_128_ecb(
    ciphertext: &[u8],
    key: &[u8; BLOCK_SIZE],
) -> Result<Vec<u8>, PaddingError> {
    if ciphertext.is_empty() || ciphertext.len() % BLOCK_SIZE != 0 {
        return Err(PaddingError::UnalignedInput(ciphertext.len()));
    }
    let cipher = Aes128::new(GenericArray::from_slice(key));
    let mut plaintext = ciphertext.to_vec();
    for block in plaintext.chunks_exact_mut(BLOCK_SIZE) {
        cipher.decrypt_block(GenericArray::from_mut_slice(block));
    }
    pkcs7_unpad(&mut plaintext, BLOCK_SIZE)?;
    Ok(plaintext)
}

/// Encrypt with AES-128 in CBC mode, padding the message with PKCS#7.
pub fn encrypt_aes_128_cbc(
    plaintext: &[u8],
    key: &[u8; BLOCK_SIZE],
    iv: &[u8; BLOCK_SIZE],
) -> Vec<u8> {
    let cipher = Aes128::new(GenericArray::from_slice(key));
    let mut ciphertext = pkcs7_pad(plaintext, BLOCK_SIZE as u8);

    let mut last_block = *iv;
    for block in ciphertext.chunks_exact_mut(BLOCK_SIZE) {
        block
            .iter_mut()
            .zip(last_block.iter())
            .for_each(|(b, c)| *b ^= c);
        cipher.encrypt_block(GenericArray::from_mut_slice(block));
        last_block.copy_from_slice(block);
    }
    ciphertext
}

/// Decrypt AES-128 CBC without touching the padding.
pub fn decrypt_aes_128_cbc_raw(
    ciphertext: &[u8],
    key: &[u8; BLOCK_SIZE],
    iv: &[u8; BLOCK_SIZE],
) -> Result<Vec<u8>, PaddingError> {
    if ciphertext.is_empty() || ciphertext.len() % BLOCK_SIZE != 0 {
        return Err(PaddingError::UnalignedInput(ciphertext.len()));
    }
    let cipher = Aes128::new(GenericArray::from_slice(key));
    let mut message = Vec::with_capacity(ciphertext.len());

    let mut last_block: &[u8] = iv;
    for ciphertext_block in ciphertext.chunks_exact(BLOCK_SIZE) {
        let mut block = GenericArray::clone_from_slice(ciphertext_block);
        cipher.decrypt_block(&mut block);
        block
            .iter_mut()
            .zip(last_block.iter())
            .for_each(|(b, c)| *b ^= c);
        message.extend_from_slice(&block);
        last_block = ciphertext_block;
    }
    Ok(message)
}

/// Decrypt AES-128 CBC and strip the PKCS#7 padding.
///
/// Returns an error if the padding of the decrypted message is invalid, which
/// is exactly the signal a padding oracle leaks.
pub fn decrypt_aes_128_cbc(
    ciphertext: &[u8],
    key: &[u8; BLOCK_SIZE],
    iv: &[u8; BLOCK_SIZE],
) -> Result<Vec<u8>, PaddingError> {
    let mut message = decrypt_aes_128_cbc_raw(ciphertext, key, iv)?;
    pkcs7_unpad(&mut message, BLOCK_SIZE)?;
    Ok(message)
}

#[cfg(test)]
mod tests {
    use super::*;

    use rstest::rstest;

    #[test]
    fn aes_128_with_ecb_encrypt_block() {
        let key = "Thats my Kung Fu".as_bytes();
        let plaintext = "Two One Nine Two".as_bytes();

        let ciphertext = encrypt_aes_128_ecb(&plaintext, &key.try_into().unwrap());

        #[rustfmt::skip]
        let expected = [
            0x29, 0xC3, 0x50, 0x5F,
            0x57, 0x14, 0x20, 0xF6,
            0x40, 0x22, 0x99, 0xB3,
            0x1A, 0x02, 0xD7, 0x3A,
        ];
        // The second block is the encrypted padding block.
        assert_eq!(ciphertext.len(), 32);
        assert_eq!(ciphertext[..16], expected);
    }

    #[test]
    fn ecb_encrypts_equal_blocks_to_equal_ciphertext() {
        let key = random_bytes::<16>();

        let ciphertext = encrypt_aes_128_ecb(&[b'X'; 32], &key);

        assert_eq!(ciphertext[..16], ciphertext[16..32]);
    }

    #[rstest]
    #[case(b"")]
    #[case(b"YELLOW SUBMARINE")]
    #[case(b"I'm back and I'm ringin' the bell")]
    fn decrypt_then_encrypt_cbc_returns_original_message(#[case] message: &[u8]) {
        let key = random_bytes::<16>();
        let iv = random_bytes::<16>();

        let ciphertext = encrypt_aes_128_cbc(message, &key, &iv);
        let plaintext = decrypt_aes_128_cbc(&ciphertext, &key, &iv).unwrap();

        assert_eq!(ciphertext.len() % BLOCK_SIZE, 0);
        assert_eq!(plaintext, message);
    }

    #[test]
    fn ecb_decrypt_inverts_encrypt() {
        let key: [u8; 16] = "YELLOW SUBMARINE".as_bytes().try_into().unwrap();
        let message = b"Play that funky music";

        let ciphertext = encrypt_aes_128_ecb(message, &key);

        assert_eq!(decrypt_aes_128_ecb(&ciphertext, &key).unwrap(), message);
    }

    #[test]
    fn cbc_chains_blocks_so_equal_plaintext_blocks_differ() {
        let key = random_bytes::<16>();
        let iv = random_bytes::<16>();

        let ciphertext = encrypt_aes_128_cbc(&[b'X'; 32], &key, &iv);

        assert_ne!(ciphertext[..16], ciphertext[16..32]);
    }

    #[test]
    fn decrypt_cbc_rejects_unaligned_ciphertext() {
        let key = random_bytes::<16>();
        let iv = random_bytes::<16>();

        let result = decrypt_aes_128_cbc(&[0u8; 17], &key, &iv);

        assert_eq!(result, Err(PaddingError::UnalignedInput(17)));
    }
}
