// AES-CBC padding oracle with an explicit key and IV, and the helpers needed
// to produce a challenge ciphertext for it.
use cbc::cipher::{
    block_padding::NoPadding,
    generic_array::GenericArray,
    BlockDecryptMut, BlockEncryptMut, KeyIvInit,
};

use crate::{config::BLOCK_SIZE, oracle::check_probe_len, OracleError, PaddingOracle};

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum CipherError {
    #[error("key must be 16, 24 or 32 bytes, got {0}")]
    InvalidKeyLength(usize),
    #[error("IV must be 16 bytes, got {0}")]
    InvalidIvLength(usize),
}

#[derive(Clone)]
enum CipherKey {
    Aes128([u8; 16]),
    Aes192([u8; 24]),
    Aes256([u8; 32]),
}

/// Decrypts probes under a fixed key and IV and reports whether the last
/// block is PKCS#7 padded.
#[derive(Clone)]
pub struct CbcOracle {
    key: CipherKey,
    iv: [u8; BLOCK_SIZE],
}

impl CbcOracle {
    /// The AES variant is picked from the key length.
    pub fn new(key: &[u8], iv: &[u8]) -> Result<Self, CipherError> {
        let invalid_key =
            |_: std::array::TryFromSliceError| CipherError::InvalidKeyLength(key.len());
        let key = match key.len() {
            16 => CipherKey::Aes128(key.try_into().map_err(invalid_key)?),
            24 => CipherKey::Aes192(key.try_into().map_err(invalid_key)?),
            32 => CipherKey::Aes256(key.try_into().map_err(invalid_key)?),
            n => return Err(CipherError::InvalidKeyLength(n)),
        };
        let iv = iv
            .try_into()
            .map_err(|_| CipherError::InvalidIvLength(iv.len()))?;
        Ok(Self { key, iv })
    }

    /// PKCS#7 pad and encrypt `plaintext`.
    pub fn encrypt(&self, plaintext: &[u8]) -> Vec<u8> {
        let padded = pkcs7_pad(plaintext, BLOCK_SIZE as u8);
        let iv = GenericArray::from(self.iv);
        match &self.key {
            CipherKey::Aes128(k) => cbc::Encryptor::<aes::Aes128>::new(&(*k).into(), &iv)
                .encrypt_padded_vec_mut::<NoPadding>(&padded),
            CipherKey::Aes192(k) => cbc::Encryptor::<aes::Aes192>::new(&(*k).into(), &iv)
                .encrypt_padded_vec_mut::<NoPadding>(&padded),
            CipherKey::Aes256(k) => cbc::Encryptor::<aes::Aes256>::new(&(*k).into(), &iv)
                .encrypt_padded_vec_mut::<NoPadding>(&padded),
        }
    }

    /// Decrypt without stripping padding. `None` if `ciphertext` isn't made
    /// of whole blocks.
    pub fn decrypt_raw(&self, ciphertext: &[u8]) -> Option<Vec<u8>> {
        let iv = GenericArray::from(self.iv);
        let decrypted = match &self.key {
            CipherKey::Aes128(k) => cbc::Decryptor::<aes::Aes128>::new(&(*k).into(), &iv)
                .decrypt_padded_vec_mut::<NoPadding>(ciphertext),
            CipherKey::Aes192(k) => cbc::Decryptor::<aes::Aes192>::new(&(*k).into(), &iv)
                .decrypt_padded_vec_mut::<NoPadding>(ciphertext),
            CipherKey::Aes256(k) => cbc::Decryptor::<aes::Aes256>::new(&(*k).into(), &iv)
                .decrypt_padded_vec_mut::<NoPadding>(ciphertext),
        };
        decrypted.ok()
    }

    pub fn padding_valid(&self, ciphertext: &[u8]) -> bool {
        match self.decrypt_raw(ciphertext) {
            Some(plaintext) => {
                let last_block = &plaintext[plaintext.len().saturating_sub(BLOCK_SIZE)..];
                pkcs7_padding_len(last_block).is_some()
            }
            None => false,
        }
    }
}

impl PaddingOracle for CbcOracle {
    async fn test(&self, probe: &[u8]) -> Result<bool, OracleError> {
        check_probe_len(probe, BLOCK_SIZE)?;
        Ok(self.padding_valid(probe))
    }
}

/// Length of the PKCS#7 padding on `block`, if it has valid padding.
pub fn pkcs7_padding_len(block: &[u8]) -> Option<u8> {
    let n_pad = *block.last()?;
    if n_pad == 0 || n_pad as usize > block.len() {
        return None;
    }
    let padded = &block[(block.len() - n_pad as usize)..];
    if padded.iter().all(|&b| b == n_pad) {
        return Some(n_pad);
    }
    None
}

/// Pad to a multiple of `block_size`, always adding between 1 and
/// `block_size` bytes.
pub fn pkcs7_pad(bytes: &[u8], block_size: u8) -> Vec<u8> {
    let n_pad = block_size - (bytes.len() % block_size as usize) as u8;
    let mut out = Vec::with_capacity(bytes.len() + n_pad as usize);
    out.extend_from_slice(bytes);
    out.extend(std::iter::repeat(n_pad).take(n_pad as usize));
    out
}

pub fn flag_message(flag: &str) -> Vec<u8> {
    format!("Congrats, your flag is '{}'", flag).into_bytes()
}
