//! Descriptor-at-rest encryption.
//!
//! Face descriptors are biometric data; they are stored as AES-256-GCM
//! blobs (`nonce || ciphertext`) keyed off the configured secret.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use sha2::{Digest, Sha256};
use thiserror::Error;

const NONCE_LEN: usize = 12;

#[derive(Error, Debug)]
pub enum CipherError {
    #[error("descriptor encryption failed")]
    Encrypt,
    #[error("descriptor decryption failed — wrong key or corrupt blob")]
    Decrypt,
    #[error("descriptor blob truncated")]
    Truncated,
}

/// Symmetric cipher for descriptor blobs. Cheap to clone; the key is
/// derived once from the configured secret.
#[derive(Clone)]
pub struct DescriptorCipher {
    key: [u8; 32],
}

impl DescriptorCipher {
    pub fn from_secret(secret: &str) -> Self {
        let key: [u8; 32] = Sha256::digest(secret.as_bytes()).into();
        Self { key }
    }

    /// Encrypt a descriptor into a `nonce || ciphertext` blob with a
    /// fresh random nonce.
    pub fn seal(&self, values: &[f32]) -> Result<Vec<u8>, CipherError> {
        let mut plaintext = Vec::with_capacity(values.len() * 4);
        for v in values {
            plaintext.extend_from_slice(&v.to_le_bytes());
        }

        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&self.key));
        let nonce_bytes: [u8; NONCE_LEN] = rand::random();
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(nonce, plaintext.as_slice())
            .map_err(|_| CipherError::Encrypt)?;

        let mut blob = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        blob.extend_from_slice(&nonce_bytes);
        blob.extend_from_slice(&ciphertext);
        Ok(blob)
    }

    /// Decrypt a blob produced by [`seal`](Self::seal).
    pub fn open(&self, blob: &[u8]) -> Result<Vec<f32>, CipherError> {
        if blob.len() <= NONCE_LEN {
            return Err(CipherError::Truncated);
        }
        let (nonce_bytes, ciphertext) = blob.split_at(NONCE_LEN);

        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&self.key));
        let plaintext = cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|_| CipherError::Decrypt)?;

        if plaintext.len() % 4 != 0 {
            return Err(CipherError::Decrypt);
        }
        Ok(plaintext
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seal_open_roundtrip() {
        let cipher = DescriptorCipher::from_secret("kiosk-secret");
        let values: Vec<f32> = (0..128).map(|i| i as f32 * 0.01).collect();
        let blob = cipher.seal(&values).unwrap();
        assert_eq!(cipher.open(&blob).unwrap(), values);
    }

    #[test]
    fn nonces_differ_between_seals() {
        let cipher = DescriptorCipher::from_secret("kiosk-secret");
        let values = vec![1.0f32, 2.0, 3.0];
        let a = cipher.seal(&values).unwrap();
        let b = cipher.seal(&values).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn tampered_blob_fails() {
        let cipher = DescriptorCipher::from_secret("kiosk-secret");
        let mut blob = cipher.seal(&[1.0, 2.0]).unwrap();
        let last = blob.len() - 1;
        blob[last] ^= 0xff;
        assert!(matches!(cipher.open(&blob), Err(CipherError::Decrypt)));
    }

    #[test]
    fn wrong_key_fails() {
        let a = DescriptorCipher::from_secret("key-a");
        let b = DescriptorCipher::from_secret("key-b");
        let blob = a.seal(&[1.0, 2.0]).unwrap();
        assert!(matches!(b.open(&blob), Err(CipherError::Decrypt)));
    }

    #[test]
    fn truncated_blob_fails() {
        let cipher = DescriptorCipher::from_secret("kiosk-secret");
        assert!(matches!(
            cipher.open(&[0u8; 5]),
            Err(CipherError::Truncated)
        ));
    }
}
