//! Raw payload sealing
//!
//! Provider payloads are stored opaque: AES-256-GCM, nonce prepended to
//! the ciphertext. The key lives with the store and is never serialized.

use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};

use crate::CacheError;

/// Seals and opens raw provider payloads
pub struct PayloadSealer {
    cipher: Aes256Gcm,
}

impl PayloadSealer {
    /// Sealer from a 32-byte key
    pub fn new(key: &[u8; 32]) -> Self {
        Self {
            cipher: Aes256Gcm::new_from_slice(key).expect("key length is 32"),
        }
    }

    /// Sealer with a process-local random key (payloads unreadable after
    /// restart; acceptable for ephemeral deployments and tests)
    pub fn ephemeral() -> Self {
        let key = Aes256Gcm::generate_key(OsRng);
        Self {
            cipher: Aes256Gcm::new(&key),
        }
    }

    /// Encrypt a payload; output is nonce || ciphertext
    pub fn seal(&self, plaintext: &[u8]) -> Vec<u8> {
        let nonce = Aes256Gcm::generate_nonce(OsRng);
        let mut out = nonce.to_vec();
        // encryption with a fresh nonce cannot fail for in-memory buffers
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext)
            .expect("aes-gcm encrypt");
        out.extend_from_slice(&ciphertext);
        out
    }

    /// Decrypt a sealed payload. Callers must audit the access.
    pub fn open(&self, sealed: &[u8]) -> Result<Vec<u8>, CacheError> {
        if sealed.len() < 12 {
            return Err(CacheError::UnsealFailed);
        }
        let (nonce, ciphertext) = sealed.split_at(12);
        self.cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| CacheError::UnsealFailed)
    }
}
