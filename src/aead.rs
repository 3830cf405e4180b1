use std::fmt::{self, Debug};

use aes_gcm::{
    Aes128Gcm, Aes256Gcm, AeadCore, Nonce,
    aead::{Aead as _, KeyInit, OsRng, Payload, consts::U12, rand_core::RngCore},
};

use crate::error::{Error, Result};

const NONCE_SIZE: usize = 12;

/// Authenticated encryption with associated data.
///
/// Decryption must fail, never panic, when the ciphertext or the associated data was altered.
pub trait Aead: Debug + Send + Sync + 'static {
    fn encrypt(&self, plaintext: &[u8], associated_data: &[u8]) -> Result<Vec<u8>>;

    fn decrypt(&self, ciphertext: &[u8], associated_data: &[u8]) -> Result<Vec<u8>>;
}

/// AES-GCM with a random 96-bit nonce per message, stored in front of the ciphertext.
#[derive(Clone)]
pub struct AesGcm {
    cipher: Cipher,
}

#[derive(Clone)]
enum Cipher {
    Aes128(Aes128Gcm),
    Aes256(Aes256Gcm),
}

impl AesGcm {
    /// Builds a cipher from a 16 or 32 byte key.
    pub fn new(key: &[u8]) -> Result<Self> {
        let cipher = match key.len() {
            16 => Aes128Gcm::new_from_slice(key).map(Cipher::Aes128),
            32 => Aes256Gcm::new_from_slice(key).map(Cipher::Aes256),
            len => {
                return Err(Error::Config(format!(
                    "AES-GCM key must be 16 or 32 bytes, got {len}"
                )));
            }
        }
        .map_err(|err| Error::Config(err.to_string()))?;
        Ok(Self { cipher })
    }

    /// A fresh random 256-bit key.
    pub fn generate() -> Self {
        let mut key = [0u8; 32];
        OsRng.fill_bytes(&mut key);
        Self {
            cipher: Cipher::Aes256(Aes256Gcm::new(&key.into())),
        }
    }
}

impl Debug for AesGcm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bits = match self.cipher {
            Cipher::Aes128(_) => 128,
            Cipher::Aes256(_) => 256,
        };
        f.debug_struct("AesGcm").field("bits", &bits).finish_non_exhaustive()
    }
}

impl Aead for AesGcm {
    fn encrypt(&self, plaintext: &[u8], associated_data: &[u8]) -> Result<Vec<u8>> {
        let payload = Payload {
            msg: plaintext,
            aad: associated_data,
        };
        let (nonce, ciphertext) = match &self.cipher {
            Cipher::Aes128(cipher) => {
                let nonce = Aes128Gcm::generate_nonce(&mut OsRng);
                (nonce, cipher.encrypt(&nonce, payload))
            }
            Cipher::Aes256(cipher) => {
                let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
                (nonce, cipher.encrypt(&nonce, payload))
            }
        };
        let ciphertext =
            ciphertext.map_err(|err| Error::Crypto(format!("encryption failed: {err}")))?;

        let mut out = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&ciphertext);
        Ok(out)
    }

    fn decrypt(&self, ciphertext: &[u8], associated_data: &[u8]) -> Result<Vec<u8>> {
        if ciphertext.len() < NONCE_SIZE {
            return Err(Error::Crypto("ciphertext shorter than nonce".into()));
        }
        let (nonce, ciphertext) = ciphertext.split_at(NONCE_SIZE);
        let nonce = Nonce::<U12>::from_slice(nonce);
        let payload = Payload {
            msg: ciphertext,
            aad: associated_data,
        };

        match &self.cipher {
            Cipher::Aes128(cipher) => cipher.decrypt(nonce, payload),
            Cipher::Aes256(cipher) => cipher.decrypt(nonce, payload),
        }
        .map_err(|err| Error::Crypto(format!("decryption failed: {err}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_both_key_sizes() {
        for key in [vec![1u8; 16], vec![2u8; 32]] {
            let aead = AesGcm::new(&key).expect("key is valid");
            let ct = aead.encrypt(b"hello", b"session").expect("encrypt succeeds");
            let pt = aead.decrypt(&ct, b"session").expect("decrypt succeeds");

            assert_eq!(pt, b"hello");
        }
    }

    #[test]
    fn rejects_bad_key_length() {
        assert!(matches!(AesGcm::new(&[0u8; 24]), Err(Error::Config(_))));
    }

    #[test]
    fn associated_data_is_bound() {
        let aead = AesGcm::generate();
        let ct = aead.encrypt(b"hello", b"session").expect("encrypt succeeds");

        assert!(matches!(aead.decrypt(&ct, b"other"), Err(Error::Crypto(_))));
    }

    #[test]
    fn short_ciphertext_fails() {
        let aead = AesGcm::generate();
        assert!(matches!(aead.decrypt(&[0u8; 4], b""), Err(Error::Crypto(_))));
    }

    #[test]
    fn nonces_differ() {
        let aead = AesGcm::generate();
        let a = aead.encrypt(b"same", b"").expect("encrypt succeeds");
        let b = aead.encrypt(b"same", b"").expect("encrypt succeeds");

        assert_ne!(a, b);
    }
}
