//! AES-256-GCM sealing for credential bundles.
//!
//! A sealed value is `base64(nonce || ciphertext)`, so one text column holds
//! everything needed to open it again.

use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use anyhow::{anyhow, Context, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};

/// Size of the encryption key in bytes (256 bits)
const KEY_SIZE: usize = 32;

/// Size of the nonce in bytes (96 bits, standard for GCM)
const NONCE_SIZE: usize = 12;

/// Decodes a base64 master key and checks it is exactly 32 bytes.
pub fn validate_key(key_base64: &str) -> Result<Vec<u8>> {
    let key_bytes = BASE64
        .decode(key_base64.trim())
        .context("Failed to decode base64 encryption key")?;

    if key_bytes.len() != KEY_SIZE {
        return Err(anyhow!(
            "Encryption key must be {} bytes (256 bits), got {} bytes",
            KEY_SIZE,
            key_bytes.len()
        ));
    }

    Ok(key_bytes)
}

/// Seals and opens credential bundles with a single master key.
#[derive(Clone)]
pub struct SecretBox {
    cipher: Aes256Gcm,
}

impl SecretBox {
    /// Builds from a base64-encoded 32-byte master key.
    pub fn from_base64(key_base64: &str) -> Result<Self> {
        let key = validate_key(key_base64)?;
        let cipher = Aes256Gcm::new_from_slice(&key)
            .map_err(|e| anyhow!("Failed to create cipher: {}", e))?;
        Ok(Self { cipher })
    }

    /// Encrypts with a fresh random nonce.
    pub fn seal(&self, plaintext: &str) -> Result<String> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|e| anyhow!("Encryption failed: {}", e))?;

        let mut sealed = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        sealed.extend_from_slice(&nonce);
        sealed.extend_from_slice(&ciphertext);
        Ok(BASE64.encode(sealed))
    }

    /// Decrypts a value produced by [`SecretBox::seal`].
    ///
    /// Fails on a wrong key, truncated input or tampering.
    pub fn open(&self, sealed: &str) -> Result<String> {
        let bytes = BASE64
            .decode(sealed)
            .context("Failed to decode sealed value")?;

        if bytes.len() <= NONCE_SIZE {
            return Err(anyhow!("Sealed value too short ({} bytes)", bytes.len()));
        }

        let (nonce, ciphertext) = bytes.split_at(NONCE_SIZE);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|e| anyhow!("Decryption failed (wrong key or corrupted data): {}", e))?;

        String::from_utf8(plaintext).context("Decrypted data is not valid UTF-8")
    }
}

impl std::fmt::Debug for SecretBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretBox(..)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_box(fill: u8) -> SecretBox {
        SecretBox::from_base64(&BASE64.encode([fill; 32])).unwrap()
    }

    #[test]
    fn test_key_validation() {
        assert!(validate_key(&BASE64.encode([0u8; 32])).is_ok());
        assert!(validate_key(&BASE64.encode([0u8; 16])).is_err());
        assert!(validate_key(&BASE64.encode([0u8; 64])).is_err());
        assert!(validate_key("not-valid-base64!@#$").is_err());
    }

    #[test]
    fn test_seal_open() {
        let secret_box = test_box(0);
        let bundle = r#"{"access_token":"at-123","refresh_token":"rt-456"}"#;

        let sealed = secret_box.seal(bundle).unwrap();
        assert!(!sealed.contains("at-123"));
        assert_eq!(secret_box.open(&sealed).unwrap(), bundle);
    }

    #[test]
    fn test_nonce_differs_per_seal() {
        let secret_box = test_box(0);
        let a = secret_box.seal("same").unwrap();
        let b = secret_box.seal("same").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_wrong_key_fails() {
        let sealed = test_box(0).seal("secret").unwrap();
        assert!(test_box(1).open(&sealed).is_err());
    }

    #[test]
    fn test_tampered_or_truncated_fails() {
        let secret_box = test_box(0);
        let sealed = secret_box.seal("secret").unwrap();

        let mut bytes = BASE64.decode(&sealed).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xff;
        assert!(secret_box.open(&BASE64.encode(&bytes)).is_err());

        assert!(secret_box.open(&BASE64.encode([0u8; 8])).is_err());
    }
}
