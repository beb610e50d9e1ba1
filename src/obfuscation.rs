//! URL path segment obfuscation.
//!
//! Identifiers that end up in dashboard URLs (`/positions/edit/<token>`) are
//! encrypted with AES-256-GCM and rendered as unpadded URL-safe base64, so a
//! token never contains `/` and cannot be forged without the secret.

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use sha2::{Digest, Sha256};

use crate::errors::{AppError, AppResult};

const NONCE_LEN: usize = 12;

#[derive(Clone)]
pub struct PathObfuscator {
    cipher: Aes256Gcm,
}

impl std::fmt::Debug for PathObfuscator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PathObfuscator").finish_non_exhaustive()
    }
}

impl PathObfuscator {
    /// The AES key is the SHA-256 digest of `secret`.
    pub fn new(secret: &str) -> AppResult<Self> {
        if secret.is_empty() {
            return Err(AppError::configuration("URL secret must not be empty"));
        }
        let key = Sha256::digest(secret.as_bytes());
        let cipher = Aes256Gcm::new_from_slice(&key)
            .map_err(|err| AppError::configuration(format!("invalid URL key: {err}")))?;
        Ok(Self { cipher })
    }

    pub fn encrypt(&self, segment: &str) -> AppResult<String> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, segment.as_bytes())
            .map_err(|err| AppError::internal(format!("failed to encrypt path segment: {err}")))?;

        let mut token = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        token.extend_from_slice(&nonce);
        token.extend_from_slice(&ciphertext);
        Ok(URL_SAFE_NO_PAD.encode(token))
    }

    pub fn decrypt(&self, token: &str) -> AppResult<String> {
        let raw = URL_SAFE_NO_PAD
            .decode(token)
            .map_err(|_| AppError::bad_request("malformed path token"))?;
        if raw.len() < NONCE_LEN {
            return Err(AppError::bad_request("malformed path token"));
        }

        let (nonce, ciphertext) = raw.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| AppError::bad_request("path token failed authentication"))?;

        String::from_utf8(plaintext).map_err(|_| AppError::bad_request("path token is not UTF-8"))
    }
}
