//! AES-256-GCM sealing of the profile record.

use crate::error::{StoreError, StoreResult};
use aes_gcm::{
    aead::{generic_array::GenericArray, Aead, KeyInit, Payload},
    Aes256Gcm, Nonce,
};
use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Size of the derived AES-256 key in bytes.
pub const KEY_SIZE: usize = 32;
/// Size of the GCM nonce in bytes.
pub const NONCE_SIZE: usize = 12;
/// Size of the GCM authentication tag in bytes.
pub const TAG_SIZE: usize = 16;
/// Size of the per-file HKDF salt in bytes.
pub const SALT_SIZE: usize = 16;

/// HKDF info string binding derived keys to this file format.
const KEY_INFO: &[u8] = b"waw-profile-store-v1";

/// The user's master secret.
///
/// The secret is zeroized when dropped. File keys are derived from it with
/// HKDF-SHA256 and a per-file salt, so the secret itself never touches disk.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct MasterKey {
    secret: Vec<u8>,
}

impl MasterKey {
    /// Wraps a master secret.
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Derives the file key for `salt`.
    pub(crate) fn derive(&self, salt: &[u8]) -> StoreResult<FileKey> {
        use hkdf::Hkdf;
        use sha2::Sha256;

        let hk = Hkdf::<Sha256>::new(Some(salt), &self.secret);
        let mut bytes = [0u8; KEY_SIZE];
        hk.expand(KEY_INFO, &mut bytes)
            .map_err(|_| StoreError::Encryption("HKDF expand failed".into()))?;
        Ok(FileKey { bytes })
    }
}

impl std::fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MasterKey")
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

/// A key derived for one store file.
#[derive(Zeroize, ZeroizeOnDrop)]
pub(crate) struct FileKey {
    bytes: [u8; KEY_SIZE],
}

impl FileKey {
    /// Encrypts `plaintext`, authenticating `aad` alongside it.
    ///
    /// Output layout: `nonce (12 bytes) || ciphertext || tag (16 bytes)`.
    pub(crate) fn seal(&self, plaintext: &[u8], aad: &[u8]) -> StoreResult<Vec<u8>> {
        let cipher = Aes256Gcm::new(GenericArray::from_slice(&self.bytes));

        let mut nonce_bytes = [0u8; NONCE_SIZE];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(
                nonce,
                Payload {
                    msg: plaintext,
                    aad,
                },
            )
            .map_err(|_| StoreError::Encryption("AES-GCM encryption failed".into()))?;

        let mut sealed = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        sealed.extend_from_slice(&nonce_bytes);
        sealed.extend(ciphertext);
        Ok(sealed)
    }

    /// Decrypts data produced by [`seal`](Self::seal) with the same `aad`.
    pub(crate) fn open(&self, sealed: &[u8], aad: &[u8]) -> StoreResult<Vec<u8>> {
        if sealed.len() < NONCE_SIZE + TAG_SIZE {
            return Err(StoreError::Corrupted("ciphertext too short".into()));
        }

        let cipher = Aes256Gcm::new(GenericArray::from_slice(&self.bytes));
        let (nonce, encrypted) = sealed.split_at(NONCE_SIZE);

        cipher
            .decrypt(
                Nonce::from_slice(nonce),
                Payload {
                    msg: encrypted,
                    aad,
                },
            )
            .map_err(|_| StoreError::Decryption("wrong master key or tampered data".into()))
    }
}

/// Generates a random salt for a new store file.
pub(crate) fn random_salt() -> [u8; SALT_SIZE] {
    let mut salt = [0u8; SALT_SIZE];
    rand::thread_rng().fill_bytes(&mut salt);
    salt
}
