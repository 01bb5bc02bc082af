use aes_gcm::{
    aead::{Aead, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use rand::RngCore;
use zeroize::Zeroizing;

use crate::errors::AppError;

const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;
const SEALED_DEK_LEN: usize = KEY_LEN + TAG_LEN;
const HEADER_LEN: usize = NONCE_LEN + SEALED_DEK_LEN + NONCE_LEN;

/// AES-256-GCM envelope encryption under a process-wide master key.
///
/// Every secret gets its own random data key (DEK). The DEK is sealed with the
/// master key (KEK) and stored alongside the ciphertext, so a sealed blob is:
///
/// `dek_nonce (12) || encrypted_dek (48) || secret_nonce (12) || encrypted_secret`
pub struct VaultCrypto {
    kek: Zeroizing<[u8; KEY_LEN]>,
}

impl VaultCrypto {
    pub fn new(master_key_hex: &str) -> anyhow::Result<Self> {
        let kek = parse_master_key(master_key_hex)?;
        Ok(Self {
            kek: Zeroizing::new(kek),
        })
    }

    pub fn from_key(key: [u8; KEY_LEN]) -> Self {
        Self {
            kek: Zeroizing::new(key),
        }
    }

    /// Encrypts a plaintext string into a single sealed blob.
    pub fn seal(&self, plaintext: &str) -> Result<Vec<u8>, AppError> {
        let mut dek = Zeroizing::new([0u8; KEY_LEN]);
        OsRng.fill_bytes(&mut dek[..]);

        let secret_cipher = Aes256Gcm::new_from_slice(&dek[..])
            .map_err(|e| AppError::Encryption(format!("invalid key length: {:?}", e)))?;
        let secret_nonce = generate_nonce();
        let encrypted_secret = secret_cipher
            .encrypt(Nonce::from_slice(&secret_nonce), plaintext.as_bytes())
            .map_err(|e| AppError::Encryption(format!("secret encryption failed: {}", e)))?;

        let kek_cipher = Aes256Gcm::new_from_slice(&self.kek[..])
            .map_err(|e| AppError::Encryption(format!("invalid key length: {:?}", e)))?;
        let dek_nonce = generate_nonce();
        let encrypted_dek = kek_cipher
            .encrypt(Nonce::from_slice(&dek_nonce), &dek[..])
            .map_err(|e| AppError::Encryption(format!("DEK encryption failed: {}", e)))?;

        let mut blob = Vec::with_capacity(HEADER_LEN + encrypted_secret.len());
        blob.extend_from_slice(&dek_nonce);
        blob.extend_from_slice(&encrypted_dek);
        blob.extend_from_slice(&secret_nonce);
        blob.extend_from_slice(&encrypted_secret);
        Ok(blob)
    }

    /// Decrypts a blob produced by [`VaultCrypto::seal`].
    pub fn open(&self, blob: &[u8]) -> Result<String, AppError> {
        if blob.len() < HEADER_LEN + TAG_LEN {
            return Err(AppError::Encryption("sealed blob too short".into()));
        }
        let (dek_nonce, rest) = blob.split_at(NONCE_LEN);
        let (encrypted_dek, rest) = rest.split_at(SEALED_DEK_LEN);
        let (secret_nonce, encrypted_secret) = rest.split_at(NONCE_LEN);

        let kek_cipher = Aes256Gcm::new_from_slice(&self.kek[..])
            .map_err(|e| AppError::Encryption(format!("invalid key length: {:?}", e)))?;
        let dek = Zeroizing::new(
            kek_cipher
                .decrypt(Nonce::from_slice(dek_nonce), encrypted_dek)
                .map_err(|e| AppError::Encryption(format!("DEK decryption failed: {}", e)))?,
        );

        let secret_cipher = Aes256Gcm::new_from_slice(&dek[..])
            .map_err(|e| AppError::Encryption(format!("invalid key length: {:?}", e)))?;
        let plaintext = secret_cipher
            .decrypt(Nonce::from_slice(secret_nonce), encrypted_secret)
            .map_err(|e| AppError::Encryption(format!("secret decryption failed: {}", e)))?;

        String::from_utf8(plaintext)
            .map_err(|e| AppError::Encryption(format!("UTF-8 decode failed: {}", e)))
    }
}

fn generate_nonce() -> [u8; NONCE_LEN] {
    let mut nonce = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce);
    nonce
}

pub fn parse_master_key(key_hex: &str) -> anyhow::Result<[u8; KEY_LEN]> {
    let key_hex = key_hex.trim();
    if key_hex.len() != KEY_LEN * 2 {
        anyhow::bail!(
            "ENCRYPTION_KEY must be 64 hex chars (32 bytes), got {} chars",
            key_hex.len()
        );
    }
    let bytes = hex::decode(key_hex)?;
    let mut key = [0u8; KEY_LEN];
    key.copy_from_slice(&bytes);
    Ok(key)
}
