// src/raddb.rs

use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm, Key, Nonce,
};
use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use thiserror::Error;

use rand::{rngs::OsRng, RngCore};

#[derive(Debug, Error)]
pub enum RadDbError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Decryption error: {0}")]
    Decryption(String),
    #[error("Encryption error: {0}")]
    Encryption(String),
    #[error("Store lock poisoned")]
    Poisoned,
}

/// Encryption key (32 bytes = 256 bits)
pub type MasterKey = [u8; 32];

const NONCE_LEN: usize = 12;

/// RadDB: encrypted embedded key/value store.
///
/// The whole map lives in memory and is rewritten to disk after every
/// mutation as `nonce || AES-256-GCM(bincode(map))`. Without a path the
/// store never touches the disk.
pub struct RadDB {
    path: Option<PathBuf>,
    cipher: Aes256Gcm,
    cache: RwLock<HashMap<String, Vec<u8>>>,
}

impl RadDB {
    /// Open the store at `path` with the master key
    pub fn open<P: AsRef<Path>>(path: P, key: &MasterKey) -> Result<Self, RadDbError> {
        let db = Self {
            path: Some(path.as_ref().to_path_buf()),
            cipher: Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key)),
            cache: RwLock::new(HashMap::new()),
        };
        db.load()?;
        Ok(db)
    }

    /// Volatile store for tests and dry runs
    pub fn in_memory() -> Self {
        let key = Self::generate_key();
        Self {
            path: None,
            cipher: Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key)),
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// New random master key (store it somewhere safe)
    pub fn generate_key() -> MasterKey {
        let mut key = [0u8; 32];
        OsRng.fill_bytes(&mut key);
        key
    }

    fn read_cache(&self) -> Result<RwLockReadGuard<'_, HashMap<String, Vec<u8>>>, RadDbError> {
        self.cache.read().map_err(|_| RadDbError::Poisoned)
    }

    fn write_cache(&self) -> Result<RwLockWriteGuard<'_, HashMap<String, Vec<u8>>>, RadDbError> {
        self.cache.write().map_err(|_| RadDbError::Poisoned)
    }

    fn load(&self) -> Result<(), RadDbError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if !path.exists() {
            return Ok(());
        }

        let mut file = OpenOptions::new().read(true).open(path)?;
        let mut encrypted = Vec::new();
        file.read_to_end(&mut encrypted)?;

        if encrypted.is_empty() {
            return Ok(());
        }
        if encrypted.len() < NONCE_LEN {
            return Err(RadDbError::Decryption("File too short".to_string()));
        }

        let (nonce_bytes, ciphertext) = encrypted.split_at(NONCE_LEN);
        let payload = Payload { msg: ciphertext, aad: &[] };
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce_bytes), payload)
            .map_err(|_| RadDbError::Decryption("AES-GCM decryption failed".to_string()))?;

        let data: HashMap<String, Vec<u8>> = bincode::deserialize(&plaintext)
            .map_err(|e| RadDbError::Serialization(e.to_string()))?;

        *self.write_cache()? = data;
        Ok(())
    }

    fn persist(&self, cache: &HashMap<String, Vec<u8>>) -> Result<(), RadDbError> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let plaintext =
            bincode::serialize(cache).map_err(|e| RadDbError::Serialization(e.to_string()))?;

        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);
        let payload = Payload { msg: &plaintext, aad: &[] };
        let ciphertext = self
            .cipher
            .encrypt(Nonce::from_slice(&nonce_bytes), payload)
            .map_err(|_| RadDbError::Encryption("AES-GCM encryption failed".to_string()))?;

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        // write-then-rename so a crash never leaves a half-written file
        let tmp = path.with_extension("tmp");
        let mut file = OpenOptions::new().write(true).create(true).truncate(true).open(&tmp)?;
        file.write_all(&nonce_bytes)?;
        file.write_all(&ciphertext)?;
        file.sync_all()?;
        std::fs::rename(&tmp, path)?;

        Ok(())
    }

    /// Write the current contents to disk
    pub fn flush(&self) -> Result<(), RadDbError> {
        let cache = self.read_cache()?;
        self.persist(&cache)
    }

    pub fn get(&self, key: &str) -> Result<Option<Vec<u8>>, RadDbError> {
        Ok(self.read_cache()?.get(key).cloned())
    }

    pub fn contains_key(&self, key: &str) -> Result<bool, RadDbError> {
        Ok(self.read_cache()?.contains_key(key))
    }

    pub fn set(&self, key: String, value: Vec<u8>) -> Result<(), RadDbError> {
        let mut cache = self.write_cache()?;
        cache.insert(key, value);
        self.persist(&cache)
    }

    /// Insert every entry and write the file once
    pub fn set_many<I>(&self, entries: I) -> Result<(), RadDbError>
    where
        I: IntoIterator<Item = (String, Vec<u8>)>,
    {
        let mut cache = self.write_cache()?;
        cache.extend(entries);
        self.persist(&cache)
    }

    /// Returns whether the key existed
    pub fn remove(&self, key: &str) -> Result<bool, RadDbError> {
        let mut cache = self.write_cache()?;
        let existed = cache.remove(key).is_some();
        if existed {
            self.persist(&cache)?;
        }
        Ok(existed)
    }
}

impl Drop for RadDB {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}
