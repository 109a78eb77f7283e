//! Encrypted-at-rest key-value file.
//!
//! The whole map is serialized as JSON and sealed with ChaCha20-Poly1305
//! under a fresh random nonce on every write. On disk the file is
//! `nonce (12 bytes) || ciphertext`. Writes go to a temp file that is then
//! renamed over the store, and the in-memory map is only swapped after the
//! rename succeeds, so readers always see a complete record.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use anyhow::{anyhow, bail, Context, Result};
use argon2::Argon2;
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use keyring::Entry;
use rand::rngs::OsRng;
use rand::RngCore;
use tracing::{debug, warn};

const STORE_FILE: &str = "secure_prefs.bin";
const SALT_FILE: &str = "secure_prefs.salt";
const KEYRING_USER: &str = "master-key";

const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;
const SALT_LEN: usize = 16;

/// Where the 256-bit master key comes from.
#[derive(Clone)]
pub enum KeySource {
    /// Random key generated on first use and kept in the OS keychain.
    Keyring { service: String },
    /// Key derived from a passphrase with Argon2id and a persisted salt.
    Passphrase(String),
    /// Caller-supplied key, for ephemeral stores and tests.
    Key([u8; KEY_LEN]),
}

impl std::fmt::Debug for KeySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeySource::Keyring { service } => {
                f.debug_struct("Keyring").field("service", service).finish()
            }
            KeySource::Passphrase(_) => f.write_str("Passphrase(..)"),
            KeySource::Key(_) => f.write_str("Key(..)"),
        }
    }
}

impl KeySource {
    fn resolve(&self, dir: &Path) -> Result<[u8; KEY_LEN]> {
        match self {
            KeySource::Key(key) => Ok(*key),
            KeySource::Passphrase(passphrase) => {
                let salt = load_or_create_salt(&dir.join(SALT_FILE))?;
                let mut key = [0u8; KEY_LEN];
                Argon2::default()
                    .hash_password_into(passphrase.as_bytes(), &salt, &mut key)
                    .map_err(|e| anyhow!("Failed to derive store key: {}", e))?;
                Ok(key)
            }
            KeySource::Keyring { service } => {
                let entry = Entry::new(service, KEYRING_USER)
                    .context("Failed to create keyring entry")?;
                match entry.get_password() {
                    Ok(hex) => decode_hex(&hex).context("Master key in keychain is corrupt"),
                    Err(keyring::Error::NoEntry) => {
                        let mut key = [0u8; KEY_LEN];
                        OsRng.fill_bytes(&mut key);
                        entry
                            .set_password(&encode_hex(&key))
                            .context("Failed to store master key in keychain")?;
                        debug!(service = %service, "Generated new master key");
                        Ok(key)
                    }
                    Err(e) => Err(e).context("Failed to read master key from keychain"),
                }
            }
        }
    }
}

fn load_or_create_salt(path: &Path) -> Result<Vec<u8>> {
    if path.exists() {
        let salt = std::fs::read(path).context("Failed to read store salt")?;
        if salt.len() >= SALT_LEN {
            return Ok(salt);
        }
        warn!("Store salt is too short, generating a new one");
    }
    let mut salt = vec![0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);
    std::fs::write(path, &salt).context("Failed to write store salt")?;
    Ok(salt)
}

fn encode_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

fn decode_hex(hex: &str) -> Result<[u8; KEY_LEN]> {
    let hex = hex.trim();
    if hex.len() != KEY_LEN * 2 || !hex.is_ascii() {
        bail!("expected {} hex characters", KEY_LEN * 2);
    }
    let mut key = [0u8; KEY_LEN];
    for (i, byte) in key.iter_mut().enumerate() {
        *byte = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16)?;
    }
    Ok(key)
}

pub struct SecureStore {
    path: PathBuf,
    cipher: ChaCha20Poly1305,
    entries: RwLock<BTreeMap<String, String>>,
}

impl SecureStore {
    /// Open (or create) the store in `dir`.
    ///
    /// A store file that cannot be decrypted or parsed is logged and treated
    /// as empty; it is overwritten by the next write.
    pub fn open(dir: &Path, key_source: &KeySource) -> Result<Self> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create store directory {}", dir.display()))?;

        let key = key_source.resolve(dir)?;
        let cipher = ChaCha20Poly1305::new(Key::from_slice(&key));
        let path = dir.join(STORE_FILE);

        let entries = match Self::read_entries(&path, &cipher) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(error = %e, "Secure store unreadable, starting empty");
                BTreeMap::new()
            }
        };
        debug!(path = %path.display(), keys = entries.len(), "Secure store opened");

        Ok(Self {
            path,
            cipher,
            entries: RwLock::new(entries),
        })
    }

    fn read_entries(path: &Path, cipher: &ChaCha20Poly1305) -> Result<BTreeMap<String, String>> {
        if !path.exists() {
            return Ok(BTreeMap::new());
        }
        let bytes = std::fs::read(path).context("Failed to read secure store")?;
        if bytes.len() < NONCE_LEN {
            bail!("secure store file is truncated");
        }
        let (nonce, ciphertext) = bytes.split_at(NONCE_LEN);
        let plaintext = cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| anyhow!("Failed to decrypt secure store"))?;
        serde_json::from_slice(&plaintext).context("Failed to parse secure store")
    }

    fn write_entries(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        let plaintext = serde_json::to_vec(entries)?;
        let mut nonce = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce);
        let ciphertext = self
            .cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext.as_ref())
            .map_err(|_| anyhow!("Failed to encrypt secure store"))?;

        let mut bytes = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        bytes.extend_from_slice(&nonce);
        bytes.extend_from_slice(&ciphertext);

        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, &bytes).context("Failed to write secure store")?;
        std::fs::rename(&tmp, &self.path).context("Failed to replace secure store")?;
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(key)
    }

    /// Apply `f` to a copy of the map, persist it, then publish it.
    /// If persisting fails the previous contents stay in place.
    pub fn edit(&self, f: impl FnOnce(&mut BTreeMap<String, String>)) -> Result<()> {
        let mut guard = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let mut next = guard.clone();
        f(&mut next);
        if next == *guard {
            return Ok(());
        }
        self.write_entries(&next)?;
        *guard = next;
        Ok(())
    }
}
