//! Encrypting file system decorator.
//!
//! Every blob written through [`CryptFileSystem`] is stored as
//!
//! ```text
//! [16-byte IV][AES-256-CBC ciphertext]
//! ```
//!
//! where the plaintext is `[u32 LE length][payload][zero padding]`. The key
//! is derived from the user's password and a random per-namespace salt kept
//! unencrypted under [`reserved::SALT`](crate::reserved::SALT). The password
//! itself is never stored.
//!
//! The ciphertext carries no authentication tag: anyone with write access to
//! the underlying storage can flip plaintext bits. See DESIGN.md.

use std::io::{Cursor, Read, Write};
use std::sync::Arc;

use aes::Aes256;
use cbc::cipher::block_padding::NoPadding;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use rand::RngCore;
use sha2::Sha256;
use tracing::debug;
use zeroize::Zeroizing;

use crate::error::{Error, Result};
use crate::fs::{FileSystem, FileWriter, SharedFileSystem, read_file, validate_name, write_file};
use crate::reserved;

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

/// AES block size, also the IV length.
pub const BLOCK_SIZE: usize = 16;

/// Length of the derived AES-256 key.
pub const KEY_LEN: usize = 32;

/// Length of the per-namespace salt.
pub const SALT_LEN: usize = 32;

/// Width of the plaintext length prefix.
const LENGTH_PREFIX: usize = 4;

/// Key derivation parameters.
///
/// Changing any of these makes every existing encrypted store unreadable,
/// so new parameter sets get a new constant instead of editing an old one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfParams {
    /// PBKDF2-HMAC-SHA256 iteration count.
    pub iterations: u32,
}

impl KdfParams {
    /// First on-disk format: PBKDF2-HMAC-SHA256, 4096 iterations.
    pub const V1: KdfParams = KdfParams { iterations: 4096 };

    /// Stretch `password` and `salt` into an AES-256 key.
    pub fn derive_key(&self, password: &str, salt: &[u8]) -> Zeroizing<[u8; KEY_LEN]> {
        let mut key = Zeroizing::new([0u8; KEY_LEN]);
        pbkdf2::pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, self.iterations, &mut key[..]);
        key
    }
}

impl Default for KdfParams {
    fn default() -> Self {
        Self::V1
    }
}

/// Encrypt `plaintext` into the `[IV][ciphertext]` blob format.
pub fn encrypt(plaintext: &[u8], key: &[u8; KEY_LEN]) -> Result<Vec<u8>> {
    let len = u32::try_from(plaintext.len())
        .map_err(|_| Error::Encryption(format!("payload too large: {} bytes", plaintext.len())))?;

    let padded_len = (LENGTH_PREFIX + plaintext.len()).div_ceil(BLOCK_SIZE) * BLOCK_SIZE;
    let mut blob = vec![0u8; BLOCK_SIZE + padded_len];
    rand::rng().fill_bytes(&mut blob[..BLOCK_SIZE]);

    let (iv, body) = blob.split_at_mut(BLOCK_SIZE);
    body[..LENGTH_PREFIX].copy_from_slice(&len.to_le_bytes());
    body[LENGTH_PREFIX..LENGTH_PREFIX + plaintext.len()].copy_from_slice(plaintext);

    let cipher = Aes256CbcEnc::new_from_slices(key, iv)
        .map_err(|e| Error::Encryption(format!("could not create cipher: {e}")))?;
    cipher
        .encrypt_padded_mut::<NoPadding>(body, padded_len)
        .map_err(|e| Error::Encryption(format!("could not encrypt: {e}")))?;

    Ok(blob)
}

/// Decrypt a blob produced by [`encrypt`].
///
/// Fails instead of returning garbage when the blob is malformed or the
/// recovered length prefix does not fit the decrypted data, which is what a
/// wrong key usually produces.
pub fn decrypt(blob: &[u8], key: &[u8; KEY_LEN]) -> Result<Vec<u8>> {
    if blob.len() < BLOCK_SIZE + BLOCK_SIZE {
        return Err(Error::Decryption("ciphertext too short".to_string()));
    }
    let (iv, body) = blob.split_at(BLOCK_SIZE);
    if body.len() % BLOCK_SIZE != 0 {
        return Err(Error::Decryption(
            "ciphertext is not a multiple of the block size".to_string(),
        ));
    }

    let mut body = Zeroizing::new(body.to_vec());
    let cipher = Aes256CbcDec::new_from_slices(key, iv)
        .map_err(|e| Error::Decryption(format!("could not create cipher: {e}")))?;
    let plain = cipher
        .decrypt_padded_mut::<NoPadding>(&mut body)
        .map_err(|e| Error::Decryption(format!("could not decrypt: {e}")))?;

    let mut prefix = [0u8; LENGTH_PREFIX];
    prefix.copy_from_slice(&plain[..LENGTH_PREFIX]);
    let len = u32::from_le_bytes(prefix) as usize;
    let available = plain.len() - LENGTH_PREFIX;
    if len > available {
        return Err(Error::Decryption(format!(
            "length prefix {len} exceeds {available} decrypted bytes"
        )));
    }

    Ok(plain[LENGTH_PREFIX..LENGTH_PREFIX + len].to_vec())
}

/// File system decorator that encrypts on write and decrypts on read.
pub struct CryptFileSystem {
    parent: SharedFileSystem,
    key: Arc<Zeroizing<[u8; KEY_LEN]>>,
}

impl CryptFileSystem {
    /// Wrap `parent`, deriving the key from `password` with [`KdfParams::V1`].
    ///
    /// The salt is read from the parent, or generated and stored on first use.
    pub fn new(parent: SharedFileSystem, password: &str) -> Result<Self> {
        Self::with_params(parent, password, KdfParams::V1)
    }

    /// Store the salt of a new namespace so later instances all derive the
    /// same key. Keeps an existing salt.
    pub fn init_salt(parent: &SharedFileSystem) -> Result<()> {
        load_or_create_salt(parent).map(|_| ())
    }

    /// Wrap `parent` using explicit key derivation parameters.
    pub fn with_params(parent: SharedFileSystem, password: &str, params: KdfParams) -> Result<Self> {
        let salt = load_or_create_salt(&parent)?;
        let key = params.derive_key(password, &salt);
        Ok(Self {
            parent,
            key: Arc::new(key),
        })
    }
}

fn load_or_create_salt(parent: &SharedFileSystem) -> Result<Vec<u8>> {
    let salt = match read_file(parent, reserved::SALT) {
        Ok(salt) => salt,
        Err(e) if e.is_not_found() => {
            let mut salt = vec![0u8; SALT_LEN];
            rand::rng().fill_bytes(&mut salt);
            write_file(parent, reserved::SALT, &salt)?;
            debug!("Generated new encryption salt");
            salt
        }
        Err(e) => return Err(e),
    };

    if salt.len() != SALT_LEN {
        return Err(Error::Decryption(format!(
            "salt has {} bytes, expected {SALT_LEN}",
            salt.len()
        )));
    }
    Ok(salt)
}

impl std::fmt::Debug for CryptFileSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CryptFileSystem")
            .field("parent", &self.parent)
            .finish_non_exhaustive()
    }
}

impl FileSystem for CryptFileSystem {
    fn reader(&self, name: &str) -> Result<Box<dyn Read + Send>> {
        if name == reserved::SALT {
            return Err(Error::Reserved(name.to_string()));
        }
        let blob = read_file(&self.parent, name)?;
        let plain = decrypt(&blob, &self.key)?;
        Ok(Box::new(Cursor::new(plain)))
    }

    fn writer(&self, name: &str) -> Result<Box<dyn FileWriter>> {
        if name == reserved::SALT {
            return Err(Error::Reserved(name.to_string()));
        }
        validate_name(name)?;
        Ok(Box::new(CryptWriter {
            name: name.to_string(),
            buf: Zeroizing::new(Vec::new()),
            parent: Arc::clone(&self.parent),
            key: Arc::clone(&self.key),
        }))
    }
}

struct CryptWriter {
    name: String,
    buf: Zeroizing<Vec<u8>>,
    parent: SharedFileSystem,
    key: Arc<Zeroizing<[u8; KEY_LEN]>>,
}

impl Write for CryptWriter {
    fn write(&mut self, data: &[u8]) -> std::io::Result<usize> {
        self.buf.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl FileWriter for CryptWriter {
    fn finish(self: Box<Self>) -> Result<()> {
        let blob = encrypt(&self.buf, &self.key)?;
        write_file(&self.parent, &self.name, &blob)
    }
}
