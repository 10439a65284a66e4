//! File-backed [`Manager`] with optional encryption at rest.
//!
//! Each user owns one storage namespace holding the reserved password hash,
//! the salt (when encrypted) and whatever the application's [`FilePersist`]
//! writes.

use std::sync::Arc;

use larder_config::StorageConfig;
use larder_storage::reserved::PASSWORD_HASH;
use larder_storage::{
    CryptFileSystem, DirNamespaces, FileSystem, GuardedFileSystem, Namespaces, SharedFileSystem,
    read_file, write_file,
};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::password::PasswordHashing;
use crate::persistence::{Manager, Persist};

/// Application codec for a user's data.
///
/// Receives a file system scoped to one user. Reserved names are refused by
/// that file system, and everything written through it is encrypted when the
/// manager has encryption enabled.
pub trait FilePersist: Send + Sync + 'static {
    /// The in-memory user data. `Default` is the data of a new user.
    type Value: Default + Send + 'static;

    /// Read the data from the user's files.
    fn load(&self, fs: &dyn FileSystem) -> Result<Self::Value>;

    /// Write the data to the user's files.
    fn save(&self, fs: &dyn FileSystem, value: &Self::Value) -> Result<()>;
}

/// Usernames become namespace names, so only letters and digits are allowed.
pub fn validate_username(user: &str) -> Result<()> {
    if user.is_empty() || !user.chars().all(char::is_alphanumeric) {
        return Err(Error::InvalidUsername(user.to_string()));
    }
    Ok(())
}

/// Manager storing users in [`Namespaces`].
pub struct DataManager<P> {
    file_persist: Arc<P>,
    namespaces: Arc<dyn Namespaces>,
    encrypt: bool,
    hashing: PasswordHashing,
}

impl<P> std::fmt::Debug for DataManager<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataManager")
            .field("namespaces", &self.namespaces)
            .field("encrypt", &self.encrypt)
            .finish_non_exhaustive()
    }
}

impl<P: FilePersist> DataManager<P> {
    /// Plain (unencrypted) manager with default hashing cost.
    pub fn new(namespaces: impl Namespaces + 'static, file_persist: P) -> Self {
        Self {
            file_persist: Arc::new(file_persist),
            namespaces: Arc::new(namespaces),
            encrypt: false,
            hashing: PasswordHashing::default(),
        }
    }

    /// Enable or disable encryption of user data.
    pub fn with_encryption(mut self, encrypt: bool) -> Self {
        self.encrypt = encrypt;
        self
    }

    /// Use a specific password hasher for new users.
    pub fn with_password_hashing(mut self, hashing: PasswordHashing) -> Self {
        self.hashing = hashing;
        self
    }

    /// Directory-backed manager as configured.
    pub fn from_config(config: &StorageConfig, file_persist: P) -> Result<Self> {
        let hashing = PasswordHashing::from_config(&config.password_hash)?;
        Ok(Self::new(DirNamespaces::new(&config.root), file_persist)
            .with_encryption(config.encrypt)
            .with_password_hashing(hashing))
    }

    /// Whether user data is encrypted at rest.
    pub fn is_encrypted(&self) -> bool {
        self.encrypt
    }

    /// The salt must exist before the hash: once the hash is written, logins
    /// succeed and every persist handle derives its key from that salt.
    fn init_user(&self, fs: &SharedFileSystem, hash: &str) -> Result<()> {
        if self.encrypt {
            CryptFileSystem::init_salt(fs)?;
        }
        write_file(fs, PASSWORD_HASH, hash.as_bytes())?;
        Ok(())
    }
}

impl<P: FilePersist> Manager for DataManager<P> {
    type Value = P::Value;
    type Persist = UserPersist<P>;

    fn create_user(&self, user: &str, password: &str) -> Result<P::Value> {
        validate_username(user)?;
        let hash = self.hashing.hash(password)?;

        let fs = self.namespaces.create(user).map_err(|e| match e {
            larder_storage::Error::AlreadyExists(_) => Error::UserAlreadyExists(user.to_string()),
            other => Error::Storage(other),
        })?;
        if let Err(e) = self.init_user(&fs, &hash) {
            if let Err(cleanup) = self.namespaces.remove(user) {
                warn!(user = %user, error = %cleanup, "Failed to remove incomplete user");
            }
            return Err(e);
        }

        info!(user = %user, encrypted = self.encrypt, "Created user");
        Ok(P::Value::default())
    }

    fn check_password(&self, user: &str, password: &str) -> bool {
        if validate_username(user).is_err() {
            return false;
        }
        let Ok(fs) = self.namespaces.open(user) else {
            return false;
        };
        let Ok(stored) = read_file(&fs, PASSWORD_HASH) else {
            return false;
        };
        let Ok(stored) = String::from_utf8(stored) else {
            return false;
        };
        self.hashing.verify(password, &stored)
    }

    fn create_persist(&self, user: &str, password: &str) -> Result<UserPersist<P>> {
        validate_username(user).map_err(|_| Error::WrongPassword)?;
        let fs = self.namespaces.open(user).map_err(|e| match e {
            larder_storage::Error::NamespaceNotFound(_) => Error::WrongPassword,
            other => Error::Storage(other),
        })?;

        let fs: SharedFileSystem = if self.encrypt {
            Arc::new(CryptFileSystem::new(fs, password)?)
        } else {
            fs
        };

        Ok(UserPersist {
            user: user.to_string(),
            fs: GuardedFileSystem::new(fs),
            file_persist: Arc::clone(&self.file_persist),
        })
    }
}

/// [`Persist`] handle for one user of a [`DataManager`].
pub struct UserPersist<P> {
    user: String,
    fs: GuardedFileSystem,
    file_persist: Arc<P>,
}

impl<P> UserPersist<P> {
    /// The user this handle is bound to.
    pub fn user(&self) -> &str {
        &self.user
    }
}

impl<P> std::fmt::Debug for UserPersist<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserPersist")
            .field("user", &self.user)
            .finish_non_exhaustive()
    }
}

impl<P: FilePersist> Persist for UserPersist<P> {
    type Value = P::Value;

    fn load(&self) -> Result<P::Value> {
        let value = self.file_persist.load(&self.fs)?;
        debug!(user = %self.user, "Loaded user data");
        Ok(value)
    }

    fn save(&self, value: &P::Value) -> Result<()> {
        self.file_persist.save(&self.fs, value)?;
        debug!(user = %self.user, "Saved user data");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::{self, Write};

    use larder_storage::reserved::SALT;
    use larder_storage::{FileWriter, MemoryNamespaces, read_file};
    use tempfile::TempDir;

    use super::*;

    const ITEMS: &str = "items";

    /// Stores the data as one UTF-8 blob.
    struct TextPersist;

    impl FilePersist for TextPersist {
        type Value = String;

        fn load(&self, fs: &dyn FileSystem) -> Result<String> {
            match read_file(fs, ITEMS) {
                Ok(bytes) => String::from_utf8(bytes).map_err(|e| Error::Persistence(e.to_string())),
                Err(e) if e.is_not_found() => Ok(String::new()),
                Err(e) => Err(e.into()),
            }
        }

        fn save(&self, fs: &dyn FileSystem, value: &String) -> Result<()> {
            Ok(write_file(fs, ITEMS, value.as_bytes())?)
        }
    }

    fn manager(spaces: &MemoryNamespaces, encrypt: bool) -> DataManager<TextPersist> {
        DataManager::new(spaces.clone(), TextPersist)
            .with_encryption(encrypt)
            .with_password_hashing(PasswordHashing::with_params(64, 1, 1).unwrap())
    }

    #[test]
    fn test_validate_username() {
        assert!(validate_username("abc123").is_ok());
        assert!(validate_username("Zoë").is_ok());
        for user in ["", "a#b", "a b", "../x", "a/b", "a.b"] {
            assert!(
                matches!(validate_username(user), Err(Error::InvalidUsername(_))),
                "{user:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_create_user() {
        let spaces = MemoryNamespaces::new();
        let manager = manager(&spaces, false);

        assert!(matches!(
            manager.create_user("a#b", "pass"),
            Err(Error::InvalidUsername(_))
        ));

        let data = manager.create_user("abc123", "pass").unwrap();
        assert_eq!(data, String::new());
        assert!(matches!(
            manager.create_user("abc123", "other"),
            Err(Error::UserAlreadyExists(_))
        ));

        let raw = spaces.get("abc123").unwrap();
        let hash = read_file(&raw, PASSWORD_HASH).unwrap();
        assert!(!hash.windows(4).any(|w| w == b"pass"));
    }

    #[test]
    fn test_check_password() {
        let spaces = MemoryNamespaces::new();
        let manager = manager(&spaces, false);
        manager.create_user("bob", "secret").unwrap();

        assert!(manager.check_password("bob", "secret"));
        assert!(!manager.check_password("bob", "wrong"));
        assert!(!manager.check_password("nobody", "x"));
        assert!(!manager.check_password("../bob", "secret"));
    }

    #[test]
    fn test_check_password_with_corrupt_hash() {
        let spaces = MemoryNamespaces::new();
        let manager = manager(&spaces, false);
        manager.create_user("bob", "secret").unwrap();
        write_file(&spaces.get("bob").unwrap(), PASSWORD_HASH, &[0xff, 0xfe]).unwrap();

        assert!(!manager.check_password("bob", "secret"));
    }

    #[test]
    fn test_create_persist_unknown_user() {
        let manager = manager(&MemoryNamespaces::new(), true);
        assert!(matches!(
            manager.create_persist("nobody", "x"),
            Err(Error::WrongPassword)
        ));
        assert!(matches!(
            manager.create_persist("a#b", "x"),
            Err(Error::WrongPassword)
        ));
    }

    #[test]
    fn test_plain_data_is_readable_at_rest() {
        let spaces = MemoryNamespaces::new();
        let manager = manager(&spaces, false);
        manager.create_user("bob", "secret").unwrap();

        let persist = manager.create_persist("bob", "secret").unwrap();
        persist.save(&"milk, eggs".to_string()).unwrap();

        let raw = spaces.get("bob").unwrap();
        assert_eq!(read_file(&raw, ITEMS).unwrap(), b"milk, eggs");
        assert!(read_file(&raw, SALT).unwrap_err().is_not_found());
        assert_eq!(persist.load().unwrap(), "milk, eggs");
    }

    #[test]
    fn test_encrypted_data_is_opaque_at_rest() {
        let spaces = MemoryNamespaces::new();
        let manager = manager(&spaces, true);
        manager.create_user("bob", "secret").unwrap();

        let persist = manager.create_persist("bob", "secret").unwrap();
        persist.save(&"milk, eggs".to_string()).unwrap();

        let raw = spaces.get("bob").unwrap();
        let stored = read_file(&raw, ITEMS).unwrap();
        assert_ne!(stored, b"milk, eggs");
        assert!(!stored.windows(4).any(|w| w == b"milk"));
        assert!(read_file(&raw, SALT).is_ok());

        let reopened = manager.create_persist("bob", "secret").unwrap();
        assert_eq!(reopened.load().unwrap(), "milk, eggs");
    }

    #[test]
    fn test_encrypted_data_with_wrong_password_fails() {
        let spaces = MemoryNamespaces::new();
        let manager = manager(&spaces, true);
        manager.create_user("bob", "secret").unwrap();
        let persist = manager.create_persist("bob", "secret").unwrap();
        persist.save(&"a".repeat(100)).unwrap();

        let wrong = manager.create_persist("bob", "wrong").unwrap();
        assert!(wrong.load().is_err());
    }

    #[test]
    fn test_salt_is_written_with_the_user() {
        let spaces = MemoryNamespaces::new();
        manager(&spaces, true).create_user("bob", "secret").unwrap();
        manager(&spaces, false).create_user("amy", "secret").unwrap();

        let salt = read_file(&spaces.get("bob").unwrap(), SALT).unwrap();
        assert_eq!(salt.len(), larder_storage::SALT_LEN);
        let plain = read_file(&spaces.get("amy").unwrap(), SALT);
        assert!(plain.unwrap_err().is_not_found());
    }

    #[test]
    fn test_persists_of_one_user_share_a_key() {
        let spaces = MemoryNamespaces::new();
        let manager = manager(&spaces, true);
        manager.create_user("bob", "secret").unwrap();
        let salt = read_file(&spaces.get("bob").unwrap(), SALT).unwrap();

        let first = manager.create_persist("bob", "secret").unwrap();
        let second = manager.create_persist("bob", "secret").unwrap();
        first.save(&"milk".to_string()).unwrap();

        assert_eq!(second.load().unwrap(), "milk");
        assert_eq!(read_file(&spaces.get("bob").unwrap(), SALT).unwrap(), salt);
    }

    /// Memory file system refusing to commit one file.
    #[derive(Debug)]
    struct FailingFileSystem {
        inner: SharedFileSystem,
        fail: &'static str,
    }

    struct FailingWriter;

    impl Write for FailingWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl FileWriter for FailingWriter {
        fn finish(self: Box<Self>) -> larder_storage::Result<()> {
            Err(io::Error::other("disk full").into())
        }
    }

    impl FileSystem for FailingFileSystem {
        fn reader(&self, name: &str) -> larder_storage::Result<Box<dyn io::Read + Send>> {
            self.inner.reader(name)
        }

        fn writer(&self, name: &str) -> larder_storage::Result<Box<dyn FileWriter>> {
            if name == self.fail {
                return Ok(Box::new(FailingWriter));
            }
            self.inner.writer(name)
        }
    }

    /// Namespaces whose new namespaces cannot store `fail` until `heal`.
    #[derive(Debug, Clone)]
    struct FailingNamespaces {
        spaces: MemoryNamespaces,
        fail: &'static str,
        broken: Arc<std::sync::atomic::AtomicBool>,
    }

    impl FailingNamespaces {
        fn new(spaces: &MemoryNamespaces, fail: &'static str) -> Self {
            Self {
                spaces: spaces.clone(),
                fail,
                broken: Arc::new(true.into()),
            }
        }

        fn heal(&self) {
            self.broken.store(false, std::sync::atomic::Ordering::SeqCst);
        }
    }

    impl Namespaces for FailingNamespaces {
        fn create(&self, name: &str) -> larder_storage::Result<SharedFileSystem> {
            let inner = self.spaces.create(name)?;
            if !self.broken.load(std::sync::atomic::Ordering::SeqCst) {
                return Ok(inner);
            }
            Ok(Arc::new(FailingFileSystem {
                inner,
                fail: self.fail,
            }))
        }

        fn open(&self, name: &str) -> larder_storage::Result<SharedFileSystem> {
            self.spaces.open(name)
        }

        fn remove(&self, name: &str) -> larder_storage::Result<()> {
            self.spaces.remove(name)
        }
    }

    fn check_failed_create_is_undone(fail: &'static str) {
        let spaces = MemoryNamespaces::new();
        let failing = FailingNamespaces::new(&spaces, fail);
        let manager = DataManager::new(failing.clone(), TextPersist)
            .with_encryption(true)
            .with_password_hashing(PasswordHashing::with_params(64, 1, 1).unwrap());

        let err = manager.create_user("bob", "secret").unwrap_err();
        assert!(matches!(err, Error::Storage(_)), "{err:?}");
        assert!(spaces.get("bob").is_none());
        assert!(!manager.check_password("bob", "secret"));

        failing.heal();
        manager.create_user("bob", "secret").unwrap();
        assert!(manager.check_password("bob", "secret"));
    }

    #[test]
    fn test_failed_hash_write_removes_namespace() {
        check_failed_create_is_undone(PASSWORD_HASH);
    }

    #[test]
    fn test_failed_salt_write_removes_namespace() {
        check_failed_create_is_undone(SALT);
    }

    /// Tries to write over the password hash.
    struct HashClobber;

    impl FilePersist for HashClobber {
        type Value = ();

        fn load(&self, fs: &dyn FileSystem) -> Result<()> {
            read_file(fs, PASSWORD_HASH)?;
            Ok(())
        }

        fn save(&self, fs: &dyn FileSystem, _: &()) -> Result<()> {
            Ok(write_file(fs, PASSWORD_HASH, b"owned")?)
        }
    }

    #[test]
    fn test_reserved_names_are_blocked() {
        let spaces = MemoryNamespaces::new();
        let manager = DataManager::new(spaces.clone(), HashClobber)
            .with_password_hashing(PasswordHashing::with_params(64, 1, 1).unwrap());
        manager.create_user("bob", "secret").unwrap();
        let persist = manager.create_persist("bob", "secret").unwrap();

        assert!(matches!(
            persist.save(&()),
            Err(Error::Storage(larder_storage::Error::Reserved(_)))
        ));
        assert!(matches!(
            persist.load(),
            Err(Error::Storage(larder_storage::Error::Reserved(_)))
        ));
        assert!(manager.check_password("bob", "secret"));
    }

    #[test]
    fn test_from_config() {
        let dir = TempDir::new().unwrap();
        let config = StorageConfig {
            root: dir.path().join("users"),
            encrypt: true,
            password_hash: larder_config::PasswordHashConfig {
                memory_kib: 64,
                iterations: 1,
                parallelism: 1,
            },
        };
        let manager = DataManager::from_config(&config, TextPersist).unwrap();
        assert!(manager.is_encrypted());

        manager.create_user("bob", "secret").unwrap();
        let persist = manager.create_persist("bob", "secret").unwrap();
        persist.save(&"milk".to_string()).unwrap();

        let user_dir = dir.path().join("users").join("bob");
        assert!(user_dir.join(PASSWORD_HASH).is_file());
        assert!(user_dir.join(SALT).is_file());
        assert_ne!(std::fs::read(user_dir.join(ITEMS)).unwrap(), b"milk");
        assert!(manager.check_password("bob", "secret"));
    }
}
