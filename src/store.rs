use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::warn;

use crate::error::{CaError, Result};

pub const CERTS_DIR: &str = "certs";
pub const KEYS_DIR: &str = "keys";

const ROOT_NAME: &str = "ca";
const ROOT_PRIVATE_KEY_SUFFIX: &str = ".private.key";
const LEAF_PRIVATE_KEY_SUFFIX: &str = ".key";
const PUBLIC_KEY_SUFFIX: &str = ".public.key";
const CERT_SUFFIX: &str = ".pem";

#[cfg(unix)]
const PRIVATE_KEY_MODE: u32 = 0o600;
#[cfg(unix)]
const PUBLIC_FILE_MODE: u32 = 0o644;

/// Name under which one certificate and its key pair are stored.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StorageKey {
    name: String,
    private_key_suffix: &'static str,
}

impl StorageKey {
    /// `certs/ca.pem`, `keys/ca.private.key`, `keys/ca.public.key`.
    pub fn root() -> Self {
        StorageKey {
            name: ROOT_NAME.to_string(),
            private_key_suffix: ROOT_PRIVATE_KEY_SUFFIX,
        }
    }

    /// `certs/<host>.pem`, `keys/<host>.key`, `keys/<host>.public.key`,
    /// with every `*` in the host replaced by `_`.
    pub fn for_host(host: &str) -> Self {
        // Separators are mapped too so a name can never leave its directory.
        let name = host.replace(['*', '/', '\\'], "_");
        StorageKey {
            name,
            private_key_suffix: LEAF_PRIVATE_KEY_SUFFIX,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// PEM documents stored under one [`StorageKey`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredMaterial {
    pub certificate_pem: String,
    pub private_key_pem: String,
    pub public_key_pem: String,
}

/// Locations of the artifacts stored under one [`StorageKey`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub certificate: PathBuf,
    pub private_key: PathBuf,
    pub public_key: PathBuf,
}

/// Directory-backed store of PEM certificates and keys.
///
/// Layout: `<base>/certs/<name>.pem` and `<base>/keys/<name>{.key,.public.key}`.
#[derive(Debug, Clone)]
pub struct KeyMaterialStore {
    base_dir: PathBuf,
}

impl KeyMaterialStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        KeyMaterialStore {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn certs_dir(&self) -> PathBuf {
        self.base_dir.join(CERTS_DIR)
    }

    pub fn keys_dir(&self) -> PathBuf {
        self.base_dir.join(KEYS_DIR)
    }

    /// Creates the base, `certs` and `keys` directories. Existing directories are fine.
    pub fn ensure_layout(&self) -> Result<()> {
        for dir in [self.base_dir.clone(), self.certs_dir(), self.keys_dir()] {
            fs::create_dir_all(&dir).map_err(|e| CaError::StorageInit {
                path: dir.display().to_string(),
                reason: e.to_string(),
            })?;
        }
        Ok(())
    }

    pub fn paths(&self, key: &StorageKey) -> ArtifactPaths {
        let keys_dir = self.keys_dir();
        ArtifactPaths {
            certificate: self.certs_dir().join(format!("{}{CERT_SUFFIX}", key.name)),
            private_key: keys_dir.join(format!("{}{}", key.name, key.private_key_suffix)),
            public_key: keys_dir.join(format!("{}{PUBLIC_KEY_SUFFIX}", key.name)),
        }
    }

    /// Reads all three artifacts; `NotFound` if any is missing or unreadable.
    pub fn load(&self, key: &StorageKey) -> Result<StoredMaterial> {
        let paths = self.paths(key);
        Ok(StoredMaterial {
            certificate_pem: read_artifact(&paths.certificate)?,
            private_key_pem: read_artifact(&paths.private_key)?,
            public_key_pem: read_artifact(&paths.public_key)?,
        })
    }

    /// Replaces all three artifacts as one unit.
    ///
    /// Every document is written and flushed to a temporary sibling first.
    /// Only once all three are staged are they renamed into place, private key
    /// first and certificate last. If a rename fails, the artifacts already
    /// replaced are put back to their previous contents.
    pub fn save(&self, key: &StorageKey, material: &StoredMaterial) -> Result<ArtifactPaths> {
        let paths = self.paths(key);
        let artifacts = [
            (&paths.private_key, &material.private_key_pem, true),
            (&paths.public_key, &material.public_key_pem, false),
            (&paths.certificate, &material.certificate_pem, false),
        ];

        let mut staged = Vec::with_capacity(artifacts.len());
        for (path, contents, private) in artifacts {
            let temp = stage(path, contents.as_bytes(), private)
                .map_err(|e| persistence_error(path, &e))?;
            staged.push((path, private, temp));
        }

        // Unpersisted temporary files are deleted when dropped.
        let mut committed = Vec::with_capacity(staged.len());
        for (path, private, temp) in staged {
            let previous = fs::read(path).ok();
            if let Err(e) = temp.persist(path) {
                roll_back(&committed);
                return Err(persistence_error(path, &e.error));
            }
            committed.push((path.as_path(), private, previous));
        }
        Ok(paths)
    }
}

fn read_artifact(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| CaError::NotFound(format!("{}: {e}", path.display())))
}

fn persistence_error(path: &Path, err: &io::Error) -> CaError {
    CaError::Persistence {
        path: path.display().to_string(),
        reason: err.to_string(),
    }
}

/// Writes `contents` to a flushed temporary file next to `path`.
fn stage(path: &Path, contents: &[u8], private: bool) -> io::Result<NamedTempFile> {
    let dir = path
        .parent()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no parent"))?;

    let mut builder = tempfile::Builder::new();
    builder.prefix(".").suffix(".tmp");
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = if private { PRIVATE_KEY_MODE } else { PUBLIC_FILE_MODE };
        builder.permissions(fs::Permissions::from_mode(mode));
    }
    #[cfg(not(unix))]
    let _ = private;

    let mut temp = builder.tempfile_in(dir)?;
    temp.write_all(contents)?;
    temp.as_file().sync_all()?;
    Ok(temp)
}

/// Restores artifacts replaced by a save that could not complete. Files that
/// did not exist before are removed.
fn roll_back(committed: &[(&Path, bool, Option<Vec<u8>>)]) {
    for (path, private, previous) in committed.iter().rev() {
        let restored = match previous {
            Some(contents) => stage(path, contents, *private)
                .and_then(|temp| temp.persist(path).map(drop).map_err(|e| e.error)),
            None => fs::remove_file(path),
        };
        if let Err(e) = restored {
            warn!(path = %path.display(), error = %e, "could not restore artifact after failed save");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn material(tag: &str) -> StoredMaterial {
        StoredMaterial {
            certificate_pem: format!("cert {tag}"),
            private_key_pem: format!("private {tag}"),
            public_key_pem: format!("public {tag}"),
        }
    }

    #[test]
    fn test_ensure_layout_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = KeyMaterialStore::new(dir.path().join("nested").join("ca"));
        store.ensure_layout().unwrap();
        store.ensure_layout().unwrap();
        assert!(store.certs_dir().is_dir());
        assert!(store.keys_dir().is_dir());
    }

    #[test]
    fn test_ensure_layout_reports_blocked_path() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        fs::write(&blocker, b"x").unwrap();
        let err = KeyMaterialStore::new(&blocker).ensure_layout().unwrap_err();
        assert!(matches!(err, CaError::StorageInit { .. }));
    }

    #[test]
    fn test_root_and_host_file_names() {
        let store = KeyMaterialStore::new("/base");
        let root = store.paths(&StorageKey::root());
        assert_eq!(root.certificate, PathBuf::from("/base/certs/ca.pem"));
        assert_eq!(root.private_key, PathBuf::from("/base/keys/ca.private.key"));
        assert_eq!(root.public_key, PathBuf::from("/base/keys/ca.public.key"));

        let host = store.paths(&StorageKey::for_host("*.example.com"));
        assert_eq!(host.certificate, PathBuf::from("/base/certs/_.example.com.pem"));
        assert_eq!(host.private_key, PathBuf::from("/base/keys/_.example.com.key"));
        assert_eq!(host.public_key, PathBuf::from("/base/keys/_.example.com.public.key"));
    }

    #[test]
    fn test_storage_key_never_contains_wildcards_or_separators() {
        assert_eq!(StorageKey::for_host("*.*.example.com").name(), "_._.example.com");
        assert_eq!(StorageKey::for_host("../etc/passwd").name(), ".._etc_passwd");
    }

    #[test]
    fn test_save_then_load_and_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let store = KeyMaterialStore::new(dir.path());
        store.ensure_layout().unwrap();
        let key = StorageKey::for_host("a.test");

        store.save(&key, &material("one")).unwrap();
        store.save(&key, &material("two")).unwrap();
        assert_eq!(store.load(&key).unwrap(), material("two"));

        assert!(temp_leftovers(&store.keys_dir()).is_empty());
    }

    fn temp_leftovers(dir: &Path) -> Vec<String> {
        fs::read_dir(dir)
            .unwrap()
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .filter(|name| name.ends_with(".tmp"))
            .collect()
    }

    #[test]
    fn test_failed_commit_restores_previous_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let store = KeyMaterialStore::new(dir.path());
        store.ensure_layout().unwrap();
        let key = StorageKey::for_host("a.test");
        let paths = store.save(&key, &material("one")).unwrap();

        // A non-empty directory cannot be replaced by a rename.
        fs::remove_file(&paths.public_key).unwrap();
        fs::create_dir(&paths.public_key).unwrap();
        fs::write(paths.public_key.join("occupied"), b"x").unwrap();

        let err = store.save(&key, &material("two")).unwrap_err();
        assert!(matches!(err, CaError::Persistence { .. }));
        assert_eq!(fs::read_to_string(&paths.private_key).unwrap(), "private one");
        assert_eq!(fs::read_to_string(&paths.certificate).unwrap(), "cert one");
        assert!(temp_leftovers(&store.keys_dir()).is_empty());
        assert!(temp_leftovers(&store.certs_dir()).is_empty());
    }

    #[test]
    fn test_failed_commit_removes_artifacts_that_did_not_exist() {
        let dir = tempfile::tempdir().unwrap();
        let store = KeyMaterialStore::new(dir.path());
        store.ensure_layout().unwrap();
        let key = StorageKey::for_host("b.test");
        let paths = store.paths(&key);

        fs::create_dir(&paths.certificate).unwrap();
        fs::write(paths.certificate.join("occupied"), b"x").unwrap();

        assert!(store.save(&key, &material("new")).is_err());
        assert!(!paths.private_key.exists());
        assert!(!paths.public_key.exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_private_key_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let store = KeyMaterialStore::new(dir.path());
        store.ensure_layout().unwrap();
        let paths = store.save(&StorageKey::root(), &material("root")).unwrap();
        let mode = fs::metadata(&paths.private_key).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, PRIVATE_KEY_MODE);
    }

    #[test]
    fn test_load_missing_artifact_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = KeyMaterialStore::new(dir.path());
        store.ensure_layout().unwrap();
        let key = StorageKey::root();
        let paths = store.save(&key, &material("root")).unwrap();
        fs::remove_file(paths.public_key).unwrap();

        assert!(matches!(store.load(&key), Err(CaError::NotFound(_))));
    }

    #[test]
    fn test_save_into_missing_layout_is_persistence_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = KeyMaterialStore::new(dir.path().join("absent"));
        let err = store.save(&StorageKey::root(), &material("x")).unwrap_err();
        assert!(matches!(err, CaError::Persistence { .. }));
    }
}
