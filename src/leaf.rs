//! Server certificate issuance under the root authority.

use std::collections::HashMap;
use std::sync::{Arc, LazyLock, Mutex, PoisonError};

use regex::Regex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::authority::RootAuthority;
use crate::cert::Certificate;
use crate::cert::extensions::ExtensionProfile;
use crate::cert::params::{DistinguishedName, Validity};
use crate::config::CaConfig;
use crate::error::{CaError, Result};
use crate::issuer::Issuer;
use crate::key::KeyPair;
use crate::serial::{SerialNumber, SerialNumberGenerator};
use crate::store::{ArtifactPaths, KeyMaterialStore, StorageKey, StoredMaterial};
use crate::tbs_certificate::TbsCertificate;

const MAX_HOST_LEN: usize = 253;

// Lowercase DNS labels, optionally behind a single leading `*.` wildcard.
static HOST_NAME_RE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"^(\*\.)?([a-z0-9_]([a-z0-9_-]{0,61}[a-z0-9_])?\.)*[a-z0-9_]([a-z0-9_-]{0,61}[a-z0-9_])?$")
        .ok()
});

/// One or more DNS names for a single certificate.
///
/// The first name is the primary host: it becomes the subject common name
/// and the storage key. Every name, in order, goes into subjectAltName.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostSet(Vec<String>);

impl HostSet {
    /// Validates and lowercases `hosts`. A trailing root dot is dropped.
    pub fn new<I, S>(hosts: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let hosts = hosts
            .into_iter()
            .map(|host| normalize_host(host.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        if hosts.is_empty() {
            return Err(CaError::InvalidInput(
                "at least one host name is required".to_string(),
            ));
        }
        Ok(HostSet(hosts))
    }

    pub fn primary(&self) -> &str {
        &self.0[0]
    }

    pub fn hosts(&self) -> &[String] {
        &self.0
    }

    pub fn storage_key(&self) -> StorageKey {
        StorageKey::for_host(self.primary())
    }
}

fn normalize_host(host: &str) -> Result<String> {
    let host = host.trim();
    let host = host.strip_suffix('.').unwrap_or(host).to_ascii_lowercase();
    let valid = host.len() <= MAX_HOST_LEN
        && HOST_NAME_RE
            .as_ref()
            .is_some_and(|re| re.is_match(&host));
    if !valid {
        return Err(CaError::InvalidInput(format!("`{host}` is not a valid host name")));
    }
    Ok(host)
}

/// Conversion of a single host name or a list of them into a [`HostSet`].
pub trait IntoHostSet {
    fn into_host_set(self) -> Result<HostSet>;
}

impl IntoHostSet for HostSet {
    fn into_host_set(self) -> Result<HostSet> {
        Ok(self)
    }
}

impl IntoHostSet for &str {
    fn into_host_set(self) -> Result<HostSet> {
        HostSet::new([self])
    }
}

impl IntoHostSet for String {
    fn into_host_set(self) -> Result<HostSet> {
        HostSet::new([self])
    }
}

impl IntoHostSet for &String {
    fn into_host_set(self) -> Result<HostSet> {
        HostSet::new([self])
    }
}

impl<S: AsRef<str>> IntoHostSet for Vec<S> {
    fn into_host_set(self) -> Result<HostSet> {
        HostSet::new(self)
    }
}

impl<S: AsRef<str>> IntoHostSet for &[S] {
    fn into_host_set(self) -> Result<HostSet> {
        HostSet::new(self)
    }
}

impl<S: AsRef<str>, const N: usize> IntoHostSet for [S; N] {
    fn into_host_set(self) -> Result<HostSet> {
        HostSet::new(self)
    }
}

/// What happened when an issued certificate was written to storage.
#[derive(Debug, Clone)]
pub enum PersistenceOutcome {
    Persisted(ArtifactPaths),
    Failed(CaError),
}

impl PersistenceOutcome {
    pub fn is_persisted(&self) -> bool {
        matches!(self, PersistenceOutcome::Persisted(_))
    }
}

/// A freshly signed server certificate and its key.
#[derive(Debug, Clone)]
pub struct IssuedCertificate {
    pub certificate: Certificate,
    pub certificate_pem: String,
    pub private_key_pem: String,
    pub public_key_pem: String,
    pub serial: SerialNumber,
    /// Storage failures do not fail the issuance; they are reported here.
    pub persistence: PersistenceOutcome,
}

/// Mints server certificates signed by the [`RootAuthority`].
#[derive(Debug)]
pub struct LeafIssuer {
    authority: Arc<RootAuthority>,
    store: KeyMaterialStore,
    serials: SerialNumberGenerator,
    subject_template: DistinguishedName,
    key_bits: usize,
    validity_years: u32,
    persist_locks: Mutex<HashMap<StorageKey, Arc<Mutex<()>>>>,
}

impl LeafIssuer {
    pub fn new(authority: Arc<RootAuthority>, store: KeyMaterialStore, config: &CaConfig) -> Self {
        LeafIssuer {
            authority,
            store,
            serials: SerialNumberGenerator::new(),
            subject_template: config.leaf_subject.clone(),
            key_bits: config.leaf_key_bits,
            validity_years: config.leaf_validity_years,
            persist_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn authority(&self) -> &RootAuthority {
        &self.authority
    }

    /// Generates a key, signs a certificate for `hosts` and persists both.
    ///
    /// Blocks for the duration of RSA key generation; use [`LeafIssuer::issue`]
    /// or [`LeafIssuer::issue_with_callback`] from async code.
    pub fn issue_blocking(&self, hosts: &HostSet) -> Result<IssuedCertificate> {
        let key = KeyPair::generate_rsa(self.key_bits)?;
        let serial = self.serials.next_serial();
        let subject = self
            .subject_template
            .with_common_name(hosts.primary())
            .as_x509_name()?;

        let tbs = TbsCertificate::builder()
            .serial_number(serial)
            .issuer(self.authority.issuer_name().clone())
            .subject(subject)
            .validity(Validity::for_years(self.validity_years)?)
            .subject_public_key(key.public_key().clone())
            .extensions(ExtensionProfile::LEAF.render(key.public_key(), Some(hosts.hosts()))?)
            .build();
        let certificate = self.authority.sign(&tbs)?;

        let material = StoredMaterial {
            certificate_pem: certificate.to_pem()?,
            private_key_pem: key.private_key_pem()?,
            public_key_pem: key.public_key().to_pem()?,
        };
        let persistence = self.persist(&hosts.storage_key(), &material);
        debug!(
            host = hosts.primary(),
            names = hosts.hosts().len(),
            %serial,
            persisted = persistence.is_persisted(),
            "issued server certificate"
        );

        Ok(IssuedCertificate {
            certificate,
            certificate_pem: material.certificate_pem,
            private_key_pem: material.private_key_pem,
            public_key_pem: material.public_key_pem,
            serial,
            persistence,
        })
    }

    /// Issues on the blocking thread pool so the caller's task is not held
    /// during key generation and signing.
    pub async fn issue(self: &Arc<Self>, hosts: impl IntoHostSet) -> Result<IssuedCertificate> {
        let hosts = hosts.into_host_set()?;
        let runtime = Handle::try_current().map_err(|e| CaError::Runtime(e.to_string()))?;
        let issuer = Arc::clone(self);
        runtime
            .spawn_blocking(move || issuer.issue_blocking(&hosts))
            .await
            .map_err(|e| CaError::Runtime(e.to_string()))?
    }

    /// Issues in the background and hands the result to `on_complete`.
    /// Invalid host input is reported through the callback as well.
    ///
    /// Outside a Tokio runtime nothing is spawned: `on_complete` receives
    /// [`CaError::Runtime`] right away and `None` is returned.
    pub fn issue_with_callback<H, F>(
        self: &Arc<Self>,
        hosts: H,
        on_complete: F,
    ) -> Option<JoinHandle<()>>
    where
        H: IntoHostSet,
        F: FnOnce(Result<IssuedCertificate>) + Send + 'static,
    {
        let runtime = match Handle::try_current() {
            Ok(runtime) => runtime,
            Err(e) => {
                on_complete(Err(CaError::Runtime(e.to_string())));
                return None;
            }
        };
        let hosts = hosts.into_host_set();
        let issuer = Arc::clone(self);
        Some(runtime.spawn_blocking(move || {
            on_complete(hosts.and_then(|hosts| issuer.issue_blocking(&hosts)));
        }))
    }

    // Writes for one storage key are serialized so the three files on disk
    // always come from the same issuance.
    fn persist(&self, key: &StorageKey, material: &StoredMaterial) -> PersistenceOutcome {
        let lock = {
            let mut locks = self.persist_locks.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(locks.entry(key.clone()).or_default())
        };

        let outcome = {
            let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
            match self.store.save(key, material) {
                Ok(paths) => PersistenceOutcome::Persisted(paths),
                Err(e) => {
                    warn!(storage_key = key.name(), error = %e, "failed to persist server certificate");
                    PersistenceOutcome::Failed(e)
                }
            }
        };

        self.release_persist_lock(key, lock);
        outcome
    }

    // Drops the map entry unless another writer for `key` is waiting on it.
    fn release_persist_lock(&self, key: &StorageKey, lock: Arc<Mutex<()>>) {
        let mut locks = self.persist_locks.lock().unwrap_or_else(PoisonError::into_inner);
        // One reference lives in the map and one is `lock`.
        if Arc::strong_count(&lock) == 2 {
            locks.remove(key);
        }
    }

    /// Number of storage keys with a write in progress or waiting.
    pub fn pending_writes(&self) -> usize {
        self.persist_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_set_normalizes_and_keeps_order() {
        let hosts = HostSet::new(["Example.COM.", "*.example.com"]).unwrap();
        assert_eq!(hosts.hosts(), ["example.com", "*.example.com"]);
        assert_eq!(hosts.primary(), "example.com");
    }

    #[test]
    fn test_single_host_is_one_element_set() {
        let hosts = "a.test".into_host_set().unwrap();
        assert_eq!(hosts.hosts(), ["a.test"]);
        assert_eq!(hosts.storage_key().name(), "a.test");
    }

    #[test]
    fn test_wildcard_primary_storage_key() {
        let hosts = "*.example.com".into_host_set().unwrap();
        assert_eq!(hosts.storage_key().name(), "_.example.com");
    }

    #[test]
    fn test_host_set_rejects_bad_input() {
        assert!(HostSet::new(Vec::<String>::new()).is_err());
        assert!(HostSet::new([""]).is_err());
        assert!(HostSet::new(["exa mple.com"]).is_err());
        assert!(HostSet::new(["a.*.example.com"]).is_err());
        assert!(HostSet::new(["../etc/passwd"]).is_err());
        assert!(HostSet::new(["-bad.example.com"]).is_err());
        assert!(HostSet::new([format!("{}.com", "a".repeat(64))]).is_err());
    }

    #[test]
    fn test_persist_locks_are_released_after_each_write() {
        let dir = tempfile::tempdir().unwrap();
        let config = CaConfig::builder()
            .storage_dir(dir.path())
            .root_key_bits(1024)
            .build();
        let store = KeyMaterialStore::new(dir.path());
        let authority = Arc::new(RootAuthority::initialize(&store, &config).unwrap());
        let issuer = LeafIssuer::new(authority, store, &config);

        for i in 0..20 {
            let hosts = HostSet::new([format!("h{i}.test")]).unwrap();
            let issued = issuer.issue_blocking(&hosts).unwrap();
            assert!(issued.persistence.is_persisted());
        }
        assert_eq!(issuer.pending_writes(), 0);
    }

    #[test]
    fn test_ip_literal_is_accepted_as_name() {
        let hosts = HostSet::new(["127.0.0.1"]).unwrap();
        assert_eq!(hosts.primary(), "127.0.0.1");
    }
}
