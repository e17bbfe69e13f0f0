use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::authority::RootAuthority;
use crate::config::CaConfig;
use crate::error::Result;
use crate::leaf::{IntoHostSet, IssuedCertificate, LeafIssuer};
use crate::store::KeyMaterialStore;

/// A certificate authority backed by a storage directory.
///
/// Construction loads or generates the root, so by the time a value exists
/// the root is ready and issuance may start.
#[derive(Debug, Clone)]
pub struct CertificateAuthority {
    root: Arc<RootAuthority>,
    issuer: Arc<LeafIssuer>,
}

impl CertificateAuthority {
    /// Opens the authority stored at `storage_dir` with default settings.
    pub fn construct(storage_dir: impl Into<PathBuf>) -> Result<Self> {
        Self::new(CaConfig::builder().storage_dir(storage_dir).build())
    }

    pub fn new(config: CaConfig) -> Result<Self> {
        config.validate()?;
        let store = KeyMaterialStore::new(&config.storage_dir);
        let root = Arc::new(RootAuthority::initialize(&store, &config)?);
        let issuer = Arc::new(LeafIssuer::new(Arc::clone(&root), store, &config));
        Ok(CertificateAuthority { root, issuer })
    }

    /// Issues a server certificate for one host name or a list of them and
    /// passes the result to `on_complete` from a blocking worker thread.
    ///
    /// Returns the worker's handle. Called outside a Tokio runtime, it
    /// returns `None` after passing
    /// [`CaError::Runtime`](crate::error::CaError::Runtime) to `on_complete`.
    pub fn issue_server_certificate<H, F>(
        &self,
        hosts: H,
        on_complete: F,
    ) -> Option<JoinHandle<()>>
    where
        H: IntoHostSet,
        F: FnOnce(Result<IssuedCertificate>) + Send + 'static,
    {
        self.issuer.issue_with_callback(hosts, on_complete)
    }

    /// Async form of [`CertificateAuthority::issue_server_certificate`].
    pub async fn issue(&self, hosts: impl IntoHostSet) -> Result<IssuedCertificate> {
        self.issuer.issue(hosts).await
    }

    /// Path of `ca.pem`, the trust anchor clients need to install.
    pub fn root_certificate_location(&self) -> &Path {
        self.root.certificate_path()
    }

    pub fn root(&self) -> &RootAuthority {
        &self.root
    }

    pub fn issuer(&self) -> &Arc<LeafIssuer> {
        &self.issuer
    }
}
