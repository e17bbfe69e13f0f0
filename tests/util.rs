#![allow(dead_code)]

use std::path::Path;

use certmint::ca::CertificateAuthority;
use certmint::config::CaConfig;
use tempfile::TempDir;

/// Configuration with small keys so tests do not spend their time in RSA
/// key generation.
pub fn fast_config(storage_dir: &Path) -> CaConfig {
    CaConfig::builder()
        .storage_dir(storage_dir)
        .root_key_bits(1024)
        .leaf_key_bits(1024)
        .build()
}

/// A fresh authority in its own scratch directory.
pub fn scratch_ca() -> (TempDir, CertificateAuthority) {
    let dir = tempfile::tempdir().unwrap();
    let ca = CertificateAuthority::new(fast_config(dir.path())).unwrap();
    (dir, ca)
}
