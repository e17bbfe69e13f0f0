use std::path::PathBuf;

use bon::Builder;

use crate::cert::params::DistinguishedName;
use crate::error::{CaError, Result};

/// Smallest RSA modulus accepted for either key.
pub const MIN_KEY_BITS: usize = 512;

/// Configuration of a [`CertificateAuthority`](crate::ca::CertificateAuthority).
///
/// # Fields
/// * `storage_dir` - Base directory holding `certs/` and `keys/`.
/// * `root_key_bits` - RSA modulus size of a generated root key.
/// * `leaf_key_bits` - RSA modulus size of each server key. The 1024-bit
///   default is kept for compatibility with existing deployments; raise it
///   for anything long-lived.
/// * `root_validity_years` - Lifetime of a generated root, in calendar years.
/// * `leaf_validity_years` - Lifetime of a server certificate, in calendar years.
/// * `ca_subject` - Subject (and issuer) of the generated root.
/// * `leaf_subject` - Subject template of server certificates; the common
///   name is replaced by the primary host at issuance.
#[derive(Clone, Debug, Builder)]
pub struct CaConfig {
    #[builder(into)]
    pub storage_dir: PathBuf,
    #[builder(default = 2048)]
    pub root_key_bits: usize,
    #[builder(default = 1024)]
    pub leaf_key_bits: usize,
    #[builder(default = 10)]
    pub root_validity_years: u32,
    #[builder(default = 2)]
    pub leaf_validity_years: u32,
    #[builder(default = CaConfig::default_ca_subject())]
    pub ca_subject: DistinguishedName,
    #[builder(default = CaConfig::default_leaf_subject())]
    pub leaf_subject: DistinguishedName,
}

impl Default for CaConfig {
    fn default() -> Self {
        CaConfig::builder().storage_dir("ca").build()
    }
}

impl CaConfig {
    pub fn default_ca_subject() -> DistinguishedName {
        DistinguishedName::builder()
            .common_name("certmint CA")
            .country("Internet")
            .state("Internet")
            .locality("Internet")
            .organization("certmint CA")
            .organization_unit("CA")
            .build()
    }

    pub fn default_leaf_subject() -> DistinguishedName {
        DistinguishedName::builder()
            .country("Internet")
            .state("Internet")
            .locality("Internet")
            .organization("certmint CA")
            .organization_unit("certmint Server Certificate")
            .build()
    }

    pub fn validate(&self) -> Result<()> {
        for (what, bits) in [("root", self.root_key_bits), ("leaf", self.leaf_key_bits)] {
            if bits < MIN_KEY_BITS {
                return Err(CaError::InvalidInput(format!(
                    "{what} key size {bits} is below {MIN_KEY_BITS} bits"
                )));
            }
        }
        if self.root_validity_years == 0 || self.leaf_validity_years == 0 {
            return Err(CaError::InvalidInput(
                "validity must be at least one year".to_string(),
            ));
        }
        if self
            .ca_subject
            .common_name
            .as_deref()
            .is_none_or(str::is_empty)
        {
            return Err(CaError::InvalidInput(
                "CA subject needs a common name".to_string(),
            ));
        }
        Ok(())
    }
}
