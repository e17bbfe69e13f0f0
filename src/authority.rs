//! The root identity of the authority: load it from storage or mint a new one.

use std::path::{Path, PathBuf};

use tracing::{info, warn};
use x509_cert::name::Name;

use crate::cert::Certificate;
use crate::cert::extensions::{BasicConstraints, ExtensionProfile};
use crate::cert::params::Validity;
use crate::config::CaConfig;
use crate::error::{CaError, Result};
use crate::issuer::{Issuer, SelfIssuer, sign_with_key};
use crate::key::{KeyPair, PublicKey};
use crate::serial::SerialNumberGenerator;
use crate::store::{KeyMaterialStore, StorageKey, StoredMaterial};
use crate::tbs_certificate::TbsCertificate;

/// The root key pair together with its self-signed certificate.
#[derive(Debug, Clone)]
pub struct RootIdentity {
    pub certificate: Certificate,
    key: KeyPair,
}

impl RootIdentity {
    /// Rebuilds a root from its stored PEM documents.
    ///
    /// The certificate must be self-issued, carry the stored key, and verify
    /// against it; anything else is a [`CaError::Load`].
    pub fn from_material(material: &StoredMaterial) -> Result<Self> {
        let load_error = |what: &str, e: CaError| CaError::Load(format!("{what}: {e}"));

        let certificate =
            Certificate::from_pem(&material.certificate_pem).map_err(|e| load_error("certificate", e))?;
        let key = KeyPair::from_private_key_pem(&material.private_key_pem)
            .map_err(|e| load_error("private key", e))?;
        let public_key = PublicKey::from_pem(&material.public_key_pem)
            .map_err(|e| load_error("public key", e))?;

        if &public_key != key.public_key() {
            return Err(CaError::Load(
                "public key does not belong to the private key".to_string(),
            ));
        }
        let certified_key = certificate
            .public_key()
            .map_err(|e| load_error("certificate key", e))?;
        if &certified_key != key.public_key() {
            return Err(CaError::Load(
                "certificate was not issued for the stored key".to_string(),
            ));
        }
        if !certificate.is_self_issued() {
            return Err(CaError::Load("certificate is not self-issued".to_string()));
        }
        certificate
            .verify_signed_by(key.public_key())
            .map_err(|e| load_error("self-signature", e))?;
        let is_ca = certificate
            .extension::<BasicConstraints>()
            .map_err(|e| load_error("basic constraints", e))?
            .is_some_and(|bc| bc.is_ca);
        if !is_ca {
            return Err(CaError::Load("certificate is not a CA".to_string()));
        }

        Ok(RootIdentity { certificate, key })
    }

    /// Generates a fresh key pair and self-signs a root certificate for it.
    pub fn generate(config: &CaConfig) -> Result<Self> {
        let generation_error = |e: CaError| CaError::Generation(e.to_string());

        let key = KeyPair::generate_rsa(config.root_key_bits)?;
        let name = config.ca_subject.as_x509_name().map_err(generation_error)?;
        let self_issuer = SelfIssuer::new(&name, &key);

        let tbs = TbsCertificate::builder()
            .serial_number(SerialNumberGenerator::new().next_serial())
            .issuer(self_issuer.issuer_name().clone())
            .subject(name.clone())
            .validity(Validity::for_years(config.root_validity_years).map_err(generation_error)?)
            .subject_public_key(key.public_key().clone())
            .extensions(
                ExtensionProfile::ROOT
                    .render(key.public_key(), None)
                    .map_err(generation_error)?,
            )
            .build();
        let certificate = self_issuer.sign(&tbs).map_err(generation_error)?;

        Ok(RootIdentity { certificate, key })
    }

    pub fn public_key(&self) -> &PublicKey {
        self.key.public_key()
    }

    pub fn to_material(&self) -> Result<StoredMaterial> {
        Ok(StoredMaterial {
            certificate_pem: self.certificate.to_pem()?,
            private_key_pem: self.key.private_key_pem()?,
            public_key_pem: self.key.public_key().to_pem()?,
        })
    }
}

/// Owner of the root identity. Constructed once, read-only afterwards.
///
/// The private key never leaves this type; other components sign through
/// the [`Issuer`] implementation.
#[derive(Debug)]
pub struct RootAuthority {
    identity: RootIdentity,
    certificate_pem: String,
    certificate_path: PathBuf,
}

impl RootAuthority {
    /// Loads the persisted root from `store`, or generates and persists a new
    /// one when nothing usable is stored.
    ///
    /// Failing to generate or persist a new root is fatal.
    pub fn initialize(store: &KeyMaterialStore, config: &CaConfig) -> Result<Self> {
        if let Err(e) = store.ensure_layout() {
            warn!(error = %e, "could not prepare CA storage");
        }

        match Self::load(store) {
            Ok(authority) => {
                info!(
                    path = %authority.certificate_path.display(),
                    serial = %authority.serial_hex(),
                    "loaded root certificate"
                );
                Ok(authority)
            }
            Err(CaError::NotFound(reason)) => {
                info!(%reason, "no stored root certificate, generating one");
                Self::generate(store, config)
            }
            Err(e) => {
                warn!(error = %e, "stored root material is unusable, generating a new root");
                Self::generate(store, config)
            }
        }
    }

    /// Reads the persisted root material.
    pub fn load(store: &KeyMaterialStore) -> Result<Self> {
        let key = StorageKey::root();
        let material = store.load(&key)?;
        let identity = RootIdentity::from_material(&material)?;
        Ok(RootAuthority {
            identity,
            certificate_pem: material.certificate_pem,
            certificate_path: store.paths(&key).certificate,
        })
    }

    /// Generates a new root and persists it, replacing whatever was stored.
    pub fn generate(store: &KeyMaterialStore, config: &CaConfig) -> Result<Self> {
        let identity = RootIdentity::generate(config)?;
        let material = identity.to_material()?;
        let paths = store.save(&StorageKey::root(), &material)?;

        let authority = RootAuthority {
            identity,
            certificate_pem: material.certificate_pem,
            certificate_path: paths.certificate,
        };
        info!(
            subject = %config.ca_subject,
            serial = %authority.serial_hex(),
            path = %authority.certificate_path.display(),
            "generated root certificate"
        );
        Ok(authority)
    }

    pub fn certificate(&self) -> &Certificate {
        &self.identity.certificate
    }

    pub fn certificate_pem(&self) -> &str {
        &self.certificate_pem
    }

    /// Location of `ca.pem`, for distributing the trust anchor.
    pub fn certificate_path(&self) -> &Path {
        &self.certificate_path
    }

    pub fn public_key(&self) -> &PublicKey {
        self.identity.public_key()
    }

    fn serial_hex(&self) -> String {
        self.identity
            .certificate
            .serial_number()
            .map(|serial| serial.to_hex())
            .unwrap_or_default()
    }
}

impl Issuer for RootAuthority {
    fn issuer_name(&self) -> &Name {
        self.identity.certificate.subject_name()
    }

    fn sign(&self, tbs: &TbsCertificate) -> Result<Certificate> {
        if &tbs.issuer != self.issuer_name() {
            return Err(CaError::InvalidInput(
                "certificate issuer does not match the root subject".to_string(),
            ));
        }
        sign_with_key(tbs, &self.identity.key)
    }
}
