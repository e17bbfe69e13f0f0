mod util;

use std::fs;

use certmint::ca::CertificateAuthority;
use certmint::cert::extensions::{
    BasicConstraints, ExtendedKeyUsage, ExtendedKeyUsageOption, KeyUsage, KeyUsages,
    NetscapeCertType, SubjectKeyIdentifier,
};
use certmint::cert::params::Validity;
use certmint::config::CaConfig;
use certmint::error::{CaError, Result};
use time::OffsetDateTime;

/// A fresh storage directory gets a generated root and all three artifacts.
#[test]
fn fresh_storage_generates_root() -> Result<()> {
    let (dir, ca) = util::scratch_ca();

    for artifact in ["certs/ca.pem", "keys/ca.private.key", "keys/ca.public.key"] {
        assert!(dir.path().join(artifact).is_file(), "{artifact} missing");
    }
    let location = ca.root_certificate_location();
    assert!(location.ends_with("ca.pem"));
    assert_eq!(fs::read_to_string(location).unwrap(), ca.root().certificate_pem());
    Ok(())
}

/// Constructing twice against the same storage loads the first root instead
/// of generating another one.
#[test]
fn reload_returns_identical_root() -> Result<()> {
    let dir = tempfile::tempdir().unwrap();
    let first = CertificateAuthority::new(util::fast_config(dir.path()))?;
    let second = CertificateAuthority::new(util::fast_config(dir.path()))?;

    let a = first.root().certificate();
    let b = second.root().certificate();
    assert_eq!(a.subject()?, b.subject()?);
    assert_eq!(a.issuer()?, b.issuer()?);
    assert_eq!(a.serial_number()?, b.serial_number()?);
    assert_eq!(a.validity()?, b.validity()?);
    assert_eq!(first.root().certificate_pem(), second.root().certificate_pem());
    assert_eq!(first.root().public_key(), second.root().public_key());
    Ok(())
}

/// The root is self-issued and its signature verifies against its own key.
#[test]
fn root_is_self_signed() -> Result<()> {
    let (_dir, ca) = util::scratch_ca();
    let root = ca.root().certificate();

    assert_eq!(root.issuer()?, root.subject()?);
    assert!(root.is_self_issued());
    root.verify_signed_by(&root.public_key()?)?;
    root.verify_signed_by(ca.root().public_key())?;
    Ok(())
}

/// Subject attributes and extensions of the generated root.
#[test]
fn root_carries_ca_profile() -> Result<()> {
    let (_dir, ca) = util::scratch_ca();
    let root = ca.root().certificate();

    let subject = root.subject()?;
    assert_eq!(subject, CaConfig::default_ca_subject());
    assert_eq!(subject.organization_unit.as_deref(), Some("CA"));

    let basic_constraints: BasicConstraints = root.extension()?.unwrap();
    assert!(basic_constraints.is_ca);

    let key_usage: KeyUsage = root.extension()?.unwrap();
    assert!(key_usage.contains(KeyUsages::KeyCertSign));
    assert!(key_usage.contains(KeyUsages::DigitalSignature));
    assert!(key_usage.contains(KeyUsages::KeyEncipherment));
    assert!(key_usage.contains(KeyUsages::DataEncipherment));
    assert!(!key_usage.contains(KeyUsages::NonRepudiation));

    let extended: ExtendedKeyUsage = root.extension()?.unwrap();
    assert_eq!(
        extended.usage,
        vec![
            ExtendedKeyUsageOption::ServerAuth,
            ExtendedKeyUsageOption::ClientAuth,
            ExtendedKeyUsageOption::CodeSigning,
            ExtendedKeyUsageOption::EmailProtection,
            ExtendedKeyUsageOption::TimeStamping,
        ]
    );

    let cert_type: NetscapeCertType = root.extension()?.unwrap();
    assert!(cert_type.ssl_ca && cert_type.email_ca && cert_type.obj_ca);
    assert!(cert_type.client && cert_type.server && cert_type.email && cert_type.objsign);

    let key_id: SubjectKeyIdentifier = root.extension()?.unwrap();
    assert_eq!(key_id, SubjectKeyIdentifier::derive(ca.root().public_key())?);
    Ok(())
}

/// The root is valid for exactly ten calendar years from generation.
#[test]
fn root_validity_spans_ten_years() -> Result<()> {
    let before = OffsetDateTime::now_utc();
    let (_dir, ca) = util::scratch_ca();
    let after = OffsetDateTime::now_utc();

    let validity = ca.root().certificate().validity()?;
    assert!(validity.not_before >= before - time::Duration::seconds(1));
    assert!(validity.not_before <= after);
    assert_eq!(
        validity.not_after,
        Validity::starting_at(validity.not_before, 10)?.not_after
    );
    Ok(())
}

/// Default settings produce a 2048-bit root.
#[test]
fn default_root_key_is_2048_bits() -> Result<()> {
    let dir = tempfile::tempdir().unwrap();
    let ca = CertificateAuthority::construct(dir.path())?;
    let pem = fs::read_to_string(dir.path().join("keys/ca.private.key")).unwrap();
    let key = certmint::key::KeyPair::from_private_key_pem(&pem)?;
    assert_eq!(key.bits(), 2048);
    assert_eq!(key.public_key(), ca.root().public_key());
    Ok(())
}

/// A corrupt certificate on disk is replaced by a newly generated root.
#[test]
fn corrupt_root_is_regenerated() -> Result<()> {
    let dir = tempfile::tempdir().unwrap();
    let first = CertificateAuthority::new(util::fast_config(dir.path()))?;
    let cert_path = first.root_certificate_location().to_path_buf();
    fs::write(&cert_path, "-----BEGIN CERTIFICATE-----\ngarbage\n-----END CERTIFICATE-----\n")
        .unwrap();

    let second = CertificateAuthority::new(util::fast_config(dir.path()))?;
    assert_ne!(first.root().public_key(), second.root().public_key());
    assert_eq!(
        fs::read_to_string(&cert_path).unwrap(),
        second.root().certificate_pem()
    );

    let third = CertificateAuthority::new(util::fast_config(dir.path()))?;
    assert_eq!(second.root().certificate_pem(), third.root().certificate_pem());
    Ok(())
}

/// A missing key file counts as absent root material.
#[test]
fn missing_root_key_is_regenerated() -> Result<()> {
    let dir = tempfile::tempdir().unwrap();
    let first = CertificateAuthority::new(util::fast_config(dir.path()))?;
    fs::remove_file(dir.path().join("keys/ca.private.key")).unwrap();

    let second = CertificateAuthority::new(util::fast_config(dir.path()))?;
    assert_ne!(first.root().public_key(), second.root().public_key());
    assert!(dir.path().join("keys/ca.private.key").is_file());
    Ok(())
}

/// Without a usable storage location no root can be persisted, which is fatal.
#[test]
fn unwritable_storage_aborts_construction() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("not-a-directory");
    fs::write(&blocker, b"x").unwrap();

    let err = CertificateAuthority::new(util::fast_config(&blocker)).unwrap_err();
    assert!(matches!(err, CaError::Persistence { .. }), "{err}");
}

/// Invalid settings are rejected before touching storage.
#[test]
fn invalid_config_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let config = CaConfig::builder()
        .storage_dir(dir.path())
        .root_key_bits(128)
        .build();
    assert!(matches!(
        CertificateAuthority::new(config),
        Err(CaError::InvalidInput(_))
    ));
    assert!(!dir.path().join("certs").exists());
}
