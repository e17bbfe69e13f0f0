pub mod extensions;
pub mod params;

use der::asn1::{Any, AnyRef, BitString};
use der::{Decode, DecodePem, Encode, EncodePem};
use extensions::{SubjectAltName, ToAndFromX509Extension};
use params::{DistinguishedName, Validity};
use x509_cert::certificate::CertificateInner;

use crate::error::{CaError, Result};
use crate::key::PublicKey;
use crate::serial::SerialNumber;
use crate::tbs_certificate::TbsCertificate;

/// Represents the supported signature algorithms for certificates.
///
/// This enum provides a mapping to the corresponding algorithm identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureAlgorithm {
    /// SHA-256 with RSA encryption (PKCS#1 v1.5).
    Sha256WithRSA,
}

impl SignatureAlgorithm {
    /// The algorithm identifier, with the NULL parameters RFC 4055 requires for RSA.
    pub fn identifier(self) -> x509_cert::spki::AlgorithmIdentifierOwned {
        match self {
            SignatureAlgorithm::Sha256WithRSA => x509_cert::spki::AlgorithmIdentifierOwned {
                oid: const_oid::db::rfc5912::SHA_256_WITH_RSA_ENCRYPTION,
                parameters: Some(Any::from(AnyRef::NULL)),
            },
        }
    }

    pub fn from_identifier(identifier: &x509_cert::spki::AlgorithmIdentifierOwned) -> Result<Self> {
        match identifier.oid {
            const_oid::db::rfc5912::SHA_256_WITH_RSA_ENCRYPTION => Ok(SignatureAlgorithm::Sha256WithRSA),
            oid => Err(CaError::DecodingError(format!(
                "Unsupported signature algorithm {oid}"
            ))),
        }
    }
}

impl From<SignatureAlgorithm> for x509_cert::spki::AlgorithmIdentifierOwned {
    fn from(value: SignatureAlgorithm) -> Self {
        value.identifier()
    }
}

/// Represents a signed X.509 certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Certificate {
    /// The inner representation of the certificate.
    pub inner: CertificateInner,
}

impl Certificate {
    /// Assembles a certificate from its TBS part and a signature over the TBS DER.
    pub fn from_parts(tbs: &TbsCertificate, signature: &[u8]) -> Result<Self> {
        let tbs_certificate = tbs.to_tbs_certificate_inner()?;
        Ok(Certificate {
            inner: CertificateInner {
                signature_algorithm: tbs.signature_algorithm.identifier(),
                tbs_certificate,
                signature: BitString::from_bytes(signature)?,
            },
        })
    }

    /// Encodes the certificate into DER format.
    pub fn to_der(&self) -> Result<Vec<u8>> {
        self.inner
            .to_der()
            .map_err(|e| CaError::EncodingError(e.to_string()))
    }

    /// Encodes the certificate into PEM format.
    pub fn to_pem(&self) -> Result<String> {
        self.inner
            .to_pem(pkcs8::LineEnding::LF)
            .map_err(|e| CaError::EncodingError(e.to_string()))
    }

    pub fn from_der(der: &[u8]) -> Result<Self> {
        Ok(Certificate {
            inner: CertificateInner::from_der(der)?,
        })
    }

    pub fn from_pem(pem: &str) -> Result<Self> {
        Ok(Certificate {
            inner: CertificateInner::from_pem(pem)?,
        })
    }

    /// Decodes the TBS part back into builder form.
    pub fn tbs(&self) -> Result<TbsCertificate> {
        TbsCertificate::from_tbs_certificate_inner(&self.inner.tbs_certificate)
    }

    pub fn subject(&self) -> Result<DistinguishedName> {
        DistinguishedName::from_x509_name(&self.inner.tbs_certificate.subject)
    }

    pub fn issuer(&self) -> Result<DistinguishedName> {
        DistinguishedName::from_x509_name(&self.inner.tbs_certificate.issuer)
    }

    /// The encoded subject name, for use as the issuer of certificates this one signs.
    pub fn subject_name(&self) -> &x509_cert::name::Name {
        &self.inner.tbs_certificate.subject
    }

    /// Whether issuer and subject are the same encoded name.
    pub fn is_self_issued(&self) -> bool {
        self.inner.tbs_certificate.issuer == self.inner.tbs_certificate.subject
    }

    pub fn common_name(&self) -> Result<Option<String>> {
        Ok(self.subject()?.common_name)
    }

    pub fn serial_number(&self) -> Result<SerialNumber> {
        SerialNumber::from_bytes(self.inner.tbs_certificate.serial_number.as_bytes())
    }

    pub fn validity(&self) -> Result<Validity> {
        Ok(self.tbs()?.validity)
    }

    pub fn public_key(&self) -> Result<PublicKey> {
        PublicKey::from_spki(&self.inner.tbs_certificate.subject_public_key_info)
    }

    /// Looks up and decodes the first extension of type `E`.
    pub fn extension<E: ToAndFromX509Extension>(&self) -> Result<Option<E>> {
        self.inner
            .tbs_certificate
            .extensions
            .iter()
            .flatten()
            .find(|ext| ext.extn_id == E::OID)
            .map(|ext| E::from_x509_extension_value(ext.extn_value.as_bytes()))
            .transpose()
    }

    /// DNS names of the subjectAltName extension, in encoded order.
    pub fn subject_alt_names(&self) -> Result<Vec<String>> {
        Ok(self
            .extension::<SubjectAltName>()?
            .map(|san| san.names)
            .unwrap_or_default())
    }

    /// Verifies that this certificate was signed by the holder of `issuer_key`.
    pub fn verify_signed_by(&self, issuer_key: &PublicKey) -> Result<()> {
        if self.inner.signature_algorithm != self.inner.tbs_certificate.signature {
            return Err(CaError::Signing(
                "outer and inner signature algorithms differ".to_string(),
            ));
        }
        SignatureAlgorithm::from_identifier(&self.inner.signature_algorithm)?;
        let tbs_der = self.inner.tbs_certificate.to_der()?;
        issuer_key.verify(&tbs_der, self.inner.signature.raw_bytes())
    }
}
