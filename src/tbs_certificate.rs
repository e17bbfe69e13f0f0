use bon::Builder;
use der::Encode;
use der::asn1::{GeneralizedTime, OctetString, UtcTime};
use time::OffsetDateTime;
use x509_cert::Version;
use x509_cert::certificate::TbsCertificateInner;
use x509_cert::name::Name;
use x509_cert::serial_number::SerialNumber as X509SerialNumber;

use crate::cert::SignatureAlgorithm;
use crate::cert::params::{ExtensionParam, Validity};
use crate::error::{CaError, Result};
use crate::key::PublicKey;
use crate::serial::SerialNumber;

/// Represents the "To Be Signed" (TBS) portion of an X.509 certificate,
/// i.e. an unsigned certificate.
///
/// Built with [`TbsCertificate::builder`]; the issuer is an encoded X.509
/// name so that a certificate signed by an authority carries that
/// authority's subject byte for byte.
///
/// # Fields
/// * `serial_number` - The identifier assigned by the issuer.
/// * `signature_algorithm` - The algorithm the issuer will sign with.
/// * `issuer` - The issuer name.
/// * `validity` - The validity window.
/// * `subject` - The subject name.
/// * `subject_public_key` - The public key being certified.
/// * `extensions` - X.509 extensions, in encoding order.
#[derive(Debug, Clone, Builder)]
pub struct TbsCertificate {
    pub serial_number: SerialNumber,
    #[builder(default = SignatureAlgorithm::Sha256WithRSA)]
    pub signature_algorithm: SignatureAlgorithm,
    pub issuer: Name,
    pub validity: Validity,
    pub subject: Name,
    pub subject_public_key: PublicKey,
    #[builder(default)]
    pub extensions: Vec<ExtensionParam>,
}

impl TbsCertificate {
    /// Converts the `TbsCertificate` into a `TbsCertificateInner` for DER encoding.
    pub fn to_tbs_certificate_inner(&self) -> Result<TbsCertificateInner> {
        let extensions = self
            .extensions
            .iter()
            .map(|ext| {
                Ok(x509_cert::ext::Extension {
                    extn_id: ext.oid,
                    critical: ext.critical,
                    extn_value: OctetString::new(ext.value.clone())?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let validity = x509_cert::time::Validity {
            not_before: to_x509_time(self.validity.not_before)?,
            not_after: to_x509_time(self.validity.not_after)?,
        };

        let serial_number = X509SerialNumber::new(&self.serial_number.to_bytes())
            .map_err(|e| CaError::EncodingError(format!("serial number: {e}")))?;

        Ok(TbsCertificateInner {
            version: Version::V3,
            serial_number,
            signature: self.signature_algorithm.identifier(),
            issuer: self.issuer.clone(),
            validity,
            subject: self.subject.clone(),
            subject_public_key_info: self.subject_public_key.to_spki()?,
            issuer_unique_id: None,
            subject_unique_id: None,
            extensions: (!extensions.is_empty()).then_some(extensions),
        })
    }

    /// Creates a `TbsCertificate` from a `TbsCertificateInner`.
    pub fn from_tbs_certificate_inner(inner: &TbsCertificateInner) -> Result<Self> {
        let extensions = inner
            .extensions
            .iter()
            .flatten()
            .map(|ext| ExtensionParam {
                oid: ext.extn_id,
                critical: ext.critical,
                value: ext.extn_value.as_bytes().to_vec(),
            })
            .collect::<Vec<_>>();

        Ok(Self {
            serial_number: SerialNumber::from_bytes(inner.serial_number.as_bytes())?,
            signature_algorithm: SignatureAlgorithm::from_identifier(&inner.signature)?,
            issuer: inner.issuer.clone(),
            validity: Validity {
                not_before: from_x509_time(&inner.validity.not_before),
                not_after: from_x509_time(&inner.validity.not_after),
            },
            subject: inner.subject.clone(),
            subject_public_key: PublicKey::from_spki(&inner.subject_public_key_info)?,
            extensions,
        })
    }

    /// Encodes the `TbsCertificate` into DER format.
    pub fn to_der(&self) -> Result<Vec<u8>> {
        Ok(self.to_tbs_certificate_inner()?.to_der()?)
    }
}

// RFC 5280: UTCTime through 2049, GeneralizedTime from 2050 on.
fn to_x509_time(instant: OffsetDateTime) -> Result<x509_cert::time::Time> {
    let time = if instant.year() < 2050 {
        x509_cert::time::Time::UtcTime(UtcTime::from_system_time(instant.into())?)
    } else {
        x509_cert::time::Time::GeneralTime(GeneralizedTime::from_system_time(instant.into())?)
    };
    Ok(time)
}

fn from_x509_time(time: &x509_cert::time::Time) -> OffsetDateTime {
    OffsetDateTime::from(time.to_system_time())
}
