use const_oid::AssociatedOid;
use der::{
    Decode, Encode,
    asn1::{BitString, Ia5String, OctetString},
    oid::ObjectIdentifier,
};
use sha1::{Digest, Sha1};
use x509_cert::ext::pkix::name::GeneralName;

use super::params::ExtensionParam;
use crate::error::{CaError, Result};
use crate::key::PublicKey;

/// Trait for converting to and from X.509 extensions.
///
/// This trait provides methods to encode and decode X.509 extension values.
///
/// # Example
/// ```
/// use certmint::cert::extensions::{SubjectAltName, ToAndFromX509Extension};
/// let san = SubjectAltName { names: vec!["example.com".to_string()] };
/// let encoded = san.to_x509_extension_value().unwrap();
/// let decoded = SubjectAltName::from_x509_extension_value(&encoded).unwrap();
/// assert_eq!(san.names, decoded.names);
/// ```
pub trait ToAndFromX509Extension {
    /// The Object Identifier (OID) for the extension.
    const OID: ObjectIdentifier;

    /// Encodes the extension into a DER-encoded byte vector.
    fn to_x509_extension_value(&self) -> Result<Vec<u8>>;

    /// Decodes the extension from a DER-encoded byte slice.
    fn from_x509_extension_value(extension: &[u8]) -> Result<Self>
    where
        Self: Sized;
}

/// Represents the Subject Alternative Name (SAN) extension.
///
/// # Fields
/// * `names` - DNS names, in the order they are encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectAltName {
    pub names: Vec<String>,
}

impl ToAndFromX509Extension for SubjectAltName {
    const OID: ObjectIdentifier = x509_cert::ext::pkix::SubjectAltName::OID;

    fn to_x509_extension_value(&self) -> Result<Vec<u8>> {
        let san = x509_cert::ext::pkix::SubjectAltName(
            self.names
                .iter()
                .map(|name| {
                    Ia5String::new(name)
                        .map(GeneralName::DnsName)
                        .map_err(|e| CaError::InvalidInput(format!("{name}: {e}")))
                })
                .collect::<Result<Vec<_>>>()?,
        );

        Ok(san.to_der()?)
    }

    fn from_x509_extension_value(extension: &[u8]) -> Result<Self> {
        let san = x509_cert::ext::pkix::SubjectAltName::from_der(extension)?;
        let names = san
            .0
            .iter()
            .map(|name| match name {
                GeneralName::DnsName(dns) => Ok(dns.to_string()),
                _ => Err(CaError::InvalidInput(
                    "Unsupported general name type".to_string(),
                )),
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { names })
    }
}

/// Represents the Basic Constraints extension.
///
/// # Fields
/// * `is_ca` - Indicates if the certificate is a CA.
/// * `max_path_length` - The maximum number of intermediate CAs allowed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BasicConstraints {
    pub is_ca: bool,
    pub max_path_length: Option<u8>,
}

impl ToAndFromX509Extension for BasicConstraints {
    const OID: ObjectIdentifier = x509_cert::ext::pkix::BasicConstraints::OID;

    fn to_x509_extension_value(&self) -> Result<Vec<u8>> {
        let bc = x509_cert::ext::pkix::BasicConstraints {
            ca: self.is_ca,
            path_len_constraint: self.max_path_length,
        };

        Ok(bc.to_der()?)
    }

    fn from_x509_extension_value(der_bytes: &[u8]) -> Result<Self> {
        let bc = x509_cert::ext::pkix::BasicConstraints::from_der(der_bytes)?;
        Ok(Self {
            is_ca: bc.ca,
            max_path_length: bc.path_len_constraint,
        })
    }
}

pub use der::flagset::FlagSet;
use x509_cert::ext::pkix::KeyUsage as X509KeyUsage;
pub use x509_cert::ext::pkix::KeyUsages;

/// Represents the Key Usage extension.
///
/// This extension defines the purpose of the key contained in the certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyUsage(pub FlagSet<KeyUsages>);

impl KeyUsage {
    pub fn from_usages(usages: &[KeyUsages]) -> Self {
        KeyUsage(
            usages
                .iter()
                .fold(FlagSet::default(), |flags, usage| flags | *usage),
        )
    }

    pub fn contains(&self, usage: KeyUsages) -> bool {
        self.0.contains(usage)
    }
}

impl ToAndFromX509Extension for KeyUsage {
    const OID: ObjectIdentifier = <X509KeyUsage as AssociatedOid>::OID;

    fn to_x509_extension_value(&self) -> Result<Vec<u8>> {
        let ku = X509KeyUsage::from(self.0);
        Ok(ku.to_der()?)
    }

    fn from_x509_extension_value(extension: &[u8]) -> Result<Self> {
        let ku = X509KeyUsage::from_der(extension)?;
        Ok(Self(ku.0))
    }
}

/// Represents the Extended Key Usage extension.
///
/// This extension indicates purposes for which the public key may be used.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtendedKeyUsage {
    pub usage: Vec<ExtendedKeyUsageOption>,
}

impl ToAndFromX509Extension for ExtendedKeyUsage {
    const OID: ObjectIdentifier = x509_cert::ext::pkix::ExtendedKeyUsage::OID;

    fn to_x509_extension_value(&self) -> Result<Vec<u8>> {
        let oids: Vec<ObjectIdentifier> = self.usage.iter().map(|v| (*v).into()).collect();
        let eku = x509_cert::ext::pkix::ExtendedKeyUsage(oids);
        Ok(eku.to_der()?)
    }

    fn from_x509_extension_value(extension: &[u8]) -> Result<Self> {
        let eku = x509_cert::ext::pkix::ExtendedKeyUsage::from_der(extension)?;
        let usage = eku
            .0
            .iter()
            .map(|v| match *v {
                const_oid::db::rfc5912::ID_KP_SERVER_AUTH => Ok(ExtendedKeyUsageOption::ServerAuth),
                const_oid::db::rfc5912::ID_KP_CLIENT_AUTH => Ok(ExtendedKeyUsageOption::ClientAuth),
                const_oid::db::rfc5912::ID_KP_CODE_SIGNING => {
                    Ok(ExtendedKeyUsageOption::CodeSigning)
                }
                const_oid::db::rfc5912::ID_KP_EMAIL_PROTECTION => {
                    Ok(ExtendedKeyUsageOption::EmailProtection)
                }
                const_oid::db::rfc5912::ID_KP_TIME_STAMPING => {
                    Ok(ExtendedKeyUsageOption::TimeStamping)
                }
                _ => Err(CaError::InvalidInput(
                    "Unsupported extended key usage option".to_string(),
                )),
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { usage })
    }
}

/// Represents an option for the Extended Key Usage extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExtendedKeyUsageOption {
    ServerAuth,
    ClientAuth,
    CodeSigning,
    EmailProtection,
    TimeStamping,
}

impl From<ExtendedKeyUsageOption> for ObjectIdentifier {
    fn from(value: ExtendedKeyUsageOption) -> Self {
        match value {
            ExtendedKeyUsageOption::ServerAuth => const_oid::db::rfc5912::ID_KP_SERVER_AUTH,
            ExtendedKeyUsageOption::ClientAuth => const_oid::db::rfc5912::ID_KP_CLIENT_AUTH,
            ExtendedKeyUsageOption::CodeSigning => const_oid::db::rfc5912::ID_KP_CODE_SIGNING,
            ExtendedKeyUsageOption::EmailProtection => {
                const_oid::db::rfc5912::ID_KP_EMAIL_PROTECTION
            }
            ExtendedKeyUsageOption::TimeStamping => const_oid::db::rfc5912::ID_KP_TIME_STAMPING,
        }
    }
}

/// Represents the Subject Key Identifier extension.
///
/// The identifier is the SHA-1 of the subjectPublicKey bits (RFC 5280, 4.2.1.2 method 1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectKeyIdentifier(pub Vec<u8>);

impl SubjectKeyIdentifier {
    pub fn derive(public_key: &PublicKey) -> Result<Self> {
        let spki = public_key.to_spki()?;
        let key_id = Sha1::digest(spki.subject_public_key.raw_bytes());
        Ok(SubjectKeyIdentifier(key_id.to_vec()))
    }
}

impl ToAndFromX509Extension for SubjectKeyIdentifier {
    const OID: ObjectIdentifier = x509_cert::ext::pkix::SubjectKeyIdentifier::OID;

    fn to_x509_extension_value(&self) -> Result<Vec<u8>> {
        let ski = x509_cert::ext::pkix::SubjectKeyIdentifier(OctetString::new(self.0.as_slice())?);
        Ok(ski.to_der()?)
    }

    fn from_x509_extension_value(extension: &[u8]) -> Result<Self> {
        let ski = x509_cert::ext::pkix::SubjectKeyIdentifier::from_der(extension)?;
        Ok(Self(ski.0.as_bytes().to_vec()))
    }
}

/// Represents the legacy Netscape certificate type extension.
///
/// Encoded as a named BIT STRING: client(0), server(1), email(2), objsign(3),
/// reserved(4), sslCA(5), emailCA(6), objCA(7).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NetscapeCertType {
    pub client: bool,
    pub server: bool,
    pub email: bool,
    pub objsign: bool,
    pub ssl_ca: bool,
    pub email_ca: bool,
    pub obj_ca: bool,
}

impl NetscapeCertType {
    fn to_byte(self) -> u8 {
        [
            (self.client, 0x80),
            (self.server, 0x40),
            (self.email, 0x20),
            (self.objsign, 0x10),
            (self.ssl_ca, 0x04),
            (self.email_ca, 0x02),
            (self.obj_ca, 0x01),
        ]
        .into_iter()
        .filter(|(set, _)| *set)
        .fold(0u8, |byte, (_, bit)| byte | bit)
    }

    fn from_byte(byte: u8) -> Self {
        NetscapeCertType {
            client: byte & 0x80 != 0,
            server: byte & 0x40 != 0,
            email: byte & 0x20 != 0,
            objsign: byte & 0x10 != 0,
            ssl_ca: byte & 0x04 != 0,
            email_ca: byte & 0x02 != 0,
            obj_ca: byte & 0x01 != 0,
        }
    }
}

impl ToAndFromX509Extension for NetscapeCertType {
    const OID: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.16.840.1.113730.1.1");

    fn to_x509_extension_value(&self) -> Result<Vec<u8>> {
        let byte = self.to_byte();
        // DER named bit lists drop trailing zero bits.
        let bits = if byte == 0 {
            BitString::new(0, Vec::new())?
        } else {
            BitString::new(byte.trailing_zeros() as u8, vec![byte])?
        };
        Ok(bits.to_der()?)
    }

    fn from_x509_extension_value(extension: &[u8]) -> Result<Self> {
        let bits = BitString::from_der(extension)?;
        let byte = bits.raw_bytes().first().copied().unwrap_or(0);
        Ok(Self::from_byte(byte))
    }
}

/// A fixed set of extensions applied to every certificate of one kind.
///
/// Profiles are plain constants; only the subject key identifier and the
/// subject alternative names vary per certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtensionProfile {
    pub is_ca: bool,
    pub key_usages: &'static [KeyUsages],
    pub extended_key_usages: &'static [ExtendedKeyUsageOption],
    pub netscape_cert_type: NetscapeCertType,
}

impl ExtensionProfile {
    /// Extensions of the self-signed root.
    pub const ROOT: ExtensionProfile = ExtensionProfile {
        is_ca: true,
        key_usages: &[
            KeyUsages::KeyCertSign,
            KeyUsages::DigitalSignature,
            KeyUsages::KeyEncipherment,
            KeyUsages::DataEncipherment,
        ],
        extended_key_usages: &[
            ExtendedKeyUsageOption::ServerAuth,
            ExtendedKeyUsageOption::ClientAuth,
            ExtendedKeyUsageOption::CodeSigning,
            ExtendedKeyUsageOption::EmailProtection,
            ExtendedKeyUsageOption::TimeStamping,
        ],
        netscape_cert_type: NetscapeCertType {
            client: true,
            server: true,
            email: true,
            objsign: true,
            ssl_ca: true,
            email_ca: true,
            obj_ca: true,
        },
    };

    /// Extensions of issued server certificates, before the SAN is appended.
    pub const LEAF: ExtensionProfile = ExtensionProfile {
        is_ca: false,
        key_usages: &[
            KeyUsages::DigitalSignature,
            KeyUsages::KeyEncipherment,
            KeyUsages::DataEncipherment,
        ],
        extended_key_usages: &[
            ExtendedKeyUsageOption::ServerAuth,
            ExtendedKeyUsageOption::ClientAuth,
        ],
        netscape_cert_type: NetscapeCertType {
            client: true,
            server: true,
            email: false,
            objsign: false,
            ssl_ca: false,
            email_ca: false,
            obj_ca: false,
        },
    };

    /// Renders the profile for a certificate carrying `subject_public_key`.
    /// When `alt_names` is given, a subjectAltName extension is appended last.
    pub fn render(
        &self,
        subject_public_key: &PublicKey,
        alt_names: Option<&[String]>,
    ) -> Result<Vec<ExtensionParam>> {
        let basic_constraints = BasicConstraints {
            is_ca: self.is_ca,
            max_path_length: None,
        };
        let extended_key_usage = ExtendedKeyUsage {
            usage: self.extended_key_usages.to_vec(),
        };

        let mut extensions = vec![
            ExtensionParam::from_extension(&basic_constraints, true)?,
            ExtensionParam::from_extension(&KeyUsage::from_usages(self.key_usages), true)?,
            ExtensionParam::from_extension(&extended_key_usage, false)?,
            ExtensionParam::from_extension(&self.netscape_cert_type, false)?,
            ExtensionParam::from_extension(&SubjectKeyIdentifier::derive(subject_public_key)?, false)?,
        ];

        if let Some(names) = alt_names {
            let san = SubjectAltName {
                names: names.to_vec(),
            };
            extensions.push(ExtensionParam::from_extension(&san, false)?);
        }

        Ok(extensions)
    }
}
