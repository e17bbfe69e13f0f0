use std::fmt;

use bon::Builder;
use const_oid::ObjectIdentifier;
use const_oid::db::rfc4519;
use der::asn1::{Any, PrintableStringRef, SetOfVec};
use der::{Tag, Tagged};
use time::{Month, OffsetDateTime};
use x509_cert::attr::AttributeTypeAndValue;
use x509_cert::name::{Name, RdnSequence, RelativeDistinguishedName};

use super::extensions::ToAndFromX509Extension;
use crate::error::{CaError, Result};

/// The attribute kinds this authority writes into subject and issuer names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeType {
    CommonName,
    Country,
    State,
    Locality,
    Organization,
    OrganizationalUnit,
}

impl AttributeType {
    /// Encoding order used for every name built by this crate.
    pub const ORDER: [AttributeType; 6] = [
        AttributeType::CommonName,
        AttributeType::Country,
        AttributeType::State,
        AttributeType::Locality,
        AttributeType::Organization,
        AttributeType::OrganizationalUnit,
    ];

    pub fn oid(self) -> ObjectIdentifier {
        match self {
            AttributeType::CommonName => rfc4519::CN,
            AttributeType::Country => rfc4519::C,
            AttributeType::State => rfc4519::ST,
            AttributeType::Locality => rfc4519::L,
            AttributeType::Organization => rfc4519::O,
            AttributeType::OrganizationalUnit => rfc4519::OU,
        }
    }

    pub fn short_name(self) -> &'static str {
        match self {
            AttributeType::CommonName => "CN",
            AttributeType::Country => "C",
            AttributeType::State => "ST",
            AttributeType::Locality => "L",
            AttributeType::Organization => "O",
            AttributeType::OrganizationalUnit => "OU",
        }
    }

    fn from_oid(oid: &ObjectIdentifier) -> Option<Self> {
        Self::ORDER.into_iter().find(|kind| kind.oid() == *oid)
    }
}

/// Distinguished name of a certificate subject or issuer.
///
/// Attributes are encoded as one RDN each, in [`AttributeType::ORDER`];
/// absent attributes are omitted.
#[derive(Clone, Debug, Builder, Default, PartialEq, Eq)]
pub struct DistinguishedName {
    #[builder(into)]
    pub common_name: Option<String>,
    #[builder(into)]
    pub country: Option<String>,
    #[builder(into)]
    pub state: Option<String>,
    #[builder(into)]
    pub locality: Option<String>,
    #[builder(into)]
    pub organization: Option<String>,
    #[builder(into)]
    pub organization_unit: Option<String>,
}

impl DistinguishedName {
    pub fn get(&self, kind: AttributeType) -> Option<&str> {
        let value = match kind {
            AttributeType::CommonName => &self.common_name,
            AttributeType::Country => &self.country,
            AttributeType::State => &self.state,
            AttributeType::Locality => &self.locality,
            AttributeType::Organization => &self.organization,
            AttributeType::OrganizationalUnit => &self.organization_unit,
        };
        value.as_deref()
    }

    fn slot(&mut self, kind: AttributeType) -> &mut Option<String> {
        match kind {
            AttributeType::CommonName => &mut self.common_name,
            AttributeType::Country => &mut self.country,
            AttributeType::State => &mut self.state,
            AttributeType::Locality => &mut self.locality,
            AttributeType::Organization => &mut self.organization,
            AttributeType::OrganizationalUnit => &mut self.organization_unit,
        }
    }

    /// Copy of this name with the common name replaced.
    pub fn with_common_name(&self, common_name: impl Into<String>) -> Self {
        let mut name = self.clone();
        name.common_name = Some(common_name.into());
        name
    }

    /// Present attributes in encoding order.
    pub fn attributes(&self) -> impl Iterator<Item = (AttributeType, &str)> + '_ {
        AttributeType::ORDER
            .into_iter()
            .filter_map(|kind| self.get(kind).map(|value| (kind, value)))
    }

    /// Converts the distinguished name to an X.509 `Name`.
    pub fn as_x509_name(&self) -> Result<Name> {
        let mut rdns = Vec::new();
        for (kind, value) in self.attributes() {
            let tag = if kind == AttributeType::Country && PrintableStringRef::new(value).is_ok() {
                Tag::PrintableString
            } else {
                Tag::Utf8String
            };
            let atv = AttributeTypeAndValue {
                oid: kind.oid(),
                value: Any::new(tag, value.as_bytes())?,
            };
            rdns.push(RelativeDistinguishedName(SetOfVec::try_from(vec![atv])?));
        }
        Ok(RdnSequence(rdns))
    }

    /// Reads the attributes this crate knows from an X.509 `Name`.
    /// Other attribute types are ignored.
    pub fn from_x509_name(x509dn: &Name) -> Result<Self> {
        let mut name = DistinguishedName::default();
        for rdn in x509dn.0.iter() {
            for attr in rdn.0.iter() {
                let Some(kind) = AttributeType::from_oid(&attr.oid) else {
                    continue;
                };
                let value = match attr.value.tag() {
                    Tag::Utf8String | Tag::PrintableString | Tag::Ia5String => {
                        String::from_utf8(attr.value.value().to_vec())
                            .map_err(|e| CaError::DecodingError(e.to_string()))?
                    }
                    tag => {
                        return Err(CaError::DecodingError(format!(
                            "unsupported string type {tag} for {}",
                            kind.short_name()
                        )));
                    }
                };
                *name.slot(kind) = Some(value);
            }
        }
        Ok(name)
    }
}

impl fmt::Display for DistinguishedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (kind, value)) in self.attributes().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}={}", kind.short_name(), value)?;
        }
        Ok(())
    }
}

/// Certificate validity period.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Validity {
    pub not_before: OffsetDateTime,
    pub not_after: OffsetDateTime,
}

impl Validity {
    /// A validity period starting now and ending `years` calendar years later.
    pub fn for_years(years: u32) -> Result<Self> {
        Self::starting_at(OffsetDateTime::now_utc(), years)
    }

    /// Certificates carry whole seconds, so `start` is truncated first.
    /// A Feb 29 start rolls over to Mar 1 when the target year is not a leap year.
    pub fn starting_at(start: OffsetDateTime, years: u32) -> Result<Self> {
        let invalid = |e: time::error::ComponentRange| CaError::InvalidInput(e.to_string());
        let not_before = start.replace_nanosecond(0).map_err(invalid)?;
        let year = i32::try_from(years)
            .ok()
            .and_then(|years| not_before.year().checked_add(years))
            .ok_or_else(|| CaError::InvalidInput(format!("{years} years is out of range")))?;
        let not_after = match not_before.replace_year(year) {
            Ok(t) => t,
            Err(_) => not_before
                .replace_day(1)
                .and_then(|t| t.replace_month(Month::March))
                .and_then(|t| t.replace_year(year))
                .map_err(invalid)?,
        };
        Ok(Self {
            not_before,
            not_after,
        })
    }

    pub fn contains(&self, instant: OffsetDateTime) -> bool {
        self.not_before <= instant && instant <= self.not_after
    }
}

/// Represents an X.509 extension.
///
/// # Fields
/// * `oid` - The object identifier of the extension.
/// * `critical` - Indicates if the extension is critical.
/// * `value` - The DER-encoded value of the extension.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtensionParam {
    pub oid: ObjectIdentifier,
    pub critical: bool,
    /// DER-encoded extension value
    pub value: Vec<u8>,
}

impl ExtensionParam {
    /// Creates an `ExtensionParam` from a specific extension.
    pub fn from_extension<E: ToAndFromX509Extension>(extension: &E, critical: bool) -> Result<Self> {
        Ok(Self {
            oid: E::OID,
            critical,
            value: extension.to_x509_extension_value()?,
        })
    }

    /// Decodes an `ExtensionParam` into a specific extension.
    pub fn to_extension<E: ToAndFromX509Extension>(&self) -> Result<E> {
        if self.oid != E::OID {
            return Err(CaError::InvalidInput(format!(
                "extension {} is not {}",
                self.oid,
                E::OID
            )));
        }
        E::from_x509_extension_value(&self.value)
    }
}
