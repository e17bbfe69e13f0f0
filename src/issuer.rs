use x509_cert::name::Name;

use crate::cert::Certificate;
use crate::error::Result;
use crate::key::KeyPair;
use crate::tbs_certificate::TbsCertificate;

/// Represents an entity capable of issuing certificates.
///
/// Implementors keep their private key to themselves; callers hand over an
/// unsigned certificate and get back a signed one.
pub trait Issuer {
    /// Returns the encoded name placed in the issuer field of certificates
    /// this entity signs.
    fn issuer_name(&self) -> &Name;

    /// Signs the provided TBS certificate.
    ///
    /// # Arguments
    /// * `tbs` - The unsigned certificate. Its issuer must be [`Issuer::issuer_name`].
    ///
    /// # Returns
    /// The signed `Certificate`.
    fn sign(&self, tbs: &TbsCertificate) -> Result<Certificate>;
}

/// Signs `tbs` with `key` using the TBS certificate's signature algorithm.
pub(crate) fn sign_with_key(tbs: &TbsCertificate, key: &KeyPair) -> Result<Certificate> {
    let signature = key.sign_data(&tbs.to_der()?)?;
    Certificate::from_parts(tbs, &signature)
}

/// Issuer for self-signed certificates: the subject signs with its own key.
pub struct SelfIssuer<'a> {
    name: &'a Name,
    key: &'a KeyPair,
}

impl<'a> SelfIssuer<'a> {
    pub fn new(name: &'a Name, key: &'a KeyPair) -> Self {
        SelfIssuer { name, key }
    }
}

impl Issuer for SelfIssuer<'_> {
    fn issuer_name(&self) -> &Name {
        self.name
    }

    fn sign(&self, tbs: &TbsCertificate) -> Result<Certificate> {
        sign_with_key(tbs, self.key)
    }
}
