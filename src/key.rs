use std::fmt;

use der::Encode;
use pkcs8::LineEnding;
use rsa::pkcs1::{DecodeRsaPrivateKey, EncodeRsaPrivateKey};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePublicKey};
use rsa::traits::PublicKeyParts;
use rsa::{Pkcs1v15Sign, RsaPrivateKey, RsaPublicKey};
use sha2::{Digest, Sha256};
use x509_cert::spki::SubjectPublicKeyInfoOwned;

use crate::error::{CaError, Result};

/// An RSA key pair used either as the root signing identity or as a
/// per-certificate server key.
#[derive(Clone)]
pub struct KeyPair {
    private: Box<RsaPrivateKey>,
    public: PublicKey,
}

impl KeyPair {
    /// Generate an RSA key pair with the specified modulus size.
    pub fn generate_rsa(bits: usize) -> Result<Self> {
        let mut rng = rand_core::OsRng;
        let private = RsaPrivateKey::new(&mut rng, bits)
            .map_err(|e| CaError::Generation(format!("{bits}-bit RSA key: {e}")))?;
        Ok(Self::from_private(private))
    }

    fn from_private(private: RsaPrivateKey) -> Self {
        let public = PublicKey(RsaPublicKey::from(&private));
        KeyPair {
            private: Box::new(private),
            public,
        }
    }

    /// Import a private key from PEM. Both PKCS#1 (`RSA PRIVATE KEY`) and
    /// PKCS#8 (`PRIVATE KEY`) encodings are accepted.
    pub fn from_private_key_pem(pem: &str) -> Result<Self> {
        let private = match RsaPrivateKey::from_pkcs1_pem(pem) {
            Ok(key) => key,
            Err(_) => RsaPrivateKey::from_pkcs8_pem(pem)?,
        };
        Ok(Self::from_private(private))
    }

    /// Export the private key as a PKCS#1 PEM document.
    pub fn private_key_pem(&self) -> Result<String> {
        let pem = self
            .private
            .to_pkcs1_pem(LineEnding::LF)
            .map_err(|e| CaError::EncodingError(e.to_string()))?;
        Ok(pem.as_str().to_owned())
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public
    }

    /// Modulus size in bits.
    pub fn bits(&self) -> usize {
        self.private.size() * 8
    }

    /// Sign `data` with RSASSA-PKCS1-v1_5 over SHA-256.
    pub fn sign_data(&self, data: &[u8]) -> Result<Vec<u8>> {
        let hashed = Sha256::digest(data);
        let signature = self
            .private
            .sign(Pkcs1v15Sign::new::<Sha256>(), &hashed)?;
        Ok(signature)
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("bits", &self.bits())
            .finish_non_exhaustive()
    }
}

/// The public half of a [`KeyPair`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKey(RsaPublicKey);

impl PublicKey {
    pub fn from_key_pair(key_pair: &KeyPair) -> Self {
        key_pair.public.clone()
    }

    /// Import an SPKI (`PUBLIC KEY`) PEM document.
    pub fn from_pem(pem: &str) -> Result<Self> {
        Ok(PublicKey(RsaPublicKey::from_public_key_pem(pem)?))
    }

    /// Export as an SPKI (`PUBLIC KEY`) PEM document.
    pub fn to_pem(&self) -> Result<String> {
        self.0
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| CaError::EncodingError(e.to_string()))
    }

    pub fn to_spki(&self) -> Result<SubjectPublicKeyInfoOwned> {
        SubjectPublicKeyInfoOwned::from_key(self.0.clone())
            .map_err(|e| CaError::EncodingError(e.to_string()))
    }

    pub fn from_spki(spki: &SubjectPublicKeyInfoOwned) -> Result<Self> {
        let der = spki.to_der()?;
        Ok(PublicKey(RsaPublicKey::from_public_key_der(&der)?))
    }

    /// Check an RSASSA-PKCS1-v1_5/SHA-256 signature over `data`.
    pub fn verify(&self, data: &[u8], signature: &[u8]) -> Result<()> {
        let hashed = Sha256::digest(data);
        self.0
            .verify(Pkcs1v15Sign::new::<Sha256>(), &hashed, signature)
            .map_err(|e| CaError::Signing(format!("signature verification failed: {e}")))
    }
}
