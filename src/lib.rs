//! # certmint - A Self-Hosted Certificate Authority
//!
//! certmint mints TLS server certificates on demand for arbitrary host names,
//! all signed by a single root that is generated on first use and persisted
//! for later runs. It is meant to be embedded in tools that terminate TLS for
//! hosts they do not own, such as intercepting proxies, and is built entirely
//! with rustcrypto libraries.
//!
//! ## Lifecycle
//!
//! - **Root**: on construction the authority loads `certs/ca.pem`,
//!   `keys/ca.private.key` and `keys/ca.public.key` from its storage
//!   directory. If any is missing or unusable, a new 2048-bit RSA root valid
//!   for ten years is self-signed and written back.
//! - **Leaves**: each issuance generates a fresh RSA key, draws a random
//!   128-bit serial, signs a two-year server certificate whose SAN lists every
//!   requested host, and stores it under the primary host name (`*` replaced
//!   by `_`).
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use certmint::ca::CertificateAuthority;
//!
//! # async fn run() -> Result<(), certmint::error::CaError> {
//! let ca = CertificateAuthority::construct("./ca")?;
//! println!("trust anchor: {}", ca.root_certificate_location().display());
//!
//! let issued = ca.issue(["example.com", "*.example.com"]).await?;
//! println!("{}", issued.certificate_pem);
//! if !issued.persistence.is_persisted() {
//!     eprintln!("certificate was not written to disk");
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Callback Style
//!
//! ```rust,no_run
//! use certmint::ca::CertificateAuthority;
//!
//! # fn run(ca: &CertificateAuthority) {
//! ca.issue_server_certificate("api.example.com", |result| match result {
//!     Ok(issued) => println!("serial {}", issued.serial),
//!     Err(e) => eprintln!("issuance failed: {e}"),
//! });
//! # }
//! ```
//!
//! ## Module Organization
//!
//! - [`ca`]: The authority facade
//! - [`authority`]: Root load-or-generate
//! - [`leaf`]: Server certificate issuance
//! - [`store`]: On-disk PEM storage
//! - [`cert`]: Certificate encoding, decoding and extensions
//! - [`tbs_certificate`]: Unsigned certificate assembly
//! - [`issuer`]: Signing
//! - [`key`]: RSA keys
//! - [`serial`]: Serial numbers
//! - [`config`]: Settings
//! - [`error`]: Error types

pub mod authority;
pub mod ca;
pub mod cert;
pub mod config;
pub mod error;
pub mod issuer;
pub mod key;
pub mod leaf;
pub mod serial;
pub mod store;
pub mod tbs_certificate;
