//! JOSE toolkit: [JSON Web Signature (JWS)][JWS], [JSON Web Encryption (JWE)][JWE]
//! and [JSON Web Keys (JWK)][JWK] with pluggable, allow-listed algorithms.
//!
//! # Design choices
//!
//! - Algorithms are never selected by the untrusted `alg` / `enc` header values alone.
//!   Every engine ([`Signer`], [`Verifier`], [`Encrypter`], [`Decrypter`]) holds
//!   an [`AlgorithmManager`](alg::AlgorithmManager) with the explicitly allowed algorithms;
//!   names outside the allow-list are rejected before any key is touched. The `none`
//!   algorithm is not supported at all.
//! - Keys are [`Jwk`]s. Before a key is used, its `use`, `key_ops` and `alg` parameters
//!   are checked against the requested operation, so that, e.g., an encryption key
//!   cannot verify signatures.
//! - Verification and decryption try keys from a [`JwkSet`] sequentially in the key set order.
//!   The reported [`VerifiedSignature`] / [`DecryptedRecipient`] is therefore deterministic.
//!   Failures of individual keys are not reported; only the final outcome is.
//! - Objects are first loaded structurally ([`parse()`], [`Loader`]), which allows
//!   to inspect headers (e.g., `kid`) and select keys before any cryptography.
//! - Engines mutate objects atomically: on error, a [`Jws`] / [`Jwe`] is left unchanged.
//!
//! ## Supported algorithms
//!
//! | Algorithm(s) | Feature | Description |
//! |--------------|---------|-------------|
//! | `HS256`, `HS384`, `HS512` | - | Uses pure Rust [`sha2`] crate |
//! | `ES256` | `p256` (on by default) | Uses pure Rust [`p256`] crate |
//! | `EdDSA` (Ed25519) | [`ed25519-dalek`] | Pure Rust implementation |
//! | `RS*`, `PS*` (RSA) | `rsa` | Uses pure Rust [`rsa`] crate with blinding |
//! | `RSA-OAEP-256`, `RSA1_5` | `rsa` | Key encryption |
//! | `A128KW`, `A192KW`, `A256KW` | - | Key wrapping via [`aes-kw`] |
//! | `dir` | - | Direct use of a shared symmetric key |
//! | `ECDH-ES`, `ECDH-ES+A*KW` | `p256` | Key agreement on the P-256 curve |
//! | `A128GCM`, `A192GCM`, `A256GCM` | - | Content encryption via [`aes-gcm`] |
//!
//! JWE payloads may be compressed with `DEF` (raw DEFLATE, [RFC 7516]); see
//! [`CompressionManager`].
//!
//! # Crate features
//!
//! - `clock` (on by default) enables getting the current time using `Utc::now()`
//!   from [`chrono`]. Without it, [`TimeOptions`] must be created with an explicitly
//!   specified clock function.
//! - `p256`, `ed25519-dalek` and `rsa` enable the corresponding algorithms.
//!
//! [JWS]: https://tools.ietf.org/html/rfc7515
//! [JWE]: https://tools.ietf.org/html/rfc7516
//! [JWK]: https://tools.ietf.org/html/rfc7517
//! [RFC 7516]: https://tools.ietf.org/html/rfc7516#section-4.1.3
//! [`sha2`]: https://docs.rs/sha2/
//! [`p256`]: https://docs.rs/p256/
//! [`ed25519-dalek`]: https://docs.rs/ed25519-dalek/
//! [`rsa`]: https://docs.rs/rsa/
//! [`aes-kw`]: https://docs.rs/aes-kw/
//! [`aes-gcm`]: https://docs.rs/aes-gcm/
//! [`chrono`]: https://docs.rs/chrono/
//!
//! # Examples
//!
//! Basic JWS lifecycle:
//!
//! ```
//! use chrono::Duration;
//! use jose_compact::{
//!     checker::{CheckerManager, ExpirationChecker, SubjectChecker},
//!     prelude::*,
//! };
//! use serde::{Deserialize, Serialize};
//!
//! /// Custom claims encoded in the token.
//! #[derive(Debug, PartialEq, Serialize, Deserialize)]
//! struct CustomClaims {
//!     /// `sub` is a standard claim which denotes claim subject:
//!     /// https://tools.ietf.org/html/rfc7519#section-4.1.2
//!     #[serde(rename = "sub")]
//!     subject: String,
//! }
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = JoseConfig::new(["HS256"]);
//! // Create a symmetric key, which will be used both to sign and verify tokens.
//! let key = Jwk::symmetric(b"super_secret_key_donut_steel").with_param("kid", "my-key")?;
//!
//! // Create a token.
//! let claims = Claims::new(CustomClaims { subject: "alice".to_owned() })
//!     .set_duration_and_issuance(Duration::days(7));
//! let header = Header::empty().with_algorithm("HS256").with_key_id("my-key");
//! let mut jws = Jws::new(claims.to_payload()?)
//!     .with_signature(Signature::new(header, Header::empty(), key.clone()));
//! config.signer()?.sign(&mut jws)?;
//! let token = jws.to_compact(0)?;
//! println!("token: {token}");
//!
//! // Load the token. Before verifying the token, we might find the key
//! // which has signed the token using the `kid` header.
//! let keys = JwkSet::new().with_key(key);
//! let jws = Loader.load_jws(&token)?;
//! let key_id = jws.signatures()[0].protected().key_id().unwrap();
//! let keys = keys.select_by_key_id(key_id);
//!
//! // Verify the token integrity and check claims.
//! let checker = CheckerManager::new()
//!     .with_claim_checker(ExpirationChecker::new(TimeOptions::default()))
//!     .with_claim_checker(SubjectChecker::new("alice"));
//! let loader = JwsLoader::new(config.verifier()?, checker);
//! let (jws, verified) = loader.load_and_verify(&token, &keys, None)?;
//! assert_eq!(verified.key_index, 0);
//!
//! let claims = Claims::<CustomClaims>::from_payload(jws.payload().unwrap())?;
//! assert_eq!(claims.custom.subject, "alice");
//! # Ok(())
//! # } // end main()
//! ```
//!
//! ## Encryption
//!
//! ```
//! use jose_compact::prelude::*;
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = JoseConfig::new(["A256KW", "A256GCM"]).with_compression_methods(["DEF"]);
//! let key = Jwk::symmetric([42_u8; 32]);
//!
//! let protected = Header::empty()
//!     .with_algorithm("A256KW")
//!     .with_encryption("A256GCM")
//!     .with_compression("DEF");
//! let mut jwe = Jwe::new(b"Live long and prosper.".to_vec())
//!     .with_protected(protected)
//!     .with_recipient(Recipient::new(Header::empty(), key.clone()));
//! config.encrypter()?.encrypt(&mut jwe)?;
//! let token = jwe.to_compact(0)?;
//!
//! let mut jwe = Loader.load_jwe(&token)?;
//! let keys = JwkSet::new().with_key(key);
//! config.decrypter()?.decrypt(&mut jwe, &keys)?;
//! assert_eq!(jwe.payload(), Some(&b"Live long and prosper."[..]));
//! # Ok(())
//! # } // end main()
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc(html_root_url = "https://docs.rs/jose-compact/0.1.0")]
#![warn(missing_debug_implementations, missing_docs, bare_trait_objects)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::missing_errors_doc,
    clippy::must_use_candidate,
    clippy::module_name_repetitions
)]

pub mod alg;
mod base64url;
pub mod checker;
mod claims;
pub mod compression;
mod config;
mod decrypter;
mod encrypter;
mod error;
mod header;
mod jwe;
pub mod jwk;
mod jws;
mod loader;
mod serialization;
mod signer;
mod traits;
mod verifier;

/// Prelude to neatly import all necessary stuff from the crate.
pub mod prelude {
    pub use crate::{
        Claims, Header, JoseConfig, Jwe, Jwk, JwkSet, Jws, JwsLoader, JweLoader, Loader,
        Recipient, Signature, TimeOptions,
    };
}

pub use crate::{
    claims::{Claims, Empty, TimeOptions},
    compression::CompressionManager,
    config::JoseConfig,
    decrypter::{DecryptedRecipient, Decrypter},
    encrypter::Encrypter,
    error::{
        CapabilityError, ClaimError, Error, HeaderError, KeyManagementError, ParseError,
        SerializationError,
    },
    header::Header,
    jwe::{EncryptedContent, Jwe, Recipient},
    jwk::{Jwk, JwkSet},
    jws::{Jws, Signature},
    loader::{JweLoader, JwsLoader, Loader},
    serialization::{parse, JoseObject, Serialization},
    signer::Signer,
    traits::{
        AgreedKey, Algorithm, AlgorithmSignature, ContentEncryption, DirectEncryption,
        KeyAgreement, KeyAgreementWrapping, KeyDelivery, KeyEncryption, KeyWrapping, Renamed,
        SignatureAlgorithm,
    },
    verifier::{VerifiedSignature, Verifier},
};

