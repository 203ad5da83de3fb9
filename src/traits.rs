//! Key traits defined by the crate.
//!
//! There are two layers of traits:
//!
//! - [`Algorithm`] describes a signature algorithm with fully typed keys and signatures.
//!   This is the convenient way to implement a new signature scheme.
//! - Capability traits ([`SignatureAlgorithm`], [`KeyEncryption`], [`KeyWrapping`],
//!   [`KeyAgreement`], [`KeyAgreementWrapping`], [`DirectEncryption`] and
//!   [`ContentEncryption`]) are object-safe and operate on [`Jwk`]s. They are used by
//!   the JOSE engines via [`JoseAlgorithm`](crate::alg::JoseAlgorithm). Every [`Algorithm`]
//!   with keys convertible from [`JsonWebKey`] automatically implements [`SignatureAlgorithm`].

use zeroize::Zeroizing;

use core::num::NonZeroUsize;
use std::borrow::Cow;

use crate::{
    jwk::{JsonWebKey, JwkError},
    Header, Jwk,
};

/// Signature for a certain signing [`Algorithm`].
///
/// We require that signature can be restored from a byte slice,
/// and can be represented as a byte slice.
pub trait AlgorithmSignature: Sized {
    /// Constant byte length of signatures supported by the [`Algorithm`], or `None` if
    /// the signature length is variable.
    ///
    /// If this value is `Some(_)`, signatures of other lengths are rejected during
    /// verification before calling [`Self::try_from_slice()`].
    const LENGTH: Option<NonZeroUsize> = None;

    /// Attempts to restore a signature from a byte slice. This method may fail
    /// if the slice is malformed.
    fn try_from_slice(slice: &[u8]) -> anyhow::Result<Self>;

    /// Represents this signature as bytes.
    fn as_bytes(&self) -> Cow<'_, [u8]>;
}

/// JWS signing algorithm with typed keys.
pub trait Algorithm {
    /// Key used when signing. Private key for public-key cryptosystems.
    type SigningKey;
    /// Key used when verifying signatures. May coincide with [`Self::SigningKey`] for symmetric
    /// algorithms (e.g., `HS*`).
    type VerifyingKey;
    /// Signature produced by the algorithm.
    type Signature: AlgorithmSignature;

    /// Returns the name of this algorithm, as mentioned in the `alg` header parameter.
    fn name(&self) -> Cow<'static, str>;

    /// Signs a `message` with the `signing_key`.
    fn sign(
        &self,
        signing_key: &Self::SigningKey,
        message: &[u8],
    ) -> anyhow::Result<Self::Signature>;

    /// Verifies the `message` against the `signature` and `verifying_key`.
    fn verify_signature(
        &self,
        signature: &Self::Signature,
        verifying_key: &Self::VerifyingKey,
        message: &[u8],
    ) -> bool;
}

/// Algorithm that uses a custom name when signing and verifying.
///
/// # Examples
///
/// ```
/// use jose_compact::{alg::{Hs256, Hs256Key}, Algorithm, Renamed};
///
/// # fn main() -> anyhow::Result<()> {
/// let alg = Renamed::new(Hs256, "HS2");
/// assert_eq!(alg.name(), "HS2");
/// let key = Hs256Key::new(b"super_secret_key_donut_steel");
/// let signature = alg.sign(&key, b"message")?;
/// assert!(Hs256.verify_signature(&signature, &key, b"message"));
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Copy)]
pub struct Renamed<A> {
    inner: A,
    name: &'static str,
}

impl<A: Algorithm> Renamed<A> {
    /// Creates a renamed algorithm.
    pub fn new(algorithm: A, new_name: &'static str) -> Self {
        Self {
            inner: algorithm,
            name: new_name,
        }
    }
}

impl<A: Algorithm> Algorithm for Renamed<A> {
    type SigningKey = A::SigningKey;
    type VerifyingKey = A::VerifyingKey;
    type Signature = A::Signature;

    fn name(&self) -> Cow<'static, str> {
        Cow::Borrowed(self.name)
    }

    fn sign(
        &self,
        signing_key: &Self::SigningKey,
        message: &[u8],
    ) -> anyhow::Result<Self::Signature> {
        self.inner.sign(signing_key, message)
    }

    fn verify_signature(
        &self,
        signature: &Self::Signature,
        verifying_key: &Self::VerifyingKey,
        message: &[u8],
    ) -> bool {
        self.inner
            .verify_signature(signature, verifying_key, message)
    }
}

/// Signature capability operating on JWKs.
pub trait SignatureAlgorithm: Send + Sync {
    /// Name of the algorithm (the `alg` header parameter).
    fn name(&self) -> Cow<'static, str>;

    /// Signs `input` with the private `key`.
    fn sign(&self, key: &Jwk, input: &[u8]) -> anyhow::Result<Vec<u8>>;

    /// Verifies a `signature` over `input`. Returns `Ok(false)` if the signature is
    /// well-formed but invalid, and an error if the key is unusable.
    fn verify(&self, key: &Jwk, input: &[u8], signature: &[u8]) -> anyhow::Result<bool>;
}

impl<A> SignatureAlgorithm for A
where
    A: Algorithm + Send + Sync,
    A::SigningKey: for<'a> TryFrom<&'a JsonWebKey<'static>, Error = JwkError>,
    A::VerifyingKey: for<'a> TryFrom<&'a JsonWebKey<'static>, Error = JwkError>,
{
    fn name(&self) -> Cow<'static, str> {
        Algorithm::name(self)
    }

    fn sign(&self, key: &Jwk, input: &[u8]) -> anyhow::Result<Vec<u8>> {
        let material = key.material()?;
        let signing_key = A::SigningKey::try_from(&material)?;
        let signature = Algorithm::sign(self, &signing_key, input)?;
        Ok(signature.as_bytes().into_owned())
    }

    fn verify(&self, key: &Jwk, input: &[u8], signature: &[u8]) -> anyhow::Result<bool> {
        if let Some(expected_len) = A::Signature::LENGTH {
            if signature.len() != expected_len.get() {
                return Ok(false);
            }
        }
        let material = key.material()?;
        let verifying_key = A::VerifyingKey::try_from(&material)?;
        let signature = A::Signature::try_from_slice(signature)?;
        Ok(self.verify_signature(&signature, &verifying_key, input))
    }
}

/// Output of delivering a CEK to a recipient: the encrypted key and header parameters
/// that the algorithm wants to publish (e.g., `epk` for ECDH-ES).
#[derive(Debug, Clone, Default)]
pub struct KeyDelivery {
    /// Encrypted (wrapped) CEK.
    pub encrypted_key: Vec<u8>,
    /// Header parameters produced by the algorithm.
    pub additional_header: Header,
}

/// CEK agreed upon by a key agreement algorithm, together with the header parameters
/// necessary for the recipient to derive the same key.
#[derive(Debug, Clone)]
pub struct AgreedKey {
    /// Agreed content encryption key.
    pub cek: Zeroizing<Vec<u8>>,
    /// Header parameters produced by the algorithm.
    pub additional_header: Header,
}

/// Key encryption (`enc` key management mode), e.g. `RSA-OAEP-256`.
pub trait KeyEncryption: Send + Sync {
    /// Name of the algorithm.
    fn name(&self) -> Cow<'static, str>;

    /// Encrypts the `cek` for the recipient `key`.
    fn encrypt_key(&self, key: &Jwk, cek: &[u8], header: &Header) -> anyhow::Result<KeyDelivery>;

    /// Decrypts the CEK with the private recipient `key`. `cek_len` is the CEK length
    /// expected by the content encryption algorithm.
    fn decrypt_key(
        &self,
        key: &Jwk,
        encrypted_key: &[u8],
        cek_len: usize,
        header: &Header,
    ) -> anyhow::Result<Zeroizing<Vec<u8>>>;
}

/// Key wrapping (`wrap` key management mode), e.g. `A128KW`.
pub trait KeyWrapping: Send + Sync {
    /// Name of the algorithm.
    fn name(&self) -> Cow<'static, str>;

    /// Wraps the `cek` with the shared `key`.
    fn wrap_key(&self, key: &Jwk, cek: &[u8], header: &Header) -> anyhow::Result<KeyDelivery>;

    /// Unwraps the CEK with the shared `key`.
    fn unwrap_key(
        &self,
        key: &Jwk,
        encrypted_key: &[u8],
        header: &Header,
    ) -> anyhow::Result<Zeroizing<Vec<u8>>>;
}

/// Key agreement with the agreed key used directly as the CEK (`agree` mode), e.g. `ECDH-ES`.
pub trait KeyAgreement: Send + Sync {
    /// Name of the algorithm.
    fn name(&self) -> Cow<'static, str>;

    /// Agrees on a `cek_len`-byte CEK for the content encryption algorithm `encryption`
    /// on the sender side. If `sender_key` is not specified, an ephemeral key is generated.
    fn agree_key(
        &self,
        recipient_key: &Jwk,
        sender_key: Option<&Jwk>,
        encryption: &str,
        cek_len: usize,
        header: &Header,
    ) -> anyhow::Result<AgreedKey>;

    /// Derives the CEK on the recipient side using parameters from the `header`.
    fn derive_key(
        &self,
        recipient_key: &Jwk,
        encryption: &str,
        cek_len: usize,
        header: &Header,
    ) -> anyhow::Result<Zeroizing<Vec<u8>>>;
}

/// Key agreement with the agreed key used to wrap the CEK (`agree+wrap` mode),
/// e.g. `ECDH-ES+A128KW`.
pub trait KeyAgreementWrapping: Send + Sync {
    /// Name of the algorithm.
    fn name(&self) -> Cow<'static, str>;

    /// Agrees on a key-wrapping key and wraps the `cek` with it.
    fn wrap_agreement_key(
        &self,
        recipient_key: &Jwk,
        sender_key: Option<&Jwk>,
        cek: &[u8],
        header: &Header,
    ) -> anyhow::Result<KeyDelivery>;

    /// Derives the key-wrapping key on the recipient side and unwraps the CEK.
    fn unwrap_agreement_key(
        &self,
        recipient_key: &Jwk,
        encrypted_key: &[u8],
        header: &Header,
    ) -> anyhow::Result<Zeroizing<Vec<u8>>>;
}

/// Direct encryption with a shared symmetric key used as the CEK (`dir` mode).
pub trait DirectEncryption: Send + Sync {
    /// Name of the algorithm.
    fn name(&self) -> Cow<'static, str>;

    /// Returns the CEK contained in the `key`.
    fn cek(&self, key: &Jwk) -> anyhow::Result<Zeroizing<Vec<u8>>>;
}

/// Authenticated content encryption, e.g. `A128GCM`.
pub trait ContentEncryption: Send + Sync {
    /// Name of the algorithm (the `enc` header parameter).
    fn name(&self) -> Cow<'static, str>;

    /// Byte length of the CEK.
    fn cek_len(&self) -> usize;

    /// Byte length of the initialization vector.
    fn iv_len(&self) -> usize;

    /// Encrypts `plaintext`, returning the ciphertext and the authentication tag.
    fn encrypt(
        &self,
        plaintext: &[u8],
        cek: &[u8],
        iv: &[u8],
        aad: &[u8],
    ) -> anyhow::Result<(Vec<u8>, Vec<u8>)>;

    /// Verifies the authentication `tag` and decrypts `ciphertext`.
    fn decrypt(
        &self,
        ciphertext: &[u8],
        cek: &[u8],
        iv: &[u8],
        aad: &[u8],
        tag: &[u8],
    ) -> anyhow::Result<Vec<u8>>;
}
