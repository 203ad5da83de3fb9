//! Basic support of [JSON Web Keys](https://tools.ietf.org/html/rfc7517.html) (JWK).
//!
//! Keys come in two presentations:
//!
//! - [`Jwk`] is a JSON object with arbitrary fields, as supplied by the caller. This is what
//!   the JOSE engines work with: it exposes `use`, `key_ops`, `alg` and `kid` accessors
//!   and performs capability checks via [`Jwk::check_purpose()`].
//! - [`JsonWebKey`] is a typed view of the key material, which crypto backends convert
//!   from and to via [`TryFrom`] / [`From`].
//!
//! [`JsonWebKey`]s can be (de)serialized using [`serde`] infrastructure, and can be used
//! to compute key thumbprint as per [RFC 7638].
//!
//! [`serde`]: https://crates.io/crates/serde
//! [RFC 7638]: https://tools.ietf.org/html/rfc7638
//!
//! # Examples
//!
//! ```
//! use jose_compact::{alg::Hs256Key, jwk::{JsonWebKey, KeyPurpose}, Jwk};
//! use sha2::Sha256;
//!
//! # fn main() -> anyhow::Result<()> {
//! let json_str = r#"
//!     { "kty": "oct", "kid": "hmac", "use": "sig", "k": "t-bdv41MJXExXnpquHBuDn7n1YGyX7gLQchVHAoNu50" }
//! "#;
//! let jwk: Jwk = serde_json::from_str(json_str)?;
//! assert_eq!(jwk.key_id(), Some("hmac"));
//! jwk.check_purpose(KeyPurpose::Signing)?;
//! assert!(jwk.check_purpose(KeyPurpose::Encryption).is_err());
//!
//! // Convert to a backend-specific key.
//! let key = Hs256Key::try_from(&jwk.material()?)?;
//! // ...and back.
//! assert_eq!(JsonWebKey::from(&key), jwk.material()?);
//!
//! // Compute the key thumbprint.
//! let thumbprint = jwk.thumbprint::<Sha256>()?;
//! # Ok(())
//! # }
//! ```

use serde::{de::Error as DeError, Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use sha2::digest::{Digest, Output};

use core::fmt;
use std::borrow::Cow;

use crate::{alg::SecretBytes, base64url, CapabilityError};

/// Type of a [`JsonWebKey`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum KeyType {
    /// Public or private RSA key. Maps to the `RSA` value of the `kty` field for JWKs.
    Rsa,
    /// Public or private key in an ECDSA crypto system. Maps to the `EC` value
    /// of the `kty` field for JWKs.
    EllipticCurve,
    /// Symmetric key. Maps to the `oct` value of the `kty` field for JWKs.
    Symmetric,
    /// Generic asymmetric key. Maps to the `OKP` value of the `kty` field for JWKs.
    KeyPair,
}

impl fmt::Display for KeyType {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(match self {
            Self::Rsa => "RSA",
            Self::EllipticCurve => "EC",
            Self::Symmetric => "oct",
            Self::KeyPair => "OKP",
        })
    }
}

/// Errors that can occur when transforming a [`JsonWebKey`] into the presentation specific for
/// a crypto backend, via [`TryFrom`] trait.
#[derive(Debug)]
#[non_exhaustive]
pub enum JwkError {
    /// Required field is absent from JWK.
    NoField(String),
    /// Key type (the `kty` field) is not as expected.
    UnexpectedKeyType {
        /// Expected key type.
        expected: KeyType,
        /// Actual key type.
        actual: KeyType,
    },
    /// JWK field has an unexpected value.
    UnexpectedValue {
        /// Field name.
        field: String,
        /// Expected value of the field.
        expected: String,
        /// Actual value of the field.
        actual: String,
    },
    /// JWK field has an unexpected byte length.
    UnexpectedLen {
        /// Field name.
        field: String,
        /// Expected byte length of the field.
        expected: usize,
        /// Actual byte length of the field.
        actual: usize,
    },
    /// Signing and verifying keys do not match.
    MismatchedKeys,
    /// JWK fields cannot be interpreted as key material (e.g., unknown `kty`
    /// or invalid base64url encoding).
    Malformed(serde_json::Error),
    /// Custom error specific to a crypto backend.
    Custom(anyhow::Error),
}

impl fmt::Display for JwkError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnexpectedKeyType { expected, actual } => {
                write!(formatter, "unexpected key type: {actual} (expected {expected})")
            }
            Self::NoField(field) => write!(formatter, "field `{field}` is absent from JWK"),
            Self::UnexpectedValue {
                field,
                expected,
                actual,
            } => {
                write!(
                    formatter,
                    "field `{field}` has unexpected value (expected: {expected}, got: {actual})"
                )
            }
            Self::UnexpectedLen {
                field,
                expected,
                actual,
            } => {
                write!(
                    formatter,
                    "field `{field}` has unexpected length (expected: {expected}, got: {actual})"
                )
            }
            Self::MismatchedKeys => {
                formatter.write_str("private and public keys encoded in JWK do not match")
            }
            Self::Malformed(err) => write!(formatter, "malformed key material: {err}"),
            Self::Custom(err) => fmt::Display::fmt(err, formatter),
        }
    }
}

impl std::error::Error for JwkError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Malformed(err) => Some(err),
            Self::Custom(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl JwkError {
    /// Creates a `Custom` error variant.
    pub fn custom(err: impl Into<anyhow::Error>) -> Self {
        Self::Custom(err.into())
    }

    pub(crate) fn key_type(jwk: &JsonWebKey<'_>, expected: KeyType) -> Self {
        let actual = jwk.key_type();
        debug_assert_ne!(actual, expected);
        Self::UnexpectedKeyType { actual, expected }
    }
}

impl Serialize for SecretBytes<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        base64url::serialize(self.as_ref(), serializer)
    }
}

impl<'de> Deserialize<'de> for SecretBytes<'_> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        base64url::deserialize(deserializer).map(SecretBytes::new)
    }
}

/// Typed view of the key material of a [JWK].
///
/// See [RFC 7518] for the details about key presentation.
///
/// [`Self::thumbprint()`] and the [`Display`](fmt::Display) implementation
/// allow to get the overall presentation of the key. The latter returns JSON serialization
/// of the key with fields ordered alphabetically. That is, this output for verifying keys
/// can be used to compute key thumbprints.
///
/// [RFC 7518]: https://tools.ietf.org/html/rfc7518#section-6
/// [JWK]: https://tools.ietf.org/html/rfc7517.html
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kty")]
#[non_exhaustive]
pub enum JsonWebKey<'a> {
    /// Public or private RSA key. Has `kty` field set to `RSA`.
    #[serde(rename = "RSA")]
    Rsa {
        /// Key modulus (`n`). Serialized in the base64-url encoding using
        /// the big endian presentation with the minimum necessary number of bytes.
        #[serde(rename = "n", with = "base64url")]
        modulus: Cow<'a, [u8]>,
        /// Public exponent (`e`). Serialized in the base64-url encoding using
        /// the big endian presentation with the minimum necessary number of bytes.
        #[serde(rename = "e", with = "base64url")]
        public_exponent: Cow<'a, [u8]>,
        /// Private RSA parameters. Only present for private keys.
        #[serde(flatten)]
        private_parts: Option<RsaPrivateParts<'a>>,
    },
    /// Public or private key in an ECDSA / ECDH crypto system. Has `kty` field set to `EC`.
    #[serde(rename = "EC")]
    EllipticCurve {
        /// Curve name (`crv`), such as `P-256`.
        #[serde(rename = "crv")]
        curve: Cow<'a, str>,
        /// `x` coordinate of the curve point. Serialized in the base64-url encoding.
        #[serde(with = "base64url")]
        x: Cow<'a, [u8]>,
        /// `y` coordinate of the curve point. Serialized in the base64-url encoding.
        #[serde(with = "base64url")]
        y: Cow<'a, [u8]>,
        /// Secret scalar (not present for public keys). Serialized in the base64-url encoding.
        #[serde(rename = "d", default, skip_serializing_if = "Option::is_none")]
        secret: Option<SecretBytes<'a>>,
    },
    /// Generic symmetric key, e.g. for `HS256` or `A128KW` algorithms.
    /// Has `kty` field set to `oct`.
    #[serde(rename = "oct")]
    Symmetric {
        /// Bytes representing this key. Serialized in the base64-url encoding.
        #[serde(rename = "k")]
        secret: SecretBytes<'a>,
    },
    /// Generic asymmetric key. This key type is used, for example for Ed25519 keys.
    #[serde(rename = "OKP")]
    KeyPair {
        /// Curve name (`crv`), such as `Ed25519`.
        #[serde(rename = "crv")]
        curve: Cow<'a, str>,
        /// Public key. Serialized in the base64-url encoding.
        #[serde(with = "base64url")]
        x: Cow<'a, [u8]>,
        /// Secret key (not present for public keys). Serialized in the base64-url encoding.
        /// For Ed25519, this is the *seed*.
        #[serde(rename = "d", default, skip_serializing_if = "Option::is_none")]
        secret: Option<SecretBytes<'a>>,
    },
}

impl JsonWebKey<'_> {
    /// Gets the type of this key.
    pub fn key_type(&self) -> KeyType {
        match self {
            Self::Rsa { .. } => KeyType::Rsa,
            Self::EllipticCurve { .. } => KeyType::EllipticCurve,
            Self::Symmetric { .. } => KeyType::Symmetric,
            Self::KeyPair { .. } => KeyType::KeyPair,
        }
    }

    /// Returns a copy of this key with parts not necessary for signature verification removed.
    pub fn to_verifying_key(&self) -> Self {
        match self {
            Self::Rsa {
                modulus,
                public_exponent,
                ..
            } => Self::Rsa {
                modulus: modulus.clone(),
                public_exponent: public_exponent.clone(),
                private_parts: None,
            },

            Self::EllipticCurve { curve, x, y, .. } => Self::EllipticCurve {
                curve: curve.clone(),
                x: x.clone(),
                y: y.clone(),
                secret: None,
            },

            Self::Symmetric { secret } => Self::Symmetric {
                secret: secret.clone(),
            },

            Self::KeyPair { curve, x, .. } => Self::KeyPair {
                curve: curve.clone(),
                x: x.clone(),
                secret: None,
            },
        }
    }

    /// Computes a thumbprint of this JWK. The result complies to key thumbprint defined
    /// in [RFC 7638].
    ///
    /// [RFC 7638]: https://tools.ietf.org/html/rfc7638
    pub fn thumbprint<D: Digest>(&self) -> Output<D> {
        D::digest(self.to_verifying_key().to_string().as_bytes())
    }

    pub(crate) fn ensure_curve(curve: &str, expected: &str) -> Result<(), JwkError> {
        if curve == expected {
            Ok(())
        } else {
            Err(JwkError::UnexpectedValue {
                field: "crv".to_owned(),
                expected: expected.to_owned(),
                actual: curve.to_owned(),
            })
        }
    }

    pub(crate) fn ensure_len(
        field: &str,
        bytes: &[u8],
        expected_len: usize,
    ) -> Result<(), JwkError> {
        if bytes.len() == expected_len {
            Ok(())
        } else {
            Err(JwkError::UnexpectedLen {
                field: field.to_owned(),
                expected: expected_len,
                actual: bytes.len(),
            })
        }
    }

    /// Returns the secret of a symmetric key.
    pub(crate) fn symmetric_secret(&self) -> Result<&[u8], JwkError> {
        match self {
            Self::Symmetric { secret } => Ok(secret),
            _ => Err(JwkError::key_type(self, KeyType::Symmetric)),
        }
    }
}

#[cfg(any(feature = "p256", feature = "ed25519-dalek"))]
impl JsonWebKey<'_> {
    /// Ensures that the provided signing key matches the verifying key restored from the same JWK.
    /// This is useful when implementing [`TryFrom`] conversion from `JsonWebKey` for private keys.
    pub(crate) fn ensure_key_match<Alg, K>(&self, signing_key: K) -> Result<K, JwkError>
    where
        Alg: crate::Algorithm<SigningKey = K>,
        K: crate::alg::SigningKey<Alg>,
        Alg::VerifyingKey: for<'jwk> TryFrom<&'jwk Self, Error = JwkError> + PartialEq,
    {
        let verifying_key = <Alg::VerifyingKey>::try_from(self)?;
        if verifying_key == signing_key.to_verifying_key() {
            Ok(signing_key)
        } else {
            Err(JwkError::MismatchedKeys)
        }
    }
}

impl fmt::Display for JsonWebKey<'_> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let json_value = serde_json::to_value(self).map_err(|_| fmt::Error)?;
        let Value::Object(json_value) = json_value else {
            return Err(fmt::Error);
        };
        let mut json_entries: Vec<_> = json_value.iter().collect();
        json_entries.sort_unstable_by(|(x, _), (y, _)| x.cmp(y));

        formatter.write_str("{")?;
        let field_count = json_entries.len();
        for (i, (name, value)) in json_entries.into_iter().enumerate() {
            write!(formatter, "\"{name}\":{value}")?;
            if i + 1 < field_count {
                formatter.write_str(",")?;
            }
        }
        formatter.write_str("}")
    }
}

/// Parts of [`JsonWebKey::Rsa`] that are specific to private keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RsaPrivateParts<'a> {
    /// Private exponent (`d`).
    #[serde(rename = "d")]
    pub private_exponent: SecretBytes<'a>,
    /// First prime factor (`p`).
    #[serde(rename = "p")]
    pub prime_factor_p: SecretBytes<'a>,
    /// Second prime factor (`q`).
    #[serde(rename = "q")]
    pub prime_factor_q: SecretBytes<'a>,
    /// First factor CRT exponent (`dp`).
    #[serde(rename = "dp", default, skip_serializing_if = "Option::is_none")]
    pub p_crt_exponent: Option<SecretBytes<'a>>,
    /// Second factor CRT exponent (`dq`).
    #[serde(rename = "dq", default, skip_serializing_if = "Option::is_none")]
    pub q_crt_exponent: Option<SecretBytes<'a>>,
    /// CRT coefficient of the second factor (`qi`).
    #[serde(rename = "qi", default, skip_serializing_if = "Option::is_none")]
    pub q_crt_coefficient: Option<SecretBytes<'a>>,
    /// Other prime factors.
    #[serde(rename = "oth", default, skip_serializing_if = "Vec::is_empty")]
    pub other_prime_factors: Vec<RsaPrimeFactor<'a>>,
}

/// Block for an additional prime factor in [`RsaPrivateParts`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RsaPrimeFactor<'a> {
    /// Prime factor (`r`).
    #[serde(rename = "r")]
    pub factor: SecretBytes<'a>,
    /// Factor CRT exponent (`d`).
    #[serde(rename = "d", default, skip_serializing_if = "Option::is_none")]
    pub crt_exponent: Option<SecretBytes<'a>>,
    /// Factor CRT coefficient (`t`).
    #[serde(rename = "t", default, skip_serializing_if = "Option::is_none")]
    pub crt_coefficient: Option<SecretBytes<'a>>,
}

/// Operation a [`Jwk`] is going to be used for. Determines which values of the `use`
/// and `key_ops` parameters are acceptable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyPurpose {
    /// Creating signatures. Requires a private key.
    Signing,
    /// Verifying signatures.
    Verification,
    /// Delivering a CEK to a recipient (encrypting, wrapping or deriving it).
    Encryption,
    /// Recovering a CEK as a recipient. Requires a private key.
    Decryption,
}

impl KeyPurpose {
    fn key_use(self) -> &'static str {
        match self {
            Self::Signing | Self::Verification => "sig",
            Self::Encryption | Self::Decryption => "enc",
        }
    }

    fn key_ops(self) -> &'static [&'static str] {
        match self {
            Self::Signing => &["sign"],
            Self::Verification => &["verify"],
            Self::Encryption => &["encrypt", "wrapKey", "deriveKey"],
            Self::Decryption => &["decrypt", "unwrapKey", "deriveKey"],
        }
    }

    fn requires_private_key(self) -> bool {
        matches!(self, Self::Signing | Self::Decryption)
    }
}

/// JSON Web Key with arbitrary fields.
///
/// The only required field is `kty`. A key is immutable; methods such as
/// [`Self::with_param()`] return modified copies.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Jwk(Map<String, Value>);

impl<'de> Deserialize<'de> for Jwk {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let fields = Map::<String, Value>::deserialize(deserializer)?;
        Self::from_fields(fields).map_err(D::Error::custom)
    }
}

impl TryFrom<Map<String, Value>> for Jwk {
    type Error = JwkError;

    fn try_from(fields: Map<String, Value>) -> Result<Self, Self::Error> {
        Self::from_fields(fields)
    }
}

impl From<&JsonWebKey<'_>> for Jwk {
    fn from(key: &JsonWebKey<'_>) -> Self {
        match serde_json::to_value(key) {
            Ok(Value::Object(fields)) => Self(fields),
            // `JsonWebKey` is always serialized as an object containing `kty`.
            _ => unreachable!("`JsonWebKey` serialization is not an object"),
        }
    }
}

impl fmt::Display for Jwk {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let json = serde_json::to_string(&self.0).map_err(|_| fmt::Error)?;
        formatter.write_str(&json)
    }
}

impl Jwk {
    fn from_fields(fields: Map<String, Value>) -> Result<Self, JwkError> {
        match fields.get("kty") {
            Some(Value::String(_)) => Ok(Self(fields)),
            Some(other) => Err(JwkError::UnexpectedValue {
                field: "kty".to_owned(),
                expected: "string".to_owned(),
                actual: other.to_string(),
            }),
            None => Err(JwkError::NoField("kty".to_owned())),
        }
    }

    /// Creates a symmetric (`oct`) key with the specified secret bytes.
    pub fn symmetric(secret: impl AsRef<[u8]>) -> Self {
        Self::from(&JsonWebKey::Symmetric {
            secret: SecretBytes::borrowed(secret.as_ref()),
        })
    }

    /// Returns the key type (the `kty` field).
    pub fn key_type(&self) -> &str {
        self.0.get("kty").and_then(Value::as_str).unwrap_or_default()
    }

    /// Returns the intended key usage (the `use` field).
    pub fn key_use(&self) -> Option<&str> {
        self.get_str("use")
    }

    /// Returns the permitted key operations (the `key_ops` field). Non-string entries
    /// are skipped.
    pub fn key_ops(&self) -> Option<Vec<&str>> {
        let ops = self.0.get("key_ops")?.as_array()?;
        Some(ops.iter().filter_map(Value::as_str).collect())
    }

    /// Returns the algorithm the key is intended for (the `alg` field).
    pub fn algorithm(&self) -> Option<&str> {
        self.get_str("alg")
    }

    /// Returns the key ID (the `kid` field).
    pub fn key_id(&self) -> Option<&str> {
        self.get_str("kid")
    }

    /// Gets an arbitrary field.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    fn get_str(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(Value::as_str)
    }

    /// Returns the underlying JSON object.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Checks whether this key contains private material. Symmetric keys are always private.
    pub fn is_private(&self) -> bool {
        self.key_type() == "oct" || self.0.contains_key("d")
    }

    /// Returns a copy of this key with the specified field set.
    ///
    /// # Errors
    ///
    /// Returns an error if `name` is `kty` and `value` is not a string.
    pub fn with_param(
        &self,
        name: impl Into<String>,
        value: impl Into<Value>,
    ) -> Result<Self, JwkError> {
        let mut fields = self.0.clone();
        fields.insert(name.into(), value.into());
        Self::from_fields(fields)
    }

    /// Returns a copy of this key with all private fields removed. For symmetric keys,
    /// this is the same key.
    #[must_use]
    pub fn to_public(&self) -> Self {
        const PRIVATE_FIELDS: &[&str] = &["d", "p", "q", "dp", "dq", "qi", "oth"];

        if self.key_type() == "oct" {
            return self.clone();
        }
        let mut fields = self.0.clone();
        for &field in PRIVATE_FIELDS {
            fields.remove(field);
        }
        Self(fields)
    }

    /// Decodes the typed key material from the JWK fields.
    pub fn material(&self) -> Result<JsonWebKey<'static>, JwkError> {
        serde_json::from_value(Value::Object(self.0.clone())).map_err(JwkError::Malformed)
    }

    /// Computes the [RFC 7638] thumbprint of this key.
    ///
    /// [RFC 7638]: https://tools.ietf.org/html/rfc7638
    pub fn thumbprint<D: Digest>(&self) -> Result<Output<D>, JwkError> {
        Ok(self.material()?.thumbprint::<D>())
    }

    /// Checks whether the key can be used for the specified `purpose` according to
    /// its `use` and `key_ops` fields and whether it is private.
    pub fn check_purpose(&self, purpose: KeyPurpose) -> Result<(), CapabilityError> {
        match self.0.get("use") {
            None => { /* any usage is allowed */ }
            Some(Value::String(key_use)) => {
                if key_use != purpose.key_use() {
                    return Err(CapabilityError::KeyUsageForbidden {
                        key_use: key_use.clone(),
                        expected: purpose.key_use(),
                    });
                }
            }
            Some(_) => return Err(CapabilityError::MalformedParameter("use")),
        }

        match self.0.get("key_ops") {
            None => { /* any operation is allowed */ }
            Some(Value::Array(ops)) => {
                let expected = purpose.key_ops();
                let is_allowed = ops
                    .iter()
                    .any(|op| op.as_str().map_or(false, |op| expected.contains(&op)));
                if !is_allowed {
                    return Err(CapabilityError::KeyOperationForbidden { expected });
                }
            }
            Some(_) => return Err(CapabilityError::MalformedParameter("key_ops")),
        }

        if purpose.requires_private_key() && !self.is_private() {
            return Err(CapabilityError::NotPrivate);
        }
        Ok(())
    }

    /// Checks that the key may be used with the `algorithm`: if the key declares `alg`,
    /// it must coincide with `algorithm`.
    pub fn check_algorithm(&self, algorithm: &str) -> Result<(), CapabilityError> {
        match self.0.get("alg") {
            None => Ok(()),
            Some(Value::String(key_alg)) if key_alg == algorithm => Ok(()),
            Some(Value::String(key_alg)) => Err(CapabilityError::AlgorithmMismatch {
                key_alg: key_alg.clone(),
                header_alg: algorithm.to_owned(),
            }),
            Some(_) => Err(CapabilityError::MalformedParameter("alg")),
        }
    }
}

/// Ordered set of [`Jwk`]s. Keys are tried in the insertion order during verification
/// and decryption. Key IDs are not required to be unique.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JwkSet {
    keys: Vec<Jwk>,
}

impl From<Vec<Jwk>> for JwkSet {
    fn from(keys: Vec<Jwk>) -> Self {
        Self { keys }
    }
}

impl FromIterator<Jwk> for JwkSet {
    fn from_iter<I: IntoIterator<Item = Jwk>>(iter: I) -> Self {
        Self {
            keys: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a JwkSet {
    type Item = &'a Jwk;
    type IntoIter = std::slice::Iter<'a, Jwk>;

    fn into_iter(self) -> Self::IntoIter {
        self.keys.iter()
    }
}

impl JwkSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a key to the set.
    #[must_use]
    pub fn with_key(mut self, key: Jwk) -> Self {
        self.keys.push(key);
        self
    }

    /// Iterates over keys in the insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Jwk> + '_ {
        self.keys.iter()
    }

    /// Returns the number of keys in the set.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Checks whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Gets a key by its index.
    pub fn get(&self, index: usize) -> Option<&Jwk> {
        self.keys.get(index)
    }

    /// Selects keys with the specified `kid`, preserving their order.
    pub fn select_by_key_id(&self, key_id: &str) -> Self {
        self.keys
            .iter()
            .filter(|key| key.key_id() == Some(key_id))
            .cloned()
            .collect()
    }
}
