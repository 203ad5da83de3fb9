//! JWS algorithms based on HMACs.

use anyhow::ensure;
use hmac::{
    digest::{generic_array::GenericArray, CtOutput},
    Hmac, Mac as _,
};
use rand_core::{CryptoRng, RngCore};
use sha2::{Digest, Sha256, Sha384, Sha512};
use smallvec::{smallvec, SmallVec};
use zeroize::Zeroize;

use core::fmt;
use std::borrow::Cow;

use crate::{
    alg::{SecretBytes, SigningKey, VerifyingKey},
    jwk::{JsonWebKey, JwkError, KeyType},
    Algorithm, AlgorithmSignature,
};

macro_rules! define_hmac_signature {
    (
        $(#[$($attr:meta)+])*
        struct $name:ident<$digest:ident>;
    ) => {
        $(#[$($attr)+])*
        #[derive(Clone, PartialEq, Eq)]
        pub struct $name(CtOutput<Hmac<$digest>>);

        impl fmt::Debug for $name {
            fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
                formatter.debug_tuple(stringify!($name)).field(&"_").finish()
            }
        }

        impl AlgorithmSignature for $name {
            fn try_from_slice(bytes: &[u8]) -> anyhow::Result<Self> {
                let expected_len = <$digest as Digest>::output_size();
                ensure!(bytes.len() == expected_len, "invalid signature length");
                let bytes = GenericArray::clone_from_slice(bytes);
                Ok(Self(CtOutput::new(bytes)))
            }

            fn as_bytes(&self) -> Cow<'_, [u8]> {
                Cow::Owned(self.0.clone().into_bytes().to_vec())
            }
        }
    };
}

define_hmac_signature!(
    /// Signature produced by the [`Hs256`] algorithm.
    struct Hs256Signature<Sha256>;
);
define_hmac_signature!(
    /// Signature produced by the [`Hs384`] algorithm.
    struct Hs384Signature<Sha384>;
);
define_hmac_signature!(
    /// Signature produced by the [`Hs512`] algorithm.
    struct Hs512Signature<Sha512>;
);

macro_rules! define_hmac_key {
    (
        $(#[$($attr:meta)+])*
        struct $name:ident<$digest:ident>([u8; $buffer_size:expr]);
    ) => {
        $(#[$($attr)+])*
        #[derive(Clone, Zeroize)]
        #[zeroize(drop)]
        pub struct $name(pub(crate) SmallVec<[u8; $buffer_size]>);

        impl fmt::Debug for $name {
            fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
                formatter.debug_tuple(stringify!($name)).field(&"_").finish()
            }
        }

        impl $name {
            /// Generates a random key using a cryptographically secure RNG. The key length
            /// is equal to the output size of the hash function.
            pub fn generate<R: CryptoRng + RngCore>(rng: &mut R) -> Self {
                let mut key = $name(smallvec![0; <$digest as Digest>::output_size()]);
                rng.fill_bytes(&mut key.0);
                key
            }

            /// Creates a key from the specified `bytes`.
            pub fn new(bytes: impl AsRef<[u8]>) -> Self {
                Self(bytes.as_ref().into())
            }

            /// Computes HMAC with this key and the specified `message`.
            fn hmac(&self, message: impl AsRef<[u8]>) -> anyhow::Result<CtOutput<Hmac<$digest>>> {
                let mut hmac = Hmac::<$digest>::new_from_slice(&self.0)
                    .map_err(|err| anyhow::anyhow!("cannot initialize HMAC: {err}"))?;
                hmac.update(message.as_ref());
                Ok(hmac.finalize())
            }
        }

        impl From<&[u8]> for $name {
            fn from(bytes: &[u8]) -> Self {
                $name(bytes.into())
            }
        }

        impl AsRef<[u8]> for $name {
            fn as_ref(&self) -> &[u8] {
                &self.0
            }
        }

        impl AsMut<[u8]> for $name {
            fn as_mut(&mut self) -> &mut [u8] {
                &mut self.0
            }
        }
    };
}

define_hmac_key! {
    /// Signing / verifying key for `HS256` algorithm. Zeroed on drop.
    struct Hs256Key<Sha256>([u8; 64]);
}
define_hmac_key! {
    /// Signing / verifying key for `HS384` algorithm. Zeroed on drop.
    struct Hs384Key<Sha384>([u8; 128]);
}
define_hmac_key! {
    /// Signing / verifying key for `HS512` algorithm. Zeroed on drop.
    struct Hs512Key<Sha512>([u8; 128]);
}

macro_rules! define_hmac_algorithm {
    (
        $(#[$($attr:meta)+])*
        struct $name:ident($alg_name:literal, $key:ident, $signature:ident);
    ) => {
        $(#[$($attr)+])*
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
        pub struct $name;

        impl Algorithm for $name {
            type SigningKey = $key;
            type VerifyingKey = $key;
            type Signature = $signature;

            fn name(&self) -> Cow<'static, str> {
                Cow::Borrowed($alg_name)
            }

            fn sign(
                &self,
                signing_key: &Self::SigningKey,
                message: &[u8],
            ) -> anyhow::Result<Self::Signature> {
                signing_key.hmac(message).map($signature)
            }

            fn verify_signature(
                &self,
                signature: &Self::Signature,
                verifying_key: &Self::VerifyingKey,
                message: &[u8],
            ) -> bool {
                // `CtOutput` comparison is constant-time.
                verifying_key
                    .hmac(message)
                    .map_or(false, |expected| expected == signature.0)
            }
        }
    };
}

define_hmac_algorithm! {
    /// `HS256` signing algorithm.
    ///
    /// See [RFC 7518] for the algorithm specification.
    ///
    /// [RFC 7518]: https://tools.ietf.org/html/rfc7518#section-3.2
    struct Hs256("HS256", Hs256Key, Hs256Signature);
}
define_hmac_algorithm! {
    /// `HS384` signing algorithm.
    ///
    /// See [RFC 7518] for the algorithm specification.
    ///
    /// [RFC 7518]: https://tools.ietf.org/html/rfc7518#section-3.2
    struct Hs384("HS384", Hs384Key, Hs384Signature);
}
define_hmac_algorithm! {
    /// `HS512` signing algorithm.
    ///
    /// See [RFC 7518] for the algorithm specification.
    ///
    /// [RFC 7518]: https://tools.ietf.org/html/rfc7518#section-3.2
    struct Hs512("HS512", Hs512Key, Hs512Signature);
}

macro_rules! impl_key_traits {
    ($key:ident<$alg:ident>) => {
        impl SigningKey<$alg> for $key {
            fn from_slice(raw: &[u8]) -> anyhow::Result<Self> {
                Ok(Self::from(raw))
            }

            fn to_verifying_key(&self) -> Self {
                self.clone()
            }

            fn as_bytes(&self) -> SecretBytes<'_> {
                SecretBytes::borrowed(self.as_ref())
            }
        }

        impl VerifyingKey<$alg> for $key {
            fn from_slice(raw: &[u8]) -> anyhow::Result<Self> {
                Ok(Self::from(raw))
            }

            fn as_bytes(&self) -> Cow<'_, [u8]> {
                Cow::Borrowed(self.as_ref())
            }
        }

        impl<'a> From<&'a $key> for JsonWebKey<'a> {
            fn from(key: &'a $key) -> JsonWebKey<'a> {
                JsonWebKey::Symmetric {
                    secret: SecretBytes::borrowed(key.as_ref()),
                }
            }
        }

        impl TryFrom<&JsonWebKey<'_>> for $key {
            type Error = JwkError;

            fn try_from(jwk: &JsonWebKey<'_>) -> Result<Self, Self::Error> {
                match jwk {
                    JsonWebKey::Symmetric { secret } => Ok(Self::new(secret)),
                    _ => Err(JwkError::key_type(jwk, KeyType::Symmetric)),
                }
            }
        }
    };
}

impl_key_traits!(Hs256Key<Hs256>);
impl_key_traits!(Hs384Key<Hs384>);
impl_key_traits!(Hs512Key<Hs512>);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{traits::SignatureAlgorithm, Jwk};

    use assert_matches::assert_matches;
    use rand::thread_rng;

    #[test]
    fn hmac_signature_lengths() {
        let key = Hs384Key::generate(&mut thread_rng());
        assert_eq!(key.as_ref().len(), 48);
        let signature = Algorithm::sign(&Hs384, &key, b"message").unwrap();
        assert_eq!(signature.as_bytes().len(), 48);
        assert!(Hs384.verify_signature(&signature, &key, b"message"));
        assert!(!Hs384.verify_signature(&signature, &key, b"other message"));

        let err = Hs384Signature::try_from_slice(&[0; 32]).unwrap_err();
        assert!(err.to_string().contains("invalid signature length"), "{err}");
    }

    #[test]
    fn hmac_as_signature_algorithm() {
        let key = Jwk::symmetric(b"super_secret_key_donut_steel");
        let signature = SignatureAlgorithm::sign(&Hs512, &key, b"message").unwrap();
        assert_eq!(signature.len(), 64);
        assert!(SignatureAlgorithm::verify(&Hs512, &key, b"message", &signature).unwrap());
        // Signature of a wrong length is just invalid.
        assert!(!SignatureAlgorithm::verify(&Hs512, &key, b"message", &signature[1..]).unwrap());

        let other_key = Jwk::symmetric(b"another_secret_key");
        assert!(!SignatureAlgorithm::verify(&Hs512, &other_key, b"message", &signature).unwrap());
    }

    #[test]
    fn hmac_with_non_symmetric_key() {
        let key: Jwk = serde_json::from_str(
            r#"{"kty":"OKP","crv":"Ed25519","x":"11qYAYKxCrfVS_7TyWQHOg7hcvPapiMlrwIaaPcHURo"}"#,
        )
        .unwrap();
        let err = SignatureAlgorithm::sign(&Hs256, &key, b"message").unwrap_err();
        assert_matches!(
            err.downcast_ref::<JwkError>().unwrap(),
            JwkError::UnexpectedKeyType { expected: KeyType::Symmetric, actual: KeyType::KeyPair }
        );
    }
}
