//! `ES256` algorithm implementation using the `p256` crate.

use p256::{
    ecdsa::{
        signature::{DigestSigner, DigestVerifier},
        Signature, SigningKey, VerifyingKey,
    },
    elliptic_curve::sec1::ToEncodedPoint,
    PublicKey, SecretKey,
};
use sha2::{Digest, Sha256};

use core::num::NonZeroUsize;
use std::borrow::Cow;

use crate::{
    alg::{self, SecretBytes},
    jwk::{JsonWebKey, JwkError, KeyType},
    Algorithm, AlgorithmSignature,
};

const COORDINATE_SIZE: usize = 32;

impl AlgorithmSignature for Signature {
    const LENGTH: Option<NonZeroUsize> = NonZeroUsize::new(64);

    fn try_from_slice(slice: &[u8]) -> anyhow::Result<Self> {
        Signature::try_from(slice).map_err(|err| anyhow::anyhow!(err))
    }

    fn as_bytes(&self) -> Cow<'_, [u8]> {
        Cow::Owned(self.to_bytes().to_vec())
    }
}

/// `ES256` signing algorithm. Implements elliptic curve digital signatures (ECDSA)
/// on the secp256r1 curve (aka P-256).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(docsrs, doc(cfg(feature = "p256")))]
pub struct Es256;

impl Algorithm for Es256 {
    type SigningKey = SigningKey;
    type VerifyingKey = VerifyingKey;
    type Signature = Signature;

    fn name(&self) -> Cow<'static, str> {
        Cow::Borrowed("ES256")
    }

    fn sign(
        &self,
        signing_key: &Self::SigningKey,
        message: &[u8],
    ) -> anyhow::Result<Self::Signature> {
        let mut digest = Sha256::default();
        digest.update(message);
        signing_key
            .try_sign_digest(digest)
            .map_err(|err| anyhow::anyhow!(err))
    }

    fn verify_signature(
        &self,
        signature: &Self::Signature,
        verifying_key: &Self::VerifyingKey,
        message: &[u8],
    ) -> bool {
        let mut digest = Sha256::default();
        digest.update(message);

        verifying_key.verify_digest(digest, signature).is_ok()
    }
}

impl alg::SigningKey<Es256> for SigningKey {
    fn from_slice(raw: &[u8]) -> anyhow::Result<Self> {
        Self::from_slice(raw).map_err(|err| anyhow::anyhow!(err))
    }

    fn to_verifying_key(&self) -> VerifyingKey {
        *self.verifying_key()
    }

    fn as_bytes(&self) -> SecretBytes<'_> {
        SecretBytes::owned(self.to_bytes().to_vec())
    }
}

impl alg::VerifyingKey<Es256> for VerifyingKey {
    fn from_slice(raw: &[u8]) -> anyhow::Result<Self> {
        Self::from_sec1_bytes(raw).map_err(|err| anyhow::anyhow!(err))
    }

    /// Serializes the key as a 33-byte compressed form.
    fn as_bytes(&self) -> Cow<'_, [u8]> {
        let bytes = self.to_encoded_point(true).as_bytes().to_vec();
        Cow::Owned(bytes)
    }
}

/// Creates a JWK for a P-256 public key and, optionally, the corresponding secret scalar.
pub(crate) fn create_jwk(pk: &PublicKey, secret: Option<Vec<u8>>) -> JsonWebKey<'static> {
    let uncompressed = pk.to_encoded_point(false);
    // Coordinates are always present for an uncompressed non-identity point.
    let (x, y) = match (uncompressed.x(), uncompressed.y()) {
        (Some(x), Some(y)) => (x.to_vec(), y.to_vec()),
        _ => (Vec::new(), Vec::new()),
    };
    JsonWebKey::EllipticCurve {
        curve: "P-256".into(),
        x: Cow::Owned(x),
        y: Cow::Owned(y),
        secret: secret.map(SecretBytes::owned),
    }
}

/// Restores a P-256 public key from a JWK.
pub(crate) fn public_key_from_jwk(jwk: &JsonWebKey<'_>) -> Result<PublicKey, JwkError> {
    let JsonWebKey::EllipticCurve { curve, x, y, .. } = jwk else {
        return Err(JwkError::key_type(jwk, KeyType::EllipticCurve));
    };
    JsonWebKey::ensure_curve(curve, "P-256")?;
    JsonWebKey::ensure_len("x", x, COORDINATE_SIZE)?;
    JsonWebKey::ensure_len("y", y, COORDINATE_SIZE)?;

    let mut key_bytes = [0_u8; 2 * COORDINATE_SIZE + 1];
    key_bytes[0] = 4; // uncompressed key marker
    key_bytes[1..=COORDINATE_SIZE].copy_from_slice(x);
    key_bytes[(1 + COORDINATE_SIZE)..].copy_from_slice(y);
    PublicKey::from_sec1_bytes(&key_bytes[..]).map_err(|err| JwkError::custom(anyhow::anyhow!(err)))
}

/// Restores a P-256 secret key from a JWK, checking that it matches the public key.
pub(crate) fn secret_key_from_jwk(jwk: &JsonWebKey<'_>) -> Result<SecretKey, JwkError> {
    let JsonWebKey::EllipticCurve { secret, .. } = jwk else {
        return Err(JwkError::key_type(jwk, KeyType::EllipticCurve));
    };
    let sk_bytes = secret.as_deref();
    let sk_bytes = sk_bytes.ok_or_else(|| JwkError::NoField("d".into()))?;
    JsonWebKey::ensure_len("d", sk_bytes, COORDINATE_SIZE)?;

    let sk = SecretKey::from_slice(sk_bytes).map_err(|err| JwkError::custom(anyhow::anyhow!(err)))?;
    if sk.public_key() == public_key_from_jwk(jwk)? {
        Ok(sk)
    } else {
        Err(JwkError::MismatchedKeys)
    }
}

impl<'a> From<&'a VerifyingKey> for JsonWebKey<'a> {
    fn from(key: &'a VerifyingKey) -> JsonWebKey<'a> {
        create_jwk(&PublicKey::from(key), None)
    }
}

impl TryFrom<&JsonWebKey<'_>> for VerifyingKey {
    type Error = JwkError;

    fn try_from(jwk: &JsonWebKey<'_>) -> Result<Self, Self::Error> {
        public_key_from_jwk(jwk).map(Self::from)
    }
}

impl<'a> From<&'a SigningKey> for JsonWebKey<'a> {
    fn from(key: &'a SigningKey) -> JsonWebKey<'a> {
        let pk = PublicKey::from(key.verifying_key());
        create_jwk(&pk, Some(key.to_bytes().to_vec()))
    }
}

impl TryFrom<&JsonWebKey<'_>> for SigningKey {
    type Error = JwkError;

    fn try_from(jwk: &JsonWebKey<'_>) -> Result<Self, Self::Error> {
        let JsonWebKey::EllipticCurve { secret, .. } = jwk else {
            return Err(JwkError::key_type(jwk, KeyType::EllipticCurve));
        };
        let sk_bytes = secret.as_deref();
        let sk_bytes = sk_bytes.ok_or_else(|| JwkError::NoField("d".into()))?;
        JsonWebKey::ensure_len("d", sk_bytes, COORDINATE_SIZE)?;

        let sk =
            Self::from_slice(sk_bytes).map_err(|err| JwkError::custom(anyhow::anyhow!(err)))?;
        jwk.ensure_key_match(sk)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{traits::SignatureAlgorithm, Jwk};

    use assert_matches::assert_matches;
    use rand_core::OsRng;

    #[test]
    fn es256_via_jwk() {
        let signing_key = SigningKey::random(&mut OsRng);
        let jwk = Jwk::from(&JsonWebKey::from(&signing_key));
        assert!(jwk.is_private());
        assert_eq!(jwk.get("crv").and_then(|crv| crv.as_str()), Some("P-256"));

        let signature = SignatureAlgorithm::sign(&Es256, &jwk, b"message").unwrap();
        assert_eq!(signature.len(), 64);
        let public_jwk = jwk.to_public();
        assert!(SignatureAlgorithm::verify(&Es256, &public_jwk, b"message", &signature).unwrap());
        assert!(!SignatureAlgorithm::verify(&Es256, &public_jwk, b"other", &signature).unwrap());
    }

    #[test]
    fn mismatched_ec_keys() {
        let signing_key = SigningKey::random(&mut OsRng);
        let other_key = SigningKey::random(&mut OsRng);
        let JsonWebKey::EllipticCurve { x, y, .. } = JsonWebKey::from(other_key.verifying_key())
        else {
            unreachable!();
        };
        let mixed = JsonWebKey::EllipticCurve {
            curve: "P-256".into(),
            x,
            y,
            secret: Some(SecretBytes::owned(signing_key.to_bytes().to_vec())),
        };
        assert_matches!(SigningKey::try_from(&mixed).unwrap_err(), JwkError::MismatchedKeys);
        assert_matches!(secret_key_from_jwk(&mixed).unwrap_err(), JwkError::MismatchedKeys);
    }

    #[test]
    fn wrong_curve() {
        let signing_key = SigningKey::random(&mut OsRng);
        let JsonWebKey::EllipticCurve { x, y, .. } = JsonWebKey::from(signing_key.verifying_key())
        else {
            unreachable!();
        };
        let jwk = JsonWebKey::EllipticCurve {
            curve: "secp256k1".into(),
            x,
            y,
            secret: None,
        };
        assert_matches!(
            VerifyingKey::try_from(&jwk).unwrap_err(),
            JwkError::UnexpectedValue { field, .. } if field == "crv"
        );
    }
}
