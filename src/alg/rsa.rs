//! RSA-based JOSE schemes: `RS*` and `PS*` signatures, and `RSA-OAEP-256` / `RSA1_5`
//! key encryption.

pub use rsa::{errors::Error as RsaError, RsaPrivateKey, RsaPublicKey};

use rand_core::{CryptoRng, OsRng, RngCore};
use rsa::{
    traits::{PrivateKeyParts, PublicKeyParts},
    BigUint, Oaep, Pkcs1v15Encrypt, Pkcs1v15Sign, Pss,
};
use sha2::{Digest, Sha256, Sha384, Sha512};
use zeroize::Zeroizing;

use core::fmt;
use std::borrow::Cow;

use crate::{
    alg::SecretBytes,
    jwk::{JsonWebKey, JwkError, KeyType, RsaPrimeFactor, RsaPrivateParts},
    traits::{KeyDelivery, KeyEncryption},
    Algorithm, AlgorithmSignature, Header, Jwk,
};

/// RSA signature.
#[derive(Debug)]
#[cfg_attr(docsrs, doc(cfg(feature = "rsa")))]
pub struct RsaSignature(Vec<u8>);

impl AlgorithmSignature for RsaSignature {
    fn try_from_slice(bytes: &[u8]) -> anyhow::Result<Self> {
        Ok(RsaSignature(bytes.to_vec()))
    }

    fn as_bytes(&self) -> Cow<'_, [u8]> {
        Cow::Borrowed(&self.0)
    }
}

/// RSA hash algorithm.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum HashAlg {
    Sha256,
    Sha384,
    Sha512,
}

impl HashAlg {
    fn digest(self, message: &[u8]) -> Vec<u8> {
        match self {
            Self::Sha256 => Sha256::digest(message).to_vec(),
            Self::Sha384 => Sha384::digest(message).to_vec(),
            Self::Sha512 => Sha512::digest(message).to_vec(),
        }
    }
}

/// RSA padding algorithm.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum Padding {
    Pkcs1v15,
    Pss,
}

/// Bit length of an RSA key modulus (aka RSA key length).
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[non_exhaustive]
#[cfg_attr(docsrs, doc(cfg(feature = "rsa")))]
pub enum ModulusBits {
    /// 2048 bits. This is the minimum recommended key length as of 2020.
    TwoKibibytes,
    /// 3072 bits.
    ThreeKibibytes,
    /// 4096 bits.
    FourKibibytes,
}

impl ModulusBits {
    /// Converts this length to the numeric value.
    pub fn bits(self) -> usize {
        match self {
            Self::TwoKibibytes => 2_048,
            Self::ThreeKibibytes => 3_072,
            Self::FourKibibytes => 4_096,
        }
    }
}

impl TryFrom<usize> for ModulusBits {
    type Error = ModulusBitsError;

    fn try_from(value: usize) -> Result<Self, Self::Error> {
        match value {
            2_048 => Ok(Self::TwoKibibytes),
            3_072 => Ok(Self::ThreeKibibytes),
            4_096 => Ok(Self::FourKibibytes),
            _ => Err(ModulusBitsError(())),
        }
    }
}

/// Error type returned when a conversion of an integer into `ModulusBits` fails.
#[derive(Debug)]
#[cfg_attr(docsrs, doc(cfg(feature = "rsa")))]
pub struct ModulusBitsError(());

impl fmt::Display for ModulusBitsError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(
            "Unsupported bit length of RSA modulus; only lengths 2048, 3072 and 4096 \
            are supported.",
        )
    }
}

impl std::error::Error for ModulusBitsError {}

/// Integrity algorithm using [RSA] digital signatures.
///
/// Depending on the variation, the algorithm employs PKCS#1 v1.5 or PSS padding and
/// one of the hash functions from the SHA-2 family: SHA-256, SHA-384, or SHA-512.
/// See [RFC 7518] for more details. Depending on the chosen parameters,
/// the name of the algorithm is one of `RS256`, `RS384`, `RS512`, `PS256`, `PS384`, `PS512`:
///
/// - `R` / `P` denote the padding scheme: PKCS#1 v1.5 for `R`, PSS for `P`
/// - `256` / `384` / `512` denote the hash function
///
/// The length of RSA keys is not unequivocally specified by the algorithm; nevertheless,
/// it **MUST** be at least 2048 bits as per RFC 7518. Keys with shorter moduli are rejected
/// when signing and verifying.
///
/// [RSA]: https://en.wikipedia.org/wiki/RSA_(cryptosystem)
/// [RFC 7518]: https://www.rfc-editor.org/rfc/rfc7518.html
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(docsrs, doc(cfg(feature = "rsa")))]
pub struct Rsa {
    hash_alg: HashAlg,
    padding_alg: Padding,
}

impl Algorithm for Rsa {
    type SigningKey = RsaPrivateKey;
    type VerifyingKey = RsaPublicKey;
    type Signature = RsaSignature;

    fn name(&self) -> Cow<'static, str> {
        Cow::Borrowed(self.alg_name())
    }

    fn sign(
        &self,
        signing_key: &Self::SigningKey,
        message: &[u8],
    ) -> anyhow::Result<Self::Signature> {
        anyhow::ensure!(
            signing_key.size() * 8 >= MIN_MODULUS_BITS,
            "RSA modulus is too short"
        );
        let digest = self.hash_alg.digest(message);
        let signature = match self.padding_alg {
            Padding::Pkcs1v15 => signing_key.sign_with_rng(&mut OsRng, self.pkcs1v15(), &digest),
            Padding::Pss => signing_key.sign_with_rng(&mut OsRng, self.pss(), &digest),
        };
        signature.map(RsaSignature).map_err(|err| anyhow::anyhow!(err))
    }

    fn verify_signature(
        &self,
        signature: &Self::Signature,
        verifying_key: &Self::VerifyingKey,
        message: &[u8],
    ) -> bool {
        if verifying_key.size() * 8 < MIN_MODULUS_BITS {
            return false;
        }
        let digest = self.hash_alg.digest(message);
        let result = match self.padding_alg {
            Padding::Pkcs1v15 => verifying_key.verify(self.pkcs1v15(), &digest, &signature.0),
            Padding::Pss => verifying_key.verify(self.pss(), &digest, &signature.0),
        };
        result.is_ok()
    }
}

const MIN_MODULUS_BITS: usize = 2_048;

impl Rsa {
    const fn new(hash_alg: HashAlg, padding_alg: Padding) -> Self {
        Rsa {
            hash_alg,
            padding_alg,
        }
    }

    /// RSA with SHA-256 and PKCS#1 v1.5 padding.
    pub const fn rs256() -> Rsa {
        Rsa::new(HashAlg::Sha256, Padding::Pkcs1v15)
    }

    /// RSA with SHA-384 and PKCS#1 v1.5 padding.
    pub const fn rs384() -> Rsa {
        Rsa::new(HashAlg::Sha384, Padding::Pkcs1v15)
    }

    /// RSA with SHA-512 and PKCS#1 v1.5 padding.
    pub const fn rs512() -> Rsa {
        Rsa::new(HashAlg::Sha512, Padding::Pkcs1v15)
    }

    /// RSA with SHA-256 and PSS padding.
    pub const fn ps256() -> Rsa {
        Rsa::new(HashAlg::Sha256, Padding::Pss)
    }

    /// RSA with SHA-384 and PSS padding.
    pub const fn ps384() -> Rsa {
        Rsa::new(HashAlg::Sha384, Padding::Pss)
    }

    /// RSA with SHA-512 and PSS padding.
    pub const fn ps512() -> Rsa {
        Rsa::new(HashAlg::Sha512, Padding::Pss)
    }

    /// RSA based on the specified algorithm name. Returns `None` if the name is not one
    /// of the six RSA-based JWS algorithms.
    pub fn with_name(name: &str) -> Option<Self> {
        Some(match name {
            "RS256" => Self::rs256(),
            "RS384" => Self::rs384(),
            "RS512" => Self::rs512(),
            "PS256" => Self::ps256(),
            "PS384" => Self::ps384(),
            "PS512" => Self::ps512(),
            _ => return None,
        })
    }

    fn pkcs1v15(self) -> Pkcs1v15Sign {
        match self.hash_alg {
            HashAlg::Sha256 => Pkcs1v15Sign::new::<Sha256>(),
            HashAlg::Sha384 => Pkcs1v15Sign::new::<Sha384>(),
            HashAlg::Sha512 => Pkcs1v15Sign::new::<Sha512>(),
        }
    }

    fn pss(self) -> Pss {
        // The salt length needs to be set to the size of hash function output;
        // see https://www.rfc-editor.org/rfc/rfc7518.html#section-3.5.
        match self.hash_alg {
            HashAlg::Sha256 => Pss::new_with_salt::<Sha256>(<Sha256 as Digest>::output_size()),
            HashAlg::Sha384 => Pss::new_with_salt::<Sha384>(<Sha384 as Digest>::output_size()),
            HashAlg::Sha512 => Pss::new_with_salt::<Sha512>(<Sha512 as Digest>::output_size()),
        }
    }

    fn alg_name(self) -> &'static str {
        match (self.padding_alg, self.hash_alg) {
            (Padding::Pkcs1v15, HashAlg::Sha256) => "RS256",
            (Padding::Pkcs1v15, HashAlg::Sha384) => "RS384",
            (Padding::Pkcs1v15, HashAlg::Sha512) => "RS512",
            (Padding::Pss, HashAlg::Sha256) => "PS256",
            (Padding::Pss, HashAlg::Sha384) => "PS384",
            (Padding::Pss, HashAlg::Sha512) => "PS512",
        }
    }

    /// Generates a new key pair with the specified modulus bit length (aka key length).
    pub fn generate<R: CryptoRng + RngCore>(
        rng: &mut R,
        modulus_bits: ModulusBits,
    ) -> rsa::errors::Result<(RsaPrivateKey, RsaPublicKey)> {
        let signing_key = RsaPrivateKey::new(rng, modulus_bits.bits())?;
        let verifying_key = signing_key.to_public_key();
        Ok((signing_key, verifying_key))
    }
}

/// RSA key encryption padding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EncryptionPadding {
    OaepSha256,
    Pkcs1v15,
}

/// Key encryption using RSA: `RSA-OAEP-256` (OAEP with SHA-256 and MGF1 with SHA-256)
/// or `RSA1_5` (RSAES-PKCS1-v1_5). The modulus must be at least 2048 bits.
///
/// `RSA1_5` is susceptible to padding oracle attacks and should only be allowed
/// for interoperability with legacy producers. As recommended by
/// [RFC 7516, section 11.5](https://www.rfc-editor.org/rfc/rfc7516.html#section-11.5),
/// if `RSA1_5` decryption fails or yields a CEK of an unexpected length, a random CEK
/// is returned instead, so the failure is only detected by the authentication tag check.
/// Decryption timing still depends on the `rsa` crate, which is not constant-time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(docsrs, doc(cfg(feature = "rsa")))]
pub struct RsaKeyEncryption {
    padding: EncryptionPadding,
}

impl RsaKeyEncryption {
    /// `RSA-OAEP-256` key encryption.
    pub const fn oaep_sha256() -> Self {
        Self {
            padding: EncryptionPadding::OaepSha256,
        }
    }

    /// `RSA1_5` key encryption.
    pub const fn pkcs1v15() -> Self {
        Self {
            padding: EncryptionPadding::Pkcs1v15,
        }
    }
}

impl KeyEncryption for RsaKeyEncryption {
    fn name(&self) -> Cow<'static, str> {
        Cow::Borrowed(match self.padding {
            EncryptionPadding::OaepSha256 => "RSA-OAEP-256",
            EncryptionPadding::Pkcs1v15 => "RSA1_5",
        })
    }

    fn encrypt_key(&self, key: &Jwk, cek: &[u8], _header: &Header) -> anyhow::Result<KeyDelivery> {
        let public_key = RsaPublicKey::try_from(&key.material()?)?;
        anyhow::ensure!(
            public_key.size() * 8 >= MIN_MODULUS_BITS,
            "RSA modulus is too short"
        );
        let encrypted_key = match self.padding {
            EncryptionPadding::OaepSha256 => {
                public_key.encrypt(&mut OsRng, Oaep::new::<Sha256>(), cek)
            }
            EncryptionPadding::Pkcs1v15 => public_key.encrypt(&mut OsRng, Pkcs1v15Encrypt, cek),
        };
        Ok(KeyDelivery {
            encrypted_key: encrypted_key.map_err(|err| anyhow::anyhow!(err))?,
            additional_header: Header::empty(),
        })
    }

    fn decrypt_key(
        &self,
        key: &Jwk,
        encrypted_key: &[u8],
        cek_len: usize,
        _header: &Header,
    ) -> anyhow::Result<Zeroizing<Vec<u8>>> {
        let private_key = RsaPrivateKey::try_from(&key.material()?)?;
        anyhow::ensure!(
            private_key.size() * 8 >= MIN_MODULUS_BITS,
            "RSA modulus is too short"
        );

        match self.padding {
            EncryptionPadding::OaepSha256 => private_key
                .decrypt(Oaep::new::<Sha256>(), encrypted_key)
                .map(Zeroizing::new)
                .map_err(|err| anyhow::anyhow!(err)),
            EncryptionPadding::Pkcs1v15 => {
                // Generated before decryption so that both outcomes do the same work.
                let mut random_cek = Zeroizing::new(vec![0_u8; cek_len]);
                OsRng.fill_bytes(random_cek.as_mut_slice());
                let cek = private_key
                    .decrypt(Pkcs1v15Encrypt, encrypted_key)
                    .map(Zeroizing::new);
                Ok(match cek {
                    Ok(cek) if cek.len() == cek_len => cek,
                    _ => random_cek,
                })
            }
        }
    }
}

impl<'a> From<&'a RsaPublicKey> for JsonWebKey<'a> {
    fn from(key: &'a RsaPublicKey) -> JsonWebKey<'a> {
        JsonWebKey::Rsa {
            modulus: Cow::Owned(key.n().to_bytes_be()),
            public_exponent: Cow::Owned(key.e().to_bytes_be()),
            private_parts: None,
        }
    }
}

impl TryFrom<&JsonWebKey<'_>> for RsaPublicKey {
    type Error = JwkError;

    fn try_from(jwk: &JsonWebKey<'_>) -> Result<Self, Self::Error> {
        let JsonWebKey::Rsa {
            modulus,
            public_exponent,
            ..
        } = jwk
        else {
            return Err(JwkError::key_type(jwk, KeyType::Rsa));
        };

        let e = BigUint::from_bytes_be(public_exponent);
        let n = BigUint::from_bytes_be(modulus);
        Self::new(n, e).map_err(|err| JwkError::custom(anyhow::anyhow!(err)))
    }
}

/// Converts a big unsigned integer to secret bytes.
fn secret_uint(value: &BigUint) -> SecretBytes<'static> {
    SecretBytes::owned(value.to_bytes_be())
}

impl<'a> From<&'a RsaPrivateKey> for JsonWebKey<'a> {
    fn from(key: &'a RsaPrivateKey) -> JsonWebKey<'a> {
        const MSG: &str = "RsaPrivateKey must have at least 2 prime factors";

        let p = key.primes().first().expect(MSG);
        let q = key.primes().get(1).expect(MSG);

        let private_parts = RsaPrivateParts {
            private_exponent: secret_uint(key.d()),
            prime_factor_p: secret_uint(p),
            prime_factor_q: secret_uint(q),
            p_crt_exponent: None,
            q_crt_exponent: None,
            q_crt_coefficient: None,
            other_prime_factors: key.primes()[2..]
                .iter()
                .map(|factor| RsaPrimeFactor {
                    factor: secret_uint(factor),
                    crt_exponent: None,
                    crt_coefficient: None,
                })
                .collect(),
        };

        JsonWebKey::Rsa {
            modulus: Cow::Owned(key.n().to_bytes_be()),
            public_exponent: Cow::Owned(key.e().to_bytes_be()),
            private_parts: Some(private_parts),
        }
    }
}

impl TryFrom<&JsonWebKey<'_>> for RsaPrivateKey {
    type Error = JwkError;

    fn try_from(jwk: &JsonWebKey<'_>) -> Result<Self, Self::Error> {
        let JsonWebKey::Rsa {
            modulus,
            public_exponent,
            private_parts,
        } = jwk
        else {
            return Err(JwkError::key_type(jwk, KeyType::Rsa));
        };

        let RsaPrivateParts {
            private_exponent: d,
            prime_factor_p,
            prime_factor_q,
            other_prime_factors,
            ..
        } = private_parts
            .as_ref()
            .ok_or_else(|| JwkError::NoField("d".into()))?;

        let e = BigUint::from_bytes_be(public_exponent);
        let n = BigUint::from_bytes_be(modulus);
        let d = BigUint::from_bytes_be(d);

        let mut factors = Vec::with_capacity(2 + other_prime_factors.len());
        factors.push(BigUint::from_bytes_be(prime_factor_p));
        factors.push(BigUint::from_bytes_be(prime_factor_q));
        factors.extend(
            other_prime_factors
                .iter()
                .map(|prime| BigUint::from_bytes_be(&prime.factor)),
        );

        let key = Self::from_components(n, e, d, factors)
            .map_err(|err| JwkError::custom(anyhow::anyhow!(err)))?;
        key.validate()
            .map_err(|err| JwkError::custom(anyhow::anyhow!(err)))?;
        Ok(key)
    }
}
