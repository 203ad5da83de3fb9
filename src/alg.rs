//! Implementations of JOSE algorithms and the registry selecting them by name.
//!
//! Every algorithm is registered as a [`JoseAlgorithm`], a tagged union over capability
//! traits from the [`traits`](crate::traits) module. The capability is resolved once,
//! when the algorithm is added to an [`AlgorithmManager`]; JOSE engines dispatch by matching
//! on the tag.
//!
//! # Built-in algorithms
//!
//! | Name(s) | Capability | Feature |
//! |---------|------------|---------|
//! | `HS256`, `HS384`, `HS512` | signature | |
//! | `ES256` | signature | `p256` |
//! | `EdDSA` | signature | `ed25519-dalek` |
//! | `RS256`, `RS384`, `RS512`, `PS256`, `PS384`, `PS512` | signature | `rsa` |
//! | `RSA-OAEP-256`, `RSA1_5` | key encryption | `rsa` |
//! | `A128KW`, `A192KW`, `A256KW` | key wrapping | |
//! | `dir` | direct encryption | |
//! | `ECDH-ES` | key agreement | `p256` |
//! | `ECDH-ES+A128KW`, `ECDH-ES+A192KW`, `ECDH-ES+A256KW` | key agreement with wrapping | `p256` |
//! | `A128GCM`, `A192GCM`, `A256GCM` | content encryption | |

use core::fmt;
use std::{collections::BTreeMap, sync::Arc};

use crate::{
    traits::{
        ContentEncryption, DirectEncryption, KeyAgreement, KeyAgreementWrapping, KeyEncryption,
        KeyWrapping, SignatureAlgorithm,
    },
    KeyManagementError,
};

mod aes_gcm;
mod aes_kw;
mod dir;
#[cfg(feature = "p256")]
mod ecdh_es;
#[cfg(feature = "ed25519-dalek")]
mod eddsa_dalek;
mod generic;
mod hmacs;
// ES256 implementation.
#[cfg(feature = "p256")]
mod p256;
// RSA implementation.
#[cfg(feature = "rsa")]
mod rsa;

pub use self::aes_gcm::AesGcm;
pub use self::aes_kw::AesKeyWrap;
pub use self::dir::Direct;
#[cfg(feature = "p256")]
#[cfg_attr(docsrs, doc(cfg(feature = "p256")))]
pub use self::ecdh_es::{EcdhEs, EcdhEsKeyWrap};
#[cfg(feature = "ed25519-dalek")]
pub use self::eddsa_dalek::Ed25519;
pub use self::generic::{SecretBytes, SigningKey, VerifyingKey};
pub use self::hmacs::*;
#[cfg(feature = "p256")]
pub use self::p256::Es256;
#[cfg(feature = "rsa")]
#[cfg_attr(docsrs, doc(cfg(feature = "rsa")))]
pub use self::rsa::{
    ModulusBits, ModulusBitsError, Rsa, RsaError, RsaKeyEncryption, RsaPrivateKey, RsaPublicKey,
    RsaSignature,
};

/// Strategy by which a JWE recipient obtains the content encryption key (CEK).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyManagementMode {
    /// The recipient key is the CEK (`dir`).
    Direct,
    /// A random CEK is encrypted with the recipient key (e.g., `RSA-OAEP-256`).
    KeyEncryption,
    /// A random CEK is wrapped with a shared key (e.g., `A128KW`).
    KeyWrapping,
    /// The CEK is derived via key agreement (`ECDH-ES`).
    KeyAgreement,
    /// A random CEK is wrapped with a key derived via key agreement (e.g., `ECDH-ES+A128KW`).
    KeyAgreementWithWrapping,
}

impl fmt::Display for KeyManagementMode {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(match self {
            Self::Direct => "dir",
            Self::KeyEncryption => "enc",
            Self::KeyWrapping => "wrap",
            Self::KeyAgreement => "agree",
            Self::KeyAgreementWithWrapping => "agree+wrap",
        })
    }
}

impl KeyManagementMode {
    /// Checks whether the CEK in this mode is generated randomly and delivered to the recipient
    /// (as opposed to being determined by the recipient key).
    pub fn accepts_external_cek(self) -> bool {
        matches!(
            self,
            Self::KeyEncryption | Self::KeyWrapping | Self::KeyAgreementWithWrapping
        )
    }

    /// Checks whether recipients with this mode and the `other` mode can share
    /// a single JWE.
    pub fn is_compatible_with(self, other: Self) -> bool {
        match (self, other) {
            (Self::Direct, Self::Direct) | (Self::KeyAgreement, Self::KeyAgreement) => true,
            _ => self.accepts_external_cek() && other.accepts_external_cek(),
        }
    }
}

/// JOSE algorithm together with its capability.
#[derive(Clone)]
pub enum JoseAlgorithm {
    /// JWS signature algorithm.
    Signature(Arc<dyn SignatureAlgorithm>),
    /// Key encryption algorithm.
    KeyEncryption(Arc<dyn KeyEncryption>),
    /// Key wrapping algorithm.
    KeyWrapping(Arc<dyn KeyWrapping>),
    /// Key agreement algorithm.
    KeyAgreement(Arc<dyn KeyAgreement>),
    /// Key agreement with key wrapping algorithm.
    KeyAgreementWrapping(Arc<dyn KeyAgreementWrapping>),
    /// Direct encryption.
    DirectEncryption(Arc<dyn DirectEncryption>),
    /// Content encryption algorithm.
    ContentEncryption(Arc<dyn ContentEncryption>),
}

impl fmt::Debug for JoseAlgorithm {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("JoseAlgorithm")
            .field("name", &self.name())
            .field("capability", &self.capability())
            .finish()
    }
}

impl JoseAlgorithm {
    /// Wraps a signature algorithm.
    pub fn signature(algorithm: impl SignatureAlgorithm + 'static) -> Self {
        Self::Signature(Arc::new(algorithm))
    }

    /// Wraps a key encryption algorithm.
    pub fn key_encryption(algorithm: impl KeyEncryption + 'static) -> Self {
        Self::KeyEncryption(Arc::new(algorithm))
    }

    /// Wraps a key wrapping algorithm.
    pub fn key_wrapping(algorithm: impl KeyWrapping + 'static) -> Self {
        Self::KeyWrapping(Arc::new(algorithm))
    }

    /// Wraps a key agreement algorithm.
    pub fn key_agreement(algorithm: impl KeyAgreement + 'static) -> Self {
        Self::KeyAgreement(Arc::new(algorithm))
    }

    /// Wraps a key agreement with key wrapping algorithm.
    pub fn key_agreement_wrapping(algorithm: impl KeyAgreementWrapping + 'static) -> Self {
        Self::KeyAgreementWrapping(Arc::new(algorithm))
    }

    /// Wraps a direct encryption algorithm.
    pub fn direct_encryption(algorithm: impl DirectEncryption + 'static) -> Self {
        Self::DirectEncryption(Arc::new(algorithm))
    }

    /// Wraps a content encryption algorithm.
    pub fn content_encryption(algorithm: impl ContentEncryption + 'static) -> Self {
        Self::ContentEncryption(Arc::new(algorithm))
    }

    /// Returns the algorithm name, as used in the `alg` or `enc` header parameter.
    pub fn name(&self) -> String {
        let name = match self {
            Self::Signature(alg) => alg.name(),
            Self::KeyEncryption(alg) => alg.name(),
            Self::KeyWrapping(alg) => alg.name(),
            Self::KeyAgreement(alg) => alg.name(),
            Self::KeyAgreementWrapping(alg) => alg.name(),
            Self::DirectEncryption(alg) => alg.name(),
            Self::ContentEncryption(alg) => alg.name(),
        };
        name.into_owned()
    }

    /// Returns a human-readable description of the capability.
    pub fn capability(&self) -> &'static str {
        match self {
            Self::Signature(_) => "signature",
            Self::KeyEncryption(_) => "key encryption",
            Self::KeyWrapping(_) => "key wrapping",
            Self::KeyAgreement(_) => "key agreement",
            Self::KeyAgreementWrapping(_) => "key agreement with wrapping",
            Self::DirectEncryption(_) => "direct encryption",
            Self::ContentEncryption(_) => "content encryption",
        }
    }

    /// Returns the key management mode if this is a key management algorithm.
    pub fn key_management_mode(&self) -> Option<KeyManagementMode> {
        Some(match self {
            Self::KeyEncryption(_) => KeyManagementMode::KeyEncryption,
            Self::KeyWrapping(_) => KeyManagementMode::KeyWrapping,
            Self::KeyAgreement(_) => KeyManagementMode::KeyAgreement,
            Self::KeyAgreementWrapping(_) => KeyManagementMode::KeyAgreementWithWrapping,
            Self::DirectEncryption(_) => KeyManagementMode::Direct,
            Self::Signature(_) | Self::ContentEncryption(_) => return None,
        })
    }

    /// Looks up a built-in algorithm by its name. Only algorithms enabled via crate features
    /// are available.
    pub fn builtin(name: &str) -> Option<Self> {
        #[cfg(feature = "rsa")]
        {
            if let Some(rsa) = Rsa::with_name(name) {
                return Some(Self::signature(rsa));
            }
        }

        Some(match name {
            "HS256" => Self::signature(Hs256),
            "HS384" => Self::signature(Hs384),
            "HS512" => Self::signature(Hs512),
            #[cfg(feature = "p256")]
            "ES256" => Self::signature(Es256),
            #[cfg(feature = "ed25519-dalek")]
            "EdDSA" => Self::signature(Ed25519),

            #[cfg(feature = "rsa")]
            "RSA-OAEP-256" => Self::key_encryption(RsaKeyEncryption::oaep_sha256()),
            #[cfg(feature = "rsa")]
            "RSA1_5" => Self::key_encryption(RsaKeyEncryption::pkcs1v15()),

            "A128KW" => Self::key_wrapping(AesKeyWrap::a128kw()),
            "A192KW" => Self::key_wrapping(AesKeyWrap::a192kw()),
            "A256KW" => Self::key_wrapping(AesKeyWrap::a256kw()),
            "dir" => Self::direct_encryption(Direct),

            #[cfg(feature = "p256")]
            "ECDH-ES" => Self::key_agreement(EcdhEs),
            #[cfg(feature = "p256")]
            "ECDH-ES+A128KW" => Self::key_agreement_wrapping(EcdhEsKeyWrap::a128kw()),
            #[cfg(feature = "p256")]
            "ECDH-ES+A192KW" => Self::key_agreement_wrapping(EcdhEsKeyWrap::a192kw()),
            #[cfg(feature = "p256")]
            "ECDH-ES+A256KW" => Self::key_agreement_wrapping(EcdhEsKeyWrap::a256kw()),

            "A128GCM" => Self::content_encryption(AesGcm::a128gcm()),
            "A192GCM" => Self::content_encryption(AesGcm::a192gcm()),
            "A256GCM" => Self::content_encryption(AesGcm::a256gcm()),
            _ => return None,
        })
    }
}

/// Allow-list of algorithms available to a JOSE engine, keyed by the exact
/// (case-sensitive) algorithm name.
///
/// # Examples
///
/// ```
/// use jose_compact::alg::{AlgorithmManager, JoseAlgorithm, Hs256};
///
/// # fn main() -> anyhow::Result<()> {
/// let manager = AlgorithmManager::from_names(["HS256", "A128KW", "A128GCM"])?;
/// assert!(manager.get("HS256").is_ok());
/// assert!(manager.get("hs256").is_err());
/// assert!(AlgorithmManager::from_names(["none"]).is_err());
///
/// // Custom algorithm implementations can be registered as well.
/// let manager = AlgorithmManager::new()
///     .with(JoseAlgorithm::signature(jose_compact::Renamed::new(Hs256, "HS256-legacy")));
/// assert_eq!(manager.names().collect::<Vec<_>>(), ["HS256-legacy"]);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct AlgorithmManager {
    algorithms: BTreeMap<String, JoseAlgorithm>,
}

impl AlgorithmManager {
    /// Creates an empty manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a manager with the built-in algorithms with the specified names.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the names does not correspond to a built-in algorithm.
    pub fn from_names<I, S>(names: I) -> Result<Self, KeyManagementError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        names.into_iter().try_fold(Self::new(), |manager, name| {
            let name = name.as_ref();
            let algorithm = JoseAlgorithm::builtin(name)
                .ok_or_else(|| KeyManagementError::UnsupportedAlgorithm(name.to_owned()))?;
            Ok(manager.with(algorithm))
        })
    }

    /// Adds an algorithm to this manager, replacing an algorithm with the same name.
    #[must_use]
    pub fn with(mut self, algorithm: JoseAlgorithm) -> Self {
        self.algorithms.insert(algorithm.name(), algorithm);
        self
    }

    /// Returns names of all registered algorithms in the lexicographic order.
    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.algorithms.keys().map(String::as_str)
    }

    /// Checks whether an algorithm with the specified name is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.algorithms.contains_key(name)
    }

    /// Gets an algorithm by name.
    ///
    /// # Errors
    ///
    /// Returns an error if the algorithm is not registered.
    pub fn get(&self, name: &str) -> Result<&JoseAlgorithm, KeyManagementError> {
        self.algorithms
            .get(name)
            .ok_or_else(|| KeyManagementError::UnsupportedAlgorithm(name.to_owned()))
    }

    /// Gets a signature algorithm by name.
    ///
    /// # Errors
    ///
    /// Returns an error if the algorithm is not registered or is not a signature algorithm.
    pub fn signature(&self, name: &str) -> Result<&dyn SignatureAlgorithm, KeyManagementError> {
        match self.get(name)? {
            JoseAlgorithm::Signature(alg) => Ok(alg.as_ref()),
            _ => Err(KeyManagementError::UnexpectedCapability {
                name: name.to_owned(),
                expected: "signature",
            }),
        }
    }

    /// Gets a content encryption algorithm by name.
    ///
    /// # Errors
    ///
    /// Returns an error if the algorithm is not registered or is not a content
    /// encryption algorithm.
    pub fn content_encryption(
        &self,
        name: &str,
    ) -> Result<&dyn ContentEncryption, KeyManagementError> {
        match self.get(name)? {
            JoseAlgorithm::ContentEncryption(alg) => Ok(alg.as_ref()),
            _ => Err(KeyManagementError::UnexpectedCapability {
                name: name.to_owned(),
                expected: "content encryption",
            }),
        }
    }

    /// Gets a key management algorithm by name.
    ///
    /// # Errors
    ///
    /// Returns an error if the algorithm is not registered or is not a key management
    /// algorithm.
    pub fn key_management(
        &self,
        name: &str,
    ) -> Result<(&JoseAlgorithm, KeyManagementMode), KeyManagementError> {
        let algorithm = self.get(name)?;
        let mode =
            algorithm
                .key_management_mode()
                .ok_or_else(|| KeyManagementError::UnexpectedCapability {
                    name: name.to_owned(),
                    expected: "key management",
                })?;
        Ok((algorithm, mode))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use assert_matches::assert_matches;

    #[test]
    fn mode_compatibility() {
        use KeyManagementMode::*;

        let compatible = [
            (Direct, Direct),
            (KeyAgreement, KeyAgreement),
            (KeyEncryption, KeyEncryption),
            (KeyEncryption, KeyWrapping),
            (KeyWrapping, KeyWrapping),
            (KeyWrapping, KeyAgreementWithWrapping),
            (KeyAgreementWithWrapping, KeyEncryption),
        ];
        for (first, second) in compatible {
            assert!(first.is_compatible_with(second), "{first} / {second}");
            assert!(second.is_compatible_with(first), "{second} / {first}");
        }

        let incompatible = [
            (Direct, KeyAgreement),
            (Direct, KeyEncryption),
            (KeyAgreement, KeyWrapping),
            (KeyAgreement, KeyAgreementWithWrapping),
        ];
        for (first, second) in incompatible {
            assert!(!first.is_compatible_with(second), "{first} / {second}");
            assert!(!second.is_compatible_with(first), "{second} / {first}");
        }
    }

    #[test]
    fn builtin_names_are_consistent() {
        let names = [
            "HS256", "HS384", "HS512", "A128KW", "A192KW", "A256KW", "dir", "A128GCM", "A192GCM",
            "A256GCM",
        ];
        for name in names {
            let algorithm = JoseAlgorithm::builtin(name).unwrap();
            assert_eq!(algorithm.name(), name);
        }
        assert!(JoseAlgorithm::builtin("none").is_none());
        assert!(JoseAlgorithm::builtin("a128gcm").is_none());
    }

    #[cfg(feature = "p256")]
    #[test]
    fn ecdh_names_are_consistent() {
        for name in ["ES256", "ECDH-ES", "ECDH-ES+A128KW", "ECDH-ES+A192KW", "ECDH-ES+A256KW"] {
            assert_eq!(JoseAlgorithm::builtin(name).unwrap().name(), name);
        }
    }

    #[test]
    fn manager_lookup_errors() {
        let err = AlgorithmManager::from_names(["HS256", "HS257"]).unwrap_err();
        assert_matches!(err, KeyManagementError::UnsupportedAlgorithm(name) if name == "HS257");

        let manager = AlgorithmManager::from_names(["HS256", "A128GCM", "dir"]).unwrap();
        assert_eq!(manager.names().collect::<Vec<_>>(), ["A128GCM", "HS256", "dir"]);
        assert!(manager.signature("HS256").is_ok());
        assert_matches!(
            manager.signature("A128GCM").err().unwrap(),
            KeyManagementError::UnexpectedCapability { expected: "signature", .. }
        );
        assert_matches!(
            manager.content_encryption("HS256").err().unwrap(),
            KeyManagementError::UnexpectedCapability { expected: "content encryption", .. }
        );
        let (_, mode) = manager.key_management("dir").unwrap();
        assert_eq!(mode, KeyManagementMode::Direct);
        assert_matches!(
            manager.key_management("HS384").unwrap_err(),
            KeyManagementError::UnsupportedAlgorithm(_)
        );
    }
}
