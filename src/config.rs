//! Allow-list configuration for JOSE engines.

use serde::{Deserialize, Serialize};

use crate::{
    alg::AlgorithmManager, CompressionManager, Decrypter, Encrypter, KeyManagementError, Signer,
    Verifier,
};

fn default_decompression_limit() -> usize {
    CompressionManager::DEFAULT_DECOMPRESSION_LIMIT
}

/// Configuration of allowed algorithms and compression methods.
///
/// Nothing is allowed by default: every algorithm (including content encryption algorithms)
/// and compression method must be listed explicitly. The configuration can be deserialized,
/// e.g., from an application config file.
///
/// # Examples
///
/// ```
/// use jose_compact::JoseConfig;
///
/// # fn main() -> anyhow::Result<()> {
/// let config: JoseConfig = serde_json::from_str(r#"{
///     "algorithms": ["HS256", "A128KW", "A128GCM"],
///     "compression_methods": ["DEF"]
/// }"#)?;
/// let verifier = config.verifier()?;
/// assert!(verifier.algorithms().contains("HS256"));
/// assert!(!verifier.algorithms().contains("ES256"));
///
/// let unknown: Result<JoseConfig, _> = serde_json::from_str(r#"{ "algs": [] }"#);
/// assert!(unknown.is_err());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JoseConfig {
    /// Names of allowed algorithms.
    pub algorithms: Vec<String>,
    /// Names of allowed compression methods.
    #[serde(default)]
    pub compression_methods: Vec<String>,
    /// Upper bound on the decompressed payload size in bytes.
    #[serde(default = "default_decompression_limit")]
    pub decompression_limit: usize,
}

impl JoseConfig {
    /// Creates a configuration with the specified allowed algorithms and no compression.
    pub fn new<I, S>(algorithms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            algorithms: algorithms.into_iter().map(Into::into).collect(),
            compression_methods: Vec::new(),
            decompression_limit: default_decompression_limit(),
        }
    }

    /// Sets allowed compression methods.
    #[must_use]
    pub fn with_compression_methods<I, S>(mut self, methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.compression_methods = methods.into_iter().map(Into::into).collect();
        self
    }

    /// Builds the algorithm manager.
    ///
    /// # Errors
    ///
    /// Returns an error if an algorithm is not supported.
    pub fn algorithm_manager(&self) -> Result<AlgorithmManager, KeyManagementError> {
        AlgorithmManager::from_names(&self.algorithms)
    }

    /// Builds the compression manager.
    ///
    /// # Errors
    ///
    /// Returns an error if a compression method is not supported.
    pub fn compression_manager(&self) -> Result<CompressionManager, KeyManagementError> {
        let manager = CompressionManager::from_names(&self.compression_methods)?;
        Ok(manager.with_decompression_limit(self.decompression_limit))
    }

    /// Builds a [`Signer`].
    ///
    /// # Errors
    ///
    /// Returns an error if an algorithm is not supported.
    pub fn signer(&self) -> Result<Signer, KeyManagementError> {
        Ok(Signer::new(self.algorithm_manager()?))
    }

    /// Builds a [`Verifier`].
    ///
    /// # Errors
    ///
    /// Returns an error if an algorithm is not supported.
    pub fn verifier(&self) -> Result<Verifier, KeyManagementError> {
        Ok(Verifier::new(self.algorithm_manager()?))
    }

    /// Builds an [`Encrypter`].
    ///
    /// # Errors
    ///
    /// Returns an error if an algorithm or compression method is not supported.
    pub fn encrypter(&self) -> Result<Encrypter, KeyManagementError> {
        Ok(Encrypter::new(
            self.algorithm_manager()?,
            self.compression_manager()?,
        ))
    }

    /// Builds a [`Decrypter`].
    ///
    /// # Errors
    ///
    /// Returns an error if an algorithm or compression method is not supported.
    pub fn decrypter(&self) -> Result<Decrypter, KeyManagementError> {
        Ok(Decrypter::new(
            self.algorithm_manager()?,
            self.compression_manager()?,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use assert_matches::assert_matches;

    #[test]
    fn config_defaults() {
        let config: JoseConfig = serde_json::from_str(r#"{ "algorithms": ["HS256"] }"#).unwrap();
        assert_eq!(config, JoseConfig::new(["HS256"]));
        assert_eq!(
            config.decompression_limit,
            CompressionManager::DEFAULT_DECOMPRESSION_LIMIT
        );
        assert_eq!(config.compression_manager().unwrap().names().count(), 0);
    }

    #[test]
    fn unsupported_names() {
        let config = JoseConfig::new(["HS256", "none"]);
        assert_matches!(
            config.signer().unwrap_err(),
            KeyManagementError::UnsupportedAlgorithm(name) if name == "none"
        );
        let config = JoseConfig::new(["A128KW", "A128GCM"]).with_compression_methods(["BZIP2"]);
        assert_matches!(
            config.encrypter().unwrap_err(),
            KeyManagementError::UnsupportedCompression(name) if name == "BZIP2"
        );
    }
}
