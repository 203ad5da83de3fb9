//! JWS verification.

use tracing::{debug, trace};

use crate::{
    alg::AlgorithmManager,
    error::KeyFailure,
    jwk::KeyPurpose,
    jws::{signing_input, Signature},
    traits::SignatureAlgorithm,
    Error, HeaderError, Jwk, JwkSet, Jws,
};

/// Signature and key that have successfully verified a [`Jws`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub struct VerifiedSignature {
    /// Zero-based index of the signature in the JWS.
    pub signature_index: usize,
    /// Zero-based index of the key in the key set.
    pub key_index: usize,
}

/// Verifies [`Jws`] signatures against a [`JwkSet`].
///
/// Signatures are tried in order; for each signature, keys are tried in the key set order.
/// The first successful (signature, key) pair is reported. Keys that cannot be used
/// (e.g., because of their `use`, `key_ops` or `alg` parameters) are skipped.
#[derive(Debug, Clone)]
pub struct Verifier {
    algorithms: AlgorithmManager,
}

impl Verifier {
    /// Creates a verifier with the specified algorithms.
    pub fn new(algorithms: AlgorithmManager) -> Self {
        Self { algorithms }
    }

    /// Returns algorithms available to this verifier.
    pub fn algorithms(&self) -> &AlgorithmManager {
        &self.algorithms
    }

    /// Verifies the `jws`. `detached_payload` must be specified iff the JWS has no embedded
    /// payload.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidSignature`] if no key has verified any signature. Other errors
    /// signal a malformed JWS (e.g., a missing `alg`) or a disallowed algorithm; they are
    /// returned immediately.
    pub fn verify(
        &self,
        jws: &Jws,
        keys: &JwkSet,
        detached_payload: Option<&[u8]>,
    ) -> Result<VerifiedSignature, Error> {
        let payload = match (jws.payload(), detached_payload) {
            (Some(_), Some(_)) => return Err(Error::AmbiguousPayload),
            (Some(payload), None) | (None, Some(payload)) => payload,
            (None, None) => return Err(Error::MissingPayload),
        };
        let is_encoded = jws.is_payload_encoded()?;

        for (signature_index, signature) in jws.signatures().iter().enumerate() {
            let Some(signature_bytes) = signature.signature() else {
                trace!("signature #{signature_index} is not computed; skipping");
                continue;
            };
            let (alg, algorithm) = self.resolve(signature)?;
            let input = signing_input(signature.encoded_protected(), payload, is_encoded);

            for (key_index, key) in keys.iter().enumerate() {
                match Self::try_key(algorithm, &alg, key, &input, signature_bytes) {
                    Ok(()) => {
                        debug!("JWS signature #{signature_index} verified with key #{key_index}");
                        return Ok(VerifiedSignature {
                            signature_index,
                            key_index,
                        });
                    }
                    Err(err) => {
                        trace!("key #{key_index} failed for signature #{signature_index}: {err}");
                    }
                }
            }
        }
        Err(Error::InvalidSignature)
    }

    fn resolve(&self, signature: &Signature) -> Result<(String, &dyn SignatureAlgorithm), Error> {
        for name in ["b64", "crit"] {
            if signature.header().contains(name) {
                return Err(HeaderError::NotProtected(name.to_owned()).into());
            }
        }
        signature.protected().is_payload_encoded()?;

        let header = signature.merged_header();
        let alg = header.require_str("alg")?;
        let algorithm = self.algorithms.signature(alg)?;
        Ok((alg.to_owned(), algorithm))
    }

    fn try_key(
        algorithm: &dyn SignatureAlgorithm,
        alg: &str,
        key: &Jwk,
        input: &[u8],
        signature: &[u8],
    ) -> Result<(), KeyFailure> {
        key.check_purpose(KeyPurpose::Verification)?;
        key.check_algorithm(alg)?;
        if algorithm.verify(key, input, signature)? {
            Ok(())
        } else {
            Err(KeyFailure::InvalidSignature)
        }
    }
}
