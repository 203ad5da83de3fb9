//! JWS signing.

use tracing::debug;

use crate::{
    alg::AlgorithmManager,
    jwk::KeyPurpose,
    jws::{signing_input, Signature},
    Error, HeaderError, Jwk, Jws,
};

/// Parameters that are only meaningful when integrity-protected.
const PROTECTED_ONLY: [&str; 2] = ["b64", "crit"];

/// Computes signatures for a [`Jws`] using an allow-list of algorithms.
///
/// # Examples
///
/// ```
/// use jose_compact::{alg::AlgorithmManager, Header, Jwk, Jws, Signature, Signer};
///
/// # fn main() -> anyhow::Result<()> {
/// let signer = Signer::new(AlgorithmManager::from_names(["HS256"])?);
/// let key = Jwk::symmetric(b"super_secret_key_donut_steel");
/// let mut jws = Jws::new(b"Hello, world!".to_vec()).with_signature(Signature::new(
///     Header::empty().with_algorithm("HS256"),
///     Header::empty(),
///     key,
/// ));
/// signer.sign(&mut jws)?;
/// assert_eq!(jws.signatures()[0].signature().unwrap().len(), 32);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Signer {
    algorithms: AlgorithmManager,
}

impl Signer {
    /// Creates a signer with the specified algorithms.
    pub fn new(algorithms: AlgorithmManager) -> Self {
        Self { algorithms }
    }

    /// Returns algorithms available to this signer.
    pub fn algorithms(&self) -> &AlgorithmManager {
        &self.algorithms
    }

    /// Computes signatures for every [`Signature`] of the `jws` that has a key attached.
    /// Signatures without a key are left intact.
    ///
    /// Either all signatures are computed, or the `jws` is left unchanged.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload is missing, headers are invalid, the algorithm
    /// is not allowed, or a key cannot be used for signing.
    pub fn sign(&self, jws: &mut Jws) -> Result<(), Error> {
        let payload = jws.payload().ok_or(Error::MissingPayload)?;
        let is_encoded = jws.is_payload_encoded()?;

        let mut computed = Vec::with_capacity(jws.signatures().len());
        for (index, signature) in jws.signatures().iter().enumerate() {
            let Some(key) = signature.key() else {
                continue;
            };
            let bytes = self.sign_one(signature, key, payload, is_encoded)?;
            computed.push((index, bytes));
        }

        let count = computed.len();
        let signatures = jws.signatures_mut();
        for (index, bytes) in computed {
            signatures[index].set_signature(bytes);
        }
        debug!("signed JWS: {count} signature(s) computed");
        Ok(())
    }

    fn sign_one(
        &self,
        signature: &Signature,
        key: &Jwk,
        payload: &[u8],
        is_encoded: bool,
    ) -> Result<Vec<u8>, Error> {
        for name in PROTECTED_ONLY {
            if signature.header().contains(name) {
                return Err(HeaderError::NotProtected(name.to_owned()).into());
            }
        }
        signature.protected().is_payload_encoded()?;
        signature.protected().critical()?;

        let header = signature.merged_header();
        let alg = header.require_str("alg")?;
        let algorithm = self.algorithms.signature(alg)?;
        key.check_algorithm(alg)?;
        key.check_purpose(KeyPurpose::Signing)?;

        let input = signing_input(signature.encoded_protected(), payload, is_encoded);
        algorithm.sign(key, &input).map_err(Error::Algorithm)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CapabilityError, Header, KeyManagementError};

    use assert_matches::assert_matches;

    fn signer() -> Signer {
        Signer::new(AlgorithmManager::from_names(["HS256", "HS384"]).unwrap())
    }

    fn key() -> Jwk {
        Jwk::symmetric(b"super_secret_key_donut_steel")
    }

    #[test]
    fn signing_multiple_signatures() {
        let mut jws = Jws::new(b"test".to_vec())
            .with_signature(Signature::new(
                Header::empty().with_algorithm("HS256"),
                Header::empty(),
                key(),
            ))
            .with_signature(Signature::new(
                Header::empty(),
                Header::empty().with_algorithm("HS384"),
                key(),
            ));
        signer().sign(&mut jws).unwrap();
        assert_eq!(jws.signatures()[0].signature().unwrap().len(), 32);
        assert_eq!(jws.signatures()[1].signature().unwrap().len(), 48);
    }

    #[test]
    fn signing_fails_atomically() {
        let mut jws = Jws::new(b"test".to_vec())
            .with_signature(Signature::new(
                Header::empty().with_algorithm("HS256"),
                Header::empty(),
                key(),
            ))
            .with_signature(Signature::new(
                Header::empty().with_algorithm("HS512"),
                Header::empty(),
                key(),
            ));
        let err = signer().sign(&mut jws).unwrap_err();
        assert_matches!(
            err,
            Error::KeyManagement(KeyManagementError::UnsupportedAlgorithm(name)) if name == "HS512"
        );
        assert!(jws.signatures()[0].signature().is_none());
    }

    #[test]
    fn key_capability_is_checked() {
        let sign = |key: Jwk| {
            let mut jws = Jws::new(b"test".to_vec()).with_signature(Signature::new(
                Header::empty().with_algorithm("HS256"),
                Header::empty(),
                key,
            ));
            signer().sign(&mut jws)
        };

        let err = sign(key().with_param("alg", "HS384").unwrap()).unwrap_err();
        assert_matches!(
            err,
            Error::Capability(CapabilityError::AlgorithmMismatch { key_alg, .. }) if key_alg == "HS384"
        );
        let err = sign(key().with_param("use", "enc").unwrap()).unwrap_err();
        assert_matches!(
            err,
            Error::Capability(CapabilityError::KeyUsageForbidden { expected: "sig", .. })
        );
        let err = sign(key().with_param("key_ops", vec!["verify"]).unwrap()).unwrap_err();
        assert_matches!(
            err,
            Error::Capability(CapabilityError::KeyOperationForbidden { .. })
        );
        let key = key().with_param("use", "sig").unwrap();
        sign(key.with_param("key_ops", vec!["sign"]).unwrap()).unwrap();
    }

    #[test]
    fn header_errors() {
        let sign = |protected: Header, header: Header| {
            let mut jws =
                Jws::new(b"test".to_vec()).with_signature(Signature::new(protected, header, key()));
            signer().sign(&mut jws)
        };

        let err = sign(Header::empty(), Header::empty()).unwrap_err();
        assert_matches!(err, Error::Header(HeaderError::MissingParameter("alg")));

        let err = sign(
            Header::empty().with_algorithm("HS256"),
            Header::empty().with_param("b64", false),
        )
        .unwrap_err();
        assert_matches!(err, Error::Header(HeaderError::NotProtected(name)) if name == "b64");

        let err = sign(
            Header::empty().with_algorithm("HS256").with_param("b64", false),
            Header::empty(),
        )
        .unwrap_err();
        assert_matches!(err, Error::Header(HeaderError::UnencodedPayloadNotCritical));
    }

    #[test]
    fn missing_payload() {
        let mut jws = Jws::from_parts(None, true, vec![]);
        assert_matches!(signer().sign(&mut jws).unwrap_err(), Error::MissingPayload);
    }
}
