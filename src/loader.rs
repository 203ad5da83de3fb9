//! Loading JWS / JWE objects from the wire.
//!
//! [`Loader`] is purely structural: it allows inspecting headers (e.g., to select keys by `kid`)
//! before any cryptographic operation. [`JwsLoader`] and [`JweLoader`] combine loading with
//! verification / decryption and claim checks.

use serde_json::Value;

use crate::{
    checker::CheckerManager,
    decrypter::DecryptedRecipient,
    serialization::{parse, JoseObject},
    verifier::VerifiedSignature,
    Decrypter, Error, Jwe, JwkSet, Jws, ParseError, Verifier,
};

/// Structural loader of JWS and JWE objects in any serialization.
///
/// # Examples
///
/// ```
/// use jose_compact::Loader;
///
/// # fn main() -> anyhow::Result<()> {
/// let token = "eyJhbGciOiJIUzI1NiIsImtpZCI6Im15LWtleSJ9.e30.AQID";
/// let jws = Loader.load_jws(token)?;
/// assert_eq!(jws.signatures()[0].protected().key_id(), Some("my-key"));
/// assert!(Loader.load_jwe(token).is_err());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct Loader;

impl Loader {
    /// Loads a JWS or JWE.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is malformed.
    pub fn load(self, input: &str) -> Result<JoseObject, ParseError> {
        parse(input)
    }

    /// Loads a JWS.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is malformed or is a JWE.
    pub fn load_jws(self, input: &str) -> Result<Jws, ParseError> {
        match parse(input)? {
            JoseObject::Jws(jws) => Ok(jws),
            JoseObject::Jwe(_) => Err(ParseError::NotJws),
        }
    }

    /// Loads a JWE.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is malformed or is a JWS.
    pub fn load_jwe(self, input: &str) -> Result<Jwe, ParseError> {
        match parse(input)? {
            JoseObject::Jwe(jwe) => Ok(jwe),
            JoseObject::Jws(_) => Err(ParseError::NotJwe),
        }
    }
}

/// Loads, verifies and checks JWS objects.
#[derive(Debug, Clone)]
pub struct JwsLoader {
    verifier: Verifier,
    checker: CheckerManager,
}

impl JwsLoader {
    /// Creates a loader.
    pub fn new(verifier: Verifier, checker: CheckerManager) -> Self {
        Self { verifier, checker }
    }

    /// Loads the JWS from `input`, verifies it and runs checkers for the verified signature.
    /// For detached payloads, claims are read from `detached_payload`.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the stages fails.
    pub fn load_and_verify(
        &self,
        input: &str,
        keys: &JwkSet,
        detached_payload: Option<&[u8]>,
    ) -> Result<(Jws, VerifiedSignature), Error> {
        let jws = Loader.load_jws(input)?;
        let verified = self.verifier.verify(&jws, keys, detached_payload)?;

        let claims = match detached_payload {
            Some(payload) => serde_json::from_slice::<Value>(payload).ok(),
            None => jws.payload_json(),
        };
        let signature = &jws.signatures()[verified.signature_index];
        self.checker.check_signature(signature, claims.as_ref())?;
        Ok((jws, verified))
    }
}

/// Loads, decrypts and checks JWE objects.
#[derive(Debug, Clone)]
pub struct JweLoader {
    decrypter: Decrypter,
    checker: CheckerManager,
}

impl JweLoader {
    /// Creates a loader.
    pub fn new(decrypter: Decrypter, checker: CheckerManager) -> Self {
        Self { decrypter, checker }
    }

    /// Loads the JWE from `input`, decrypts it and runs checkers for the recipient
    /// that has been used for decryption.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the stages fails.
    pub fn load_and_decrypt(
        &self,
        input: &str,
        keys: &JwkSet,
    ) -> Result<(Jwe, DecryptedRecipient), Error> {
        let mut jwe = Loader.load_jwe(input)?;
        let decrypted = self.decrypter.decrypt(&mut jwe, keys)?;
        self.checker.check_jwe(&jwe, decrypted.recipient_index)?;
        Ok((jwe, decrypted))
    }
}
