//! JSON Web Signature ([RFC 7515]) objects.
//!
//! [RFC 7515]: https://www.rfc-editor.org/rfc/rfc7515.html

use serde_json::Value;

use crate::{base64url, Header, Jwk, SerializationError};

/// Single signature of a [`Jws`].
///
/// A signature consists of the protected header (kept both decoded and in the exact encoded
/// form, since the latter is covered by the signature), the unprotected header and
/// the signature bytes. Signatures created for signing additionally hold the signing key;
/// the key is never serialized.
#[derive(Debug, Clone, PartialEq)]
pub struct Signature {
    protected: Header,
    encoded_protected: String,
    header: Header,
    signature: Option<Vec<u8>>,
    key: Option<Jwk>,
}

impl Signature {
    /// Creates a signature to be computed by a [`Signer`](crate::Signer) with the specified
    /// headers and `key`.
    pub fn new(protected: Header, header: Header, key: Jwk) -> Self {
        Self {
            encoded_protected: protected.encode(),
            protected,
            header,
            signature: None,
            key: Some(key),
        }
    }

    pub(crate) fn parsed(
        encoded_protected: String,
        protected: Header,
        header: Header,
        signature: Vec<u8>,
    ) -> Self {
        Self {
            protected,
            encoded_protected,
            header,
            signature: Some(signature),
            key: None,
        }
    }

    /// Returns the protected header.
    pub fn protected(&self) -> &Header {
        &self.protected
    }

    /// Returns the protected header in the base64url-encoded form covered by the signature.
    pub fn encoded_protected(&self) -> &str {
        &self.encoded_protected
    }

    /// Returns the unprotected header.
    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Returns the merged header: protected parameters overwritten by unprotected ones.
    pub fn merged_header(&self) -> Header {
        Header::merge([&self.protected, &self.header])
    }

    /// Returns signature bytes, or `None` if the signature is not computed yet.
    pub fn signature(&self) -> Option<&[u8]> {
        self.signature.as_deref()
    }

    /// Returns the signing key, if any.
    pub fn key(&self) -> Option<&Jwk> {
        self.key.as_ref()
    }

    /// Checks whether the payload is base64url-encoded for this signature. This only
    /// inspects the protected `b64` parameter; use [`Header::is_payload_encoded()`] for
    /// full validation.
    pub fn is_payload_encoded(&self) -> bool {
        self.protected.get("b64") != Some(&Value::Bool(false))
    }

    pub(crate) fn set_signature(&mut self, signature: Vec<u8>) {
        self.signature = Some(signature);
    }
}

/// JSON Web Signature: a payload with one or more signatures.
///
/// # Examples
///
/// ```
/// use jose_compact::{Header, Jwk, Jws, Signature};
///
/// let key = Jwk::symmetric(b"super_secret_key_donut_steel");
/// let jws = Jws::new(b"Hello, world!".to_vec()).with_signature(Signature::new(
///     Header::empty().with_algorithm("HS256"),
///     Header::empty().with_key_id("hmac"),
///     key,
/// ));
/// assert_eq!(jws.payload(), Some(&b"Hello, world!"[..]));
/// assert_eq!(jws.signatures().len(), 1);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Jws {
    payload: Option<Vec<u8>>,
    detached: bool,
    signatures: Vec<Signature>,
}

impl Jws {
    /// Creates a JWS with the embedded `payload` and no signatures.
    pub fn new(payload: impl Into<Vec<u8>>) -> Self {
        Self {
            payload: Some(payload.into()),
            detached: false,
            signatures: Vec::new(),
        }
    }

    /// Creates a JWS with a detached `payload`. The payload is used for signing, but is not
    /// included into serializations.
    pub fn detached(payload: impl Into<Vec<u8>>) -> Self {
        Self {
            payload: Some(payload.into()),
            detached: true,
            signatures: Vec::new(),
        }
    }

    pub(crate) fn from_parts(
        payload: Option<Vec<u8>>,
        detached: bool,
        signatures: Vec<Signature>,
    ) -> Self {
        Self {
            payload,
            detached,
            signatures,
        }
    }

    /// Adds a signature.
    #[must_use]
    pub fn with_signature(mut self, signature: Signature) -> Self {
        self.signatures.push(signature);
        self
    }

    /// Returns the payload. Returns `None` for JWS loaded with a detached payload.
    pub fn payload(&self) -> Option<&[u8]> {
        self.payload.as_deref()
    }

    /// Parses the payload as JSON. Returns `None` if the payload is absent or is not valid JSON.
    pub fn payload_json(&self) -> Option<Value> {
        serde_json::from_slice(self.payload()?).ok()
    }

    /// Checks whether the payload is detached.
    pub fn is_detached(&self) -> bool {
        self.detached
    }

    /// Returns signatures in the order they were added.
    pub fn signatures(&self) -> &[Signature] {
        &self.signatures
    }

    pub(crate) fn signatures_mut(&mut self) -> &mut [Signature] {
        &mut self.signatures
    }

    /// Checks whether the payload is base64url-encoded, as per the `b64` parameter
    /// of protected headers.
    ///
    /// # Errors
    ///
    /// Returns an error if signatures disagree on the payload encoding.
    pub fn is_payload_encoded(&self) -> Result<bool, SerializationError> {
        let mut flags = self.signatures.iter().map(Signature::is_payload_encoded);
        let Some(first) = flags.next() else {
            return Ok(true);
        };
        if flags.all(|flag| flag == first) {
            Ok(first)
        } else {
            Err(SerializationError::InconsistentPayloadEncoding)
        }
    }
}

/// Computes the JWS signing input.
pub(crate) fn signing_input(encoded_protected: &str, payload: &[u8], is_encoded: bool) -> Vec<u8> {
    let mut input = Vec::with_capacity(encoded_protected.len() + 1 + payload.len() * 4 / 3 + 4);
    input.extend_from_slice(encoded_protected.as_bytes());
    input.push(b'.');
    if is_encoded {
        input.extend_from_slice(base64url::encode(payload).as_bytes());
    } else {
        input.extend_from_slice(payload);
    }
    input
}

#[cfg(test)]
mod tests {
    use super::*;

    use assert_matches::assert_matches;

    #[test]
    fn signing_input_for_encoded_and_unencoded_payloads() {
        let input = signing_input("eyJhbGciOiJIUzI1NiJ9", b"Live long and Prosper.", true);
        assert_eq!(
            input,
            b"eyJhbGciOiJIUzI1NiJ9.TGl2ZSBsb25nIGFuZCBQcm9zcGVyLg"
        );
        let input = signing_input("eyJhbGciOiJIUzI1NiJ9", b"$.02", false);
        assert_eq!(input, b"eyJhbGciOiJIUzI1NiJ9.$.02");
    }

    #[test]
    fn new_signature_encodes_protected_header() {
        let signature = Signature::new(
            Header::empty().with_algorithm("HS256"),
            Header::empty(),
            Jwk::symmetric(b"secret"),
        );
        assert_eq!(signature.encoded_protected(), "eyJhbGciOiJIUzI1NiJ9");
        assert!(signature.signature().is_none());
        assert!(signature.is_payload_encoded());
    }

    #[test]
    fn payload_encoding_consistency() {
        let key = Jwk::symmetric(b"secret");
        let unencoded = Signature::new(
            Header::empty()
                .with_algorithm("HS256")
                .with_unencoded_payload(),
            Header::empty(),
            key.clone(),
        );
        let jws = Jws::new(b"$.02".to_vec()).with_signature(unencoded.clone());
        assert_eq!(jws.is_payload_encoded().unwrap(), false);

        let encoded = Signature::new(Header::empty().with_algorithm("HS256"), Header::empty(), key);
        let jws = jws.with_signature(encoded);
        assert_matches!(
            jws.is_payload_encoded().unwrap_err(),
            SerializationError::InconsistentPayloadEncoding
        );
    }

    #[test]
    fn payload_json() {
        let jws = Jws::new(br#"{"iss":"joe"}"#.to_vec());
        assert_eq!(jws.payload_json().unwrap()["iss"], "joe");
        assert!(Jws::new(b"not json".to_vec()).payload_json().is_none());
    }
}
