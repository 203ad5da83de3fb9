//! JSON Web Encryption ([RFC 7516]) objects.
//!
//! [RFC 7516]: https://www.rfc-editor.org/rfc/rfc7516.html

use serde_json::Value;

use crate::{base64url, Header, Jwk};

/// Recipient of a [`Jwe`]: the per-recipient header and the encrypted CEK.
#[derive(Debug, Clone, PartialEq)]
pub struct Recipient {
    header: Header,
    encrypted_key: Vec<u8>,
    key: Option<Jwk>,
    sender_key: Option<Jwk>,
}

impl Recipient {
    /// Creates a recipient the CEK will be delivered to using `key`.
    pub fn new(header: Header, key: Jwk) -> Self {
        Self {
            header,
            encrypted_key: Vec::new(),
            key: Some(key),
            sender_key: None,
        }
    }

    pub(crate) fn parsed(header: Header, encrypted_key: Vec<u8>) -> Self {
        Self {
            header,
            encrypted_key,
            key: None,
            sender_key: None,
        }
    }

    /// Sets the static sender key for key agreement algorithms (`ECDH-ES` and its variants).
    /// If not set, an ephemeral key is generated.
    #[must_use]
    pub fn with_sender_key(mut self, sender_key: Jwk) -> Self {
        self.sender_key = Some(sender_key);
        self
    }

    /// Returns the per-recipient unprotected header.
    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Returns the encrypted CEK. This is empty for direct encryption and direct key agreement.
    pub fn encrypted_key(&self) -> &[u8] {
        &self.encrypted_key
    }

    /// Returns the recipient key.
    pub fn key(&self) -> Option<&Jwk> {
        self.key.as_ref()
    }

    /// Returns the sender key.
    pub fn sender_key(&self) -> Option<&Jwk> {
        self.sender_key.as_ref()
    }

    pub(crate) fn set_delivery(&mut self, encrypted_key: Vec<u8>, additional_header: Header) {
        self.encrypted_key = encrypted_key;
        self.header.extend(additional_header);
    }
}

/// Output of content encryption. The IV, ciphertext and authentication tag are always
/// present together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedContent {
    pub(crate) iv: Vec<u8>,
    pub(crate) ciphertext: Vec<u8>,
    pub(crate) tag: Vec<u8>,
}

impl EncryptedContent {
    /// Returns the initialization vector.
    pub fn iv(&self) -> &[u8] {
        &self.iv
    }

    /// Returns the ciphertext.
    pub fn ciphertext(&self) -> &[u8] {
        &self.ciphertext
    }

    /// Returns the authentication tag.
    pub fn tag(&self) -> &[u8] {
        &self.tag
    }
}

/// JSON Web Encryption: a ciphertext with one or more recipients.
///
/// A `Jwe` is either created with a plaintext payload and then encrypted with an
/// [`Encrypter`](crate::Encrypter), or loaded from the wire and decrypted with
/// a [`Decrypter`](crate::Decrypter). Both operations may be performed only once.
///
/// # Examples
///
/// ```
/// use jose_compact::{Header, Jwe, Jwk, Recipient};
///
/// let jwe = Jwe::new(br#"{"sub":"alice"}"#.to_vec())
///     .with_protected(Header::empty().with_encryption("A128GCM"))
///     .with_recipient(Recipient::new(
///         Header::empty().with_algorithm("A128KW"),
///         Jwk::symmetric([0_u8; 16]),
///     ));
/// assert!(!jwe.is_encrypted());
/// assert_eq!(jwe.payload_json().unwrap()["sub"], "alice");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Jwe {
    payload: Option<Vec<u8>>,
    protected: Header,
    encoded_protected: String,
    unprotected: Header,
    aad: Option<Vec<u8>>,
    content: Option<EncryptedContent>,
    recipients: Vec<Recipient>,
}

impl Jwe {
    /// Creates a JWE with the specified plaintext `payload`.
    pub fn new(payload: impl Into<Vec<u8>>) -> Self {
        Self {
            payload: Some(payload.into()),
            protected: Header::empty(),
            encoded_protected: String::new(),
            unprotected: Header::empty(),
            aad: None,
            content: None,
            recipients: Vec::new(),
        }
    }

    pub(crate) fn parsed(
        encoded_protected: String,
        protected: Header,
        unprotected: Header,
        aad: Option<Vec<u8>>,
        content: EncryptedContent,
        recipients: Vec<Recipient>,
    ) -> Self {
        Self {
            payload: None,
            protected,
            encoded_protected,
            unprotected,
            aad,
            content: Some(content),
            recipients,
        }
    }

    /// Sets the shared protected header.
    #[must_use]
    pub fn with_protected(mut self, header: Header) -> Self {
        self.encoded_protected = header.encode();
        self.protected = header;
        self
    }

    /// Sets the shared unprotected header.
    #[must_use]
    pub fn with_unprotected(mut self, header: Header) -> Self {
        self.unprotected = header;
        self
    }

    /// Sets additional authenticated data. AAD cannot be represented in the compact
    /// serialization.
    #[must_use]
    pub fn with_aad(mut self, aad: impl Into<Vec<u8>>) -> Self {
        self.aad = Some(aad.into());
        self
    }

    /// Adds a recipient.
    #[must_use]
    pub fn with_recipient(mut self, recipient: Recipient) -> Self {
        self.recipients.push(recipient);
        self
    }

    /// Returns the plaintext payload. For a loaded JWE, the payload is available only after
    /// successful decryption.
    pub fn payload(&self) -> Option<&[u8]> {
        self.payload.as_deref()
    }

    /// Parses the payload as JSON. Returns `None` if the payload is absent or is not valid JSON.
    pub fn payload_json(&self) -> Option<Value> {
        serde_json::from_slice(self.payload()?).ok()
    }

    /// Returns the shared protected header.
    pub fn protected(&self) -> &Header {
        &self.protected
    }

    /// Returns the protected header in the encoded form used as the AAD base.
    pub fn encoded_protected(&self) -> &str {
        &self.encoded_protected
    }

    /// Returns the shared unprotected header.
    pub fn unprotected(&self) -> &Header {
        &self.unprotected
    }

    /// Returns additional authenticated data.
    pub fn aad(&self) -> Option<&[u8]> {
        self.aad.as_deref()
    }

    /// Returns the encrypted content, or `None` if the JWE is not encrypted yet.
    pub fn content(&self) -> Option<&EncryptedContent> {
        self.content.as_ref()
    }

    /// Checks whether the JWE is encrypted.
    pub fn is_encrypted(&self) -> bool {
        self.content.is_some()
    }

    /// Returns recipients in the order they were added.
    pub fn recipients(&self) -> &[Recipient] {
        &self.recipients
    }

    /// Returns the merged header for the recipient with the specified index: the protected
    /// header, then the shared unprotected header, then the recipient header.
    pub fn recipient_header(&self, index: usize) -> Option<Header> {
        let recipient = self.recipients.get(index)?;
        Some(Header::merge([
            &self.protected,
            &self.unprotected,
            &recipient.header,
        ]))
    }

    /// Computes the AAD for content encryption: ASCII of the encoded protected header,
    /// optionally followed by `.` and the base64url-encoded JWE AAD.
    pub(crate) fn content_aad(encoded_protected: &str, aad: Option<&[u8]>) -> Vec<u8> {
        let mut output = encoded_protected.as_bytes().to_vec();
        if let Some(aad) = aad {
            output.push(b'.');
            output.extend_from_slice(base64url::encode(aad).as_bytes());
        }
        output
    }

    pub(crate) fn commit_encryption(
        &mut self,
        protected: Header,
        encoded_protected: String,
        recipients: Vec<Recipient>,
        content: EncryptedContent,
    ) {
        self.protected = protected;
        self.encoded_protected = encoded_protected;
        self.recipients = recipients;
        self.content = Some(content);
    }

    pub(crate) fn commit_decryption(&mut self, payload: Vec<u8>) {
        self.payload = Some(payload);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_aad_with_and_without_jwe_aad() {
        let encoded = "eyJlbmMiOiJBMTI4R0NNIn0";
        assert_eq!(Jwe::content_aad(encoded, None), encoded.as_bytes());
        assert_eq!(
            Jwe::content_aad(encoded, Some(b"meta")),
            b"eyJlbmMiOiJBMTI4R0NNIn0.bWV0YQ"
        );
    }

    #[test]
    fn recipient_header_precedence() {
        let jwe = Jwe::new(b"test".to_vec())
            .with_protected(Header::empty().with_encryption("A128GCM").with_key_id("p"))
            .with_unprotected(Header::empty().with_key_id("u").with_content_type("text"))
            .with_recipient(Recipient::new(
                Header::empty().with_algorithm("A128KW").with_key_id("r"),
                Jwk::symmetric([0_u8; 16]),
            ));

        let header = jwe.recipient_header(0).unwrap();
        assert_eq!(header.encryption(), Some("A128GCM"));
        assert_eq!(header.algorithm(), Some("A128KW"));
        assert_eq!(header.key_id(), Some("r"));
        assert_eq!(header.get("cty").unwrap(), "text");
        assert!(jwe.recipient_header(1).is_none());
    }

    #[test]
    fn recipient_delivery_extends_header() {
        let mut recipient = Recipient::new(
            Header::empty().with_algorithm("ECDH-ES+A128KW"),
            Jwk::symmetric([0_u8; 16]),
        );
        recipient.set_delivery(vec![1, 2, 3], Header::empty().with_param("epk", "stub"));
        assert_eq!(recipient.encrypted_key(), [1, 2, 3]);
        assert_eq!(recipient.header().get("epk").unwrap(), "stub");
        assert_eq!(recipient.header().algorithm(), Some("ECDH-ES+A128KW"));
    }
}
