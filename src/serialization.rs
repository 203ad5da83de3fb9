//! Conversion between JWS / JWE objects and their wire forms: compact, flattened JSON
//! and general JSON serializations.
//!
//! # Examples
//!
//! ```
//! use jose_compact::{parse, JoseObject, Serialization};
//!
//! # fn main() -> anyhow::Result<()> {
//! let token = "eyJhbGciOiJIUzI1NiJ9.TGl2ZSBsb25nIGFuZCBQcm9zcGVyLg.\
//!              kb8dffhNMKNUAmpKSw9qUAC_0JQkGp0YzaU0YcBFmaY";
//! let JoseObject::Jws(jws) = parse(token)? else {
//!     unreachable!();
//! };
//! assert_eq!(jws.payload(), Some(&b"Live long and Prosper."[..]));
//!
//! let json = jws.serialize(Serialization::General, 0)?;
//! assert!(json.starts_with(r#"{"payload":"TGl2ZSBsb25nIGFuZCBQcm9zcGVyLg","#));
//! # Ok(())
//! # }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use smallvec::SmallVec;

use crate::{
    base64url,
    jwe::{EncryptedContent, Recipient},
    jws::Signature,
    Header, Jwe, Jws, ParseError, SerializationError,
};

/// Wire form of a JWS or JWE.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Serialization {
    /// Compact serialization: base64url-encoded parts separated by `.`.
    Compact,
    /// Flattened JSON serialization with a single signature / recipient.
    Flattened,
    /// General JSON serialization.
    General,
}

/// Object produced by [`parse()`]: either a JWS or a JWE. Signatures and tags
/// are not checked.
#[derive(Debug, Clone, PartialEq)]
pub enum JoseObject {
    /// JSON Web Signature.
    Jws(Jws),
    /// JSON Web Encryption.
    Jwe(Jwe),
}

// Wire structures.

#[derive(Debug, Serialize, Deserialize)]
struct SignatureJson {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    protected: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    header: Option<Header>,
    signature: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct FlattenedJws {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    payload: Option<String>,
    #[serde(flatten)]
    signature: SignatureJson,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeneralJws {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    payload: Option<String>,
    signatures: Vec<SignatureJson>,
}

#[derive(Debug, Serialize, Deserialize)]
struct RecipientJson {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    header: Option<Header>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    encrypted_key: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct SharedJwe {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    protected: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    unprotected: Option<Header>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    iv: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    aad: Option<String>,
    ciphertext: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tag: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct FlattenedJwe {
    #[serde(flatten)]
    shared: SharedJwe,
    #[serde(flatten)]
    recipient: RecipientJson,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeneralJwe {
    #[serde(flatten)]
    shared: SharedJwe,
    recipients: Vec<RecipientJson>,
}

fn non_empty(header: &Header) -> Option<Header> {
    (!header.is_empty()).then(|| header.clone())
}

fn non_empty_str(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_owned())
}

fn non_empty_bytes(value: &[u8]) -> Option<String> {
    (!value.is_empty()).then(|| base64url::encode(value))
}

fn to_json(value: &impl Serialize) -> Result<String, SerializationError> {
    serde_json::to_string(value).map_err(SerializationError::Json)
}

fn check_index(index: usize, len: usize) -> Result<(), SerializationError> {
    if index < len {
        Ok(())
    } else {
        Err(SerializationError::IndexOutOfBounds { index, len })
    }
}

impl Signature {
    fn to_json(&self) -> Result<SignatureJson, SerializationError> {
        let signature = self.signature().ok_or(SerializationError::NotSigned)?;
        Ok(SignatureJson {
            protected: non_empty_str(self.encoded_protected()),
            header: non_empty(self.header()),
            signature: base64url::encode(signature),
        })
    }
}

impl Jws {
    /// Serializes the signature with the specified `index` in the specified form.
    /// For the general form, all signatures are serialized, and `index` is ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if the object cannot be represented in the requested form.
    pub fn serialize(
        &self,
        serialization: Serialization,
        index: usize,
    ) -> Result<String, SerializationError> {
        match serialization {
            Serialization::Compact => self.to_compact(index),
            Serialization::Flattened => self.to_flattened(index),
            Serialization::General => self.to_general(),
        }
    }

    /// Serializes a single-signature JWS in the compact form.
    ///
    /// # Errors
    ///
    /// Returns an error if `index` is out of bounds, if the JWS has several signatures,
    /// if the signature has an unprotected header, or if an unencoded payload contains `.`.
    pub fn to_compact(&self, index: usize) -> Result<String, SerializationError> {
        let signatures = self.signatures();
        check_index(index, signatures.len())?;
        if signatures.len() > 1 {
            return Err(SerializationError::MultipleSignatures);
        }
        let signature = &signatures[index];
        if !signature.header().is_empty() {
            return Err(SerializationError::UnprotectedHeader);
        }
        let signature_bytes = signature.signature().ok_or(SerializationError::NotSigned)?;

        let payload = self.wire_payload()?.unwrap_or_default();
        if !signature.is_payload_encoded() && payload.contains('.') {
            return Err(SerializationError::UnencodedPayloadWithPeriod);
        }
        Ok(format!(
            "{}.{payload}.{}",
            signature.encoded_protected(),
            base64url::encode(signature_bytes)
        ))
    }

    /// Serializes a single-signature JWS in the flattened JSON form.
    ///
    /// # Errors
    ///
    /// Returns an error if `index` is out of bounds or if the JWS has several signatures.
    pub fn to_flattened(&self, index: usize) -> Result<String, SerializationError> {
        let signatures = self.signatures();
        check_index(index, signatures.len())?;
        if signatures.len() > 1 {
            return Err(SerializationError::MultipleSignatures);
        }
        to_json(&FlattenedJws {
            payload: self.wire_payload()?,
            signature: signatures[index].to_json()?,
        })
    }

    /// Serializes the JWS in the general JSON form.
    ///
    /// # Errors
    ///
    /// Returns an error if the JWS has no signatures or some signatures are not computed.
    pub fn to_general(&self) -> Result<String, SerializationError> {
        if self.signatures().is_empty() {
            return Err(SerializationError::Empty);
        }
        let signatures = self
            .signatures()
            .iter()
            .map(Signature::to_json)
            .collect::<Result<_, _>>()?;
        to_json(&GeneralJws {
            payload: self.wire_payload()?,
            signatures,
        })
    }

    /// Returns the payload as it appears on the wire, or `None` if it is detached.
    fn wire_payload(&self) -> Result<Option<String>, SerializationError> {
        if self.is_detached() {
            return Ok(None);
        }
        let Some(payload) = self.payload() else {
            return Ok(None);
        };
        if self.is_payload_encoded()? {
            Ok(Some(base64url::encode(payload)))
        } else {
            let payload =
                String::from_utf8(payload.to_vec()).map_err(|_| SerializationError::NonUtf8Payload)?;
            Ok(Some(payload))
        }
    }
}

impl Jwe {
    /// Serializes the recipient with the specified `index` in the specified form.
    /// For the general form, all recipients are serialized, and `index` is ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if the object cannot be represented in the requested form.
    pub fn serialize(
        &self,
        serialization: Serialization,
        index: usize,
    ) -> Result<String, SerializationError> {
        match serialization {
            Serialization::Compact => self.to_compact(index),
            Serialization::Flattened => self.to_flattened(index),
            Serialization::General => self.to_general(),
        }
    }

    /// Serializes a single-recipient JWE in the compact form.
    ///
    /// # Errors
    ///
    /// Returns an error if `index` is out of bounds, if the JWE has several recipients,
    /// or if it has unprotected headers or AAD (which the compact form cannot carry).
    pub fn to_compact(&self, index: usize) -> Result<String, SerializationError> {
        let recipients = self.recipients();
        check_index(index, recipients.len())?;
        if recipients.len() > 1 {
            return Err(SerializationError::MultipleRecipients);
        }
        let recipient = &recipients[index];
        if !self.unprotected().is_empty() || !recipient.header().is_empty() {
            return Err(SerializationError::UnprotectedHeader);
        }
        if self.aad().is_some() {
            return Err(SerializationError::AdditionalAuthenticatedData);
        }
        let content = self.content().ok_or(SerializationError::NotEncrypted)?;

        Ok(format!(
            "{}.{}.{}.{}.{}",
            self.encoded_protected(),
            base64url::encode(recipient.encrypted_key()),
            base64url::encode(&content.iv),
            base64url::encode(&content.ciphertext),
            base64url::encode(&content.tag)
        ))
    }

    /// Serializes a single-recipient JWE in the flattened JSON form.
    ///
    /// # Errors
    ///
    /// Returns an error if `index` is out of bounds or if the JWE has several recipients.
    pub fn to_flattened(&self, index: usize) -> Result<String, SerializationError> {
        let recipients = self.recipients();
        check_index(index, recipients.len())?;
        if recipients.len() > 1 {
            return Err(SerializationError::MultipleRecipients);
        }
        to_json(&FlattenedJwe {
            shared: self.shared_json()?,
            recipient: Self::recipient_json(&recipients[index]),
        })
    }

    /// Serializes the JWE in the general JSON form.
    ///
    /// # Errors
    ///
    /// Returns an error if the JWE has no recipients or is not encrypted.
    pub fn to_general(&self) -> Result<String, SerializationError> {
        if self.recipients().is_empty() {
            return Err(SerializationError::Empty);
        }
        to_json(&GeneralJwe {
            shared: self.shared_json()?,
            recipients: self.recipients().iter().map(Self::recipient_json).collect(),
        })
    }

    fn shared_json(&self) -> Result<SharedJwe, SerializationError> {
        let content = self.content().ok_or(SerializationError::NotEncrypted)?;
        Ok(SharedJwe {
            protected: non_empty_str(self.encoded_protected()),
            unprotected: non_empty(self.unprotected()),
            iv: non_empty_bytes(&content.iv),
            aad: self.aad().map(base64url::encode),
            ciphertext: base64url::encode(&content.ciphertext),
            tag: non_empty_bytes(&content.tag),
        })
    }

    fn recipient_json(recipient: &Recipient) -> RecipientJson {
        RecipientJson {
            header: non_empty(recipient.header()),
            encrypted_key: non_empty_bytes(recipient.encrypted_key()),
        }
    }
}

/// Parses a JWS or JWE in any of the supported serializations.
///
/// Input starting with `{` is treated as a JSON serialization; the kind of the object is
/// determined by the `signatures`, `recipients`, `signature` and `ciphertext` members
/// (in this order). Other input is split by `.`: 3 parts denote a compact JWS (an empty
/// payload part means a detached payload), and 5 parts a compact JWE.
///
/// Parsing is purely structural; no cryptographic checks are performed.
///
/// # Errors
///
/// Returns an error if the input is malformed.
pub fn parse(input: &str) -> Result<JoseObject, ParseError> {
    let trimmed = input.trim();
    if trimmed.starts_with('{') {
        let object: Map<String, Value> =
            serde_json::from_str(trimmed).map_err(ParseError::MalformedJson)?;
        return parse_json(object);
    }

    let parts: SmallVec<[&str; 5]> = trimmed.split('.').collect();
    match parts.as_slice() {
        [protected, payload, signature] => parse_compact_jws(protected, payload, signature),
        [protected, encrypted_key, iv, ciphertext, tag] => {
            parse_compact_jwe(protected, encrypted_key, iv, ciphertext, tag)
        }
        _ => Err(ParseError::InvalidStructure { parts: parts.len() }),
    }
}

fn parse_compact_jws(
    protected: &str,
    payload: &str,
    signature: &str,
) -> Result<JoseObject, ParseError> {
    let header = Header::decode(protected)?;
    let signature = base64url::decode("signature", signature)?;
    let signature = Signature::parsed(protected.to_owned(), header, Header::empty(), signature);
    let payload = (!payload.is_empty()).then_some(payload);
    finish_jws(payload, vec![signature])
}

fn parse_compact_jwe(
    protected: &str,
    encrypted_key: &str,
    iv: &str,
    ciphertext: &str,
    tag: &str,
) -> Result<JoseObject, ParseError> {
    if protected.is_empty() {
        return Err(ParseError::EmptyComponent("protected"));
    }
    if ciphertext.is_empty() {
        return Err(ParseError::EmptyComponent("ciphertext"));
    }
    let header = Header::decode(protected)?;
    let content = EncryptedContent {
        iv: base64url::decode("iv", iv)?,
        ciphertext: base64url::decode("ciphertext", ciphertext)?,
        tag: base64url::decode("tag", tag)?,
    };
    let encrypted_key = base64url::decode("encrypted_key", encrypted_key)?;
    let recipient = Recipient::parsed(Header::empty(), encrypted_key);
    Ok(JoseObject::Jwe(Jwe::parsed(
        protected.to_owned(),
        header,
        Header::empty(),
        None,
        content,
        vec![recipient],
    )))
}

fn parse_json(object: Map<String, Value>) -> Result<JoseObject, ParseError> {
    fn from_object<T: serde::de::DeserializeOwned>(
        object: Map<String, Value>,
    ) -> Result<T, ParseError> {
        serde_json::from_value(Value::Object(object)).map_err(ParseError::MalformedJson)
    }

    if object.contains_key("signatures") {
        let jws: GeneralJws = from_object(object)?;
        let signatures = jws
            .signatures
            .into_iter()
            .map(parse_json_signature)
            .collect::<Result<_, _>>()?;
        finish_jws(jws.payload.as_deref(), signatures)
    } else if object.contains_key("recipients") {
        let jwe: GeneralJwe = from_object(object)?;
        let recipients = jwe
            .recipients
            .into_iter()
            .map(parse_json_recipient)
            .collect::<Result<_, _>>()?;
        finish_jwe(jwe.shared, recipients)
    } else if object.contains_key("signature") {
        let jws: FlattenedJws = from_object(object)?;
        let signature = parse_json_signature(jws.signature)?;
        finish_jws(jws.payload.as_deref(), vec![signature])
    } else if object.contains_key("ciphertext") {
        let jwe: FlattenedJwe = from_object(object)?;
        let recipient = parse_json_recipient(jwe.recipient)?;
        finish_jwe(jwe.shared, vec![recipient])
    } else {
        Err(ParseError::UnrecognizedJson)
    }
}

fn parse_json_signature(signature: SignatureJson) -> Result<Signature, ParseError> {
    let encoded_protected = signature.protected.unwrap_or_default();
    let protected = Header::decode(&encoded_protected)?;
    let bytes = base64url::decode("signature", &signature.signature)?;
    Ok(Signature::parsed(
        encoded_protected,
        protected,
        signature.header.unwrap_or_default(),
        bytes,
    ))
}

fn parse_json_recipient(recipient: RecipientJson) -> Result<Recipient, ParseError> {
    let encrypted_key =
        base64url::decode_or_empty("encrypted_key", recipient.encrypted_key.as_deref())?;
    Ok(Recipient::parsed(
        recipient.header.unwrap_or_default(),
        encrypted_key,
    ))
}

fn finish_jws(payload: Option<&str>, signatures: Vec<Signature>) -> Result<JoseObject, ParseError> {
    let mut flags = signatures.iter().map(Signature::is_payload_encoded);
    let is_encoded = flags.next().unwrap_or(true);
    if flags.any(|flag| flag != is_encoded) {
        return Err(ParseError::InconsistentPayloadEncoding);
    }

    let jws = match payload {
        None => Jws::from_parts(None, true, signatures),
        Some(payload) => {
            let payload = if is_encoded {
                base64url::decode("payload", payload)?
            } else {
                payload.as_bytes().to_vec()
            };
            Jws::from_parts(Some(payload), false, signatures)
        }
    };
    Ok(JoseObject::Jws(jws))
}

fn finish_jwe(shared: SharedJwe, recipients: Vec<Recipient>) -> Result<JoseObject, ParseError> {
    let encoded_protected = shared.protected.unwrap_or_default();
    let protected = Header::decode(&encoded_protected)?;
    let aad = shared
        .aad
        .as_deref()
        .map(|aad| base64url::decode("aad", aad))
        .transpose()?;
    let content = EncryptedContent {
        iv: base64url::decode_or_empty("iv", shared.iv.as_deref())?,
        ciphertext: base64url::decode("ciphertext", &shared.ciphertext)?,
        tag: base64url::decode_or_empty("tag", shared.tag.as_deref())?,
    };
    Ok(JoseObject::Jwe(Jwe::parsed(
        encoded_protected,
        protected,
        shared.unprotected.unwrap_or_default(),
        aad,
        content,
        recipients,
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Jwk;

    use assert_matches::assert_matches;
    use serde_json::json;

    const HS256_TOKEN: &str = "eyJhbGciOiJIUzI1NiJ9.TGl2ZSBsb25nIGFuZCBQcm9zcGVyLg.\
                               kb8dffhNMKNUAmpKSw9qUAC_0JQkGp0YzaU0YcBFmaY";

    fn signed_jws(protected: Header, header: Header, payload: &[u8]) -> Jws {
        let mut signature = Signature::new(protected, header, Jwk::symmetric(b"secret"));
        signature.set_signature(vec![1, 2, 3, 4]);
        Jws::new(payload.to_vec()).with_signature(signature)
    }

    fn parse_jws(input: &str) -> Jws {
        match parse(input).unwrap() {
            JoseObject::Jws(jws) => jws,
            JoseObject::Jwe(jwe) => panic!("unexpected JWE: {jwe:?}"),
        }
    }

    fn parse_jwe(input: &str) -> Jwe {
        match parse(input).unwrap() {
            JoseObject::Jwe(jwe) => jwe,
            JoseObject::Jws(jws) => panic!("unexpected JWS: {jws:?}"),
        }
    }

    #[test]
    fn parsing_compact_jws() {
        let jws = parse_jws(HS256_TOKEN);
        assert_eq!(jws.payload(), Some(&b"Live long and Prosper."[..]));
        assert!(!jws.is_detached());
        let signature = &jws.signatures()[0];
        assert_eq!(signature.protected().algorithm(), Some("HS256"));
        assert_eq!(signature.encoded_protected(), "eyJhbGciOiJIUzI1NiJ9");
        assert_eq!(signature.signature().unwrap().len(), 32);
        assert!(signature.key().is_none());

        assert_eq!(jws.to_compact(0).unwrap(), HS256_TOKEN);
    }

    #[test]
    fn parsing_detached_compact_jws() {
        let jws = parse_jws("eyJhbGciOiJIUzI1NiJ9..AQIDBA");
        assert!(jws.is_detached());
        assert!(jws.payload().is_none());
        assert_eq!(jws.to_compact(0).unwrap(), "eyJhbGciOiJIUzI1NiJ9..AQIDBA");
    }

    #[test]
    fn invalid_structure() {
        for (input, parts) in [("abc", 1), ("a.b", 2), ("a.b.c.d", 4), ("a.b.c.d.e.f", 6)] {
            assert_matches!(
                parse(input).unwrap_err(),
                ParseError::InvalidStructure { parts: actual } if actual == parts
            );
        }
        assert_matches!(
            parse(r#"{"foo": 1}"#).unwrap_err(),
            ParseError::UnrecognizedJson
        );
        assert_matches!(
            parse(r#"{"signature": 1}"#).unwrap_err(),
            ParseError::MalformedJson(_)
        );
        assert_matches!(parse("{not JSON").unwrap_err(), ParseError::MalformedJson(_));
    }

    #[test]
    fn empty_compact_jwe_components() {
        assert_matches!(
            parse(".a.b.c.d").unwrap_err(),
            ParseError::EmptyComponent("protected")
        );
        assert_matches!(
            parse("eyJhbGciOiJkaXIifQ.a.b..d").unwrap_err(),
            ParseError::EmptyComponent("ciphertext")
        );
        assert_matches!(
            parse("eyJhbGciOiJkaXIifQ..AQID.AQ?.AQID").unwrap_err(),
            ParseError::Base64 { component: "ciphertext", .. }
        );
    }

    #[test]
    fn compact_jwe_with_empty_encrypted_key() {
        let input = "eyJhbGciOiJkaXIifQ..AQID.BAUG.BwgJ";
        let jwe = parse_jwe(input);
        assert_eq!(jwe.protected().algorithm(), Some("dir"));
        assert!(jwe.recipients()[0].encrypted_key().is_empty());
        let content = jwe.content().unwrap();
        assert_eq!(content.iv(), [1, 2, 3]);
        assert_eq!(content.ciphertext(), [4, 5, 6]);
        assert_eq!(content.tag(), [7, 8, 9]);
        assert!(jwe.payload().is_none());
        assert_eq!(jwe.to_compact(0).unwrap(), input);
    }

    #[test]
    fn flattened_and_general_jws() {
        let jws = signed_jws(
            Header::empty().with_algorithm("HS256"),
            Header::empty().with_key_id("key"),
            b"payload",
        );
        let flattened = jws.to_flattened(0).unwrap();
        let value: Value = serde_json::from_str(&flattened).unwrap();
        assert_eq!(
            value,
            json!({
                "payload": "cGF5bG9hZA",
                "protected": "eyJhbGciOiJIUzI1NiJ9",
                "header": { "kid": "key" },
                "signature": "AQIDBA",
            })
        );
        let general = jws.to_general().unwrap();
        let value: Value = serde_json::from_str(&general).unwrap();
        assert_eq!(value["signatures"][0]["header"]["kid"], "key");

        for serialized in [flattened, general] {
            let parsed = parse_jws(&serialized);
            assert_eq!(parsed.payload(), Some(&b"payload"[..]));
            let signature = &parsed.signatures()[0];
            assert_eq!(signature.header().key_id(), Some("key"));
            assert_eq!(signature.signature(), Some(&[1_u8, 2, 3, 4][..]));
        }
    }

    #[test]
    fn compact_jws_restrictions() {
        let jws = signed_jws(
            Header::empty().with_algorithm("HS256"),
            Header::empty().with_key_id("key"),
            b"payload",
        );
        assert_matches!(
            jws.to_compact(0).unwrap_err(),
            SerializationError::UnprotectedHeader
        );
        assert_matches!(
            jws.to_compact(1).unwrap_err(),
            SerializationError::IndexOutOfBounds { index: 1, len: 1 }
        );

        let second = jws.signatures()[0].clone();
        let jws = jws.with_signature(second);
        assert_matches!(
            jws.to_compact(0).unwrap_err(),
            SerializationError::MultipleSignatures
        );
        assert_matches!(
            jws.to_flattened(1).unwrap_err(),
            SerializationError::MultipleSignatures
        );
        assert!(jws.to_general().is_ok());
    }

    #[test]
    fn unsigned_jws_cannot_be_serialized() {
        let jws = Jws::new(b"test".to_vec()).with_signature(Signature::new(
            Header::empty().with_algorithm("HS256"),
            Header::empty(),
            Jwk::symmetric(b"secret"),
        ));
        assert_matches!(jws.to_compact(0).unwrap_err(), SerializationError::NotSigned);
        assert_matches!(jws.to_general().unwrap_err(), SerializationError::NotSigned);
        assert_matches!(
            Jws::new(b"test".to_vec()).to_general().unwrap_err(),
            SerializationError::Empty
        );
    }

    #[test]
    fn unencoded_payload_serialization() {
        let protected = Header::empty().with_algorithm("HS256").with_unencoded_payload();
        let jws = signed_jws(protected.clone(), Header::empty(), b"$.02");
        assert_matches!(
            jws.to_compact(0).unwrap_err(),
            SerializationError::UnencodedPayloadWithPeriod
        );
        let flattened = jws.to_flattened(0).unwrap();
        let value: Value = serde_json::from_str(&flattened).unwrap();
        assert_eq!(value["payload"], "$.02");
        assert_eq!(parse_jws(&flattened).payload(), Some(&b"$.02"[..]));

        let jws = signed_jws(protected.clone(), Header::empty(), b"$02");
        let compact = jws.to_compact(0).unwrap();
        assert!(compact.contains(".$02."), "{compact}");
        assert_eq!(parse_jws(&compact).payload(), Some(&b"$02"[..]));

        let jws = signed_jws(protected, Header::empty(), &[0xff, 0xfe]);
        assert_matches!(
            jws.to_flattened(0).unwrap_err(),
            SerializationError::NonUtf8Payload
        );
    }

    #[test]
    fn inconsistent_payload_encoding_when_parsing() {
        let unencoded = Header::empty().with_algorithm("HS256").with_unencoded_payload();
        let input = json!({
            "payload": "test",
            "signatures": [
                { "protected": unencoded.encode(), "signature": "AQID" },
                { "protected": "eyJhbGciOiJIUzI1NiJ9", "signature": "AQID" },
            ],
        });
        assert_matches!(
            parse(&input.to_string()).unwrap_err(),
            ParseError::InconsistentPayloadEncoding
        );
    }

    #[test]
    fn json_jwe_parsing() {
        let input = json!({
            "protected": "eyJlbmMiOiJBMTI4R0NNIn0",
            "unprotected": { "jku": "https://example.com/keys" },
            "recipients": [
                { "header": { "alg": "A128KW", "kid": "1" }, "encrypted_key": "AQID" },
                { "header": { "alg": "dir", "kid": "2" } },
            ],
            "aad": "bWV0YQ",
            "iv": "AQID",
            "ciphertext": "BAUG",
            "tag": "BwgJ",
        });
        let jwe = parse_jwe(&input.to_string());
        assert_eq!(jwe.protected().encryption(), Some("A128GCM"));
        assert_eq!(jwe.aad(), Some(&b"meta"[..]));
        assert_eq!(jwe.recipients().len(), 2);
        assert_eq!(jwe.recipients()[0].encrypted_key(), [1, 2, 3]);
        assert!(jwe.recipients()[1].encrypted_key().is_empty());
        let header = jwe.recipient_header(1).unwrap();
        assert_eq!(header.algorithm(), Some("dir"));
        assert_eq!(header.get("jku").unwrap(), "https://example.com/keys");

        let general = jwe.to_general().unwrap();
        let value: Value = serde_json::from_str(&general).unwrap();
        assert_eq!(value, input);

        assert_matches!(
            jwe.to_flattened(0).unwrap_err(),
            SerializationError::MultipleRecipients
        );
        assert_matches!(
            jwe.to_compact(0).unwrap_err(),
            SerializationError::MultipleRecipients
        );
    }

    #[test]
    fn flattened_jwe_parsing() {
        let input = json!({
            "protected": "eyJhbGciOiJkaXIiLCJlbmMiOiJBMTI4R0NNIn0",
            "header": { "kid": "1" },
            "iv": "AQID",
            "ciphertext": "BAUG",
            "tag": "BwgJ",
        });
        let jwe = parse_jwe(&input.to_string());
        assert_eq!(jwe.recipients().len(), 1);
        assert_eq!(jwe.recipients()[0].header().key_id(), Some("1"));

        let flattened = jwe.to_flattened(0).unwrap();
        let value: Value = serde_json::from_str(&flattened).unwrap();
        assert_eq!(value, input);
        assert_matches!(
            jwe.to_compact(0).unwrap_err(),
            SerializationError::UnprotectedHeader
        );
    }

    #[test]
    fn unencrypted_jwe_cannot_be_serialized() {
        let jwe = Jwe::new(b"test".to_vec())
            .with_protected(Header::empty().with_algorithm("dir").with_encryption("A128GCM"))
            .with_recipient(Recipient::new(Header::empty(), Jwk::symmetric([0_u8; 16])));
        assert_matches!(
            jwe.to_compact(0).unwrap_err(),
            SerializationError::NotEncrypted
        );
        assert_matches!(
            jwe.to_general().unwrap_err(),
            SerializationError::NotEncrypted
        );
    }

    #[test]
    fn parsing_is_idempotent() {
        assert_eq!(parse(HS256_TOKEN).unwrap(), parse(HS256_TOKEN).unwrap());
    }
}
