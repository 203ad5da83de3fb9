//! JOSE header: a map of parameter names to JSON values.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{base64url, HeaderError, ParseError};

/// JOSE header, either protected (integrity-covered) or unprotected.
///
/// See [RFC 7515](https://www.rfc-editor.org/rfc/rfc7515.html#section-4) and
/// [RFC 7516](https://www.rfc-editor.org/rfc/rfc7516.html#section-4) for the registered
/// parameters. The header is an arbitrary JSON object; this type provides typed accessors
/// for the parameters the engine interprets itself (`alg`, `enc`, `zip`, `crit`, `b64`).
///
/// A `Header` can be created using [`Self::empty()`]. For added fluency, you may use
/// `with_*` methods:
///
/// ```
/// # use jose_compact::Header;
/// let header = Header::empty()
///     .with_algorithm("HS256")
///     .with_key_id("my-key-id")
///     .with_token_type("JWT");
/// assert_eq!(header.algorithm(), Some("HS256"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Header(Map<String, Value>);

impl From<Map<String, Value>> for Header {
    fn from(params: Map<String, Value>) -> Self {
        Self(params)
    }
}

impl Header {
    /// Creates a header with no parameters.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Sets an arbitrary parameter.
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(name.into(), value.into());
        self
    }

    /// Sets the `alg` parameter.
    pub fn with_algorithm(self, algorithm: impl Into<String>) -> Self {
        self.with_param("alg", algorithm.into())
    }

    /// Sets the `enc` parameter (content encryption algorithm of a JWE).
    pub fn with_encryption(self, encryption: impl Into<String>) -> Self {
        self.with_param("enc", encryption.into())
    }

    /// Sets the `kid` parameter.
    pub fn with_key_id(self, key_id: impl Into<String>) -> Self {
        self.with_param("kid", key_id.into())
    }

    /// Sets the `cty` parameter.
    pub fn with_content_type(self, content_type: impl Into<String>) -> Self {
        self.with_param("cty", content_type.into())
    }

    /// Sets the `typ` parameter.
    pub fn with_token_type(self, token_type: impl Into<String>) -> Self {
        self.with_param("typ", token_type.into())
    }

    /// Sets the `zip` parameter (compression method applied before encryption).
    pub fn with_compression(self, method: impl Into<String>) -> Self {
        self.with_param("zip", method.into())
    }

    /// Sets the `crit` parameter.
    pub fn with_critical<I, S>(self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<_> = names.into_iter().map(|name| Value::String(name.into())).collect();
        self.with_param("crit", names)
    }

    /// Marks the JWS payload as unencoded as per [RFC 7797]: sets `b64` to `false`
    /// and adds `b64` to the `crit` parameter. Must be used on a protected header.
    ///
    /// [RFC 7797]: https://www.rfc-editor.org/rfc/rfc7797.html
    pub fn with_unencoded_payload(mut self) -> Self {
        let mut critical = match self.0.remove("crit") {
            Some(Value::Array(names)) => names,
            _ => Vec::new(),
        };
        if !critical.iter().any(|name| name == "b64") {
            critical.push(Value::String("b64".to_owned()));
        }
        self.0.insert("crit".to_owned(), Value::Array(critical));
        self.with_param("b64", false)
    }

    /// Gets a parameter by name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// Checks whether the header contains the specified parameter.
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// Returns `true` if the header has no parameters.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over parameters in the header.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> + '_ {
        self.0.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Returns the underlying JSON object.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Gets the `alg` parameter if it is present and is a string.
    pub fn algorithm(&self) -> Option<&str> {
        self.get("alg").and_then(Value::as_str)
    }

    /// Gets the `enc` parameter if it is present and is a string.
    pub fn encryption(&self) -> Option<&str> {
        self.get("enc").and_then(Value::as_str)
    }

    /// Gets the `kid` parameter if it is present and is a string.
    pub fn key_id(&self) -> Option<&str> {
        self.get("kid").and_then(Value::as_str)
    }

    /// Gets the `zip` parameter if it is present and is a string.
    pub fn compression(&self) -> Option<&str> {
        self.get("zip").and_then(Value::as_str)
    }

    /// Returns names listed in the `crit` parameter. An absent parameter yields
    /// an empty list.
    pub fn critical(&self) -> Result<Vec<&str>, HeaderError> {
        let Some(critical) = self.get("crit") else {
            return Ok(Vec::new());
        };
        let invalid = || HeaderError::InvalidParameter {
            name: "crit".to_owned(),
            reason: "expected a non-empty array of strings",
        };
        let names = critical.as_array().ok_or_else(invalid)?;
        if names.is_empty() {
            return Err(invalid());
        }
        names
            .iter()
            .map(|name| name.as_str().ok_or_else(invalid))
            .collect()
    }

    /// Checks whether the payload is base64url-encoded according to the `b64` parameter.
    /// `b64: false` is only valid if `b64` is listed in `crit`.
    pub fn is_payload_encoded(&self) -> Result<bool, HeaderError> {
        match self.get("b64") {
            None => Ok(true),
            Some(Value::Bool(true)) => Ok(true),
            Some(Value::Bool(false)) => {
                if self.get("crit").is_none() {
                    return Err(HeaderError::UnencodedPayloadNotCritical);
                }
                if self.critical()?.contains(&"b64") {
                    Ok(false)
                } else {
                    Err(HeaderError::UnencodedPayloadNotCritical)
                }
            }
            Some(_) => Err(HeaderError::InvalidParameter {
                name: "b64".to_owned(),
                reason: "expected a boolean",
            }),
        }
    }

    pub(crate) fn require_str(&self, name: &'static str) -> Result<&str, HeaderError> {
        match self.get(name) {
            None => Err(HeaderError::MissingParameter(name)),
            Some(Value::String(value)) => Ok(value),
            Some(_) => Err(HeaderError::InvalidParameter {
                name: name.to_owned(),
                reason: "expected a string",
            }),
        }
    }

    /// Adds all parameters from `other`, overwriting existing ones.
    pub(crate) fn extend(&mut self, other: Header) {
        self.0.extend(other.0);
    }

    /// Merges headers in the specified order: later headers overwrite parameters
    /// with the same name from earlier ones.
    pub fn merge<'a>(headers: impl IntoIterator<Item = &'a Header>) -> Header {
        let mut merged = Map::new();
        for header in headers {
            merged.extend(header.0.iter().map(|(name, value)| (name.clone(), value.clone())));
        }
        Self(merged)
    }

    /// Encodes this header as base64url-encoded JSON. An empty header is encoded
    /// as an empty string.
    pub(crate) fn encode(&self) -> String {
        if self.is_empty() {
            return String::new();
        }
        base64url::encode(Value::Object(self.0.clone()).to_string())
    }

    /// Decodes a protected header from its base64url-encoded JSON form.
    pub(crate) fn decode(encoded: &str) -> Result<Self, ParseError> {
        if encoded.is_empty() {
            return Ok(Self::empty());
        }
        let json = base64url::decode("protected", encoded)?;
        serde_json::from_slice(&json)
            .map(Self)
            .map_err(ParseError::MalformedHeader)
    }
}
