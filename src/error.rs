//! Error handling.

use core::fmt;

use crate::alg::KeyManagementMode;

/// Errors that may occur when parsing serialized JWS / JWE objects.
#[derive(Debug)]
#[non_exhaustive]
pub enum ParseError {
    /// Input is neither a recognized JSON serialization nor a compact one.
    ///
    /// Compact objects must consist of 3 (JWS) or 5 (JWE) base64url-encoded parts
    /// separated by periods.
    InvalidStructure {
        /// Number of period-separated parts in the input.
        parts: usize,
    },
    /// Input is a JSON object, but has none of the members identifying a JWS or JWE.
    UnrecognizedJson,
    /// JSON serialization has an unexpected shape (e.g., a member has a wrong type).
    MalformedJson(serde_json::Error),
    /// Cannot decode base64url in the specified component.
    Base64 {
        /// Name of the component, e.g. `"signature"`.
        component: &'static str,
        /// Decoding error.
        error: base64ct::Error,
    },
    /// Protected header cannot be parsed as a JSON object.
    MalformedHeader(serde_json::Error),
    /// A required component is empty.
    EmptyComponent(&'static str),
    /// Signatures in the JWS disagree on whether the payload is base64url-encoded.
    InconsistentPayloadEncoding,
    /// Input was parsed successfully, but is a JWE while a JWS was expected.
    NotJws,
    /// Input was parsed successfully, but is a JWS while a JWE was expected.
    NotJwe,
}

impl fmt::Display for ParseError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidStructure { parts } => write!(
                formatter,
                "invalid object structure: {parts} period-separated part(s)"
            ),
            Self::UnrecognizedJson => {
                formatter.write_str("JSON object is neither a JWS nor a JWE serialization")
            }
            Self::MalformedJson(err) => write!(formatter, "malformed JSON serialization: {err}"),
            Self::Base64 { component, error } => {
                write!(formatter, "base64 decoding error in `{component}`: {error}")
            }
            Self::MalformedHeader(err) => write!(formatter, "malformed protected header: {err}"),
            Self::EmptyComponent(component) => write!(formatter, "`{component}` is empty"),
            Self::InconsistentPayloadEncoding => {
                formatter.write_str("signatures disagree on the `b64` header parameter")
            }
            Self::NotJws => formatter.write_str("expected a JWS, got a JWE"),
            Self::NotJwe => formatter.write_str("expected a JWE, got a JWS"),
        }
    }
}

impl std::error::Error for ParseError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::MalformedJson(err) | Self::MalformedHeader(err) => Some(err),
            Self::Base64 { error, .. } => Some(error),
            _ => None,
        }
    }
}

/// Errors related to header parameters.
#[derive(Debug)]
#[non_exhaustive]
pub enum HeaderError {
    /// Required parameter (e.g., `alg` or `enc`) is absent from the merged header.
    MissingParameter(&'static str),
    /// Parameter has an unexpected type or value.
    InvalidParameter {
        /// Parameter name.
        name: String,
        /// Human-readable description of the problem.
        reason: &'static str,
    },
    /// Parameter must be placed in the protected header, but was found elsewhere.
    NotProtected(String),
    /// `b64: false` is used without listing `b64` in the `crit` parameter.
    UnencodedPayloadNotCritical,
    /// Parameter listed in `crit` was not understood or checked.
    UnsatisfiedCritical(String),
    /// Recipients of a JWE specify different content encryption algorithms.
    InconsistentEncryption {
        /// Content encryption algorithm of the first recipient.
        first: String,
        /// Conflicting content encryption algorithm.
        other: String,
    },
}

impl fmt::Display for HeaderError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingParameter(name) => {
                write!(formatter, "header parameter `{name}` is missing")
            }
            Self::InvalidParameter { name, reason } => {
                write!(formatter, "header parameter `{name}` is invalid: {reason}")
            }
            Self::NotProtected(name) => {
                write!(formatter, "header parameter `{name}` must be integrity-protected")
            }
            Self::UnencodedPayloadNotCritical => formatter
                .write_str("`b64` header parameter must be listed in the `crit` parameter"),
            Self::UnsatisfiedCritical(name) => {
                write!(formatter, "critical header parameter `{name}` is not understood")
            }
            Self::InconsistentEncryption { first, other } => write!(
                formatter,
                "recipients use different content encryption algorithms: {first} and {other}"
            ),
        }
    }
}

impl std::error::Error for HeaderError {}

/// Errors related to negotiating key management across recipients and algorithm lookup.
#[derive(Debug)]
#[non_exhaustive]
pub enum KeyManagementError {
    /// Algorithm name is not registered with the algorithm manager.
    UnsupportedAlgorithm(String),
    /// Algorithm is registered, but has a different capability than requested.
    UnexpectedCapability {
        /// Algorithm name.
        name: String,
        /// Expected capability (e.g., `"content encryption"`).
        expected: &'static str,
    },
    /// Two recipients use key management modes that cannot share a single CEK.
    ForeignKeyManagementMode {
        /// Mode of the first recipient.
        first: KeyManagementMode,
        /// Incompatible mode.
        other: KeyManagementMode,
    },
    /// Several recipients determine the CEK themselves, and their CEKs differ.
    CekMismatch,
    /// Recipient has no key attached.
    MissingRecipientKey {
        /// Index of the recipient.
        index: usize,
    },
    /// Compression method mentioned in the `zip` parameter is not registered.
    UnsupportedCompression(String),
    /// JWE has no recipients.
    NoRecipients,
}

impl fmt::Display for KeyManagementError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedAlgorithm(name) => {
                write!(formatter, "algorithm `{name}` is not supported or not allowed")
            }
            Self::UnexpectedCapability { name, expected } => {
                write!(formatter, "algorithm `{name}` is not a {expected} algorithm")
            }
            Self::ForeignKeyManagementMode { first, other } => write!(
                formatter,
                "key management mode `{other}` cannot be combined with `{first}`"
            ),
            Self::CekMismatch => {
                formatter.write_str("recipients determine different content encryption keys")
            }
            Self::MissingRecipientKey { index } => {
                write!(formatter, "recipient #{index} has no key")
            }
            Self::UnsupportedCompression(name) => {
                write!(formatter, "compression method `{name}` is not supported")
            }
            Self::NoRecipients => formatter.write_str("JWE has no recipients"),
        }
    }
}

impl std::error::Error for KeyManagementError {}

/// Errors signalling that a key cannot be used for the requested operation.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum CapabilityError {
    /// `use` parameter of the key forbids the operation.
    KeyUsageForbidden {
        /// Value of the `use` parameter.
        key_use: String,
        /// Value required by the operation.
        expected: &'static str,
    },
    /// `key_ops` parameter of the key does not include the operation.
    KeyOperationForbidden {
        /// Operations acceptable for the requested purpose.
        expected: &'static [&'static str],
    },
    /// `alg` parameter of the key differs from the algorithm in the header.
    AlgorithmMismatch {
        /// Algorithm declared by the key.
        key_alg: String,
        /// Algorithm requested by the header.
        header_alg: String,
    },
    /// Operation requires a private key, but the key is public.
    NotPrivate,
    /// Key parameter (e.g., `use` or `key_ops`) has an unexpected type.
    MalformedParameter(&'static str),
}

impl fmt::Display for CapabilityError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::KeyUsageForbidden { key_use, expected } => write!(
                formatter,
                "key usage `{key_use}` forbids the operation (expected `{expected}`)"
            ),
            Self::KeyOperationForbidden { expected } => write!(
                formatter,
                "key operations forbid the operation (expected one of {expected:?})"
            ),
            Self::AlgorithmMismatch {
                key_alg,
                header_alg,
            } => write!(
                formatter,
                "key is restricted to `{key_alg}`, but `{header_alg}` is requested"
            ),
            Self::NotPrivate => formatter.write_str("operation requires a private key"),
            Self::MalformedParameter(name) => {
                write!(formatter, "key parameter `{name}` has an unexpected type")
            }
        }
    }
}

impl std::error::Error for CapabilityError {}

/// Errors produced by claim and header checkers.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum ClaimError {
    /// Mandatory claim is not present.
    NoClaim(String),
    /// Claim has an unexpected type.
    InvalidType {
        /// Claim name.
        claim: String,
        /// Expected type description.
        expected: &'static str,
    },
    /// Token has expired (`exp` claim).
    Expired,
    /// Token is not yet valid (`nbf` claim).
    NotMature,
    /// Token is issued in the future (`iat` claim).
    IssuedInFuture,
    /// Token is not intended for the expected audience (`aud` claim).
    AudienceMismatch,
    /// Token is issued by an unexpected party (`iss` claim).
    IssuerMismatch,
    /// Token has an unexpected subject (`sub` claim).
    SubjectMismatch,
    /// Token ID is rejected (`jti` claim).
    InvalidTokenId,
    /// Algorithm in the header is not allowed.
    AlgorithmNotAllowed(String),
    /// Header parameter checked by a protected-only checker is not integrity-protected.
    NotProtected(String),
}

impl fmt::Display for ClaimError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoClaim(claim) => write!(formatter, "mandatory claim `{claim}` is missing"),
            Self::InvalidType { claim, expected } => {
                write!(formatter, "claim `{claim}` must be {expected}")
            }
            Self::Expired => formatter.write_str("token has expired"),
            Self::NotMature => formatter.write_str("token is not yet valid"),
            Self::IssuedInFuture => formatter.write_str("token is issued in the future"),
            Self::AudienceMismatch => formatter.write_str("audience mismatch"),
            Self::IssuerMismatch => formatter.write_str("issuer mismatch"),
            Self::SubjectMismatch => formatter.write_str("subject mismatch"),
            Self::InvalidTokenId => formatter.write_str("token ID is rejected"),
            Self::AlgorithmNotAllowed(alg) => write!(formatter, "algorithm `{alg}` is not allowed"),
            Self::NotProtected(name) => {
                write!(formatter, "`{name}` must be in the protected header")
            }
        }
    }
}

impl std::error::Error for ClaimError {}

/// Errors that can occur when serializing a JWS or JWE.
#[derive(Debug)]
#[non_exhaustive]
pub enum SerializationError {
    /// Object has more than one signature, and the serialization supports only one.
    MultipleSignatures,
    /// Object has more than one recipient, and the serialization supports only one.
    MultipleRecipients,
    /// Signature or recipient index is out of bounds.
    IndexOutOfBounds {
        /// Requested index.
        index: usize,
        /// Number of signatures or recipients.
        len: usize,
    },
    /// Compact serialization cannot carry unprotected headers.
    UnprotectedHeader,
    /// Compact serialization cannot carry additional authenticated data.
    AdditionalAuthenticatedData,
    /// Unencoded payload contains a period, which is not allowed in the compact form.
    UnencodedPayloadWithPeriod,
    /// Unencoded payload is not valid UTF-8, so it cannot be embedded in JSON.
    NonUtf8Payload,
    /// Signatures disagree on whether the payload is base64url-encoded.
    InconsistentPayloadEncoding,
    /// Signature was not computed yet.
    NotSigned,
    /// JWE was not encrypted yet.
    NotEncrypted,
    /// Object has neither signatures nor recipients.
    Empty,
    /// JSON serialization failed.
    Json(serde_json::Error),
}

impl fmt::Display for SerializationError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MultipleSignatures => {
                formatter.write_str("serialization supports only a single signature")
            }
            Self::MultipleRecipients => {
                formatter.write_str("serialization supports only a single recipient")
            }
            Self::IndexOutOfBounds { index, len } => {
                write!(formatter, "index {index} is out of bounds (length: {len})")
            }
            Self::UnprotectedHeader => {
                formatter.write_str("compact serialization cannot carry unprotected headers")
            }
            Self::AdditionalAuthenticatedData => {
                formatter.write_str("compact serialization cannot carry additional data")
            }
            Self::UnencodedPayloadWithPeriod => {
                formatter.write_str("unencoded payload must not contain `.` in compact form")
            }
            Self::NonUtf8Payload => formatter.write_str("unencoded payload is not valid UTF-8"),
            Self::InconsistentPayloadEncoding => {
                formatter.write_str("signatures disagree on the `b64` header parameter")
            }
            Self::NotSigned => formatter.write_str("signature is not computed"),
            Self::NotEncrypted => formatter.write_str("JWE is not encrypted"),
            Self::Empty => formatter.write_str("object has no signatures or recipients"),
            Self::Json(err) => write!(formatter, "cannot serialize JSON: {err}"),
        }
    }
}

impl std::error::Error for SerializationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Json(err) => Some(err),
            _ => None,
        }
    }
}

/// Top-level error for signing, verification, encryption and decryption.
#[derive(Debug)]
#[non_exhaustive]
pub enum Error {
    /// Malformed wire input.
    Parse(ParseError),
    /// Header-related error.
    Header(HeaderError),
    /// Key management or algorithm lookup error.
    KeyManagement(KeyManagementError),
    /// Key cannot be used for the operation.
    Capability(CapabilityError),
    /// No key in the key set verified any signature.
    InvalidSignature,
    /// No key in the key set decrypted the JWE for any recipient.
    UnableToDecrypt,
    /// Claim or header checker rejected the object.
    Claim(ClaimError),
    /// Object cannot be serialized.
    Serialization(SerializationError),
    /// JWE is already encrypted / decrypted.
    AlreadyProcessed,
    /// JWE has no ciphertext to decrypt.
    NotEncrypted,
    /// Payload is absent and no detached payload was supplied.
    MissingPayload,
    /// Payload is embedded into the JWS, and a detached payload was supplied as well.
    AmbiguousPayload,
    /// Compression or decompression failed.
    Compression(anyhow::Error),
    /// Cryptographic backend failed while producing an object.
    Algorithm(anyhow::Error),
}

impl Error {
    /// Checks whether this error signals a cryptographic failure (as opposed to
    /// a malformed message or a configuration error).
    pub fn is_crypto_failure(&self) -> bool {
        matches!(self, Self::InvalidSignature | Self::UnableToDecrypt)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse(err) => fmt::Display::fmt(err, formatter),
            Self::Header(err) => fmt::Display::fmt(err, formatter),
            Self::KeyManagement(err) => fmt::Display::fmt(err, formatter),
            Self::Capability(err) => fmt::Display::fmt(err, formatter),
            Self::InvalidSignature => formatter.write_str("signature has failed verification"),
            Self::UnableToDecrypt => formatter.write_str("unable to decrypt the JWE"),
            Self::Claim(err) => fmt::Display::fmt(err, formatter),
            Self::Serialization(err) => fmt::Display::fmt(err, formatter),
            Self::AlreadyProcessed => formatter.write_str("object is already processed"),
            Self::NotEncrypted => formatter.write_str("JWE is not encrypted"),
            Self::MissingPayload => formatter.write_str("payload is missing"),
            Self::AmbiguousPayload => {
                formatter.write_str("payload is both embedded and supplied as detached")
            }
            Self::Compression(err) => write!(formatter, "compression failed: {err}"),
            Self::Algorithm(err) => write!(formatter, "algorithm failed: {err}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Parse(err) => Some(err),
            Self::Header(err) => Some(err),
            Self::KeyManagement(err) => Some(err),
            Self::Capability(err) => Some(err),
            Self::Claim(err) => Some(err),
            Self::Serialization(err) => Some(err),
            Self::Compression(err) | Self::Algorithm(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

macro_rules! impl_from_error {
    ($($source:ident => $variant:ident,)+) => {
        $(
        impl From<$source> for Error {
            fn from(err: $source) -> Self {
                Self::$variant(err)
            }
        }
        )+
    };
}

impl_from_error!(
    ParseError => Parse,
    HeaderError => Header,
    KeyManagementError => KeyManagement,
    CapabilityError => Capability,
    ClaimError => Claim,
    SerializationError => Serialization,
);

/// Failure of a single key candidate inside verification / decryption trial loops.
/// Such failures are logged and dropped; only exhausting all candidates is reported.
#[derive(Debug)]
pub(crate) enum KeyFailure {
    Capability(CapabilityError),
    InvalidSignature,
    CekLength { expected: usize, actual: usize },
    Algorithm(anyhow::Error),
}

impl fmt::Display for KeyFailure {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Capability(err) => write!(formatter, "key is unusable: {err}"),
            Self::InvalidSignature => formatter.write_str("signature mismatch"),
            Self::CekLength { expected, actual } => write!(
                formatter,
                "recovered CEK has length {actual}, expected {expected}"
            ),
            Self::Algorithm(err) => write!(formatter, "algorithm failed: {err}"),
        }
    }
}

impl From<CapabilityError> for KeyFailure {
    fn from(err: CapabilityError) -> Self {
        Self::Capability(err)
    }
}

impl From<anyhow::Error> for KeyFailure {
    fn from(err: anyhow::Error) -> Self {
        Self::Algorithm(err)
    }
}
