//! Base64url helpers (no padding) shared by the wire formats and JWK fields.

use base64ct::{Base64UrlUnpadded, Encoding};
use serde::{
    de::{Error as DeError, Unexpected, Visitor},
    Deserializer, Serializer,
};

use std::{borrow::Cow, fmt};

use crate::ParseError;

pub(crate) fn encode(source: impl AsRef<[u8]>) -> String {
    Base64UrlUnpadded::encode_string(source.as_ref())
}

pub(crate) fn decode(component: &'static str, encoded: &str) -> Result<Vec<u8>, ParseError> {
    Base64UrlUnpadded::decode_vec(encoded).map_err(|error| ParseError::Base64 { component, error })
}

/// Decodes an optional component; a missing component is decoded as an empty byte vector.
pub(crate) fn decode_or_empty(
    component: &'static str,
    encoded: Option<&str>,
) -> Result<Vec<u8>, ParseError> {
    encoded.map_or_else(|| Ok(Vec::new()), |encoded| decode(component, encoded))
}

pub(crate) fn serialize<S>(value: &[u8], serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&encode(value))
}

pub(crate) fn deserialize<'de, D>(deserializer: D) -> Result<Cow<'static, [u8]>, D::Error>
where
    D: Deserializer<'de>,
{
    struct Base64Visitor;

    impl Visitor<'_> for Base64Visitor {
        type Value = Vec<u8>;

        fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
            formatter.write_str("base64url-encoded data")
        }

        fn visit_str<E: DeError>(self, value: &str) -> Result<Self::Value, E> {
            Base64UrlUnpadded::decode_vec(value)
                .map_err(|_| E::invalid_value(Unexpected::Str(value), &self))
        }
    }

    deserializer.deserialize_str(Base64Visitor).map(Cow::Owned)
}
