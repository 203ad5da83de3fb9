//! AES Key Wrap (RFC 3394) key management: `A128KW`, `A192KW` and `A256KW`.

use aes::cipher::generic_array::GenericArray;
use aes_kw::{KekAes128, KekAes192, KekAes256};
use zeroize::Zeroizing;

use std::borrow::Cow;

use crate::{
    jwk::JsonWebKey,
    traits::{KeyDelivery, KeyWrapping},
    Header, Jwk,
};

/// Wraps `data` with the key-encryption key `kek`. The KEK length selects the AES variant.
pub(crate) fn wrap(kek: &[u8], data: &[u8]) -> anyhow::Result<Vec<u8>> {
    let wrapped = match kek.len() {
        16 => KekAes128::new(GenericArray::from_slice(kek)).wrap_vec(data),
        24 => KekAes192::new(GenericArray::from_slice(kek)).wrap_vec(data),
        32 => KekAes256::new(GenericArray::from_slice(kek)).wrap_vec(data),
        len => anyhow::bail!("unsupported AES KW key length: {len}"),
    };
    wrapped.map_err(|err| anyhow::anyhow!("cannot wrap key: {err}"))
}

/// Unwraps `data` with the key-encryption key `kek`, checking the integrity value.
pub(crate) fn unwrap(kek: &[u8], data: &[u8]) -> anyhow::Result<Zeroizing<Vec<u8>>> {
    let unwrapped = match kek.len() {
        16 => KekAes128::new(GenericArray::from_slice(kek)).unwrap_vec(data),
        24 => KekAes192::new(GenericArray::from_slice(kek)).unwrap_vec(data),
        32 => KekAes256::new(GenericArray::from_slice(kek)).unwrap_vec(data),
        len => anyhow::bail!("unsupported AES KW key length: {len}"),
    };
    unwrapped
        .map(Zeroizing::new)
        .map_err(|err| anyhow::anyhow!("cannot unwrap key: {err}"))
}

/// Key wrapping with AES Key Wrap using a shared symmetric (`oct`) key.
///
/// The key length must match the algorithm: 16 bytes for `A128KW`, 24 bytes for `A192KW`
/// and 32 bytes for `A256KW`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AesKeyWrap {
    key_len: usize,
}

impl AesKeyWrap {
    /// `A128KW` algorithm.
    pub const fn a128kw() -> Self {
        Self { key_len: 16 }
    }

    /// `A192KW` algorithm.
    pub const fn a192kw() -> Self {
        Self { key_len: 24 }
    }

    /// `A256KW` algorithm.
    pub const fn a256kw() -> Self {
        Self { key_len: 32 }
    }

    /// Returns the byte length of the key-encryption key.
    pub const fn key_len(self) -> usize {
        self.key_len
    }

    pub(crate) fn alg_name(self) -> &'static str {
        match self.key_len {
            16 => "A128KW",
            24 => "A192KW",
            _ => "A256KW",
        }
    }

    fn kek(self, key: &Jwk) -> anyhow::Result<Zeroizing<Vec<u8>>> {
        let material = key.material()?;
        let secret = material.symmetric_secret()?;
        JsonWebKey::ensure_len("k", secret, self.key_len)?;
        Ok(Zeroizing::new(secret.to_vec()))
    }
}

impl KeyWrapping for AesKeyWrap {
    fn name(&self) -> Cow<'static, str> {
        Cow::Borrowed(self.alg_name())
    }

    fn wrap_key(&self, key: &Jwk, cek: &[u8], _header: &Header) -> anyhow::Result<KeyDelivery> {
        let kek = self.kek(key)?;
        Ok(KeyDelivery {
            encrypted_key: wrap(&kek, cek)?,
            additional_header: Header::empty(),
        })
    }

    fn unwrap_key(
        &self,
        key: &Jwk,
        encrypted_key: &[u8],
        _header: &Header,
    ) -> anyhow::Result<Zeroizing<Vec<u8>>> {
        let kek = self.kek(key)?;
        unwrap(&kek, encrypted_key)
    }
}
