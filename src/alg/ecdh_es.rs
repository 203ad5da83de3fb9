//! Elliptic Curve Diffie-Hellman Ephemeral Static key agreement on P-256: `ECDH-ES`
//! and `ECDH-ES+A*KW`.
//!
//! The agreed secret is processed with the Concat KDF from [NIST SP 800-56A]
//! as described in [RFC 7518]. The sender publishes its (ephemeral) public key
//! in the `epk` header parameter; optional `apu` / `apv` parameters contain
//! base64url-encoded party info and are taken from the header supplied by the caller.
//!
//! [NIST SP 800-56A]: https://csrc.nist.gov/publications/detail/sp/800-56a/rev-3/final
//! [RFC 7518]: https://www.rfc-editor.org/rfc/rfc7518.html#section-4.6

use anyhow::Context as _;
use p256::{ecdh, PublicKey};
use rand_core::OsRng;
use serde_json::Value;
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use std::borrow::Cow;

use super::{
    aes_kw::{self, AesKeyWrap},
    p256::{create_jwk, public_key_from_jwk, secret_key_from_jwk},
};
use crate::{
    base64url,
    traits::{AgreedKey, KeyAgreement, KeyAgreementWrapping, KeyDelivery},
    Header, Jwk,
};

/// Concat KDF with SHA-256 producing `key_len` bytes.
fn concat_kdf(
    shared_secret: &[u8],
    algorithm_id: &str,
    party_u_info: &[u8],
    party_v_info: &[u8],
    key_len: usize,
) -> anyhow::Result<Zeroizing<Vec<u8>>> {
    fn len_prefix(bytes: &[u8]) -> anyhow::Result<[u8; 4]> {
        let len = u32::try_from(bytes.len()).context("KDF input is too long")?;
        Ok(len.to_be_bytes())
    }

    let key_bits = key_len
        .checked_mul(8)
        .and_then(|bits| u32::try_from(bits).ok())
        .context("requested key is too long")?;

    let mut output = Zeroizing::new(Vec::with_capacity(key_len));
    let mut counter = 1_u32;
    while output.len() < key_len {
        let mut hasher = Sha256::new();
        hasher.update(counter.to_be_bytes());
        hasher.update(shared_secret);
        hasher.update(len_prefix(algorithm_id.as_bytes())?);
        hasher.update(algorithm_id.as_bytes());
        hasher.update(len_prefix(party_u_info)?);
        hasher.update(party_u_info);
        hasher.update(len_prefix(party_v_info)?);
        hasher.update(party_v_info);
        hasher.update(key_bits.to_be_bytes());
        output.extend_from_slice(&hasher.finalize());
        counter += 1;
    }
    output.truncate(key_len);
    Ok(output)
}

fn party_info(header: &Header, name: &'static str) -> anyhow::Result<Vec<u8>> {
    match header.get(name) {
        None => Ok(Vec::new()),
        Some(Value::String(encoded)) => Ok(base64url::decode(name, encoded)?),
        Some(_) => anyhow::bail!("`{name}` header parameter must be a string"),
    }
}

/// Computes the shared secret on the sender side. Returns the secret together with
/// the public key to publish as `epk`.
fn agree_as_sender(
    recipient_key: &Jwk,
    sender_key: Option<&Jwk>,
) -> anyhow::Result<(Zeroizing<Vec<u8>>, PublicKey)> {
    let recipient_pk = public_key_from_jwk(&recipient_key.material()?)?;
    Ok(if let Some(sender_key) = sender_key {
        let sender_sk = secret_key_from_jwk(&sender_key.material()?)?;
        let shared = ecdh::diffie_hellman(sender_sk.to_nonzero_scalar(), recipient_pk.as_affine());
        let secret = Zeroizing::new(shared.raw_secret_bytes().to_vec());
        (secret, sender_sk.public_key())
    } else {
        let ephemeral = ecdh::EphemeralSecret::random(&mut OsRng);
        let shared = ephemeral.diffie_hellman(&recipient_pk);
        let secret = Zeroizing::new(shared.raw_secret_bytes().to_vec());
        (secret, ephemeral.public_key())
    })
}

/// Computes the shared secret on the recipient side using `epk` from the header.
fn agree_as_recipient(recipient_key: &Jwk, header: &Header) -> anyhow::Result<Zeroizing<Vec<u8>>> {
    let epk = header
        .get("epk")
        .context("`epk` header parameter is missing")?;
    let epk: Jwk = serde_json::from_value(epk.clone()).context("malformed `epk`")?;
    let epk = public_key_from_jwk(&epk.material()?)?;

    let recipient_sk = secret_key_from_jwk(&recipient_key.material()?)?;
    let shared = ecdh::diffie_hellman(recipient_sk.to_nonzero_scalar(), epk.as_affine());
    Ok(Zeroizing::new(shared.raw_secret_bytes().to_vec()))
}

fn derive(
    shared_secret: &[u8],
    algorithm_id: &str,
    key_len: usize,
    header: &Header,
) -> anyhow::Result<Zeroizing<Vec<u8>>> {
    let apu = party_info(header, "apu")?;
    let apv = party_info(header, "apv")?;
    concat_kdf(shared_secret, algorithm_id, &apu, &apv, key_len)
}

fn epk_header(epk: &PublicKey) -> anyhow::Result<Header> {
    let epk = serde_json::to_value(create_jwk(epk, None))?;
    Ok(Header::empty().with_param("epk", epk))
}

/// `ECDH-ES` key agreement: the derived key is used as the CEK.
///
/// If the sender key is specified, it is used instead of an ephemeral key. This is mostly
/// useful for testing; the sender key must be a private P-256 key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct EcdhEs;

impl KeyAgreement for EcdhEs {
    fn name(&self) -> Cow<'static, str> {
        Cow::Borrowed("ECDH-ES")
    }

    fn agree_key(
        &self,
        recipient_key: &Jwk,
        sender_key: Option<&Jwk>,
        encryption: &str,
        cek_len: usize,
        header: &Header,
    ) -> anyhow::Result<AgreedKey> {
        let (shared_secret, epk) = agree_as_sender(recipient_key, sender_key)?;
        Ok(AgreedKey {
            cek: derive(&shared_secret, encryption, cek_len, header)?,
            additional_header: epk_header(&epk)?,
        })
    }

    fn derive_key(
        &self,
        recipient_key: &Jwk,
        encryption: &str,
        cek_len: usize,
        header: &Header,
    ) -> anyhow::Result<Zeroizing<Vec<u8>>> {
        let shared_secret = agree_as_recipient(recipient_key, header)?;
        derive(&shared_secret, encryption, cek_len, header)
    }
}

/// `ECDH-ES+A128KW`, `ECDH-ES+A192KW` and `ECDH-ES+A256KW`: the derived key is used
/// to wrap the CEK with AES Key Wrap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EcdhEsKeyWrap {
    key_wrap: AesKeyWrap,
}

impl EcdhEsKeyWrap {
    /// `ECDH-ES+A128KW` algorithm.
    pub const fn a128kw() -> Self {
        Self {
            key_wrap: AesKeyWrap::a128kw(),
        }
    }

    /// `ECDH-ES+A192KW` algorithm.
    pub const fn a192kw() -> Self {
        Self {
            key_wrap: AesKeyWrap::a192kw(),
        }
    }

    /// `ECDH-ES+A256KW` algorithm.
    pub const fn a256kw() -> Self {
        Self {
            key_wrap: AesKeyWrap::a256kw(),
        }
    }

    fn alg_name(self) -> &'static str {
        match self.key_wrap.alg_name() {
            "A128KW" => "ECDH-ES+A128KW",
            "A192KW" => "ECDH-ES+A192KW",
            _ => "ECDH-ES+A256KW",
        }
    }
}

impl KeyAgreementWrapping for EcdhEsKeyWrap {
    fn name(&self) -> Cow<'static, str> {
        Cow::Borrowed(self.alg_name())
    }

    fn wrap_agreement_key(
        &self,
        recipient_key: &Jwk,
        sender_key: Option<&Jwk>,
        cek: &[u8],
        header: &Header,
    ) -> anyhow::Result<KeyDelivery> {
        let (shared_secret, epk) = agree_as_sender(recipient_key, sender_key)?;
        let kek = derive(
            &shared_secret,
            self.alg_name(),
            self.key_wrap.key_len(),
            header,
        )?;
        Ok(KeyDelivery {
            encrypted_key: aes_kw::wrap(&kek, cek)?,
            additional_header: epk_header(&epk)?,
        })
    }

    fn unwrap_agreement_key(
        &self,
        recipient_key: &Jwk,
        encrypted_key: &[u8],
        header: &Header,
    ) -> anyhow::Result<Zeroizing<Vec<u8>>> {
        let shared_secret = agree_as_recipient(recipient_key, header)?;
        let kek = derive(
            &shared_secret,
            self.alg_name(),
            self.key_wrap.key_len(),
            header,
        )?;
        aes_kw::unwrap(&kek, encrypted_key)
    }
}
