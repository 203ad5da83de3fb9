//! AES-GCM content encryption: `A128GCM`, `A192GCM` and `A256GCM`.

use ::aes_gcm::{
    aead::{
        consts::U12,
        generic_array::{typenum::Unsigned, GenericArray},
        AeadCore, AeadInPlace, KeyInit,
    },
    aes::Aes192,
    Aes128Gcm, Aes256Gcm,
};

use std::borrow::Cow;

use crate::traits::ContentEncryption;

type Aes192Gcm = ::aes_gcm::AesGcm<Aes192, U12>;

fn encrypt_with<C: KeyInit + AeadInPlace>(
    plaintext: &[u8],
    cek: &[u8],
    iv: &[u8],
    aad: &[u8],
) -> anyhow::Result<(Vec<u8>, Vec<u8>)> {
    anyhow::ensure!(iv.len() == C::NonceSize::USIZE, "invalid IV length");
    let cipher = C::new_from_slice(cek).map_err(|_| anyhow::anyhow!("invalid CEK length"))?;
    let mut buffer = plaintext.to_vec();
    let tag = cipher
        .encrypt_in_place_detached(GenericArray::from_slice(iv), aad, &mut buffer)
        .map_err(|_| anyhow::anyhow!("AES-GCM encryption failed"))?;
    Ok((buffer, tag.to_vec()))
}

fn decrypt_with<C: KeyInit + AeadInPlace>(
    ciphertext: &[u8],
    cek: &[u8],
    iv: &[u8],
    aad: &[u8],
    tag: &[u8],
) -> anyhow::Result<Vec<u8>> {
    anyhow::ensure!(iv.len() == C::NonceSize::USIZE, "invalid IV length");
    anyhow::ensure!(
        tag.len() == <C as AeadCore>::TagSize::USIZE,
        "invalid authentication tag length"
    );
    let cipher = C::new_from_slice(cek).map_err(|_| anyhow::anyhow!("invalid CEK length"))?;
    let mut buffer = ciphertext.to_vec();
    cipher
        .decrypt_in_place_detached(
            GenericArray::from_slice(iv),
            aad,
            &mut buffer,
            GenericArray::from_slice(tag),
        )
        .map_err(|_| anyhow::anyhow!("authentication tag mismatch"))?;
    Ok(buffer)
}

/// Authenticated content encryption with AES in Galois/Counter mode.
///
/// Uses 96-bit IVs and 128-bit authentication tags as per [RFC 7518].
///
/// [RFC 7518]: https://www.rfc-editor.org/rfc/rfc7518.html#section-5.3
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AesGcm {
    key_len: usize,
}

impl AesGcm {
    /// `A128GCM` algorithm.
    pub const fn a128gcm() -> Self {
        Self { key_len: 16 }
    }

    /// `A192GCM` algorithm.
    pub const fn a192gcm() -> Self {
        Self { key_len: 24 }
    }

    /// `A256GCM` algorithm.
    pub const fn a256gcm() -> Self {
        Self { key_len: 32 }
    }
}

impl ContentEncryption for AesGcm {
    fn name(&self) -> Cow<'static, str> {
        Cow::Borrowed(match self.key_len {
            16 => "A128GCM",
            24 => "A192GCM",
            _ => "A256GCM",
        })
    }

    fn cek_len(&self) -> usize {
        self.key_len
    }

    fn iv_len(&self) -> usize {
        12
    }

    fn encrypt(
        &self,
        plaintext: &[u8],
        cek: &[u8],
        iv: &[u8],
        aad: &[u8],
    ) -> anyhow::Result<(Vec<u8>, Vec<u8>)> {
        anyhow::ensure!(cek.len() == self.key_len, "invalid CEK length");
        match self.key_len {
            16 => encrypt_with::<Aes128Gcm>(plaintext, cek, iv, aad),
            24 => encrypt_with::<Aes192Gcm>(plaintext, cek, iv, aad),
            _ => encrypt_with::<Aes256Gcm>(plaintext, cek, iv, aad),
        }
    }

    fn decrypt(
        &self,
        ciphertext: &[u8],
        cek: &[u8],
        iv: &[u8],
        aad: &[u8],
        tag: &[u8],
    ) -> anyhow::Result<Vec<u8>> {
        anyhow::ensure!(cek.len() == self.key_len, "invalid CEK length");
        match self.key_len {
            16 => decrypt_with::<Aes128Gcm>(ciphertext, cek, iv, aad, tag),
            24 => decrypt_with::<Aes192Gcm>(ciphertext, cek, iv, aad, tag),
            _ => decrypt_with::<Aes256Gcm>(ciphertext, cek, iv, aad, tag),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encryption_roundtrip_for_all_key_sizes() {
        for alg in [AesGcm::a128gcm(), AesGcm::a192gcm(), AesGcm::a256gcm()] {
            let cek = vec![7_u8; alg.cek_len()];
            let iv = [1_u8; 12];
            let (ciphertext, tag) = alg.encrypt(b"plaintext", &cek, &iv, b"aad").unwrap();
            assert_eq!(ciphertext.len(), 9);
            assert_eq!(tag.len(), 16);

            let plaintext = alg.decrypt(&ciphertext, &cek, &iv, b"aad", &tag).unwrap();
            assert_eq!(plaintext, b"plaintext");
            let err = alg.decrypt(&ciphertext, &cek, &iv, b"other", &tag).unwrap_err();
            assert!(err.to_string().contains("tag mismatch"), "{err}");
        }
    }

    #[test]
    fn invalid_parameter_lengths() {
        let alg = AesGcm::a128gcm();
        let err = alg.encrypt(b"data", &[0; 32], &[0; 12], b"").unwrap_err();
        assert!(err.to_string().contains("CEK length"), "{err}");
        let err = alg.encrypt(b"data", &[0; 16], &[0; 16], b"").unwrap_err();
        assert!(err.to_string().contains("IV length"), "{err}");
        let err = alg.decrypt(b"data", &[0; 16], &[0; 12], b"", &[0; 8]).unwrap_err();
        assert!(err.to_string().contains("tag length"), "{err}");
    }
}
