//! JWE decryption.

use tracing::{debug, trace};
use zeroize::Zeroizing;

use crate::{
    alg::{AlgorithmManager, JoseAlgorithm},
    compression::{CompressionManager, CompressionMethod},
    error::KeyFailure,
    jwe::{EncryptedContent, Recipient},
    jwk::KeyPurpose,
    traits::ContentEncryption,
    Error, Header, HeaderError, Jwe, Jwk, JwkSet,
};

/// Recipient and key that have successfully decrypted a [`Jwe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub struct DecryptedRecipient {
    /// Zero-based index of the recipient in the JWE.
    pub recipient_index: usize,
    /// Zero-based index of the key in the key set.
    pub key_index: usize,
}

/// Inputs shared by all key candidates for a single recipient.
struct Attempt<'a> {
    alg: &'a str,
    enc: &'a str,
    algorithm: &'a JoseAlgorithm,
    content_encryption: &'a dyn ContentEncryption,
    recipient: &'a Recipient,
    header: &'a Header,
    content: &'a EncryptedContent,
    aad: &'a [u8],
}

/// Decrypts [`Jwe`]s using a [`JwkSet`].
///
/// Recipients are tried in order; for each recipient, keys are tried in the key set order.
/// The first (recipient, key) pair that recovers the CEK and passes the authentication tag
/// check is reported.
#[derive(Debug, Clone)]
pub struct Decrypter {
    algorithms: AlgorithmManager,
    compression: CompressionManager,
}

impl Decrypter {
    /// Creates a decrypter with the specified algorithms and compression methods.
    pub fn new(algorithms: AlgorithmManager, compression: CompressionManager) -> Self {
        Self {
            algorithms,
            compression,
        }
    }

    /// Returns algorithms available to this decrypter.
    pub fn algorithms(&self) -> &AlgorithmManager {
        &self.algorithms
    }

    /// Decrypts the `jwe` and stores the decrypted (and decompressed) payload in it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnableToDecrypt`] if no (recipient, key) pair has succeeded.
    /// Malformed headers, disallowed algorithms and decompression failures are returned
    /// immediately. On error, the `jwe` is left unchanged.
    pub fn decrypt(&self, jwe: &mut Jwe, keys: &JwkSet) -> Result<DecryptedRecipient, Error> {
        if jwe.payload().is_some() {
            return Err(Error::AlreadyProcessed);
        }
        let content = jwe.content().ok_or(Error::NotEncrypted)?;
        if jwe.unprotected().contains("zip")
            || jwe.recipients().iter().any(|r| r.header().contains("zip"))
        {
            return Err(HeaderError::NotProtected("zip".to_owned()).into());
        }
        let compression = self.compression_method(jwe.protected())?;
        let aad = Jwe::content_aad(jwe.encoded_protected(), jwe.aad());

        let mut decrypted = None;
        'recipients: for (recipient_index, recipient) in jwe.recipients().iter().enumerate() {
            let header = Header::merge([jwe.protected(), jwe.unprotected(), recipient.header()]);
            let alg = header.require_str("alg")?;
            let enc = header.require_str("enc")?;
            let (algorithm, _) = self.algorithms.key_management(alg)?;
            let content_encryption = self.algorithms.content_encryption(enc)?;
            let attempt = Attempt {
                alg,
                enc,
                algorithm,
                content_encryption,
                recipient,
                header: &header,
                content,
                aad: &aad,
            };

            for (key_index, key) in keys.iter().enumerate() {
                match attempt.try_key(key) {
                    Ok(plaintext) => {
                        decrypted = Some((recipient_index, key_index, plaintext));
                        break 'recipients;
                    }
                    Err(err) => {
                        trace!("key #{key_index} failed for recipient #{recipient_index}: {err}");
                    }
                }
            }
        }

        let Some((recipient_index, key_index, plaintext)) = decrypted else {
            return Err(Error::UnableToDecrypt);
        };
        let payload = match compression {
            Some(method) => self
                .compression
                .decompress(method, &plaintext)
                .map_err(Error::Compression)?,
            None => plaintext,
        };
        jwe.commit_decryption(payload);
        debug!("JWE decrypted for recipient #{recipient_index} with key #{key_index}");
        Ok(DecryptedRecipient {
            recipient_index,
            key_index,
        })
    }

    fn compression_method(
        &self,
        protected: &Header,
    ) -> Result<Option<&dyn CompressionMethod>, Error> {
        if !protected.contains("zip") {
            return Ok(None);
        }
        let name = protected.require_str("zip")?;
        Ok(Some(self.compression.get(name)?))
    }
}

impl Attempt<'_> {
    fn try_key(&self, key: &Jwk) -> Result<Vec<u8>, KeyFailure> {
        key.check_purpose(KeyPurpose::Decryption)?;
        key.check_algorithm(self.alg)?;

        let cek = self.recover_cek(key)?;
        let expected = self.content_encryption.cek_len();
        if cek.len() != expected {
            return Err(KeyFailure::CekLength {
                expected,
                actual: cek.len(),
            });
        }
        let plaintext = self.content_encryption.decrypt(
            &self.content.ciphertext,
            &cek,
            &self.content.iv,
            self.aad,
            &self.content.tag,
        )?;
        Ok(plaintext)
    }

    fn recover_cek(&self, key: &Jwk) -> anyhow::Result<Zeroizing<Vec<u8>>> {
        let encrypted_key = self.recipient.encrypted_key();
        match self.algorithm {
            JoseAlgorithm::DirectEncryption(alg) => alg.cek(key),
            JoseAlgorithm::KeyEncryption(alg) => {
                let cek_len = self.content_encryption.cek_len();
                alg.decrypt_key(key, encrypted_key, cek_len, self.header)
            }
            JoseAlgorithm::KeyWrapping(alg) => alg.unwrap_key(key, encrypted_key, self.header),
            JoseAlgorithm::KeyAgreement(alg) => {
                let cek_len = self.content_encryption.cek_len();
                alg.derive_key(key, self.enc, cek_len, self.header)
            }
            JoseAlgorithm::KeyAgreementWrapping(alg) => {
                alg.unwrap_agreement_key(key, encrypted_key, self.header)
            }
            other => Err(anyhow::anyhow!(
                "`{}` is not a key management algorithm",
                other.name()
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Encrypter, KeyManagementError, Recipient};

    use assert_matches::assert_matches;

    fn algorithms() -> AlgorithmManager {
        AlgorithmManager::from_names(["A128KW", "dir", "A128GCM"]).unwrap()
    }

    fn compression() -> CompressionManager {
        CompressionManager::from_names(["DEF"]).unwrap()
    }

    fn encrypted(protected: Header, key: Jwk) -> Jwe {
        let mut jwe = Jwe::new(b"Live long and Prosper.".to_vec())
            .with_protected(protected)
            .with_recipient(Recipient::new(Header::empty(), key));
        Encrypter::new(algorithms(), compression())
            .encrypt(&mut jwe)
            .unwrap();
        jwe
    }

    fn reloaded(jwe: &Jwe) -> Jwe {
        match crate::parse(&jwe.to_compact(0).unwrap()).unwrap() {
            crate::JoseObject::Jwe(jwe) => jwe,
            crate::JoseObject::Jws(_) => unreachable!(),
        }
    }

    #[test]
    fn key_trial_order() {
        let key = Jwk::symmetric([5_u8; 16]);
        let protected = Header::empty().with_algorithm("A128KW").with_encryption("A128GCM");
        let mut jwe = reloaded(&encrypted(protected, key.clone()));

        let keys = JwkSet::new()
            .with_key(Jwk::symmetric([6_u8; 16]))
            .with_key(key.with_param("use", "sig").unwrap())
            .with_key(key);
        let decrypter = Decrypter::new(algorithms(), compression());
        let decrypted = decrypter.decrypt(&mut jwe, &keys).unwrap();
        assert_eq!(decrypted.recipient_index, 0);
        assert_eq!(decrypted.key_index, 2);
        assert_eq!(jwe.payload(), Some(&b"Live long and Prosper."[..]));

        assert_matches!(
            decrypter.decrypt(&mut jwe, &keys).unwrap_err(),
            Error::AlreadyProcessed
        );
    }

    #[test]
    fn exhausted_keys() {
        let key = Jwk::symmetric([5_u8; 16]);
        let protected = Header::empty().with_algorithm("dir").with_encryption("A128GCM");
        let mut jwe = reloaded(&encrypted(protected, key));

        let keys = JwkSet::new()
            .with_key(Jwk::symmetric([6_u8; 16]))
            .with_key(Jwk::symmetric([5_u8; 32]));
        let decrypter = Decrypter::new(algorithms(), compression());
        let err = decrypter.decrypt(&mut jwe, &keys).unwrap_err();
        assert_matches!(err, Error::UnableToDecrypt);
        assert!(jwe.payload().is_none());
    }

    #[test]
    fn compressed_payload() {
        let key = Jwk::symmetric([5_u8; 16]);
        let protected = Header::empty()
            .with_algorithm("A128KW")
            .with_encryption("A128GCM")
            .with_compression("DEF");
        let mut jwe = reloaded(&encrypted(protected, key.clone()));
        let keys = JwkSet::new().with_key(key.clone());

        let no_compression = Decrypter::new(algorithms(), CompressionManager::new());
        assert_matches!(
            no_compression.decrypt(&mut jwe, &keys).unwrap_err(),
            Error::KeyManagement(KeyManagementError::UnsupportedCompression(_))
        );

        Decrypter::new(algorithms(), compression())
            .decrypt(&mut jwe, &keys)
            .unwrap();
        assert_eq!(jwe.payload(), Some(&b"Live long and Prosper."[..]));
    }

    #[test]
    fn unprotected_compression_is_rejected() {
        let key = Jwk::symmetric([5_u8; 16]);
        let protected = Header::empty().with_algorithm("A128KW").with_encryption("A128GCM");
        let jwe = encrypted(protected, key.clone());

        let mut json: serde_json::Value =
            serde_json::from_str(&jwe.to_flattened(0).unwrap()).unwrap();
        json["unprotected"] = serde_json::json!({ "zip": "DEF" });
        let mut jwe = match crate::parse(&json.to_string()).unwrap() {
            crate::JoseObject::Jwe(jwe) => jwe,
            crate::JoseObject::Jws(_) => unreachable!(),
        };

        let decrypter = Decrypter::new(algorithms(), compression());
        let err = decrypter
            .decrypt(&mut jwe, &JwkSet::new().with_key(key))
            .unwrap_err();
        assert_matches!(
            err,
            Error::Header(HeaderError::NotProtected(name)) if name == "zip"
        );
        assert!(jwe.payload().is_none());
    }

    #[test]
    fn plaintext_jwe_cannot_be_decrypted() {
        let mut jwe = Jwe::new(b"test".to_vec());
        let decrypter = Decrypter::new(algorithms(), compression());
        assert_matches!(
            decrypter.decrypt(&mut jwe, &JwkSet::new()).unwrap_err(),
            Error::AlreadyProcessed
        );
    }

    #[test]
    fn disallowed_content_encryption_is_fatal() {
        let key = Jwk::symmetric([5_u8; 16]);
        let protected = Header::empty().with_algorithm("A128KW").with_encryption("A128GCM");
        let mut jwe = reloaded(&encrypted(protected, key.clone()));
        let decrypter = Decrypter::new(
            AlgorithmManager::from_names(["A128KW"]).unwrap(),
            compression(),
        );
        let err = decrypter
            .decrypt(&mut jwe, &JwkSet::new().with_key(key))
            .unwrap_err();
        assert_matches!(
            err,
            Error::KeyManagement(KeyManagementError::UnsupportedAlgorithm(name)) if name == "A128GCM"
        );
    }
}
