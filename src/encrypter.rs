//! JWE encryption.

use rand_core::{OsRng, RngCore};
use subtle::ConstantTimeEq;
use tracing::debug;
use zeroize::Zeroizing;

use std::borrow::Cow;

use crate::{
    alg::{AlgorithmManager, JoseAlgorithm, KeyManagementMode},
    compression::{CompressionManager, CompressionMethod},
    jwe::EncryptedContent,
    jwk::KeyPurpose,
    Error, Header, HeaderError, Jwe, Jwk, KeyManagementError,
};

/// Resolved key management for a single recipient.
struct RecipientPlan<'a> {
    algorithm: &'a JoseAlgorithm,
    mode: KeyManagementMode,
    key: &'a Jwk,
    sender_key: Option<&'a Jwk>,
    header: Header,
}

/// Encrypts [`Jwe`]s for one or more recipients.
///
/// All recipients share a single CEK and content encryption algorithm (`enc`).
/// Key management modes of the recipients must be compatible:
///
/// - Key encryption, key wrapping and key agreement with wrapping can be freely combined,
///   since all of them deliver a random CEK.
/// - Direct encryption can only be combined with direct encryption, and direct key agreement
///   with direct key agreement. In both cases, all recipients must arrive at the same CEK.
///
/// Header parameters produced by key management (e.g., `epk`) are placed into the protected
/// header if there is a single recipient, and into the recipient header otherwise.
///
/// # Examples
///
/// ```
/// use jose_compact::{
///     alg::AlgorithmManager, CompressionManager, Encrypter, Header, Jwe, Jwk, Recipient,
/// };
///
/// # fn main() -> anyhow::Result<()> {
/// let algorithms = AlgorithmManager::from_names(["A128KW", "A128GCM"])?;
/// let encrypter = Encrypter::new(algorithms, CompressionManager::new());
/// let key = Jwk::symmetric([7_u8; 16]);
/// let mut jwe = Jwe::new(b"Hello, world!".to_vec())
///     .with_protected(Header::empty().with_algorithm("A128KW").with_encryption("A128GCM"))
///     .with_recipient(Recipient::new(Header::empty(), key));
/// encrypter.encrypt(&mut jwe)?;
/// let compact = jwe.to_compact(0)?;
/// assert_eq!(compact.split('.').count(), 5);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Encrypter {
    algorithms: AlgorithmManager,
    compression: CompressionManager,
}

impl Encrypter {
    /// Creates an encrypter with the specified algorithms and compression methods.
    pub fn new(algorithms: AlgorithmManager, compression: CompressionManager) -> Self {
        Self {
            algorithms,
            compression,
        }
    }

    /// Returns algorithms available to this encrypter.
    pub fn algorithms(&self) -> &AlgorithmManager {
        &self.algorithms
    }

    /// Encrypts the `jwe` payload for all its recipients.
    ///
    /// Either all output fields (the protected header, recipient headers and encrypted keys,
    /// IV, ciphertext and tag) are set, or the `jwe` is left unchanged.
    ///
    /// # Errors
    ///
    /// Returns an error if the JWE is already encrypted, headers are invalid, recipients
    /// are inconsistent, an algorithm is not allowed, a key cannot be used, or
    /// a cryptographic backend fails.
    pub fn encrypt(&self, jwe: &mut Jwe) -> Result<(), Error> {
        if jwe.is_encrypted() {
            return Err(Error::AlreadyProcessed);
        }
        let payload = jwe.payload().ok_or(Error::MissingPayload)?;
        if jwe.recipients().is_empty() {
            return Err(KeyManagementError::NoRecipients.into());
        }
        Self::check_unprotected(jwe.unprotected())?;
        for recipient in jwe.recipients() {
            Self::check_unprotected(recipient.header())?;
        }
        jwe.protected().critical()?;

        let (plans, enc) = self.plan(jwe)?;
        let content_encryption = self.algorithms.content_encryption(&enc)?;
        let compression = self.compression_method(jwe.protected())?;
        let cek_len = content_encryption.cek_len();

        let first_mode = plans[0].mode;
        let (cek, deliveries) = if first_mode.accepts_external_cek() {
            let mut cek = Zeroizing::new(vec![0_u8; cek_len]);
            OsRng.fill_bytes(cek.as_mut_slice());
            let deliveries = plans
                .iter()
                .map(|plan| Self::deliver(plan, &cek))
                .collect::<Result<Vec<_>, _>>()?;
            (cek, deliveries)
        } else {
            Self::determine_cek(&plans, &enc, cek_len)?
        };

        let mut protected = jwe.protected().clone();
        let mut recipients = jwe.recipients().to_vec();
        let is_single = recipients.len() == 1;
        for (recipient, (encrypted_key, additional_header)) in
            recipients.iter_mut().zip(deliveries)
        {
            if is_single {
                protected.extend(additional_header);
                recipient.set_delivery(encrypted_key, Header::empty());
            } else {
                recipient.set_delivery(encrypted_key, additional_header);
            }
        }
        let encoded_protected = protected.encode();

        let plaintext = match compression {
            Some(method) => Cow::Owned(method.compress(payload).map_err(Error::Compression)?),
            None => Cow::Borrowed(payload),
        };
        let mut iv = vec![0_u8; content_encryption.iv_len()];
        OsRng.fill_bytes(&mut iv);
        let aad = Jwe::content_aad(&encoded_protected, jwe.aad());
        let (ciphertext, tag) = content_encryption
            .encrypt(&plaintext, &cek, &iv, &aad)
            .map_err(Error::Algorithm)?;

        let content = EncryptedContent {
            iv,
            ciphertext,
            tag,
        };
        let recipient_count = recipients.len();
        jwe.commit_encryption(protected, encoded_protected, recipients, content);
        debug!("encrypted JWE with {enc} ({first_mode}) for {recipient_count} recipient(s)");
        Ok(())
    }

    fn check_unprotected(header: &Header) -> Result<(), HeaderError> {
        for name in ["zip", "crit"] {
            if header.contains(name) {
                return Err(HeaderError::NotProtected(name.to_owned()));
            }
        }
        Ok(())
    }

    /// Resolves key management for all recipients and checks their consistency.
    fn plan<'a>(&'a self, jwe: &'a Jwe) -> Result<(Vec<RecipientPlan<'a>>, String), Error> {
        let mut encryption: Option<String> = None;
        let mut plans = Vec::<RecipientPlan<'a>>::with_capacity(jwe.recipients().len());

        for (index, recipient) in jwe.recipients().iter().enumerate() {
            let header = Header::merge([jwe.protected(), jwe.unprotected(), recipient.header()]);
            let alg = header.require_str("alg")?;
            let enc = header.require_str("enc")?;
            match &encryption {
                None => encryption = Some(enc.to_owned()),
                Some(first) if first != enc => {
                    return Err(HeaderError::InconsistentEncryption {
                        first: first.clone(),
                        other: enc.to_owned(),
                    }
                    .into());
                }
                Some(_) => { /* consistent */ }
            }

            let key = recipient
                .key()
                .ok_or(KeyManagementError::MissingRecipientKey { index })?;
            let (algorithm, mode) = self.algorithms.key_management(alg)?;
            key.check_algorithm(alg)?;
            key.check_purpose(KeyPurpose::Encryption)?;
            if let Some(first) = plans.first() {
                if !first.mode.is_compatible_with(mode) {
                    return Err(KeyManagementError::ForeignKeyManagementMode {
                        first: first.mode,
                        other: mode,
                    }
                    .into());
                }
            }

            plans.push(RecipientPlan {
                algorithm,
                mode,
                key,
                sender_key: recipient.sender_key(),
                header,
            });
        }

        let encryption = encryption.ok_or(KeyManagementError::NoRecipients)?;
        Ok((plans, encryption))
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

    /// Delivers a random CEK to a recipient.
    fn deliver(plan: &RecipientPlan<'_>, cek: &[u8]) -> Result<(Vec<u8>, Header), Error> {
        let delivery = match plan.algorithm {
            JoseAlgorithm::KeyEncryption(alg) => alg.encrypt_key(plan.key, cek, &plan.header),
            JoseAlgorithm::KeyWrapping(alg) => alg.wrap_key(plan.key, cek, &plan.header),
            JoseAlgorithm::KeyAgreementWrapping(alg) => {
                alg.wrap_agreement_key(plan.key, plan.sender_key, cek, &plan.header)
            }
            other => Err(anyhow::anyhow!(
                "`{}` cannot deliver an external CEK",
                other.name()
            )),
        };
        let delivery = delivery.map_err(Error::Algorithm)?;
        Ok((delivery.encrypted_key, delivery.additional_header))
    }

    /// Determines the CEK for direct encryption or direct key agreement. All recipients
    /// must arrive at the same CEK.
    #[allow(clippy::type_complexity)]
    fn determine_cek(
        plans: &[RecipientPlan<'_>],
        enc: &str,
        cek_len: usize,
    ) -> Result<(Zeroizing<Vec<u8>>, Vec<(Vec<u8>, Header)>), Error> {
        let mut cek: Option<Zeroizing<Vec<u8>>> = None;
        let mut deliveries = Vec::with_capacity(plans.len());

        for plan in plans {
            let (candidate, additional_header) = match plan.algorithm {
                JoseAlgorithm::DirectEncryption(alg) => {
                    (alg.cek(plan.key).map_err(Error::Algorithm)?, Header::empty())
                }
                JoseAlgorithm::KeyAgreement(alg) => {
                    let agreed = alg
                        .agree_key(plan.key, plan.sender_key, enc, cek_len, &plan.header)
                        .map_err(Error::Algorithm)?;
                    (agreed.cek, agreed.additional_header)
                }
                other => {
                    return Err(Error::Algorithm(anyhow::anyhow!(
                        "`{}` does not determine the CEK",
                        other.name()
                    )));
                }
            };

            if candidate.len() != cek_len {
                return Err(Error::Algorithm(anyhow::anyhow!(
                    "CEK has length {}, while `{enc}` requires {cek_len} bytes",
                    candidate.len()
                )));
            }
            match &cek {
                Some(existing) => {
                    if !bool::from(existing.as_slice().ct_eq(candidate.as_slice())) {
                        return Err(KeyManagementError::CekMismatch.into());
                    }
                }
                None => cek = Some(candidate),
            }
            deliveries.push((Vec::new(), additional_header));
        }

        let cek = cek.ok_or(KeyManagementError::NoRecipients)?;
        Ok((cek, deliveries))
    }
}
