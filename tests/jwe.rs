//! Tests for JWE encryption and decryption across key management modes.

use assert_matches::assert_matches;
use serde_json::{json, Value};

mod shared;

use crate::shared::{load_jwe, sample_payload, test_encryption};
use jose_compact::{
    alg::{AlgorithmManager, KeyManagementMode},
    prelude::*,
    CompressionManager, Decrypter, Encrypter, Error, HeaderError, JweLoader, KeyManagementError,
    Serialization,
};

const KW_KEY: &str = "AAECAwQFBgcICQoLDA0ODw";

/// JWE with `A128KW` + `A128GCM` and the `{"iss":"joe","sub":"alice"}` payload.
const KW_TOKEN: &str = "eyJhbGciOiJBMTI4S1ciLCJlbmMiOiJBMTI4R0NNIiwia2lkIjoia3cta2V5In0.\
                        EAKEbIqldnGWmjL3NmDrWNn5id1_YoLS.yMnKy8zNzs_Q0dLT.\
                        NKkEaRG_7s--JKIs87zAT-8rjgxS8SjYZcuS.ZSDDpoLdJPqdLzI7hD_SJA";

/// Same as `KW_TOKEN`, but with `zip: DEF` and a repetitive payload.
const DEFLATE_TOKEN: &str = "eyJhbGciOiJBMTI4S1ciLCJlbmMiOiJBMTI4R0NNIiwiemlwIjoiREVGIn0.\
                             EAKEbIqldnGWmjL3NmDrWNn5id1_YoLS.yMnKy8zNzs_Q0dLT.\
                             vEJBUTdVHSKfHI_ClM-7EkcmmmYeTxJLGQUt3w.k8RrjSUvCEOHwQothg-ULg";

const ALL_ALGORITHMS: &[&str] = &[
    "A128KW", "A192KW", "A256KW", "dir", "A128GCM", "A192GCM", "A256GCM",
];

fn manager(names: &[&str]) -> AlgorithmManager {
    AlgorithmManager::from_names(names.iter().copied()).unwrap()
}

fn deflate() -> CompressionManager {
    CompressionManager::from_names(["DEF"]).unwrap()
}

fn kw_key() -> Jwk {
    serde_json::from_value(json!({ "kty": "oct", "k": KW_KEY, "kid": "kw-key" })).unwrap()
}

fn cek_len(enc: &str) -> usize {
    match enc {
        "A128GCM" => 16,
        "A192GCM" => 24,
        "A256GCM" => 32,
        _ => unreachable!(),
    }
}

#[test]
fn key_wrapping_reference() {
    let mut jwe = load_jwe(KW_TOKEN);
    assert_eq!(jwe.protected().key_id(), Some("kw-key"));
    assert_eq!(jwe.recipients()[0].encrypted_key().len(), 24);

    let keys = JwkSet::new().with_key(kw_key());
    let decrypter = Decrypter::new(manager(&["A128KW", "A128GCM"]), CompressionManager::new());
    let decrypted = decrypter.decrypt(&mut jwe, &keys).unwrap();
    assert_eq!(decrypted.key_index, 0);
    assert_eq!(
        jwe.payload_json().unwrap(),
        json!({ "iss": "joe", "sub": "alice" })
    );
}

#[test]
fn compressed_reference() {
    let mut jwe = load_jwe(DEFLATE_TOKEN);
    let keys = JwkSet::new().with_key(kw_key());
    let decrypter = Decrypter::new(manager(&["A128KW", "A128GCM"]), deflate());
    decrypter.decrypt(&mut jwe, &keys).unwrap();
    assert_eq!(
        jwe.payload().unwrap(),
        "Live long and Prosper. ".repeat(8).as_bytes()
    );

    // The decompression limit is enforced.
    let mut jwe = load_jwe(DEFLATE_TOKEN);
    let limited = deflate().with_decompression_limit(32);
    let decrypter = Decrypter::new(manager(&["A128KW", "A128GCM"]), limited);
    let err = decrypter.decrypt(&mut jwe, &keys).unwrap_err();
    assert_matches!(err, Error::Compression(_));
    assert!(jwe.payload().is_none());
}

#[test]
fn tampered_reference_cannot_be_decrypted() {
    let decrypter = Decrypter::new(manager(&["A128KW", "A128GCM"]), CompressionManager::new());
    let keys = JwkSet::new().with_key(kw_key());

    let mut parts: Vec<_> = KW_TOKEN.split('.').map(str::to_owned).collect();
    // Flip the first ciphertext byte ('N' -> 'M').
    parts[3].replace_range(0..1, "M");
    let mut jwe = load_jwe(&parts.join("."));
    assert_matches!(decrypter.decrypt(&mut jwe, &keys).unwrap_err(), Error::UnableToDecrypt);

    // Modifying the protected header invalidates the tag as well.
    let mut parts: Vec<_> = KW_TOKEN.split('.').map(str::to_owned).collect();
    let tampered_header = json!({
        "alg": "A128KW",
        "enc": "A128GCM",
        "kid": "kw-key",
        "cty": "text/plain",
    });
    parts[0] = shared::base64url_encode(tampered_header.to_string().as_bytes());
    let mut jwe = load_jwe(&parts.join("."));
    assert_matches!(decrypter.decrypt(&mut jwe, &keys).unwrap_err(), Error::UnableToDecrypt);
}

#[test]
fn key_wrapping_round_trips() {
    let algorithms = manager(ALL_ALGORITHMS);
    for (alg, kek_len) in [("A128KW", 16), ("A192KW", 24), ("A256KW", 32)] {
        for enc in ["A128GCM", "A192GCM", "A256GCM"] {
            for zip in [None, Some("DEF")] {
                let key = Jwk::symmetric(vec![kek_len as u8; kek_len]);
                let mut protected = Header::empty().with_algorithm(alg).with_encryption(enc);
                if let Some(zip) = zip {
                    protected = protected.with_compression(zip);
                }
                let jwe = test_encryption(&algorithms, protected, &key, &key);
                assert_eq!(jwe.recipients()[0].encrypted_key().len(), cek_len(enc) + 8);
            }
        }
    }
}

#[test]
fn direct_encryption_round_trips() {
    let algorithms = manager(ALL_ALGORITHMS);
    for enc in ["A128GCM", "A192GCM", "A256GCM"] {
        let key = Jwk::symmetric(vec![3_u8; cek_len(enc)]);
        let protected = Header::empty().with_algorithm("dir").with_encryption(enc);
        let jwe = test_encryption(&algorithms, protected, &key, &key);
        assert!(jwe.recipients()[0].encrypted_key().is_empty());
        let compact = jwe.to_compact(0).unwrap();
        assert!(compact.contains(".."), "{compact}");
    }
}

#[test]
fn aad_is_authenticated() {
    let algorithms = manager(&["A128KW", "A128GCM"]);
    let key = kw_key();
    let mut jwe = Jwe::new(sample_payload())
        .with_protected(Header::empty().with_encryption("A128GCM"))
        .with_unprotected(Header::empty().with_algorithm("A128KW"))
        .with_aad(b"additional data".to_vec())
        .with_recipient(Recipient::new(Header::empty().with_key_id("kw-key"), key.clone()));
    Encrypter::new(algorithms.clone(), CompressionManager::new())
        .encrypt(&mut jwe)
        .unwrap();
    assert_matches!(
        jwe.to_compact(0).unwrap_err(),
        jose_compact::SerializationError::UnprotectedHeader
    );

    let flattened = jwe.serialize(Serialization::Flattened, 0).unwrap();
    let mut value: Value = serde_json::from_str(&flattened).unwrap();
    assert_eq!(value["unprotected"]["alg"], "A128KW");
    assert_eq!(value["header"]["kid"], "kw-key");

    let decrypter = Decrypter::new(algorithms, CompressionManager::new());
    let keys = JwkSet::new().with_key(key);
    let mut loaded = load_jwe(&flattened);
    assert_eq!(loaded.aad(), Some(&b"additional data"[..]));
    decrypter.decrypt(&mut loaded, &keys).unwrap();
    assert_eq!(loaded.payload(), Some(sample_payload().as_slice()));

    value["aad"] = shared::base64url_encode(b"other data").into();
    let mut tampered = load_jwe(&value.to_string());
    assert_matches!(
        decrypter.decrypt(&mut tampered, &keys).unwrap_err(),
        Error::UnableToDecrypt
    );
}

#[test]
fn multiple_wrapping_recipients() {
    let algorithms = manager(ALL_ALGORITHMS);
    let first_key = Jwk::symmetric([1_u8; 16]);
    let second_key = Jwk::symmetric([2_u8; 32]);
    let mut jwe = Jwe::new(sample_payload())
        .with_protected(Header::empty().with_encryption("A256GCM").with_compression("DEF"))
        .with_recipient(Recipient::new(
            Header::empty().with_algorithm("A128KW").with_key_id("first"),
            first_key,
        ))
        .with_recipient(Recipient::new(
            Header::empty().with_algorithm("A256KW").with_key_id("second"),
            second_key.clone(),
        ));
    Encrypter::new(algorithms.clone(), deflate())
        .encrypt(&mut jwe)
        .unwrap();

    assert_matches!(
        jwe.to_compact(0).unwrap_err(),
        jose_compact::SerializationError::MultipleRecipients
    );
    let general = jwe.to_general().unwrap();
    let value: Value = serde_json::from_str(&general).unwrap();
    assert_eq!(value["recipients"].as_array().unwrap().len(), 2);

    let mut loaded = load_jwe(&general);
    let header = loaded.recipient_header(1).unwrap();
    assert_eq!(header.algorithm(), Some("A256KW"));
    assert_eq!(header.encryption(), Some("A256GCM"));
    assert_eq!(header.compression(), Some("DEF"));

    let keys = JwkSet::new()
        .with_key(Jwk::symmetric([9_u8; 16]))
        .with_key(second_key);
    let decrypted = Decrypter::new(algorithms, deflate())
        .decrypt(&mut loaded, &keys)
        .unwrap();
    assert_eq!(decrypted.recipient_index, 1);
    assert_eq!(decrypted.key_index, 1);
    assert_eq!(loaded.payload(), Some(sample_payload().as_slice()));
}

#[test]
fn decryption_key_trial_ignores_failure_kinds() {
    let decrypter = Decrypter::new(manager(&["A128KW", "A128GCM"]), CompressionManager::new());
    let failing_keys = [
        kw_key().with_param("use", "sig").unwrap(),
        kw_key().with_param("alg", "A256KW").unwrap(),
        Jwk::symmetric([7_u8; 16]),
        Jwk::symmetric([7_u8; 32]),
    ];

    for first in &failing_keys {
        for last in &failing_keys {
            let keys = JwkSet::new()
                .with_key(first.clone())
                .with_key(kw_key())
                .with_key(last.clone());
            let mut jwe = load_jwe(KW_TOKEN);
            let decrypted = decrypter.decrypt(&mut jwe, &keys).unwrap();
            assert_eq!(decrypted.recipient_index, 0);
            assert_eq!(decrypted.key_index, 1);

            let keys = JwkSet::new().with_key(first.clone()).with_key(last.clone());
            let mut jwe = load_jwe(KW_TOKEN);
            let err = decrypter.decrypt(&mut jwe, &keys).unwrap_err();
            assert_matches!(err, Error::UnableToDecrypt);
            assert!(jwe.payload().is_none());
        }
    }
}

#[test]
fn compression_must_be_protected() {
    let parts: Vec<_> = DEFLATE_TOKEN.split('.').collect();
    let protected = json!({ "alg": "A128KW", "enc": "A128GCM" });
    let flattened = json!({
        "protected": shared::base64url_encode(protected.to_string().as_bytes()),
        "encrypted_key": parts[1],
        "iv": parts[2],
        "ciphertext": parts[3],
        "tag": parts[4],
    });
    let decrypter = Decrypter::new(manager(&["A128KW", "A128GCM"]), deflate());
    let keys = JwkSet::new().with_key(kw_key());

    for location in ["unprotected", "header"] {
        let mut value = flattened.clone();
        value[location] = json!({ "zip": "DEF" });
        let mut jwe = load_jwe(&value.to_string());
        let err = decrypter.decrypt(&mut jwe, &keys).unwrap_err();
        assert_matches!(
            err,
            Error::Header(HeaderError::NotProtected(name)) if name == "zip"
        );
        assert!(jwe.payload().is_none());
    }

    let mut jwe = Jwe::new(sample_payload())
        .with_protected(Header::empty().with_algorithm("A128KW").with_encryption("A128GCM"))
        .with_unprotected(Header::empty().with_compression("DEF"))
        .with_recipient(Recipient::new(Header::empty(), kw_key()));
    let err = Encrypter::new(manager(&["A128KW", "A128GCM"]), deflate())
        .encrypt(&mut jwe)
        .unwrap_err();
    assert_matches!(
        err,
        Error::Header(HeaderError::NotProtected(name)) if name == "zip"
    );
}

#[test]
fn compression_bomb_is_rejected() {
    let limit = CompressionManager::DEFAULT_DECOMPRESSION_LIMIT;
    let algorithms = manager(&["A128KW", "A128GCM"]);
    let keys = JwkSet::new().with_key(kw_key());

    let mut bomb = Jwe::new(vec![0_u8; limit + 1])
        .with_protected(
            Header::empty()
                .with_algorithm("A128KW")
                .with_encryption("A128GCM")
                .with_compression("DEF"),
        )
        .with_recipient(Recipient::new(Header::empty(), kw_key()));
    Encrypter::new(algorithms.clone(), deflate())
        .encrypt(&mut bomb)
        .unwrap();
    let compact = bomb.to_compact(0).unwrap();
    assert!(compact.len() < limit / 256, "{}", compact.len());

    let decrypter = Decrypter::new(algorithms.clone(), deflate());
    let mut jwe = load_jwe(&compact);
    let err = decrypter.decrypt(&mut jwe, &keys).unwrap_err();
    assert_matches!(err, Error::Compression(_));
    assert!(jwe.payload().is_none());

    // A payload exactly at the limit is accepted.
    let mut jwe = Jwe::new(vec![0_u8; limit])
        .with_protected(
            Header::empty()
                .with_algorithm("A128KW")
                .with_encryption("A128GCM")
                .with_compression("DEF"),
        )
        .with_recipient(Recipient::new(Header::empty(), kw_key()));
    Encrypter::new(algorithms, deflate()).encrypt(&mut jwe).unwrap();
    let mut jwe = load_jwe(&jwe.to_compact(0).unwrap());
    decrypter.decrypt(&mut jwe, &keys).unwrap();
    assert_eq!(jwe.payload().map(<[u8]>::len), Some(limit));
}

#[test]
fn jwe_loader_checks_claims() {
    use jose_compact::checker::{CheckerManager, IssuerChecker};

    let config = JoseConfig::new(["A128KW", "A128GCM"]);
    let keys = JwkSet::new().with_key(kw_key());

    let checker = CheckerManager::new()
        .with_claim_checker(IssuerChecker::new("joe"))
        .with_mandatory_claims(["sub"]);
    let loader = JweLoader::new(config.decrypter().unwrap(), checker);
    let (jwe, decrypted) = loader.load_and_decrypt(KW_TOKEN, &keys).unwrap();
    assert_eq!(decrypted.recipient_index, 0);
    assert_eq!(jwe.payload_json().unwrap()["sub"], "alice");

    let checker = CheckerManager::new().with_mandatory_claims(["exp"]);
    let loader = JweLoader::new(config.decrypter().unwrap(), checker);
    let err = loader.load_and_decrypt(KW_TOKEN, &keys).unwrap_err();
    assert_matches!(
        err,
        Error::Claim(jose_compact::ClaimError::NoClaim(name)) if name == "exp"
    );
}

#[cfg(feature = "p256")]
mod agreement {
    use super::*;

    // RFC 7518, Appendix C.
    fn bob_key() -> Jwk {
        serde_json::from_value(json!({
            "kty": "EC",
            "crv": "P-256",
            "x": "weNJy2HscCSM6AEDTDg04biOvhFhyyWvOHQfeF_PxMQ",
            "y": "e8lnCO-AlStT-NJVX-crhB7QRYhiix03illJOVAOyck",
            "d": "VEmDZpDXXK8p8N0Cndsxs924q6nS1RXFASRl6BfUqdw",
        }))
        .unwrap()
    }

    fn algorithms() -> AlgorithmManager {
        manager(&[
            "ECDH-ES",
            "ECDH-ES+A128KW",
            "ECDH-ES+A256KW",
            "A128KW",
            "dir",
            "A128GCM",
            "A256GCM",
        ])
    }

    #[test]
    fn direct_key_agreement_round_trip() {
        for enc in ["A128GCM", "A256GCM"] {
            let protected = Header::empty()
                .with_algorithm("ECDH-ES")
                .with_encryption(enc)
                .with_param("apu", "QWxpY2U")
                .with_param("apv", "Qm9i");
            let jwe = test_encryption(&algorithms(), protected, &bob_key().to_public(), &bob_key());

            // Single recipient: the ephemeral key is integrity-protected.
            let epk = jwe.protected().get("epk").unwrap();
            assert_eq!(epk["kty"], "EC");
            assert_eq!(epk["crv"], "P-256");
            assert!(epk.get("d").is_none());
            assert!(jwe.recipients()[0].header().is_empty());
            assert!(jwe.recipients()[0].encrypted_key().is_empty());
        }
    }

    #[test]
    fn key_agreement_with_wrapping_round_trip() {
        for alg in ["ECDH-ES+A128KW", "ECDH-ES+A256KW"] {
            let protected = Header::empty()
                .with_algorithm(alg)
                .with_encryption("A128GCM")
                .with_compression("DEF");
            let jwe = test_encryption(&algorithms(), protected, &bob_key().to_public(), &bob_key());
            assert!(jwe.protected().contains("epk"));
            assert_eq!(jwe.recipients()[0].encrypted_key().len(), 24);
        }
    }

    #[test]
    fn agreement_parameters_go_to_recipient_header_for_several_recipients() {
        let wrap_key = Jwk::symmetric([1_u8; 16]);
        let mut jwe = Jwe::new(sample_payload())
            .with_protected(Header::empty().with_encryption("A128GCM"))
            .with_recipient(Recipient::new(
                Header::empty().with_algorithm("A128KW"),
                wrap_key,
            ))
            .with_recipient(Recipient::new(
                Header::empty().with_algorithm("ECDH-ES+A128KW"),
                bob_key().to_public(),
            ));
        Encrypter::new(algorithms(), CompressionManager::new())
            .encrypt(&mut jwe)
            .unwrap();
        assert!(!jwe.protected().contains("epk"));
        assert!(!jwe.recipients()[0].header().contains("epk"));
        assert!(jwe.recipients()[1].header().contains("epk"));

        let mut loaded = load_jwe(&jwe.to_general().unwrap());
        let keys = JwkSet::new().with_key(bob_key());
        let decrypted = Decrypter::new(algorithms(), CompressionManager::new())
            .decrypt(&mut loaded, &keys)
            .unwrap();
        assert_eq!(decrypted.recipient_index, 1);
        assert_eq!(decrypted.key_index, 0);
    }

    #[test]
    fn direct_modes_cannot_be_mixed() {
        let mut jwe = Jwe::new(sample_payload())
            .with_protected(Header::empty().with_encryption("A128GCM"))
            .with_recipient(Recipient::new(
                Header::empty().with_algorithm("dir"),
                Jwk::symmetric([1_u8; 16]),
            ))
            .with_recipient(Recipient::new(
                Header::empty().with_algorithm("ECDH-ES"),
                bob_key().to_public(),
            ));
        let err = Encrypter::new(algorithms(), CompressionManager::new())
            .encrypt(&mut jwe)
            .unwrap_err();
        assert_matches!(
            err,
            Error::KeyManagement(KeyManagementError::ForeignKeyManagementMode {
                first: KeyManagementMode::Direct,
                other: KeyManagementMode::KeyAgreement,
            })
        );
        assert!(!jwe.is_encrypted());
    }

    #[test]
    fn several_ephemeral_agreements_disagree_on_cek() {
        let mut jwe = Jwe::new(sample_payload())
            .with_protected(Header::empty().with_algorithm("ECDH-ES").with_encryption("A128GCM"))
            .with_recipient(Recipient::new(Header::empty(), bob_key().to_public()))
            .with_recipient(Recipient::new(Header::empty(), bob_key().to_public()));
        let err = Encrypter::new(algorithms(), CompressionManager::new())
            .encrypt(&mut jwe)
            .unwrap_err();
        assert_matches!(err, Error::KeyManagement(KeyManagementError::CekMismatch));
    }

    #[test]
    fn symmetric_key_cannot_decrypt_agreement() {
        let protected = Header::empty()
            .with_algorithm("ECDH-ES")
            .with_encryption("A128GCM");
        let jwe = test_encryption(&algorithms(), protected, &bob_key().to_public(), &bob_key());
        let mut loaded = load_jwe(&jwe.to_compact(0).unwrap());
        let keys = JwkSet::new()
            .with_key(Jwk::symmetric([1_u8; 16]))
            .with_key(bob_key().to_public());
        let err = Decrypter::new(algorithms(), CompressionManager::new())
            .decrypt(&mut loaded, &keys)
            .unwrap_err();
        assert_matches!(err, Error::UnableToDecrypt);
    }
}
