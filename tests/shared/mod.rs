//! Functionality shared by `algorithms`, `jwe` and `rsa` tests.

#![allow(dead_code)] // Not all helpers are used by every test crate.

use assert_matches::assert_matches;
use rand::{seq::index::sample as sample_indexes, thread_rng};
use serde::{Deserialize, Serialize};

use jose_compact::{
    alg::AlgorithmManager, parse, prelude::*, CompressionManager, Decrypter, Encrypter, Error,
    JoseObject, Serialization, Signer, Verifier,
};

#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct SampleClaims {
    #[serde(rename = "iss")]
    pub issuer: String,
    #[serde(rename = "sub")]
    pub subject: String,
    #[serde(default)]
    pub admin: bool,
}

pub fn sample_payload() -> Vec<u8> {
    let claims = Claims::new(SampleClaims {
        issuer: "joe".to_owned(),
        subject: "alice".to_owned(),
        admin: true,
    });
    claims.to_payload().unwrap()
}

pub fn load_jws(input: &str) -> Jws {
    match parse(input).unwrap() {
        JoseObject::Jws(jws) => jws,
        JoseObject::Jwe(_) => panic!("expected JWS, got JWE"),
    }
}

pub fn load_jwe(input: &str) -> Jwe {
    match parse(input).unwrap() {
        JoseObject::Jwe(jwe) => jwe,
        JoseObject::Jws(_) => panic!("expected JWE, got JWS"),
    }
}

/// Signs a sample payload with `alg` in all serializations, checks that the result
/// is verified with `verifying_key` and that a mangled signature is rejected.
pub fn test_signature_algorithm(alg: &str, signing_key: &Jwk, verifying_key: &Jwk) {
    // Maximum number of signature bits mangled.
    const MAX_MANGLED_BITS: usize = 128;

    let algorithms = AlgorithmManager::from_names([alg]).unwrap();
    let signer = Signer::new(algorithms.clone());
    let verifier = Verifier::new(algorithms);
    let keys = JwkSet::new().with_key(verifying_key.clone());

    let protected = Header::empty().with_algorithm(alg);
    let mut jws = Jws::new(sample_payload()).with_signature(Signature::new(
        protected,
        Header::empty(),
        signing_key.clone(),
    ));
    signer.sign(&mut jws).unwrap();

    for serialization in [
        Serialization::Compact,
        Serialization::Flattened,
        Serialization::General,
    ] {
        let serialized = jws.serialize(serialization, 0).unwrap();
        let loaded = load_jws(&serialized);
        let verified = verifier.verify(&loaded, &keys, None).unwrap();
        assert_eq!(verified.signature_index, 0);
        assert_eq!(verified.key_index, 0);
        let claims = Claims::<SampleClaims>::from_payload(loaded.payload().unwrap()).unwrap();
        assert_eq!(claims.custom.subject, "alice");
    }

    // Mutate signature bits.
    let token = jws.to_compact(0).unwrap();
    let signature_start = token.rfind('.').unwrap() + 1;
    let signature = jws.signatures()[0].signature().unwrap().to_vec();
    let signature_bits = signature.len() * 8;

    let mangled_bits: Box<dyn Iterator<Item = usize>> = if signature_bits <= MAX_MANGLED_BITS {
        Box::new(0..signature_bits)
    } else {
        let indexes = sample_indexes(&mut thread_rng(), signature_bits, MAX_MANGLED_BITS);
        Box::new(indexes.into_iter())
    };

    for idx in mangled_bits {
        let mut mangled_signature = signature.clone();
        mangled_signature[idx / 8] ^= 1 << (idx % 8) as u8;
        let mangled_signature = base64url_encode(&mangled_signature);

        let mut mangled_token = token.clone();
        mangled_token.replace_range(signature_start.., &mangled_signature);
        let loaded = load_jws(&mangled_token);
        let err = verifier.verify(&loaded, &keys, None).unwrap_err();
        assert_matches!(err, Error::InvalidSignature);
    }

    // Mutate the payload.
    let mut parts: Vec<_> = token.split('.').map(str::to_owned).collect();
    parts[1] = base64url_encode(br#"{"iss":"joe","sub":"mallory","admin":true}"#);
    let loaded = load_jws(&parts.join("."));
    let err = verifier.verify(&loaded, &keys, None).unwrap_err();
    assert_matches!(err, Error::InvalidSignature);
}

/// Encrypts a sample payload for a single recipient and checks that it can be decrypted
/// after a round trip through all serializations.
pub fn test_encryption(
    algorithms: &AlgorithmManager,
    protected: Header,
    recipient_key: &Jwk,
    decryption_key: &Jwk,
) -> Jwe {
    let compression = CompressionManager::from_names(["DEF"]).unwrap();
    let encrypter = Encrypter::new(algorithms.clone(), compression.clone());
    let decrypter = Decrypter::new(algorithms.clone(), compression);

    let mut jwe = Jwe::new(sample_payload())
        .with_protected(protected)
        .with_recipient(Recipient::new(Header::empty(), recipient_key.clone()));
    encrypter.encrypt(&mut jwe).unwrap();

    let keys = JwkSet::new().with_key(decryption_key.clone());
    for serialization in [
        Serialization::Compact,
        Serialization::Flattened,
        Serialization::General,
    ] {
        let serialized = jwe.serialize(serialization, 0).unwrap();
        let mut loaded = load_jwe(&serialized);
        let decrypted = decrypter.decrypt(&mut loaded, &keys).unwrap();
        assert_eq!(decrypted.recipient_index, 0);
        assert_eq!(decrypted.key_index, 0);
        assert_eq!(loaded.payload(), Some(sample_payload().as_slice()));
    }
    jwe
}

pub fn base64url_encode(bytes: &[u8]) -> String {
    use base64ct::{Base64UrlUnpadded, Encoding};

    Base64UrlUnpadded::encode_string(bytes)
}
