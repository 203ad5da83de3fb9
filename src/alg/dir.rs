//! Direct use of a shared symmetric key as the CEK (`dir`).

use zeroize::Zeroizing;

use std::borrow::Cow;

use crate::{traits::DirectEncryption, Jwk};

/// `dir` key management: the secret of an `oct` key is used as the CEK as is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Direct;

impl DirectEncryption for Direct {
    fn name(&self) -> Cow<'static, str> {
        Cow::Borrowed("dir")
    }

    fn cek(&self, key: &Jwk) -> anyhow::Result<Zeroizing<Vec<u8>>> {
        let material = key.material()?;
        let secret = material.symmetric_secret()?;
        Ok(Zeroizing::new(secret.to_vec()))
    }
}
