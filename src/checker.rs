//! Claim and header checkers run after successful verification or decryption.
//!
//! A [`CheckerManager`] holds [`HeaderChecker`]s and [`ClaimChecker`]s. Checkers only
//! run for parameters / claims that are present; claims that must be present are declared
//! with [`CheckerManager::with_mandatory_claims()`]. The manager also enforces
//! the `crit` header parameter: every listed name must be understood by the engine
//! or handled by a registered checker that has succeeded.
//!
//! # Examples
//!
//! ```
//! use jose_compact::{
//!     checker::{AlgorithmChecker, AudienceChecker, CheckerManager, ExpirationChecker},
//!     Header, TimeOptions,
//! };
//! use serde_json::json;
//!
//! # fn main() -> anyhow::Result<()> {
//! let checker = CheckerManager::new()
//!     .with_header_checker(AlgorithmChecker::new(["HS256"]))
//!     .with_claim_checker(ExpirationChecker::new(TimeOptions::default()))
//!     .with_claim_checker(AudienceChecker::new("my-service"))
//!     .with_mandatory_claims(["exp", "aud"]);
//!
//! let protected = Header::empty().with_algorithm("HS256");
//! let exp = chrono::Utc::now().timestamp() + 3_600;
//! let claims = json!({ "exp": exp, "aud": ["my-service", "other"] });
//! checker.check(&protected, &Header::empty(), Some(&claims))?;
//!
//! let claims = json!({ "aud": "my-service" });
//! assert!(checker.check(&protected, &Header::empty(), Some(&claims)).is_err());
//! # Ok(())
//! # }
//! ```

use chrono::{DateTime, Utc};
use serde_json::Value;

use std::{collections::HashSet, fmt, sync::Arc};

use crate::{
    ClaimError, Error, Header, HeaderError, Jwe, Jws, SerializationError, Signature,
    TimeOptions,
};

/// Checker of a single claim in the payload.
pub trait ClaimChecker: Send + Sync {
    /// Name of the checked claim.
    fn claim(&self) -> &str;

    /// Checks the claim value.
    fn check(&self, value: &Value) -> Result<(), ClaimError>;
}

/// Checker of a single header parameter.
pub trait HeaderChecker: Send + Sync {
    /// Name of the checked parameter.
    fn parameter(&self) -> &str;

    /// Whether the parameter must be integrity-protected.
    fn protected_only(&self) -> bool {
        false
    }

    /// Checks the parameter value.
    fn check(&self, value: &Value) -> Result<(), ClaimError>;
}

fn timestamp(claim: &str, value: &Value) -> Result<DateTime<Utc>, ClaimError> {
    value
        .as_i64()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .ok_or_else(|| ClaimError::InvalidType {
            claim: claim.to_owned(),
            expected: "an integer timestamp",
        })
}

fn string_claim<'a>(claim: &str, value: &'a Value) -> Result<&'a str, ClaimError> {
    value.as_str().ok_or_else(|| ClaimError::InvalidType {
        claim: claim.to_owned(),
        expected: "a string",
    })
}

/// Checks the `exp` claim: the token must not be expired.
#[derive(Debug, Clone)]
pub struct ExpirationChecker<F = fn() -> DateTime<Utc>> {
    options: TimeOptions<F>,
}

impl<F> ExpirationChecker<F>
where
    F: Fn() -> DateTime<Utc> + Send + Sync,
{
    /// Creates a checker with the specified time options.
    pub fn new(options: TimeOptions<F>) -> Self {
        Self { options }
    }
}

impl<F> ClaimChecker for ExpirationChecker<F>
where
    F: Fn() -> DateTime<Utc> + Send + Sync,
{
    fn claim(&self) -> &str {
        "exp"
    }

    fn check(&self, value: &Value) -> Result<(), ClaimError> {
        if self.options.is_past(timestamp("exp", value)?) {
            Err(ClaimError::Expired)
        } else {
            Ok(())
        }
    }
}

/// Checks the `nbf` claim: the token must already be valid.
#[derive(Debug, Clone)]
pub struct NotBeforeChecker<F = fn() -> DateTime<Utc>> {
    options: TimeOptions<F>,
}

impl<F> NotBeforeChecker<F>
where
    F: Fn() -> DateTime<Utc> + Send + Sync,
{
    /// Creates a checker with the specified time options.
    pub fn new(options: TimeOptions<F>) -> Self {
        Self { options }
    }
}

impl<F> ClaimChecker for NotBeforeChecker<F>
where
    F: Fn() -> DateTime<Utc> + Send + Sync,
{
    fn claim(&self) -> &str {
        "nbf"
    }

    fn check(&self, value: &Value) -> Result<(), ClaimError> {
        if self.options.is_future(timestamp("nbf", value)?) {
            Err(ClaimError::NotMature)
        } else {
            Ok(())
        }
    }
}

/// Checks the `iat` claim: the token must not be issued in the future.
#[derive(Debug, Clone)]
pub struct IssuedAtChecker<F = fn() -> DateTime<Utc>> {
    options: TimeOptions<F>,
}

impl<F> IssuedAtChecker<F>
where
    F: Fn() -> DateTime<Utc> + Send + Sync,
{
    /// Creates a checker with the specified time options.
    pub fn new(options: TimeOptions<F>) -> Self {
        Self { options }
    }
}

impl<F> ClaimChecker for IssuedAtChecker<F>
where
    F: Fn() -> DateTime<Utc> + Send + Sync,
{
    fn claim(&self) -> &str {
        "iat"
    }

    fn check(&self, value: &Value) -> Result<(), ClaimError> {
        if self.options.is_future(timestamp("iat", value)?) {
            Err(ClaimError::IssuedInFuture)
        } else {
            Ok(())
        }
    }
}

/// Checks the `aud` claim: it must be equal to, or contain the expected audience.
#[derive(Debug, Clone)]
pub struct AudienceChecker {
    audience: String,
}

impl AudienceChecker {
    /// Creates a checker for the specified audience.
    pub fn new(audience: impl Into<String>) -> Self {
        Self {
            audience: audience.into(),
        }
    }
}

impl ClaimChecker for AudienceChecker {
    fn claim(&self) -> &str {
        "aud"
    }

    fn check(&self, value: &Value) -> Result<(), ClaimError> {
        let matches = match value {
            Value::String(audience) => *audience == self.audience,
            Value::Array(audiences) => audiences
                .iter()
                .any(|audience| audience.as_str() == Some(self.audience.as_str())),
            _ => {
                return Err(ClaimError::InvalidType {
                    claim: "aud".to_owned(),
                    expected: "a string or an array of strings",
                })
            }
        };
        if matches {
            Ok(())
        } else {
            Err(ClaimError::AudienceMismatch)
        }
    }
}

/// Checks the `iss` claim.
#[derive(Debug, Clone)]
pub struct IssuerChecker {
    issuer: String,
}

impl IssuerChecker {
    /// Creates a checker for the specified issuer.
    pub fn new(issuer: impl Into<String>) -> Self {
        Self {
            issuer: issuer.into(),
        }
    }
}

impl ClaimChecker for IssuerChecker {
    fn claim(&self) -> &str {
        "iss"
    }

    fn check(&self, value: &Value) -> Result<(), ClaimError> {
        if string_claim("iss", value)? == self.issuer {
            Ok(())
        } else {
            Err(ClaimError::IssuerMismatch)
        }
    }
}

/// Checks the `sub` claim.
#[derive(Debug, Clone)]
pub struct SubjectChecker {
    subject: String,
}

impl SubjectChecker {
    /// Creates a checker for the specified subject.
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
        }
    }
}

impl ClaimChecker for SubjectChecker {
    fn claim(&self) -> &str {
        "sub"
    }

    fn check(&self, value: &Value) -> Result<(), ClaimError> {
        if string_claim("sub", value)? == self.subject {
            Ok(())
        } else {
            Err(ClaimError::SubjectMismatch)
        }
    }
}

/// Checks the `jti` claim with a predicate, e.g. against a replay cache.
pub struct TokenIdChecker {
    predicate: Box<dyn Fn(&str) -> bool + Send + Sync>,
}

impl fmt::Debug for TokenIdChecker {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.debug_struct("TokenIdChecker").finish_non_exhaustive()
    }
}

impl TokenIdChecker {
    /// Creates a checker accepting token IDs for which `predicate` returns `true`.
    pub fn new(predicate: impl Fn(&str) -> bool + Send + Sync + 'static) -> Self {
        Self {
            predicate: Box::new(predicate),
        }
    }
}

impl ClaimChecker for TokenIdChecker {
    fn claim(&self) -> &str {
        "jti"
    }

    fn check(&self, value: &Value) -> Result<(), ClaimError> {
        let token_id = string_claim("jti", value)?;
        if (self.predicate)(token_id) {
            Ok(())
        } else {
            Err(ClaimError::InvalidTokenId)
        }
    }
}

/// Checks the `alg` header parameter against an allow-list. The parameter must be protected.
#[derive(Debug, Clone)]
pub struct AlgorithmChecker {
    allowed: Vec<String>,
}

impl AlgorithmChecker {
    /// Creates a checker with the specified allowed algorithms.
    pub fn new<I, S>(allowed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed: allowed.into_iter().map(Into::into).collect(),
        }
    }
}

impl HeaderChecker for AlgorithmChecker {
    fn parameter(&self) -> &str {
        "alg"
    }

    fn protected_only(&self) -> bool {
        true
    }

    fn check(&self, value: &Value) -> Result<(), ClaimError> {
        let alg = string_claim("alg", value)?;
        if self.allowed.iter().any(|allowed| allowed == alg) {
            Ok(())
        } else {
            Err(ClaimError::AlgorithmNotAllowed(alg.to_owned()))
        }
    }
}

/// Registry of header and claim checkers.
#[derive(Clone, Default)]
pub struct CheckerManager {
    header_checkers: Vec<Arc<dyn HeaderChecker>>,
    claim_checkers: Vec<Arc<dyn ClaimChecker>>,
    mandatory_claims: Vec<String>,
}

impl fmt::Debug for CheckerManager {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let headers: Vec<_> = self
            .header_checkers
            .iter()
            .map(|checker| checker.parameter())
            .collect();
        let claims: Vec<_> = self
            .claim_checkers
            .iter()
            .map(|checker| checker.claim())
            .collect();
        formatter
            .debug_struct("CheckerManager")
            .field("header_checkers", &headers)
            .field("claim_checkers", &claims)
            .field("mandatory_claims", &self.mandatory_claims)
            .finish()
    }
}

impl CheckerManager {
    /// Creates a manager without checkers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a header checker.
    #[must_use]
    pub fn with_header_checker(mut self, checker: impl HeaderChecker + 'static) -> Self {
        self.header_checkers.push(Arc::new(checker));
        self
    }

    /// Adds a claim checker.
    #[must_use]
    pub fn with_claim_checker(mut self, checker: impl ClaimChecker + 'static) -> Self {
        self.claim_checkers.push(Arc::new(checker));
        self
    }

    /// Marks claims that must be present in the payload.
    #[must_use]
    pub fn with_mandatory_claims<I, S>(mut self, claims: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.mandatory_claims.extend(claims.into_iter().map(Into::into));
        self
    }

    /// Runs checkers against headers and JSON claims.
    ///
    /// # Errors
    ///
    /// Returns an error if a checker fails, a mandatory claim is missing, or `crit`
    /// is malformed, unprotected or lists a name that was not handled.
    pub fn check(
        &self,
        protected: &Header,
        unprotected: &Header,
        claims: Option<&Value>,
    ) -> Result<(), Error> {
        self.check_with_understood(protected, unprotected, claims, &[])
    }

    /// Runs checkers for the signature with the specified `index` and the JWS payload.
    /// `b64` listed in `crit` is considered understood. Claims are not checked for a detached
    /// payload.
    ///
    /// # Errors
    ///
    /// Returns an error if `index` is out of bounds or checks fail.
    pub fn check_jws(&self, jws: &Jws, index: usize) -> Result<(), Error> {
        let signature =
            jws.signatures()
                .get(index)
                .ok_or(SerializationError::IndexOutOfBounds {
                    index,
                    len: jws.signatures().len(),
                })?;
        self.check_signature(signature, jws.payload_json().as_ref())
    }

    pub(crate) fn check_signature(
        &self,
        signature: &Signature,
        claims: Option<&Value>,
    ) -> Result<(), Error> {
        self.check_with_understood(signature.protected(), signature.header(), claims, &["b64"])
    }

    /// Runs checkers for the recipient with the specified `index` and the decrypted payload.
    ///
    /// # Errors
    ///
    /// Returns an error if `index` is out of bounds or checks fail.
    pub fn check_jwe(&self, jwe: &Jwe, index: usize) -> Result<(), Error> {
        let recipient = jwe
            .recipients()
            .get(index)
            .ok_or(SerializationError::IndexOutOfBounds {
                index,
                len: jwe.recipients().len(),
            })?;
        let unprotected = Header::merge([jwe.unprotected(), recipient.header()]);
        let claims = jwe.payload_json();
        self.check_with_understood(jwe.protected(), &unprotected, claims.as_ref(), &[])
    }

    fn check_with_understood(
        &self,
        protected: &Header,
        unprotected: &Header,
        claims: Option<&Value>,
        understood: &[&str],
    ) -> Result<(), Error> {
        if unprotected.contains("crit") {
            return Err(HeaderError::NotProtected("crit".to_owned()).into());
        }
        let critical = protected.critical()?;
        let merged = Header::merge([protected, unprotected]);
        let mut handled = HashSet::new();

        for checker in &self.header_checkers {
            let name = checker.parameter();
            let Some(value) = merged.get(name) else {
                continue;
            };
            if checker.protected_only() && !protected.contains(name) {
                return Err(ClaimError::NotProtected(name.to_owned()).into());
            }
            checker.check(value)?;
            handled.insert(name);
        }

        let claims = claims.and_then(Value::as_object);
        for claim in &self.mandatory_claims {
            if !claims.map_or(false, |claims| claims.contains_key(claim)) {
                return Err(ClaimError::NoClaim(claim.clone()).into());
            }
        }
        if let Some(claims) = claims {
            for checker in &self.claim_checkers {
                let name = checker.claim();
                if let Some(value) = claims.get(name) {
                    checker.check(value)?;
                    handled.insert(name);
                }
            }
        }

        for name in critical {
            if !understood.contains(&name) && !handled.contains(name) {
                return Err(HeaderError::UnsatisfiedCritical(name.to_owned()).into());
            }
        }
        Ok(())
    }
}
