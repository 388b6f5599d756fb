//! Domain verification tokens.
//!
//! A [`Token`] is issued for a domain, published by the domain owner as a TXT
//! record (see [`Token::txt_record`]) and later checked with
//! [`Token::verify`]. The published value is derived from the creation time,
//! the domain and a random nonce:
//!
//! ```text
//! base64(sha512("<created unix seconds><domain><nonce>"))
//! ```
//!
//! prefixed with `<key>=` when the token carries a key label.
//!
//! `validated` and `updated` belong to the caller. Verification reads them
//! but never writes them; callers persist them after a successful check so
//! that expiration-after-validation and the 24 hour throttle take effect.

use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use chrono::{DateTime, TimeDelta, Utc};
use rand::TryRngCore;
use rand::rngs::OsRng;
use ring::digest;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;
use std::time::Duration;
use tracing::{debug, trace};

use crate::context::Context;
use crate::domain::normalize_host;
use crate::error::{Result, VerifyError};
use crate::resolver::TxtResolver;

/// Longest key label accepted, in bytes. `key=` plus the hash fills a 255 byte TXT string.
pub const MAX_KEY_LEN: usize = 166;

/// Length of the base64 encoded SHA-512 digest, padding included.
pub const HASH_LEN: usize = 88;

/// Lifetime of a token when no expiration is given (7 days).
pub const DEFAULT_EXPIRATION: Duration = Duration::from_secs(168 * 60 * 60);

/// A verification that succeeded within this window is not repeated.
pub const THROTTLE_WINDOW: Duration = Duration::from_secs(24 * 60 * 60);

/// Current version of the persisted token layout.
pub const SCHEMA_VERSION: u32 = 1;

/// Exclusive upper bound for nonces, 2^63 - 1.
const NONCE_BOUND: u64 = i64::MAX as u64;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(into = "TokenSchema", try_from = "TokenSchema")]
pub struct Token {
    domain: String,
    key: String,
    nonce: i64,
    created: DateTime<Utc>,

    /// Instant after which an unvalidated token is dead
    pub validate_by: DateTime<Utc>,

    /// Last successful verification, recorded by the caller
    pub validated: Option<DateTime<Utc>>,

    /// Last verification attempt, recorded by the caller
    pub updated: Option<DateTime<Utc>>,

    hash: OnceLock<String>,
}

impl Token {
    /// Issue a token for `domain_or_url`.
    ///
    /// The input may be a bare host, a URL or a host with a port; only the
    /// host is kept. `key` is an optional label (empty for none).
    pub fn new(domain_or_url: &str, key: &str, expiration: Option<Duration>) -> Result<Self> {
        let key = key.trim();
        if key.len() > MAX_KEY_LEN {
            return Err(VerifyError::InvalidInput(format!(
                "key is too long; limit is {} characters",
                MAX_KEY_LEN
            )));
        }

        let domain = normalize_host(domain_or_url)?;
        Self::from_parts(domain, key.to_string(), 0, Utc::now(), Utc::now()).regenerate(expiration)
    }

    /// Build a token from already known values, e.g. when loading one from storage.
    ///
    /// No normalization or validation is applied.
    pub fn from_parts(
        domain: String,
        key: String,
        nonce: i64,
        created: DateTime<Utc>,
        validate_by: DateTime<Utc>,
    ) -> Self {
        Self {
            domain,
            key,
            nonce,
            created,
            validate_by,
            validated: None,
            updated: None,
            hash: OnceLock::new(),
        }
    }

    /// A fresh token for the same domain and key, with a new nonce and validity window.
    pub fn regenerate(&self, expiration: Option<Duration>) -> Result<Self> {
        self.regenerate_with_rng(expiration, &mut OsRng)
    }

    /// Like [`Token::regenerate`], drawing the nonce from `rng`.
    ///
    /// `rng` must be a cryptographically secure source.
    pub fn regenerate_with_rng<R: TryRngCore>(
        &self,
        expiration: Option<Duration>,
        rng: &mut R,
    ) -> Result<Self> {
        let expiration = expiration.unwrap_or(DEFAULT_EXPIRATION);
        if expiration.is_zero() {
            return Err(VerifyError::InvalidInput(
                "expiration must be greater than 0".to_string(),
            ));
        }
        let lifetime = TimeDelta::from_std(expiration)
            .map_err(|e| VerifyError::InvalidInput(format!("invalid expiration: {}", e)))?;

        let nonce = random_nonce(rng)?;
        let created = Utc::now();
        let validate_by = created
            .checked_add_signed(lifetime)
            .ok_or_else(|| VerifyError::InvalidInput("expiration out of range".to_string()))?;

        debug!(
            "Issued verification token for {} valid until {}",
            self.domain, validate_by
        );

        Ok(Self::from_parts(
            self.domain.clone(),
            self.key.clone(),
            nonce,
            created,
            validate_by,
        ))
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn nonce(&self) -> i64 {
        self.nonce
    }

    pub fn created(&self) -> DateTime<Utc> {
        self.created
    }

    /// Base64 SHA-512 over the creation time, domain and nonce. Computed once.
    pub fn hash(&self) -> &str {
        self.hash.get_or_init(|| {
            let data = format!("{}{}{}", self.created.timestamp(), self.domain, self.nonce);
            let sum = digest::digest(&digest::SHA512, data.as_bytes());
            BASE64.encode(sum.as_ref())
        })
    }

    /// The exact value the domain owner publishes as a TXT record.
    pub fn txt_record(&self) -> String {
        self.to_string()
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self.validated {
            None => now > self.validate_by,
            Some(validated) => validated > self.validate_by,
        }
    }

    /// True when a success recorded in `updated` is recent enough to skip DNS.
    pub fn is_throttled_at(&self, now: DateTime<Utc>) -> bool {
        match self.updated {
            Some(updated) => updated > now - throttle_window(),
            None => false,
        }
    }

    /// Record a successful verification at `now`.
    ///
    /// Callers invoke this after [`Token::verify`] succeeds; verification
    /// itself never does.
    pub fn record_success(&mut self, now: DateTime<Utc>) {
        self.validated = Some(now);
        self.updated = Some(now);
    }

    /// Check that the token is published in the domain's TXT records.
    pub async fn verify<R>(&self, ctx: &Context, resolver: &R) -> Result<()>
    where
        R: TxtResolver + ?Sized,
    {
        self.verify_at(ctx, resolver, Utc::now()).await
    }

    /// [`Token::verify`] evaluated at the given clock reading.
    pub async fn verify_at<R>(&self, ctx: &Context, resolver: &R, now: DateTime<Utc>) -> Result<()>
    where
        R: TxtResolver + ?Sized,
    {
        if self.is_expired_at(now) {
            return Err(VerifyError::TokenExpired);
        }

        if self.is_throttled_at(now) {
            debug!("Skipping lookup for {}; verified within the last 24h", self.domain);
            return Ok(());
        }

        let hash_len = self.hash().len();
        if hash_len != HASH_LEN {
            return Err(VerifyError::InvalidHash(hash_len));
        }

        let records = resolver
            .lookup_txt(ctx, &self.domain)
            .await
            .map_err(|e| ctx.err().unwrap_or(VerifyError::Resolver(e)))?;
        trace!("Comparing {} TXT records for {}", records.len(), self.domain);

        let expected = self.txt_record();
        for record in &records {
            if let Some(err) = ctx.err() {
                return Err(err);
            }

            // Several records may carry the same value; the first match wins
            if record.trim() == expected {
                debug!("Verification token found for {}", self.domain);
                return Ok(());
            }
        }

        Err(VerifyError::TokenNotFound(self.domain.clone()))
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let schema: TokenSchema = serde_json::from_str(json)?;
        Token::try_from(schema)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.key.is_empty() {
            write!(f, "{}", self.hash())
        } else {
            write!(f, "{}={}", self.key, self.hash())
        }
    }
}

// The cached hash is derived from the other fields and takes no part in equality.
impl PartialEq for Token {
    fn eq(&self, other: &Self) -> bool {
        self.domain == other.domain
            && self.key == other.key
            && self.nonce == other.nonce
            && self.created == other.created
            && self.validate_by == other.validate_by
            && self.validated == other.validated
            && self.updated == other.updated
    }
}

impl Eq for Token {}

fn throttle_window() -> TimeDelta {
    TimeDelta::seconds(THROTTLE_WINDOW.as_secs() as i64)
}

/// Uniform draw from [0, 2^63 - 1) by rejection sampling.
fn random_nonce<R: TryRngCore>(rng: &mut R) -> Result<i64> {
    loop {
        let candidate = rng
            .try_next_u64()
            .map_err(|e| VerifyError::EntropySource(e.to_string()))?
            >> 1;
        if candidate < NONCE_BOUND {
            return Ok(candidate as i64);
        }
    }
}

/// Persisted token layout. The hash is never stored.
#[derive(Debug, Serialize, Deserialize)]
struct TokenSchema {
    schema_version: u32,
    domain: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    key: String,
    nonce: i64,
    created: DateTime<Utc>,
    validate_by: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    validated: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    updated: Option<DateTime<Utc>>,
}

impl From<Token> for TokenSchema {
    fn from(token: Token) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            domain: token.domain,
            key: token.key,
            nonce: token.nonce,
            created: token.created,
            validate_by: token.validate_by,
            validated: token.validated,
            updated: token.updated,
        }
    }
}

impl TryFrom<TokenSchema> for Token {
    type Error = VerifyError;

    fn try_from(schema: TokenSchema) -> Result<Self> {
        if schema.schema_version != SCHEMA_VERSION {
            return Err(VerifyError::UnsupportedSchemaVersion(schema.schema_version));
        }
        if schema.domain.is_empty() {
            return Err(VerifyError::Schema("domain is required".to_string()));
        }

        let mut token = Token::from_parts(
            schema.domain,
            schema.key,
            schema.nonce,
            schema.created,
            schema.validate_by,
        );
        token.validated = schema.validated;
        token.updated = schema.updated;
        Ok(token)
    }
}
