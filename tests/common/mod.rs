//! Common test utilities for txtproof integration tests
//!
//! Random domain and TXT record generators plus resolver doubles.

#![allow(dead_code)] // These functions are used by various test files

use async_trait::async_trait;
use rand::Rng;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use txtproof::error::BoxError;
use txtproof::{Context, Token, TxtResolver};

/// Combination of space, tab and newline characters
pub const WHITESPACES: &str = "\n  \t\t\t\t  \n\t\t\t \n\t\t\t";

/// A generated token with the TXT records its domain serves
pub struct TestToken {
    pub token: Token,
    pub records: Vec<String>,
    pub has_token: bool,
}

/// A generated domain input and the host it should normalize to
pub struct RandomUrl {
    pub input: String,
    pub host: String,
}

pub fn silly_name(rng: &mut impl Rng) -> String {
    let len = rng.random_range(4..10);
    (0..len)
        .map(|_| char::from(rng.random_range(b'a'..=b'z')))
        .collect()
}

/// Random domain inputs mixing schemes, subdomains, ports and whitespace
pub fn random_urls(count: usize) -> Vec<RandomUrl> {
    let mut rng = rand::rng();
    let proto_mod = rng.random_range(1..=10);
    let sub_mod = rng.random_range(1..=10);
    let port_mod = rng.random_range(1..=10);
    let pre_space_mod = rng.random_range(1..=10);
    let post_space_mod = rng.random_range(1..=10);

    (0..count)
        .map(|i| {
            let proto = if i % proto_mod == 0 {
                format!("x{}://", &silly_name(&mut rng)[..4])
            } else {
                String::new()
            };
            let subdomain = if i % sub_mod == 0 {
                format!("{}.", silly_name(&mut rng))
            } else {
                String::new()
            };
            let port = if i % port_mod == 0 {
                format!(":{}", rng.random_range(1..65535))
            } else {
                String::new()
            };
            let pre = if i % pre_space_mod == 0 { WHITESPACES } else { "" };
            let post = if i % post_space_mod == 0 { WHITESPACES } else { "" };

            let tld = &silly_name(&mut rng)[..3];
            let host = format!("{}{}.{}", subdomain, silly_name(&mut rng), tld);
            RandomUrl {
                input: format!("{}{}{}{}{}", pre, proto, host, port, post),
                host,
            }
        })
        .collect()
}

/// `count` random TXT values; `insert` is placed at a random index in
/// `0..2 * count`, so it is present about half of the time.
pub fn random_txt(count: usize, insert: &str) -> (Vec<String>, bool) {
    let mut rng = rand::rng();
    let insert_at = rng.random_range(0..2 * count.max(1));
    let pre_space_mod = rng.random_range(1..=10);
    let post_space_mod = rng.random_range(1..=10);

    let mut records = Vec::with_capacity(count);
    let mut has_record = false;
    for i in 0..count {
        let pre = if i % pre_space_mod == 0 { WHITESPACES } else { "" };
        let post = if i % post_space_mod == 0 { WHITESPACES } else { "" };

        if i == insert_at {
            records.push(format!("{}{}{}", pre, insert, post));
            has_record = true;
            continue;
        }
        records.push(format!("{}{}{}", pre, silly_name(&mut rng), post));
    }

    (records, has_record)
}

/// Tokens for random domains, each with its own random TXT record set
pub fn test_tokens(key: &str, count: usize, records_per_domain: usize) -> Vec<TestToken> {
    random_urls(count)
        .into_iter()
        .map(|url| {
            let token = Token::new(&url.input, key, None).expect("random url should be valid");
            assert_eq!(token.domain(), url.host, "input {:?}", url.input);
            let (records, has_token) = random_txt(records_per_domain, &token.txt_record());
            TestToken {
                token,
                records,
                has_token,
            }
        })
        .collect()
}

/// Fails the test if a lookup happens
pub struct PanickingResolver;

#[async_trait]
impl TxtResolver for PanickingResolver {
    async fn lookup_txt(&self, _ctx: &Context, name: &str) -> Result<Vec<String>, BoxError> {
        panic!("resolver must not be called (lookup for {})", name);
    }
}

/// Serves fixed records and counts lookups
pub struct CountingResolver {
    pub records: Vec<String>,
    pub calls: AtomicUsize,
}

impl CountingResolver {
    pub fn new<S: Into<String>>(records: impl IntoIterator<Item = S>) -> Self {
        Self {
            records: records.into_iter().map(Into::into).collect(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TxtResolver for CountingResolver {
    async fn lookup_txt(&self, _ctx: &Context, _name: &str) -> Result<Vec<String>, BoxError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.records.clone())
    }
}

/// Always fails with an IO error
pub struct FailingResolver;

#[async_trait]
impl TxtResolver for FailingResolver {
    async fn lookup_txt(&self, _ctx: &Context, _name: &str) -> Result<Vec<String>, BoxError> {
        Err(Box::new(io::Error::new(
            io::ErrorKind::ConnectionRefused,
            "nameserver unreachable",
        )))
    }
}

/// Returns its records but cancels the context first, as if the caller
/// gave up while the answer was in flight
pub struct CancellingResolver {
    pub records: Vec<String>,
}

#[async_trait]
impl TxtResolver for CancellingResolver {
    async fn lookup_txt(&self, ctx: &Context, _name: &str) -> Result<Vec<String>, BoxError> {
        ctx.cancel();
        Ok(self.records.clone())
    }
}

/// Cancels the context mid-lookup and reports the interrupted query
pub struct AbortingResolver;

#[async_trait]
impl TxtResolver for AbortingResolver {
    async fn lookup_txt(&self, ctx: &Context, _name: &str) -> Result<Vec<String>, BoxError> {
        ctx.cancel();
        Err(Box::new(io::Error::new(
            io::ErrorKind::Interrupted,
            "lookup interrupted",
        )))
    }
}

/// Never answers; waits for the context to finish and then times out
pub struct StallingResolver;

#[async_trait]
impl TxtResolver for StallingResolver {
    async fn lookup_txt(&self, ctx: &Context, _name: &str) -> Result<Vec<String>, BoxError> {
        ctx.done().await;
        Err(Box::new(io::Error::new(
            io::ErrorKind::TimedOut,
            "no answer before deadline",
        )))
    }
}
