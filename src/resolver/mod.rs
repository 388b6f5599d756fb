pub mod system;

pub use system::SystemTxtResolver;

use async_trait::async_trait;
use std::collections::HashMap;
use tracing::trace;

use crate::context::Context;
use crate::error::BoxError;

/// Resolves a domain name to the values of its TXT records.
///
/// An empty list is a valid answer meaning "no records". Implementations
/// should honor `ctx` and give up once it is cancelled or past its deadline.
#[async_trait]
pub trait TxtResolver: Send + Sync {
    async fn lookup_txt(&self, ctx: &Context, name: &str) -> Result<Vec<String>, BoxError>;
}

#[async_trait]
impl<T: TxtResolver + ?Sized> TxtResolver for std::sync::Arc<T> {
    async fn lookup_txt(&self, ctx: &Context, name: &str) -> Result<Vec<String>, BoxError> {
        (**self).lookup_txt(ctx, name).await
    }
}

/// In-memory resolver answering from a fixed table of TXT records.
///
/// Unknown names resolve to no records rather than an error.
#[derive(Debug, Clone, Default)]
pub struct StaticTxtResolver {
    records: HashMap<String, Vec<String>>,
}

impl StaticTxtResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records<I, S>(mut self, name: &str, records: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.insert(name, records);
        self
    }

    pub fn insert<I, S>(&mut self, name: &str, records: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.records
            .entry(name.to_string())
            .or_default()
            .extend(records.into_iter().map(Into::into));
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl TxtResolver for StaticTxtResolver {
    async fn lookup_txt(&self, ctx: &Context, name: &str) -> Result<Vec<String>, BoxError> {
        if let Some(err) = ctx.err() {
            return Err(Box::new(err));
        }
        let records = self.records.get(name).cloned().unwrap_or_default();
        trace!("Static lookup for {} returned {} records", name, records.len());
        Ok(records)
    }
}
