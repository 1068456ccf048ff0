//! Provider fetch port and the registry the orchestrator runs over.

mod http;

pub use http::HttpJsonProvider;

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    error::{FetchError, RegionsError, Result},
    types::Regions,
};

/// One provider's region lookup. Implementations may be slow and may fail;
/// they must not touch orchestrator state.
#[async_trait]
pub trait RegionProvider: Send + Sync {
    async fn fetch(&self) -> std::result::Result<Regions, FetchError>;
}

/// Adapter turning an async closure into a [`RegionProvider`].
pub struct FnProvider<F> {
    f: F,
}

impl<F> fmt::Debug for FnProvider<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnProvider").finish_non_exhaustive()
    }
}

/// Wrap `f` so each fetch awaits a fresh future from it.
pub fn provider_fn<F, Fut>(f: F) -> FnProvider<F>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = std::result::Result<Regions, FetchError>>
        + Send
        + 'static,
{
    FnProvider { f }
}

#[async_trait]
impl<F, Fut> RegionProvider for FnProvider<F>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = std::result::Result<Regions, FetchError>>
        + Send
        + 'static,
{
    async fn fetch(&self) -> std::result::Result<Regions, FetchError> {
        (self.f)().await
    }
}

/// A provider with the name it reports under.
#[derive(Clone)]
pub struct RegisteredProvider {
    pub name: String,
    pub provider: Arc<dyn RegionProvider>,
}

impl fmt::Debug for RegisteredProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredProvider")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Ordered set of uniquely named providers.
#[derive(Clone, Debug, Default)]
pub struct ProviderRegistry {
    providers: Vec<RegisteredProvider>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a provider. Names must be non-empty and unique, since the report
    /// is keyed by them.
    pub fn register<S, P>(&mut self, name: S, provider: P) -> Result<()>
    where
        S: Into<String>,
        P: RegionProvider + 'static,
    {
        self.register_arc(name, Arc::new(provider))
    }

    /// Same as [`register`](Self::register) for an already shared provider.
    pub fn register_arc<S: Into<String>>(
        &mut self,
        name: S,
        provider: Arc<dyn RegionProvider>,
    ) -> Result<()> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(RegionsError::Registry(
                "provider name must not be empty".to_string(),
            ));
        }
        if self.contains(&name) {
            return Err(RegionsError::Registry(format!(
                "provider {name} registered twice"
            )));
        }

        self.providers.push(RegisteredProvider { name, provider });
        Ok(())
    }

    /// Chaining form of [`register`](Self::register).
    pub fn with<S, P>(mut self, name: S, provider: P) -> Result<Self>
    where
        S: Into<String>,
        P: RegionProvider + 'static,
    {
        self.register(name, provider)?;
        Ok(self)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.providers.iter().any(|entry| entry.name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.providers.iter().map(|entry| entry.name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &RegisteredProvider> {
        self.providers.iter()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}
