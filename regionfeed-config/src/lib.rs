//! Configuration loading for regionfeed.
//!
//! Settings come from the environment (optionally seeded from a `.env` file),
//! a `regionfeed.toml` file, and built-in defaults, in that order of
//! precedence. Loading validates the result and returns non-fatal findings as
//! [`ConfigWarnings`].

pub mod loader;
pub mod models;
pub mod sources;
pub mod util;
pub mod validation;

pub use loader::{
    ConfigLoad, ConfigLoadError, ConfigLoader, ConfigLoaderOptions,
};
pub use models::{
    CacheConfig, Config, ConfigMetadata, DatabaseConfig, ProviderConfig,
    SlackConfig,
};
pub use sources::EnvConfig;
pub use util::{mask_token, mask_url};
pub use validation::{ConfigGuardRailError, ConfigWarning, ConfigWarnings};
