//! Networking for the weather exhibit.
//!
//! This crate supplies the production [`RemoteFetcher`](exhibit_core::RemoteFetcher):
//!
//! - [`http`]: a small async HTTP client over `reqwest`.
//! - [`OpenMeteoFetcher`]: requests the hourly temperature forecast for a
//!   selection and decodes it into an [`exhibit_core::Forecast`].
//!
//! # Example
//!
//! ```ignore
//! use exhibit_core::{FetchCoordinator, WeatherConfig};
//! use exhibit_net::OpenMeteoFetcher;
//!
//! let config = WeatherConfig::from_path("exhibit.toml")?;
//! let fetcher = OpenMeteoFetcher::from_config(&config)?;
//! let coordinator = FetchCoordinator::from_config(fetcher, &config);
//! ```

mod error;
pub mod http;
pub mod logging;
mod weather;

pub use error::{NetworkError, Result};
pub use weather::OpenMeteoFetcher;
