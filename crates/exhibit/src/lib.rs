//! Weather exhibit.
//!
//! This is the umbrella crate: it re-exports the reactive core and the
//! networking crate, and provides [`Exhibit`], which wires a configuration
//! file into a running catalog, fetch coordinator and power toggle.
//!
//! # Example
//!
//! ```no_run
//! use exhibit::{Exhibit, WeatherConfig};
//!
//! # async fn run() -> Result<(), exhibit::ExhibitError> {
//! let config = WeatherConfig::from_path("exhibit.toml")?;
//! let exhibit = Exhibit::from_config(&config)?;
//!
//! exhibit.display_text().subscribe(|text| println!("{text}"));
//! exhibit.select_key("tokyo").await?;
//! # Ok(())
//! # }
//! ```

mod app;
mod error;
pub mod prelude;

pub use app::Exhibit;
pub use error::ExhibitError;
pub use exhibit_core::*;

/// HTTP plumbing and the Open-Meteo fetcher.
pub mod net {
    pub use exhibit_net::*;
}
