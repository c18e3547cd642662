//! Core state and fetch coordination for the exhibit.
//!
//! This crate provides the engine-independent pieces of the exhibit
//! application:
//!
//! - **Observable cells**: single values that broadcast every change
//! - **Signals**: payload-carrying in-process events (the toggle input)
//! - **Cancellation**: cooperative tokens with parent/child linking
//! - **TTL cache**: freshness-checked storage of fetched display text
//! - **Selection catalog**: the configured list of cities
//! - **Fetch coordinator**: one selection at a time, cached, cancellable
//! - **Power state**: the toggle-driven power flag
//!
//! # Observable Cell Example
//!
//! ```
//! use exhibit_core::ObservableCell;
//!
//! let busy = ObservableCell::new(false);
//!
//! // Subscribing replays the current value immediately.
//! let subscription = busy.subscribe_scoped(|busy| {
//!     println!("buttons enabled: {}", !busy);
//! });
//!
//! busy.set(true);
//! subscription.dispose();
//! ```
//!
//! # Coordinator Example
//!
//! ```ignore
//! use exhibit_core::{CancellationToken, FetchCoordinator, SelectionEntity};
//!
//! let coordinator = FetchCoordinator::new(fetcher, 3600);
//! let _text = coordinator.display_text().subscribe_scoped(|text| println!("{text}"));
//!
//! let lifetime = CancellationToken::new();
//! let tokyo = SelectionEntity::new("tokyo", "Tokyo", 35.68, 139.76);
//! coordinator.select(&tokyo, &lifetime).await;
//! ```

pub mod cache;
pub mod cancel;
pub mod catalog;
pub mod cell;
pub mod coordinator;
mod error;
pub mod fetch;
pub mod logging;
pub mod power;
pub mod signal;

pub use cache::{Clock, ManualClock, SystemClock, TtlCache, DEFAULT_TTL_SECONDS};
pub use cancel::CancellationToken;
pub use catalog::{CityConfig, SelectionCatalog, SelectionEntity, WeatherConfig};
pub use cell::{ObservableCell, ReadOnlyCell, Subscription, SubscriptionId};
pub use coordinator::{FetchCoordinator, SelectOutcome};
pub use error::{ConfigError, FetchError, Result};
pub use fetch::{Forecast, RemoteFetcher, TimeSeries};
pub use power::PowerState;
pub use signal::{ConnectionGuard, ConnectionId, Signal};
