//! Logging facilities for the exhibit core.
//!
//! The exhibit uses the `tracing` crate for instrumentation. To see logs,
//! install a subscriber in the application:
//!
//! ```ignore
//! tracing_subscriber::fmt()
//!     .with_env_filter("exhibit_core::coordinator=debug")
//!     .init();
//! ```
//!
//! Every event emitted by this crate carries one of the [`targets`] below, so
//! individual subsystems can be filtered with `RUST_LOG` directives.

/// Target names for log filtering.
pub mod targets {
    /// Observable cell notifications.
    pub const CELL: &str = "exhibit_core::cell";
    /// Signal emission.
    pub const SIGNAL: &str = "exhibit_core::signal";
    /// Cancellation tokens.
    pub const CANCEL: &str = "exhibit_core::cancel";
    /// TTL cache lookups and writes.
    pub const CACHE: &str = "exhibit_core::cache";
    /// Catalog loading.
    pub const CATALOG: &str = "exhibit_core::catalog";
    /// Fetch coordinator state machine.
    pub const COORDINATOR: &str = "exhibit_core::coordinator";
    /// Power toggle state.
    pub const POWER: &str = "exhibit_core::power";
}
