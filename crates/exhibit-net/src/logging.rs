//! Log targets for the networking crate.

/// Target names for log filtering.
pub mod targets {
    /// Raw HTTP traffic.
    pub const HTTP: &str = "exhibit_net::http";
    /// Forecast fetching.
    pub const WEATHER: &str = "exhibit_net::weather";
}
