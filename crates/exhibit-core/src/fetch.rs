//! The remote fetch boundary.
//!
//! [`RemoteFetcher`] is implemented by whatever performs the actual network
//! call; `exhibit-net` provides the HTTP implementation against Open-Meteo.
//! The core only needs the timezone and the first element of each hourly
//! series.

use std::future::Future;

use crate::cancel::CancellationToken;
use crate::catalog::SelectionEntity;
use crate::error::FetchError;

/// Hourly forecast series: parallel label (timestamp) and value arrays.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimeSeries {
    /// Timestamps as reported by the API, e.g. `2024-01-01T00:00`.
    pub labels: Vec<String>,
    /// Temperatures in degrees Celsius.
    pub values: Vec<f64>,
}

impl TimeSeries {
    /// The first (label, value) pair, or `None` if either series is empty.
    pub fn first(&self) -> Option<(&str, f64)> {
        let label = self.labels.first()?;
        let value = self.values.first()?;
        Some((label.as_str(), *value))
    }
}

/// The decoded payload of a successful fetch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Forecast {
    /// IANA timezone of the location.
    pub timezone: String,
    /// Hourly temperature series.
    pub time_series: TimeSeries,
}

/// Performs the network call for one selection.
///
/// Implementations must observe `token` cooperatively: return
/// [`FetchError::Cancelled`] as soon as they notice cancellation, and never
/// touch shared state themselves.
pub trait RemoteFetcher: Send + Sync {
    /// Fetch the forecast for `entity`.
    fn fetch(
        &self,
        entity: &SelectionEntity,
        token: &CancellationToken,
    ) -> impl Future<Output = Result<Forecast, FetchError>> + Send;
}

impl<F: RemoteFetcher> RemoteFetcher for std::sync::Arc<F> {
    fn fetch(
        &self,
        entity: &SelectionEntity,
        token: &CancellationToken,
    ) -> impl Future<Output = Result<Forecast, FetchError>> + Send {
        (**self).fetch(entity, token)
    }
}
