//! Commonly used types.
//!
//! ```ignore
//! use exhibit::prelude::*;
//! ```

pub use crate::{Exhibit, ExhibitError};

pub use exhibit_core::{
    CancellationToken, FetchCoordinator, ObservableCell, PowerState, ReadOnlyCell, SelectOutcome,
    SelectionCatalog, SelectionEntity, Signal, WeatherConfig,
};

pub use exhibit_net::OpenMeteoFetcher;
