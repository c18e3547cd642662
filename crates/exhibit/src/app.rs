//! The exhibit composition root.

use std::sync::Arc;

use exhibit_core::{
    CancellationToken, ConnectionGuard, FetchCoordinator, PowerState, ReadOnlyCell, RemoteFetcher,
    SelectOutcome, SelectionCatalog, SelectionEntity, Signal, WeatherConfig,
};
use exhibit_net::OpenMeteoFetcher;

use crate::error::ExhibitError;

/// A fully wired exhibit.
///
/// Owns the selection catalog, the fetch coordinator, and the power state.
/// The power state listens to [`toggle_requested`](Self::toggle_requested)
/// for as long as the exhibit lives. Every selection issued through the
/// exhibit is linked to its lifetime token, so [`shutdown`](Self::shutdown)
/// cancels whatever is in flight.
pub struct Exhibit<F: RemoteFetcher = OpenMeteoFetcher> {
    catalog: SelectionCatalog,
    coordinator: FetchCoordinator<F>,
    power: Arc<PowerState>,
    toggle_requested: Signal<()>,
    _toggle_binding: ConnectionGuard<()>,
    lifetime: CancellationToken,
}

impl Exhibit<OpenMeteoFetcher> {
    /// Build an exhibit that fetches from Open-Meteo.
    pub fn from_config(config: &WeatherConfig) -> Result<Self, ExhibitError> {
        let fetcher = OpenMeteoFetcher::from_config(config)?;
        Self::with_fetcher(config, fetcher)
    }
}

impl<F: RemoteFetcher> Exhibit<F> {
    /// Build an exhibit around an arbitrary fetcher.
    pub fn with_fetcher(config: &WeatherConfig, fetcher: F) -> Result<Self, ExhibitError> {
        let catalog = SelectionCatalog::load(config)?;
        let coordinator = FetchCoordinator::from_config(fetcher, config);

        let power = Arc::new(PowerState::new());
        let toggle_requested = Signal::new();
        let toggle_binding = power.bind_toggle(&toggle_requested);

        tracing::info!(
            target: "exhibit",
            selections = catalog.len(),
            cache_ttl_seconds = coordinator.cache_ttl_seconds(),
            "exhibit ready"
        );

        Ok(Self {
            catalog,
            coordinator,
            power,
            toggle_requested,
            _toggle_binding: toggle_binding,
            lifetime: CancellationToken::new(),
        })
    }

    /// The selectable locations.
    pub fn catalog(&self) -> &SelectionCatalog {
        &self.catalog
    }

    /// The fetch coordinator.
    pub fn coordinator(&self) -> &FetchCoordinator<F> {
        &self.coordinator
    }

    /// The power state.
    pub fn power(&self) -> &Arc<PowerState> {
        &self.power
    }

    /// The toggle input. Each emission flips the power state once.
    pub fn toggle_requested(&self) -> &Signal<()> {
        &self.toggle_requested
    }

    /// The display text cell.
    pub fn display_text(&self) -> ReadOnlyCell<String> {
        self.coordinator.display_text()
    }

    /// The busy cell.
    pub fn busy(&self) -> ReadOnlyCell<bool> {
        self.coordinator.busy()
    }

    /// Select a catalog entry.
    pub async fn select(&self, entity: &SelectionEntity) -> SelectOutcome {
        let token = self.lifetime.child_token();
        self.coordinator.select(entity, &token).await
    }

    /// Select a catalog entry by key.
    pub async fn select_key(&self, key: &str) -> Result<SelectOutcome, ExhibitError> {
        let entity = self
            .catalog
            .get(key)
            .ok_or_else(|| ExhibitError::UnknownSelection(key.to_string()))?;
        Ok(self.select(entity).await)
    }

    /// Emit one toggle request.
    pub fn request_toggle(&self) {
        self.toggle_requested.emit(());
    }

    /// Cancel in-flight work and drop every observer.
    pub fn shutdown(&self) {
        self.lifetime.cancel();
        self.coordinator.shutdown();
        self.power.dispose();
        self.toggle_requested.disconnect_all();
    }
}

impl<F: RemoteFetcher> std::fmt::Debug for Exhibit<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Exhibit")
            .field("selections", &self.catalog.len())
            .field("busy", &self.coordinator.is_busy())
            .field("power_on", &self.power.is_on())
            .finish()
    }
}
