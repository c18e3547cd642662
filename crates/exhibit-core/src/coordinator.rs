//! Fetch coordinator for the weather panel.
//!
//! The [`FetchCoordinator`] turns "the user picked this city" into updates of
//! two observable cells:
//!
//! - `display_text` (initially `"Ready"`): loading message, forecast summary
//!   or error text.
//! - `busy` (initially `false`): `true` while a fetch from this coordinator is
//!   in flight; UIs use it to disable the selection buttons.
//!
//! # State machine
//!
//! ```text
//!  Idle ──select──▶ Loading ──success / error──▶ Idle
//!                      │
//!                      └──cancelled (external or superseded)──▶ Cancelled
//! ```
//!
//! Fresh cache hits never leave `Idle`: they set the display text and return
//! without touching `busy`, unless they supersede an in-flight request, in
//! which case they also release `busy`. A caller whose token is already
//! cancelled changes nothing.
//!
//! # Cancellation and supersession
//!
//! Each fetch gets its own [`CancellationToken`], created as a child of the
//! caller's token so that tearing down the caller also cancels the request.
//! The token is checked before the fetch is dispatched and again after it
//! returns; a cancelled fetch is discarded without touching the display text
//! or the cache, even if its response arrived in full.
//!
//! [`select`](FetchCoordinator::select) refuses to start while the
//! coordinator is busy. [`supersede`](FetchCoordinator::supersede) skips that
//! guard and cancels the in-flight request instead; the superseded call then
//! returns [`SelectOutcome::Superseded`] and leaves all state to the newer one.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures_util::FutureExt;
use parking_lot::Mutex;

use crate::cache::{Clock, SystemClock, TtlCache};
use crate::cancel::CancellationToken;
use crate::catalog::{SelectionEntity, WeatherConfig};
use crate::cell::{ObservableCell, ReadOnlyCell};
use crate::error::FetchError;
use crate::fetch::{Forecast, RemoteFetcher};
use crate::logging::targets;

/// Initial display text.
pub const READY_TEXT: &str = "Ready";

/// Text used in place of the metadata lines when the series are empty.
pub const NO_DATA_TEXT: &str = "No data.";

/// How a single selection ended. Observers only see the cells; this is for
/// the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectOutcome {
    /// The coordinator was busy; nothing happened.
    Rejected,
    /// A fresh cached value was displayed without network I/O.
    CacheHit,
    /// The fetch succeeded and the result was displayed and cached.
    Loaded,
    /// The fetch failed; an error message was displayed.
    Failed,
    /// The request's token was cancelled; the result was discarded.
    Cancelled,
    /// A newer selection replaced this one; the result was discarded.
    Superseded,
}

struct ActiveRequest {
    generation: u64,
    token: CancellationToken,
}

/// Orchestrates one logical selection at a time.
///
/// The coordinator exclusively owns its cache and both cells. Other
/// components observe through [`display_text`](Self::display_text) and
/// [`busy`](Self::busy), which hand out read-only views.
pub struct FetchCoordinator<F> {
    fetcher: F,
    clock: Arc<dyn Clock>,
    cache: Mutex<TtlCache<String, String>>,
    display_text: ObservableCell<String>,
    busy: ObservableCell<bool>,
    active: Mutex<Option<ActiveRequest>>,
    next_generation: AtomicU64,
}

impl<F: RemoteFetcher> FetchCoordinator<F> {
    /// Create a coordinator using the system clock.
    ///
    /// A `cache_ttl_seconds` of zero or less selects the one-hour default.
    pub fn new(fetcher: F, cache_ttl_seconds: i64) -> Self {
        Self::with_clock(fetcher, cache_ttl_seconds, Arc::new(SystemClock))
    }

    /// Create a coordinator configured from a [`WeatherConfig`].
    pub fn from_config(fetcher: F, config: &WeatherConfig) -> Self {
        Self::new(fetcher, config.cache_ttl_seconds)
    }

    /// Create a coordinator reading time from `clock`.
    pub fn with_clock(fetcher: F, cache_ttl_seconds: i64, clock: Arc<dyn Clock>) -> Self {
        Self {
            fetcher,
            clock,
            cache: Mutex::new(TtlCache::new(cache_ttl_seconds)),
            display_text: ObservableCell::new(READY_TEXT.to_string()),
            busy: ObservableCell::new(false),
            active: Mutex::new(None),
            next_generation: AtomicU64::new(0),
        }
    }

    /// The display text cell.
    pub fn display_text(&self) -> ReadOnlyCell<String> {
        self.display_text.read_only()
    }

    /// The busy flag cell.
    pub fn busy(&self) -> ReadOnlyCell<bool> {
        self.busy.read_only()
    }

    /// Check whether a fetch is currently in flight.
    pub fn is_busy(&self) -> bool {
        self.busy.get()
    }

    /// The effective cache TTL.
    pub fn cache_ttl_seconds(&self) -> i64 {
        self.cache.lock().ttl_seconds()
    }

    /// The underlying fetcher.
    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// Select `entity`, unless a fetch from this coordinator is in flight.
    ///
    /// While busy, this is a no-op returning [`SelectOutcome::Rejected`]: no
    /// cancellation happens and no cell is written.
    pub async fn select(
        &self,
        entity: &SelectionEntity,
        external_cancel: &CancellationToken,
    ) -> SelectOutcome {
        self.run(entity, external_cancel, true).await
    }

    /// Select `entity`, cancelling any in-flight fetch first.
    ///
    /// The in-flight call is retired even when `entity` is answered from the
    /// cache.
    pub async fn supersede(
        &self,
        entity: &SelectionEntity,
        external_cancel: &CancellationToken,
    ) -> SelectOutcome {
        self.run(entity, external_cancel, false).await
    }

    /// Cancel the in-flight fetch, if any.
    ///
    /// The pending [`select`](Self::select) settles with
    /// [`SelectOutcome::Cancelled`] and clears `busy`; the display text is
    /// left as it was.
    pub fn cancel(&self) {
        if let Some(active) = self.active.lock().as_ref() {
            tracing::debug!(target: targets::COORDINATOR, generation = active.generation, "cancelling active request");
            active.token.cancel();
        }
    }

    /// Tear down: cancel the in-flight fetch and drop every subscriber.
    pub fn shutdown(&self) {
        self.cancel();
        self.display_text.dispose_all();
        self.busy.dispose_all();
    }

    /// Cancel and forget the active request. Its call then settles as
    /// [`SelectOutcome::Superseded`] and leaves `busy` to the caller.
    fn supersede_active(&self) -> bool {
        let Some(previous) = self.active.lock().take() else {
            return false;
        };
        tracing::debug!(
            target: targets::COORDINATOR,
            superseded = previous.generation,
            "superseding in-flight request"
        );
        previous.token.cancel();
        true
    }

    #[tracing::instrument(
        skip_all,
        target = "exhibit_core::coordinator",
        level = "debug",
        fields(key = %entity.key, guarded = guarded)
    )]
    async fn run(
        &self,
        entity: &SelectionEntity,
        external_cancel: &CancellationToken,
        guarded: bool,
    ) -> SelectOutcome {
        if guarded && self.busy.get() {
            tracing::debug!(target: targets::COORDINATOR, "busy, rejecting selection");
            return SelectOutcome::Rejected;
        }

        if external_cancel.is_cancelled() {
            tracing::debug!(target: targets::COORDINATOR, "caller already cancelled, nothing to do");
            return SelectOutcome::Cancelled;
        }

        // A superseding call owns the panel from here on, cache hit or not.
        let superseded = !guarded && self.supersede_active();

        let now = self.clock.now_unix_seconds();
        let cached = self.cache.lock().try_get(entity.key.as_str(), now);
        if let Some(text) = cached {
            tracing::debug!(target: targets::COORDINATOR, "cache hit");
            self.display_text.set(text);
            if superseded {
                self.busy.set(false);
            }
            return SelectOutcome::CacheHit;
        }

        let token = external_cancel.child_token();
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed) + 1;
        let previous = self.active.lock().replace(ActiveRequest {
            generation,
            token: token.clone(),
        });
        if let Some(previous) = previous {
            tracing::debug!(
                target: targets::COORDINATOR,
                superseded = previous.generation,
                generation,
                "superseding in-flight request"
            );
            previous.token.cancel();
        }

        // From here on every exit path, including this future being dropped,
        // settles through the guard.
        let settle = Settle {
            busy: &self.busy,
            active: &self.active,
            generation,
        };

        self.busy.set(true);
        self.display_text.set(format!("Loading {}...", entity.label));

        if token.is_cancelled() {
            return settle.discard();
        }

        let result = AssertUnwindSafe(self.fetcher.fetch(entity, &token))
            .catch_unwind()
            .await;

        if token.is_cancelled() {
            return settle.discard();
        }

        match result {
            Ok(Ok(forecast)) => {
                let text = build_display_text(&entity.label, &forecast);
                let fetched_at = self.clock.now_unix_seconds();
                self.cache
                    .lock()
                    .put(entity.key.clone(), text.clone(), fetched_at);
                tracing::debug!(target: targets::COORDINATOR, "fetch succeeded");
                self.display_text.set(text);
                SelectOutcome::Loaded
            }
            Ok(Err(FetchError::Cancelled)) => settle.discard(),
            Ok(Err(FetchError::Transport(reason))) => {
                tracing::warn!(target: targets::COORDINATOR, %reason, "fetch failed");
                self.display_text.set(format!("API Error: {reason}"));
                SelectOutcome::Failed
            }
            Ok(Err(FetchError::Malformed(reason))) => {
                tracing::error!(target: targets::COORDINATOR, %reason, "unexpected fetch failure");
                self.display_text.set(unexpected_error_text(&entity.label));
                SelectOutcome::Failed
            }
            Err(panic) => {
                tracing::error!(
                    target: targets::COORDINATOR,
                    reason = panic_message(panic.as_ref()),
                    "fetcher panicked"
                );
                self.display_text.set(unexpected_error_text(&entity.label));
                SelectOutcome::Failed
            }
        }
    }
}

impl<F> std::fmt::Debug for FetchCoordinator<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchCoordinator")
            .field("busy", &self.busy.get())
            .field("display_text", &self.display_text.get())
            .field("cached", &self.cache.lock().len())
            .finish()
    }
}

/// Clears `busy` and the active request when a selection settles, but only if
/// the active request is still this one.
struct Settle<'a> {
    busy: &'a ObservableCell<bool>,
    active: &'a Mutex<Option<ActiveRequest>>,
    generation: u64,
}

impl Settle<'_> {
    fn is_current(&self) -> bool {
        self.active
            .lock()
            .as_ref()
            .is_some_and(|active| active.generation == self.generation)
    }

    fn discard(self) -> SelectOutcome {
        if self.is_current() {
            tracing::debug!(target: targets::COORDINATOR, "request cancelled, result discarded");
            SelectOutcome::Cancelled
        } else {
            tracing::debug!(target: targets::COORDINATOR, "request superseded, result discarded");
            SelectOutcome::Superseded
        }
    }
}

impl Drop for Settle<'_> {
    fn drop(&mut self) {
        let released = {
            let mut active = self.active.lock();
            if active
                .as_ref()
                .is_some_and(|active| active.generation == self.generation)
            {
                *active = None;
                true
            } else {
                false
            }
        };
        if released {
            self.busy.set(false);
        }
    }
}

/// Build the panel text for a successful fetch.
///
/// ```
/// use exhibit_core::coordinator::build_display_text;
/// use exhibit_core::{Forecast, TimeSeries};
///
/// let forecast = Forecast {
///     timezone: "Asia/Tokyo".to_string(),
///     time_series: TimeSeries {
///         labels: vec!["2024-01-01T00:00".to_string()],
///         values: vec![5.0],
///     },
/// };
/// assert_eq!(
///     build_display_text("Tokyo", &forecast),
///     "Tokyo\nTimezone: Asia/Tokyo\nTime: 2024-01-01T00:00\nTemp: 5 °C"
/// );
/// ```
pub fn build_display_text(label: &str, forecast: &Forecast) -> String {
    match forecast.time_series.first() {
        Some((time, temp)) => format!(
            "{label}\nTimezone: {}\nTime: {time}\nTemp: {temp} °C",
            forecast.timezone
        ),
        None => format!("{label}\n{NO_DATA_TEXT}"),
    }
}

fn unexpected_error_text(label: &str) -> String {
    format!("Unexpected error while loading {label}.")
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "unknown panic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ManualClock;
    use crate::fetch::TimeSeries;
    use std::collections::HashMap;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;
    use tokio::sync::oneshot;

    type FetchResult = Result<Forecast, FetchError>;

    fn tokyo() -> SelectionEntity {
        SelectionEntity::new("tokyo", "Tokyo", 35.68, 139.76)
    }

    fn london() -> SelectionEntity {
        SelectionEntity::new("london", "London", 51.51, -0.13)
    }

    fn forecast(timezone: &str, time: &str, temp: f64) -> Forecast {
        Forecast {
            timezone: timezone.to_string(),
            time_series: TimeSeries {
                labels: vec![time.to_string()],
                values: vec![temp],
            },
        }
    }

    /// Answers every request immediately with the same result.
    struct StaticFetcher {
        result: FetchResult,
        calls: AtomicUsize,
    }

    impl StaticFetcher {
        fn new(result: FetchResult) -> Self {
            Self {
                result,
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl RemoteFetcher for StaticFetcher {
        async fn fetch(&self, _entity: &SelectionEntity, _token: &CancellationToken) -> FetchResult {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.result.clone()
        }
    }

    /// Holds each request open until the test answers it.
    #[derive(Default)]
    struct GatedFetcher {
        pending: Mutex<HashMap<String, oneshot::Sender<FetchResult>>>,
        ignore_cancellation: bool,
    }

    impl GatedFetcher {
        fn ignoring_cancellation() -> Self {
            Self {
                ignore_cancellation: true,
                ..Self::default()
            }
        }

        async fn wait_for(&self, key: &str) {
            for _ in 0..1000 {
                if self.pending.lock().contains_key(key) {
                    return;
                }
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
            panic!("request for {key} never arrived");
        }

        fn respond(&self, key: &str, result: FetchResult) {
            let sender = self.pending.lock().remove(key).expect("no pending request");
            let _ = sender.send(result);
        }
    }

    impl RemoteFetcher for GatedFetcher {
        async fn fetch(&self, entity: &SelectionEntity, token: &CancellationToken) -> FetchResult {
            let (tx, rx) = oneshot::channel();
            self.pending.lock().insert(entity.key.clone(), tx);
            let response = async { rx.await.unwrap_or(Err(FetchError::Cancelled)) };
            if self.ignore_cancellation {
                response.await
            } else {
                tokio::select! {
                    _ = token.cancelled() => Err(FetchError::Cancelled),
                    result = response => result,
                }
            }
        }
    }

    struct PanickingFetcher;

    impl RemoteFetcher for PanickingFetcher {
        async fn fetch(&self, _entity: &SelectionEntity, _token: &CancellationToken) -> FetchResult {
            panic!("decoder exploded")
        }
    }

    fn record<T: Clone + Send + Sync + 'static>(cell: &ReadOnlyCell<T>) -> Arc<Mutex<Vec<T>>> {
        let log = Arc::new(Mutex::new(Vec::new()));
        let log_clone = log.clone();
        cell.subscribe(move |value: &T| log_clone.lock().push(value.clone()));
        log
    }

    #[tokio::test]
    async fn test_initial_state() {
        let coordinator = FetchCoordinator::new(StaticFetcher::new(Ok(Forecast::default())), 0);
        assert_eq!(coordinator.display_text().get(), "Ready");
        assert!(!coordinator.is_busy());
        assert_eq!(coordinator.cache_ttl_seconds(), 3600);
    }

    #[tokio::test]
    async fn test_success_builds_text_and_caches() {
        let fetcher = StaticFetcher::new(Ok(forecast("Asia/Tokyo", "2024-01-01T00:00", 5.0)));
        let coordinator = FetchCoordinator::new(fetcher, 3600);
        let texts = record(&coordinator.display_text());
        let busy = record(&coordinator.busy());
        let token = CancellationToken::new();

        let outcome = coordinator.select(&tokyo(), &token).await;

        assert_eq!(outcome, SelectOutcome::Loaded);
        let expected = "Tokyo\nTimezone: Asia/Tokyo\nTime: 2024-01-01T00:00\nTemp: 5 °C";
        assert_eq!(
            *texts.lock(),
            vec!["Ready".to_string(), "Loading Tokyo...".to_string(), expected.to_string()]
        );
        assert_eq!(*busy.lock(), vec![false, true, false]);

        // Second selection is served from the cache without network I/O.
        let outcome = coordinator.select(&tokyo(), &token).await;
        assert_eq!(outcome, SelectOutcome::CacheHit);
        assert_eq!(coordinator.fetcher().calls(), 1);
        assert_eq!(texts.lock().last().unwrap(), expected);
        assert_eq!(*busy.lock(), vec![false, true, false]);
    }

    #[tokio::test]
    async fn test_empty_series_shows_no_data() {
        let fetcher = StaticFetcher::new(Ok(Forecast {
            timezone: "UTC".to_string(),
            time_series: TimeSeries::default(),
        }));
        let coordinator = FetchCoordinator::new(fetcher, 60);

        coordinator.select(&london(), &CancellationToken::new()).await;

        assert_eq!(coordinator.display_text().get(), "London\nNo data.");
    }

    #[tokio::test]
    async fn test_stale_entry_refetches() {
        let clock = Arc::new(ManualClock::new(0));
        let fetcher = StaticFetcher::new(Ok(forecast("UTC", "t", 1.0)));
        let coordinator = FetchCoordinator::with_clock(fetcher, 60, clock.clone());
        let token = CancellationToken::new();

        coordinator.select(&tokyo(), &token).await;
        clock.set(60);
        assert_eq!(coordinator.select(&tokyo(), &token).await, SelectOutcome::CacheHit);
        clock.set(61);
        assert_eq!(coordinator.select(&tokyo(), &token).await, SelectOutcome::Loaded);
        assert_eq!(coordinator.fetcher().calls(), 2);
    }

    #[tokio::test]
    async fn test_transport_error_is_displayed_not_cached() {
        let fetcher = StaticFetcher::new(Err(FetchError::Transport("HTTP 503".to_string())));
        let coordinator = FetchCoordinator::new(fetcher, 60);
        let token = CancellationToken::new();

        assert_eq!(coordinator.select(&tokyo(), &token).await, SelectOutcome::Failed);
        assert_eq!(coordinator.display_text().get(), "API Error: HTTP 503");
        assert!(!coordinator.is_busy());

        coordinator.select(&tokyo(), &token).await;
        assert_eq!(coordinator.fetcher().calls(), 2);
    }

    #[tokio::test]
    async fn test_malformed_payload_shows_generic_error() {
        let fetcher = StaticFetcher::new(Err(FetchError::Malformed("expected array".to_string())));
        let coordinator = FetchCoordinator::new(fetcher, 60);

        coordinator.select(&tokyo(), &CancellationToken::new()).await;

        assert_eq!(
            coordinator.display_text().get(),
            "Unexpected error while loading Tokyo."
        );
        assert!(!coordinator.is_busy());
    }

    #[tokio::test]
    async fn test_panicking_fetcher_does_not_leave_busy() {
        let coordinator = FetchCoordinator::new(PanickingFetcher, 60);

        let outcome = coordinator.select(&tokyo(), &CancellationToken::new()).await;

        assert_eq!(outcome, SelectOutcome::Failed);
        assert!(!coordinator.is_busy());
        assert_eq!(
            coordinator.display_text().get(),
            "Unexpected error while loading Tokyo."
        );
    }

    #[tokio::test]
    async fn test_busy_rejects_second_selection() {
        let fetcher = Arc::new(GatedFetcher::default());
        let coordinator = Arc::new(FetchCoordinator::new(fetcher.clone(), 60));
        let token = CancellationToken::new();

        let first = tokio::spawn({
            let coordinator = coordinator.clone();
            let token = token.clone();
            async move { coordinator.select(&tokyo(), &token).await }
        });
        fetcher.wait_for("tokyo").await;

        let texts = record(&coordinator.display_text());
        let outcome = coordinator.select(&london(), &token).await;
        assert_eq!(outcome, SelectOutcome::Rejected);
        assert_eq!(*texts.lock(), vec!["Loading Tokyo...".to_string()]);
        assert!(!fetcher.pending.lock().contains_key("london"));

        fetcher.respond("tokyo", Ok(forecast("Asia/Tokyo", "t0", 3.5)));
        assert_eq!(first.await.unwrap(), SelectOutcome::Loaded);
        assert!(!coordinator.is_busy());
        assert!(coordinator.display_text().get().starts_with("Tokyo\n"));
    }

    #[tokio::test]
    async fn test_supersede_discards_late_response() {
        // The first request ignores its token, so its response really does
        // arrive after it has been superseded.
        let fetcher = Arc::new(GatedFetcher::ignoring_cancellation());
        let coordinator = Arc::new(FetchCoordinator::new(fetcher.clone(), 60));
        let token = CancellationToken::new();

        let first = tokio::spawn({
            let coordinator = coordinator.clone();
            let token = token.clone();
            async move { coordinator.select(&tokyo(), &token).await }
        });
        fetcher.wait_for("tokyo").await;

        let second = tokio::spawn({
            let coordinator = coordinator.clone();
            let token = token.clone();
            async move { coordinator.supersede(&london(), &token).await }
        });
        fetcher.wait_for("london").await;

        fetcher.respond("london", Ok(forecast("Europe/London", "t1", 7.0)));
        assert_eq!(second.await.unwrap(), SelectOutcome::Loaded);

        fetcher.respond("tokyo", Ok(forecast("Asia/Tokyo", "t0", 5.0)));
        assert_eq!(first.await.unwrap(), SelectOutcome::Superseded);

        assert!(coordinator.display_text().get().starts_with("London\n"));
        assert!(!coordinator.is_busy());

        // The discarded response was not cached either.
        let cache = coordinator.cache.lock();
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.try_get("tokyo", 0), None);
    }

    #[tokio::test]
    async fn test_superseded_call_does_not_clear_busy() {
        let fetcher = Arc::new(GatedFetcher::default());
        let coordinator = Arc::new(FetchCoordinator::new(fetcher.clone(), 60));
        let token = CancellationToken::new();

        let first = tokio::spawn({
            let coordinator = coordinator.clone();
            let token = token.clone();
            async move { coordinator.select(&tokyo(), &token).await }
        });
        fetcher.wait_for("tokyo").await;

        let second = tokio::spawn({
            let coordinator = coordinator.clone();
            let token = token.clone();
            async move { coordinator.supersede(&london(), &token).await }
        });

        // The first call observes cancellation and settles while the second
        // is still in flight.
        assert_eq!(first.await.unwrap(), SelectOutcome::Superseded);
        fetcher.wait_for("london").await;
        assert!(coordinator.is_busy());
        assert_eq!(coordinator.display_text().get(), "Loading London...");

        fetcher.respond("london", Err(FetchError::Transport("timeout".to_string())));
        assert_eq!(second.await.unwrap(), SelectOutcome::Failed);
        assert!(!coordinator.is_busy());
        assert_eq!(coordinator.display_text().get(), "API Error: timeout");
    }

    #[tokio::test]
    async fn test_external_cancellation_discards_and_clears_busy() {
        let fetcher = Arc::new(GatedFetcher::default());
        let coordinator = Arc::new(FetchCoordinator::new(fetcher.clone(), 60));
        let lifetime = CancellationToken::new();

        let pending = tokio::spawn({
            let coordinator = coordinator.clone();
            let lifetime = lifetime.clone();
            async move { coordinator.select(&tokyo(), &lifetime).await }
        });
        fetcher.wait_for("tokyo").await;

        lifetime.cancel();

        assert_eq!(pending.await.unwrap(), SelectOutcome::Cancelled);
        assert!(!coordinator.is_busy());
        assert_eq!(coordinator.display_text().get(), "Loading Tokyo...");
    }

    #[tokio::test]
    async fn test_cancel_method_cancels_active_request() {
        let fetcher = Arc::new(GatedFetcher::default());
        let coordinator = Arc::new(FetchCoordinator::new(fetcher.clone(), 60));

        let pending = tokio::spawn({
            let coordinator = coordinator.clone();
            async move { coordinator.select(&tokyo(), &CancellationToken::new()).await }
        });
        fetcher.wait_for("tokyo").await;

        coordinator.cancel();

        assert_eq!(pending.await.unwrap(), SelectOutcome::Cancelled);
        assert!(!coordinator.is_busy());
    }

    #[tokio::test]
    async fn test_already_cancelled_external_token_skips_fetch() {
        let coordinator = FetchCoordinator::new(StaticFetcher::new(Ok(Forecast::default())), 60);
        let busy = record(&coordinator.busy());
        let texts = record(&coordinator.display_text());
        let lifetime = CancellationToken::new();
        lifetime.cancel();

        let outcome = coordinator.select(&tokyo(), &lifetime).await;

        assert_eq!(outcome, SelectOutcome::Cancelled);
        assert_eq!(coordinator.fetcher().calls(), 0);
        // Only the replays: nothing was written.
        assert_eq!(*busy.lock(), vec![false]);
        assert_eq!(*texts.lock(), vec![READY_TEXT.to_string()]);
    }

    #[tokio::test]
    async fn test_supersede_onto_cached_key_discards_in_flight_fetch() {
        let fetcher = Arc::new(GatedFetcher::ignoring_cancellation());
        let coordinator = Arc::new(FetchCoordinator::new(fetcher.clone(), 60));
        let token = CancellationToken::new();

        let warm = tokio::spawn({
            let coordinator = coordinator.clone();
            let token = token.clone();
            async move { coordinator.select(&london(), &token).await }
        });
        fetcher.wait_for("london").await;
        fetcher.respond("london", Ok(forecast("Europe/London", "t1", 7.0)));
        assert_eq!(warm.await.unwrap(), SelectOutcome::Loaded);
        let london_text = coordinator.display_text().get();

        let first = tokio::spawn({
            let coordinator = coordinator.clone();
            let token = token.clone();
            async move { coordinator.select(&tokyo(), &token).await }
        });
        fetcher.wait_for("tokyo").await;
        assert!(coordinator.is_busy());

        let outcome = coordinator.supersede(&london(), &token).await;
        assert_eq!(outcome, SelectOutcome::CacheHit);
        assert_eq!(coordinator.display_text().get(), london_text);
        assert!(!coordinator.is_busy());

        fetcher.respond("tokyo", Ok(forecast("Asia/Tokyo", "t0", 5.0)));
        assert_eq!(first.await.unwrap(), SelectOutcome::Superseded);

        assert_eq!(coordinator.display_text().get(), london_text);
        assert!(!coordinator.is_busy());
        assert_eq!(coordinator.cache.lock().try_get("tokyo", 0), None);
    }

    #[tokio::test]
    async fn test_dropping_select_future_releases_busy() {
        let fetcher = Arc::new(GatedFetcher::default());
        let coordinator = Arc::new(FetchCoordinator::new(fetcher.clone(), 60));

        let pending = tokio::spawn({
            let coordinator = coordinator.clone();
            async move { coordinator.select(&tokyo(), &CancellationToken::new()).await }
        });
        fetcher.wait_for("tokyo").await;
        assert!(coordinator.is_busy());

        pending.abort();
        let _ = pending.await;

        assert!(!coordinator.is_busy());
    }

    #[tokio::test]
    async fn test_repeated_success_keeps_latest_cache_entry() {
        let clock = Arc::new(ManualClock::new(0));
        let fetcher = Arc::new(GatedFetcher::default());
        let coordinator = Arc::new(FetchCoordinator::with_clock(fetcher.clone(), 60, clock.clone()));
        let token = CancellationToken::new();

        for (at, temp) in [(0, 1.0), (100, 2.0)] {
            clock.set(at);
            let pending = tokio::spawn({
                let coordinator = coordinator.clone();
                let token = token.clone();
                async move { coordinator.select(&tokyo(), &token).await }
            });
            fetcher.wait_for("tokyo").await;
            fetcher.respond("tokyo", Ok(forecast("UTC", "t", temp)));
            assert_eq!(pending.await.unwrap(), SelectOutcome::Loaded);
        }

        coordinator.display_text.set(String::new());
        assert_eq!(coordinator.select(&tokyo(), &token).await, SelectOutcome::CacheHit);
        assert_eq!(coordinator.display_text().get(), "Tokyo\nTimezone: UTC\nTime: t\nTemp: 2 °C");
        assert_eq!(coordinator.cache.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_shutdown_disposes_subscribers() {
        let coordinator = FetchCoordinator::new(StaticFetcher::new(Ok(Forecast::default())), 60);
        let _texts = record(&coordinator.display_text());
        let _busy = record(&coordinator.busy());

        coordinator.shutdown();

        assert_eq!(coordinator.display_text.subscriber_count(), 0);
        assert_eq!(coordinator.busy.subscriber_count(), 0);
    }

    #[test]
    fn test_display_text_fractional_temperature() {
        let text = build_display_text("Paris", &forecast("Europe/Paris", "2024-06-01T12:00", 21.3));
        assert_eq!(text, "Paris\nTimezone: Europe/Paris\nTime: 2024-06-01T12:00\nTemp: 21.3 °C");
    }

    #[test]
    fn test_display_text_missing_values_only() {
        let partial = Forecast {
            timezone: "UTC".to_string(),
            time_series: TimeSeries {
                labels: vec!["2024-01-01T00:00".to_string()],
                values: vec![],
            },
        };
        assert_eq!(build_display_text("Oslo", &partial), "Oslo\nNo data.");
    }
}
