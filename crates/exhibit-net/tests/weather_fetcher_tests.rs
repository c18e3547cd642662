//! Integration tests for the Open-Meteo fetcher against a mock server.

use std::sync::Arc;
use std::time::Duration;

use exhibit_core::{
    CancellationToken, FetchCoordinator, FetchError, RemoteFetcher, SelectOutcome, SelectionEntity,
    WeatherConfig,
};
use exhibit_net::OpenMeteoFetcher;
use exhibit_net::http::HttpClient;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TOKYO_BODY: &str = r#"{
    "latitude": 35.7,
    "longitude": 139.75,
    "timezone": "Asia/Tokyo",
    "hourly": {
        "time": ["2024-01-01T00:00", "2024-01-01T01:00"],
        "temperature_2m": [5.0, 4.6]
    }
}"#;

fn tokyo() -> SelectionEntity {
    SelectionEntity::new("tokyo", "Tokyo", 35.68, 139.76)
}

fn fetcher_for(server: &MockServer) -> OpenMeteoFetcher {
    let client = HttpClient::builder()
        .timeout(Duration::from_secs(10))
        .build()
        .expect("Failed to build client");
    OpenMeteoFetcher::new(client, format!("{}/v1/forecast?hourly=temperature_2m", server.uri()))
}

async fn mount_tokyo(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/v1/forecast"))
        .and(query_param("hourly", "temperature_2m"))
        .and(query_param("latitude", "35.68"))
        .and(query_param("longitude", "139.76"))
        .respond_with(ResponseTemplate::new(200).set_body_string(TOKYO_BODY))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_fetch_decodes_forecast() {
    let server = MockServer::start().await;
    mount_tokyo(&server).await;

    let fetcher = fetcher_for(&server);
    let forecast = fetcher
        .fetch(&tokyo(), &CancellationToken::new())
        .await
        .expect("fetch failed");

    assert_eq!(forecast.timezone, "Asia/Tokyo");
    assert_eq!(forecast.time_series.first(), Some(("2024-01-01T00:00", 5.0)));
    assert_eq!(forecast.time_series.values.len(), 2);
}

#[tokio::test]
async fn test_configured_fetcher_asks_for_json() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/forecast"))
        .and(header("accept", "application/json"))
        .respond_with(ResponseTemplate::new(200).set_body_string(TOKYO_BODY))
        .expect(1)
        .mount(&server)
        .await;

    let config = WeatherConfig {
        base_url: format!("{}/v1/forecast?hourly=temperature_2m", server.uri()),
        request_timeout_seconds: 5,
        ..WeatherConfig::default()
    };
    let fetcher = OpenMeteoFetcher::from_config(&config).expect("Failed to build fetcher");

    let forecast = fetcher
        .fetch(&tokyo(), &CancellationToken::new())
        .await
        .expect("fetch failed");
    assert_eq!(forecast.timezone, "Asia/Tokyo");
}

#[tokio::test]
async fn test_server_error_is_transport() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/forecast"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let fetcher = fetcher_for(&server);
    let err = fetcher
        .fetch(&tokyo(), &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(err, FetchError::Transport("HTTP 500".to_string()));
}

#[tokio::test]
async fn test_garbage_body_is_malformed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/forecast"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>not json</html>"))
        .mount(&server)
        .await;

    let fetcher = fetcher_for(&server);
    let err = fetcher
        .fetch(&tokyo(), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, FetchError::Malformed(_)), "got {err:?}");
}

#[tokio::test]
async fn test_missing_series_is_empty_forecast() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/forecast"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"timezone":"GMT"}"#))
        .mount(&server)
        .await;

    let fetcher = fetcher_for(&server);
    let forecast = fetcher
        .fetch(&tokyo(), &CancellationToken::new())
        .await
        .expect("fetch failed");

    assert_eq!(forecast.timezone, "GMT");
    assert_eq!(forecast.time_series.first(), None);
}

#[tokio::test]
async fn test_cancel_during_slow_response() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/forecast"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(TOKYO_BODY)
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let fetcher = fetcher_for(&server);
    let token = CancellationToken::new();

    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        canceller.cancel();
    });

    let result = tokio::time::timeout(Duration::from_secs(2), fetcher.fetch(&tokyo(), &token))
        .await
        .expect("cancellation did not interrupt the request");

    assert_eq!(result, Err(FetchError::Cancelled));
}

#[tokio::test]
async fn test_pre_cancelled_token_skips_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(TOKYO_BODY))
        .expect(0)
        .mount(&server)
        .await;

    let fetcher = fetcher_for(&server);
    let token = CancellationToken::new();
    token.cancel();

    assert_eq!(fetcher.fetch(&tokyo(), &token).await, Err(FetchError::Cancelled));
}

#[tokio::test]
async fn test_connection_refused_is_transport() {
    let client = HttpClient::builder()
        .connect_timeout(Duration::from_secs(2))
        .build()
        .expect("Failed to build client");
    let fetcher = OpenMeteoFetcher::new(client, "http://127.0.0.1:1/v1/forecast?hourly=temperature_2m");

    let err = fetcher
        .fetch(&tokyo(), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, FetchError::Transport(_)), "got {err:?}");
}

#[tokio::test]
async fn test_coordinator_displays_and_caches_remote_forecast() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/forecast"))
        .respond_with(ResponseTemplate::new(200).set_body_string(TOKYO_BODY))
        .expect(1)
        .mount(&server)
        .await;

    let coordinator = FetchCoordinator::new(Arc::new(fetcher_for(&server)), 3600);
    let lifetime = CancellationToken::new();

    let outcome = coordinator.select(&tokyo(), &lifetime).await;
    assert_eq!(outcome, SelectOutcome::Loaded);

    let expected = "Tokyo\nTimezone: Asia/Tokyo\nTime: 2024-01-01T00:00\nTemp: 5 °C";
    assert_eq!(coordinator.display_text().get(), expected);

    let outcome = coordinator.select(&tokyo(), &lifetime).await;
    assert_eq!(outcome, SelectOutcome::CacheHit);
    assert_eq!(coordinator.display_text().get(), expected);
    assert!(!coordinator.is_busy());
}

#[tokio::test]
async fn test_coordinator_shows_api_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/forecast"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&server)
        .await;

    let coordinator = FetchCoordinator::new(fetcher_for(&server), 3600);
    let outcome = coordinator.select(&tokyo(), &CancellationToken::new()).await;

    assert_eq!(outcome, SelectOutcome::Failed);
    assert_eq!(coordinator.display_text().get(), "API Error: HTTP 503: maintenance");
    assert!(!coordinator.is_busy());
}
