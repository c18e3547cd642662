//! A thin HTTP client over `reqwest`.
//!
//! ```ignore
//! use exhibit_net::http::HttpClient;
//!
//! let client = HttpClient::builder()
//!     .timeout(Duration::from_secs(10))
//!     .build()?;
//!
//! let response = client
//!     .get("https://api.example.com/data")
//!     .query("page", 2)
//!     .send()
//!     .await?
//!     .error_for_status_with_body()
//!     .await?;
//! let data: MyData = response.json().await?;
//! ```

mod client;
mod request;
mod response;

pub use client::{HttpClient, HttpClientBuilder, HttpClientConfig};
pub use request::HttpRequestBuilder;
pub use response::HttpResponse;
