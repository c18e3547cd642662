//! HTTP request builder.

use super::client::HttpClient;
use super::response::HttpResponse;
use crate::error::Result;
use crate::logging::targets;

/// Builder for a GET request.
///
/// Query pairs are appended to whatever query the URL already carries, so a
/// base URL such as `...?hourly=temperature_2m` keeps its parameters.
pub struct HttpRequestBuilder {
    client: HttpClient,
    url: String,
    query: Vec<(String, String)>,
}

impl HttpRequestBuilder {
    pub(crate) fn new(client: HttpClient, url: String) -> Self {
        Self {
            client,
            url,
            query: Vec::new(),
        }
    }

    /// Append a query parameter.
    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    /// The final URL, with query parameters applied.
    pub fn url(&self) -> Result<url::Url> {
        let mut url = url::Url::parse(&self.url)?;
        if !self.query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in &self.query {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    /// Send the request.
    pub async fn send(self) -> Result<HttpResponse> {
        let url = self.url()?;
        tracing::debug!(target: targets::HTTP, %url, "GET");

        let response = self.client.reqwest_client().get(url).send().await?;
        Ok(HttpResponse::from_reqwest(response))
    }
}
