use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{
    Client,
    header::{ACCEPT, HeaderMap, HeaderValue},
};
use tracing::{debug, instrument, warn};
use url::Url;

use crate::{
    catalog::CONTENT_TYPE,
    config::UpstreamConfig,
    envelope::ResultEnvelope,
    model::{WeatherData, WeatherObject},
    target::UpstreamTarget,
    validator::SanitizedParameters,
};

use super::{UpstreamFailure, WeatherProvider};

/// Visual Crossing timeline API, reached through one long-lived client.
#[derive(Debug, Clone)]
pub struct VisualCrossingProvider {
    base: Url,
    http: Client,
}

impl VisualCrossingProvider {
    pub fn new(config: &UpstreamConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let http = Client::builder()
            .default_headers(headers)
            .user_agent(config.user_agent.as_str())
            .timeout(config.timeout())
            .connect_timeout(config.connect_timeout())
            .build()
            .context("Failed to build upstream HTTP client")?;

        Ok(Self { base: config.base_url()?, http })
    }

    /// `<base>/<location>[/<start>[/<end>]]?<sanitized query>`, every part percent-encoded.
    pub fn request_url(
        &self,
        params: &SanitizedParameters,
        target: &UpstreamTarget,
    ) -> Result<Url, UpstreamFailure> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| {
                UpstreamFailure::Unexpected("upstream base URL cannot carry a path".into())
            })?
            .pop_if_empty()
            .extend(target.segments());

        if !params.is_empty() {
            url.query_pairs_mut().extend_pairs(params.iter());
        }
        Ok(url)
    }

    async fn fetch(
        &self,
        params: &SanitizedParameters,
        target: &UpstreamTarget,
    ) -> Result<WeatherData, UpstreamFailure> {
        let url = self.request_url(params, target)?;
        debug!(host = url.host_str().unwrap_or_default(), path = url.path(), "calling upstream");

        let res = self.http.get(url).send().await.map_err(UpstreamFailure::from_transport)?;

        let status = res.status();
        let body = res.text().await.map_err(UpstreamFailure::from_transport)?;

        if !status.is_success() {
            return Err(UpstreamFailure::Status { status, body: truncate_body(&body) });
        }

        if params.get(CONTENT_TYPE) == Some("csv") {
            return Ok(WeatherData::Csv(body));
        }

        let parsed: WeatherObject = serde_json::from_str(&body)?;
        Ok(WeatherData::Timeline(Box::new(parsed)))
    }
}

#[async_trait]
impl WeatherProvider for VisualCrossingProvider {
    #[instrument(skip(self, params), fields(location = target.location()))]
    async fn forward(
        &self,
        params: &SanitizedParameters,
        target: &UpstreamTarget,
        path: &str,
    ) -> ResultEnvelope<WeatherData> {
        match self.fetch(params, target).await {
            Ok(data) => {
                debug!("upstream call succeeded");
                ResultEnvelope::success(data, path)
            }
            Err(failure) => {
                warn!(
                    error_code = failure.error_code(),
                    status = failure.status().as_u16(),
                    error = %failure,
                    "upstream call failed"
                );
                failure.into_envelope(path)
            }
        }
    }
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    if body.chars().count() > MAX {
        format!("{}...", body.chars().take(MAX).collect::<String>())
    } else {
        body.to_string()
    }
}
