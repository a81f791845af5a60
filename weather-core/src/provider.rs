use crate::{
    SanitizedParameters,
    config::UpstreamConfig,
    envelope::ResultEnvelope,
    model::WeatherData,
    provider::visualcrossing::VisualCrossingProvider,
    target::UpstreamTarget,
};
use async_trait::async_trait;
use reqwest::StatusCode;
use std::{fmt::Debug, sync::Arc};

pub mod visualcrossing;

pub const ERR_API_REQUEST: &str = "API Request Failed";
pub const ERR_NETWORK: &str = "Network Error";
pub const ERR_JSON_PARSING: &str = "JSON Parsing Error";
pub const ERR_UNEXPECTED: &str = "Unexpected Error";

/// Relays one sanitized request upstream and reports the outcome as an envelope.
///
/// Implementations make exactly one outbound attempt per call and never retry.
#[async_trait]
pub trait WeatherProvider: Send + Sync + Debug {
    async fn forward(
        &self,
        params: &SanitizedParameters,
        target: &UpstreamTarget,
        path: &str,
    ) -> ResultEnvelope<WeatherData>;
}

/// Every way an upstream call can fail.
#[derive(Debug, thiserror::Error)]
pub enum UpstreamFailure {
    #[error("API request failed: {body}")]
    Status { status: StatusCode, body: String },

    #[error("Network error: {0}")]
    Network(#[source] reqwest::Error),

    #[error("JSON parsing error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

impl UpstreamFailure {
    /// Classify a reqwest error. The URL (which carries the API key) is dropped.
    pub fn from_transport(err: reqwest::Error) -> Self {
        if err.is_builder() {
            Self::Unexpected(err.without_url().to_string())
        } else {
            Self::Network(err.without_url())
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Status { .. } => ERR_API_REQUEST,
            Self::Network(_) => ERR_NETWORK,
            Self::Parse(_) => ERR_JSON_PARSING,
            Self::Unexpected(_) => ERR_UNEXPECTED,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Status { status, .. } => *status,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn into_envelope<T>(self, path: &str) -> ResultEnvelope<T> {
        let status = self.status();
        let code = Some(self.error_code());
        if status.is_client_error() {
            ResultEnvelope::client_error(self.to_string(), path, status, code)
        } else {
            ResultEnvelope::server_error(self.to_string(), path, status, code)
        }
    }
}

/// Construct the upstream provider from config. Built once at startup and shared.
pub fn provider_from_config(config: &UpstreamConfig) -> anyhow::Result<Arc<dyn WeatherProvider>> {
    Ok(Arc::new(VisualCrossingProvider::new(config)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_404_is_a_client_error_with_the_same_status() {
        let failure = UpstreamFailure::Status {
            status: StatusCode::NOT_FOUND,
            body: "Bad location".into(),
        };
        let env: ResultEnvelope<()> = failure.into_envelope("/api/weatherwrapper/Nowhere");
        assert!(!env.success);
        assert_eq!(env.status_code, 404);
        assert_eq!(env.message, "An error occurred");
        assert_eq!(env.error_code.as_deref(), Some(ERR_API_REQUEST));
        assert_eq!(env.error.as_deref(), Some("API request failed: Bad location"));
    }

    #[test]
    fn upstream_503_is_a_server_error_with_the_same_status() {
        let failure = UpstreamFailure::Status {
            status: StatusCode::SERVICE_UNAVAILABLE,
            body: String::new(),
        };
        let env: ResultEnvelope<()> = failure.into_envelope("/x");
        assert_eq!(env.status_code, 503);
        assert_eq!(env.message, "Server Failure");
    }

    #[test]
    fn parse_failure_maps_to_500() {
        let err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let env: ResultEnvelope<()> = UpstreamFailure::from(err).into_envelope("/x");
        assert_eq!(env.status_code, 500);
        assert_eq!(env.error_code.as_deref(), Some(ERR_JSON_PARSING));
    }

    #[test]
    fn unexpected_failure_maps_to_500() {
        let env: ResultEnvelope<()> =
            UpstreamFailure::Unexpected("bad base".into()).into_envelope("/x");
        assert_eq!(env.status_code, 500);
        assert_eq!(env.error_code.as_deref(), Some(ERR_UNEXPECTED));
    }

    #[test]
    fn provider_from_default_config_builds() {
        assert!(provider_from_config(&UpstreamConfig::default()).is_ok());
    }
}
