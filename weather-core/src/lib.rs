//! Core library for the weather gateway.
//!
//! This crate defines:
//! - The parameter rule catalog and the validator built on it
//! - The uniform result envelope returned for every outcome
//! - The upstream provider that relays sanitized requests
//! - Gateway configuration and the axum HTTP surface
//!
//! It is used by `weather-gateway`, but can also be embedded in other binaries or services.

pub mod catalog;
pub mod config;
pub mod envelope;
pub mod model;
pub mod provider;
pub mod server;
pub mod target;
pub mod validator;

pub use catalog::{Rule, RuleCatalog, RuleKind};
pub use config::{GatewayConfig, ServerConfig, UpstreamConfig};
pub use envelope::ResultEnvelope;
pub use model::{WeatherData, WeatherObject};
pub use provider::{UpstreamFailure, WeatherProvider};
pub use target::UpstreamTarget;
pub use validator::{RawParameters, SanitizedParameters, ValidationError, Validator};
