//! Core library for the `cep-weather` service.
//!
//! This crate defines:
//! - Postal code validation
//! - Deadline-bound upstream calls and the stage scopes they run in
//! - The location and weather providers
//! - The orchestrator that chains them into one lookup
//! - Configuration handling
//!
//! It is used by `cep-weather-cli`, but carries no HTTP server of its own.

pub mod config;
pub mod error;
pub mod model;
pub mod orchestrator;
pub mod provider;
pub mod stage;
pub mod upstream;
pub mod validate;

pub use config::Config;
pub use error::{LookupError, UpstreamError, ValidationError};
pub use model::{LocationRecord, MergedResult, WeatherRecord};
pub use orchestrator::{Orchestrator, StageBudgets};
pub use provider::{LocationProvider, WeatherProvider};
pub use stage::{RequestScope, StageScope};
pub use validate::{Cep, validate_cep};
