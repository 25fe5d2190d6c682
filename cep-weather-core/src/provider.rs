use std::{fmt::Debug, sync::Arc};

use async_trait::async_trait;

use crate::{
    Config, LocationRecord, WeatherRecord,
    provider::{viacep::ViaCepProvider, weatherapi::WeatherApiProvider},
    stage::{StageOutcome, StageScope},
    upstream::UpstreamClient,
    validate::Cep,
};

pub mod viacep;
pub mod weatherapi;

/// Resolves a validated postal code to an address.
#[async_trait]
pub trait LocationProvider: Send + Sync + Debug {
    async fn resolve_location(&self, stage: &StageScope, code: &Cep) -> StageOutcome<LocationRecord>;
}

/// Resolves a city name to its current temperatures.
#[async_trait]
pub trait WeatherProvider: Send + Sync + Debug {
    async fn resolve_weather(&self, stage: &StageScope, city: &str) -> StageOutcome<WeatherRecord>;
}

/// Construct the location provider described by `config`.
pub fn location_provider_from_config(
    client: UpstreamClient,
    config: &Config,
) -> Arc<dyn LocationProvider> {
    Arc::new(ViaCepProvider::new(client, config.upstream.location_url.clone()))
}

/// Construct the weather provider described by `config`.
pub fn weather_provider_from_config(
    client: UpstreamClient,
    config: &Config,
) -> Arc<dyn WeatherProvider> {
    Arc::new(WeatherApiProvider::new(
        client,
        &config.upstream.weather_url,
        &config.upstream.weather_api_key,
    ))
}
