//! The two-stage lookup pipeline.
//!
//! A lookup walks `Validating -> ResolvingLocation -> ResolvingWeather -> Merged`, dropping
//! into `Failed` from any stage. Each step is a transition function from one
//! [`LookupState`] to the next; the driver loop only dispatches.

use std::{sync::Arc, time::Duration};

use anyhow::Result;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::{
    Config, LocationRecord, LookupError, MergedResult, WeatherRecord,
    provider::{
        LocationProvider, WeatherProvider, location_provider_from_config,
        weather_provider_from_config,
    },
    stage::{EmptyReason, RequestScope, StageFailure, StageOutcome},
    upstream::UpstreamClient,
    validate::{Cep, validate_cep},
};

const LOCATION_STAGE: &str = "ViaCep";
const WEATHER_STAGE: &str = "WeatherApi";

/// Independent time budgets for the two upstream stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageBudgets {
    pub location: Duration,
    pub weather: Duration,
}

impl Default for StageBudgets {
    fn default() -> Self {
        Self { location: Duration::from_secs(1), weather: Duration::from_secs(3) }
    }
}

#[derive(Debug)]
pub enum LookupState {
    Validating(String),
    ResolvingLocation(Cep),
    ResolvingWeather(LocationRecord),
    Merged(MergedResult),
    Failed(LookupError),
}

#[derive(Debug, Clone)]
pub struct Orchestrator {
    locations: Arc<dyn LocationProvider>,
    weather: Arc<dyn WeatherProvider>,
    budgets: StageBudgets,
}

impl Orchestrator {
    pub fn new(
        locations: Arc<dyn LocationProvider>,
        weather: Arc<dyn WeatherProvider>,
        budgets: StageBudgets,
    ) -> Self {
        Self { locations, weather, budgets }
    }

    /// Validate `config` and build both providers over one shared HTTP client.
    pub fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;

        let client = UpstreamClient::new();
        Ok(Self::new(
            location_provider_from_config(client.clone(), config),
            weather_provider_from_config(client, config),
            config.budgets(),
        ))
    }

    pub fn budgets(&self) -> StageBudgets {
        self.budgets
    }

    /// Resolve `raw` to an address plus current weather.
    pub async fn lookup(&self, request: &RequestScope, raw: &str) -> Result<MergedResult, LookupError> {
        let started = Instant::now();
        info!(cep = raw, "searching local climate for zipcode");

        let mut state = LookupState::Validating(raw.to_owned());
        let outcome = loop {
            state = match state {
                LookupState::Validating(raw) => validating(&raw),
                LookupState::ResolvingLocation(code) => self.resolving_location(request, code).await,
                LookupState::ResolvingWeather(location) => {
                    self.resolving_weather(request, location).await
                }
                LookupState::Merged(result) => break Ok(result),
                LookupState::Failed(err) => break Err(err),
            };
        };

        match &outcome {
            Ok(_) => info!(cep = raw, elapsed = ?started.elapsed(), "lookup finished"),
            Err(err) => warn!(cep = raw, elapsed = ?started.elapsed(), code = err.code, "lookup failed"),
        }
        outcome
    }

    /// Weather-only variant: skip the location stage and query by city name.
    pub async fn weather_for_city(
        &self,
        request: &RequestScope,
        city: &str,
    ) -> Result<WeatherRecord, LookupError> {
        if city.trim().is_empty() {
            return Err(LookupError::bad_request("City name not sent in parameter."));
        }

        let started = Instant::now();
        info!(city, "searching local climate for city");

        let stage = request.stage(WEATHER_STAGE, self.budgets.weather);
        let outcome = weather_result(self.weather.resolve_weather(&stage, city).await, city);

        info!(city, elapsed = ?started.elapsed(), ok = outcome.is_ok(), "weather lookup finished");
        outcome
    }

    async fn resolving_location(&self, request: &RequestScope, code: Cep) -> LookupState {
        let stage = request.stage(LOCATION_STAGE, self.budgets.location);
        let outcome = self.locations.resolve_location(&stage, &code).await;
        after_location(&code, outcome)
    }

    async fn resolving_weather(&self, request: &RequestScope, location: LocationRecord) -> LookupState {
        // Derived from the request, not the location stage: budgets never chain.
        let stage = request.stage(WEATHER_STAGE, self.budgets.weather);
        let outcome = self.weather.resolve_weather(&stage, &location.city).await;
        after_weather(location, outcome)
    }
}

fn validating(raw: &str) -> LookupState {
    match validate_cep(raw) {
        Ok(code) => LookupState::ResolvingLocation(code),
        Err(err) => LookupState::Failed(err.into()),
    }
}

fn after_location(code: &Cep, outcome: StageOutcome<LocationRecord>) -> LookupState {
    match outcome {
        StageOutcome::Found(location) if location.is_located() => LookupState::ResolvingWeather(location),
        StageOutcome::Found(_) | StageOutcome::Empty(_) => LookupState::Failed(LookupError::not_found(
            format!("city could not be located for zipcode {code}"),
        )),
        StageOutcome::Failed(failure) => LookupState::Failed(stage_error(LOCATION_STAGE, failure)),
    }
}

fn after_weather(location: LocationRecord, outcome: StageOutcome<WeatherRecord>) -> LookupState {
    match weather_result(outcome, &location.city) {
        Ok(weather) => LookupState::Merged(MergedResult::new(location, weather)),
        Err(err) => LookupState::Failed(err),
    }
}

fn weather_result(outcome: StageOutcome<WeatherRecord>, city: &str) -> Result<WeatherRecord, LookupError> {
    match outcome {
        StageOutcome::Found(weather) => Ok(weather),
        StageOutcome::Empty(reason) => {
            if reason == EmptyReason::Abandoned {
                warn!(city, "weather stage abandoned, reporting as not found");
            }
            Err(LookupError::not_found(format!("weather could not be determined for city {city}")))
        }
        StageOutcome::Failed(failure) => Err(stage_error(WEATHER_STAGE, failure)),
    }
}

fn stage_error(supplier: &str, failure: StageFailure) -> LookupError {
    match failure {
        StageFailure::TimedOut(_) => {
            LookupError::timeout(format!("Error searching for {supplier}. Search time exceeded."))
        }
        StageFailure::Upstream(err) => {
            LookupError::bad_request(format!("Error searching for {supplier}. Request failed: {err}."))
        }
    }
}
