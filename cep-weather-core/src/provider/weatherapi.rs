use async_trait::async_trait;
use serde::Deserialize;
use tracing::{info, warn};

use crate::{
    WeatherRecord,
    stage::{EmptyReason, StageOutcome, StageScope},
    upstream::UpstreamClient,
};

use super::WeatherProvider;

/// Base of the current-conditions endpoint; the API key is appended directly.
pub const DEFAULT_BASE_URL: &str = "http://api.weatherapi.com/v1/current.json?key=";

/// Accented letters the weather query parser rejects, with their ASCII replacements.
#[rustfmt::skip]
const ACCENTS: &[(char, char)] = &[
    ('á', 'a'), ('é', 'e'), ('í', 'i'), ('ó', 'o'), ('ú', 'u'),
    ('à', 'a'), ('è', 'e'), ('ì', 'i'), ('ò', 'o'), ('ù', 'u'),
    ('ã', 'a'), ('õ', 'o'),
    ('â', 'a'), ('ê', 'e'), ('î', 'i'), ('ô', 'o'), ('û', 'u'),
    ('ç', 'c'),
    ('Á', 'A'), ('É', 'E'), ('Í', 'I'), ('Ó', 'O'), ('Ú', 'U'),
    ('À', 'A'), ('È', 'E'), ('Ì', 'I'), ('Ò', 'O'), ('Ù', 'U'),
    ('Ã', 'A'), ('Õ', 'O'),
    ('Â', 'A'), ('Ê', 'E'), ('Î', 'I'), ('Ô', 'O'), ('Û', 'U'),
    ('Ç', 'C'),
];

/// Strip accents, then percent-encode the rest (spaces become `%20`) so the city can go
/// straight into `q=` without adding parameters of its own.
pub fn normalize_city(city: &str) -> String {
    let plain: String = city
        .chars()
        .map(|c| ACCENTS.iter().find(|(accented, _)| *accented == c).map_or(c, |(_, plain)| *plain))
        .collect();
    urlencoding::encode(&plain).into_owned()
}

#[derive(Debug, Clone)]
pub struct WeatherApiProvider {
    client: UpstreamClient,
    base_url: String,
}

impl WeatherApiProvider {
    pub fn new(client: UpstreamClient, weather_url: &str, api_key: &str) -> Self {
        Self { client, base_url: format!("{weather_url}{api_key}") }
    }

    pub fn url_for(&self, city: &str) -> String {
        format!("{}&q={}", self.base_url, normalize_city(city))
    }
}

#[async_trait]
impl WeatherProvider for WeatherApiProvider {
    async fn resolve_weather(&self, stage: &StageScope, city: &str) -> StageOutcome<WeatherRecord> {
        let result = self.client.fetch(stage, &self.url_for(city)).await;
        let body = match stage.settle(result) {
            Ok(body) => body,
            Err(outcome) => return outcome,
        };

        parse_weather(&body, city)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WaLocation {
    name: String,
    country: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WaCondition {
    text: String,
}

// Any Kelvin the upstream might send is deliberately not read.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WaCurrent {
    temp_c: f64,
    temp_f: f64,
    condition: WaCondition,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WaResponse {
    location: WaLocation,
    current: WaCurrent,
}

fn parse_weather(body: &[u8], city: &str) -> StageOutcome<WeatherRecord> {
    let parsed: WaResponse = match serde_json::from_slice(body) {
        Ok(parsed) => parsed,
        Err(err) => {
            warn!(city, error = %err, "failed to parse weather payload");
            return StageOutcome::Empty(EmptyReason::Unparseable);
        }
    };

    if parsed.location.name.trim().is_empty() {
        return StageOutcome::Empty(EmptyReason::NotFound);
    }

    let record = WeatherRecord::new(parsed.current.temp_c, parsed.current.temp_f);
    info!(
        city = %parsed.location.name,
        country = %parsed.location.country,
        celsius = record.celsius(),
        fahrenheit = record.fahrenheit(),
        kelvin = record.kelvin(),
        condition = %parsed.current.condition.text,
        "weather collected"
    );

    StageOutcome::Found(record)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_accents_and_spaces() {
        assert_eq!(normalize_city("São Paulo"), "Sao%20Paulo");
        assert_eq!(normalize_city("Florianópolis"), "Florianopolis");
        assert_eq!(normalize_city("Foz do Iguaçu"), "Foz%20do%20Iguacu");
        assert_eq!(normalize_city("ÁGUA BRANCA"), "AGUA%20BRANCA");
        assert_eq!(normalize_city("Curitiba"), "Curitiba");
    }

    #[test]
    fn query_delimiters_in_city_are_encoded() {
        assert_eq!(normalize_city("x&key=OTHER"), "x%26key%3DOTHER");
        assert_eq!(normalize_city("a#b+c%d"), "a%23b%2Bc%25d");

        let provider = WeatherApiProvider::new(UpstreamClient::new(), DEFAULT_BASE_URL, "KEY");
        assert_eq!(
            provider.url_for("x&key=OTHER"),
            "http://api.weatherapi.com/v1/current.json?key=KEY&q=x%26key%3DOTHER"
        );
    }

    #[test]
    fn url_appends_key_and_query() {
        let provider = WeatherApiProvider::new(UpstreamClient::new(), DEFAULT_BASE_URL, "KEY");

        assert_eq!(
            provider.url_for("Vitória da Conquista"),
            "http://api.weatherapi.com/v1/current.json?key=KEY&q=Vitoria%20da%20Conquista"
        );
    }

    #[test]
    fn kelvin_is_computed_not_read() {
        let body = br#"{
            "location": {"name": "Sao Paulo", "country": "Brazil"},
            "current": {"temp_c": 14.2, "temp_f": 57.6, "temp_k": 999.0, "condition": {"text": "Mist"}}
        }"#;

        let record = parse_weather(body, "São Paulo").found().unwrap();
        assert_eq!(record.celsius(), 14.2);
        assert_eq!(record.fahrenheit(), 57.6);
        assert_eq!(record.kelvin(), 14.2 + 273.0);
    }

    #[test]
    fn missing_location_is_not_found() {
        let body = br#"{"error": {"code": 1006, "message": "No matching location found."}}"#;
        assert!(matches!(parse_weather(body, "Nowhere"), StageOutcome::Empty(EmptyReason::NotFound)));
    }

    #[test]
    fn malformed_payload_is_unparseable() {
        assert!(matches!(parse_weather(b"not json", "X"), StageOutcome::Empty(EmptyReason::Unparseable)));
    }
}
