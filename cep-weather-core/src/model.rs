use serde::{Deserialize, Serialize};

/// Offset added to Celsius to obtain Kelvin. The weather upstream never supplies Kelvin.
pub const KELVIN_OFFSET: f64 = 273.0;

/// Address resolved from a postal code, using the postal service's wire names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocationRecord {
    #[serde(rename = "cep")]
    pub code: String,
    #[serde(rename = "logradouro")]
    pub street: String,
    #[serde(rename = "bairro")]
    pub district: String,
    #[serde(rename = "localidade")]
    pub city: String,
    #[serde(rename = "uf")]
    pub state: String,
}

impl LocationRecord {
    /// An empty city means the code could not be resolved.
    pub fn is_located(&self) -> bool {
        !self.city.trim().is_empty()
    }
}

/// Celsius, Fahrenheit and the derived Kelvin.
///
/// Decoding reads only `temp_c` and `temp_f`; `temp_k` is always recomputed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "WeatherWire")]
pub struct WeatherRecord {
    temp_c: f64,
    temp_f: f64,
    temp_k: f64,
}

impl WeatherRecord {
    pub fn new(celsius: f64, fahrenheit: f64) -> Self {
        Self { temp_c: celsius, temp_f: fahrenheit, temp_k: celsius + KELVIN_OFFSET }
    }

    pub fn celsius(&self) -> f64 {
        self.temp_c
    }

    pub fn fahrenheit(&self) -> f64 {
        self.temp_f
    }

    pub fn kelvin(&self) -> f64 {
        self.temp_k
    }
}

#[derive(Deserialize)]
struct WeatherWire {
    temp_c: f64,
    temp_f: f64,
}

impl From<WeatherWire> for WeatherRecord {
    fn from(wire: WeatherWire) -> Self {
        Self::new(wire.temp_c, wire.temp_f)
    }
}

/// Successful lookup payload: the address followed by the three temperatures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedResult {
    #[serde(flatten)]
    pub location: LocationRecord,
    #[serde(flatten)]
    pub weather: WeatherRecord,
}

impl MergedResult {
    pub fn new(location: LocationRecord, weather: WeatherRecord) -> Self {
        Self { location, weather }
    }
}
