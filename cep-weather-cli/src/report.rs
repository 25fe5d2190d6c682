use std::fmt::Write;

use cep_weather_core::{MergedResult, WeatherRecord};

/// Address and climate block printed by `lookup` and `query`.
pub fn merged(result: &MergedResult) -> String {
    let location = &result.location;
    let mut out = String::new();

    let _ = writeln!(out, "Address");
    let _ = writeln!(out, " Street:   {}", location.street);
    let _ = writeln!(out, " District: {}", location.district);
    let _ = writeln!(out, " City:     {}", location.city);
    let _ = writeln!(out, " State:    {}", location.state);
    let _ = writeln!(out, " CEP:      {}", location.code);
    let _ = writeln!(out);
    out.push_str(&climate(&result.weather));

    out
}

pub fn weather(city: &str, weather: &WeatherRecord) -> String {
    format!("{city}\n{}", climate(weather))
}

fn climate(weather: &WeatherRecord) -> String {
    format!(
        "Climate\n Celsius:    {:.1}\n Fahrenheit: {:.1}\n Kelvin:     {:.1}",
        weather.celsius(),
        weather.fahrenheit(),
        weather.kelvin(),
    )
}
