use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Timeline payload returned by the upstream weather service.
///
/// `resolvedAddress`, `address` and `timezone` are required; a body missing
/// any of them is treated as unparseable. Fields not modelled here are kept
/// in `extra` and relayed untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherObject {
    #[serde(default)]
    pub query_cost: Option<i64>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    pub resolved_address: String,
    pub address: String,
    pub timezone: String,
    #[serde(default)]
    pub tzoffset: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub days: Option<Vec<Day>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stations: Option<HashMap<String, Station>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_conditions: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alerts: Option<Vec<Value>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One day of the timeline. Only the commonly used readings are typed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Day {
    pub datetime: String,
    #[serde(default, rename = "datetimeEpoch")]
    pub datetime_epoch: Option<i64>,
    #[serde(default)]
    pub tempmax: Option<f64>,
    #[serde(default)]
    pub tempmin: Option<f64>,
    #[serde(default)]
    pub temp: Option<f64>,
    #[serde(default)]
    pub humidity: Option<f64>,
    #[serde(default)]
    pub conditions: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Station {
    #[serde(default)]
    pub distance: f64,
    #[serde(default)]
    pub latitude: f64,
    #[serde(default)]
    pub longitude: f64,
    #[serde(default)]
    pub use_count: i64,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub quality: i64,
    #[serde(default)]
    pub contribution: f64,
}

/// What a successful upstream call yields: parsed JSON, or CSV relayed verbatim
/// when the caller asked for `contentType=csv`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WeatherData {
    Timeline(Box<WeatherObject>),
    Csv(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &str = r#"{
        "queryCost": 1,
        "latitude": 51.5064,
        "longitude": -0.12721,
        "resolvedAddress": "London, England, United Kingdom",
        "address": "London,UK",
        "timezone": "Europe/London",
        "tzoffset": 0.0,
        "days": [{"datetime": "2024-01-01", "tempmax": 9.1, "tempmin": 4.0, "sunrise": "08:06:01"}],
        "stations": {"EGLC": {"distance": 13336.0, "latitude": 51.5, "longitude": 0.05,
                              "useCount": 0, "id": "EGLC", "name": "EGLC", "quality": 50,
                              "contribution": 0.0}}
    }"#;

    #[test]
    fn parses_timeline_payload() {
        let obj: WeatherObject = serde_json::from_str(BODY).unwrap();
        assert_eq!(obj.timezone, "Europe/London");
        assert_eq!(obj.query_cost, Some(1));
        let day = &obj.days.as_ref().unwrap()[0];
        assert_eq!(day.tempmax, Some(9.1));
        assert_eq!(day.extra["sunrise"], "08:06:01");
        assert_eq!(obj.stations.as_ref().unwrap()["EGLC"].quality, 50);
    }

    #[test]
    fn missing_required_field_fails() {
        let err = serde_json::from_str::<WeatherObject>(r#"{"address": "x"}"#);
        assert!(err.is_err());
    }

    #[test]
    fn unmodelled_fields_are_relayed() {
        let body = r#"{"resolvedAddress":"a","address":"b","timezone":"UTC","source":"obs"}"#;
        let obj: WeatherObject = serde_json::from_str(body).unwrap();
        let back = serde_json::to_value(&obj).unwrap();
        assert_eq!(back["source"], "obs");
        assert_eq!(back["resolvedAddress"], "a");
    }
}
