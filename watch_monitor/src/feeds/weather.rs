use std::sync::Arc;

use serde::Deserialize;
use watch_common::{MonitorError, Result};

use crate::http_client::{BoxFuture, HttpClient, HttpRequest};
use crate::location::Coordinates;

const KELVIN_OFFSET: f64 = 273.15;

/// Current conditions at the device location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeatherRecord {
    pub temperature_celsius: i32,
    pub condition: String,
}

/// Issues one request for the given coordinates.
pub trait WeatherSource: Send + Sync {
    fn fetch(&self, coordinates: Coordinates) -> BoxFuture<'_, Result<WeatherRecord>>;
}

/// OpenWeatherMap current weather endpoint.
pub struct OpenWeatherSource {
    http_client: Arc<dyn HttpClient>,
    endpoint: String,
    api_key: Option<String>,
}

impl OpenWeatherSource {
    pub fn new(
        http_client: Arc<dyn HttpClient>,
        endpoint: impl Into<String>,
        api_key: Option<String>,
    ) -> Self {
        Self {
            http_client,
            endpoint: endpoint.into(),
            api_key,
        }
    }

    pub fn url(&self, coordinates: Coordinates) -> String {
        let mut url = format!(
            "{}?lat={}&lon={}",
            self.endpoint, coordinates.latitude, coordinates.longitude
        );
        if let Some(key) = &self.api_key {
            url.push_str("&appid=");
            url.push_str(&urlencoding::encode(key));
        }
        url
    }
}

impl WeatherSource for OpenWeatherSource {
    fn fetch(&self, coordinates: Coordinates) -> BoxFuture<'_, Result<WeatherRecord>> {
        Box::pin(async move {
            let request = HttpRequest::get(self.url(coordinates));
            let body = self.http_client.execute(request).await?.into_success_body()?;
            parse_weather(&body)
        })
    }
}

#[derive(Debug, Deserialize)]
struct WeatherBody {
    main: Option<MainBlock>,
    weather: Option<Vec<ConditionBlock>>,
}

#[derive(Debug, Deserialize)]
struct MainBlock {
    temp: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ConditionBlock {
    main: Option<String>,
}

pub(crate) fn parse_weather(body: &str) -> Result<WeatherRecord> {
    let parsed: WeatherBody = serde_json::from_str(body)
        .map_err(|e| MonitorError::MalformedResponse(format!("weather feed: {e}")))?;

    let kelvin = parsed
        .main
        .and_then(|main| main.temp)
        .ok_or_else(|| malformed("main.temp is missing"))?;
    let temperature_celsius = kelvin_to_celsius(kelvin)?;

    let condition = parsed
        .weather
        .and_then(|conditions| conditions.into_iter().next())
        .and_then(|condition| condition.main)
        .filter(|label| !label.trim().is_empty())
        .ok_or_else(|| malformed("weather[0].main is missing"))?;

    Ok(WeatherRecord {
        temperature_celsius,
        condition,
    })
}

/// Kelvin to whole degrees Celsius, halves rounded up.
pub fn kelvin_to_celsius(kelvin: f64) -> Result<i32> {
    let celsius = (kelvin - KELVIN_OFFSET + 0.5).floor();
    if !celsius.is_finite() || celsius < f64::from(i32::MIN) || celsius > f64::from(i32::MAX) {
        return Err(malformed("main.temp is out of range"));
    }
    Ok(celsius as i32)
}

fn malformed(reason: &str) -> MonitorError {
    MonitorError::MalformedResponse(format!("weather feed: {reason}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http_client::testing::RecordingHttpClient;

    #[test]
    fn converts_kelvin_and_reads_first_condition() {
        let body = r#"{"main":{"temp":280.32,"pressure":1012},
            "weather":[{"id":300,"main":"Drizzle"},{"id":701,"main":"Mist"}]}"#;
        let record = parse_weather(body).expect("valid body");

        assert_eq!(
            record,
            WeatherRecord {
                temperature_celsius: 7,
                condition: String::from("Drizzle"),
            }
        );
    }

    #[test]
    fn rounds_like_the_device_expects() {
        assert_eq!(kelvin_to_celsius(268.0).expect("in range"), -5);
        assert_eq!(kelvin_to_celsius(273.15).expect("in range"), 0);
        assert_eq!(kelvin_to_celsius(300.0).expect("in range"), 27);
    }

    #[test]
    fn rejects_empty_condition_list() {
        let err = parse_weather(r#"{"main":{"temp":290.0},"weather":[]}"#).expect_err("empty");
        assert!(matches!(err, MonitorError::MalformedResponse(reason) if reason.contains("weather[0]")));
    }

    #[test]
    fn rejects_missing_temperature() {
        let err = parse_weather(r#"{"weather":[{"main":"Clear"}]}"#).expect_err("no temp");
        assert!(matches!(err, MonitorError::MalformedResponse(reason) if reason.contains("main.temp")));
    }

    #[test]
    fn url_carries_coordinates_and_optional_key() {
        let coordinates = Coordinates::new(51.5, -0.12).expect("valid");
        let without_key =
            OpenWeatherSource::new(RecordingHttpClient::json("{}"), "http://owm.test/weather", None);
        assert_eq!(
            without_key.url(coordinates),
            "http://owm.test/weather?lat=51.5&lon=-0.12"
        );

        let with_key = OpenWeatherSource::new(
            RecordingHttpClient::json("{}"),
            "http://owm.test/weather",
            Some(String::from("k&y")),
        );
        assert!(with_key.url(coordinates).ends_with("&appid=k%26y"));
    }

    #[tokio::test]
    async fn fetch_returns_the_parsed_record() {
        let client = RecordingHttpClient::json(r#"{"main":{"temp":295.0},"weather":[{"main":"Clouds"}]}"#);
        let source = OpenWeatherSource::new(client.clone(), "http://owm.test/weather", None);

        let record = source
            .fetch(Coordinates::new(0.0, 0.0).expect("valid"))
            .await
            .expect("fetch succeeds");

        assert_eq!(record.temperature_celsius, 22);
        assert_eq!(record.condition, "Clouds");
        assert_eq!(client.recorded_requests().len(), 1);
    }
}
