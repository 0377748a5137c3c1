//! Cliente HTTPS da API de clima (weather.com PWS ou compatível).

use chrono::Utc;
use dew_core::Reading;
use dew_core::sampler::{FetchError, WeatherSource, parse_observation};
use std::time::Duration;

pub struct HttpWeatherSource {
    agent: ureq::Agent,
    url: String,
}

impl HttpWeatherSource {
    /// `timeout` limita a requisição inteira; um servidor travado nunca
    /// segura a tarefa de amostragem além disso.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            agent: ureq::AgentBuilder::new().timeout(timeout).build(),
            url: url.into(),
        }
    }
}

impl WeatherSource for HttpWeatherSource {
    fn fetch(&self) -> Result<Reading, FetchError> {
        let response = self.agent.get(&self.url).call().map_err(|e| match e {
            ureq::Error::Status(code, _) => FetchError::Status(code),
            ureq::Error::Transport(t) => FetchError::Network(t.to_string()),
        })?;
        let body = response
            .into_string()
            .map_err(|e| FetchError::Network(e.to_string()))?;
        parse_observation(&body, Utc::now())
    }
}

/// URL sem query string, para logs (a query carrega a apiKey).
pub fn redacted_url(url: &str) -> &str {
    url.split_once('?').map(|(base, _)| base).unwrap_or(url)
}
