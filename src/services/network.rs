//! Public IP, IP geolocation and wttr.in weather.

use super::NetworkInfo;
use crate::config::ServicesConfig;
use crate::error::{AssistantError, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

#[derive(Deserialize)]
struct IpResponse {
    ip: String,
}

#[derive(Deserialize)]
struct LocationResponse {
    #[serde(default)]
    status: String,
    #[serde(default)]
    city: Option<String>,
    #[serde(rename = "regionName", default)]
    region_name: Option<String>,
    #[serde(default)]
    country: Option<String>,
}

impl LocationResponse {
    fn describe(self) -> Option<String> {
        if self.status != "success" {
            return None;
        }
        let parts: Vec<String> = [self.city, self.region_name, self.country]
            .into_iter()
            .flatten()
            .filter(|p| !p.is_empty())
            .collect();
        (!parts.is_empty()).then(|| parts.join(", "))
    }
}

pub struct HttpNetworkInfo {
    client: reqwest::Client,
    ip_url: String,
    location_url: String,
    weather_url: String,
}

impl HttpNetworkInfo {
    pub fn new(config: &ServicesConfig, client: reqwest::Client) -> Self {
        Self {
            client,
            ip_url: config.ip_url.clone(),
            location_url: config.location_url.clone(),
            weather_url: config.weather_url.trim_end_matches('/').to_owned(),
        }
    }
}

fn service_error(what: &str, e: reqwest::Error) -> AssistantError {
    AssistantError::Service(format!("{what}: {e}"))
}

#[async_trait]
impl NetworkInfo for HttpNetworkInfo {
    async fn public_ip(&self) -> Result<String> {
        let response = self
            .client
            .get(&self.ip_url)
            .send()
            .await
            .map_err(|e| service_error("ip lookup", e))?
            .error_for_status()
            .map_err(|e| service_error("ip lookup", e))?;
        let body: IpResponse = response
            .json()
            .await
            .map_err(|e| service_error("ip lookup", e))?;
        Ok(body.ip)
    }

    async fn location(&self) -> Result<Option<String>> {
        let response = self
            .client
            .get(&self.location_url)
            .send()
            .await
            .map_err(|e| service_error("location lookup", e))?;
        if !response.status().is_success() {
            warn!("location service returned {}", response.status());
            return Ok(None);
        }
        let body: LocationResponse = response
            .json()
            .await
            .map_err(|e| service_error("location lookup", e))?;
        Ok(body.describe())
    }

    async fn weather(&self, city: &str) -> Result<Option<String>> {
        let url = format!(
            "{}/{}?format=%C+%t",
            self.weather_url,
            urlencoding::encode(city)
        );
        debug!("weather lookup: {url}");
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| service_error("weather", e))?;
        if !response.status().is_success() {
            warn!("weather service returned {}", response.status());
            return Ok(None);
        }
        let text = response
            .text()
            .await
            .map_err(|e| service_error("weather", e))?;
        Ok(Some(text.trim().to_owned()))
    }
}
