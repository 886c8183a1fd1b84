//! Client for an HTTP object-detection sidecar.
//!
//! The sidecar owns the camera and the detector; this side only asks
//! questions about the latest frame:
//!
//! - `GET /center`  → `{"label": "cup", "color": "red"}` (label may be null)
//! - `GET /objects` → `{"objects": ["cup", "person"]}`
//! - `GET /scene`   → `{"summary": "I can see a person and a cup."}`
//!
//! A `503` means the sidecar has no frame (camera unavailable).

use super::{CenterObject, Vision};
use crate::error::{AssistantError, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde::de::DeserializeOwned;

#[derive(Deserialize)]
struct CenterResponse {
    #[serde(default)]
    label: Option<String>,
    #[serde(default)]
    color: Option<String>,
}

#[derive(Deserialize)]
struct ObjectsResponse {
    #[serde(default)]
    objects: Vec<String>,
}

#[derive(Deserialize)]
struct SceneResponse {
    summary: String,
}

pub struct HttpVision {
    client: reqwest::Client,
    base_url: String,
}

impl HttpVision {
    pub fn new(base_url: &str, client: reqwest::Client) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
        }
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self
            .client
            .get(format!("{}/{path}", self.base_url))
            .send()
            .await
            .map_err(|e| AssistantError::Service(format!("vision: {e}")))?;
        if response.status() == StatusCode::SERVICE_UNAVAILABLE {
            return Err(AssistantError::Unavailable("camera".into()));
        }
        if !response.status().is_success() {
            return Err(AssistantError::Service(format!(
                "vision: HTTP {}",
                response.status()
            )));
        }
        response
            .json()
            .await
            .map_err(|e| AssistantError::Service(format!("vision: bad response: {e}")))
    }
}

#[async_trait]
impl Vision for HttpVision {
    async fn center_object(&self) -> Result<Option<CenterObject>> {
        let body: CenterResponse = self.get("center").await?;
        Ok(body.label.filter(|l| !l.is_empty()).map(|label| CenterObject {
            label,
            color: body.color.filter(|c| !c.is_empty() && c != "unknown"),
        }))
    }

    async fn object_names(&self) -> Result<Vec<String>> {
        let body: ObjectsResponse = self.get("objects").await?;
        Ok(body.objects)
    }

    async fn describe_scene(&self) -> Result<String> {
        let body: SceneResponse = self.get("scene").await?;
        Ok(body.summary)
    }
}
