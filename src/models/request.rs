use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::NewJob;

/// Posizione del video sorgente
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct InputLocation {
    #[serde(default)]
    pub bucket: String,
    #[serde(default)]
    pub key: String,
}

/// Destinazione dei file transcodificati
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OutputLocation {
    #[serde(default)]
    pub bucket: String,
    #[serde(default)]
    pub base_path: String,
}

/// Profilo di output: risoluzione verticale e CRF
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct Profile {
    /// Altezza in pixel (es. "720"); valori non numerici diventano 0
    #[serde(default)]
    pub resolution: String,
    #[serde(default)]
    pub crf: i64,
}

impl Profile {
    pub fn parsed_resolution(&self) -> i64 {
        self.resolution.parse().unwrap_or(0)
    }
}

/// Richiesta di transcodifica ricevuta dall'ingress
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProcessVideoRequest {
    #[serde(default)]
    pub video_id: String,
    #[serde(default)]
    pub input: InputLocation,
    #[serde(default)]
    pub output: OutputLocation,
    #[serde(default)]
    pub profiles: Vec<Profile>,
    #[serde(default)]
    pub callback_url: String,
}

impl ProcessVideoRequest {
    /// Un job per ogni profilo richiesto
    pub fn to_new_jobs(&self) -> Vec<NewJob> {
        self.profiles
            .iter()
            .map(|profile| NewJob {
                video_id: self.video_id.clone(),
                input_bucket: self.input.bucket.clone(),
                input_key: self.input.key.clone(),
                output_bucket: self.output.bucket.clone(),
                output_path: self.output.base_path.clone(),
                resolution: profile.parsed_resolution(),
                crf: profile.crf,
                callback_url: self.callback_url.clone(),
            })
            .collect()
    }
}
