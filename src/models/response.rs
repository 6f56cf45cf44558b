use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::Job;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub ffmpeg_available: bool,
}

/// Risposta dell'ingress: nessun ID job viene restituito
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AcceptedResponse {
    pub status: String,
}

impl AcceptedResponse {
    pub fn accepted() -> Self {
        Self {
            status: "accepted".to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub status: u16,
}

/// Esito di un singolo output nel payload del webhook
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct OutputResult {
    pub resolution: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    pub status: String,
}

/// Corpo della POST inviata al callback URL
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct CallbackPayload {
    #[schema(value_type = String)]
    pub job_id: Uuid,
    pub video_id: String,
    pub status: String,
    pub outputs: Vec<OutputResult>,
}

impl CallbackPayload {
    /// Payload per un job la cui fase di encoding è terminata con successo
    pub fn for_encoded_job(job: &Job) -> Self {
        Self {
            job_id: job.id,
            video_id: job.video_id.clone(),
            status: "success".to_string(),
            outputs: vec![OutputResult {
                resolution: format!("{}p", job.resolution),
                key: Some(job.output_key()),
                status: "success".to_string(),
            }],
        }
    }
}
