use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Stato di un job. Un unico campo copre le due fasi (encoding e callback).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobStatus {
    EncodingPending,
    EncodingRunning,
    EncodingFailed,
    EncodingSuccess,
    CallbackPending,
    CallbackRunning,
    CallbackSuccess,
    CallbackFailed,
}

impl JobStatus {
    pub const ALL: [JobStatus; 8] = [
        JobStatus::EncodingPending,
        JobStatus::EncodingRunning,
        JobStatus::EncodingFailed,
        JobStatus::EncodingSuccess,
        JobStatus::CallbackPending,
        JobStatus::CallbackRunning,
        JobStatus::CallbackSuccess,
        JobStatus::CallbackFailed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::EncodingPending => "encoding_pending",
            JobStatus::EncodingRunning => "encoding_running",
            JobStatus::EncodingFailed => "encoding_failed",
            JobStatus::EncodingSuccess => "encoding_success",
            JobStatus::CallbackPending => "callback_pending",
            JobStatus::CallbackRunning => "callback_running",
            JobStatus::CallbackSuccess => "callback_success",
            JobStatus::CallbackFailed => "callback_failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|status| status.as_str() == s)
    }

    /// Stati da cui `self` può essere raggiunto con una scrittura di stato.
    ///
    /// Il reset di recovery (running -> pending) non passa da qui.
    pub fn predecessors(&self) -> &'static [JobStatus] {
        match self {
            JobStatus::EncodingPending => &[],
            JobStatus::EncodingRunning => &[JobStatus::EncodingPending, JobStatus::EncodingFailed],
            JobStatus::EncodingFailed => &[JobStatus::EncodingRunning],
            JobStatus::EncodingSuccess => &[JobStatus::EncodingRunning],
            JobStatus::CallbackPending => &[JobStatus::EncodingSuccess, JobStatus::CallbackRunning],
            JobStatus::CallbackRunning => &[JobStatus::CallbackPending],
            JobStatus::CallbackSuccess => &[JobStatus::CallbackRunning],
            // callback_pending -> callback_failed: tentativi esauriti prima del claim
            JobStatus::CallbackFailed => &[JobStatus::CallbackRunning, JobStatus::CallbackPending],
        }
    }

    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        next.predecessors().contains(self)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Fase di elaborazione di un job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Encoding,
    Callback,
}

impl Phase {
    /// Stati da cui un worker della fase può fare claim
    pub fn claimable_statuses(&self) -> &'static [JobStatus] {
        match self {
            Phase::Encoding => &[JobStatus::EncodingPending, JobStatus::EncodingFailed],
            Phase::Callback => &[JobStatus::CallbackPending],
        }
    }

    pub fn running_status(&self) -> JobStatus {
        match self {
            Phase::Encoding => JobStatus::EncodingRunning,
            Phase::Callback => JobStatus::CallbackRunning,
        }
    }

    /// Colonna del contatore di fallimenti della fase
    pub fn failure_column(&self) -> &'static str {
        match self {
            Phase::Encoding => "failed_count",
            Phase::Callback => "callback_failures",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Encoding => write!(f, "encoding"),
            Phase::Callback => write!(f, "callback"),
        }
    }
}

/// Record job nel database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct JobRecord {
    pub id: String,
    pub video_id: String,
    pub input_bucket: String,
    pub input_key: String,
    pub output_bucket: String,
    pub output_path: String,
    pub resolution: i64,
    pub crf: i64,
    pub callback_url: String,
    pub status: String,
    pub failed_count: i64,
    pub callback_failures: i64,
    pub created_at: String,
    pub updated_at: String,
}

/// Dati per la creazione di un job (un profilo di output)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewJob {
    pub video_id: String,
    pub input_bucket: String,
    pub input_key: String,
    pub output_bucket: String,
    pub output_path: String,
    pub resolution: i64,
    pub crf: i64,
    pub callback_url: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    pub id: Uuid,
    pub video_id: String,
    pub input_bucket: String,
    pub input_key: String,
    pub output_bucket: String,
    pub output_path: String,
    pub resolution: i64,
    pub crf: i64,
    pub callback_url: String,
    pub status: JobStatus,
    pub failed_count: i64,
    pub callback_failures: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// Nome del file prodotto dal transcoder, es. `720p.mp4`
    pub fn output_file_name(&self) -> String {
        format!("{}p.{}", self.resolution, crate::config::OUTPUT_EXTENSION)
    }

    /// Chiave dell'oggetto di output nel bucket di destinazione
    pub fn output_key(&self) -> String {
        crate::utils::join_object_key(&self.output_path, &self.output_file_name())
    }
}

impl TryFrom<JobRecord> for Job {
    type Error = String;

    fn try_from(r: JobRecord) -> Result<Self, Self::Error> {
        let id = Uuid::parse_str(&r.id).map_err(|e| format!("ID job non valido {}: {}", r.id, e))?;
        let status = JobStatus::parse(&r.status)
            .ok_or_else(|| format!("Stato sconosciuto per job {}: {}", r.id, r.status))?;

        Ok(Job {
            id,
            video_id: r.video_id,
            input_bucket: r.input_bucket,
            input_key: r.input_key,
            output_bucket: r.output_bucket,
            output_path: r.output_path,
            resolution: r.resolution,
            crf: r.crf,
            callback_url: r.callback_url,
            status,
            failed_count: r.failed_count,
            callback_failures: r.callback_failures,
            created_at: parse_timestamp(&r.id, &r.created_at)?,
            updated_at: parse_timestamp(&r.id, &r.updated_at)?,
        })
    }
}

fn parse_timestamp(id: &str, s: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| format!("Timestamp non valido per job {}: {} ({})", id, s, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip_names() {
        for status in JobStatus::ALL {
            assert_eq!(JobStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(JobStatus::parse("processing"), None);
    }

    #[test]
    fn test_encoding_phase_transitions() {
        use JobStatus::*;
        assert!(EncodingPending.can_transition_to(EncodingRunning));
        assert!(EncodingFailed.can_transition_to(EncodingRunning));
        assert!(EncodingRunning.can_transition_to(EncodingSuccess));
        assert!(EncodingRunning.can_transition_to(EncodingFailed));
        assert!(!EncodingPending.can_transition_to(EncodingSuccess));
        assert!(!EncodingFailed.can_transition_to(EncodingSuccess));
    }

    #[test]
    fn test_no_skipped_intermediate_states() {
        use JobStatus::*;
        assert!(!EncodingPending.can_transition_to(CallbackSuccess));
        assert!(!EncodingPending.can_transition_to(CallbackPending));
        assert!(!EncodingRunning.can_transition_to(CallbackPending));
        assert!(!EncodingSuccess.can_transition_to(CallbackRunning));
        assert!(!CallbackPending.can_transition_to(CallbackSuccess));
        assert!(EncodingSuccess.can_transition_to(CallbackPending));
    }

    #[test]
    fn test_terminal_states_have_no_successors() {
        for from in [JobStatus::CallbackSuccess, JobStatus::CallbackFailed] {
            for to in JobStatus::ALL {
                assert!(!from.can_transition_to(to), "{} -> {}", from, to);
            }
        }
    }

    #[test]
    fn test_callback_retry_loop() {
        use JobStatus::*;
        assert!(CallbackRunning.can_transition_to(CallbackPending));
        assert!(CallbackRunning.can_transition_to(CallbackFailed));
        assert!(CallbackPending.can_transition_to(CallbackFailed));
        assert!(!CallbackFailed.can_transition_to(CallbackPending));
    }

    #[test]
    fn test_phase_running_status() {
        assert_eq!(Phase::Encoding.running_status(), JobStatus::EncodingRunning);
        assert_eq!(Phase::Callback.running_status(), JobStatus::CallbackRunning);
        for phase in [Phase::Encoding, Phase::Callback] {
            for status in phase.claimable_statuses() {
                assert!(status.can_transition_to(phase.running_status()));
            }
        }
    }

    #[test]
    fn test_output_key_from_base_path() {
        let record = JobRecord {
            id: Uuid::new_v4().to_string(),
            video_id: "vid".to_string(),
            input_bucket: "in".to_string(),
            input_key: "raw/video.mov".to_string(),
            output_bucket: "out".to_string(),
            output_path: "videos/vid/".to_string(),
            resolution: 720,
            crf: 23,
            callback_url: "http://example.test/cb".to_string(),
            status: "encoding_pending".to_string(),
            failed_count: 0,
            callback_failures: 0,
            created_at: Utc::now().to_rfc3339(),
            updated_at: Utc::now().to_rfc3339(),
        };
        let job = Job::try_from(record).unwrap();
        assert_eq!(job.output_file_name(), "720p.mp4");
        assert_eq!(job.output_key(), "videos/vid/720p.mp4");
    }

    #[test]
    fn test_unknown_status_is_rejected() {
        let record = JobRecord {
            id: Uuid::new_v4().to_string(),
            video_id: "vid".to_string(),
            input_bucket: "in".to_string(),
            input_key: "k".to_string(),
            output_bucket: "out".to_string(),
            output_path: "p".to_string(),
            resolution: 0,
            crf: 0,
            callback_url: "http://example.test/cb".to_string(),
            status: "completed".to_string(),
            failed_count: 0,
            callback_failures: 0,
            created_at: Utc::now().to_rfc3339(),
            updated_at: Utc::now().to_rfc3339(),
        };
        assert!(Job::try_from(record).is_err());
    }

    #[test]
    fn test_malformed_timestamp_is_rejected() {
        let record = JobRecord {
            id: Uuid::new_v4().to_string(),
            video_id: "vid".to_string(),
            input_bucket: "in".to_string(),
            input_key: "k".to_string(),
            output_bucket: "out".to_string(),
            output_path: "p".to_string(),
            resolution: 720,
            crf: 23,
            callback_url: "http://example.test/cb".to_string(),
            status: "encoding_pending".to_string(),
            failed_count: 0,
            callback_failures: 0,
            created_at: "ieri".to_string(),
            updated_at: Utc::now().to_rfc3339(),
        };
        let err = Job::try_from(record).unwrap_err();
        assert!(err.contains("ieri"));
    }
}
