//! Invocazione del transcoder esterno (ffmpeg)

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum TranscodeError {
    #[error("Impossibile avviare {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Transcoder terminato con codice {0:?}")]
    ExitStatus(Option<i32>),

    #[error("Transcoder interrotto dopo {0} secondi")]
    Timeout(u64),

    #[error("Errore di I/O: {0}")]
    Io(#[from] std::io::Error),
}

#[async_trait]
pub trait Transcoder: Send + Sync {
    async fn transcode(
        &self,
        input: &Path,
        output: &Path,
        resolution: i64,
        crf: i64,
    ) -> Result<(), TranscodeError>;
}

/// Transcoder basato su ffmpeg (libx264)
#[derive(Debug, Clone)]
pub struct FfmpegTranscoder {
    program: PathBuf,
    timeout: Duration,
}

impl FfmpegTranscoder {
    pub fn new(program: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }

    pub fn build_args(input: &Path, output: &Path, resolution: i64, crf: i64) -> Vec<String> {
        vec![
            "-y".to_string(),
            "-i".to_string(),
            input.to_string_lossy().to_string(),
            "-vf".to_string(),
            format!("scale=-2:{}", resolution),
            "-c:v".to_string(),
            "libx264".to_string(),
            "-preset".to_string(),
            "fast".to_string(),
            "-crf".to_string(),
            crf.to_string(),
            output.to_string_lossy().to_string(),
        ]
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn transcode(
        &self,
        input: &Path,
        output: &Path,
        resolution: i64,
        crf: i64,
    ) -> Result<(), TranscodeError> {
        let args = Self::build_args(input, output, resolution, crf);
        info!(
            "Avvio transcodifica: {} {}",
            self.program.display(),
            args.join(" ")
        );

        let mut child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| TranscodeError::Spawn {
                program: self.program.display().to_string(),
                source,
            })?;

        // Svuota stderr mentre il processo gira, altrimenti ffmpeg si blocca a pipe piena
        let drain = child.stderr.take().map(|stderr| {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(target: "video_processor::ffmpeg", "{}", line);
                }
            })
        });

        let status = match tokio::time::timeout(self.timeout, child.wait()).await {
            Ok(status) => status?,
            Err(_) => {
                warn!(
                    "Transcodifica oltre {} secondi, termino il processo",
                    self.timeout.as_secs()
                );
                child.kill().await.ok();
                if let Some(handle) = drain {
                    handle.await.ok();
                }
                return Err(TranscodeError::Timeout(self.timeout.as_secs()));
            }
        };

        if let Some(handle) = drain {
            handle.await.ok();
        }

        if !status.success() {
            return Err(TranscodeError::ExitStatus(status.code()));
        }

        info!("Transcodifica completata: {}", output.display());
        Ok(())
    }
}
