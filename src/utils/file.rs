use std::path::{Path, PathBuf};
use std::process::Command;

use uuid::Uuid;

/// Percorsi locali usati da un worker per un singolo job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagingPaths {
    /// Directory del sorgente scaricato
    pub input_dir: PathBuf,
    /// File sorgente scaricato
    pub input_file: PathBuf,
    /// Directory dell'output del transcoder
    pub output_dir: PathBuf,
    /// File prodotto dal transcoder
    pub output_file: PathBuf,
}

impl StagingPaths {
    /// I percorsi includono l'ID del job: due profili dello stesso sorgente
    /// non condividono mai file locali.
    pub fn for_job(
        raw_root: &Path,
        processed_root: &Path,
        job_id: &Uuid,
        input_key: &str,
        output_file_name: &str,
    ) -> Self {
        let input_dir = raw_root.join(job_id.to_string());
        let output_dir = processed_root.join(job_id.to_string());
        Self {
            input_file: input_dir.join(key_file_name(input_key)),
            output_file: output_dir.join(output_file_name),
            input_dir,
            output_dir,
        }
    }
}

/// Ultimo segmento di una chiave object storage, utilizzabile come nome file
pub fn key_file_name(key: &str) -> String {
    key.rsplit('/')
        .find(|segment| !segment.is_empty() && *segment != "." && *segment != "..")
        .unwrap_or("input")
        .to_string()
}

/// Unisce base path e nome file in una chiave con separatore `/`
pub fn join_object_key(base_path: &str, file_name: &str) -> String {
    let base = base_path.trim_matches('/');
    if base.is_empty() {
        file_name.to_string()
    } else {
        format!("{}/{}", base, file_name)
    }
}

/// Rimuove una directory; una directory già assente non è un errore
pub async fn remove_dir_if_exists(path: &Path) -> std::io::Result<()> {
    match tokio::fs::remove_dir_all(path).await {
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

pub fn check_ffmpeg_available(program: &str) -> bool {
    Command::new(program)
        .arg("-version")
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_staging_paths_are_job_scoped() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let raw = Path::new("/tmp/raw");
        let out = Path::new("/tmp/out");

        let pa = StagingPaths::for_job(raw, out, &a, "uploads/vid/source.mov", "720p.mp4");
        let pb = StagingPaths::for_job(raw, out, &b, "uploads/vid/source.mov", "1080p.mp4");

        assert_eq!(pa.input_file, raw.join(a.to_string()).join("source.mov"));
        assert_eq!(pa.output_file, out.join(a.to_string()).join("720p.mp4"));
        assert_ne!(pa.input_file, pb.input_file);
        assert_ne!(pa.output_dir, pb.output_dir);
    }

    #[test]
    fn test_key_file_name() {
        assert_eq!(key_file_name("a/b/c.mov"), "c.mov");
        assert_eq!(key_file_name("c.mov"), "c.mov");
        assert_eq!(key_file_name("a/b/"), "b");
        assert_eq!(key_file_name("../.."), "input");
        assert_eq!(key_file_name(""), "input");
    }

    #[test]
    fn test_join_object_key() {
        assert_eq!(join_object_key("videos/vid", "720p.mp4"), "videos/vid/720p.mp4");
        assert_eq!(join_object_key("/videos/vid/", "720p.mp4"), "videos/vid/720p.mp4");
        assert_eq!(join_object_key("", "720p.mp4"), "720p.mp4");
    }

    #[tokio::test]
    async fn test_remove_missing_dir_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("never-created");
        remove_dir_if_exists(&target).await.unwrap();

        tokio::fs::create_dir_all(target.join("nested")).await.unwrap();
        remove_dir_if_exists(&target).await.unwrap();
        assert!(!target.exists());
    }
}
