use std::path::{Path, PathBuf};

use common::{storage::types::job_metadata::JobMetadata, utils::service_url::shorten_id};

/// Directory that receives a job's downloaded result:
/// `<root>/<artifact dir>/<stem of job name>_<short id>`.
pub fn output_dir(root: &Path, meta: &JobMetadata) -> PathBuf {
    let parent = Path::new(&meta.file_path)
        .parent()
        .unwrap_or_else(|| Path::new(""));
    let stem = Path::new(&meta.name)
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| meta.name.clone());

    root.join(parent)
        .join(format!("{stem}_{}", shorten_id(&meta.job_id)))
}

/// Keeps only the final component of a remote-advertised file name.
pub(crate) fn local_file_name(advertised: Option<&str>, fallback: &str) -> String {
    advertised
        .and_then(|name| Path::new(name).file_name())
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| fallback.to_string())
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn meta(name: &str, file_path: &str) -> JobMetadata {
        JobMetadata {
            job_id: "0f8fad5b-d9cb-469f-a165-70867728950e".into(),
            name: name.into(),
            file_path: file_path.into(),
            timestamp: Utc::now(),
            request_id: "sir-1".into(),
            instance_id: "i-1".into(),
            instance_type: "t3.small".into(),
            shared_dir: String::new(),
            extra: String::new(),
        }
    }

    #[test]
    fn sits_next_to_the_artifact() {
        let dir = output_dir(Path::new("/srv"), &meta("train.ipynb", "nb/exp/train.ipynb"));
        assert_eq!(dir, PathBuf::from("/srv/nb/exp/train_0f8fad5b"));
    }

    #[test]
    fn artifact_at_root_uses_root() {
        let dir = output_dir(Path::new("/srv"), &meta("nightly", "run.sh"));
        assert_eq!(dir, PathBuf::from("/srv/nightly_0f8fad5b"));
    }

    #[test]
    fn advertised_names_lose_directories() {
        assert_eq!(local_file_name(Some("../../etc/out.zip"), "x"), "out.zip");
        assert_eq!(local_file_name(None, "train.ipynb"), "train.ipynb");
        assert_eq!(local_file_name(Some(".."), "train.ipynb"), "train.ipynb");
    }
}
