use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use snafu::{ResultExt, Snafu};

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum TranscodeError {
    #[snafu(display("failed to open transcoding table {}", path.display()))]
    Open {
        path: PathBuf,
        #[snafu(source(from(std::io::Error, Box::new)))]
        source: Box<std::io::Error>,
    },

    #[snafu(display("transcoding table {} is not a JSON object of strings", path.display()))]
    Parse {
        path: PathBuf,
        #[snafu(source(from(serde_json::Error, Box::new)))]
        source: Box<serde_json::Error>,
    },

    #[snafu(display("subject '{}' is not listed in transcoding table {}", subject, path.display()))]
    UnknownSubject { subject: String, path: PathBuf },
}

/// Read-only mapping from raw subject identifiers to anonymized ones, loaded once
/// per run from a JSON object.
#[derive(Debug, Clone)]
pub struct TranscodingTable {
    map: HashMap<String, String>,
    path: PathBuf,
}

impl TranscodingTable {
    pub fn load(path: &Path) -> Result<Self, TranscodeError> {
        let reader = BufReader::new(File::open(path).context(OpenSnafu { path })?);
        let map: HashMap<String, String> =
            serde_json::from_reader(reader).context(ParseSnafu { path })?;
        tracing::debug!(
            "loaded transcoding table {} with {} entries",
            path.display(),
            map.len()
        );
        Ok(Self {
            map,
            path: path.to_path_buf(),
        })
    }

    /// Map a raw subject identifier to its anonymized form. A subject missing from
    /// the table is a hard error.
    pub fn anonymize(&self, subject: &str) -> Result<&str, TranscodeError> {
        self.map
            .get(subject)
            .map(String::as_str)
            .ok_or_else(|| TranscodeError::UnknownSubject {
                subject: subject.to_string(),
                path: self.path.clone(),
            })
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}
