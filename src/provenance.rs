use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use snafu::{ResultExt, Snafu};

pub const LOGS_DIR: &str = "logs";
pub const INPUTS_LOG: &str = "inputs.json";
pub const OUTPUTS_LOG: &str = "outputs.json";
pub const RUNTIME_LOG: &str = "runtime.json";

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ProvenanceError {
    #[snafu(display("failed to create log directory {}", path.display()))]
    CreateLogDir {
        path: PathBuf,
        #[snafu(source(from(std::io::Error, Box::new)))]
        source: Box<std::io::Error>,
    },

    #[snafu(display("failed to create log file {}", path.display()))]
    CreateLog {
        path: PathBuf,
        #[snafu(source(from(std::io::Error, Box::new)))]
        source: Box<std::io::Error>,
    },

    #[snafu(display("failed to serialize log file {}", path.display()))]
    SerializeLog {
        path: PathBuf,
        #[snafu(source(from(serde_json::Error, Box::new)))]
        source: Box<serde_json::Error>,
    },
}

/// Everything a run produced, grouped by kind. Categories a run never touched are
/// left out of `outputs.json` entirely.
#[derive(Debug, Default, Serialize)]
pub struct OutputManifest {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<PathBuf>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub gradient_vectors: Vec<PathBuf>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub gradient_values: Vec<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gradient_directions: Option<usize>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub annotated: Vec<PathBuf>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub defaced: Vec<PathBuf>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub snapshots: Vec<PathBuf>,
}

/// Which tool ran, which versions were involved and when the run happened.
#[derive(Debug, Serialize)]
pub struct RuntimeRecord {
    pub tool: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_version: Option<String>,
    pub package: &'static str,
    pub package_version: &'static str,
    pub timestamp: String,
}

impl RuntimeRecord {
    pub fn new(tool: impl Into<String>, tool_version: Option<String>) -> Self {
        Self {
            tool: tool.into(),
            tool_version,
            package: env!("CARGO_PKG_NAME"),
            package_version: env!("CARGO_PKG_VERSION"),
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        }
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), ProvenanceError> {
    let writer = BufWriter::new(File::create(path).context(CreateLogSnafu { path })?);
    serde_json::to_writer_pretty(writer, value).context(SerializeLogSnafu { path })
}

/// Persist the provenance triple under `<outdir>/logs/` and return the log
/// directory. Existing logs of an earlier run into the same directory are
/// overwritten.
pub fn write_logs<I: Serialize>(
    outdir: &Path,
    inputs: &I,
    outputs: &OutputManifest,
    runtime: &RuntimeRecord,
) -> Result<PathBuf, ProvenanceError> {
    let logs_dir = outdir.join(LOGS_DIR);
    std::fs::create_dir_all(&logs_dir).context(CreateLogDirSnafu { path: &logs_dir })?;
    write_json(&logs_dir.join(INPUTS_LOG), inputs)?;
    write_json(&logs_dir.join(OUTPUTS_LOG), outputs)?;
    write_json(&logs_dir.join(RUNTIME_LOG), runtime)?;
    Ok(logs_dir)
}
