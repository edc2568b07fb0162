use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;

use serde::Serialize;
use snafu::ResultExt;

use crate::errors::tool::ScanOutputsSnafu;
use crate::errors::ToolError;
use crate::file::NiftiFileOperations;

/// Wrapped DICOM to NIfTI converter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Converter {
    Dcm2nii,
    #[default]
    Dcm2niix,
}

impl fmt::Display for Converter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Converter::Dcm2nii => "dcm2nii",
            Converter::Dcm2niix => "dcm2niix",
        };
        write!(f, "{}", name)
    }
}

/// Files a converter left in the scratch directory, in lexical order per kind.
#[derive(Debug, Default)]
pub struct ConversionOutputs {
    pub volumes: Vec<PathBuf>,
    pub gradient_vectors: Vec<PathBuf>,
    pub gradient_values: Vec<PathBuf>,
}

impl Converter {
    /// Name of the wrapped binary, used when no override is given.
    pub fn binary_name(&self) -> &'static str {
        match self {
            Converter::Dcm2nii => "dcm2nii",
            Converter::Dcm2niix => "dcm2niix",
        }
    }

    fn version_args(&self) -> &'static [&'static str] {
        match self {
            // dcm2nii has no version flag; its banner carries the release date.
            Converter::Dcm2nii => &[],
            Converter::Dcm2niix => &["--version"],
        }
    }

    pub fn version(&self, binary: &Path) -> Option<String> {
        super::probe_version(binary, self.version_args())
    }

    /// Convert every series under `source` into `scratch`, then report what the
    /// tool produced. File naming inside `scratch` is the tool's own; callers
    /// rename afterwards.
    pub fn convert(
        &self,
        binary: &Path,
        source: &Path,
        scratch: &Path,
    ) -> Result<ConversionOutputs, ToolError> {
        let mut command = Command::new(binary);
        match self {
            Converter::Dcm2niix => {
                command
                    .args(["-z", "y", "-f", "%p_%s", "-o"])
                    .arg(scratch)
                    .arg(source);
            }
            Converter::Dcm2nii => {
                command
                    .args(["-g", "y", "-n", "y", "-d", "n", "-o"])
                    .arg(scratch)
                    .arg(source);
            }
        }
        super::run(command)?;
        collect_outputs(scratch)
    }
}

/// Scan a scratch directory for converter products. Converters write flat, so only
/// the top level is inspected; each kind is sorted for deterministic indexing.
pub fn collect_outputs(scratch: &Path) -> Result<ConversionOutputs, ToolError> {
    let mut outputs = ConversionOutputs::default();
    let entries = std::fs::read_dir(scratch).context(ScanOutputsSnafu { path: scratch })?;
    for entry in entries {
        let path = entry.context(ScanOutputsSnafu { path: scratch })?.path();
        if !path.is_file() {
            continue;
        }
        if path.has_nifti_extension() {
            outputs.volumes.push(path);
        } else if path.extension().is_some_and(|ext| ext == "bvec") {
            outputs.gradient_vectors.push(path);
        } else if path.extension().is_some_and(|ext| ext == "bval") {
            outputs.gradient_values.push(path);
        }
    }
    outputs.volumes.sort();
    outputs.gradient_vectors.sort();
    outputs.gradient_values.sort();
    Ok(outputs)
}
