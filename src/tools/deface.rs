use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;

use serde::Serialize;
use snafu::ensure;

use crate::errors::tool::{
    InputNotFoundSnafu, MissingOutputSnafu, MissingTemplateSnafu, TemplatesRequiredSnafu,
};
use crate::errors::ToolError;
use crate::layout::split_nifti_name;

/// FreeSurfer atlas files `mri_deface` needs next to each other in one directory.
pub const MRI_DEFACE_BRAIN_TEMPLATE: &str = "talairach_mixed_with_skull.gca";
pub const MRI_DEFACE_FACE_TEMPLATE: &str = "face.gca";

/// Wrapped defacing tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DefaceMethod {
    #[default]
    Pydeface,
    MriDeface,
    MaskFace,
}

impl fmt::Display for DefaceMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.binary_name())
    }
}

impl DefaceMethod {
    pub fn binary_name(&self) -> &'static str {
        match self {
            DefaceMethod::Pydeface => "pydeface",
            DefaceMethod::MriDeface => "mri_deface",
            DefaceMethod::MaskFace => "mask_face",
        }
    }

    fn version_args(&self) -> &'static [&'static str] {
        match self {
            DefaceMethod::Pydeface => &["--version"],
            DefaceMethod::MriDeface => &["--version"],
            // mask_face prints its banner when run without arguments.
            DefaceMethod::MaskFace => &[],
        }
    }
}

/// One configured defacing tool, validated at construction so template problems
/// surface before anything is spawned.
#[derive(Debug, Clone)]
pub struct Defacer {
    method: DefaceMethod,
    binary: PathBuf,
    templates: Option<(PathBuf, PathBuf)>,
}

impl Defacer {
    pub fn new(
        method: DefaceMethod,
        binary: Option<PathBuf>,
        templates_dir: Option<&Path>,
    ) -> Result<Self, ToolError> {
        let templates = match method {
            DefaceMethod::MriDeface => {
                let dir = templates_dir.map(Path::to_path_buf).ok_or_else(|| {
                    TemplatesRequiredSnafu {
                        method: method.to_string(),
                    }
                    .build()
                })?;
                let brain = dir.join(MRI_DEFACE_BRAIN_TEMPLATE);
                let face = dir.join(MRI_DEFACE_FACE_TEMPLATE);
                ensure!(brain.is_file(), MissingTemplateSnafu { path: brain });
                ensure!(face.is_file(), MissingTemplateSnafu { path: face });
                Some((brain, face))
            }
            _ => None,
        };
        Ok(Self {
            method,
            binary: binary.unwrap_or_else(|| PathBuf::from(method.binary_name())),
            templates,
        })
    }

    pub fn method(&self) -> DefaceMethod {
        self.method
    }

    pub fn version(&self) -> Option<String> {
        super::probe_version(&self.binary, self.method.version_args())
    }

    /// Path the defaced copy of `input` will be written to inside `outdir`.
    pub fn output_path(&self, input: &Path, outdir: &Path) -> PathBuf {
        let name = input
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("volume.nii.gz");
        match split_nifti_name(name) {
            Some((stem, extension)) => outdir.join(format!("{stem}_defaced.{extension}")),
            None => outdir.join(format!("{name}_defaced.nii.gz")),
        }
    }

    /// Deface a single volume, blocking until the wrapped tool exits. The tool is
    /// pointed at an explicit output path, which must exist afterwards.
    pub fn deface(&self, input: &Path, outdir: &Path) -> Result<PathBuf, ToolError> {
        ensure!(input.is_file(), InputNotFoundSnafu { path: input });
        let output = self.output_path(input, outdir);

        let mut command = Command::new(&self.binary);
        match self.method {
            DefaceMethod::Pydeface => {
                command
                    .arg(input)
                    .arg("--outfile")
                    .arg(&output)
                    .arg("--force");
            }
            DefaceMethod::MriDeface => {
                let (brain, face) = self
                    .templates
                    .as_ref()
                    .expect("templates checked at construction");
                command.arg(input).arg(brain).arg(face).arg(&output);
            }
            DefaceMethod::MaskFace => {
                command.arg(input).arg("-o").arg(&output);
            }
        }
        super::run(command)?;

        ensure!(
            output.is_file(),
            MissingOutputSnafu {
                program: self.binary.clone(),
                path: output.clone(),
            }
        );
        Ok(output)
    }
}
