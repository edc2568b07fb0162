use std::path::{Path, PathBuf};
use std::process::Command;

use snafu::ensure;

use crate::errors::tool::{InputNotFoundSnafu, MissingOutputSnafu};
use crate::errors::ToolError;
use crate::layout::split_nifti_name;

/// FSL's mosaic renderer, the default snapshot backend.
pub const DEFAULT_SNAPSHOT_BINARY: &str = "slicer";

/// Wrapper around an external mosaic renderer producing PNG previews of volumes.
#[derive(Debug, Clone)]
pub struct SnapshotRenderer {
    binary: PathBuf,
}

impl Default for SnapshotRenderer {
    fn default() -> Self {
        Self {
            binary: PathBuf::from(DEFAULT_SNAPSHOT_BINARY),
        }
    }
}

impl SnapshotRenderer {
    pub fn new(binary: Option<PathBuf>) -> Self {
        match binary {
            Some(binary) => Self { binary },
            None => Self::default(),
        }
    }

    pub fn version(&self) -> Option<String> {
        super::probe_version(&self.binary, &[])
    }

    /// PNG path for `input` when the caller only names a directory.
    pub fn output_path(&self, input: &Path, outdir: &Path) -> PathBuf {
        let name = input
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("volume.nii.gz");
        let stem = split_nifti_name(name).map(|(stem, _)| stem).unwrap_or(name);
        outdir.join(format!("{stem}.png"))
    }

    /// Render a mid-slice mosaic of `input` to `output`. The output file must
    /// exist once the renderer exits.
    pub fn render(&self, input: &Path, output: &Path) -> Result<PathBuf, ToolError> {
        ensure!(input.is_file(), InputNotFoundSnafu { path: input });

        let mut command = Command::new(&self.binary);
        command.arg(input).arg("-a").arg(output);
        super::run(command)?;

        ensure!(
            output.is_file(),
            MissingOutputSnafu {
                program: self.binary.clone(),
                path: output,
            }
        );
        Ok(output.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::stubs::write_stub;

    /// Stub renderer: writes a marker to the path following `-a`.
    fn stub_slicer(dir: &Path) -> PathBuf {
        write_stub(
            dir,
            "slicer",
            concat!(
                "out=\"\"\n",
                "while [ $# -gt 0 ]; do\n",
                "  if [ \"$1\" = \"-a\" ]; then out=\"$2\"; shift; fi\n",
                "  shift\n",
                "done\n",
                "echo PNG > \"$out\"\n",
            ),
        )
    }

    #[test]
    fn test_output_path() {
        let renderer = SnapshotRenderer::default();
        assert_eq!(
            renderer.output_path(Path::new("/data/t1.nii.gz"), Path::new("/previews")),
            PathBuf::from("/previews/t1.png")
        );
    }

    #[test]
    fn test_render() {
        let temp_dir = tempfile::tempdir().unwrap();
        let binary = stub_slicer(temp_dir.path());
        let input = temp_dir.path().join("t1.nii.gz");
        std::fs::write(&input, "volume").unwrap();
        let output = temp_dir.path().join("t1.png");

        let renderer = SnapshotRenderer::new(Some(binary));
        let rendered = renderer.render(&input, &output).unwrap();
        assert_eq!(rendered, output);
        assert!(output.is_file());
    }

    #[test]
    fn test_render_missing_input() {
        let temp_dir = tempfile::tempdir().unwrap();
        let renderer = SnapshotRenderer::default();
        let err = renderer
            .render(
                &temp_dir.path().join("absent.nii"),
                &temp_dir.path().join("out.png"),
            )
            .unwrap_err();
        assert!(matches!(err, ToolError::InputNotFound { .. }));
    }

    #[test]
    fn test_render_detects_missing_output() {
        let temp_dir = tempfile::tempdir().unwrap();
        let binary = write_stub(temp_dir.path(), "slicer", "exit 0");
        let input = temp_dir.path().join("t1.nii");
        std::fs::write(&input, "x").unwrap();

        let renderer = SnapshotRenderer::new(Some(binary));
        let err = renderer
            .render(&input, &temp_dir.path().join("out.png"))
            .unwrap_err();
        assert!(matches!(err, ToolError::MissingOutput { .. }));
    }
}
