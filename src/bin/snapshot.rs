use std::path::PathBuf;

use clap::Parser;
use snafu::{ensure, Report, ResultExt, Snafu, Whatever};
use tracing::{error, Level};

use dicom_conversion::errors::ToolError;
use dicom_conversion::file::NiftiFileOperations;
use dicom_conversion::tools::snapshot::SnapshotRenderer;

#[derive(Debug, Snafu)]
enum Error {
    #[snafu(display("input is not a NIfTI file: {}", path.display()))]
    InvalidInput { path: PathBuf },

    #[snafu(display("snapshot rendering failed: {}", source))]
    Render {
        #[snafu(source(from(ToolError, Box::new)))]
        source: Box<ToolError>,
    },
}

#[derive(Parser, Debug)]
#[command(version = env!("CARGO_PKG_VERSION"), about = "Render a PNG mosaic preview of a NIfTI volume", long_about = None)]
struct Args {
    #[arg(help = "NIfTI volume to preview")]
    input: PathBuf,

    #[arg(help = "Output PNG path, or a directory to reuse the input stem (default: next to the input)")]
    output: Option<PathBuf>,

    #[arg(long, help = "Mosaic renderer to run instead of slicer")]
    binary: Option<PathBuf>,

    #[arg(short, long, action = clap::ArgAction::Count, help = "Increase log verbosity")]
    verbose: u8,
}

fn main() {
    let args = Args::parse();

    let level = match args.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        _ => Level::DEBUG,
    };
    tracing::subscriber::set_global_default(
        tracing_subscriber::FmtSubscriber::builder()
            .with_max_level(level)
            .finish(),
    )
    .whatever_context("Could not set up global logging subscriber")
    .unwrap_or_else(|e: Whatever| {
        eprintln!("[ERROR] {}", Report::from_error(e));
    });

    run(args).unwrap_or_else(|e| {
        error!("{}", Report::from_error(e));
        std::process::exit(-1);
    });
}

fn run(args: Args) -> Result<(), Error> {
    ensure!(
        args.input.is_nifti_file_or(false),
        InvalidInputSnafu { path: &args.input }
    );

    let renderer = SnapshotRenderer::new(args.binary.clone());
    let output = match &args.output {
        Some(path) if path.is_dir() => renderer.output_path(&args.input, path),
        Some(path) => path.clone(),
        None => {
            let parent = args.input.parent().unwrap_or_else(|| std::path::Path::new("."));
            renderer.output_path(&args.input, parent)
        }
    };

    let rendered = renderer.render(&args.input, &output).context(RenderSnafu)?;
    println!("{}", rendered.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::os::unix::fs::PermissionsExt;
    use std::path::Path;

    fn stub_slicer(dir: &Path) -> PathBuf {
        let path = dir.join("slicer");
        let body = concat!(
            "#!/bin/sh\n",
            "out=\"\"\n",
            "while [ $# -gt 0 ]; do\n",
            "  if [ \"$1\" = \"-a\" ]; then out=\"$2\"; shift; fi\n",
            "  shift\n",
            "done\n",
            "echo PNG > \"$out\"\n",
        );
        std::fs::write(&path, body).unwrap();
        let mut permissions = std::fs::metadata(&path).unwrap().permissions();
        permissions.set_mode(0o755);
        std::fs::set_permissions(&path, permissions).unwrap();
        path
    }

    #[test]
    fn test_default_output_next_to_input() {
        let temp_dir = tempfile::tempdir().unwrap();
        let binary = stub_slicer(temp_dir.path());
        let input = temp_dir.path().join("t1.nii.gz");
        std::fs::write(&input, "volume").unwrap();

        let args = Args {
            input: input.clone(),
            output: None,
            binary: Some(binary),
            verbose: 0,
        };
        run(args).unwrap();
        assert!(temp_dir.path().join("t1.png").is_file());
    }

    #[test]
    fn test_output_directory_reuses_stem() {
        let temp_dir = tempfile::tempdir().unwrap();
        let binary = stub_slicer(temp_dir.path());
        let input = temp_dir.path().join("t1.nii");
        std::fs::write(&input, "volume").unwrap();
        let outdir = temp_dir.path().join("previews");
        std::fs::create_dir(&outdir).unwrap();

        let args = Args {
            input,
            output: Some(outdir.clone()),
            binary: Some(binary),
            verbose: 0,
        };
        run(args).unwrap();
        assert!(outdir.join("t1.png").is_file());
    }

    #[test]
    fn test_rejects_non_nifti_input() {
        let temp_dir = tempfile::tempdir().unwrap();
        let input = temp_dir.path().join("notes.txt");
        std::fs::write(&input, "x").unwrap();

        let args = Args {
            input,
            output: None,
            binary: None,
            verbose: 0,
        };
        let err = run(args).unwrap_err();
        assert!(matches!(err, Error::InvalidInput { .. }));
    }
}
