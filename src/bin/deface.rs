use std::path::PathBuf;

use clap::Parser;
use serde::Serialize;
use snafu::{ensure, Report, ResultExt, Snafu, Whatever};
use tracing::{error, Level};

use dicom_conversion::errors::ToolError;
use dicom_conversion::file::{default_bar, NiftiFileOperations};
use dicom_conversion::layout::LayoutError;
use dicom_conversion::prepare_directory;
use dicom_conversion::provenance::{self, OutputManifest, RuntimeRecord};
use dicom_conversion::tools::deface::{DefaceMethod, Defacer};
use dicom_conversion::tools::snapshot::SnapshotRenderer;

#[derive(Debug, Snafu)]
enum Error {
    #[snafu(display("input is not a NIfTI file: {}", path.display()))]
    InvalidInput { path: PathBuf },

    #[snafu(display("failed to prepare output directory: {}", source))]
    Layout {
        #[snafu(source(from(LayoutError, Box::new)))]
        source: Box<LayoutError>,
    },

    #[snafu(display("defacing failed: {}", source))]
    Deface {
        #[snafu(source(from(ToolError, Box::new)))]
        source: Box<ToolError>,
    },

    #[snafu(display("snapshot rendering failed: {}", source))]
    Snapshot {
        #[snafu(source(from(ToolError, Box::new)))]
        source: Box<ToolError>,
    },

    #[snafu(display("failed to write provenance logs: {}", source))]
    Provenance {
        #[snafu(source(from(provenance::ProvenanceError, Box::new)))]
        source: Box<provenance::ProvenanceError>,
    },
}

#[derive(Parser, Debug, Serialize)]
#[command(version = env!("CARGO_PKG_VERSION"), about = "Deface head scans with a wrapped anonymization tool", long_about = None)]
struct Args {
    #[arg(help = "NIfTI volumes to deface", num_args = 1.., required = true)]
    inputs: Vec<PathBuf>,

    #[arg(long, short = 'o', help = "Directory defaced volumes are written to")]
    output: PathBuf,

    #[arg(
        long,
        value_enum,
        default_value_t = DefaceMethod::default(),
        help = "Defacing tool to wrap"
    )]
    method: DefaceMethod,

    #[arg(
        long = "method-binary",
        help = "Run this binary instead of looking the method up on PATH"
    )]
    method_binary: Option<PathBuf>,

    #[arg(
        long = "templates-dir",
        help = "Directory holding the mri_deface atlas templates"
    )]
    templates_dir: Option<PathBuf>,

    #[arg(
        long,
        default_value_t = false,
        help = "Delete an existing output directory before defacing"
    )]
    erase: bool,

    #[arg(
        long,
        default_value_t = false,
        help = "Render a PNG preview next to each defaced volume"
    )]
    snapshot: bool,

    #[arg(long = "snapshot-binary", help = "Mosaic renderer used for previews")]
    snapshot_binary: Option<PathBuf>,

    #[arg(short, long, action = clap::ArgAction::Count, help = "Increase log verbosity")]
    #[serde(skip)]
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
    for input in &args.inputs {
        ensure!(input.is_nifti_file_or(false), InvalidInputSnafu { path: input });
    }
    prepare_directory(&args.output, args.erase).context(LayoutSnafu)?;

    // Template problems surface here, before any volume is touched.
    let defacer = Defacer::new(
        args.method,
        args.method_binary.clone(),
        args.templates_dir.as_deref(),
    )
    .context(DefaceSnafu)?;
    let renderer = args
        .snapshot
        .then(|| SnapshotRenderer::new(args.snapshot_binary.clone()));

    let mut manifest = OutputManifest::default();
    let pb = default_bar(args.inputs.len() as u64);
    pb.set_message("Defacing volumes");
    for input in &args.inputs {
        let defaced = defacer.deface(input, &args.output).context(DefaceSnafu)?;
        tracing::info!("defaced {} -> {}", input.display(), defaced.display());
        if let Some(renderer) = &renderer {
            let png = renderer.output_path(&defaced, &args.output);
            manifest
                .snapshots
                .push(renderer.render(&defaced, &png).context(SnapshotSnafu)?);
        }
        manifest.defaced.push(defaced);
        pb.inc(1);
    }
    pb.finish();

    let runtime = RuntimeRecord::new(defacer.method().to_string(), defacer.version());
    let logs_dir =
        provenance::write_logs(&args.output, &args, &manifest, &runtime).context(ProvenanceSnafu)?;
    tracing::info!("run logs written to {}", logs_dir.display());

    Ok(())
}
