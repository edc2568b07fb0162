use std::path::PathBuf;

use clap::Parser;
use serde::Serialize;
use snafu::{ensure, Report, ResultExt, Snafu, Whatever};
use tracing::{error, Level};

use dicom_conversion::annotate;
use dicom_conversion::errors::{AnnotateError, ToolError};
use dicom_conversion::file::DicomFileOperations;
use dicom_conversion::gradients::{self, GradientError};
use dicom_conversion::layout::LayoutError;
use dicom_conversion::provenance::{self, OutputManifest, RuntimeRecord};
use dicom_conversion::tools::convert::Converter;
use dicom_conversion::tools::snapshot::SnapshotRenderer;
use dicom_conversion::transcode::{TranscodeError, TranscodingTable};
use dicom_conversion::{prepare_directory, SeriesLayout};

#[derive(Debug, Snafu)]
enum Error {
    #[snafu(display("invalid source directory: {}", path.display()))]
    InvalidSourceDir { path: PathBuf },

    #[snafu(display("no DICOM files found under {}", path.display()))]
    NoDicomFiles { path: PathBuf },

    #[snafu(display("subject transcoding failed: {}", source))]
    Transcode {
        #[snafu(source(from(TranscodeError, Box::new)))]
        source: Box<TranscodeError>,
    },

    #[snafu(display("failed to lay out output files: {}", source))]
    Layout {
        #[snafu(source(from(LayoutError, Box::new)))]
        source: Box<LayoutError>,
    },

    #[snafu(display("conversion failed: {}", source))]
    Conversion {
        #[snafu(source(from(ToolError, Box::new)))]
        source: Box<ToolError>,
    },

    #[snafu(display("snapshot rendering failed: {}", source))]
    Snapshot {
        #[snafu(source(from(ToolError, Box::new)))]
        source: Box<ToolError>,
    },

    #[snafu(display("gradient tables are inconsistent: {}", source))]
    Gradients {
        #[snafu(source(from(GradientError, Box::new)))]
        source: Box<GradientError>,
    },

    #[snafu(display("header annotation failed: {}", source))]
    Annotate {
        #[snafu(source(from(AnnotateError, Box::new)))]
        source: Box<AnnotateError>,
    },

    #[snafu(display("failed to write provenance logs: {}", source))]
    Provenance {
        #[snafu(source(from(provenance::ProvenanceError, Box::new)))]
        source: Box<provenance::ProvenanceError>,
    },
}

#[derive(Parser, Debug, Serialize)]
#[command(version = env!("CARGO_PKG_VERSION"), about = "Convert a DICOM acquisition to NIfTI volumes with provenance logs", long_about = None)]
struct Args {
    #[arg(help = "Directory holding the DICOM files of one acquisition")]
    source: PathBuf,

    #[arg(help = "Root directory converted volumes are organized under")]
    output: PathBuf,

    #[arg(
        long,
        short = 's',
        help = "Subject identifier, transcoded when a table is given"
    )]
    subject: String,

    #[arg(long, default_value = "V1", help = "Session identifier")]
    session: String,

    #[arg(long, help = "Protocol name, e.g. 3DT1")]
    protocol: String,

    #[arg(long, help = "Modality label, e.g. anat, func, dwi")]
    modality: String,

    #[arg(long, help = "Acquisition label appended to file stems")]
    acquisition: Option<String>,

    #[arg(
        long = "transcoding-table",
        help = "JSON object mapping raw subject identifiers to anonymized ones"
    )]
    transcoding_table: Option<PathBuf>,

    #[arg(
        long,
        value_enum,
        default_value_t = Converter::default(),
        help = "DICOM to NIfTI converter to wrap"
    )]
    converter: Converter,

    #[arg(
        long = "converter-binary",
        help = "Run this binary instead of looking the converter up on PATH"
    )]
    converter_binary: Option<PathBuf>,

    #[arg(
        long,
        default_value_t = false,
        help = "Delete an existing session directory before converting"
    )]
    erase: bool,

    #[arg(
        long = "fill-header",
        default_value_t = false,
        help = "Copy TR/TE/flip angle from the DICOMs into each volume's header description"
    )]
    fill_header: bool,

    #[arg(
        long,
        default_value_t = false,
        help = "Render a PNG preview next to each volume"
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
    // Validate the source before anything is created on disk
    ensure!(
        args.source.is_dir(),
        InvalidSourceDirSnafu { path: &args.source }
    );
    let dicom_count = args
        .source
        .count_dicoms()
        .map_err(|_| Error::InvalidSourceDir {
            path: args.source.clone(),
        })?;
    ensure!(dicom_count > 0, NoDicomFilesSnafu { path: &args.source });
    tracing::info!(
        "found {} DICOM files under {}",
        dicom_count,
        args.source.display()
    );

    let subject = match &args.transcoding_table {
        Some(path) => {
            let table = TranscodingTable::load(path).context(TranscodeSnafu)?;
            table
                .anonymize(&args.subject)
                .context(TranscodeSnafu)?
                .to_string()
        }
        None => args.subject.clone(),
    };

    let layout = SeriesLayout::new(
        &subject,
        &args.session,
        &args.protocol,
        &args.modality,
        args.acquisition.as_deref(),
    );
    let session_dir = layout.session_dir(&args.output);
    prepare_directory(&session_dir, args.erase).context(LayoutSnafu)?;

    // The converter writes into a scratch directory with its own naming; outputs
    // are moved into the convention afterwards. Scratch lives under the session
    // directory so the moves stay on one filesystem.
    let scratch = session_dir.join(".conversion");
    prepare_directory(&scratch, true).context(LayoutSnafu)?;

    let binary = args
        .converter_binary
        .clone()
        .unwrap_or_else(|| PathBuf::from(args.converter.binary_name()));
    tracing::info!("converting {} with {}", args.source.display(), args.converter);
    let outputs = args
        .converter
        .convert(&binary, &args.source, &scratch)
        .context(ConversionSnafu)?;
    tracing::info!(
        "converter produced {} volumes and {} gradient files",
        outputs.volumes.len(),
        outputs.gradient_vectors.len() + outputs.gradient_values.len()
    );

    let arranged = layout
        .arrange(
            &session_dir,
            &outputs.volumes,
            &outputs.gradient_vectors,
            &outputs.gradient_values,
        )
        .context(LayoutSnafu)?;
    if let Err(e) = std::fs::remove_dir_all(&scratch) {
        tracing::warn!("could not remove scratch directory {}: {}", scratch.display(), e);
    }

    let mut manifest = OutputManifest {
        volumes: arranged.volumes,
        gradient_vectors: arranged.gradient_vectors,
        gradient_values: arranged.gradient_values,
        ..Default::default()
    };

    for (vectors, values) in manifest
        .gradient_vectors
        .iter()
        .zip(manifest.gradient_values.iter())
    {
        let table = gradients::read_table(vectors, values).context(GradientsSnafu)?;
        tracing::info!(
            "{} holds a gradient scheme with {} directions",
            vectors.display(),
            table.directions()
        );
        manifest.gradient_directions.get_or_insert(table.directions());
    }

    if args.fill_header {
        let reference = args
            .source
            .find_dicoms()
            .map_err(|_| Error::InvalidSourceDir {
                path: args.source.clone(),
            })?
            .min();
        if let Some(reference) = reference {
            let description = annotate::acquisition_description(&reference).context(AnnotateSnafu)?;
            if description.is_empty() {
                tracing::warn!(
                    "{} carries none of the described attributes, skipping header fill",
                    reference.display()
                );
            } else {
                for volume in &manifest.volumes {
                    annotate::write_description(volume, &description).context(AnnotateSnafu)?;
                    manifest.annotated.push(volume.clone());
                }
            }
        }
    }

    if args.snapshot {
        let renderer = SnapshotRenderer::new(args.snapshot_binary.clone());
        for volume in &manifest.volumes {
            let output = renderer.output_path(volume, &session_dir);
            let rendered = renderer.render(volume, &output).context(SnapshotSnafu)?;
            manifest.snapshots.push(rendered);
        }
    }

    let runtime = RuntimeRecord::new(
        args.converter.to_string(),
        args.converter.version(&binary),
    );
    let logs_dir =
        provenance::write_logs(&session_dir, &args, &manifest, &runtime).context(ProvenanceSnafu)?;
    tracing::info!("run logs written to {}", logs_dir.display());

    Ok(())
}
