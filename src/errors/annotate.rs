use std::path::PathBuf;

use dicom::object::ReadError;
use nifti::NiftiError;
pub use snafu::Snafu;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum AnnotateError {
    #[snafu(display("failed to read volume {}", path.display()))]
    ReadVolume {
        path: PathBuf,
        #[snafu(source(from(std::io::Error, Box::new)))]
        source: Box<std::io::Error>,
    },

    #[snafu(display("failed to write volume {}", path.display()))]
    WriteVolume {
        path: PathBuf,
        #[snafu(source(from(std::io::Error, Box::new)))]
        source: Box<std::io::Error>,
    },

    #[snafu(display("{} is not a NIfTI-1 file", path.display()))]
    NotNifti { path: PathBuf },

    #[snafu(display("failed to parse NIfTI header of {}: {}", path.display(), source))]
    ParseHeader {
        path: PathBuf,
        #[snafu(source(from(NiftiError, Box::new)))]
        source: Box<NiftiError>,
    },

    #[snafu(display("failed to read DICOM file {}: {:?}", path.display(), source))]
    ReadDicom {
        path: PathBuf,
        #[snafu(source(from(ReadError, Box::new)))]
        source: Box<ReadError>,
    },
}
