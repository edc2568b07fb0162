use std::io::{Read, Write};
use std::path::Path;

use dicom::dictionary_std::tags;
use dicom::object::open_file;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use nifti::{NiftiObject, ReaderOptions};
use snafu::{ensure, ResultExt};

use crate::errors::annotate::{
    NotNiftiSnafu, ParseHeaderSnafu, ReadDicomSnafu, ReadVolumeSnafu, WriteVolumeSnafu,
};
use crate::errors::AnnotateError;

const HEADER_LEN: usize = 348;
const DESCRIP_OFFSET: usize = 148;
const DESCRIP_LEN: usize = 80;
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Acquisition parameters worth carrying over into the converted volume, with the
/// labels used inside the header description.
const DESCRIBED_FIELDS: [(dicom::core::Tag, &str); 3] = [
    (tags::REPETITION_TIME, "TR"),
    (tags::ECHO_TIME, "TE"),
    (tags::FLIP_ANGLE, "FA"),
];

/// Summarize a representative DICOM file as a `TR=..;TE=..;FA=..` string.
/// Attributes the scanner did not record are skipped, so the result may be empty.
pub fn acquisition_description(dicom: &Path) -> Result<String, AnnotateError> {
    let object = open_file(dicom).context(ReadDicomSnafu { path: dicom })?;
    let mut parts = Vec::new();
    for (tag, label) in DESCRIBED_FIELDS {
        if let Some(value) = object.element(tag).ok().and_then(|e| e.to_float64().ok()) {
            parts.push(format!("{label}={value}"));
        }
    }
    Ok(parts.join(";"))
}

/// Read the `descrip` field of a NIfTI header, trimmed at its NUL terminator.
pub fn read_description(volume: &Path) -> Result<String, AnnotateError> {
    let object = ReaderOptions::new()
        .read_file(volume)
        .context(ParseHeaderSnafu { path: volume })?;
    let descrip = &object.header().descrip;
    let end = descrip.iter().position(|&b| b == 0).unwrap_or(descrip.len());
    Ok(String::from_utf8_lossy(&descrip[..end]).into_owned())
}

/// Write `text` into the 80-byte `descrip` field of a NIfTI-1 volume, in place.
/// The field is NUL padded and `text` truncated to 79 bytes; every other byte of
/// the file is left untouched. Both `.nii` and `.nii.gz` volumes are handled.
pub fn write_description(volume: &Path, text: &str) -> Result<(), AnnotateError> {
    let raw = std::fs::read(volume).context(ReadVolumeSnafu { path: volume })?;
    let compressed = raw.starts_with(&GZIP_MAGIC);
    let mut bytes = if compressed {
        let mut decoded = Vec::new();
        GzDecoder::new(raw.as_slice())
            .read_to_end(&mut decoded)
            .context(ReadVolumeSnafu { path: volume })?;
        decoded
    } else {
        raw
    };
    ensure!(is_nifti1(&bytes), NotNiftiSnafu { path: volume });

    let field = &mut bytes[DESCRIP_OFFSET..DESCRIP_OFFSET + DESCRIP_LEN];
    field.fill(0);
    let text = text.as_bytes();
    let len = text.len().min(DESCRIP_LEN - 1);
    field[..len].copy_from_slice(&text[..len]);

    let out = if compressed {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder
            .write_all(&bytes)
            .and_then(|_| encoder.finish())
            .context(WriteVolumeSnafu { path: volume })?
    } else {
        bytes
    };
    std::fs::write(volume, out).context(WriteVolumeSnafu { path: volume })
}

/// A single-file NIfTI-1 blob: correct header length in either byte order and a
/// recognized magic.
fn is_nifti1(bytes: &[u8]) -> bool {
    if bytes.len() < HEADER_LEN {
        return false;
    }
    let sizeof_hdr = i32::from_le_bytes(bytes[0..4].try_into().unwrap());
    let magic = &bytes[344..348];
    (sizeof_hdr == 348 || sizeof_hdr.swap_bytes() == 348)
        && (magic == b"n+1\0" || magic == b"ni1\0")
}
