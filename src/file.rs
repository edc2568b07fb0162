use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use rust_search::SearchBuilder;

pub const DICM_PREFIX: &[u8; 4] = b"DICM";
pub const DICM_PREFIX_LOCATION: u64 = 128;

type IOResult<T> = Result<T, std::io::Error>;

pub fn default_bar(len: u64) -> ProgressBar {
    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{msg} {spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta} @ {per_sec})",
            )
            .unwrap(),
    );
    pb
}

pub fn default_spinner() -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.blue} {msg}")
            .unwrap(),
    );
    spinner
}

pub trait DicomFileOperations
where
    Self: AsRef<Path>,
{
    /// Check if a file has a DICM prefix.
    /// This will only return an error if the file cannot be opened.
    /// Any other errors mapped to `false`.
    fn has_dicm_prefix(&self) -> IOResult<bool> {
        let mut reader = File::open(self.as_ref())?;
        let mut buffer = [0; DICM_PREFIX.len()];
        reader
            .seek(SeekFrom::Start(DICM_PREFIX_LOCATION))
            .and_then(|_| reader.read_exact(&mut buffer))
            .map_or(Ok(false), |_| Ok(&buffer == DICM_PREFIX))
    }

    /// Check if a file has a DICOM extension.
    fn has_dicom_extension(&self) -> bool {
        let path = self.as_ref();
        if let Some(ext) = path.extension() {
            return ext == "dcm" || ext == "dicom" || ext == "DCM" || ext == "DICOM" || ext == "ima";
        }
        false
    }

    /// Check if a path is a DICOM file as efficiently as possible.
    /// The function will use the file extension if available, otherwise it will check the DICM prefix.
    fn is_dicom_file(&self) -> IOResult<bool> {
        let path = self.as_ref();
        if self.has_dicom_extension() {
            Ok(path.is_file())
        } else if path.extension().is_some() || path.is_dir() {
            Ok(false)
        } else {
            self.has_dicm_prefix()
        }
    }

    /// Similar to `is_dicom_file`, but returns a default value if an error occurs.
    fn is_dicom_file_or(&self, default: bool) -> bool {
        self.is_dicom_file().unwrap_or(default)
    }

    /// Find all DICOM files in a directory.
    fn find_dicoms(&self) -> IOResult<impl Iterator<Item = PathBuf>> {
        let dir = self.as_ref();
        if !dir.is_dir() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "Not a directory",
            ));
        }
        let result = SearchBuilder::default()
            .location(dir)
            .build()
            .filter(move |file| file.is_dicom_file_or(false))
            .map(|file| PathBuf::from_str(file.as_str()).unwrap());
        Ok(result)
    }

    /// Find all DICOM files in a directory, with a progress spinner.
    fn find_dicoms_with_spinner(&self) -> IOResult<impl Iterator<Item = PathBuf>> {
        let spinner = default_spinner();
        spinner.set_message("Searching for DICOM files");
        let result = self.find_dicoms()?.inspect(move |_| {
            spinner.tick();
        });
        Ok(result)
    }

    /// Count the DICOM files under a directory. Candidates are collected first and
    /// classified in parallel, since classification may read the DICM prefix of each file.
    fn count_dicoms(&self) -> IOResult<usize> {
        let dir = self.as_ref();
        if !dir.is_dir() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "Not a directory",
            ));
        }
        let candidates = SearchBuilder::default()
            .location(dir)
            .build()
            .collect::<Vec<_>>();
        let count = candidates
            .into_par_iter()
            .filter(|file| file.is_dicom_file_or(false))
            .count();
        Ok(count)
    }
}

impl<P: AsRef<Path>> DicomFileOperations for P {}

pub trait NiftiFileOperations
where
    Self: AsRef<Path>,
{
    /// Check if a file has a NIfTI extension, including the compressed `.nii.gz` form.
    fn has_nifti_extension(&self) -> bool {
        let path = self.as_ref();
        match path.file_name().and_then(|name| name.to_str()) {
            Some(name) => name.ends_with(".nii") || name.ends_with(".nii.gz"),
            None => false,
        }
    }

    /// Check if a path is a NIfTI file.
    fn is_nifti_file(&self) -> IOResult<bool> {
        // Extensionless NIfTI files are not handled, extension and existence are the
        // only checks. Signature is matched against is_dicom_file for consistency.
        Ok(self.as_ref().is_file() && self.has_nifti_extension())
    }

    /// Similar to `is_nifti_file`, but returns a default value if an error occurs.
    fn is_nifti_file_or(&self, default: bool) -> bool {
        self.is_nifti_file().unwrap_or(default)
    }

    /// Check if a file holds diffusion gradient vectors or values.
    fn has_gradient_extension(&self) -> bool {
        let path = self.as_ref();
        if let Some(ext) = path.extension() {
            return ext == "bvec" || ext == "bval";
        }
        false
    }

    /// Find all NIfTI files in a directory.
    fn find_niftis(&self) -> IOResult<impl Iterator<Item = PathBuf>> {
        let dir = self.as_ref();
        if !dir.is_dir() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "Not a directory",
            ));
        }
        let result = SearchBuilder::default()
            .location(dir)
            .build()
            .filter(move |file| file.is_nifti_file_or(false))
            .map(|file| PathBuf::from_str(file.as_str()).unwrap());
        Ok(result)
    }
}

impl<P: AsRef<Path>> NiftiFileOperations for P {}

#[cfg(test)]
mod tests {
    use super::*;

    use rstest::rstest;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[rstest]
    #[case::empty_file(vec![], false)]
    #[case::dicm_prefix(b"DICM".to_vec(), true)]
    #[case::wrong_prefix(b"NOT_DICM".to_vec(), false)]
    fn test_has_dicm_prefix(#[case] contents: Vec<u8>, #[case] expected: bool) {
        let mut temp = NamedTempFile::new().unwrap();
        temp.seek(SeekFrom::Start(DICM_PREFIX_LOCATION)).unwrap();
        temp.write_all(&contents).unwrap();

        let result = temp.path().has_dicm_prefix().unwrap();
        assert_eq!(result, expected);
    }

    #[rstest]
    #[case::no_extension("slice", false)]
    #[case::wrong_extension("slice.txt", false)]
    #[case::dcm_extension("slice.dcm", true)]
    #[case::dicom_extension("slice.dicom", true)]
    #[case::dcm_extension_uppercase("slice.DCM", true)]
    #[case::dicom_extension_uppercase("slice.DICOM", true)]
    #[case::ima_extension("slice.ima", true)]
    #[case::mixed_case("slice.DiCoM", false)]
    fn test_has_dicom_extension(#[case] path: &str, #[case] expected: bool) {
        let path = PathBuf::from(path);
        let result = path.has_dicom_extension();
        assert_eq!(result, expected);
    }

    #[rstest]
    #[case::no_spinner(false)]
    #[case::spinner(true)]
    fn test_find_dicom_files(#[case] spinner: bool) {
        let temp_dir = tempfile::tempdir().unwrap();

        let dicom_dest = temp_dir.path().join("slice.dcm");
        std::fs::write(&dicom_dest, "not really pixel data").unwrap();

        let text_path = temp_dir.path().join("notes.txt");
        std::fs::write(&text_path, "not a DICOM file").unwrap();

        let sub_dir = temp_dir.path().join("series2");
        std::fs::create_dir(&sub_dir).unwrap();
        let sub_dicom = sub_dir.join("slice.dcm");
        std::fs::write(&sub_dicom, "also not pixel data").unwrap();

        let files: Vec<_> = match spinner {
            true => temp_dir
                .path()
                .find_dicoms_with_spinner()
                .unwrap()
                .collect(),
            false => temp_dir.path().find_dicoms().unwrap().collect(),
        };
        assert_eq!(files.len(), 2);
        assert!(files.iter().any(|p| p == &dicom_dest));
        assert!(files.iter().any(|p| p == &sub_dicom));
    }

    #[test]
    fn test_count_dicoms() {
        let temp_dir = tempfile::tempdir().unwrap();
        for i in 0..3 {
            std::fs::write(temp_dir.path().join(format!("slice{i}.dcm")), "x").unwrap();
        }
        std::fs::write(temp_dir.path().join("notes.txt"), "x").unwrap();

        assert_eq!(temp_dir.path().count_dicoms().unwrap(), 3);
    }

    #[test]
    fn test_count_dicoms_not_a_directory() {
        let temp = NamedTempFile::new().unwrap();
        assert!(temp.path().count_dicoms().is_err());
    }

    #[rstest]
    #[case("volume.nii", true)]
    #[case("volume.nii.gz", true)]
    #[case("path/to/volume.nii.gz", true)]
    #[case("volume.gz", false)]
    #[case("volume.nii.bak", false)]
    #[case("volume", false)]
    fn test_has_nifti_extension(#[case] path: &str, #[case] expected: bool) {
        let path = PathBuf::from(path);
        assert_eq!(path.has_nifti_extension(), expected);
    }

    #[rstest]
    #[case("volume.nii.gz", true)]
    #[case("notes.txt", false)]
    #[case("missing.nii", false)]
    fn test_is_nifti_file(#[case] filename: &str, #[case] expected: bool) {
        let temp_dir = tempfile::tempdir().unwrap();
        let file_path = temp_dir.path().join(filename);
        if !filename.starts_with("missing") {
            std::fs::write(&file_path, "test").unwrap();
        }

        assert_eq!(file_path.is_nifti_file().unwrap(), expected);
        assert_eq!(file_path.is_nifti_file_or(!expected), expected);
    }

    #[rstest]
    #[case("series.bvec", true)]
    #[case("series.bval", true)]
    #[case("series.nii.gz", false)]
    #[case("series", false)]
    fn test_has_gradient_extension(#[case] path: &str, #[case] expected: bool) {
        let path = PathBuf::from(path);
        assert_eq!(path.has_gradient_extension(), expected);
    }

    #[test]
    fn test_find_niftis() {
        let temp_dir = tempfile::tempdir().unwrap();

        let nifti_files = vec![
            temp_dir.path().join("a.nii"),
            temp_dir.path().join("b.nii.gz"),
        ];
        let other_files = vec![
            temp_dir.path().join("b.bvec"),
            temp_dir.path().join("b.bval"),
        ];
        for file in nifti_files.iter().chain(other_files.iter()) {
            std::fs::write(file, "test").unwrap();
        }

        let found: Vec<_> = temp_dir.path().find_niftis().unwrap().collect();
        assert_eq!(found.len(), nifti_files.len());
        for file in &found {
            assert!(nifti_files.contains(file));
        }
    }
}
