use std::path::{Path, PathBuf};

use itertools::Itertools;
use snafu::{ResultExt, Snafu};

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum LayoutError {
    #[snafu(display("failed to create directory: {}", path.display()))]
    CreateDir {
        path: PathBuf,
        #[snafu(source(from(std::io::Error, Box::new)))]
        source: Box<std::io::Error>,
    },

    #[snafu(display("failed to erase directory: {}", path.display()))]
    EraseDir {
        path: PathBuf,
        #[snafu(source(from(std::io::Error, Box::new)))]
        source: Box<std::io::Error>,
    },

    #[snafu(display("failed to move {} to {}", from.display(), to.display()))]
    Rename {
        from: PathBuf,
        to: PathBuf,
        #[snafu(source(from(std::io::Error, Box::new)))]
        source: Box<std::io::Error>,
    },

    #[snafu(display("converter produced a file without a NIfTI extension: {}", path.display()))]
    UnrecognizedVolume { path: PathBuf },
}

/// Reduce an identifier to characters that are safe in every part of an output path.
/// Anything outside ASCII alphanumerics becomes an underscore, runs of underscores
/// are collapsed and the ends are trimmed.
pub fn sanitize_identifier(raw: &str) -> String {
    raw.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .coalesce(|a, b| {
            if a == '_' && b == '_' {
                Ok('_')
            } else {
                Err((a, b))
            }
        })
        .collect::<String>()
        .trim_matches('_')
        .to_string()
}

/// Split a NIfTI file name into its stem and extension, treating `.nii.gz` as a
/// single extension.
pub fn split_nifti_name(name: &str) -> Option<(&str, &str)> {
    if let Some(stem) = name.strip_suffix(".nii.gz") {
        Some((stem, "nii.gz"))
    } else {
        name.strip_suffix(".nii").map(|stem| (stem, "nii"))
    }
}

/// Create `dir`, deleting it first when `erase` is set and it already exists.
pub fn prepare_directory(dir: &Path, erase: bool) -> Result<(), LayoutError> {
    if erase && dir.is_dir() {
        std::fs::remove_dir_all(dir).context(EraseDirSnafu { path: dir })?;
    }
    std::fs::create_dir_all(dir).context(CreateDirSnafu { path: dir })
}

/// Deterministic output naming for one converted series.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesLayout {
    subject: String,
    session: String,
    protocol: String,
    modality: String,
    acquisition: Option<String>,
}

/// Renamed output files of one conversion, grouped by kind.
#[derive(Debug, Default)]
pub struct ArrangedSeries {
    pub volumes: Vec<PathBuf>,
    pub gradient_vectors: Vec<PathBuf>,
    pub gradient_values: Vec<PathBuf>,
}

impl SeriesLayout {
    pub fn new(
        subject: &str,
        session: &str,
        protocol: &str,
        modality: &str,
        acquisition: Option<&str>,
    ) -> Self {
        Self {
            subject: sanitize_identifier(subject),
            session: sanitize_identifier(session),
            protocol: sanitize_identifier(protocol),
            modality: sanitize_identifier(modality),
            acquisition: acquisition.map(sanitize_identifier),
        }
    }

    /// Directory holding every output of this series: `<root>/<subject>/<session>/<protocol>`.
    pub fn session_dir(&self, root: &Path) -> PathBuf {
        root.join(&self.subject)
            .join(&self.session)
            .join(&self.protocol)
    }

    /// File stem shared by every output of this series.
    pub fn stem(&self) -> String {
        let base = format!(
            "{}_{}_{}_{}",
            self.subject, self.session, self.protocol, self.modality
        );
        match &self.acquisition {
            Some(acquisition) => format!("{base}_{acquisition}"),
            None => base,
        }
    }

    /// Stem for the `index`-th output of `total`. A lone output keeps the bare stem,
    /// multiple outputs are numbered from 1 in their lexical discovery order.
    pub fn indexed_stem(&self, index: usize, total: usize) -> String {
        if total <= 1 {
            self.stem()
        } else {
            format!("{}_{}", self.stem(), index + 1)
        }
    }

    /// Move converter outputs into `dest` under the naming convention. Volumes keep
    /// their `.nii`/`.nii.gz` form, gradient files keep their `.bvec`/`.bval`
    /// extension; each kind is numbered independently.
    pub fn arrange(
        &self,
        dest: &Path,
        volumes: &[PathBuf],
        gradient_vectors: &[PathBuf],
        gradient_values: &[PathBuf],
    ) -> Result<ArrangedSeries, LayoutError> {
        let mut arranged = ArrangedSeries::default();
        for (index, volume) in volumes.iter().enumerate() {
            let name = volume
                .file_name()
                .and_then(|name| name.to_str())
                .and_then(split_nifti_name);
            let (_, extension) = name.ok_or_else(|| LayoutError::UnrecognizedVolume {
                path: volume.clone(),
            })?;
            let target = dest.join(format!(
                "{}.{}",
                self.indexed_stem(index, volumes.len()),
                extension
            ));
            rename(volume, &target)?;
            arranged.volumes.push(target);
        }
        for (index, vectors) in gradient_vectors.iter().enumerate() {
            let target = dest.join(format!(
                "{}.bvec",
                self.indexed_stem(index, gradient_vectors.len())
            ));
            rename(vectors, &target)?;
            arranged.gradient_vectors.push(target);
        }
        for (index, values) in gradient_values.iter().enumerate() {
            let target = dest.join(format!(
                "{}.bval",
                self.indexed_stem(index, gradient_values.len())
            ));
            rename(values, &target)?;
            arranged.gradient_values.push(target);
        }
        Ok(arranged)
    }
}

fn rename(from: &Path, to: &Path) -> Result<(), LayoutError> {
    tracing::debug!("moving {} -> {}", from.display(), to.display());
    std::fs::rename(from, to).context(RenameSnafu { from, to })
}

#[cfg(test)]
mod tests {
    use super::*;

    use rstest::rstest;

    fn layout() -> SeriesLayout {
        SeriesLayout::new("sub01", "ses01", "3DT1", "anat", None)
    }

    #[rstest]
    #[case("sub01", "sub01")]
    #[case("sub 01", "sub_01")]
    #[case("t1-mprage (sag)", "t1_mprage_sag")]
    #[case("__weird__", "weird")]
    #[case("a//b", "a_b")]
    fn test_sanitize_identifier(#[case] raw: &str, #[case] expected: &str) {
        assert_eq!(sanitize_identifier(raw), expected);
    }

    #[rstest]
    #[case("vol.nii", Some(("vol", "nii")))]
    #[case("vol.nii.gz", Some(("vol", "nii.gz")))]
    #[case("vol.gz", None)]
    #[case("vol", None)]
    fn test_split_nifti_name(#[case] name: &str, #[case] expected: Option<(&str, &str)>) {
        assert_eq!(split_nifti_name(name), expected);
    }

    #[test]
    fn test_session_dir_and_stem() {
        let layout = SeriesLayout::new("sub 01", "V1", "3D T1", "anat", Some("run-2"));
        let dir = layout.session_dir(Path::new("/data/nifti"));
        assert_eq!(dir, PathBuf::from("/data/nifti/sub_01/V1/3D_T1"));
        assert_eq!(layout.stem(), "sub_01_V1_3D_T1_anat_run_2");
    }

    #[test]
    fn test_indexed_stem() {
        let layout = layout();
        assert_eq!(layout.indexed_stem(0, 1), "sub01_ses01_3DT1_anat");
        assert_eq!(layout.indexed_stem(0, 3), "sub01_ses01_3DT1_anat_1");
        assert_eq!(layout.indexed_stem(2, 3), "sub01_ses01_3DT1_anat_3");
    }

    #[test]
    fn test_prepare_directory_creates_missing() {
        let temp_dir = tempfile::tempdir().unwrap();
        let target = temp_dir.path().join("a").join("b");
        prepare_directory(&target, false).unwrap();
        assert!(target.is_dir());
    }

    #[test]
    fn test_prepare_directory_keeps_contents_without_erase() {
        let temp_dir = tempfile::tempdir().unwrap();
        let target = temp_dir.path().join("out");
        std::fs::create_dir(&target).unwrap();
        let existing = target.join("keep.txt");
        std::fs::write(&existing, "x").unwrap();

        prepare_directory(&target, false).unwrap();
        assert!(existing.exists());
    }

    #[test]
    fn test_prepare_directory_erases_on_request() {
        let temp_dir = tempfile::tempdir().unwrap();
        let target = temp_dir.path().join("out");
        std::fs::create_dir(&target).unwrap();
        let existing = target.join("stale.txt");
        std::fs::write(&existing, "x").unwrap();

        prepare_directory(&target, true).unwrap();
        assert!(target.is_dir());
        assert!(!existing.exists());
    }

    #[test]
    fn test_arrange_single_volume() {
        let temp_dir = tempfile::tempdir().unwrap();
        let scratch = temp_dir.path().join("scratch");
        let dest = temp_dir.path().join("dest");
        std::fs::create_dir_all(&scratch).unwrap();
        std::fs::create_dir_all(&dest).unwrap();

        let raw = scratch.join("20240101_serie3.nii.gz");
        std::fs::write(&raw, "volume").unwrap();

        let arranged = layout().arrange(&dest, &[raw], &[], &[]).unwrap();
        let expected = dest.join("sub01_ses01_3DT1_anat.nii.gz");
        assert_eq!(arranged.volumes, vec![expected.clone()]);
        assert_eq!(std::fs::read_to_string(expected).unwrap(), "volume");
    }

    #[test]
    fn test_arrange_numbers_multiple_outputs() {
        let temp_dir = tempfile::tempdir().unwrap();
        let scratch = temp_dir.path().join("scratch");
        let dest = temp_dir.path().join("dest");
        std::fs::create_dir_all(&scratch).unwrap();
        std::fs::create_dir_all(&dest).unwrap();

        let volumes = vec![scratch.join("a.nii.gz"), scratch.join("b.nii")];
        let vectors = vec![scratch.join("a.bvec")];
        let values = vec![scratch.join("a.bval")];
        for file in volumes.iter().chain(vectors.iter()).chain(values.iter()) {
            std::fs::write(file, "x").unwrap();
        }

        let arranged = layout()
            .arrange(&dest, &volumes, &vectors, &values)
            .unwrap();
        assert_eq!(
            arranged.volumes,
            vec![
                dest.join("sub01_ses01_3DT1_anat_1.nii.gz"),
                dest.join("sub01_ses01_3DT1_anat_2.nii"),
            ]
        );
        // A lone gradient pair keeps the bare stem even when the series has two volumes.
        assert_eq!(
            arranged.gradient_vectors,
            vec![dest.join("sub01_ses01_3DT1_anat.bvec")]
        );
        assert_eq!(
            arranged.gradient_values,
            vec![dest.join("sub01_ses01_3DT1_anat.bval")]
        );
        for file in arranged
            .volumes
            .iter()
            .chain(arranged.gradient_vectors.iter())
            .chain(arranged.gradient_values.iter())
        {
            assert!(file.is_file());
        }
    }

    #[test]
    fn test_arrange_rejects_non_nifti_volume() {
        let temp_dir = tempfile::tempdir().unwrap();
        let stray = temp_dir.path().join("report.txt");
        std::fs::write(&stray, "x").unwrap();

        let result = layout().arrange(temp_dir.path(), &[stray], &[], &[]);
        assert!(matches!(
            result,
            Err(LayoutError::UnrecognizedVolume { .. })
        ));
    }
}
