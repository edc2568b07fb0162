use std::path::{Path, PathBuf};

use snafu::{ensure, ResultExt, Snafu};

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum GradientError {
    #[snafu(display("failed to read gradient file {}", path.display()))]
    Read {
        path: PathBuf,
        #[snafu(source(from(std::io::Error, Box::new)))]
        source: Box<std::io::Error>,
    },

    #[snafu(display("invalid number '{}' in gradient file {}", token, path.display()))]
    ParseNumber {
        token: String,
        path: PathBuf,
        #[snafu(source(from(std::num::ParseFloatError, Box::new)))]
        source: Box<std::num::ParseFloatError>,
    },

    #[snafu(display("gradient vector file {} has {} rows, expected 3", path.display(), rows))]
    RowCount { path: PathBuf, rows: usize },

    #[snafu(display(
        "gradient vector rows in {} have inconsistent lengths: {:?}",
        path.display(),
        lengths
    ))]
    RaggedRows { path: PathBuf, lengths: Vec<usize> },

    #[snafu(display(
        "gradient tables disagree: {} directions in {}, {} values in {}",
        directions,
        vectors.display(),
        values_count,
        values.display()
    ))]
    CountMismatch {
        directions: usize,
        vectors: PathBuf,
        values_count: usize,
        values: PathBuf,
    },
}

/// Diffusion gradient scheme read from a converter's `.bvec`/`.bval` pair.
#[derive(Debug, Clone, PartialEq)]
pub struct GradientTable {
    pub vectors: [Vec<f64>; 3],
    pub values: Vec<f64>,
}

impl GradientTable {
    pub fn directions(&self) -> usize {
        self.values.len()
    }
}

fn parse_row(line: &str, path: &Path) -> Result<Vec<f64>, GradientError> {
    line.split_whitespace()
        .map(|token| {
            token.parse::<f64>().context(ParseNumberSnafu {
                token: token.to_string(),
                path,
            })
        })
        .collect()
}

/// Read an FSL-style gradient vector file: three non-empty rows of equal length,
/// one per spatial axis.
pub fn read_vectors(path: &Path) -> Result<[Vec<f64>; 3], GradientError> {
    let contents = std::fs::read_to_string(path).context(ReadSnafu { path })?;
    let rows = contents
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| parse_row(line, path))
        .collect::<Result<Vec<_>, _>>()?;
    ensure!(
        rows.len() == 3,
        RowCountSnafu {
            path,
            rows: rows.len()
        }
    );
    let lengths = rows.iter().map(Vec::len).collect::<Vec<_>>();
    ensure!(
        lengths[0] == lengths[1] && lengths[1] == lengths[2],
        RaggedRowsSnafu { path, lengths }
    );
    let mut rows = rows.into_iter();
    Ok([
        rows.next().unwrap(),
        rows.next().unwrap(),
        rows.next().unwrap(),
    ])
}

/// Read an FSL-style gradient value file. Values may be split over several lines.
pub fn read_values(path: &Path) -> Result<Vec<f64>, GradientError> {
    let contents = std::fs::read_to_string(path).context(ReadSnafu { path })?;
    parse_row(&contents, path)
}

/// Read a `.bvec`/`.bval` pair and check that the two agree on the number of
/// diffusion directions.
pub fn read_table(vectors: &Path, values: &Path) -> Result<GradientTable, GradientError> {
    let vector_rows = read_vectors(vectors)?;
    let value_row = read_values(values)?;
    ensure!(
        vector_rows[0].len() == value_row.len(),
        CountMismatchSnafu {
            directions: vector_rows[0].len(),
            vectors,
            values_count: value_row.len(),
            values,
        }
    );
    Ok(GradientTable {
        vectors: vector_rows,
        values: value_row,
    })
}
