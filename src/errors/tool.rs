use std::path::PathBuf;
use std::process::ExitStatus;

pub use snafu::{Snafu, Whatever};

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ToolError {
    #[snafu(display("failed to spawn '{}': {}", program.display(), source))]
    Spawn {
        program: PathBuf,
        #[snafu(source(from(std::io::Error, Box::new)))]
        source: Box<std::io::Error>,
    },

    #[snafu(display("'{}' failed with {}: {}", program.display(), status, stderr.trim()))]
    NonZeroExit {
        program: PathBuf,
        status: ExitStatus,
        stderr: String,
    },

    #[snafu(display(
        "'{}' exited successfully but did not produce {}",
        program.display(),
        path.display()
    ))]
    MissingOutput { program: PathBuf, path: PathBuf },

    #[snafu(display("failed to scan tool outputs in {}", path.display()))]
    ScanOutputs {
        path: PathBuf,
        #[snafu(source(from(std::io::Error, Box::new)))]
        source: Box<std::io::Error>,
    },

    #[snafu(display("input file not found: {}", path.display()))]
    InputNotFound { path: PathBuf },

    #[snafu(display("defacing method '{}' requires a templates directory", method))]
    TemplatesRequired { method: String },

    #[snafu(display("defacing template not found: {}", path.display()))]
    MissingTemplate { path: PathBuf },

    #[snafu(display("{}", message))]
    Other { message: String },
}

impl From<Whatever> for ToolError {
    fn from(source: Whatever) -> Self {
        Self::Other {
            message: source.to_string(),
        }
    }
}
