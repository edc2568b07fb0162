pub mod convert;
pub mod deface;
pub mod snapshot;

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use snafu::ResultExt;

use crate::errors::tool::{NonZeroExitSnafu, SpawnSnafu};
use crate::errors::ToolError;

/// Run an external tool to completion, capturing its output. A spawn failure or a
/// non-zero exit status is an error; a non-zero exit carries the tool's stderr.
pub(crate) fn run(mut command: Command) -> Result<Output, ToolError> {
    let program = PathBuf::from(command.get_program());
    tracing::debug!("running {:?}", command);
    let output = command.output().context(SpawnSnafu {
        program: program.clone(),
    })?;
    if !output.status.success() {
        return NonZeroExitSnafu {
            program,
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        }
        .fail();
    }
    Ok(output)
}

/// Best-effort version probe for a wrapped binary: the first non-empty line the
/// tool prints, stderr as fallback. Exit status is ignored since several of the
/// wrapped tools report their version with a non-zero code.
pub fn probe_version(program: &Path, args: &[&str]) -> Option<String> {
    let output = Command::new(program).args(args).output().ok()?;
    let text = if output.stdout.is_empty() {
        output.stderr
    } else {
        output.stdout
    };
    String::from_utf8_lossy(&text)
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(String::from)
}
