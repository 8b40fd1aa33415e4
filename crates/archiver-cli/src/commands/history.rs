//! History command handler

use anyhow::{bail, Result};

use archiver_core::Archive;

use crate::output::Output;

/// Show the revisions of the entry visible at `path`
pub fn show(archive: &Archive, location: &str, path: &str, output: &Output) -> Result<()> {
    let Some((scope, entry)) = archive.history(location, path)? else {
        bail!("No entry at '{}' in location '{}'", path, location);
    };
    output.print_history(path, scope, entry);
    Ok(())
}
