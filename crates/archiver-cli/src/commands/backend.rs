//! Backend command handlers

use anyhow::{Context, Result};

use archiver_core::Archive;

use crate::output::Output;

/// Register a backend with a location, or archive-wide with `master`
pub fn add(
    archive: &mut Archive,
    location: &str,
    backend: &str,
    master: bool,
    output: &Output,
) -> Result<()> {
    if master {
        archive
            .add_master_backend(backend)
            .with_context(|| format!("Cannot add master backend '{}'", backend))?;
        output.success(&format!("Added master backend '{}'", backend));
    } else {
        archive
            .add_backend(location, backend)
            .with_context(|| format!("Cannot add backend '{}'", backend))?;
        output.success(&format!("Added backend '{}' to '{}'", backend, location));
    }
    Ok(())
}

/// Unregister a backend; stored values are kept
pub fn remove(
    archive: &mut Archive,
    location: &str,
    backend: &str,
    master: bool,
    output: &Output,
) -> Result<()> {
    if master {
        archive
            .remove_master_backend(backend)
            .with_context(|| format!("Cannot remove master backend '{}'", backend))?;
        output.success(&format!("Removed master backend '{}'", backend));
    } else {
        archive
            .remove_backend(location, backend)
            .with_context(|| format!("Cannot remove backend '{}'", backend))?;
        output.success(&format!("Removed backend '{}' from '{}'", backend, location));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::OutputFormat;

    #[test]
    fn test_location_and_master_scopes_are_separate() {
        let mut archive = Archive::new();
        let output = Output::new(OutputFormat::Quiet);

        add(&mut archive, "default", "bg", false, &output).unwrap();
        add(&mut archive, "default", "bg", true, &output).unwrap();
        assert!(add(&mut archive, "default", "bg", false, &output).is_err());

        remove(&mut archive, "default", "bg", true, &output).unwrap();
        assert!(archive.master_backends().is_empty());
        assert!(archive.location("default").unwrap().contains_backend("bg"));
    }
}
