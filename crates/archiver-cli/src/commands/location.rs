//! Location command handlers

use anyhow::{Context, Result};

use archiver_core::Archive;

use crate::output::Output;

/// List all locations
pub fn list(archive: &Archive, output: &Output) -> Result<()> {
    output.print_locations(&archive.list_locations());
    Ok(())
}

/// Make `location` the current location
pub fn change(archive: &mut Archive, location: &str, output: &Output) -> Result<()> {
    archive
        .set_current_location(location)
        .with_context(|| format!("Cannot switch to location '{}'", location))?;
    output.success(&format!("Current location is now '{}'", location));
    Ok(())
}

/// Create a location
pub fn add(
    archive: &mut Archive,
    location: &str,
    parent: Option<&str>,
    output: &Output,
) -> Result<()> {
    archive
        .new_location(location, parent)
        .with_context(|| format!("Cannot create location '{}'", location))?;
    match parent {
        Some(parent) => output.success(&format!(
            "Created location '{}' inheriting from '{}'",
            location, parent
        )),
        None => output.success(&format!("Created location '{}'", location)),
    }
    Ok(())
}

/// Rename a location
pub fn rename(archive: &mut Archive, location: &str, new_name: &str, output: &Output) -> Result<()> {
    archive
        .rename_location(location, new_name)
        .with_context(|| format!("Cannot rename location '{}'", location))?;
    output.success(&format!("Renamed location '{}' to '{}'", location, new_name));
    Ok(())
}

/// Delete a location
pub fn remove(archive: &mut Archive, location: &str, output: &Output) -> Result<()> {
    archive
        .remove_location(location)
        .with_context(|| format!("Cannot remove location '{}'", location))?;
    output.success(&format!("Removed location '{}'", location));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::OutputFormat;

    #[test]
    fn test_location_lifecycle() {
        let mut archive = Archive::new();
        let output = Output::new(OutputFormat::Quiet);

        add(&mut archive, "work", Some("default"), &output).unwrap();
        change(&mut archive, "work", &output).unwrap();
        rename(&mut archive, "work", "office", &output).unwrap();
        assert_eq!(archive.current_location_id(), "office");

        // Current location cannot be removed
        let err = remove(&mut archive, "office", &output).unwrap_err();
        assert!(err.to_string().contains("Cannot remove location 'office'"));

        change(&mut archive, "default", &output).unwrap();
        remove(&mut archive, "office", &output).unwrap();
        assert_eq!(archive.locations().len(), 1);
    }

    #[test]
    fn test_change_to_missing_location_fails() {
        let mut archive = Archive::new();
        let output = Output::new(OutputFormat::Quiet);
        assert!(change(&mut archive, "nowhere", &output).is_err());
        assert_eq!(archive.current_location_id(), "default");
    }
}
