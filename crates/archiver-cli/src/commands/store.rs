//! Store command handler

use std::io::Read;

use anyhow::{Context, Result};
use chrono::Utc;

use archiver_core::{Archive, StoreMask};

use crate::output::Output;

/// Store the document read from `input` under `backend`
pub fn run(
    archive: &mut Archive,
    location: &str,
    backend: &str,
    mut input: impl Read,
    output: &Output,
) -> Result<()> {
    let mut xml = String::new();
    input
        .read_to_string(&mut xml)
        .context("Failed to read document from standard input")?;

    let report = archive
        .store_xml(location, backend, &xml, Utc::now(), StoreMask::Previous)
        .with_context(|| format!("Failed to store document for backend '{}'", backend))?;

    output.print_store_report(&report);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::OutputFormat;
    use archiver_core::Value;

    #[test]
    fn test_store_from_reader() {
        let mut archive = Archive::new();
        let output = Output::new(OutputFormat::Quiet);
        let doc = r#"<config backend="bg"><entry name="color1" type="string">#39374b</entry></config>"#;

        run(&mut archive, "default", "bg", doc.as_bytes(), &output).unwrap();

        assert_eq!(
            archive.get("default", "/bg/color1").unwrap(),
            Some(&Value::from("#39374b"))
        );
    }

    #[test]
    fn test_store_rejects_malformed_input() {
        let mut archive = Archive::new();
        let output = Output::new(OutputFormat::Quiet);

        let err = run(&mut archive, "default", "bg", "<config>".as_bytes(), &output).unwrap_err();
        assert!(err.to_string().contains("backend 'bg'"));
        assert!(!archive.is_dirty());
    }
}
