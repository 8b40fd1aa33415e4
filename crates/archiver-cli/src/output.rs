//! Output formatting for CLI
//!
//! Provides consistent output formatting across all commands:
//! - Human-readable default output
//! - JSON output (--json flag)
//! - Quiet mode for scripting (--quiet flag)

use serde::Serialize;

use archiver_core::{ConfigEntry, LocationSummary, RollbackReport, StoreReport, Value};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable output (default)
    Human,
    /// JSON output
    Json,
    /// Quiet mode - minimal output
    Quiet,
}

impl OutputFormat {
    /// Create format from CLI flags
    pub fn from_flags(json: bool, quiet: bool) -> Self {
        if quiet {
            OutputFormat::Quiet
        } else if json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        }
    }
}

/// Output helper for consistent formatting
pub struct Output {
    /// The output format
    pub format: OutputFormat,
}

impl Output {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Print the location list, marking the current one
    pub fn print_locations(&self, locations: &[LocationSummary]) {
        match self.format {
            OutputFormat::Human => {
                for location in locations {
                    let marker = if location.current { "*" } else { " " };
                    let parent = location
                        .parent
                        .as_deref()
                        .map(|p| format!(" (parent: {})", p))
                        .unwrap_or_default();
                    println!(
                        "{} {}{} | {} entries | backends: {}",
                        marker,
                        location.id,
                        parent,
                        location.entries,
                        if location.backends.is_empty() {
                            "-".to_string()
                        } else {
                            location.backends.join(", ")
                        }
                    );
                }
                println!("\n{} location(s)", locations.len());
            }
            OutputFormat::Json => print_json(locations),
            OutputFormat::Quiet => {
                for location in locations {
                    println!("{}", location.id);
                }
            }
        }
    }

    pub fn print_store_report(&self, report: &StoreReport) {
        match self.format {
            OutputFormat::Human => match report.revision_id {
                Some(id) => println!(
                    "✓ Stored {} entries for '{}' at '{}' (revision {})",
                    report.stored, report.backend, report.location, id
                ),
                None => println!(
                    "✓ Document for '{}' was empty; backend registered at '{}'",
                    report.backend, report.location
                ),
            },
            OutputFormat::Json => print_json(report),
            OutputFormat::Quiet => {
                if let Some(id) = report.revision_id {
                    println!("{}", id);
                }
            }
        }
    }

    pub fn print_rollback_report(&self, report: &RollbackReport) {
        match self.format {
            OutputFormat::Human => {
                match report.revision_id {
                    Some(id) => println!(
                        "✓ Rolled back {} entries (revision {})",
                        report.applied.len(),
                        id
                    ),
                    None => println!("Nothing to roll back."),
                }
                for path in &report.skipped {
                    println!("  skipped {}", path);
                }
            }
            OutputFormat::Json => print_json(report),
            OutputFormat::Quiet => {
                for path in &report.applied {
                    println!("{}", path);
                }
            }
        }
    }

    /// Print the revisions of one entry, oldest first
    pub fn print_history(&self, path: &str, scope: &str, entry: &ConfigEntry) {
        match self.format {
            OutputFormat::Human => {
                println!("{} (stored at '{}', {})", path, scope, entry.kind());
                let head = entry.head().id;
                for revision in entry.revisions() {
                    let note = if revision.id == head {
                        "  [current]"
                    } else if !revision.superseded {
                        "  [checkpoint]"
                    } else {
                        ""
                    };
                    println!(
                        "  {:>5}  {}  {}{}",
                        revision.id,
                        revision.timestamp.format("%Y-%m-%d %H:%M:%S"),
                        format_value(&revision.value),
                        note
                    );
                }
                println!("\n{} revision(s)", entry.revisions().len());
            }
            OutputFormat::Json => print_json(&serde_json::json!({
                "path": path,
                "location": scope,
                "entry": entry,
            })),
            OutputFormat::Quiet => println!("{}", format_value(entry.current())),
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        match self.format {
            OutputFormat::Human => println!("✓ {}", message),
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({"status": "success", "message": message})
                );
            }
            OutputFormat::Quiet => {}
        }
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Error: could not encode JSON output: {}", e),
    }
}

/// Single-line rendering of a value for human output
fn format_value(value: &Value) -> String {
    match value {
        Value::Bool(b) => b.to_string(),
        Value::Int(n) => n.to_string(),
        Value::Float(f) => f.to_string(),
        Value::String(s) => format!("{:?}", s),
        Value::Bytes(bytes) => format!("<{} bytes>", bytes.len()),
        Value::Struct(fields) => {
            let inner: Vec<String> = fields
                .iter()
                .map(|(name, field)| format!("{}: {}", name, format_value(field)))
                .collect();
            format!("{{{}}}", inner.join(", "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_flags() {
        assert_eq!(OutputFormat::from_flags(false, false), OutputFormat::Human);
        assert_eq!(OutputFormat::from_flags(true, false), OutputFormat::Json);
        assert_eq!(OutputFormat::from_flags(false, true), OutputFormat::Quiet);
        // Quiet takes precedence
        assert_eq!(OutputFormat::from_flags(true, true), OutputFormat::Quiet);
    }

    #[test]
    fn test_format_value() {
        assert_eq!(format_value(&Value::Int(-3)), "-3");
        assert_eq!(format_value(&Value::from("#39374b")), "\"#39374b\"");
        assert_eq!(format_value(&Value::Bytes(vec![0; 4])), "<4 bytes>");
        assert_eq!(
            format_value(&Value::Struct(vec![
                ("x".into(), Value::Int(1)),
                ("on".into(), Value::Bool(true)),
            ])),
            "{x: 1, on: true}"
        );
    }
}
