//! Configuration archiver CLI
//!
//! Command-line front end for the configuration archive: store documents,
//! roll back, and manage locations and backends.

use std::fs::OpenOptions;
use std::io;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{ArgGroup, Parser};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use archiver_core::{Archive, ArchiveError, Config, RollbackRequest, RollbackTarget, StorageError};

mod commands;
mod output;

use output::{Output, OutputFormat};

#[derive(Parser, Debug)]
#[command(name = "config-archiver")]
#[command(about = "Versioned, location-scoped configuration archive")]
#[command(version)]
#[command(group(
    ArgGroup::new("action")
        .required(true)
        .args([
            "store",
            "rollback",
            "change_location",
            "rename_location",
            "add_location",
            "remove_location",
            "add_backend",
            "remove_backend",
            "list_locations",
            "history",
        ])
))]
struct Cli {
    /// Read a configuration document from standard input and store it
    #[arg(short, long)]
    store: bool,

    /// Roll back to an earlier state
    #[arg(short, long)]
    rollback: bool,

    /// Make --location the current location
    #[arg(short = 'c', long)]
    change_location: bool,

    /// Rename the target location to --new-name
    #[arg(long)]
    rename_location: bool,

    /// Create the location named by --location
    #[arg(long)]
    add_location: bool,

    /// Delete the target location
    #[arg(long)]
    remove_location: bool,

    /// Register --backend with the target location
    #[arg(long)]
    add_backend: bool,

    /// Unregister --backend from the target location
    #[arg(long)]
    remove_backend: bool,

    /// List all locations
    #[arg(long)]
    list_locations: bool,

    /// Show the revision history of a key path
    #[arg(long, value_name = "PATH")]
    history: Option<String>,

    /// Roll back to the state at this date
    #[arg(short, long, value_name = "DATE")]
    date: Option<String>,

    /// Roll back every backend instead of just --backend
    #[arg(short, long)]
    all: bool,

    /// Roll back to the values written by this revision
    #[arg(short = 'i', long, value_name = "ID")]
    revision_id: Option<u64>,

    /// Undo the most recent change
    #[arg(long)]
    last: bool,

    /// Go back this many revisions
    #[arg(long, value_name = "N")]
    steps: Option<usize>,

    /// Print the rolled-back document instead of applying it
    #[arg(long)]
    show: bool,

    /// Include values inherited from parent locations
    #[arg(long)]
    recursive: bool,

    /// New id for --rename-location
    #[arg(long, value_name = "NAME")]
    new_name: Option<String>,

    /// Parent for --add-location
    #[arg(short, long, value_name = "LOCATION")]
    parent: Option<String>,

    /// Apply --add-backend / --remove-backend archive-wide
    #[arg(short, long)]
    master: bool,

    /// Use the global database instead of the per-user one
    #[arg(short, long)]
    global: bool,

    /// Target location (defaults to the current location)
    #[arg(short, long, value_name = "LOCATION")]
    location: Option<String>,

    /// Target backend
    #[arg(short, long, value_name = "BACKEND")]
    backend: Option<String>,

    /// Path to config file
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Output as JSON
    #[arg(long)]
    json: bool,

    /// Quiet mode - minimal output
    #[arg(short, long)]
    quiet: bool,

    /// Log debug output to stderr
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    /// Rollback-only flags present on the command line
    fn rollback_modifiers(&self) -> Vec<&'static str> {
        [
            ("--date", self.date.is_some()),
            ("--all", self.all),
            ("--revision-id", self.revision_id.is_some()),
            ("--last", self.last),
            ("--steps", self.steps.is_some()),
            ("--show", self.show),
            ("--recursive", self.recursive),
        ]
        .into_iter()
        .filter_map(|(flag, given)| given.then_some(flag))
        .collect()
    }
}

/// The one operation an invocation performs
#[derive(Debug, Clone, PartialEq, Eq)]
enum Action {
    Store { backend: String },
    Rollback { request: RollbackRequest, show: bool },
    ChangeLocation { location: String },
    RenameLocation { new_name: String },
    AddLocation { location: String, parent: Option<String> },
    RemoveLocation,
    AddBackend { backend: String, master: bool },
    RemoveBackend { backend: String, master: bool },
    ListLocations,
    History { path: String },
}

/// Validated command line, fixed for the rest of the run
#[derive(Debug)]
struct Options {
    action: Action,
    /// Explicit `--location`; `None` means the current location
    location: Option<String>,
    global: bool,
    verbose: bool,
    config: Option<PathBuf>,
    format: OutputFormat,
}

impl Options {
    fn from_cli(cli: Cli) -> Result<Self> {
        if !cli.rollback {
            let stray = cli.rollback_modifiers();
            if !stray.is_empty() {
                bail!("{} only apply to --rollback", stray.join(", "));
            }
        }

        let action = if cli.store {
            Action::Store {
                backend: cli.backend.clone().context("--store needs --backend")?,
            }
        } else if cli.rollback {
            let date = cli
                .date
                .as_deref()
                .map(commands::rollback::parse_date)
                .transpose()?;
            let target = RollbackTarget::from_criteria(date, cli.last, cli.steps, cli.revision_id)?;
            let mut request = RollbackRequest::new(target).recursive(cli.recursive);
            if !cli.all {
                let backend = cli
                    .backend
                    .clone()
                    .context("--rollback needs --backend or --all")?;
                request = request.with_backend(backend);
            }
            Action::Rollback {
                request,
                show: cli.show,
            }
        } else if cli.change_location {
            Action::ChangeLocation {
                location: cli
                    .location
                    .clone()
                    .context("--change-location needs --location")?,
            }
        } else if cli.rename_location {
            Action::RenameLocation {
                new_name: cli
                    .new_name
                    .clone()
                    .context("--rename-location needs --new-name")?,
            }
        } else if cli.add_location {
            Action::AddLocation {
                location: cli
                    .location
                    .clone()
                    .context("--add-location needs --location")?,
                parent: cli.parent.clone(),
            }
        } else if cli.remove_location {
            Action::RemoveLocation
        } else if cli.add_backend || cli.remove_backend {
            let backend = cli
                .backend
                .clone()
                .context("--add-backend and --remove-backend need --backend")?;
            if cli.add_backend {
                Action::AddBackend {
                    backend,
                    master: cli.master,
                }
            } else {
                Action::RemoveBackend {
                    backend,
                    master: cli.master,
                }
            }
        } else if cli.list_locations {
            Action::ListLocations
        } else if let Some(path) = cli.history.clone() {
            Action::History { path }
        } else {
            bail!("No operation given");
        };

        Ok(Self {
            action,
            location: cli.location,
            global: cli.global,
            verbose: cli.verbose,
            config: cli.config,
            format: OutputFormat::from_flags(cli.json, cli.quiet),
        })
    }
}

fn main() -> Result<()> {
    let result = try_main();
    if let Err(e) = &result {
        if let Some(hint) = recovery_hint(e) {
            eprintln!("Hint: {}", hint);
        }
    }
    result
}

fn try_main() -> Result<()> {
    let options = Options::from_cli(Cli::parse())?;
    let output = Output::new(options.format);

    let config = Config::load_with_cli_override(options.config.as_ref())
        .context("Failed to load configuration")?;
    init_logging(&config, options.verbose);

    let database = config.database_path(options.global);
    let mut archive = Archive::load(&config, options.global)
        .with_context(|| format!("Failed to open archive {:?}", database))?;
    debug!("Running {:?} against {:?}", options.action, database);

    // An error leaves the archive unsaved; nothing partial reaches disk
    run(&mut archive, &options, &output)?;

    if archive.is_dirty() {
        debug!("Writing changes to {:?}", archive.path());
    }
    archive.close().context("Failed to save archive")?;
    Ok(())
}

fn run(archive: &mut Archive, options: &Options, output: &Output) -> Result<()> {
    match &options.action {
        Action::Store { backend } => {
            let location = target_location(archive, options)?;
            commands::store::run(archive, &location, backend, io::stdin().lock(), output)
        }
        Action::Rollback { request, show } => {
            let location = target_location(archive, options)?;
            if *show {
                commands::rollback::show(archive, &location, request, &mut io::stdout().lock())
            } else {
                commands::rollback::apply(archive, &location, request, output)
            }
        }
        Action::ChangeLocation { location } => commands::location::change(archive, location, output),
        Action::RenameLocation { new_name } => {
            let location = target_location(archive, options)?;
            commands::location::rename(archive, &location, new_name, output)
        }
        Action::AddLocation { location, parent } => {
            commands::location::add(archive, location, parent.as_deref(), output)
        }
        Action::RemoveLocation => {
            let location = target_location(archive, options)?;
            commands::location::remove(archive, &location, output)
        }
        Action::AddBackend { backend, master } => {
            let location = target_location(archive, options)?;
            commands::backend::add(archive, &location, backend, *master, output)
        }
        Action::RemoveBackend { backend, master } => {
            let location = target_location(archive, options)?;
            commands::backend::remove(archive, &location, backend, *master, output)
        }
        Action::ListLocations => commands::location::list(archive, output),
        Action::History { path } => {
            let location = target_location(archive, options)?;
            commands::history::show(archive, &location, path, output)
        }
    }
}

/// Recovery advice for the storage failure behind `error`, if any
fn recovery_hint(error: &anyhow::Error) -> Option<&'static str> {
    error.chain().find_map(|cause| {
        if let Some(ArchiveError::Storage(storage)) = cause.downcast_ref::<ArchiveError>() {
            return storage.recovery_suggestion();
        }
        cause.downcast_ref::<StorageError>()?.recovery_suggestion()
    })
}

/// `--location` if given, else the current location; it must exist
fn target_location(archive: &Archive, options: &Options) -> Result<String> {
    let id = options
        .location
        .as_deref()
        .unwrap_or_else(|| archive.current_location_id());
    archive.location(id)?;
    Ok(id.to_string())
}

/// Install the tracing subscriber
///
/// `RUST_LOG` wins when set; otherwise `--verbose` selects debug and the
/// configured `log_level` applies. Logs go to `log_file` when configured.
fn init_logging(config: &Config, verbose: bool) {
    let level = if verbose { "debug" } else { config.log_level.as_str() };
    let env_filter = if std::env::var_os("RUST_LOG").is_some() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::new(format!("archiver_core={},archiver_cli={}", level, level))
    };

    let result = match &config.log_file {
        Some(path) => match OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_ansi(false)
                .with_writer(file)
                .try_init(),
            Err(e) => {
                eprintln!("Warning: Could not open log file {:?}: {}", path, e);
                return;
            }
        },
        None => tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_writer(io::stderr)
            .try_init(),
    };

    if let Err(e) = result {
        eprintln!("Warning: Could not initialize logging: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(args: &[&str]) -> Result<Options> {
        let mut argv = vec!["config-archiver"];
        argv.extend_from_slice(args);
        Options::from_cli(Cli::try_parse_from(argv)?)
    }

    #[test]
    fn test_store_needs_backend() {
        assert!(options(&["--store"]).is_err());

        let opts = options(&["-s", "-b", "bg", "-l", "work"]).unwrap();
        assert_eq!(
            opts.action,
            Action::Store {
                backend: "bg".into()
            }
        );
        assert_eq!(opts.location.as_deref(), Some("work"));
    }

    #[test]
    fn test_an_action_is_required() {
        assert!(options(&["--backend", "bg"]).is_err());
        assert!(options(&["--store", "--rollback", "-b", "bg"]).is_err());
    }

    #[test]
    fn test_rollback_criteria() {
        // No criteria at all is a user error
        assert!(options(&["-r", "-b", "bg"]).is_err());
        // Neither a backend nor --all
        assert!(options(&["-r", "--last"]).is_err());

        let opts = options(&["-r", "--all", "--steps", "3", "--recursive", "--show"]).unwrap();
        let Action::Rollback { request, show } = opts.action else {
            panic!("expected rollback");
        };
        assert!(show);
        assert!(request.recursive);
        assert_eq!(request.backend, None);
        assert_eq!(request.target, RollbackTarget::Steps(3));

        let opts = options(&["-r", "-b", "bg", "--date", "2024-01-01T00:00:00Z"]).unwrap();
        let Action::Rollback { request, .. } = opts.action else {
            panic!("expected rollback");
        };
        assert_eq!(request.backend.as_deref(), Some("bg"));
        assert!(matches!(request.target, RollbackTarget::Date(_)));
    }

    #[test]
    fn test_rollback_flags_need_rollback() {
        for args in [
            &["--list-locations", "--last"][..],
            &["--list-locations", "--steps", "3"],
            &["-c", "-l", "work", "--date", "2024-01-01"],
            &["--list-locations", "--show"],
            &["--add-backend", "-b", "bg", "--all", "--recursive"],
        ] {
            assert!(options(args).is_err(), "{:?}", args);
        }

        let err = options(&["--history", "/bg/x", "-i", "4", "--last"]).unwrap_err();
        assert_eq!(err.to_string(), "--revision-id, --last only apply to --rollback");
    }

    #[test]
    fn test_location_actions() {
        assert!(options(&["-c"]).is_err());
        assert!(options(&["--rename-location"]).is_err());
        assert!(options(&["--add-location"]).is_err());

        let opts = options(&["--add-location", "-l", "work", "--parent", "default"]).unwrap();
        assert_eq!(
            opts.action,
            Action::AddLocation {
                location: "work".into(),
                parent: Some("default".into())
            }
        );

        let opts = options(&["--rename-location", "--new-name", "office", "-g"]).unwrap();
        assert!(opts.global);
        assert_eq!(
            opts.action,
            Action::RenameLocation {
                new_name: "office".into()
            }
        );
    }

    #[test]
    fn test_backend_actions() {
        assert!(options(&["--add-backend"]).is_err());

        let opts = options(&["--remove-backend", "-b", "bg", "--master"]).unwrap();
        assert_eq!(
            opts.action,
            Action::RemoveBackend {
                backend: "bg".into(),
                master: true
            }
        );
    }

    #[test]
    fn test_output_flags() {
        let opts = options(&["--list-locations", "--json"]).unwrap();
        assert_eq!(opts.format, OutputFormat::Json);

        let opts = options(&["--history", "/bg/color1", "-q"]).unwrap();
        assert_eq!(opts.format, OutputFormat::Quiet);
        assert_eq!(
            opts.action,
            Action::History {
                path: "/bg/color1".into()
            }
        );
    }

    #[test]
    fn test_recovery_hint_for_lock_timeout() {
        let timeout = ArchiveError::Storage(StorageError::LockTimeout {
            path: PathBuf::from("/tmp/archive.xml.lock"),
            timeout: std::time::Duration::from_millis(100),
        });
        let err = anyhow::Error::from(timeout).context("Failed to open archive");
        assert_eq!(
            recovery_hint(&err),
            Some("Wait for the other archiver process to finish, or raise lock_timeout_ms.")
        );

        let err = anyhow::Error::from(ArchiveError::LocationNotFound("work".into()));
        assert_eq!(recovery_hint(&err), None);
    }

    #[test]
    fn test_target_location_must_exist() {
        let archive = Archive::new();

        let opts = options(&["--remove-location"]).unwrap();
        assert_eq!(target_location(&archive, &opts).unwrap(), "default");

        let opts = options(&["--remove-location", "-l", "missing"]).unwrap();
        assert!(target_location(&archive, &opts).is_err());
    }
}
