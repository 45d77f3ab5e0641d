//! Inkbridge CLI - Command line front end for the Inkbridge entry editor engine

mod store;

use anyhow::{bail, Context, Result};
use clap::{Arg, ArgMatches, Command};
use inkbridge_core::{EditorConfig, EditorSession, RoundTripConverter, SessionEvent};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, Level};

use store::JsonStore;

/// Subcommand selected on the command line
#[derive(Debug, Clone, PartialEq)]
pub enum CliCommand {
    ToHtml { file: PathBuf },
    ToMarkdown { file: PathBuf },
    Check { file: PathBuf },
    Edit {
        store: PathBuf,
        entry: String,
        html: PathBuf,
    },
}

/// CLI arguments structure
#[derive(Debug, Clone)]
pub struct Args {
    pub command: CliCommand,
    pub config_file: Option<PathBuf>,
    pub verbose: bool,
}

fn file_arg(help: &'static str) -> Arg {
    Arg::new("file")
        .help(help)
        .required(true)
        .index(1)
        .value_parser(clap::value_parser!(PathBuf))
}

fn build_command() -> Command {
    Command::new("inkbridge")
        .version("0.1.0")
        .about("Markdown/HTML round-trip tools for hosted content entries")
        .long_about(
            "Inkbridge converts entry bodies between stored Markdown and the HTML a \
            rich-text editor works with, checks that editor HTML survives the round \
            trip, and can replay an edit against a JSON entry store.",
        )
        .subcommand_required(true)
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .global(true)
                .help("Path to editor configuration file (JSON format)")
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .global(true)
                .help("Enable debug logging")
                .action(clap::ArgAction::SetTrue),
        )
        .subcommand(
            Command::new("to-html")
                .about("Convert a Markdown file to editor HTML")
                .arg(file_arg("Markdown file to convert")),
        )
        .subcommand(
            Command::new("to-markdown")
                .about("Convert an editor HTML file to Markdown")
                .arg(file_arg("HTML file to convert")),
        )
        .subcommand(
            Command::new("check")
                .about("Check that an editor HTML file round-trips without drift")
                .arg(file_arg("HTML file to check")),
        )
        .subcommand(
            Command::new("edit")
                .about("Apply an HTML edit to an entry in a JSON store")
                .long_about(
                    "Mounts an editor session on the entry, replaces the document with \
                    the given HTML, waits for the debounced write-back and saves the store.",
                )
                .arg(
                    Arg::new("store")
                        .long("store")
                        .required(true)
                        .help("JSON store file holding { \"entries\": [...] }")
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .arg(
                    Arg::new("entry")
                        .long("entry")
                        .required(true)
                        .help("Id of the entry to edit")
                        .value_parser(clap::value_parser!(String)),
                )
                .arg(
                    Arg::new("html")
                        .long("html")
                        .required(true)
                        .help("HTML file with the new document")
                        .value_parser(clap::value_parser!(PathBuf)),
                ),
        )
}

impl Args {
    /// Parse command line arguments
    pub fn parse() -> Self {
        Self::from_matches(&build_command().get_matches())
    }

    fn from_matches(matches: &ArgMatches) -> Self {
        let path = |m: &ArgMatches, id: &str| m.get_one::<PathBuf>(id).cloned().unwrap_or_default();

        let command = match matches.subcommand() {
            Some(("to-html", m)) => CliCommand::ToHtml {
                file: path(m, "file"),
            },
            Some(("to-markdown", m)) => CliCommand::ToMarkdown {
                file: path(m, "file"),
            },
            Some(("check", m)) => CliCommand::Check {
                file: path(m, "file"),
            },
            Some(("edit", m)) => CliCommand::Edit {
                store: path(m, "store"),
                entry: m.get_one::<String>("entry").cloned().unwrap_or_default(),
                html: path(m, "html"),
            },
            _ => unreachable!("clap requires a subcommand"),
        };

        Self {
            command,
            config_file: matches.get_one::<PathBuf>("config").cloned(),
            verbose: matches.get_flag("verbose"),
        }
    }

    /// Load the editor configuration, falling back to defaults
    pub fn load_config(&self) -> Result<EditorConfig> {
        match &self.config_file {
            Some(path) => EditorConfig::from_file(path)
                .with_context(|| format!("Invalid configuration {}", path.display())),
            None => Ok(EditorConfig::default()),
        }
    }
}

fn read_input(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn check(converter: &RoundTripConverter, file: &Path) -> Result<()> {
    let html = read_input(file)?;
    match converter.check_round_trip(&html) {
        Ok(markdown) => {
            info!("{} round-trips cleanly ({} bytes of markdown)", file.display(), markdown.len());
            println!("ok");
            Ok(())
        }
        Err(e) => bail!("{}: {}", file.display(), e),
    }
}

async fn edit(config: EditorConfig, store_path: &Path, entry_id: &str, html_path: &Path) -> Result<()> {
    let html = read_input(html_path)?;
    let store = JsonStore::open(store_path)?;

    // Wait long enough for the debounce plus the commit itself
    let settle = config.quiet_window() + Duration::from_secs(5);

    let mut session = EditorSession::mount(store.host(), entry_id, config).await?;
    let mut events = session.subscribe();

    let echo = tokio::time::timeout(settle, events.recv())
        .await
        .context("load did not settle")??;
    debug!("Load settled: {:?}", echo);

    session.on_change(html)?;
    let outcome = tokio::time::timeout(settle, events.recv())
        .await
        .context("edit did not settle")??;
    session.unmount().await?;

    match outcome {
        SessionEvent::Committed {
            version,
            recently_published,
        } => {
            store.save()?;
            println!(
                "committed {} at version {}{}",
                entry_id,
                version,
                if recently_published { " (recently published)" } else { "" }
            );
        }
        SessionEvent::Unchanged { version } => {
            println!("unchanged {} at version {}", entry_id, version);
        }
        SessionEvent::WriteFailed { message } => bail!("write failed: {}", message),
        SessionEvent::Suppressed => bail!("edit was suppressed"),
    }
    Ok(())
}

async fn run(args: Args) -> Result<()> {
    let config = args.load_config()?;
    let converter = RoundTripConverter::from_config(&config);

    match &args.command {
        CliCommand::ToHtml { file } => {
            print!("{}", converter.to_html(&read_input(file)?)?);
        }
        CliCommand::ToMarkdown { file } => {
            println!("{}", converter.to_markdown(&read_input(file)?));
        }
        CliCommand::Check { file } => check(&converter, file)?,
        CliCommand::Edit { store, entry, html } => edit(config, store, entry, html).await?,
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.verbose { Level::DEBUG } else { Level::WARN };
    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(args.verbose)
        .with_writer(std::io::stderr)
        .init();

    debug!("Running {:?}", args.command);
    run(args).await
}
