use std::fs::{self, File};
use std::io::stdout;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{ArgAction, Parser, Subcommand};
use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use log::{LevelFilter, error, info, warn};
use ratatui::{Terminal, backend::CrosstermBackend};
use simplelog::{Config, WriteLogger};

use mdreview::event_source::KeyboardEventSource;
use mdreview::panic_handler::initialize_panic_handler;
use mdreview::review::ReviewController;
use mdreview::session::Session;
use mdreview::settings;
use mdreview::signal::{ReviewStatus, wait_for_signal};
use mdreview::storage::FsStorage;
use mdreview::{App, run_app_with_event_source};

#[derive(Parser, Debug)]
#[command(
    name = "mdreview",
    version,
    about = "Review Markdown documents with anchored comments",
    args_conflicts_with_subcommands = true
)]
struct Cli {
    /// Markdown files to review, one tab each
    files: Vec<PathBuf>,

    /// Log file (default: mdreview.log in the state directory)
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    /// Log at debug level regardless of settings
    #[arg(long, short, global = true, action = ArgAction::SetTrue)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Block until a review of FILE finishes and print its completion signal
    Wait {
        file: PathBuf,
        /// Give up after this many seconds
        #[arg(long)]
        timeout: Option<u64>,
    },
    /// List the comments of FILE and whether their text is still found
    Comments { file: PathBuf },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    // Logging needs the configured level; the load outcome is logged after.
    let settings_origin = settings::load_settings();

    if let Err(e) = init_logging(&cli) {
        eprintln!("Failed to initialize logging: {e:#}");
    }
    match settings_origin {
        Ok(origin) => info!("{origin}"),
        Err(e) => warn!("{e:#}, using default settings"),
    }

    let result = match cli.command {
        Some(Commands::Wait { file, timeout }) => wait(&file, timeout),
        Some(Commands::Comments { file }) => list_comments(&file).map(|()| ExitCode::SUCCESS),
        None => review(cli.files).map(|()| ExitCode::SUCCESS),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            error!("{e:#}");
            eprintln!("Error: {e:#}");
            ExitCode::from(1)
        }
    }
}

fn init_logging(cli: &Cli) -> Result<()> {
    let path = match &cli.log_file {
        Some(path) => path.clone(),
        None => {
            let dir = settings::state_dir().context("Could not determine state directory")?;
            fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create {}", dir.display()))?;
            dir.join("mdreview.log")
        }
    };

    let level = if cli.verbose {
        LevelFilter::Debug
    } else {
        settings::get_log_level().to_filter()
    };

    WriteLogger::init(
        level,
        Config::default(),
        File::create(&path).with_context(|| format!("Failed to create {}", path.display()))?,
    )?;
    Ok(())
}

fn review(files: Vec<PathBuf>) -> Result<()> {
    if files.is_empty() {
        bail!("No files given. Usage: mdreview <FILE>...");
    }

    info!("Starting review of {} documents", files.len());
    let session = Session::open(Arc::new(FsStorage), &files)?;
    let mut app = App::new(session);

    initialize_panic_handler();
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app_with_event_source(&mut terminal, &mut app, &mut KeyboardEventSource);

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    for (path, status) in app.outcomes() {
        println!("{}: {}", path.display(), status.as_str());
    }
    info!("Shutting down");
    res
}

fn wait(file: &Path, timeout: Option<u64>) -> Result<ExitCode> {
    let signal = wait_for_signal(
        file,
        settings::get_wait_poll_interval(),
        timeout.map(Duration::from_secs),
    )?;
    println!("{}", signal.to_json()?.trim_end());

    Ok(match signal.status {
        ReviewStatus::Approved => ExitCode::SUCCESS,
        ReviewStatus::ChangesRequested => ExitCode::from(2),
    })
}

fn list_comments(file: &Path) -> Result<()> {
    let controller = ReviewController::open(Arc::new(FsStorage), file)?;
    if controller.comments().is_empty() {
        println!("No comments on {}", file.display());
        return Ok(());
    }

    for (idx, comment) in controller.comments().iter().enumerate() {
        let anchor = if controller.is_orphaned(&comment.id) {
            "orphaned"
        } else {
            "anchored"
        };
        let resolved = if comment.resolved { ", resolved" } else { "" };
        println!(
            "{}. [{anchor}{resolved}] \"{}\"",
            idx + 1,
            comment.excerpt(60)
        );
        for line in textwrap::wrap(&comment.text, 76) {
            println!("   {line}");
        }
    }
    Ok(())
}
