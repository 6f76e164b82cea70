use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use dir_tree_sync::config::{AppConfig, FilterConfig};
use dir_tree_sync::error::{Result, TreeError};
use dir_tree_sync::event::{EventHandler, TreeEvent};
use dir_tree_sync::fs::watcher::{changed_dirs, FsWatcher};
use dir_tree_sync::fs::LocalFs;
use dir_tree_sync::tree::DirectoryTree;

/// Print a lazily synchronized directory tree of a folder.
#[derive(Parser, Debug)]
#[command(name = "dtree", version, about)]
struct Cli {
    /// Explicit config file, merged over the discovered ones
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Log refresh activity to stderr
    #[arg(short, long)]
    verbose: bool,

    /// Host directory mapped to the virtual root `/`
    base: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Select a path and print the tree once
    Show {
        /// Virtual path to select, e.g. /projects/app/src
        path: String,
        /// Print a JSON snapshot instead of text
        #[arg(long)]
        json: bool,
        /// Show hidden and ignored directories
        #[arg(long)]
        all: bool,
    },
    /// Select a path and re-print the tree after every filesystem change
    Watch {
        /// Virtual path to select
        path: String,
    },
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let base = cli.base.canonicalize().map_err(|_| {
        TreeError::InvalidPath(format!("{} does not exist", cli.base.display()))
    })?;

    let show_all = matches!(cli.command, Command::Show { all: true, .. });
    let overrides = show_all.then(|| AppConfig {
        filter: FilterConfig {
            show_hidden: Some(true),
            ignore: Some(Vec::new()),
        },
        ..AppConfig::default()
    });
    let config = AppConfig::load(cli.config.as_deref(), overrides.as_ref());

    let fs = Arc::new(LocalFs::new(&base));
    let mut tree = DirectoryTree::from_config(fs.clone(), &config);

    match cli.command {
        Command::Show { path, json, .. } => {
            tree.select_path(&path).await?;
            print_tree(&tree, json)?;
        }
        Command::Watch { path } => {
            tree.select_path(&path).await?;
            print_tree(&tree, false)?;
            watch(&mut tree, &fs, &config).await?;
        }
    }

    Ok(())
}

fn print_tree(tree: &DirectoryTree, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(&tree.snapshot())?);
    } else {
        print!("{}", tree.render_text());
    }
    Ok(())
}

async fn watch(tree: &mut DirectoryTree, fs: &LocalFs, config: &AppConfig) -> Result<()> {
    let Some(root_path) = tree.root_path().map(str::to_string) else {
        return Ok(());
    };
    let host_root = fs.host_path(&root_path);

    if !config.watcher_enabled() {
        warn!("watcher disabled by config, nothing to do");
        return Ok(());
    }

    let mut events = EventHandler::new();
    let _watcher = FsWatcher::new(
        &host_root,
        Duration::from_millis(config.debounce_ms()),
        config.ignore_names(),
        config.flood_threshold(),
        events.sender(),
    )?;
    info!(root = %host_root.display(), "watching for changes");

    loop {
        match events.next().await? {
            TreeEvent::FsChange(paths) => {
                let changes = changed_dirs(fs, &root_path, &paths);
                debug!(?changes, "change batch received");
                match tree.apply_changes(&changes).await {
                    Ok(true) => {
                        println!();
                        print_tree(tree, false)?;
                    }
                    Ok(false) => {}
                    Err(e) => warn!(error = %e, "refresh after change failed"),
                }
            }
            TreeEvent::Shutdown => break,
        }
    }

    Ok(())
}
