use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use media_browser::browse::{BrowseMode, Pane};
use media_browser::config::AppConfig;
use media_browser::error::Result;
use media_browser::event::EventBus;
use media_browser::fs::service::LocalFileService;
use media_browser::ShareState;

/// Browse a directory tree the way the embedded media browser would.
#[derive(Parser, Debug)]
#[command(name = "mbrowse", version, about)]
struct Cli {
    /// Directory to open (defaults to the filesystem root)
    #[arg(default_value = "/")]
    path: String,

    /// Browsing mode: scanned, scanned-fixed, or walk
    #[arg(long, default_value = "scanned")]
    mode: String,

    /// Sort method (name-asc, date-desc, size-asc, ...)
    #[arg(long)]
    sort: Option<String>,

    /// Explicit config file path
    #[arg(long)]
    config: Option<PathBuf>,

    /// Restore a shared location query string instead of PATH/--mode
    #[arg(long)]
    open: Option<String>,

    /// Maximum number of entries to print
    #[arg(long, default_value_t = 100)]
    limit: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let conf = AppConfig::load(cli.config.as_deref(), None);
    let (mode, path) = match &cli.open {
        Some(query) => {
            let state = ShareState::from_query(query)?;
            (state.mode, state.path)
        }
        None => (cli.mode.parse()?, cli.path.clone()),
    };

    let service = Arc::new(LocalFileService::with_scanned_roots(
        conf.scanned_paths().to_vec(),
    ));
    let mut pane = Pane::new(service, Arc::new(conf), EventBus::new(), mode, Some(path))?;
    if let Some(sort) = &cli.sort {
        pane.set_sort_method(sort.parse()?);
    }
    pane.mount().await?;

    if mode == BrowseMode::Walk {
        // drive the feeder the way a scrolling viewport would
        pane.fill_viewport().await?;
        while pane.can_load_next() && pane.sorted_files().len() < cli.limit {
            let end = pane.sorted_files().len();
            pane.on_scroll(0, end).await?;
        }
    }
    pane.pump().await?;

    println!("{} [{}]", pane.current_location(), mode);
    for file in pane.sorted_files().iter().take(cli.limit) {
        let marker = if file.is_dir() { "d" } else { "-" };
        println!("{} {:>10}  {:<19}  {}", marker, file.size, file.date, file.name);
    }
    Ok(())
}
