//! Client-side navigation core for a remote media file browser.
//!
//! The crate models one browser pane over a remote filesystem: a breadcrumb
//! navigation stack with three addressing modes, a depth-first streaming
//! walker for "show every image under here", a viewport feeder that keeps a
//! virtualized grid buffered, multi-select and drag/drop transfer, and the
//! event plumbing that keeps multiple panes consistent without shared state.

pub mod browse;
pub mod config;
pub mod error;
pub mod event;
pub mod fs;
pub mod host;
pub mod poll;

pub use browse::display::ViewportFeeder;
pub use browse::location::ShareState;
pub use browse::selection::{ClickModifiers, ClickOutcome};
pub use browse::transfer::{DropTarget, FileTransferData, PendingTransfer, TransferChoice};
pub use browse::walker::Walker;
pub use browse::{BrowseMode, Page, Pane};
pub use config::AppConfig;
pub use error::{AppError, Result};
pub use event::{EventBus, GlobalEvent, PaneEvent};
pub use fs::node::{FileNode, NodeKind};
pub use fs::service::{FileService, Listing, LocalFileService};
pub use fs::sort::{sort_files, SortMethod};
