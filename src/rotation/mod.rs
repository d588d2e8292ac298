//! Log rotation engine
//!
//! The [`Rotator`] appends bytes to one active file and retires it into a
//! timestamped history tree when it grows past a size threshold or a calendar
//! period ends. Retired files are gzipped in the background and the oldest
//! are pruned past a retention count.
//!
//! ## Layout
//!
//! For an active file `app.log` with the default history path `%Y/%M`:
//!
//! ```text
//! app.log                                   active file
//! app.log.history/.app.log.rtr              last rotation (8 bytes, BE i64 secs)
//! app.log.history/2024/01/app_20240115T143045Z.log.gz
//! ```
//!
//! The tree is the only index: [`HistoryCatalog`] rebuilds the entry list by
//! walking it, so manual edits to the history are picked up on the next scan.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use logbox::rotation::{RotationDuration, RotationOptions, Rotator};
//!
//! let options = RotationOptions::default()
//!     .with_duration(RotationDuration::Daily)
//!     .with_history_count(30);
//! let rotator = Rotator::new("logs/app.log", options)?;
//! rotator.write(b"hello\n")?;
//! rotator.close()?;
//! # Ok::<(), logbox::rotation::RotateError>(())
//! ```

pub mod catalog;
pub mod clock;
pub mod engine;
pub mod error;
pub mod options;
mod perms;
pub mod retention;
pub mod state;
pub mod template;
pub mod tracker;

pub use catalog::{HistoryCatalog, HistoryEntry};
pub use clock::{Clock, ManualClock, SystemClock};
pub use engine::Rotator;
pub use error::{Result, RotateError};
pub use options::{DEFAULT_MAX_SIZE, RotationDuration, RotationOptions};
pub use retention::{PruneStats, RetireError, Retirement};
pub use state::StateStore;
pub use tracker::TaskTracker;
