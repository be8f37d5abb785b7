//! patrol: queue-driven browser session orchestration.
//!
//! One session loops through a simple staged flow: fetch the next target
//! address from a shared remote queue, navigate to it, record a reaction,
//! return to the site root, repeat, all for a bounded wall-clock window. The
//! outer cadence launches such a run every day and rests a fixed interval
//! between runs.
//!
//! The engine reacts to completed top-frame navigations only; which behavior
//! runs on a page is decided purely from the page's address. A per-session
//! heartbeat and watchdog keep a wedged session from staying wedged, bounded
//! by a restart budget.
//!
//! # Example
//!
//! ```ignore
//! use patrol::{account, config::RunConfig, runner};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let accounts = account::load_accounts(None)?;
//!     runner::run_all(&accounts, &RunConfig::default()).await?;
//!     Ok(())
//! }
//! ```

pub mod account;
pub mod bridge;
pub mod cadence;
pub mod classify;
pub mod config;
pub mod error;
pub mod navigator;
pub mod queue;
pub mod runner;
pub mod scripts;
pub mod session;
pub mod supervisor;

pub use account::{Account, load_accounts};
pub use cadence::CycleOutcome;
pub use classify::{PageKind, SiteProfile};
pub use config::{CadenceConfig, RunConfig};
pub use error::{PatrolError, Result};
pub use queue::{QueueBlob, QueueClient};
pub use session::SessionStats;
