//! Schedule carry-forward: regenerates recurring appointments.
//!
//! Modules:
//! - `traits`: the `ScheduleStore` seam the engine depends on
//! - `store`: SQLite implementation of the store
//! - `engine`: read, decide, write for a given `today`
//! - `runner`: run lock, run recording, structured logs
//! - `clock`: turns "now" into a calendar date in the configured offset
//! - `background`: cron-driven trigger thread

pub mod background;
pub mod clock;
pub mod engine;
pub mod error;
pub mod runner;
pub mod store;
pub mod traits;
pub mod types;

pub use background::{start_background_scheduler, CarryForwardSchedulerHandle};
pub use clock::{parse_utc_offset, Clock};
pub use engine::CarryForwardEngine;
pub use error::CarryForwardError;
pub use runner::{preview_carry_forward, run_carry_forward};
pub use store::SqliteScheduleStore;
pub use traits::ScheduleStore;
pub use types::*;
