//! # Killfeed Store
//!
//! The in-memory working set behind a live kill display.
//!
//! ```text
//! ┌───────────────┐  insert   ┌────────────────────────────┐
//! │ ingestion     │ ────────► │ KillStore                  │
//! └───────────────┘           │  records: id → KillRecord  │ ◄── snapshot / focus / unfocus
//! ┌───────────────┐  sweep    │  focused: Option<id>       │
//! │ SweepScheduler│ ────────► │                            │
//! └───────────────┘           └────────────────────────────┘
//! ```
//!
//! No capacity bound: the sweep cadence is what keeps the set small.

pub mod store;
pub mod sweeper;

pub use store::{KillStore, StoreSnapshot, SweepReport};
pub use sweeper::SweepScheduler;
