//! # Hookwire Engine
//!
//! The trigger-scheduling and delivery-tracking core.
//!
//! ## Architecture
//! ```text
//! WorkflowRegistry (workflows.json)
//!   └── PollScheduler: one tokio task per enabled workflow
//!         each tick:
//!           SourceConnector.current_end
//!             → CursorStore (dedupe, first-run init)
//!             → fetch_range (exclusive lower, inclusive upper)
//!             → filter::passes (ordered predicates)
//!             → Dispatcher.dispatch (per-item error isolation)
//!             → CursorStore.set (only after the full cycle)
//!
//! Inbound webhook (push, no cursor)
//!   └── fanout::fan_out: all enabled workflows matching the path
//! ```
//!
//! Delivery semantics are at-least-once: a crash between fetch and
//! cursor commit re-delivers the same range on the next tick, never
//! skips it.

pub mod cursor;
pub mod dispatch;
pub mod fanout;
pub mod filter;
pub mod poller;
pub mod registry;

pub use cursor::CursorStore;
pub use dispatch::Dispatcher;
pub use fanout::{FanoutOutcome, fan_out};
pub use filter::passes;
pub use poller::{CycleOutcome, PollScheduler, ScheduledInfo, run_cycle};
pub use registry::WorkflowRegistry;
