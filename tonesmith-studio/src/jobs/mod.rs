//! Synthesis job tracking
//!
//! `status` holds the vendor status vocabulary and its terminal-state
//! classification; `poller` drives the per-job polling loops.

pub mod poller;
pub mod status;

pub use poller::{ChannelProgressSink, JobCompletionHandler, JobProgressSink, JobStatusPoller};
pub use status::JobStatus;
