pub(crate) mod cadence;
pub mod daemon;
pub mod jobs;

pub use cadence::IntervalCadence;
pub use jobs::{JobContext, RunTrigger, Scheduler, SchedulerError};
