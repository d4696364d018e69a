//! Adaptive polling of a single device
//!
//! [`PollScheduler`] decides the cadence, [`Poller`] runs one cycle and
//! [`PollingTask`] drives cycles on a background task.

mod poller;
mod scheduler;
mod task;

pub use poller::{PollStatus, Poller};
pub use scheduler::{PollScheduler, PollState};
pub use task::{PollingTask, RefreshHandle};
