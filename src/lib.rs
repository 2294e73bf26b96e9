//! Relay Bridge - one-shot command delivery into a scriptable host application
//!
//! This library provides the producer side (submit, trigger, await), the
//! host-side consumer loop that drains the shared queue directory, and the
//! installer that deploys that loop into the host's startup scripts.

pub mod automation;
pub mod awaiter;
pub mod command;
pub mod config;
pub mod consumer;
pub mod error;
pub mod installer;
pub mod job;
pub mod jsx;
pub mod logging;
pub mod paths;
pub mod submitter;
pub mod trigger;
pub mod utils;

#[cfg(test)]
pub(crate) mod test_support;

pub use command::{Command, DecodeError, DeliveryMode};
pub use error::{BridgeError, Result};
pub use job::{Artifact, Job, JobId};
pub use paths::BridgeDirs;
pub use trigger::{Bridge, Delivery, DeliveryReceipt};
