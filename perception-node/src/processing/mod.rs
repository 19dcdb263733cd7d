//! The producer: capture, detect, publish, on its own thread.

mod producer;

pub use producer::{CycleOutcome, ProducerHandle, ProducerLoop, ProducerState};
