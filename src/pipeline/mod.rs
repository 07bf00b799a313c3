//! Stages connected by queues, each running on its own thread(s).
//!
//! A [`Stage`] pops items from its input [`Queue`], hands them to its
//! [`Process`] behaviour, and the behaviour sends results through the
//! stage's [`OutputSide`] into whatever [`Port`] has been attached, usually
//! the input of the next stage. The end of a stream is marked by
//! [`Item::End`], which every stage forwards once its own input is
//! exhausted, so that shutdown ripples down the pipeline.

pub mod port;
pub mod queue;
pub mod stage;
pub mod to_host;

pub use port::{OutputSide, Port};
pub use queue::Queue;
pub use stage::{feed, Map, Process, Sink, Stage, StageHandle};
pub use to_host::ToHostImage;

use crate::device::DeviceError;

/// What travels through queues: data, or the end-of-stream marker
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Item<T> {
    Data(T),
    End,
}

impl<T> Item<T> {
    pub fn is_end(&self) -> bool { matches!(self, Item::End) }
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("output sent before any port was attached")]
    MissingPort,

    #[error("the receiving end of the queue has gone away")]
    Disconnected,

    #[error("image belongs to device #{device}, but only {count} devices were partitioned")]
    UnknownDevice { device: usize, count: usize },

    #[error("worker for device #{device} has stopped")]
    WorkerStopped { device: usize },

    #[error(transparent)]
    Device(#[from] DeviceError),

    #[error("thread `{0}` panicked")]
    Panicked(String),

    #[error("could not spawn thread `{name}`")]
    Spawn { name: String, #[source] source: std::io::Error },
}
