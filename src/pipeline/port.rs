use crossbeam_channel::Sender;

use super::{Item, PipelineError};

/// The pushing end of some stage's input queue
#[derive(Debug)]
pub struct Port<T> {
    tx: Sender<Item<T>>,
}

impl<T> Clone for Port<T> {
    fn clone(&self) -> Self { Self { tx: self.tx.clone() } }
}

impl<T> Port<T> {
    pub(crate) fn new(tx: Sender<Item<T>>) -> Self { Self { tx } }

    /// Blocks while the downstream queue is full. Fails if the queue's
    /// consumer has gone away.
    pub fn send(&self, item: Item<T>) -> Result<(), PipelineError> {
        self.tx.send(item).map_err(|_| PipelineError::Disconnected)
    }
}

/// Where a stage sends its results: at most one attached [`Port`].
#[derive(Debug)]
pub struct OutputSide<T> {
    port: Option<Port<T>>,
}

impl<T> Default for OutputSide<T> {
    fn default() -> Self { Self { port: None } }
}

impl<T> OutputSide<T> {
    pub fn new() -> Self { Self::default() }

    /// Take ownership of `port`, replacing (and handing back) any port
    /// attached earlier.
    pub fn attach(&mut self, port: Port<T>) -> Option<Port<T>> {
        self.port.replace(port)
    }

    pub fn detach(&mut self) -> Option<Port<T>> { self.port.take() }

    pub fn is_attached(&self) -> bool { self.port.is_some() }

    pub fn output(&self, item: Item<T>) -> Result<(), PipelineError> {
        self.port.as_ref()
            .ok_or(PipelineError::MissingPort)?
            .send(item)
    }

    /// Shorthand for `output(Item::Data(data))`
    pub fn send(&self, data: T) -> Result<(), PipelineError> { self.output(Item::Data(data)) }
}
