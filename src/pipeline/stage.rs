use std::any::Any;
use std::marker::PhantomData;
use std::panic::{self, AssertUnwindSafe};
use std::thread::{self, JoinHandle};

use super::{Item, OutputSide, PipelineError, Port, Queue};

/// The work a [`Stage`] does with each item it receives
pub trait Process: Send + 'static {
    type Input: Send + 'static;
    type Output: Send + 'static;

    /// Handle one input, sending zero or more outputs to `out`
    fn process(&mut self, input: Self::Input, out: &OutputSide<Self::Output>) -> Result<(), PipelineError>;

    /// Called once, when the input stream has ended, before `End` is
    /// forwarded downstream
    fn finish(&mut self, _out: &OutputSide<Self::Output>) -> Result<(), PipelineError> { Ok(()) }
}

/// One output per input, computed by a closure
pub struct Map<F, I, O> {
    f: F,
    types: PhantomData<fn(I) -> O>,
}

impl<F, I, O> Map<F, I, O>
where
    F: FnMut(I) -> Result<O, PipelineError>,
{
    pub fn new(f: F) -> Self { Self { f, types: PhantomData } }
}

impl<F, I, O> Process for Map<F, I, O>
where
    F: FnMut(I) -> Result<O, PipelineError> + Send + 'static,
    I: Send + 'static,
    O: Send + 'static,
{
    type Input = I;
    type Output = O;

    fn process(&mut self, input: I, out: &OutputSide<O>) -> Result<(), PipelineError> {
        out.send((self.f)(input)?)
    }
}

pub struct Stage<P: Process> {
    input: Queue<P::Input>,
    output: OutputSide<P::Output>,
    process: P,
}

impl<P: Process> Stage<P> {

    pub fn new(process: P) -> Self { Self::with_input(process, Queue::unbounded()) }

    /// Stage whose input queue holds at most `capacity` items: upstream
    /// stages block while it is full.
    pub fn with_capacity(process: P, capacity: usize) -> Self {
        Self::with_input(process, Queue::bounded(capacity))
    }

    fn with_input(process: P, input: Queue<P::Input>) -> Self {
        Self { input, output: OutputSide::new(), process }
    }

    pub fn input(&self) -> Port<P::Input> { self.input.port() }

    /// See [`OutputSide::attach`]
    pub fn attach(&mut self, port: Port<P::Output>) -> Option<Port<P::Output>> {
        self.output.attach(port)
    }

    /// Start processing on a new thread called `name`
    pub fn spawn(self, name: impl Into<String>) -> Result<StageHandle, PipelineError> {
        let name = name.into();
        let handle = thread::Builder::new()
            .name(name.clone())
            .spawn(move || self.run())
            .map_err(|source| PipelineError::Spawn { name: name.clone(), source })?;
        Ok(StageHandle { name, handle })
    }

    /// Process items until `End` arrives, then forward `End`.
    ///
    /// After the first error no more items are processed, but the input is
    /// still consumed up to `End`, and `End` is still forwarded, so that
    /// neighbouring stages are not left waiting forever. `End` is also
    /// forwarded if the behaviour panics; the panic then carries on up to
    /// [`StageHandle::join`].
    fn run(self) -> Result<(), PipelineError> {
        let Self { input, output, mut process } = self;

        let processed = panic::catch_unwind(AssertUnwindSafe(|| -> Result<(), PipelineError> {
            let mut outcome = Ok(());
            while let Item::Data(data) = input.pop()? {
                if outcome.is_ok() {
                    outcome = process.process(data, &output);
                    if let Err(e) = &outcome { log::error!("Stage failed: {e}") }
                }
            }
            if outcome.is_ok() { outcome = process.finish(&output) }
            outcome
        }));

        // A stage with nothing attached is the end of the line
        let forwarded = if output.is_attached() { output.output(Item::End) } else { Ok(()) };
        match processed {
            Ok(outcome) => outcome.and(forwarded),
            Err(payload) => panic::resume_unwind(payload),
        }
    }
}

/// A running [`Stage`]
#[derive(Debug)]
pub struct StageHandle {
    name: String,
    handle: JoinHandle<Result<(), PipelineError>>,
}

impl StageHandle {
    pub fn name(&self) -> &str { &self.name }

    /// Wait for the stage to see `End` and finish
    pub fn join(self) -> Result<(), PipelineError> {
        match self.handle.join() {
            Ok(outcome) => outcome,
            Err(payload) => {
                log::error!("Stage `{}` panicked: {}", self.name, panic_message(&*payload));
                Err(PipelineError::Panicked(self.name))
            }
        }
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload.downcast_ref::<&str>().copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("<non-string panic payload>")
}

/// Send every item of `items` to `port`, followed by `End`
pub fn feed<T>(port: &Port<T>, items: impl IntoIterator<Item = T>) -> Result<(), PipelineError> {
    for item in items { port.send(Item::Data(item))?; }
    port.send(Item::End)
}

/// Terminal queue collecting everything a pipeline produces
#[derive(Debug)]
pub struct Sink<T> {
    queue: Queue<T>,
}

impl<T> Default for Sink<T> {
    fn default() -> Self { Self { queue: Queue::unbounded() } }
}

impl<T> Sink<T> {
    pub fn new() -> Self { Self::default() }

    pub fn input(&self) -> Port<T> { self.queue.port() }

    /// Block until `End` arrives, returning all data received before it
    pub fn collect(self) -> Result<Vec<T>, PipelineError> {
        let mut collected = vec![];
        while let Item::Data(data) = self.queue.pop()? { collected.push(data) }
        Ok(collected)
    }
}
