use crossbeam_channel::{bounded, unbounded, Receiver, Sender, TryRecvError};

use super::{Item, PipelineError, Port};

/// Multi-producer multi-consumer FIFO of [`Item`]s.
///
/// Clones share the same underlying channel.
#[derive(Debug)]
pub struct Queue<T> {
    tx: Sender<Item<T>>,
    rx: Receiver<Item<T>>,
}

// Derived Clone would require `T: Clone`
impl<T> Clone for Queue<T> {
    fn clone(&self) -> Self { Self { tx: self.tx.clone(), rx: self.rx.clone() } }
}

impl<T> Queue<T> {

    /// Pushes never block
    pub fn unbounded() -> Self {
        let (tx, rx) = unbounded();
        Self { tx, rx }
    }

    /// Pushes block while `capacity` items are waiting
    pub fn bounded(capacity: usize) -> Self {
        let (tx, rx) = bounded(capacity);
        Self { tx, rx }
    }

    pub fn push(&self, item: Item<T>) -> Result<(), PipelineError> {
        self.tx.send(item).map_err(|_| PipelineError::Disconnected)
    }

    /// Blocks until an item is available
    pub fn pop(&self) -> Result<Item<T>, PipelineError> {
        self.rx.recv().map_err(|_| PipelineError::Disconnected)
    }

    pub fn try_pop(&self) -> Option<Item<T>> {
        match self.rx.try_recv() {
            Ok(item) => Some(item),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    pub fn len(&self) -> usize { self.rx.len() }
    pub fn is_empty(&self) -> bool { self.rx.is_empty() }

    /// A handle for pushing into this queue, which does not keep it alive
    pub fn port(&self) -> Port<T> { Port::new(self.tx.clone()) }
}


#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn fifo() -> Result<(), PipelineError> {
        let q = Queue::unbounded();
        for i in 0..5 { q.push(Item::Data(i))?; }
        q.push(Item::End)?;
        assert_eq!(q.len(), 6);
        let popped = std::iter::from_fn(|| q.try_pop()).collect::<Vec<_>>();
        assert_eq!(popped, vec![Item::Data(0), Item::Data(1), Item::Data(2), Item::Data(3), Item::Data(4), Item::End]);
        assert!(q.is_empty());
        Ok(())
    }

    #[test]
    fn clones_share_the_channel() -> Result<(), PipelineError> {
        let a = Queue::bounded(2);
        let b = a.clone();
        a.push(Item::Data("x"))?;
        assert_eq!(b.pop()?, Item::Data("x"));
        assert_eq!(a.try_pop(), None);
        Ok(())
    }

    #[test]
    fn pop_blocks_until_another_thread_pushes() -> Result<(), PipelineError> {
        let q = Queue::bounded(1);
        let producer = {
            let q = q.clone();
            std::thread::spawn(move || -> Result<(), PipelineError> {
                for i in 0..100 { q.push(Item::Data(i))?; }
                q.push(Item::End)
            })
        };
        let mut received = vec![];
        while let Item::Data(n) = q.pop()? { received.push(n) }
        producer.join().map_err(|_| PipelineError::Panicked("producer".into()))??;
        assert_eq!(received, (0..100).collect::<Vec<_>>());
        Ok(())
    }
}
