//! A one-shot channel carrying a promise's terminal outcome from its worker
//! thread back to the caller of `wait`. It uses a `std::sync::mpsc` channel as
//! its backend; the `Producer` is consumed by `resolve`, so it writes at most
//! once.
//!
use crate::Error;
use std::sync::mpsc::{channel, Receiver, Sender, TryRecvError};

#[derive(Debug)]
pub struct Producer<T> {
    sender: Sender<T>,
}

#[derive(Debug)]
pub struct Consumer<T> {
    receiver: Receiver<T>,
}

impl<T> Producer<T> {
    /// Creates a connected producer and consumer.
    ///
    /// # Examples
    ///
    /// ```
    /// use promise_chain::channel::Producer;
    /// use std::thread;
    /// let (producer, consumer) = Producer::<String>::new();
    /// let task = thread::spawn(move || producer.resolve("Hi".into()));
    /// assert_eq!(consumer.recv().unwrap(), "Hi");
    /// task.join().expect("The task thread has panicked.");
    /// ```
    #[allow(clippy::new_ret_no_self)]
    pub fn new() -> (Self, Consumer<T>) {
        let (tx, rx) = channel();
        (Producer { sender: tx }, Consumer { receiver: rx })
    }

    /// Publishes the value. Returns `false` if the consumer is already gone,
    /// in which case the value is dropped.
    pub fn resolve(self, value: T) -> bool {
        self.sender.send(value).is_ok()
    }
}

impl<T> Consumer<T> {
    /// Blocks until the producer resolves. A producer dropped without
    /// resolving yields `Error::ProducerDropped` instead of blocking forever.
    pub fn recv(&self) -> Result<T, Error> {
        self.receiver.recv().map_err(|_| Error::ProducerDropped)
    }

    pub fn try_recv(&self) -> Result<Option<T>, Error> {
        match self.receiver.try_recv() {
            Ok(value) => Ok(Some(value)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(Error::ProducerDropped),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Producer;
    use crate::Error;
    use std::{thread, time::Duration};

    #[test]
    fn test_channel_resolve() {
        let (op, op_a) = Producer::<String>::new();
        let task1 = thread::spawn(move || op_a.recv());
        let task2 = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            op.resolve(String::from("🍓"))
        });
        assert!(task2.join().expect("The task2 thread has panicked"));
        let value = task1.join().expect("The task1 thread has panicked");
        assert_eq!(value, Ok(String::from("🍓")));
    }

    #[test]
    fn test_channel_unresolved() {
        let (op, op_a) = Producer::<String>::new();
        let task = thread::spawn(move || {
            // Move the producer into this thread but never resolve it.
            std::mem::drop(op);
        });
        task.join().expect("The task thread has panicked");
        assert_eq!(op_a.recv(), Err(Error::ProducerDropped));
    }

    #[test]
    fn test_channel_no_consumer() {
        let (op, op_a) = Producer::<String>::new();
        std::mem::drop(op_a);
        assert!(!op.resolve(String::from("🍓")));
    }

    #[test]
    fn test_channel_is_one_shot() {
        let (op, op_a) = Producer::<i64>::new();
        assert_eq!(op_a.try_recv(), Ok(None));
        op.resolve(1);
        assert_eq!(op_a.try_recv(), Ok(Some(1)));
        // The only producer is spent, so the channel is now closed.
        assert_eq!(op_a.try_recv(), Err(Error::ProducerDropped));
    }
}
