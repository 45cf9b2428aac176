//! Hand-off of readings from the collection loop to a single consumer.
//!
//! Backed by an unbounded Tokio channel, used without a runtime: the
//! producer never blocks and the consumer drains with `try_recv`.

use tokio::sync::mpsc::{self, error::TryRecvError};

use super::metrics::Reading;

/// Create a connected sender/receiver pair
pub fn channel() -> (ReadingSender, ReadingReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ReadingSender { tx }, ReadingReceiver { rx })
}

/// Producer side, owned by the collector.
#[derive(Debug, Clone)]
pub struct ReadingSender {
    tx: mpsc::UnboundedSender<Reading>,
}

impl ReadingSender {
    /// Enqueue without waiting. Returns false once the receiver is gone.
    pub fn publish(&self, reading: Reading) -> bool {
        self.tx.send(reading).is_ok()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Consumer side of the dispatch channel.
#[derive(Debug)]
pub struct ReadingReceiver {
    rx: mpsc::UnboundedReceiver<Reading>,
}

impl ReadingReceiver {
    /// Pull one queued reading, if any
    pub fn try_next(&mut self) -> Option<Reading> {
        match self.rx.try_recv() {
            Ok(reading) => Some(reading),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Take everything currently queued, in publication order
    pub fn drain(&mut self) -> Vec<Reading> {
        let mut readings = Vec::new();
        while let Some(reading) = self.try_next() {
            readings.push(reading);
        }
        readings
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}
