//! Record sink.
//!
//! Decoded records leave the reader through a [`RecordSink`]. The
//! bundled [`BoundedQueue`] implementation is a writer-blocking
//! bounded channel with a stop signal: once stopped, every pending and
//! future write returns [`WriteOutcome::Stopped`] so the reader can
//! abandon partial work and exit promptly.

use crate::record::FlowRecord;

use crossbeam_channel::{Receiver, Sender, TryRecvError, bounded, select};

/// Result of offering a record to the sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Written,
    /// The sink is shutting down; the record was dropped.
    Stopped,
}

/// Destination for decoded records. `write` may block until a slot is
/// free and must return [`WriteOutcome::Stopped`] promptly once the
/// consumer is gone or shutdown has started.
pub trait RecordSink {
    fn write(&self, record: FlowRecord) -> WriteOutcome;
}

/// Writer half of the bounded queue.
#[derive(Clone)]
pub struct QueueWriter {
    tx: Sender<FlowRecord>,
    stop_rx: Receiver<()>,
}

/// Consumer half of the bounded queue.
pub struct QueueReader {
    rx: Receiver<FlowRecord>,
}

/// Shutdown handle. Dropping it (or calling [`StopHandle::stop`])
/// releases every writer blocked on a full queue.
pub struct StopHandle {
    stop_tx: Option<Sender<()>>,
}

impl StopHandle {
    pub fn stop(&mut self) {
        self.stop_tx.take();
    }
}

/// Creates a bounded record queue.
pub fn bounded_queue(capacity: usize) -> (QueueWriter, QueueReader, StopHandle) {
    let (tx, rx) = bounded(capacity);
    let (stop_tx, stop_rx) = bounded::<()>(0);
    (
        QueueWriter { tx, stop_rx },
        QueueReader { rx },
        StopHandle {
            stop_tx: Some(stop_tx),
        },
    )
}

impl RecordSink for QueueWriter {
    fn write(&self, record: FlowRecord) -> WriteOutcome {
        // A disconnected stop channel means shutdown already started;
        // never enqueue past that point, even if a slot is free.
        if let Err(TryRecvError::Disconnected) = self.stop_rx.try_recv() {
            return WriteOutcome::Stopped;
        }
        select! {
            send(self.tx, record) -> result => match result {
                Ok(()) => WriteOutcome::Written,
                Err(_) => WriteOutcome::Stopped,
            },
            recv(self.stop_rx) -> _ => WriteOutcome::Stopped,
        }
    }
}

impl QueueReader {
    /// Blocks for the next record; `None` once every writer is gone.
    pub fn recv(&self) -> Option<FlowRecord> {
        self.rx.recv().ok()
    }

    pub fn try_recv(&self) -> Option<FlowRecord> {
        self.rx.try_recv().ok()
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    fn record(port: u16) -> FlowRecord {
        FlowRecord {
            dst_port: port,
            ..Default::default()
        }
    }

    #[test]
    fn writes_preserve_order() {
        let (writer, reader, _stop) = bounded_queue(4);
        assert_eq!(writer.write(record(1)), WriteOutcome::Written);
        assert_eq!(writer.write(record(2)), WriteOutcome::Written);
        assert_eq!(reader.recv().unwrap().dst_port, 1);
        assert_eq!(reader.recv().unwrap().dst_port, 2);
    }

    #[test]
    fn stop_releases_blocked_writer() {
        let (writer, _reader, mut stop) = bounded_queue(1);
        assert_eq!(writer.write(record(1)), WriteOutcome::Written);

        let handle = thread::spawn(move || writer.write(record(2)));
        thread::sleep(Duration::from_millis(50));
        stop.stop();
        assert_eq!(handle.join().unwrap(), WriteOutcome::Stopped);
    }

    #[test]
    fn dropped_reader_stops_writes() {
        let (writer, reader, _stop) = bounded_queue(1);
        drop(reader);
        assert_eq!(writer.write(record(1)), WriteOutcome::Stopped);
    }

    #[test]
    fn writes_after_stop_return_stopped() {
        let (writer, reader, mut stop) = bounded_queue(4);
        stop.stop();
        assert_eq!(writer.write(record(1)), WriteOutcome::Stopped);
        drop(reader);
    }
}
