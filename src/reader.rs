//! Per-session reader loop.
//!
//! One reader runs per listening endpoint. It pulls framed messages
//! from the transport, installs new templates, dispatches data records
//! to the decoders and pushes the results into the sink, forward
//! record first. Per-record failures never tear down the session: the
//! templates learned so far stay valid and the next record is
//! attempted.

use crate::session::{RecordOutcome, Session};
use crate::sink::{RecordSink, WriteOutcome};
use crate::transport::{Transport, TransportError};

use log::{debug, error, info, trace};
use serde::Serialize;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;

/// Totals for one reader's lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReaderReport {
    pub messages: u64,
    pub templates: u64,
    pub records: u64,
    pub written: u64,
    /// True when the loop ended because of the stop flag or the sink's
    /// stop sentinel rather than a transport failure.
    pub stopped: bool,
}

/// The reader loop, generic over its transport and sink.
pub struct FlowReader<T, S> {
    session: Arc<Session>,
    transport: T,
    sink: S,
    stopped: Arc<AtomicBool>,
}

impl<T: Transport, S: RecordSink> FlowReader<T, S> {
    pub fn new(session: Arc<Session>, transport: T, sink: S) -> Self {
        Self {
            session,
            transport,
            sink,
            stopped: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Shared flag that ends the loop at the next message boundary.
    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        self.stopped.clone()
    }

    /// Runs until the transport fails fatally or the session is
    /// stopped. Returns the lifetime totals.
    pub fn run(mut self) -> Result<ReaderReport, TransportError> {
        let mut report = ReaderReport::default();
        let probe = self.session.probe().name.clone();

        loop {
            if self.stopped.load(Ordering::Acquire) {
                report.stopped = true;
                return Ok(report);
            }

            let message = match self.transport.next_message() {
                Ok(message) => message,
                Err(TransportError::Interrupted) | Err(TransportError::EndOfMessage) => {
                    trace!("{}: transient read interruption", probe);
                    continue;
                }
                Err(TransportError::ConnectionRejected) => {
                    debug!("{}: connection rejected", probe);
                    continue;
                }
                Err(TransportError::ConnectionClosed) => {
                    info!("{}: exporter connection closed", probe);
                    continue;
                }
                Err(TransportError::Protocol(msg)) => {
                    debug!("{}: exporter protocol error: {}", probe, msg);
                    continue;
                }
                Err(TransportError::Structure(msg)) => {
                    info!("{}: invalid message structure: {}", probe, msg);
                    continue;
                }
                Err(err @ TransportError::Fatal(_)) => {
                    error!("{}: {}", probe, err);
                    return Err(err);
                }
            };

            report.messages += 1;
            let domain = message.observation_domain;

            for template in message.templates {
                report.templates += 1;
                self.session.observe_template(domain, template);
            }

            for record in &message.records {
                if self.stopped.load(Ordering::Acquire) {
                    report.stopped = true;
                    return Ok(report);
                }
                report.records += 1;

                let outcome = match self.session.decode_record(
                    domain,
                    record.template_id,
                    &record.payload,
                    message.export_time_ms,
                ) {
                    Ok(outcome) => outcome,
                    Err(err) => {
                        // Malformed record payload; the buffer and its
                        // templates stay usable for the records after
                        // it.
                        debug!("{}: {}", probe, err);
                        continue;
                    }
                };

                let RecordOutcome::Flows { forward, reverse } = outcome else {
                    continue;
                };
                if self.sink.write(forward) == WriteOutcome::Stopped {
                    report.stopped = true;
                    return Ok(report);
                }
                report.written += 1;
                if let Some(reverse) = reverse {
                    if self.sink.write(reverse) == WriteOutcome::Stopped {
                        report.stopped = true;
                        return Ok(report);
                    }
                    report.written += 1;
                }
            }
        }
    }

    /// Runs the loop on a dedicated OS thread.
    pub fn spawn(self) -> JoinHandle<Result<ReaderReport, TransportError>>
    where
        T: Send + 'static,
        S: Send + 'static,
    {
        std::thread::spawn(move || self.run())
    }
}
