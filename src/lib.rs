#![doc = include_str!("../README.md")]

pub mod bitmap;
pub mod classify;
pub mod decoders;
pub mod elements;
pub mod events;
pub mod extract;
pub mod probe;
pub mod reader;
pub mod record;
pub mod registry;
pub mod session;
pub mod sink;
pub mod template;
mod tests;
pub mod time;
pub mod transport;

use events::EventCallback;

use std::num::NonZeroUsize;
use std::sync::Arc;

pub use bitmap::TemplateBits;
pub use classify::{DecodePlan, InnerKind, OptionsKind};
pub use decoders::{Decoded, IgnoreReason};
pub use events::{EventTotals, TemplateEvent};
pub use probe::{InterfaceKind, LogFlags, ProbeConfig, Quirks};
pub use reader::{FlowReader, ReaderReport};
pub use record::FlowRecord;
pub use registry::{InternalId, TemplateRegistry};
pub use session::{
    RecordOutcome, Session, SourceStatsSnapshot, TemplateStoreStats,
};
pub use sink::{
    QueueReader, QueueWriter, RecordSink, StopHandle, WriteOutcome, bounded_queue,
};
pub use template::{Template, TemplateField, VARLEN};
pub use time::{Provenance, TimeSpan};
pub use transport::{DataRecord, MessageBuf, Transport, TransportError};

/// Errors surfaced by session construction and record decoding.
///
/// Per-record decode failures are recoverable: the reader logs them
/// and moves to the next record without touching the session's
/// template state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestError {
    /// Two internal layouts encode to the same id; fatal at init.
    Registry { id: u16, name: &'static str },

    /// A record's payload ran out before its template was satisfied.
    Malformed {
        template_id: u16,
        needed: usize,
        available: usize,
    },

    /// Template store capacity must be greater than 0.
    InvalidCacheSize(usize),
}

impl std::fmt::Display for IngestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IngestError::Registry { id, name } => {
                write!(f, "internal template id {:#06x} ({}) already registered", id, name)
            }
            IngestError::Malformed {
                template_id,
                needed,
                available,
            } => {
                write!(
                    f,
                    "record for template {:#06x} truncated: needed {} bytes, {} available",
                    template_id, needed, available
                )
            }
            IngestError::InvalidCacheSize(size) => {
                write!(
                    f,
                    "invalid template store capacity: {}. Must be greater than 0.",
                    size
                )
            }
        }
    }
}

impl std::error::Error for IngestError {}

/// Builder for a [`Session`].
///
/// # Examples
///
/// ```rust
/// use flow_ingest::{InterfaceKind, ProbeConfig, Quirks, Session};
///
/// let session = Session::builder()
///     .with_probe(
///         ProbeConfig::new("edge-router")
///             .with_interface_kind(InterfaceKind::Vlan)
///             .with_quirks(Quirks::FW_EVENT),
///     )
///     .with_template_cache_size(2000)
///     .build()
///     .expect("failed to build session");
/// assert_eq!(session.probe().name, "edge-router");
/// ```
#[derive(Clone)]
pub struct SessionBuilder {
    probe: ProbeConfig,
    cache_size: usize,
    callbacks: Vec<EventCallback>,
}

impl std::fmt::Debug for SessionBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionBuilder")
            .field("probe", &self.probe.name)
            .field("cache_size", &self.cache_size)
            .field("callbacks", &self.callbacks.len())
            .finish()
    }
}

impl Default for SessionBuilder {
    fn default() -> Self {
        Self {
            probe: ProbeConfig::default(),
            cache_size: 1000,
            callbacks: Vec::new(),
        }
    }
}

impl SessionBuilder {
    /// Sets the probe configuration the decoders consult.
    #[must_use = "builder methods consume self and return a new builder; the return value must be used"]
    pub fn with_probe(mut self, probe: ProbeConfig) -> Self {
        self.probe = probe;
        self
    }

    /// Sets the per-exporter template store capacity.
    #[must_use = "builder methods consume self and return a new builder; the return value must be used"]
    pub fn with_template_cache_size(mut self, size: usize) -> Self {
        self.cache_size = size;
        self
    }

    /// Registers a callback for template lifecycle events.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use flow_ingest::{Session, TemplateEvent};
    ///
    /// let session = Session::builder()
    ///     .on_template_event(|event| {
    ///         if let TemplateEvent::Collision { template_id, .. } = event {
    ///             eprintln!("template {} redefined", template_id);
    ///         }
    ///     })
    ///     .build()
    ///     .unwrap();
    /// # drop(session);
    /// ```
    #[must_use = "builder methods consume self and return a new builder; the return value must be used"]
    pub fn on_template_event<F>(mut self, callback: F) -> Self
    where
        F: Fn(&TemplateEvent) + Send + Sync + 'static,
    {
        self.callbacks.push(Arc::new(callback));
        self
    }

    /// Builds the configured [`Session`].
    ///
    /// # Errors
    ///
    /// Returns an error when the template store capacity is 0 or when
    /// the internal template registry fails to build.
    pub fn build(self) -> Result<Session, IngestError> {
        let cache_size = NonZeroUsize::new(self.cache_size)
            .ok_or(IngestError::InvalidCacheSize(self.cache_size))?;
        Session::new(self.probe, cache_size, self.callbacks)
    }
}
