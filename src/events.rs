//! Template lifecycle events.
//!
//! Classification outcomes, template-id collisions, store evictions
//! and data-before-template references are all worth watching on a
//! misbehaving exporter. The session routes each occurrence through an
//! [`EventSink`]: session-wide totals are always kept, and embedders
//! can register callbacks to forward individual events into their own
//! logging or metrics.

use crate::classify::InnerKind;

use serde::Serialize;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Template lifecycle events.
#[derive(Debug, Clone)]
pub enum TemplateEvent {
    /// A new template was classified and installed.
    Classified {
        domain: u32,
        template_id: u16,
        /// Decoder path name, e.g. "yaf" or "generic".
        path: &'static str,
    },

    /// A template id was re-announced with a different definition and
    /// the stored plan was replaced.
    Collision { domain: u32, template_id: u16 },

    /// The bounded template store evicted its least recently used
    /// entry to make room.
    Evicted { domain: u32, template_id: u16 },

    /// A data record referenced a template id with no stored plan.
    MissingTemplate { domain: u32, template_id: u16 },

    /// A template was recognized as a structured-list sub-record shape
    /// and mapped for the list decoder.
    InnerMapped {
        domain: u32,
        template_id: u16,
        kind: InnerKind,
    },
}

impl TemplateEvent {
    /// Short name for logs and tallies.
    pub fn name(&self) -> &'static str {
        match self {
            TemplateEvent::Classified { .. } => "classified",
            TemplateEvent::Collision { .. } => "collision",
            TemplateEvent::Evicted { .. } => "evicted",
            TemplateEvent::MissingTemplate { .. } => "missing-template",
            TemplateEvent::InnerMapped { .. } => "inner-mapped",
        }
    }
}

/// Callback receiving every event the session emits.
pub type EventCallback = Arc<dyn Fn(&TemplateEvent) + Send + Sync>;

/// Session-wide event totals, across all observation domains.
///
/// A rising `collisions` count usually means two exporters share an
/// observation domain; rising `evictions` means the template store
/// capacity is too small for the exporter's template churn.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EventTotals {
    pub classified: u64,
    pub collisions: u64,
    pub evictions: u64,
    pub missing_templates: u64,
    pub inner_mapped: u64,
}

/// Routes template events: bumps the matching total, then hands the
/// event to each registered callback. Totals use relaxed atomics so
/// `notify` stays lock-free on the template path.
pub struct EventSink {
    classified: AtomicU64,
    collisions: AtomicU64,
    evictions: AtomicU64,
    missing_templates: AtomicU64,
    inner_mapped: AtomicU64,
    callbacks: Vec<EventCallback>,
}

impl EventSink {
    pub(crate) fn new(callbacks: Vec<EventCallback>) -> Self {
        Self {
            classified: AtomicU64::new(0),
            collisions: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            missing_templates: AtomicU64::new(0),
            inner_mapped: AtomicU64::new(0),
            callbacks,
        }
    }

    pub fn notify(&self, event: &TemplateEvent) {
        let total = match event {
            TemplateEvent::Classified { .. } => &self.classified,
            TemplateEvent::Collision { .. } => &self.collisions,
            TemplateEvent::Evicted { .. } => &self.evictions,
            TemplateEvent::MissingTemplate { .. } => &self.missing_templates,
            TemplateEvent::InnerMapped { .. } => &self.inner_mapped,
        };
        total.fetch_add(1, Ordering::Relaxed);
        for callback in &self.callbacks {
            callback(event);
        }
    }

    pub fn totals(&self) -> EventTotals {
        EventTotals {
            classified: self.classified.load(Ordering::Relaxed),
            collisions: self.collisions.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            missing_templates: self.missing_templates.load(Ordering::Relaxed),
            inner_mapped: self.inner_mapped.load(Ordering::Relaxed),
        }
    }
}

impl std::fmt::Debug for EventSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventSink")
            .field("totals", &self.totals())
            .field("callbacks", &self.callbacks.len())
            .finish()
    }
}
