//! Session and per-exporter state.
//!
//! A session owns the probe configuration, the internal template
//! registry and one state block per observation domain: the bounded
//! template/plan store, the inner-template table for structured lists,
//! and the traffic counters. Template stores are bounded because some
//! exporters cycle through template ids indefinitely; eviction of a
//! live template only costs a re-classification when it is announced
//! again.

use crate::IngestError;
use crate::classify::{self, DecodePlan, OptionsKind};
use crate::decoders::stml::InnerMap;
use crate::decoders::{Decoded, IgnoreReason, generic, nf9, stml, yaf};
use crate::elements::{self, ElementKey};
use crate::events::{EventCallback, EventSink, EventTotals, TemplateEvent};
use crate::extract::{RawFlow, read_unsigned, read_varlen};
use crate::probe::{LogFlags, ProbeConfig};
use crate::record::FlowRecord;
use crate::registry::TemplateRegistry;
use crate::template::Template;

use log::{debug, info};
use lru::LruCache;
use serde::Serialize;

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

/// Outcome of decoding one data record.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordOutcome {
    /// One or two flow records; forward always precedes reverse.
    Flows {
        forward: FlowRecord,
        reverse: Option<FlowRecord>,
    },
    /// Decoder-level drop with its reason.
    Ignored(IgnoreReason),
    /// An options record that was absorbed into counters or logs.
    Options(OptionsKind),
    /// A record for an ignore-class or list-only template.
    Drained,
    /// No plan stored for the referenced template id.
    UnknownTemplate,
}

/// Per-exporter traffic counters.
#[derive(Debug, Default)]
struct SourceStats {
    forward_flows: u64,
    reverse_flows: u64,
    ignored_flows: u64,
    yaf_records: u64,
    yaf_packets: u64,
    yaf_dropped_packets: u64,
    yaf_ignored_packets: u64,
    yaf_not_sent_flows: u64,
    yaf_flush_events: u64,
    yaf_peak_flows: u64,
    prev_stats: Option<YafStats>,
}

/// A point-in-time copy of one exporter's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SourceStatsSnapshot {
    pub forward_flows: u64,
    pub reverse_flows: u64,
    pub ignored_flows: u64,
    pub yaf_records: u64,
    pub yaf_packets: u64,
    pub yaf_dropped_packets: u64,
    pub yaf_ignored_packets: u64,
    pub yaf_not_sent_flows: u64,
    pub yaf_flush_events: u64,
    pub yaf_peak_flows: u64,
}

/// Template store utilization for one exporter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TemplateStoreStats {
    pub size: usize,
    pub capacity: usize,
    pub collisions: u64,
    pub evictions: u64,
}

/// One yaf-stats record's counter values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct YafStats {
    records: u64,
    packets: u64,
    dropped_packets: u64,
    ignored_packets: u64,
    not_sent_flows: u64,
    flush_events: u64,
    peak_flows: u64,
}

impl YafStats {
    fn from_values(values: &HashMap<ElementKey, u64>) -> Self {
        let get = |k: ElementKey| values.get(&k).copied().unwrap_or(0);
        Self {
            records: get(elements::EXPORTED_FLOW_RECORD_TOTAL_COUNT),
            packets: get(elements::PACKET_TOTAL_COUNT),
            dropped_packets: get(elements::DROPPED_PACKET_TOTAL_COUNT),
            ignored_packets: get(elements::IGNORED_PACKET_TOTAL_COUNT),
            not_sent_flows: get(elements::NOT_SENT_FLOW_TOTAL_COUNT),
            flush_events: get(elements::FLOW_TABLE_FLUSH_EVENT_COUNT),
            peak_flows: get(elements::FLOW_TABLE_PEAK_COUNT),
        }
    }

    /// Totals are cumulative per exporter process; a value below the
    /// previous snapshot means the exporter restarted and the current
    /// value already is the delta.
    fn delta_from(&self, prev: &YafStats) -> YafStats {
        fn d(cur: u64, prev: u64) -> u64 {
            cur.checked_sub(prev).unwrap_or(cur)
        }
        YafStats {
            records: d(self.records, prev.records),
            packets: d(self.packets, prev.packets),
            dropped_packets: d(self.dropped_packets, prev.dropped_packets),
            ignored_packets: d(self.ignored_packets, prev.ignored_packets),
            not_sent_flows: d(self.not_sent_flows, prev.not_sent_flows),
            flush_events: d(self.flush_events, prev.flush_events),
            peak_flows: self.peak_flows,
        }
    }
}

struct StoredTemplate {
    plan: DecodePlan,
    template: Arc<Template>,
}

struct TemplateStore {
    store: LruCache<u16, StoredTemplate>,
    inner: InnerMap,
    collisions: u64,
    evictions: u64,
}

struct ExporterState {
    templates: Mutex<TemplateStore>,
    stats: Mutex<SourceStats>,
}

/// One collection session: probe configuration, internal templates,
/// the event sink, and per-observation-domain exporter state.
pub struct Session {
    probe: ProbeConfig,
    registry: TemplateRegistry,
    events: EventSink,
    cache_size: NonZeroUsize,
    exporters: Mutex<HashMap<u32, Arc<ExporterState>>>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("probe", &self.probe.name)
            .field("cache_size", &self.cache_size)
            .field("registered_layouts", &self.registry.len())
            .finish()
    }
}

impl Session {
    pub(crate) fn new(
        probe: ProbeConfig,
        cache_size: NonZeroUsize,
        callbacks: Vec<EventCallback>,
    ) -> Result<Self, IngestError> {
        Ok(Self {
            probe,
            registry: TemplateRegistry::standard()?,
            events: EventSink::new(callbacks),
            cache_size,
            exporters: Mutex::new(HashMap::new()),
        })
    }

    /// Creates a builder; see [`crate::SessionBuilder`].
    pub fn builder() -> crate::SessionBuilder {
        crate::SessionBuilder::default()
    }

    pub fn probe(&self) -> &ProbeConfig {
        &self.probe
    }

    pub fn registry(&self) -> &TemplateRegistry {
        &self.registry
    }

    fn exporter(&self, domain: u32) -> Arc<ExporterState> {
        let mut map = self.exporters.lock().unwrap();
        map.entry(domain)
            .or_insert_with(|| {
                Arc::new(ExporterState {
                    templates: Mutex::new(TemplateStore {
                        store: LruCache::new(self.cache_size),
                        inner: InnerMap::new(),
                        collisions: 0,
                        evictions: 0,
                    }),
                    stats: Mutex::new(SourceStats::default()),
                })
            })
            .clone()
    }

    /// Classifies a newly announced template and installs its plan.
    /// Re-announcement with an identical definition is a refresh;
    /// a different definition replaces the plan and counts as a
    /// collision.
    pub fn observe_template(&self, domain: u32, template: Template) -> DecodePlan {
        let exporter = self.exporter(domain);
        let mut store = exporter.templates.lock().unwrap();

        let previous = store
            .store
            .peek(&template.id)
            .map(|entry| (entry.plan, entry.template.as_ref() == &template));
        if let Some((plan, identical)) = previous {
            if identical {
                return plan;
            }
            store.collisions += 1;
            self.events.notify(&TemplateEvent::Collision {
                domain,
                template_id: template.id,
            });
        }

        let plan = classify::classify(&template, &self.registry);
        if self.probe.log_flags.contains(LogFlags::TEMPLATES) {
            info!(
                "{}: domain {} template {:#06x} ({} elements) -> {}",
                self.probe.name,
                domain,
                template.id,
                template.fields.len(),
                plan.path_name(),
            );
        }

        if let DecodePlan::Inner(kind) = plan {
            store.inner.insert(template.id, (kind, template.clone()));
            self.events.notify(&TemplateEvent::InnerMapped {
                domain,
                template_id: template.id,
                kind,
            });
        }

        let template_id = template.id;
        let evicted = store.store.push(
            template_id,
            StoredTemplate {
                plan,
                template: Arc::new(template),
            },
        );
        if let Some((old_id, old)) = evicted {
            if old_id != template_id {
                store.evictions += 1;
                if let DecodePlan::Inner(_) = old.plan {
                    store.inner.remove(&old_id);
                }
                self.events.notify(&TemplateEvent::Evicted {
                    domain,
                    template_id: old_id,
                });
            }
        }

        self.events.notify(&TemplateEvent::Classified {
            domain,
            template_id,
            path: plan.path_name(),
        });
        plan
    }

    /// Decodes one data record against its installed plan.
    pub fn decode_record(
        &self,
        domain: u32,
        template_id: u16,
        payload: &[u8],
        export_ms: u64,
    ) -> Result<RecordOutcome, IngestError> {
        let exporter = self.exporter(domain);
        let mut store = exporter.templates.lock().unwrap();

        let Some(entry) = store.store.get(&template_id) else {
            self.events.notify(&TemplateEvent::MissingTemplate {
                domain,
                template_id,
            });
            debug!(
                "{}: domain {} data for unknown template {:#06x}",
                self.probe.name, domain, template_id
            );
            return Ok(RecordOutcome::UnknownTemplate);
        };
        let plan = entry.plan;
        let template = entry.template.clone();

        let outcome = match plan {
            DecodePlan::Fixrec { bits } => {
                let (raw, _) = RawFlow::extract(&template, payload)?;
                self.flow_outcome(
                    &exporter,
                    generic::decode(bits, &raw, &self.probe, export_ms, &store.inner),
                )
            }
            DecodePlan::Yafrec { tid, bits } => {
                let (raw, _) = RawFlow::extract(&template, payload)?;
                self.flow_outcome(
                    &exporter,
                    yaf::decode(tid, bits, &raw, &self.probe, export_ms, &store.inner),
                )
            }
            DecodePlan::Nf9rec { tid, bits } => {
                let (raw, _) = RawFlow::extract(&template, payload)?;
                self.flow_outcome(
                    &exporter,
                    nf9::decode(tid, bits, &raw, &self.probe, export_ms),
                )
            }
            DecodePlan::Options(kind) => {
                self.options_outcome(&exporter, &store.inner, &template, payload, kind)?
            }
            DecodePlan::Inner(_) | DecodePlan::Ignore => RecordOutcome::Drained,
        };
        Ok(outcome)
    }

    fn flow_outcome(&self, exporter: &ExporterState, decoded: Decoded) -> RecordOutcome {
        let mut stats = exporter.stats.lock().unwrap();
        match decoded {
            Decoded::Emitted { forward, reverse } => {
                stats.forward_flows += 1;
                if reverse.is_some() {
                    stats.reverse_flows += 1;
                }
                RecordOutcome::Flows { forward, reverse }
            }
            Decoded::Ignored(reason) => {
                stats.ignored_flows += 1;
                debug!("{}: record ignored: {}", self.probe.name, reason);
                RecordOutcome::Ignored(reason)
            }
        }
    }

    fn options_outcome(
        &self,
        exporter: &ExporterState,
        inner: &InnerMap,
        template: &Template,
        payload: &[u8],
        kind: OptionsKind,
    ) -> Result<RecordOutcome, IngestError> {
        let (values, list) = walk_options(template, payload)?;
        match kind {
            OptionsKind::YafStats => {
                let current = YafStats::from_values(&values);
                let mut stats = exporter.stats.lock().unwrap();
                let delta = match stats.prev_stats {
                    Some(prev) => current.delta_from(&prev),
                    None => current,
                };
                stats.prev_stats = Some(current);
                stats.yaf_records += delta.records;
                stats.yaf_packets += delta.packets;
                stats.yaf_dropped_packets += delta.dropped_packets;
                stats.yaf_ignored_packets += delta.ignored_packets;
                stats.yaf_not_sent_flows += delta.not_sent_flows;
                stats.yaf_flush_events += delta.flush_events;
                stats.yaf_peak_flows = stats.yaf_peak_flows.max(delta.peak_flows);
                info!(
                    "{}: yaf stats: {} records, {} packets, {} dropped, {} ignored",
                    self.probe.name,
                    delta.records,
                    delta.packets,
                    delta.dropped_packets,
                    delta.ignored_packets,
                );
            }
            OptionsKind::Tombstone => {
                let id = values
                    .get(&elements::TOMBSTONE_ID)
                    .copied()
                    .unwrap_or(0);
                let observed = values
                    .get(&elements::OBSERVATION_TIME_SECONDS)
                    .copied()
                    .unwrap_or(0);
                let accesses = list
                    .as_deref()
                    .map(|body| stml::scan_sub_list(body, inner).accesses)
                    .unwrap_or_default();
                info!(
                    "{}: tombstone {} observed at {} ({} access entries)",
                    self.probe.name,
                    id,
                    observed,
                    accesses.len(),
                );
                for access in accesses {
                    debug!(
                        "{}: tombstone {} seen by tool {} at {}",
                        self.probe.name, id, access.tool_id, access.observed_secs
                    );
                }
            }
            OptionsKind::Nf9Sampling => {
                if self.probe.log_flags.contains(LogFlags::SAMPLING) {
                    let interval = values
                        .get(&elements::SAMPLING_INTERVAL)
                        .or_else(|| values.get(&elements::SAMPLER_RANDOM_INTERVAL))
                        .copied()
                        .unwrap_or(0);
                    let mode = values
                        .get(&elements::SAMPLING_ALGORITHM)
                        .or_else(|| values.get(&elements::SAMPLER_MODE))
                        .copied()
                        .unwrap_or(0);
                    info!(
                        "{}: sampling options: mode {} interval {}",
                        self.probe.name, mode, interval
                    );
                }
            }
        }
        Ok(RecordOutcome::Options(kind))
    }

    /// Copies one exporter's counters.
    pub fn stats(&self, domain: u32) -> SourceStatsSnapshot {
        let exporter = self.exporter(domain);
        let stats = exporter.stats.lock().unwrap();
        SourceStatsSnapshot {
            forward_flows: stats.forward_flows,
            reverse_flows: stats.reverse_flows,
            ignored_flows: stats.ignored_flows,
            yaf_records: stats.yaf_records,
            yaf_packets: stats.yaf_packets,
            yaf_dropped_packets: stats.yaf_dropped_packets,
            yaf_ignored_packets: stats.yaf_ignored_packets,
            yaf_not_sent_flows: stats.yaf_not_sent_flows,
            yaf_flush_events: stats.yaf_flush_events,
            yaf_peak_flows: stats.yaf_peak_flows,
        }
    }

    /// Session-wide template event totals.
    pub fn event_totals(&self) -> EventTotals {
        self.events.totals()
    }

    /// Template store utilization for one exporter.
    pub fn template_store_stats(&self, domain: u32) -> TemplateStoreStats {
        let exporter = self.exporter(domain);
        let store = exporter.templates.lock().unwrap();
        TemplateStoreStats {
            size: store.store.len(),
            capacity: self.cache_size.get(),
            collisions: store.collisions,
            evictions: store.evictions,
        }
    }
}

/// Walks an options record: scalar values into a map, the last
/// structured-list body captured verbatim.
fn walk_options<'a>(
    template: &Template,
    payload: &'a [u8],
) -> Result<(HashMap<ElementKey, u64>, Option<Vec<u8>>), IngestError> {
    let mut values = HashMap::new();
    let mut list = None;
    let mut rest = payload;
    for field in &template.fields {
        let malformed = |available: usize| IngestError::Malformed {
            template_id: template.id,
            needed: field.length as usize,
            available,
        };
        if field.is_varlen() {
            let (next, body) = read_varlen(rest).map_err(|_| malformed(rest.len()))?;
            list = Some(body.to_vec());
            rest = next;
        } else if field.length <= 8 {
            let (next, v) =
                read_unsigned(rest, field.length).map_err(|_| malformed(rest.len()))?;
            values.insert(field.key, v);
            rest = next;
        } else {
            let skip = field.length as usize;
            if rest.len() < skip {
                return Err(malformed(rest.len()));
            }
            rest = &rest[skip..];
        }
    }
    Ok((values, list))
}
