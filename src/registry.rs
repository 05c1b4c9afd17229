//! Internal template registry.
//!
//! The engine pre-registers the fixed set of internal record layouts at
//! session init: one generic superset, the YAF fast-path variants, the
//! NetFlow V9 fast-path variants, and the options/ignore layouts. Each
//! id encodes its decoder path in the low three bits and variant flags
//! above, so an id alone is enough to drive dispatch and policy.

use crate::IngestError;
use crate::elements::{self, ElementKey};

use serde::Serialize;

use std::collections::BTreeMap;

/// Identifier of one internal record layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct InternalId(pub u16);

impl InternalId {
    const BASE: u16 = 0xE000;
    const OPTIONS_BASE: u16 = 0xE800;

    pub const PATH_MASK: u16 = 0x0007;
    pub const PATH_FIXREC: u16 = 0x0001;
    pub const PATH_NF9: u16 = 0x0002;
    pub const PATH_YAF: u16 = 0x0004;

    // YAF variant flags.
    pub const YAF_BI: u16 = 0x0008;
    pub const YAF_V4: u16 = 0x0010;
    pub const YAF_V6: u16 = 0x0020;
    pub const YAF_TOTAL: u16 = 0x0040;
    pub const YAF_STML: u16 = 0x0080;

    // NF9 variant flags.
    pub const NF9_MILLI: u16 = 0x0008;
    pub const NF9_V6: u16 = 0x0010;
    pub const NF9_TOTAL: u16 = 0x0040;
    pub const NF9_INITIATOR: u16 = 0x0080;

    pub const GENERIC: InternalId = InternalId(Self::BASE | Self::PATH_FIXREC);
    pub const YAF_STATS: InternalId = InternalId(Self::OPTIONS_BASE | 0x10);
    pub const TOMBSTONE: InternalId = InternalId(Self::OPTIONS_BASE | 0x20);
    pub const TOMBSTONE_ACCESS: InternalId = InternalId(Self::OPTIONS_BASE | 0x28);
    pub const NF9_SAMPLING: InternalId = InternalId(Self::OPTIONS_BASE | 0x30);
    pub const IGNORE: InternalId = InternalId(Self::OPTIONS_BASE | 0x38);

    pub const fn yaf(flags: u16) -> InternalId {
        InternalId(Self::BASE | Self::PATH_YAF | flags)
    }

    pub const fn nf9(flags: u16) -> InternalId {
        InternalId(Self::BASE | Self::PATH_NF9 | flags)
    }

    pub fn path(self) -> u16 {
        self.0 & Self::PATH_MASK
    }

    pub fn has(self, flag: u16) -> bool {
        self.0 & flag == flag
    }
}

/// One registered internal layout: the id and the element list the
/// layout captures. The generic layout's list is the extraction
/// superset; the fast-path lists double as the shapes the classifier
/// matches exporter templates against.
#[derive(Debug, Clone, Serialize)]
pub struct InternalTemplate {
    pub id: InternalId,
    pub name: &'static str,
    pub elements: Vec<ElementKey>,
}

/// Registry of internal layouts, built once at session init and
/// read-only afterwards.
#[derive(Debug, Default)]
pub struct TemplateRegistry {
    by_id: BTreeMap<InternalId, InternalTemplate>,
}

impl TemplateRegistry {
    /// Builds the standard registry. Fails only on an id collision,
    /// which would mean two variants encode to the same id and must be
    /// treated as fatal at init.
    pub fn standard() -> Result<Self, IngestError> {
        let mut reg = Self::default();

        reg.register(InternalTemplate {
            id: InternalId::GENERIC,
            name: "generic-superset",
            elements: generic_superset(),
        })?;

        for tmpl in yaf_variants() {
            reg.register(tmpl)?;
        }
        for tmpl in nf9_variants() {
            reg.register(tmpl)?;
        }

        reg.register(InternalTemplate {
            id: InternalId::YAF_STATS,
            name: "yaf-stats",
            elements: vec![
                elements::EXPORTED_FLOW_RECORD_TOTAL_COUNT,
                elements::PACKET_TOTAL_COUNT,
                elements::DROPPED_PACKET_TOTAL_COUNT,
                elements::IGNORED_PACKET_TOTAL_COUNT,
                elements::NOT_SENT_FLOW_TOTAL_COUNT,
                elements::EXPIRED_FRAGMENT_COUNT,
                elements::ASSEMBLED_FRAGMENT_COUNT,
                elements::FLOW_TABLE_FLUSH_EVENT_COUNT,
                elements::FLOW_TABLE_PEAK_COUNT,
                elements::EXPORTER_IPV4_ADDRESS,
                elements::EXPORTING_PROCESS_ID,
            ],
        })?;
        reg.register(InternalTemplate {
            id: InternalId::TOMBSTONE,
            name: "tombstone",
            elements: vec![
                elements::CERT_TOOL_ID,
                elements::EXPORTING_PROCESS_ID,
                elements::TOMBSTONE_ID,
                elements::OBSERVATION_TIME_SECONDS,
                elements::TOMBSTONE_ACCESS_LIST,
            ],
        })?;
        reg.register(InternalTemplate {
            id: InternalId::TOMBSTONE_ACCESS,
            name: "tombstone-access",
            elements: vec![
                elements::CERT_TOOL_ID,
                elements::OBSERVATION_TIME_SECONDS,
            ],
        })?;
        reg.register(InternalTemplate {
            id: InternalId::NF9_SAMPLING,
            name: "nf9-sampling",
            elements: vec![
                elements::SAMPLING_INTERVAL,
                elements::SAMPLING_ALGORITHM,
                elements::SAMPLER_ID,
                elements::SAMPLER_MODE,
                elements::SAMPLER_RANDOM_INTERVAL,
            ],
        })?;
        reg.register(InternalTemplate {
            id: InternalId::IGNORE,
            name: "ignore",
            elements: vec![elements::PADDING_OCTETS],
        })?;

        Ok(reg)
    }

    /// Registers a layout. Re-registering an identical layout is a
    /// no-op; the same id with a different element list is an error.
    pub fn register(&mut self, tmpl: InternalTemplate) -> Result<(), IngestError> {
        if let Some(existing) = self.by_id.get(&tmpl.id) {
            if existing.elements == tmpl.elements {
                return Ok(());
            }
            return Err(IngestError::Registry {
                id: tmpl.id.0,
                name: tmpl.name,
            });
        }
        self.by_id.insert(tmpl.id, tmpl);
        Ok(())
    }

    pub fn get(&self, id: InternalId) -> Option<&InternalTemplate> {
        self.by_id.get(&id)
    }

    pub fn contains(&self, id: InternalId) -> bool {
        self.by_id.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &InternalTemplate> {
        self.by_id.values()
    }
}

/// The generic decoder's superset layout.
fn generic_superset() -> Vec<ElementKey> {
    vec![
        elements::SOURCE_IPV4_ADDRESS,
        elements::DESTINATION_IPV4_ADDRESS,
        elements::IP_NEXT_HOP_IPV4,
        elements::SOURCE_IPV6_ADDRESS,
        elements::DESTINATION_IPV6_ADDRESS,
        elements::IP_NEXT_HOP_IPV6,
        elements::SOURCE_TRANSPORT_PORT,
        elements::DESTINATION_TRANSPORT_PORT,
        elements::PROTOCOL_IDENTIFIER,
        elements::TCP_CONTROL_BITS,
        elements::INITIAL_TCP_FLAGS,
        elements::UNION_TCP_FLAGS,
        elements::REVERSE_INITIAL_TCP_FLAGS,
        elements::REVERSE_UNION_TCP_FLAGS,
        elements::REVERSE_TCP_CONTROL_BITS,
        elements::OCTET_DELTA_COUNT,
        elements::PACKET_DELTA_COUNT,
        elements::OCTET_TOTAL_COUNT,
        elements::PACKET_TOTAL_COUNT,
        elements::INITIATOR_OCTETS,
        elements::INITIATOR_PACKETS,
        elements::RESPONDER_OCTETS,
        elements::RESPONDER_PACKETS,
        elements::POST_OCTET_DELTA_COUNT,
        elements::POST_PACKET_DELTA_COUNT,
        elements::POST_OCTET_TOTAL_COUNT,
        elements::POST_PACKET_TOTAL_COUNT,
        elements::REVERSE_OCTET_DELTA_COUNT,
        elements::REVERSE_PACKET_DELTA_COUNT,
        elements::REVERSE_OCTET_TOTAL_COUNT,
        elements::REVERSE_PACKET_TOTAL_COUNT,
        elements::FLOW_START_MILLISECONDS,
        elements::FLOW_END_MILLISECONDS,
        elements::FLOW_START_SECONDS,
        elements::FLOW_END_SECONDS,
        elements::FLOW_START_MICROSECONDS,
        elements::FLOW_END_MICROSECONDS,
        elements::FLOW_START_NANOSECONDS,
        elements::FLOW_END_NANOSECONDS,
        elements::FLOW_START_DELTA_MICROSECONDS,
        elements::FLOW_END_DELTA_MICROSECONDS,
        elements::FLOW_DURATION_MILLISECONDS,
        elements::FLOW_DURATION_MICROSECONDS,
        elements::FLOW_START_SYSUP_TIME,
        elements::FLOW_END_SYSUP_TIME,
        elements::SYSTEM_INIT_TIME_MILLISECONDS,
        elements::OBSERVATION_TIME_SECONDS,
        elements::OBSERVATION_TIME_MILLISECONDS,
        elements::OBSERVATION_TIME_MICROSECONDS,
        elements::OBSERVATION_TIME_NANOSECONDS,
        elements::COLLECTION_TIME_MILLISECONDS,
        elements::ICMP_TYPE_CODE_IPV4,
        elements::ICMP_TYPE_CODE_IPV6,
        elements::ICMP_TYPE_IPV4,
        elements::ICMP_CODE_IPV4,
        elements::ICMP_TYPE_IPV6,
        elements::ICMP_CODE_IPV6,
        elements::INGRESS_INTERFACE,
        elements::EGRESS_INTERFACE,
        elements::VLAN_ID,
        elements::POST_VLAN_ID,
        elements::REVERSE_VLAN_ID,
        elements::REVERSE_POST_VLAN_ID,
        elements::FLOW_END_REASON,
        elements::FLOW_ATTRIBUTES,
        elements::SILK_TCP_STATE,
        elements::SILK_APP_LABEL,
        elements::REVERSE_FLOW_DELTA_MILLISECONDS,
        elements::FIREWALL_EVENT,
        elements::NF_F_FW_EVENT,
        elements::NF_F_FW_EXT_EVENT,
        elements::SUB_TEMPLATE_MULTI_LIST,
    ]
}

/// Common YAF flow elements shared by every variant.
fn yaf_base(v4: bool, v6: bool) -> Vec<ElementKey> {
    let mut e = Vec::new();
    if v4 {
        e.push(elements::SOURCE_IPV4_ADDRESS);
        e.push(elements::DESTINATION_IPV4_ADDRESS);
    }
    if v6 {
        e.push(elements::SOURCE_IPV6_ADDRESS);
        e.push(elements::DESTINATION_IPV6_ADDRESS);
    }
    e.extend([
        elements::SOURCE_TRANSPORT_PORT,
        elements::DESTINATION_TRANSPORT_PORT,
        elements::PROTOCOL_IDENTIFIER,
        elements::FLOW_START_MILLISECONDS,
        elements::FLOW_END_MILLISECONDS,
        elements::FLOW_END_REASON,
        elements::SILK_APP_LABEL,
        elements::VLAN_ID,
    ]);
    e
}

/// Enumerates the seventeen YAF variants: every uni/bi x family x
/// delta/total combination flat, plus the biflow shapes YAF emits with
/// the TCP-flags sub-template list instead of flat flag elements.
fn yaf_variants() -> Vec<InternalTemplate> {
    let families: [(u16, bool, bool, &str); 3] = [
        (InternalId::YAF_V4, true, false, "ip4"),
        (InternalId::YAF_V6, false, true, "ip6"),
        (InternalId::YAF_V4 | InternalId::YAF_V6, true, true, "both"),
    ];
    let mut out = Vec::new();

    for (fam_flag, v4, v6, _fam) in families {
        for total in [false, true] {
            let vol_flag = if total { InternalId::YAF_TOTAL } else { 0 };
            for bi in [false, true] {
                let bi_flag = if bi { InternalId::YAF_BI } else { 0 };
                let mut e = yaf_base(v4, v6);
                if total {
                    e.push(elements::OCTET_TOTAL_COUNT);
                    e.push(elements::PACKET_TOTAL_COUNT);
                } else {
                    e.push(elements::OCTET_DELTA_COUNT);
                    e.push(elements::PACKET_DELTA_COUNT);
                }
                e.push(elements::INITIAL_TCP_FLAGS);
                e.push(elements::UNION_TCP_FLAGS);
                if bi {
                    if total {
                        e.push(elements::REVERSE_OCTET_TOTAL_COUNT);
                        e.push(elements::REVERSE_PACKET_TOTAL_COUNT);
                    } else {
                        e.push(elements::REVERSE_OCTET_DELTA_COUNT);
                        e.push(elements::REVERSE_PACKET_DELTA_COUNT);
                    }
                    e.push(elements::REVERSE_INITIAL_TCP_FLAGS);
                    e.push(elements::REVERSE_UNION_TCP_FLAGS);
                    e.push(elements::REVERSE_FLOW_DELTA_MILLISECONDS);
                    e.push(elements::REVERSE_VLAN_ID);
                }
                out.push(InternalTemplate {
                    id: InternalId::yaf(fam_flag | vol_flag | bi_flag),
                    name: "yaf-flow",
                    elements: e,
                });
            }
        }
    }

    // STML biflows: flag elements travel in a sub-template multi-list.
    let stml_shapes: [(u16, bool, bool, bool); 5] = [
        (InternalId::YAF_V4, true, false, false),
        (InternalId::YAF_V6, false, true, false),
        (InternalId::YAF_V4 | InternalId::YAF_V6, true, true, false),
        (InternalId::YAF_V4, true, false, true),
        (InternalId::YAF_V6, false, true, true),
    ];
    for (fam_flag, v4, v6, total) in stml_shapes {
        let vol_flag = if total { InternalId::YAF_TOTAL } else { 0 };
        let mut e = yaf_base(v4, v6);
        if total {
            e.push(elements::OCTET_TOTAL_COUNT);
            e.push(elements::PACKET_TOTAL_COUNT);
            e.push(elements::REVERSE_OCTET_TOTAL_COUNT);
            e.push(elements::REVERSE_PACKET_TOTAL_COUNT);
        } else {
            e.push(elements::OCTET_DELTA_COUNT);
            e.push(elements::PACKET_DELTA_COUNT);
            e.push(elements::REVERSE_OCTET_DELTA_COUNT);
            e.push(elements::REVERSE_PACKET_DELTA_COUNT);
        }
        e.push(elements::REVERSE_FLOW_DELTA_MILLISECONDS);
        e.push(elements::SUB_TEMPLATE_MULTI_LIST);
        out.push(InternalTemplate {
            id: InternalId::yaf(
                fam_flag | vol_flag | InternalId::YAF_BI | InternalId::YAF_STML,
            ),
            name: "yaf-flow-stml",
            elements: e,
        });
    }

    out
}

/// Enumerates the twelve NF9 variants: family x time style x volume
/// style.
fn nf9_variants() -> Vec<InternalTemplate> {
    let mut out = Vec::new();
    for v6 in [false, true] {
        let fam_flag = if v6 { InternalId::NF9_V6 } else { 0 };
        for milli in [false, true] {
            let time_flag = if milli { InternalId::NF9_MILLI } else { 0 };
            for (vol_flag, name) in [
                (0u16, "nf9-delta"),
                (InternalId::NF9_TOTAL, "nf9-total"),
                (InternalId::NF9_INITIATOR, "nf9-initiator"),
            ] {
                let mut e = Vec::new();
                if v6 {
                    e.push(elements::SOURCE_IPV6_ADDRESS);
                    e.push(elements::DESTINATION_IPV6_ADDRESS);
                    e.push(elements::IP_NEXT_HOP_IPV6);
                } else {
                    e.push(elements::SOURCE_IPV4_ADDRESS);
                    e.push(elements::DESTINATION_IPV4_ADDRESS);
                    e.push(elements::IP_NEXT_HOP_IPV4);
                }
                e.extend([
                    elements::SOURCE_TRANSPORT_PORT,
                    elements::DESTINATION_TRANSPORT_PORT,
                    elements::PROTOCOL_IDENTIFIER,
                    elements::TCP_CONTROL_BITS,
                    elements::INGRESS_INTERFACE,
                    elements::EGRESS_INTERFACE,
                ]);
                if milli {
                    e.push(elements::FLOW_START_MILLISECONDS);
                    e.push(elements::OBSERVATION_TIME_MILLISECONDS);
                } else {
                    e.push(elements::FLOW_START_SYSUP_TIME);
                    e.push(elements::FLOW_END_SYSUP_TIME);
                    e.push(elements::SYSTEM_INIT_TIME_MILLISECONDS);
                }
                match vol_flag {
                    0 => {
                        e.push(elements::OCTET_DELTA_COUNT);
                        e.push(elements::PACKET_DELTA_COUNT);
                        e.push(elements::POST_OCTET_DELTA_COUNT);
                        e.push(elements::POST_PACKET_DELTA_COUNT);
                    }
                    InternalId::NF9_TOTAL => {
                        e.push(elements::OCTET_TOTAL_COUNT);
                        e.push(elements::PACKET_TOTAL_COUNT);
                        e.push(elements::POST_OCTET_TOTAL_COUNT);
                        e.push(elements::POST_PACKET_TOTAL_COUNT);
                    }
                    _ => {
                        e.push(elements::INITIATOR_OCTETS);
                        e.push(elements::INITIATOR_PACKETS);
                        e.push(elements::RESPONDER_OCTETS);
                        e.push(elements::RESPONDER_PACKETS);
                    }
                }
                out.push(InternalTemplate {
                    id: InternalId::nf9(fam_flag | time_flag | vol_flag),
                    name,
                    elements: e,
                });
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_registry_counts() {
        let reg = TemplateRegistry::standard().unwrap();
        let yaf = reg
            .iter()
            .filter(|t| t.id.path() == InternalId::PATH_YAF)
            .count();
        let nf9 = reg
            .iter()
            .filter(|t| t.id.path() == InternalId::PATH_NF9)
            .count();
        assert_eq!(yaf, 17);
        assert_eq!(nf9, 12);
        // generic + 17 + 12 + 5 options/ignore layouts
        assert_eq!(reg.len(), 35);
    }

    #[test]
    fn registration_is_idempotent() {
        let mut reg = TemplateRegistry::standard().unwrap();
        let before = reg.len();
        reg.register(InternalTemplate {
            id: InternalId::IGNORE,
            name: "ignore",
            elements: vec![crate::elements::PADDING_OCTETS],
        })
        .unwrap();
        assert_eq!(reg.len(), before);
    }

    #[test]
    fn conflicting_registration_fails() {
        let mut reg = TemplateRegistry::standard().unwrap();
        let err = reg.register(InternalTemplate {
            id: InternalId::IGNORE,
            name: "ignore",
            elements: vec![crate::elements::VLAN_ID],
        });
        assert!(err.is_err());
    }

    #[test]
    fn id_encodes_path_and_flags() {
        let id = InternalId::yaf(
            InternalId::YAF_BI | InternalId::YAF_V4 | InternalId::YAF_STML,
        );
        assert_eq!(id.path(), InternalId::PATH_YAF);
        assert!(id.has(InternalId::YAF_BI));
        assert!(id.has(InternalId::YAF_STML));
        assert!(!id.has(InternalId::YAF_TOTAL));
    }

    #[test]
    fn variant_ids_are_distinct() {
        let reg = TemplateRegistry::standard().unwrap();
        // BTreeMap keys are unique by construction; make sure every
        // generated variant actually landed.
        assert!(reg.contains(InternalId::yaf(InternalId::YAF_V4)));
        assert!(reg.contains(InternalId::nf9(
            InternalId::NF9_V6 | InternalId::NF9_MILLI | InternalId::NF9_INITIATOR
        )));
    }
}
