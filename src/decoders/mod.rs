//! Record decoders.
//!
//! Three policy paths share one extraction layer: the generic path
//! handles any template the classifier could not match to a precomputed
//! shape, the YAF and NF9 paths handle the known shapes without running
//! the volume gauntlet. All three emit the same normalized records.

pub mod generic;
pub mod nf9;
pub mod stml;
pub mod yaf;

use crate::bitmap::TemplateBits;
use crate::extract::RawFlow;
use crate::probe::{InterfaceKind, ProbeConfig};
use crate::record::{FlowRecord, PROTO_ICMP, PROTO_ICMP6, PROTO_TCP, sat16, tcp_state};

use serde::Serialize;

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// flowEndReason is a 5-bit code plus a continuation bit.
pub const END_REASON_MASK: u8 = 0x1F;
/// All code bits set marks an intermediate uniflow export.
pub const END_REASON_INTERMEDIATE: u8 = 0x1F;
/// Active-timeout code.
pub const END_REASON_ACTIVE: u8 = 0x02;
/// Continuation-of-a-previous-flow bit.
pub const END_REASON_CONTINUATION: u8 = 0x80;

/// flowAttributes bit for all-packets-same-size.
pub const ATTR_UNIFORM_PACKET_SIZE: u16 = 0x01;

/// Firewall event codes (Cisco ASA).
pub const FW_EVENT_CREATED: u8 = 1;
pub const FW_EVENT_DELETED: u8 = 2;
pub const FW_EVENT_DENIED: u8 = 3;
/// Extended event codes that refine a DENIED event.
pub const FW_EXT_DENIED_RANGE: std::ops::RangeInclusive<u16> = 1001..=1004;

/// Why a record produced no output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum IgnoreReason {
    IntermediateUniflow,
    NoAddresses,
    ZeroVolume,
    ZeroPackets,
    FirewallEvent(u8),
    Ipv6Disabled,
}

impl std::fmt::Display for IgnoreReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IgnoreReason::IntermediateUniflow => f.write_str("intermediate uniflow"),
            IgnoreReason::NoAddresses => f.write_str("no address elements"),
            IgnoreReason::ZeroVolume => f.write_str("zero bytes in both directions"),
            IgnoreReason::ZeroPackets => f.write_str("zero packets in both directions"),
            IgnoreReason::FirewallEvent(ev) => write!(f, "firewall event {}", ev),
            IgnoreReason::Ipv6Disabled => f.write_str("ipv6 support disabled"),
        }
    }
}

/// Decoder output: a forward record, possibly a companion reverse
/// record, or the reason the input was dropped. The forward record is
/// always delivered before the reverse one.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    Emitted {
        forward: FlowRecord,
        reverse: Option<FlowRecord>,
    },
    Ignored(IgnoreReason),
}

impl Decoded {
    pub fn record_count(&self) -> usize {
        match self {
            Decoded::Emitted { reverse, .. } => 1 + usize::from(reverse.is_some()),
            Decoded::Ignored(_) => 0,
        }
    }
}

/// Gauntlet result, in exporter-reported (pre-saturation) widths.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Volumes {
    pub fwd_pkts: u64,
    pub fwd_bytes: u64,
    pub rev_pkts: u64,
    pub rev_bytes: u64,
}

/// Picks the first populated counter from the ordered candidates each
/// direction offers.
pub(crate) fn volume_gauntlet(raw: &RawFlow) -> Volumes {
    fn first(candidates: [u64; 5]) -> u64 {
        candidates.into_iter().find(|v| *v != 0).unwrap_or(0)
    }
    Volumes {
        fwd_pkts: first([
            raw.pkts_delta,
            raw.pkts_total,
            raw.init_pkts,
            raw.post_pkts_delta,
            raw.post_pkts_total,
        ]),
        fwd_bytes: first([
            raw.octets_delta,
            raw.octets_total,
            raw.init_octets,
            raw.post_octets_delta,
            raw.post_octets_total,
        ]),
        rev_pkts: first([raw.rev_pkts_delta, raw.rev_pkts_total, raw.resp_pkts, 0, 0]),
        rev_bytes: first([
            raw.rev_octets_delta,
            raw.rev_octets_total,
            raw.resp_octets,
            0,
            0,
        ]),
    }
}

pub(crate) fn is_intermediate(raw: &RawFlow) -> bool {
    raw.end_reason & END_REASON_MASK == END_REASON_INTERMEDIATE
}

pub(crate) fn is_icmp(proto: u8) -> bool {
    proto == PROTO_ICMP || proto == PROTO_ICMP6
}

/// IPv6 wins when the template carries it and either has no IPv4
/// alternative or actually populated a v6 address.
pub(crate) fn choose_ipv6(bits: TemplateBits, raw: &RawFlow) -> bool {
    bits.contains(TemplateBits::IP_V6)
        && (!bits.contains(TemplateBits::IP_V4) || raw.src6 != 0 || raw.dst6 != 0)
}

pub(crate) fn assign_addresses(rec: &mut FlowRecord, raw: &RawFlow, v6: bool) {
    if v6 {
        rec.src_addr = IpAddr::V6(Ipv6Addr::from(raw.src6));
        rec.dst_addr = IpAddr::V6(Ipv6Addr::from(raw.dst6));
        rec.next_hop = IpAddr::V6(Ipv6Addr::from(raw.nh6));
    } else {
        rec.src_addr = IpAddr::V4(Ipv4Addr::from(raw.src4));
        rec.dst_addr = IpAddr::V4(Ipv4Addr::from(raw.dst4));
        rec.next_hop = IpAddr::V4(Ipv4Addr::from(raw.nh4));
    }
}

/// Port assignment with ICMP type/code packing. The combined type/code
/// element matching the chosen address family wins over the split
/// type and code elements; transport ports are used verbatim when the
/// template has no ICMP elements at all.
pub(crate) fn assign_ports(rec: &mut FlowRecord, raw: &RawFlow, bits: TemplateBits, v6: bool) {
    if is_icmp(raw.proto) && bits.contains(TemplateBits::ICMP_TYPECODE) {
        rec.src_port = 0;
        rec.dst_port = if v6 {
            raw.icmp_typecode6
        } else {
            raw.icmp_typecode4
        };
    } else if is_icmp(raw.proto) && bits.contains(TemplateBits::ICMP_TYPE_CODE_SPLIT) {
        rec.src_port = 0;
        rec.dst_port = if v6 {
            (u16::from(raw.icmp_type6) << 8) | u16::from(raw.icmp_code6)
        } else {
            (u16::from(raw.icmp_type4) << 8) | u16::from(raw.icmp_code4)
        };
    } else {
        rec.src_port = raw.src_port;
        rec.dst_port = raw.dst_port;
    }
}

pub(crate) fn assign_interfaces(rec: &mut FlowRecord, raw: &RawFlow, probe: &ProbeConfig) {
    match probe.interface_kind {
        InterfaceKind::Snmp => {
            rec.input = sat16(raw.ingress);
            rec.output = sat16(raw.egress);
        }
        InterfaceKind::Vlan => {
            rec.input = raw.vlan;
            rec.output = raw.post_vlan;
        }
    }
}

/// Interface assignment for a synthesized reverse record. SNMP
/// interfaces swap; VLAN interfaces prefer the reverse elements when
/// the template carries them.
pub(crate) fn assign_reverse_interfaces(
    rec: &mut FlowRecord,
    raw: &RawFlow,
    bits: TemplateBits,
    probe: &ProbeConfig,
) {
    match probe.interface_kind {
        InterfaceKind::Snmp => {
            rec.input = sat16(raw.egress);
            rec.output = sat16(raw.ingress);
        }
        InterfaceKind::Vlan => {
            if bits.contains(TemplateBits::REVERSE_VLAN) {
                rec.input = raw.rev_vlan;
                rec.output = raw.rev_post_vlan;
            } else {
                rec.input = raw.post_vlan;
                rec.output = raw.vlan;
            }
        }
    }
}

/// Forward TCP-flag reconstruction from the flat elements.
pub(crate) fn assign_tcp_flags(rec: &mut FlowRecord, raw: &RawFlow) {
    if raw.proto == PROTO_TCP && (raw.initial_flags != 0 || raw.union_flags != 0) {
        rec.flags_initial = raw.initial_flags;
        rec.flags_session = raw.union_flags;
        rec.flags_all = raw.initial_flags | raw.union_flags;
        rec.tcp_state |= tcp_state::EXPANDED;
    } else {
        rec.flags_all = raw.tcp_flags;
    }
}

/// Flag override from a TCP-flags sub-template list value.
pub(crate) fn apply_stml_flags(rec: &mut FlowRecord, flags: &stml::StmlFlags) {
    if rec.proto != PROTO_TCP {
        return;
    }
    rec.flags_initial = flags.initial;
    rec.flags_session = flags.union_flags;
    rec.flags_all = flags.initial | flags.union_flags;
    rec.tcp_state |= tcp_state::EXPANDED;
}

/// Derives state bits from flowEndReason and flowAttributes.
pub(crate) fn assign_end_reason_state(rec: &mut FlowRecord, raw: &RawFlow) {
    if raw.end_reason & END_REASON_MASK == END_REASON_ACTIVE {
        rec.tcp_state |= tcp_state::TIMEOUT_KILLED;
    }
    if raw.end_reason & END_REASON_CONTINUATION != 0 {
        rec.tcp_state |= tcp_state::TIMEOUT_STARTED;
    }
    if raw.flow_attributes & ATTR_UNIFORM_PACKET_SIZE != 0 {
        rec.tcp_state |= tcp_state::UNIFORM_PACKET_SIZE;
    }
}

/// Builds the companion reverse record from a finished forward record.
pub(crate) fn synthesize_reverse(
    forward: &FlowRecord,
    raw: &RawFlow,
    bits: TemplateBits,
    probe: &ProbeConfig,
    rev_pkts: u64,
    rev_bytes: u64,
    stml_flags: Option<&stml::StmlFlags>,
) -> FlowRecord {
    let mut rev = forward.clone();
    rev.reverse_endpoints();
    assign_reverse_interfaces(&mut rev, raw, bits, probe);

    rev.packets = crate::record::sat32(rev_pkts.max(1));
    rev.bytes = crate::record::sat32(rev_bytes);

    rev.start_ms = forward.start_ms + u64::from(raw.rev_delta_milli);
    rev.duration_ms = forward.duration_ms.saturating_sub(raw.rev_delta_milli);

    // Reverse flags when the exporter provided them; otherwise the
    // forward flags carry over with their state unchanged.
    if forward.proto == PROTO_TCP {
        let rev_stml = stml_flags.filter(|f| f.has_reverse);
        if let Some(f) = rev_stml {
            rev.flags_initial = f.rev_initial;
            rev.flags_session = f.rev_union_flags;
            rev.flags_all = f.rev_initial | f.rev_union_flags;
            rev.tcp_state |= tcp_state::EXPANDED;
        } else if raw.rev_initial_flags != 0 || raw.rev_union_flags != 0 {
            rev.flags_initial = raw.rev_initial_flags;
            rev.flags_session = raw.rev_union_flags;
            rev.flags_all = raw.rev_initial_flags | raw.rev_union_flags;
            rev.tcp_state |= tcp_state::EXPANDED;
        } else if raw.rev_tcp_flags != 0 {
            rev.flags_all = raw.rev_tcp_flags;
            rev.flags_initial = 0;
            rev.flags_session = 0;
            rev.tcp_state &= !tcp_state::EXPANDED;
        }
    }

    rev
}
