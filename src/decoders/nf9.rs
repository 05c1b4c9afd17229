//! NetFlow V9 fast path.
//!
//! Covers the common router shapes: one address family, sysUpTime or
//! millisecond timestamps, and one of three volume styles. Firewall
//! handling mirrors the generic path but can fall back to the post
//! counters when the forward ones are empty.

use crate::bitmap::TemplateBits;
use crate::extract::RawFlow;
use crate::probe::{LogFlags, ProbeConfig, Quirks};
use crate::record::{FlowRecord, PROTO_ICMP, PROTO_ICMP6, sat32};
use crate::registry::InternalId;
use crate::time::derive_time;

use super::{
    Decoded, IgnoreReason, assign_addresses, assign_end_reason_state, assign_interfaces,
    assign_ports, assign_tcp_flags, choose_ipv6, is_intermediate,
    FW_EVENT_DELETED, FW_EVENT_DENIED, FW_EXT_DENIED_RANGE,
};

use log::debug;

pub fn decode(
    tid: InternalId,
    bits: TemplateBits,
    raw: &RawFlow,
    probe: &ProbeConfig,
    export_ms: u64,
) -> Decoded {
    if is_intermediate(raw) {
        return Decoded::Ignored(IgnoreReason::IntermediateUniflow);
    }

    let mut raw = raw.clone();
    let total = tid.has(InternalId::NF9_TOTAL);
    let mut initiator = tid.has(InternalId::NF9_INITIATOR);

    // The quirk reinterprets the post counters as responder traffic,
    // flipping the variant into initiator style.
    if probe.quirks.contains(Quirks::NF9_OUT_IS_REVERSE)
        && !initiator
        && bits.intersects(
            TemplateBits::POST_OCTET_DELTA
                | TemplateBits::POST_PACKET_DELTA
                | TemplateBits::POST_OCTET_TOTAL
                | TemplateBits::POST_PACKET_TOTAL,
        )
    {
        if total {
            raw.resp_octets = raw.post_octets_total;
            raw.resp_pkts = raw.post_pkts_total;
            raw.post_octets_total = 0;
            raw.post_pkts_total = 0;
        } else {
            raw.resp_octets = raw.post_octets_delta;
            raw.resp_pkts = raw.post_pkts_delta;
            raw.post_octets_delta = 0;
            raw.post_pkts_delta = 0;
        }
        initiator = true;
    }

    let (mut fwd_pkts, mut fwd_bytes) = if tid.has(InternalId::NF9_INITIATOR) {
        (raw.init_pkts, raw.init_octets)
    } else if total {
        (raw.pkts_total, raw.octets_total)
    } else {
        (raw.pkts_delta, raw.octets_delta)
    };
    let (mut rev_pkts, mut rev_bytes) = if initiator {
        (raw.resp_pkts, raw.resp_octets)
    } else {
        (0, 0)
    };

    let mut memo = 0u16;
    let fw_bits = TemplateBits::FW_EVENT
        | TemplateBits::FW_EVENT_CISCO
        | TemplateBits::FW_EXT_EVENT;
    if probe.quirks.contains(Quirks::FW_EVENT) && bits.intersects(fw_bits) {
        // The post counters can stand in for an empty forward side,
        // but only when they still mean forward traffic.
        if fwd_bytes == 0 && fwd_pkts == 0 && !initiator {
            let (alt_pkts, alt_bytes) = if total {
                (raw.post_pkts_total, raw.post_octets_total)
            } else {
                (raw.post_pkts_delta, raw.post_octets_delta)
            };
            if alt_pkts != 0 || alt_bytes != 0 {
                fwd_pkts = alt_pkts;
                fwd_bytes = alt_bytes;
            }
        }
        match raw.fw_event {
            FW_EVENT_DELETED => {
                if fwd_bytes == 0 {
                    if fwd_pkts == 0 {
                        fwd_pkts = 1;
                        fwd_bytes = 1;
                    } else {
                        fwd_bytes = fwd_pkts;
                    }
                }
                if rev_bytes == 0 && rev_pkts > 0 {
                    rev_bytes = rev_pkts;
                }
            }
            FW_EVENT_DENIED => {
                memo = if FW_EXT_DENIED_RANGE.contains(&raw.fw_ext_event) {
                    raw.fw_ext_event
                } else {
                    u16::from(raw.fw_event)
                };
                if fwd_pkts > 0 {
                    if fwd_bytes == 0 {
                        fwd_bytes = fwd_pkts;
                    }
                } else {
                    fwd_pkts = 1;
                    fwd_bytes = 1;
                }
            }
            event => {
                if probe.log_flags.contains(LogFlags::FIREWALL) {
                    debug!("{}: dropping firewall event {}", probe.name, event);
                }
                return Decoded::Ignored(IgnoreReason::FirewallEvent(event));
            }
        }
    }

    if fwd_bytes == 0 && rev_bytes == 0 {
        return Decoded::Ignored(IgnoreReason::ZeroVolume);
    }
    if probe.quirks.contains(Quirks::ZERO_PACKETS) {
        if fwd_pkts == 0 && fwd_bytes > 0 {
            fwd_pkts = 1;
        }
        if rev_pkts == 0 && rev_bytes > 0 {
            rev_pkts = 1;
        }
    } else if fwd_pkts == 0 && rev_pkts == 0 {
        return Decoded::Ignored(IgnoreReason::ZeroPackets);
    }

    let swapped = fwd_bytes == 0 || fwd_pkts == 0;
    if swapped {
        if rev_pkts == 0 || rev_bytes == 0 {
            return Decoded::Ignored(IgnoreReason::ZeroVolume);
        }
        fwd_pkts = rev_pkts;
        fwd_bytes = rev_bytes;
        rev_pkts = 0;
        rev_bytes = 0;
    }

    let mut rec = FlowRecord {
        proto: raw.proto,
        packets: sat32(fwd_pkts),
        bytes: sat32(fwd_bytes),
        memo,
        ..Default::default()
    };

    let v6 = choose_ipv6(bits, &raw);
    assign_addresses(&mut rec, &raw, v6);
    assign_ports(&mut rec, &raw, bits, v6);
    assign_interfaces(&mut rec, &raw, probe);
    assign_tcp_flags(&mut rec, &raw);
    assign_end_reason_state(&mut rec, &raw);

    let time = derive_time(bits, &raw, export_ms, probe.quirks, fwd_pkts == 1);
    if probe.log_flags.contains(LogFlags::TIMESTAMPS) {
        debug!("{}: timestamps from {}", probe.name, time.provenance);
    }
    rec.start_ms = time.start_ms;
    rec.duration_ms = time.duration_ms;

    if swapped {
        rec.reverse_endpoints();
        return Decoded::Emitted {
            forward: rec,
            reverse: None,
        };
    }

    // The reverse record reuses the forward timing and interfaces; V9
    // has no reverse timing elements to improve on them.
    let reverse = (rev_bytes > 0).then(|| {
        let mut rev = rec.clone();
        std::mem::swap(&mut rev.src_addr, &mut rev.dst_addr);
        if rev.proto != PROTO_ICMP && rev.proto != PROTO_ICMP6 {
            std::mem::swap(&mut rev.src_port, &mut rev.dst_port);
        }
        rev.packets = sat32(rev_pkts.max(1));
        rev.bytes = sat32(rev_bytes);
        rev
    });

    Decoded::Emitted {
        forward: rec,
        reverse,
    }
}
