//! Generic decoder.
//!
//! Handles every template the classifier could not match to a
//! precomputed YAF or NF9 shape. Volume and time selection both run
//! their full gauntlets here, and this is the only path that promotes
//! firewall events into flow records.

use crate::bitmap::TemplateBits;
use crate::extract::RawFlow;
use crate::probe::{LogFlags, ProbeConfig, Quirks};
use crate::record::{FlowRecord, PROTO_TCP, sat32};
use crate::time::derive_time;

use super::stml::{InnerMap, StmlFlags};
use super::{
    Decoded, IgnoreReason, Volumes, apply_stml_flags, assign_addresses,
    assign_end_reason_state, assign_interfaces, assign_ports, assign_tcp_flags,
    choose_ipv6, is_intermediate, synthesize_reverse, volume_gauntlet,
    FW_EVENT_DELETED, FW_EVENT_DENIED, FW_EXT_DENIED_RANGE,
};

use log::debug;

/// Whether the firewall pre-pass kept the record, and with what memo.
enum FwDisposition {
    NotFirewall,
    Keep { memo: u16 },
    Drop(u8),
}

pub fn decode(
    bits: TemplateBits,
    raw: &RawFlow,
    probe: &ProbeConfig,
    export_ms: u64,
    inner: &InnerMap,
) -> Decoded {
    if is_intermediate(raw) {
        return Decoded::Ignored(IgnoreReason::IntermediateUniflow);
    }
    if !bits.intersects(TemplateBits::IP_V4 | TemplateBits::IP_V6)
        && !probe.quirks.contains(Quirks::MISSING_IPS)
    {
        return Decoded::Ignored(IgnoreReason::NoAddresses);
    }

    // Policy below mutates volumes; the extracted record itself stays
    // pristine for the caller.
    let mut raw = raw.clone();

    if probe.quirks.contains(Quirks::NF9_OUT_IS_REVERSE)
        && bits.intersects(TemplateBits::POST_OCTET_DELTA | TemplateBits::POST_PACKET_DELTA)
    {
        raw.rev_octets_delta = raw.post_octets_delta;
        raw.rev_pkts_delta = raw.post_pkts_delta;
        raw.post_octets_delta = 0;
        raw.post_pkts_delta = 0;
    }

    let mut vol = volume_gauntlet(&raw);

    let mut memo = 0u16;
    match firewall_disposition(bits, &raw, probe, &mut vol) {
        FwDisposition::NotFirewall => {}
        FwDisposition::Keep { memo: m } => memo = m,
        FwDisposition::Drop(event) => {
            return Decoded::Ignored(IgnoreReason::FirewallEvent(event));
        }
    }

    if vol.fwd_bytes == 0 && vol.rev_bytes == 0 {
        return Decoded::Ignored(IgnoreReason::ZeroVolume);
    }
    if probe.quirks.contains(Quirks::ZERO_PACKETS) {
        if vol.fwd_pkts == 0 && vol.fwd_bytes > 0 {
            vol.fwd_pkts = 1;
        }
        if vol.rev_pkts == 0 && vol.rev_bytes > 0 {
            vol.rev_pkts = 1;
        }
    } else if vol.fwd_pkts == 0 && vol.rev_pkts == 0 {
        return Decoded::Ignored(IgnoreReason::ZeroPackets);
    }

    // Orientation: a record with traffic only in the reverse direction
    // becomes a single swapped uniflow.
    let forward_ok = vol.fwd_pkts > 0 && vol.fwd_bytes > 0;
    let swapped = !forward_ok;
    if swapped && (vol.rev_pkts == 0 || vol.rev_bytes == 0) {
        return Decoded::Ignored(IgnoreReason::ZeroVolume);
    }
    let (pkts, bytes) = if swapped {
        (vol.rev_pkts, vol.rev_bytes)
    } else {
        (vol.fwd_pkts, vol.fwd_bytes)
    };

    let stml_flags = raw
        .stml_raw
        .as_deref()
        .filter(|_| bits.contains(TemplateBits::STML))
        .map(|body| super::stml::scan_multi_list(body, inner))
        .and_then(|scan| scan.flags);

    let mut rec = FlowRecord {
        proto: raw.proto,
        packets: sat32(pkts),
        bytes: sat32(bytes),
        application: raw.app_label,
        tcp_state: raw.silk_tcp_state,
        memo,
        ..Default::default()
    };

    let v6 = choose_ipv6(bits, &raw);
    assign_addresses(&mut rec, &raw, v6);
    assign_ports(&mut rec, &raw, bits, v6);
    assign_interfaces(&mut rec, &raw, probe);
    if swapped {
        assign_swapped_flags(&mut rec, &raw, stml_flags.as_ref());
    } else {
        assign_tcp_flags(&mut rec, &raw);
        if let Some(f) = stml_flags.as_ref() {
            apply_stml_flags(&mut rec, f);
        }
    }
    assign_end_reason_state(&mut rec, &raw);

    let time = derive_time(bits, &raw, export_ms, probe.quirks, pkts == 1);
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

    let reverse = (vol.rev_bytes > 0).then(|| {
        synthesize_reverse(
            &rec,
            &raw,
            bits,
            probe,
            vol.rev_pkts,
            vol.rev_bytes,
            stml_flags.as_ref(),
        )
    });

    Decoded::Emitted {
        forward: rec,
        reverse,
    }
}

/// A reverse-only uniflow reports the flags of the direction it
/// describes when the exporter provided reverse flag elements.
fn assign_swapped_flags(rec: &mut FlowRecord, raw: &RawFlow, stml: Option<&StmlFlags>) {
    use crate::record::tcp_state;

    if rec.proto != PROTO_TCP {
        rec.flags_all = raw.tcp_flags;
        return;
    }
    let rev_stml = stml.filter(|f| f.has_reverse);
    if let Some(f) = rev_stml {
        rec.flags_initial = f.rev_initial;
        rec.flags_session = f.rev_union_flags;
        rec.flags_all = f.rev_initial | f.rev_union_flags;
        rec.tcp_state |= tcp_state::EXPANDED;
    } else if raw.rev_initial_flags != 0 || raw.rev_union_flags != 0 {
        rec.flags_initial = raw.rev_initial_flags;
        rec.flags_session = raw.rev_union_flags;
        rec.flags_all = raw.rev_initial_flags | raw.rev_union_flags;
        rec.tcp_state |= tcp_state::EXPANDED;
    } else if raw.rev_tcp_flags != 0 {
        rec.flags_all = raw.rev_tcp_flags;
    } else {
        assign_tcp_flags(rec, raw);
    }
}

/// DELETED events become ordinary flows with repaired volumes, DENIED
/// events become one-packet forward flows carrying the extended event
/// code in the memo, and everything else is dropped.
fn firewall_disposition(
    bits: TemplateBits,
    raw: &RawFlow,
    probe: &ProbeConfig,
    vol: &mut Volumes,
) -> FwDisposition {
    let fw_bits = TemplateBits::FW_EVENT
        | TemplateBits::FW_EVENT_CISCO
        | TemplateBits::FW_EXT_EVENT;
    if !probe.quirks.contains(Quirks::FW_EVENT) || !bits.intersects(fw_bits) {
        return FwDisposition::NotFirewall;
    }

    match raw.fw_event {
        FW_EVENT_DELETED => {
            if vol.fwd_bytes == 0 {
                if vol.fwd_pkts == 0 {
                    vol.fwd_pkts = 1;
                    vol.fwd_bytes = 1;
                } else {
                    vol.fwd_bytes = vol.fwd_pkts;
                }
            }
            // Reverse gets the bytes repair only; a direction that saw
            // no traffic must not produce a phantom reverse record.
            if vol.rev_bytes == 0 && vol.rev_pkts > 0 {
                vol.rev_bytes = vol.rev_pkts;
            }
            FwDisposition::Keep { memo: 0 }
        }
        FW_EVENT_DENIED => {
            let memo = if FW_EXT_DENIED_RANGE.contains(&raw.fw_ext_event) {
                raw.fw_ext_event
            } else {
                u16::from(raw.fw_event)
            };
            if vol.fwd_pkts > 0 {
                if vol.fwd_bytes == 0 {
                    vol.fwd_bytes = vol.fwd_pkts;
                }
            } else {
                vol.fwd_pkts = 1;
                vol.fwd_bytes = 1;
            }
            FwDisposition::Keep { memo }
        }
        event => {
            if probe.log_flags.contains(LogFlags::FIREWALL) {
                debug!(
                    "{}: dropping firewall event {} ({}.{} -> {}.{} proto {})",
                    probe.name,
                    event,
                    raw.src4,
                    raw.src_port,
                    raw.dst4,
                    raw.dst_port,
                    raw.proto,
                );
            }
            FwDisposition::Drop(event)
        }
    }
}
