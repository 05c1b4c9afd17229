//! YAF fast path.
//!
//! The classifier already proved the template is one of the known YAF
//! shapes, so the variant flags carried by the internal id dictate
//! volume style, direction handling and flag sourcing; no gauntlet
//! runs. Times are always the millisecond pair.

use crate::bitmap::TemplateBits;
use crate::extract::RawFlow;
use crate::probe::{LogFlags, ProbeConfig};
use crate::record::{FlowRecord, sat32};
use crate::registry::InternalId;
use crate::time::derive_time;

use super::stml::InnerMap;
use super::{
    Decoded, IgnoreReason, apply_stml_flags, assign_addresses, assign_end_reason_state,
    assign_interfaces, assign_ports, assign_tcp_flags, choose_ipv6, is_intermediate,
    synthesize_reverse,
};

pub fn decode(
    tid: InternalId,
    bits: TemplateBits,
    raw: &RawFlow,
    probe: &ProbeConfig,
    export_ms: u64,
    inner: &InnerMap,
) -> Decoded {
    if is_intermediate(raw) {
        return Decoded::Ignored(IgnoreReason::IntermediateUniflow);
    }

    #[cfg(not(feature = "ipv6"))]
    if tid.has(InternalId::YAF_V6) && !tid.has(InternalId::YAF_V4) {
        return Decoded::Ignored(IgnoreReason::Ipv6Disabled);
    }

    let total = tid.has(InternalId::YAF_TOTAL);
    let (mut fwd_pkts, mut fwd_bytes) = if total {
        (raw.pkts_total, raw.octets_total)
    } else {
        (raw.pkts_delta, raw.octets_delta)
    };
    let (mut rev_pkts, mut rev_bytes) = if !tid.has(InternalId::YAF_BI) {
        (0, 0)
    } else if total {
        (raw.rev_pkts_total, raw.rev_octets_total)
    } else {
        (raw.rev_pkts_delta, raw.rev_octets_delta)
    };

    if fwd_bytes == 0 && rev_bytes == 0 {
        return Decoded::Ignored(IgnoreReason::ZeroVolume);
    }

    // Traffic only in the reverse direction: reuse the record as a
    // swapped uniflow and emit no companion.
    let swapped = fwd_bytes == 0;
    if swapped {
        fwd_pkts = rev_pkts;
        fwd_bytes = rev_bytes;
        rev_pkts = 0;
        rev_bytes = 0;
    }
    if fwd_pkts == 0 {
        return Decoded::Ignored(IgnoreReason::ZeroPackets);
    }

    let stml_flags = raw
        .stml_raw
        .as_deref()
        .filter(|_| tid.has(InternalId::YAF_STML))
        .map(|body| super::stml::scan_multi_list(body, inner))
        .and_then(|scan| scan.flags);

    let mut rec = FlowRecord {
        proto: raw.proto,
        packets: sat32(fwd_pkts),
        bytes: sat32(fwd_bytes),
        application: raw.app_label,
        tcp_state: raw.silk_tcp_state,
        ..Default::default()
    };

    let v6 = choose_ipv6(bits, raw);
    assign_addresses(&mut rec, raw, v6);
    assign_ports(&mut rec, raw, bits, v6);
    assign_interfaces(&mut rec, raw, probe);
    assign_tcp_flags(&mut rec, raw);
    if let Some(f) = stml_flags.as_ref() {
        apply_stml_flags(&mut rec, f);
    }
    assign_end_reason_state(&mut rec, raw);

    let time = derive_time(bits, raw, export_ms, probe.quirks, fwd_pkts == 1);
    if probe.log_flags.contains(LogFlags::TIMESTAMPS) {
        log::debug!("{}: timestamps from {}", probe.name, time.provenance);
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

    let reverse = (rev_bytes > 0).then(|| {
        synthesize_reverse(
            &rec,
            raw,
            bits,
            probe,
            rev_pkts,
            rev_bytes,
            stml_flags.as_ref(),
        )
    });

    Decoded::Emitted {
        forward: rec,
        reverse,
    }
}
