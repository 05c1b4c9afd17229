//! Template classification.
//!
//! Runs once per newly announced template. The walk summarizes the
//! template's salient elements into a bitmap, then the path decision
//! tries the precomputed YAF and NF9 shapes before settling on the
//! generic path. Options templates are sorted into the statistics,
//! tombstone and sampling kinds; unrecognizable templates are ignored
//! and their records drained. Classification cannot fail.

use crate::bitmap::{NF9_MASK, TemplateBits, YAF_MASK};
use crate::elements;
use crate::registry::{InternalId, TemplateRegistry};
use crate::template::Template;

use serde::Serialize;

/// Recognized shapes records can reference from inside structured
/// lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum InnerKind {
    /// YAF TCP-flags sub-record (initial/union, optionally reversed).
    TcpFlags,
    /// Tombstone access log entry.
    TombstoneAccess,
}

/// Recognized options-template kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OptionsKind {
    YafStats,
    Tombstone,
    Nf9Sampling,
}

/// Per-template decode directive, stored as the template's context for
/// the life of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DecodePlan {
    /// Generic path with the full gauntlets.
    Fixrec { bits: TemplateBits },
    /// YAF fast path; the id carries the variant flags.
    Yafrec { tid: InternalId, bits: TemplateBits },
    /// NF9 fast path; the id carries the variant flags.
    Nf9rec { tid: InternalId, bits: TemplateBits },
    /// Options records with a known decode.
    Options(OptionsKind),
    /// A template only referenced from structured lists.
    Inner(InnerKind),
    /// Drain and discard.
    Ignore,
}

impl DecodePlan {
    /// Short name for events and template logging.
    pub fn path_name(&self) -> &'static str {
        match self {
            DecodePlan::Fixrec { .. } => "generic",
            DecodePlan::Yafrec { .. } => "yaf",
            DecodePlan::Nf9rec { .. } => "nf9",
            DecodePlan::Options(OptionsKind::YafStats) => "yaf-stats",
            DecodePlan::Options(OptionsKind::Tombstone) => "tombstone",
            DecodePlan::Options(OptionsKind::Nf9Sampling) => "nf9-sampling",
            DecodePlan::Inner(_) => "inner",
            DecodePlan::Ignore => "ignore",
        }
    }
}

/// Classifies one template.
pub fn classify(template: &Template, registry: &TemplateRegistry) -> DecodePlan {
    if template.is_options() {
        return classify_options(template);
    }
    if let Some(kind) = match_inner_shape(template) {
        return DecodePlan::Inner(kind);
    }

    let mut bits = TemplateBits::EMPTY;
    for field in &template.fields {
        if let Some(bit) = TemplateBits::bit_for(field.key) {
            bits.insert(bit);
        }
    }

    let has_address = bits.intersects(TemplateBits::IP_V4 | TemplateBits::IP_V6);

    if bits.outside(YAF_MASK).is_empty() && has_address {
        if let Some(tid) = yaf_variant(bits) {
            if registry.contains(tid) {
                return DecodePlan::Yafrec { tid, bits };
            }
        }
    }

    if bits.outside(NF9_MASK).is_empty() && has_address {
        if let Some(tid) = nf9_variant(bits) {
            if registry.contains(tid) {
                return DecodePlan::Nf9rec { tid, bits };
            }
        }
    }

    if bits.is_empty() {
        DecodePlan::Ignore
    } else {
        DecodePlan::Fixrec { bits }
    }
}

/// YAF shape check: millisecond pair, exactly one volume style, and
/// the variant flags derived from the reverse and list elements.
fn yaf_variant(bits: TemplateBits) -> Option<InternalId> {
    if !bits.contains(TemplateBits::START_MILLI | TemplateBits::END_MILLI) {
        return None;
    }

    let delta = bits.contains(TemplateBits::OCTET_DELTA | TemplateBits::PACKET_DELTA);
    let total = bits.contains(TemplateBits::OCTET_TOTAL | TemplateBits::PACKET_TOTAL);
    let vol_flag = match (delta, total) {
        (true, false) => 0,
        (false, true) => InternalId::YAF_TOTAL,
        _ => return None,
    };

    let mut flags = vol_flag;
    if bits.contains(TemplateBits::IP_V4) {
        flags |= InternalId::YAF_V4;
    }
    if bits.contains(TemplateBits::IP_V6) {
        flags |= InternalId::YAF_V6;
    }
    if bits.contains(TemplateBits::REVERSE_FLOW_DELTA_MILLI) {
        flags |= InternalId::YAF_BI;
    }
    // Flags arriving through the multi-list instead of flat elements.
    if bits.contains(TemplateBits::STML) && !bits.contains(TemplateBits::INITIAL_FLAGS) {
        flags |= InternalId::YAF_STML;
    }
    Some(InternalId::yaf(flags))
}

/// NF9 shape check: exactly one family, exactly one time style, and
/// exactly one volume style.
fn nf9_variant(bits: TemplateBits) -> Option<InternalId> {
    let v4 = bits.contains(TemplateBits::IP_V4);
    let v6 = bits.contains(TemplateBits::IP_V6);
    let fam_flag = match (v4, v6) {
        (true, false) => 0,
        (false, true) => InternalId::NF9_V6,
        _ => return None,
    };

    let time_bits = TemplateBits(bits.0 & crate::bitmap::TIME_MASK.0);
    let sysup_allowed = TemplateBits::SYSUP_START
        | TemplateBits::SYSUP_END
        | TemplateBits::SYSTEM_INIT_MILLI;
    let milli_allowed = TemplateBits::START_MILLI | TemplateBits::OBS_MILLI;
    let time_flag = if time_bits
        .contains(TemplateBits::SYSUP_START | TemplateBits::SYSUP_END)
        && time_bits.outside(sysup_allowed).is_empty()
    {
        0
    } else if time_bits.contains(milli_allowed)
        && time_bits.outside(milli_allowed).is_empty()
    {
        InternalId::NF9_MILLI
    } else {
        return None;
    };

    let delta_allowed = TemplateBits::OCTET_DELTA
        | TemplateBits::PACKET_DELTA
        | TemplateBits::POST_OCTET_DELTA
        | TemplateBits::POST_PACKET_DELTA;
    let total_allowed = TemplateBits::OCTET_TOTAL
        | TemplateBits::PACKET_TOTAL
        | TemplateBits::POST_OCTET_TOTAL
        | TemplateBits::POST_PACKET_TOTAL;
    let initiator_allowed =
        TemplateBits::INITIATOR_VOLUME | TemplateBits::RESPONDER_VOLUME;
    let volume_mask = delta_allowed | total_allowed | initiator_allowed;
    let vol_bits = TemplateBits(bits.0 & volume_mask.0);

    let vol_flag = if vol_bits
        .contains(TemplateBits::OCTET_DELTA | TemplateBits::PACKET_DELTA)
        && vol_bits.outside(delta_allowed).is_empty()
    {
        0
    } else if vol_bits.contains(TemplateBits::OCTET_TOTAL | TemplateBits::PACKET_TOTAL)
        && vol_bits.outside(total_allowed).is_empty()
    {
        InternalId::NF9_TOTAL
    } else if vol_bits.contains(initiator_allowed)
        && vol_bits.outside(initiator_allowed).is_empty()
    {
        InternalId::NF9_INITIATOR
    } else {
        return None;
    };

    Some(InternalId::nf9(fam_flag | time_flag | vol_flag))
}

/// Matches the sub-record shapes referenced from structured lists:
/// small templates made only of the TCP flag elements, or of the
/// tombstone access pair.
fn match_inner_shape(template: &Template) -> Option<InnerKind> {
    let tcp_flag_keys = [
        elements::INITIAL_TCP_FLAGS,
        elements::UNION_TCP_FLAGS,
        elements::REVERSE_INITIAL_TCP_FLAGS,
        elements::REVERSE_UNION_TCP_FLAGS,
    ];
    let all_tcp = template
        .fields
        .iter()
        .all(|f| tcp_flag_keys.contains(&f.key));
    if all_tcp
        && template.carries(elements::INITIAL_TCP_FLAGS)
        && template.carries(elements::UNION_TCP_FLAGS)
    {
        return Some(InnerKind::TcpFlags);
    }

    let access_keys = [
        elements::CERT_TOOL_ID,
        elements::EXPORTING_PROCESS_ID,
        elements::OBSERVATION_TIME_SECONDS,
    ];
    let all_access = template.fields.iter().all(|f| access_keys.contains(&f.key));
    if all_access
        && template.carries(elements::OBSERVATION_TIME_SECONDS)
        && (template.carries(elements::CERT_TOOL_ID)
            || template.carries(elements::EXPORTING_PROCESS_ID))
    {
        return Some(InnerKind::TombstoneAccess);
    }

    None
}

/// Options templates: statistics, tombstone, sampling in either
/// spelling; anything else is drained.
fn classify_options(template: &Template) -> DecodePlan {
    if template.carries(elements::FLOW_TABLE_FLUSH_EVENT_COUNT)
        || template.carries(elements::FLOW_TABLE_PEAK_COUNT)
    {
        return DecodePlan::Options(OptionsKind::YafStats);
    }
    if template.carries(elements::TOMBSTONE_ID) {
        return DecodePlan::Options(OptionsKind::Tombstone);
    }
    let classic = template.carries(elements::SAMPLING_ALGORITHM)
        && template.carries(elements::SAMPLING_INTERVAL);
    let random = template.carries(elements::SAMPLER_MODE)
        && template.carries(elements::SAMPLER_RANDOM_INTERVAL);
    if classic || random {
        return DecodePlan::Options(OptionsKind::Nf9Sampling);
    }
    DecodePlan::Ignore
}
