//! Structured-list side channels.
//!
//! YAF moves TCP flags into a subTemplateMultiList when a flow also
//! carries payload-derived entries, and tombstone records carry their
//! access log in a subTemplateList. Both lists reference exporter
//! template ids that the classifier has already recognized and mapped,
//! so the walk here only needs the session's inner-template table.
//!
//! List framing per RFC 6313: a one-byte semantic, then for the
//! multi-list one `(template id, length)` header per sub-list where the
//! length covers its own four header bytes, and for the plain list a
//! single template id covering the remainder.

use crate::classify::InnerKind;
use crate::extract::RawFlow;
use crate::template::Template;

use nom::bytes::complete::take;
use nom::number::complete::be_u8;
use nom_derive::{Nom, Parse};

use std::collections::HashMap;

/// Exporter template id to recognized inner shape.
pub type InnerMap = HashMap<u16, (InnerKind, Template)>;

/// TCP flags recovered from a flags sub-record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StmlFlags {
    pub initial: u8,
    pub union_flags: u8,
    pub rev_initial: u8,
    pub rev_union_flags: u8,
    pub has_reverse: bool,
}

/// One tombstone access-list entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TombstoneAccess {
    pub tool_id: u32,
    pub observed_secs: u64,
}

/// Everything a list walk can surface.
#[derive(Debug, Clone, Default)]
pub struct ListScan {
    pub flags: Option<StmlFlags>,
    pub accesses: Vec<TombstoneAccess>,
}

#[derive(Nom)]
struct MultiListEntryHeader {
    template_id: u16,
    /// Includes the four bytes of this header.
    length: u16,
}

#[derive(Nom)]
struct ListHeader {
    template_id: u16,
}

/// Walks a subTemplateMultiList body.
pub fn scan_multi_list(body: &[u8], inner: &InnerMap) -> ListScan {
    let mut out = ListScan::default();
    let Ok((mut rest, _semantic)) = be_u8::<_, nom::error::Error<&[u8]>>(body) else {
        return out;
    };
    while !rest.is_empty() {
        let Ok((after_header, header)) = MultiListEntryHeader::parse(rest) else {
            break;
        };
        let records_len = usize::from(header.length).saturating_sub(4);
        let Ok((next, records)) =
            take::<_, _, nom::error::Error<&[u8]>>(records_len)(after_header)
        else {
            break;
        };
        scan_records(header.template_id, records, inner, &mut out);
        rest = next;
    }
    out
}

/// Walks a subTemplateList body (single template id, records to end).
pub fn scan_sub_list(body: &[u8], inner: &InnerMap) -> ListScan {
    let mut out = ListScan::default();
    let Ok((rest, _semantic)) = be_u8::<_, nom::error::Error<&[u8]>>(body) else {
        return out;
    };
    let Ok((records, header)) = ListHeader::parse(rest) else {
        return out;
    };
    scan_records(header.template_id, records, inner, &mut out);
    out
}

fn scan_records(template_id: u16, mut records: &[u8], inner: &InnerMap, out: &mut ListScan) {
    let Some((kind, template)) = inner.get(&template_id) else {
        return;
    };
    let Some(record_len) = template.total_length() else {
        return;
    };
    if record_len == 0 {
        return;
    }
    while records.len() >= record_len {
        let Ok((raw, rest)) = RawFlow::extract(template, records) else {
            break;
        };
        records = rest;
        match kind {
            InnerKind::TcpFlags => {
                // The last flags record wins; YAF emits exactly one.
                out.flags = Some(StmlFlags {
                    initial: raw.initial_flags,
                    union_flags: raw.union_flags,
                    rev_initial: raw.rev_initial_flags,
                    rev_union_flags: raw.rev_union_flags,
                    has_reverse: template
                        .carries(crate::elements::REVERSE_INITIAL_TCP_FLAGS),
                });
            }
            InnerKind::TombstoneAccess => {
                out.accesses.push(TombstoneAccess {
                    tool_id: raw.cert_tool_id,
                    observed_secs: raw.obs_sec,
                });
            }
        }
    }
}
