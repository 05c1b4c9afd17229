//! Timestamp derivation.
//!
//! Exporters spell flow times in many ways: absolute millisecond,
//! second, NTP microsecond and nanosecond pairs, deltas against the
//! export time, explicit durations, and system-uptime offsets. This
//! module picks one spelling per record and produces a single
//! `(start, duration)` pair in milliseconds since the Unix epoch.

use crate::bitmap::TemplateBits;
use crate::extract::RawFlow;
use crate::probe::Quirks;

use serde::Serialize;

/// NTP to Unix epoch offset in seconds (Jan 1 1970 in NTP era 0).
pub const NTP_EPOCH_OFFSET_SECS: u64 = 0x83AA_7E80;

const ROLLOVER: i64 = 1 << 32;
const HALF_ROLLOVER: i64 = 1 << 31;

/// Which elements produced a record's timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TimeSource {
    Milli,
    Seconds,
    Micro,
    Nano,
    DeltaMicro,
    SysUp,
    ObservationSeconds,
    ObservationMilli,
    ObservationMicro,
    ObservationNano,
    Collection,
    Export,
}

impl std::fmt::Display for TimeSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            TimeSource::Milli => "flowMilliseconds",
            TimeSource::Seconds => "flowSeconds",
            TimeSource::Micro => "flowMicroseconds",
            TimeSource::Nano => "flowNanoseconds",
            TimeSource::DeltaMicro => "flowDeltaMicroseconds",
            TimeSource::SysUp => "sysUpTime",
            TimeSource::ObservationSeconds => "observationTimeSeconds",
            TimeSource::ObservationMilli => "observationTimeMilliseconds",
            TimeSource::ObservationMicro => "observationTimeMicroseconds",
            TimeSource::ObservationNano => "observationTimeNanoseconds",
            TimeSource::Collection => "collectionTimeMilliseconds",
            TimeSource::Export => "exportTime",
        };
        f.write_str(name)
    }
}

/// Provenance of a derived time span, for timestamp logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Provenance {
    /// Matched one of the common start/end pairs.
    Pair { start: TimeSource, end: TimeSource },
    /// Start plus an explicit duration element.
    Duration { start: TimeSource },
    /// Assembled from whatever start and end elements were present.
    Scanned { start: TimeSource, end: TimeSource },
    /// No time elements at all; the export time stood in.
    ExportOnly,
}

impl std::fmt::Display for Provenance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Provenance::Pair { start, end } if start == end => write!(f, "{}", start),
            Provenance::Pair { start, end } => write!(f, "{}..{}", start, end),
            Provenance::Duration { start } => write!(f, "{}+duration", start),
            Provenance::Scanned { start, end } => write!(f, "{}..{} (scan)", start, end),
            Provenance::ExportOnly => f.write_str("exportTime"),
        }
    }
}

/// A derived `(start, duration)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeSpan {
    pub start_ms: u64,
    pub duration_ms: u32,
    pub provenance: Provenance,
}

/// Decodes a 64-bit NTP timestamp to Unix milliseconds. The low eleven
/// fraction bits of a microsecond-typed element are noise and are
/// masked off. Zero means the element was absent.
pub fn ntp_to_ms(raw: u64, micro: bool) -> u64 {
    if raw == 0 {
        return 0;
    }
    let secs = (raw >> 32).wrapping_sub(NTP_EPOCH_OFFSET_SECS);
    let mut frac = raw & 0xFFFF_FFFF;
    if micro {
        frac &= !0x7FF;
    }
    secs.wrapping_mul(1000) + ((frac * 1000 + (1 << 31)) >> 32)
}

/// Encodes Unix milliseconds as an NTP timestamp.
pub fn ms_to_ntp(ms: u64) -> u64 {
    let secs = ms / 1000 + NTP_EPOCH_OFFSET_SECS;
    let frac = ((ms % 1000) << 32) / 1000;
    (secs << 32) | frac
}

fn clamp_duration(ms: i64) -> u32 {
    ms.clamp(0, i64::from(u32::MAX)) as u32
}

/// Derives the record's time span from whichever time elements its
/// template carries.
pub fn derive_time(
    bits: TemplateBits,
    raw: &RawFlow,
    export_ms: u64,
    quirks: Quirks,
    single_packet: bool,
) -> TimeSpan {
    let has = |b: TemplateBits| bits.contains(b);

    // Common exporter shapes first.
    if has(TemplateBits::START_MILLI) && has(TemplateBits::END_MILLI) {
        return span(
            raw.start_milli,
            raw.end_milli as i64 - raw.start_milli as i64,
            Provenance::Pair {
                start: TimeSource::Milli,
                end: TimeSource::Milli,
            },
        );
    }
    if has(TemplateBits::START_MILLI) && has(TemplateBits::DURATION_MILLI) {
        return span(
            raw.start_milli,
            i64::from(raw.dur_milli),
            Provenance::Duration {
                start: TimeSource::Milli,
            },
        );
    }
    if has(TemplateBits::START_SEC) && has(TemplateBits::END_SEC) {
        return span(
            raw.start_sec * 1000,
            (raw.end_sec as i64 - raw.start_sec as i64) * 1000,
            Provenance::Pair {
                start: TimeSource::Seconds,
                end: TimeSource::Seconds,
            },
        );
    }
    if has(TemplateBits::START_MICRO) && has(TemplateBits::END_MICRO) {
        let start = ntp_to_ms(raw.start_micro, true);
        let end = ntp_to_ms(raw.end_micro, true);
        return span(
            start,
            end as i64 - start as i64,
            Provenance::Pair {
                start: TimeSource::Micro,
                end: TimeSource::Micro,
            },
        );
    }
    if has(TemplateBits::START_MICRO) && has(TemplateBits::DURATION_MICRO) {
        return span(
            ntp_to_ms(raw.start_micro, true),
            i64::from(raw.dur_micro / 1000),
            Provenance::Duration {
                start: TimeSource::Micro,
            },
        );
    }
    if has(TemplateBits::START_NANO) && has(TemplateBits::END_NANO) {
        let start = ntp_to_ms(raw.start_nano, false);
        let end = ntp_to_ms(raw.end_nano, false);
        return span(
            start,
            end as i64 - start as i64,
            Provenance::Pair {
                start: TimeSource::Nano,
                end: TimeSource::Nano,
            },
        );
    }
    if has(TemplateBits::START_DELTA_MICRO) && has(TemplateBits::END_DELTA_MICRO) {
        // Deltas count backwards from the export time.
        let start = export_ms.saturating_sub(raw.start_delta_micro / 1000);
        let end = export_ms.saturating_sub(raw.end_delta_micro / 1000);
        return span(
            start,
            end as i64 - start as i64,
            Provenance::Pair {
                start: TimeSource::DeltaMicro,
                end: TimeSource::DeltaMicro,
            },
        );
    }
    if has(TemplateBits::SYSUP_START) {
        return sysup_span(bits, raw, export_ms, quirks, single_packet);
    }

    scan(bits, raw, export_ms)
}

fn span(start_ms: u64, duration: i64, provenance: Provenance) -> TimeSpan {
    TimeSpan {
        start_ms,
        duration_ms: clamp_duration(duration),
        provenance,
    }
}

/// System-uptime reconstruction with 32-bit rollover repair.
fn sysup_span(
    bits: TemplateBits,
    raw: &RawFlow,
    export_ms: u64,
    quirks: Quirks,
    single_packet: bool,
) -> TimeSpan {
    let secs_quirk = quirks.contains(Quirks::NF9_SYSUPTIME_SECS);
    let start_up = i64::from(raw.sysup_start);
    let mut end_up = i64::from(raw.sysup_end);

    // A jittery exporter can stamp a single-packet flow with end just
    // before start, which would otherwise be repaired into a full
    // rollover period.
    if secs_quirk && single_packet && end_up < start_up {
        end_up = start_up;
    }

    let duration = if end_up < start_up {
        end_up + ROLLOVER - start_up
    } else {
        end_up - start_up
    };

    let provenance = Provenance::Pair {
        start: TimeSource::SysUp,
        end: TimeSource::SysUp,
    };

    if !bits.contains(TemplateBits::SYSTEM_INIT_MILLI) {
        return span(
            export_ms.saturating_sub(duration as u64),
            duration,
            provenance,
        );
    }

    let mut init = raw.sys_init_milli as i64;
    let mut uptime = export_ms as i64 - init;
    if secs_quirk {
        // The derived uptime is in seconds; rescale it and re-anchor
        // the boot time.
        uptime *= 1000;
        init = export_ms as i64 - uptime;
    }

    let mut start = start_up;
    if uptime - start > HALF_ROLLOVER {
        start += ROLLOVER;
    } else if uptime - start < -HALF_ROLLOVER {
        start -= ROLLOVER;
    }

    TimeSpan {
        start_ms: (init + start).max(0) as u64,
        duration_ms: clamp_duration(duration),
        provenance,
    }
}

/// Priority-ordered scan over whatever time elements are present.
fn scan(bits: TemplateBits, raw: &RawFlow, export_ms: u64) -> TimeSpan {
    let start = if bits.contains(TemplateBits::START_MILLI) {
        Some((raw.start_milli, TimeSource::Milli))
    } else if bits.contains(TemplateBits::START_SEC) {
        Some((raw.start_sec * 1000, TimeSource::Seconds))
    } else if bits.contains(TemplateBits::START_MICRO) {
        Some((ntp_to_ms(raw.start_micro, true), TimeSource::Micro))
    } else if bits.contains(TemplateBits::START_NANO) {
        Some((ntp_to_ms(raw.start_nano, false), TimeSource::Nano))
    } else if bits.contains(TemplateBits::START_DELTA_MICRO) {
        Some((
            export_ms.saturating_sub(raw.start_delta_micro / 1000),
            TimeSource::DeltaMicro,
        ))
    } else {
        None
    };

    let end = if bits.contains(TemplateBits::END_MILLI) {
        Some((raw.end_milli, TimeSource::Milli))
    } else if bits.contains(TemplateBits::END_SEC) {
        Some((raw.end_sec * 1000, TimeSource::Seconds))
    } else if bits.contains(TemplateBits::END_MICRO) {
        Some((ntp_to_ms(raw.end_micro, true), TimeSource::Micro))
    } else if bits.contains(TemplateBits::END_NANO) {
        Some((ntp_to_ms(raw.end_nano, false), TimeSource::Nano))
    } else if bits.contains(TemplateBits::END_DELTA_MICRO) {
        Some((
            export_ms.saturating_sub(raw.end_delta_micro / 1000),
            TimeSource::DeltaMicro,
        ))
    } else if bits.contains(TemplateBits::COLLECTION_MILLI) {
        Some((raw.coll_milli, TimeSource::Collection))
    } else if bits.contains(TemplateBits::OBS_MILLI) {
        Some((raw.obs_milli, TimeSource::ObservationMilli))
    } else if bits.contains(TemplateBits::OBS_SEC) {
        Some((raw.obs_sec * 1000, TimeSource::ObservationSeconds))
    } else if bits.contains(TemplateBits::OBS_MICRO) {
        Some((ntp_to_ms(raw.obs_micro, true), TimeSource::ObservationMicro))
    } else if bits.contains(TemplateBits::OBS_NANO) {
        Some((ntp_to_ms(raw.obs_nano, false), TimeSource::ObservationNano))
    } else {
        None
    };

    let explicit_duration = if bits.contains(TemplateBits::DURATION_MILLI) {
        Some(i64::from(raw.dur_milli))
    } else if bits.contains(TemplateBits::DURATION_MICRO) {
        Some(i64::from(raw.dur_micro / 1000))
    } else {
        None
    };

    match (start, end) {
        (Some((s, s_src)), Some((e, e_src))) => {
            let duration = explicit_duration.unwrap_or(e as i64 - s as i64);
            span(
                s,
                duration,
                Provenance::Scanned {
                    start: s_src,
                    end: e_src,
                },
            )
        }
        (Some((s, s_src)), None) => span(
            s,
            explicit_duration.unwrap_or(0),
            Provenance::Duration { start: s_src },
        ),
        (None, Some((e, e_src))) => {
            let duration = explicit_duration.unwrap_or(0);
            span(
                e.saturating_sub(duration.max(0) as u64),
                duration,
                Provenance::Scanned {
                    start: TimeSource::Export,
                    end: e_src,
                },
            )
        }
        (None, None) => {
            let duration = explicit_duration.unwrap_or(0);
            TimeSpan {
                start_ms: export_ms.saturating_sub(duration.max(0) as u64),
                duration_ms: clamp_duration(duration),
                provenance: Provenance::ExportOnly,
            }
        }
    }
}
