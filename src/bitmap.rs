//! Template IE bitmap.
//!
//! Each template observed on a session is summarized once, at
//! classification time, into a 64-bit set of presence bits for the
//! elements the decoders care about. The masks below drive path
//! selection: a template whose bits fit inside [`YAF_MASK`] or
//! [`NF9_MASK`] is eligible for the corresponding fast path, anything
//! else with at least one bit set goes through the generic decoder.

use crate::elements::{self, ElementKey};

use serde::Serialize;

macro_rules! bits {
    ($($(#[$meta:meta])* $name:ident = $idx:expr;)+) => {
        impl TemplateBits {
            $($(#[$meta])* pub const $name: TemplateBits = TemplateBits(1 << $idx);)+

            const NAMES: &'static [(u64, &'static str)] = &[
                $((1 << $idx, stringify!($name)),)+
            ];
        }
    };
}

/// Presence bits for the salient information elements of one template.
#[derive(Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TemplateBits(pub u64);

bits! {
    // Addresses (source or destination counts as presence).
    IP_V4 = 0;
    IP_V6 = 1;

    // Forward volumes.
    OCTET_DELTA = 2;
    PACKET_DELTA = 3;
    OCTET_TOTAL = 4;
    PACKET_TOTAL = 5;
    INITIATOR_VOLUME = 6;
    RESPONDER_VOLUME = 7;
    POST_OCTET_DELTA = 8;
    POST_PACKET_DELTA = 9;
    POST_OCTET_TOTAL = 10;
    POST_PACKET_TOTAL = 11;

    // Reverse volumes (RFC 5103 mirrors).
    REVERSE_DELTA_VOLUME = 12;
    REVERSE_TOTAL_VOLUME = 13;

    // Times.
    START_MILLI = 14;
    END_MILLI = 15;
    START_SEC = 16;
    END_SEC = 17;
    START_MICRO = 18;
    END_MICRO = 19;
    START_NANO = 20;
    END_NANO = 21;
    START_DELTA_MICRO = 22;
    END_DELTA_MICRO = 23;
    DURATION_MILLI = 24;
    DURATION_MICRO = 25;
    SYSUP_START = 26;
    SYSUP_END = 27;
    SYSTEM_INIT_MILLI = 28;
    OBS_SEC = 29;
    OBS_MILLI = 30;
    OBS_MICRO = 31;
    OBS_NANO = 32;
    COLLECTION_MILLI = 33;

    // ICMP: the combined type/code elements share one bit, the split
    // type and code elements share another.
    ICMP_TYPECODE = 34;
    ICMP_TYPE_CODE_SPLIT = 35;

    // VLAN and reverse metadata.
    POST_VLAN = 36;
    REVERSE_VLAN = 37;
    REVERSE_INITIAL_FLAGS = 38;
    REVERSE_TCP_FLAGS = 39;

    // Firewall events, by spelling.
    FW_EVENT = 40;
    FW_EVENT_CISCO = 41;
    FW_EXT_EVENT = 42;

    // Flag sources and provenance.
    STML = 43;
    INITIAL_FLAGS = 44;
    REVERSE_FLOW_DELTA_MILLI = 45;
    CERT_TOOL = 46;
    SILK_TCP_STATE = 47;
}

/// Elements a YAF export may carry. Any bit outside this set disqualifies
/// the template from the YAF fast path.
pub const YAF_MASK: TemplateBits = TemplateBits(
    TemplateBits::IP_V4.0
        | TemplateBits::IP_V6.0
        | TemplateBits::OCTET_DELTA.0
        | TemplateBits::PACKET_DELTA.0
        | TemplateBits::OCTET_TOTAL.0
        | TemplateBits::PACKET_TOTAL.0
        | TemplateBits::REVERSE_DELTA_VOLUME.0
        | TemplateBits::REVERSE_TOTAL_VOLUME.0
        | TemplateBits::START_MILLI.0
        | TemplateBits::END_MILLI.0
        | TemplateBits::ICMP_TYPECODE.0
        | TemplateBits::ICMP_TYPE_CODE_SPLIT.0
        | TemplateBits::REVERSE_VLAN.0
        | TemplateBits::REVERSE_INITIAL_FLAGS.0
        | TemplateBits::REVERSE_TCP_FLAGS.0
        | TemplateBits::STML.0
        | TemplateBits::INITIAL_FLAGS.0
        | TemplateBits::REVERSE_FLOW_DELTA_MILLI.0
        | TemplateBits::SILK_TCP_STATE.0,
);

/// Elements a plain NetFlow V9 export may carry.
pub const NF9_MASK: TemplateBits = TemplateBits(
    TemplateBits::IP_V4.0
        | TemplateBits::IP_V6.0
        | TemplateBits::OCTET_DELTA.0
        | TemplateBits::PACKET_DELTA.0
        | TemplateBits::OCTET_TOTAL.0
        | TemplateBits::PACKET_TOTAL.0
        | TemplateBits::INITIATOR_VOLUME.0
        | TemplateBits::RESPONDER_VOLUME.0
        | TemplateBits::POST_OCTET_DELTA.0
        | TemplateBits::POST_PACKET_DELTA.0
        | TemplateBits::POST_OCTET_TOTAL.0
        | TemplateBits::POST_PACKET_TOTAL.0
        | TemplateBits::SYSUP_START.0
        | TemplateBits::SYSUP_END.0
        | TemplateBits::SYSTEM_INIT_MILLI.0
        | TemplateBits::START_MILLI.0
        | TemplateBits::OBS_MILLI.0
        | TemplateBits::ICMP_TYPECODE.0
        | TemplateBits::ICMP_TYPE_CODE_SPLIT.0
        | TemplateBits::POST_VLAN.0
        | TemplateBits::FW_EVENT.0
        | TemplateBits::FW_EVENT_CISCO.0
        | TemplateBits::FW_EXT_EVENT.0,
);

/// Every time-presence bit, used by the gauntlet's fallback scan.
pub const TIME_MASK: TemplateBits = TemplateBits(
    TemplateBits::START_MILLI.0
        | TemplateBits::END_MILLI.0
        | TemplateBits::START_SEC.0
        | TemplateBits::END_SEC.0
        | TemplateBits::START_MICRO.0
        | TemplateBits::END_MICRO.0
        | TemplateBits::START_NANO.0
        | TemplateBits::END_NANO.0
        | TemplateBits::START_DELTA_MICRO.0
        | TemplateBits::END_DELTA_MICRO.0
        | TemplateBits::DURATION_MILLI.0
        | TemplateBits::DURATION_MICRO.0
        | TemplateBits::SYSUP_START.0
        | TemplateBits::SYSUP_END.0
        | TemplateBits::SYSTEM_INIT_MILLI.0
        | TemplateBits::OBS_SEC.0
        | TemplateBits::OBS_MILLI.0
        | TemplateBits::OBS_MICRO.0
        | TemplateBits::OBS_NANO.0
        | TemplateBits::COLLECTION_MILLI.0,
);

impl TemplateBits {
    pub const EMPTY: TemplateBits = TemplateBits(0);

    pub fn insert(&mut self, other: TemplateBits) {
        self.0 |= other.0;
    }

    pub fn contains(self, other: TemplateBits) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn intersects(self, other: TemplateBits) -> bool {
        self.0 & other.0 != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Bits of `self` that fall outside `mask`.
    pub fn outside(self, mask: TemplateBits) -> TemplateBits {
        TemplateBits(self.0 & !mask.0)
    }

    /// Maps an element to its presence bit, or `None` for elements the
    /// engine extracts unconditionally (ports, protocol) or ignores.
    pub fn bit_for(key: ElementKey) -> Option<TemplateBits> {
        let bit = match key {
            elements::SOURCE_IPV4_ADDRESS
            | elements::DESTINATION_IPV4_ADDRESS => Self::IP_V4,
            elements::SOURCE_IPV6_ADDRESS
            | elements::DESTINATION_IPV6_ADDRESS => Self::IP_V6,

            elements::OCTET_DELTA_COUNT => Self::OCTET_DELTA,
            elements::PACKET_DELTA_COUNT => Self::PACKET_DELTA,
            elements::OCTET_TOTAL_COUNT => Self::OCTET_TOTAL,
            elements::PACKET_TOTAL_COUNT => Self::PACKET_TOTAL,
            elements::INITIATOR_OCTETS | elements::INITIATOR_PACKETS => {
                Self::INITIATOR_VOLUME
            }
            elements::RESPONDER_OCTETS | elements::RESPONDER_PACKETS => {
                Self::RESPONDER_VOLUME
            }
            elements::POST_OCTET_DELTA_COUNT => Self::POST_OCTET_DELTA,
            elements::POST_PACKET_DELTA_COUNT => Self::POST_PACKET_DELTA,
            elements::POST_OCTET_TOTAL_COUNT => Self::POST_OCTET_TOTAL,
            elements::POST_PACKET_TOTAL_COUNT => Self::POST_PACKET_TOTAL,
            elements::REVERSE_OCTET_DELTA_COUNT
            | elements::REVERSE_PACKET_DELTA_COUNT => Self::REVERSE_DELTA_VOLUME,
            elements::REVERSE_OCTET_TOTAL_COUNT
            | elements::REVERSE_PACKET_TOTAL_COUNT => Self::REVERSE_TOTAL_VOLUME,

            elements::FLOW_START_MILLISECONDS => Self::START_MILLI,
            elements::FLOW_END_MILLISECONDS => Self::END_MILLI,
            elements::FLOW_START_SECONDS => Self::START_SEC,
            elements::FLOW_END_SECONDS => Self::END_SEC,
            elements::FLOW_START_MICROSECONDS => Self::START_MICRO,
            elements::FLOW_END_MICROSECONDS => Self::END_MICRO,
            elements::FLOW_START_NANOSECONDS => Self::START_NANO,
            elements::FLOW_END_NANOSECONDS => Self::END_NANO,
            elements::FLOW_START_DELTA_MICROSECONDS => Self::START_DELTA_MICRO,
            elements::FLOW_END_DELTA_MICROSECONDS => Self::END_DELTA_MICRO,
            elements::FLOW_DURATION_MILLISECONDS => Self::DURATION_MILLI,
            elements::FLOW_DURATION_MICROSECONDS => Self::DURATION_MICRO,
            elements::FLOW_START_SYSUP_TIME => Self::SYSUP_START,
            elements::FLOW_END_SYSUP_TIME => Self::SYSUP_END,
            elements::SYSTEM_INIT_TIME_MILLISECONDS => Self::SYSTEM_INIT_MILLI,
            elements::OBSERVATION_TIME_SECONDS => Self::OBS_SEC,
            elements::OBSERVATION_TIME_MILLISECONDS => Self::OBS_MILLI,
            elements::OBSERVATION_TIME_MICROSECONDS => Self::OBS_MICRO,
            elements::OBSERVATION_TIME_NANOSECONDS => Self::OBS_NANO,
            elements::COLLECTION_TIME_MILLISECONDS => Self::COLLECTION_MILLI,

            elements::ICMP_TYPE_CODE_IPV4 | elements::ICMP_TYPE_CODE_IPV6 => {
                Self::ICMP_TYPECODE
            }
            elements::ICMP_TYPE_IPV4
            | elements::ICMP_CODE_IPV4
            | elements::ICMP_TYPE_IPV6
            | elements::ICMP_CODE_IPV6 => Self::ICMP_TYPE_CODE_SPLIT,

            elements::POST_VLAN_ID => Self::POST_VLAN,
            elements::REVERSE_VLAN_ID | elements::REVERSE_POST_VLAN_ID => {
                Self::REVERSE_VLAN
            }
            elements::REVERSE_INITIAL_TCP_FLAGS => Self::REVERSE_INITIAL_FLAGS,
            elements::REVERSE_TCP_CONTROL_BITS
            | elements::REVERSE_UNION_TCP_FLAGS => Self::REVERSE_TCP_FLAGS,

            elements::FIREWALL_EVENT => Self::FW_EVENT,
            elements::NF_F_FW_EVENT => Self::FW_EVENT_CISCO,
            elements::NF_F_FW_EXT_EVENT | elements::NF_F_FW_EXT_EVENT_V9 => {
                Self::FW_EXT_EVENT
            }

            elements::SUB_TEMPLATE_MULTI_LIST => Self::STML,
            elements::INITIAL_TCP_FLAGS | elements::UNION_TCP_FLAGS => {
                Self::INITIAL_FLAGS
            }
            elements::REVERSE_FLOW_DELTA_MILLISECONDS => {
                Self::REVERSE_FLOW_DELTA_MILLI
            }
            elements::CERT_TOOL_ID | elements::EXPORTING_PROCESS_ID => {
                Self::CERT_TOOL
            }
            elements::SILK_TCP_STATE => Self::SILK_TCP_STATE,
            _ => return None,
        };
        Some(bit)
    }
}

impl std::ops::BitOr for TemplateBits {
    type Output = TemplateBits;

    fn bitor(self, rhs: TemplateBits) -> TemplateBits {
        TemplateBits(self.0 | rhs.0)
    }
}

impl std::fmt::Debug for TemplateBits {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut set = f.debug_set();
        for (bit, name) in Self::NAMES {
            if self.0 & bit != 0 {
                set.entry(&format_args!("{}", name));
            }
        }
        set.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elements;

    #[test]
    fn insert_and_query() {
        let mut bits = TemplateBits::EMPTY;
        assert!(bits.is_empty());
        bits.insert(TemplateBits::IP_V4);
        bits.insert(TemplateBits::START_MILLI);
        assert!(bits.contains(TemplateBits::IP_V4));
        assert!(!bits.contains(TemplateBits::IP_V6));
        assert!(bits.intersects(TIME_MASK));
    }

    #[test]
    fn yaf_mask_excludes_sysup() {
        let mut bits = TemplateBits::EMPTY;
        bits.insert(TemplateBits::SYSUP_START);
        assert!(!bits.outside(YAF_MASK).is_empty());
        assert!(bits.outside(NF9_MASK).is_empty());
    }

    #[test]
    fn paired_elements_share_bits() {
        assert_eq!(
            TemplateBits::bit_for(elements::INITIAL_TCP_FLAGS),
            TemplateBits::bit_for(elements::UNION_TCP_FLAGS),
        );
        assert_eq!(
            TemplateBits::bit_for(elements::ICMP_TYPE_CODE_IPV4),
            TemplateBits::bit_for(elements::ICMP_TYPE_CODE_IPV6),
        );
    }

    #[test]
    fn ports_have_no_bit() {
        assert_eq!(TemplateBits::bit_for(elements::SOURCE_TRANSPORT_PORT), None);
        assert_eq!(TemplateBits::bit_for(elements::PADDING_OCTETS), None);
    }

    #[test]
    fn debug_names_set_bits() {
        let bits = TemplateBits::IP_V4 | TemplateBits::STML;
        let rendered = format!("{:?}", bits);
        assert!(rendered.contains("IP_V4"));
        assert!(rendered.contains("STML"));
    }
}
