//! Information-element identifiers.
//!
//! References:
//! - <https://www.iana.org/assignments/ipfix/ipfix.xhtml>
//! - <https://datatracker.ietf.org/doc/html/rfc5103> (reverse PEN)
//! - <https://tools.netsa.cert.org/cert-ipfix-registry/> (CERT PEN)

use serde::Serialize;

/// IANA-assigned elements carry enterprise number 0.
pub const IANA: u32 = 0;
/// RFC 5103 reverse-direction private enterprise number.
pub const REVERSE_PEN: u32 = 29305;
/// CERT/NetSA private enterprise number (YAF exporters).
pub const CERT_PEN: u32 = 6871;
/// Cisco private enterprise number (ASA firewall exporters).
pub const CISCO_PEN: u32 = 9;

/// An information element identity: private enterprise number plus
/// element id. NetFlow V9 fields arrive with enterprise 0 and the raw
/// field-type number, which lines up with the IANA space for the fields
/// this engine cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ElementKey {
    pub enterprise: u32,
    pub id: u16,
}

impl ElementKey {
    pub const fn new(enterprise: u32, id: u16) -> Self {
        Self { enterprise, id }
    }

    pub const fn iana(id: u16) -> Self {
        Self::new(IANA, id)
    }

    pub const fn reverse(id: u16) -> Self {
        Self::new(REVERSE_PEN, id)
    }

    pub const fn cert(id: u16) -> Self {
        Self::new(CERT_PEN, id)
    }
}

impl std::fmt::Display for ElementKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.enterprise == IANA {
            write!(f, "ie{}", self.id)
        } else {
            write!(f, "ie{}/{}", self.enterprise, self.id)
        }
    }
}

// Addresses, ports, protocol.
pub const OCTET_DELTA_COUNT: ElementKey = ElementKey::iana(1);
pub const PACKET_DELTA_COUNT: ElementKey = ElementKey::iana(2);
pub const PROTOCOL_IDENTIFIER: ElementKey = ElementKey::iana(4);
pub const TCP_CONTROL_BITS: ElementKey = ElementKey::iana(6);
pub const SOURCE_TRANSPORT_PORT: ElementKey = ElementKey::iana(7);
pub const SOURCE_IPV4_ADDRESS: ElementKey = ElementKey::iana(8);
pub const INGRESS_INTERFACE: ElementKey = ElementKey::iana(10);
pub const DESTINATION_TRANSPORT_PORT: ElementKey = ElementKey::iana(11);
pub const DESTINATION_IPV4_ADDRESS: ElementKey = ElementKey::iana(12);
pub const EGRESS_INTERFACE: ElementKey = ElementKey::iana(14);
pub const IP_NEXT_HOP_IPV4: ElementKey = ElementKey::iana(15);
pub const SOURCE_IPV6_ADDRESS: ElementKey = ElementKey::iana(27);
pub const DESTINATION_IPV6_ADDRESS: ElementKey = ElementKey::iana(28);
pub const IP_NEXT_HOP_IPV6: ElementKey = ElementKey::iana(62);

// Volumes.
pub const POST_OCTET_DELTA_COUNT: ElementKey = ElementKey::iana(23);
pub const POST_PACKET_DELTA_COUNT: ElementKey = ElementKey::iana(24);
pub const OCTET_TOTAL_COUNT: ElementKey = ElementKey::iana(85);
pub const PACKET_TOTAL_COUNT: ElementKey = ElementKey::iana(86);
pub const POST_OCTET_TOTAL_COUNT: ElementKey = ElementKey::iana(171);
pub const POST_PACKET_TOTAL_COUNT: ElementKey = ElementKey::iana(172);
pub const INITIATOR_OCTETS: ElementKey = ElementKey::iana(231);
pub const RESPONDER_OCTETS: ElementKey = ElementKey::iana(232);
pub const INITIATOR_PACKETS: ElementKey = ElementKey::iana(298);
pub const RESPONDER_PACKETS: ElementKey = ElementKey::iana(299);

// Times.
pub const FLOW_END_SYSUP_TIME: ElementKey = ElementKey::iana(21);
pub const FLOW_START_SYSUP_TIME: ElementKey = ElementKey::iana(22);
pub const FLOW_START_SECONDS: ElementKey = ElementKey::iana(150);
pub const FLOW_END_SECONDS: ElementKey = ElementKey::iana(151);
pub const FLOW_START_MILLISECONDS: ElementKey = ElementKey::iana(152);
pub const FLOW_END_MILLISECONDS: ElementKey = ElementKey::iana(153);
pub const FLOW_START_MICROSECONDS: ElementKey = ElementKey::iana(154);
pub const FLOW_END_MICROSECONDS: ElementKey = ElementKey::iana(155);
pub const FLOW_START_NANOSECONDS: ElementKey = ElementKey::iana(156);
pub const FLOW_END_NANOSECONDS: ElementKey = ElementKey::iana(157);
pub const FLOW_START_DELTA_MICROSECONDS: ElementKey = ElementKey::iana(158);
pub const FLOW_END_DELTA_MICROSECONDS: ElementKey = ElementKey::iana(159);
pub const SYSTEM_INIT_TIME_MILLISECONDS: ElementKey = ElementKey::iana(160);
pub const FLOW_DURATION_MILLISECONDS: ElementKey = ElementKey::iana(161);
pub const FLOW_DURATION_MICROSECONDS: ElementKey = ElementKey::iana(162);
pub const COLLECTION_TIME_MILLISECONDS: ElementKey = ElementKey::iana(258);
pub const OBSERVATION_TIME_SECONDS: ElementKey = ElementKey::iana(322);
pub const OBSERVATION_TIME_MILLISECONDS: ElementKey = ElementKey::iana(323);
pub const OBSERVATION_TIME_MICROSECONDS: ElementKey = ElementKey::iana(324);
pub const OBSERVATION_TIME_NANOSECONDS: ElementKey = ElementKey::iana(325);

// ICMP.
pub const ICMP_TYPE_CODE_IPV4: ElementKey = ElementKey::iana(32);
pub const ICMP_TYPE_CODE_IPV6: ElementKey = ElementKey::iana(139);
pub const ICMP_TYPE_IPV4: ElementKey = ElementKey::iana(176);
pub const ICMP_CODE_IPV4: ElementKey = ElementKey::iana(177);
pub const ICMP_TYPE_IPV6: ElementKey = ElementKey::iana(178);
pub const ICMP_CODE_IPV6: ElementKey = ElementKey::iana(179);

// VLAN, end-of-flow metadata, lists.
pub const VLAN_ID: ElementKey = ElementKey::iana(58);
pub const POST_VLAN_ID: ElementKey = ElementKey::iana(59);
pub const FLOW_END_REASON: ElementKey = ElementKey::iana(136);
pub const PADDING_OCTETS: ElementKey = ElementKey::iana(210);
pub const SUB_TEMPLATE_LIST: ElementKey = ElementKey::iana(292);
pub const SUB_TEMPLATE_MULTI_LIST: ElementKey = ElementKey::iana(293);
pub const EXPORTING_PROCESS_ID: ElementKey = ElementKey::iana(144);

// Firewall events. Cisco ASA exporters use the raw NetFlow field number
// 233 (colliding with the IANA assignment) and the high private field
// 33002 for the extended event; IPFIX exporters scope both under the
// Cisco enterprise number.
pub const FIREWALL_EVENT: ElementKey = ElementKey::iana(233);
pub const NF_F_FW_EVENT: ElementKey = ElementKey::new(CISCO_PEN, 233);
pub const NF_F_FW_EXT_EVENT: ElementKey = ElementKey::new(CISCO_PEN, 33002);
pub const NF_F_FW_EXT_EVENT_V9: ElementKey = ElementKey::iana(33002);

// Sampling options, both spellings.
pub const SAMPLING_INTERVAL: ElementKey = ElementKey::iana(34);
pub const SAMPLING_ALGORITHM: ElementKey = ElementKey::iana(35);
pub const SAMPLER_ID: ElementKey = ElementKey::iana(48);
pub const SAMPLER_MODE: ElementKey = ElementKey::iana(49);
pub const SAMPLER_RANDOM_INTERVAL: ElementKey = ElementKey::iana(50);

// Statistics options (IANA side).
pub const EXPORTED_FLOW_RECORD_TOTAL_COUNT: ElementKey = ElementKey::iana(42);
pub const EXPORTER_IPV4_ADDRESS: ElementKey = ElementKey::iana(130);
pub const DROPPED_PACKET_TOTAL_COUNT: ElementKey = ElementKey::iana(135);
pub const IGNORED_PACKET_TOTAL_COUNT: ElementKey = ElementKey::iana(164);
pub const NOT_SENT_FLOW_TOTAL_COUNT: ElementKey = ElementKey::iana(167);

// RFC 5103 reverse-direction mirrors.
pub const REVERSE_OCTET_DELTA_COUNT: ElementKey = ElementKey::reverse(1);
pub const REVERSE_PACKET_DELTA_COUNT: ElementKey = ElementKey::reverse(2);
pub const REVERSE_TCP_CONTROL_BITS: ElementKey = ElementKey::reverse(6);
pub const REVERSE_VLAN_ID: ElementKey = ElementKey::reverse(58);
pub const REVERSE_POST_VLAN_ID: ElementKey = ElementKey::reverse(59);
pub const REVERSE_OCTET_TOTAL_COUNT: ElementKey = ElementKey::reverse(85);
pub const REVERSE_PACKET_TOTAL_COUNT: ElementKey = ElementKey::reverse(86);

// CERT/YAF elements. The reverse CERT elements carry the 0x4000 bit.
pub const INITIAL_TCP_FLAGS: ElementKey = ElementKey::cert(14);
pub const UNION_TCP_FLAGS: ElementKey = ElementKey::cert(15);
pub const REVERSE_INITIAL_TCP_FLAGS: ElementKey = ElementKey::cert(14 | 0x4000);
pub const REVERSE_UNION_TCP_FLAGS: ElementKey = ElementKey::cert(15 | 0x4000);
pub const REVERSE_FLOW_DELTA_MILLISECONDS: ElementKey = ElementKey::cert(21);
pub const SILK_TCP_STATE: ElementKey = ElementKey::cert(32);
pub const SILK_APP_LABEL: ElementKey = ElementKey::cert(33);
pub const FLOW_ATTRIBUTES: ElementKey = ElementKey::cert(40);
pub const REVERSE_FLOW_ATTRIBUTES: ElementKey = ElementKey::cert(40 | 0x4000);
pub const EXPIRED_FRAGMENT_COUNT: ElementKey = ElementKey::cert(100);
pub const ASSEMBLED_FRAGMENT_COUNT: ElementKey = ElementKey::cert(101);
pub const MEAN_FLOW_RATE: ElementKey = ElementKey::cert(102);
pub const MEAN_PACKET_RATE: ElementKey = ElementKey::cert(103);
pub const FLOW_TABLE_FLUSH_EVENT_COUNT: ElementKey = ElementKey::cert(104);
pub const FLOW_TABLE_PEAK_COUNT: ElementKey = ElementKey::cert(105);
pub const TOMBSTONE_ID: ElementKey = ElementKey::cert(550);
pub const CERT_TOOL_ID: ElementKey = ElementKey::cert(551);
pub const TOMBSTONE_ACCESS_LIST: ElementKey = ElementKey::cert(554);
