//! Record extraction.
//!
//! Walks a data record's bytes under the guidance of its template and
//! fills the superset layout [`RawFlow`]. All three decoder paths share
//! this walk; they differ only in the policy applied afterwards.
//! Unsigned values use the reduced-length encoding (any 1..=8 byte
//! width), variable-length fields use the RFC 7011 short/long length
//! prefix.

use crate::IngestError;
use crate::elements;
use crate::template::Template;

use nom::IResult;
use nom::bytes::complete::take;
use nom::error::{Error as NomError, ErrorKind};
use nom::number::complete::{be_u8, be_u16, be_u128};
use nom::Err as NomErr;

/// Reads a big-endian unsigned value of 1..=8 bytes.
pub fn read_unsigned(i: &[u8], length: u16) -> IResult<&[u8], u64> {
    if !(1..=8).contains(&length) {
        return Err(NomErr::Error(NomError::new(i, ErrorKind::LengthValue)));
    }
    let (rest, raw) = take(length)(i)?;
    Ok((rest, raw.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b))))
}

/// Reads an RFC 7011 variable-length field body.
pub fn read_varlen(i: &[u8]) -> IResult<&[u8], &[u8]> {
    let (i, short) = be_u8(i)?;
    let (i, length) = if short == 255 {
        let (i, long) = be_u16(i)?;
        (i, long)
    } else {
        (i, u16::from(short))
    };
    take(length)(i)
}

/// The superset record layout. Absent elements stay zero; the template
/// bitmap tells the decoders which zeros are meaningful.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawFlow {
    pub src4: u32,
    pub dst4: u32,
    pub nh4: u32,
    pub src6: u128,
    pub dst6: u128,
    pub nh6: u128,
    pub src_port: u16,
    pub dst_port: u16,
    pub proto: u8,

    pub tcp_flags: u8,
    pub initial_flags: u8,
    pub union_flags: u8,
    pub rev_initial_flags: u8,
    pub rev_union_flags: u8,
    pub rev_tcp_flags: u8,

    pub octets_delta: u64,
    pub pkts_delta: u64,
    pub octets_total: u64,
    pub pkts_total: u64,
    pub init_octets: u64,
    pub init_pkts: u64,
    pub resp_octets: u64,
    pub resp_pkts: u64,
    pub post_octets_delta: u64,
    pub post_pkts_delta: u64,
    pub post_octets_total: u64,
    pub post_pkts_total: u64,
    pub rev_octets_delta: u64,
    pub rev_pkts_delta: u64,
    pub rev_octets_total: u64,
    pub rev_pkts_total: u64,

    pub start_milli: u64,
    pub end_milli: u64,
    pub start_sec: u64,
    pub end_sec: u64,
    pub start_micro: u64,
    pub end_micro: u64,
    pub start_nano: u64,
    pub end_nano: u64,
    pub start_delta_micro: u64,
    pub end_delta_micro: u64,
    pub dur_milli: u32,
    pub dur_micro: u32,
    pub sysup_start: u32,
    pub sysup_end: u32,
    pub sys_init_milli: u64,
    pub obs_sec: u64,
    pub obs_milli: u64,
    pub obs_micro: u64,
    pub obs_nano: u64,
    pub coll_milli: u64,

    pub icmp_typecode4: u16,
    pub icmp_typecode6: u16,
    pub icmp_type4: u8,
    pub icmp_code4: u8,
    pub icmp_type6: u8,
    pub icmp_code6: u8,

    pub ingress: u32,
    pub egress: u32,
    pub vlan: u16,
    pub post_vlan: u16,
    pub rev_vlan: u16,
    pub rev_post_vlan: u16,

    pub end_reason: u8,
    pub flow_attributes: u16,
    pub silk_tcp_state: u8,
    pub app_label: u16,
    pub rev_delta_milli: u32,
    pub fw_event: u8,
    pub fw_ext_event: u16,
    pub cert_tool_id: u32,

    /// Raw bytes of a subTemplateMultiList value, interpreted by the
    /// decoders against the session's inner-template mappings.
    pub stml_raw: Option<Vec<u8>>,
}

impl RawFlow {
    /// Extracts one record. Consumes exactly the template's footprint
    /// from `payload` and returns the remainder, so fixed-size records
    /// can be packed back to back in one data set.
    pub fn extract<'a>(
        template: &Template,
        payload: &'a [u8],
    ) -> Result<(RawFlow, &'a [u8]), IngestError> {
        let mut raw = RawFlow::default();
        let mut rest = payload;
        for field in &template.fields {
            let (next_rest, _) = raw
                .take_field(field.key, field.length, field.is_varlen(), rest)
                .map_err(|_| IngestError::Malformed {
                    template_id: template.id,
                    needed: field.length as usize,
                    available: rest.len(),
                })?;
            rest = next_rest;
        }
        Ok((raw, rest))
    }

    fn take_field<'a>(
        &mut self,
        key: crate::elements::ElementKey,
        length: u16,
        varlen: bool,
        i: &'a [u8],
    ) -> IResult<&'a [u8], ()> {
        if varlen {
            let (rest, body) = read_varlen(i)?;
            if key == elements::SUB_TEMPLATE_MULTI_LIST
                || key == elements::TOMBSTONE_ACCESS_LIST
            {
                self.stml_raw = Some(body.to_vec());
            }
            return Ok((rest, ()));
        }

        // Address elements are the only 16-byte values.
        if length == 16 {
            let (rest, v) = be_u128(i)?;
            match key {
                elements::SOURCE_IPV6_ADDRESS => self.src6 = v,
                elements::DESTINATION_IPV6_ADDRESS => self.dst6 = v,
                elements::IP_NEXT_HOP_IPV6 => self.nh6 = v,
                _ => {}
            }
            return Ok((rest, ()));
        }

        // Strings, MAC addresses and other odd widths are skipped by
        // length; nothing in the flow layout wants them.
        if !(1..=8).contains(&length) {
            let (rest, _) = take(length)(i)?;
            return Ok((rest, ()));
        }

        let (rest, v) = read_unsigned(i, length)?;
        match key {
            elements::SOURCE_IPV4_ADDRESS => self.src4 = v as u32,
            elements::DESTINATION_IPV4_ADDRESS => self.dst4 = v as u32,
            elements::IP_NEXT_HOP_IPV4 => self.nh4 = v as u32,
            elements::SOURCE_TRANSPORT_PORT => self.src_port = v as u16,
            elements::DESTINATION_TRANSPORT_PORT => self.dst_port = v as u16,
            elements::PROTOCOL_IDENTIFIER => self.proto = v as u8,

            elements::TCP_CONTROL_BITS => self.tcp_flags = v as u8,
            elements::INITIAL_TCP_FLAGS => self.initial_flags = v as u8,
            elements::UNION_TCP_FLAGS => self.union_flags = v as u8,
            elements::REVERSE_INITIAL_TCP_FLAGS => self.rev_initial_flags = v as u8,
            elements::REVERSE_UNION_TCP_FLAGS => self.rev_union_flags = v as u8,
            elements::REVERSE_TCP_CONTROL_BITS => self.rev_tcp_flags = v as u8,

            elements::OCTET_DELTA_COUNT => self.octets_delta = v,
            elements::PACKET_DELTA_COUNT => self.pkts_delta = v,
            elements::OCTET_TOTAL_COUNT => self.octets_total = v,
            elements::PACKET_TOTAL_COUNT => self.pkts_total = v,
            elements::INITIATOR_OCTETS => self.init_octets = v,
            elements::INITIATOR_PACKETS => self.init_pkts = v,
            elements::RESPONDER_OCTETS => self.resp_octets = v,
            elements::RESPONDER_PACKETS => self.resp_pkts = v,
            elements::POST_OCTET_DELTA_COUNT => self.post_octets_delta = v,
            elements::POST_PACKET_DELTA_COUNT => self.post_pkts_delta = v,
            elements::POST_OCTET_TOTAL_COUNT => self.post_octets_total = v,
            elements::POST_PACKET_TOTAL_COUNT => self.post_pkts_total = v,
            elements::REVERSE_OCTET_DELTA_COUNT => self.rev_octets_delta = v,
            elements::REVERSE_PACKET_DELTA_COUNT => self.rev_pkts_delta = v,
            elements::REVERSE_OCTET_TOTAL_COUNT => self.rev_octets_total = v,
            elements::REVERSE_PACKET_TOTAL_COUNT => self.rev_pkts_total = v,

            elements::FLOW_START_MILLISECONDS => self.start_milli = v,
            elements::FLOW_END_MILLISECONDS => self.end_milli = v,
            elements::FLOW_START_SECONDS => self.start_sec = v,
            elements::FLOW_END_SECONDS => self.end_sec = v,
            elements::FLOW_START_MICROSECONDS => self.start_micro = v,
            elements::FLOW_END_MICROSECONDS => self.end_micro = v,
            elements::FLOW_START_NANOSECONDS => self.start_nano = v,
            elements::FLOW_END_NANOSECONDS => self.end_nano = v,
            elements::FLOW_START_DELTA_MICROSECONDS => self.start_delta_micro = v,
            elements::FLOW_END_DELTA_MICROSECONDS => self.end_delta_micro = v,
            elements::FLOW_DURATION_MILLISECONDS => self.dur_milli = v as u32,
            elements::FLOW_DURATION_MICROSECONDS => self.dur_micro = v as u32,
            elements::FLOW_START_SYSUP_TIME => self.sysup_start = v as u32,
            elements::FLOW_END_SYSUP_TIME => self.sysup_end = v as u32,
            elements::SYSTEM_INIT_TIME_MILLISECONDS => self.sys_init_milli = v,
            elements::OBSERVATION_TIME_SECONDS => self.obs_sec = v,
            elements::OBSERVATION_TIME_MILLISECONDS => self.obs_milli = v,
            elements::OBSERVATION_TIME_MICROSECONDS => self.obs_micro = v,
            elements::OBSERVATION_TIME_NANOSECONDS => self.obs_nano = v,
            elements::COLLECTION_TIME_MILLISECONDS => self.coll_milli = v,

            elements::ICMP_TYPE_CODE_IPV4 => self.icmp_typecode4 = v as u16,
            elements::ICMP_TYPE_CODE_IPV6 => self.icmp_typecode6 = v as u16,
            elements::ICMP_TYPE_IPV4 => self.icmp_type4 = v as u8,
            elements::ICMP_CODE_IPV4 => self.icmp_code4 = v as u8,
            elements::ICMP_TYPE_IPV6 => self.icmp_type6 = v as u8,
            elements::ICMP_CODE_IPV6 => self.icmp_code6 = v as u8,

            elements::INGRESS_INTERFACE => self.ingress = v as u32,
            elements::EGRESS_INTERFACE => self.egress = v as u32,
            elements::VLAN_ID => self.vlan = v as u16,
            elements::POST_VLAN_ID => self.post_vlan = v as u16,
            elements::REVERSE_VLAN_ID => self.rev_vlan = v as u16,
            elements::REVERSE_POST_VLAN_ID => self.rev_post_vlan = v as u16,

            elements::FLOW_END_REASON => self.end_reason = v as u8,
            elements::FLOW_ATTRIBUTES => self.flow_attributes = v as u16,
            elements::SILK_TCP_STATE => self.silk_tcp_state = v as u8,
            elements::SILK_APP_LABEL => self.app_label = v as u16,
            elements::REVERSE_FLOW_DELTA_MILLISECONDS => {
                self.rev_delta_milli = v as u32
            }
            elements::FIREWALL_EVENT | elements::NF_F_FW_EVENT => {
                self.fw_event = v as u8
            }
            elements::NF_F_FW_EXT_EVENT | elements::NF_F_FW_EXT_EVENT_V9 => {
                self.fw_ext_event = v as u16
            }
            elements::CERT_TOOL_ID => self.cert_tool_id = v as u32,

            // Padding and anything else the record may carry.
            _ => {}
        }
        Ok((rest, ()))
    }
}
