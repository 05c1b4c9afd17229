//! Normalized flow record.
//!
//! Every decoder path projects onto this fixed shape. Address family is
//! carried by [`std::net::IpAddr`]; counters saturate rather than wrap so
//! a jumbo flow never aliases a small one.

use serde::Serialize;

use std::net::{IpAddr, Ipv4Addr};

pub const PROTO_ICMP: u8 = 1;
pub const PROTO_TCP: u8 = 6;
pub const PROTO_ICMP6: u8 = 58;

/// Bits of [`FlowRecord::tcp_state`].
pub mod tcp_state {
    /// Initial flags and session flags are individually known.
    pub const EXPANDED: u8 = 0x01;
    /// The flow was closed by the exporter's active timeout.
    pub const TIMEOUT_KILLED: u8 = 0x04;
    /// The flow is a continuation of an earlier timed-out flow.
    pub const TIMEOUT_STARTED: u8 = 0x08;
    /// All packets of the flow were the same size.
    pub const UNIFORM_PACKET_SIZE: u8 = 0x10;
}

/// One direction of a flow, normalized for the downstream store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlowRecord {
    pub src_addr: IpAddr,
    pub dst_addr: IpAddr,
    pub next_hop: IpAddr,
    /// Zero for ICMP.
    pub src_port: u16,
    /// `(type << 8) | code` for ICMP.
    pub dst_port: u16,
    pub proto: u8,
    /// Union of all TCP flags seen on the flow.
    pub flags_all: u8,
    /// Flags of the first packet, valid when EXPANDED is set.
    pub flags_initial: u8,
    /// Flags of the remaining packets, valid when EXPANDED is set.
    pub flags_session: u8,
    pub packets: u32,
    pub bytes: u32,
    /// Ingress interface or VLAN, per the probe's interface kind.
    pub input: u16,
    /// Egress interface or post VLAN.
    pub output: u16,
    /// Milliseconds since the Unix epoch.
    pub start_ms: u64,
    pub duration_ms: u32,
    /// Filled by the downstream store's packing rules; decoders leave
    /// both at zero.
    pub flow_type: u8,
    pub sensor: u16,
    pub application: u16,
    pub tcp_state: u8,
    /// Carries the firewall extended event code when non-zero.
    pub memo: u16,
}

impl FlowRecord {
    pub fn end_ms(&self) -> u64 {
        self.start_ms + u64::from(self.duration_ms)
    }

    pub fn is_ipv6(&self) -> bool {
        self.src_addr.is_ipv6()
    }

    /// Swaps the endpoint-specific fields, turning the record into its
    /// opposite direction. ICMP ports are direction-independent and are
    /// left alone.
    pub fn reverse_endpoints(&mut self) {
        std::mem::swap(&mut self.src_addr, &mut self.dst_addr);
        if self.proto != PROTO_ICMP && self.proto != PROTO_ICMP6 {
            std::mem::swap(&mut self.src_port, &mut self.dst_port);
        }
        std::mem::swap(&mut self.input, &mut self.output);
    }
}

impl Default for FlowRecord {
    fn default() -> Self {
        let zero = IpAddr::V4(Ipv4Addr::UNSPECIFIED);
        Self {
            src_addr: zero,
            dst_addr: zero,
            next_hop: zero,
            src_port: 0,
            dst_port: 0,
            proto: 0,
            flags_all: 0,
            flags_initial: 0,
            flags_session: 0,
            packets: 0,
            bytes: 0,
            input: 0,
            output: 0,
            start_ms: 0,
            duration_ms: 0,
            flow_type: 0,
            sensor: 0,
            application: 0,
            tcp_state: 0,
            memo: 0,
        }
    }
}

/// Saturates a 64-bit counter into the record's 32-bit field.
pub fn sat32(v: u64) -> u32 {
    v.min(u64::from(u32::MAX)) as u32
}

/// Saturates an interface or VLAN value into 16 bits.
pub fn sat16(v: u32) -> u16 {
    v.min(u32::from(u16::MAX)) as u16
}
