//! End-to-end decode scenarios: one exporter template, one record,
//! asserted output records.

use flow_ingest::{
    IgnoreReason, ProbeConfig, Quirks, RecordOutcome, Session, Template, TemplateField,
};

const SYN: u8 = 0x02;
const FIN: u8 = 0x01;
const ACK: u8 = 0x10;

/// Record payload builder matching a template's field order.
#[derive(Default)]
struct Payload(Vec<u8>);

impl Payload {
    fn u8(mut self, v: u8) -> Self {
        self.0.push(v);
        self
    }
    fn u16(mut self, v: u16) -> Self {
        self.0.extend(v.to_be_bytes());
        self
    }
    fn u32(mut self, v: u32) -> Self {
        self.0.extend(v.to_be_bytes());
        self
    }
    fn u64(mut self, v: u64) -> Self {
        self.0.extend(v.to_be_bytes());
        self
    }
    fn bytes(&self) -> &[u8] {
        &self.0
    }
}

fn session() -> Session {
    Session::builder()
        .with_probe(ProbeConfig::new("scenario"))
        .build()
        .unwrap()
}

fn session_with_quirks(quirks: Quirks) -> Session {
    Session::builder()
        .with_probe(ProbeConfig::new("scenario").with_quirks(quirks))
        .build()
        .unwrap()
}

#[test]
fn yaf_ipv4_biflow_delta() {
    let s = session();
    let template = Template::new(
        0x100,
        vec![
            TemplateField::new(0, 8, 4),      // sourceIPv4Address
            TemplateField::new(0, 12, 4),     // destinationIPv4Address
            TemplateField::new(0, 7, 2),      // sourceTransportPort
            TemplateField::new(0, 11, 2),     // destinationTransportPort
            TemplateField::new(0, 4, 1),      // protocolIdentifier
            TemplateField::new(0, 2, 8),      // packetDeltaCount
            TemplateField::new(0, 1, 8),      // octetDeltaCount
            TemplateField::new(29305, 2, 8),  // reversePacketDeltaCount
            TemplateField::new(29305, 1, 8),  // reverseOctetDeltaCount
            TemplateField::new(0, 152, 8),    // flowStartMilliseconds
            TemplateField::new(0, 153, 8),    // flowEndMilliseconds
            TemplateField::new(6871, 21, 4),  // reverseFlowDeltaMilliseconds
            TemplateField::new(6871, 14, 1),  // initialTCPFlags
            TemplateField::new(6871, 15, 1),  // unionTCPFlags
        ],
    );
    s.observe_template(1, template);

    let payload = Payload::default()
        .u32(0x0A010101)
        .u32(0x0A020202)
        .u16(40000)
        .u16(443)
        .u8(6)
        .u64(10)
        .u64(600)
        .u64(8)
        .u64(500)
        .u64(1_700_000_000_000)
        .u64(1_700_000_000_500)
        .u32(50)
        .u8(SYN)
        .u8(ACK | FIN);

    let outcome = s.decode_record(1, 0x100, payload.bytes(), 0).unwrap();
    let RecordOutcome::Flows { forward, reverse } = outcome else {
        panic!("expected flows, got {:?}", outcome);
    };
    let reverse = reverse.expect("expected a reverse record");

    assert_eq!(forward.packets, 10);
    assert_eq!(forward.bytes, 600);
    assert_eq!(forward.start_ms, 1_700_000_000_000);
    assert_eq!(forward.duration_ms, 500);
    assert_eq!(forward.flags_all, SYN | ACK | FIN);
    assert_eq!(forward.flags_initial, SYN);
    assert_eq!(forward.src_addr.to_string(), "10.1.1.1");
    assert_eq!(forward.dst_port, 443);

    assert_eq!(reverse.packets, 8);
    assert_eq!(reverse.bytes, 500);
    assert_eq!(reverse.start_ms, 1_700_000_000_050);
    assert_eq!(reverse.duration_ms, 450);
    assert_eq!(reverse.src_addr.to_string(), "10.2.2.2");
    assert_eq!(reverse.dst_addr.to_string(), "10.1.1.1");
    assert_eq!(reverse.src_port, 443);
    assert_eq!(reverse.dst_port, 40000);

    let stats = s.stats(1);
    assert_eq!(stats.forward_flows, 1);
    assert_eq!(stats.reverse_flows, 1);
}

fn nf9_sysup_template(id: u16) -> Template {
    Template::new(
        id,
        vec![
            TemplateField::new(0, 8, 4),
            TemplateField::new(0, 12, 4),
            TemplateField::new(0, 7, 2),
            TemplateField::new(0, 11, 2),
            TemplateField::new(0, 4, 1),
            TemplateField::new(0, 22, 4),  // flowStartSysUpTime
            TemplateField::new(0, 21, 4),  // flowEndSysUpTime
            TemplateField::new(0, 160, 8), // systemInitTimeMilliseconds
            TemplateField::new(0, 2, 4),   // packetDeltaCount
            TemplateField::new(0, 1, 4),   // octetDeltaCount
        ],
    )
}

#[test]
fn nf9_sysuptime_rollover() {
    let s = session();
    s.observe_template(1, nf9_sysup_template(0x101));

    let payload = Payload::default()
        .u32(0x0A000001)
        .u32(0x0A000002)
        .u16(1234)
        .u16(53)
        .u8(17)
        .u32(4_294_967_290) // flowStartSysUpTime, about to roll over
        .u32(5)             // flowEndSysUpTime, already rolled
        .u64(1_000)
        .u32(1)
        .u32(64);

    let outcome = s.decode_record(1, 0x101, payload.bytes(), 5_000).unwrap();
    let RecordOutcome::Flows { forward, reverse } = outcome else {
        panic!("expected a flow, got {:?}", outcome);
    };
    assert!(reverse.is_none());
    // End rolled over: duration is the 11 ms spanning the wrap, and
    // the start anchors just before the boot-time reference.
    assert_eq!(forward.duration_ms, 11);
    assert_eq!(forward.start_ms, 994);
}

#[test]
fn generic_firewall_denied() {
    let s = session_with_quirks(Quirks::FW_EVENT);
    let template = Template::new(
        0x102,
        vec![
            TemplateField::new(0, 8, 4),
            TemplateField::new(0, 12, 4),
            TemplateField::new(0, 4, 1),
            TemplateField::new(0, 2, 4),
            TemplateField::new(0, 1, 4),
            TemplateField::new(0, 233, 1),     // firewallEvent
            TemplateField::new(0, 33002, 2),   // NF_F_FW_EXT_EVENT
        ],
    );
    s.observe_template(1, template);

    let payload = Payload::default()
        .u32(0x0A010101)
        .u32(0x0A020202)
        .u8(6)
        .u32(0)
        .u32(0)
        .u8(3) // denied
        .u16(1002);

    let outcome = s.decode_record(1, 0x102, payload.bytes(), 0).unwrap();
    let RecordOutcome::Flows { forward, reverse } = outcome else {
        panic!("expected a flow, got {:?}", outcome);
    };
    assert!(reverse.is_none());
    assert_eq!(forward.packets, 1);
    assert_eq!(forward.bytes, 1);
    assert_eq!(forward.memo, 1002);
}

#[test]
fn icmp_combined_type_code() {
    let s = session();
    let template = Template::new(
        0x103,
        vec![
            TemplateField::new(0, 8, 4),
            TemplateField::new(0, 12, 4),
            TemplateField::new(0, 7, 2),
            TemplateField::new(0, 11, 2),
            TemplateField::new(0, 4, 1),
            TemplateField::new(0, 32, 2), // icmpTypeCodeIPv4
            TemplateField::new(0, 2, 4),
            TemplateField::new(0, 1, 4),
        ],
    );
    s.observe_template(1, template);

    let payload = Payload::default()
        .u32(0x0A010101)
        .u32(0x0A020202)
        .u16(0)
        .u16(0)
        .u8(1)
        .u16(0x0800) // echo request
        .u32(1)
        .u32(84);

    let outcome = s.decode_record(1, 0x103, payload.bytes(), 0).unwrap();
    let RecordOutcome::Flows { forward, .. } = outcome else {
        panic!("expected a flow, got {:?}", outcome);
    };
    assert_eq!(forward.src_port, 0);
    assert_eq!(forward.dst_port, 0x0800);
}

#[test]
fn yaf_intermediate_uniflow_is_ignored() {
    let s = session();
    let template = Template::new(
        0x104,
        vec![
            TemplateField::new(0, 8, 4),
            TemplateField::new(0, 12, 4),
            TemplateField::new(0, 4, 1),
            TemplateField::new(0, 2, 8),
            TemplateField::new(0, 1, 8),
            TemplateField::new(0, 152, 8),
            TemplateField::new(0, 153, 8),
            TemplateField::new(0, 136, 1), // flowEndReason
        ],
    );
    s.observe_template(1, template);

    let payload = Payload::default()
        .u32(0x0A010101)
        .u32(0x0A020202)
        .u8(6)
        .u64(2)
        .u64(120)
        .u64(1_700_000_000_000)
        .u64(1_700_000_000_100)
        .u8(0x1F);

    let outcome = s.decode_record(1, 0x104, payload.bytes(), 0).unwrap();
    assert_eq!(
        outcome,
        RecordOutcome::Ignored(IgnoreReason::IntermediateUniflow)
    );
    assert_eq!(s.stats(1).ignored_flows, 1);
    assert_eq!(s.stats(1).forward_flows, 0);
}

#[test]
fn zero_volume_reverse_only_generic() {
    let s = session();
    let template = Template::new(
        0x105,
        vec![
            TemplateField::new(0, 8, 4),
            TemplateField::new(0, 12, 4),
            TemplateField::new(0, 7, 2),
            TemplateField::new(0, 11, 2),
            TemplateField::new(0, 4, 1),
            TemplateField::new(0, 2, 4),
            TemplateField::new(0, 1, 4),
            TemplateField::new(29305, 2, 4), // reversePacketDeltaCount
            TemplateField::new(29305, 1, 4), // reverseOctetDeltaCount
        ],
    );
    s.observe_template(1, template);

    let payload = Payload::default()
        .u32(0x0A010101)
        .u32(0x0A020202)
        .u16(1234)
        .u16(80)
        .u8(6)
        .u32(0)
        .u32(0)
        .u32(5)
        .u32(300);

    let outcome = s.decode_record(1, 0x105, payload.bytes(), 0).unwrap();
    let RecordOutcome::Flows { forward, reverse } = outcome else {
        panic!("expected a flow, got {:?}", outcome);
    };
    assert!(reverse.is_none());
    assert_eq!(forward.packets, 5);
    assert_eq!(forward.bytes, 300);
    assert_eq!(forward.src_addr.to_string(), "10.2.2.2");
    assert_eq!(forward.src_port, 80);
    assert_eq!(forward.dst_port, 1234);
}

#[test]
fn volume_and_interface_saturation() {
    let s = session();
    let template = Template::new(
        0x106,
        vec![
            TemplateField::new(0, 8, 4),
            TemplateField::new(0, 12, 4),
            TemplateField::new(0, 4, 1),
            TemplateField::new(0, 10, 4), // ingressInterface
            TemplateField::new(0, 14, 4), // egressInterface
            TemplateField::new(0, 2, 8),
            TemplateField::new(0, 1, 8),
            TemplateField::new(0, 323, 8), // observationTimeMilliseconds
        ],
    );
    s.observe_template(1, template);

    let payload = Payload::default()
        .u32(0x0A010101)
        .u32(0x0A020202)
        .u8(6)
        .u32(0x0001_2345)
        .u32(7)
        .u64(u64::from(u32::MAX) + 10)
        .u64(u64::from(u32::MAX) + 999)
        .u64(1_700_000_000_000);

    let outcome = s.decode_record(1, 0x106, payload.bytes(), 0).unwrap();
    let RecordOutcome::Flows { forward, .. } = outcome else {
        panic!("expected a flow, got {:?}", outcome);
    };
    assert_eq!(forward.packets, u32::MAX);
    assert_eq!(forward.bytes, u32::MAX);
    assert_eq!(forward.input, u16::MAX);
    assert_eq!(forward.output, 7);
}

#[test]
fn nf9_single_packet_end_clamp_under_secs_quirk() {
    let s = session_with_quirks(Quirks::NF9_SYSUPTIME_SECS);
    s.observe_template(1, nf9_sysup_template(0x107));

    let payload = Payload::default()
        .u32(0x0A000001)
        .u32(0x0A000002)
        .u16(1234)
        .u16(53)
        .u8(17)
        .u32(10_000)
        .u32(9_990) // end just before start
        .u64(0)
        .u32(1)
        .u32(64);

    let outcome = s.decode_record(1, 0x107, payload.bytes(), 20_000).unwrap();
    let RecordOutcome::Flows { forward, .. } = outcome else {
        panic!("expected a flow, got {:?}", outcome);
    };
    assert_eq!(forward.duration_ms, 0);
}

#[test]
fn yaf_stml_biflow_recovers_tcp_flags() {
    let s = session();

    // The flags sub-record template arrives first and is mapped for
    // the list decoder.
    let flags_template = Template::new(
        0x1234,
        vec![
            TemplateField::new(6871, 14, 1),          // initialTCPFlags
            TemplateField::new(6871, 15, 1),          // unionTCPFlags
            TemplateField::new(6871, 14 | 0x4000, 1), // reverseInitialTCPFlags
            TemplateField::new(6871, 15 | 0x4000, 1), // reverseUnionTCPFlags
        ],
    );
    s.observe_template(1, flags_template);

    let flow_template = Template::new(
        0x109,
        vec![
            TemplateField::new(0, 8, 4),
            TemplateField::new(0, 12, 4),
            TemplateField::new(0, 7, 2),
            TemplateField::new(0, 11, 2),
            TemplateField::new(0, 4, 1),
            TemplateField::new(0, 2, 8),
            TemplateField::new(0, 1, 8),
            TemplateField::new(29305, 2, 8),
            TemplateField::new(29305, 1, 8),
            TemplateField::new(0, 152, 8),
            TemplateField::new(0, 153, 8),
            TemplateField::new(6871, 21, 4),
            TemplateField::new(0, 293, 0xFFFF), // subTemplateMultiList
        ],
    );
    s.observe_template(1, flow_template);

    let mut payload = Payload::default()
        .u32(0x0A010101)
        .u32(0x0A020202)
        .u16(40000)
        .u16(443)
        .u8(6)
        .u64(10)
        .u64(600)
        .u64(8)
        .u64(500)
        .u64(1_700_000_000_000)
        .u64(1_700_000_000_500)
        .u32(50)
        .0;
    // Variable-length list: semantic, sub-template id, entry length
    // (4 header bytes + 4 record bytes), then the flag record.
    let list = [0xFFu8, 0x12, 0x34, 0x00, 0x08, SYN, ACK, SYN | ACK, ACK];
    payload.push(list.len() as u8);
    payload.extend(list);

    let outcome = s.decode_record(1, 0x109, &payload, 0).unwrap();
    let RecordOutcome::Flows { forward, reverse } = outcome else {
        panic!("expected flows, got {:?}", outcome);
    };
    let reverse = reverse.expect("expected a reverse record");
    assert_eq!(forward.flags_initial, SYN);
    assert_eq!(forward.flags_session, ACK);
    assert_eq!(forward.flags_all, SYN | ACK);
    assert_eq!(reverse.flags_initial, SYN | ACK);
    assert_eq!(reverse.flags_session, ACK);
}

#[test]
fn ipv6_flow_via_generic() {
    let s = session();
    let template = Template::new(
        0x108,
        vec![
            TemplateField::new(0, 27, 16), // sourceIPv6Address
            TemplateField::new(0, 28, 16), // destinationIPv6Address
            TemplateField::new(0, 7, 2),
            TemplateField::new(0, 11, 2),
            TemplateField::new(0, 4, 1),
            TemplateField::new(0, 2, 4),
            TemplateField::new(0, 1, 4),
            TemplateField::new(0, 150, 4), // flowStartSeconds
            TemplateField::new(0, 151, 4), // flowEndSeconds
        ],
    );
    s.observe_template(1, template);

    let mut p = Vec::new();
    p.extend(0x2001_0db8_0000_0000_0000_0000_0000_0001u128.to_be_bytes());
    p.extend(0x2001_0db8_0000_0000_0000_0000_0000_0002u128.to_be_bytes());
    p.extend(40000u16.to_be_bytes());
    p.extend(443u16.to_be_bytes());
    p.push(6);
    p.extend(4u32.to_be_bytes());
    p.extend(400u32.to_be_bytes());
    p.extend(1_700_000_000u32.to_be_bytes());
    p.extend(1_700_000_003u32.to_be_bytes());

    let outcome = s.decode_record(1, 0x108, &p, 0).unwrap();
    let RecordOutcome::Flows { forward, .. } = outcome else {
        panic!("expected a flow, got {:?}", outcome);
    };
    assert!(forward.is_ipv6());
    assert_eq!(forward.src_addr.to_string(), "2001:db8::1");
    assert_eq!(forward.start_ms, 1_700_000_000_000);
    assert_eq!(forward.duration_ms, 3_000);
}
