#[cfg(test)]
mod base_tests {

    use crate::classify::DecodePlan;
    use crate::session::RecordOutcome;
    use crate::template::{Template, TemplateField};
    use crate::{ProbeConfig, Session};

    fn session() -> Session {
        Session::builder()
            .with_probe(ProbeConfig::new("base"))
            .build()
            .unwrap()
    }

    fn yaf_uniflow_template(id: u16) -> Template {
        Template::new(
            id,
            vec![
                TemplateField::new(0, 8, 4),
                TemplateField::new(0, 12, 4),
                TemplateField::new(0, 7, 2),
                TemplateField::new(0, 11, 2),
                TemplateField::new(0, 4, 1),
                TemplateField::new(0, 2, 8),
                TemplateField::new(0, 1, 8),
                TemplateField::new(0, 152, 8),
                TemplateField::new(0, 153, 8),
            ],
        )
    }

    #[test]
    fn it_decodes_a_yaf_uniflow_from_hex() {
        let s = session();
        let plan = s.observe_template(7, yaf_uniflow_template(0x100));
        assert!(matches!(plan, DecodePlan::Yafrec { .. }));

        // 192.168.0.1:40000 -> 192.168.0.2:443 udp, 3 packets, 384
        // bytes, 250 ms starting at 1_700_000_000_000.
        let hex = "c0a80001c0a80002\
                   9c4001bb11\
                   0000000000000003\
                   0000000000000180\
                   0000018bcfe56800\
                   0000018bcfe568fa";
        let payload = hex::decode(hex).unwrap();
        let outcome = s.decode_record(7, 0x100, &payload, 0).unwrap();
        let RecordOutcome::Flows { forward, reverse } = outcome else {
            panic!("expected a flow, got {:?}", outcome);
        };
        assert!(reverse.is_none());
        assert_eq!(forward.src_addr.to_string(), "192.168.0.1");
        assert_eq!(forward.dst_addr.to_string(), "192.168.0.2");
        assert_eq!(forward.src_port, 40000);
        assert_eq!(forward.dst_port, 443);
        assert_eq!(forward.packets, 3);
        assert_eq!(forward.bytes, 384);
        assert_eq!(forward.start_ms, 1_700_000_000_000);
        assert_eq!(forward.duration_ms, 250);
    }

    #[test]
    fn record_serializes_to_json() {
        let s = session();
        s.observe_template(7, yaf_uniflow_template(0x100));
        let hex = "c0a80001c0a80002\
                   9c4001bb11\
                   0000000000000003\
                   0000000000000180\
                   0000018bcfe56800\
                   0000018bcfe568fa";
        let payload = hex::decode(hex).unwrap();
        let RecordOutcome::Flows { forward, .. } =
            s.decode_record(7, 0x100, &payload, 0).unwrap()
        else {
            panic!("expected a flow");
        };
        let json = serde_json::to_value(&forward).unwrap();
        assert_eq!(json["packets"], 3);
        assert_eq!(json["src_addr"], "192.168.0.1");
    }

    #[test]
    fn decoding_survives_a_truncated_record() {
        let s = session();
        s.observe_template(7, yaf_uniflow_template(0x100));
        let err = s.decode_record(7, 0x100, &[0xC0, 0xA8], 0).unwrap_err();
        assert!(matches!(err, crate::IngestError::Malformed { .. }));

        // The template store is untouched; the next record decodes.
        let hex = "c0a80001c0a80002\
                   9c4001bb11\
                   0000000000000003\
                   0000000000000180\
                   0000018bcfe56800\
                   0000018bcfe568fa";
        let payload = hex::decode(hex).unwrap();
        assert!(matches!(
            s.decode_record(7, 0x100, &payload, 0).unwrap(),
            RecordOutcome::Flows { .. }
        ));
    }
}
