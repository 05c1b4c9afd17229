#![no_main]

use flow_ingest::{Session, Template, TemplateField};
use libfuzzer_sys::fuzz_target;

// First bytes define a template (element id and length pairs), the
// rest is decoded against it. Decoding must never panic, whatever the
// template shape or payload.
fuzz_target!(|data: &[u8]| {
    if data.len() < 4 {
        return;
    }
    let field_count = usize::from(data[0] % 16) + 1;
    let mut fields = Vec::with_capacity(field_count);
    let mut rest = &data[1..];
    for _ in 0..field_count {
        let [a, b, c, ..] = *rest else { break };
        let id = u16::from_be_bytes([a, b]);
        let length = u16::from(c % 17).max(1);
        fields.push(TemplateField::new(0, id, length));
        rest = &rest[3..];
    }
    if fields.is_empty() {
        return;
    }

    let session = Session::builder().build().unwrap();
    session.observe_template(0, Template::new(256, fields));
    let _ = session.decode_record(0, 256, rest, 1_700_000_000_000);
});
