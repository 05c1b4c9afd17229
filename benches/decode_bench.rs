use criterion::{Criterion, criterion_group, criterion_main};
use flow_ingest::{ProbeConfig, Session, Template, TemplateField};
use std::hint::black_box;

fn session_with_template() -> Session {
    let session = Session::builder()
        .with_probe(ProbeConfig::new("bench"))
        .build()
        .unwrap();
    let template = Template::new(
        0x100,
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
        ],
    );
    session.observe_template(1, template);
    session
}

fn biflow_payload() -> Vec<u8> {
    let mut p = Vec::new();
    p.extend(0x0A010101u32.to_be_bytes());
    p.extend(0x0A020202u32.to_be_bytes());
    p.extend(40000u16.to_be_bytes());
    p.extend(443u16.to_be_bytes());
    p.push(6);
    p.extend(10u64.to_be_bytes());
    p.extend(600u64.to_be_bytes());
    p.extend(8u64.to_be_bytes());
    p.extend(500u64.to_be_bytes());
    p.extend(1_700_000_000_000u64.to_be_bytes());
    p.extend(1_700_000_000_500u64.to_be_bytes());
    p.extend(50u32.to_be_bytes());
    p
}

fn criterion_benchmark(c: &mut Criterion) {
    let session = session_with_template();
    let payload = biflow_payload();
    c.bench_function("decode yaf biflow", |b| {
        b.iter(|| {
            session
                .decode_record(1, 0x100, black_box(&payload), 1_700_000_001_000)
                .unwrap()
        })
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
