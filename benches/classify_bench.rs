use criterion::{Criterion, criterion_group, criterion_main};
use flow_ingest::classify::classify;
use flow_ingest::registry::TemplateRegistry;
use flow_ingest::{Template, TemplateField};
use std::hint::black_box;

fn yaf_biflow_template() -> Template {
    Template::new(
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
            TemplateField::new(6871, 14, 1),
            TemplateField::new(6871, 15, 1),
        ],
    )
}

fn criterion_benchmark(c: &mut Criterion) {
    let registry = TemplateRegistry::standard().unwrap();
    let template = yaf_biflow_template();
    c.bench_function("classify yaf biflow", |b| {
        b.iter(|| classify(black_box(&template), &registry))
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
