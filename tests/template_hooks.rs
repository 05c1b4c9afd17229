//! Template event hooks observed through the public builder.

use flow_ingest::{Session, Template, TemplateEvent, TemplateField};

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

fn data_template(id: u16) -> Template {
    Template::new(
        id,
        vec![
            TemplateField::new(0, 8, 4),
            TemplateField::new(0, 12, 4),
            TemplateField::new(0, 2, 4),
            TemplateField::new(0, 1, 4),
            TemplateField::new(0, 323, 8),
        ],
    )
}

#[test]
fn classified_events_carry_the_path() {
    let paths = Arc::new(Mutex::new(Vec::new()));
    let sink = paths.clone();
    let session = Session::builder()
        .on_template_event(move |event| {
            if let TemplateEvent::Classified { path, .. } = event {
                sink.lock().unwrap().push(*path);
            }
        })
        .build()
        .unwrap();

    session.observe_template(1, data_template(0x100));
    let yaf = Template::new(
        0x101,
        vec![
            TemplateField::new(0, 8, 4),
            TemplateField::new(0, 12, 4),
            TemplateField::new(0, 2, 8),
            TemplateField::new(0, 1, 8),
            TemplateField::new(0, 152, 8),
            TemplateField::new(0, 153, 8),
        ],
    );
    session.observe_template(1, yaf);

    let paths = paths.lock().unwrap();
    assert_eq!(paths.as_slice(), ["generic", "yaf"]);
}

#[test]
fn missing_template_event_fires() {
    let count = Arc::new(AtomicUsize::new(0));
    let sink = count.clone();
    let session = Session::builder()
        .on_template_event(move |event| {
            if let TemplateEvent::MissingTemplate { .. } = event {
                sink.fetch_add(1, Ordering::SeqCst);
            }
        })
        .build()
        .unwrap();

    session.decode_record(1, 0x400, &[0u8; 16], 0).unwrap();
    assert_eq!(count.load(Ordering::SeqCst), 1);
    assert_eq!(session.event_totals().missing_templates, 1);
}

#[test]
fn event_totals_accumulate_without_callbacks() {
    let session = Session::builder().build().unwrap();
    session.observe_template(1, data_template(0x100));
    session.observe_template(2, data_template(0x100));
    session.decode_record(3, 0x500, &[0u8; 8], 0).unwrap();

    let totals = session.event_totals();
    assert_eq!(totals.classified, 2);
    assert_eq!(totals.missing_templates, 1);
    assert_eq!(totals.collisions, 0);
}

#[test]
fn collision_and_eviction_events_fire() {
    let collisions = Arc::new(AtomicUsize::new(0));
    let evictions = Arc::new(AtomicUsize::new(0));
    let c = collisions.clone();
    let e = evictions.clone();
    let session = Session::builder()
        .with_template_cache_size(2)
        .on_template_event(move |event| match event {
            TemplateEvent::Collision { .. } => {
                c.fetch_add(1, Ordering::SeqCst);
            }
            TemplateEvent::Evicted { .. } => {
                e.fetch_add(1, Ordering::SeqCst);
            }
            _ => {}
        })
        .build()
        .unwrap();

    session.observe_template(1, data_template(0x100));
    let mut changed = data_template(0x100);
    changed.fields.pop();
    session.observe_template(1, changed);
    assert_eq!(collisions.load(Ordering::SeqCst), 1);

    session.observe_template(1, data_template(0x101));
    session.observe_template(1, data_template(0x102));
    assert_eq!(evictions.load(Ordering::SeqCst), 1);

    let totals = session.event_totals();
    assert_eq!(totals.collisions, 1);
    assert_eq!(totals.evictions, 1);
}

#[test]
fn inner_mapped_event_fires_for_tcp_flags_shape() {
    let count = Arc::new(AtomicUsize::new(0));
    let sink = count.clone();
    let session = Session::builder()
        .on_template_event(move |event| {
            if let TemplateEvent::InnerMapped { .. } = event {
                sink.fetch_add(1, Ordering::SeqCst);
            }
        })
        .build()
        .unwrap();

    let flags = Template::new(
        0x131,
        vec![
            TemplateField::new(6871, 14, 1),
            TemplateField::new(6871, 15, 1),
        ],
    );
    session.observe_template(1, flags);
    assert_eq!(count.load(Ordering::SeqCst), 1);
}
