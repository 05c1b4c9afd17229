//! Template store bounds and statistics.

use flow_ingest::{ProbeConfig, Session, Template, TemplateField};

fn data_template(id: u16) -> Template {
    Template::new(
        id,
        vec![
            TemplateField::new(0, 8, 4),
            TemplateField::new(0, 12, 4),
            TemplateField::new(0, 4, 1),
            TemplateField::new(0, 2, 4),
            TemplateField::new(0, 1, 4),
            TemplateField::new(0, 323, 8),
        ],
    )
}

#[test]
fn store_starts_empty() {
    let session = Session::builder().build().unwrap();
    let stats = session.template_store_stats(1);
    assert_eq!(stats.size, 0);
    assert_eq!(stats.capacity, 1000); // default capacity
    assert_eq!(stats.collisions, 0);
    assert_eq!(stats.evictions, 0);
}

#[test]
fn custom_capacity() {
    let session = Session::builder()
        .with_template_cache_size(500)
        .build()
        .unwrap();
    assert_eq!(session.template_store_stats(1).capacity, 500);
}

#[test]
fn zero_capacity_is_rejected() {
    let err = Session::builder().with_template_cache_size(0).build();
    assert!(err.is_err());
}

#[test]
fn lru_eviction_under_churn() {
    let session = Session::builder()
        .with_template_cache_size(4)
        .build()
        .unwrap();
    for i in 0..6u16 {
        session.observe_template(1, data_template(0x100 + i));
    }
    let stats = session.template_store_stats(1);
    assert_eq!(stats.size, 4);
    assert_eq!(stats.evictions, 2);
}

#[test]
fn refresh_does_not_collide() {
    let session = Session::builder().build().unwrap();
    session.observe_template(1, data_template(0x100));
    session.observe_template(1, data_template(0x100));
    session.observe_template(1, data_template(0x100));
    let stats = session.template_store_stats(1);
    assert_eq!(stats.size, 1);
    assert_eq!(stats.collisions, 0);
}

#[test]
fn redefinition_collides_and_replaces() {
    let session = Session::builder().build().unwrap();
    session.observe_template(1, data_template(0x100));
    let mut other = data_template(0x100);
    other.fields.push(TemplateField::new(0, 6, 1));
    session.observe_template(1, other);
    let stats = session.template_store_stats(1);
    assert_eq!(stats.size, 1);
    assert_eq!(stats.collisions, 1);
}

#[test]
fn stores_are_per_domain() {
    let session = Session::builder()
        .with_probe(ProbeConfig::new("multi"))
        .build()
        .unwrap();
    session.observe_template(1, data_template(0x100));
    session.observe_template(2, data_template(0x200));
    assert_eq!(session.template_store_stats(1).size, 1);
    assert_eq!(session.template_store_stats(2).size, 1);
    assert_eq!(session.template_store_stats(3).size, 0);
}
