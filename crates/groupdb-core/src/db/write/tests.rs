use super::*;
use crate::{
    db::{
        direction::Direction,
        schema::{IndexId, Ordinal},
        store::{KeyRange, MemoryStore},
    },
    error::ErrorClass,
    test_support::Fixture,
};

fn ordinal(row_type: &RowTypeRef) -> Ordinal {
    row_type.hkey_table().expect("tables carry an ordinal")
}

fn index_id(fixture: &Fixture, name: &str) -> IndexId {
    fixture.index(name).index().expect("index descriptor").id
}

fn index_rows(fixture: &Fixture, name: &str) -> Vec<Vec<Value>> {
    fixture
        .store
        .scan(
            KeySpace::Index(index_id(fixture, name)),
            &KeyRange::full(),
            Direction::Asc,
            usize::MAX,
        )
        .expect("index scan should succeed")
        .into_iter()
        .map(|entry| entry.record.values)
        .collect()
}

#[test]
fn insert_writes_group_primary_key_and_index_entries() {
    let fixture = Fixture::empty();
    fixture.insert(&fixture.customer, vec![Value::Int(1), "xyz".into()]);
    let order = fixture.insert(
        &fixture.order,
        vec![Value::Int(11), Value::Int(1), "ori".into()],
    );

    let hkey = order.hkey().expect("table rows carry an hkey");
    assert_eq!(hkey.len(), 2);
    assert_eq!(hkey.table_ordinal(), Some(ordinal(&fixture.order)));
    assert_eq!(
        hkey.values().cloned().collect::<Vec<_>>(),
        vec![Value::Int(1), Value::Int(11)]
    );

    let group = KeySpace::Group(ordinal(&fixture.customer));
    assert_eq!(fixture.store.entry_count(group).expect("count"), 2);
    assert_eq!(
        fixture
            .store
            .entry_count(KeySpace::PrimaryKey(ordinal(&fixture.order)))
            .expect("count"),
        1
    );
    assert_eq!(
        index_rows(&fixture, "order_salesman"),
        vec![vec!["ori".into(), Value::Int(1), Value::Int(11)]]
    );
}

#[test]
fn duplicate_primary_keys_conflict() {
    let fixture = Fixture::empty();
    fixture.insert(&fixture.customer, vec![Value::Int(1), "xyz".into()]);

    let err = fixture.committed(|| {
        fixture
            .writer()
            .insert(&fixture.customer, vec![Value::Int(1), "other".into()])
            .expect_err("second customer 1 should conflict")
    });

    assert_eq!(err.class, ErrorClass::Conflict);
}

#[test]
fn insert_validates_shape_and_type() {
    let fixture = Fixture::empty();
    let writer = fixture.writer();

    let err = writer
        .insert(&fixture.customer, vec![Value::Int(1)])
        .expect_err("too few values");
    assert!(err.is_invalid_argument());

    let err = writer
        .insert(&fixture.index("customer_name"), vec![Value::Int(1)])
        .expect_err("indexes are not writable tables");
    assert!(err.is_invalid_argument());
}

#[test]
fn update_validates_shape() {
    let fixture = Fixture::empty();
    fixture.insert(&fixture.customer, vec![Value::Int(1), "xyz".into()]);
    let order = fixture.insert(
        &fixture.order,
        vec![Value::Int(11), Value::Int(1), "ori".into()],
    );

    let err = fixture.committed(|| {
        fixture
            .writer()
            .update(&order, vec![Value::Int(11), Value::Int(1)])
            .expect_err("too few values")
    });

    assert!(err.is_invalid_argument());
}

#[test]
fn missing_parents_produce_orphan_hkeys() {
    let fixture = Fixture::empty();
    let order = fixture.insert(
        &fixture.order,
        vec![Value::Int(31), Value::Int(3), "kim".into()],
    );
    let item = fixture.insert(&fixture.item, vec![Value::Int(991), Value::Int(99)]);

    let order_hkey = order.hkey().expect("hkey");
    assert_eq!(
        order_hkey.values().cloned().collect::<Vec<_>>(),
        vec![Value::Int(3), Value::Int(31)]
    );

    let item_hkey = item.hkey().expect("hkey");
    assert_eq!(item_hkey.len(), 3);
    assert_eq!(
        item_hkey.values().cloned().collect::<Vec<_>>(),
        vec![Value::Null, Value::Int(99), Value::Int(991)]
    );
    assert!(item_hkey < order_hkey);
}

#[test]
fn children_inserted_after_their_parent_nest_under_it() {
    let fixture = Fixture::standard();
    let table = fixture.item.table().expect("item is a table");

    let hkey = fixture
        .writer()
        .compute_hkey(table, &[Value::Int(113), Value::Int(11)])
        .expect("hkey should compute");

    assert_eq!(
        hkey.values().cloned().collect::<Vec<_>>(),
        vec![Value::Int(1), Value::Int(11), Value::Int(113)]
    );
}

#[test]
fn delete_removes_every_entry() {
    let fixture = Fixture::empty();
    let order = fixture.insert(
        &fixture.order,
        vec![Value::Int(11), Value::Int(1), "ori".into()],
    );

    let removed = fixture.committed(|| fixture.writer().delete(&order).expect("delete"));
    let again = fixture.committed(|| fixture.writer().delete(&order).expect("delete"));

    assert!(removed);
    assert!(!again);
    assert!(index_rows(&fixture, "order_salesman").is_empty());
    assert_eq!(
        fixture
            .store
            .entry_count(KeySpace::PrimaryKey(ordinal(&fixture.order)))
            .expect("count"),
        0
    );
    assert_eq!(
        fixture
            .store
            .table_status()
            .row_count(ordinal(&fixture.order))
            .expect("status"),
        0
    );
}

#[test]
fn update_in_place_rewrites_index_entries() {
    let fixture = Fixture::empty();
    let order = fixture.insert(
        &fixture.order,
        vec![Value::Int(11), Value::Int(1), "ori".into()],
    );

    let updated = fixture.committed(|| {
        fixture
            .writer()
            .update(&order, vec![Value::Int(11), Value::Int(1), "zed".into()])
            .expect("update should succeed")
    });

    assert_eq!(updated.hkey(), order.hkey());
    assert_eq!(
        index_rows(&fixture, "order_salesman"),
        vec![vec!["zed".into(), Value::Int(1), Value::Int(11)]]
    );
}

#[test]
fn update_of_a_parent_reference_moves_the_row() {
    let fixture = Fixture::standard();
    let order = fixture
        .store
        .get(
            KeySpace::PrimaryKey(ordinal(&fixture.order)),
            &primary_key(
                fixture.order.table().expect("order is a table"),
                &[Value::Int(11)],
            ),
        )
        .expect("get should succeed")
        .map(|record| Row::new(fixture.order.clone(), record.values, Some(record.hkey)))
        .expect("order 11 should exist");

    let moved = fixture.committed(|| {
        fixture
            .writer()
            .update(&order, vec![Value::Int(11), Value::Int(2), "ori".into()])
            .expect("update should succeed")
    });

    assert_eq!(
        moved.hkey().expect("hkey").values().cloned().collect::<Vec<_>>(),
        vec![Value::Int(2), Value::Int(11)]
    );
    assert_eq!(
        fixture
            .store
            .table_status()
            .row_count(ordinal(&fixture.order))
            .expect("status"),
        4
    );
}

#[test]
fn writer_works_against_any_adapter() {
    let fixture = Fixture::empty();
    let store = MemoryStore::new();
    let writer = RowWriter::new(&fixture.schema, &store);

    store.begin_transaction().expect("begin should succeed");
    writer
        .insert(&fixture.customer, vec![Value::Int(5), "q".into()])
        .expect("insert should succeed");
    store.rollback_transaction().expect("rollback should succeed");

    assert_eq!(
        store
            .entry_count(KeySpace::Group(ordinal(&fixture.customer)))
            .expect("count"),
        0
    );
}
