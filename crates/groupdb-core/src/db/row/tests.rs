use super::*;
use crate::{db::schema::Ordinal, test_support::fixture_schema};

fn customer_hkey(cid: i64) -> HKey {
    HKey::root(Ordinal::new(1), vec![Value::Int(cid)])
}

fn order_hkey(cid: i64, oid: i64) -> HKey {
    customer_hkey(cid).child(Ordinal::new(2), vec![Value::Int(oid)])
}

#[test]
fn rows_expose_type_values_and_hkey() {
    let schema = fixture_schema();
    let order = schema.table("order").expect("order should exist");
    let row = Row::new(
        order.clone(),
        vec![Value::Int(11), Value::Int(1), Value::from("ori")],
        Some(order_hkey(1, 11)),
    );

    assert!(row.is_type(&order));
    assert_eq!(row.nfields(), 3);
    assert_eq!(row.value(2), Some(&Value::from("ori")));
    assert_eq!(row.value(3), None);
    assert_eq!(row.hkey(), Some(&order_hkey(1, 11)));
}

#[test]
fn ancestry_follows_hkeys() {
    let schema = fixture_schema();
    let customer = schema.table("customer").expect("customer should exist");
    let order = schema.table("order").expect("order should exist");
    let parent = Row::new(
        customer.clone(),
        vec![Value::Int(1), Value::from("xyz")],
        Some(customer_hkey(1)),
    );
    let child = Row::new(
        order,
        vec![Value::Int(11), Value::Int(1), Value::Null],
        Some(order_hkey(1, 11)),
    );
    let stranger = Row::new(
        customer,
        vec![Value::Int(2), Value::from("abc")],
        Some(customer_hkey(2)),
    );

    assert!(parent.is_ancestor_of(&child));
    assert!(!child.is_ancestor_of(&parent));
    assert!(!parent.is_ancestor_of(&parent));
    assert!(!stranger.is_ancestor_of(&child));
}

#[test]
fn rows_without_hkeys_have_no_ancestry() {
    let schema = fixture_schema();
    let values = schema.values_type("v", 1);
    let row = Row::new(values, vec![Value::Int(1)], None);

    assert!(!row.is_ancestor_of(&row));
    assert!(row.hkey().is_none());
}

#[test]
fn with_hkey_keeps_type_and_values() {
    let schema = fixture_schema();
    let order = schema.table("order").expect("order should exist");
    let row = Row::new(
        order.clone(),
        vec![Value::Int(11), Value::Int(1), Value::from("ori")],
        Some(order_hkey(1, 11)),
    );

    let moved = row.with_hkey(Some(customer_hkey(1)));

    assert!(moved.is_type(&order));
    assert_eq!(moved.values(), row.values());
    assert_eq!(moved.hkey(), Some(&customer_hkey(1)));
    assert_eq!(row.hkey(), Some(&order_hkey(1, 11)));
}

#[test]
fn column_selector_clips_to_the_row() {
    let schema = fixture_schema();
    let row = Row::new(
        schema.values_type("v", 2),
        vec![Value::Int(1), Value::Int(2)],
        None,
    );

    assert_eq!(ColumnSelector::leading(1).select(&row), &[Value::Int(1)]);
    assert_eq!(ColumnSelector::leading(5).select(&row).len(), 2);
    assert!(ColumnSelector::leading(0).is_empty());
    assert!(ColumnSelector::leading(2).selects(1));
    assert!(!ColumnSelector::leading(2).selects(2));
}

#[test]
fn debug_names_the_type_and_values() {
    let schema = fixture_schema();
    let row = Row::new(
        schema.values_type("pair", 2),
        vec![Value::Int(1), Value::from("a")],
        None,
    );

    let rendered = format!("{row:?}");
    assert!(rendered.starts_with("pair(1, "), "{rendered}");
}
