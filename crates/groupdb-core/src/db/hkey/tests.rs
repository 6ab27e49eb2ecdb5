use crate::{
    db::{
        hkey::{HKey, HKeySegment, codec},
        schema::{HKeyLevel, Ordinal},
    },
    value::Value,
};
use proptest::prelude::*;
use std::cmp::Ordering;

const CUSTOMER: Ordinal = Ordinal::new(1);
const ORDER: Ordinal = Ordinal::new(2);
const ITEM: Ordinal = Ordinal::new(3);
const ADDRESS: Ordinal = Ordinal::new(4);

fn customer(cid: i64) -> HKey {
    HKey::root(CUSTOMER, vec![Value::Int(cid)])
}

fn order(cid: i64, oid: i64) -> HKey {
    customer(cid).child(ORDER, vec![Value::Int(oid)])
}

fn item(cid: i64, oid: i64, iid: i64) -> HKey {
    order(cid, oid).child(ITEM, vec![Value::Int(iid)])
}

#[test]
fn physical_order_places_descendants_between_parent_and_next_sibling() {
    let mut keys = vec![
        customer(2),
        item(1, 11, 112),
        order(1, 12),
        customer(1).child(ADDRESS, vec![Value::Int(1001)]),
        item(1, 11, 111),
        order(1, 11),
        customer(1),
    ];
    keys.sort();

    let expected = vec![
        customer(1),
        order(1, 11),
        item(1, 11, 111),
        item(1, 11, 112),
        order(1, 12),
        customer(1).child(ADDRESS, vec![Value::Int(1001)]),
        customer(2),
    ];
    assert_eq!(keys, expected);
}

#[test]
fn prefix_and_ancestor_tests() {
    let parent = order(1, 11);
    let child = item(1, 11, 111);

    assert!(parent.is_prefix_of(&child));
    assert!(parent.is_ancestor_of(&child));
    assert!(child.is_prefix_of(&child));
    assert!(!child.is_ancestor_of(&child));
    assert!(!order(1, 12).is_prefix_of(&child));
    assert!(!child.is_prefix_of(&parent));
}

#[test]
fn branch_position_is_prefix_of_every_branch_row() {
    let position = customer(1).extend_with_ordinal(ORDER);

    assert!(position.is_ancestor_of(&order(1, 11)));
    assert!(position.is_ancestor_of(&item(1, 11, 111)));
    assert!(!position.is_prefix_of(&customer(1).child(ADDRESS, vec![Value::Int(1)])));
}

#[test]
fn left_join_hkey_sorts_before_real_children() {
    let padded = order(1, 11).extend_with_ordinal(ITEM).extend_with_nulls(1);

    assert_eq!(padded.cmp(&item(1, 11, i64::MIN)), Ordering::Less);
    assert!(order(1, 11).is_ancestor_of(&padded));
}

#[test]
fn ancestor_truncates_to_depth() {
    let key = item(1, 11, 111);

    assert_eq!(key.ancestor(0), customer(1));
    assert_eq!(key.ancestor(1), order(1, 11));
    assert_eq!(key.ancestor(5), key);
}

#[test]
fn from_layout_rejects_wrong_value_count() {
    let layout = [
        HKeyLevel {
            ordinal: CUSTOMER,
            key_len: 1,
        },
        HKeyLevel {
            ordinal: ORDER,
            key_len: 1,
        },
    ];

    let rebuilt = HKey::from_layout(&layout, &[Value::Int(1), Value::Int(11)])
        .expect("matching value count should rebuild the hkey");
    assert_eq!(rebuilt, order(1, 11));

    let err = HKey::from_layout(&layout, &[Value::Int(1)])
        .expect_err("short value list should be rejected");
    assert!(err.message.contains("expects 2 values"));
}

#[test]
fn display_lists_ordinals_and_values() {
    assert_eq!(order(1, 11).to_string(), "{1,1,2,11}");
}

#[test]
fn prefix_upper_bound_covers_descendants_only() {
    let parent = order(1, 11).encode();
    let upper = codec::prefix_upper_bound(&parent);

    assert!(item(1, 11, i64::MAX).encode() < upper);
    assert!(order(1, 12).encode() > upper);
}

fn arb_value() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::Int),
        any::<u64>().prop_map(Value::Uint),
        any::<f64>().prop_map(Value::Float),
        "[a-c\\x00]{0,4}".prop_map(Value::Text),
        prop::collection::vec(any::<u8>(), 0..4).prop_map(Value::Blob),
    ]
}

fn arb_hkey() -> impl Strategy<Value = HKey> {
    prop::collection::vec(
        (1_u16..4, prop::collection::vec(arb_value(), 0..3)),
        0..4,
    )
    .prop_map(|segments| {
        HKey::new(
            segments
                .into_iter()
                .map(|(ordinal, values)| HKeySegment::new(Ordinal::new(ordinal), values))
                .collect(),
        )
    })
}

proptest! {
    #[test]
    fn encoded_order_matches_key_order(left in arb_hkey(), right in arb_hkey()) {
        prop_assert_eq!(left.encode().cmp(&right.encode()), left.cmp(&right));
    }

    #[test]
    fn prefix_implies_not_greater(left in arb_hkey(), right in arb_hkey()) {
        if left.is_prefix_of(&right) {
            prop_assert_ne!(left.cmp(&right), Ordering::Greater);
        }
    }

    #[test]
    fn order_is_total_and_antisymmetric(left in arb_hkey(), right in arb_hkey()) {
        let forward = left.cmp(&right);
        prop_assert_eq!(forward, right.cmp(&left).reverse());
        prop_assert_eq!(forward == Ordering::Equal, left == right);
    }
}
