use crate::{
    db::{
        context::QueryContext,
        direction::Direction,
        executor::{
            JoinType,
            cursor::{Cursor, CursorBox, CursorLifecycle, CursorState, collect_rows},
            merge::{
                Except, HKeyUnion, Intersect, IntersectOptions, IntersectOutput, MergeKeys,
                ScanMode, Union,
            },
            operator::{Operator, OperatorRef},
            scan::{IndexScan, ValuesScan},
        },
        index_range::IndexKeyRange,
        row::Row,
        schema::RowTypeRef,
    },
    error::InternalError,
    test_support::{Fixture, ints},
    value::Value,
};
use proptest::prelude::*;
use std::{
    collections::BTreeSet,
    sync::{Arc, Mutex},
};

fn run(operator: &dyn Operator, context: &Arc<QueryContext>) -> Vec<Row> {
    let mut cursor = operator.cursor(context).expect("cursor should build");
    collect_rows(cursor.as_mut()).expect("merge should complete")
}

///
/// Sides
///
/// Two single-column literal inputs.
///

struct Sides {
    fixture: Fixture,
    left_type: RowTypeRef,
    right_type: RowTypeRef,
    left: OperatorRef,
    right: OperatorRef,
}

impl Sides {
    fn new(left: &[i64], right: &[i64]) -> Self {
        let fixture = Fixture::empty();
        let left_type = fixture.schema.values_type("left", 1);
        let right_type = fixture.schema.values_type("right", 1);
        let values = |row_type: &RowTypeRef, keys: &[i64]| -> OperatorRef {
            let rows = keys.iter().map(|key| vec![Value::Int(*key)]).collect();
            Arc::new(ValuesScan::new(row_type.clone(), rows).expect("values should build"))
        };

        Self {
            left: values(&left_type, left),
            right: values(&right_type, right),
            left_type,
            right_type,
            fixture,
        }
    }

    fn intersect(&self, options: IntersectOptions) -> Vec<Row> {
        let operator = Intersect::new(
            self.left.clone(),
            self.left_type.clone(),
            self.right.clone(),
            self.right_type.clone(),
            MergeKeys::ascending(1, 1),
            options,
        )
        .expect("intersect should build");
        run(&operator, &self.fixture.context())
    }

    fn union(&self, output_equal: bool) -> Vec<Row> {
        let operator = Union::new(
            self.left.clone(),
            self.left_type.clone(),
            self.right.clone(),
            self.right_type.clone(),
            MergeKeys::ascending(1, 1),
            output_equal,
        )
        .expect("union should build");
        run(&operator, &self.fixture.context())
    }

    fn except(&self) -> Vec<Row> {
        let operator = Except::new(
            self.left.clone(),
            self.left_type.clone(),
            self.right.clone(),
            self.right_type.clone(),
            MergeKeys::ascending(1, 1),
            ScanMode::SkipScan,
        )
        .expect("except should build");
        run(&operator, &self.fixture.context())
    }
}

fn sided(rows: &[Row]) -> Vec<String> {
    rows.iter()
        .map(|row| format!("{}:{}", row.row_type().name(), row.values()[0]))
        .collect()
}

const LEFT: &[i64] = &[1, 2, 2, 4, 6];
const RIGHT: &[i64] = &[2, 3, 4, 4, 7];

// intersect

#[test]
fn intersect_outputs_one_left_row_per_match() {
    let sides = Sides::new(LEFT, RIGHT);

    let rows = sides.intersect(IntersectOptions::default());

    assert_eq!(ints(&rows, 0), vec![2, 4]);
    assert!(rows.iter().all(|row| row.is_type(&sides.left_type)));
}

#[test]
fn intersect_output_equal_keeps_every_matching_left_row() {
    let sides = Sides::new(LEFT, RIGHT);

    let rows = sides.intersect(IntersectOptions::default().output_equal());

    assert_eq!(ints(&rows, 0), vec![2, 2, 4]);
}

#[test]
fn intersect_can_output_the_right_side() {
    let sides = Sides::new(LEFT, RIGHT);
    let right = IntersectOptions::default().output(IntersectOutput::Right);

    assert_eq!(ints(&sides.intersect(right), 0), vec![2, 4]);
    assert_eq!(ints(&sides.intersect(right.output_equal()), 0), vec![2, 4, 4]);
}

#[test]
fn intersect_both_emits_left_then_right() {
    let sides = Sides::new(LEFT, RIGHT);

    let rows = sides.intersect(IntersectOptions::default().output(IntersectOutput::Both));

    assert_eq!(sided(&rows), vec!["left:2", "right:2", "left:4", "right:4"]);
}

#[test]
fn left_join_keeps_every_left_row() {
    let sides = Sides::new(LEFT, RIGHT);

    let rows = sides.intersect(IntersectOptions::default().join(JoinType::Left));

    assert_eq!(ints(&rows, 0), LEFT.to_vec());
}

#[test]
fn right_join_keeps_every_right_row() {
    let sides = Sides::new(LEFT, RIGHT);
    let options = IntersectOptions::default()
        .join(JoinType::Right)
        .output(IntersectOutput::Right);

    let rows = sides.intersect(options);

    assert_eq!(ints(&rows, 0), RIGHT.to_vec());
}

#[test]
fn inconsistent_intersect_options_are_rejected() {
    let sides = Sides::new(LEFT, RIGHT);
    let build = |options| {
        Intersect::new(
            sides.left.clone(),
            sides.left_type.clone(),
            sides.right.clone(),
            sides.right_type.clone(),
            MergeKeys::ascending(1, 1),
            options,
        )
    };

    for options in [
        IntersectOptions::default().join(JoinType::Full),
        IntersectOptions::default()
            .join(JoinType::Left)
            .output(IntersectOutput::Right),
        IntersectOptions::default()
            .output(IntersectOutput::Both)
            .output_equal(),
    ] {
        let err = build(options).expect_err("options should be rejected");
        assert!(err.is_invalid_argument());
    }
}

#[test]
fn too_many_compared_fields_are_rejected() {
    let sides = Sides::new(LEFT, RIGHT);

    let err = Intersect::new(
        sides.left.clone(),
        sides.left_type.clone(),
        sides.right.clone(),
        sides.right_type.clone(),
        MergeKeys::ascending(1, 2),
        IntersectOptions::default(),
    )
    .expect_err("two compared fields over one ordering field");

    assert!(err.is_invalid_argument());
}

#[test]
fn descending_inputs_merge_in_their_own_order() {
    let mut left = LEFT.to_vec();
    let mut right = RIGHT.to_vec();
    left.reverse();
    right.reverse();
    let sides = Sides::new(&left, &right);
    let operator = Intersect::new(
        sides.left.clone(),
        sides.left_type.clone(),
        sides.right.clone(),
        sides.right_type.clone(),
        MergeKeys::new(1, 1, vec![Direction::Desc]),
        IntersectOptions::default(),
    )
    .expect("intersect should build");

    let rows = run(&operator, &sides.fixture.context());

    assert_eq!(ints(&rows, 0), vec![4, 2]);
}

// union and except

#[test]
fn union_merges_and_collapses_equal_keys() {
    let sides = Sides::new(&[1, 3, 5], &[2, 3, 6]);

    assert_eq!(
        sided(&sides.union(false)),
        vec!["left:1", "right:2", "left:3", "left:5", "right:6"]
    );
    assert_eq!(
        sided(&sides.union(true)),
        vec!["left:1", "right:2", "left:3", "right:3", "left:5", "right:6"]
    );
}

#[test]
fn union_requires_matching_ordering_widths() {
    let fixture = Fixture::empty();
    let left_type = fixture.schema.values_type("left", 2);
    let right_type = fixture.schema.values_type("right", 1);
    let empty = |row_type: &RowTypeRef| -> OperatorRef {
        Arc::new(ValuesScan::new(row_type.clone(), Vec::new()).expect("values should build"))
    };

    let err = Union::new(
        empty(&left_type),
        left_type.clone(),
        empty(&right_type),
        right_type.clone(),
        MergeKeys::new(2, 1, vec![Direction::Asc]),
        false,
    )
    .expect_err("ordering widths differ");

    assert!(err.is_invalid_argument());
}

#[test]
fn except_removes_every_left_row_with_a_right_match() {
    let sides = Sides::new(LEFT, &[2, 3, 4]);

    assert_eq!(ints(&sides.except(), 0), vec![1, 6]);
}

#[test]
fn except_with_an_empty_right_side_is_the_left_side() {
    let sides = Sides::new(LEFT, &[]);

    assert_eq!(ints(&sides.except(), 0), LEFT.to_vec());
}

// hkey union

fn salesman(fixture: &Fixture, name: &str) -> OperatorRef {
    let index = fixture.index("order_salesman");
    Arc::new(IndexScan::new(
        IndexKeyRange::equal_to(&index, vec![name.into()]).expect("range should build"),
        Direction::Asc,
    ))
}

fn items_of(fixture: &Fixture, oid: i64) -> OperatorRef {
    let index = fixture.index("item_oid");
    Arc::new(IndexScan::new(
        IndexKeyRange::equal_to(&index, vec![Value::Int(oid)]).expect("range should build"),
        Direction::Asc,
    ))
}

#[test]
fn hkey_union_cuts_descendants_back_to_the_output_table() {
    let fixture = Fixture::standard();
    let order = fixture
        .order
        .hkey_table()
        .expect("order has an ordinal");
    let operator = HKeyUnion::new(
        &fixture.schema,
        salesman(&fixture, "ori"),
        fixture.index("order_salesman"),
        items_of(&fixture, 11),
        fixture.index("item_oid"),
        MergeKeys::new(2, 3, vec![Direction::Asc; 2]),
        order,
    )
    .expect("hkey union should build");

    let rows = run(&operator, &fixture.context());

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].values(), &[Value::Int(1), Value::Int(11)]);
    let hkey = rows[0].hkey().expect("output rows carry an hkey");
    assert_eq!(hkey.table_ordinal(), Some(order));
}

#[test]
fn hkey_union_interleaves_distinct_hkeys() {
    let fixture = Fixture::standard();
    let order = fixture
        .order
        .hkey_table()
        .expect("order has an ordinal");
    let index = fixture.index("order_salesman");
    let operator = HKeyUnion::new(
        &fixture.schema,
        salesman(&fixture, "tom"),
        index.clone(),
        salesman(&fixture, "david"),
        index,
        MergeKeys::new(2, 2, vec![Direction::Asc; 2]),
        order,
    )
    .expect("hkey union should build");

    let rows = run(&operator, &fixture.context());

    assert_eq!(ints(&rows, 1), vec![12, 21]);
}

#[test]
fn hkey_union_rejects_inputs_outside_the_output_subtree() {
    let fixture = Fixture::standard();
    let address = fixture
        .address
        .hkey_table()
        .expect("address has an ordinal");
    let index = fixture.index("order_salesman");

    let err = HKeyUnion::new(
        &fixture.schema,
        salesman(&fixture, "tom"),
        index.clone(),
        salesman(&fixture, "david"),
        index,
        MergeKeys::new(2, 2, vec![Direction::Asc]),
        address,
    )
    .expect_err("orders do not descend from address");

    assert!(err.is_invalid_argument());
}

// skip-scan over index inputs

/// Addresses tagged `left` for each cid in `left` and `right` for each
/// cid in `right`; customers are never written.
fn tagged_addresses(left: &BTreeSet<i64>, right: &BTreeSet<i64>) -> Fixture {
    let fixture = Fixture::empty();
    for cid in left {
        fixture.insert(
            &fixture.address,
            vec![Value::Int(cid * 10 + 1), Value::Int(*cid), "left".into()],
        );
    }
    for cid in right {
        fixture.insert(
            &fixture.address,
            vec![Value::Int(cid * 10 + 2), Value::Int(*cid), "right".into()],
        );
    }
    fixture
}

fn tagged(fixture: &Fixture, tag: &str) -> OperatorRef {
    let index = fixture.index("address_address");
    Arc::new(IndexScan::new(
        IndexKeyRange::equal_to(&index, vec![tag.into()]).expect("range should build"),
        Direction::Asc,
    ))
}

/// Compare on cid only: index rows are [address, cid, aid].
fn cid_keys() -> MergeKeys {
    MergeKeys::new(2, 2, vec![Direction::Asc])
}

fn intersect_cids(fixture: &Fixture, scan: ScanMode) -> Vec<i64> {
    let index = fixture.index("address_address");
    let operator = Intersect::new(
        tagged(fixture, "left"),
        index.clone(),
        tagged(fixture, "right"),
        index,
        cid_keys(),
        IntersectOptions::default().scan(scan),
    )
    .expect("intersect should build");
    ints(&run(&operator, &fixture.context()), 1)
}

fn except_cids(fixture: &Fixture, scan: ScanMode) -> Vec<i64> {
    let index = fixture.index("address_address");
    let operator = Except::new(
        tagged(fixture, "left"),
        index.clone(),
        tagged(fixture, "right"),
        index,
        cid_keys(),
        scan,
    )
    .expect("except should build");
    ints(&run(&operator, &fixture.context()), 1)
}

fn union_cids(fixture: &Fixture) -> Vec<i64> {
    let index = fixture.index("address_address");
    let operator = Union::new(
        tagged(fixture, "left"),
        index.clone(),
        tagged(fixture, "right"),
        index,
        cid_keys(),
        false,
    )
    .expect("union should build");
    ints(&run(&operator, &fixture.context()), 1)
}

#[test]
fn skip_scan_jumps_over_long_unmatched_runs() {
    let left: BTreeSet<i64> = (1..=200).collect();
    let right: BTreeSet<i64> = [3, 150, 199].into_iter().collect();
    let fixture = tagged_addresses(&left, &right);

    assert_eq!(intersect_cids(&fixture, ScanMode::SkipScan), vec![3, 150, 199]);
    assert_eq!(
        intersect_cids(&fixture, ScanMode::SequentialScan),
        vec![3, 150, 199]
    );
}

// failed opens

///
/// Watched
///
/// Literal input whose cursor publishes its lifecycle state, and which
/// can fail its first read.
///

#[derive(Debug)]
struct Watched {
    row_type: RowTypeRef,
    keys: Vec<i64>,
    fail_first_read: bool,
    state: Arc<Mutex<CursorState>>,
}

impl Watched {
    fn new(row_type: &RowTypeRef, keys: &[i64], fail_first_read: bool) -> Arc<Self> {
        Arc::new(Self {
            row_type: row_type.clone(),
            keys: keys.to_vec(),
            fail_first_read,
            state: Arc::new(Mutex::new(CursorState::NeverOpened)),
        })
    }

    fn state(&self) -> CursorState {
        *self.state.lock().expect("state lock should not be poisoned")
    }
}

impl Operator for Watched {
    fn cursor(&self, _context: &Arc<QueryContext>) -> Result<CursorBox, InternalError> {
        let rows = self
            .keys
            .iter()
            .map(|key| Row::new(self.row_type.clone(), vec![Value::Int(*key)], None))
            .collect();

        Ok(Box::new(WatchedCursor {
            rows,
            position: 0,
            fail_first_read: self.fail_first_read,
            published: self.state.clone(),
            lifecycle: CursorLifecycle::new("Watched"),
        }))
    }

    fn row_type(&self) -> Option<RowTypeRef> {
        Some(self.row_type.clone())
    }

    fn describe(&self) -> String {
        format!("Watched({})", self.row_type)
    }
}

struct WatchedCursor {
    rows: Vec<Row>,
    position: usize,
    fail_first_read: bool,
    published: Arc<Mutex<CursorState>>,
    lifecycle: CursorLifecycle,
}

impl WatchedCursor {
    fn publish(&self) {
        *self
            .published
            .lock()
            .expect("state lock should not be poisoned") = self.lifecycle.state();
    }
}

impl Cursor for WatchedCursor {
    fn open(&mut self) -> Result<(), InternalError> {
        self.lifecycle.check_openable()?;
        self.position = 0;
        self.lifecycle.set_active();
        self.publish();

        Ok(())
    }

    fn next(&mut self) -> Result<Option<Row>, InternalError> {
        self.lifecycle.check_open("next")?;
        if self.fail_first_read && self.position == 0 {
            return Err(InternalError::executor_internal("storage read failed"));
        }
        let row = self.rows.get(self.position).cloned();
        self.position += 1;
        if row.is_none() {
            self.lifecycle.set_idle();
            self.publish();
        }

        Ok(row)
    }

    fn close(&mut self) -> Result<(), InternalError> {
        self.lifecycle.check_not_destroyed("close")?;
        self.lifecycle.set_idle();
        self.publish();

        Ok(())
    }

    fn destroy(&mut self) {
        self.lifecycle.set_destroyed();
        self.publish();
    }

    fn state(&self) -> CursorState {
        self.lifecycle.state()
    }
}

fn open_failing_intersect(
    fixture: &Fixture,
    left: &Arc<Watched>,
    right: &Arc<Watched>,
) -> InternalError {
    let operator = Intersect::new(
        left.clone(),
        left.row_type.clone(),
        right.clone(),
        right.row_type.clone(),
        MergeKeys::ascending(1, 1),
        IntersectOptions::default(),
    )
    .expect("intersect should build");
    let mut cursor = operator
        .cursor(&fixture.context())
        .expect("cursor should build");

    let err = cursor.open().expect_err("open should surface the read failure");
    assert_eq!(cursor.state(), CursorState::NeverOpened);

    err
}

#[test]
fn failed_first_read_on_the_left_closes_the_left_input() {
    let fixture = Fixture::empty();
    let left = Watched::new(&fixture.schema.values_type("left", 1), &[1, 2], true);
    let right = Watched::new(&fixture.schema.values_type("right", 1), &[2, 3], false);

    let err = open_failing_intersect(&fixture, &left, &right);

    assert!(err.message.contains("storage read failed"));
    assert_eq!(left.state(), CursorState::Idle);
    assert_eq!(right.state(), CursorState::NeverOpened);
}

#[test]
fn failed_first_read_on_the_right_closes_both_inputs() {
    let fixture = Fixture::empty();
    let left = Watched::new(&fixture.schema.values_type("left", 1), &[1, 2], false);
    let right = Watched::new(&fixture.schema.values_type("right", 1), &[2, 3], true);

    let err = open_failing_intersect(&fixture, &left, &right);

    assert!(err.message.contains("storage read failed"));
    assert_eq!(left.state(), CursorState::Idle);
    assert_eq!(right.state(), CursorState::Idle);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn merges_match_set_algebra(
        left in prop::collection::btree_set(0i64..60, 0..25),
        right in prop::collection::btree_set(0i64..60, 0..25),
    ) {
        let fixture = tagged_addresses(&left, &right);
        let intersection: Vec<i64> = left.intersection(&right).copied().collect();
        let difference: Vec<i64> = left.difference(&right).copied().collect();
        let union: Vec<i64> = left.union(&right).copied().collect();

        prop_assert_eq!(intersect_cids(&fixture, ScanMode::SkipScan), intersection.clone());
        prop_assert_eq!(intersect_cids(&fixture, ScanMode::SequentialScan), intersection);
        prop_assert_eq!(except_cids(&fixture, ScanMode::SkipScan), difference.clone());
        prop_assert_eq!(except_cids(&fixture, ScanMode::SequentialScan), difference);
        prop_assert_eq!(union_cids(&fixture), union);
    }
}
