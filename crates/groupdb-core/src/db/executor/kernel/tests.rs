use crate::{
    db::{
        context::QueryContext,
        executor::{
            cursor::{Cursor, collect_rows},
            kernel::{Count, CountTableStatus, Filter, Limit, LimitBound, Product, Select},
            operator::{Operator, OperatorRef},
            scan::{GroupScan, ValuesScan},
        },
        expr::{CompareOp, Expression},
        row::{ColumnSelector, Row},
    },
    test_support::{Fixture, ints},
    value::Value,
};
use std::sync::Arc;

fn full_scan(fixture: &Fixture) -> OperatorRef {
    Arc::new(GroupScan::full(
        fixture.schema.group("customer").expect("group should exist"),
    ))
}

fn run(operator: &dyn Operator, context: &Arc<QueryContext>) -> Vec<Row> {
    let mut cursor = operator.cursor(context).expect("cursor should build");
    collect_rows(cursor.as_mut()).expect("operator should complete")
}

fn names(rows: &[Row]) -> Vec<String> {
    rows.iter()
        .map(|row| format!("{}:{}", row.row_type().name(), row.values()[0]))
        .collect()
}

fn numbers(fixture: &Fixture, count: i64) -> OperatorRef {
    let row_type = fixture.schema.values_type("n", 1);
    let rows = (0..count).map(|n| vec![Value::Int(n)]).collect();
    Arc::new(ValuesScan::new(row_type, rows).expect("values should build"))
}

// select

#[test]
fn select_filters_only_rows_of_its_type() {
    let fixture = Fixture::standard();
    let predicate = Expression::equals(Expression::field(2), Expression::literal("ori"));
    let select = Select::new(full_scan(&fixture), fixture.order.clone(), predicate);

    let rows = run(&select, &fixture.context());

    assert_eq!(rows.len(), 18 - 3);
    let orders: Vec<Row> = rows
        .iter()
        .filter(|row| row.is_type(&fixture.order))
        .cloned()
        .collect();
    assert_eq!(ints(&orders, 0), vec![11]);
}

#[test]
fn select_drops_rows_whose_predicate_is_null() {
    let fixture = Fixture::standard();
    fixture.insert(
        &fixture.order,
        vec![Value::Int(13), Value::Int(1), Value::Null],
    );
    let predicate = Expression::compare(
        CompareOp::Ne,
        Expression::field(2),
        Expression::literal("ori"),
    );
    let select = Select::new(full_scan(&fixture), fixture.order.clone(), predicate);

    let rows = run(&select, &fixture.context());
    let orders: Vec<Row> = rows
        .into_iter()
        .filter(|row| row.is_type(&fixture.order))
        .collect();

    assert_eq!(ints(&orders, 0), vec![12, 21, 22]);
}

#[test]
fn select_reads_query_parameters() {
    let fixture = Fixture::standard();
    let predicate = Expression::compare(
        CompareOp::Gt,
        Expression::field(0),
        Expression::parameter(0),
    );
    let select = Select::new(full_scan(&fixture), fixture.item.clone(), predicate);
    let context = fixture.context_with_parameters(vec![Value::Int(200)]);

    let items: Vec<Row> = run(&select, &context)
        .into_iter()
        .filter(|row| row.is_type(&fixture.item))
        .collect();

    assert_eq!(ints(&items, 0), vec![211, 212, 221, 222]);
}

#[test]
fn select_forwards_jumps_to_its_input() {
    let fixture = Fixture::standard();
    let everything = run(full_scan(&fixture).as_ref(), &fixture.context());
    let customer2 = everything
        .iter()
        .find(|row| row.is_type(&fixture.customer) && row.values()[0] == Value::Int(2))
        .cloned()
        .expect("customer 2 should exist");
    let select = Select::new(
        full_scan(&fixture),
        fixture.item.clone(),
        Expression::literal(false),
    );
    let context = fixture.context();

    let mut cursor = select.cursor(&context).expect("cursor should build");
    cursor.open().expect("open should succeed");
    assert!(cursor.supports_jump());
    cursor
        .jump(&customer2, ColumnSelector::leading(1))
        .expect("jump should succeed");

    let next = cursor.next().expect("next should succeed").expect("row after jump");
    assert_eq!(names(&[next]), vec!["order:21"]);
}

// filter

#[test]
fn filter_keeps_only_the_listed_types() {
    let fixture = Fixture::standard();
    let filter = Filter::new(
        full_scan(&fixture),
        vec![fixture.customer.clone(), fixture.address.clone()],
    )
    .expect("filter should build");

    let rows = run(&filter, &fixture.context());

    assert_eq!(
        names(&rows),
        vec![
            "customer:1",
            "address:1001",
            "address:1002",
            "customer:2",
            "address:2001",
            "address:2002",
        ]
    );
}

#[test]
fn filter_without_types_is_rejected() {
    let fixture = Fixture::standard();

    let err = Filter::new(full_scan(&fixture), Vec::new()).expect_err("empty keep list");

    assert!(err.is_invalid_argument());
}

// limit

#[test]
fn limit_skips_then_takes() {
    let fixture = Fixture::empty();
    let context = fixture.context();

    let take = Limit::take(numbers(&fixture, 10), 3);
    assert_eq!(ints(&run(&take, &context), 0), vec![0, 1, 2]);

    let window = Limit::new(
        numbers(&fixture, 10),
        Some(LimitBound::Literal(4)),
        Some(LimitBound::Literal(2)),
    )
    .expect("limit should build");
    assert_eq!(ints(&run(&window, &context), 0), vec![4, 5]);

    let past_end = Limit::new(numbers(&fixture, 10), Some(LimitBound::Literal(20)), None)
        .expect("limit should build");
    assert!(run(&past_end, &context).is_empty());
}

#[test]
fn limit_parameters_resolve_per_execution() {
    let fixture = Fixture::empty();
    let limit = Limit::new(
        numbers(&fixture, 10),
        Some(LimitBound::Parameter(0)),
        Some(LimitBound::Parameter(1)),
    )
    .expect("limit should build");

    let first = fixture.context_with_parameters(vec![Value::Int(1), Value::Int(2)]);
    assert_eq!(ints(&run(&limit, &first), 0), vec![1, 2]);

    let unbounded = fixture.context_with_parameters(vec![Value::Null, Value::Null]);
    assert_eq!(run(&limit, &unbounded).len(), 10);

    let negative = fixture.context_with_parameters(vec![Value::Int(0), Value::Int(-2)]);
    let mut cursor = limit.cursor(&negative).expect("cursor should build");
    let err = cursor.open().expect_err("negative limit should fail at open");
    assert!(err.is_negative_limit());
}

#[test]
fn negative_literal_bounds_are_rejected_when_built() {
    let fixture = Fixture::empty();

    let err = Limit::new(numbers(&fixture, 3), Some(LimitBound::Literal(-1)), None)
        .expect_err("negative skip");
    assert!(err.is_negative_limit());
}

#[test]
fn zero_limit_opens_idle() {
    let fixture = Fixture::empty();
    let limit = Limit::take(numbers(&fixture, 3), 0);
    let context = fixture.context();

    let mut cursor = limit.cursor(&context).expect("cursor should build");
    cursor.open().expect("open should succeed");

    assert!(cursor.is_idle());
    assert!(cursor.next().expect("idle next should succeed").is_none());
}

// count

#[test]
fn count_passes_other_rows_and_appends_the_total() {
    let fixture = Fixture::standard();
    let count = Count::new(&fixture.schema, full_scan(&fixture), fixture.item.clone());
    let result_type = count.row_type().expect("count introduces a row type");

    let rows = run(&count, &fixture.context());
    let last = rows.last().expect("count row should be emitted");

    assert_eq!(rows.len(), 18 - 8 + 1);
    assert!(last.is_type(&result_type));
    assert_eq!(last.values(), &[Value::Uint(8)]);
}

#[test]
fn count_of_an_empty_input_is_zero() {
    let fixture = Fixture::empty();
    let count = Count::new(&fixture.schema, full_scan(&fixture), fixture.item.clone());

    let rows = run(&count, &fixture.context());

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].values(), &[Value::Uint(0)]);
}

#[test]
fn table_status_count_reads_published_counts() {
    let fixture = Fixture::standard();
    let count = CountTableStatus::new(&fixture.schema, fixture.address.clone())
        .expect("count should build");

    let rows = run(&count, &fixture.context());

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].values(), &[Value::Uint(4)]);
}

#[test]
fn table_status_count_requires_a_table() {
    let fixture = Fixture::standard();

    let err = CountTableStatus::new(&fixture.schema, fixture.index("item_oid"))
        .expect_err("indexes have no table status");

    assert!(err.is_invalid_argument());
}

// product

fn orders_and_addresses(fixture: &Fixture) -> OperatorRef {
    Arc::new(
        Filter::new(
            full_scan(fixture),
            vec![fixture.order.clone(), fixture.address.clone()],
        )
        .expect("filter should build"),
    )
}

#[test]
fn product_crosses_rows_within_each_branch() {
    let fixture = Fixture::standard();
    let customer = fixture.customer.hkey_table().expect("customer ordinal");
    let product = Product::new(
        &fixture.schema,
        orders_and_addresses(&fixture),
        fixture.order.clone(),
        fixture.address.clone(),
        customer,
    )
    .expect("product should build");

    let rows = run(&product, &fixture.context());

    // [oid, cid, salesman, aid, cid, address]
    assert_eq!(ints(&rows, 0), vec![11, 12, 11, 12, 21, 22, 21, 22]);
    assert_eq!(
        ints(&rows, 3),
        vec![1001, 1001, 1002, 1002, 2001, 2001, 2002, 2002]
    );
    let first = &rows[0];
    assert_eq!(first.nfields(), 6);
    assert_eq!(
        first.hkey().and_then(|hkey| hkey.table_ordinal()),
        fixture.order.hkey_table()
    );
}

#[test]
fn product_rejects_rows_of_other_types() {
    let fixture = Fixture::standard();
    let customer = fixture.customer.hkey_table().expect("customer ordinal");
    let product = Product::new(
        &fixture.schema,
        full_scan(&fixture),
        fixture.order.clone(),
        fixture.address.clone(),
        customer,
    )
    .expect("product should build");
    let context = fixture.context();

    let mut cursor = product.cursor(&context).expect("cursor should build");
    cursor.open().expect("open should succeed");
    let err = cursor.next().expect_err("customer rows are not product inputs");

    assert!(err.is_incompatible_row());
}

#[test]
fn product_of_a_type_with_itself_is_rejected() {
    let fixture = Fixture::standard();
    let customer = fixture.customer.hkey_table().expect("customer ordinal");

    let err = Product::new(
        &fixture.schema,
        full_scan(&fixture),
        fixture.order.clone(),
        fixture.order.clone(),
        customer,
    )
    .expect_err("self product");

    assert!(err.is_invalid_argument());
}
