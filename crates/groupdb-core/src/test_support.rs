//! Shared fixtures for unit tests: one customer/order/item/address group
//! and the rows most operator tests run against.

use crate::{
    config::EngineConfig,
    db::{
        context::QueryContext,
        row::Row,
        schema::{RowTypeRef, Schema, SchemaBuilder},
        store::{MemoryStore, StorageAdapter},
        write::RowWriter,
    },
    value::Value,
};
use std::sync::{Arc, Once};
use tracing_subscriber::EnvFilter;

static TRACING: Once = Once::new();

/// Install a fmt subscriber once per test process; `RUST_LOG` filters.
pub fn init_tracing_for_tests() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// customer(cid, name)
///   order(oid, cid, salesman)
///     item(iid, oid)
///   address(aid, cid, address)
pub fn fixture_schema() -> Arc<Schema> {
    SchemaBuilder::new()
        .table("customer", &["cid", "name"], &["cid"])
        .child_table("order", &["oid", "cid", "salesman"], &["oid"], "customer", &["cid"])
        .child_table("item", &["iid", "oid"], &["iid"], "order", &["oid"])
        .child_table(
            "address",
            &["aid", "cid", "address"],
            &["aid"],
            "customer",
            &["cid"],
        )
        .index("customer_name", "customer", &["name"])
        .index("order_salesman", "order", &["salesman"])
        .index("item_oid", "item", &["oid"])
        .index("address_address", "address", &["address"])
        .build()
        .expect("fixture schema should build")
}

///
/// Fixture
///

pub struct Fixture {
    pub schema: Arc<Schema>,
    pub store: Arc<MemoryStore>,
    pub customer: RowTypeRef,
    pub order: RowTypeRef,
    pub item: RowTypeRef,
    pub address: RowTypeRef,
}

impl Fixture {
    /// Schema with an empty store.
    pub fn empty() -> Self {
        init_tracing_for_tests();
        let schema = fixture_schema();
        let table = |name: &str| schema.table(name).expect("fixture table should exist");

        Self {
            customer: table("customer"),
            order: table("order"),
            item: table("item"),
            address: table("address"),
            store: Arc::new(MemoryStore::new()),
            schema,
        }
    }

    /// Two customers, each with two orders of two items and two
    /// addresses.
    pub fn standard() -> Self {
        let fixture = Self::empty();
        fixture.load_standard();
        fixture
    }

    pub fn load_standard(&self) {
        for (cid, name) in [(1, "xyz"), (2, "abc")] {
            self.insert(&self.customer, vec![Value::Int(cid), name.into()]);
        }
        for (oid, cid, salesman) in [(11, 1, "ori"), (12, 1, "david"), (21, 2, "tom"), (22, 2, "jack")] {
            self.insert(
                &self.order,
                vec![Value::Int(oid), Value::Int(cid), salesman.into()],
            );
        }
        for oid in [11, 12, 21, 22] {
            for n in 1..=2 {
                self.insert(&self.item, vec![Value::Int(oid * 10 + n), Value::Int(oid)]);
            }
        }
        for (aid, cid, address) in [
            (1001, 1, "111 1111 st"),
            (1002, 1, "111 2222 st"),
            (2001, 2, "222 1111 st"),
            (2002, 2, "222 2222 st"),
        ] {
            self.insert(
                &self.address,
                vec![Value::Int(aid), Value::Int(cid), address.into()],
            );
        }
    }

    pub fn writer(&self) -> RowWriter<'_> {
        RowWriter::new(&self.schema, self.store.as_ref())
    }

    /// Insert and commit one row.
    pub fn insert(&self, table: &RowTypeRef, values: Vec<Value>) -> Row {
        self.committed(|| {
            self.writer()
                .insert(table, values)
                .expect("fixture insert should succeed")
        })
    }

    /// Run `write` inside a committed store transaction.
    pub fn committed<T>(&self, write: impl FnOnce() -> T) -> T {
        self.store
            .begin_transaction()
            .expect("fixture transaction should begin");
        let out = write();
        self.store
            .commit_transaction()
            .expect("fixture transaction should commit");
        out
    }

    pub fn adapter(&self) -> Arc<dyn StorageAdapter> {
        self.store.clone()
    }

    pub fn context(&self) -> Arc<QueryContext> {
        self.context_with(EngineConfig::default())
    }

    pub fn context_with(&self, config: EngineConfig) -> Arc<QueryContext> {
        Arc::new(QueryContext::with_config(
            self.schema.clone(),
            self.adapter(),
            config,
        ))
    }

    pub fn context_with_parameters(&self, parameters: Vec<Value>) -> Arc<QueryContext> {
        Arc::new(
            QueryContext::with_config(self.schema.clone(), self.adapter(), EngineConfig::default())
                .with_parameters(parameters),
        )
    }

    pub fn index(&self, name: &str) -> RowTypeRef {
        self.schema.index(name).expect("fixture index should exist")
    }
}

/// Column values of each row, for compact assertions.
pub fn values_of(rows: &[Row]) -> Vec<Vec<Value>> {
    rows.iter().map(|row| row.values().to_vec()).collect()
}

/// Integer value of field `field` of each row.
pub fn ints(rows: &[Row], field: usize) -> Vec<i64> {
    rows.iter()
        .map(|row| {
            row.value(field)
                .and_then(Value::as_i64)
                .expect("fixture field should be an integer")
        })
        .collect()
}
