use crate::{
    db::{
        context::QueryContext,
        executor::{
            cursor::CursorBox,
            lookup::{
                InputPreservation, check_preservation,
                pipeline::{Fetcher, LookupCursor},
                require_hkey,
            },
            operator::{Operator, OperatorRef},
        },
        row::Row,
        schema::{GroupRef, Ordinal, RowTypeRef},
        store::{KeySpace, RawKey},
    },
    error::InternalError,
};
use std::sync::Arc;
use tracing::trace;

///
/// AncestorLookup
///
/// For each input row of `input_type`, fetch the requested ancestor rows
/// on the path from the group root to the row's hkey, shallowest first.
/// A missing ancestor contributes nothing.
///

#[derive(Debug)]
pub struct AncestorLookup {
    input: OperatorRef,
    input_type: RowTypeRef,
    fetcher: Arc<AncestorFetcher>,
    preservation: InputPreservation,
    lookahead: Option<usize>,
}

impl AncestorLookup {
    pub fn new(
        input: OperatorRef,
        group: GroupRef,
        input_type: RowTypeRef,
        ancestor_types: Vec<RowTypeRef>,
        preservation: InputPreservation,
    ) -> Result<Self, InternalError> {
        check_preservation(&input_type, preservation)?;
        let input_table = input_type
            .hkey_table()
            .filter(|table| group.contains(*table))
            .ok_or_else(|| {
                InternalError::plan_invalid(format!(
                    "{input_type} does not carry an hkey of group {}",
                    group.name()
                ))
            })?;
        if ancestor_types.is_empty() {
            return Err(InternalError::plan_invalid(
                "ancestor lookup requires at least one ancestor type",
            ));
        }

        // Index and hkey rows name their own table too; table rows only
        // have strict ancestors.
        let own_table_allowed = !input_type.is_table();
        let mut ancestors = Vec::with_capacity(ancestor_types.len());
        for ancestor in ancestor_types {
            let depth = ancestor
                .table()
                .filter(|table| {
                    group.is_ancestor(table.ordinal, input_table)
                        || (own_table_allowed && table.ordinal == input_table)
                })
                .map(|table| table.depth)
                .ok_or_else(|| {
                    InternalError::plan_invalid(format!(
                        "{ancestor} is not an ancestor of {input_type}"
                    ))
                })?;
            ancestors.push((depth, ancestor));
        }
        ancestors.sort_by_key(|(depth, _)| *depth);
        ancestors.dedup_by_key(|(depth, _)| *depth);

        let fetcher = AncestorFetcher {
            root: group.root(),
            ancestors,
            keep_input: preservation.keeps_input(),
        };

        Ok(Self {
            input,
            input_type,
            fetcher: Arc::new(fetcher),
            preservation,
            lookahead: None,
        })
    }

    /// Override the engine's default lookahead quantum; `0` disables it.
    #[must_use]
    pub const fn with_lookahead(mut self, quantum: usize) -> Self {
        self.lookahead = Some(quantum);
        self
    }
}

impl Operator for AncestorLookup {
    fn cursor(&self, context: &Arc<QueryContext>) -> Result<CursorBox, InternalError> {
        let input = self.input.cursor(context)?;
        let quantum = self
            .lookahead
            .unwrap_or(context.config().lookahead_quantum);

        Ok(Box::new(LookupCursor::new(
            "AncestorLookup",
            context.clone(),
            input,
            self.input_type.clone(),
            self.fetcher.clone(),
            self.preservation.keeps_input(),
            quantum,
        )))
    }

    fn inputs(&self) -> Vec<&OperatorRef> {
        vec![&self.input]
    }

    fn describe(&self) -> String {
        let ancestors: Vec<&str> = self
            .fetcher
            .ancestors
            .iter()
            .map(|(_, row_type)| row_type.name())
            .collect();
        format!(
            "AncestorLookup({} -> {}, {:?})",
            self.input_type,
            ancestors.join(", "),
            self.preservation
        )
    }
}

#[derive(Debug)]
struct AncestorFetcher {
    root: Ordinal,
    ancestors: Vec<(usize, RowTypeRef)>,
    keep_input: bool,
}

impl Fetcher for AncestorFetcher {
    fn fetch(&self, context: &Arc<QueryContext>, row: &Row) -> Result<Vec<Row>, InternalError> {
        let hkey = require_hkey(row)?;
        let mut rows = Vec::with_capacity(self.ancestors.len() + 1);

        for (depth, ancestor_type) in &self.ancestors {
            if *depth >= hkey.len() {
                continue;
            }
            let ancestor_hkey = hkey.ancestor(*depth);
            let key = RawKey::from_hkey(&ancestor_hkey);
            match context.store().get(KeySpace::Group(self.root), &key)? {
                Some(record) => rows.push(Row::new(
                    ancestor_type.clone(),
                    record.values,
                    Some(record.hkey),
                )),
                None => trace!(%ancestor_hkey, "ancestor missing, nothing emitted"),
            }
        }
        if self.keep_input {
            rows.push(row.clone());
        }

        Ok(rows)
    }
}
