use crate::{
    db::{
        context::QueryContext,
        executor::{
            cursor::{CursorBox, collect_rows},
            lookup::{
                InputPreservation, check_preservation,
                pipeline::{Fetcher, LookupCursor},
                require_hkey,
            },
            operator::{Operator, OperatorRef},
            scan::{GroupCursor, GroupScanRange},
        },
        row::Row,
        schema::{GroupRef, Ordinal, RowTypeRef},
    },
    error::InternalError,
};
use std::sync::Arc;

///
/// BranchLookup
///
/// For each input row of `input_type`, fetch the whole branch of the
/// group that holds `output_type` rows related to it: the subtree of
/// the common ancestor of both tables, narrowed to the output table's
/// position when the output sits directly below that ancestor. Rows are
/// produced in hkey order, orphans included.
///

#[derive(Debug)]
pub struct BranchLookup {
    input: OperatorRef,
    input_type: RowTypeRef,
    output_type: RowTypeRef,
    fetcher: Arc<BranchFetcher>,
    preservation: InputPreservation,
    lookahead: Option<usize>,
}

impl BranchLookup {
    pub fn new(
        input: OperatorRef,
        group: GroupRef,
        input_type: RowTypeRef,
        output_type: RowTypeRef,
        preservation: InputPreservation,
    ) -> Result<Self, InternalError> {
        check_preservation(&input_type, preservation)?;
        if input_type == output_type {
            return Err(InternalError::plan_invalid(format!(
                "branch lookup output {output_type} is the same as its input"
            )));
        }
        let in_group = |row_type: &RowTypeRef| {
            row_type
                .hkey_table()
                .filter(|table| group.contains(*table))
                .ok_or_else(|| {
                    InternalError::plan_invalid(format!(
                        "{row_type} does not belong to group {}",
                        group.name()
                    ))
                })
        };
        let input_table = in_group(&input_type)?;
        if !output_type.is_table() {
            return Err(InternalError::plan_invalid(format!(
                "branch lookup output {output_type} is not a table type"
            )));
        }
        let output_table = in_group(&output_type)?;

        let common = group
            .common_ancestor(input_table, output_table)
            .ok_or_else(|| {
                InternalError::plan_invalid(format!(
                    "{input_type} and {output_type} share no ancestor"
                ))
            })?;
        let common_depth = group.depth(common).unwrap_or_default();
        let output_depth = group.depth(output_table).unwrap_or_default();

        let (branch_root, input_precedes_branch) = match output_depth - common_depth {
            0 => (None, false),
            1 if input_table == common => (Some(output_table), true),
            1 => {
                let input_branch = group.child_on_path(common, input_table).ok_or_else(|| {
                    InternalError::plan_invalid(format!(
                        "{input_type} has no ancestor below table {common}"
                    ))
                })?;
                (Some(output_table), input_branch < output_table)
            }
            _ => {
                return Err(InternalError::plan_invalid(format!(
                    "{output_type} is more than one level below the common ancestor of {input_type}"
                )));
            }
        };

        let fetcher = BranchFetcher {
            group: group.clone(),
            common_depth,
            branch_root,
            keep_input: preservation.keeps_input(),
            input_precedes_branch,
        };

        Ok(Self {
            input,
            input_type,
            output_type,
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

impl Operator for BranchLookup {
    fn cursor(&self, context: &Arc<QueryContext>) -> Result<CursorBox, InternalError> {
        let input = self.input.cursor(context)?;
        let quantum = self
            .lookahead
            .unwrap_or(context.config().lookahead_quantum);

        Ok(Box::new(LookupCursor::new(
            "BranchLookup",
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
        format!(
            "BranchLookup({} -> {}, {:?})",
            self.input_type, self.output_type, self.preservation
        )
    }
}

#[derive(Debug)]
struct BranchFetcher {
    group: GroupRef,
    common_depth: usize,
    branch_root: Option<Ordinal>,
    keep_input: bool,
    input_precedes_branch: bool,
}

impl Fetcher for BranchFetcher {
    fn fetch(&self, context: &Arc<QueryContext>, row: &Row) -> Result<Vec<Row>, InternalError> {
        let hkey = require_hkey(row)?;
        let mut lookup = hkey.ancestor(self.common_depth);
        if let Some(branch_root) = self.branch_root {
            lookup = lookup.extend_with_ordinal(branch_root);
        }

        let range = GroupScanRange::Row {
            hkey: lookup,
            deep: true,
        };
        let mut scan = GroupCursor::new(context.clone(), self.group.clone(), range);
        let branch = collect_rows(&mut scan)?;

        let mut rows = Vec::with_capacity(branch.len() + 1);
        if self.keep_input && self.input_precedes_branch {
            rows.push(row.clone());
        }
        rows.extend(branch);
        if self.keep_input && !self.input_precedes_branch {
            rows.push(row.clone());
        }

        Ok(rows)
    }
}
