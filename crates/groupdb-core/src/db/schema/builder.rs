use crate::{
    db::schema::{
        Group, HKeyLevel, IndexDescriptor, IndexId, Ordinal, RowType, RowTypeId, RowTypeKind,
        RowTypeRef, Schema, TableDescriptor,
    },
    error::InternalError,
};
use std::{collections::HashSet, sync::Arc};

///
/// TableSpec
///

#[derive(Clone, Debug)]
struct TableSpec {
    name: String,
    columns: Vec<String>,
    primary_key: Vec<String>,
    parent: Option<ParentSpec>,
}

#[derive(Clone, Debug)]
struct ParentSpec {
    table: String,
    join_columns: Vec<String>,
}

#[derive(Clone, Debug)]
struct IndexSpec {
    name: String,
    table: String,
    columns: Vec<String>,
}

///
/// SchemaBuilder
///
/// Declarative catalog input. Parents must be declared before their
/// children; ordinals are assigned depth-first per group at `build()`.
///

#[derive(Debug, Default)]
pub struct SchemaBuilder {
    tables: Vec<TableSpec>,
    indexes: Vec<IndexSpec>,
}

fn owned(names: &[&str]) -> Vec<String> {
    names.iter().map(ToString::to_string).collect()
}

impl SchemaBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a group root table.
    #[must_use]
    pub fn table(mut self, name: &str, columns: &[&str], primary_key: &[&str]) -> Self {
        self.tables.push(TableSpec {
            name: name.to_string(),
            columns: owned(columns),
            primary_key: owned(primary_key),
            parent: None,
        });
        self
    }

    /// Declare a child table joined to `parent` through `join_columns`,
    /// which must line up with the parent's primary key.
    #[must_use]
    pub fn child_table(
        mut self,
        name: &str,
        columns: &[&str],
        primary_key: &[&str],
        parent: &str,
        join_columns: &[&str],
    ) -> Self {
        self.tables.push(TableSpec {
            name: name.to_string(),
            columns: owned(columns),
            primary_key: owned(primary_key),
            parent: Some(ParentSpec {
                table: parent.to_string(),
                join_columns: owned(join_columns),
            }),
        });
        self
    }

    #[must_use]
    pub fn index(mut self, name: &str, table: &str, columns: &[&str]) -> Self {
        self.indexes.push(IndexSpec {
            name: name.to_string(),
            table: table.to_string(),
            columns: owned(columns),
        });
        self
    }

    pub fn build(self) -> Result<Arc<Schema>, InternalError> {
        self.validate_names()?;

        let mut next_id = 1_u32;
        let mut next_ordinal = 1_u16;
        let mut groups = Vec::new();
        let mut all_tables: Vec<RowTypeRef> = Vec::new();

        for root in self.tables.iter().filter(|spec| spec.parent.is_none()) {
            let mut order = Vec::new();
            self.collect_depth_first(root, &mut order);

            let root_ordinal = Ordinal::new(next_ordinal);
            let mut group_tables: Vec<RowTypeRef> = Vec::new();
            for spec in order {
                let ordinal = Ordinal::new(next_ordinal);
                next_ordinal = next_ordinal
                    .checked_add(1)
                    .ok_or_else(|| InternalError::plan_invalid("too many tables in schema"))?;

                let descriptor = Self::describe_table(spec, ordinal, root_ordinal, &group_tables)?;
                let row_type = Arc::new(RowType::new(
                    RowTypeId::new(next_id),
                    spec.name.clone(),
                    spec.columns.len(),
                    RowTypeKind::Table(descriptor),
                ));
                next_id += 1;
                group_tables.push(row_type);
            }

            all_tables.extend(group_tables.iter().cloned());
            groups.push(Arc::new(Group {
                name: root.name.clone(),
                root: root_ordinal,
                tables: group_tables,
            }));
        }

        let mut indexes = Vec::new();
        for (position, spec) in self.indexes.iter().enumerate() {
            let id = u16::try_from(position + 1)
                .map_err(|_| InternalError::plan_invalid("too many indexes in schema"))?;
            let table_type = all_tables
                .iter()
                .find(|row_type| row_type.name() == spec.table)
                .ok_or_else(|| {
                    InternalError::plan_invalid(format!(
                        "index {} references unknown table {}",
                        spec.name, spec.table
                    ))
                })?;
            let Some(table) = table_type.table() else {
                return Err(InternalError::plan_invalid(format!(
                    "index {} must target a table",
                    spec.name
                )));
            };
            let key_columns = resolve_columns(table, &spec.columns, &spec.name)?;
            let descriptor = IndexDescriptor {
                id: IndexId::new(id),
                table: table.ordinal,
                group: table.group,
                key_columns,
                hkey_layout: table.hkey_layout.clone(),
            };
            let nfields = descriptor.key_len() + descriptor.hkey_value_count();

            indexes.push(Arc::new(RowType::new(
                RowTypeId::new(next_id),
                spec.name.clone(),
                nfields,
                RowTypeKind::Index(descriptor),
            )));
            next_id += 1;
        }

        Ok(Arc::new(Schema::new(groups, all_tables, indexes, next_id)))
    }

    fn validate_names(&self) -> Result<(), InternalError> {
        let mut seen = HashSet::new();
        for name in self
            .tables
            .iter()
            .map(|spec| &spec.name)
            .chain(self.indexes.iter().map(|spec| &spec.name))
        {
            if !seen.insert(name.as_str()) {
                return Err(InternalError::plan_invalid(format!(
                    "duplicate schema object name: {name}"
                )));
            }
        }

        for (position, spec) in self.tables.iter().enumerate() {
            if spec.primary_key.is_empty() {
                return Err(InternalError::plan_invalid(format!(
                    "table {} needs a primary key",
                    spec.name
                )));
            }
            if let Some(parent) = &spec.parent {
                let declared_before = self.tables[..position]
                    .iter()
                    .any(|earlier| earlier.name == parent.table);
                if !declared_before {
                    return Err(InternalError::plan_invalid(format!(
                        "table {} references undeclared parent {}",
                        spec.name, parent.table
                    )));
                }
            }
        }

        Ok(())
    }

    fn collect_depth_first<'a>(&'a self, spec: &'a TableSpec, out: &mut Vec<&'a TableSpec>) {
        out.push(spec);
        for child in self.tables.iter().filter(|candidate| {
            candidate
                .parent
                .as_ref()
                .is_some_and(|parent| parent.table == spec.name)
        }) {
            self.collect_depth_first(child, out);
        }
    }

    fn describe_table(
        spec: &TableSpec,
        ordinal: Ordinal,
        group: Ordinal,
        earlier: &[RowTypeRef],
    ) -> Result<TableDescriptor, InternalError> {
        let mut draft = TableDescriptor {
            ordinal,
            group,
            parent: None,
            depth: 0,
            columns: spec.columns.clone(),
            primary_key: Vec::new(),
            parent_join: Vec::new(),
            hkey_layout: Vec::new(),
        };
        draft.primary_key = resolve_columns(&draft, &spec.primary_key, &spec.name)?;

        let mut hkey_layout = Vec::new();
        if let Some(parent_spec) = &spec.parent {
            let parent = earlier
                .iter()
                .find(|row_type| row_type.name() == parent_spec.table)
                .and_then(|row_type| row_type.table())
                .ok_or_else(|| {
                    InternalError::plan_invalid(format!(
                        "parent {} of {} is not in the same group",
                        parent_spec.table, spec.name
                    ))
                })?;
            if parent_spec.join_columns.len() != parent.primary_key.len() {
                return Err(InternalError::plan_invalid(format!(
                    "join columns of {} must match the primary key of {}",
                    spec.name, parent_spec.table
                )));
            }

            draft.parent = Some(parent.ordinal);
            draft.depth = parent.depth + 1;
            draft.parent_join = resolve_columns(&draft, &parent_spec.join_columns, &spec.name)?;
            hkey_layout.extend(parent.hkey_layout.iter().copied());
        }
        hkey_layout.push(HKeyLevel {
            ordinal,
            key_len: draft.primary_key.len(),
        });
        draft.hkey_layout = hkey_layout;

        Ok(draft)
    }
}

fn resolve_columns(
    table: &TableDescriptor,
    names: &[String],
    owner: &str,
) -> Result<Vec<usize>, InternalError> {
    names
        .iter()
        .map(|name| {
            table.column_position(name).ok_or_else(|| {
                InternalError::plan_invalid(format!("{owner} references unknown column {name}"))
            })
        })
        .collect()
}
