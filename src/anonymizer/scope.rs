//! Scope resolution pre-pass
//!
//! Before a statement is rewritten, this pass walks it once (read-only) and
//! records every table it references, the alias each table is known by, and
//! which columns the statement itself attributes to each table. Table
//! placeholders are fixed here, so the rewrite can resolve `alias.col` no
//! matter where in the tree the alias is declared.
//!
//! Scope is flat: one alias namespace per statement, last binding wins.

use std::collections::{HashMap, HashSet};
use std::ops::ControlFlow;

use sqlparser::ast::{
    AlterTableOperation, ColumnDef, ColumnOption, Expr, Ident, ObjectName, ObjectType, Query,
    SelectItem, SetExpr, Statement, TableConstraint, TableFactor, Visit, Visitor,
};

use super::registry::{Category, PlaceholderRegistry};
use crate::util::ident_key;

/// Normalized dot-joined table path, skipping empty parts.
///
/// Returns `None` when the name has no usable parts.
pub fn table_path(parts: &[Ident]) -> Option<String> {
    let path = parts
        .iter()
        .map(|part| part.value.as_str())
        .filter(|value| !value.is_empty())
        .collect::<Vec<_>>()
        .join(".");
    (!path.is_empty()).then(|| ident_key(&path))
}

/// What an alias (or bare table name) used as a qualifier points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasBinding {
    /// Normalized full path of the table
    pub table_path: String,
    /// True for `AS alias`; false when the table is referred to by its own name
    pub explicit: bool,
}

/// Resolved qualifier of a column reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualifierTarget<'a> {
    pub table_path: &'a str,
    /// The qualifier spells the table's name rather than an alias, so it must
    /// be renamed along with the table.
    pub names_table: bool,
}

/// Tables and aliases visible to one statement.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    aliases: HashMap<String, AliasBinding>,
    tables: Vec<String>,
    known_columns: HashMap<String, HashSet<String>>,
    projection_aliases: HashSet<String>,
    insert_target: Option<String>,
}

impl Scope {
    /// Normalized table paths in first-encounter order.
    pub fn tables(&self) -> &[String] {
        &self.tables
    }

    pub fn alias(&self, alias: &str) -> Option<&AliasBinding> {
        self.aliases.get(&ident_key(alias))
    }

    /// Resolve the qualifier parts of `qualifier.column`.
    ///
    /// A multi-part qualifier that spells a table path in scope wins; otherwise
    /// the last qualifier part is looked up as an alias.
    pub fn resolve_qualifier(&self, qualifier: &[Ident]) -> Option<QualifierTarget<'_>> {
        if qualifier.len() > 1 {
            if let Some(path) = table_path(qualifier) {
                if let Some(table) = self.tables.iter().find(|t| **t == path) {
                    return Some(QualifierTarget {
                        table_path: table,
                        names_table: true,
                    });
                }
            }
        }

        let last = qualifier.last()?;
        let binding = self.alias(&last.value)?;
        Some(QualifierTarget {
            table_path: &binding.table_path,
            names_table: !binding.explicit,
        })
    }

    /// Whether the statement itself attributes `column` to `table`
    /// (qualified references, column definitions, INSERT column lists).
    pub fn knows_column(&self, table: &str, column: &str) -> bool {
        self.known_columns
            .get(table)
            .is_some_and(|columns| columns.contains(&ident_key(column)))
    }

    /// Whether `name` is an output alias of a SELECT list in this statement.
    pub fn is_projection_alias(&self, name: &str) -> bool {
        self.projection_aliases.contains(&ident_key(name))
    }

    /// Target table of an INSERT statement.
    pub fn insert_target(&self) -> Option<&str> {
        self.insert_target.as_deref()
    }

    fn add_table(&mut self, path: &str) {
        if !self.tables.iter().any(|t| t == path) {
            self.tables.push(path.to_string());
        }
    }

    fn know_columns<'a>(&mut self, table: &str, columns: impl IntoIterator<Item = &'a Ident>) {
        self.known_columns
            .entry(table.to_string())
            .or_default()
            .extend(columns.into_iter().map(|c| ident_key(&c.value)));
    }
}

/// How a table reference introduces its alias.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AliasSource<'a> {
    /// `FROM t AS a`
    Explicit(&'a Ident),
    /// `FROM t`: the last path segment acts as the alias, last write wins
    TableName,
    /// Any other relation (INSERT target, DDL): binds only if the name is free
    Relation,
}

struct ScopeCollector<'r> {
    registry: &'r mut PlaceholderRegistry,
    scope: Scope,
    /// Qualified column references, attributed once all aliases are known
    qualified: Vec<(Vec<Ident>, Ident)>,
    /// Columns listed by an INSERT whose target relation has not been seen yet
    pending_insert: Option<Vec<Ident>>,
}

impl ScopeCollector<'_> {
    fn register_table(&mut self, name: &ObjectName, source: AliasSource<'_>) -> Option<String> {
        let path = table_path(&name.0)?;
        self.registry.placeholder_for(Category::Table, &path);
        self.scope.add_table(&path);

        let (alias, explicit, overwrite) = match source {
            AliasSource::Explicit(alias) => (ident_key(&alias.value), true, true),
            AliasSource::TableName => (last_segment(name)?, false, true),
            AliasSource::Relation => (last_segment(name)?, false, false),
        };
        let binding = AliasBinding {
            table_path: path.clone(),
            explicit,
        };
        if overwrite {
            self.scope.aliases.insert(alias, binding);
        } else {
            self.scope.aliases.entry(alias).or_insert(binding);
        }

        Some(path)
    }

    fn register_foreign_key(&mut self, foreign_table: &ObjectName, referred_columns: &[Ident]) {
        if let Some(path) = self.register_table(foreign_table, AliasSource::Relation) {
            self.scope.know_columns(&path, referred_columns);
        }
    }

    /// Column definition of `table` (`None` when the table name is unusable).
    fn collect_column_def(&mut self, table: Option<&str>, column: &ColumnDef) {
        if let Some(table) = table {
            self.scope.know_columns(table, [&column.name]);
        }
        for option in &column.options {
            if let ColumnOption::ForeignKey {
                foreign_table,
                referred_columns,
                ..
            } = &option.option
            {
                self.register_foreign_key(foreign_table, referred_columns);
            }
        }
    }

    fn collect_constraint(&mut self, table: Option<&str>, constraint: &TableConstraint) {
        match constraint {
            TableConstraint::PrimaryKey { columns, .. }
            | TableConstraint::Unique { columns, .. }
            | TableConstraint::Index { columns, .. } => {
                if let Some(table) = table {
                    self.scope.know_columns(table, columns);
                }
            }
            TableConstraint::ForeignKey {
                columns,
                foreign_table,
                referred_columns,
                ..
            } => {
                if let Some(table) = table {
                    self.scope.know_columns(table, columns);
                }
                self.register_foreign_key(foreign_table, referred_columns);
            }
            _ => {}
        }
    }

    fn collect_projection_aliases(&mut self, body: &SetExpr) {
        match body {
            SetExpr::Select(select) => {
                for item in &select.projection {
                    if let SelectItem::ExprWithAlias { expr, alias } = item {
                        // `SELECT name AS name` keeps `name` a real column
                        let same_name = match expr {
                            Expr::Identifier(ident) => ident_key(&ident.value) == ident_key(&alias.value),
                            Expr::CompoundIdentifier(parts) => parts
                                .last()
                                .is_some_and(|p| ident_key(&p.value) == ident_key(&alias.value)),
                            _ => false,
                        };
                        if !same_name {
                            self.scope.projection_aliases.insert(ident_key(&alias.value));
                        }
                    }
                }
            }
            SetExpr::SetOperation { left, right, .. } => {
                self.collect_projection_aliases(left);
                self.collect_projection_aliases(right);
            }
            _ => {}
        }
    }

    fn finish(mut self) -> Scope {
        for (qualifier, column) in std::mem::take(&mut self.qualified) {
            let owner = self
                .scope
                .resolve_qualifier(&qualifier)
                .map(|target| target.table_path.to_string());
            if let Some(table) = owner {
                self.scope.know_columns(&table, [&column]);
            }
        }
        self.scope
    }
}

fn last_segment(name: &ObjectName) -> Option<String> {
    name.0
        .iter()
        .rev()
        .find(|part| !part.value.is_empty())
        .map(|part| ident_key(&part.value))
}

impl Visitor for ScopeCollector<'_> {
    type Break = ();

    fn pre_visit_statement(&mut self, statement: &Statement) -> ControlFlow<Self::Break> {
        match statement {
            Statement::CreateTable(create) => {
                let path = self.register_table(&create.name, AliasSource::Relation);
                for column in &create.columns {
                    self.collect_column_def(path.as_deref(), column);
                }
                for constraint in &create.constraints {
                    self.collect_constraint(path.as_deref(), constraint);
                }
            }
            Statement::AlterTable {
                name, operations, ..
            } => {
                let path = self.register_table(name, AliasSource::Relation);
                for operation in operations {
                    match operation {
                        AlterTableOperation::AddConstraint(constraint) => {
                            self.collect_constraint(path.as_deref(), constraint);
                        }
                        AlterTableOperation::AddColumn { column_def, .. } => {
                            self.collect_column_def(path.as_deref(), column_def);
                        }
                        AlterTableOperation::RenameTable { table_name } => {
                            if let Some(new_path) = table_path(&table_name.0) {
                                self.registry.placeholder_for(Category::Table, &new_path);
                            }
                        }
                        _ => {}
                    }
                }
            }
            Statement::CreateView { name, .. } => {
                // A view gets a table placeholder but is not a source of the
                // columns its query selects
                if let Some(path) = table_path(&name.0) {
                    self.registry.placeholder_for(Category::Table, &path);
                }
            }
            Statement::Insert(insert) => {
                // The target relation is the first relation visited below
                self.pending_insert = Some(insert.columns.clone());
            }
            Statement::Drop {
                object_type: ObjectType::Table | ObjectType::View,
                names,
                ..
            } => {
                for name in names {
                    self.register_table(name, AliasSource::Relation);
                }
            }
            _ => {}
        }
        ControlFlow::Continue(())
    }

    fn pre_visit_query(&mut self, query: &Query) -> ControlFlow<Self::Break> {
        if let Some(with) = &query.with {
            for cte in &with.cte_tables {
                let name = ObjectName(vec![cte.alias.name.clone()]);
                self.register_table(&name, AliasSource::Relation);
            }
        }
        self.collect_projection_aliases(&query.body);
        ControlFlow::Continue(())
    }

    fn pre_visit_table_factor(&mut self, table_factor: &TableFactor) -> ControlFlow<Self::Break> {
        if let TableFactor::Table { name, alias, .. } = table_factor {
            let source = match alias {
                Some(alias) => AliasSource::Explicit(&alias.name),
                None => AliasSource::TableName,
            };
            self.register_table(name, source);
        }
        ControlFlow::Continue(())
    }

    fn pre_visit_relation(&mut self, relation: &ObjectName) -> ControlFlow<Self::Break> {
        let path = self.register_table(relation, AliasSource::Relation);
        if let (Some(path), Some(columns)) = (path, self.pending_insert.take()) {
            self.scope.know_columns(&path, &columns);
            self.scope.insert_target = Some(path);
        }
        ControlFlow::Continue(())
    }

    fn pre_visit_expr(&mut self, expr: &Expr) -> ControlFlow<Self::Break> {
        if let Expr::CompoundIdentifier(parts) = expr {
            if let Some((column, qualifier)) = parts.split_last() {
                if !qualifier.is_empty() {
                    self.qualified.push((qualifier.to_vec(), column.clone()));
                }
            }
        }
        ControlFlow::Continue(())
    }
}

/// Run the pre-pass over one statement.
///
/// Registers a table placeholder for every table reference (first-sight
/// order) and returns the statement's scope.
pub fn resolve_scope(statement: &Statement, registry: &mut PlaceholderRegistry) -> Scope {
    let mut collector = ScopeCollector {
        registry,
        scope: Scope::default(),
        qualified: Vec::new(),
        pending_insert: None,
    };
    let _ = statement.visit(&mut collector);
    collector.finish()
}
