//! Anonymizing tree rewriter
//!
//! Walks an owned copy of a statement with [`VisitorMut`] and replaces
//! identifiers and literal values in place on that copy. Every node kind the
//! rewriter does not handle is left as parsed while its children are still
//! visited, so surrounding syntax (casts, functions, dialect extensions)
//! survives untouched.
//!
//! Every name is renamed exactly once. Names the walk reaches as relations
//! (FROM items, INSERT targets, the CREATE TABLE and ALTER TABLE name) are
//! left to [`VisitorMut::pre_visit_relation`]; statement-level handlers only
//! rename the names the walk never reports as relations, such as REFERENCES
//! targets, DROP lists and view names.

use std::ops::ControlFlow;

use sqlparser::ast::{
    AlterTableOperation, AssignmentTarget, ColumnDef, ColumnOption, CreateTable,
    DollarQuotedString, Expr, Ident, ObjectName, ObjectType, Query, SchemaName, SelectItem,
    SetExpr, Statement, TableConstraint, Value, ViewColumnDef, VisitMut, VisitorMut,
};

use super::columns::{ColumnOwner, ColumnRegistry};
use super::registry::{Category, PlaceholderRegistry};
use super::scope::{table_path, Scope};
use super::{Diagnostic, DiagnosticKind};

/// Copy of `ident` carrying a new value; quote style is preserved.
fn renamed(ident: &Ident, value: &str) -> Ident {
    let mut out = ident.clone();
    out.value = value.to_string();
    out
}

pub(crate) struct Rewriter<'a> {
    pub placeholders: &'a mut PlaceholderRegistry,
    pub columns: &'a mut ColumnRegistry,
    pub scope: &'a Scope,
    pub diagnostics: &'a mut Vec<Diagnostic>,
    pub strict_mode: bool,
}

impl Rewriter<'_> {
    /// Rewrite one statement, returning the anonymized copy.
    pub fn rewrite(&mut self, statement: &Statement) -> Statement {
        let mut rewritten = statement.clone();
        let _ = rewritten.visit(self);
        rewritten
    }

    fn diagnose(&mut self, kind: DiagnosticKind, message: String) {
        let message = if self.strict_mode && kind != DiagnosticKind::StructuralMismatch {
            format!("Strict mode: {}", message)
        } else {
            message
        };
        log::warn!("{}", message);
        self.diagnostics.push(Diagnostic { kind, message });
    }

    // ------------------------------------------------------------------
    // Tables and containers
    // ------------------------------------------------------------------

    /// Rename a table path: the last part becomes `table_placeholder`, the part
    /// before it a schema, and anything earlier a database.
    fn rename_table_parts(&mut self, parts: &[Ident], table_placeholder: &str) -> Vec<Ident> {
        let last = parts.len().saturating_sub(1);
        parts
            .iter()
            .enumerate()
            .map(|(i, part)| {
                if i == last {
                    renamed(part, table_placeholder)
                } else if i + 1 == last {
                    self.rename_container(part, Category::Schema)
                } else {
                    self.rename_container(part, Category::Database)
                }
            })
            .collect()
    }

    fn rename_container(&mut self, part: &Ident, category: Category) -> Ident {
        if part.value.is_empty() {
            // `db..table` style gaps carry no name to replace
            return part.clone();
        }
        let placeholder = self.placeholders.placeholder_for(category, &part.value);
        renamed(part, &placeholder)
    }

    /// Rename a standalone schema or database name (`CREATE SCHEMA a.b`).
    fn rename_container_name(&mut self, name: &ObjectName, category: Category) -> ObjectName {
        let last = name.0.len().saturating_sub(1);
        let parts = name
            .0
            .iter()
            .enumerate()
            .map(|(i, part)| {
                let part_category = if i == last { category } else { Category::Database };
                self.rename_container(part, part_category)
            })
            .collect();
        ObjectName(parts)
    }

    /// Replace a table reference using the placeholder fixed by the pre-pass.
    /// A name with no registered placeholder is left as-is.
    fn rename_table(&mut self, name: &ObjectName) -> Option<ObjectName> {
        let path = table_path(&name.0)?;
        let placeholder = self.placeholders.lookup(Category::Table, &path)?.to_string();
        Some(ObjectName(self.rename_table_parts(&name.0, &placeholder)))
    }

    fn rename_table_in_place(&mut self, name: &mut ObjectName) {
        if let Some(new_name) = self.rename_table(name) {
            *name = new_name;
        }
    }

    // ------------------------------------------------------------------
    // Columns
    // ------------------------------------------------------------------

    /// Decide which table owns a column reference.
    fn resolve_column(&mut self, qualifier: &[Ident], column: &str) -> ColumnOwner {
        let scope = self.scope;
        if !qualifier.is_empty() {
            if let Some(target) = scope.resolve_qualifier(qualifier) {
                return ColumnOwner::Table(target.table_path.to_string());
            }
        }

        let candidates: Vec<&String> = scope
            .tables()
            .iter()
            .filter(|table| {
                self.columns.has_column(table, column) || scope.knows_column(table, column)
            })
            .collect();

        match candidates.as_slice() {
            [table] => ColumnOwner::Table((*table).clone()),
            [] if scope.tables().len() == 1 => ColumnOwner::Table(scope.tables()[0].clone()),
            [] => {
                self.diagnose(
                    DiagnosticKind::UnresolvedReference,
                    format!(
                        "Unqualified column '{}' could not be resolved to a table in the FROM clause. Using global fallback.",
                        column
                    ),
                );
                ColumnOwner::Global
            }
            many => {
                let tables = many
                    .iter()
                    .map(|t| t.as_str())
                    .collect::<Vec<_>>()
                    .join(", ");
                self.diagnose(
                    DiagnosticKind::AmbiguousReference,
                    format!(
                        "Unqualified column '{}' is ambiguous, found in multiple tables: [{}]. Using global fallback.",
                        column, tables
                    ),
                );
                ColumnOwner::Global
            }
        }
    }

    fn column_placeholder(&mut self, owner: &ColumnOwner, column: &Ident) -> Ident {
        let placeholder = self.columns.placeholder_for(owner, &column.value);
        renamed(column, &placeholder)
    }

    /// Rename `[qualifier..., column]` parts of a column reference.
    fn rename_column_parts(&mut self, parts: &[Ident]) -> Option<Vec<Ident>> {
        let (column, qualifier) = parts.split_last()?;
        if column.value.is_empty() {
            self.diagnose(
                DiagnosticKind::StructuralMismatch,
                format!(
                    "Column reference '{}' has no column name. Returning original.",
                    ObjectName(parts.to_vec())
                ),
            );
            return None;
        }

        let owner = self.resolve_column(qualifier, &column.value);
        let new_column = self.column_placeholder(&owner, column);

        let scope = self.scope;
        let mut new_qualifier = qualifier.to_vec();
        if let Some(target) = scope.resolve_qualifier(qualifier) {
            if target.names_table {
                let table_placeholder = self
                    .placeholders
                    .lookup(Category::Table, target.table_path)
                    .map(str::to_string);
                if let Some(table_placeholder) = table_placeholder {
                    new_qualifier = self.rename_table_parts(qualifier, &table_placeholder);
                }
            }
        }

        new_qualifier.push(new_column);
        Some(new_qualifier)
    }

    fn rename_unqualified(&mut self, ident: &Ident) -> Option<Ident> {
        // T-SQL variables and references to SELECT-list aliases are not columns
        if ident.value.is_empty()
            || ident.value.starts_with('@')
            || self.scope.is_projection_alias(&ident.value)
        {
            return None;
        }
        let owner = self.resolve_column(&[], &ident.value);
        Some(self.column_placeholder(&owner, ident))
    }

    fn rename_columns_of(&mut self, table: Option<&str>, columns: &mut [Ident]) {
        let owner = match table {
            Some(path) => ColumnOwner::Table(path.to_string()),
            None => ColumnOwner::Global,
        };
        for column in columns.iter_mut() {
            *column = self.column_placeholder(&owner, column);
        }
    }

    fn rename_assignment_target(&mut self, name: &mut ObjectName) {
        if let Some(parts) = self.rename_column_parts(&name.0) {
            *name = ObjectName(parts);
        }
    }

    // ------------------------------------------------------------------
    // Literals
    // ------------------------------------------------------------------

    /// Placeholder for textual content: values containing `@` are emails.
    fn text_placeholder(&mut self, text: &str) -> String {
        let category = if text.contains('@') {
            Category::Email
        } else {
            Category::String
        };
        self.placeholders.placeholder_for(category, text)
    }

    fn anonymize_value(&mut self, value: &Value) -> Option<Value> {
        let replaced = match value {
            Value::Number(number, long) => Value::Number(
                self.placeholders.placeholder_for(Category::Number, number),
                *long,
            ),
            Value::SingleQuotedString(s) => Value::SingleQuotedString(self.text_placeholder(s)),
            Value::DoubleQuotedString(s) => Value::DoubleQuotedString(self.text_placeholder(s)),
            Value::TripleSingleQuotedString(s) => {
                Value::TripleSingleQuotedString(self.text_placeholder(s))
            }
            Value::TripleDoubleQuotedString(s) => {
                Value::TripleDoubleQuotedString(self.text_placeholder(s))
            }
            Value::EscapedStringLiteral(s) => Value::EscapedStringLiteral(self.text_placeholder(s)),
            Value::NationalStringLiteral(s) => {
                Value::NationalStringLiteral(self.text_placeholder(s))
            }
            Value::DollarQuotedString(dollar) => Value::DollarQuotedString(DollarQuotedString {
                value: self.text_placeholder(&dollar.value),
                tag: dollar.tag.clone(),
            }),
            // Booleans, NULL, bind placeholders and binary literals carry no
            // anonymizable text
            _ => return None,
        };
        Some(replaced)
    }

    // ------------------------------------------------------------------
    // Statement-level constructs the expression walk does not reach
    // ------------------------------------------------------------------

    fn rewrite_create_table(&mut self, create: &mut CreateTable) {
        // The table name itself is renamed by the relation walk
        let path = table_path(&create.name.0);

        for column in create.columns.iter_mut() {
            self.rewrite_column_def(path.as_deref(), column);
        }
        for constraint in create.constraints.iter_mut() {
            self.rewrite_constraint(path.as_deref(), constraint);
        }
    }

    fn rewrite_column_def(&mut self, table: Option<&str>, column: &mut ColumnDef) {
        self.rename_columns_of(table, std::slice::from_mut(&mut column.name));
        for option in column.options.iter_mut() {
            if let ColumnOption::ForeignKey {
                foreign_table,
                referred_columns,
                ..
            } = &mut option.option
            {
                self.rewrite_reference(foreign_table, referred_columns);
            }
        }
    }

    fn rewrite_constraint(&mut self, table: Option<&str>, constraint: &mut TableConstraint) {
        match constraint {
            TableConstraint::PrimaryKey { columns, .. }
            | TableConstraint::Unique { columns, .. }
            | TableConstraint::Index { columns, .. } => {
                self.rename_columns_of(table, columns);
            }
            TableConstraint::ForeignKey {
                columns,
                foreign_table,
                referred_columns,
                ..
            } => {
                self.rename_columns_of(table, columns);
                self.rewrite_reference(foreign_table, referred_columns);
            }
            _ => {}
        }
    }

    /// `REFERENCES foreign_table (referred_columns)`
    fn rewrite_reference(&mut self, foreign_table: &mut ObjectName, referred_columns: &mut [Ident]) {
        let foreign_path = table_path(&foreign_table.0);
        self.rename_columns_of(foreign_path.as_deref(), referred_columns);
        self.rename_table_in_place(foreign_table);
    }

    fn rewrite_alter_table(&mut self, name: &ObjectName, operations: &mut [AlterTableOperation]) {
        let path = table_path(&name.0);
        let table = path.as_deref();

        for operation in operations.iter_mut() {
            match operation {
                AlterTableOperation::AddConstraint(constraint) => {
                    self.rewrite_constraint(table, constraint);
                }
                AlterTableOperation::AddColumn { column_def, .. } => {
                    self.rewrite_column_def(table, column_def);
                }
                AlterTableOperation::DropColumn { column_name, .. }
                | AlterTableOperation::AlterColumn { column_name, .. }
                | AlterTableOperation::ModifyColumn {
                    col_name: column_name,
                    ..
                } => {
                    self.rename_columns_of(table, std::slice::from_mut(column_name));
                }
                AlterTableOperation::RenameColumn {
                    old_column_name,
                    new_column_name,
                } => {
                    self.rename_columns_of(table, std::slice::from_mut(old_column_name));
                    self.rename_columns_of(table, std::slice::from_mut(new_column_name));
                }
                AlterTableOperation::ChangeColumn {
                    old_name, new_name, ..
                } => {
                    self.rename_columns_of(table, std::slice::from_mut(old_name));
                    self.rename_columns_of(table, std::slice::from_mut(new_name));
                }
                AlterTableOperation::RenameTable { table_name } => {
                    self.rename_table_in_place(table_name);
                }
                _ => {}
            }
        }
    }

    fn rewrite_create_view(&mut self, name: &mut ObjectName, columns: &mut [ViewColumnDef]) {
        let path = table_path(&name.0);
        for column in columns.iter_mut() {
            self.rename_columns_of(path.as_deref(), std::slice::from_mut(&mut column.name));
        }
        self.rename_table_in_place(name);
    }

    fn rewrite_schema_name(&mut self, schema_name: &mut SchemaName) {
        match schema_name {
            SchemaName::Simple(name) | SchemaName::NamedAuthorization(name, _) => {
                *name = self.rename_container_name(name, Category::Schema);
            }
            SchemaName::UnnamedAuthorization(authorization) => {
                let message = format!(
                    "Unhandled schema name form 'AUTHORIZATION {}'. Returning original.",
                    authorization
                );
                self.diagnose(DiagnosticKind::StructuralMismatch, message);
            }
        }
    }

    /// `t.*` in a SELECT list, when `t` is the table's own name.
    fn rewrite_qualified_wildcards(&mut self, body: &mut SetExpr) {
        match body {
            SetExpr::Select(select) => {
                for item in select.projection.iter_mut() {
                    if let SelectItem::QualifiedWildcard(name, _) = item {
                        let scope = self.scope;
                        let table_placeholder = scope
                            .resolve_qualifier(&name.0)
                            .filter(|target| target.names_table)
                            .and_then(|target| {
                                self.placeholders.lookup(Category::Table, target.table_path)
                            })
                            .map(str::to_string);
                        if let Some(table_placeholder) = table_placeholder {
                            *name = ObjectName(self.rename_table_parts(&name.0, &table_placeholder));
                        }
                    }
                }
            }
            SetExpr::SetOperation { left, right, .. } => {
                self.rewrite_qualified_wildcards(left);
                self.rewrite_qualified_wildcards(right);
            }
            _ => {}
        }
    }
}

impl VisitorMut for Rewriter<'_> {
    type Break = ();

    fn pre_visit_statement(&mut self, statement: &mut Statement) -> ControlFlow<Self::Break> {
        match statement {
            Statement::CreateTable(create) => self.rewrite_create_table(create),
            Statement::AlterTable {
                name, operations, ..
            } => self.rewrite_alter_table(name, operations),
            Statement::CreateView { name, columns, .. } => self.rewrite_create_view(name, columns),
            Statement::Insert(insert) => {
                let target = self.scope.insert_target().map(str::to_string);
                self.rename_columns_of(target.as_deref(), &mut insert.columns);
            }
            Statement::Update { assignments, .. } => {
                for assignment in assignments.iter_mut() {
                    match &mut assignment.target {
                        AssignmentTarget::ColumnName(name) => self.rename_assignment_target(name),
                        AssignmentTarget::Tuple(names) => {
                            for name in names.iter_mut() {
                                self.rename_assignment_target(name);
                            }
                        }
                    }
                }
            }
            Statement::CreateSchema { schema_name, .. } => self.rewrite_schema_name(schema_name),
            Statement::CreateDatabase { db_name, .. } => {
                *db_name = self.rename_container_name(db_name, Category::Database);
            }
            Statement::Drop {
                object_type, names, ..
            } => match object_type {
                ObjectType::Table | ObjectType::View => {
                    for name in names.iter_mut() {
                        self.rename_table_in_place(name);
                    }
                }
                ObjectType::Schema => {
                    for name in names.iter_mut() {
                        *name = self.rename_container_name(name, Category::Schema);
                    }
                }
                ObjectType::Database => {
                    for name in names.iter_mut() {
                        *name = self.rename_container_name(name, Category::Database);
                    }
                }
                _ => {}
            },
            _ => {}
        }
        ControlFlow::Continue(())
    }

    fn pre_visit_query(&mut self, query: &mut Query) -> ControlFlow<Self::Break> {
        if let Some(with) = query.with.as_mut() {
            for cte in with.cte_tables.iter_mut() {
                let placeholder = self
                    .placeholders
                    .lookup(Category::Table, &cte.alias.name.value)
                    .map(str::to_string);
                if let Some(placeholder) = placeholder {
                    cte.alias.name = renamed(&cte.alias.name, &placeholder);
                }
            }
        }
        self.rewrite_qualified_wildcards(&mut query.body);
        ControlFlow::Continue(())
    }

    fn pre_visit_relation(&mut self, relation: &mut ObjectName) -> ControlFlow<Self::Break> {
        self.rename_table_in_place(relation);
        ControlFlow::Continue(())
    }

    fn pre_visit_expr(&mut self, expr: &mut Expr) -> ControlFlow<Self::Break> {
        let replacement = match expr {
            Expr::Identifier(ident) => self.rename_unqualified(ident).map(Expr::Identifier),
            Expr::CompoundIdentifier(parts) => {
                self.rename_column_parts(parts).map(Expr::CompoundIdentifier)
            }
            Expr::Value(value) => self.anonymize_value(value).map(Expr::Value),
            _ => None,
        };
        if let Some(replacement) = replacement {
            *expr = replacement;
        }
        ControlFlow::Continue(())
    }
}
