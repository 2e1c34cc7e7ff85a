//! Anonymization engine
//!
//! `sanitize` parses SQL text, fixes table placeholders in a scope pre-pass,
//! rewrites identifiers and literals on a copy of the tree and prints the
//! result back in the input dialect.

pub mod columns;
pub mod log;
pub mod registry;
mod rewriter;
pub mod scope;

use serde::Serialize;

use crate::parser::{self, SqlDialect};
use columns::ColumnRegistry;
use self::log::{RunLog, TransformationLog};
use registry::PlaceholderRegistry;
use rewriter::Rewriter;

/// Options for one anonymization run.
#[derive(Debug, Clone, Default)]
pub struct SanitizeOptions {
    pub dialect: SqlDialect,
    /// Frame ambiguity diagnostics as strict-mode violations
    pub strict_mode: bool,
    /// Build the transformation log
    pub explain: bool,
}

/// Kind of a non-fatal problem found while rewriting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DiagnosticKind {
    /// A node did not have the shape the rewriter expected; it was left as-is
    StructuralMismatch,
    /// Unqualified column found in more than one table
    AmbiguousReference,
    /// Unqualified column not attributable to any table in scope
    UnresolvedReference,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
}

/// Result of [`Anonymizer::sanitize`].
#[derive(Debug, Clone)]
pub struct SanitizeOutcome {
    /// Anonymized SQL, or the original text when parsing failed
    pub sql: String,
    pub log: RunLog,
    pub diagnostics: Vec<Diagnostic>,
}

impl SanitizeOutcome {
    /// Whether the input failed to parse.
    pub fn is_failure(&self) -> bool {
        matches!(self.log, RunLog::Failed { .. })
    }
}

/// Stateful anonymizer.
///
/// Registries live for one `sanitize` call and are reset at the start of the
/// next one. An instance must not be shared between concurrent callers; create
/// one per task instead.
#[derive(Debug, Default)]
pub struct Anonymizer {
    strict_mode: bool,
    placeholders: PlaceholderRegistry,
    columns: ColumnRegistry,
}

impl Anonymizer {
    /// Create a new anonymizer
    pub fn new(strict_mode: bool) -> Self {
        Self {
            strict_mode,
            ..Self::default()
        }
    }

    pub fn strict_mode(&self) -> bool {
        self.strict_mode
    }

    /// Anonymize `sql`.
    ///
    /// On parse failure the original text is returned together with an
    /// error-only log and no placeholder is allocated. With `explain` off the
    /// log is empty; the anonymized SQL is identical either way.
    pub fn sanitize(&mut self, sql: &str, dialect: SqlDialect, explain: bool) -> SanitizeOutcome {
        self.placeholders.clear();
        self.columns.clear();

        let statements = match parser::parse(sql, dialect) {
            Ok(statements) => statements,
            Err(e) => {
                ::log::error!("{}", e);
                return SanitizeOutcome {
                    sql: sql.to_string(),
                    log: RunLog::Failed {
                        error: e.to_string(),
                    },
                    diagnostics: Vec::new(),
                };
            }
        };

        let mut diagnostics = Vec::new();
        let mut rewritten = Vec::with_capacity(statements.len());
        for statement in &statements {
            let scope = scope::resolve_scope(statement, &mut self.placeholders);
            let mut rewriter = Rewriter {
                placeholders: &mut self.placeholders,
                columns: &mut self.columns,
                scope: &scope,
                diagnostics: &mut diagnostics,
                strict_mode: self.strict_mode,
            };
            rewritten.push(rewriter.rewrite(statement));
        }

        ::log::debug!(
            "Anonymized {} statement(s) with {} diagnostic(s)",
            rewritten.len(),
            diagnostics.len()
        );

        let log = if explain {
            RunLog::Mappings(TransformationLog::build(&self.placeholders, &self.columns))
        } else {
            RunLog::Empty {}
        };

        SanitizeOutcome {
            sql: parser::print(&rewritten),
            log,
            diagnostics,
        }
    }

    /// Read-only view of the placeholder registry left by the last run.
    pub fn placeholders(&self) -> &PlaceholderRegistry {
        &self.placeholders
    }

    /// Read-only view of the column registry left by the last run.
    pub fn columns(&self) -> &ColumnRegistry {
        &self.columns
    }
}

/// One-shot convenience wrapper around [`Anonymizer::sanitize`].
pub fn sanitize_sql(sql: &str, options: &SanitizeOptions) -> SanitizeOutcome {
    Anonymizer::new(options.strict_mode).sanitize(sql, options.dialect, options.explain)
}
