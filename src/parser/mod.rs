//! Parse/print provider backed by sqlparser-rs
//!
//! The anonymizer never tokenizes SQL itself. Text is turned into sqlparser
//! statements here, and anonymized statements are printed back here.

mod dialect;
mod input;

use once_cell::sync::Lazy;
use regex::Regex;
use sqlparser::ast::Statement;
use sqlparser::parser::Parser;

pub use dialect::SqlDialect;
pub use input::{collect_sql_files, read_sql_file, read_sql_stdin};

use crate::error::AnonymizerError;

static ERROR_LINE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Line:\s*(\d+)").expect("Invalid line regex"));

/// Extract line number from sqlparser error message (format: "... at Line: X, Column: Y")
fn extract_line_from_error(error_msg: &str) -> Option<usize> {
    let caps = ERROR_LINE_RE.captures(error_msg)?;
    caps.get(1)?.as_str().parse().ok()
}

/// Parse SQL text into statements using the given dialect.
///
/// Text containing no statements at all is reported as a parse failure, since
/// there is nothing to anonymize and the caller should get its input back.
pub fn parse(sql: &str, dialect: SqlDialect) -> Result<Vec<Statement>, AnonymizerError> {
    let parser_dialect = dialect.parser_dialect();

    match Parser::parse_sql(parser_dialect.as_ref(), sql) {
        Ok(statements) if statements.is_empty() => Err(AnonymizerError::ParseFailure {
            dialect: dialect.name().to_string(),
            line: 1,
            message: "no SQL statements found".to_string(),
        }),
        Ok(statements) => Ok(statements),
        Err(e) => {
            let message = e.to_string();
            Err(AnonymizerError::ParseFailure {
                dialect: dialect.name().to_string(),
                line: extract_line_from_error(&message).unwrap_or(1),
                message,
            })
        }
    }
}

/// Print statements back to SQL text, one statement per line.
///
/// Identifier quoting is carried on each identifier in the tree, so output
/// keeps the quote style of the input dialect.
pub fn print(statements: &[Statement]) -> String {
    statements
        .iter()
        .map(|s| s.to_string())
        .collect::<Vec<_>>()
        .join(";\n")
}
