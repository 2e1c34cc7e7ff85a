//! sql-anonymizer: replace identifiers and literals in SQL with stable placeholders
//!
//! Queries are parsed with sqlparser-rs, rewritten so that every database,
//! schema, table, column, string, number and email value becomes a numbered
//! placeholder (`table_1`, `col_2`, `email_1`, ...), and printed back in the
//! same dialect. Whole databases can be anonymized through [`migrate_schema`].

pub mod anonymizer;
pub mod config;
pub mod error;
pub mod parser;
pub mod schema;
pub mod util;

use std::fs;
use std::path::{Component, Path, PathBuf};

use rayon::prelude::*;

pub use anonymizer::log::{RunLog, TransformationLog};
pub use anonymizer::{
    sanitize_sql, Anonymizer, Diagnostic, DiagnosticKind, SanitizeOptions, SanitizeOutcome,
};
pub use error::{AnonymizerError, MigrationError};
pub use parser::SqlDialect;
pub use schema::{migrate_schema, Backend, MigrationLog, MigrationOptions, MigrationOutcome};

/// Minimum number of files to benefit from parallel processing.
/// Below this threshold, sequential processing is faster due to rayon overhead.
const PARALLEL_THRESHOLD: usize = 8;

/// Per-file result of [`anonymize_files`].
#[derive(Debug, Clone)]
pub struct FileReport {
    pub input: PathBuf,
    pub output: PathBuf,
    /// Mapping log written next to the output when `explain` is on
    pub mapping: Option<PathBuf>,
    /// The file did not parse and was copied unchanged
    pub failed: bool,
    pub diagnostics: Vec<Diagnostic>,
}

/// Anonymize a single SQL file into `out_dir`, keeping its file name.
///
/// Each file gets its own [`Anonymizer`], so placeholder numbering starts
/// over per file.
pub fn anonymize_file(
    input: &Path,
    out_dir: &Path,
    options: &SanitizeOptions,
) -> Result<FileReport, AnonymizerError> {
    let file_name = input
        .file_name()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("query.sql"));
    anonymize_into(input, &out_dir.join(file_name), options)
}

/// Anonymize many files, in parallel for larger sets.
///
/// Outputs mirror the inputs' layout below their deepest common directory,
/// so `a/q.sql` and `b/q.sql` land in `out_dir/a/q.sql` and `out_dir/b/q.sql`.
pub fn anonymize_files(
    files: &[PathBuf],
    out_dir: &Path,
    options: &SanitizeOptions,
) -> Result<Vec<FileReport>, AnonymizerError> {
    let jobs: Vec<(&PathBuf, PathBuf)> = files.iter().zip(batch_outputs(files, out_dir)).collect();

    let results: Vec<Result<FileReport, AnonymizerError>> = if jobs.len() >= PARALLEL_THRESHOLD {
        jobs.par_iter()
            .map(|(input, output)| anonymize_into(input, output, options))
            .collect()
    } else {
        jobs.iter()
            .map(|(input, output)| anonymize_into(input, output, options))
            .collect()
    };

    results.into_iter().collect()
}

fn anonymize_into(
    input: &Path,
    output: &Path,
    options: &SanitizeOptions,
) -> Result<FileReport, AnonymizerError> {
    let sql = parser::read_sql_file(input)?;
    let outcome = sanitize_sql(&sql, options);

    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent).map_err(|source| AnonymizerError::OutputWrite {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    write_file(output, &outcome.sql)?;

    let mapping = if options.explain || outcome.is_failure() {
        let path = output.with_extension("mapping.json");
        write_file(&path, &outcome.log.to_explain_json()?)?;
        Some(path)
    } else {
        None
    };

    if outcome.is_failure() {
        log::warn!("{}: input did not parse, copied unchanged", input.display());
    }

    Ok(FileReport {
        input: input.to_path_buf(),
        output: output.to_path_buf(),
        mapping,
        failed: outcome.is_failure(),
        diagnostics: outcome.diagnostics,
    })
}

/// Output path for each batch input, relative to the inputs' common directory.
fn batch_outputs(files: &[PathBuf], out_dir: &Path) -> Vec<PathBuf> {
    let resolved: Vec<PathBuf> = files
        .iter()
        .map(|file| fs::canonicalize(file).unwrap_or_else(|_| file.clone()))
        .collect();
    let root = common_dir(&resolved);

    resolved
        .iter()
        .map(|path| {
            let relative = root
                .as_deref()
                .and_then(|root| path.strip_prefix(root).ok())
                .filter(|relative| stays_inside(relative))
                .map(Path::to_path_buf)
                .or_else(|| path.file_name().map(PathBuf::from))
                .unwrap_or_else(|| PathBuf::from("query.sql"));
            out_dir.join(relative)
        })
        .collect()
}

/// Non-empty and made only of plain segments, so joining it cannot leave the
/// output directory.
fn stays_inside(relative: &Path) -> bool {
    !relative.as_os_str().is_empty()
        && relative
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

/// Deepest directory containing every path.
fn common_dir(paths: &[PathBuf]) -> Option<PathBuf> {
    let mut dirs = paths.iter().filter_map(|path| path.parent());
    let first = dirs.next()?.to_path_buf();
    Some(dirs.fold(first, |common, dir| {
        common
            .components()
            .zip(dir.components())
            .take_while(|(a, b)| a == b)
            .map(|(a, _)| a)
            .collect()
    }))
}

fn write_file(path: &Path, content: &str) -> Result<(), AnonymizerError> {
    fs::write(path, content).map_err(|source| AnonymizerError::OutputWrite {
        path: path.to_path_buf(),
        source,
    })
}
