//! Reading SQL text from files and streams

use std::io::Read;
use std::path::{Path, PathBuf};

use encoding_rs::WINDOWS_1252;
use glob::glob;
use walkdir::WalkDir;

use crate::error::AnonymizerError;

/// Decode raw bytes as UTF-8, falling back to Windows-1252 (common for SQL
/// files saved on Windows). A leading UTF-8 BOM is stripped.
fn decode_sql_bytes(bytes: Vec<u8>) -> std::io::Result<String> {
    let text = match String::from_utf8(bytes) {
        Ok(s) => s,
        Err(err) => {
            let bytes = err.into_bytes();
            let (decoded, _, had_errors) = WINDOWS_1252.decode(&bytes);
            if had_errors {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    "File contains invalid characters",
                ));
            }
            decoded.into_owned()
        }
    };

    Ok(match text.strip_prefix('\u{FEFF}') {
        Some(stripped) => stripped.to_string(),
        None => text,
    })
}

/// Read a SQL file, trying UTF-8 first and Windows-1252 as fallback
pub fn read_sql_file(path: &Path) -> Result<String, AnonymizerError> {
    std::fs::read(path)
        .and_then(decode_sql_bytes)
        .map_err(|source| AnonymizerError::InputRead {
            path: path.to_path_buf(),
            source,
        })
}

/// Read all of stdin as SQL text
pub fn read_sql_stdin() -> Result<String, AnonymizerError> {
    let mut bytes = Vec::new();
    std::io::stdin()
        .read_to_end(&mut bytes)
        .and_then(|_| decode_sql_bytes(bytes))
        .map_err(|source| AnonymizerError::InputRead {
            path: PathBuf::from("<stdin>"),
            source,
        })
}

/// Expand batch inputs into a sorted, de-duplicated list of `.sql` files.
///
/// Each entry may be a file, a directory (searched recursively) or a glob
/// pattern. Entries that match nothing are skipped with a warning.
pub fn collect_sql_files(inputs: &[String]) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for input in inputs {
        let path = Path::new(input);
        if path.is_dir() {
            files.extend(
                WalkDir::new(path)
                    .into_iter()
                    .filter_map(|entry| entry.ok())
                    .filter(|entry| entry.file_type().is_file())
                    .map(|entry| entry.into_path())
                    .filter(|p| is_sql_file(p)),
            );
        } else if path.is_file() {
            files.push(path.to_path_buf());
        } else {
            match glob(input) {
                Ok(paths) => {
                    let before = files.len();
                    files.extend(paths.filter_map(|p| p.ok()).filter(|p| p.is_file()));
                    if files.len() == before {
                        log::warn!("No SQL files matched '{}'", input);
                    }
                }
                Err(e) => log::warn!("Invalid input pattern '{}': {}", input, e),
            }
        }
    }

    files.sort();
    files.dedup();
    files
}

fn is_sql_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("sql"))
}
