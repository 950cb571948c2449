use std::sync::Arc;

use regex::{Regex, RegexBuilder};
use rusqlite::Connection;
use rusqlite::functions::FunctionFlags;
use rusqlite::types::ValueRef;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Registers `regexp(pattern, text)` (case-insensitive, backs the `REGEXP`
/// operator) and `regexp_cs(pattern, text)` (case-sensitive).
pub fn register(conn: &Connection) -> rusqlite::Result<()> {
    add_regexp(conn, "regexp", true)?;
    add_regexp(conn, "regexp_cs", false)
}

fn add_regexp(conn: &Connection, name: &str, case_insensitive: bool) -> rusqlite::Result<()> {
    conn.create_scalar_function(
        name,
        2,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        move |ctx| {
            // Compiled once per statement and cached by SQLite as auxiliary data.
            let regex: Arc<Regex> = ctx.get_or_create_aux(0, |pattern| -> Result<_, BoxError> {
                Ok(RegexBuilder::new(pattern.as_str()?)
                    .case_insensitive(case_insensitive)
                    .build()?)
            })?;
            let is_match = match ctx.get_raw(1) {
                ValueRef::Text(t) | ValueRef::Blob(t) => regex.is_match(&String::from_utf8_lossy(t)),
                _ => false,
            };
            Ok(is_match)
        },
    )
}
