//! Registering tokenizer modules with a connection.
//!
//! FTS3/FTS4 look tokenizers up by name in a per-connection hash that is
//! only reachable through the `fts3_tokenizer()` SQL function. The pointer to
//! the module table travels as a blob holding its native-endian address.

use std::any::type_name;
use std::mem::size_of;

use rusqlite::config::DbConfig;
use rusqlite::{params, Connection};
use tracing::debug;

use crate::error::{Error, ErrorCode, Result};
use crate::ffi::sqlite3_tokenizer_module;
use crate::module::module;
use crate::tokenizer::{Tokenizer, WhitespaceTokenizer};
use crate::word::WordTokenizer;

/// Name the whitespace tokenizer is registered under by `register_builtin_tokenizers`.
pub const WHITESPACE: &str = "whitespace";
/// Name the Unicode word tokenizer is registered under by `register_builtin_tokenizers`.
pub const UNICODE_WORDS: &str = "unicode_words";

fn pointer_blob(table: *const sqlite3_tokenizer_module) -> [u8; size_of::<usize>()] {
    (table as usize).to_ne_bytes()
}

fn blob_pointer(blob: &[u8]) -> Result<*const sqlite3_tokenizer_module> {
    let bytes: [u8; size_of::<usize>()] = blob.try_into().map_err(|_| {
        Error::with_message(
            ErrorCode::Internal,
            format!("fts3_tokenizer returned a {}-byte pointer", blob.len()),
        )
    })?;
    Ok(usize::from_ne_bytes(bytes) as *const sqlite3_tokenizer_module)
}

/// Allow the two-argument form of `fts3_tokenizer()` on this connection.
fn enable_tokenizer_registration(conn: &Connection) -> Result<()> {
    conn.set_db_config(DbConfig::SQLITE_DBCONFIG_ENABLE_FTS3_TOKENIZER, true)?;
    Ok(())
}

/// Look up the module table registered under `name` on this connection.
///
/// Returns `None` when no tokenizer of that name exists, including SQLite's
/// own `simple`/`porter`/`unicode61` when they are not compiled in.
pub fn lookup_tokenizer(
    conn: &Connection,
    name: &str,
) -> Result<Option<*const sqlite3_tokenizer_module>> {
    enable_tokenizer_registration(conn)?;
    let result = conn.query_row("SELECT fts3_tokenizer(?1)", params![name], |row| {
        row.get::<_, Vec<u8>>(0)
    });
    match result {
        Ok(blob) => Ok(Some(blob_pointer(&blob)?)),
        Err(rusqlite::Error::SqliteFailure(_, Some(message)))
            if message.starts_with("unknown tokenizer") =>
        {
            Ok(None)
        }
        Err(err) => Err(err.into()),
    }
}

/// Register `T` under `name` so that `CREATE VIRTUAL TABLE ... USING
/// fts4(tokenize=<name> ...)` on this connection uses it.
///
/// Registering the same type under the same name twice is a no-op; binding a
/// name that already refers to another module replaces it for tables created
/// or connected afterwards.
pub fn register_tokenizer<T: Tokenizer>(conn: &Connection, name: &str) -> Result<()> {
    let table: *const sqlite3_tokenizer_module = module::<T>();

    // SQLite rejects re-inserting the pointer a name already maps to.
    if lookup_tokenizer(conn, name)? == Some(table) {
        debug!(name, "fts3 tokenizer already registered");
        return Ok(());
    }

    let blob = pointer_blob(table);
    let echoed: Vec<u8> = conn.query_row(
        "SELECT fts3_tokenizer(?1, ?2)",
        params![name, &blob[..]],
        |row| row.get(0),
    )?;
    if blob_pointer(&echoed)? != table {
        return Err(Error::with_message(
            ErrorCode::Internal,
            format!("fts3_tokenizer did not accept the module for {}", name),
        ));
    }

    debug!(name, tokenizer = type_name::<T>(), "registered fts3 tokenizer");
    Ok(())
}

/// Register the tokenizers shipped with this crate under `WHITESPACE` and
/// `UNICODE_WORDS`.
pub fn register_builtin_tokenizers(conn: &Connection) -> Result<()> {
    register_tokenizer::<WhitespaceTokenizer>(conn, WHITESPACE)?;
    register_tokenizer::<WordTokenizer>(conn, UNICODE_WORDS)?;
    Ok(())
}
