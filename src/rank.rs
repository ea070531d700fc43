//! `rank(matchinfo(t))` scalar function.
//!
//! Works on the default `pcx` matchinfo layout: phrase count, column count,
//! then for every phrase/column pair the hits in this row, the hits in all
//! rows and the number of rows with a hit, all as native-endian u32.

use rusqlite::functions::FunctionFlags;
use rusqlite::Connection;

use crate::error::{Error, ErrorCode, Result};

fn matchinfo_values(blob: &[u8]) -> Result<Vec<u32>> {
    if blob.len() % 4 != 0 {
        return Err(Error::with_message(
            ErrorCode::Error,
            format!("matchinfo blob length {} is not a multiple of 4", blob.len()),
        ));
    }
    Ok(blob
        .chunks_exact(4)
        .map(|chunk| u32::from_ne_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}

/// Sum of `hits in row / hits in all rows` over every phrase and column.
pub fn rank(matchinfo: &[u8]) -> Result<f64> {
    let values = matchinfo_values(matchinfo)?;
    if values.len() < 2 {
        return Err(Error::with_message(
            ErrorCode::Error,
            "matchinfo blob is missing its phrase and column counts",
        ));
    }
    let phrases = values[0] as usize;
    let columns = values[1] as usize;
    let needed = phrases
        .checked_mul(columns)
        .and_then(|n| n.checked_mul(3))
        .and_then(|n| n.checked_add(2));
    if needed.map_or(true, |needed| values.len() < needed) {
        return Err(Error::with_message(
            ErrorCode::Error,
            format!(
                "matchinfo blob too short for {} phrases over {} columns",
                phrases, columns
            ),
        ));
    }

    let mut score = 0.0;
    for phrase in 0..phrases {
        let info = &values[2 + phrase * columns * 3..];
        for column in 0..columns {
            let hits = info[3 * column];
            let global_hits = info[3 * column + 1];
            if global_hits == 0 {
                continue;
            }
            score += f64::from(hits) / f64::from(global_hits);
        }
    }
    Ok(score)
}

/// Register `rank(blob)` on the connection.
pub fn register_rank_function(conn: &Connection) -> Result<()> {
    conn.create_scalar_function(
        "rank",
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let blob = ctx
                .get_raw(0)
                .as_blob()
                .map_err(|err| rusqlite::Error::UserFunctionError(Box::new(err)))?;
            rank(blob).map_err(|err| rusqlite::Error::UserFunctionError(Box::new(err)))
        },
    )?;
    Ok(())
}
