//! Error types and Result aliases for fts3-tokenizer
//!
//! Tokenizer callbacks talk to SQLite exclusively through integer result
//! codes, so errors carry one of SQLite's codes plus an optional message.

use std::fmt;
use std::os::raw::c_int;

use rusqlite::ffi;

/// SQLite result codes that can cross the tokenizer boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum ErrorCode {
    /// SQLITE_OK
    Ok = ffi::SQLITE_OK,
    /// SQLITE_ERROR
    Error = ffi::SQLITE_ERROR,
    /// SQLITE_INTERNAL
    Internal = ffi::SQLITE_INTERNAL,
    /// SQLITE_NOMEM
    NoMem = ffi::SQLITE_NOMEM,
    /// SQLITE_MISUSE
    Misuse = ffi::SQLITE_MISUSE,
    /// SQLITE_RANGE
    Range = ffi::SQLITE_RANGE,
    /// SQLITE_DONE - end of input, not a failure
    Done = ffi::SQLITE_DONE,
}

impl ErrorCode {
    pub fn as_raw(self) -> c_int {
        self as c_int
    }

    /// Map a primary result code back onto the enum. Extended codes are
    /// reduced to their primary code first; unknown codes become `Error`.
    pub fn from_raw(code: c_int) -> Self {
        match code & 0xff {
            ffi::SQLITE_OK => ErrorCode::Ok,
            ffi::SQLITE_INTERNAL => ErrorCode::Internal,
            ffi::SQLITE_NOMEM => ErrorCode::NoMem,
            ffi::SQLITE_MISUSE => ErrorCode::Misuse,
            ffi::SQLITE_RANGE => ErrorCode::Range,
            ffi::SQLITE_DONE => ErrorCode::Done,
            _ => ErrorCode::Error,
        }
    }

    /// The same English text `sqlite3_errstr()` uses.
    pub fn description(self) -> &'static str {
        match self {
            ErrorCode::Ok => "not an error",
            ErrorCode::Error => "SQL logic error",
            ErrorCode::Internal => "internal error",
            ErrorCode::NoMem => "out of memory",
            ErrorCode::Misuse => "bad parameter or other API misuse",
            ErrorCode::Range => "column index out of range",
            ErrorCode::Done => "no more rows available",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Error {
    code: ErrorCode,
    message: Option<String>,
}

impl Error {
    pub fn new(code: ErrorCode) -> Self {
        Self {
            code,
            message: None,
        }
    }

    pub fn with_message(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: Some(message.into()),
        }
    }

    pub fn code(&self) -> ErrorCode {
        self.code
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Message in the form `sqlite3_errmsg()` would report it.
    pub fn sqlite_errmsg(&self) -> String {
        match &self.message {
            Some(message) => message.clone(),
            None => self.code.description().to_string(),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.sqlite_errmsg(), self.code.as_raw())
    }
}

impl std::error::Error for Error {}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        let code = match &err {
            rusqlite::Error::SqliteFailure(inner, _) => ErrorCode::from_raw(inner.extended_code),
            rusqlite::Error::InvalidParameterCount(..) | rusqlite::Error::InvalidColumnIndex(_) => {
                ErrorCode::Range
            }
            _ => ErrorCode::Error,
        };
        Error::with_message(code, err.to_string())
    }
}

/// Result type alias for fts3-tokenizer operations
pub type Result<T> = std::result::Result<T, Error>;
