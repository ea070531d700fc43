//! Raw SQLite C API plus the FTS3 tokenizer declarations.
//!
//! `sqlite3.h` does not declare the FTS3 tokenizer structures; they live in
//! SQLite's internal `fts3_tokenizer.h`. They are restated here with the exact
//! field order and types so that a table built in Rust can be handed to the
//! FTS engine of the linked library. Everything from the regular SQLite API is
//! re-exported alongside, so a single `use fts3_tokenizer::ffi::*` sees both.

#![allow(non_camel_case_types, non_snake_case)]

use std::os::raw::{c_char, c_int};

pub use rusqlite::ffi::*;

/// `int (*xCreate)(int argc, const char *const *argv, sqlite3_tokenizer **ppTokenizer)`
pub type xCreate_fn = unsafe extern "C" fn(
    argc: c_int,
    argv: *const *const c_char,
    ppTokenizer: *mut *mut sqlite3_tokenizer,
) -> c_int;

/// `int (*xDestroy)(sqlite3_tokenizer *pTokenizer)`
pub type xDestroy_fn = unsafe extern "C" fn(pTokenizer: *mut sqlite3_tokenizer) -> c_int;

/// `int (*xOpen)(sqlite3_tokenizer*, const char *pInput, int nBytes, sqlite3_tokenizer_cursor **ppCursor)`
pub type xOpen_fn = unsafe extern "C" fn(
    pTokenizer: *mut sqlite3_tokenizer,
    pInput: *const c_char,
    nBytes: c_int,
    ppCursor: *mut *mut sqlite3_tokenizer_cursor,
) -> c_int;

/// `int (*xClose)(sqlite3_tokenizer_cursor *pCursor)`
pub type xClose_fn = unsafe extern "C" fn(pCursor: *mut sqlite3_tokenizer_cursor) -> c_int;

/// `int (*xNext)(sqlite3_tokenizer_cursor*, const char **ppToken, int *pnBytes,
///               int *piStartOffset, int *piEndOffset, int *piPosition)`
pub type xNext_fn = unsafe extern "C" fn(
    pCursor: *mut sqlite3_tokenizer_cursor,
    ppToken: *mut *const c_char,
    pnBytes: *mut c_int,
    piStartOffset: *mut c_int,
    piEndOffset: *mut c_int,
    piPosition: *mut c_int,
) -> c_int;

/// `int (*xLanguageid)(sqlite3_tokenizer_cursor *pCsr, int iLangid)`
pub type xLanguageid_fn =
    unsafe extern "C" fn(pCsr: *mut sqlite3_tokenizer_cursor, iLangid: c_int) -> c_int;

/// A tokenizer module descriptor.
///
/// `iVersion` is 0 or 1. Methods after `xNext` are only read by the engine
/// when `iVersion >= 1`.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct sqlite3_tokenizer_module {
    pub iVersion: c_int,
    pub xCreate: Option<xCreate_fn>,
    pub xDestroy: Option<xDestroy_fn>,
    pub xOpen: Option<xOpen_fn>,
    pub xClose: Option<xClose_fn>,
    pub xNext: Option<xNext_fn>,
    pub xLanguageid: Option<xLanguageid_fn>,
}

/// Common prefix of every tokenizer instance. Implementations append their
/// own fields after it; `pModule` is filled in by the engine, not by `xCreate`.
#[repr(C)]
#[derive(Debug)]
pub struct sqlite3_tokenizer {
    pub pModule: *const sqlite3_tokenizer_module,
}

/// Common prefix of every tokenizer cursor.
#[repr(C)]
#[derive(Debug)]
pub struct sqlite3_tokenizer_cursor {
    pub pTokenizer: *mut sqlite3_tokenizer,
}

const PTR: usize = std::mem::size_of::<*const ()>();

// `int` followed by six pointers: the int is padded up to pointer alignment.
const _: () = assert!(std::mem::size_of::<sqlite3_tokenizer_module>() == 7 * PTR);
const _: () = assert!(std::mem::size_of::<sqlite3_tokenizer>() == PTR);
const _: () = assert!(std::mem::size_of::<sqlite3_tokenizer_cursor>() == PTR);
