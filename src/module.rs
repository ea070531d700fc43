//! Adapter between the `Tokenizer` trait and the FTS3 tokenizer C ABI.
//!
//! This is the only place raw tokenizer pointers are touched. Instances and
//! cursors are `#[repr(C)]` structs whose first field is the ABI prefix the
//! engine knows about; our private state follows it. Every pointer handed
//! back by the engine goes through `instance_ref` / `cursor_mut`, which check
//! for null and for the tag written at construction before casting.
//!
//! The engine's calling discipline (from `fts3_tokenizer.c`/`fts3_write.c`):
//! `pModule` is assigned after `xCreate` returns, `pTokenizer` after `xOpen`
//! returns, `xLanguageid` is only called when `iVersion >= 1` and always before
//! the first `xNext`, and `xOpen` may be given `nBytes < 0` for nul-terminated
//! input.

// Allow raw pointer args in extern "C" functions
#![allow(clippy::not_unsafe_ptr_arg_deref)]

use std::any::{type_name, TypeId};
use std::collections::HashMap;
use std::ffi::CStr;
use std::os::raw::{c_char, c_int};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::ptr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;

use lazy_static::lazy_static;
use tracing::{debug, trace, warn};

use crate::error::{Error, ErrorCode, Result};
use crate::ffi::{
    sqlite3_tokenizer, sqlite3_tokenizer_cursor, sqlite3_tokenizer_module, SQLITE_DONE,
    SQLITE_ERROR, SQLITE_OK,
};
use crate::tokenizer::{Token, Tokenizer};

const INSTANCE_TAG: u32 = 0x4654_3349; // "FT3I"
const CURSOR_TAG: u32 = 0x4654_3343; // "FT3C"

#[repr(C)]
struct Instance<T> {
    base: sqlite3_tokenizer,
    tag: u32,
    tokenizer: T,
}

#[repr(C)]
struct Cursor {
    base: sqlite3_tokenizer_cursor,
    tag: u32,
    language_id: c_int,
    input: *const u8,
    len: usize,
    /// Filled on the first `xNext`, dropped again if the language changes.
    tokens: Option<Vec<Token>>,
    next: usize,
}

/// Counters of the callbacks the engine made for one tokenizer type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LifecycleStats {
    pub created: usize,
    pub destroyed: usize,
    pub opened: usize,
    pub closed: usize,
    pub language_calls: usize,
}

impl LifecycleStats {
    pub fn live_tokenizers(&self) -> usize {
        self.created.saturating_sub(self.destroyed)
    }

    pub fn live_cursors(&self) -> usize {
        self.opened.saturating_sub(self.closed)
    }
}

#[derive(Default)]
struct Counters {
    created: AtomicUsize,
    destroyed: AtomicUsize,
    opened: AtomicUsize,
    closed: AtomicUsize,
    language_calls: AtomicUsize,
}

impl Counters {
    fn bump(counter: &AtomicUsize) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> LifecycleStats {
        LifecycleStats {
            created: self.created.load(Ordering::Relaxed),
            destroyed: self.destroyed.load(Ordering::Relaxed),
            opened: self.opened.load(Ordering::Relaxed),
            closed: self.closed.load(Ordering::Relaxed),
            language_calls: self.language_calls.load(Ordering::Relaxed),
        }
    }
}

struct ModuleEntry {
    table: sqlite3_tokenizer_module,
    counters: Counters,
    name: &'static str,
}

impl ModuleEntry {
    fn new<T: Tokenizer>() -> Self {
        let table = sqlite3_tokenizer_module {
            iVersion: if T::SUPPORTS_LANGUAGE_ID { 1 } else { 0 },
            xCreate: Some(x_create::<T>),
            xDestroy: Some(x_destroy::<T>),
            xOpen: Some(x_open::<T>),
            xClose: Some(x_close::<T>),
            xNext: Some(x_next::<T>),
            xLanguageid: if T::SUPPORTS_LANGUAGE_ID {
                Some(x_languageid::<T>)
            } else {
                None
            },
        };
        Self {
            table,
            counters: Counters::default(),
            name: type_name::<T>(),
        }
    }
}

lazy_static! {
    // Entries are leaked: SQLite keeps the table pointer for as long as any
    // connection has it registered, which we cannot observe.
    static ref MODULES: RwLock<HashMap<TypeId, &'static ModuleEntry>> =
        RwLock::new(HashMap::new());
}

fn entry<T: Tokenizer>() -> &'static ModuleEntry {
    let key = TypeId::of::<T>();
    if let Some(entry) = MODULES.read().expect("tokenizer module lock").get(&key) {
        return entry;
    }
    let mut modules = MODULES.write().expect("tokenizer module lock");
    *modules.entry(key).or_insert_with(|| {
        debug!(tokenizer = type_name::<T>(), "building tokenizer module table");
        Box::leak(Box::new(ModuleEntry::new::<T>()))
    })
}

/// The module table for `T`. The address is stable for the life of the
/// process, so it can be registered with any number of connections.
pub fn module<T: Tokenizer>() -> &'static sqlite3_tokenizer_module {
    &entry::<T>().table
}

/// Callback counts recorded for `T` so far, across all connections.
pub fn lifecycle<T: Tokenizer>() -> LifecycleStats {
    entry::<T>().counters.snapshot()
}

fn misuse(message: &str) -> Error {
    warn!("{}", message);
    Error::with_message(ErrorCode::Misuse, message)
}

/// Run a callback body, turning errors and panics into result codes.
fn guard(callback: &'static str, body: impl FnOnce() -> Result<c_int>) -> c_int {
    match catch_unwind(AssertUnwindSafe(body)) {
        Ok(Ok(rc)) => rc,
        Ok(Err(err)) => {
            debug!(callback, error = %err, "tokenizer callback failed");
            match err.code() {
                ErrorCode::Ok => SQLITE_ERROR,
                code => code.as_raw(),
            }
        }
        Err(_) => {
            warn!(callback, "panic inside tokenizer callback");
            SQLITE_ERROR
        }
    }
}

unsafe fn instance_ref<'a, T>(tokenizer: *mut sqlite3_tokenizer) -> Result<&'a Instance<T>> {
    let instance = tokenizer.cast::<Instance<T>>();
    if instance.is_null() {
        return Err(misuse("null tokenizer pointer"));
    }
    // The tag sits at the same offset for every T.
    if (*instance).tag != INSTANCE_TAG {
        return Err(misuse("pointer is not a tokenizer created by this module"));
    }
    Ok(&*instance)
}

unsafe fn cursor_mut<'a>(cursor: *mut sqlite3_tokenizer_cursor) -> Result<&'a mut Cursor> {
    let cursor = cursor.cast::<Cursor>();
    if cursor.is_null() {
        return Err(misuse("null tokenizer cursor"));
    }
    if (*cursor).tag != CURSOR_TAG {
        return Err(misuse("pointer is not a cursor opened by this module"));
    }
    Ok(&mut *cursor)
}

unsafe fn collect_args(argc: c_int, argv: *const *const c_char) -> Result<Vec<String>> {
    if argc <= 0 || argv.is_null() {
        return Ok(Vec::new());
    }
    let mut args = Vec::with_capacity(argc as usize);
    for i in 0..argc as usize {
        let arg = *argv.add(i);
        if arg.is_null() {
            return Err(misuse("null tokenizer argument"));
        }
        let arg = CStr::from_ptr(arg).to_str().map_err(|_| {
            Error::with_message(ErrorCode::Error, "tokenizer argument is not valid UTF-8")
        })?;
        args.push(arg.to_owned());
    }
    Ok(args)
}

/// View the cursor input as text. Input that is not UTF-8 is refused rather
/// than partly indexed.
unsafe fn input_text<'a>(input: *const u8, len: usize) -> Result<&'a str> {
    if input.is_null() || len == 0 {
        return Ok("");
    }
    let bytes = std::slice::from_raw_parts(input, len);
    std::str::from_utf8(bytes).map_err(|err| {
        warn!(
            valid_up_to = err.valid_up_to(),
            len, "tokenizer input is not valid UTF-8"
        );
        Error::with_message(
            ErrorCode::Error,
            format!(
                "tokenizer input is not valid UTF-8 after byte {}",
                err.valid_up_to()
            ),
        )
    })
}

fn to_c_int(value: usize, what: &str) -> Result<c_int> {
    c_int::try_from(value)
        .map_err(|_| Error::with_message(ErrorCode::Range, format!("{} does not fit in an int", what)))
}

unsafe extern "C" fn x_create<T: Tokenizer>(
    argc: c_int,
    argv: *const *const c_char,
    pp_tokenizer: *mut *mut sqlite3_tokenizer,
) -> c_int {
    guard("xCreate", || {
        if pp_tokenizer.is_null() {
            return Err(misuse("xCreate called without an output pointer"));
        }
        let args = unsafe { collect_args(argc, argv)? };
        let refs: Vec<&str> = args.iter().map(String::as_str).collect();
        let tokenizer = T::create(&refs)?;

        let instance = Box::new(Instance {
            base: sqlite3_tokenizer {
                pModule: ptr::null(),
            },
            tag: INSTANCE_TAG,
            tokenizer,
        });
        unsafe {
            *pp_tokenizer = Box::into_raw(instance).cast::<sqlite3_tokenizer>();
        }

        let entry = entry::<T>();
        Counters::bump(&entry.counters.created);
        debug!(tokenizer = entry.name, ?args, "created tokenizer");
        Ok(SQLITE_OK)
    })
}

unsafe extern "C" fn x_destroy<T: Tokenizer>(tokenizer: *mut sqlite3_tokenizer) -> c_int {
    guard("xDestroy", || {
        unsafe { instance_ref::<T>(tokenizer)? };
        let mut instance = unsafe { Box::from_raw(tokenizer.cast::<Instance<T>>()) };
        instance.tag = 0;
        drop(instance);

        let entry = entry::<T>();
        Counters::bump(&entry.counters.destroyed);
        debug!(tokenizer = entry.name, "destroyed tokenizer");
        Ok(SQLITE_OK)
    })
}

unsafe extern "C" fn x_open<T: Tokenizer>(
    tokenizer: *mut sqlite3_tokenizer,
    input: *const c_char,
    n_bytes: c_int,
    pp_cursor: *mut *mut sqlite3_tokenizer_cursor,
) -> c_int {
    guard("xOpen", || {
        unsafe { instance_ref::<T>(tokenizer)? };
        if pp_cursor.is_null() {
            return Err(misuse("xOpen called without an output pointer"));
        }

        let len = if input.is_null() {
            0
        } else if n_bytes < 0 {
            unsafe { CStr::from_ptr(input).to_bytes().len() }
        } else {
            n_bytes as usize
        };
        unsafe { input_text(input.cast::<u8>(), len)? };

        let cursor = Box::new(Cursor {
            base: sqlite3_tokenizer_cursor {
                pTokenizer: tokenizer,
            },
            tag: CURSOR_TAG,
            language_id: 0,
            input: input.cast::<u8>(),
            len,
            tokens: None,
            next: 0,
        });
        unsafe {
            *pp_cursor = Box::into_raw(cursor).cast::<sqlite3_tokenizer_cursor>();
        }

        Counters::bump(&entry::<T>().counters.opened);
        trace!(len, "opened tokenizer cursor");
        Ok(SQLITE_OK)
    })
}

unsafe extern "C" fn x_close<T: Tokenizer>(cursor: *mut sqlite3_tokenizer_cursor) -> c_int {
    guard("xClose", || {
        unsafe { cursor_mut(cursor)? };
        let mut cursor = unsafe { Box::from_raw(cursor.cast::<Cursor>()) };
        cursor.tag = 0;
        trace!(produced = cursor.next, "closed tokenizer cursor");
        drop(cursor);

        Counters::bump(&entry::<T>().counters.closed);
        Ok(SQLITE_OK)
    })
}

unsafe extern "C" fn x_next<T: Tokenizer>(
    cursor: *mut sqlite3_tokenizer_cursor,
    pp_token: *mut *const c_char,
    pn_bytes: *mut c_int,
    pi_start: *mut c_int,
    pi_end: *mut c_int,
    pi_position: *mut c_int,
) -> c_int {
    guard("xNext", || {
        let cursor = unsafe { cursor_mut(cursor)? };

        if cursor.tokens.is_none() {
            let instance = unsafe { instance_ref::<T>(cursor.base.pTokenizer)? };
            let text = unsafe { input_text(cursor.input, cursor.len)? };
            cursor.tokens = Some(instance.tokenizer.tokenize(text, cursor.language_id)?);
        }

        let index = cursor.next;
        let Some(token) = cursor.tokens.as_ref().and_then(|t| t.get(index)) else {
            return Ok(SQLITE_DONE);
        };
        let n_bytes = to_c_int(token.text.len(), "token length")?;
        let start = to_c_int(token.start, "token start offset")?;
        let end = to_c_int(token.end, "token end offset")?;

        // The text stays owned by the cursor, so the pointer is valid until
        // the next xNext or xClose.
        unsafe {
            if !pp_token.is_null() {
                *pp_token = token.text.as_ptr().cast::<c_char>();
            }
            if !pn_bytes.is_null() {
                *pn_bytes = n_bytes;
            }
            if !pi_start.is_null() {
                *pi_start = start;
            }
            if !pi_end.is_null() {
                *pi_end = end;
            }
            if !pi_position.is_null() {
                *pi_position = token.position;
            }
        }

        cursor.next += 1;
        Ok(SQLITE_OK)
    })
}

unsafe extern "C" fn x_languageid<T: Tokenizer>(
    cursor: *mut sqlite3_tokenizer_cursor,
    language_id: c_int,
) -> c_int {
    guard("xLanguageid", || {
        let cursor = unsafe { cursor_mut(cursor)? };
        if cursor.language_id != language_id {
            cursor.language_id = language_id;
            cursor.tokens = None;
        }
        Counters::bump(&entry::<T>().counters.language_calls);
        Ok(SQLITE_OK)
    })
}
