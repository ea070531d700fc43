//! fts3-tokenizer - custom SQLite FTS3/FTS4 tokenizers written in Rust

pub mod error;
pub mod ffi;
pub mod index;
pub mod module;
pub mod rank;
pub mod register;
pub mod snippet;
pub mod tokenizer;
pub mod word;

// Re-export main public types
pub use error::{Error, ErrorCode, Result};

// Re-export the tokenizer API
pub use index::{ColumnConfig, IndexConfig, SearchHit, TextIndex};
pub use module::{lifecycle, module, LifecycleStats};
pub use rank::{rank, register_rank_function};
pub use register::{
    lookup_tokenizer, register_builtin_tokenizers, register_tokenizer, UNICODE_WORDS, WHITESPACE,
};
pub use snippet::{sanitize, StructuredSnippet};
pub use tokenizer::{Token, Tokenizer, WhitespaceTokenizer};
pub use word::{WordFlags, WordTokenizer};
