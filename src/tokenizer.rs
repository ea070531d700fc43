use crate::error::Result;

/// A normalized token and where it came from in the input buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// Normalized text (after case folding etc).
    pub text: String,
    /// Number of tokens produced before this one.
    pub position: i32,
    /// Byte offset of the first byte of the token in the input.
    pub start: usize,
    /// Byte offset just past the end of the token in the input.
    pub end: usize,
}

impl Token {
    pub fn new(text: impl Into<String>, position: i32, start: usize, end: usize) -> Self {
        Self {
            text: text.into(),
            position,
            start,
            end,
        }
    }
}

/// A tokenizer that can be exposed to SQLite's FTS3/FTS4 engine.
///
/// One value is created per `CREATE VIRTUAL TABLE ... tokenize=<name> args`
/// (and per table connect), shared by every cursor opened on it.
pub trait Tokenizer: Sized + Send + Sync + 'static {
    /// When true the module is published with `iVersion = 1` and the engine
    /// passes the row's language id before tokenizing.
    const SUPPORTS_LANGUAGE_ID: bool = false;

    /// Build a tokenizer from the arguments following its name in the
    /// `tokenize=` clause.
    fn create(args: &[&str]) -> Result<Self>;

    /// Split `text` into tokens. Offsets are byte offsets into `text`.
    fn tokenize(&self, text: &str, language_id: i32) -> Result<Vec<Token>>;
}

/// Splits on ASCII whitespace and returns every word unchanged.
#[derive(Debug, Default, Clone, Copy)]
pub struct WhitespaceTokenizer;

impl Tokenizer for WhitespaceTokenizer {
    fn create(_args: &[&str]) -> Result<Self> {
        Ok(Self)
    }

    fn tokenize(&self, text: &str, _language_id: i32) -> Result<Vec<Token>> {
        let mut tokens = Vec::new();
        let mut pos = 0i32;
        let mut idx = 0usize;
        let bytes = text.as_bytes();
        while idx < bytes.len() {
            while idx < bytes.len() && bytes[idx].is_ascii_whitespace() {
                idx += 1;
            }
            if idx >= bytes.len() {
                break;
            }
            let start = idx;
            while idx < bytes.len() && !bytes[idx].is_ascii_whitespace() {
                idx += 1;
            }
            tokens.push(Token::new(&text[start..idx], pos, start, idx));
            pos += 1;
        }
        Ok(tokens)
    }
}
