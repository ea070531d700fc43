//! Unicode-aware word tokenizer.
//!
//! The built-in `simple` and `porter` tokenizers only understand ASCII word
//! characters. This one segments with the Unicode word-boundary rules
//! (UAX #29), so accented letters, CJK ideographs and apostrophes inside words
//! are handled, and case folds every script rather than just A-Z.

use bitflags::bitflags;
use unicode_segmentation::UnicodeSegmentation;

use crate::error::{Error, ErrorCode, Result};
use crate::tokenizer::{Token, Tokenizer};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct WordFlags: u32 {
        /// Lower-case every token.
        const FOLD_CASE = 0b0001;
        /// Emit segments made only of digits.
        const KEEP_NUMBERS = 0b0010;
    }
}

impl Default for WordFlags {
    fn default() -> Self {
        WordFlags::FOLD_CASE | WordFlags::KEEP_NUMBERS
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct WordTokenizer {
    flags: WordFlags,
}

impl WordTokenizer {
    pub fn new(flags: WordFlags) -> Self {
        Self { flags }
    }

    pub fn flags(&self) -> WordFlags {
        self.flags
    }

    fn parse_args(args: &[&str]) -> Result<WordFlags> {
        let mut flags = WordFlags::default();
        for arg in args {
            match arg.to_ascii_lowercase().as_str() {
                "case_sensitive" => flags.remove(WordFlags::FOLD_CASE),
                "skip_numbers" => flags.remove(WordFlags::KEEP_NUMBERS),
                _ => {
                    return Err(Error::with_message(
                        ErrorCode::Error,
                        format!("unrecognized tokenizer argument: {}", arg),
                    ))
                }
            }
        }
        Ok(flags)
    }

    fn fold(&self, word: &str) -> String {
        // No locale here: the same text must always produce the same tokens.
        if self.flags.contains(WordFlags::FOLD_CASE) {
            word.to_lowercase()
        } else {
            word.to_string()
        }
    }
}

fn is_word(segment: &str) -> bool {
    segment.chars().any(char::is_alphanumeric)
}

fn is_number(segment: &str) -> bool {
    !segment.chars().any(char::is_alphabetic)
}

impl Tokenizer for WordTokenizer {
    fn create(args: &[&str]) -> Result<Self> {
        Ok(Self::new(Self::parse_args(args)?))
    }

    fn tokenize(&self, text: &str, _language_id: i32) -> Result<Vec<Token>> {
        let keep_numbers = self.flags.contains(WordFlags::KEEP_NUMBERS);
        let mut tokens = Vec::new();
        let mut position = 0i32;

        for (start, segment) in text.split_word_bound_indices() {
            if !is_word(segment) {
                continue;
            }
            if !keep_numbers && is_number(segment) {
                continue;
            }
            tokens.push(Token::new(
                self.fold(segment),
                position,
                start,
                start + segment.len(),
            ));
            position += 1;
        }

        Ok(tokens)
    }
}
