//! A small full-text index over pages of text.
//!
//! Each page has an id and one text per configured column. Searches use the
//! FTS4 MATCH syntax and return the matching page ids with a rank and a
//! structured snippet for every column.

use std::path::PathBuf;

use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use tracing::debug;

use crate::error::{Error, ErrorCode, Result};
use crate::rank::register_rank_function;
use crate::register::{register_builtin_tokenizers, register_tokenizer, UNICODE_WORDS};
use crate::snippet::{sanitize, StructuredSnippet, ELLIPSIS, MATCH_END, MATCH_START};
use crate::tokenizer::Tokenizer;

const PAGES_TABLE: &str = "pages";
const TEXT_TABLE: &str = "page_text";

/// One searchable column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnConfig {
    /// Label for the column's snippet in search results.
    pub name: String,
}

impl ColumnConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexConfig {
    /// Database file; `None` keeps the index in memory.
    pub path: Option<PathBuf>,
    /// Name of the tokenizer used by the FTS table.
    pub tokenizer: String,
    /// Arguments passed to the tokenizer's `create`.
    pub tokenizer_args: Vec<String>,
    pub columns: Vec<ColumnConfig>,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            path: None,
            tokenizer: UNICODE_WORDS.to_string(),
            tokenizer_args: Vec::new(),
            columns: vec![ColumnConfig::new("text")],
        }
    }
}

impl IndexConfig {
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_tokenizer(mut self, name: impl Into<String>, args: &[&str]) -> Self {
        self.tokenizer = name.into();
        self.tokenizer_args = args.iter().map(|arg| arg.to_string()).collect();
        self
    }

    pub fn with_columns<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = names.into_iter().map(ColumnConfig::new).collect();
        self
    }

    fn validate(&self) -> Result<()> {
        if self.columns.is_empty() {
            return Err(Error::with_message(
                ErrorCode::Misuse,
                "a text index needs at least one column",
            ));
        }
        let is_bare_word = |word: &str| {
            !word.is_empty() && word.chars().all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
        };
        for word in std::iter::once(&self.tokenizer).chain(&self.tokenizer_args) {
            if !is_bare_word(word) {
                return Err(Error::with_message(
                    ErrorCode::Misuse,
                    format!("tokenizer name or argument {:?} must be a bare word", word),
                ));
            }
        }
        Ok(())
    }

    fn tokenize_clause(&self) -> String {
        let mut clause = format!("tokenize={}", self.tokenizer);
        for arg in &self.tokenizer_args {
            clause.push(' ');
            clause.push_str(arg);
        }
        clause
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub page_id: Value,
    pub rank: f64,
    /// One snippet per configured column, in column order.
    pub snippets: Vec<StructuredSnippet>,
}

pub struct TextIndex {
    conn: Connection,
    config: IndexConfig,
}

fn column_name(index: usize) -> String {
    format!("text_{}", index)
}

fn check_page_id(page_id: &Value) -> Result<()> {
    if *page_id == Value::Null {
        return Err(Error::with_message(ErrorCode::Misuse, "a page id cannot be NULL"));
    }
    Ok(())
}

/// Delete a page and its text. Returns false if the page does not exist.
fn remove_page(conn: &Connection, page_id: &Value) -> Result<bool> {
    let rowid: Option<i64> = conn
        .query_row(
            &format!("SELECT rowid FROM {} WHERE page_id = ?1", PAGES_TABLE),
            [page_id],
            |row| row.get(0),
        )
        .optional()?;
    let Some(rowid) = rowid else {
        return Ok(false);
    };
    conn.execute(
        &format!("DELETE FROM {} WHERE docid = ?1", TEXT_TABLE),
        [rowid],
    )?;
    conn.execute(
        &format!("DELETE FROM {} WHERE rowid = ?1", PAGES_TABLE),
        [rowid],
    )?;
    Ok(true)
}

impl TextIndex {
    /// Open an index that uses one of the built-in tokenizers.
    pub fn open(config: IndexConfig) -> Result<Self> {
        Self::open_inner(config, |_conn, _name| Ok(()))
    }

    /// Open an index whose tokenizer is `T`, registered under `config.tokenizer`.
    pub fn open_with<T: Tokenizer>(config: IndexConfig) -> Result<Self> {
        Self::open_inner(config, |conn, name| register_tokenizer::<T>(conn, name))
    }

    fn open_inner(
        config: IndexConfig,
        register: impl FnOnce(&Connection, &str) -> Result<()>,
    ) -> Result<Self> {
        config.validate()?;
        let conn = match &config.path {
            Some(path) => Connection::open(path)?,
            None => Connection::open_in_memory()?,
        };
        register_builtin_tokenizers(&conn)?;
        register(&conn, &config.tokenizer)?;
        register_rank_function(&conn)?;

        let mut fts_args = vec![config.tokenize_clause()];
        fts_args.extend((0..config.columns.len()).map(column_name));
        conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {pages} (page_id UNIQUE);
             CREATE VIRTUAL TABLE IF NOT EXISTS {text} USING fts4({args});",
            pages = PAGES_TABLE,
            text = TEXT_TABLE,
            args = fts_args.join(", "),
        ))?;

        debug!(
            path = ?config.path,
            tokenizer = %config.tokenizer,
            columns = config.columns.len(),
            "opened text index"
        );
        Ok(Self { conn, config })
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Set the texts for a page, replacing any previous texts. `texts` must
    /// have one entry per configured column and the id must not be NULL.
    pub fn set(&mut self, page_id: impl Into<Value>, texts: &[&str]) -> Result<()> {
        let columns = self.config.columns.len();
        if texts.len() != columns {
            return Err(Error::with_message(
                ErrorCode::Range,
                format!("expected {} texts, got {}", columns, texts.len()),
            ));
        }
        let page_id = page_id.into();
        check_page_id(&page_id)?;

        let tx = self.conn.transaction()?;
        let replaced = remove_page(&tx, &page_id)?;
        tx.execute(
            &format!("INSERT INTO {}(page_id) VALUES (?1)", PAGES_TABLE),
            [&page_id],
        )?;
        let rowid = tx.last_insert_rowid();

        let names: Vec<String> = (0..columns).map(column_name).collect();
        let placeholders = vec!["?"; columns + 1].join(", ");
        let mut values = vec![Value::Integer(rowid)];
        values.extend(texts.iter().map(|text| Value::Text(sanitize(text))));
        tx.execute(
            &format!(
                "INSERT INTO {}(docid, {}) VALUES ({})",
                TEXT_TABLE,
                names.join(", "),
                placeholders
            ),
            params_from_iter(values.iter()),
        )?;
        tx.commit()?;

        debug!(?page_id, replaced, "set page text");
        Ok(())
    }

    /// Remove a page. Returns false if it was not in the index.
    pub fn delete(&mut self, page_id: impl Into<Value>) -> Result<bool> {
        let page_id = page_id.into();
        check_page_id(&page_id)?;
        let tx = self.conn.transaction()?;
        let removed = remove_page(&tx, &page_id)?;
        tx.commit()?;
        debug!(?page_id, removed, "deleted page");
        Ok(removed)
    }

    pub fn len(&self) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            &format!("SELECT count(*) FROM {}", PAGES_TABLE),
            [],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Run an FTS4 MATCH query. Hits are ordered by rank, best first.
    pub fn search(&self, query: &str) -> Result<Vec<SearchHit>> {
        let columns = self.config.columns.len();
        // matchinfo() and snippet() only work while the FTS table drives the
        // scan, so page ids are resolved separately instead of through a join.
        let mut sql = format!("SELECT docid, rank(matchinfo({}))", TEXT_TABLE);
        for column in 0..columns {
            sql.push_str(&format!(", snippet({}, ?1, ?2, ?3, {})", TEXT_TABLE, column));
        }
        sql.push_str(&format!(" FROM {} WHERE {} MATCH ?4", TEXT_TABLE, TEXT_TABLE));

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(
            params![
                MATCH_START.to_string(),
                MATCH_END.to_string(),
                ELLIPSIS.to_string(),
                query
            ],
            |row| {
                let mut snippets = Vec::with_capacity(columns);
                for column in 0..columns {
                    let raw: String = row.get(2 + column)?;
                    snippets.push(StructuredSnippet::parse(&raw));
                }
                Ok((row.get::<_, i64>(0)?, row.get::<_, f64>(1)?, snippets))
            },
        )?;
        let mut matches = rows.collect::<rusqlite::Result<Vec<_>>>()?;
        matches.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));

        let mut lookup = self
            .conn
            .prepare_cached(&format!("SELECT page_id FROM {} WHERE rowid = ?1", PAGES_TABLE))?;
        let mut hits = Vec::with_capacity(matches.len());
        for (docid, rank, snippets) in matches {
            let page_id: Option<Value> = lookup.query_row([docid], |row| row.get(0)).optional()?;
            let Some(page_id) = page_id else {
                return Err(Error::with_message(
                    ErrorCode::Internal,
                    format!("indexed text {} has no page", docid),
                ));
            };
            hits.push(SearchHit {
                page_id,
                rank,
                snippets,
            });
        }

        debug!(query, hits = hits.len(), "searched text index");
        Ok(hits)
    }
}
