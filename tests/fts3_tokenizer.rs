//! Tokenizers driven by SQLite's own FTS3/FTS4 engine.

use fts3_tokenizer::{
    lifecycle, lookup_tokenizer, module, register_builtin_tokenizers, register_tokenizer, Result,
    Token, Tokenizer, WhitespaceTokenizer, UNICODE_WORDS,
};
use rusqlite::{params, Connection};

fn open() -> Connection {
    let conn = Connection::open_in_memory().expect("open in-memory database");
    register_builtin_tokenizers(&conn).expect("register builtin tokenizers");
    conn
}

/// Rows of an `fts3tokenize` table for `input`: (token, start, end, position).
fn tokenize_with(conn: &Connection, table: &str, input: &str) -> Vec<(String, i64, i64, i64)> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT token, start, \"end\", position FROM {} WHERE input = ?1",
            table
        ))
        .expect("prepare fts3tokenize query");
    let rows = stmt
        .query_map([input], |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
        })
        .expect("query fts3tokenize");
    rows.collect::<rusqlite::Result<Vec<_>>>()
        .expect("collect tokens")
}

fn matching_docids(conn: &Connection, sql: &str, query: &str) -> Vec<i64> {
    let mut stmt = conn.prepare(sql).expect("prepare match query");
    let rows = stmt
        .query_map([query], |row| row.get(0))
        .expect("run match query");
    rows.collect::<rusqlite::Result<Vec<_>>>()
        .expect("collect docids")
}

#[test]
fn identity_tokenizer_through_fts3tokenize() {
    let conn = open();
    conn.execute_batch("CREATE VIRTUAL TABLE tok USING fts3tokenize(whitespace)")
        .unwrap();

    let tokens = tokenize_with(&conn, "tok", "alpha beta gamma");
    assert_eq!(
        tokens,
        vec![
            ("alpha".to_string(), 0, 5, 0),
            ("beta".to_string(), 6, 10, 1),
            ("gamma".to_string(), 11, 16, 2),
        ]
    );
}

#[test]
fn word_tokenizer_arguments_reach_create() {
    let conn = open();
    conn.execute_batch(
        "CREATE VIRTUAL TABLE folded USING fts3tokenize(unicode_words);
         CREATE VIRTUAL TABLE exact USING fts3tokenize(unicode_words, case_sensitive);",
    )
    .unwrap();

    let folded = tokenize_with(&conn, "folded", "Straße, Ωmega!");
    let folded: Vec<&str> = folded.iter().map(|t| t.0.as_str()).collect();
    assert_eq!(folded, vec!["straße", "ωmega"]);

    let exact = tokenize_with(&conn, "exact", "Straße, Ωmega!");
    assert_eq!(exact[1], ("Ωmega".to_string(), 9, 15, 1));
}

#[test]
fn fts3_table_inserts_and_matches() {
    let conn = open();
    conn.execute_batch(&format!(
        "CREATE VIRTUAL TABLE docs USING fts3(title, body, tokenize={});",
        UNICODE_WORDS
    ))
    .unwrap();

    let rows = [
        (1, "Rust FFI", "Binding SQLite's tokenizer from Rust."),
        (2, "Crème brûlée", "A dessert, not a Tokenizer."),
        (3, "Gardening", "Nothing to see here."),
    ];
    for (docid, title, body) in rows {
        conn.execute(
            "INSERT INTO docs(docid, title, body) VALUES (?1, ?2, ?3)",
            params![docid, title, body],
        )
        .unwrap();
    }

    let sql = "SELECT docid FROM docs WHERE docs MATCH ?1 ORDER BY docid";
    assert_eq!(matching_docids(&conn, sql, "tokenizer"), vec![1, 2]);
    assert_eq!(matching_docids(&conn, sql, "BRÛLÉE"), vec![2]);
    assert_eq!(matching_docids(&conn, sql, "title:rust"), vec![1]);
    assert_eq!(matching_docids(&conn, sql, "\"binding sqlite's\""), vec![1]);
    assert!(matching_docids(&conn, sql, "absent").is_empty());

    let offsets: String = conn
        .query_row(
            "SELECT offsets(docs) FROM docs WHERE docs MATCH 'dessert'",
            [],
            |row| row.get(0),
        )
        .unwrap();
    // column 1, term 0, byte offset 2, 7 bytes
    assert_eq!(offsets, "1 0 2 7");
}

#[test]
fn unknown_tokenizer_argument_fails_table_creation() {
    let conn = open();
    let result = conn.execute_batch(
        "CREATE VIRTUAL TABLE bad USING fts4(body, tokenize=unicode_words no_such_option)",
    );
    assert!(result.is_err());
}

#[test]
fn invalid_utf8_input_fails_the_insert() {
    let conn = open();
    conn.execute_batch("CREATE VIRTUAL TABLE t USING fts4(body, tokenize=unicode_words)")
        .unwrap();

    // "good bad\xff tail"
    let result = conn.execute(
        "INSERT INTO t(docid, body) VALUES (1, CAST(x'676f6f6420626164ff207461696c' AS TEXT))",
        [],
    );
    assert!(result.is_err());

    let sql = "SELECT docid FROM t WHERE t MATCH ?1";
    assert!(matching_docids(&conn, sql, "good").is_empty());
    assert!(matching_docids(&conn, sql, "tail").is_empty());
}

struct Counted;

impl Tokenizer for Counted {
    fn create(_args: &[&str]) -> Result<Self> {
        Ok(Counted)
    }

    fn tokenize(&self, text: &str, language_id: i32) -> Result<Vec<Token>> {
        WhitespaceTokenizer.tokenize(text, language_id)
    }
}

#[test]
fn every_create_and_open_is_balanced() {
    {
        let conn = Connection::open_in_memory().unwrap();
        register_tokenizer::<Counted>(&conn, "counted").unwrap();
        conn.execute_batch(
            "CREATE VIRTUAL TABLE notes USING fts4(body, tokenize=counted);
             INSERT INTO notes(body) VALUES ('one two three');
             INSERT INTO notes(body) VALUES ('two three four');
             UPDATE notes SET body = 'five six' WHERE docid = 1;
             DELETE FROM notes WHERE docid = 2;",
        )
        .unwrap();
        let hits = matching_docids(
            &conn,
            "SELECT docid FROM notes WHERE notes MATCH ?1",
            "five",
        );
        assert_eq!(hits, vec![1]);

        let live = lifecycle::<Counted>();
        assert!(live.live_tokenizers() >= 1);
        assert_eq!(live.live_cursors(), 0);
    }

    let stats = lifecycle::<Counted>();
    assert!(stats.created >= 1);
    assert_eq!(stats.created, stats.destroyed);
    assert!(stats.opened >= 1);
    assert_eq!(stats.opened, stats.closed);
    assert_eq!(stats.language_calls, 0);
}

struct VersionZero;

impl Tokenizer for VersionZero {
    fn create(_args: &[&str]) -> Result<Self> {
        Ok(VersionZero)
    }

    fn tokenize(&self, text: &str, language_id: i32) -> Result<Vec<Token>> {
        assert_eq!(language_id, 0);
        WhitespaceTokenizer.tokenize(text, language_id)
    }
}

#[test]
fn version_zero_module_never_gets_language_calls() {
    let table = module::<VersionZero>();
    assert_eq!(table.iVersion, 0);
    assert!(table.xLanguageid.is_none());

    let conn = Connection::open_in_memory().unwrap();
    register_tokenizer::<VersionZero>(&conn, "v0").unwrap();
    conn.execute_batch(
        "CREATE VIRTUAL TABLE t USING fts4(body, languageid=\"lid\", tokenize=v0);
         INSERT INTO t(docid, body, lid) VALUES (1, 'hello world', 0);
         INSERT INTO t(docid, body, lid) VALUES (2, 'hello there', 3);",
    )
    .unwrap();

    let hits = matching_docids(
        &conn,
        "SELECT docid FROM t WHERE t MATCH ?1 AND lid = 3",
        "hello",
    );
    assert_eq!(hits, vec![2]);
    assert_eq!(lifecycle::<VersionZero>().language_calls, 0);
}

/// Lower-cases only text tagged with language 1.
struct LanguageAware;

impl Tokenizer for LanguageAware {
    const SUPPORTS_LANGUAGE_ID: bool = true;

    fn create(_args: &[&str]) -> Result<Self> {
        Ok(LanguageAware)
    }

    fn tokenize(&self, text: &str, language_id: i32) -> Result<Vec<Token>> {
        let mut tokens = WhitespaceTokenizer.tokenize(text, language_id)?;
        if language_id == 1 {
            for token in &mut tokens {
                token.text = token.text.to_lowercase();
            }
        }
        Ok(tokens)
    }
}

#[test]
fn version_one_module_sees_language_ids() {
    let table = module::<LanguageAware>();
    assert_eq!(table.iVersion, 1);
    assert!(table.xLanguageid.is_some());

    let conn = Connection::open_in_memory().unwrap();
    register_tokenizer::<LanguageAware>(&conn, "lang").unwrap();
    conn.execute_batch(
        "CREATE VIRTUAL TABLE t USING fts4(body, languageid=\"lid\", tokenize=lang);
         INSERT INTO t(docid, body, lid) VALUES (1, 'Hello', 0);
         INSERT INTO t(docid, body, lid) VALUES (2, 'Hello', 1);",
    )
    .unwrap();

    let lang0 = "SELECT docid FROM t WHERE t MATCH ?1 AND lid = 0";
    let lang1 = "SELECT docid FROM t WHERE t MATCH ?1 AND lid = 1";
    assert!(matching_docids(&conn, lang0, "hello").is_empty());
    assert_eq!(matching_docids(&conn, lang0, "Hello"), vec![1]);
    assert_eq!(matching_docids(&conn, lang1, "hello"), vec![2]);

    assert!(lifecycle::<LanguageAware>().language_calls >= 2);
}

#[test]
fn registration_is_idempotent_and_visible() {
    let conn = open();
    register_builtin_tokenizers(&conn).unwrap();
    assert_eq!(
        lookup_tokenizer(&conn, "whitespace").unwrap(),
        Some(module::<WhitespaceTokenizer>() as *const _)
    );
    // SQLite's own tokenizers live in the same namespace
    assert!(lookup_tokenizer(&conn, "simple").unwrap().is_some());
}

#[test]
fn tables_need_the_tokenizer_registered_after_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fts.db");

    {
        let conn = Connection::open(&path).unwrap();
        register_builtin_tokenizers(&conn).unwrap();
        conn.execute_batch(
            "CREATE VIRTUAL TABLE notes USING fts4(body, tokenize=unicode_words);
             INSERT INTO notes(docid, body) VALUES (7, 'Persisted Über text');",
        )
        .unwrap();
    }

    let conn = Connection::open(&path).unwrap();
    let err = conn
        .prepare("SELECT docid FROM notes WHERE notes MATCH 'über'")
        .err()
        .expect("tokenizer is not registered on the new connection");
    assert!(err.to_string().contains("unknown tokenizer"));

    register_builtin_tokenizers(&conn).unwrap();
    let hits = matching_docids(
        &conn,
        "SELECT docid FROM notes WHERE notes MATCH ?1",
        "über",
    );
    assert_eq!(hits, vec![7]);
}
