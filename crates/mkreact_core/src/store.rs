/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use anyhow::{Context, Result};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Params};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::model::{ReactionKey, UserReactionCount};

/// Declared shape of an append-only table.
#[derive(Debug, Clone, Copy)]
pub struct TableDef {
    pub name: &'static str,
    pub columns: &'static [(&'static str, &'static str)],
}

pub const NOTELIST: TableDef = TableDef {
    name: "notelist",
    columns: &[("text", "TEXT"), ("noteid", "TEXT"), ("timestamp", "TEXT")],
};

pub const REACTIONLIST: TableDef = TableDef {
    name: "reactionlist",
    columns: &[
        ("noteid", "TEXT"),
        ("userid", "TEXT"),
        ("username", "TEXT"),
        ("host", "TEXT"),
    ],
};

impl TableDef {
    fn create_sql(&self) -> String {
        let cols = self
            .columns
            .iter()
            .map(|(name, ty)| format!("{name} {ty}"))
            .collect::<Vec<_>>()
            .join(", ");
        format!("CREATE TABLE IF NOT EXISTS {} ({cols})", self.name)
    }

    fn insert_sql(&self) -> String {
        let names = self
            .columns
            .iter()
            .map(|(name, _)| *name)
            .collect::<Vec<_>>()
            .join(", ");
        let slots = (1..=self.columns.len())
            .map(|i| format!("?{i}"))
            .collect::<Vec<_>>()
            .join(", ");
        format!("INSERT INTO {} ({names}) VALUES ({slots})", self.name)
    }
}

/// Rows of a read query with their column names.
#[derive(Debug, Clone, Default)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl QueryResult {
    pub fn column_index(&self, name: &str) -> Result<usize> {
        self.columns
            .iter()
            .position(|c| c == name)
            .with_context(|| format!("missing column: {name}"))
    }

    /// Non-null values of one column rendered as text.
    pub fn texts(&self, name: &str) -> Result<Vec<String>> {
        let idx = self.column_index(name)?;
        Ok(self.rows.iter().filter_map(|r| value_text(r.get(idx)?)).collect())
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

fn value_text(v: &Value) -> Option<String> {
    match v {
        Value::Text(s) => Some(s.clone()),
        Value::Integer(i) => Some(i.to_string()),
        Value::Real(f) => Some(f.to_string()),
        Value::Null | Value::Blob(_) => None,
    }
}

fn value_u64(v: &Value) -> u64 {
    match v {
        Value::Integer(i) => (*i).max(0) as u64,
        Value::Real(f) => f.max(0.0) as u64,
        Value::Text(s) => s.trim().parse().unwrap_or(0),
        Value::Null | Value::Blob(_) => 0,
    }
}

/// SQLite-backed append-only store. Every operation opens its own connection.
#[derive(Clone)]
pub struct Store {
    path: PathBuf,
}

impl Store {
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self> {
        let path = db_path.as_ref().to_path_buf();
        let conn = Connection::open(&path).with_context(|| format!("open db: {}", path.display()))?;
        conn.query_row("SELECT 1", [], |_| Ok(()))?;
        Ok(Self { path })
    }

    /// Like [`Store::open`], but refuses to create a database that is not there yet.
    pub fn open_existing(db_path: impl AsRef<Path>) -> Result<Self> {
        let path = db_path.as_ref();
        if !path.is_file() {
            anyhow::bail!("db not found: {}", path.display());
        }
        Self::open(path)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn connect(&self) -> Result<Connection> {
        Connection::open(&self.path).with_context(|| format!("open db: {}", self.path.display()))
    }

    /// Appends `rows` to `table`, creating it on first use. No deduplication happens here.
    pub fn append(&self, table: &TableDef, rows: &[Vec<Value>]) -> Result<usize> {
        if rows.is_empty() {
            return Ok(0);
        }
        if let Some(bad) = rows.iter().find(|r| r.len() != table.columns.len()) {
            anyhow::bail!(
                "append {}: row has {} values, table has {} columns",
                table.name,
                bad.len(),
                table.columns.len()
            );
        }
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;
        tx.execute(&table.create_sql(), [])
            .with_context(|| format!("create table {}", table.name))?;
        {
            let mut stmt = tx.prepare(&table.insert_sql())?;
            for row in rows {
                stmt.execute(params_from_iter(row.iter()))?;
            }
        }
        tx.commit()?;
        Ok(rows.len())
    }

    /// Runs a read-only statement and returns every row.
    pub fn query<P: Params>(&self, sql: &str, params: P) -> Result<QueryResult> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(sql).with_context(|| format!("prepare: {sql}"))?;
        if !stmt.readonly() {
            anyhow::bail!("query must be read-only: {sql}");
        }
        let columns = stmt
            .column_names()
            .into_iter()
            .map(str::to_string)
            .collect::<Vec<_>>();
        let width = columns.len();
        let rows = stmt
            .query_map(params, |r| {
                (0..width)
                    .map(|i| r.get::<_, Value>(i))
                    .collect::<rusqlite::Result<Vec<_>>>()
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(QueryResult { columns, rows })
    }

    pub fn table_exists(&self, table: &TableDef) -> Result<bool> {
        let conn = self.connect()?;
        let found: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM sqlite_master WHERE type='table' AND name=?1",
                params![table.name],
                |r| r.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    pub fn count_rows(&self, table: &TableDef) -> Result<u64> {
        if !self.table_exists(table)? {
            return Ok(0);
        }
        let res = self.query(&format!("SELECT COUNT(*) AS n FROM {}", table.name), [])?;
        let idx = res.column_index("n")?;
        Ok(res.rows.first().map(|r| value_u64(&r[idx])).unwrap_or(0))
    }

    pub fn stored_note_ids(&self) -> Result<HashSet<String>> {
        if !self.table_exists(&NOTELIST)? {
            return Ok(HashSet::new());
        }
        let res = self.query("SELECT DISTINCT noteid FROM notelist", [])?;
        Ok(res.texts("noteid")?.into_iter().collect())
    }

    /// Most recently created distinct note ids, newest first. Timestamps are compared
    /// as instants, so rows written under different offsets still order correctly.
    pub fn recent_note_ids(&self, limit: u32) -> Result<Vec<String>> {
        if !self.table_exists(&NOTELIST)? {
            return Ok(Vec::new());
        }
        let res = self.query(
            r#"
            SELECT noteid, MAX(julianday(timestamp)) AS ts
            FROM notelist
            GROUP BY noteid
            ORDER BY ts DESC, noteid
            LIMIT ?1
            "#,
            params![limit as i64],
        )?;
        res.texts("noteid")
    }

    pub fn stored_reaction_keys(&self) -> Result<HashSet<ReactionKey>> {
        if !self.table_exists(&REACTIONLIST)? {
            return Ok(HashSet::new());
        }
        let res = self.query("SELECT DISTINCT noteid, userid FROM reactionlist", [])?;
        let n = res.column_index("noteid")?;
        let u = res.column_index("userid")?;
        Ok(res
            .rows
            .iter()
            .filter_map(|r| {
                Some(ReactionKey {
                    note_id: value_text(&r[n])?,
                    user_id: value_text(&r[u])?,
                })
            })
            .collect())
    }

    /// User id of every reaction whose note was created at or after `cutoff`.
    /// Reactions on notes that are not stored never match.
    pub fn reactor_ids_since(&self, cutoff: &str) -> Result<Vec<String>> {
        if !self.table_exists(&REACTIONLIST)? || !self.table_exists(&NOTELIST)? {
            return Ok(Vec::new());
        }
        let res = self.query(
            r#"
            SELECT react.userid AS userid, note.timestamp AS timestamp
            FROM reactionlist AS react
            LEFT JOIN notelist AS note ON note.noteid = react.noteid
            WHERE julianday(note.timestamp) >= julianday(?1)
            ORDER BY julianday(note.timestamp)
            "#,
            params![cutoff],
        )?;
        res.texts("userid")
    }

    /// Reaction totals grouped by `(userid, username)`, largest first.
    pub fn reaction_counts_by_user(&self) -> Result<Vec<UserReactionCount>> {
        self.reaction_counts(
            r#"
            SELECT userid, username, COUNT(noteid) AS num
            FROM reactionlist
            GROUP BY userid, username
            ORDER BY num DESC, userid
            "#,
        )
    }

    /// Reaction totals grouped by `userid` only, labelled with one of its usernames.
    pub fn reaction_counts_by_userid(&self) -> Result<Vec<UserReactionCount>> {
        self.reaction_counts(
            r#"
            SELECT userid, MAX(username) AS username, COUNT(noteid) AS num
            FROM reactionlist
            GROUP BY userid
            ORDER BY num DESC, userid
            "#,
        )
    }

    fn reaction_counts(&self, sql: &str) -> Result<Vec<UserReactionCount>> {
        if !self.table_exists(&REACTIONLIST)? {
            return Ok(Vec::new());
        }
        let res = self.query(sql, [])?;
        let u = res.column_index("userid")?;
        let name = res.column_index("username")?;
        let num = res.column_index("num")?;
        Ok(res
            .rows
            .iter()
            .filter_map(|r| {
                Some(UserReactionCount {
                    user_id: value_text(&r[u])?,
                    username: value_text(&r[name]).unwrap_or_default(),
                    count: value_u64(&r[num]),
                })
            })
            .collect())
    }
}
