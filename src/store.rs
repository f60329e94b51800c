use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};

use crate::error::{CatalogError, Result};
use crate::model::{Command, CommandKind, CommandRequest, CommandStatus, Commodity, NewUser, Tag, User, UserType};

pub const SCHEMA_VERSION: i32 = 1;

/// A table-backed record the gateway knows how to read and write.
pub trait Entity: Sized {
    const TABLE: &'static str;
    const KEY: &'static str;
    const COLUMNS: &'static str;

    fn key(&self) -> i64;
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self>;
    fn insert(&self, conn: &Connection) -> Result<()>;
    /// Returns false when no row carries this record's key.
    fn update(&self, conn: &Connection) -> Result<bool>;
}

impl Entity for Commodity {
    const TABLE: &'static str = "commodity";
    const KEY: &'static str = "item_id";
    const COLUMNS: &'static str = "item_id, detail_url, image, price, title";

    fn key(&self) -> i64 {
        self.item_id
    }

    fn from_row(r: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Commodity {
            item_id: r.get(0)?,
            detail_url: r.get(1)?,
            image: r.get(2)?,
            price: r.get(3)?,
            title: r.get(4)?,
        })
    }

    fn insert(&self, conn: &Connection) -> Result<()> {
        conn.execute(
            "INSERT INTO commodity(item_id, detail_url, image, price, title) VALUES (?1,?2,?3,?4,?5)",
            params![self.item_id, self.detail_url, self.image, self.price, self.title],
        )?;
        Ok(())
    }

    fn update(&self, conn: &Connection) -> Result<bool> {
        let n = conn.execute(
            "UPDATE commodity SET detail_url=?2, image=?3, price=?4, title=?5 WHERE item_id=?1",
            params![self.item_id, self.detail_url, self.image, self.price, self.title],
        )?;
        Ok(n > 0)
    }
}

impl Entity for Tag {
    const TABLE: &'static str = "tag";
    const KEY: &'static str = "tag_id";
    const COLUMNS: &'static str = "tag_id, name";

    fn key(&self) -> i64 {
        self.tag_id
    }

    fn from_row(r: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Tag {
            tag_id: r.get(0)?,
            name: r.get(1)?,
        })
    }

    fn insert(&self, conn: &Connection) -> Result<()> {
        conn.execute(
            "INSERT INTO tag(tag_id, name) VALUES (?1,?2)",
            params![self.tag_id, self.name],
        )?;
        Ok(())
    }

    fn update(&self, conn: &Connection) -> Result<bool> {
        let n = conn.execute(
            "UPDATE tag SET name=?2 WHERE tag_id=?1",
            params![self.tag_id, self.name],
        )?;
        Ok(n > 0)
    }
}

fn bad_code(idx: usize, code: i64) -> rusqlite::Error {
    rusqlite::Error::IntegralValueOutOfRange(idx, code)
}

impl Entity for User {
    const TABLE: &'static str = "user";
    const KEY: &'static str = "id";
    const COLUMNS: &'static str = "id, username, email, password, tag_id, user_type";

    fn key(&self) -> i64 {
        self.id
    }

    fn from_row(r: &Row<'_>) -> rusqlite::Result<Self> {
        let code: i64 = r.get(5)?;
        Ok(User {
            id: r.get(0)?,
            username: r.get(1)?,
            email: r.get(2)?,
            password: r.get(3)?,
            tag_id: r.get(4)?,
            user_type: UserType::from_code(code).ok_or_else(|| bad_code(5, code))?,
        })
    }

    fn insert(&self, conn: &Connection) -> Result<()> {
        conn.execute(
            "INSERT INTO user(id, username, email, password, tag_id, user_type) VALUES (?1,?2,?3,?4,?5,?6)",
            params![
                self.id,
                self.username,
                self.email,
                self.password,
                self.tag_id,
                self.user_type.code()
            ],
        )?;
        Ok(())
    }

    fn update(&self, conn: &Connection) -> Result<bool> {
        let n = conn.execute(
            "UPDATE user SET username=?2, email=?3, password=?4, tag_id=?5, user_type=?6 WHERE id=?1",
            params![
                self.id,
                self.username,
                self.email,
                self.password,
                self.tag_id,
                self.user_type.code()
            ],
        )?;
        Ok(n > 0)
    }
}

impl Entity for Command {
    const TABLE: &'static str = "admin_command";
    const KEY: &'static str = "id";
    const COLUMNS: &'static str = "id, command, reason, extra, create_time, status, diagnostics";

    fn key(&self) -> i64 {
        self.id
    }

    fn from_row(r: &Row<'_>) -> rusqlite::Result<Self> {
        let kind: i64 = r.get(1)?;
        let created_ms: i64 = r.get(4)?;
        let status: i64 = r.get(5)?;
        Ok(Command {
            id: r.get(0)?,
            kind: CommandKind::from_code(kind).ok_or_else(|| bad_code(1, kind))?,
            reason: r.get(2)?,
            extra: r.get(3)?,
            create_time: DateTime::<Utc>::from_timestamp_millis(created_ms)
                .ok_or_else(|| bad_code(4, created_ms))?,
            status: CommandStatus::from_code(status).ok_or_else(|| bad_code(5, status))?,
            diagnostics: r.get(6)?,
        })
    }

    fn insert(&self, conn: &Connection) -> Result<()> {
        conn.execute(
            "INSERT INTO admin_command(id, command, reason, extra, create_time, status, diagnostics)
VALUES (?1,?2,?3,?4,?5,?6,?7)",
            params![
                self.id,
                self.kind.code(),
                self.reason,
                self.extra,
                self.create_time.timestamp_millis(),
                self.status.code(),
                self.diagnostics
            ],
        )?;
        Ok(())
    }

    fn update(&self, conn: &Connection) -> Result<bool> {
        let n = conn.execute(
            "UPDATE admin_command SET command=?2, reason=?3, extra=?4, status=?5, diagnostics=?6 WHERE id=?1",
            params![
                self.id,
                self.kind.code(),
                self.reason,
                self.extra,
                self.status.code(),
                self.diagnostics
            ],
        )?;
        Ok(n > 0)
    }
}

/// Delete every row of `E`'s table. Returns how many rows went away.
pub fn delete_all<E: Entity>(conn: &Connection) -> Result<usize> {
    Ok(conn.execute(&format!("DELETE FROM {}", E::TABLE), [])?)
}

pub fn insert_all<E: Entity>(conn: &Connection, records: &[E]) -> Result<()> {
    for record in records {
        record.insert(conn)?;
    }
    Ok(())
}

pub fn get_by_id<E: Entity>(conn: &Connection, id: i64) -> Result<Option<E>> {
    let sql = format!("SELECT {} FROM {} WHERE {}=?1", E::COLUMNS, E::TABLE, E::KEY);
    Ok(conn.query_row(&sql, params![id], E::from_row).optional()?)
}

pub fn list_all<E: Entity>(conn: &Connection) -> Result<Vec<E>> {
    let sql = format!("SELECT {} FROM {} ORDER BY {} ASC", E::COLUMNS, E::TABLE, E::KEY);
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], E::from_row)?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

pub fn count<E: Entity>(conn: &Connection) -> Result<i64> {
    Ok(conn.query_row(&format!("SELECT COUNT(*) FROM {}", E::TABLE), [], |r| r.get(0))?)
}

/// Insert a command row with a database-assigned id.
pub fn create_command(
    conn: &Connection,
    request: &CommandRequest,
    status: CommandStatus,
    diagnostics: Option<&str>,
) -> Result<Command> {
    let create_time = Utc::now();
    conn.execute(
        "INSERT INTO admin_command(command, reason, extra, create_time, status, diagnostics)
VALUES (?1,?2,?3,?4,?5,?6)",
        params![
            request.kind.code(),
            request.reason,
            request.extra,
            create_time.timestamp_millis(),
            status.code(),
            diagnostics
        ],
    )?;
    let id = conn.last_insert_rowid();
    get_by_id::<Command>(conn, id)?.ok_or(CatalogError::State("command row vanished after insert"))
}

/// Gateway over one SQLite connection holding the console's tables.
pub struct Store<'c> {
    conn: &'c Connection,
}

impl<'c> Store<'c> {
    /// Bind the store to an existing SQLite connection.
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    /// Create the tables if missing. Safe to call multiple times.
    pub fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
PRAGMA journal_mode=WAL;

CREATE TABLE IF NOT EXISTS tag (
tag_id INTEGER PRIMARY KEY,
name TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS commodity (
item_id INTEGER PRIMARY KEY,
detail_url TEXT NOT NULL,
image TEXT NOT NULL,
price INTEGER NOT NULL,
title TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS user (
id INTEGER PRIMARY KEY AUTOINCREMENT,
username TEXT NOT NULL UNIQUE,
email TEXT NOT NULL UNIQUE,
password TEXT NOT NULL,
tag_id INTEGER, -- remote tag the user manages; tags are replaced wholesale so no FK
user_type INTEGER NOT NULL DEFAULT 0 CHECK(user_type IN (0,1))
);

CREATE TABLE IF NOT EXISTS admin_command (
id INTEGER PRIMARY KEY AUTOINCREMENT,
command INTEGER NOT NULL CHECK(command IN (0,1,2)),
reason TEXT NOT NULL,
extra TEXT, -- JSON as typed by the operator
create_time INTEGER NOT NULL, -- unix millis
status INTEGER NOT NULL CHECK(status IN (0,1)),
diagnostics TEXT
);

CREATE INDEX IF NOT EXISTS idx_commodity_title ON commodity(title);

CREATE TABLE IF NOT EXISTS catalog_kv (
k TEXT PRIMARY KEY,
v TEXT NOT NULL
);
"#,
        )?;
        self.conn.execute(
            "INSERT INTO catalog_kv(k,v) VALUES('schema_version',?1)
ON CONFLICT(k) DO NOTHING",
            params![SCHEMA_VERSION.to_string()],
        )?;
        Ok(())
    }

    /// Return the integer schema version stored in `catalog_kv`.
    pub fn schema_version(&self) -> Result<i32> {
        let ver: Option<String> = self
            .conn
            .query_row("SELECT v FROM catalog_kv WHERE k='schema_version'", [], |r| r.get(0))
            .optional()?;
        Ok(ver.and_then(|s| s.parse::<i32>().ok()).unwrap_or(SCHEMA_VERSION))
    }

    /// Execute closure `f` inside a transaction and commit if `f` returns Ok.
    /// On Err the transaction is dropped, which rolls it back.
    pub fn with_tx<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&rusqlite::Transaction<'_>) -> Result<R>,
    {
        let tx = self.conn.unchecked_transaction()?;
        let result = f(&tx)?;
        tx.commit()?;
        Ok(result)
    }

    /// Delete every `E` and insert `records`, atomically.
    pub fn replace_all<E: Entity>(&self, records: &[E]) -> Result<usize> {
        self.with_tx(|tx| {
            let deleted = delete_all::<E>(tx)?;
            insert_all(tx, records)?;
            Ok(deleted)
        })
    }

    pub fn get_by_id<E: Entity>(&self, id: i64) -> Result<Option<E>> {
        get_by_id(self.conn, id)
    }

    pub fn list_all<E: Entity>(&self) -> Result<Vec<E>> {
        list_all(self.conn)
    }

    pub fn count<E: Entity>(&self) -> Result<i64> {
        count::<E>(self.conn)
    }

    /// Insert a record whose key is supplied by the caller.
    pub fn create<E: Entity>(&self, record: &E) -> Result<()> {
        record.insert(self.conn)
    }

    /// Overwrite the stored record with the same key.
    pub fn update<E: Entity>(&self, record: &E) -> Result<()> {
        if record.update(self.conn)? {
            Ok(())
        } else {
            Err(CatalogError::NotFound {
                entity: E::TABLE,
                id: record.key(),
            })
        }
    }

    pub fn create_user(&self, new_user: &NewUser) -> Result<User> {
        self.conn.execute(
            "INSERT INTO user(username, email, password, tag_id, user_type) VALUES (?1,?2,?3,?4,?5)",
            params![
                new_user.username,
                new_user.email,
                new_user.password,
                new_user.tag_id,
                new_user.user_type.code()
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        self.get_by_id::<User>(id)?
            .ok_or(CatalogError::State("user row vanished after insert"))
    }

    pub fn create_command(
        &self,
        request: &CommandRequest,
        status: CommandStatus,
        diagnostics: Option<&str>,
    ) -> Result<Command> {
        create_command(self.conn, request, status, diagnostics)
    }
}
