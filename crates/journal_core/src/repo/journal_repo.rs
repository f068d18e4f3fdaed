//! Journal entry/habit repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide CRUD and transition APIs over `journal_entries` and `habits`.
//! - Own the transactional unit of work that pairs an entry write with its
//!   companion habit insert.
//!
//! # Invariants
//! - Write paths validate records before SQL mutations.
//! - Read paths reject invalid persisted state instead of masking it.
//! - State transitions are conditional updates (`WHERE <precondition>`), so a
//!   lost race yields `WriteOutcome::Unchanged` instead of a double write.
//! - At most one habit references a given source entry.

use crate::model::entry::{EntryId, EntryKind, JournalEntry};
use crate::model::habit::{Habit, HabitId};
use crate::model::user::UserId;
use crate::repo::support::{
    ensure_table_ready, map_unique_violation, parse_optional_uuid, parse_uuid,
};
use crate::repo::{RepoError, RepoResult, WriteOutcome};
use log::{debug, info};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row, TransactionBehavior};

const ENTRY_SELECT_SQL: &str = "SELECT
    id,
    owner_id,
    kind,
    text,
    scheduled_for,
    completed_at,
    deleted_at,
    created_at,
    updated_at
FROM journal_entries";

const HABIT_SELECT_SQL: &str = "SELECT
    id,
    owner_id,
    source_entry_id,
    text,
    deleted_at,
    created_at,
    updated_at
FROM habits";

const ENTRY_COLUMNS: &[&str] = &[
    "id",
    "owner_id",
    "kind",
    "text",
    "scheduled_for",
    "completed_at",
    "deleted_at",
    "created_at",
    "updated_at",
];

const HABIT_COLUMNS: &[&str] = &[
    "id",
    "owner_id",
    "source_entry_id",
    "text",
    "deleted_at",
    "created_at",
    "updated_at",
];

/// Query options for listing journal entries of one owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryListQuery {
    pub owner: UserId,
    pub kind: Option<EntryKind>,
    /// Inclusive lower bound on `created_at` (epoch ms).
    pub created_from: Option<i64>,
    /// Exclusive upper bound on `created_at` (epoch ms).
    pub created_before: Option<i64>,
    pub include_deleted: bool,
    pub limit: Option<u32>,
    pub offset: u32,
}

impl EntryListQuery {
    /// Unfiltered, unpaginated listing of `owner`'s live entries.
    pub fn for_owner(owner: UserId) -> Self {
        Self {
            owner,
            kind: None,
            created_from: None,
            created_before: None,
            include_deleted: false,
            limit: None,
            offset: 0,
        }
    }
}

/// Query options for listing habits of one owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HabitListQuery {
    pub owner: UserId,
    pub include_deleted: bool,
}

impl HabitListQuery {
    pub fn for_owner(owner: UserId) -> Self {
        Self {
            owner,
            include_deleted: false,
        }
    }
}

/// Repository interface for journal entries and habits.
pub trait JournalRepository {
    /// Inserts `entry`, plus `companion` in the same transaction when given.
    fn create_entry(&mut self, entry: &JournalEntry, companion: Option<&Habit>) -> RepoResult<()>;
    fn get_entry(&self, id: EntryId, include_deleted: bool) -> RepoResult<Option<JournalEntry>>;
    /// Lists entries ordered by `created_at DESC, id ASC`.
    fn list_entries(&self, query: &EntryListQuery) -> RepoResult<Vec<JournalEntry>>;
    /// Sets `completed_at` on a live entry whose `completed_at` is still null.
    fn complete_entry(&self, id: EntryId, completed_at: i64) -> RepoResult<WriteOutcome>;
    /// Switches a live log/todo entry to `habit` and inserts `habit` atomically.
    fn habitize_entry(&mut self, id: EntryId, habit: &Habit) -> RepoResult<WriteOutcome>;
    fn soft_delete_entry(&self, id: EntryId, deleted_at: i64) -> RepoResult<WriteOutcome>;
    fn get_habit(&self, id: HabitId, include_deleted: bool) -> RepoResult<Option<Habit>>;
    /// Lists habits ordered by `created_at DESC, id ASC`.
    fn list_habits(&self, query: &HabitListQuery) -> RepoResult<Vec<Habit>>;
    fn soft_delete_habit(&self, id: HabitId, deleted_at: i64) -> RepoResult<WriteOutcome>;
}

/// SQLite-backed journal repository.
pub struct SqliteJournalRepository<'conn> {
    conn: &'conn mut Connection,
}

impl<'conn> SqliteJournalRepository<'conn> {
    /// Constructs a repository from a migrated connection.
    pub fn try_new(conn: &'conn mut Connection) -> RepoResult<Self> {
        ensure_table_ready(conn, "journal_entries", ENTRY_COLUMNS)?;
        ensure_table_ready(conn, "habits", HABIT_COLUMNS)?;
        Ok(Self { conn })
    }
}

impl JournalRepository for SqliteJournalRepository<'_> {
    fn create_entry(&mut self, entry: &JournalEntry, companion: Option<&Habit>) -> RepoResult<()> {
        entry.validate()?;
        if let Some(habit) = companion {
            habit.validate()?;
            if habit.source_entry != Some(entry.id) {
                return Err(RepoError::InvalidData(format!(
                    "companion habit {} does not reference entry {}",
                    habit.id, entry.id
                )));
            }
        }

        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        insert_entry(&tx, entry)?;
        if let Some(habit) = companion {
            insert_habit(&tx, habit)?;
        }
        tx.commit()?;

        debug!(
            "event=entry_insert module=repo status=ok entry_id={} kind={} with_habit={}",
            entry.id,
            entry.kind,
            companion.is_some()
        );
        Ok(())
    }

    fn get_entry(&self, id: EntryId, include_deleted: bool) -> RepoResult<Option<JournalEntry>> {
        let mut stmt = self.conn.prepare(&format!(
            "{ENTRY_SELECT_SQL}
             WHERE id = ?1
               AND (?2 = 1 OR deleted_at IS NULL);"
        ))?;

        let mut rows = stmt.query(params![id.to_string(), include_deleted])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_entry_row(row)?));
        }

        Ok(None)
    }

    fn list_entries(&self, query: &EntryListQuery) -> RepoResult<Vec<JournalEntry>> {
        let mut sql = format!("{ENTRY_SELECT_SQL} WHERE owner_id = ?");
        let mut bind_values: Vec<Value> = vec![Value::Text(query.owner.to_string())];

        if !query.include_deleted {
            sql.push_str(" AND deleted_at IS NULL");
        }

        if let Some(kind) = query.kind {
            sql.push_str(" AND kind = ?");
            bind_values.push(Value::Text(kind.as_str().to_string()));
        }

        if let Some(from) = query.created_from {
            sql.push_str(" AND created_at >= ?");
            bind_values.push(Value::Integer(from));
        }

        if let Some(before) = query.created_before {
            sql.push_str(" AND created_at < ?");
            bind_values.push(Value::Integer(before));
        }

        sql.push_str(" ORDER BY created_at DESC, id ASC");

        if let Some(limit) = query.limit {
            sql.push_str(" LIMIT ?");
            bind_values.push(Value::Integer(i64::from(limit)));
            if query.offset > 0 {
                sql.push_str(" OFFSET ?");
                bind_values.push(Value::Integer(i64::from(query.offset)));
            }
        } else if query.offset > 0 {
            sql.push_str(" LIMIT -1 OFFSET ?");
            bind_values.push(Value::Integer(i64::from(query.offset)));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut entries = Vec::new();

        while let Some(row) = rows.next()? {
            entries.push(parse_entry_row(row)?);
        }

        Ok(entries)
    }

    fn complete_entry(&self, id: EntryId, completed_at: i64) -> RepoResult<WriteOutcome> {
        let changed = self.conn.execute(
            "UPDATE journal_entries
             SET
                completed_at = ?2,
                updated_at = ?2
             WHERE id = ?1
               AND deleted_at IS NULL
               AND completed_at IS NULL;",
            params![id.to_string(), completed_at],
        )?;

        if changed == 1 {
            return Ok(WriteOutcome::Applied);
        }
        if live_entry_exists(self.conn, id)? {
            return Ok(WriteOutcome::Unchanged);
        }
        Err(RepoError::NotFound(id))
    }

    fn habitize_entry(&mut self, id: EntryId, habit: &Habit) -> RepoResult<WriteOutcome> {
        habit.validate()?;
        if habit.source_entry != Some(id) {
            return Err(RepoError::InvalidData(format!(
                "habit {} does not reference entry {id}",
                habit.id
            )));
        }

        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let changed = tx.execute(
            "UPDATE journal_entries
             SET
                kind = 'habit',
                updated_at = ?2
             WHERE id = ?1
               AND deleted_at IS NULL
               AND kind != 'habit';",
            params![id.to_string(), habit.created_at],
        )?;

        if changed == 0 {
            let exists = live_entry_exists(&tx, id)?;
            // Dropping `tx` rolls back; nothing was written.
            drop(tx);
            return if exists {
                Ok(WriteOutcome::Unchanged)
            } else {
                Err(RepoError::NotFound(id))
            };
        }

        insert_habit(&tx, habit)?;
        tx.commit()?;

        info!(
            "event=entry_habitize module=repo status=ok entry_id={id} habit_id={}",
            habit.id
        );
        Ok(WriteOutcome::Applied)
    }

    fn soft_delete_entry(&self, id: EntryId, deleted_at: i64) -> RepoResult<WriteOutcome> {
        let changed = self.conn.execute(
            "UPDATE journal_entries
             SET
                deleted_at = ?2,
                updated_at = ?2
             WHERE id = ?1
               AND deleted_at IS NULL;",
            params![id.to_string(), deleted_at],
        )?;

        if changed == 1 {
            return Ok(WriteOutcome::Applied);
        }
        if self.get_entry(id, true)?.is_some() {
            return Ok(WriteOutcome::Unchanged);
        }
        Err(RepoError::NotFound(id))
    }

    fn get_habit(&self, id: HabitId, include_deleted: bool) -> RepoResult<Option<Habit>> {
        let mut stmt = self.conn.prepare(&format!(
            "{HABIT_SELECT_SQL}
             WHERE id = ?1
               AND (?2 = 1 OR deleted_at IS NULL);"
        ))?;

        stmt.query_row(params![id.to_string(), include_deleted], |row| {
            Ok(parse_habit_row(row))
        })
        .optional()?
        .transpose()
    }

    fn list_habits(&self, query: &HabitListQuery) -> RepoResult<Vec<Habit>> {
        let mut stmt = self.conn.prepare(&format!(
            "{HABIT_SELECT_SQL}
             WHERE owner_id = ?1
               AND (?2 = 1 OR deleted_at IS NULL)
             ORDER BY created_at DESC, id ASC;"
        ))?;

        let mut rows = stmt.query(params![query.owner.to_string(), query.include_deleted])?;
        let mut habits = Vec::new();
        while let Some(row) = rows.next()? {
            habits.push(parse_habit_row(row)?);
        }
        Ok(habits)
    }

    fn soft_delete_habit(&self, id: HabitId, deleted_at: i64) -> RepoResult<WriteOutcome> {
        let changed = self.conn.execute(
            "UPDATE habits
             SET
                deleted_at = ?2,
                updated_at = ?2
             WHERE id = ?1
               AND deleted_at IS NULL;",
            params![id.to_string(), deleted_at],
        )?;

        if changed == 1 {
            return Ok(WriteOutcome::Applied);
        }
        if self.get_habit(id, true)?.is_some() {
            return Ok(WriteOutcome::Unchanged);
        }
        Err(RepoError::NotFound(id))
    }
}

fn insert_entry(conn: &Connection, entry: &JournalEntry) -> RepoResult<()> {
    conn.execute(
        "INSERT INTO journal_entries (
            id,
            owner_id,
            kind,
            text,
            scheduled_for,
            completed_at,
            deleted_at,
            created_at,
            updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9);",
        params![
            entry.id.to_string(),
            entry.owner.to_string(),
            entry.kind.as_str(),
            entry.text.as_str(),
            entry.scheduled_for,
            entry.completed_at,
            entry.deleted_at,
            entry.created_at,
            entry.updated_at,
        ],
    )
    .map_err(|err| map_unique_violation(err, "journal_entries.id"))?;
    Ok(())
}

fn insert_habit(conn: &Connection, habit: &Habit) -> RepoResult<()> {
    conn.execute(
        "INSERT INTO habits (
            id,
            owner_id,
            source_entry_id,
            text,
            deleted_at,
            created_at,
            updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
        params![
            habit.id.to_string(),
            habit.owner.to_string(),
            habit.source_entry.map(|id| id.to_string()),
            habit.text.as_str(),
            habit.deleted_at,
            habit.created_at,
            habit.updated_at,
        ],
    )
    .map_err(|err| map_unique_violation(err, "habits.source_entry_id"))?;
    Ok(())
}

fn live_entry_exists(conn: &Connection, id: EntryId) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM journal_entries
            WHERE id = ?1
              AND deleted_at IS NULL
        );",
        [id.to_string()],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn parse_entry_row(row: &Row<'_>) -> RepoResult<JournalEntry> {
    let id_text: String = row.get("id")?;
    let owner_text: String = row.get("owner_id")?;
    let kind_text: String = row.get("kind")?;
    let kind = kind_text.parse::<EntryKind>().map_err(|_| {
        RepoError::InvalidData(format!(
            "invalid entry kind `{kind_text}` in journal_entries.kind"
        ))
    })?;

    let entry = JournalEntry {
        id: parse_uuid(&id_text, "journal_entries.id")?,
        owner: parse_uuid(&owner_text, "journal_entries.owner_id")?,
        kind,
        text: row.get("text")?,
        scheduled_for: row.get("scheduled_for")?,
        completed_at: row.get("completed_at")?,
        deleted_at: row.get("deleted_at")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    };
    entry.validate()?;
    Ok(entry)
}

fn parse_habit_row(row: &Row<'_>) -> RepoResult<Habit> {
    let id_text: String = row.get("id")?;
    let owner_text: String = row.get("owner_id")?;

    let habit = Habit {
        id: parse_uuid(&id_text, "habits.id")?,
        owner: parse_uuid(&owner_text, "habits.owner_id")?,
        source_entry: parse_optional_uuid(row.get("source_entry_id")?, "habits.source_entry_id")?,
        text: row.get("text")?,
        deleted_at: row.get("deleted_at")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    };
    habit.validate()?;
    Ok(habit)
}
