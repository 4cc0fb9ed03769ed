//! SqliteStore: JSONL journal with an SQLite index.
//!
//! Dual storage, one directory per project:
//! - **agents.jsonl / modes.jsonl**: append-only journal of every change (source of truth)
//! - **state.db**: SQLite index holding the latest version of each record
//!
//! Every transaction takes SQLite's write lock (`BEGIN IMMEDIATE`) before it
//! reads, so a CLI process toggling warp and a running daemon never lose each
//! other's updates. Journal lines are appended before the index is written.
//!
//! The journal is compacted to one line per record whenever the index is
//! rebuilt, and whenever it grows past [`COMPACT_AFTER_LINES`] lines or
//! [`COMPACT_AFTER_BYTES`] bytes. Compaction also runs under the write lock.

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use rusqlite::{Connection, OptionalExtension, Transaction, TransactionBehavior, params};
use serde::Serialize;
use sha2::{Digest, Sha256};

use super::traits::{Ledger, StateStore};
use crate::domain::{Agent, AgentRecord, ModeState};
use crate::error::{Result, TurnkeeperError};

const STORE_DIR: &str = ".turnkeeper";
const AGENTS_JOURNAL: &str = "agents.jsonl";
const MODES_JOURNAL: &str = "modes.jsonl";
const DB_FILE: &str = "state.db";

const META_MODES: &str = "modes";
const META_JOURNAL_LINES: &str = "journal_lines";

/// Journal lines (both files) after which a transaction compacts the journal.
pub const COMPACT_AFTER_LINES: usize = 512;

/// Agent journal size after which a transaction compacts the journal.
pub const COMPACT_AFTER_BYTES: u64 = 8 * 1024 * 1024;

/// Durable state store backed by a journal and an SQLite index.
pub struct SqliteStore {
    /// Base directory for this project's store
    base_dir: PathBuf,
    inner: Mutex<Inner>,
}

struct Inner {
    db: Connection,
    agents_journal: PathBuf,
    modes_journal: PathBuf,
}

impl SqliteStore {
    /// Open or create the store for a project under `state_dir`.
    ///
    /// The store lives at `<state_dir>/<project-hash>/.turnkeeper/`.
    pub fn open(state_dir: &Path, project_dir: &Path) -> Result<Self> {
        let project_hash = compute_project_hash(project_dir)?;
        Self::open_at(&state_dir.join(project_hash))
    }

    /// Open or create the store at the specified directory.
    ///
    /// Useful for testing with custom paths.
    pub fn open_at(base_dir: &Path) -> Result<Self> {
        let store_dir = base_dir.join(STORE_DIR);
        fs::create_dir_all(&store_dir).map_err(|e| {
            TurnkeeperError::Storage(format!("Failed to create store directory {}: {}", store_dir.display(), e))
        })?;

        let db_path = store_dir.join(DB_FILE);
        let db = Connection::open(&db_path)?;
        db.busy_timeout(Duration::from_secs(5))?;
        Self::init_schema(&db)?;

        let mut inner = Inner {
            db,
            agents_journal: store_dir.join(AGENTS_JOURNAL),
            modes_journal: store_dir.join(MODES_JOURNAL),
        };
        inner.rebuild_index_if_needed()?;

        log::debug!("Opened state store at {}", store_dir.display());

        Ok(Self {
            base_dir: base_dir.to_path_buf(),
            inner: Mutex::new(inner),
        })
    }

    /// Initialize the SQLite schema.
    fn init_schema(db: &Connection) -> Result<()> {
        db.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS agents (
                agent TEXT PRIMARY KEY,
                rotation_order INTEGER NOT NULL,
                phase TEXT NOT NULL,
                cycle_active INTEGER NOT NULL,
                is_suppressed INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                json_data TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_agents_active ON agents(cycle_active);

            CREATE TABLE IF NOT EXISTS meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            "#,
        )?;
        Ok(())
    }

    /// Get the base directory.
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }
}

impl Inner {
    /// Rebuild the index when the journal holds lines the index has not seen.
    ///
    /// Counting, replay and rewrite all happen under the write lock, so a
    /// writer in another process cannot commit in between.
    fn rebuild_index_if_needed(&mut self) -> Result<()> {
        let tx = self.db.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let journal_lines = count_lines(&self.agents_journal)? + count_lines(&self.modes_journal)?;
        let indexed_lines: usize = read_meta(&tx, META_JOURNAL_LINES)?
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);

        if journal_lines != indexed_lines {
            log::info!(
                "Rebuilding state index ({} journal lines, {} indexed)",
                journal_lines,
                indexed_lines
            );
            let ledger = replay_ledger(&self.agents_journal, &self.modes_journal)?;
            tx.execute("DELETE FROM agents", [])?;
            for record in ledger.records.values() {
                insert_record(&tx, record)?;
            }
            write_meta(&tx, META_MODES, &serde_json::to_string(&ledger.modes)?)?;

            let compacted = compact_journal(&self.agents_journal, &self.modes_journal, &ledger)?;
            write_meta(&tx, META_JOURNAL_LINES, &compacted.to_string())?;
        }

        tx.commit()?;
        Ok(())
    }
}

impl StateStore for SqliteStore {
    fn transact<R>(&self, f: impl FnOnce(&mut Ledger) -> Result<R>) -> Result<R> {
        let mut guard = self
            .inner
            .lock()
            .map_err(|e| TurnkeeperError::StoreUnavailable(e.to_string()))?;
        let Inner {
            db,
            agents_journal,
            modes_journal,
        } = &mut *guard;

        let tx = db
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| TurnkeeperError::StoreUnavailable(e.to_string()))?;

        let before = load_ledger(&tx)?;
        let mut ledger = before.clone();
        let demoted = ledger.repair_exclusion();
        if !demoted.is_empty() {
            log::warn!("Deactivated extra active agents on load: {:?}", demoted);
        }

        // An Err here drops `tx`, which rolls back.
        let result = f(&mut ledger)?;

        let changed: Vec<&AgentRecord> = ledger.changed_since(&before);
        let modes_changed = ledger.modes != before.modes;
        if changed.is_empty() && !modes_changed {
            tx.commit()?;
            return Ok(result);
        }

        let mut appended = append_journal(agents_journal, &changed)?;
        if modes_changed {
            appended += append_journal(modes_journal, &[ledger.modes])?;
            write_meta(&tx, META_MODES, &serde_json::to_string(&ledger.modes)?)?;
        }
        for record in &changed {
            insert_record(&tx, record)?;
        }

        let indexed: usize = read_meta(&tx, META_JOURNAL_LINES)?
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);
        let mut journal_lines = indexed + appended;
        if journal_lines > COMPACT_AFTER_LINES || file_len(agents_journal)? > COMPACT_AFTER_BYTES {
            let compacted = compact_journal(agents_journal, modes_journal, &ledger)?;
            log::debug!("Compacted state journal from {} to {} lines", journal_lines, compacted);
            journal_lines = compacted;
        }
        write_meta(&tx, META_JOURNAL_LINES, &journal_lines.to_string())?;
        tx.commit()?;

        Ok(result)
    }
}

/// Load every indexed record plus the mode flags.
fn load_ledger(tx: &Transaction<'_>) -> Result<Ledger> {
    let mut stmt = tx.prepare("SELECT json_data FROM agents ORDER BY rotation_order")?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

    let mut records = BTreeMap::new();
    for row in rows {
        let record: AgentRecord = serde_json::from_str(&row?)?;
        records.insert(record.agent, record);
    }

    let modes = match read_meta(tx, META_MODES)? {
        Some(json) => serde_json::from_str(&json)?,
        None => ModeState::default(),
    };

    Ok(Ledger { records, modes })
}

/// Insert or replace a record in the index.
fn insert_record(db: &Connection, record: &AgentRecord) -> Result<()> {
    let json_data = serde_json::to_string(record)?;
    db.execute(
        r#"
        INSERT OR REPLACE INTO agents
        (agent, rotation_order, phase, cycle_active, is_suppressed, updated_at, json_data)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        "#,
        params![
            record.key(),
            record.rotation_order as i64,
            record.quota.phase.as_str(),
            record.quota.cycle_active,
            record.suppression.is_suppressed,
            record.updated_at,
            json_data,
        ],
    )?;
    Ok(())
}

fn read_meta(db: &Connection, key: &str) -> Result<Option<String>> {
    let value = db
        .query_row("SELECT value FROM meta WHERE key = ?1", params![key], |row| row.get(0))
        .optional()?;
    Ok(value)
}

fn write_meta(db: &Connection, key: &str, value: &str) -> Result<()> {
    db.execute(
        "INSERT OR REPLACE INTO meta (key, value) VALUES (?1, ?2)",
        params![key, value],
    )?;
    Ok(())
}

/// One JSON line per item.
fn to_lines<T: Serialize>(items: &[T]) -> Result<String> {
    let mut buf = String::new();
    for item in items {
        buf.push_str(&serde_json::to_string(item)?);
        buf.push('\n');
    }
    Ok(buf)
}

/// Append one JSON line per item. Returns the number of lines written.
fn append_journal<T: Serialize>(path: &Path, items: &[T]) -> Result<usize> {
    if items.is_empty() {
        return Ok(0);
    }
    let buf = to_lines(items)?;
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(buf.as_bytes())?;
    file.sync_data()?;
    Ok(items.len())
}

/// Replace a journal with exactly `items`, via a temp file and rename.
fn rewrite_journal<T: Serialize>(path: &Path, items: &[T]) -> Result<usize> {
    let tmp = path.with_extension("jsonl.tmp");
    let mut file = File::create(&tmp)?;
    file.write_all(to_lines(items)?.as_bytes())?;
    file.sync_data()?;
    fs::rename(&tmp, path)?;
    Ok(items.len())
}

/// Rewrite both journals to the ledger's current state. Returns the line count.
fn compact_journal(agents_journal: &Path, modes_journal: &Path, ledger: &Ledger) -> Result<usize> {
    let records: Vec<&AgentRecord> = ledger.records.values().collect();
    Ok(rewrite_journal(agents_journal, &records)? + rewrite_journal(modes_journal, &[ledger.modes])?)
}

/// Latest version of every record, and the latest mode flags.
fn replay_ledger(agents_journal: &Path, modes_journal: &Path) -> Result<Ledger> {
    let mut records = BTreeMap::new();
    for record in replay::<AgentRecord>(agents_journal)? {
        records.insert(record.agent, record);
    }
    let modes = replay::<ModeState>(modes_journal)?.pop().unwrap_or_default();
    Ok(Ledger { records, modes })
}

/// Parse every line of a journal, oldest first. Unparseable lines are skipped.
fn replay<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let reader = BufReader::new(File::open(path)?);
    let mut items = Vec::new();
    for (n, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str(&line) {
            Ok(item) => items.push(item),
            Err(e) => log::warn!("Skipping bad journal line {} in {}: {}", n + 1, path.display(), e),
        }
    }
    Ok(items)
}

fn file_len(path: &Path) -> Result<u64> {
    if !path.exists() {
        return Ok(0);
    }
    Ok(fs::metadata(path)?.len())
}

fn count_lines(path: &Path) -> Result<usize> {
    if !path.exists() {
        return Ok(0);
    }
    let reader = BufReader::new(File::open(path)?);
    let mut count = 0;
    for line in reader.lines() {
        if !line?.trim().is_empty() {
            count += 1;
        }
    }
    Ok(count)
}

/// Compute a hash of the project directory path.
///
/// Used to create unique storage directories per project.
pub fn compute_project_hash(project_dir: &Path) -> Result<String> {
    let canonical = project_dir.canonicalize().map_err(|e| {
        TurnkeeperError::Storage(format!("Failed to canonicalize {}: {}", project_dir.display(), e))
    })?;

    let mut hasher = Sha256::new();
    hasher.update(canonical.to_string_lossy().as_bytes());
    let result = hasher.finalize();

    // Use first 8 bytes (16 hex chars) for a shorter directory name
    Ok(hex::encode(&result[..8]))
}
