//! SQLite-backed [`FileStore`] implementation.
//!
//! Index schema mirrors a `files` table plus an FTS5 `files_fts` mirror kept
//! in sync by `AFTER INSERT/UPDATE/DELETE` triggers, matching the reference
//! implementation's `_init_db`. File-number allocation takes the
//! store-global connection lock around `SELECT MAX(file_num)+1`; filesystem
//! writes happen outside any lock once the file number is reserved, per the
//! concurrency model.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};

use super::path::relative_artifact_path;
use super::{FileRecord, FileStore};
use crate::error::StoreError;
use pacsat_proto::Pfh;

const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS file_counter (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    next_file_num INTEGER NOT NULL
);

INSERT OR IGNORE INTO file_counter (id, next_file_num) VALUES (1, 1);

CREATE TABLE IF NOT EXISTS files (
    file_num INTEGER PRIMARY KEY,
    filename TEXT UNIQUE NOT NULL,
    callsign TEXT NOT NULL,
    upload_time INTEGER NOT NULL,
    size INTEGER NOT NULL,
    path TEXT UNIQUE NOT NULL,
    compression_type INTEGER NOT NULL DEFAULT 0,
    description TEXT NOT NULL DEFAULT '',
    download_count INTEGER NOT NULL DEFAULT 0,
    priority INTEGER NOT NULL DEFAULT 0,
    forwarding TEXT NOT NULL DEFAULT ''
);

CREATE VIRTUAL TABLE IF NOT EXISTS files_fts USING fts5(
    filename, callsign, description,
    content = 'files',
    content_rowid = 'file_num'
);

CREATE TRIGGER IF NOT EXISTS files_ai AFTER INSERT ON files BEGIN
    INSERT INTO files_fts(rowid, filename, callsign, description)
    VALUES (new.file_num, new.filename, new.callsign, new.description);
END;

CREATE TRIGGER IF NOT EXISTS files_ad AFTER DELETE ON files BEGIN
    INSERT INTO files_fts(files_fts, rowid, filename, callsign, description)
    VALUES ('delete', old.file_num, old.filename, old.callsign, old.description);
END;

CREATE TRIGGER IF NOT EXISTS files_au AFTER UPDATE ON files BEGIN
    INSERT INTO files_fts(files_fts, rowid, filename, callsign, description)
    VALUES ('delete', old.file_num, old.filename, old.callsign, old.description);
    INSERT INTO files_fts(rowid, filename, callsign, description)
    VALUES (new.file_num, new.filename, new.callsign, new.description);
END;
";

/// A [`FileStore`] backed by a SQLite index and a nested directory tree of
/// `serialize(PFH) ‖ body` artifacts under `root`.
#[derive(Clone)]
pub struct SqliteFileStore {
    root: Arc<PathBuf>,
    conn: Arc<Mutex<Connection>>,
}

impl SqliteFileStore {
    /// Opens (creating if necessary) a store rooted at `root`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if `root`/`root/.trash` cannot be created or
    /// the index cannot be opened/migrated.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        fs::create_dir_all(root.join(".trash"))?;
        let conn = Connection::open(root.join("metadata.db"))?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { root: Arc::new(root), conn: Arc::new(Mutex::new(conn)) })
    }

    fn trash_dir(&self) -> PathBuf {
        self.root.join(".trash")
    }

    fn record_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<FileRecord> {
        let forwarding_raw: String = row.get("forwarding")?;
        Ok(FileRecord {
            file_num: row.get::<_, i64>("file_num")? as u32,
            filename: row.get("filename")?,
            callsign: row.get("callsign")?,
            upload_time: row.get::<_, i64>("upload_time")? as u32,
            size: row.get::<_, i64>("size")? as u32,
            path: row.get("path")?,
            compression_type: row.get::<_, i64>("compression_type")? as u8,
            description: row.get("description")?,
            download_count: row.get::<_, i64>("download_count")? as u32,
            priority: row.get::<_, i64>("priority")? as u8,
            forwarding: if forwarding_raw.is_empty() {
                Vec::new()
            } else {
                forwarding_raw.split(';').map(str::to_string).collect()
            },
        })
    }
}

impl FileStore for SqliteFileStore {
    fn reserve_file_number(&self) -> Result<u32, StoreError> {
        let conn = self.conn.lock();
        // Dedicated counter row rather than `SELECT MAX(file_num)+1 FROM
        // files`: a reservation must not be reusable even if the caller
        // never follows up with `add_file` (e.g. an upload session that
        // times out before completion).
        let reserved: i64 = conn.query_row(
            "UPDATE file_counter SET next_file_num = next_file_num + 1 \
             WHERE id = 1 RETURNING next_file_num - 1",
            [],
            |r| r.get(0),
        )?;
        Ok(reserved as u32)
    }

    fn add_file(
        &self,
        file_num: u32,
        callsign: &str,
        mut pfh: Pfh,
        body: &[u8],
        upload_time_secs: u32,
    ) -> Result<(), StoreError> {
        let conn = self.conn.lock();

        pfh.file_number = file_num;
        pfh.upload_time = upload_time_secs;
        pfh.body_size = body.len() as u32;
        // body_offset is itself an item inside the header, so its value
        // must be measured, not assumed; a probe encode at offset 0 gives
        // the exact serialized length since every item's width is
        // independent of its value.
        pfh.body_offset = 0;
        let probe_len = pfh
            .encode()
            .map_err(|e| StoreError::CorruptHeader { file_num, source: e })?
            .len();
        pfh.body_offset =
            u16::try_from(probe_len).map_err(|_| StoreError::InvalidHeader("header exceeds 65535 bytes".into()))?;
        let header_bytes =
            pfh.encode().map_err(|e| StoreError::CorruptHeader { file_num, source: e })?;
        debug_assert_eq!(header_bytes.len(), usize::from(pfh.body_offset));

        let relative_path = relative_artifact_path(pfh.trimmed_name(), file_num);
        let full_path = self.root.join(&relative_path);
        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let tmp_path = sibling_tmp_path(&full_path);
        let write_result = fs::write(&tmp_path, [header_bytes.as_slice(), body].concat())
            .and_then(|()| fs::rename(&tmp_path, &full_path));
        if let Err(err) = write_result {
            let _ = fs::remove_file(&tmp_path);
            return Err(StoreError::Io(err));
        }

        let filename = if pfh.trimmed_ext().is_empty() {
            pfh.trimmed_name().to_string()
        } else {
            format!("{}.{}", pfh.trimmed_name(), pfh.trimmed_ext())
        };
        let forwarding = pfh.forwarding.join(";");
        let path_str = relative_path.to_string_lossy().replace('\\', "/");

        let insert_result = conn.execute(
            "INSERT INTO files (file_num, filename, callsign, upload_time, size, path, \
             compression_type, description, download_count, priority, forwarding) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                file_num,
                filename,
                callsign,
                upload_time_secs,
                pfh.body_size,
                path_str,
                pfh.compression_type,
                pfh.description,
                pfh.download_count,
                pfh.priority,
                forwarding,
            ],
        );
        if let Err(err) = insert_result {
            let _ = fs::remove_file(&full_path);
            return Err(StoreError::Index(err));
        }

        Ok(())
    }

    fn get_path(&self, file_num: u32) -> Result<Option<String>, StoreError> {
        let conn = self.conn.lock();
        let path = conn
            .query_row("SELECT path FROM files WHERE file_num = ?1", params![file_num], |r| r.get(0))
            .optional()?;
        Ok(path)
    }

    fn open(&self, file_num: u32) -> Result<Vec<u8>, StoreError> {
        let path = self.get_path(file_num)?.ok_or(StoreError::NotFound(file_num))?;
        Ok(fs::read(self.root.join(path))?)
    }

    fn list(&self) -> Result<Vec<FileRecord>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT * FROM files ORDER BY upload_time DESC, file_num DESC")?;
        let rows = stmt.query_map([], Self::record_from_row)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    fn delete(&self, file_num: u32, permanent: bool, now_secs: u32) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        let path: Option<String> = conn
            .query_row("SELECT path FROM files WHERE file_num = ?1", params![file_num], |r| r.get(0))
            .optional()?;
        let path = path.ok_or(StoreError::NotFound(file_num))?;
        let full_path = self.root.join(&path);

        if permanent {
            fs::remove_file(&full_path)?;
        } else {
            let basename = full_path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();
            let trash_path = self.trash_dir().join(format!("{file_num}_{now_secs}.{basename}"));
            fs::rename(&full_path, &trash_path)?;
        }

        conn.execute("DELETE FROM files WHERE file_num = ?1", params![file_num])?;
        drop(conn);

        if let Some(parent) = full_path.parent() {
            prune_empty_ancestors(parent, &self.root);
        }
        Ok(())
    }

    fn increment_download_count(&self, file_num: u32) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        let updated = conn.execute(
            "UPDATE files SET download_count = download_count + 1 WHERE file_num = ?1",
            params![file_num],
        )?;
        if updated == 0 {
            return Err(StoreError::NotFound(file_num));
        }
        Ok(())
    }

    fn search(&self, text: &str) -> Result<Vec<FileRecord>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT f.* FROM files_fts JOIN files f ON f.file_num = files_fts.rowid \
             WHERE files_fts MATCH ?1 ORDER BY bm25(files_fts), f.upload_time DESC",
        )?;
        let rows = stmt.query_map(params![text], Self::record_from_row)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    fn prune_trash(&self, retention_secs: u32, now_secs: u32) -> Result<usize, StoreError> {
        let mut removed = 0;
        for entry in fs::read_dir(self.trash_dir())? {
            let entry = entry?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            let Some(epoch) = parse_trash_epoch(&name) else { continue };
            if now_secs.saturating_sub(epoch) > retention_secs {
                fs::remove_file(entry.path())?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}

fn sibling_tmp_path(path: &Path) -> PathBuf {
    let mut tmp_name = OsString::from(path.file_name().unwrap_or_default());
    tmp_name.push(".tmp");
    path.with_file_name(tmp_name)
}

/// Parses the `<epoch>` field out of a `<file_num>_<epoch>.<basename>`
/// trash entry name.
fn parse_trash_epoch(name: &str) -> Option<u32> {
    let after_underscore = name.split_once('_')?.1;
    let epoch_str = after_underscore.split('.').next()?;
    epoch_str.parse().ok()
}

fn prune_empty_ancestors(start: &Path, root: &Path) {
    let mut dir = start;
    while dir != root && dir.starts_with(root) {
        let Ok(mut entries) = fs::read_dir(dir) else { return };
        if entries.next().is_some() {
            return;
        }
        if fs::remove_dir(dir).is_err() {
            return;
        }
        let Some(parent) = dir.parent() else { return };
        dir = parent;
    }
}
