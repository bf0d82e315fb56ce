use rusqlite::{Connection, Result};

/// Initialise the derived full-text index. This database holds no canonical
/// state — it is rebuilt from the `memory/YYYY-MM-DD.md` files by
/// `MemoryManager::reindex` and may be deleted safely at any time.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE VIRTUAL TABLE IF NOT EXISTS memory_fts USING fts5(date, text);
         CREATE TABLE IF NOT EXISTS tool_calls (
             tool_name  TEXT NOT NULL,
             called_at  TEXT NOT NULL
         );
         CREATE INDEX IF NOT EXISTS idx_tool_calls_name_time
             ON tool_calls(tool_name, called_at DESC);",
    )
}

pub fn clear_index(conn: &Connection) -> Result<()> {
    conn.execute("DELETE FROM memory_fts", [])?;
    Ok(())
}
