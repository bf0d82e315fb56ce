use std::path::{Path, PathBuf};
use std::sync::Mutex;

use rusqlite::Connection;
use tracing::{debug, instrument, warn};

use crate::error::{MemoryError, Result};
use crate::types::{MemoryEntry, MemoryHit};

const MIN_SIMILARITY: f32 = 0.25;

/// Produces a fixed-size embedding for a piece of text.
///
/// The real deployment plugs in an external embeddings model (a capability
/// adapter per the runtime's external-interfaces boundary); `HashEmbedder`
/// is the deterministic local fallback used when none is configured, so
/// hybrid search still degrades to something better than pure keyword match.
pub trait Embedder: Send + Sync {
    fn embed(&self, text: &str) -> Vec<f32>;
}

/// Deterministic bag-of-words hashing embedder — no network call, no model
/// weights. Good enough to rank near-duplicate phrasing above unrelated text.
pub struct HashEmbedder {
    dims: usize,
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self { dims: 64 }
    }
}

impl Embedder for HashEmbedder {
    fn embed(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0f32; self.dims];
        for word in text.to_lowercase().split_whitespace() {
            let h = fnv1a(word.as_bytes());
            v[(h as usize) % self.dims] += 1.0;
        }
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in v.iter_mut() {
                *x /= norm;
            }
        }
        v
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for &b in bytes {
        hash ^= b as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    dot.clamp(-1.0, 1.0)
}

/// Manages the dated markdown memory corpus and its derived search index.
///
/// Canonical state is the files under `workspace_root/memory/*.md` and
/// `workspace_root/MEMORY.md`; `db` is a rebuildable FTS5 + tool-call-log
/// index, never the source of truth.
pub struct MemoryManager {
    workspace_root: PathBuf,
    db: Mutex<Connection>,
    embedder: Box<dyn Embedder>,
}

impl MemoryManager {
    pub fn new(workspace_root: impl Into<PathBuf>, conn: Connection) -> Result<Self> {
        crate::db::init_db(&conn)?;
        Ok(Self {
            workspace_root: workspace_root.into(),
            db: Mutex::new(conn),
            embedder: Box::new(HashEmbedder::default()),
        })
    }

    fn memory_dir(&self) -> PathBuf {
        self.workspace_root.join("memory")
    }

    fn dated_path(&self, date: &str) -> PathBuf {
        self.memory_dir().join(format!("{date}.md"))
    }

    fn long_term_path(&self) -> PathBuf {
        self.workspace_root.join("MEMORY.md")
    }

    /// Append a fact bullet to today's dated memory file and index it.
    #[instrument(skip(self, text))]
    pub fn save_memory(&self, text: &str) -> Result<()> {
        let date = chrono::Utc::now().format("%Y-%m-%d").to_string();
        self.save_memory_dated(&date, text)
    }

    pub fn save_memory_dated(&self, date: &str, text: &str) -> Result<()> {
        std::fs::create_dir_all(self.memory_dir())?;
        let path = self.dated_path(date);
        let mut existing = std::fs::read_to_string(&path).unwrap_or_default();
        if !existing.is_empty() && !existing.ends_with('\n') {
            existing.push('\n');
        }
        existing.push_str(&format!("- {text}\n"));
        std::fs::write(&path, existing)?;

        let db = self.db.lock().unwrap();
        db.execute(
            "INSERT INTO memory_fts(date, text) VALUES (?1, ?2)",
            rusqlite::params![date, text],
        )?;
        Ok(())
    }

    /// Append to the long-term memory file (used by `save_persona` for
    /// onboarding completion and by compaction-adjacent consolidation).
    pub fn save_long_term(&self, text: &str) -> Result<()> {
        let mut existing = std::fs::read_to_string(self.long_term_path()).unwrap_or_default();
        if !existing.is_empty() && !existing.ends_with('\n') {
            existing.push('\n');
        }
        existing.push_str(text);
        existing.push('\n');
        std::fs::write(self.long_term_path(), existing)?;
        Ok(())
    }

    pub fn long_term_summary(&self) -> String {
        std::fs::read_to_string(self.long_term_path()).unwrap_or_default()
    }

    /// Hybrid search: union of keyword top-K (FTS5) and vector top-K
    /// (cosine against the hashing embedder), re-ranked by reciprocal rank,
    /// filtered to `score >= MIN_SIMILARITY`.
    #[instrument(skip(self))]
    pub fn search(&self, query: &str, k: usize) -> Result<Vec<MemoryHit>> {
        let db = self.db.lock().unwrap();

        let keyword: Vec<(String, String)> = {
            let mut stmt = db.prepare(
                "SELECT date, text FROM memory_fts WHERE memory_fts MATCH ?1 ORDER BY rank LIMIT ?2",
            )?;
            let escaped = escape_fts_query(query);
            let rows = stmt
                .query_map(rusqlite::params![escaped, k as i64], |row| {
                    Ok((row.get(0)?, row.get(1)?))
                })?
                .filter_map(|r| r.ok())
                .collect();
            rows
        };

        let all: Vec<(String, String)> = {
            let mut stmt = db.prepare("SELECT date, text FROM memory_fts")?;
            let rows = stmt
                .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
                .filter_map(|r| r.ok())
                .collect();
            rows
        };
        let q_vec = self.embedder.embed(query);
        let mut vector: Vec<(f32, (String, String))> = all
            .into_iter()
            .map(|(d, t)| {
                let sim = cosine(&q_vec, &self.embedder.embed(&t));
                (sim, (d, t))
            })
            .collect();
        vector.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        vector.truncate(k);

        // Reciprocal-rank fusion across the two ranked lists.
        let mut scores: std::collections::HashMap<(String, String), f32> =
            std::collections::HashMap::new();
        for (rank, entry) in keyword.into_iter().enumerate() {
            *scores.entry(entry).or_insert(0.0) += 1.0 / (60.0 + rank as f32);
        }
        for (rank, (_, entry)) in vector.into_iter().enumerate() {
            *scores.entry(entry).or_insert(0.0) += 1.0 / (60.0 + rank as f32);
        }

        let max_score = scores.values().cloned().fold(0f32, f32::max).max(1e-6);
        let mut hits: Vec<MemoryHit> = scores
            .into_iter()
            .map(|((date, text), score)| MemoryHit {
                entry: MemoryEntry { date, text },
                score: score / max_score,
            })
            .filter(|h| h.score >= MIN_SIMILARITY)
            .collect();
        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(k);
        Ok(hits)
    }

    /// Rebuild the derived index from the markdown files on disk. Safe to
    /// call at any time — the index carries no state the files don't.
    #[instrument(skip(self))]
    pub fn reindex(&self) -> Result<usize> {
        let db = self.db.lock().unwrap();
        crate::db::clear_index(&db)?;
        let mut count = 0;
        let dir = self.memory_dir();
        if !dir.exists() {
            return Ok(0);
        }
        let mut entries: Vec<_> = std::fs::read_dir(&dir)?.filter_map(|e| e.ok()).collect();
        entries.sort_by_key(|e| e.file_name());
        for entry in entries {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("md") {
                continue;
            }
            let date = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("unknown")
                .to_string();
            let content = std::fs::read_to_string(&path).unwrap_or_default();
            for line in content.lines() {
                if let Some(text) = line.strip_prefix("- ") {
                    db.execute(
                        "INSERT INTO memory_fts(date, text) VALUES (?1, ?2)",
                        rusqlite::params![date, text],
                    )?;
                    count += 1;
                }
            }
        }
        debug!(count, "memory reindex complete");
        Ok(count)
    }

    /// Record a tool invocation for "hot topics" surfacing. Best-effort —
    /// failures here never interrupt a turn.
    pub fn log_tool_call(&self, tool_name: &str) -> Result<()> {
        let db = self.db.lock().unwrap();
        db.execute(
            "INSERT INTO tool_calls (tool_name, called_at) VALUES (?1, ?2)",
            rusqlite::params![tool_name, chrono::Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    /// Tools called most frequently in the last `days`, most-called first.
    pub fn get_top_tools(&self, days: i64, limit: usize) -> Result<Vec<String>> {
        let db = self.db.lock().unwrap();
        let since = (chrono::Utc::now() - chrono::Duration::days(days)).to_rfc3339();
        let mut stmt = db.prepare(
            "SELECT tool_name, COUNT(*) as c FROM tool_calls
             WHERE called_at >= ?1 GROUP BY tool_name ORDER BY c DESC LIMIT ?2",
        )?;
        let rows = stmt.query_map(rusqlite::params![since, limit as i64], |row| {
            row.get::<_, String>(0)
        })?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    /// Knowledge-index entries whose memory text mentions one of `topics`,
    /// for the volatile-tier "hot topics" system prompt section.
    pub fn get_hot_topics(&self, topics: &[String], limit: usize) -> Result<Vec<MemoryEntry>> {
        if topics.is_empty() {
            return Ok(Vec::new());
        }
        let mut hits = Vec::new();
        for topic in topics {
            if let Ok(found) = self.search(topic, 1) {
                hits.extend(found.into_iter().map(|h| h.entry));
            }
            if hits.len() >= limit {
                break;
            }
        }
        hits.truncate(limit);
        Ok(hits)
    }

    pub fn forget_dated(&self, date: &str, text: &str) -> Result<()> {
        let path = self.dated_path(date);
        let content = std::fs::read_to_string(&path).map_err(MemoryError::Io)?;
        let bullet = format!("- {text}");
        let filtered: String = content
            .lines()
            .filter(|l| *l != bullet)
            .map(|l| format!("{l}\n"))
            .collect();
        std::fs::write(&path, filtered)?;
        let db = self.db.lock().unwrap();
        db.execute(
            "DELETE FROM memory_fts WHERE date = ?1 AND text = ?2",
            rusqlite::params![date, text],
        )?;
        Ok(())
    }

    pub fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }
}

fn escape_fts_query(q: &str) -> String {
    // Wrap each token in double quotes so FTS5 treats user text as literal
    // terms rather than query syntax (AND/OR/NOT, column filters, etc).
    q.split_whitespace()
        .map(|w| format!("\"{}\"", w.replace('"', "")))
        .collect::<Vec<_>>()
        .join(" OR ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> (tempfile::TempDir, MemoryManager) {
        let dir = tempfile::tempdir().unwrap();
        let conn = Connection::open_in_memory().unwrap();
        let mgr = MemoryManager::new(dir.path(), conn).unwrap();
        (dir, mgr)
    }

    #[test]
    fn save_and_search_finds_exact_keyword() {
        let (_dir, mgr) = manager();
        mgr.save_memory_dated("2026-01-01", "user prefers dark roast coffee")
            .unwrap();
        let hits = mgr.search("coffee", 5).unwrap();
        assert!(!hits.is_empty());
        assert!(hits[0].entry.text.contains("coffee"));
    }

    #[test]
    fn reindex_rebuilds_from_files_only() {
        let (dir, mgr) = manager();
        mgr.save_memory_dated("2026-01-01", "likes hiking").unwrap();
        // Fresh manager over the same root, with an empty index.
        let conn2 = Connection::open_in_memory().unwrap();
        let mgr2 = MemoryManager::new(dir.path(), conn2).unwrap();
        assert!(mgr2.search("hiking", 5).unwrap().is_empty());
        let n = mgr2.reindex().unwrap();
        assert_eq!(n, 1);
        assert!(!mgr2.search("hiking", 5).unwrap().is_empty());
    }

    #[test]
    fn forget_removes_from_file_and_index() {
        let (_dir, mgr) = manager();
        mgr.save_memory_dated("2026-01-01", "temporary fact").unwrap();
        mgr.forget_dated("2026-01-01", "temporary fact").unwrap();
        assert!(mgr.search("temporary", 5).unwrap().is_empty());
    }

    #[test]
    fn hash_embedder_is_deterministic() {
        let e = HashEmbedder::default();
        assert_eq!(e.embed("same text"), e.embed("same text"));
    }
}
