//! Atomic persistence helpers shared by every subsystem that writes JSON or
//! JSONL state under the workspace root (§6 persisted state layout).

use std::io::Write;
use std::path::Path;

use crate::error::{BasaltError, Result};

/// Serialise `value` as pretty JSON and write it via write-to-temp + rename,
/// so a crash mid-write never leaves a truncated file in place.
pub fn write_json_atomic<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp_path = path.with_extension(format!(
        "{}.tmp",
        path.extension().and_then(|e| e.to_str()).unwrap_or("json")
    ));
    let body = serde_json::to_vec_pretty(value)?;
    {
        let mut f = std::fs::File::create(&tmp_path)?;
        f.write_all(&body)?;
        f.sync_all()?;
    }
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Read and deserialise a JSON file, returning `default` if it does not exist.
pub fn read_json_or_default<T: serde::de::DeserializeOwned + Default>(path: &Path) -> Result<T> {
    match std::fs::read(path) {
        Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(T::default()),
        Err(e) => Err(BasaltError::Io(e)),
    }
}

/// Append one JSON-serialised line to `path`, fsyncing after the write.
///
/// Used for the per-chat conversation log, which is append-only by design —
/// never rewritten wholesale, so no temp-file dance is needed here.
pub fn append_jsonl<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut line = serde_json::to_vec(value)?;
    line.push(b'\n');
    let mut f = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
    f.write_all(&line)?;
    f.sync_all()?;
    Ok(())
}

/// Read the last `limit` JSON objects from a JSONL file, oldest first.
///
/// Malformed lines are skipped rather than aborting the whole read — a
/// partially-written final line (from a crash mid-append) should not make
/// the rest of the log unreadable.
pub fn tail_jsonl<T: serde::de::DeserializeOwned>(path: &Path, limit: usize) -> Result<Vec<T>> {
    let text = match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(BasaltError::Io(e)),
    };
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(limit);
    Ok(lines[start..]
        .iter()
        .filter_map(|l| serde_json::from_str(l).ok())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use tempfile::tempdir;

    #[derive(Debug, Serialize, Deserialize, PartialEq, Default)]
    struct Rec {
        n: u32,
    }

    #[test]
    fn json_roundtrip_is_atomic() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("x.json");
        write_json_atomic(&path, &Rec { n: 7 }).unwrap();
        let back: Rec = read_json_or_default(&path).unwrap();
        assert_eq!(back, Rec { n: 7 });
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn read_json_or_default_missing_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing.json");
        let back: Rec = read_json_or_default(&path).unwrap();
        assert_eq!(back, Rec::default());
    }

    #[test]
    fn jsonl_append_and_tail() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("log.jsonl");
        for n in 0..5 {
            append_jsonl(&path, &Rec { n }).unwrap();
        }
        let tail: Vec<Rec> = tail_jsonl(&path, 2).unwrap();
        assert_eq!(tail, vec![Rec { n: 3 }, Rec { n: 4 }]);
    }

    #[test]
    fn tail_jsonl_skips_malformed_lines() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("log.jsonl");
        std::fs::write(&path, "{\"n\":1}\nnot json\n{\"n\":2}\n").unwrap();
        let tail: Vec<Rec> = tail_jsonl(&path, 10).unwrap();
        assert_eq!(tail, vec![Rec { n: 1 }, Rec { n: 2 }]);
    }
}
