//! Newline-delimited JSON event source.

use super::RawEvent;
use crate::error::{ChurnError, Result};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::info;

/// Read every non-blank line of `path` as a [`RawEvent`].
pub fn load_event_log(path: &Path) -> Result<Vec<RawEvent>> {
    if !path.exists() {
        return Err(ChurnError::DatasetNotFound(path.to_path_buf()));
    }
    let reader = BufReader::new(File::open(path)?);
    let mut rows = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let row = serde_json::from_str::<RawEvent>(&line)
            .map_err(|source| ChurnError::MalformedRecord { line: idx + 1, source })?;
        rows.push(row);
    }
    info!(path = %path.display(), rows = rows.len(), "event log loaded");
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn reads_lines_and_skips_blanks() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, r#"{{"ts": 1, "userId": "a", "page": "Home"}}"#).unwrap();
        writeln!(f).unwrap();
        writeln!(f, r#"{{"ts": 2, "userId": "b", "page": "NextSong", "length": 200.5}}"#).unwrap();
        let rows = load_event_log(f.path()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].page.as_deref(), Some("NextSong"));
    }

    #[test]
    fn reports_line_of_bad_record() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, r#"{{"ts": 1, "userId": "a"}}"#).unwrap();
        writeln!(f, "{{not json").unwrap();
        match load_event_log(f.path()) {
            Err(ChurnError::MalformedRecord { line, .. }) => assert_eq!(line, 2),
            other => panic!("unexpected {:?}", other.map(|r| r.len())),
        }
    }

    #[test]
    fn missing_file() {
        let r = load_event_log(Path::new("definitely/not/here.json"));
        assert!(matches!(r, Err(ChurnError::DatasetNotFound(_))));
    }
}
