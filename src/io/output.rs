//! Writing assignments to CSV.
//!
//! Each assignment is three rows:
//!
//! ```text
//! Timestamp,10/18/2026 14:03:55
//! pre,q1,q4,q9
//! post,q2,q3,q7
//! ```

use std::fs::OpenOptions;
use std::path::Path;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;
use crate::item::PairExport;

const TIMESTAMP_FORMAT: &str = "%m/%d/%Y %H:%M:%S";

/// How [`write_assignment`] opens an existing output file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum WriteMode {
    /// Replace the file contents.
    #[default]
    #[serde(rename = "w")]
    Truncate,
    /// Add rows after the existing contents.
    #[serde(rename = "a")]
    Append,
}

impl WriteMode {
    /// Past participle used in the CLI report ("written" / "appended").
    pub fn verb(self) -> &'static str {
        match self {
            WriteMode::Truncate => "written",
            WriteMode::Append => "appended",
        }
    }
}

pub fn format_timestamp(at: &NaiveDateTime) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

/// Writes `pair` to `path`, stamped with `at`.
pub fn write_assignment(
    path: impl AsRef<Path>,
    pair: &PairExport,
    mode: WriteMode,
    at: &NaiveDateTime,
) -> Result<()> {
    let path = path.as_ref();
    let file = match mode {
        WriteMode::Truncate => OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?,
        WriteMode::Append => OpenOptions::new().append(true).create(true).open(path)?,
    };

    let mut writer = csv::WriterBuilder::new().flexible(true).from_writer(file);
    writer.write_record(["Timestamp".to_string(), format_timestamp(at)])?;
    writer.write_record(std::iter::once("pre").chain(pair.pre.iter().map(String::as_str)))?;
    writer.write_record(std::iter::once("post").chain(pair.post.iter().map(String::as_str)))?;
    writer.flush()?;

    debug!(path = %path.display(), ?mode, "assignment written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, 7)
            .and_then(|d| d.and_hms_opt(9, 5, 30))
            .unwrap()
    }

    fn pair() -> PairExport {
        PairExport {
            pre: vec!["q1".into(), "q4".into()],
            post: vec!["q2".into(), "q3".into()],
        }
    }

    #[test]
    fn test_timestamp_format() {
        assert_eq!(format_timestamp(&at()), "03/07/2026 09:05:30");
    }

    #[test]
    fn test_write_truncates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        std::fs::write(&path, "old contents\n").unwrap();

        write_assignment(&path, &pair(), WriteMode::Truncate, &at()).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "Timestamp,03/07/2026 09:05:30\npre,q1,q4\npost,q2,q3\n");
    }

    #[test]
    fn test_write_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");

        write_assignment(&path, &pair(), WriteMode::Append, &at()).unwrap();
        write_assignment(&path, &pair(), WriteMode::Append, &at()).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 6);
        assert_eq!(text.lines().nth(4), Some("pre,q1,q4"));
    }

    #[test]
    fn test_write_mode_serde() {
        assert_eq!(serde_json::to_string(&WriteMode::Append).unwrap(), "\"a\"");
        let mode: WriteMode = serde_json::from_str("\"w\"").unwrap();
        assert_eq!(mode, WriteMode::Truncate);
        assert_eq!(WriteMode::default().verb(), "written");
    }
}
