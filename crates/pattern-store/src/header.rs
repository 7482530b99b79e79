//! Header metadata read back from a pattern file's leading comments

use crate::render::{TIMESTAMP_FORMAT, TIMESTAMP_PREFIX, TITLE_LINE};
use chrono::NaiveDateTime;
use serde::Serialize;

/// Leading `//` comment block of a pattern file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PatternHeader {
    /// Comment lines without the `//` marker
    pub comments: Vec<String>,
    /// Description of the last edit, if the header carries one
    pub description: Option<String>,
    /// Raw `TIMESTAMP:` value
    pub timestamp: Option<String>,
}

impl PatternHeader {
    /// Extract the header from file text
    ///
    /// Scanning stops at the first line that is neither blank nor a line
    /// comment. In the rendered layout the timestamp is always the third
    /// line. Hand-written files with a different layout still yield their
    /// comment lines and the first `TIMESTAMP:` comment, but no description.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let raw: Vec<&str> = text
            .trim_start_matches('\u{feff}')
            .lines()
            .map(str::trim)
            .take_while(|l| l.is_empty() || l.starts_with("//"))
            .filter(|l| l.starts_with("//"))
            .collect();

        let stamp_prefix = TIMESTAMP_PREFIX.trim_end();
        let stamp_value = |l: &str| l.strip_prefix(stamp_prefix).map(|t| t.trim().to_string());

        // Rendered files put the description between the title and timestamp
        let (description, timestamp) = match raw.as_slice() {
            [title, desc, stamp, ..] if *title == TITLE_LINE && stamp.starts_with(stamp_prefix) => {
                (Some(strip_marker(desc)), stamp_value(stamp))
            }
            [title, ..] if *title == TITLE_LINE => (None, None),
            _ => (None, raw.iter().find_map(|l| stamp_value(l))),
        };

        Self {
            comments: raw.iter().map(|l| strip_marker(l)).collect(),
            description,
            timestamp,
        }
    }

    /// Timestamp as a local date-time, when it follows the rendered format
    #[must_use]
    pub fn parsed_timestamp(&self) -> Option<NaiveDateTime> {
        let raw = self.timestamp.as_deref()?;
        NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT).ok()
    }
}

fn strip_marker(line: &str) -> String {
    line.trim_start_matches('/').trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn reads_rendered_header() {
        let text = "// Ambient pattern (Tone.js format)\n\
                    // Change 26: Wind down\n\
                    // TIMESTAMP: 2025-11-24 @ 05:56:30\n\
                    \n\
                    ({ bpm: 30 })\n";
        let header = PatternHeader::parse(text);
        assert_eq!(header.comments.len(), 3);
        assert_eq!(header.description.as_deref(), Some("Change 26: Wind down"));
        assert_eq!(header.timestamp.as_deref(), Some("2025-11-24 @ 05:56:30"));

        let ts = header.parsed_timestamp().unwrap();
        assert_eq!((ts.year(), ts.month(), ts.day()), (2025, 11, 24));
        assert_eq!((ts.hour(), ts.minute(), ts.second()), (5, 56, 30));
    }

    #[test]
    fn stops_at_first_code_line() {
        let text = "// one\n({\n// inside\n})";
        let header = PatternHeader::parse(text);
        assert_eq!(header.comments, vec!["one"]);
        assert!(header.description.is_none());
        assert!(header.timestamp.is_none());
    }

    #[test]
    fn foreign_layout_has_no_description() {
        let text = "// my own notes\n// TIMESTAMP: yesterday\n({})";
        let header = PatternHeader::parse(text);
        assert!(header.description.is_none());
        assert_eq!(header.timestamp.as_deref(), Some("yesterday"));
        assert!(header.parsed_timestamp().is_none());
    }

    #[test]
    fn description_that_looks_like_a_timestamp() {
        let text = "// Ambient pattern (Tone.js format)\n\
                    // TIMESTAMP: x\n\
                    // TIMESTAMP: 2025-11-24 @ 05:56:30\n\
                    \n\
                    ({ bpm: 30 })\n";
        let header = PatternHeader::parse(text);
        assert_eq!(header.description.as_deref(), Some("TIMESTAMP: x"));
        assert_eq!(header.timestamp.as_deref(), Some("2025-11-24 @ 05:56:30"));
        assert!(header.parsed_timestamp().is_some());
    }

    #[test]
    fn empty_text_has_empty_header() {
        assert_eq!(PatternHeader::parse(""), PatternHeader::default());
    }
}
