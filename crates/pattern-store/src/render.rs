//! Canonical text rendering
//!
//! Output always parses back (via `decode::parse_document`) to an equal
//! document. Layout is fixed: four-space indentation, one chord per line,
//! single-quoted strings.

use crate::error::RenderError;
use pattern_model::PatternDocument;
use std::fmt::Write as _;

/// First line of every rendered file
pub const TITLE_LINE: &str = "// Ambient pattern (Tone.js format)";

/// Prefix of the header line carrying the edit time
pub const TIMESTAMP_PREFIX: &str = "// TIMESTAMP: ";

/// `chrono` format of the header timestamp
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d @ %H:%M:%S";

/// Render a document with its header comment
///
/// `description` is flattened to a single line. The document is not
/// validated here; only values that have no literal form are rejected.
///
/// # Errors
/// Returns `RenderError::NonFinite` if the melody delay is NaN or infinite.
pub fn render(
    doc: &PatternDocument,
    description: &str,
    timestamp: &str,
) -> Result<String, RenderError> {
    let delay = doc.melody.delay;
    if !delay.is_finite() {
        return Err(RenderError::NonFinite {
            field: "melody.delay",
            value: delay,
        });
    }

    let mut out = String::with_capacity(1024);
    let mut line = |text: &str| {
        out.push_str(text);
        out.push('\n');
    };

    line(TITLE_LINE);
    line(&format!("// {}", single_line(description)));
    line(&format!("{TIMESTAMP_PREFIX}{}", single_line(timestamp)));
    line("");
    line("({");
    line(&format!("    bpm: {},", doc.bpm));
    line("");

    let chords = &doc.chords;
    line("    chords: {");
    line("        progression: [");
    for chord in &chords.progression {
        line(&format!("            {},", string_list(chord)));
    }
    line("        ],");
    line(&format!("        interval: '{}',", chords.interval));
    line(&format!("        duration: '{}',", chords.duration));
    line(&format!("        filter: {}", chords.filter));
    line("    },");
    line("");

    let melody = &doc.melody;
    line("    melody: {");
    line(&format!("        notes: {},", string_list(&melody.notes)));
    line(&format!("        interval: '{}',", melody.interval));
    line(&format!("        duration: '{}',", melody.duration));
    line(&format!("        waveform: '{}',", melody.waveform));
    // {:?} keeps a decimal point so the value reads back as a float
    line(&format!("        delay: {delay:?}"));

    match &doc.drums {
        None => line("    }"),
        Some(drums) => {
            line("    },");
            line("");
            line("    drums: {");
            line(&format!("        kick: {},", step_list(&drums.kick)));
            line(&format!("        snare: {},", step_list(&drums.snare)));
            if let Some(hihat) = &drums.hihat {
                line(&format!("        hihat: {},", step_list(hihat)));
            }
            line(&format!("        interval: '{}'", drums.interval));
            line("    }");
        }
    }
    line("})");

    Ok(out)
}

fn single_line(text: &str) -> String {
    text.replace(['\r', '\n'], " ")
}

fn string_list(items: &[String]) -> String {
    let mut out = String::from("[");
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        out.push('\'');
        for ch in item.chars() {
            match ch {
                '\'' => out.push_str("\\'"),
                '\\' => out.push_str("\\\\"),
                '\n' => out.push_str("\\n"),
                '\r' => out.push_str("\\r"),
                '\t' => out.push_str("\\t"),
                '\0' => out.push_str("\\0"),
                c => out.push(c),
            }
        }
        out.push('\'');
    }
    out.push(']');
    out
}

fn step_list(steps: &[u8]) -> String {
    let mut out = String::from("[");
    for (i, step) in steps.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        let _ = write!(out, "{step}");
    }
    out.push(']');
    out
}
