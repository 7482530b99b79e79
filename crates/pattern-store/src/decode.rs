//! Typed decoding of the parsed value tree
//!
//! Every object is checked for missing, duplicate and unknown keys; values of
//! the wrong shape are reported with their field path and source fragment.
//! Nothing is defaulted: a structural deviation is always an error.

use crate::error::{fragment, line_col, ParseError};
use crate::syntax::{self, Member, Node, Value};
use pattern_model::{
    ChordSection, DrumSection, MelodySection, PatternDocument, TimeInterval, Waveform,
};
use std::str::FromStr;

/// Parse pattern file text into a document
///
/// Leading comments and surrounding whitespace are ignored. Field constraints
/// (ranges, note grammar) are not checked here; see `pattern_model::validate`.
///
/// # Errors
/// Returns `ParseError` on any grammar or shape deviation.
pub fn parse_document(src: &str) -> Result<PatternDocument, ParseError> {
    let root = syntax::parse(src)?;
    let cx = Decoder { src };
    cx.document(&root)
}

struct Decoder<'a> {
    src: &'a str,
}

/// Keys of one object, consumed as they are decoded
struct Fields<'n> {
    path: String,
    members: &'n [Member],
    taken: Vec<bool>,
}

impl Decoder<'_> {
    fn document(&self, root: &Node) -> Result<PatternDocument, ParseError> {
        let mut f = self.fields("", root)?;
        let bpm = self.integer(&f.path_of("bpm"), f.require("bpm")?)?;
        let chords = self.chords(f.require("chords")?)?;
        let melody = self.melody(f.require("melody")?)?;
        let drums = match f.optional("drums") {
            Some(node) => Some(self.drums(node)?),
            None => None,
        };
        self.finish(&f)?;

        Ok(PatternDocument {
            bpm,
            chords,
            melody,
            drums,
        })
    }

    fn chords(&self, node: &Node) -> Result<ChordSection, ParseError> {
        let mut f = self.fields("chords", node)?;

        let progression_path = f.path_of("progression");
        let progression = self
            .array(&progression_path, f.require("progression")?)?
            .iter()
            .enumerate()
            .map(|(i, chord)| {
                let path = format!("{progression_path}[{i}]");
                self.array(&path, chord)?
                    .iter()
                    .enumerate()
                    .map(|(j, note)| self.string(&format!("{path}[{j}]"), note))
                    .collect::<Result<Vec<_>, _>>()
            })
            .collect::<Result<Vec<_>, _>>()?;

        let interval = self.parsed::<TimeInterval>(&f.path_of("interval"), f.require("interval")?)?;
        let duration = self.parsed::<TimeInterval>(&f.path_of("duration"), f.require("duration")?)?;
        let filter = self.integer(&f.path_of("filter"), f.require("filter")?)?;
        self.finish(&f)?;

        Ok(ChordSection {
            progression,
            interval,
            duration,
            filter,
        })
    }

    fn melody(&self, node: &Node) -> Result<MelodySection, ParseError> {
        let mut f = self.fields("melody", node)?;

        let notes_path = f.path_of("notes");
        let notes = self
            .array(&notes_path, f.require("notes")?)?
            .iter()
            .enumerate()
            .map(|(i, n)| self.string(&format!("{notes_path}[{i}]"), n))
            .collect::<Result<Vec<_>, _>>()?;

        let interval = self.parsed::<TimeInterval>(&f.path_of("interval"), f.require("interval")?)?;
        let duration = self.parsed::<TimeInterval>(&f.path_of("duration"), f.require("duration")?)?;
        let waveform = self.parsed::<Waveform>(&f.path_of("waveform"), f.require("waveform")?)?;
        let delay = self.real(&f.path_of("delay"), f.require("delay")?)?;
        self.finish(&f)?;

        Ok(MelodySection {
            notes,
            interval,
            duration,
            waveform,
            delay,
        })
    }

    fn drums(&self, node: &Node) -> Result<DrumSection, ParseError> {
        let mut f = self.fields("drums", node)?;

        let kick = self.steps(&f.path_of("kick"), f.require("kick")?)?;
        let snare = self.steps(&f.path_of("snare"), f.require("snare")?)?;
        let hihat = match f.optional("hihat") {
            Some(n) => Some(self.steps(&f.path_of("hihat"), n)?),
            None => None,
        };
        let interval = self.parsed::<TimeInterval>(&f.path_of("interval"), f.require("interval")?)?;
        self.finish(&f)?;

        Ok(DrumSection {
            kick,
            snare,
            hihat,
            interval,
        })
    }

    fn fields<'n>(&self, path: &str, node: &'n Node) -> Result<Fields<'n>, ParseError> {
        let Value::Object(members) = &node.value else {
            let field = if path.is_empty() { "<root>" } else { path };
            return Err(self.invalid(field, node, "expected an object"));
        };

        for (i, member) in members.iter().enumerate() {
            if members[..i].iter().any(|m| m.key == member.key) {
                return Err(ParseError::DuplicateField {
                    field: join_path(path, &member.key),
                    line: line_col(self.src, member.key_span.start).0,
                });
            }
        }

        Ok(Fields {
            path: path.to_string(),
            members,
            taken: vec![false; members.len()],
        })
    }

    fn finish(&self, f: &Fields<'_>) -> Result<(), ParseError> {
        match f.members.iter().zip(&f.taken).find(|(_, taken)| !**taken) {
            Some((member, _)) => Err(ParseError::UnknownField {
                field: join_path(&f.path, &member.key),
                line: line_col(self.src, member.key_span.start).0,
            }),
            None => Ok(()),
        }
    }

    fn array<'n>(&self, field: &str, node: &'n Node) -> Result<&'n [Node], ParseError> {
        match &node.value {
            Value::Array(items) => Ok(items),
            other => Err(self.invalid(
                field,
                node,
                format!("expected an array, found {}", other.kind_name()),
            )),
        }
    }

    fn string(&self, field: &str, node: &Node) -> Result<String, ParseError> {
        match &node.value {
            Value::Str(s) => Ok(s.clone()),
            other => Err(self.invalid(
                field,
                node,
                format!("expected a string, found {}", other.kind_name()),
            )),
        }
    }

    fn parsed<T>(&self, field: &str, node: &Node) -> Result<T, ParseError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        let text = self.string(field, node)?;
        text.parse::<T>()
            .map_err(|e| self.invalid(field, node, e.to_string()))
    }

    fn number_text<'n>(&self, field: &str, node: &'n Node) -> Result<&'n str, ParseError> {
        match &node.value {
            Value::Number(n) => Ok(n),
            other => Err(self.invalid(
                field,
                node,
                format!("expected a number, found {}", other.kind_name()),
            )),
        }
    }

    fn integer(&self, field: &str, node: &Node) -> Result<i64, ParseError> {
        let text = self.number_text(field, node)?;
        text.parse::<i64>()
            .map_err(|_| self.invalid(field, node, "expected an integer"))
    }

    fn real(&self, field: &str, node: &Node) -> Result<f64, ParseError> {
        let text = self.number_text(field, node)?;
        match text.parse::<f64>() {
            Ok(v) if v.is_finite() => Ok(v),
            _ => Err(self.invalid(field, node, "expected a finite number")),
        }
    }

    fn steps(&self, field: &str, node: &Node) -> Result<Vec<u8>, ParseError> {
        self.array(field, node)?
            .iter()
            .enumerate()
            .map(|(i, step)| {
                let path = format!("{field}[{i}]");
                let value = self.integer(&path, step)?;
                u8::try_from(value).map_err(|_| self.invalid(&path, step, "expected a step value"))
            })
            .collect()
    }

    fn invalid(&self, field: &str, node: &Node, message: impl Into<String>) -> ParseError {
        ParseError::InvalidValue {
            field: field.to_string(),
            line: line_col(self.src, node.span.start).0,
            message: message.into(),
            fragment: fragment(self.src, node.span.start, node.span.end),
        }
    }
}

impl<'n> Fields<'n> {
    fn path_of(&self, key: &str) -> String {
        join_path(&self.path, key)
    }

    fn optional(&mut self, key: &str) -> Option<&'n Node> {
        let idx = self.members.iter().position(|m| m.key == key)?;
        self.taken[idx] = true;
        Some(&self.members[idx].value)
    }

    fn require(&mut self, key: &str) -> Result<&'n Node, ParseError> {
        self.optional(key).ok_or_else(|| ParseError::MissingField {
            field: self.path_of(key),
        })
    }
}

fn join_path(parent: &str, key: &str) -> String {
    if parent.is_empty() {
        key.to_string()
    } else {
        format!("{parent}.{key}")
    }
}
