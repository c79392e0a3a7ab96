//! Source-location metadata for documents.
//!
//! A [`Provenance`] mirrors the shape of an hmap: every path that exists in
//! the parsed document maps to the [`LineInformation`] of the node it was
//! parsed from. It is purely diagnostic; nothing in the resolution loop
//! depends on it.

use std::collections::HashMap;
use std::fmt;

use crate::domain::path::NodePath;

/// Line, character, and byte ranges of a node in its source text.
///
/// Lines and characters are 1-based; bytes are 0-based offsets. Every field
/// is independently optional because not every parser can report all of
/// them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct LineInformation {
    pub start_line: Option<usize>,
    pub stop_line: Option<usize>,
    pub start_char: Option<usize>,
    pub stop_char: Option<usize>,
    pub start_byte: Option<usize>,
    pub stop_byte: Option<usize>,
}

impl LineInformation {
    /// A point location with no extent.
    pub fn at(line: usize, character: usize, byte: usize) -> Self {
        Self {
            start_line: Some(line),
            stop_line: Some(line),
            start_char: Some(character),
            stop_char: Some(character),
            start_byte: Some(byte),
            stop_byte: Some(byte),
        }
    }

    /// Extend this location so it ends where `end` starts.
    pub fn until(mut self, end: &LineInformation) -> Self {
        self.stop_line = end.start_line;
        self.stop_char = end.start_char;
        self.stop_byte = end.start_byte;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.start_line.is_none() && self.start_char.is_none() && self.start_byte.is_none()
    }
}

fn write_range(
    f: &mut fmt::Formatter<'_>,
    label: &str,
    start: Option<usize>,
    stop: Option<usize>,
) -> fmt::Result {
    match (start, stop) {
        (Some(start), Some(stop)) => write!(f, "{label} {start}-{stop}"),
        (Some(start), None) => write!(f, "{label} {start}"),
        _ => Ok(()),
    }
}

impl fmt::Display for LineInformation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("<empty line info>");
        }
        f.write_str("at ")?;
        let ranges = [
            ("lines", self.start_line, self.stop_line),
            ("characters", self.start_char, self.stop_char),
            ("bytes", self.start_byte, self.stop_byte),
        ];
        let mut first = true;
        for (label, start, stop) in ranges {
            if start.is_none() {
                continue;
            }
            if !first {
                f.write_str(", ")?;
            }
            write_range(f, label, start, stop)?;
            first = false;
        }
        Ok(())
    }
}

/// An optional [`LineInformation`] as carried by errors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Location(pub Option<LineInformation>);

impl Location {
    pub fn none() -> Self {
        Self(None)
    }

    pub fn info(&self) -> Option<&LineInformation> {
        self.0.as_ref()
    }
}

impl From<Option<LineInformation>> for Location {
    fn from(info: Option<LineInformation>) -> Self {
        Self(info)
    }
}

impl From<LineInformation> for Location {
    fn from(info: LineInformation) -> Self {
        Self(Some(info))
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Some(info) => write!(f, "{info}"),
            None => f.write_str("<no location info>"),
        }
    }
}

/// Per-path source locations of one parsed document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Provenance {
    entries: HashMap<NodePath, LineInformation>,
}

impl Provenance {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, path: NodePath, info: LineInformation) {
        self.entries.insert(path, info);
    }

    pub fn get(&self, path: &NodePath) -> Option<&LineInformation> {
        self.entries.get(path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn citation_lists_every_known_range() {
        let info = LineInformation::at(3, 5, 40).until(&LineInformation::at(4, 1, 60));
        assert_eq!(
            Location::from(info).to_string(),
            "at lines 3-4, characters 5-1, bytes 40-60"
        );
    }

    #[test]
    fn partial_information_skips_missing_ranges() {
        let info = LineInformation {
            start_line: Some(7),
            ..Default::default()
        };
        assert_eq!(info.to_string(), "at lines 7");
    }

    #[test]
    fn missing_information_has_explicit_marker() {
        assert_eq!(Location::none().to_string(), "<no location info>");
        assert_eq!(LineInformation::default().to_string(), "<empty line info>");
    }

    #[test]
    fn provenance_lookup_by_path() {
        let mut provenance = Provenance::new();
        let path: NodePath = "a/[0]".parse().unwrap();
        provenance.record(path.clone(), LineInformation::at(2, 3, 10));
        assert_eq!(provenance.get(&path).and_then(|i| i.start_line), Some(2));
        assert!(provenance.get(&NodePath::from(["a"])).is_none());
    }
}
