//! The shared answer symbol: a chosen letter or a blank row.

use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// One classified grid row. Serializes as the bare letter (`"A"`, `"Ç"`)
/// or the sentinel `"blank"`, matching the wire contract of the pipeline
/// result.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Mark {
    Letter(char),
    Blank,
}

impl Mark {
    #[inline]
    pub fn is_blank(&self) -> bool {
        matches!(self, Mark::Blank)
    }

    pub fn letter(&self) -> Option<char> {
        match self {
            Mark::Letter(c) => Some(*c),
            Mark::Blank => None,
        }
    }
}

impl fmt::Display for Mark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mark::Letter(c) => write!(f, "{c}"),
            Mark::Blank => f.write_str("blank"),
        }
    }
}

impl Serialize for Mark {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

struct MarkVisitor;

impl Visitor<'_> for MarkVisitor {
    type Value = Mark;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a single letter or \"blank\"")
    }

    fn visit_str<E: de::Error>(self, s: &str) -> Result<Mark, E> {
        if s == "blank" {
            return Ok(Mark::Blank);
        }
        let mut chars = s.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Ok(Mark::Letter(c)),
            _ => Err(E::invalid_value(de::Unexpected::Str(s), &self)),
        }
    }
}

impl<'de> Deserialize<'de> for Mark {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Mark, D::Error> {
        deserializer.deserialize_str(MarkVisitor)
    }
}
