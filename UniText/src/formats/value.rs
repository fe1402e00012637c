//! Decoded object payloads
//!
//! Every object decoded through a type tree becomes a [`FieldValue`] tree.
//! Records re-find their field through a [`FieldPath`] such as
//! `dialogue.lines[2].text`.

use std::fmt;

use indexmap::IndexMap;

use crate::error::{Error, Result};

/// A decoded field value
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// A `string` node whose bytes are valid UTF-8
    String(String),
    /// A byte string: non-UTF-8 `string` node, `UInt8` vector or `TypelessData`
    Bytes(Vec<u8>),
    /// Any integer node (unsigned 64-bit values keep their bit pattern)
    Int(i64),
    /// `float` or `double`
    Float(f64),
    /// `bool`
    Bool(bool),
    /// Array contents
    List(Vec<FieldValue>),
    /// A record, in serialized field order
    Map(IndexMap<String, FieldValue>),
}

impl FieldValue {
    /// Short name of the variant, used in type errors and diagnostics
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            FieldValue::String(_) => "string",
            FieldValue::Bytes(_) => "bytes",
            FieldValue::Int(_) => "int",
            FieldValue::Float(_) => "float",
            FieldValue::Bool(_) => "bool",
            FieldValue::List(_) => "list",
            FieldValue::Map(_) => "map",
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::String(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_map(&self) -> Option<&IndexMap<String, FieldValue>> {
        match self {
            FieldValue::Map(m) => Some(m),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            FieldValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Look up a direct child of a map
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.as_map().and_then(|m| m.get(key))
    }

    /// Text view of string-like values
    ///
    /// Byte strings are decoded lossily; other variants have no text view.
    #[must_use]
    pub fn text_lossy(&self) -> Option<String> {
        match self {
            FieldValue::String(s) => Some(s.clone()),
            FieldValue::Bytes(b) => Some(String::from_utf8_lossy(b).into_owned()),
            _ => None,
        }
    }

    /// Build a value of the same variant as `self` from a translated string
    ///
    /// This is the write-side of type preservation: a byte string stays a
    /// byte string (UTF-8 encoded), numbers are parsed, booleans accept
    /// `true/false/1/0`. Containers cannot be overwritten with text.
    ///
    /// # Errors
    /// Returns [`Error::TypeMismatch`] when the text cannot represent the
    /// original kind.
    pub fn coerce_text(&self, text: &str) -> Result<FieldValue> {
        let mismatch = || Error::TypeMismatch {
            expected: self.kind().to_string(),
            found: format!("text {text:?}"),
        };
        match self {
            FieldValue::String(_) => Ok(FieldValue::String(text.to_string())),
            FieldValue::Bytes(_) => Ok(FieldValue::Bytes(text.as_bytes().to_vec())),
            FieldValue::Int(_) => text.trim().parse::<i64>().map(FieldValue::Int).map_err(|_| mismatch()),
            FieldValue::Float(_) => text.trim().parse::<f64>().map(FieldValue::Float).map_err(|_| mismatch()),
            FieldValue::Bool(_) => match text.trim().to_ascii_lowercase().as_str() {
                "true" | "1" => Ok(FieldValue::Bool(true)),
                "false" | "0" => Ok(FieldValue::Bool(false)),
                _ => Err(mismatch()),
            },
            FieldValue::List(_) | FieldValue::Map(_) => Err(mismatch()),
        }
    }

    /// Resolve a path to a shared reference
    ///
    /// # Errors
    /// Returns [`Error::FieldNavigation`] if any segment does not resolve.
    pub fn resolve(&self, path: &FieldPath) -> Result<&FieldValue> {
        let mut current = self;
        for (i, segment) in path.segments.iter().enumerate() {
            current = step(current, segment).ok_or_else(|| path.navigation_error(i, current))?;
        }
        Ok(current)
    }

    /// Resolve a path to a mutable reference
    ///
    /// # Errors
    /// Returns [`Error::FieldNavigation`] if any segment does not resolve.
    pub fn resolve_mut(&mut self, path: &FieldPath) -> Result<&mut FieldValue> {
        let mut current = self;
        for (i, segment) in path.segments.iter().enumerate() {
            if step(current, segment).is_none() {
                return Err(path.navigation_error(i, current));
            }
            current = step_mut(current, segment).ok_or_else(|| Error::FieldNavigation {
                path: path.to_string(),
                reason: "segment vanished".to_string(),
            })?;
        }
        Ok(current)
    }

    /// Overwrite the leaf at `path` with `text`, coerced to the leaf's kind
    ///
    /// Returns the previous value.
    ///
    /// # Errors
    /// Returns [`Error::FieldNavigation`] or [`Error::TypeMismatch`].
    pub fn set_text(&mut self, path: &FieldPath, text: &str) -> Result<FieldValue> {
        let leaf = self.resolve_mut(path)?;
        let replacement = leaf.coerce_text(text)?;
        Ok(std::mem::replace(leaf, replacement))
    }
}

fn step<'a>(value: &'a FieldValue, segment: &Segment) -> Option<&'a FieldValue> {
    match (value, segment) {
        (FieldValue::Map(m), Segment::Key(k)) => m.get(k),
        (FieldValue::List(l), Segment::Index(i)) => l.get(*i),
        _ => None,
    }
}

fn step_mut<'a>(value: &'a mut FieldValue, segment: &Segment) -> Option<&'a mut FieldValue> {
    match (value, segment) {
        (FieldValue::Map(m), Segment::Key(k)) => m.get_mut(k),
        (FieldValue::List(l), Segment::Index(i)) => l.get_mut(*i),
        _ => None,
    }
}

/// One step of a [`FieldPath`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Key(String),
    Index(usize),
}

/// A dotted/indexed access path into a [`FieldValue`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldPath {
    pub segments: Vec<Segment>,
}

impl FieldPath {
    #[must_use]
    pub fn root() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    #[must_use]
    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    /// Extend with a map key
    #[must_use]
    pub fn key(&self, key: &str) -> Self {
        let mut next = self.clone();
        next.segments.push(Segment::Key(key.to_string()));
        next
    }

    /// Extend with a list index
    #[must_use]
    pub fn index(&self, index: usize) -> Self {
        let mut next = self.clone();
        next.segments.push(Segment::Index(index));
        next
    }

    /// Parse `a.b[2].c`, `lines[0][1]` or `[3].text`
    ///
    /// # Errors
    /// Returns [`Error::InvalidFieldPath`] on unbalanced brackets, empty keys
    /// or non-numeric indices.
    pub fn parse(input: &str) -> Result<Self> {
        let invalid = || Error::InvalidFieldPath(input.to_string());
        let mut segments = Vec::new();
        if input.is_empty() {
            return Ok(Self { segments });
        }

        for part in input.split('.') {
            let (key, mut rest) = match part.find('[') {
                Some(pos) => (&part[..pos], &part[pos..]),
                None => (part, ""),
            };
            if key.is_empty() && rest.is_empty() {
                return Err(invalid());
            }
            if !key.is_empty() {
                segments.push(Segment::Key(key.to_string()));
            }
            while !rest.is_empty() {
                let close = rest.find(']').ok_or_else(invalid)?;
                if !rest.starts_with('[') {
                    return Err(invalid());
                }
                let index = rest[1..close].parse::<usize>().map_err(|_| invalid())?;
                segments.push(Segment::Index(index));
                rest = &rest[close + 1..];
            }
        }
        Ok(Self { segments })
    }

    fn navigation_error(&self, at: usize, found: &FieldValue) -> Error {
        let reason = match &self.segments[at] {
            Segment::Key(k) => match found {
                FieldValue::Map(_) => format!("missing key '{k}'"),
                other => format!("expected map for key '{k}', found {}", other.kind()),
            },
            Segment::Index(i) => match found {
                FieldValue::List(l) => format!("index {i} out of bounds (len {})", l.len()),
                other => format!("expected list for index {i}, found {}", other.kind()),
            },
        };
        Error::FieldNavigation {
            path: self.to_string(),
            reason,
        }
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::Key(k) if i == 0 => write!(f, "{k}")?,
                Segment::Key(k) => write!(f, ".{k}")?,
                Segment::Index(idx) => write!(f, "[{idx}]")?,
            }
        }
        Ok(())
    }
}

impl std::str::FromStr for FieldPath {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dialogue() -> FieldValue {
        let line = |text: &str| {
            let mut m = IndexMap::new();
            m.insert("speaker".to_string(), FieldValue::Int(1));
            m.insert("text".to_string(), FieldValue::String(text.to_string()));
            FieldValue::Map(m)
        };
        let mut inner = IndexMap::new();
        inner.insert(
            "lines".to_string(),
            FieldValue::List(vec![line("a"), line("b"), line("c")]),
        );
        let mut root = IndexMap::new();
        root.insert("dialogue".to_string(), FieldValue::Map(inner));
        root.insert("m_Enabled".to_string(), FieldValue::Bool(true));
        FieldValue::Map(root)
    }

    #[test]
    fn test_parse_and_display() {
        let path = FieldPath::parse("dialogue.lines[2].text").unwrap();
        assert_eq!(
            path.segments,
            vec![
                Segment::Key("dialogue".into()),
                Segment::Key("lines".into()),
                Segment::Index(2),
                Segment::Key("text".into()),
            ]
        );
        assert_eq!(path.to_string(), "dialogue.lines[2].text");

        let nested = FieldPath::parse("grid[1][0]").unwrap();
        assert_eq!(nested.to_string(), "grid[1][0]");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(FieldPath::parse("a..b").is_err());
        assert!(FieldPath::parse("a[x]").is_err());
        assert!(FieldPath::parse("a[1").is_err());
    }

    #[test]
    fn test_set_text_only_touches_leaf() {
        let mut value = dialogue();
        let before = value.clone();
        let path = FieldPath::parse("dialogue.lines[2].text").unwrap();
        let old = value.set_text(&path, "translated").unwrap();
        assert_eq!(old, FieldValue::String("c".into()));

        let lines = FieldPath::parse("dialogue.lines").unwrap();
        let (FieldValue::List(after), FieldValue::List(orig)) =
            (value.resolve(&lines).unwrap(), before.resolve(&lines).unwrap())
        else {
            panic!("lines must stay a list");
        };
        assert_eq!(after[0], orig[0]);
        assert_eq!(after[1], orig[1]);
        assert_eq!(after[2].get("speaker"), orig[2].get("speaker"));
        assert_eq!(after[2].get("text"), Some(&FieldValue::String("translated".into())));
    }

    #[test]
    fn test_navigation_errors() {
        let value = dialogue();
        let err = value.resolve(&FieldPath::parse("dialogue.lines[9].text").unwrap()).unwrap_err();
        assert!(matches!(err, Error::FieldNavigation { .. }));
        let err = value.resolve(&FieldPath::parse("m_Enabled.x").unwrap()).unwrap_err();
        assert!(err.to_string().contains("expected map"));
    }

    #[test]
    fn test_coercion_preserves_kind() {
        assert_eq!(
            FieldValue::Bytes(vec![1]).coerce_text("é").unwrap(),
            FieldValue::Bytes("é".as_bytes().to_vec())
        );
        assert_eq!(FieldValue::Int(0).coerce_text(" 42 ").unwrap(), FieldValue::Int(42));
        assert_eq!(FieldValue::Bool(false).coerce_text("TRUE").unwrap(), FieldValue::Bool(true));
        assert!(FieldValue::Int(0).coerce_text("forty").is_err());
        assert!(FieldValue::List(vec![]).coerce_text("x").is_err());
    }
}
