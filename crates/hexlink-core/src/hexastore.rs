//! # Hexastore Codec
//!
//! Every triple is stored under six keys, one per ordering of its fields:
//!
//! ```text
//! spo|S|P|O   sop|S|O|P   ops|O|P|S
//! osp|O|S|P   pso|P|S|O   pos|P|O|S
//! ```
//!
//! Link edges use the same orderings with a trailing `l` on the tag
//! (`spol`, `sopl`, ...) so they live in their own key namespace.
//!
//! Fields are escaped before joining: `\` becomes `\\` and `|` becomes `\|`.
//! Escaping is applied per character, so `escape(a)` is a prefix of
//! `escape(b)` whenever `a` is a prefix of `b`, and prefix scans over
//! escaped terms behave exactly like prefix scans over raw values.

use crate::primitives::{KEY_DELIMITER, KEY_ESCAPE, LINK_MARKER};
use crate::{HexlinkError, Triple};
use std::borrow::Cow;

// =============================================================================
// ORDERINGS
// =============================================================================

/// Key namespace of a triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    /// Facts flattened from ingested objects, plus anchors.
    Primary,
    /// Derived `references` edges.
    Link,
}

/// One of the six field orderings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permutation {
    Spo,
    Sop,
    Ops,
    Osp,
    Pso,
    Pos,
}

impl Permutation {
    /// All six orderings, in key-generation order.
    pub const ALL: [Self; 6] = [
        Self::Spo,
        Self::Sop,
        Self::Ops,
        Self::Osp,
        Self::Pso,
        Self::Pos,
    ];

    /// The three-letter tag of this ordering.
    #[must_use]
    pub const fn letters(self) -> &'static str {
        match self {
            Self::Spo => "spo",
            Self::Sop => "sop",
            Self::Ops => "ops",
            Self::Osp => "osp",
            Self::Pso => "pso",
            Self::Pos => "pos",
        }
    }

    /// The key tag of this ordering in a namespace.
    #[must_use]
    pub const fn tag(self, namespace: Namespace) -> &'static str {
        match (namespace, self) {
            (Namespace::Primary, p) => p.letters(),
            (Namespace::Link, Self::Spo) => "spol",
            (Namespace::Link, Self::Sop) => "sopl",
            (Namespace::Link, Self::Ops) => "opsl",
            (Namespace::Link, Self::Osp) => "ospl",
            (Namespace::Link, Self::Pso) => "psol",
            (Namespace::Link, Self::Pos) => "posl",
        }
    }

    fn from_letters(letters: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.letters() == letters)
    }

    /// Fields of `triple` in this ordering.
    fn arrange(self, triple: &Triple) -> [&str; 3] {
        let (s, p, o) = (
            triple.subject.as_str(),
            triple.predicate.as_str(),
            triple.object.as_str(),
        );
        match self {
            Self::Spo => [s, p, o],
            Self::Sop => [s, o, p],
            Self::Ops => [o, p, s],
            Self::Osp => [o, s, p],
            Self::Pso => [p, s, o],
            Self::Pos => [p, o, s],
        }
    }

    /// Rebuild a triple from fields in this ordering.
    fn restore(self, [a, b, c]: [String; 3]) -> Triple {
        match self {
            Self::Spo => Triple::new(a, b, c),
            Self::Sop => Triple::new(a, c, b),
            Self::Ops => Triple::new(c, b, a),
            Self::Osp => Triple::new(b, c, a),
            Self::Pso => Triple::new(b, a, c),
            Self::Pos => Triple::new(c, a, b),
        }
    }
}

// =============================================================================
// ESCAPING
// =============================================================================

/// Escape a field for embedding in a key.
#[must_use]
pub fn escape(field: &str) -> Cow<'_, str> {
    if !field.contains([KEY_DELIMITER, KEY_ESCAPE]) {
        return Cow::Borrowed(field);
    }
    let mut out = String::with_capacity(field.len() + 4);
    for ch in field.chars() {
        if ch == KEY_DELIMITER || ch == KEY_ESCAPE {
            out.push(KEY_ESCAPE);
        }
        out.push(ch);
    }
    Cow::Owned(out)
}

/// Split a key on unescaped delimiters, unescaping each part.
fn split_key(key: &str) -> Result<Vec<String>, HexlinkError> {
    let mut parts = Vec::with_capacity(4);
    let mut current = String::new();
    let mut chars = key.chars();
    while let Some(ch) = chars.next() {
        if ch == KEY_ESCAPE {
            match chars.next() {
                Some(next) => current.push(next),
                None => return Err(HexlinkError::CorruptKey(key.to_string())),
            }
        } else if ch == KEY_DELIMITER {
            parts.push(std::mem::take(&mut current));
        } else {
            current.push(ch);
        }
    }
    parts.push(current);
    Ok(parts)
}

// =============================================================================
// ENCODE / DECODE
// =============================================================================

/// Encode a triple into its six keys.
#[must_use]
pub fn encode(triple: &Triple, namespace: Namespace) -> [String; 6] {
    Permutation::ALL.map(|perm| {
        let [a, b, c] = perm.arrange(triple);
        format!(
            "{tag}{d}{}{d}{}{d}{}",
            escape(a),
            escape(b),
            escape(c),
            tag = perm.tag(namespace),
            d = KEY_DELIMITER
        )
    })
}

/// Decode a key back into its namespace and triple.
///
/// Keys with an unknown order tag, a wrong field count or a dangling escape
/// are rejected with [`HexlinkError::CorruptKey`].
pub fn decode(key: &str) -> Result<(Namespace, Triple), HexlinkError> {
    let corrupt = || HexlinkError::CorruptKey(key.to_string());

    let mut parts = split_key(key)?;
    if parts.len() != 4 {
        return Err(corrupt());
    }
    let fields: [String; 3] = [
        std::mem::take(&mut parts[1]),
        std::mem::take(&mut parts[2]),
        std::mem::take(&mut parts[3]),
    ];

    let tag = parts[0].as_str();
    let (letters, namespace) = match tag.strip_suffix(LINK_MARKER) {
        Some(letters) if tag.len() == 4 => (letters, Namespace::Link),
        _ => (tag, Namespace::Primary),
    };
    let perm = Permutation::from_letters(letters).ok_or_else(corrupt)?;

    Ok((namespace, perm.restore(fields)))
}

/// Decode a key, requiring it to belong to `namespace`.
pub fn decode_in(key: &str, namespace: Namespace) -> Result<Triple, HexlinkError> {
    match decode(key)? {
        (ns, triple) if ns == namespace => Ok(triple),
        _ => Err(HexlinkError::CorruptKey(key.to_string())),
    }
}

// =============================================================================
// PREFIXES
// =============================================================================

/// Prefix covering every key whose leading fields equal `fields`.
///
/// Each field is closed by a delimiter, so `prefix(Spo, Primary, &["a"])`
/// matches subject `a` but not subject `ab`.
#[must_use]
pub fn prefix(perm: Permutation, namespace: Namespace, fields: &[&str]) -> String {
    let mut out = String::from(perm.tag(namespace));
    out.push(KEY_DELIMITER);
    for field in fields {
        out.push_str(&escape(field));
        out.push(KEY_DELIMITER);
    }
    out
}

/// Prefix covering every key whose leading fields equal `fields` and whose
/// next field starts with `partial`.
#[must_use]
pub fn open_prefix(perm: Permutation, namespace: Namespace, fields: &[&str], partial: &str) -> String {
    let mut out = prefix(perm, namespace, fields);
    out.push_str(&escape(partial));
    out
}

/// The single key of `triple` under `perm`.
#[must_use]
pub fn key(perm: Permutation, namespace: Namespace, triple: &Triple) -> String {
    let [a, b, c] = perm.arrange(triple);
    let mut out = prefix(perm, namespace, &[a, b]);
    out.push_str(&escape(c));
    out
}

// =============================================================================
// TESTS
// =============================================================================
