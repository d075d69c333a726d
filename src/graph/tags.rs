//! Tags and unique-index declarations carried by nodes and edges
//!
//! Call sites describe tags with a compact text form, parsed here into typed
//! directives before anything touches a collection:
//!
//! - tags: `name=marko,age=29,knows` sets values (`knows` is a boolean
//!   marker); `-lang` removes tag `lang`
//! - indexes: `name,lang` declares unique indexes; `-name` retracts the
//!   declaration while leaving the tag itself in place
//!
//! Whitespace around tokens is ignored and names compare case-insensitively.

use super::error::{GraphError, GraphResult};
use super::types::{Key, KeyRef};
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One parsed tag token
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagDirective {
    Set { name: Key, value: Option<String> },
    Remove(Key),
}

/// One parsed index token
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexDirective {
    Add(Key),
    Remove(Key),
}

fn tokens(input: &str) -> impl Iterator<Item = &str> {
    input.split(',').map(str::trim).filter(|t| !t.is_empty())
}

fn parse_name(token: &str, raw: &str) -> GraphResult<Key> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(GraphError::invalid_directive(token, "missing name"));
    }
    if name.starts_with('-') {
        return Err(GraphError::invalid_directive(token, "name cannot start with '-'"));
    }
    if name.chars().any(|c| c.is_whitespace() || c == '=') {
        return Err(GraphError::invalid_directive(token, "name contains an invalid character"));
    }
    Ok(Key::new(name))
}

/// Parse a tag string such as `name=marko,knows,-lang`
pub fn parse_tags(input: &str) -> GraphResult<Vec<TagDirective>> {
    tokens(input)
        .map(|token| {
            if let Some(rest) = token.strip_prefix('-') {
                if rest.contains('=') {
                    return Err(GraphError::invalid_directive(
                        token,
                        "removal directive cannot carry a value",
                    ));
                }
                return Ok(TagDirective::Remove(parse_name(token, rest)?));
            }

            match token.split_once('=') {
                Some((name, value)) => {
                    let value = value.trim();
                    if value.is_empty() {
                        return Err(GraphError::invalid_directive(token, "missing value"));
                    }
                    Ok(TagDirective::Set {
                        name: parse_name(token, name)?,
                        value: Some(value.to_string()),
                    })
                }
                None => Ok(TagDirective::Set {
                    name: parse_name(token, token)?,
                    value: None,
                }),
            }
        })
        .collect()
}

/// Parse an index string such as `name,lang,-age`
pub fn parse_indexes(input: &str) -> GraphResult<Vec<IndexDirective>> {
    tokens(input)
        .map(|token| match token.strip_prefix('-') {
            Some(rest) => Ok(IndexDirective::Remove(parse_name(token, rest)?)),
            None => Ok(IndexDirective::Add(parse_name(token, token)?)),
        })
        .collect()
}

/// Ordered, case-insensitive tag set
///
/// A tag with `None` as value is a boolean marker. Removal directives are
/// tracked separately and only survive until the owning value is merged
/// onto a stored one; stored values never carry removals.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tags {
    values: IndexMap<Key, Option<String>>,
    #[serde(skip)]
    removed: IndexSet<Key>,
}

impl Tags {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parse(input: &str) -> GraphResult<Self> {
        let mut tags = Tags::new();
        tags.apply(parse_tags(input)?);
        Ok(tags)
    }

    pub fn apply(&mut self, directives: impl IntoIterator<Item = TagDirective>) {
        for directive in directives {
            match directive {
                TagDirective::Set { name, value } => self.insert(name, value),
                TagDirective::Remove(name) => self.remove(name),
            }
        }
    }

    /// Set (or overwrite) a tag
    pub fn insert(&mut self, name: impl Into<Key>, value: Option<String>) {
        let name = name.into();
        self.removed.shift_remove(&name);
        self.values.insert(name, value);
    }

    /// Drop a tag and remember the removal for a later merge
    pub fn remove(&mut self, name: impl Into<Key>) {
        let name = name.into();
        self.values.shift_remove(&name);
        self.removed.insert(name);
    }

    pub fn has(&self, name: &str) -> bool {
        self.values.contains_key(&KeyRef(name))
    }

    /// Value of a tag; `None` when absent or a boolean marker
    pub fn value(&self, name: &str) -> Option<&str> {
        self.values.get(&KeyRef(name)).and_then(|v| v.as_deref())
    }

    /// Whether the tag is present with the given value (case-insensitive)
    pub fn has_value(&self, name: &str, value: &str) -> bool {
        self.value(name).map_or(false, |v| v.eq_ignore_ascii_case(value))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Key, Option<&str>)> {
        self.values.iter().map(|(k, v)| (k, v.as_deref()))
    }

    pub fn names(&self) -> impl Iterator<Item = &Key> {
        self.values.keys()
    }

    pub fn removals(&self) -> impl Iterator<Item = &Key> {
        self.removed.iter()
    }

    pub fn has_removals(&self) -> bool {
        !self.removed.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// No tag values; pending removals are not counted
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Apply `delta` onto these tags, producing the effective set
    pub fn merge(&self, delta: &Tags) -> Tags {
        let mut values = self.values.clone();
        for name in &delta.removed {
            values.shift_remove(name);
        }
        for (name, value) in &delta.values {
            values.insert(name.clone(), value.clone());
        }
        Tags {
            values,
            removed: IndexSet::new(),
        }
    }

    /// Drop pending removals (they are no-ops without a prior value)
    pub fn into_effective(mut self) -> Tags {
        self.removed.clear();
        self
    }
}

impl fmt::Display for Tags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (name, value) in &self.values {
            if !first {
                f.write_str(",")?;
            }
            first = false;
            match value {
                Some(v) => write!(f, "{}={}", name, v)?,
                None => write!(f, "{}", name)?,
            }
        }
        for name in &self.removed {
            if !first {
                f.write_str(",")?;
            }
            first = false;
            write!(f, "-{}", name)?;
        }
        Ok(())
    }
}

/// Tag names a node maintains as unique value indexes
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IndexNames {
    names: IndexSet<Key>,
    #[serde(skip)]
    removed: IndexSet<Key>,
}

impl IndexNames {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parse(input: &str) -> GraphResult<Self> {
        let mut indexes = IndexNames::new();
        indexes.apply(parse_indexes(input)?);
        Ok(indexes)
    }

    pub fn apply(&mut self, directives: impl IntoIterator<Item = IndexDirective>) {
        for directive in directives {
            match directive {
                IndexDirective::Add(name) => {
                    self.removed.shift_remove(&name);
                    self.names.insert(name);
                }
                IndexDirective::Remove(name) => {
                    self.names.shift_remove(&name);
                    self.removed.insert(name);
                }
            }
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(&KeyRef(name))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Key> {
        self.names.iter()
    }

    pub fn has_removals(&self) -> bool {
        !self.removed.is_empty()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn merge(&self, delta: &IndexNames) -> IndexNames {
        let mut names = self.names.clone();
        for name in &delta.removed {
            names.shift_remove(name);
        }
        for name in &delta.names {
            names.insert(name.clone());
        }
        IndexNames {
            names,
            removed: IndexSet::new(),
        }
    }

    pub fn into_effective(mut self) -> IndexNames {
        self.removed.clear();
        self
    }
}

impl fmt::Display for IndexNames {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self
            .names
            .iter()
            .map(|n| n.to_string())
            .chain(self.removed.iter().map(|n| format!("-{}", n)))
            .collect();
        f.write_str(&rendered.join(","))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tags() {
        let directives = parse_tags(" name=marko , age=29,knows,-lang ").unwrap();
        assert_eq!(
            directives,
            vec![
                TagDirective::Set { name: Key::new("name"), value: Some("marko".to_string()) },
                TagDirective::Set { name: Key::new("age"), value: Some("29".to_string()) },
                TagDirective::Set { name: Key::new("knows"), value: None },
                TagDirective::Remove(Key::new("lang")),
            ]
        );
        assert!(parse_tags("").unwrap().is_empty());
        assert!(parse_tags(" , ,").unwrap().is_empty());
    }

    #[test]
    fn test_parse_tags_rejects_malformed() {
        for bad in ["=value", "name=", "-lang=java", "-", "bad name=1", "--x"] {
            let err = parse_tags(bad).unwrap_err();
            assert_eq!(err.kind(), crate::ErrorKind::BadRequest, "input {:?}", bad);
        }
    }

    #[test]
    fn test_parse_indexes() {
        let directives = parse_indexes("name, -lang").unwrap();
        assert_eq!(
            directives,
            vec![IndexDirective::Add(Key::new("name")), IndexDirective::Remove(Key::new("lang"))]
        );
        assert!(parse_indexes("-").is_err());
    }

    #[test]
    fn test_tags_case_insensitive_lookup() {
        let tags = Tags::parse("Name=marko,Knows").unwrap();
        assert!(tags.has("name"));
        assert!(tags.has("KNOWS"));
        assert_eq!(tags.value("NAME"), Some("marko"));
        assert_eq!(tags.value("knows"), None);
        assert!(tags.has_value("name", "Marko"));
        assert_eq!(tags.names().next().unwrap().as_str(), "Name");
    }

    #[test]
    fn test_removal_then_set_cancels() {
        let tags = Tags::parse("-lang,lang=rust").unwrap();
        assert!(!tags.has_removals());
        assert_eq!(tags.value("lang"), Some("rust"));

        let tags = Tags::parse("lang=rust,-lang").unwrap();
        assert!(tags.has_removals());
        assert!(!tags.has("lang"));
    }

    #[test]
    fn test_removals_alone_are_empty() {
        let tags = Tags::parse("-lang").unwrap();
        assert!(tags.is_empty());
        assert_eq!(tags.len(), 0);
        assert!(tags.has_removals());
        assert_eq!(serde_json::to_string(&tags).unwrap(), "{}");

        let indexes = IndexNames::parse("-name").unwrap();
        assert!(indexes.is_empty());
        assert_eq!(indexes.len(), 0);
        assert!(indexes.has_removals());
    }

    #[test]
    fn test_merge() {
        let stored = Tags::parse("name=ripple,lang=java,knows").unwrap();
        let delta = Tags::parse("-lang,name=Ripple2,age=3").unwrap();
        let merged = stored.merge(&delta);

        assert!(!merged.has("lang"));
        assert_eq!(merged.value("name"), Some("Ripple2"));
        assert_eq!(merged.value("age"), Some("3"));
        assert!(merged.has("knows"));
        assert!(!merged.has_removals());
        assert_eq!(merged.to_string(), "name=Ripple2,knows,age=3");
    }

    #[test]
    fn test_index_names_merge() {
        let stored = IndexNames::parse("lang,name").unwrap();
        let delta = IndexNames::parse("-name,age").unwrap();
        let merged = stored.merge(&delta);
        assert!(merged.contains("lang"));
        assert!(merged.contains("AGE"));
        assert!(!merged.contains("name"));
        assert_eq!(merged.to_string(), "lang,age");
    }

    #[test]
    fn test_display_roundtrips_through_parse() {
        let tags = Tags::parse("a=1,b,-c").unwrap();
        assert_eq!(tags.to_string(), "a=1,b,-c");
        assert_eq!(Tags::parse(&tags.to_string()).unwrap(), tags);
    }

    #[test]
    fn test_serialization_skips_removals() {
        let tags = Tags::parse("name=marko,knows,-lang").unwrap();
        let json = serde_json::to_string(&tags).unwrap();
        assert_eq!(json, r#"{"name":"marko","knows":null}"#);

        let decoded: Tags = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, tags.into_effective());
    }
}
