use crate::level::Level;
use crate::value::{Attr, Value};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::btree_map::{self, BTreeMap};

/// Mapping from attribute name to value, one nesting level of a record.
///
/// Keys are unique; inserting an existing key overwrites it.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Fields(BTreeMap<String, Value>);

impl Fields {
    pub fn new() -> Self {
        Fields(BTreeMap::new())
    }

    /// Insert an attribute. Empty groups are omitted.
    pub fn insert(&mut self, attr: Attr) {
        if is_empty_group(&attr) {
            return;
        }
        self.0.insert(attr.key, attr.value);
    }

    /// Insert `attrs` under the nested group `path`.
    ///
    /// The path is only created when at least one attribute survives, so a
    /// call that writes nothing leaves existing keys on the path alone.
    pub fn insert_under<S: AsRef<str>>(
        &mut self,
        path: &[S],
        attrs: impl IntoIterator<Item = Attr>,
    ) {
        let mut attrs = attrs.into_iter().filter(|attr| !is_empty_group(attr)).peekable();
        if attrs.peek().is_none() {
            return;
        }
        self.group_mut(path).extend(attrs);
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Follow a dotted group path, e.g. `["g1", "g2", "attr"]`.
    pub fn lookup<S: AsRef<str>>(&self, path: &[S]) -> Option<&Value> {
        let (last, groups) = path.split_last()?;
        let mut current = self;
        for name in groups {
            current = current.get(name.as_ref())?.as_group()?;
        }
        current.get(last.as_ref())
    }

    /// Descend into nested groups along `path`, creating them as needed.
    ///
    /// A non-group value sitting where a group is required is replaced.
    pub fn group_mut<S: AsRef<str>>(&mut self, path: &[S]) -> &mut Fields {
        let mut current = self;
        for name in path {
            let slot = current
                .0
                .entry(name.as_ref().to_string())
                .or_insert_with(|| Value::Group(Fields::new()));
            if !matches!(slot, Value::Group(_)) {
                *slot = Value::Group(Fields::new());
            }
            current = match slot {
                Value::Group(fields) => fields,
                _ => unreachable!("slot was just set to a group"),
            };
        }
        current
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, Value> {
        self.0.iter()
    }
}

fn is_empty_group(attr: &Attr) -> bool {
    matches!(&attr.value, Value::Group(group) if group.is_empty())
}

impl Extend<Attr> for Fields {
    fn extend<I: IntoIterator<Item = Attr>>(&mut self, iter: I) {
        for attr in iter {
            self.insert(attr);
        }
    }
}

impl FromIterator<Attr> for Fields {
    fn from_iter<I: IntoIterator<Item = Attr>>(iter: I) -> Self {
        let mut fields = Fields::new();
        fields.extend(iter);
        fields
    }
}

impl<'a> IntoIterator for &'a Fields {
    type Item = (&'a String, &'a Value);
    type IntoIter = btree_map::Iter<'a, String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// One structured log event, produced per call and owned by the backend
/// while it is formatted and written.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogRecord {
    pub timestamp: DateTime<Utc>,
    pub level: Level,
    pub message: String,
    pub fields: Fields,
}

impl LogRecord {
    pub fn new(level: Level, message: impl Into<String>, fields: Fields) -> Self {
        LogRecord { timestamp: Utc::now(), level, message: message.into(), fields }
    }
}
