use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A reference-counted, immutable string.
///
/// Function and category names are handed out to every display row that
/// mentions them, so cloning must not allocate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SharedStr(Arc<str>);

impl SharedStr {
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for SharedStr {
    fn eq(&self, other: &str) -> bool {
        &*self.0 == other
    }
}

impl PartialEq<&str> for SharedStr {
    fn eq(&self, other: &&str) -> bool {
        &*self.0 == *other
    }
}

impl std::ops::Deref for SharedStr {
    type Target = str;

    #[inline]
    fn deref(&self) -> &str {
        &self.0
    }
}

impl std::borrow::Borrow<str> for SharedStr {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SharedStr {
    fn from(s: &str) -> Self {
        SharedStr(Arc::from(s))
    }
}

impl From<String> for SharedStr {
    fn from(s: String) -> Self {
        SharedStr(Arc::from(s))
    }
}

impl std::fmt::Display for SharedStr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

// Hand-rolled so serde's `rc` feature is not needed.
impl Serialize for SharedStr {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for SharedStr {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(SharedStr::from(s))
    }
}

/// Indexed, deduplicated strings of one thread.
///
/// Function, resource and native-symbol tables refer to names by their index
/// in this table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StringTable {
    strings: Vec<SharedStr>,
    index: HashMap<SharedStr, usize>,
}

impl StringTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index of `s`, inserting it if it is not in the table yet.
    pub fn intern(&mut self, s: &str) -> usize {
        if let Some(&index) = self.index.get(s) {
            return index;
        }
        let shared = SharedStr::from(s);
        let index = self.strings.len();
        self.strings.push(shared.clone());
        self.index.insert(shared, index);
        index
    }

    /// The string at `index`. Panics if the index is out of range.
    pub fn get(&self, index: usize) -> &SharedStr {
        &self.strings[index]
    }

    pub fn find(&self, s: &str) -> Option<usize> {
        self.index.get(s).copied()
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}

impl Serialize for StringTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.strings.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for StringTable {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let strings = Vec::<SharedStr>::deserialize(deserializer)?;
        let mut table = StringTable::new();
        for s in &strings {
            table.intern(s);
        }
        Ok(table)
    }
}
