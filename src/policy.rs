use std::borrow::Cow;
use std::collections::{HashMap, HashSet};

/// Where a property ends up in the emitted record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route<'a> {
    /// Keep the property in `fields` under the given key.
    Field(Cow<'a, str>),
    /// Fold the property into the message as `name=value`.
    Overflow,
}

/// Decides which properties become structured fields and under what name.
///
/// Policies are fixed at construction and only read afterwards, so a single
/// instance can be shared between threads.
pub trait FieldPolicy: Send + Sync {
    fn route<'a>(&'a self, name: &'a str) -> Route<'a>;

    /// Name applied to fields of nested structures. Identity by default.
    fn nested_key(&self, name: &str) -> String {
        name.to_string()
    }
}

/// Keeps properties whose name is in the set, compared case-insensitively.
/// Selected properties keep their original name.
#[derive(Debug, Clone, Default)]
pub struct AllowList {
    allowed: HashSet<String>,
}

impl AllowList {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            allowed: names.into_iter().map(|n| n.as_ref().to_lowercase()).collect(),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.allowed.contains(&name.to_lowercase())
    }

    pub fn len(&self) -> usize {
        self.allowed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.allowed.is_empty()
    }
}

impl FieldPolicy for AllowList {
    fn route<'a>(&'a self, name: &'a str) -> Route<'a> {
        if self.contains(name) {
            Route::Field(Cow::Borrowed(name))
        } else {
            Route::Overflow
        }
    }
}

/// Keeps properties whose name is a key of the table (exact, case-sensitive
/// match) and emits them under the mapped name.
#[derive(Debug, Clone, Default)]
pub struct RenameMap {
    table: HashMap<String, String>,
}

impl RenameMap {
    pub fn new<I, K, V>(table: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            table: table.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.table.get(name).map(String::as_str)
    }
}

impl FieldPolicy for RenameMap {
    fn route<'a>(&'a self, name: &'a str) -> Route<'a> {
        match self.get(name) {
            Some(mapped) => Route::Field(Cow::Borrowed(mapped)),
            None => Route::Overflow,
        }
    }
}

/// Keeps every property, converting its name and the names of all nested
/// structure fields with [`to_snake_case`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SnakeCase;

impl FieldPolicy for SnakeCase {
    fn route<'a>(&'a self, name: &'a str) -> Route<'a> {
        Route::Field(Cow::Owned(to_snake_case(name)))
    }

    fn nested_key(&self, name: &str) -> String {
        to_snake_case(name)
    }
}

/// Per-character snake_case: every upper-case character after the first
/// position gets a leading `_`, and all upper-case characters are lowered.
///
/// No word detection is attempted, so `"ID"` becomes `"i_d"`.
pub fn to_snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 5);
    for (i, c) in name.chars().enumerate() {
        if c.is_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}
