use super::class::{ClassLevel, HookResult, Serializable};
use super::stream::{ObjectInput, ObjectOutput};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::fmt;

/// A string-to-string table serialized through custom hooks.
///
/// Entries are written by the `writeObject` hook of the table level as a
/// count followed by key and value pairs.
#[derive(Default)]
pub struct Properties {
    entries: RwLock<BTreeMap<String, String>>,
}

impl Properties {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `key` to `value`, returning the previous value.
    pub fn set_property(&self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.entries.write().insert(key.into(), value.into())
    }

    /// Returns the value of `key`.
    pub fn get_property(&self, key: &str) -> Option<String> {
        self.entries.read().get(key).cloned()
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns `true` if the table is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Returns a copy of all entries.
    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.entries.read().clone()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Properties {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let entries = iter
            .into_iter()
            .map(|(key, value)| (key.into(), value.into()))
            .collect();
        Self {
            entries: RwLock::new(entries),
        }
    }
}

impl PartialEq for Properties {
    fn eq(&self, other: &Self) -> bool {
        self.snapshot() == other.snapshot()
    }
}

impl fmt::Debug for Properties {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.snapshot()).finish()
    }
}

fn write_entries(table: &Properties, out: &mut ObjectOutput<'_>) -> HookResult {
    out.default_write_object()?;
    let entries = table.snapshot();
    out.write_int(i32::try_from(entries.len())?)?;
    for (key, value) in &entries {
        out.write_utf(key)?;
        out.write_utf(value)?;
    }
    Ok(())
}

fn read_entries(table: &Properties, input: &mut ObjectInput<'_>) -> HookResult {
    input.default_read_object()?;
    let count = input.read_int()?;
    if count < 0 {
        return Err(format!("negative entry count {count}").into());
    }
    let mut entries = table.entries.write();
    for _ in 0..count {
        let key = input.read_utf()?;
        let value = input.read_utf()?;
        entries.insert(key, value);
    }
    Ok(())
}

impl Serializable for Properties {
    const CLASS_NAME: &'static str = "java.util.Properties";

    fn blank() -> Self {
        Self::new()
    }

    fn class_levels() -> Vec<ClassLevel<Self>> {
        vec![
            ClassLevel::new("java.util.Hashtable")
                .with_write_object(write_entries)
                .with_read_object(read_entries),
            ClassLevel::new("java.util.Properties"),
        ]
    }
}
