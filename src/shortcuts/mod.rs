//! Steam shortcuts container
//!
//! The shortcuts file is a binary keyed-value container holding one nested
//! map per non-Steam shortcut, keyed by a stable integer slot index.
//! This module models the records, the codec and the validated on-disk
//! store:
//! - `codec`: decode/encode with byte-identical round-trip
//! - `store`: backup + write + re-read validation protocol

pub mod codec;
pub mod store;

pub use codec::{decode, encode, ShortcutMap};
pub use store::ShortcutsStore;

use std::collections::BTreeMap;
use std::path::PathBuf;

/// Record field names Steam itself uses. Lookups are case-insensitive
/// because files written by other tools vary the casing.
pub const APP_NAME: &str = "appname";
pub const EXE: &str = "exe";
pub const START_DIR: &str = "StartDir";
pub const ICON: &str = "icon";
pub const LAUNCH_OPTIONS: &str = "LaunchOptions";

/// A single field value inside a shortcut record.
///
/// `Map` keeps insertion order so re-encoding a decoded record reproduces
/// the original bytes even for fields we do not recognize.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Str(String),
    U32(u32),
    Map(Vec<(String, FieldValue)>),
}

/// One launcher shortcut record.
///
/// Fields are stored as an ordered list rather than a map: the container
/// must round-trip byte-for-byte, including fields this tool knows nothing
/// about, so decoded order is authoritative.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Shortcut {
    pub fields: Vec<(String, FieldValue)>,
}

impl Shortcut {
    /// Build a fresh record with the canonical field set Steam writes.
    pub fn new(app_name: &str, exe: &str, start_dir: &str, launch_options: &str) -> Self {
        let fields = vec![
            (APP_NAME.to_string(), FieldValue::Str(app_name.to_string())),
            (EXE.to_string(), FieldValue::Str(exe.to_string())),
            (START_DIR.to_string(), FieldValue::Str(start_dir.to_string())),
            (ICON.to_string(), FieldValue::Str(String::new())),
            (
                LAUNCH_OPTIONS.to_string(),
                FieldValue::Str(launch_options.to_string()),
            ),
            ("IsHidden".to_string(), FieldValue::U32(0)),
            ("AllowDesktopConfig".to_string(), FieldValue::U32(1)),
            ("AllowOverlay".to_string(), FieldValue::U32(1)),
            ("LastPlayTime".to_string(), FieldValue::U32(0)),
            ("tags".to_string(), FieldValue::Map(Vec::new())),
        ];
        Self { fields }
    }

    /// First field whose name matches `key` case-insensitively.
    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.fields
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        match self.get(key) {
            Some(FieldValue::Str(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Replace a string field in place (keeping the original key casing and
    /// position), or append it with the canonical key if absent.
    pub fn set_str(&mut self, key: &str, value: &str) {
        for (k, v) in &mut self.fields {
            if k.eq_ignore_ascii_case(key) {
                *v = FieldValue::Str(value.to_string());
                return;
            }
        }
        self.fields
            .push((key.to_string(), FieldValue::Str(value.to_string())));
    }

    pub fn app_name(&self) -> Option<&str> {
        self.get_str(APP_NAME)
    }

    pub fn exe(&self) -> Option<&str> {
        self.get_str(EXE)
    }

    pub fn launch_options(&self) -> Option<&str> {
        self.get_str(LAUNCH_OPTIONS)
    }
}

/// Errors from the shortcuts codec and store.
#[derive(Debug, thiserror::Error)]
pub enum ShortcutsError {
    #[error("malformed shortcuts container: {0}")]
    Malformed(String),

    #[error("write validation failed: expected {expected} records, re-read {actual}")]
    WriteValidation { expected: usize, actual: usize },

    #[error("shortcuts io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Convenience constructor for a container map.
pub fn shortcut_map<I: IntoIterator<Item = (u32, Shortcut)>>(entries: I) -> BTreeMap<u32, Shortcut> {
    entries.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_insensitive_get() {
        let mut sc = Shortcut::new("Foo", "/bin/foo", "/bin", "");
        assert_eq!(sc.get_str("AppName"), Some("Foo"));
        assert_eq!(sc.get_str("EXE"), Some("/bin/foo"));

        sc.set_str("APPNAME", "Bar");
        assert_eq!(sc.app_name(), Some("Bar"));
        // Original key casing survives an in-place update
        assert!(sc.fields.iter().any(|(k, _)| k == APP_NAME));
    }

    #[test]
    fn test_set_str_appends_missing_field() {
        let mut sc = Shortcut::default();
        sc.set_str(LAUNCH_OPTIONS, "epic:abc");
        assert_eq!(sc.launch_options(), Some("epic:abc"));
    }
}
