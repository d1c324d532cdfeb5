use crate::net::path::ObjectPath;
use fxhash::FxHashMap;
use std::cell::RefCell;
use std::fmt::Debug;

///
/// The parameter tree of a network: string bindings keyed by dotted
/// module paths.
///
/// Lookup walks ancestors: a module `lan.router` asking for `mtu`
/// resolves `lan.router.mtu` first, then `lan.mtu`, then the global
/// `mtu`.
///
#[derive(Default)]
pub struct Parameters {
    map: RefCell<FxHashMap<String, String>>,
}

impl Parameters {
    ///
    /// Parses raw parameter text, one `key: value` binding per line.
    /// Empty lines and lines starting with `#` are skipped; malformed
    /// lines are ignored.
    ///
    pub fn build(&self, raw: &str) {
        let mut map = self.map.borrow_mut();
        for line in raw.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            map.insert(key.trim().to_string(), value.trim().to_string());
        }
    }

    /// Inserts a single binding.
    pub fn insert(&self, key: impl Into<String>, value: impl Into<String>) {
        self.map.borrow_mut().insert(key.into(), value.into());
    }

    /// Retrieves a binding by its full key, without ancestor fallback.
    #[must_use]
    pub fn get_raw(&self, key: &str) -> Option<String> {
        self.map.borrow().get(key).cloned()
    }

    ///
    /// Resolves a parameter for a module path, walking ancestor paths up
    /// to the root and finally the unprefixed key.
    ///
    #[must_use]
    pub fn resolve(&self, path: &ObjectPath, key: &str) -> Option<String> {
        let map = self.map.borrow();
        if let Some(value) = map.get(&format!("{path}.{key}")) {
            return Some(value.clone());
        }
        for ancestor in path.ancestors() {
            if let Some(value) = map.get(&format!("{ancestor}.{key}")) {
                return Some(value.clone());
            }
        }
        map.get(key).cloned()
    }
}

impl Debug for Parameters {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Parameters")
            .field("bindings", &self.map.borrow().len())
            .finish()
    }
}
