use std::fmt;

/// A caller-supplied lock name rendered into its namespaced store key.
///
/// The format is `prefix:lock:name`. Callers rely only on distinct names
/// producing distinct keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LockKey {
    rendered: String,
}

impl LockKey {
    pub fn new(prefix: &str, name: &str) -> Self {
        let rendered = if prefix.is_empty() {
            format!("lock:{name}")
        } else {
            format!("{prefix}:lock:{name}")
        };
        Self { rendered }
    }

    /// The key sent to the store.
    pub fn as_str(&self) -> &str {
        &self.rendered
    }
}

impl fmt::Display for LockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.rendered)
    }
}

impl AsRef<str> for LockKey {
    fn as_ref(&self) -> &str {
        &self.rendered
    }
}
