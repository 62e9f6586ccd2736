use std::env;

/// Environment variable naming the member to count.
pub const TARGET_ENV: &str = "COUNT_CALLS_TO";

/// Target used when [`TARGET_ENV`] is unset. Resolves in every fresh
/// [`Registry`](crate::Registry).
pub const DEFAULT_TARGET: &str = "Object.name";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub target: String,
}

impl Config {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
        }
    }

    /// Reads [`TARGET_ENV`]. A value that is set but empty is kept as is and
    /// will simply never resolve.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self::new(lookup(TARGET_ENV).unwrap_or_else(|| DEFAULT_TARGET.to_owned()))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(DEFAULT_TARGET)
    }
}
