use std::env;

/// Default limit on record nesting.
pub const DEFAULT_MAX_DEPTH: usize = 128;

/// Knobs for record instantiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolveOptions {
    /// Maximum number of nested record levels, the root record included.
    pub max_depth: usize,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl ResolveOptions {
    /// Read `MIRACLE_MAX_DEPTH`, falling back to the default when unset or invalid.
    pub fn from_env() -> Self {
        let max_depth = env::var("MIRACLE_MAX_DEPTH")
            .ok()
            .and_then(|v| v.trim().parse::<usize>().ok())
            .filter(|&n| n > 0)
            .unwrap_or(DEFAULT_MAX_DEPTH);

        Self { max_depth }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }
}
