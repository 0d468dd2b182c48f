//! Explicit configuration record (§9 design note: no module-level mutable
//! tables or hardcoded tool paths — everything the registry and engine need
//! is constructed once by the embedder and passed in).

use std::path::PathBuf;

/// Construction-time configuration for a [`crate::registry::Registry`] /
/// [`crate::engine::FlashEngine`] pair.
#[derive(Debug, Clone)]
pub struct FlashConfig {
    /// Directory owned by the target: lock files, pidfiles, and log files
    /// for this target's flash operations live here (§5, §6).
    pub state_dir: PathBuf,
    /// Absolute path prefixes a request is allowed to reference, paired
    /// with the server-side mount point they translate to (§4.2 step 2).
    /// Checked in order; the first matching prefix wins.
    pub path_whitelist: Vec<(PathBuf, PathBuf)>,
}

impl FlashConfig {
    pub fn new(state_dir: impl Into<PathBuf>) -> Self {
        FlashConfig {
            state_dir: state_dir.into(),
            path_whitelist: Vec::new(),
        }
    }

    pub fn with_whitelist_entry(
        mut self,
        prefix: impl Into<PathBuf>,
        translated: impl Into<PathBuf>,
    ) -> Self {
        self.path_whitelist.push((prefix.into(), translated.into()));
        self
    }

    /// Translate an absolute path against the whitelist, or `None` if it
    /// matches no configured prefix.
    pub fn translate_absolute(&self, path: &std::path::Path) -> Option<PathBuf> {
        for (prefix, translated) in &self.path_whitelist {
            if let Ok(rest) = path.strip_prefix(prefix) {
                return Some(translated.join(rest));
            }
        }
        None
    }
}
