//! Deterministic collision-free output naming

use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Chooses unique output names for one top-level extraction
///
/// Counters are kept per `(directory, base, extension)`. The first occurrence
/// of a key is `base.ext`, the n-th is `base_n.ext`. When the candidate already
/// exists on disk an extra `_k` suffix is appended until the name is free.
///
/// A namer is created for each top-level extraction and passed by `&mut`
/// through the recursion, so unrelated extractions never share counters.
#[derive(Debug, Default)]
pub struct UniqueNamer {
    counters: HashMap<(PathBuf, String, String), usize>,
}

impl UniqueNamer {
    /// Create a namer with no history
    pub fn new() -> Self {
        Self::default()
    }

    /// Pick the next unique name for `base` + `ext` inside `dir`
    ///
    /// `ext` includes its dot, or is empty for folder names.
    pub fn next_name(&mut self, dir: &Path, base: &str, ext: &str) -> String {
        let count = self
            .counters
            .entry((dir.to_path_buf(), base.to_string(), ext.to_string()))
            .and_modify(|c| *c += 1)
            .or_insert(1);
        let count = *count;

        let mut name = if count == 1 {
            format!("{base}{ext}")
        } else {
            format!("{base}_{count}{ext}")
        };

        let mut extra = 1;
        while dir.join(&name).exists() {
            name = if count == 1 {
                format!("{base}_{extra}{ext}")
            } else {
                format!("{base}_{count}_{extra}{ext}")
            };
            extra += 1;
        }

        name
    }
}
