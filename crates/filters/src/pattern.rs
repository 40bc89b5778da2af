//! Compiles a filter pattern into a matcher over relative transfer paths.
//!
//! Follows the glob dialect rsync's own filter rules use: `*` and `?` never
//! cross a `/`, `**` does, and a pattern is anchored to the transfer root the
//! moment it contains a `/` anywhere but a single trailing one.

use std::path::Path;

use globset::{Glob, GlobBuilder, GlobMatcher};

use crate::error::FilterError;

/// A compiled pattern, ready to test candidate paths against.
#[derive(Clone)]
pub(crate) struct CompiledPattern {
    dir_only: bool,
    base: GlobMatcher,
    descendants: Option<GlobMatcher>,
}

impl CompiledPattern {
    pub(crate) fn compile(pattern: &str) -> Result<Self, FilterError> {
        let dir_only = pattern.len() > 1 && pattern.ends_with('/');
        let trimmed = if dir_only {
            &pattern[..pattern.len() - 1]
        } else {
            pattern
        };

        let anchored = trimmed.contains('/');
        let root_relative = trimmed.strip_prefix('/').unwrap_or(trimmed);
        let glob_text = if anchored {
            root_relative.to_string()
        } else {
            format!("**/{root_relative}")
        };

        let base = build_matcher(pattern, &glob_text)?;
        let descendants = if dir_only {
            Some(build_matcher(pattern, &format!("{glob_text}/**"))?)
        } else {
            None
        };

        Ok(Self {
            dir_only,
            base,
            descendants,
        })
    }

    pub(crate) fn is_match(&self, path: &Path, is_dir: bool) -> bool {
        if self.dir_only {
            (is_dir && self.base.is_match(path))
                || self
                    .descendants
                    .as_ref()
                    .is_some_and(|matcher| matcher.is_match(path))
        } else {
            self.base.is_match(path)
        }
    }
}

fn build_matcher(original_pattern: &str, glob_text: &str) -> Result<GlobMatcher, FilterError> {
    build_glob(glob_text)
        .map(|glob| glob.compile_matcher())
        .map_err(|source| FilterError::new(original_pattern, source))
}

fn build_glob(glob_text: &str) -> Result<Glob, globset::Error> {
    GlobBuilder::new(glob_text).literal_separator(true).build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn unanchored_star_matches_any_depth() {
        let pattern = CompiledPattern::compile("*.txt").unwrap();
        assert!(pattern.is_match(Path::new("a.txt"), false));
        assert!(pattern.is_match(Path::new("dir/a.txt"), false));
    }

    #[test]
    fn anchored_star_matches_root_only() {
        let pattern = CompiledPattern::compile("/*.txt").unwrap();
        assert!(pattern.is_match(Path::new("a.txt"), false));
        assert!(!pattern.is_match(Path::new("dir/a.txt"), false));
    }

    #[test]
    fn directory_pattern_matches_self_and_descendants() {
        let pattern = CompiledPattern::compile("build/").unwrap();
        assert!(pattern.is_match(Path::new("build"), true));
        assert!(!pattern.is_match(Path::new("build"), false));
        assert!(pattern.is_match(Path::new("build/out.bin"), false));
    }

    #[test]
    fn invalid_pattern_is_an_error() {
        assert!(CompiledPattern::compile("[").is_err());
    }
}
