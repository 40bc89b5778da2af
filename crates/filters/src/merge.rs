//! Reading filter rules from files: `--exclude-from`/`--include-from`
//! (a flat [`read_rules`]) and the recursive expansion of `merge` directives
//! `read_rules_recursive` performs while leaving `dir-merge` rules in place
//! for the walker to resolve per directory.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::RuleParseError;
use crate::parse::parse_rules;
use crate::rule::{FilterAction, FilterRule};

/// Reads and parses the filter rules in the file at `path`.
///
/// # Errors
///
/// Returns [`RuleParseError`] if the file cannot be read or contains a
/// malformed rule.
pub fn read_rules(path: &Path) -> Result<Vec<FilterRule>, RuleParseError> {
    let text = fs::read_to_string(path).map_err(|source| RuleParseError::io(path.display().to_string(), &source))?;
    parse_rules(&text, path)
}

/// Like [`read_rules`], but also expands every `merge` directive it finds,
/// recursively, up to `max_depth` levels. `dir-merge` directives are left
/// untouched, since they are resolved per directory during traversal rather
/// than at load time.
///
/// # Errors
///
/// Returns [`RuleParseError`] if a merged file cannot be read, contains a
/// malformed rule, or the merge chain exceeds `max_depth`.
pub fn read_rules_recursive(path: &Path, max_depth: usize) -> Result<Vec<FilterRule>, RuleParseError> {
    expand(path, max_depth, 0)
}

fn expand(path: &Path, max_depth: usize, depth: usize) -> Result<Vec<FilterRule>, RuleParseError> {
    if depth > max_depth {
        return Err(RuleParseError::new(
            path.display().to_string(),
            format!("merge depth exceeded the limit of {max_depth}"),
            None,
        ));
    }

    let rules = read_rules(path)?;
    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut expanded = Vec::with_capacity(rules.len());

    for rule in rules {
        if rule.action() == FilterAction::Merge {
            let nested = resolve(base_dir, rule.pattern());
            expanded.extend(expand(&nested, max_depth, depth + 1)?);
        } else {
            expanded.push(rule);
        }
    }

    Ok(expanded)
}

fn resolve(base_dir: &Path, pattern: &str) -> PathBuf {
    let candidate = Path::new(pattern);
    if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        base_dir.join(candidate)
    }
}

/// The patterns rsync's `--cvs-exclude` adds by default, matching upstream's
/// built-in CVS-ignore list.
const CVS_DEFAULT_PATTERNS: &[&str] = &[
    "RCS",
    "SCCS",
    "CVS",
    "CVS.adm",
    "RCSLOG",
    "cvslog.*",
    "tags",
    "TAGS",
    ".make.state",
    ".nse_depinfo",
    "*~",
    "#*",
    ".#*",
    ",*",
    "_$*",
    "*$",
    "*.old",
    "*.bak",
    "*.BAK",
    "*.orig",
    "*.rej",
    ".del-*",
    "*.a",
    "*.olb",
    "*.o",
    "*.obj",
    "*.so",
    "*.exe",
    "*.Z",
    "*.elc",
    "*.ln",
    "core",
    ".svn/",
    ".git/",
    ".hg/",
    ".bzr/",
];

/// Iterates the default `--cvs-exclude` patterns.
pub fn cvs_default_patterns() -> impl Iterator<Item = &'static str> {
    CVS_DEFAULT_PATTERNS.iter().copied()
}

/// Builds the exclude rules `--cvs-exclude` installs, one per default
/// pattern, with [`FilterRule::is_perishable`] set from `perishable`.
pub fn cvs_exclusion_rules(perishable: bool) -> impl Iterator<Item = FilterRule> {
    cvs_default_patterns().map(move |pattern| FilterRule::exclude(pattern).with_perishable(perishable))
}
