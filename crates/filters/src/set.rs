//! Compiles a rule list into a set that can decide, per path, whether to
//! transfer it and whether a `--delete` sweep may remove it.

use std::path::Path;

use crate::error::FilterError;
use crate::pattern::CompiledPattern;
use crate::rule::{FilterAction, FilterRule};

/// The effective direction a compiled rule matches against: either
/// transfer (`allows`) or deletion (`allows_deletion`).
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
enum Effect {
    Include,
    Exclude,
}

#[derive(Clone)]
struct CompiledRule {
    pattern: CompiledPattern,
    effect: Effect,
    negate: bool,
    perishable: bool,
    sender: bool,
    receiver: bool,
}

impl CompiledRule {
    fn matches(&self, path: &Path, is_dir: bool) -> bool {
        self.pattern.is_match(path, is_dir) != self.negate
    }
}

/// A compiled, ordered list of filter rules.
///
/// [`FilterRule::Clear`](FilterAction::Clear) rules are resolved while
/// compiling: everything compiled before a clear is dropped. Merge and
/// dir-merge rules carry no matching behaviour of their own (dir-merge is
/// resolved during traversal, outside this type) and are skipped.
#[derive(Default, Clone)]
pub struct FilterSet {
    rules: Vec<CompiledRule>,
}

impl std::fmt::Debug for FilterSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilterSet").field("rules", &self.rules.len()).finish()
    }
}

impl FilterSet {
    /// Compiles `rules` into a [`FilterSet`].
    ///
    /// # Errors
    ///
    /// Returns [`FilterError`] if any rule's pattern fails to compile.
    pub fn from_rules(rules: impl IntoIterator<Item = FilterRule>) -> Result<Self, FilterError> {
        let mut compiled = Vec::new();

        for rule in rules {
            match rule.action() {
                FilterAction::Clear => compiled.clear(),
                FilterAction::Merge | FilterAction::DirMerge => {}
                action => {
                    let effect = match action {
                        FilterAction::Include | FilterAction::Risk | FilterAction::Show => Effect::Include,
                        FilterAction::Exclude | FilterAction::Protect | FilterAction::Hide => Effect::Exclude,
                        FilterAction::Clear | FilterAction::Merge | FilterAction::DirMerge => unreachable!(),
                    };
                    compiled.push(CompiledRule {
                        pattern: CompiledPattern::compile(rule.pattern())?,
                        effect,
                        negate: rule.is_negated(),
                        perishable: rule.is_perishable(),
                        sender: rule.applies_to_sender(),
                        receiver: rule.applies_to_receiver(),
                    });
                }
            }
        }

        Ok(Self { rules: compiled })
    }

    /// Whether a path is offered for transfer, first-match-wins over every
    /// sender-applicable rule; an unmatched path is included by default.
    #[must_use]
    pub fn allows(&self, path: &Path, is_dir: bool) -> bool {
        self.rules
            .iter()
            .filter(|rule| rule.sender)
            .find(|rule| rule.matches(path, is_dir))
            .is_none_or(|rule| rule.effect == Effect::Include)
    }

    /// Whether a `--delete` sweep may remove a path, first-match-wins over
    /// every non-perishable, receiver-applicable rule; an unmatched path may
    /// be deleted by default.
    #[must_use]
    pub fn allows_deletion(&self, path: &Path, is_dir: bool) -> bool {
        self.rules
            .iter()
            .filter(|rule| rule.receiver && !rule.perishable)
            .find(|rule| rule.matches(path, is_dir))
            .is_none_or(|rule| rule.effect == Effect::Include)
    }

    /// Whether no rule in this set has any matching effect.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_set_allows_everything() {
        let set = FilterSet::from_rules(Vec::<FilterRule>::new()).unwrap();
        assert!(set.is_empty());
        assert!(set.allows(Path::new("a"), false));
        assert!(set.allows_deletion(Path::new("a"), false));
    }

    #[test]
    fn first_match_wins() {
        let set = FilterSet::from_rules([FilterRule::exclude("*.txt"), FilterRule::include("keep.txt")]).unwrap();
        assert!(!set.allows(Path::new("keep.txt"), false));
    }

    #[test]
    fn clear_drops_everything_compiled_so_far() {
        let set = FilterSet::from_rules([FilterRule::exclude("*.txt"), FilterRule::clear()]).unwrap();
        assert!(set.is_empty());
        assert!(set.allows(Path::new("a.txt"), false));
    }

    #[test]
    fn show_allows_transfer_but_not_deletion_block() {
        let set = FilterSet::from_rules([FilterRule::show("visible.txt")]).unwrap();
        assert!(set.allows(Path::new("visible.txt"), false));
        assert!(set.allows_deletion(Path::new("visible.txt"), false));
    }

    #[test]
    fn protect_blocks_deletion_but_not_transfer() {
        let set = FilterSet::from_rules([FilterRule::protect("important.dat")]).unwrap();
        assert!(set.allows(Path::new("important.dat"), false));
        assert!(!set.allows_deletion(Path::new("important.dat"), false));
    }

    #[test]
    fn perishable_exclude_does_not_block_deletion() {
        let set = FilterSet::from_rules([FilterRule::exclude("*.tmp").with_perishable(true)]).unwrap();
        assert!(!set.allows(Path::new("a.tmp"), false));
        assert!(set.allows_deletion(Path::new("a.tmp"), false));
    }

    #[test]
    fn non_perishable_exclude_blocks_deletion_too() {
        let set = FilterSet::from_rules([FilterRule::exclude("*.tmp")]).unwrap();
        assert!(!set.allows_deletion(Path::new("a.tmp"), false));
    }

    #[test]
    fn dir_merge_and_merge_are_skipped() {
        let set = FilterSet::from_rules([FilterRule::dir_merge(".rsync-filter")]).unwrap();
        assert!(set.is_empty());
    }

    #[test]
    fn invalid_pattern_is_an_error() {
        assert!(FilterSet::from_rules([FilterRule::exclude("[")]).is_err());
    }
}
