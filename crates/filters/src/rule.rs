//! A single filter rule and the action it carries.

use std::fmt;

/// What a [`FilterRule`] does when its pattern matches a path.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum FilterAction {
    /// Allow matching paths to be transferred.
    Include,
    /// Block matching paths from being transferred.
    Exclude,
    /// Forget every rule seen so far in this rule list.
    Clear,
    /// Block matching destination paths from a `--delete` sweep.
    Protect,
    /// Undo a [`Self::Protect`] rule for matching destination paths.
    Risk,
    /// Sender-side-only include (affects what the sender offers, not deletion).
    Show,
    /// Sender-side-only exclude (affects what the sender offers, not deletion).
    Hide,
    /// Splice another rules file into this position.
    Merge,
    /// Look for a per-directory rules file named by the pattern while walking.
    DirMerge,
}

impl fmt::Display for FilterAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Include => "include",
            Self::Exclude => "exclude",
            Self::Clear => "clear",
            Self::Protect => "protect",
            Self::Risk => "risk",
            Self::Show => "show",
            Self::Hide => "hide",
            Self::Merge => "merge",
            Self::DirMerge => "dir-merge",
        };
        f.write_str(name)
    }
}

/// One parsed filter rule: an action, a pattern, and the modifiers that
/// narrow when and to which side it applies.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct FilterRule {
    action: FilterAction,
    pattern: String,
    negate: bool,
    perishable: bool,
    xattr_only: bool,
    exclude_only: bool,
    no_inherit: bool,
    sender: bool,
    receiver: bool,
}

impl FilterRule {
    fn new(action: FilterAction, pattern: impl Into<String>, sender: bool, receiver: bool) -> Self {
        Self {
            action,
            pattern: pattern.into(),
            negate: false,
            perishable: false,
            xattr_only: false,
            exclude_only: false,
            no_inherit: false,
            sender,
            receiver,
        }
    }

    /// `+ pattern`: allow transfer of matching paths.
    #[must_use]
    pub fn include(pattern: impl Into<String>) -> Self {
        Self::new(FilterAction::Include, pattern, true, true)
    }

    /// `- pattern`: block transfer of matching paths.
    #[must_use]
    pub fn exclude(pattern: impl Into<String>) -> Self {
        Self::new(FilterAction::Exclude, pattern, true, true)
    }

    /// `!`: forget every prior rule in the list being built.
    #[must_use]
    pub fn clear() -> Self {
        Self::new(FilterAction::Clear, String::new(), true, true)
    }

    /// `P pattern`: protect matching destination paths from `--delete`.
    #[must_use]
    pub fn protect(pattern: impl Into<String>) -> Self {
        Self::new(FilterAction::Protect, pattern, false, true)
    }

    /// `R pattern`: undo protection for matching destination paths.
    #[must_use]
    pub fn risk(pattern: impl Into<String>) -> Self {
        Self::new(FilterAction::Risk, pattern, false, true)
    }

    /// `S pattern`: sender-side include.
    #[must_use]
    pub fn show(pattern: impl Into<String>) -> Self {
        Self::new(FilterAction::Show, pattern, true, false)
    }

    /// `H pattern`: sender-side exclude.
    #[must_use]
    pub fn hide(pattern: impl Into<String>) -> Self {
        Self::new(FilterAction::Hide, pattern, true, false)
    }

    /// `. path`: splice the rules read from `path` into this position.
    #[must_use]
    pub fn merge(path: impl Into<String>) -> Self {
        Self::new(FilterAction::Merge, path, true, true)
    }

    /// `: filename`: consult `filename` for extra rules while walking each
    /// directory.
    #[must_use]
    pub fn dir_merge(filename: impl Into<String>) -> Self {
        Self::new(FilterAction::DirMerge, filename, true, true)
    }

    /// This rule's action.
    #[must_use]
    pub const fn action(&self) -> FilterAction {
        self.action
    }

    /// The pattern (or, for merge rules, the path/filename) this rule carries.
    #[must_use]
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// `!` modifier: the rule applies to paths that do *not* match the pattern.
    #[must_use]
    pub const fn with_negate(mut self, negate: bool) -> Self {
        self.negate = negate;
        self
    }

    /// `p` modifier: ignored while deciding what `--delete` may remove.
    #[must_use]
    pub const fn with_perishable(mut self, perishable: bool) -> Self {
        self.perishable = perishable;
        self
    }

    /// `x` modifier: the rule applies only to extended-attribute names.
    #[must_use]
    pub const fn with_xattr_only(mut self, xattr_only: bool) -> Self {
        self.xattr_only = xattr_only;
        self
    }

    /// `e` modifier: a merge/dir-merge file that may contribute exclude
    /// rules only.
    #[must_use]
    pub const fn with_exclude_only(mut self, exclude_only: bool) -> Self {
        self.exclude_only = exclude_only;
        self
    }

    /// `n` modifier: a dir-merge rule that does not inherit into
    /// subdirectories beyond the one it was found in.
    #[must_use]
    pub const fn with_no_inherit(mut self, no_inherit: bool) -> Self {
        self.no_inherit = no_inherit;
        self
    }

    /// `s` modifier: restrict this rule to the sending side.
    #[must_use]
    pub const fn with_sender(mut self, sender: bool) -> Self {
        self.sender = sender;
        self
    }

    /// `r` modifier: restrict this rule to the receiving side.
    #[must_use]
    pub const fn with_receiver(mut self, receiver: bool) -> Self {
        self.receiver = receiver;
        self
    }

    /// Sets both sides at once.
    #[must_use]
    pub const fn with_sides(mut self, sender: bool, receiver: bool) -> Self {
        self.sender = sender;
        self.receiver = receiver;
        self
    }

    /// Whether `!` was applied.
    #[must_use]
    pub const fn is_negated(&self) -> bool {
        self.negate
    }

    /// Whether `p` was applied.
    #[must_use]
    pub const fn is_perishable(&self) -> bool {
        self.perishable
    }

    /// Whether `x` was applied.
    #[must_use]
    pub const fn is_xattr_only(&self) -> bool {
        self.xattr_only
    }

    /// Whether `e` was applied.
    #[must_use]
    pub const fn is_exclude_only(&self) -> bool {
        self.exclude_only
    }

    /// Whether `n` was applied.
    #[must_use]
    pub const fn is_no_inherit(&self) -> bool {
        self.no_inherit
    }

    /// Whether this rule is consulted on the sending side.
    #[must_use]
    pub const fn applies_to_sender(&self) -> bool {
        self.sender
    }

    /// Whether this rule is consulted on the receiving side.
    #[must_use]
    pub const fn applies_to_receiver(&self) -> bool {
        self.receiver
    }
}
