//! Include/exclude/protect filter rules: parsing, glob compilation, and the
//! first-match-wins decisions Sender and Receiver each consult.
//!
//! [`parse_rules`] and [`merge::read_rules`] turn rule text into
//! [`FilterRule`] values; [`FilterSet`] compiles a rule list into the
//! matcher both sides query via [`FilterSet::allows`] (what gets
//! transferred) and [`FilterSet::allows_deletion`] (what a `--delete` sweep
//! may remove). `dir-merge` rules are parsed but left for the caller to
//! resolve while walking, since their effect is scoped to one directory.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod error;
pub mod merge;
mod parse;
mod pattern;
mod rule;
mod set;

pub use error::{FilterError, RuleParseError};
pub use merge::{cvs_default_patterns, cvs_exclusion_rules, read_rules, read_rules_recursive};
pub use parse::parse_rules;
pub use rule::{FilterAction, FilterRule};
pub use set::FilterSet;
