//! Parses rsync's `--filter` rule syntax: both the short, prefix-character
//! form (`+`, `-`, `!`, `P`, `R`, `S`, `H`, `:`, `.`) and the long, keyword
//! form (`include`, `exclude`, `clear`, `protect`, `risk`, `show`, `hide`,
//! `merge`, `dir-merge`), each with its optional single-letter modifiers.

use std::path::Path;

use crate::error::RuleParseError;
use crate::rule::{FilterAction, FilterRule};

const LONG_FORMS: &[(&str, FilterAction)] = &[
    ("include", FilterAction::Include),
    ("exclude", FilterAction::Exclude),
    ("clear", FilterAction::Clear),
    ("protect", FilterAction::Protect),
    ("risk", FilterAction::Risk),
    ("show", FilterAction::Show),
    ("hide", FilterAction::Hide),
    ("merge", FilterAction::Merge),
    ("dir-merge", FilterAction::DirMerge),
];

/// Parses `text` (one or more `\n`-separated rule lines) into a sequence of
/// [`FilterRule`]s. `label` identifies the source in error messages (a file
/// path, or any caller-chosen name for an in-memory string).
///
/// # Errors
///
/// Returns [`RuleParseError`] if a line is neither a recognised short- nor
/// long-form rule, or an action is left with an empty pattern.
pub fn parse_rules(text: &str, label: &Path) -> Result<Vec<FilterRule>, RuleParseError> {
    let label = label.display().to_string();
    let mut rules = Vec::new();

    for (offset, line) in text.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with(';') {
            continue;
        }

        let line_no = offset + 1;
        rules.extend(parse_line(trimmed, &label, line_no)?);
    }

    Ok(rules)
}

fn parse_line(line: &str, label: &str, line_no: usize) -> Result<Vec<FilterRule>, RuleParseError> {
    if let Some(rule) = try_long_form(line, label, line_no)? {
        return Ok(vec![rule]);
    }
    try_short_form(line, label, line_no)
}

fn try_long_form(line: &str, label: &str, line_no: usize) -> Result<Option<FilterRule>, RuleParseError> {
    let (token, rest) = match line.split_once(char::is_whitespace) {
        Some((token, rest)) => (token, rest.trim_start()),
        None => (line, ""),
    };

    let Some(&(_, action)) = LONG_FORMS
        .iter()
        .find(|(keyword, _)| keyword.eq_ignore_ascii_case(token))
    else {
        return Ok(None);
    };

    if action == FilterAction::Clear {
        return Ok(Some(FilterRule::clear()));
    }

    if rest.is_empty() {
        return Err(RuleParseError::new(
            label,
            format!("{action} rule is missing a pattern"),
            Some(line_no),
        ));
    }

    Ok(Some(build_rule(action, rest)))
}

fn try_short_form(line: &str, label: &str, line_no: usize) -> Result<Vec<FilterRule>, RuleParseError> {
    if line == "!" {
        return Ok(vec![FilterRule::clear()]);
    }

    let mut chars = line.char_indices();
    let Some((_, first)) = chars.next() else {
        return Err(RuleParseError::new(label, "empty filter rule", Some(line_no)));
    };

    let action = match first {
        '+' => FilterAction::Include,
        '-' => FilterAction::Exclude,
        'P' => FilterAction::Protect,
        'R' => FilterAction::Risk,
        'S' => FilterAction::Show,
        'H' => FilterAction::Hide,
        ':' => FilterAction::DirMerge,
        '.' => FilterAction::Merge,
        _ => {
            return Err(RuleParseError::new(
                label,
                format!("unrecognized filter rule: {line:?}"),
                Some(line_no),
            ));
        }
    };

    let rest = &line[first.len_utf8()..];
    let (modifiers, after_modifiers) = scan_modifiers(rest);
    let after_separator = after_modifiers
        .strip_prefix(' ')
        .or_else(|| after_modifiers.strip_prefix('_'))
        .unwrap_or(after_modifiers);
    let pattern = after_separator.trim();

    if pattern.is_empty() {
        return Err(RuleParseError::new(
            label,
            format!("{action} rule is missing a pattern"),
            Some(line_no),
        ));
    }

    if modifiers.word_split {
        Ok(pattern
            .split_whitespace()
            .map(|word| apply_modifiers(build_rule(action, word), &modifiers))
            .collect())
    } else {
        Ok(vec![apply_modifiers(build_rule(action, pattern), &modifiers)])
    }
}

#[derive(Default)]
struct Modifiers {
    negate: bool,
    perishable: bool,
    xattr_only: bool,
    exclude_only: bool,
    no_inherit: bool,
    sender: bool,
    receiver: bool,
    word_split: bool,
}

fn scan_modifiers(rest: &str) -> (Modifiers, &str) {
    let mut modifiers = Modifiers::default();
    let mut end = rest.len();

    for (i, c) in rest.char_indices() {
        match c {
            '!' => modifiers.negate = true,
            'p' => modifiers.perishable = true,
            's' => modifiers.sender = true,
            'r' => modifiers.receiver = true,
            'x' => modifiers.xattr_only = true,
            'e' => modifiers.exclude_only = true,
            'n' => modifiers.no_inherit = true,
            'w' => modifiers.word_split = true,
            _ => {
                end = i;
                break;
            }
        }
    }

    (modifiers, &rest[end..])
}

fn apply_modifiers(mut rule: FilterRule, modifiers: &Modifiers) -> FilterRule {
    rule = rule
        .with_negate(modifiers.negate)
        .with_perishable(modifiers.perishable)
        .with_xattr_only(modifiers.xattr_only)
        .with_exclude_only(modifiers.exclude_only)
        .with_no_inherit(modifiers.no_inherit);

    if modifiers.sender || modifiers.receiver {
        rule = rule.with_sides(modifiers.sender, modifiers.receiver);
    }

    rule
}

fn build_rule(action: FilterAction, pattern: &str) -> FilterRule {
    match action {
        FilterAction::Include => FilterRule::include(pattern),
        FilterAction::Exclude => FilterRule::exclude(pattern),
        FilterAction::Clear => FilterRule::clear(),
        FilterAction::Protect => FilterRule::protect(pattern),
        FilterAction::Risk => FilterRule::risk(pattern),
        FilterAction::Show => FilterRule::show(pattern),
        FilterAction::Hide => FilterRule::hide(pattern),
        FilterAction::Merge => FilterRule::merge(pattern),
        FilterAction::DirMerge => FilterRule::dir_merge(pattern),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn short_form_include_and_exclude() {
        let rules = parse_rules("+ *.txt\n- *.bak", Path::new("test")).unwrap();
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].action(), FilterAction::Include);
        assert_eq!(rules[1].action(), FilterAction::Exclude);
    }

    #[test]
    fn combined_modifiers_and_word_split() {
        let rules = parse_rules("-!pw *.o *.obj", Path::new("test")).unwrap();
        assert_eq!(rules.len(), 2);
        assert!(rules[0].is_negated());
        assert!(rules[0].is_perishable());
        assert_eq!(rules[0].pattern(), "*.o");
        assert_eq!(rules[1].pattern(), "*.obj");
    }

    #[test]
    fn long_form_is_case_insensitive() {
        let rules = parse_rules("PROTECT /important", Path::new("test")).unwrap();
        assert_eq!(rules[0].action(), FilterAction::Protect);
    }

    #[test]
    fn comments_and_blank_lines_are_skipped() {
        let rules = parse_rules("# comment\n\n- *.tmp\n; also a comment", Path::new("test")).unwrap();
        assert_eq!(rules.len(), 1);
    }

    #[test]
    fn unrecognized_line_is_an_error() {
        let err = parse_rules("bad rule", Path::new("test.rules")).unwrap_err();
        assert!(err.message.contains("unrecognized"));
        assert_eq!(err.line, Some(1));
    }

    #[test]
    fn empty_pattern_is_an_error() {
        assert!(parse_rules("+ ", Path::new("test")).is_err());
    }
}
