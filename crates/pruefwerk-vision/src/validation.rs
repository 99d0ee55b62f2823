// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Validation engine: character-count and pattern checks over the recognized
// tokens of one image. Live and batch inspection both go through `evaluate`.

use pruefwerk_core::{ValidationRule, ValidationVerdict};
use tracing::debug;

/// Letters and digits in `tokens`, ignoring lone letters.
///
/// Tokens are joined with single spaces and re-split on whitespace, so a
/// token containing spaces counts as several words. Words made of a single
/// alphabetic character are recognition noise and dropped.
pub fn detected_count(tokens: &[String]) -> usize {
    let joined = tokens.join(" ");
    joined
        .split_whitespace()
        .filter(|word| !is_lone_letter(word))
        .flat_map(str::chars)
        .filter(|c| c.is_alphanumeric())
        .count()
}

fn is_lone_letter(word: &str) -> bool {
    let mut chars = word.chars();
    matches!((chars.next(), chars.next()), (Some(c), None) if c.is_alphabetic())
}

/// Judge one image's tokens against `rule`.
///
/// The count passes when no count is expected or at least that many
/// characters were found. The pattern is searched (not fully matched) in the
/// space-joined raw tokens.
pub fn evaluate(tokens: &[String], rule: &ValidationRule) -> ValidationVerdict {
    let detected = detected_count(tokens);
    let expected = rule.expected_char_count();
    let count_ok = expected.is_none_or(|n| detected >= n as usize);

    let regex_matched = rule.pattern().map(|re| re.is_match(&tokens.join(" ")));
    let regex_ok = regex_matched.unwrap_or(true);

    let verdict = ValidationVerdict {
        detected_count: detected,
        expected_count: expected,
        regex_matched,
        passed: count_ok && regex_ok,
    };
    debug!(
        detected,
        ?expected,
        ?regex_matched,
        passed = verdict.passed,
        "Validation evaluated"
    );
    verdict
}
