//! Maven version ordering and range evaluation.
//!
//! The comparison follows the `ComparableVersion` contract: versions are
//! tokenized on `.`/`-` and on digit/letter boundaries, numeric tokens
//! compare numerically and well-known pre-release qualifiers rank below the
//! plain release (`alpha < beta < milestone < rc < snapshot < "" < sp`).

use std::cmp::Ordering;

#[derive(Debug, Clone, PartialEq, Eq)]
enum VersionToken {
    Num(u64),
    Qualifier(String),
}

fn normalize_qualifier(raw: &str) -> String {
    match raw.to_ascii_lowercase().as_str() {
        "a" => "alpha".to_string(),
        "b" => "beta".to_string(),
        "m" => "milestone".to_string(),
        "cr" => "rc".to_string(),
        "ga" | "final" | "release" => "".to_string(),
        other => other.to_string(),
    }
}

fn qualifier_rank(q: &str) -> (i32, String) {
    let normalized = normalize_qualifier(q);
    let rank = match normalized.as_str() {
        "alpha" => 1,
        "beta" => 2,
        "milestone" => 3,
        "rc" => 4,
        "snapshot" => 5,
        "" => 6,
        "sp" => 7,
        _ => 8,
    };
    (rank, normalized)
}

fn flush_token(current: &mut String, is_digit: Option<bool>, tokens: &mut Vec<VersionToken>) {
    if current.is_empty() {
        return;
    }
    tokens.push(if is_digit.unwrap_or(false) {
        VersionToken::Num(current.parse().unwrap_or(0))
    } else {
        VersionToken::Qualifier(current.to_ascii_lowercase())
    });
    current.clear();
}

fn tokenize_version(input: &str) -> Vec<VersionToken> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut current_is_digit: Option<bool> = None;

    for ch in input.trim().chars() {
        if ch == '.' || ch == '-' {
            flush_token(&mut current, current_is_digit, &mut tokens);
            current_is_digit = None;
            continue;
        }

        let is_digit = ch.is_ascii_digit();
        match current_is_digit {
            Some(flag) if flag != is_digit => {
                flush_token(&mut current, current_is_digit, &mut tokens);
                current_is_digit = Some(is_digit);
                current.push(ch);
            }
            _ => {
                current_is_digit = Some(is_digit);
                current.push(ch);
            }
        }
    }
    flush_token(&mut current, current_is_digit, &mut tokens);

    tokens
}

/// How a token compares against a missing counterpart. Numbers compare to
/// zero; qualifiers compare to the empty (release) qualifier, which is what
/// places `1.1-sp1` above `1.1` and `1.1-alpha` below it.
fn compare_to_null(token: &VersionToken) -> Ordering {
    match token {
        VersionToken::Num(value) => value.cmp(&0),
        VersionToken::Qualifier(q) => {
            let (rank, name) = qualifier_rank(q);
            let (null_rank, null_name) = qualifier_rank("");
            rank.cmp(&null_rank).then(name.cmp(&null_name))
        }
    }
}

/// Total order over Maven version strings. An empty string sorts below every
/// concrete version.
pub fn compare_versions(lhs: &str, rhs: &str) -> Ordering {
    match (lhs.trim().is_empty(), rhs.trim().is_empty()) {
        (true, true) => return Ordering::Equal,
        (true, false) => return Ordering::Less,
        (false, true) => return Ordering::Greater,
        (false, false) => {}
    }

    let left = tokenize_version(lhs);
    let right = tokenize_version(rhs);
    let max_len = left.len().max(right.len());

    for idx in 0..max_len {
        let cmp = match (left.get(idx), right.get(idx)) {
            (Some(l), None) => compare_to_null(l),
            (None, Some(r)) => compare_to_null(r).reverse(),
            (None, None) => Ordering::Equal,
            (Some(VersionToken::Num(a)), Some(VersionToken::Num(b))) => a.cmp(b),
            (Some(VersionToken::Num(_)), Some(VersionToken::Qualifier(_))) => Ordering::Greater,
            (Some(VersionToken::Qualifier(_)), Some(VersionToken::Num(_))) => Ordering::Less,
            (Some(VersionToken::Qualifier(a)), Some(VersionToken::Qualifier(b))) => {
                let (rank_a, name_a) = qualifier_rank(a);
                let (rank_b, name_b) = qualifier_rank(b);
                rank_a.cmp(&rank_b).then(name_a.cmp(&name_b))
            }
        };
        if cmp != Ordering::Equal {
            return cmp;
        }
    }

    Ordering::Equal
}

/// Strict `lhs > rhs` under the Maven order.
pub fn is_higher_than(lhs: &str, rhs: &str) -> bool {
    compare_versions(lhs, rhs) == Ordering::Greater
}

/// Whether the string uses Maven's bracket range notation.
pub fn is_version_range(spec: &str) -> bool {
    let trimmed = spec.trim();
    trimmed.starts_with(['[', '(']) || trimmed.ends_with([']', ')'])
}

/// A version that must be pinned through a metadata lookup before the POM can
/// be fetched: empty, `LATEST`, `RELEASE`, or a bracket range.
pub fn is_floating_version(spec: &str) -> bool {
    let trimmed = spec.trim();
    trimmed.is_empty()
        || trimmed.eq_ignore_ascii_case("LATEST")
        || trimmed.eq_ignore_ascii_case("RELEASE")
        || is_version_range(trimmed)
}

fn split_range_intervals(range: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut start = 0usize;
    let bytes = range.as_bytes();
    let len = bytes.len();
    let mut i = 0usize;
    while i < len.saturating_sub(2) {
        let current = bytes[i];
        let next = bytes[i + 1];
        let after = bytes[i + 2];
        let is_separator =
            (current == b']' || current == b')') && next == b',' && (after == b'[' || after == b'(');
        if is_separator {
            parts.push(range[start..=i].trim().to_string());
            start = i + 1;
        }
        i += 1;
    }
    if start < len {
        parts.push(range[start..].trim().to_string());
    }
    parts
}

/// Maven bracket-range evaluation. Supports `[1.0,2.0)`, open bounds such as
/// `(,1.0]`, single-version pins `[1.0]`, and interval unions
/// `(,1.0],[1.2,)`.
pub fn range_contains(range: &str, version: &str) -> bool {
    let intervals = split_range_intervals(range);
    if intervals.is_empty() {
        return false;
    }

    for interval in intervals {
        let trimmed = interval.trim();
        if trimmed.is_empty() {
            continue;
        }

        // Bare version inside a union behaves like an exact pin.
        if !trimmed.starts_with(['[', '(']) || !trimmed.ends_with([']', ')']) {
            if compare_versions(version, trimmed) == Ordering::Equal {
                return true;
            }
            continue;
        }

        if trimmed.len() < 2 {
            continue;
        }

        let lower_inclusive = trimmed.starts_with('[');
        let upper_inclusive = trimmed.ends_with(']');
        let body = &trimmed[1..trimmed.len() - 1];
        let (lower_raw, upper_raw) = match body.split_once(',') {
            Some((lhs, rhs)) => (lhs.trim(), rhs.trim()),
            None => (body.trim(), body.trim()),
        };

        let lower = (!lower_raw.is_empty()).then_some(lower_raw);
        let upper = (!upper_raw.is_empty()).then_some(upper_raw);

        if let Some(bound) = lower {
            let cmp = compare_versions(version, bound);
            if cmp == Ordering::Less || (cmp == Ordering::Equal && !lower_inclusive) {
                continue;
            }
        }

        if let Some(bound) = upper {
            let cmp = compare_versions(version, bound);
            if cmp == Ordering::Greater || (cmp == Ordering::Equal && !upper_inclusive) {
                continue;
            }
        }

        return true;
    }

    false
}
