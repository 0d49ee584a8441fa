//! Fuzzy narrowing of field candidates for lookup errors.
//!
//! Fuzzy matching never resolves a field on its own; it only shrinks the
//! alternatives listed in a [`NotFoundError`](crate::error::NotFoundError)
//! to the ones closest to what the user typed.

use nucleo_matcher::{Config, Matcher, Utf32Str};

use crate::schema::FieldSchema;

/// Thresholds for the fuzzy passes. Scores are normalized against the
/// needle's self-match score, so both values are ratios in `0..=1`.
#[derive(Debug, Clone, Copy)]
pub struct FuzzyConfig {
    /// Minimum normalized score for the token-set pass.
    pub token_set_threshold: f32,
    /// Minimum normalized score for the partial fallback pass.
    pub partial_threshold: f32,
}

impl Default for FuzzyConfig {
    fn default() -> Self {
        Self {
            token_set_threshold: 0.70,
            partial_threshold: 0.50,
        }
    }
}

/// Narrow `schemas` to fuzzy matches for `search`.
///
/// Two phases. First, a schema matches when `search` is a case-insensitive
/// substring of its `name_base` or `title`, or when the token-set forms of
/// the two strings score above `token_set_threshold`. Only when that phase
/// matches nothing does a looser pass run: a raw score against each key
/// above `partial_threshold`, restricted to root fields. Synthesized `all`
/// fields, `_details` twins and non-selectable schemas never match.
/// Candidates keep catalog order.
pub fn fuzzy_filter<'a>(
    search: &str,
    schemas: &'a [FieldSchema],
    config: &FuzzyConfig,
) -> Vec<&'a FieldSchema> {
    let needle = search.trim().to_lowercase();
    if needle.is_empty() {
        return Vec::new();
    }
    let needle_tokens = token_key(&needle);
    let mut matcher = Matcher::new(Config::DEFAULT);

    let mut matches: Vec<&FieldSchema> = Vec::new();
    for schema in schemas.iter().filter(|s| eligible(s)) {
        let hit = keys(schema).iter().any(|key| {
            if key.to_lowercase().contains(&needle) {
                return true;
            }
            normalized_score(&mut matcher, &token_key(key), &needle_tokens)
                .is_some_and(|score| score >= config.token_set_threshold)
        });
        if hit {
            matches.push(schema);
        }
    }
    if !matches.is_empty() {
        log::debug!(
            "fuzzy token-set pass matched {} candidates for {search:?}",
            matches.len()
        );
        return matches;
    }

    for schema in schemas.iter().filter(|s| eligible(s) && s.is_root) {
        let hit = keys(schema).iter().any(|key| {
            normalized_score(&mut matcher, &key.to_lowercase(), &needle)
                .is_some_and(|score| score >= config.partial_threshold)
        });
        if hit {
            matches.push(schema);
        }
    }
    log::debug!(
        "fuzzy partial pass matched {} candidates for {search:?}",
        matches.len()
    );
    matches
}

fn eligible(schema: &FieldSchema) -> bool {
    schema.selectable && !schema.is_all && !schema.is_details
}

fn keys(schema: &FieldSchema) -> [&str; 2] {
    [&schema.name_base, &schema.title]
}

/// Match score divided by the needle's score against itself, capped at 1.
fn normalized_score(matcher: &mut Matcher, haystack: &str, needle: &str) -> Option<f32> {
    let mut haystack_buf = Vec::new();
    let mut needle_buf = Vec::new();
    let score = matcher.fuzzy_match(
        Utf32Str::new(haystack, &mut haystack_buf),
        Utf32Str::new(needle, &mut needle_buf),
    )? as f32;

    let mut self_haystack_buf = Vec::new();
    let mut self_needle_buf = Vec::new();
    let self_score = matcher.fuzzy_match(
        Utf32Str::new(needle, &mut self_haystack_buf),
        Utf32Str::new(needle, &mut self_needle_buf),
    )? as f32;
    if self_score <= 0.0 {
        return None;
    }
    Some((score / self_score).min(1.0))
}

/// Canonical token form: lowercased tokens, sorted, deduplicated, space
/// joined. Makes case, word order and separators irrelevant.
fn token_key(value: &str) -> String {
    let mut tokens: Vec<String> = value
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect();
    tokens.sort_unstable();
    tokens.dedup();
    tokens.join(" ")
}
