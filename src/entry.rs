//! Wizard entries: kinds, logic flags, and the bracket balancing pass.

use crate::error::WizardError;

/// What a wizard entry describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// One `field operator [value]` condition.
    Simple,
    /// A complex field; its conditions arrive as following `ComplexSub`
    /// entries.
    Complex,
    /// One sub field condition of the preceding complex entry.
    ComplexSub,
}

impl EntryKind {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "simple" => Some(EntryKind::Simple),
            "complex" => Some(EntryKind::Complex),
            "complex_sub" => Some(EntryKind::ComplexSub),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::Simple => "simple",
            EntryKind::Complex => "complex",
            EntryKind::ComplexSub => "complex_sub",
        }
    }
}

/// Logic flags parsed off an entry value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flag {
    Not,
    And,
    Or,
    LeftBracket,
    RightBracket,
}

/// One parsed line/row of a wizard document.
#[derive(Debug, Clone, PartialEq)]
pub struct WizardEntry {
    pub kind: EntryKind,
    /// Entry value with flags already stripped once parsed.
    pub value: String,
    pub flags: Vec<Flag>,
    /// Where the entry came from, for error messages.
    pub source: Option<String>,
    /// Depth weight assigned by the bracket pass; -1 opens a group.
    pub bracket_weight: i64,
}

impl WizardEntry {
    pub fn new(kind: EntryKind, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
            flags: Vec::new(),
            source: None,
            bracket_weight: 0,
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn has_flag(&self, flag: Flag) -> bool {
        self.flags.contains(&flag)
    }
}

/// Split leading `(`, `or`/`and`, `not` tokens and a trailing `)` off an
/// entry value. Word flags must be followed by whitespace so field names
/// starting with those letters stay intact.
pub fn split_flags(value: &str) -> Result<(Vec<Flag>, String), WizardError> {
    const WORDS: [(&str, Flag); 3] = [("or", Flag::Or), ("and", Flag::And), ("not", Flag::Not)];

    let mut flags = Vec::new();
    let mut rest = value.trim();
    'leading: loop {
        if let Some(after) = rest.strip_prefix('(') {
            flags.push(Flag::LeftBracket);
            rest = after.trim_start();
            continue;
        }
        for (word, flag) in WORDS {
            // A flag word ends at whitespace or end of input; anything else
            // is a field starting with those letters.
            let boundary = rest
                .get(..word.len())
                .is_some_and(|head| head.eq_ignore_ascii_case(word))
                && rest
                    .as_bytes()
                    .get(word.len())
                    .map_or(true, |b| b.is_ascii_whitespace());
            if boundary {
                flags.push(flag);
                rest = rest[word.len()..].trim_start();
                continue 'leading;
            }
        }
        break;
    }

    let mut rest = rest.trim_end();
    if let Some(before) = rest.strip_suffix(')') {
        flags.push(Flag::RightBracket);
        rest = before.trim_end();
    }

    if rest.is_empty() {
        return Err(WizardError::new(format!(
            "entry value {value:?} is empty after parsing flags"
        )));
    }
    Ok((flags, rest.to_string()))
}

/// Balance bracket flags across entries.
///
/// Opening a bracket while one is open closes the previous entry; closing
/// with nothing open self-wraps the entry; a trailing open bracket is
/// closed on the last entry. Assigns each entry its bracket weight.
pub fn normalize_brackets(entries: &mut [WizardEntry]) {
    let mut is_open = false;
    let mut tracker: i64 = 0;
    let count = entries.len();

    for idx in 0..count {
        let is_last = idx + 1 == count;

        if is_open && entries[idx].has_flag(Flag::LeftBracket) && idx > 0 {
            entries[idx - 1].flags.push(Flag::RightBracket);
        }
        if !is_open
            && entries[idx].has_flag(Flag::RightBracket)
            && !entries[idx].has_flag(Flag::LeftBracket)
        {
            entries[idx].flags.push(Flag::LeftBracket);
            entries[idx].bracket_weight = -1;
            tracker = 0;
        }
        if is_open {
            tracker += 1;
            entries[idx].bracket_weight = tracker;
        }
        if !is_open && !entries[idx].has_flag(Flag::LeftBracket) {
            entries[idx].bracket_weight = 0;
        }
        if entries[idx].has_flag(Flag::LeftBracket) {
            entries[idx].bracket_weight = -1;
            tracker = 0;
            is_open = true;
        }
        if entries[idx].has_flag(Flag::RightBracket) {
            is_open = false;
            tracker = 0;
        }
        if is_last && is_open && !entries[idx].has_flag(Flag::RightBracket) {
            entries[idx].flags.push(Flag::RightBracket);
        }
    }
}
