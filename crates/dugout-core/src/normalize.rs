// Player name canonicalization.
//
// Turns a provider's display name into a comparable stem: ASCII-folded,
// lowercase, suffix-free, nickname-expanded words separated by single spaces.

use deunicode::deunicode;
use std::hash::{Hash, Hasher};

/// Generational suffixes dropped from the end of a name.
const SUFFIXES: &[&str] = &["jr", "sr", "ii", "iii", "iv", "v"];

/// Nickname → full first name. No value may appear as a key, which keeps
/// normalization idempotent.
const NICKNAMES: &[(&str, &str)] = &[
    ("jon", "jonathan"),
    ("johnny", "john"),
    ("ben", "benjamin"),
    ("zach", "zachary"),
    ("zack", "zachary"),
    ("mike", "michael"),
    ("matt", "matthew"),
    ("nick", "nicholas"),
    ("chris", "christopher"),
    ("alex", "alexander"),
    ("will", "william"),
    ("bill", "william"),
    ("tony", "anthony"),
    ("josh", "joshua"),
    ("dan", "daniel"),
    ("danny", "daniel"),
    ("dave", "david"),
    ("jake", "jacob"),
    ("joe", "joseph"),
    ("sam", "samuel"),
    ("tom", "thomas"),
    ("tommy", "thomas"),
    ("andy", "andrew"),
    ("drew", "andrew"),
    ("rob", "robert"),
    ("bobby", "robert"),
    ("jim", "james"),
    ("jimmy", "james"),
    ("pat", "patrick"),
    ("ed", "edward"),
    ("eddie", "edward"),
    ("fred", "frederick"),
    ("greg", "gregory"),
    ("jeff", "jeffrey"),
    ("ken", "kenneth"),
    ("kenny", "kenneth"),
    ("larry", "lawrence"),
    ("steve", "steven"),
    ("tim", "timothy"),
    ("vince", "vincent"),
];

// ---------------------------------------------------------------------------
// NormalizedName
// ---------------------------------------------------------------------------

/// A raw name paired with its matching stem.
///
/// Equality and hashing consider the stem only; `original` is carried for
/// display and diagnostics.
#[derive(Debug, Clone)]
pub struct NormalizedName {
    pub stem: String,
    pub original: String,
}

impl PartialEq for NormalizedName {
    fn eq(&self, other: &Self) -> bool {
        self.stem == other.stem
    }
}

impl Eq for NormalizedName {}

impl Hash for NormalizedName {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.stem.hash(state);
    }
}

impl NormalizedName {
    fn tokens(&self) -> impl Iterator<Item = &str> {
        self.stem.split(' ').filter(|t| !t.is_empty())
    }

    /// True when the first name is a lone initial ("j smith").
    pub fn is_abbreviated(&self) -> bool {
        let mut tokens = self.tokens();
        match (tokens.next(), tokens.next()) {
            (Some(first), Some(_)) => first.len() == 1,
            _ => false,
        }
    }

    /// True when `self` is the initial-abbreviated form of `full`:
    /// same trailing tokens, and `full`'s first name starts with the initial.
    pub fn abbreviates(&self, full: &NormalizedName) -> bool {
        if !self.is_abbreviated() || full.is_abbreviated() {
            return false;
        }
        let (Some((initial, rest)), Some((first, full_rest))) =
            (self.stem.split_once(' '), full.stem.split_once(' '))
        else {
            return false;
        };
        rest == full_rest && first.len() > 1 && first.starts_with(initial)
    }
}

// ---------------------------------------------------------------------------
// Normalization
// ---------------------------------------------------------------------------

/// Normalize a raw player name. Total: input with no letters yields an empty
/// stem rather than an error.
///
/// Steps:
/// 1. Transliterate to ASCII (accents removed).
/// 2. Lowercase; drop periods and apostrophes; other non-letters become spaces.
/// 3. Fuse runs of single-letter initials ("c j" → "cj").
/// 4. Drop trailing generational suffixes (kept if it is the only token).
/// 5. Expand a nickname in the first position.
pub fn normalize(raw_name: &str) -> NormalizedName {
    let ascii = deunicode(raw_name).to_lowercase();

    let mut cleaned = String::with_capacity(ascii.len());
    for c in ascii.chars() {
        match c {
            '.' | '\'' | '`' => {}
            c if c.is_ascii_lowercase() => cleaned.push(c),
            _ => cleaned.push(' '),
        }
    }

    let tokens = fuse_initials(cleaned.split_whitespace());
    let mut tokens = strip_suffixes(tokens);

    if let Some(first) = tokens.first_mut() {
        if let Some((_, full)) = NICKNAMES.iter().find(|(nick, _)| *nick == first.as_str()) {
            *first = (*full).to_string();
        }
    }

    NormalizedName {
        stem: tokens.join(" "),
        original: raw_name.to_string(),
    }
}

fn fuse_initials<'a>(tokens: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    let mut prev_was_initial = false;
    for token in tokens {
        let is_initial = token.len() == 1;
        match out.last_mut() {
            Some(last) if is_initial && prev_was_initial => last.push_str(token),
            _ => out.push(token.to_string()),
        }
        prev_was_initial = is_initial;
    }
    out
}

fn strip_suffixes(mut tokens: Vec<String>) -> Vec<String> {
    while tokens.len() > 1 {
        match tokens.last() {
            Some(last) if SUFFIXES.contains(&last.as_str()) => {
                tokens.pop();
            }
            _ => break,
        }
    }
    tokens
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
