//! Sentence segmentation for Chinese source and English translation text

use once_cell::sync::Lazy;
use regex::Regex;

/// Marks that may end a sentence-level passage
pub const CLAUSE_FINAL_MARKS: &[char] = &['。', '！', '？', '；'];

/// Marks the candidate splitter breaks Chinese text on
pub const SENTENCE_FINAL_MARKS: &[char] = &['。', '！', '？'];

/// Closing quotes that stay attached to the sentence they close
pub const CLOSING_QUOTES: &[char] = &['」', '』', '"', '\'', '”', '’'];

/// English abbreviations that end in a period without ending a sentence
const ABBREVIATIONS: &[&str] = &["Mr.", "Mrs.", "Dr.", "etc.", "i.e.", "e.g.", "vs."];

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("static regex"));

// Terminal punctuation (plus optional closing quote), whitespace, then
// something that can start a sentence
static EN_BOUNDARY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"([.!?]["'”’]?)\s+["'“(A-Z]"#).expect("static regex"));

/// Characters in the CJK unified ideograph blocks (base and extension A)
pub fn is_cjk(c: char) -> bool {
    ('\u{4e00}'..='\u{9fff}').contains(&c) || ('\u{3400}'..='\u{4dbf}').contains(&c)
}

/// Text with every whitespace character removed, for reconstruction checks
pub fn strip_whitespace(text: &str) -> String {
    text.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Collapse whitespace runs to single spaces and trim
pub fn normalize_whitespace(text: &str) -> String {
    WHITESPACE.replace_all(text.trim(), " ").into_owned()
}

/// Why `zh` does not look like a single sentence, if it doesn't.
///
/// A single sentence ends with exactly one clause-final mark (closing quotes
/// after it allowed) and has no other clause-final mark before the end.
pub fn single_sentence_problem(zh: &str) -> Option<String> {
    let trimmed = zh.trim();
    if trimmed.is_empty() {
        return Some("empty source text".to_string());
    }

    let body = trimmed.trim_end_matches(CLOSING_QUOTES);
    let mut chars = body.chars();
    match chars.next_back() {
        Some(last) if CLAUSE_FINAL_MARKS.contains(&last) => {}
        _ => return Some("does not end with a clause-final mark (。！？；)".to_string()),
    }

    let internal = chars.filter(|c| CLAUSE_FINAL_MARKS.contains(c)).count();
    if internal > 0 {
        return Some(format!(
            "contains {} clause-final mark(s) before the end; possibly a run-on paragraph",
            internal
        ));
    }
    None
}

/// Split Chinese text after each `。！？`, keeping trailing closing quotes
/// with the sentence they close
pub fn split_zh_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        current.push(c);
        if SENTENCE_FINAL_MARKS.contains(&c) {
            while let Some(&q) = chars.peek() {
                if !CLOSING_QUOTES.contains(&q) {
                    break;
                }
                current.push(q);
                chars.next();
            }
            push_trimmed(&mut sentences, &current);
            current.clear();
        }
    }
    push_trimmed(&mut sentences, &current);
    sentences
}

fn push_trimmed(out: &mut Vec<String>, s: &str) {
    let s = s.trim();
    if !s.is_empty() {
        out.push(s.to_string());
    }
}

fn ends_with_abbreviation(prefix: &str) -> bool {
    ABBREVIATIONS.iter().any(|abbr| {
        prefix.ends_with(abbr)
            && prefix[..prefix.len() - abbr.len()]
                .chars()
                .next_back()
                .map_or(true, |c| !c.is_alphanumeric())
    })
}

/// Split English text into sentences.
///
/// Whitespace is normalized first. A boundary is terminal punctuation
/// (optionally followed by a closing quote), whitespace, and an upper-case
/// letter, quote or opening parenthesis. Common abbreviations do not split.
pub fn split_en_sentences(text: &str) -> Vec<String> {
    let normalized = normalize_whitespace(text);
    if normalized.is_empty() {
        return Vec::new();
    }

    let mut sentences = Vec::new();
    let mut start = 0;
    for caps in EN_BOUNDARY.captures_iter(&normalized) {
        let Some(terminal) = caps.get(1) else {
            continue;
        };
        let end = terminal.end();
        if end <= start || ends_with_abbreviation(&normalized[start..end]) {
            continue;
        }
        push_trimmed(&mut sentences, &normalized[start..end]);
        start = end;
    }
    push_trimmed(&mut sentences, &normalized[start..]);
    sentences
}
