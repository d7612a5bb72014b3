use super::markup::{inside_tag, plain_text, scan_tags, Tag};
use aho_corasick::{AhoCorasick, MatchKind};
use std::sync::OnceLock;

pub const LOADING_PLACEHOLDER: &str = "Loading...";

const STRUCTURAL_MARKERS: &[&str] = &[
    "\n\n0", "\n\n1", "\n\n2", "\n\n3", "\n\n4", "\n\n5", "\n\n6", "\n\n7", "\n\n8", "\n\n9",
    "\n\n•", "\n\n-", "\n\n*", "•",
];

/// One snapshot of the progressive reveal sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevealVariant {
    pub sequence_index: usize,
    pub html_content: String,
}

impl RevealVariant {
    pub fn new(sequence_index: usize, html_content: impl Into<String>) -> Self {
        Self {
            sequence_index,
            html_content: html_content.into(),
        }
    }

    pub fn plain_text(&self) -> String {
        plain_text(&self.html_content)
    }
}

/// Builds the ordered reveal sequence for `full_text`.
///
/// Each variant appends one sentence (or list item) to the previous one, so
/// the plain text of variant `i` is always a prefix of variant `i + 1`. Text
/// with no detectable boundary comes back as a single unchanged variant.
pub fn build_variants(full_text: &str) -> Vec<RevealVariant> {
    if full_text.trim().is_empty() {
        return vec![RevealVariant::new(0, LOADING_PLACEHOLDER)];
    }

    let mut segments = split_sentences(full_text);
    if segments.len() == 1 && has_structural_markers(full_text) {
        segments = split_structural(full_text);
    }

    let segments: Vec<&str> = segments
        .into_iter()
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .collect();
    if segments.len() <= 1 {
        return vec![RevealVariant::new(0, full_text)];
    }

    let mut variants: Vec<RevealVariant> = Vec::with_capacity(segments.len());
    let mut cumulative = String::new();
    for (index, segment) in segments.into_iter().enumerate() {
        if index > 0 {
            cumulative.push(' ');
        }
        cumulative.push_str(segment);
        if !ends_with_period(segment) {
            cumulative.push('.');
        }
        variants.push(RevealVariant::new(index, cumulative.clone()));
    }
    variants
}

/// Splits after a period that is followed by whitespace and an uppercase
/// letter. The period stays on the left segment; the whitespace is dropped.
/// Heuristic only: "U.S. Government" splits, "Why? Because" does not.
pub fn split_sentences(text: &str) -> Vec<&str> {
    let tags = scan_tags(text);
    let chars: Vec<(usize, char)> = text.char_indices().collect();
    let mut segments = Vec::new();
    let mut segment_start = 0;
    let mut i = 0;

    while i < chars.len() {
        let (offset, ch) = chars[i];
        if ch != '.' || inside_tag(&tags, offset) {
            i += 1;
            continue;
        }

        let mut j = i + 1;
        while j < chars.len() && chars[j].1.is_whitespace() {
            j += 1;
        }
        if j > i + 1 && j < chars.len() && chars[j].1.is_uppercase() {
            segments.push(&text[segment_start..offset + 1]);
            segment_start = chars[j].0;
            i = j;
        } else {
            i += 1;
        }
    }

    segments.push(&text[segment_start..]);
    segments
}

/// Splits at the zero-width boundary before each numbered list item or
/// bullet. Markers inside tags are ignored.
pub fn split_structural(text: &str) -> Vec<&str> {
    let tags = scan_tags(text);
    let mut boundaries: Vec<usize> = structural_marker_offsets(text, &tags)
        .into_iter()
        .filter(|&offset| offset > 0)
        .collect();
    boundaries.dedup();

    let mut segments = Vec::with_capacity(boundaries.len() + 1);
    let mut start = 0;
    for boundary in boundaries {
        segments.push(&text[start..boundary]);
        start = boundary;
    }
    segments.push(&text[start..]);
    segments
}

fn has_structural_markers(text: &str) -> bool {
    let tags = scan_tags(text);
    structural_marker_offsets(text, &tags)
        .into_iter()
        .any(|offset| offset > 0)
}

fn structural_marker_offsets(text: &str, tags: &[Tag]) -> Vec<usize> {
    marker_matcher()
        .find_iter(text)
        .filter(|m| !inside_tag(tags, m.start()))
        .filter(|m| {
            let marker = &text[m.start()..m.end()];
            match marker.chars().last() {
                Some(c) if c.is_ascii_digit() => is_numbered_item(&text[m.end() - 1..]),
                _ => true,
            }
        })
        .map(|m| m.start())
        .collect()
}

/// `rest` starts at the first digit; true for `12.` style prefixes.
fn is_numbered_item(rest: &str) -> bool {
    let digits = rest.chars().take_while(char::is_ascii_digit).count();
    digits > 0 && rest[digits..].starts_with('.')
}

fn marker_matcher() -> &'static AhoCorasick {
    static MATCHER: OnceLock<AhoCorasick> = OnceLock::new();
    MATCHER.get_or_init(|| {
        AhoCorasick::builder()
            .match_kind(MatchKind::LeftmostFirst)
            .build(STRUCTURAL_MARKERS)
            .expect("structural marker patterns are valid")
    })
}

fn ends_with_period(segment: &str) -> bool {
    plain_text(segment).trim_end().ends_with('.')
}
