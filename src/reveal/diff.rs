use super::markup::{map_plain_text, plain_text, scan_tags, Tag};
use std::ops::Range;

/// A run of text that is either unchanged or new relative to the previous
/// variant. Concatenating all segment texts reproduces the newer string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffSegment {
    pub text: String,
    pub is_changed: bool,
}

impl DiffSegment {
    fn new(text: impl Into<String>, is_changed: bool) -> Self {
        Self {
            text: text.into(),
            is_changed,
        }
    }
}

/// Position-aligned character comparison of `old` against `new`.
///
/// This is not an edit-distance diff. It is only meaningful when `new`
/// extends `old` by appending, which is how reveal variants are built;
/// unrelated inputs produce a degenerate result.
pub fn diff(old: &str, new: &str) -> Vec<DiffSegment> {
    debug_assert!(
        new.starts_with(old),
        "position-aligned diff requires `new` to extend `old`"
    );

    let mut old_chars = old.chars();
    let mut segments: Vec<DiffSegment> = Vec::new();
    for ch in new.chars() {
        let is_changed = old_chars.next() != Some(ch);
        match segments.last_mut() {
            Some(last) if last.is_changed == is_changed => last.text.push(ch),
            _ => segments.push(DiffSegment::new(ch.to_string(), is_changed)),
        }
    }
    segments
}

/// Diffs the plain text of two markup strings and maps the changed runs back
/// onto `new_html`. Segment texts are slices of `new_html`; a changed run that
/// would cut through a tag pair is widened to cover the whole pair.
pub fn diff_html(old_html: &str, new_html: &str) -> Vec<DiffSegment> {
    let old_plain = plain_text(old_html);
    let tags = scan_tags(new_html);
    let mapped = map_plain_text(new_html, &tags);

    let mut changed_ranges: Vec<Range<usize>> = Vec::new();
    let mut char_pos = 0;
    for segment in diff(&old_plain, &mapped.text) {
        let len = segment.text.chars().count();
        if segment.is_changed && len > 0 {
            let start = mapped.char_ranges[char_pos].start;
            let end = mapped.char_ranges[char_pos + len - 1].end;
            changed_ranges.push(expand_to_balanced(start..end, &tags));
        }
        char_pos += len;
    }

    let mut segments = Vec::new();
    let mut cursor = 0;
    for range in merge_ranges(changed_ranges) {
        if range.start > cursor {
            segments.push(DiffSegment::new(&new_html[cursor..range.start], false));
        }
        segments.push(DiffSegment::new(&new_html[range.clone()], true));
        cursor = range.end;
    }
    if cursor < new_html.len() {
        segments.push(DiffSegment::new(&new_html[cursor..], false));
    }
    segments
}

/// Wraps every changed segment in `open`/`close` markup.
pub fn render_highlight(segments: &[DiffSegment], open: &str, close: &str) -> String {
    let mut out = String::new();
    for segment in segments {
        if segment.is_changed {
            out.push_str(open);
            out.push_str(&segment.text);
            out.push_str(close);
        } else {
            out.push_str(&segment.text);
        }
    }
    out
}

/// Grows `range` until every paired tag inside it has its partner inside too.
fn expand_to_balanced(range: Range<usize>, tags: &[Tag]) -> Range<usize> {
    let (mut start, mut end) = (range.start, range.end);
    loop {
        let mut grown = false;
        for tag in tags {
            if tag.start < start || tag.end > end {
                continue;
            }
            let Some(partner) = tag.partner.and_then(|i| tags.get(i)) else {
                continue;
            };
            if partner.start < start {
                start = partner.start;
                grown = true;
            }
            if partner.end > end {
                end = partner.end;
                grown = true;
            }
        }
        if !grown {
            return start..end;
        }
    }
}

fn merge_ranges(mut ranges: Vec<Range<usize>>) -> Vec<Range<usize>> {
    ranges.sort_by_key(|range| range.start);
    let mut merged: Vec<Range<usize>> = Vec::with_capacity(ranges.len());
    for range in ranges {
        match merged.last_mut() {
            Some(last) if range.start <= last.end => last.end = last.end.max(range.end),
            _ => merged.push(range),
        }
    }
    merged
}
