use std::ops::Range;

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagKind {
    Open,
    Close,
    /// Void elements, `<x/>`, comments and doctypes. These never pair.
    Standalone,
}

/// One `<...>` token in a markup string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    pub start: usize,
    pub end: usize,
    pub name: String,
    pub kind: TagKind,
    /// Index of the matching open/close tag, if any.
    pub partner: Option<usize>,
}

impl Tag {
    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }
}

/// Scans `html` for tags and pairs each close tag with its nearest open tag
/// of the same name. A `<` not followed by a letter, `/` or `!` is text.
pub fn scan_tags(html: &str) -> Vec<Tag> {
    let bytes = html.as_bytes();
    let mut tags = Vec::new();
    let mut open_stack: Vec<usize> = Vec::new();
    let mut pos = 0;

    while let Some(offset) = html[pos..].find('<') {
        let start = pos + offset;
        let opens_tag = bytes
            .get(start + 1)
            .is_some_and(|b| b.is_ascii_alphabetic() || *b == b'/' || *b == b'!');
        if !opens_tag {
            pos = start + 1;
            continue;
        }
        let Some(close_offset) = html[start..].find('>') else {
            break;
        };
        let end = start + close_offset + 1;
        let inner = &html[start + 1..end - 1];

        let (kind, name) = if let Some(rest) = inner.strip_prefix('/') {
            (TagKind::Close, tag_name(rest))
        } else if inner.starts_with('!') || inner.ends_with('/') {
            (TagKind::Standalone, tag_name(inner))
        } else {
            let name = tag_name(inner);
            if VOID_ELEMENTS.contains(&name.as_str()) {
                (TagKind::Standalone, name)
            } else {
                (TagKind::Open, name)
            }
        };

        let index = tags.len();
        let mut partner = None;
        match kind {
            TagKind::Open => open_stack.push(index),
            TagKind::Close => {
                let matching = open_stack
                    .iter()
                    .rposition(|&i| tags_name_eq(&tags, i, &name));
                if let Some(stack_pos) = matching {
                    let open_index = open_stack[stack_pos];
                    // Unclosed tags nested inside stay unpaired.
                    open_stack.truncate(stack_pos);
                    partner = Some(open_index);
                    if let Some(open) = tags.get_mut(open_index) {
                        open.partner = Some(index);
                    }
                }
            }
            TagKind::Standalone => {}
        }

        tags.push(Tag {
            start,
            end,
            name,
            kind,
            partner,
        });
        pos = end;
    }

    tags
}

fn tags_name_eq(tags: &[Tag], index: usize, name: &str) -> bool {
    tags.get(index).is_some_and(|tag| tag.name == name)
}

fn tag_name(inner: &str) -> String {
    inner
        .trim_start()
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '-')
        .collect::<String>()
        .to_ascii_lowercase()
}

/// Plain text of a markup string plus, for every plain char, the byte range
/// it occupies in the markup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlainTextMap {
    pub text: String,
    pub char_ranges: Vec<Range<usize>>,
}

pub fn map_plain_text(html: &str, tags: &[Tag]) -> PlainTextMap {
    let mut map = PlainTextMap::default();
    let mut tag_iter = tags.iter().peekable();

    for (index, ch) in html.char_indices() {
        while tag_iter.peek().is_some_and(|tag| tag.end <= index) {
            tag_iter.next();
        }
        if tag_iter
            .peek()
            .is_some_and(|tag| tag.start <= index && index < tag.end)
        {
            continue;
        }
        map.text.push(ch);
        map.char_ranges.push(index..index + ch.len_utf8());
    }

    map
}

pub fn plain_text(html: &str) -> String {
    map_plain_text(html, &scan_tags(html)).text
}

/// True when `offset` falls strictly inside a tag token.
pub fn inside_tag(tags: &[Tag], offset: usize) -> bool {
    tags.iter().any(|tag| tag.start < offset && offset < tag.end)
}
