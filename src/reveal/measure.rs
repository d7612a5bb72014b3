use super::markup::{scan_tags, TagKind};
use unicode_width::UnicodeWidthChar;

const LINE_BREAK_TAGS: &[&str] = &["p", "div", "li"];

/// Named style profiles used by the resizing window shell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileId {
    HeaderMessage,
    WelcomeMessage,
}

impl ProfileId {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "header_message" | "header-message" | "header" => Some(Self::HeaderMessage),
            "welcome_message" | "welcome-message" | "welcome" => Some(Self::WelcomeMessage),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::HeaderMessage => "header_message",
            Self::WelcomeMessage => "welcome_message",
        }
    }

    pub fn profile(self) -> StyleProfile {
        match self {
            Self::HeaderMessage => StyleProfile::header_message(),
            Self::WelcomeMessage => StyleProfile::welcome_message(),
        }
    }
}

/// Typography and box constraints, all in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StyleProfile {
    pub font_size: f32,
    /// Multiplier of `font_size`.
    pub line_height: f32,
    /// Average advance of a single-column glyph as a fraction of `font_size`.
    pub glyph_width_ratio: f32,
    pub padding_x: f32,
    pub padding_y: f32,
    pub min_width: f32,
    pub max_width: f32,
}

impl StyleProfile {
    pub fn header_message() -> Self {
        Self {
            font_size: 14.0,
            line_height: 1.4,
            glyph_width_ratio: 0.55,
            padding_x: 16.0,
            padding_y: 10.0,
            min_width: 160.0,
            max_width: 420.0,
        }
    }

    pub fn welcome_message() -> Self {
        Self {
            font_size: 20.0,
            line_height: 1.5,
            glyph_width_ratio: 0.55,
            padding_x: 28.0,
            padding_y: 20.0,
            min_width: 280.0,
            max_width: 720.0,
        }
    }

    fn column_width(&self) -> f32 {
        self.font_size * self.glyph_width_ratio
    }

    /// `(min, max)` with NaN treated as zero and `max >= min`.
    fn width_bounds(&self) -> (f32, f32) {
        let min = self.min_width.max(0.0);
        (min, self.max_width.max(min))
    }

    fn max_columns(&self) -> usize {
        let available = (self.max_width - 2.0 * self.padding_x).max(0.0);
        ((available / self.column_width()).floor() as usize).max(1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderSize {
    pub width: u32,
    pub height: u32,
}

/// Bounding box `html_content` occupies when laid out with `profile`.
///
/// Layout is a deterministic approximation: markup is stripped, block and
/// `<br>` tags break lines, words wrap greedily on display columns.
pub fn measure_render_size(html_content: &str, profile: &StyleProfile) -> RenderSize {
    let max_columns = profile.max_columns();
    let mut lines: Vec<usize> = Vec::new();
    for paragraph in text_paragraphs(html_content) {
        lines.extend(wrap_columns(&paragraph, max_columns));
    }
    if lines.is_empty() {
        lines.push(0);
    }

    let widest = lines.iter().copied().max().unwrap_or(0) as f32;
    let (min_width, max_width) = profile.width_bounds();
    let width = (widest * profile.column_width() + 2.0 * profile.padding_x)
        .clamp(min_width, max_width);
    let height = lines.len() as f32 * profile.font_size * profile.line_height
        + 2.0 * profile.padding_y;

    RenderSize {
        width: width.ceil() as u32,
        height: height.ceil() as u32,
    }
}

/// Plain text split at hard line breaks.
fn text_paragraphs(html: &str) -> Vec<String> {
    let tags = scan_tags(html);
    let mut paragraphs = vec![String::new()];
    let mut cursor = 0;

    for tag in &tags {
        push_text(&mut paragraphs, &html[cursor..tag.start]);
        let breaks_line = tag.name == "br"
            || (tag.kind == TagKind::Close && LINE_BREAK_TAGS.contains(&tag.name.as_str()));
        if breaks_line {
            paragraphs.push(String::new());
        }
        cursor = tag.end;
    }
    push_text(&mut paragraphs, &html[cursor..]);

    while paragraphs.len() > 1 && paragraphs.last().is_some_and(|p| p.trim().is_empty()) {
        paragraphs.pop();
    }
    paragraphs
}

fn push_text(paragraphs: &mut Vec<String>, text: &str) {
    for (index, part) in text.split('\n').enumerate() {
        if index > 0 {
            paragraphs.push(String::new());
        }
        if let Some(current) = paragraphs.last_mut() {
            current.push_str(part);
        }
    }
}

/// Greedy word wrap; returns the column width of each produced line.
/// Words wider than a line are broken by character.
fn wrap_columns(paragraph: &str, max_columns: usize) -> Vec<usize> {
    let mut lines = Vec::new();
    let mut current = 0usize;

    for word in paragraph.split_whitespace() {
        let word_width = display_width(word);
        let needed = if current == 0 { word_width } else { current + 1 + word_width };
        if needed <= max_columns {
            current = needed;
            continue;
        }
        if current > 0 {
            lines.push(current);
            current = 0;
        }
        if word_width <= max_columns {
            current = word_width;
            continue;
        }
        for ch in word.chars() {
            let ch_width = char_display_width(ch);
            if current + ch_width > max_columns && current > 0 {
                lines.push(current);
                current = 0;
            }
            current += ch_width;
        }
    }

    lines.push(current);
    lines
}

fn char_display_width(ch: char) -> usize {
    UnicodeWidthChar::width(ch).unwrap_or(0)
}

fn display_width(text: &str) -> usize {
    text.chars().map(char_display_width).sum()
}
