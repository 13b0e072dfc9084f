//! Item format grammar.
//!
//! A format reads `<hashed>+<output>`, each half a string of single-letter field codes
//! (`f` feed name, `a` author, `d` description, `g` guid, `l` link, `p` published,
//! `s` summary, `t` title). The hashed half decides item identity, the output half decides
//! what an announcement shows.

use std::collections::HashSet;
use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

use crate::models::{FeedItem, Field, FieldSet, Fingerprint};

pub const SEPARATOR: char = '+';

/// IRC bold toggle.
const BOLD: char = '\u{2}';

static LINK_REFERENCE: OnceLock<Regex> = OnceLock::new();
static LINK_FOOTNOTE: OnceLock<Regex> = OnceLock::new();

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FormatError {
    #[error("expected exactly one \"+\" separator, found {0}")]
    SeparatorCount(usize),
    #[error("no fields to hash")]
    EmptyHashed,
    #[error("no fields to output")]
    EmptyOutput,
    #[error("hashing only the feed name cannot tell items apart")]
    HashedOnlyFeedName,
    #[error("showing only the feed name says nothing about the item")]
    OutputOnlyFeedName,
    #[error("unknown field \"{0}\"")]
    UnknownField(char),
    #[error("field \"{0}\" is not provided by this feed")]
    UnavailableField(Field),
    #[error("field \"{0}\" is hashed more than once")]
    DuplicateHashed(Field),
    #[error("field \"{0}\" is shown more than once")]
    DuplicateOutput(Field),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatSpec {
    hashed: Vec<Field>,
    output: Vec<Field>,
}

impl FormatSpec {
    /// Parses and validates `raw` against the fields a feed provides.
    pub fn parse(raw: &str, available: &FieldSet) -> Result<Self, FormatError> {
        let separators = raw.matches(SEPARATOR).count();
        if separators != 1 {
            return Err(FormatError::SeparatorCount(separators));
        }
        let (hashed, output) = raw
            .split_once(SEPARATOR)
            .ok_or(FormatError::SeparatorCount(0))?;

        if hashed.is_empty() {
            return Err(FormatError::EmptyHashed);
        }
        if output.is_empty() {
            return Err(FormatError::EmptyOutput);
        }
        if hashed == "f" {
            return Err(FormatError::HashedOnlyFeedName);
        }
        if output == "f" {
            return Err(FormatError::OutputOnlyFeedName);
        }

        let hashed = to_fields(hashed, available)?;
        let output = to_fields(output, available)?;

        if let Some(field) = first_duplicate(&hashed) {
            return Err(FormatError::DuplicateHashed(field));
        }
        if let Some(field) = first_duplicate(&output) {
            return Err(FormatError::DuplicateOutput(field));
        }

        Ok(Self { hashed, output })
    }

    /// Like [`FormatSpec::parse`], but an invalid format is logged and replaced by the default.
    pub fn parse_or_default(feed_name: &str, raw: &str, available: &FieldSet) -> Self {
        match Self::parse(raw, available) {
            Ok(spec) => spec,
            Err(e) => {
                let fallback = Self::default_for(available);
                tracing::warn!(
                    "format \"{}\" of feed \"{}\" is invalid ({}), using \"{}\"",
                    raw,
                    feed_name,
                    e,
                    fallback
                );
                fallback
            }
        }
    }

    /// Minimal valid format: feed name and title (or description) hashed, plus the link
    /// when the feed has one.
    pub fn default_for(available: &FieldSet) -> Self {
        let text = if available.contains(Field::Title) {
            Field::Title
        } else {
            Field::Description
        };
        let mut output = vec![Field::FeedName, text];
        if available.contains(Field::Link) {
            output.push(Field::Link);
        }
        Self {
            hashed: vec![Field::FeedName, text],
            output,
        }
    }

    pub fn is_default_for(&self, available: &FieldSet) -> bool {
        *self == Self::default_for(available)
    }

    pub fn hashed(&self) -> &[Field] {
        &self.hashed
    }

    pub fn output(&self) -> &[Field] {
        &self.output
    }

    pub fn fingerprint(&self, feed_name: &str, item: &FeedItem) -> Fingerprint {
        let values: Vec<String> = self
            .hashed
            .iter()
            .map(|&field| match field {
                Field::FeedName => feed_name.to_string(),
                _ => item.value(field).unwrap_or_default(),
            })
            .collect();
        Fingerprint::compute(feed_name, values.iter().map(String::as_str))
    }

    pub fn format_line(&self, feed_name: &str, item: &FeedItem) -> String {
        let parts: Vec<String> = self
            .output
            .iter()
            .map(|&field| match field {
                Field::FeedName => format!("{BOLD}[{feed_name}]{BOLD}"),
                Field::Link => format!(
                    "{BOLD}→{BOLD} {}",
                    item.link.as_deref().unwrap_or_default().trim()
                ),
                Field::Summary | Field::Description => {
                    format!("| {}", plain_text(&item.value(field).unwrap_or_default()))
                }
                _ => format!("| {}", one_line(&item.value(field).unwrap_or_default())),
            })
            .collect();
        parts.join(" ").trim_end().to_string()
    }
}

impl fmt::Display for FormatSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for field in &self.hashed {
            write!(f, "{}", field.code())?;
        }
        write!(f, "{SEPARATOR}")?;
        for field in &self.output {
            write!(f, "{}", field.code())?;
        }
        Ok(())
    }
}

fn to_fields(codes: &str, available: &FieldSet) -> Result<Vec<Field>, FormatError> {
    codes
        .chars()
        .map(|code| {
            let field = Field::from_code(code).ok_or(FormatError::UnknownField(code))?;
            if available.contains(field) {
                Ok(field)
            } else {
                Err(FormatError::UnavailableField(field))
            }
        })
        .collect()
}

fn first_duplicate(fields: &[Field]) -> Option<Field> {
    let mut seen = HashSet::new();
    fields.iter().copied().find(|&f| !seen.insert(f))
}

fn one_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Renders HTML as a single line of plain text, dropping link footnotes.
fn plain_text(html: &str) -> String {
    let text = match html2text::from_read(html.as_bytes(), 1000) {
        Ok(text) => text,
        Err(e) => {
            tracing::debug!("Failed to convert HTML to text: {}", e);
            return one_line(html);
        }
    };
    let footnote = LINK_FOOTNOTE
        .get_or_init(|| Regex::new(r"(?m)^\[\d+\]: \S*$").expect("footnote pattern is valid"));
    let reference = LINK_REFERENCE
        .get_or_init(|| Regex::new(r"\[([^\]]*)\]\[\d+\]").expect("reference pattern is valid"));
    let text = footnote.replace_all(&text, "");
    let text = reference.replace_all(&text, "$1");
    one_line(&text)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adglpst() -> FieldSet {
        FieldSet::from_codes("adglpst").unwrap()
    }

    fn item(title: &str, link: &str) -> FeedItem {
        FeedItem {
            title: Some(title.to_string()),
            link: Some(link.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn parses_valid_format() {
        let spec = FormatSpec::parse("fl+ftl", &adglpst()).unwrap();
        assert_eq!(spec.hashed(), &[Field::FeedName, Field::Link]);
        assert_eq!(spec.output(), &[Field::FeedName, Field::Title, Field::Link]);
        assert_eq!(spec.to_string(), "fl+ftl");
    }

    #[test]
    fn cross_half_repetition_is_allowed() {
        assert!(FormatSpec::parse("t+t", &adglpst()).is_ok());
    }

    #[test]
    fn rejects_each_rule() {
        let fields = adglpst();
        let cases = [
            ("ftl", FormatError::SeparatorCount(0)),
            ("ft+ft+l", FormatError::SeparatorCount(2)),
            ("+ftl", FormatError::EmptyHashed),
            ("ft+", FormatError::EmptyOutput),
            ("f+ftl", FormatError::HashedOnlyFeedName),
            ("ft+f", FormatError::OutputOnlyFeedName),
            ("fx+ftl", FormatError::UnknownField('x')),
            ("ll+t", FormatError::DuplicateHashed(Field::Link)),
            ("ft+tlt", FormatError::DuplicateOutput(Field::Title)),
        ];
        for (raw, expected) in cases {
            assert_eq!(FormatSpec::parse(raw, &fields), Err(expected), "{raw}");
        }
    }

    #[test]
    fn rejects_fields_the_feed_does_not_provide() {
        let fields = FieldSet::from_codes("tl").unwrap();
        assert_eq!(
            FormatSpec::parse("fa+ftl", &fields),
            Err(FormatError::UnavailableField(Field::Author))
        );
    }

    #[test]
    fn duplicate_hashed_link_falls_back_to_default() {
        let spec = FormatSpec::parse_or_default("news", "ll+t", &adglpst());
        assert_eq!(spec.to_string(), "ft+ftl");
    }

    #[test]
    fn default_prefers_title_then_description() {
        assert_eq!(FormatSpec::default_for(&adglpst()).to_string(), "ft+ftl");
        let no_title = FieldSet::from_codes("dl").unwrap();
        assert_eq!(FormatSpec::default_for(&no_title).to_string(), "fd+fdl");
        let no_link = FieldSet::from_codes("t").unwrap();
        assert_eq!(FormatSpec::default_for(&no_link).to_string(), "ft+ft");
    }

    #[test]
    fn default_always_passes_validation() {
        for codes in ["t", "d", "tl", "dl", "td", "adglpst", "gpd"] {
            let fields = FieldSet::from_codes(codes).unwrap();
            let spec = FormatSpec::default_for(&fields);
            assert_eq!(FormatSpec::parse(&spec.to_string(), &fields), Ok(spec));
        }
    }

    #[test]
    fn fingerprint_uses_hashed_fields_only() {
        let spec = FormatSpec::parse("ft+ftl", &adglpst()).unwrap();
        let a = spec.fingerprint("news", &item("Title 1", "https://example.com/a"));
        let b = spec.fingerprint("news", &item("Title 1", "https://example.com/b"));
        assert_eq!(a, b);

        let c = spec.fingerprint("news", &item("Title 2", "https://example.com/a"));
        assert_ne!(a, c);
    }

    #[test]
    fn fingerprint_differs_between_feeds() {
        let spec = FormatSpec::parse("tl+ftl", &adglpst()).unwrap();
        let entry = item("Title 1", "https://example.com/1");
        assert_ne!(spec.fingerprint("news", &entry), spec.fingerprint("blog", &entry));
    }

    #[test]
    fn missing_hashed_field_counts_as_empty() {
        let spec = FormatSpec::parse("fta+ft", &adglpst()).unwrap();
        let without = item("Title 1", "https://example.com/1");
        let mut with_empty = without.clone();
        with_empty.author = Some(String::new());
        assert_eq!(
            spec.fingerprint("news", &without),
            spec.fingerprint("news", &with_empty)
        );
    }

    #[test]
    fn formats_default_line() {
        let spec = FormatSpec::default_for(&adglpst());
        let line = spec.format_line("news", &item("Title 1", "https://example.com/1"));
        assert_eq!(
            line,
            "\u{2}[news]\u{2} | Title 1 \u{2}→\u{2} https://example.com/1"
        );
    }

    #[test]
    fn formats_html_summary_on_one_line() {
        let spec = FormatSpec::parse("ft+ts", &adglpst()).unwrap();
        let mut entry = item("Title 1", "https://example.com/1");
        entry.summary = Some("<p>first\nparagraph</p><p>second</p>".to_string());
        let line = spec.format_line("news", &entry);
        assert_eq!(line, "| Title 1 | first paragraph second");
    }

    #[test]
    fn trailing_empty_field_is_trimmed() {
        let spec = FormatSpec::parse("ft+fta", &adglpst()).unwrap();
        let line = spec.format_line("news", &item("Title 1", "https://example.com/1"));
        assert_eq!(line, "\u{2}[news]\u{2} | Title 1 |");
    }
}
