use std::fmt;

use chrono::{DateTime, Utc};

/// One of the item fields a format can refer to, by its single-letter code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Field {
    FeedName,
    Author,
    Description,
    Guid,
    Link,
    Published,
    Summary,
    Title,
}

impl Field {
    pub const ALL: [Field; 8] = [
        Field::FeedName,
        Field::Author,
        Field::Description,
        Field::Guid,
        Field::Link,
        Field::Published,
        Field::Summary,
        Field::Title,
    ];

    pub fn code(self) -> char {
        match self {
            Field::FeedName => 'f',
            Field::Author => 'a',
            Field::Description => 'd',
            Field::Guid => 'g',
            Field::Link => 'l',
            Field::Published => 'p',
            Field::Summary => 's',
            Field::Title => 't',
        }
    }

    pub fn from_code(code: char) -> Option<Field> {
        Field::ALL.into_iter().find(|f| f.code() == code)
    }

    fn bit(self) -> u8 {
        1 << (self as u8)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// The fields a feed was observed to expose. Always contains [`Field::FeedName`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSet(u8);

impl FieldSet {
    pub fn all() -> Self {
        Field::ALL.into_iter().collect()
    }

    /// Fields present on a sample item. Returns `None` when the item has neither a title
    /// nor a description, since no usable format exists for such a feed.
    pub fn from_item(item: &FeedItem) -> Option<Self> {
        let set: FieldSet = Field::ALL
            .into_iter()
            .filter(|&field| field == Field::FeedName || item.value(field).is_some())
            .collect();
        set.has_title_or_description().then_some(set)
    }

    /// Builds a set from letter codes, e.g. `"adglpst"`. Unknown codes yield `None`.
    pub fn from_codes(codes: &str) -> Option<Self> {
        codes
            .chars()
            .map(Field::from_code)
            .collect::<Option<Vec<_>>>()
            .map(|fields| fields.into_iter().collect())
    }

    pub fn contains(&self, field: Field) -> bool {
        self.0 & field.bit() != 0
    }

    /// Adds the fields named by known codes in `codes`; anything else in it is ignored.
    pub fn with_codes(self, codes: &str) -> Self {
        self.iter()
            .chain(codes.chars().filter_map(Field::from_code))
            .collect()
    }

    pub fn has_title_or_description(&self) -> bool {
        self.contains(Field::Title) || self.contains(Field::Description)
    }

    pub fn iter(&self) -> impl Iterator<Item = Field> + '_ {
        Field::ALL.into_iter().filter(|&f| self.contains(f))
    }
}

impl FromIterator<Field> for FieldSet {
    fn from_iter<I: IntoIterator<Item = Field>>(iter: I) -> Self {
        let bits = iter
            .into_iter()
            .fold(Field::FeedName.bit(), |acc, f| acc | f.bit());
        FieldSet(bits)
    }
}

impl fmt::Display for FieldSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.iter().try_for_each(|field| write!(f, "{}", field.code()))
    }
}

/// A single entry handed back by the feed source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedItem {
    pub title: Option<String>,
    pub link: Option<String>,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub author: Option<String>,
    pub guid: Option<String>,
    pub published: Option<DateTime<Utc>>,
}

impl FeedItem {
    /// Raw value of an item field. The feed name is not part of the item and is always `None`.
    pub fn value(&self, field: Field) -> Option<String> {
        match field {
            Field::FeedName => None,
            Field::Author => self.author.clone(),
            Field::Description => self.description.clone(),
            Field::Guid => self.guid.clone(),
            Field::Link => self.link.clone(),
            Field::Published => self.published.map(|dt| dt.to_rfc3339()),
            Field::Summary => self.summary.clone(),
            Field::Title => self.title.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_round_trip() {
        for field in Field::ALL {
            assert_eq!(Field::from_code(field.code()), Some(field));
        }
        assert_eq!(Field::from_code('x'), None);
    }

    #[test]
    fn field_set_always_has_feed_name() {
        let set = FieldSet::from_codes("tl").unwrap();
        assert!(set.contains(Field::FeedName));
        assert_eq!(set.to_string(), "flt");
        assert_eq!(FieldSet::all().to_string(), "fadglpst");
    }

    #[test]
    fn field_set_from_item() {
        let item = FeedItem {
            title: Some("Title 1".to_string()),
            link: Some("https://example.com/1".to_string()),
            ..Default::default()
        };
        let set = FieldSet::from_item(&item).unwrap();
        assert_eq!(set.to_string(), "flt");

        let bare = FeedItem {
            link: Some("https://example.com/1".to_string()),
            ..Default::default()
        };
        assert!(FieldSet::from_item(&bare).is_none());
    }

    #[test]
    fn widening_keeps_known_codes_only() {
        let set = FieldSet::from_codes("glt").unwrap();
        assert_eq!(set.with_codes("fa+fta").to_string(), "faglt");
        assert_eq!(set.with_codes("+zz").to_string(), "fglt");
    }

    #[test]
    fn unknown_codes_are_rejected() {
        assert!(FieldSet::from_codes("tz").is_none());
    }
}
