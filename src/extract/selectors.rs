//! Ordered selector cascades, one row per `(field, selector)` pair.
//!
//! Rows are evaluated top to bottom for each field and the first row whose
//! first matching element yields a usable value wins. Adding a selector is a
//! table edit.

use lazy_static::lazy_static;
use scraper::Selector;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Title,
    Description,
    Location,
    ApplyUrl,
    CompanyImage,
}

/// What to read from a matched element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pick {
    /// Whitespace-collapsed text content.
    Text,
    /// Text nodes joined by newlines, accepted only above `min_chars`.
    Block { min_chars: usize },
    /// A non-empty attribute value.
    Attr(&'static str),
}

pub struct SelectorRule {
    pub field: Field,
    pub selector: Selector,
    pub pick: Pick,
}

const DESCRIPTION: Pick = Pick::Block { min_chars: 100 };
const HREF: Pick = Pick::Attr("href");
const SRC: Pick = Pick::Attr("src");

#[rustfmt::skip]
const RULES: &[(Field, &str, Pick)] = &[
    (Field::Title, r#"h1[class*="title"]"#, Pick::Text),
    (Field::Title, r#"h1[class*="job"]"#, Pick::Text),
    (Field::Title, r#"h1[class*="position"]"#, Pick::Text),
    (Field::Title, r#"h2[class*="title"]"#, Pick::Text),
    (Field::Title, r#"h2[class*="job"]"#, Pick::Text),
    (Field::Title, r#"h2[class*="position"]"#, Pick::Text),
    (Field::Title, ".job-title", Pick::Text),
    (Field::Title, ".position-title", Pick::Text),
    (Field::Title, ".title", Pick::Text),
    (Field::Title, "h1", Pick::Text),
    (Field::Title, "h2", Pick::Text),

    (Field::Description, r#"[class*="description"]"#, DESCRIPTION),
    (Field::Description, r#"[class*="job-description"]"#, DESCRIPTION),
    (Field::Description, r#"[class*="content"]"#, DESCRIPTION),
    (Field::Description, r#"[class*="details"]"#, DESCRIPTION),
    (Field::Description, r#"[class*="requirements"]"#, DESCRIPTION),
    (Field::Description, ".description", DESCRIPTION),
    (Field::Description, ".job-content", DESCRIPTION),

    (Field::Location, r#"[class*="location"]"#, Pick::Text),
    (Field::Location, r#"[class*="address"]"#, Pick::Text),
    (Field::Location, r#"[class*="remote"]"#, Pick::Text),
    (Field::Location, ".location", Pick::Text),
    (Field::Location, ".job-location", Pick::Text),
    (Field::Location, ".address", Pick::Text),

    (Field::ApplyUrl, r#"a[href*="apply"]"#, HREF),
    (Field::ApplyUrl, r#"a[class*="apply"]"#, HREF),
    (Field::ApplyUrl, r#"a[class*="button"]"#, HREF),
    (Field::ApplyUrl, ".apply-btn", HREF),
    (Field::ApplyUrl, ".apply-link", HREF),
    (Field::ApplyUrl, ".job-apply", HREF),

    (Field::CompanyImage, r#"img[src*="logo"]"#, SRC),
    (Field::CompanyImage, r#"img[class*="logo"]"#, SRC),
    (Field::CompanyImage, r#"img[class*="company"]"#, SRC),
    (Field::CompanyImage, ".company-logo img", SRC),
    (Field::CompanyImage, ".logo img", SRC),
];

lazy_static! {
    pub static ref FIELD_SELECTORS: Vec<SelectorRule> = RULES
        .iter()
        .map(|&(field, css, pick)| SelectorRule {
            field,
            selector: Selector::parse(css).expect("Invalid selector"),
            pick,
        })
        .collect();
}

/// The rows for `field`, in priority order.
pub fn rules_for(field: Field) -> impl Iterator<Item = &'static SelectorRule> {
    FIELD_SELECTORS.iter().filter(move |rule| rule.field == field)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_selector_parses() {
        assert_eq!(FIELD_SELECTORS.len(), RULES.len());
    }

    #[test]
    fn test_rules_keep_priority_order() {
        let first = rules_for(Field::Title).next().map(|rule| rule.pick);
        assert_eq!(first, Some(Pick::Text));
        assert_eq!(rules_for(Field::ApplyUrl).count(), 6);
        assert!(rules_for(Field::Description)
            .all(|rule| rule.pick == Pick::Block { min_chars: 100 }));
    }
}
