pub mod selectors;

use itertools::Itertools;
use scraper::{ElementRef, Html};
use tracing::{info, warn};
use url::Url;

use crate::data::{ExtractionCandidate, JobRecord, MAX_DESCRIPTION_CHARS};
use crate::{utils, Oracle};
use selectors::{rules_for, Field, Pick};

/// Markup handed to the oracle is cut to this many characters.
pub const ORACLE_MARKUP_PREFIX: usize = 8000;

/// Structural heuristics first, oracle for whatever is still missing.
pub struct FieldExtractor {
    oracle: Box<dyn Oracle>,
}

impl FieldExtractor {
    pub fn new(oracle: Box<dyn Oracle>) -> Self {
        Self { oracle }
    }

    pub async fn extract(&self, markup: &str, page_url: &Url) -> Option<JobRecord> {
        let mut candidate = {
            let doc = Html::parse_document(markup);
            structural(&doc, page_url)
        };

        if candidate.needs_oracle() {
            info!("Using oracle to fill missing fields for {}", page_url);
            let prefix = utils::truncate_chars(markup, ORACLE_MARKUP_PREFIX);
            let guess = self.oracle.guess(&prefix, page_url).await;
            candidate.merge_missing(guess);
        }

        let record = candidate.finish(page_url);
        if record.is_none() {
            warn!("Missing mandatory fields for {}", page_url);
        }
        record
    }
}

/// Runs the selector cascades over a parsed page.
pub fn structural(doc: &Html, page_url: &Url) -> ExtractionCandidate {
    ExtractionCandidate {
        title: first_value(doc, Field::Title),
        description: first_value(doc, Field::Description)
            .map(|d| utils::truncate_chars(&d, MAX_DESCRIPTION_CHARS)),
        location: first_value(doc, Field::Location),
        apply_url: first_value(doc, Field::ApplyUrl)
            .and_then(|href| utils::resolve_url(page_url, &href)),
        company_image: first_value(doc, Field::CompanyImage)
            .and_then(|src| utils::resolve_url(page_url, &src)),
        date_posted: None,
    }
}

fn first_value(doc: &Html, field: Field) -> Option<String> {
    rules_for(field).find_map(|rule| {
        let el = doc.select(&rule.selector).next()?;
        pick(el, rule.pick)
    })
}

fn pick(el: ElementRef, pick: Pick) -> Option<String> {
    let value = match pick {
        Pick::Text => el.text().flat_map(str::split_whitespace).join(" "),
        Pick::Block { min_chars } => {
            let block = el
                .text()
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .join("\n");
            if block.chars().count() <= min_chars {
                return None;
            }
            block
        }
        Pick::Attr(name) => el.value().attr(name)?.trim().to_string(),
    };
    Some(value).filter(|v| !v.is_empty())
}
