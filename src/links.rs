use lazy_regex::regex_is_match;
use lazy_static::lazy_static;
use scraper::{Html, Selector};
use std::collections::HashSet;
use url::Url;

use crate::utils;

pub const DEFAULT_MAX_LINKS: usize = 20;

const KEYWORDS: [&str; 5] = ["job", "career", "hiring", "work", "position"];

lazy_static! {
    static ref A: Selector = Selector::parse("a[href]").expect("Invalid selector");
}

/// Picks the links on a page worth following for job postings.
#[derive(Debug, Clone)]
pub struct LinkClassifier {
    max_links: usize,
}

impl LinkClassifier {
    pub fn new(max_links: usize) -> Self {
        Self { max_links }
    }

    /// Same-host, not yet visited, job-looking links in document order.
    pub fn extract_links(&self, doc: &Html, base: &Url, visited: &HashSet<Url>) -> Vec<Url> {
        doc.select(&A)
            .filter_map(|a| a.value().attr("href"))
            .filter_map(|href| utils::resolve_url(base, href))
            .map(|mut url| {
                url.set_fragment(None);
                url
            })
            .filter(|url| same_host(url, base) && !visited.contains(url))
            .filter(is_job_related)
            .take(self.max_links)
            .collect()
    }
}

impl Default for LinkClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_LINKS)
    }
}

fn same_host(url: &Url, base: &Url) -> bool {
    url.host_str().is_some() && url.host_str() == base.host_str() && url.port() == base.port()
}

fn is_job_related(url: &Url) -> bool {
    if regex_is_match!(
        r"(?i)/(jobs?|careers|apply|view|listing|posting|opportunities)",
        url.path()
    ) {
        return true;
    }

    if let Some(query) = url.query() {
        if regex_is_match!(r"(?i)(page|start|offset|p)=\d+", query) {
            return true;
        }
    }

    let lower = url.as_str().to_lowercase();
    KEYWORDS.iter().any(|keyword| lower.contains(keyword))
}
