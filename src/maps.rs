use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::browser::{self, TabFeed};
use crate::extract::{self, Listing};
use crate::scroll::{self, ScrollPolicy};

/// One map-search target. Validated upstream by the API before it is queued.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SearchTarget {
    pub search_query: String,
    pub location: String,
    pub max_results: usize,
    pub include_reviews: bool,
    pub language: String,
}

pub struct SearchOutcome {
    pub listings: Vec<Listing>,
    pub feed_html: String,
    pub url: String,
}

pub fn build_search_url(target: &SearchTarget) -> String {
    format!(
        "https://www.google.com/maps/search/{}+{}?hl={}",
        urlencoding::encode(&target.search_query),
        urlencoding::encode(&target.location),
        target.language
    )
}

/// One page visit: navigate, wait for the results feed, scroll it out, then
/// extract from the final DOM snapshot. The two phases are strictly ordered
/// and share nothing beyond the live tab.
///
/// The extractor may return more items than `max_results`; truncation happens
/// at the emission point in the worker.
pub async fn run_search(target: &SearchTarget) -> Result<SearchOutcome> {
    let url = build_search_url(target);
    info!("🌍 Visiting map search: {}", url);

    let chrome = browser::launch()?;
    let tab = browser::open_tab(&chrome)?;

    tab.navigate_to(&url)?;
    tab.wait_until_navigated()?;

    // Fatal for this visit if the feed never renders; retry is the caller's job.
    tab.wait_for_element_with_custom_timeout(browser::FEED_SELECTOR, browser::FEED_TIMEOUT)
        .context("results feed did not appear within the 30s budget")?;

    let feed = TabFeed::new(&tab);
    scroll::scroll_until(&feed, &ScrollPolicy::for_target(target.max_results)).await?;

    let feed_html = tab.get_content()?;
    let listings = extract::extract_listings(&feed_html);
    info!("📋 Extracted {} listings from {}", listings.len(), url);

    Ok(SearchOutcome {
        listings,
        feed_html,
        url,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(query: &str, location: &str, language: &str) -> SearchTarget {
        SearchTarget {
            search_query: query.to_string(),
            location: location.to_string(),
            max_results: 20,
            include_reviews: false,
            language: language.to_string(),
        }
    }

    #[test]
    fn search_url_is_percent_encoded() {
        let url = build_search_url(&target("coffee shops", "New York, NY", "en"));
        assert_eq!(
            url,
            "https://www.google.com/maps/search/coffee%20shops+New%20York%2C%20NY?hl=en"
        );
    }

    #[test]
    fn language_tag_lands_in_query_string() {
        let url = build_search_url(&target("ramen", "Tokyo", "ja"));
        assert!(url.ends_with("?hl=ja"));
    }
}
