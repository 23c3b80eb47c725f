use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use tracing::debug;
use utoipa::ToSchema;

use crate::parse;

// Structural selectors for one result card in the feed. Google ships obfuscated
// class names; fontHeadlineSmall/fontBodyMedium are the stable typography hooks.
static ITEM_SEL: Lazy<Selector> =
    Lazy::new(|| Selector::parse("div[role='feed'] > div > div[jsaction]").unwrap());
static NAME_SEL: Lazy<Selector> = Lazy::new(|| Selector::parse("div.fontHeadlineSmall").unwrap());
static RATING_SEL: Lazy<Selector> = Lazy::new(|| Selector::parse("span[role='img']").unwrap());
static REVIEW_COUNT_SEL: Lazy<Selector> =
    Lazy::new(|| Selector::parse("span[role='img'] + span > span > span").unwrap());
static CATEGORY_SEL: Lazy<Selector> =
    Lazy::new(|| Selector::parse("div.fontBodyMedium > div:nth-child(2) > span:first-child").unwrap());
static ADDRESS_SEL: Lazy<Selector> =
    Lazy::new(|| Selector::parse("div.fontBodyMedium > div:nth-child(2) > span:nth-child(2)").unwrap());
static LINK_SEL: Lazy<Selector> = Lazy::new(|| Selector::parse("a").unwrap());

/// One extracted business listing. Immutable once built; rating and
/// coordinates stay as the raw captured strings.
#[derive(Debug, Serialize, Deserialize, Clone, ToSchema)]
pub struct Listing {
    pub name: String,
    pub rating: Option<String>,
    pub review_count: Option<String>,
    pub category: Option<String>,
    pub address: Option<String>,
    pub place_url: Option<String>,
    pub latitude: Option<String>,
    pub longitude: Option<String>,
    pub scraped_at: DateTime<Utc>,
}

/// Snapshot extraction over the final page HTML. Items are processed
/// independently; a card that yields no name is dropped without affecting
/// its neighbors.
pub fn extract_listings(html: &str) -> Vec<Listing> {
    let document = Html::parse_document(html);
    let mut listings = Vec::new();

    for (index, item) in document.select(&ITEM_SEL).enumerate() {
        match extract_listing(item) {
            Some(listing) => listings.push(listing),
            None => debug!("Skipping feed item {} (no listing name)", index),
        }
    }

    listings
}

fn extract_listing(item: ElementRef) -> Option<Listing> {
    // No name, no record.
    let name = text_of(item, &NAME_SEL)?;

    let rating = item
        .select(&RATING_SEL)
        .next()
        .and_then(|el| el.value().attr("aria-label"))
        .and_then(parse::parse_rating);

    let review_count = text_of(item, &REVIEW_COUNT_SEL).map(|t| parse::strip_review_parens(&t));
    let category = text_of(item, &CATEGORY_SEL);
    let address = text_of(item, &ADDRESS_SEL);

    let place_url = item
        .select(&LINK_SEL)
        .next()
        .and_then(|el| el.value().attr("href"))
        .map(str::to_string);

    let (latitude, longitude) = match place_url.as_deref().and_then(parse::parse_coordinates) {
        Some((lat, lon)) => (Some(lat), Some(lon)),
        None => (None, None),
    };

    Some(Listing {
        name,
        rating,
        review_count,
        category,
        address,
        place_url,
        latitude,
        longitude,
        scraped_at: Utc::now(),
    })
}

fn text_of(item: ElementRef, selector: &Selector) -> Option<String> {
    let text: String = item.select(selector).next()?.text().collect();
    let text = text.trim();
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card(name_div: &str, body: &str) -> String {
        format!("<div><div jsaction=\"pane.card\">{name_div}{body}</div></div>")
    }

    fn feed(cards: &[String]) -> String {
        format!(
            "<html><body><div role=\"feed\">{}</div></body></html>",
            cards.join("")
        )
    }

    fn full_card() -> String {
        card(
            "<div class=\"fontHeadlineSmall\">Blue Bottle Coffee</div>",
            concat!(
                "<a href=\"https://www.google.com/maps/place/Blue+Bottle/@37.422,-122.084,15z/data\"></a>",
                "<span role=\"img\" aria-label=\"4.5 stars\"></span>",
                "<span><span><span>(128)</span></span></span>",
                "<div class=\"fontBodyMedium\">",
                "<div>ignored</div>",
                "<div><span>Cafe</span><span>123 Main St</span></div>",
                "</div>",
            ),
        )
    }

    #[test]
    fn extracts_all_fields() {
        let listings = extract_listings(&feed(&[full_card()]));
        assert_eq!(listings.len(), 1);

        let listing = &listings[0];
        assert_eq!(listing.name, "Blue Bottle Coffee");
        assert_eq!(listing.rating.as_deref(), Some("4.5"));
        assert_eq!(listing.review_count.as_deref(), Some("128"));
        assert_eq!(listing.category.as_deref(), Some("Cafe"));
        assert_eq!(listing.address.as_deref(), Some("123 Main St"));
        assert_eq!(listing.latitude.as_deref(), Some("37.422"));
        assert_eq!(listing.longitude.as_deref(), Some("-122.084"));
    }

    #[test]
    fn nameless_card_is_dropped() {
        let nameless = card("", "<a href=\"https://example.com/@1.0,2.0\"></a>");
        let listings = extract_listings(&feed(&[full_card(), nameless, full_card()]));
        assert_eq!(listings.len(), 2);
        assert!(listings.iter().all(|l| !l.name.is_empty()));
    }

    #[test]
    fn malformed_card_does_not_poison_neighbors() {
        let mangled = card(
            "<div class=\"fontHeadlineSmall\">Half Rendered</div>",
            "<span role=\"img\"></span><div class=\"fontBodyMedium\"><div></div></div>",
        );
        let listings = extract_listings(&feed(&[full_card(), mangled, full_card()]));
        assert_eq!(listings.len(), 3);

        let partial = &listings[1];
        assert_eq!(partial.name, "Half Rendered");
        assert_eq!(partial.rating, None);
        assert_eq!(partial.address, None);
    }

    #[test]
    fn coordinates_are_joint() {
        let no_coords = card(
            "<div class=\"fontHeadlineSmall\">No Pin</div>",
            "<a href=\"https://www.google.com/maps/place/No+Pin\"></a>",
        );
        let listings = extract_listings(&feed(&[full_card(), no_coords]));
        for listing in &listings {
            assert_eq!(listing.latitude.is_some(), listing.longitude.is_some());
        }
        assert_eq!(listings[1].latitude, None);
    }

    #[test]
    fn empty_feed_yields_nothing() {
        assert!(extract_listings("<html><body><div role=\"feed\"></div></body></html>").is_empty());
        assert!(extract_listings("<html><body></body></html>").is_empty());
    }
}
