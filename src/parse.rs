use once_cell::sync::Lazy;
use regex::Regex;

static RATING_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+(?:\.\d+)?").unwrap());
static COORD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"@(-?\d+\.\d+),(-?\d+\.\d+)").unwrap());

/// Pull the rating value out of an accessibility label like "4.5 stars".
pub fn parse_rating(label: &str) -> Option<String> {
    RATING_RE.find(label).map(|m| m.as_str().to_string())
}

/// Extract (latitude, longitude) from the `@<lat>,<lon>` segment of a place URL.
/// One match produces both values; no match produces neither.
pub fn parse_coordinates(url: &str) -> Option<(String, String)> {
    COORD_RE
        .captures(url)
        .map(|caps| (caps[1].to_string(), caps[2].to_string()))
}

/// Review counts render as "(128)"; strip the enclosing parentheses.
pub fn strip_review_parens(text: &str) -> String {
    text.chars().filter(|c| *c != '(' && *c != ')').collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rating_from_label() {
        assert_eq!(parse_rating("4.5 stars"), Some("4.5".to_string()));
        assert_eq!(parse_rating("5 stars"), Some("5".to_string()));
    }

    #[test]
    fn rating_absent_without_digits() {
        assert_eq!(parse_rating("No rating available"), None);
        assert_eq!(parse_rating(""), None);
    }

    #[test]
    fn coordinates_from_place_url() {
        let url = "https://www.google.com/maps/place/Cafe/@37.422,-122.084,15z/data=!3m1";
        assert_eq!(
            parse_coordinates(url),
            Some(("37.422".to_string(), "-122.084".to_string()))
        );
    }

    #[test]
    fn coordinates_absent_without_marker() {
        assert_eq!(parse_coordinates("https://www.google.com/maps/place/Cafe"), None);
        // Integer-only pairs don't match the pattern either.
        assert_eq!(parse_coordinates("https://example.com/@37,-122"), None);
    }

    #[test]
    fn review_count_parens_stripped() {
        assert_eq!(strip_review_parens("(128)"), "128");
        assert_eq!(strip_review_parens("1,204"), "1,204");
    }
}
