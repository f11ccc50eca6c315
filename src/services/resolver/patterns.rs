//! Pure text extraction: coordinates, place ids and search text from map links

use once_cell::sync::Lazy;
use regex::Regex;

use crate::types::Coordinates;

/// Nested `link=` parameters are unwrapped at most this many times
const MAX_UNWRAP_DEPTH: usize = 1;

const NUM: &str = r"(-?\d+(?:\.\d+)?)";

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("static pattern compiles")
}

static MAPS_PATH: Lazy<Regex> = Lazy::new(|| {
    compile(&format!(
        r"(?i)/maps/(?:search|place|dir)/{NUM}(?:,|\s|\+|%2C)+{NUM}(?:[/?]|$)"
    ))
});
static LL_PARAM: Lazy<Regex> = Lazy::new(|| compile(&format!(r"(?i)[?&]ll={NUM},{NUM}")));
static AT_CENTER: Lazy<Regex> = Lazy::new(|| compile(&format!(r"@{NUM},{NUM}(?:[,/]|$)")));
static QUERY_PARAM: Lazy<Regex> =
    Lazy::new(|| compile(&format!(r"[?&](?:q|query)={NUM}[,\s+]+{NUM}")));
static DIRECTIONS_PARAM: Lazy<Regex> = Lazy::new(|| {
    compile(&format!(
        r"[?&](?:daddr|saddr|origin|destination)={NUM},{NUM}"
    ))
});
static DATA_MARKER: Lazy<Regex> = Lazy::new(|| compile(&format!(r"!3d{NUM}!4d{NUM}")));

static PLACE_ID: [Lazy<Regex>; 3] = [
    Lazy::new(|| compile(r"place_id:([A-Za-z0-9_-]{20,})")),
    Lazy::new(|| compile(r"[?&]query_place_id=([A-Za-z0-9_-]{20,})")),
    Lazy::new(|| compile(r"[?&]q=place_id:([A-Za-z0-9_-]{20,})")),
];

static PURE_COORDS: Lazy<Regex> =
    Lazy::new(|| compile(r"^\s*-?\d+(\.\d+)?,\s*-?\d+(\.\d+)?\s*$"));

static META_REFRESH: Lazy<Regex> = Lazy::new(|| {
    compile(r#"(?i)<meta[^>]+http-equiv=["']refresh["'][^>]+content=["'][^;]+;url=([^"']+)"#)
});
static LOCATION_ASSIGN: Lazy<Regex> =
    Lazy::new(|| compile(r#"location(?:\.href)?\s*=\s*["']([^"']+)["']"#));
static LOCATION_REPLACE: Lazy<Regex> =
    Lazy::new(|| compile(r#"location\.replace\(["']([^"']+)["']\)"#));
static LITERAL_MAPS_URL: Lazy<Regex> =
    Lazy::new(|| compile(r#"(https://(?:www\.)?google\.[^"']*/maps[^"']+)"#));
static ESCAPED_MAPS_URL: Lazy<Regex> =
    Lazy::new(|| compile(r#"https:\\/\\/www\.google\.[^"'\\]+\\/maps[^"'\\]+"#));

/// One way of spotting a coordinate pair inside a URL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinateStrategy {
    /// `/maps/search/24.7,46.6`
    MapsPath,
    /// `?ll=24.7,46.6`
    LlParam,
    /// `@24.7,46.6,15z`
    AtCenter,
    /// `?q=24.7,46.6`
    QueryParam,
    /// `?daddr=24.7,46.6`
    DirectionsParam,
    /// `!3d24.7!4d46.6`
    DataMarker,
}

impl CoordinateStrategy {
    /// Priority order of the cascade
    pub const ORDERED: [CoordinateStrategy; 6] = [
        CoordinateStrategy::MapsPath,
        CoordinateStrategy::LlParam,
        CoordinateStrategy::AtCenter,
        CoordinateStrategy::QueryParam,
        CoordinateStrategy::DirectionsParam,
        CoordinateStrategy::DataMarker,
    ];

    fn regex(self) -> &'static Regex {
        match self {
            CoordinateStrategy::MapsPath => &MAPS_PATH,
            CoordinateStrategy::LlParam => &LL_PARAM,
            CoordinateStrategy::AtCenter => &AT_CENTER,
            CoordinateStrategy::QueryParam => &QUERY_PARAM,
            CoordinateStrategy::DirectionsParam => &DIRECTIONS_PARAM,
            CoordinateStrategy::DataMarker => &DATA_MARKER,
        }
    }

    pub fn extract(self, text: &str) -> Option<Coordinates> {
        let caps = self.regex().captures(text)?;
        let lat = caps.get(1)?.as_str().parse().ok()?;
        let lng = caps.get(2)?.as_str().parse().ok()?;
        Coordinates::checked(lat, lng)
    }
}

/// Coordinates embedded in a link or free text, unwrapping one `link=` level
pub fn coords_from_text(text: &str) -> Option<Coordinates> {
    coords_at_depth(text, 0)
}

fn coords_at_depth(text: &str, depth: usize) -> Option<Coordinates> {
    let mut decoded = percent_decode(text);

    if depth < MAX_UNWRAP_DEPTH {
        if let Some(inner) = query_param(&decoded, "link") {
            let inner = percent_decode(&inner);
            if let Some(coords) = coords_at_depth(&inner, depth + 1) {
                return Some(coords);
            }
            decoded = inner;
        }
    }

    CoordinateStrategy::ORDERED
        .iter()
        .find_map(|strategy| strategy.extract(&decoded))
}

pub fn place_id_from_text(text: &str) -> Option<String> {
    PLACE_ID
        .iter()
        .find_map(|re| re.captures(text))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Free-text `q`/`query` value that is worth geocoding
pub fn text_query_from_url(url: &str) -> Option<String> {
    let value = ["q", "query"]
        .iter()
        .find_map(|key| query_param(url, key))?;
    let value = percent_decode(&value);

    if PURE_COORDS.is_match(&value) || value.starts_with("place_id:") {
        return None;
    }
    Some(value)
}

/// Redirect target hidden in an HTML interstitial page
pub fn maps_url_from_html(html: &str) -> Option<String> {
    let plain = [
        &*META_REFRESH,
        &*LOCATION_ASSIGN,
        &*LOCATION_REPLACE,
        &*LITERAL_MAPS_URL,
    ];
    if let Some(found) = plain
        .iter()
        .find_map(|re| re.captures(html))
        .and_then(|caps| caps.get(1))
    {
        return Some(percent_decode(found.as_str()));
    }

    ESCAPED_MAPS_URL
        .find(html)
        .map(|m| m.as_str().replace("\\/", "/"))
}

pub fn is_http_url(text: &str) -> bool {
    text.starts_with("http://") || text.starts_with("https://")
}

/// First non-blank value of `key` in the query string, form-decoded
fn query_param(url: &str, key: &str) -> Option<String> {
    let (_, rest) = url.split_once('?')?;
    let query = rest.split('#').next().unwrap_or_default();
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(k, v)| k == key && !v.is_empty())
        .map(|(_, v)| v.into_owned())
}

fn percent_decode(text: &str) -> String {
    urlencoding::decode(text)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| text.to_string())
}
