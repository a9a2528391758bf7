//! Spider for furnished apartments listed on City Wohnen.
//!
//! The search page loads its results through an AJAX call, so the spider
//! asks that endpoint directly, pulls listing links out of the returned
//! HTML fragment and then scrapes each listing page.

use chrono::NaiveDate;
use regex::Regex;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use serde::Serialize;
use serde_json::Value;
use sqlx::PgPool;
use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;
use std::time::Duration;

use crate::db::{Crud, FieldValue, ModelError};
use crate::models::Apartment;

pub const SPIDER_NAME: &str = "city_wohnen";
pub const BASE_URL: &str = "https://www.city-wohnen.de";
pub const MAX_RECORDS: u32 = 200;
pub const URL_REGEX: &str = r"/eng/berlin/[0-9]+[a-z-]+";

#[derive(Debug, thiserror::Error)]
pub enum CrawlError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),
    #[error("Search response has no 'results' field")]
    MissingResults,
    #[error("Could not parse {url}: {message}")]
    Parse { url: String, message: String },
    #[error("Model error: {0}")]
    Model(#[from] ModelError),
}

/// Fields scraped from one listing page, already cleaned.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ApartmentItem {
    pub url: String,
    pub title: Option<String>,
    pub availability: Option<NaiveDate>,
    pub description: Option<String>,
    pub neighborhood: Option<String>,
    pub address: Option<String>,
    pub warm_rent: Option<f64>,
    pub size: Option<f64>,
    pub rooms: Option<f64>,
}

impl ApartmentItem {
    /// Column map for `Apartment::create` / `update`.
    pub fn to_fields(&self) -> Value {
        serde_json::json!({
            "url": self.url,
            "title": self.title,
            "availability": FieldValue::Date(self.availability).to_json(),
            "description": self.description,
            "neighborhood": self.neighborhood,
            "address": self.address,
            "warm_rent": self.warm_rent,
            "size": self.size,
            "rooms": self.rooms,
        })
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CrawlSummary {
    pub created: usize,
    pub updated: usize,
    pub failed: usize,
}

fn link_regex() -> &'static Regex {
    static LINK: OnceLock<Regex> = OnceLock::new();
    LINK.get_or_init(|| Regex::new(URL_REGEX).expect("link pattern is valid"))
}

fn availability_regex() -> &'static Regex {
    static AVAILABILITY: OnceLock<Regex> = OnceLock::new();
    AVAILABILITY.get_or_init(|| {
        Regex::new(r"\A.*from (?P<availability>[0-9/]+).*").expect("availability pattern is valid")
    })
}

fn neighborhood_regex() -> &'static Regex {
    static NEIGHBORHOOD: OnceLock<Regex> = OnceLock::new();
    NEIGHBORHOOD.get_or_init(|| {
        Regex::new(r"^furnished apartment in (?P<neighborhood>[^\t]+)\t+")
            .expect("neighborhood pattern is valid")
    })
}

fn address_regex() -> &'static Regex {
    static ADDRESS: OnceLock<Regex> = OnceLock::new();
    ADDRESS.get_or_init(|| {
        Regex::new(r"^.+/maps/search/(?P<address>.+)/@[0-9.,]+").expect("address pattern is valid")
    })
}

/// Text nodes directly under the element, without descendants.
fn own_text(element: ElementRef<'_>) -> String {
    element
        .children()
        .filter_map(|child| child.value().as_text())
        .map(|text| text.to_string())
        .collect()
}

fn select_texts(document: &Html, css: &str) -> Vec<String> {
    let Ok(selector) = Selector::parse(css) else {
        return Vec::new();
    };
    document.select(&selector).map(own_text).collect()
}

fn first_text(document: &Html, css: &str) -> Option<String> {
    select_texts(document, css)
        .into_iter()
        .map(|text| text.trim().to_string())
        .find(|text| !text.is_empty())
}

fn first_attr(document: &Html, css: &str, attr: &str) -> Option<String> {
    let selector = Selector::parse(css).ok()?;
    document
        .select(&selector)
        .find_map(|element| element.value().attr(attr))
        .map(str::to_string)
}

fn clean(value: &str) -> &str {
    value.trim_matches(|c| c == ' ' || c == '\t' || c == '\n')
}

/// Applies a field regex; values that do not match are kept as they are.
fn extract_field(regex: &Regex, name: &str, value: String) -> String {
    let cleaned = clean(&value);
    match regex.captures(cleaned).and_then(|caps| caps.name(name)) {
        Some(found) => found.as_str().to_string(),
        None => cleaned.to_string(),
    }
}

/// Percent-decodes with `+` as a space. Invalid UTF-8 becomes U+FFFD.
fn decode_plus(value: &str) -> String {
    let decoded = urlencoding::decode_binary(value.replace('+', " ").as_bytes()).into_owned();
    String::from_utf8_lossy(&decoded).into_owned()
}

/// Parses amounts such as `1,290.00 €`, `45 m²` or `2,5`.
pub fn parse_amount(raw: &str) -> Option<f64> {
    let number: String = raw
        .trim()
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit() || *c == '.' || *c == ',')
        .collect();
    if number.is_empty() {
        return None;
    }

    let normalised = match (number.rfind('.'), number.rfind(',')) {
        (Some(_), Some(_)) => number.replace(',', ""),
        (None, Some(comma)) if number.len() - comma - 1 == 3 => number.replace(',', ""),
        (None, Some(_)) => number.replace(',', "."),
        _ => number,
    };
    normalised.trim_end_matches('.').parse().ok()
}

/// Listing links found in the search results, absolute and deduplicated.
pub fn extract_links(results: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    link_regex()
        .find_iter(results)
        .map(|found| found.as_str())
        .filter(|link| seen.insert(*link))
        .map(|link| format!("{BASE_URL}{link}"))
        .collect()
}

pub fn search_url(max_records: u32) -> String {
    format!(
        "{BASE_URL}/rpc.php?pageid=401&action=services&service=ciwo_search&cmd=search&\
         filters=city%3Dberlin%26date_from%3D%26room_count%3D1%26rent_amount_min%3D0%26\
         rent_amount_max%3D4375%26person_count%3D1&order=available_from&page_nr=1&page_size={max_records}"
    )
}

/// Scrapes one listing page.
pub fn parse_item(url: &str, html: &str) -> Result<ApartmentItem, CrawlError> {
    let document = Html::parse_document(html);
    let parse_error = |message: String| CrawlError::Parse {
        url: url.to_string(),
        message,
    };

    let availability = match first_text(&document, "div.row > div.text_data > p") {
        Some(text) => {
            let raw = extract_field(availability_regex(), "availability", text);
            let date = NaiveDate::parse_from_str(&raw, "%d/%m/%Y")
                .map_err(|_| parse_error(format!("invalid availability '{raw}'")))?;
            Some(date)
        }
        None => None,
    };

    let neighborhood = select_texts(&document, "div.object_meta div.container div.text_data p strong")
        .into_iter()
        .next()
        .map(|text| extract_field(neighborhood_regex(), "neighborhood", text));

    let address = first_attr(&document, r#"li[class="map"] > a"#, "href")
        .map(|href| extract_field(address_regex(), "address", href))
        .map(|address| decode_plus(&address));

    let description = {
        let paragraphs: Vec<String> = select_texts(&document, "div.object_details div.col_left p")
            .iter()
            .map(|text| clean(text).to_string())
            .filter(|text| !text.is_empty())
            .collect();
        (!paragraphs.is_empty()).then(|| paragraphs.join("\n"))
    };

    let keys = select_texts(&document, "div.object_meta table.object_meta_data th");
    let values = select_texts(&document, "div.object_meta table.object_meta_data td");
    let features: HashMap<String, String> = keys
        .into_iter()
        .map(|key| clean(&key).to_string())
        .zip(values)
        .collect();
    let feature = |name: &str| features.get(name).and_then(|value| parse_amount(value));

    Ok(ApartmentItem {
        url: url.to_string(),
        title: first_text(&document, "div.text_data > h2"),
        availability,
        description,
        neighborhood,
        address,
        warm_rent: feature("Rent"),
        size: feature("Size"),
        rooms: feature("Room/s"),
    })
}

pub struct CityWohnenSpider {
    client: Client,
    max_records: u32,
}

impl CityWohnenSpider {
    pub fn new() -> Result<Self, CrawlError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("tegenaria/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            max_records: MAX_RECORDS,
        })
    }

    /// Asks the hidden search endpoint for listings and returns their URLs.
    pub async fn start_requests(&self) -> Result<Vec<String>, CrawlError> {
        let url = search_url(self.max_records);
        tracing::debug!(spider = SPIDER_NAME, %url, "Requesting search results");

        let body = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json::<Value>()
            .await?;

        let results = body
            .get("results")
            .and_then(Value::as_str)
            .ok_or(CrawlError::MissingResults)?;

        Ok(extract_links(results))
    }

    pub async fn fetch_item(&self, url: &str) -> Result<ApartmentItem, CrawlError> {
        let html = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        parse_item(url, &html)
    }
}

/// Stores a scraped item: the apartment with the same url is updated,
/// otherwise a new one is created. Returns true when a record was created.
pub async fn store_item(pool: &PgPool, item: &ApartmentItem) -> Result<bool, CrawlError> {
    match Apartment::find_by(pool, "url", FieldValue::from(item.url.as_str())).await? {
        Some(mut apartment) => {
            apartment.update(pool, item.to_fields()).await?;
            Ok(false)
        }
        None => {
            Apartment::create(pool, item.to_fields()).await?;
            Ok(true)
        }
    }
}

/// Runs the spider once and stores every listing it can parse.
pub async fn crawl(pool: &PgPool, spider: &CityWohnenSpider) -> Result<CrawlSummary, CrawlError> {
    let links = spider.start_requests().await?;
    tracing::info!(spider = SPIDER_NAME, links = links.len(), "Crawl started");

    let mut summary = CrawlSummary::default();
    for url in &links {
        let stored = match spider.fetch_item(url).await {
            Ok(item) => store_item(pool, &item).await,
            Err(e) => Err(e),
        };

        match stored {
            Ok(true) => summary.created += 1,
            Ok(false) => summary.updated += 1,
            Err(e) => {
                tracing::warn!(spider = SPIDER_NAME, %url, "Skipping listing: {}", e);
                summary.failed += 1;
            }
        }
    }

    tracing::info!(
        spider = SPIDER_NAME,
        created = summary.created,
        updated = summary.updated,
        failed = summary.failed,
        "Crawl finished"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = r#"
<html><body>
  <div class="row">
    <div class="text_data">
      <h2>Bright flat near Boxhagener Platz</h2>
      <p>Available from 01/04/2017 for 6 months
minimum stay</p>
    </div>
  </div>
  <div class="object_meta">
    <div class="container">
      <div class="text_data"><p><strong>furnished apartment in Friedrichshain&#9;&#9;ID 32608</strong></p></div>
    </div>
    <table class="object_meta_data">
      <tr><th>Rent</th><td>1,290.00 €</td></tr>
      <tr><th>Size</th><td>45 m²</td></tr>
      <tr><th>Room/s</th><td>2</td></tr>
    </table>
  </div>
  <div class="object_details">
    <div class="col_left">
      <p>Quiet courtyard.</p>
      <p>Washing machine in the cellar.</p>
    </div>
  </div>
  <ul>
    <li class="map"><a href="https://www.google.com/maps/search/Pettenkoferstra%C3%9Fe+Berlin/@52.51,13.46,15z">Map</a></li>
  </ul>
</body></html>
"#;

    const URL: &str =
        "https://www.city-wohnen.de/eng/berlin/32608-furnished-apartment-berlin-friedrichshain";

    #[test]
    fn test_parse_item() {
        let item = parse_item(URL, LISTING).unwrap();

        assert_eq!(item.url, URL);
        assert_eq!(item.title.as_deref(), Some("Bright flat near Boxhagener Platz"));
        assert_eq!(item.availability, NaiveDate::from_ymd_opt(2017, 4, 1));
        assert_eq!(item.neighborhood.as_deref(), Some("Friedrichshain"));
        assert_eq!(item.address.as_deref(), Some("Pettenkoferstraße Berlin"));
        assert_eq!(
            item.description.as_deref(),
            Some("Quiet courtyard.\nWashing machine in the cellar.")
        );
        assert_eq!(item.warm_rent, Some(1290.0));
        assert_eq!(item.size, Some(45.0));
        assert_eq!(item.rooms, Some(2.0));
    }

    #[test]
    fn test_parse_item_with_missing_fields() {
        let item = parse_item(URL, "<html><body><p>Gone</p></body></html>").unwrap();
        assert_eq!(
            item,
            ApartmentItem {
                url: URL.to_string(),
                ..ApartmentItem::default()
            }
        );
    }

    #[test]
    fn test_parse_item_rejects_bad_availability() {
        let html = r#"<div class="row"><div class="text_data"><p>Available from 31/02/2017</p></div></div>"#;
        assert!(matches!(parse_item(URL, html), Err(CrawlError::Parse { .. })));
    }

    #[test]
    fn test_availability_must_be_on_the_first_line() {
        let html = r#"<div class="row"><div class="text_data"><p>Ask us
from 01/04/2017</p></div></div>"#;
        assert!(matches!(parse_item(URL, html), Err(CrawlError::Parse { .. })));
    }

    #[test]
    fn test_address_with_invalid_utf8_is_decoded_lossily() {
        let html = r#"<ul><li class="map"><a href="https://www.google.com/maps/search/Stra%DFe+1/@52.5,13.4">Map</a></li></ul>"#;
        let item = parse_item(URL, html).unwrap();
        assert_eq!(item.address.as_deref(), Some("Stra\u{FFFD}e 1"));
    }

    #[test]
    fn test_extract_links() {
        let results = r#"<a href="/eng/berlin/32608-furnished-apartment">A</a>
            <a href="/eng/berlin/32608-furnished-apartment">again</a>
            <a href="/eng/hamburg/111-flat">elsewhere</a>
            <a href="/eng/berlin/40001-studio-mitte">B</a>"#;

        assert_eq!(
            extract_links(results),
            vec![
                "https://www.city-wohnen.de/eng/berlin/32608-furnished-apartment".to_string(),
                "https://www.city-wohnen.de/eng/berlin/40001-studio-mitte".to_string(),
            ]
        );
    }

    #[test]
    fn test_search_url() {
        let url = search_url(MAX_RECORDS);
        assert!(url.starts_with("https://www.city-wohnen.de/rpc.php?pageid=401"));
        assert!(url.contains("service=ciwo_search"));
        assert!(url.ends_with("page_size=200"));
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("1,290.00 €"), Some(1290.0));
        assert_eq!(parse_amount("€ 850"), Some(850.0));
        assert_eq!(parse_amount("45 m²"), Some(45.0));
        assert_eq!(parse_amount("2,5"), Some(2.5));
        assert_eq!(parse_amount("1,290"), Some(1290.0));
        assert_eq!(parse_amount("on request"), None);
    }

    #[test]
    fn test_item_fields_use_iso_dates() {
        let item = ApartmentItem {
            url: URL.to_string(),
            availability: NaiveDate::from_ymd_opt(2017, 4, 1),
            rooms: Some(2.0),
            ..ApartmentItem::default()
        };

        let fields = item.to_fields();
        assert_eq!(fields["availability"], "2017-04-01");
        assert_eq!(fields["rooms"], 2.0);
        assert!(fields["title"].is_null());
    }

    #[test]
    fn test_item_fields_fit_the_apartment_table() {
        let item = parse_item(URL, LISTING).unwrap();
        let mut apartment = Apartment::new(URL);
        apartment.assign(item.to_fields()).unwrap();

        assert_eq!(apartment.warm_rent, Some(1290.0));
        assert_eq!(apartment.neighborhood.as_deref(), Some("Friedrichshain"));
    }
}
