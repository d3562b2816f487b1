//! HTML extraction of product cards from catalog pages.
//!
//! Every lookup is an ordered list of fallbacks: the first container selector
//! that matches anything, the first link strategy yielding a name, the first
//! price selector with text. Stock status is an OR over a list of signals.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use stockwatch_core::error::AppError;
use stockwatch_core::models::{PageExtraction, Product, StockStatus};
use stockwatch_core::traits::ProductExtractor;
use url::Url;

static PRICE_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[0-9]+(\.[0-9]*)?").expect("valid price regex"));

/// Currency markers removed before reading the number.
const CURRENCY_MARKERS: &[&str] = &["ر.س", "SAR"];

/// Price stored when none can be read.
pub const UNKNOWN_PRICE: &str = "0.00";

/// How to find the anchor that carries a product's name and link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkStrategy {
    /// First descendant of the container matching the selector.
    Descendant(String),
    /// The container itself, when it is an `<a>`.
    ContainerAnchor,
}

/// One indicator that an item is out of stock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StockSignal {
    /// An element matching `selector` carries `class`.
    ClassOn { selector: String, class: String },
    /// Any element matches the selector.
    Present(String),
    /// The lowercased item text contains the phrase.
    Phrase(String),
}

/// Selectors and phrases describing the catalog's markup.
#[derive(Debug, Clone)]
pub struct ExtractorConfig {
    /// Base for resolving relative product links.
    pub base_url: String,
    pub containers: Vec<String>,
    pub links: Vec<LinkStrategy>,
    pub prices: Vec<String>,
    pub stock_signals: Vec<StockSignal>,
}

impl ExtractorConfig {
    /// Default markup description with the given base URL.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            containers: vec!["div.product".into(), ".product-card".into()],
            links: vec![
                LinkStrategy::Descendant(".title a".into()),
                LinkStrategy::Descendant("a.product-card".into()),
                LinkStrategy::ContainerAnchor,
            ],
            prices: vec![
                ".price .text-dark-1.fs-18px".into(),
                ".text-dark-1.fs-18px".into(),
                ".price".into(),
                "[class*=\"price\"]".into(),
            ],
            stock_signals: vec![
                StockSignal::ClassOn {
                    selector: ".img.position-relative".into(),
                    class: "img-grayscale".into(),
                },
                StockSignal::Present(".btn-out-of-stock".into()),
                StockSignal::Phrase("غير متوفر".into()),
            ],
        }
    }
}

#[derive(Debug, Clone)]
enum CompiledLink {
    Descendant(Selector),
    ContainerAnchor,
}

#[derive(Debug, Clone)]
enum CompiledSignal {
    ClassOn(Selector, String),
    Present(Selector),
    Phrase(String),
}

/// [`ProductExtractor`] over catalog HTML using `scraper`.
///
/// Selectors are compiled once in [`new`](Self::new); an invalid selector is
/// a configuration error there rather than a silent miss at extraction time.
#[derive(Debug, Clone)]
pub struct HtmlProductExtractor {
    base_url: String,
    containers: Vec<Selector>,
    links: Vec<CompiledLink>,
    prices: Vec<Selector>,
    stock_signals: Vec<CompiledSignal>,
}

impl HtmlProductExtractor {
    pub fn new(config: ExtractorConfig) -> Result<Self, AppError> {
        let links: Vec<CompiledLink> = config
            .links
            .iter()
            .map(|strategy| match strategy {
                LinkStrategy::Descendant(sel) => parse_selector(sel).map(CompiledLink::Descendant),
                LinkStrategy::ContainerAnchor => Ok(CompiledLink::ContainerAnchor),
            })
            .collect::<Result<_, AppError>>()?;

        let stock_signals: Vec<CompiledSignal> = config
            .stock_signals
            .iter()
            .map(|signal| match signal {
                StockSignal::ClassOn { selector, class } => {
                    parse_selector(selector).map(|s| CompiledSignal::ClassOn(s, class.clone()))
                }
                StockSignal::Present(sel) => parse_selector(sel).map(CompiledSignal::Present),
                StockSignal::Phrase(phrase) => Ok(CompiledSignal::Phrase(phrase.to_lowercase())),
            })
            .collect::<Result<_, AppError>>()?;

        Ok(Self {
            base_url: config.base_url,
            containers: parse_selectors(&config.containers)?,
            links,
            prices: parse_selectors(&config.prices)?,
            stock_signals,
        })
    }

    fn product_from(&self, item: ElementRef<'_>) -> Option<Product> {
        let (name, href) = self.find_link(item)?;
        let url = resolve_url(&href, &self.base_url)?;
        let id = product_id_from_url(&url)?;
        Some(Product {
            id,
            name,
            url,
            price: self.read_price(item),
            status: self.read_status(item),
        })
    }

    /// Name and raw href from the first strategy yielding a non-empty name.
    fn find_link(&self, item: ElementRef<'_>) -> Option<(String, String)> {
        for strategy in &self.links {
            let anchor = match strategy {
                CompiledLink::Descendant(sel) => item.select(sel).next(),
                CompiledLink::ContainerAnchor => (item.value().name() == "a").then_some(item),
            };
            let Some(anchor) = anchor else { continue };

            let name = anchor_name(anchor);
            if name.is_empty() {
                continue;
            }
            let href = anchor.value().attr("href")?.trim();
            if href.is_empty() {
                return None;
            }
            return Some((name, href.to_string()));
        }
        None
    }

    fn read_price(&self, item: ElementRef<'_>) -> String {
        self.prices
            .iter()
            .filter_map(|sel| item.select(sel).next())
            .map(|el| collapse_whitespace(&el.text().collect::<String>()))
            .find(|text| !text.is_empty())
            .map(|text| normalize_price(&text))
            .unwrap_or_else(|| UNKNOWN_PRICE.to_string())
    }

    fn read_status(&self, item: ElementRef<'_>) -> StockStatus {
        let text = item.text().collect::<String>().to_lowercase();
        let out = self.stock_signals.iter().any(|signal| match signal {
            CompiledSignal::ClassOn(sel, class) => item
                .select(sel)
                .any(|el| el.value().classes().any(|c| c == class.as_str())),
            CompiledSignal::Present(sel) => item.select(sel).next().is_some(),
            CompiledSignal::Phrase(phrase) => text.contains(phrase.as_str()),
        });
        if out {
            StockStatus::OutOfStock
        } else {
            StockStatus::Available
        }
    }
}

impl ProductExtractor for HtmlProductExtractor {
    fn extract(&self, html: &str) -> PageExtraction {
        let document = Html::parse_document(html);

        let items: Vec<ElementRef<'_>> = self
            .containers
            .iter()
            .map(|sel| document.select(sel).collect::<Vec<_>>())
            .find(|found| !found.is_empty())
            .unwrap_or_default();

        let mut extraction = PageExtraction {
            raw_items: items.len(),
            ..Default::default()
        };
        for (index, item) in items.into_iter().enumerate() {
            match self.product_from(item) {
                Some(product) => extraction.products.push(product),
                None => {
                    tracing::debug!(index, "Skipping item without name or link");
                    extraction.skipped += 1;
                }
            }
        }
        extraction
    }
}

/// Turn displayed price text into a two-decimal numeral.
///
/// `"1,200.00 ر.س"` becomes `"1200.00"`, `"460"` becomes `"460.00"`. Arabic-Indic
/// and Persian digits are read like ASCII ones. Anything unreadable becomes
/// [`UNKNOWN_PRICE`].
pub fn normalize_price(text: &str) -> String {
    let mut cleaned = ascii_numerals(text);
    for marker in CURRENCY_MARKERS {
        cleaned = cleaned.replace(marker, "");
    }

    PRICE_NUMBER
        .find(&cleaned)
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .filter(|value| value.is_finite())
        .map(|value| format!("{value:.2}"))
        .unwrap_or_else(|| UNKNOWN_PRICE.to_string())
}

/// Digits folded to ASCII, `٫` to `.`, thousands separators dropped.
fn ascii_numerals(text: &str) -> String {
    text.chars()
        .filter(|c| !matches!(c, ',' | '\u{066C}'))
        .map(|c| match c {
            '\u{0660}'..='\u{0669}' => char::from(b'0' + (c as u32 - 0x0660) as u8),
            '\u{06F0}'..='\u{06F9}' => char::from(b'0' + (c as u32 - 0x06F0) as u8),
            '\u{066B}' => '.',
            other => other,
        })
        .collect()
}

/// Absolute links pass through verbatim; relative ones are joined to `base`.
pub fn resolve_url(href: &str, base: &str) -> Option<String> {
    if href.starts_with("http") {
        return Some(href.to_string());
    }
    let base = Url::parse(base).ok()?;
    base.join(href).ok().map(String::from)
}

/// Last non-empty path segment, without query string or fragment.
pub fn product_id_from_url(url: &str) -> Option<String> {
    let without_query = url.split(['?', '#']).next().unwrap_or_default();
    let path = match without_query.split_once("://") {
        Some((_, rest)) => rest.split_once('/').map_or("", |(_, path)| path),
        None => without_query,
    };
    path.rsplit('/')
        .map(str::trim)
        .find(|segment| !segment.is_empty())
        .map(str::to_string)
}

fn anchor_name(anchor: ElementRef<'_>) -> String {
    let text = collapse_whitespace(&anchor.text().collect::<String>());
    if !text.is_empty() {
        return text;
    }
    anchor
        .value()
        .attr("title")
        .map(collapse_whitespace)
        .unwrap_or_default()
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn parse_selector(selector: &str) -> Result<Selector, AppError> {
    Selector::parse(selector)
        .map_err(|e| AppError::ConfigError(format!("Invalid selector '{selector}': {e}")))
}

fn parse_selectors(selectors: &[String]) -> Result<Vec<Selector>, AppError> {
    selectors.iter().map(|s| parse_selector(s)).collect()
}
