//! Official disaster updates.
//!
//! [`FeedSource::Official`] scrapes the FEMA press release listing and
//! the Red Cross news listing concurrently. [`FeedSource::Static`]
//! returns a fixed payload for offline runs and tests. Caching is the
//! caller's concern; every call here hits the source.

use relief_core::config::UpstreamConfig;
use reqwest::Url;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};

use crate::error::UpstreamError;

/// One headline from an official listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedItem {
    /// Headline text.
    pub title: String,
    /// Absolute link to the full item.
    pub link: String,
    /// Publication date as printed on the listing.
    pub date: String,
}

/// Headlines from every official source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfficialUpdates {
    /// FEMA press releases.
    pub fema: Vec<FeedItem>,
    /// Red Cross news.
    pub redcross: Vec<FeedItem>,
}

/// CSS selectors describing one listing page.
#[derive(Debug, Clone, Copy)]
struct Listing {
    service: &'static str,
    item: &'static str,
    title: &'static str,
    date: &'static str,
}

const FEMA: Listing = Listing {
    service: "fema",
    item: ".views-row",
    title: ".card__title",
    date: ".datetime",
};

const RED_CROSS: Listing = Listing {
    service: "redcross",
    item: ".m-card--news",
    title: ".m-card--news__title",
    date: ".m-card--news__date",
};

/// Where official updates come from.
#[derive(Debug, Clone)]
pub enum FeedSource {
    /// Live scraping of the configured listing pages.
    Official(OfficialFeeds),
    /// A fixed payload.
    Static(OfficialUpdates),
}

impl FeedSource {
    /// Build the source selected by `config.live`.
    ///
    /// # Errors
    ///
    /// Returns [`UpstreamError`] if a listing URL is invalid or the HTTP
    /// client cannot be constructed.
    pub fn from_config(config: &UpstreamConfig) -> Result<Self, UpstreamError> {
        if config.live {
            Ok(Self::Official(OfficialFeeds::new(config)?))
        } else {
            Ok(Self::Static(OfficialUpdates::default()))
        }
    }

    /// Fetch every listing.
    ///
    /// # Errors
    ///
    /// Returns [`UpstreamError`] if any listing cannot be fetched or
    /// parsed; partial results are discarded.
    pub async fn fetch_all(&self) -> Result<OfficialUpdates, UpstreamError> {
        match self {
            Self::Official(feeds) => feeds.fetch_all().await,
            Self::Static(updates) => Ok(updates.clone()),
        }
    }
}

/// Scraper for the FEMA and Red Cross listings.
#[derive(Debug, Clone)]
pub struct OfficialFeeds {
    client: reqwest::Client,
    fema_url: Url,
    red_cross_url: Url,
}

impl OfficialFeeds {
    /// Create a scraper for the listing URLs in `config`.
    ///
    /// # Errors
    ///
    /// Returns [`UpstreamError`] if a listing URL is invalid or the HTTP
    /// client cannot be constructed.
    pub fn new(config: &UpstreamConfig) -> Result<Self, UpstreamError> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(config.request_timeout())
            .build()
            .map_err(|source| UpstreamError::Request {
                service: "feeds",
                source,
            })?;
        Ok(Self {
            client,
            fema_url: parse_url(FEMA.service, &config.fema_url)?,
            red_cross_url: parse_url(RED_CROSS.service, &config.red_cross_url)?,
        })
    }

    async fn fetch_all(&self) -> Result<OfficialUpdates, UpstreamError> {
        let (fema, redcross) = futures::future::join(
            self.fetch_listing(&self.fema_url, FEMA),
            self.fetch_listing(&self.red_cross_url, RED_CROSS),
        )
        .await;
        Ok(OfficialUpdates {
            fema: fema?,
            redcross: redcross?,
        })
    }

    async fn fetch_listing(&self, url: &Url, listing: Listing) -> Result<Vec<FeedItem>, UpstreamError> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|source| UpstreamError::Request {
                service: listing.service,
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unable to read error body".to_owned());
            return Err(UpstreamError::Status {
                service: listing.service,
                status,
                body,
            });
        }

        let html = response.text().await.map_err(|source| UpstreamError::Request {
            service: listing.service,
            source,
        })?;
        let items = extract_items(&html, url, listing)?;
        tracing::debug!(service = listing.service, count = items.len(), "Listing scraped");
        Ok(items)
    }
}

fn parse_url(service: &'static str, raw: &str) -> Result<Url, UpstreamError> {
    Url::parse(raw).map_err(|e| UpstreamError::Parse {
        service,
        detail: format!("listing url {raw:?}: {e}"),
    })
}

fn selector(service: &'static str, css: &str) -> Result<Selector, UpstreamError> {
    Selector::parse(css).map_err(|e| UpstreamError::Parse {
        service,
        detail: format!("selector {css:?}: {e}"),
    })
}

/// Pull every item with both a title and a link out of a listing page.
/// Relative links resolve against `page`.
fn extract_items(html: &str, page: &Url, listing: Listing) -> Result<Vec<FeedItem>, UpstreamError> {
    let item_sel = selector(listing.service, listing.item)?;
    let title_sel = selector(listing.service, listing.title)?;
    let date_sel = selector(listing.service, listing.date)?;
    let link_sel = selector(listing.service, "a[href]")?;

    let document = Html::parse_document(html);
    let items = document
        .select(&item_sel)
        .filter_map(|element| {
            let title = first_text(element, &title_sel)?;
            let href = element.select(&link_sel).next()?.value().attr("href")?;
            let link = page.join(href).ok()?;
            Some(FeedItem {
                title,
                link: link.into(),
                date: first_text(element, &date_sel).unwrap_or_default(),
            })
        })
        .collect();
    Ok(items)
}

fn first_text(element: ElementRef<'_>, sel: &Selector) -> Option<String> {
    let text = element
        .select(sel)
        .next()?
        .text()
        .collect::<Vec<_>>()
        .join(" ");
    let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
    (!text.is_empty()).then_some(text)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const FEMA_PAGE: &str = r#"
        <div class="views-row">
          <h3 class="card__title"><a href="/press-release/20260501/flood">
            Flood Assistance Approved </a></h3>
          <time class="datetime">May 1, 2026</time>
        </div>
        <div class="views-row">
          <h3 class="card__title">No link here</h3>
        </div>
        <div class="views-row">
          <a href="/press-release/untitled">untitled</a>
        </div>"#;

    const RED_CROSS_PAGE: &str = r#"
        <div class="m-card--news">
          <a href="https://www.redcross.org/news/shelters-open.html">
            <span class="m-card--news__title">Shelters Open in Brooklyn</span>
          </a>
          <span class="m-card--news__date">Apr 30, 2026</span>
        </div>"#;

    fn url(raw: &str) -> Url {
        Url::parse(raw).unwrap()
    }

    #[test]
    fn fema_items_need_title_and_link() {
        let page = url("https://www.fema.gov/about/news-multimedia/press-releases");
        let items = extract_items(FEMA_PAGE, &page, FEMA).unwrap();
        assert_eq!(
            items,
            vec![FeedItem {
                title: String::from("Flood Assistance Approved"),
                link: String::from("https://www.fema.gov/press-release/20260501/flood"),
                date: String::from("May 1, 2026"),
            }]
        );
    }

    #[test]
    fn red_cross_absolute_links_are_kept() {
        let page = url("https://www.redcross.org/about-us/news-and-events/news.html");
        let items = extract_items(RED_CROSS_PAGE, &page, RED_CROSS).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(
            items.first().map(|item| item.link.as_str()),
            Some("https://www.redcross.org/news/shelters-open.html")
        );
        assert_eq!(
            items.first().map(|item| item.date.as_str()),
            Some("Apr 30, 2026")
        );
    }

    #[tokio::test]
    async fn static_source_returns_its_payload() {
        let payload = OfficialUpdates {
            fema: vec![FeedItem {
                title: String::from("t"),
                link: String::from("https://example.org/t"),
                date: String::new(),
            }],
            redcross: Vec::new(),
        };
        let source = FeedSource::Static(payload.clone());
        assert_eq!(source.fetch_all().await.ok(), Some(payload));
    }
}
