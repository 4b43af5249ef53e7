//! Flickr photo search locator fetcher.
//!
//! Uses the `flickr.photos.search` REST method to list photos taken near a
//! location and returns the URL of one size variant for each photo.
//!
//! # API Endpoint
//!
//! `https://www.flickr.com/services/rest/?method=flickr.photos.search&api_key={key}&lat={lat}&lon={lon}&page=1&per_page={n}&format=json&nojsoncallback=1&extras={size}`
//!
//! - `extras={size}` asks Flickr to include the URL of that size (`url_n` is
//!   320px on the longest side, `url_t` is the 100px thumbnail)
//! - `nojsoncallback=1` returns bare JSON instead of a JSONP wrapper
//!
//! # Responses
//!
//! Flickr answers with HTTP 200 in both cases and signals the outcome in the
//! `stat` field:
//!
//! ```text
//! {"stat":"ok","photos":{"page":1,"pages":8,"perpage":25,"total":200,"photo":[{"title":"..","url_n":".."}]}}
//! {"stat":"fail","code":100,"message":"Invalid API Key (Key has invalid format)"}
//! ```

use std::sync::OnceLock;

use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, info};
use url::Url;

use crate::coord::LocationKey;
use crate::provider::{AsyncHttpClient, FetchError, HttpError, LocatorFetcher};

/// Default Flickr REST endpoint.
pub const DEFAULT_BASE_URL: &str = "https://www.flickr.com/services/rest/";

/// Photos requested per location. Only the first page is ever fetched.
pub const DEFAULT_PER_PAGE: u32 = 25;

/// Size variant whose URL is returned for each photo.
pub const DEFAULT_SIZE_EXTRA: &str = "url_n";

fn default_base_url() -> &'static Url {
    static BASE_URL: OnceLock<Url> = OnceLock::new();
    BASE_URL.get_or_init(|| Url::parse(DEFAULT_BASE_URL).expect("default base URL is valid"))
}

#[derive(Debug, Deserialize)]
#[serde(tag = "stat", rename_all = "lowercase")]
enum SearchResponse {
    Ok { photos: PhotoPage },
    Fail { code: i64, message: String },
}

#[derive(Debug, Deserialize)]
struct PhotoPage {
    #[serde(default)]
    page: u32,
    #[serde(default)]
    pages: u32,
    photo: Vec<Map<String, Value>>,
}

/// Lists photo URLs near a location using Flickr's photo search.
///
/// # Example
///
/// ```no_run
/// use tourcache::coord::LocationKey;
/// use tourcache::provider::{FlickrLocatorFetcher, LocatorFetcher, ReqwestClient};
///
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let client = ReqwestClient::new()?;
/// let fetcher = FlickrLocatorFetcher::new(client, "YOUR_API_KEY");
/// let urls = fetcher.fetch_locators(&LocationKey::new(51.5, -0.12)?).await?;
/// # Ok(())
/// # }
/// ```
pub struct FlickrLocatorFetcher<C: AsyncHttpClient> {
    http_client: C,
    api_key: String,
    base_url: Url,
    per_page: u32,
    size_extra: String,
}

impl<C: AsyncHttpClient> FlickrLocatorFetcher<C> {
    /// Creates a fetcher against the public Flickr endpoint.
    pub fn new(http_client: C, api_key: impl Into<String>) -> Self {
        Self {
            http_client,
            api_key: api_key.into(),
            base_url: default_base_url().clone(),
            per_page: DEFAULT_PER_PAGE,
            size_extra: DEFAULT_SIZE_EXTRA.to_string(),
        }
    }

    /// Points the fetcher at a different endpoint (a proxy or a test server).
    pub fn with_base_url(mut self, base_url: &str) -> Result<Self, url::ParseError> {
        self.base_url = Url::parse(base_url)?;
        Ok(self)
    }

    /// Sets the number of photos requested per location.
    pub fn with_per_page(mut self, per_page: u32) -> Self {
        self.per_page = per_page.max(1);
        self
    }

    /// Sets the size variant, e.g. `url_t` for thumbnails.
    pub fn with_size_extra(mut self, size_extra: impl Into<String>) -> Self {
        self.size_extra = size_extra.into();
        self
    }

    /// Builds the search URL for the given location.
    fn build_url(&self, location: &LocationKey) -> String {
        let mut url = self.base_url.clone();
        url.query_pairs_mut()
            .append_pair("method", "flickr.photos.search")
            .append_pair("api_key", &self.api_key)
            .append_pair("lat", &location.latitude().to_string())
            .append_pair("lon", &location.longitude().to_string())
            .append_pair("page", "1")
            .append_pair("per_page", &self.per_page.to_string())
            .append_pair("format", "json")
            .append_pair("nojsoncallback", "1")
            .append_pair("extras", &self.size_extra);
        url.into()
    }

    /// Extracts locators from a response body.
    fn parse_body(&self, body: &[u8]) -> Result<Vec<String>, FetchError> {
        let response: SearchResponse =
            serde_json::from_slice(body).map_err(|e| FetchError::Decode(e.to_string()))?;

        match response {
            SearchResponse::Ok { photos } => {
                let total = photos.photo.len();
                let urls: Vec<String> = photos
                    .photo
                    .into_iter()
                    .filter_map(|photo| match photo.get(&self.size_extra) {
                        Some(Value::String(url)) if !url.is_empty() => Some(url.clone()),
                        _ => None,
                    })
                    .collect();

                if urls.len() < total {
                    debug!(
                        skipped = total - urls.len(),
                        size = %self.size_extra,
                        "Photos without requested size skipped"
                    );
                }
                debug!(page = photos.page, pages = photos.pages, "Search page decoded");
                Ok(urls)
            }
            SearchResponse::Fail { code, message } => Err(FetchError::Remote { code, message }),
        }
    }
}

impl<C: AsyncHttpClient> LocatorFetcher for FlickrLocatorFetcher<C> {
    async fn fetch_locators(&self, location: &LocationKey) -> Result<Vec<String>, FetchError> {
        let url = self.build_url(location);

        let body = match self.http_client.get(&url).await {
            Ok(body) => body,
            Err(HttpError::Status { status, body, .. }) => {
                // Error statuses may still carry a Flickr failure document
                return match self.parse_body(&body) {
                    Err(remote @ FetchError::Remote { .. }) => Err(remote),
                    _ => Err(FetchError::Network(format!("HTTP {}", status))),
                };
            }
            Err(HttpError::Transport { reason, .. }) => {
                return Err(FetchError::Network(reason));
            }
        };

        let urls = self.parse_body(&body)?;
        info!(location = %location, count = urls.len(), "Photo search complete");
        Ok(urls)
    }

    fn name(&self) -> &str {
        "Flickr"
    }
}
