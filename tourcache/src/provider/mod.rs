//! Remote locator providers
//!
//! This module provides the [`LocatorFetcher`] trait, which lists remote
//! resource locators (photo URLs) for a location, and the HTTP client
//! abstraction shared by the fetcher and the payload downloader.
//!
//! ```ignore
//! use tourcache::provider::{FlickrLocatorFetcher, ReqwestClient};
//!
//! let http_client = ReqwestClient::with_timeout(30)?;
//! let fetcher = FlickrLocatorFetcher::new(http_client, api_key).with_per_page(25);
//! ```

mod flickr;
mod http;
mod types;

pub use flickr::{FlickrLocatorFetcher, DEFAULT_BASE_URL, DEFAULT_PER_PAGE, DEFAULT_SIZE_EXTRA};
pub use http::{AsyncHttpClient, HttpError, ReqwestClient, DEFAULT_TIMEOUT_SECS};
pub use types::{FetchError, LocatorFetcher};

#[cfg(test)]
pub use http::tests::MockAsyncHttpClient;
