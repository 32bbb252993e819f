pub mod bluesky;
pub mod client;
pub mod feed;
pub mod fetcher;
pub mod hackernews;
pub mod jobs;
pub mod registry;
pub mod scrape;
pub mod types;
pub mod util;

pub use fetcher::{fetch_all, fetch_source};
pub use registry::SourceRegistry;
pub use types::{Category, FetchOutput, RawItem, Source, SourceFetchResult, SourceType};
