mod aggregator;
mod client;
mod links;
mod log_parser;
mod pagination;
mod provider;
mod scraper;
mod types;


pub use pagination::LookbackWindow;
pub use provider::{CircleCiProvider, ScanSettings};
pub use scraper::LogUrlStrategy;
pub use types::{JobNumber, ProjectSlug};
