pub mod error_handling;
pub mod form_state;
pub mod http_client;
pub mod models;
pub mod paginator;
pub mod postback;
pub mod row_parser;

pub use error_handling::ScrapeError;
pub use form_state::{extract_session_state, FieldSet};
pub use http_client::HttpExecutor;
pub use models::{PageOutcome, QueryContext, Record, RunSummary, SessionState, TargetPeriod};
pub use paginator::{process_listing_page, NextLinkDiscovery, PaginationWalker};
