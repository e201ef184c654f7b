//! Relay engine.
//!
//! Resolves user input to a destination, fetches it and optionally strips ads.

pub mod engine;
pub mod fetcher;
pub mod resolver;

pub use engine::{AllowAll, DomainPolicy, RelayEngine, RelayMode, RelayOutcome, RelayRequest};
pub use fetcher::{Fetcher, HttpFetcher, RelayPayload, RelayResult, ScreeningResolver};
pub use resolver::{ResolvedTarget, SEARCH_ENGINES, SearchEngine, resolve};
