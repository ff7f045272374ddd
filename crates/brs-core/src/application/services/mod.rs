//! Application services: result log, single-flight queue, fetcher and the
//! protocol orchestrator tying them to connections

pub mod fetcher;
pub mod result_log;
pub mod single_flight;
pub mod stream_service;

pub use fetcher::{HostEvent, ResultFetcher};
pub use result_log::{Clock, ManualClock, ResultLog, SystemClock};
pub use single_flight::{Completion, FetchError, SingleFlight, UpstreamFetch};
pub use stream_service::{COMMANDS_MESSAGE_TYPE, ResultStreamService};
