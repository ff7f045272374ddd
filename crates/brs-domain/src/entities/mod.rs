//! Domain entities

mod result_record;

pub use result_record::{ResultRecord, Timestamp};
