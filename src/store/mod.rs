//! Durable, category-partitioned storage: one pretty-printed JSON document
//! per record, plus append-only observability logs.

mod logs;
mod records;

pub use logs::LogSink;
pub use records::RecordStore;
