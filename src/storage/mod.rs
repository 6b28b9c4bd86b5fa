//! Record store interface.
//!
//! The engine never parses uploads itself; it reads normalized work orders
//! through [`RecordStore`]. [`InMemoryRecordStore`] backs the CLI and tests.

mod records;

pub use records::*;
