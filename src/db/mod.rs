pub mod accumulate;
pub mod core;
pub mod digest;
pub mod health;
pub mod schema;
pub mod usage;

pub use accumulate::AccumulatedItem;
pub use core::Database;
pub use digest::{DigestItemRecord, DigestRecord, NewDigestItem};
pub use health::SourceHealthRecord;
