pub mod alphabet;
pub mod backend;
pub mod hash_matcher;
pub mod overlap;
pub mod pg_index;
pub mod pg_matcher;
pub mod progress;
pub mod pseudogenome;
pub mod reads;
pub mod reads_matcher;
mod stats;

#[doc(hidden)]
pub mod _internal_test_data;
