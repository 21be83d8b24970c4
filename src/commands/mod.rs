// Job service - the crate's API surface, one file per domain
pub mod jobs;

pub use jobs::*;
