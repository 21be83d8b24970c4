// Data models (structs)
pub mod job;
pub mod pose;
pub mod skeleton;

pub use job::*;
pub use pose::*;
pub use skeleton::*;
