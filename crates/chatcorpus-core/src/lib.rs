pub mod builder;
pub mod config;
pub mod error;
pub mod ingest;
pub mod linker;
pub mod redact;
pub mod sampler;
pub mod similarity;
pub mod trigger;

pub use builder::*;
pub use config::*;
pub use error::*;
pub use ingest::*;
pub use linker::*;
pub use redact::*;
pub use sampler::*;
pub use similarity::*;
pub use trigger::*;
