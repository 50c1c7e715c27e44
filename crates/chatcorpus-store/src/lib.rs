pub mod export;
pub mod log;

pub use export::{ExportPaths, ExportWriter};
pub use log::{LogSnapshot, MessageLogReader, MessageLogWriter};
