mod notion;

pub use notion::{ExportStats, NotionExporter};
