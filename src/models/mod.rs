pub mod record;

pub use record::{NewRecord, RecordSummary, ScreenshotRecord};
