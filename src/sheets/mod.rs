//! Spreadsheet side of the pipeline: finding the target sheet, the
//! watermark cells and the append-only data rows.

pub mod locate;
pub mod watermark;
pub mod writer;

pub use locate::{find_by_name, find_or_create, SheetHandle, DEFAULT_SHEET_NAME};
pub use watermark::{WatermarkStore, WATERMARK_RANGE};
pub use writer::append_rows;
