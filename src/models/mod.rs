pub mod batch_result;
pub mod bill;
pub mod loaders;
pub mod render_job;
pub mod workbook;

pub use batch_result::{Artifact, BatchResult, BatchSummary, FileStatus, SkippedArtifact};
pub use bill::{BillHeader, BillLines, BillModel, HeaderFields, LineItem, NumericCell};
pub use loaders::load_workbook;
pub use render_job::{DocumentType, OutputFormat, RenderJob, RenderStatus};
pub use workbook::{CellValue, Sheet, Workbook};
