pub mod workbook_loader;

pub use workbook_loader::load_workbook;
