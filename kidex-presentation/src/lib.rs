#![warn(clippy::uninlined_format_args)]

pub mod catalog_presenter;
pub mod report_presenter;
pub mod text_table;

pub use catalog_presenter::CatalogPresenter;
pub use report_presenter::{ReportContext, ReportPresenter};
