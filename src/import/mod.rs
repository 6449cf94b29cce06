//! CSV product import pipeline: parser, field mapper, duplicate resolver and driver.
pub mod driver;
pub mod mapper;
pub mod parser;
pub mod resolver;

pub use driver::{ImportDriver, ImportOptions};
pub use mapper::{looks_like_data_row, ColumnLayout, FieldMapper, MappedRow, RowError};
pub use parser::{parse_line, split_lines};
pub use resolver::{DuplicatePolicy, DuplicateResolver, Resolution};
