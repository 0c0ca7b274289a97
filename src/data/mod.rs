pub mod historical;
pub mod prepare;
pub mod row;

pub use historical::load_series;
pub use row::Row;
