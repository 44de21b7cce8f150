pub mod field;
pub mod item;
pub mod plan;
