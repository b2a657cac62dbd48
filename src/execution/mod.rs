pub mod sink;
pub mod types;
