pub mod fundamentals;
pub mod options_flow;
pub mod sentiment;
pub mod types;
