pub mod evaluator;
pub mod types;
