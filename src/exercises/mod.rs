pub mod curriculum;
pub mod generators;
