pub mod file;
pub mod transaction;
