pub mod import;
pub mod persist;
