pub mod directory;
pub mod generator;
pub mod log;
pub mod registry;
