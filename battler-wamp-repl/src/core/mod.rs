pub mod arguments;
pub mod error;
pub mod options;
pub mod state;
