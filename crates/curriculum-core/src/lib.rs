pub mod config;
pub mod error;
pub mod gesture;
pub mod io;
pub mod ordering;
pub mod paths;
pub mod progress;
pub mod state;
pub mod types;

pub use error::{CurriculumError, Result};
