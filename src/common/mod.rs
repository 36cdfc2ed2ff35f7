pub use error::Error;

pub mod error;

pub const SHELL_NAME: &str = "jobsh";
