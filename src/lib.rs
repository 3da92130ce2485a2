pub mod config;
pub mod search;

pub use search::{compile, CompileError, CompileResult, Compiler};
