pub mod compiler;
pub mod constants;
pub mod loader;
pub mod parser;
pub mod runtime;

pub use self::{compiler::compile, loader::load, parser::parse};
