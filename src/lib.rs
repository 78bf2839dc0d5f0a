pub mod error;
pub mod instruction;
pub mod interpreter;
pub mod loader;
pub mod memory;
pub mod register;

pub use error::{UmError, UmResult};
pub use interpreter::{Interpreter, Termination};
