mod error;
pub mod formula;
pub mod memory;
pub mod registers;
pub mod session;
pub mod value;

pub use xsym_trace as trace;

pub use error::XsymError;
pub use session::{InterpreterConfig, Session};
