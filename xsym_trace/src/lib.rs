pub(crate) mod error;
pub(crate) mod instruction;
pub(crate) mod operand;
pub(crate) mod register;

pub use error::TraceError;
pub use instruction::Instruction;
pub use operand::{AddressForm, Displacement, MemoryOperand, Operand, parse_hex};
pub use register::{Gpr, RegisterSnapshot, RegisterView};
