use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

const JUMPS: [&str; 33] = [
    "jmp", "jz", "jbe", "jo", "jno", "js", "jns", "je", "jne", "jnz", "jb", "jnae", "jc", "jnb",
    "jae", "jnc", "jna", "ja", "jnbe", "jl", "jnge", "jge", "jnl", "jle", "jng", "jg", "jnle",
    "jp", "jpe", "jnp", "jpo", "jcxz", "jecxz",
];

/// Settings owned by one interpreter session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterpreterConfig {
    /// Mnemonics that only affect control flow or flags. They are skipped without touching
    /// registers or memory.
    pub skip: BTreeSet<String>,
}

impl InterpreterConfig {
    pub fn skips(&self, mnemonic: &str) -> bool {
        self.skip.contains(mnemonic)
    }

    pub fn with_skipped<S: Into<String>>(mut self, mnemonic: S) -> Self {
        self.skip.insert(mnemonic.into());
        self
    }
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        let skip = ["test", "ret", "cmp", "call"]
            .into_iter()
            .chain(JUMPS)
            .map(str::to_string)
            .collect();
        Self { skip }
    }
}
