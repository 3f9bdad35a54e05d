//! Stack Virtual Machine (SVM)
//!
//! Assembles the textual SVM assembly produced by the FOOL code generator
//! and executes it. Memory is a single array of integers: the stack grows
//! down from the top, the heap grows up from address 0.

pub mod assembler;
pub mod vm;

pub use assembler::{AsmError, assemble};
pub use vm::{Vm, VmError};

/// Default number of memory cells
pub const MEMSIZE: usize = 10_000;

/// Default maximum number of instructions
pub const CODESIZE: usize = 10_000;

/// Machine configuration shared by the code generator and the executor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VmConfig {
    pub memory_size: usize,
    pub code_size: usize,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            memory_size: MEMSIZE,
            code_size: CODESIZE,
        }
    }
}

/// A single SVM instruction with resolved operands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    /// push n, push label
    Push(i32),
    Pop,
    Add,
    Sub,
    Mult,
    Div,
    /// sw: pop address, pop value, store value at address
    StoreW,
    /// lw: pop address, push the value stored there
    LoadW,
    /// b label
    Branch(usize),
    /// beq label
    BranchEq(usize),
    /// bleq label
    BranchLessEq(usize),
    /// js: jump to popped address, saving the return address in $ra
    Js,
    LoadRa,
    StoreRa,
    LoadTm,
    StoreTm,
    LoadFp,
    StoreFp,
    /// cfp: $fp = $sp
    CopyFp,
    LoadHp,
    StoreHp,
    Print,
    Halt,
}

impl Instruction {
    /// Assembly mnemonic
    #[must_use]
    pub const fn mnemonic(self) -> &'static str {
        match self {
            Self::Push(_) => "push",
            Self::Pop => "pop",
            Self::Add => "add",
            Self::Sub => "sub",
            Self::Mult => "mult",
            Self::Div => "div",
            Self::StoreW => "sw",
            Self::LoadW => "lw",
            Self::Branch(_) => "b",
            Self::BranchEq(_) => "beq",
            Self::BranchLessEq(_) => "bleq",
            Self::Js => "js",
            Self::LoadRa => "lra",
            Self::StoreRa => "sra",
            Self::LoadTm => "ltm",
            Self::StoreTm => "stm",
            Self::LoadFp => "lfp",
            Self::StoreFp => "sfp",
            Self::CopyFp => "cfp",
            Self::LoadHp => "lhp",
            Self::StoreHp => "shp",
            Self::Print => "print",
            Self::Halt => "halt",
        }
    }
}
