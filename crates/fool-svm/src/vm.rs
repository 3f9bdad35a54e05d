//! SVM executor

use crate::{Instruction, VmConfig};
use std::io::Write;

/// Runtime faults
#[derive(thiserror::Error, Debug)]
pub enum VmError {
    #[error("out of memory at instruction {ip}")]
    OutOfMemory { ip: usize },

    #[error("stack underflow at instruction {ip}")]
    StackUnderflow { ip: usize },

    #[error("division by zero at instruction {ip}")]
    DivisionByZero { ip: usize },

    #[error("invalid memory address {address} at instruction {ip}")]
    InvalidAddress { address: i32, ip: usize },

    #[error("invalid jump target {address} at instruction {ip}")]
    InvalidJump { address: i32, ip: usize },

    #[error("execution ran past the end of the code")]
    MissingHalt,

    #[error("memory size {0} is not addressable")]
    InvalidMemorySize(usize),

    #[error("failed to write output: {0}")]
    Output(#[from] std::io::Error),
}

/// Stack virtual machine
pub struct Vm {
    code: Vec<Instruction>,
    memory: Vec<i32>,
    ip: usize,
    sp: usize,
    hp: i32,
    fp: i32,
    ra: i32,
    tm: i32,
    steps: u64,
}

impl Vm {
    /// Create a machine loaded with `code`
    ///
    /// # Errors
    ///
    /// Returns `VmError::InvalidMemorySize` if the memory cannot be addressed
    /// with 32-bit words
    pub fn new(code: Vec<Instruction>, config: VmConfig) -> Result<Self, VmError> {
        let memory_top = i32::try_from(config.memory_size)
            .map_err(|_| VmError::InvalidMemorySize(config.memory_size))?;
        Ok(Self {
            code,
            memory: vec![0; config.memory_size],
            ip: 0,
            sp: config.memory_size,
            hp: 0,
            fp: memory_top,
            ra: 0,
            tm: 0,
            steps: 0,
        })
    }

    /// Run until `halt`, writing printed values to `out`
    ///
    /// # Errors
    ///
    /// Returns `VmError` on any runtime fault
    pub fn run<W: Write>(&mut self, out: &mut W) -> Result<(), VmError> {
        loop {
            let instruction = *self.code.get(self.ip).ok_or(VmError::MissingHalt)?;
            let at = self.ip;
            self.ip += 1;
            self.steps += 1;
            tracing::trace!(ip = at, sp = self.sp, ?instruction, "step");

            match instruction {
                Instruction::Push(value) => self.push(value, at)?,
                Instruction::Pop => {
                    self.pop(at)?;
                }
                Instruction::Add => {
                    let (v2, v1) = self.pop_pair(at)?;
                    self.push(v2.wrapping_add(v1), at)?;
                }
                Instruction::Sub => {
                    let (v2, v1) = self.pop_pair(at)?;
                    self.push(v2.wrapping_sub(v1), at)?;
                }
                Instruction::Mult => {
                    let (v2, v1) = self.pop_pair(at)?;
                    self.push(v2.wrapping_mul(v1), at)?;
                }
                Instruction::Div => {
                    let (v2, v1) = self.pop_pair(at)?;
                    if v1 == 0 {
                        return Err(VmError::DivisionByZero { ip: at });
                    }
                    self.push(v2.wrapping_div(v1), at)?;
                }
                Instruction::StoreW => {
                    let address = self.pop(at)?;
                    let value = self.pop(at)?;
                    let cell = self.cell(address, at)?;
                    self.memory[cell] = value;
                }
                Instruction::LoadW => {
                    let address = self.pop(at)?;
                    let cell = self.cell(address, at)?;
                    self.push(self.memory[cell], at)?;
                }
                Instruction::Branch(address) => self.ip = address,
                Instruction::BranchEq(address) => {
                    let (v2, v1) = self.pop_pair(at)?;
                    if v2 == v1 {
                        self.ip = address;
                    }
                }
                Instruction::BranchLessEq(address) => {
                    let (v2, v1) = self.pop_pair(at)?;
                    if v2 <= v1 {
                        self.ip = address;
                    }
                }
                Instruction::Js => {
                    let address = self.pop(at)?;
                    let target = usize::try_from(address)
                        .ok()
                        .filter(|target| *target < self.code.len())
                        .ok_or(VmError::InvalidJump { address, ip: at })?;
                    self.ra = i32::try_from(self.ip)
                        .map_err(|_| VmError::InvalidJump { address, ip: at })?;
                    self.ip = target;
                }
                Instruction::LoadRa => self.push(self.ra, at)?,
                Instruction::StoreRa => self.ra = self.pop(at)?,
                Instruction::LoadTm => self.push(self.tm, at)?,
                Instruction::StoreTm => self.tm = self.pop(at)?,
                Instruction::LoadFp => self.push(self.fp, at)?,
                Instruction::StoreFp => self.fp = self.pop(at)?,
                Instruction::CopyFp => {
                    self.fp = i32::try_from(self.sp)
                        .map_err(|_| VmError::InvalidMemorySize(self.memory.len()))?;
                }
                Instruction::LoadHp => self.push(self.hp, at)?,
                Instruction::StoreHp => self.hp = self.pop(at)?,
                Instruction::Print => {
                    match self.memory.get(self.sp) {
                        Some(top) => writeln!(out, "{top}")?,
                        None => writeln!(out, "Empty stack!")?,
                    }
                }
                Instruction::Halt => {
                    tracing::debug!(steps = self.steps, "halted");
                    return Ok(());
                }
            }

            if i64::try_from(self.sp).unwrap_or(i64::MAX) <= i64::from(self.hp) {
                return Err(VmError::OutOfMemory { ip: at });
            }
        }
    }

    /// Value on top of the stack, if any
    #[must_use]
    pub fn top(&self) -> Option<i32> {
        self.memory.get(self.sp).copied()
    }

    /// Number of instructions executed so far
    #[must_use]
    pub const fn steps(&self) -> u64 {
        self.steps
    }

    fn push(&mut self, value: i32, at: usize) -> Result<(), VmError> {
        if self.sp == 0 {
            return Err(VmError::OutOfMemory { ip: at });
        }
        self.sp -= 1;
        self.memory[self.sp] = value;
        Ok(())
    }

    fn pop(&mut self, at: usize) -> Result<i32, VmError> {
        let value = *self
            .memory
            .get(self.sp)
            .ok_or(VmError::StackUnderflow { ip: at })?;
        self.sp += 1;
        Ok(value)
    }

    /// Pops `v1` then `v2` and returns `(v2, v1)`
    fn pop_pair(&mut self, at: usize) -> Result<(i32, i32), VmError> {
        let v1 = self.pop(at)?;
        let v2 = self.pop(at)?;
        Ok((v2, v1))
    }

    fn cell(&self, address: i32, at: usize) -> Result<usize, VmError> {
        usize::try_from(address)
            .ok()
            .filter(|cell| *cell < self.memory.len())
            .ok_or(VmError::InvalidAddress { address, ip: at })
    }
}
