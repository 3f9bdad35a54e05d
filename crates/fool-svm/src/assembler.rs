//! SVM assembler
//!
//! Turns assembly text into a vector of instructions. Labels are resolved
//! in a second pass, so forward references are allowed.

use crate::Instruction;
use fool_ast::SourceMap;
use logos::Logos;
use std::collections::HashMap;

#[derive(Logos, Debug, PartialEq, Eq, Clone)]
#[logos(skip r"[ \t\r\n\f]+")]
#[logos(skip r"//[^\n]*")]
enum AsmToken {
    #[token("/*", skip_block_comment)]
    BlockComment,
    #[token("push")]
    Push,
    #[token("pop")]
    Pop,
    #[token("add")]
    Add,
    #[token("sub")]
    Sub,
    #[token("mult")]
    Mult,
    #[token("div")]
    Div,
    #[token("sw")]
    StoreW,
    #[token("lw")]
    LoadW,
    #[token("b", priority = 3)]
    Branch,
    #[token("beq")]
    BranchEq,
    #[token("bleq")]
    BranchLessEq,
    #[token("js")]
    Js,
    #[token("lra")]
    LoadRa,
    #[token("sra")]
    StoreRa,
    #[token("ltm")]
    LoadTm,
    #[token("stm")]
    StoreTm,
    #[token("lfp")]
    LoadFp,
    #[token("sfp")]
    StoreFp,
    #[token("cfp")]
    CopyFp,
    #[token("lhp")]
    LoadHp,
    #[token("shp")]
    StoreHp,
    #[token("print")]
    Print,
    #[token("halt")]
    Halt,
    #[token(":")]
    Colon,
    #[regex(r"-?(0|[1-9][0-9]*)", |lex| lex.slice().parse::<i32>().ok())]
    Number(i32),
    #[regex(r"[a-zA-Z][a-zA-Z0-9]*", |lex| lex.slice().to_string())]
    Label(String),
}

fn skip_block_comment(lex: &mut logos::Lexer<AsmToken>) -> logos::FilterResult<(), ()> {
    if let Some(end) = lex.remainder().find("*/") {
        lex.bump(end + 2);
        logos::FilterResult::Skip
    } else {
        lex.bump(lex.remainder().len());
        logos::FilterResult::Error(())
    }
}

/// Assembly errors
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum AsmError {
    #[error("line {line}: invalid token {text:?}")]
    InvalidToken { text: String, line: usize },

    #[error("line {line}: unexpected {text:?}")]
    UnexpectedToken { text: String, line: usize },

    #[error("line {line}: {mnemonic} requires an operand")]
    MissingOperand { mnemonic: &'static str, line: usize },

    #[error("line {line}: label {label} is not defined")]
    UndefinedLabel { label: String, line: usize },

    #[error("line {line}: label {label} is already defined")]
    DuplicateLabel { label: String, line: usize },

    #[error("program has {size} instructions, the code area holds {limit}")]
    CodeTooLarge { size: usize, limit: usize },
}

struct Fixup {
    index: usize,
    label: String,
    line: usize,
}

struct Assembler<'input> {
    tokens: std::iter::Peekable<logos::SpannedIter<'input, AsmToken>>,
    source: &'input str,
    source_map: SourceMap,
    code: Vec<Instruction>,
    labels: HashMap<String, usize>,
    fixups: Vec<Fixup>,
}

/// Assemble `source` into at most `code_size` instructions
///
/// # Errors
///
/// Returns `AsmError` on malformed assembly, unresolved or duplicate
/// labels, or when the program does not fit in the code area
pub fn assemble(source: &str, code_size: usize) -> Result<Vec<Instruction>, AsmError> {
    let mut assembler = Assembler {
        tokens: AsmToken::lexer(source).spanned().peekable(),
        source,
        source_map: SourceMap::new(source),
        code: Vec::new(),
        labels: HashMap::new(),
        fixups: Vec::new(),
    };
    assembler.run()?;

    if assembler.code.len() > code_size {
        return Err(AsmError::CodeTooLarge {
            size: assembler.code.len(),
            limit: code_size,
        });
    }
    tracing::debug!(
        instructions = assembler.code.len(),
        labels = assembler.labels.len(),
        "assembled program"
    );
    Ok(assembler.code)
}

impl Assembler<'_> {
    fn run(&mut self) -> Result<(), AsmError> {
        while let Some((token, span)) = self.tokens.next() {
            let line = self.source_map.line(span.start);
            let Ok(token) = token else {
                return Err(AsmError::InvalidToken {
                    text: self.source[span].to_string(),
                    line,
                });
            };
            let instruction = match token {
                AsmToken::BlockComment => continue,
                AsmToken::Label(label) => {
                    self.define_label(label, line)?;
                    continue;
                }
                AsmToken::Colon => {
                    return Err(AsmError::UnexpectedToken {
                        text: ":".to_string(),
                        line,
                    });
                }
                AsmToken::Number(n) => {
                    return Err(AsmError::UnexpectedToken {
                        text: n.to_string(),
                        line,
                    });
                }
                AsmToken::Push => match self.tokens.next() {
                    Some((Ok(AsmToken::Number(n)), _)) => Instruction::Push(n),
                    Some((Ok(AsmToken::Label(label)), _)) => {
                        self.fixup(label, line);
                        Instruction::Push(0)
                    }
                    _ => {
                        return Err(AsmError::MissingOperand {
                            mnemonic: "push",
                            line,
                        });
                    }
                },
                AsmToken::Branch => self.jump(Instruction::Branch(0), line)?,
                AsmToken::BranchEq => self.jump(Instruction::BranchEq(0), line)?,
                AsmToken::BranchLessEq => self.jump(Instruction::BranchLessEq(0), line)?,
                AsmToken::Pop => Instruction::Pop,
                AsmToken::Add => Instruction::Add,
                AsmToken::Sub => Instruction::Sub,
                AsmToken::Mult => Instruction::Mult,
                AsmToken::Div => Instruction::Div,
                AsmToken::StoreW => Instruction::StoreW,
                AsmToken::LoadW => Instruction::LoadW,
                AsmToken::Js => Instruction::Js,
                AsmToken::LoadRa => Instruction::LoadRa,
                AsmToken::StoreRa => Instruction::StoreRa,
                AsmToken::LoadTm => Instruction::LoadTm,
                AsmToken::StoreTm => Instruction::StoreTm,
                AsmToken::LoadFp => Instruction::LoadFp,
                AsmToken::StoreFp => Instruction::StoreFp,
                AsmToken::CopyFp => Instruction::CopyFp,
                AsmToken::LoadHp => Instruction::LoadHp,
                AsmToken::StoreHp => Instruction::StoreHp,
                AsmToken::Print => Instruction::Print,
                AsmToken::Halt => Instruction::Halt,
            };
            self.code.push(instruction);
        }
        self.resolve()
    }

    fn define_label(&mut self, label: String, line: usize) -> Result<(), AsmError> {
        match self.tokens.next() {
            Some((Ok(AsmToken::Colon), _)) => {}
            _ => return Err(AsmError::UnexpectedToken { text: label, line }),
        }
        if self.labels.insert(label.clone(), self.code.len()).is_some() {
            return Err(AsmError::DuplicateLabel { label, line });
        }
        Ok(())
    }

    fn jump(&mut self, instruction: Instruction, line: usize) -> Result<Instruction, AsmError> {
        match self.tokens.next() {
            Some((Ok(AsmToken::Label(label)), _)) => {
                self.fixup(label, line);
                Ok(instruction)
            }
            _ => Err(AsmError::MissingOperand {
                mnemonic: instruction.mnemonic(),
                line,
            }),
        }
    }

    fn fixup(&mut self, label: String, line: usize) {
        self.fixups.push(Fixup {
            index: self.code.len(),
            label,
            line,
        });
    }

    fn resolve(&mut self) -> Result<(), AsmError> {
        for fixup in self.fixups.drain(..) {
            let Some(&address) = self.labels.get(&fixup.label) else {
                return Err(AsmError::UndefinedLabel {
                    label: fixup.label,
                    line: fixup.line,
                });
            };
            let instruction = &mut self.code[fixup.index];
            *instruction = match *instruction {
                Instruction::Push(_) => Instruction::Push(i32::try_from(address).map_err(|_| {
                    AsmError::CodeTooLarge {
                        size: address,
                        limit: i32::MAX as usize,
                    }
                })?),
                Instruction::Branch(_) => Instruction::Branch(address),
                Instruction::BranchEq(_) => Instruction::BranchEq(address),
                Instruction::BranchLessEq(_) => Instruction::BranchLessEq(address),
                other => other,
            };
        }
        Ok(())
    }
}
