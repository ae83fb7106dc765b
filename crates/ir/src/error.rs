//! Error types for parsing and structural verification.

use thiserror::Error;

/// Error while parsing textual IR.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("line {line}: expected function header, found: {content}")]
    ExpectedFunction { line: usize, content: String },
    #[error("line {line}: malformed function header: {content}")]
    MalformedHeader { line: usize, content: String },
    #[error("line {line}: unknown type '{ty}'")]
    UnknownType { line: usize, ty: String },
    #[error("line {line}: unknown instruction '{mnemonic}'")]
    UnknownInstruction { line: usize, mnemonic: String },
    #[error("line {line}: malformed instruction: {content}")]
    MalformedInstruction { line: usize, content: String },
    #[error("line {line}: undefined value '%{name}'")]
    UndefinedValue { line: usize, name: String },
    #[error("line {line}: undefined label '%{label}'")]
    UndefinedLabel { line: usize, label: String },
    #[error("line {line}: duplicate value name '%{name}'")]
    DuplicateValue { line: usize, name: String },
    #[error("line {line}: duplicate label '{label}'")]
    DuplicateLabel { line: usize, label: String },
    #[error("line {line}: instruction outside any block")]
    InstructionOutsideBlock { line: usize },
    #[error("line {line}: unexpected end of function")]
    UnexpectedEof { line: usize },
    #[error("function '{function}': block '{block}' has no terminator")]
    MissingTerminator { function: String, block: String },
}

/// A structural defect found by the IR verifier.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerifyError {
    #[error("function '{function}' has no blocks")]
    EmptyFunction { function: String },
    #[error("function '{function}': block '{block}' is empty")]
    EmptyBlock { function: String, block: String },
    #[error("function '{function}': block '{block}' does not end in a terminator")]
    MissingTerminator { function: String, block: String },
    #[error("function '{function}': block '{block}' has a terminator before its end")]
    EarlyTerminator { function: String, block: String },
    #[error("function '{function}': block '{block}' has a phi after a non-phi instruction")]
    MisplacedPhi { function: String, block: String },
    #[error(
        "function '{function}': phi in block '{block}' names '{pred}' which is not a predecessor"
    )]
    PhiBadPredecessor {
        function: String,
        block: String,
        pred: String,
    },
    #[error("function '{function}': use of '%{value}' is not dominated by its definition")]
    UseNotDominated { function: String, value: String },
    #[error("function '{function}': operand references argument #{index} out of range")]
    ArgOutOfRange { function: String, index: usize },
}
