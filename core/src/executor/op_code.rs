//! Bytecode instructions
//!
//! The compiler emits a flat `Vec<Op>` per function. Jump targets are
//! absolute instruction indices within the same function.

use std::fmt;
use std::sync::Arc;

use super::types::ForLoopKind;

#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    OpNull,
    OpTrue,
    OpFalse,
    OpNum(f64),
    OpStr(Arc<str>),
    OpPop,

    OpGetLocal(u16),
    /// Pops the value into the slot
    OpSetLocal(u16),
    OpGetCapture(u16),
    /// The closure of the running frame, for self-recursion
    OpCurrentClosure,
    OpGetGlobal(Arc<str>),
    OpSetGlobal(Arc<str>),

    OpList(u16),
    /// Pops one value per key, in key order
    OpObject(Arc<[Arc<str>]>),
    OpGetField { name: Arc<str>, optional: bool },
    OpIndex,
    /// `object value -- `
    OpSetField(Arc<str>),
    /// `object index value -- `
    OpSetIndex,

    OpAdd,
    OpSub,
    OpMul,
    OpDiv,
    OpMod,
    OpEqual,
    OpNotEqual,
    OpLessThan,
    OpLessEqual,
    OpGreaterThan,
    OpGreaterEqual,
    OpMinus,
    OpBang,

    OpJump(u32),
    /// Pops the condition
    OpJumpNotTruthy(u32),
    /// `&&`: jumps keeping the value when falsy, pops it otherwise
    OpJumpFalsyOrPop(u32),
    /// `||`
    OpJumpTruthyOrPop(u32),
    /// `??`
    OpJumpNotNullOrPop(u32),

    OpCall(u16),
    /// Callee and a list of arguments on the stack
    OpCallSpread,
    OpReturnValue,
    OpClosure(u16),
    OpThrow,
    OpTryBegin(u32),
    OpTryEnd,

    /// Replaces the iterable with a list snapshot of what to iterate
    OpIterPrepare(ForLoopKind),
    /// Pushes the next element or jumps to `exit` when exhausted
    OpIterNext { list: u16, index: u16, exit: u32 },
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

pub fn disassemble(code: &[Op]) -> String {
    code.iter()
        .enumerate()
        .map(|(i, op)| format!("{:04} {}\n", i, op))
        .collect()
}
