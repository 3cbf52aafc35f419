//! Bytecode compiler
//!
//! Lowers the AST of one chunk into a tree of `Proto`s. Name resolution
//! happens here: locals get slots, names from enclosing functions become
//! captures (copied when the closure is created) and everything else is a
//! runtime global.

use std::sync::Arc;

use super::errors::CompileError;
use super::op_code::Op;
use super::proto::{CaptureFrom, Proto, Prototype};
use super::types::{BinaryOp, Expr, FunctionDef, MemberAccess, Stmt, UnaryOp, VarKind};
use crate::parser::parse_script;
use crate::parser::semantic_validator::validate_script;

/* ===================== Public API ===================== */

/// Compile a chunk of source into an unbound prototype
///
/// Pure: touches no runtime, so it may run on any thread.
pub fn compile(path: &str, source: &str) -> Result<Prototype, CompileError> {
    let script = parse_script(source)
        .map_err(|e| CompileError::new(path, e.span().map(|s| s.line()), e.message()))?;

    if let Some(err) = validate_script(&script, source)
        .into_iter()
        .find(|e| e.is_error())
    {
        return Err(CompileError::new(path, Some(err.span.line()), err.message));
    }

    let chunk: Arc<str> = Arc::from(path);
    let mut compiler = Compiler {
        chunk: chunk.clone(),
        fns: vec![FnState::new(Arc::from("main chunk"), None)],
        line: 1,
    };

    compiler.compile_stmt(&script.body)?;
    compiler.emit(Op::OpNull);
    compiler.emit(Op::OpReturnValue);

    let main = compiler.finish_fn()?;
    Ok(Prototype::new(chunk, Arc::new(main)))
}

/* ===================== Compiler State ===================== */

struct Local {
    name: String,
    slot: u16,
    is_const: bool,
}

struct LoopCtx {
    /// Target of `continue`
    start: usize,
    breaks: Vec<usize>,
    /// Try blocks open when the loop started
    try_depth: usize,
}

struct FnState {
    name: Arc<str>,
    /// Name a function expression or declaration uses to refer to itself
    self_name: Option<String>,
    arity: u16,
    code: Vec<Op>,
    lines: Vec<u32>,
    protos: Vec<Arc<Proto>>,
    captures: Vec<(String, CaptureFrom)>,
    scopes: Vec<Vec<Local>>,
    next_slot: u16,
    max_slots: u16,
    loops: Vec<LoopCtx>,
    try_depth: usize,
}

impl FnState {
    fn new(name: Arc<str>, self_name: Option<String>) -> Self {
        Self {
            name,
            self_name,
            arity: 0,
            code: Vec::new(),
            lines: Vec::new(),
            protos: Vec::new(),
            captures: Vec::new(),
            scopes: vec![Vec::new()],
            next_slot: 0,
            max_slots: 0,
            loops: Vec::new(),
            try_depth: 0,
        }
    }
}

enum Resolved {
    Local { slot: u16, is_const: bool },
    Capture(u16),
    CurrentClosure,
    Global,
}

struct Compiler {
    chunk: Arc<str>,
    fns: Vec<FnState>,
    line: u32,
}

impl Compiler {
    fn error(&self, message: impl Into<String>) -> CompileError {
        CompileError::new(&self.chunk, Some(self.line), message)
    }

    fn current(&mut self) -> &mut FnState {
        let last = self.fns.len() - 1;
        &mut self.fns[last]
    }

    fn emit(&mut self, op: Op) -> usize {
        let line = self.line;
        let f = self.current();
        f.code.push(op);
        f.lines.push(line);
        f.code.len() - 1
    }

    fn here(&mut self) -> usize {
        self.current().code.len()
    }

    fn jump_target(&self, target: usize) -> Result<u32, CompileError> {
        u32::try_from(target).map_err(|_| self.error("function body too large"))
    }

    /// Point the jump emitted at `at` to `target`
    fn patch(&mut self, at: usize, target: usize) -> Result<(), CompileError> {
        let target = self.jump_target(target)?;
        match &mut self.current().code[at] {
            Op::OpJump(t)
            | Op::OpJumpNotTruthy(t)
            | Op::OpJumpFalsyOrPop(t)
            | Op::OpJumpTruthyOrPop(t)
            | Op::OpJumpNotNullOrPop(t)
            | Op::OpTryBegin(t) => *t = target,
            Op::OpIterNext { exit, .. } => *exit = target,
            _ => {}
        }
        Ok(())
    }

    fn finish_fn(&mut self) -> Result<Proto, CompileError> {
        let f = self
            .fns
            .pop()
            .ok_or_else(|| self.error("no function to finish"))?;
        Ok(Proto {
            name: f.name,
            chunk: self.chunk.clone(),
            arity: f.arity,
            locals: f.max_slots,
            code: f.code,
            lines: f.lines,
            protos: f.protos,
            captures: f.captures.into_iter().map(|(_, from)| from).collect(),
        })
    }

    /* ===================== Scopes ===================== */

    fn begin_scope(&mut self) {
        self.current().scopes.push(Vec::new());
    }

    fn end_scope(&mut self) {
        let f = self.current();
        if let Some(scope) = f.scopes.pop() {
            f.next_slot -= scope.len() as u16;
        }
    }

    fn declare_local(&mut self, name: &str, is_const: bool) -> Result<u16, CompileError> {
        let already_declared = self
            .current()
            .scopes
            .last()
            .is_some_and(|scope| scope.iter().any(|l| l.name == name));
        if already_declared {
            return Err(self.error(format!(
                "'{}' is already declared in this scope",
                name
            )));
        }

        let Some(next_slot) = self.current().next_slot.checked_add(1) else {
            return Err(self.error("too many local variables"));
        };
        let f = self.current();
        let slot = f.next_slot;
        f.next_slot = next_slot;
        f.max_slots = f.max_slots.max(f.next_slot);
        if let Some(scope) = f.scopes.last_mut() {
            scope.push(Local {
                name: name.to_string(),
                slot,
                is_const,
            });
        }
        Ok(slot)
    }

    fn resolve(&mut self, level: usize, name: &str) -> Resolved {
        let f = &self.fns[level];
        for scope in f.scopes.iter().rev() {
            if let Some(local) = scope.iter().rev().find(|l| l.name == name) {
                return Resolved::Local {
                    slot: local.slot,
                    is_const: local.is_const,
                };
            }
        }
        if f.self_name.as_deref() == Some(name) {
            return Resolved::CurrentClosure;
        }
        if let Some(i) = f.captures.iter().position(|(n, _)| n == name) {
            return Resolved::Capture(i as u16);
        }
        if level == 0 {
            return Resolved::Global;
        }

        let from = match self.resolve(level - 1, name) {
            Resolved::Global => return Resolved::Global,
            Resolved::Local { slot, .. } => CaptureFrom::Local(slot),
            Resolved::Capture(i) => CaptureFrom::Capture(i),
            Resolved::CurrentClosure => CaptureFrom::CurrentClosure,
        };
        let captures = &mut self.fns[level].captures;
        captures.push((name.to_string(), from));
        Resolved::Capture((captures.len() - 1) as u16)
    }

    fn emit_get(&mut self, name: &str) {
        let level = self.fns.len() - 1;
        let op = match self.resolve(level, name) {
            Resolved::Local { slot, .. } => Op::OpGetLocal(slot),
            Resolved::Capture(i) => Op::OpGetCapture(i),
            Resolved::CurrentClosure => Op::OpCurrentClosure,
            Resolved::Global => Op::OpGetGlobal(Arc::from(name)),
        };
        self.emit(op);
    }

    /* ===================== Statements ===================== */

    fn compile_stmt(&mut self, stmt: &Stmt) -> Result<(), CompileError> {
        self.line = stmt.span().line();

        match stmt {
            Stmt::Block { body, .. } => {
                self.begin_scope();
                for s in body {
                    self.compile_stmt(s)?;
                }
                self.end_scope();
            }

            Stmt::Declare {
                var_kind,
                name,
                init,
                ..
            } => {
                match init {
                    Some(expr) => self.compile_expr(expr)?,
                    None => {
                        self.emit(Op::OpNull);
                    }
                }
                let slot = self.declare_local(name, *var_kind == VarKind::Const)?;
                self.emit(Op::OpSetLocal(slot));
            }

            Stmt::Function { def, .. } => {
                let name = def
                    .name
                    .as_deref()
                    .ok_or_else(|| self.error("function declaration without a name"))?;
                self.compile_closure(def)?;
                let slot = self.declare_local(name, false)?;
                self.emit(Op::OpSetLocal(slot));
            }

            Stmt::Assign {
                var, path, value, ..
            } => self.compile_assign(var, path, value)?,

            Stmt::If {
                test,
                then_s,
                else_s,
                ..
            } => {
                self.compile_expr(test)?;
                let to_else = self.emit(Op::OpJumpNotTruthy(0));
                self.compile_stmt(then_s)?;
                match else_s {
                    Some(else_s) => {
                        let to_end = self.emit(Op::OpJump(0));
                        let else_start = self.here();
                        self.patch(to_else, else_start)?;
                        self.compile_stmt(else_s)?;
                        let end = self.here();
                        self.patch(to_end, end)?;
                    }
                    None => {
                        let end = self.here();
                        self.patch(to_else, end)?;
                    }
                }
            }

            Stmt::While { test, body, .. } => {
                let start = self.here();
                self.compile_expr(test)?;
                let to_exit = self.emit(Op::OpJumpNotTruthy(0));
                self.compile_loop_body(start, body)?;
                let start = self.jump_target(start)?;
                self.emit(Op::OpJump(start));
                let exit = self.here();
                self.patch(to_exit, exit)?;
                self.finish_loop(exit)?;
            }

            Stmt::ForLoop {
                kind,
                binding,
                iterable,
                body,
                ..
            } => {
                self.begin_scope();
                self.compile_expr(iterable)?;
                self.emit(Op::OpIterPrepare(*kind));
                let list = self.declare_local("(for list)", true)?;
                self.emit(Op::OpSetLocal(list));
                let index = self.declare_local("(for index)", false)?;
                self.emit(Op::OpNum(0.0));
                self.emit(Op::OpSetLocal(index));

                let start = self.here();
                let to_exit = self.emit(Op::OpIterNext {
                    list,
                    index,
                    exit: 0,
                });
                self.begin_scope();
                let slot = self.declare_local(binding, false)?;
                self.emit(Op::OpSetLocal(slot));
                self.compile_loop_body(start, body)?;
                self.end_scope();
                let start = self.jump_target(start)?;
                self.emit(Op::OpJump(start));
                let exit = self.here();
                self.patch(to_exit, exit)?;
                self.finish_loop(exit)?;
                self.end_scope();
            }

            Stmt::Return { value, .. } => {
                match value {
                    Some(expr) => self.compile_expr(expr)?,
                    None => {
                        self.emit(Op::OpNull);
                    }
                }
                self.emit(Op::OpReturnValue);
            }

            Stmt::Throw { value, .. } => {
                self.compile_expr(value)?;
                self.emit(Op::OpThrow);
            }

            Stmt::Try {
                body,
                catch_var,
                catch_body,
                ..
            } => {
                let try_begin = self.emit(Op::OpTryBegin(0));
                self.current().try_depth += 1;
                self.compile_stmt(body)?;
                self.current().try_depth -= 1;
                self.emit(Op::OpTryEnd);
                let to_end = self.emit(Op::OpJump(0));

                let catch_start = self.here();
                self.patch(try_begin, catch_start)?;
                self.begin_scope();
                let slot = self.declare_local(catch_var, false)?;
                self.emit(Op::OpSetLocal(slot));
                self.compile_stmt(catch_body)?;
                self.end_scope();

                let end = self.here();
                self.patch(to_end, end)?;
            }

            Stmt::Expr { expr, .. } => {
                self.compile_expr(expr)?;
                self.emit(Op::OpPop);
            }

            Stmt::Break { .. } => {
                let open_tries = self.open_tries_in_loop("break")?;
                for _ in 0..open_tries {
                    self.emit(Op::OpTryEnd);
                }
                let jump = self.emit(Op::OpJump(0));
                if let Some(lp) = self.current().loops.last_mut() {
                    lp.breaks.push(jump);
                }
            }

            Stmt::Continue { .. } => {
                let open_tries = self.open_tries_in_loop("continue")?;
                for _ in 0..open_tries {
                    self.emit(Op::OpTryEnd);
                }
                let start = self.current().loops.last().map(|lp| lp.start).unwrap_or(0);
                let start = self.jump_target(start)?;
                self.emit(Op::OpJump(start));
            }
        }

        Ok(())
    }

    fn open_tries_in_loop(&mut self, keyword: &str) -> Result<usize, CompileError> {
        let f = self.current();
        let open_tries = f.loops.last().map(|lp| f.try_depth - lp.try_depth);
        open_tries.ok_or_else(|| self.error(format!("'{}' outside of a loop", keyword)))
    }

    fn compile_loop_body(&mut self, start: usize, body: &Stmt) -> Result<(), CompileError> {
        let f = self.current();
        let try_depth = f.try_depth;
        f.loops.push(LoopCtx {
            start,
            breaks: Vec::new(),
            try_depth,
        });
        self.compile_stmt(body)
    }

    fn finish_loop(&mut self, exit: usize) -> Result<(), CompileError> {
        if let Some(lp) = self.current().loops.pop() {
            for jump in lp.breaks {
                self.patch(jump, exit)?;
            }
        }
        Ok(())
    }

    fn compile_assign(
        &mut self,
        var: &str,
        path: &[MemberAccess],
        value: &Expr,
    ) -> Result<(), CompileError> {
        let Some((last, init)) = path.split_last() else {
            let level = self.fns.len() - 1;
            match self.resolve(level, var) {
                Resolved::Local { is_const: true, .. } => {
                    return Err(self.error(format!("cannot assign to const variable '{}'", var)))
                }
                Resolved::Local { slot, .. } => {
                    self.compile_expr(value)?;
                    self.emit(Op::OpSetLocal(slot));
                }
                Resolved::Capture(_) | Resolved::CurrentClosure => {
                    return Err(self.error(format!(
                        "cannot assign to captured variable '{}'",
                        var
                    )))
                }
                Resolved::Global => {
                    self.compile_expr(value)?;
                    self.emit(Op::OpSetGlobal(Arc::from(var)));
                }
            }
            return Ok(());
        };

        self.emit_get(var);
        for segment in init {
            match segment {
                MemberAccess::Prop { property, .. } => {
                    self.emit(Op::OpGetField {
                        name: Arc::from(property.as_str()),
                        optional: false,
                    });
                }
                MemberAccess::Index { expr, .. } => {
                    self.compile_expr(expr)?;
                    self.emit(Op::OpIndex);
                }
            }
        }
        match last {
            MemberAccess::Prop { property, .. } => {
                self.compile_expr(value)?;
                self.emit(Op::OpSetField(Arc::from(property.as_str())));
            }
            MemberAccess::Index { expr, .. } => {
                self.compile_expr(expr)?;
                self.compile_expr(value)?;
                self.emit(Op::OpSetIndex);
            }
        }
        Ok(())
    }

    /* ===================== Functions ===================== */

    /// Compile a nested function and emit the instruction that creates it
    fn compile_closure(&mut self, def: &FunctionDef) -> Result<(), CompileError> {
        let name: Arc<str> = Arc::from(def.name.as_deref().unwrap_or("anonymous"));
        let arity = u16::try_from(def.params.len()).map_err(|_| self.error("too many parameters"))?;

        self.fns.push(FnState::new(name, def.name.clone()));
        self.current().arity = arity;
        for param in &def.params {
            self.declare_local(param, false)?;
        }
        self.compile_stmt(&def.body)?;
        self.emit(Op::OpNull);
        self.emit(Op::OpReturnValue);
        let proto = self.finish_fn()?;

        let parent = self.current();
        parent.protos.push(Arc::new(proto));
        let index = u16::try_from(parent.protos.len() - 1)
            .map_err(|_| self.error("too many nested functions"))?;
        self.line = def.span.line();
        self.emit(Op::OpClosure(index));
        Ok(())
    }

    /* ===================== Expressions ===================== */

    fn compile_expr(&mut self, expr: &Expr) -> Result<(), CompileError> {
        self.line = expr.span().line();

        match expr {
            Expr::LitNull { .. } => {
                self.emit(Op::OpNull);
            }
            Expr::LitBool { v, .. } => {
                self.emit(if *v { Op::OpTrue } else { Op::OpFalse });
            }
            Expr::LitNum { v, .. } => {
                self.emit(Op::OpNum(*v));
            }
            Expr::LitStr { v, .. } => {
                self.emit(Op::OpStr(Arc::from(v.as_str())));
            }
            Expr::LitList { elements, .. } => {
                let count = u16::try_from(elements.len())
                    .map_err(|_| self.error("too many list elements"))?;
                for element in elements {
                    self.compile_expr(element)?;
                }
                self.emit(Op::OpList(count));
            }
            Expr::LitObj { properties, .. } => {
                if properties.len() > u16::MAX as usize {
                    return Err(self.error("too many object properties"));
                }
                let mut keys = Vec::with_capacity(properties.len());
                for (key, _, value) in properties {
                    self.compile_expr(value)?;
                    keys.push(Arc::from(key.as_str()));
                }
                self.emit(Op::OpObject(keys.into()));
            }
            Expr::Function { def, .. } => self.compile_closure(def)?,
            Expr::Ident { name, .. } => self.emit_get(name),
            Expr::Member {
                object,
                property,
                optional,
                ..
            } => {
                self.compile_expr(object)?;
                self.emit(Op::OpGetField {
                    name: Arc::from(property.as_str()),
                    optional: *optional,
                });
            }
            Expr::Index { object, index, .. } => {
                self.compile_expr(object)?;
                self.compile_expr(index)?;
                self.emit(Op::OpIndex);
            }
            Expr::Call { callee, args, span } => {
                let argc =
                    u16::try_from(args.len()).map_err(|_| self.error("too many arguments"))?;
                self.compile_expr(callee)?;
                for arg in args {
                    self.compile_expr(arg)?;
                }
                // Errors raised by the call report the line of the call
                self.line = span.line();
                self.emit(Op::OpCall(argc));
            }
            Expr::Unary { op, operand, .. } => {
                self.compile_expr(operand)?;
                self.emit(match op {
                    UnaryOp::Not => Op::OpBang,
                    UnaryOp::Neg => Op::OpMinus,
                });
            }
            Expr::BinaryOp {
                op, left, right, ..
            } => self.compile_binary(*op, left, right)?,
            Expr::Ternary {
                condition,
                consequent,
                alternate,
                ..
            } => {
                self.compile_expr(condition)?;
                let to_alternate = self.emit(Op::OpJumpNotTruthy(0));
                self.compile_expr(consequent)?;
                let to_end = self.emit(Op::OpJump(0));
                let alternate_start = self.here();
                self.patch(to_alternate, alternate_start)?;
                self.compile_expr(alternate)?;
                let end = self.here();
                self.patch(to_end, end)?;
            }
        }

        Ok(())
    }

    fn compile_binary(&mut self, op: BinaryOp, left: &Expr, right: &Expr) -> Result<(), CompileError> {
        let short_circuit = match op {
            BinaryOp::And => Some(Op::OpJumpFalsyOrPop(0)),
            BinaryOp::Or => Some(Op::OpJumpTruthyOrPop(0)),
            BinaryOp::Nullish => Some(Op::OpJumpNotNullOrPop(0)),
            _ => None,
        };

        self.compile_expr(left)?;
        if let Some(jump) = short_circuit {
            let jump = self.emit(jump);
            self.compile_expr(right)?;
            let end = self.here();
            return self.patch(jump, end);
        }

        self.compile_expr(right)?;
        self.emit(match op {
            BinaryOp::Add => Op::OpAdd,
            BinaryOp::Sub => Op::OpSub,
            BinaryOp::Mul => Op::OpMul,
            BinaryOp::Div => Op::OpDiv,
            BinaryOp::Mod => Op::OpMod,
            BinaryOp::Eq => Op::OpEqual,
            BinaryOp::Ne => Op::OpNotEqual,
            BinaryOp::Lt => Op::OpLessThan,
            BinaryOp::Lte => Op::OpLessEqual,
            BinaryOp::Gt => Op::OpGreaterThan,
            BinaryOp::Gte => Op::OpGreaterEqual,
            BinaryOp::And | BinaryOp::Or | BinaryOp::Nullish => unreachable!(),
        });
        Ok(())
    }
}
