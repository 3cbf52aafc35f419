//! Virtual Machine
//!
//! An `Execution` is one top-level call: the main fiber plus the chain of
//! script coroutines it is currently resuming. It runs until the call
//! returns, throws, or reaches a host function. Host functions are never
//! called from here: the VM hands them back to the dispatcher as
//! `Outcome::HostCall`, and the dispatcher answers with `deliver` before
//! running the execution again. That single exit point is what lets the
//! dispatcher park the whole fiber chain on a host future.
//!
//! ## Two kinds of suspension
//! - `coroutine.yield` moves the top fiber back into its coroutine object
//!   (`Phase::SuspendedOnCoroutine`); only a script `coroutine.resume` brings
//!   it back.
//! - A pending host call leaves every fiber where it is and the execution
//!   becomes `Phase::SuspendedOnHostFuture`; only `deliver` + `run` resume it.

use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};

use super::errors::RuntimeError;
use super::op_code::Op;
use super::proto::{CaptureFrom, Proto};
use super::stdlib::{call_stdlib_func, NativeResult};
use super::types::{CallMode, Closure, CoroutineRef, ForLoopKind, HostFnId, NativeFn, Phase, Val};
use super::Globals;

/// Maximum frames per fiber
pub const MAX_CALL_DEPTH: usize = 200;

/// Maximum coroutines resuming one another at once
pub const MAX_COROUTINE_DEPTH: usize = 64;

const NATIVE_CHUNK: &str = "[native]";

/* ===================== Frames ===================== */

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReturnKind {
    Normal,
    /// Frame started by `pcall`: wraps the result as `[true, value]`
    Protected,
}

/// Execution frame - one per active function call
#[derive(Debug)]
struct Frame {
    closure: Arc<Closure>,
    pc: usize,
    /// Stack index of local slot 0
    base: usize,
    ret: ReturnKind,
}

#[derive(Debug, Clone, Copy)]
enum Catch {
    /// `try` block: jump to the catch clause
    Jump(usize),
    /// `pcall`: produce `[false, error]` in the caller
    Protected,
}

#[derive(Debug)]
struct Handler {
    frame_depth: usize,
    stack_len: usize,
    catch: Catch,
}

/// Calls `callee(...args)`. Lets natives and host functions run as the
/// body of a fiber or under `pcall`.
fn trampoline() -> Arc<Closure> {
    static TRAMPOLINE: OnceLock<Arc<Closure>> = OnceLock::new();
    TRAMPOLINE
        .get_or_init(|| {
            Arc::new(Closure {
                proto: Arc::new(Proto {
                    name: Arc::from("call"),
                    chunk: Arc::from(NATIVE_CHUNK),
                    arity: 2,
                    locals: 2,
                    code: vec![
                        Op::OpGetLocal(0),
                        Op::OpGetLocal(1),
                        Op::OpCallSpread,
                        Op::OpReturnValue,
                    ],
                    lines: vec![0; 4],
                    protos: Vec::new(),
                    captures: Vec::new(),
                }),
                captures: Vec::new(),
            })
        })
        .clone()
}

/* ===================== Fibers ===================== */

/// Result of executing one instruction
enum Step {
    Continue,
    /// The fiber's outermost frame returned
    Done(Val),
    Host(HostFnId, Vec<Val>),
    Resume(CoroutineRef, Vec<Val>),
    Yield(Val),
}

/// One interpreter call stack
#[derive(Debug)]
pub struct Fiber {
    frames: Vec<Frame>,
    stack: Vec<Val>,
    handlers: Vec<Handler>,
}

impl Fiber {
    fn start(callee: Val, args: Vec<Val>) -> Self {
        let mut fiber = Fiber {
            frames: Vec::new(),
            stack: Vec::new(),
            handlers: Vec::new(),
        };
        fiber.push_trampoline(callee, args, ReturnKind::Normal);
        fiber
    }

    fn push_trampoline(&mut self, callee: Val, args: Vec<Val>, ret: ReturnKind) {
        let closure = trampoline();
        self.stack.push(Val::Func(closure.clone()));
        let base = self.stack.len();
        self.stack.push(callee);
        self.stack.push(Val::list(args));
        self.frames.push(Frame {
            closure,
            pc: 0,
            base,
            ret,
        });
    }

    /// Chunk and line of the innermost script frame
    fn location(&self) -> (Arc<str>, u32) {
        self.frames
            .iter()
            .rev()
            .find(|f| &*f.closure.proto.chunk != NATIVE_CHUNK)
            .map(|f| {
                let proto = &f.closure.proto;
                (proto.chunk.clone(), proto.line_at(f.pc.saturating_sub(1)))
            })
            .unwrap_or_else(|| (Arc::from(NATIVE_CHUNK), 0))
    }

    /// An error value carrying the current location
    fn error(&self, message: impl AsRef<str>) -> Val {
        let (chunk, line) = self.location();
        Val::from(format!("{}:{}: {}", chunk, line, message.as_ref()))
    }

    fn push(&mut self, v: Val) {
        self.stack.push(v);
    }

    fn pop(&mut self) -> Val {
        self.stack.pop().unwrap_or(Val::Null)
    }

    fn peek(&self) -> &Val {
        self.stack.last().unwrap_or(&Val::Null)
    }

    fn jump(&mut self, target: u32) {
        if let Some(frame) = self.frames.last_mut() {
            frame.pc = target as usize;
        }
    }

    /// Unwind to the innermost handler, or give the value back if there is none
    fn catch(&mut self, value: Val) -> Result<(), Val> {
        let Some(handler) = self.handlers.pop() else {
            return Err(value);
        };
        self.frames.truncate(handler.frame_depth);
        self.stack.truncate(handler.stack_len);
        match handler.catch {
            Catch::Jump(target) => {
                if let Some(frame) = self.frames.last_mut() {
                    frame.pc = target;
                }
                self.stack.push(value);
            }
            Catch::Protected => {
                self.stack.push(Val::list(vec![Val::Bool(false), value]));
            }
        }
        Ok(())
    }

    fn return_value(&mut self, value: Val) -> Step {
        let Some(frame) = self.frames.pop() else {
            return Step::Done(value);
        };
        let depth = self.frames.len();
        while self.handlers.last().is_some_and(|h| h.frame_depth > depth) {
            self.handlers.pop();
        }
        self.stack.truncate(frame.base.saturating_sub(1));

        let value = match frame.ret {
            ReturnKind::Normal => value,
            ReturnKind::Protected => {
                self.handlers.pop();
                Val::list(vec![Val::Bool(true), value])
            }
        };

        if self.frames.is_empty() {
            return Step::Done(value);
        }
        self.stack.push(value);
        Step::Continue
    }

    fn call(&mut self, argc: usize) -> Result<Step, Val> {
        let callee_pos = self.stack.len() - argc - 1;
        let callee = self.stack[callee_pos].clone();

        match callee {
            Val::Func(closure) => {
                if self.frames.len() >= MAX_CALL_DEPTH {
                    return Err(self.error("stack overflow"));
                }
                let arity = closure.proto.arity as usize;
                let locals = closure.proto.locals as usize;
                let base = callee_pos + 1;
                self.stack.truncate(base + argc.min(arity));
                self.stack.resize(base + locals, Val::Null);
                self.frames.push(Frame {
                    closure,
                    pc: 0,
                    base,
                    ret: ReturnKind::Normal,
                });
                Ok(Step::Continue)
            }
            Val::NativeFunc(native) => {
                let args = self.stack.split_off(callee_pos + 1);
                self.stack.pop();
                match native {
                    NativeFn::Host(id) => Ok(Step::Host(id, args)),
                    NativeFn::Stdlib(func) => match call_stdlib_func(func, args) {
                        Ok(NativeResult::Value(v)) => {
                            self.push(v);
                            Ok(Step::Continue)
                        }
                        Ok(NativeResult::Protected { callee, args }) => {
                            if self.frames.len() >= MAX_CALL_DEPTH {
                                return Err(self.error("stack overflow"));
                            }
                            self.handlers.push(Handler {
                                frame_depth: self.frames.len(),
                                stack_len: self.stack.len(),
                                catch: Catch::Protected,
                            });
                            self.push_trampoline(callee, args, ReturnKind::Protected);
                            Ok(Step::Continue)
                        }
                        Ok(NativeResult::Resume { co, args }) => Ok(Step::Resume(co, args)),
                        Ok(NativeResult::Yield(v)) => Ok(Step::Yield(v)),
                        Err(message) => Err(self.error(message)),
                    },
                }
            }
            other => Err(self.error(format!("attempt to call a {} value", other.type_name()))),
        }
    }

    /// Execute one instruction of the top frame
    fn step(&mut self, globals: &mut Globals) -> Result<Step, Val> {
        let Some(frame) = self.frames.last_mut() else {
            return Ok(Step::Done(Val::Null));
        };
        let closure = frame.closure.clone();
        let pc = frame.pc;
        let base = frame.base;
        frame.pc += 1;

        let Some(op) = closure.proto.code.get(pc) else {
            return Err(self.error("instruction pointer out of range"));
        };

        match op {
            Op::OpNull => self.push(Val::Null),
            Op::OpTrue => self.push(Val::Bool(true)),
            Op::OpFalse => self.push(Val::Bool(false)),
            Op::OpNum(n) => self.push(Val::Num(*n)),
            Op::OpStr(s) => self.push(Val::Str(s.clone())),
            Op::OpPop => {
                self.pop();
            }

            Op::OpGetLocal(slot) => {
                let v = self.stack[base + *slot as usize].clone();
                self.push(v);
            }
            Op::OpSetLocal(slot) => {
                let v = self.pop();
                self.stack[base + *slot as usize] = v;
            }
            Op::OpGetCapture(index) => {
                let v = closure.captures[*index as usize].clone();
                self.push(v);
            }
            Op::OpCurrentClosure => self.push(Val::Func(closure.clone())),
            Op::OpGetGlobal(name) => match globals.get(&**name) {
                Some(v) => {
                    let v = v.clone();
                    self.push(v);
                }
                None => return Err(self.error(format!("undefined variable '{}'", name))),
            },
            Op::OpSetGlobal(name) => {
                let v = self.pop();
                globals.insert(name.to_string(), v);
            }

            Op::OpList(count) => {
                let items = self.stack.split_off(self.stack.len() - *count as usize);
                self.push(Val::list(items));
            }
            Op::OpObject(keys) => {
                let values = self.stack.split_off(self.stack.len() - keys.len());
                let fields: BTreeMap<String, Val> = keys
                    .iter()
                    .map(|k| k.to_string())
                    .zip(values)
                    .collect();
                self.push(Val::obj(fields));
            }
            Op::OpGetField { name, optional } => {
                let object = self.pop();
                let v = match object {
                    Val::Null if *optional => Val::Null,
                    Val::Obj(fields) => fields.lock().get(&**name).cloned().unwrap_or(Val::Null),
                    other => {
                        return Err(self.error(format!(
                            "attempt to index a {} value (field '{}')",
                            other.type_name(),
                            name
                        )))
                    }
                };
                self.push(v);
            }
            Op::OpIndex => {
                let index = self.pop();
                let object = self.pop();
                let v = self.index(&object, &index)?;
                self.push(v);
            }
            Op::OpSetField(name) => {
                let value = self.pop();
                let object = self.pop();
                match object {
                    Val::Obj(fields) => {
                        fields.lock().insert(name.to_string(), value);
                    }
                    other => {
                        return Err(self.error(format!(
                            "attempt to index a {} value (field '{}')",
                            other.type_name(),
                            name
                        )))
                    }
                }
            }
            Op::OpSetIndex => {
                let value = self.pop();
                let index = self.pop();
                let object = self.pop();
                self.set_index(&object, &index, value)?;
            }

            Op::OpAdd => {
                let b = self.pop();
                let a = self.pop();
                let v = match (&a, &b) {
                    (Val::Num(x), Val::Num(y)) => Val::Num(x + y),
                    (Val::Str(_), _) | (_, Val::Str(_)) => Val::from(format!("{}{}", a, b)),
                    _ => return Err(self.arithmetic_error(&a, &b)),
                };
                self.push(v);
            }
            Op::OpSub => self.arithmetic(|x, y| x - y)?,
            Op::OpMul => self.arithmetic(|x, y| x * y)?,
            Op::OpDiv => self.arithmetic(|x, y| x / y)?,
            Op::OpMod => self.arithmetic(|x, y| x % y)?,
            Op::OpEqual => {
                let b = self.pop();
                let a = self.pop();
                self.push(Val::Bool(a == b));
            }
            Op::OpNotEqual => {
                let b = self.pop();
                let a = self.pop();
                self.push(Val::Bool(a != b));
            }
            Op::OpLessThan => self.compare(|o| o.is_lt())?,
            Op::OpLessEqual => self.compare(|o| o.is_le())?,
            Op::OpGreaterThan => self.compare(|o| o.is_gt())?,
            Op::OpGreaterEqual => self.compare(|o| o.is_ge())?,
            Op::OpMinus => match self.pop() {
                Val::Num(n) => self.push(Val::Num(-n)),
                other => {
                    return Err(self.error(format!(
                        "attempt to perform arithmetic on a {} value",
                        other.type_name()
                    )))
                }
            },
            Op::OpBang => {
                let v = self.pop();
                self.push(Val::Bool(!v.is_truthy()));
            }

            Op::OpJump(target) => self.jump(*target),
            Op::OpJumpNotTruthy(target) => {
                if !self.pop().is_truthy() {
                    self.jump(*target);
                }
            }
            Op::OpJumpFalsyOrPop(target) => {
                if self.peek().is_truthy() {
                    self.pop();
                } else {
                    self.jump(*target);
                }
            }
            Op::OpJumpTruthyOrPop(target) => {
                if self.peek().is_truthy() {
                    self.jump(*target);
                } else {
                    self.pop();
                }
            }
            Op::OpJumpNotNullOrPop(target) => {
                if *self.peek() == Val::Null {
                    self.pop();
                } else {
                    self.jump(*target);
                }
            }

            Op::OpCall(argc) => return self.call(*argc as usize),
            Op::OpCallSpread => {
                let args = match self.pop() {
                    Val::List(items) => items.lock().clone(),
                    other => {
                        return Err(self.error(format!(
                            "cannot spread a {} value as arguments",
                            other.type_name()
                        )))
                    }
                };
                let argc = args.len();
                self.stack.extend(args);
                return self.call(argc);
            }
            Op::OpReturnValue => {
                let v = self.pop();
                return Ok(self.return_value(v));
            }
            Op::OpClosure(index) => {
                let proto = closure.proto.protos[*index as usize].clone();
                let captures = proto
                    .captures
                    .iter()
                    .map(|from| match from {
                        CaptureFrom::Local(slot) => self.stack[base + *slot as usize].clone(),
                        CaptureFrom::Capture(i) => closure.captures[*i as usize].clone(),
                        CaptureFrom::CurrentClosure => Val::Func(closure.clone()),
                    })
                    .collect();
                self.push(Val::Func(Arc::new(Closure { proto, captures })));
            }
            Op::OpThrow => return Err(self.pop()),
            Op::OpTryBegin(target) => {
                self.handlers.push(Handler {
                    frame_depth: self.frames.len(),
                    stack_len: self.stack.len(),
                    catch: Catch::Jump(*target as usize),
                });
            }
            Op::OpTryEnd => {
                self.handlers.pop();
            }

            Op::OpIterPrepare(kind) => {
                let iterable = self.pop();
                let items = match (kind, &iterable) {
                    (ForLoopKind::Of, Val::List(items)) => items.lock().clone(),
                    (ForLoopKind::In, Val::Obj(fields)) => {
                        fields.lock().keys().map(Val::str).collect()
                    }
                    (ForLoopKind::In, Val::List(items)) => {
                        (0..items.lock().len()).map(|i| Val::Num(i as f64)).collect()
                    }
                    _ => {
                        return Err(self.error(format!(
                            "cannot iterate over a {} value",
                            iterable.type_name()
                        )))
                    }
                };
                self.push(Val::list(items));
            }
            Op::OpIterNext { list, index, exit } => {
                let list_slot = base + *list as usize;
                let index_slot = base + *index as usize;
                let i = match &self.stack[index_slot] {
                    Val::Num(n) => *n as usize,
                    _ => 0,
                };
                let next = match &self.stack[list_slot] {
                    Val::List(items) => items.lock().get(i).cloned(),
                    _ => None,
                };
                match next {
                    Some(v) => {
                        self.stack[index_slot] = Val::Num((i + 1) as f64);
                        self.push(v);
                    }
                    None => self.jump(*exit),
                }
            }
        }

        Ok(Step::Continue)
    }

    fn arithmetic_error(&self, a: &Val, b: &Val) -> Val {
        let culprit = if matches!(a, Val::Num(_)) { b } else { a };
        self.error(format!(
            "attempt to perform arithmetic on a {} value",
            culprit.type_name()
        ))
    }

    fn arithmetic(&mut self, f: impl Fn(f64, f64) -> f64) -> Result<(), Val> {
        let b = self.pop();
        let a = self.pop();
        match (&a, &b) {
            (Val::Num(x), Val::Num(y)) => {
                self.push(Val::Num(f(*x, *y)));
                Ok(())
            }
            _ => Err(self.arithmetic_error(&a, &b)),
        }
    }

    fn compare(&mut self, f: impl Fn(std::cmp::Ordering) -> bool) -> Result<(), Val> {
        let b = self.pop();
        let a = self.pop();
        let ordering = match (&a, &b) {
            (Val::Num(x), Val::Num(y)) => x.partial_cmp(y),
            (Val::Str(x), Val::Str(y)) => Some(x.cmp(y)),
            _ => {
                return Err(self.error(format!(
                    "attempt to compare {} with {}",
                    a.type_name(),
                    b.type_name()
                )))
            }
        };
        // NaN compares false both ways
        self.push(Val::Bool(ordering.is_some_and(f)));
        Ok(())
    }

    fn list_index(&self, index: &Val) -> Result<usize, Val> {
        match index {
            Val::Num(n) if *n >= 0.0 && n.fract() == 0.0 => Ok(*n as usize),
            other => Err(self.error(format!("invalid list index: {}", other))),
        }
    }

    fn index(&self, object: &Val, index: &Val) -> Result<Val, Val> {
        match (object, index) {
            (Val::List(items), _) => {
                let i = self.list_index(index)?;
                Ok(items.lock().get(i).cloned().unwrap_or(Val::Null))
            }
            (Val::Obj(fields), Val::Str(key)) => {
                Ok(fields.lock().get(&**key).cloned().unwrap_or(Val::Null))
            }
            (Val::Obj(_), other) => Err(self.error(format!(
                "object keys must be strings, got {}",
                other.type_name()
            ))),
            (other, _) => Err(self.error(format!(
                "attempt to index a {} value",
                other.type_name()
            ))),
        }
    }

    fn set_index(&self, object: &Val, index: &Val, value: Val) -> Result<(), Val> {
        match (object, index) {
            (Val::List(items), _) => {
                let i = self.list_index(index)?;
                let mut items = items.lock();
                if i < items.len() {
                    items[i] = value;
                } else if i == items.len() {
                    items.push(value);
                } else {
                    drop(items);
                    return Err(self.error(format!("list index {} out of range", i)));
                }
                Ok(())
            }
            (Val::Obj(fields), Val::Str(key)) => {
                fields.lock().insert(key.to_string(), value);
                Ok(())
            }
            (Val::Obj(_), other) => Err(self.error(format!(
                "object keys must be strings, got {}",
                other.type_name()
            ))),
            (other, _) => Err(self.error(format!(
                "attempt to index a {} value",
                other.type_name()
            ))),
        }
    }
}

/* ===================== Coroutines ===================== */

/// A script coroutine
///
/// Holds its fiber only while suspended; while it runs, the fiber lives in
/// the execution that resumed it.
#[derive(Debug)]
pub struct Coroutine {
    body: Val,
    fiber: Option<Fiber>,
    phase: Phase,
    /// Running, but currently resuming another coroutine
    resuming: bool,
}

impl Coroutine {
    pub fn new(body: Val) -> Self {
        Self {
            body,
            fiber: None,
            phase: Phase::Idle,
            resuming: false,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Status as reported by `coroutine.status`
    pub fn status(&self) -> &'static str {
        match self.phase {
            Phase::Idle | Phase::SuspendedOnCoroutine => "suspended",
            Phase::Running(_) | Phase::SuspendedOnHostFuture if self.resuming => "normal",
            Phase::Running(_) | Phase::SuspendedOnHostFuture => "running",
            Phase::Completed | Phase::Failed => "dead",
        }
    }
}

/* ===================== Execution ===================== */

/// Why `Execution::run` stopped
#[derive(Debug)]
pub enum Outcome {
    Returned(Val),
    Threw(RuntimeError),
    /// A host function was called; answer with `deliver`, then `run` again
    HostCall { func: HostFnId, args: Vec<Val> },
}

#[derive(Debug)]
enum Resumption {
    Value(Val),
    Throw(Val),
}

/// One top-level call and the coroutines it is resuming
#[derive(Debug)]
pub struct Execution {
    main: Fiber,
    /// Coroutines resumed from the main fiber, innermost last
    coroutines: Vec<(CoroutineRef, Fiber)>,
    mode: CallMode,
    phase: Phase,
    pending: Option<Resumption>,
}

impl Execution {
    pub fn new(callee: Val, args: Vec<Val>, mode: CallMode) -> Self {
        Self {
            main: Fiber::start(callee, args),
            coroutines: Vec::new(),
            mode,
            phase: Phase::Idle,
            pending: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn mode(&self) -> CallMode {
        self.mode
    }

    /// Answer the host call reported by the last `run`
    ///
    /// An `Err` is raised into the script as the plain message string.
    pub fn deliver(&mut self, result: Result<Val, String>) {
        self.pending = Some(match result {
            Ok(v) => Resumption::Value(v),
            Err(message) => Resumption::Throw(Val::from(message)),
        });
    }

    /// Mark the whole fiber chain as waiting on a host future
    pub fn park(&mut self) {
        self.set_chain_phase(Phase::SuspendedOnHostFuture);
    }

    /// Give up on the call; coroutines it was running are dead
    pub fn abandon(&mut self) {
        self.set_chain_phase(Phase::Failed);
        for (co, _) in self.coroutines.drain(..) {
            co.lock().fiber = None;
        }
    }

    fn set_chain_phase(&mut self, phase: Phase) {
        self.phase = phase;
        for (co, _) in &self.coroutines {
            co.lock().phase = phase;
        }
    }

    fn top(&mut self) -> &mut Fiber {
        match self.coroutines.last_mut() {
            Some((_, fiber)) => fiber,
            None => &mut self.main,
        }
    }

    /// Run until the call finishes or needs a host function
    pub fn run(&mut self, globals: &mut Globals) -> Outcome {
        if self.phase.is_finished() {
            return Outcome::Threw(RuntimeError::new(
                "cannot run a finished call",
                NATIVE_CHUNK,
                0,
            ));
        }
        self.set_chain_phase(Phase::Running(self.mode));

        match self.pending.take() {
            Some(Resumption::Value(v)) => self.top().push(v),
            Some(Resumption::Throw(v)) => {
                if let Some(outcome) = self.raise(v) {
                    return outcome;
                }
            }
            None => {}
        }

        loop {
            let step = match self.top().step(globals) {
                Ok(step) => step,
                Err(thrown) => {
                    if let Some(outcome) = self.raise(thrown) {
                        return outcome;
                    }
                    continue;
                }
            };

            let raised = match step {
                Step::Continue => None,
                Step::Done(v) => {
                    if let Some(outcome) = self.finish_fiber(Ok(v)) {
                        return outcome;
                    }
                    None
                }
                Step::Host(func, args) => return Outcome::HostCall { func, args },
                Step::Resume(co, args) => self.resume(co, args).err(),
                Step::Yield(v) => self.yield_to_resumer(v).err(),
            };

            if let Some(thrown) = raised {
                if let Some(outcome) = self.raise(thrown) {
                    return outcome;
                }
            }
        }
    }

    /// Throw in the top fiber. A fiber without a handler dies; the main
    /// fiber dying ends the call.
    fn raise(&mut self, value: Val) -> Option<Outcome> {
        let fiber = self.top();
        let location = fiber.location();
        match fiber.catch(value) {
            Ok(()) => None,
            Err(value) => self.finish_fiber(Err((value, location))),
        }
    }

    fn finish_fiber(&mut self, result: Result<Val, (Val, (Arc<str>, u32))>) -> Option<Outcome> {
        let Some((co, _fiber)) = self.coroutines.pop() else {
            return Some(match result {
                Ok(v) => {
                    self.phase = Phase::Completed;
                    Outcome::Returned(v)
                }
                Err((v, (chunk, line))) => {
                    self.phase = Phase::Failed;
                    Outcome::Threw(RuntimeError::new(v.to_string(), &chunk, line))
                }
            });
        };

        let (phase, reply) = match result {
            Ok(v) => (Phase::Completed, vec![Val::Bool(true), v]),
            Err((v, _)) => (Phase::Failed, vec![Val::Bool(false), v]),
        };
        {
            let mut state = co.lock();
            state.phase = phase;
            state.fiber = None;
            state.resuming = false;
        }
        if let Some((resumer, _)) = self.coroutines.last() {
            resumer.lock().resuming = false;
        }
        self.top().push(Val::list(reply));
        None
    }

    fn resume(&mut self, co: CoroutineRef, args: Vec<Val>) -> Result<(), Val> {
        if self.coroutines.len() >= MAX_COROUTINE_DEPTH {
            return Err(self.top().error("coroutine nesting too deep"));
        }

        let mut state = co.lock();
        let refusal = match state.phase {
            Phase::Completed | Phase::Failed => Some("cannot resume dead coroutine"),
            Phase::Idle | Phase::SuspendedOnCoroutine => None,
            Phase::Running(_) | Phase::SuspendedOnHostFuture => {
                Some("cannot resume non-suspended coroutine")
            }
        };
        if let Some(message) = refusal {
            drop(state);
            self.top()
                .push(Val::list(vec![Val::Bool(false), Val::str(message)]));
            return Ok(());
        }

        let fiber = match state.fiber.take() {
            Some(mut fiber) => {
                // Becomes the return value of the pending `coroutine.yield`
                fiber.push(args.into_iter().next().unwrap_or(Val::Null));
                fiber
            }
            None => Fiber::start(state.body.clone(), args),
        };
        state.phase = Phase::Running(self.mode);
        drop(state);

        if let Some((resumer, _)) = self.coroutines.last() {
            resumer.lock().resuming = true;
        }
        self.coroutines.push((co, fiber));
        Ok(())
    }

    fn yield_to_resumer(&mut self, value: Val) -> Result<(), Val> {
        let Some((co, fiber)) = self.coroutines.pop() else {
            return Err(self
                .main
                .error("attempt to yield from outside a coroutine"));
        };
        {
            let mut state = co.lock();
            state.fiber = Some(fiber);
            state.phase = Phase::SuspendedOnCoroutine;
        }
        if let Some((resumer, _)) = self.coroutines.last() {
            resumer.lock().resuming = false;
        }
        self.top().push(Val::list(vec![Val::Bool(true), value]));
        Ok(())
    }
}
