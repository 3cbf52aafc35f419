//! Call dispatcher
//!
//! Drives an `Execution` under the runtime lock and answers its host calls.
//!
//! ## Call modes
//! - Immediate: runs to completion on the calling thread. Reaching a
//!   suspendable host function fails the whole call with
//!   `ScriptError::SuspensionPolicy`; the script cannot catch it.
//! - Suspending: a suspendable host function whose deferred is already
//!   settled is answered on the spot. Otherwise the fiber chain is parked,
//!   the lock released, and the call resumes on whichever thread settles
//!   the deferred, after re-acquiring the lock.
//!
//! Script coroutines never reach this module: yields and resumes stay
//! inside the VM.
//!
//! A refresh requested by a host function is honoured once per host call,
//! under the lock, before the script sees the result.

use std::cell::RefCell;

use tracing::{debug, warn};
use uuid::Uuid;

use crate::context::ExecutionContext;
use crate::deferred::{self, Deferred, Resolver};
use crate::error::{HostError, ScriptError};
use crate::executor::{CallMode, Execution, HostFnId, Outcome, Val};
use crate::host::{BoundFunction, HostFunction, HostValue, Interp, Runtime};

#[cfg(test)]
mod tests;

impl Runtime {
    /// Run `function` to completion on the calling thread
    ///
    /// A supplied context lends its snapshot; the call itself is always
    /// immediate.
    pub fn invoke_immediate(
        &self,
        function: &BoundFunction,
        args: Vec<HostValue>,
        context: Option<&ExecutionContext>,
    ) -> Result<HostValue, ScriptError> {
        self.check_function(function)?;
        let ctx = match context {
            Some(ctx) => {
                self.check_context(ctx)?;
                match ctx.mode() {
                    CallMode::Immediate => ctx.clone(),
                    CallMode::Suspending => ctx.derive(CallMode::Immediate),
                }
            }
            None => ExecutionContext::new(self, CallMode::Immediate),
        };

        let guard = self.lock();
        let args = self.script_args(&args)?;
        let mut execution = Execution::new(function.callee.clone(), args, CallMode::Immediate);

        loop {
            match run(&guard, &mut execution) {
                Outcome::Returned(value) => return Ok(self.to_host_value(&value)?),
                Outcome::Threw(error) => return Err(ScriptError::Runtime(error)),
                Outcome::HostCall { func, args } => {
                    let result = match self.host_function(func) {
                        Some((_, HostFunction::Plain(f))) => {
                            let result = self.call_plain(&ctx, f.as_ref(), &args);
                            refresh_if_requested(&ctx);
                            result
                        }
                        Some((name, HostFunction::Suspendable(_))) => {
                            execution.abandon();
                            warn!(
                                runtime = self.id(),
                                function = %name,
                                "suspendable function called in immediate context"
                            );
                            return Err(ScriptError::SuspensionPolicy {
                                function: name.clone(),
                            });
                        }
                        None => Err(unknown_function(func)),
                    };
                    execution.deliver(result);
                }
            }
        }
    }

    /// Run `function` in a new suspending context
    ///
    /// The returned deferred is already settled when the call never had to
    /// wait on a host future.
    pub fn invoke_suspending(
        &self,
        function: &BoundFunction,
        args: Vec<HostValue>,
    ) -> Deferred<HostValue, ScriptError> {
        let ctx = ExecutionContext::new(self, CallMode::Suspending);
        self.invoke_suspending_with(function, args, &ctx)
    }

    /// Run `function` in a caller-provided context
    ///
    /// An immediate context is derived into a suspending one sharing its
    /// snapshot.
    pub fn invoke_suspending_with(
        &self,
        function: &BoundFunction,
        args: Vec<HostValue>,
        context: &ExecutionContext,
    ) -> Deferred<HostValue, ScriptError> {
        if let Err(e) = self
            .check_function(function)
            .and_then(|()| self.check_context(context))
        {
            return Deferred::failed(e);
        }
        let ctx = match context.mode() {
            CallMode::Suspending => context.clone(),
            CallMode::Immediate => context.derive(CallMode::Suspending),
        };

        let args = match self.script_args(&args) {
            Ok(args) => args,
            Err(e) => return Deferred::failed(e),
        };

        let (resolver, deferred) = deferred::pending();
        let call = SuspendingCall {
            runtime: self.clone(),
            ctx,
            execution: Execution::new(function.callee.clone(), args, CallMode::Suspending),
            resolver,
            call_id: Uuid::new_v4(),
        };
        call.drive(None);
        deferred
    }

    /* ===================== Helpers ===================== */

    fn check_function(&self, function: &BoundFunction) -> Result<(), ScriptError> {
        if function.runtime_id() != self.id() {
            return Err(ScriptError::ForeignFunction);
        }
        Ok(())
    }

    fn check_context(&self, ctx: &ExecutionContext) -> Result<(), ScriptError> {
        if ctx.runtime().id() != self.id() {
            return Err(ScriptError::ForeignContext);
        }
        Ok(())
    }

    fn script_args(&self, args: &[HostValue]) -> Result<Vec<Val>, ScriptError> {
        args.iter()
            .map(|arg| self.to_script_value(arg).map_err(ScriptError::from))
            .collect()
    }

    fn host_args(&self, args: &[Val]) -> Result<Vec<HostValue>, HostError> {
        args.iter()
            .map(|arg| self.to_host_value(arg).map_err(HostError::from))
            .collect()
    }

    fn call_plain(
        &self,
        ctx: &ExecutionContext,
        f: &crate::host::PlainFn,
        args: &[Val],
    ) -> Result<Val, String> {
        let args = self.host_args(args).map_err(|e| e.message().to_string())?;
        let value = f(ctx, args).map_err(|e| e.message().to_string())?;
        self.host_result(Ok(value))
    }

    /// What the script sees for a host result: a value, or the plain message
    fn host_result(&self, result: Result<HostValue, HostError>) -> Result<Val, String> {
        match result {
            Ok(value) => self.to_script_value(&value).map_err(|e| e.to_string()),
            Err(e) => Err(e.message().to_string()),
        }
    }
}

/// Run until the next stop, borrowing the interpreter only while the VM runs
fn run(guard: &RefCell<Interp>, execution: &mut Execution) -> Outcome {
    let mut interp = guard.borrow_mut();
    execution.run(&mut interp.globals)
}

fn refresh_if_requested(ctx: &ExecutionContext) {
    if ctx.take_refresh_request() {
        ctx.refresh();
    }
}

fn unknown_function(func: HostFnId) -> String {
    format!("unknown host function #{}", func.0)
}

/* ===================== Suspending calls ===================== */

struct SuspendingCall {
    runtime: Runtime,
    ctx: ExecutionContext,
    execution: Execution,
    resolver: Resolver<HostValue, ScriptError>,
    call_id: Uuid,
}

impl SuspendingCall {
    /// Run under the lock until the call settles or parks on a host future
    fn drive(mut self, mut delivery: Option<Result<HostValue, HostError>>) {
        let runtime = self.runtime.clone();
        let guard = runtime.lock();

        if let Some(result) = delivery.take() {
            debug!(
                call_id = %self.call_id,
                runtime = runtime.id(),
                ok = result.is_ok(),
                "resuming call after host future settled"
            );
            let result = runtime.host_result(result);
            refresh_if_requested(&self.ctx);
            self.execution.deliver(result);
        }

        loop {
            match run(&guard, &mut self.execution) {
                Outcome::Returned(value) => {
                    let result = runtime.to_host_value(&value).map_err(ScriptError::from);
                    drop(guard);
                    self.resolver.resolve(result);
                    return;
                }
                Outcome::Threw(error) => {
                    drop(guard);
                    self.resolver.fail(ScriptError::Runtime(error));
                    return;
                }
                Outcome::HostCall { func, args } => {
                    let deferred = match runtime.host_function(func) {
                        Some((_, HostFunction::Plain(f))) => {
                            let result = runtime.call_plain(&self.ctx, f.as_ref(), &args);
                            refresh_if_requested(&self.ctx);
                            self.execution.deliver(result);
                            continue;
                        }
                        Some((name, HostFunction::Suspendable(f))) => {
                            let deferred = match runtime.host_args(&args) {
                                Ok(args) => f.as_ref()(&self.ctx, args),
                                Err(e) => Deferred::failed(e),
                            };
                            (name.clone(), deferred)
                        }
                        None => {
                            self.execution.deliver(Err(unknown_function(func)));
                            continue;
                        }
                    };
                    let (name, deferred) = deferred;

                    if let Some(result) = deferred.try_take() {
                        let result = runtime.host_result(result);
                        refresh_if_requested(&self.ctx);
                        self.execution.deliver(result);
                        continue;
                    }

                    self.execution.park();
                    debug!(
                        call_id = %self.call_id,
                        runtime = runtime.id(),
                        function = %name,
                        "call suspended on host future"
                    );
                    drop(guard);
                    deferred.on_complete(move |result| self.drive(Some(result)));
                    return;
                }
            }
        }
    }
}
