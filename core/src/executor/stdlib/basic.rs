//! Global functions available to every script

use super::super::types::Val;
use super::{arg, NativeCallResult, NativeResult};

/// pcall(f, ...args) - `[true, result]`, or `[false, error]` if `f` throws
pub fn pcall(mut args: Vec<Val>) -> NativeCallResult {
    if args.is_empty() {
        return Err("bad argument #1 to 'pcall' (value expected)".to_string());
    }
    let callee = args.remove(0);
    Ok(NativeResult::Protected { callee, args })
}

/// len(v) - Length of a list or string, number of keys of an object
pub fn len(args: &[Val]) -> Result<Val, String> {
    let n = match args.first() {
        Some(Val::List(items)) => items.lock().len(),
        Some(Val::Obj(fields)) => fields.lock().len(),
        Some(Val::Str(s)) => s.chars().count(),
        other => {
            return Err(format!(
                "bad argument #1 to 'len' (list, object or string expected, got {})",
                other.map(Val::type_name).unwrap_or("no value")
            ))
        }
    };
    Ok(Val::Num(n as f64))
}

pub fn type_of(args: &[Val]) -> Result<Val, String> {
    Ok(Val::str(arg(args, 0).type_name()))
}

pub fn to_string(args: &[Val]) -> Result<Val, String> {
    Ok(match arg(args, 0) {
        s @ Val::Str(_) => s,
        other => Val::from(other.to_string()),
    })
}

/// keys(obj) - Sorted list of an object's keys
pub fn keys(args: &[Val]) -> Result<Val, String> {
    match args.first() {
        Some(Val::Obj(fields)) => {
            let keys = fields.lock().keys().map(Val::str).collect();
            Ok(Val::list(keys))
        }
        other => Err(format!(
            "bad argument #1 to 'keys' (object expected, got {})",
            other.map(Val::type_name).unwrap_or("no value")
        )),
    }
}

/// push(list, v) - Append to a list in place, returns the new length
pub fn push(args: &[Val]) -> Result<Val, String> {
    match args.first() {
        Some(Val::List(items)) => {
            let mut items = items.lock();
            items.push(arg(args, 1));
            Ok(Val::Num(items.len() as f64))
        }
        other => Err(format!(
            "bad argument #1 to 'push' (list expected, got {})",
            other.map(Val::type_name).unwrap_or("no value")
        )),
    }
}
