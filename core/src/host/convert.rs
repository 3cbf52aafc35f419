//! Conversion between host values and script values

use std::collections::BTreeMap;

use super::function::BoundFunction;
use super::value::{Handle, HostValue, MAX_SAFE_INTEGER};
use crate::error::ConversionError;
use crate::executor::Val;

/// Deepest nesting converted; also stops reference cycles
pub const MAX_DEPTH: usize = 64;

pub(crate) fn to_script(runtime_id: u64, value: &HostValue) -> Result<Val, ConversionError> {
    to_script_at(runtime_id, value, 0)
}

fn to_script_at(runtime_id: u64, value: &HostValue, depth: usize) -> Result<Val, ConversionError> {
    if depth > MAX_DEPTH {
        return Err(ConversionError::TooDeep(MAX_DEPTH));
    }
    Ok(match value {
        HostValue::Null => Val::Null,
        HostValue::Bool(b) => Val::Bool(*b),
        HostValue::Int(i) => {
            if i.unsigned_abs() > MAX_SAFE_INTEGER as u64 {
                return Err(ConversionError::UnsafeInteger(*i));
            }
            Val::Num(*i as f64)
        }
        HostValue::Num(n) => Val::Num(*n),
        HostValue::Str(s) => Val::str(s),
        HostValue::Handle(h) => Val::Handle(h.0),
        HostValue::List(items) => Val::list(
            items
                .iter()
                .map(|item| to_script_at(runtime_id, item, depth + 1))
                .collect::<Result<Vec<_>, _>>()?,
        ),
        HostValue::Map(fields) => Val::obj(
            fields
                .iter()
                .map(|(k, v)| Ok((k.clone(), to_script_at(runtime_id, v, depth + 1)?)))
                .collect::<Result<BTreeMap<_, _>, ConversionError>>()?,
        ),
        HostValue::Function(f) => {
            if f.runtime_id != runtime_id {
                return Err(ConversionError::ForeignFunction);
            }
            f.callee.clone()
        }
    })
}

pub(crate) fn to_host(runtime_id: u64, value: &Val) -> Result<HostValue, ConversionError> {
    to_host_at(runtime_id, value, 0)
}

fn to_host_at(runtime_id: u64, value: &Val, depth: usize) -> Result<HostValue, ConversionError> {
    if depth > MAX_DEPTH {
        return Err(ConversionError::TooDeep(MAX_DEPTH));
    }
    Ok(match value {
        Val::Null => HostValue::Null,
        Val::Bool(b) => HostValue::Bool(*b),
        Val::Num(n) => {
            if n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER as f64 {
                HostValue::Int(*n as i64)
            } else {
                HostValue::Num(*n)
            }
        }
        Val::Str(s) => HostValue::Str(s.to_string()),
        Val::Handle(h) => HostValue::Handle(Handle(*h)),
        Val::List(items) => {
            let items = items.lock().clone();
            HostValue::List(
                items
                    .iter()
                    .map(|item| to_host_at(runtime_id, item, depth + 1))
                    .collect::<Result<Vec<_>, _>>()?,
            )
        }
        Val::Obj(fields) => {
            let fields = fields.lock().clone();
            HostValue::Map(
                fields
                    .iter()
                    .map(|(k, v)| Ok((k.clone(), to_host_at(runtime_id, v, depth + 1)?)))
                    .collect::<Result<BTreeMap<_, _>, ConversionError>>()?,
            )
        }
        Val::Func(_) | Val::NativeFunc(_) => {
            HostValue::Function(BoundFunction::new(runtime_id, value.clone()))
        }
        Val::Coroutine(_) => return Err(ConversionError::Unsupported("coroutine")),
    })
}
