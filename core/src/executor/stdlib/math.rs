//! Math standard library functions

use super::super::types::Val;

/// math.floor(x) - Returns the largest integer less than or equal to x
pub fn floor(args: &[Val]) -> Result<Val, String> {
    match args.first() {
        Some(Val::Num(n)) => Ok(Val::Num(n.floor())),
        Some(other) => Err(format!(
            "bad argument #1 to 'math.floor' (number expected, got {})",
            other.type_name()
        )),
        None => Err("bad argument #1 to 'math.floor' (number expected, got no value)".to_string()),
    }
}
