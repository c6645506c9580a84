use std::io::Write;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::value::Value;

pub fn clock(_args: &[Value], _out: &mut dyn Write) -> Result<Value, String> {
    let duration = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|time_err| time_err.to_string())?;
    Ok(Value::Double(duration.as_secs_f64()))
}

/// `print(value)` renders the single value; `print(fmt, a, b, ...)` treats
/// a leading string as a format string with positional placeholders. A
/// newline is always appended. Returns nil.
pub fn print(args: &[Value], out: &mut dyn Write) -> Result<Value, String> {
    if args.is_empty() {
        return Ok(Value::Nil);
    }

    let rendered = match &args[0] {
        Value::String(fmt_str) if args.len() > 1 => {
            format_positional(&fmt_str.chars, &args[1..])?
        }
        Value::String(fmt_str) => fmt_str.chars.clone(),
        other => other.to_string(),
    };
    writeln!(out, "{}", rendered).map_err(|io_err| io_err.to_string())?;
    Ok(Value::Nil)
}

/// Substitutes `{}` and `{n}` placeholders with positional arguments;
/// `{{` and `}}` produce literal braces.
fn format_positional(fmt: &str, args: &[Value]) -> Result<String, String> {
    let mut result = String::with_capacity(fmt.len());
    let mut chars = fmt.chars().peekable();
    let mut next_positional = 0usize;

    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                result.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                result.push('}');
            }
            '{' => {
                let mut spec = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some(spec_char) => spec.push(spec_char),
                        None => return Err("Unmatched '{' in format string.".to_string()),
                    }
                }
                let index = if spec.is_empty() {
                    let index = next_positional;
                    next_positional += 1;
                    index
                } else {
                    spec.parse::<usize>()
                        .map_err(|_| format!("Invalid format argument '{{{}}}'.", spec))?
                };
                let arg = args
                    .get(index)
                    .ok_or_else(|| format!("Format argument {} out of range.", index))?;
                result.push_str(&arg.to_string());
            }
            '}' => return Err("Unmatched '}' in format string.".to_string()),
            _ => result.push(c),
        }
    }
    Ok(result)
}
