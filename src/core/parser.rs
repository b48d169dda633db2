//! MB-002: Recipe line parsing.
//!
//! Each recipe line is keyed off its first whitespace-delimited token,
//! case-insensitively:
//! - `Define <name> = <value>[ <unit>]`
//! - `Set <name> = <value | $var$>` (the `=` is optional)
//! - `Open <a>, <b>` / `Close <a>, <b>`
//! - `Wait <duration>[ <unit>]` / `Wait Until <expr>`
//! - `Calculate <name> = <expr>`
//! - `Include <path>`
//!
//! Lines arrive trimmed with comments already removed.

use super::error::{Result, SimError};
use super::recipe::RecipeLine;
use super::resolver;
use super::store::{TIME_KEY, WAIT_START_KEY};
use super::types::{Command, ParsedLine, SetValue, Unit, Value};

/// Split off the leading keyword and the (trimmed) remainder.
fn split_keyword(line: &str) -> (&str, &str) {
    let line = line.trim();
    match line.split_once(char::is_whitespace) {
        Some((kw, rest)) => (kw, rest.trim()),
        None => (line, ""),
    }
}

fn expect_keyword<'a>(line: &'a str, expected: &[&str]) -> Result<(String, &'a str)> {
    let (kw, rest) = split_keyword(line);
    let lower = kw.to_ascii_lowercase();
    if expected.contains(&lower.as_str()) {
        Ok((lower, rest))
    } else {
        Err(SimError::parse(format!(
            "expected '{}' command, got '{}'",
            expected.join("' or '"),
            kw
        )))
    }
}

/// Split `<name> = <rhs>` on its single `=`.
fn split_assignment<'a>(body: &'a str, keyword: &str) -> Result<(&'a str, &'a str)> {
    let (name, rhs) = body
        .split_once('=')
        .ok_or_else(|| SimError::parse(format!("{keyword} needs '<name> = <value>'")))?;
    let (name, rhs) = (name.trim(), rhs.trim());
    if rhs.contains('=') {
        return Err(SimError::parse(format!("{keyword} has more than one '='")));
    }
    if name.is_empty() || name.contains(char::is_whitespace) {
        return Err(SimError::parse(format!("{keyword} has an invalid name '{name}'")));
    }
    if rhs.is_empty() {
        return Err(SimError::parse(format!("{keyword} '{name}' has no value")));
    }
    Ok((name, rhs))
}

/// Parse `<number>[ ][<unit>]` into seconds-equivalent form.
///
/// A value with no unit letters is a bare float. Letters that are not in
/// the unit table are a unit error.
pub fn parse_quantity(text: &str) -> Result<f64> {
    let text = text.trim();
    let split = text
        .char_indices()
        .find(|(i, c)| c.is_ascii_alphabetic() && !is_exponent_marker(text, *i))
        .map_or(text.len(), |(i, _)| i);
    let (number, suffix) = (text[..split].trim(), text[split..].trim());

    let value: f64 = number
        .parse()
        .map_err(|_| SimError::parse(format!("'{}' is not a number", text)))?;

    if suffix.is_empty() {
        return finite(value, text);
    }
    if !suffix.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(SimError::parse(format!("'{}' is not a number", text)));
    }
    let unit = Unit::from_suffix(suffix).ok_or_else(|| SimError::Unit(suffix.to_string()))?;
    finite(value * unit.seconds(), text)
}

/// Store values must substitute back into expressions: NaN and
/// infinities never get in.
fn finite(value: f64, text: &str) -> Result<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(SimError::parse(format!("'{}' is not a finite number", text)))
    }
}

/// `1e3` is a number, `1 ms` and `5e` are not exponents.
fn is_exponent_marker(text: &str, i: usize) -> bool {
    let bytes = text.as_bytes();
    matches!(bytes[i], b'e' | b'E')
        && i > 0
        && bytes[i - 1].is_ascii_digit()
        && match bytes.get(i + 1) {
            Some(b'+') | Some(b'-') => bytes.get(i + 2).is_some_and(u8::is_ascii_digit),
            Some(b) => b.is_ascii_digit(),
            None => false,
        }
}

/// `Define <name> = <value>[ <unit>]`
pub fn parse_define(line: &str) -> Result<Command> {
    let (_, body) = expect_keyword(line, &["define"])?;
    let (name, rhs) = split_assignment(body, "Define")?;
    Ok(Command::Define {
        name: name.to_string(),
        value: parse_quantity(rhs)?,
    })
}

fn parse_set_value(text: &str) -> Result<SetValue> {
    if text.starts_with('$') {
        let names = resolver::referenced_names(text)?;
        let single = format!("${}$", names.first().map(String::as_str).unwrap_or_default());
        if names.len() != 1 || text != single {
            return Err(SimError::parse(format!(
                "Set takes a literal or a single $variable$, got '{}'",
                text
            )));
        }
        return Ok(SetValue::Reference(names[0].clone()));
    }
    match text.to_ascii_lowercase().as_str() {
        "true" => Ok(SetValue::Literal(Value::Bool(true))),
        "false" => Ok(SetValue::Literal(Value::Bool(false))),
        _ => {
            let n = text
                .parse::<f64>()
                .map_err(|_| SimError::parse(format!("Set value '{}' is not a number", text)))?;
            Ok(SetValue::Literal(Value::Number(finite(n, text)?)))
        }
    }
}

/// `Set <name> = <value-or-$var$>`, also accepting `Set <name> <value>`.
pub fn parse_set(line: &str) -> Result<Command> {
    let (_, body) = expect_keyword(line, &["set"])?;
    let (name, rhs) = if body.contains('=') {
        split_assignment(body, "Set")?
    } else {
        let mut parts = body.split_whitespace();
        match (parts.next(), parts.next(), parts.next()) {
            (Some(name), Some(value), None) => (name, value),
            _ => return Err(SimError::parse("Set needs '<name> = <value>'")),
        }
    };
    Ok(Command::Set {
        name: name.to_string(),
        value: parse_set_value(rhs)?,
    })
}

/// `Open <n1>, <n2>...` / `Close <n1>, <n2>...`
pub fn parse_shutter(line: &str) -> Result<Command> {
    let (kw, body) = expect_keyword(line, &["open", "close"])?;
    let names: Vec<String> = body.split(',').map(|n| n.trim().to_string()).collect();
    if names.iter().any(|n| n.is_empty()) {
        return Err(SimError::parse(format!("{kw} has an empty shutter name")));
    }
    Ok(Command::Shutter {
        names,
        open: kw == "open",
    })
}

/// Canonical condition for a simple timed wait of `seconds`.
pub fn duration_condition(seconds: f64) -> String {
    format!(
        "${}$ >= ${}$ + {}",
        TIME_KEY,
        WAIT_START_KEY,
        Value::Number(seconds)
    )
}

/// `Wait <duration>[ unit]` or `Wait Until <expr>`
pub fn parse_wait(line: &str) -> Result<Command> {
    let (_, body) = expect_keyword(line, &["wait"])?;
    if body.is_empty() {
        return Err(SimError::parse("Wait needs a duration or 'Until <condition>'"));
    }

    let (first, rest) = split_keyword(body);
    if first.eq_ignore_ascii_case("until") {
        if rest.is_empty() {
            return Err(SimError::parse("Wait Until needs a condition"));
        }
        let expr = rest
            .split_whitespace()
            .map(resolver::wrap_bare_variables)
            .collect::<Vec<_>>()
            .join(" ");
        return Ok(Command::Wait { condition: expr });
    }

    let seconds = parse_quantity(body)?;
    if seconds < 0.0 {
        return Err(SimError::parse(format!("Wait duration '{}' is negative", body)));
    }
    Ok(Command::Wait {
        condition: duration_condition(seconds),
    })
}

/// `Calculate <name> = <expr>`; whitespace inside the expression is removed.
pub fn parse_calculate(line: &str) -> Result<Command> {
    let (_, body) = expect_keyword(line, &["calculate"])?;
    let compact: String = body.chars().filter(|c| !c.is_whitespace()).collect();
    let (name, expr) = split_assignment(&compact, "Calculate")?;
    Ok(Command::Calculate {
        name: name.to_string(),
        expr: expr.to_string(),
    })
}

/// `Include <path>`
pub fn parse_include(line: &str) -> Result<Command> {
    let (_, body) = expect_keyword(line, &["include"])?;
    if body.is_empty() {
        return Err(SimError::parse("Include needs a path"));
    }
    Ok(Command::Include {
        path: body.to_string(),
    })
}

/// Parse one line, dispatching on its leading keyword.
pub fn parse_line(line: &str) -> Result<Command> {
    let (kw, _) = split_keyword(line);
    match kw.to_ascii_lowercase().as_str() {
        "define" => parse_define(line),
        "set" => parse_set(line),
        "open" | "close" => parse_shutter(line),
        "wait" => parse_wait(line),
        "calculate" => parse_calculate(line),
        "include" => parse_include(line),
        _ => Err(SimError::parse(format!("unknown command '{}'", kw))),
    }
}

/// Parse every recipe line, stopping at the first failure.
pub fn parse_recipe(lines: &[RecipeLine]) -> Result<Vec<ParsedLine>> {
    lines
        .iter()
        .map(|l| {
            parse_line(&l.text)
                .map(|command| ParsedLine {
                    line: l.number,
                    command,
                })
                .map_err(|e| e.at_line(l.number))
        })
        .collect()
}
