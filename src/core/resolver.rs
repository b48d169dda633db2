//! MB-004: Variable reference resolution.
//!
//! Splits an expression into literal text and `$name$` references, then
//! splices each referenced store value in its literal textual form. Also
//! wraps the bare variable names written in `Wait Until` conditions.

use super::error::{Result, SimError};
use super::store::VariableStore;

/// One piece of a `$`-delimited template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Text(String),
    Var(String),
}

/// Split a template into text and variable segments.
///
/// An odd number of `$` delimiters is malformed, as is an empty `$$` pair.
pub fn segments(template: &str) -> Result<Vec<Segment>> {
    let mut out = Vec::new();
    let mut rest = template;

    while let Some(open) = rest.find('$') {
        if open > 0 {
            out.push(Segment::Text(rest[..open].to_string()));
        }
        let after = &rest[open + 1..];
        let close = after.find('$').ok_or_else(|| {
            SimError::malformed(format!("unbalanced '$' delimiter in '{}'", template))
        })?;
        let name = after[..close].trim();
        if name.is_empty() {
            return Err(SimError::malformed(format!(
                "empty variable reference in '{}'",
                template
            )));
        }
        out.push(Segment::Var(name.to_string()));
        rest = &after[close + 1..];
    }

    if !rest.is_empty() {
        out.push(Segment::Text(rest.to_string()));
    }
    Ok(out)
}

/// Replace every `$name$` in `template` with the store's value for `name`.
///
/// A template with no `$` comes back unchanged.
pub fn substitute(template: &str, store: &VariableStore) -> Result<String> {
    if !template.contains('$') {
        return Ok(template.to_string());
    }
    let mut result = String::with_capacity(template.len());
    for segment in segments(template)? {
        match segment {
            Segment::Text(t) => result.push_str(&t),
            Segment::Var(name) => result.push_str(&store.get(&name)?.to_string()),
        }
    }
    Ok(result)
}

/// Names referenced by a template, in order of appearance.
pub fn referenced_names(template: &str) -> Result<Vec<String>> {
    Ok(segments(template)?
        .into_iter()
        .filter_map(|s| match s {
            Segment::Var(name) => Some(name),
            Segment::Text(_) => None,
        })
        .collect())
}

/// Words the evaluator understands that must never be wrapped.
const RESERVED: [&str; 5] = ["and", "or", "not", "true", "false"];

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '.'
}

/// Wrap bare variable names in `$...$`, leaving delimited spans, numbers,
/// operators and reserved words alone.
///
/// `Ga.PV >= 600` becomes `$Ga.PV$ >= 600`.
pub fn wrap_bare_variables(expr: &str) -> String {
    let chars: Vec<char> = expr.chars().collect();
    let mut out = String::with_capacity(expr.len() + 8);
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c == '$' {
            // Copy an already-delimited span verbatim
            let end = chars[i + 1..]
                .iter()
                .position(|&d| d == '$')
                .map_or(chars.len(), |p| i + 1 + p + 1);
            out.extend(&chars[i..end]);
            i = end;
        } else if c.is_ascii_digit() || (c == '.' && chars.get(i + 1).is_some_and(|d| d.is_ascii_digit())) {
            // Numeric literal, including any exponent suffix
            let start = i;
            while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '.') {
                let exp_sign = matches!(chars[i], 'e' | 'E')
                    && matches!(chars.get(i + 1), Some('+') | Some('-'));
                i += if exp_sign { 2 } else { 1 };
            }
            out.extend(&chars[start..i.min(chars.len())]);
        } else if is_ident_start(c) {
            let start = i;
            while i < chars.len() && is_ident_char(chars[i]) {
                i += 1;
            }
            let word: String = chars[start..i].iter().collect();
            if RESERVED.contains(&word.to_ascii_lowercase().as_str()) {
                out.push_str(&word);
            } else {
                out.push('$');
                out.push_str(&word);
                out.push('$');
            }
        } else {
            out.push(c);
            i += 1;
        }
    }

    out
}
