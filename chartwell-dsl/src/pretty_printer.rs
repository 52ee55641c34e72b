//! Pretty printer for chart DSL configs
//!
//! Emits one `path: value;` statement per leaf, paths in sorted order.
//! Values the grammar cannot express are written as comments so the output
//! still parses.

use chartwell_core::{ConfigMap, ConfigValue};
use std::fmt::Write;

/// Render a config tree back to DSL source.
pub fn to_dsl(config: &ConfigMap) -> String {
    let mut out = String::new();
    let mut path = Vec::new();
    print_map(config, &mut path, &mut out);
    out
}

fn print_map(map: &ConfigMap, path: &mut Vec<String>, out: &mut String) {
    for (key, value) in map {
        path.push(key.clone());
        match value {
            ConfigValue::Object(inner) if !inner.is_empty() => print_map(inner, path, out),
            _ => print_leaf(path, value, out),
        }
        path.pop();
    }
}

fn print_leaf(path: &[String], value: &ConfigValue, out: &mut String) {
    let dotted = path.join(".");
    let rendered = if path.iter().all(|segment| is_path_segment(segment)) {
        render_value(value)
    } else {
        None
    };

    // Writing to a String cannot fail.
    let _ = match rendered {
        Some(text) => writeln!(out, "{}: {};", dotted, text),
        None => writeln!(
            out,
            "# {}: {} (not expressible)",
            dotted,
            single_line(&value.to_json().to_string())
        ),
    };
}

fn render_value(value: &ConfigValue) -> Option<String> {
    match value {
        ConfigValue::String(s) => Some(quote(s)),
        ConfigValue::Number(n) => render_number(*n),
        ConfigValue::Bool(b) => Some(b.to_string()),
        ConfigValue::Call(call) => {
            let args = call
                .args
                .iter()
                .map(|arg| match arg {
                    ConfigValue::String(s) => Some(quote(s)),
                    ConfigValue::Number(n) => render_number(*n),
                    _ => None,
                })
                .collect::<Option<Vec<_>>>()?;
            if !is_identifier(&call.name) {
                return None;
            }
            Some(format!("{}({})", call.name, args.join(", ")))
        }
        ConfigValue::Deferred(callback) => Some(format!("${{{}}}", callback.expression())),
        ConfigValue::Null | ConfigValue::Array(_) | ConfigValue::Object(_) => None,
    }
}

fn render_number(n: f64) -> Option<String> {
    if !n.is_finite() {
        return None;
    }
    if n.fract() == 0.0 && n.abs() < 1e15 {
        Some(format!("{}", n as i64))
    } else {
        Some(format!("{}", n))
    }
}

fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

fn single_line(s: &str) -> String {
    s.replace(['\n', '\r'], " ")
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        && s != "true"
        && s != "false"
}

/// An identifier, optionally followed by one `[digits]` index.
fn is_path_segment(s: &str) -> bool {
    match s.find('[') {
        None => is_identifier(s),
        Some(open) => {
            let (name, rest) = s.split_at(open);
            is_identifier(name)
                && rest.len() > 2
                && rest.ends_with(']')
                && rest[1..rest.len() - 1].chars().all(|c| c.is_ascii_digit())
        }
    }
}
