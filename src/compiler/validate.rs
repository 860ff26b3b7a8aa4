//! Structural checks run on a script right before it leaves the process.
//!
//! These are shallower than a full parse: they catch truncated or garbled
//! output in O(n) and produce messages meant for the person at the editor.

use once_cell::sync::Lazy;
use regex::Regex;

use super::value::scan_quoted;
use crate::error::{CompileError, CompileResult};

static ASSIGN_FRAGMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"G\([^)]*\)").expect("assignment pattern compiles"));

static EXPR_FRAGMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"O(?:[!<>=+\-*/]{1,2}),[^,|{}()]+,[^|{}()]+")
        .expect("expression pattern compiles")
});

static VAR_TYPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[IFCSB]$").expect("variable type pattern compiles"));

/// Check envelope order, delimiter balance and `G`/`O` fragment shape.
///
/// Fragments are only looked for from `|S|` onward, and quoted values are
/// opaque to them.
pub fn validate_script(script: &str) -> CompileResult<()> {
    if script.is_empty() {
        return Err(invalid("Script is empty."));
    }

    let markers = (script.find("|I|"), script.find("|S|"), script.find("|L|"));
    let setup = match markers {
        (Some(0), Some(setup), Some(main_loop)) if setup < main_loop => setup,
        _ => {
            return Err(invalid(
                "Script must contain ordered |I|, |S|, |L| sections.",
            ));
        }
    };
    if !script.ends_with('|') {
        return Err(invalid("Script must end with |."));
    }

    check_balanced(script)?;
    check_fragments(&without_quoted(&script[setup..]))
}

/// Copy of `text` with every quoted value emptied to `""` or `''`.
fn without_quoted(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut start = 0;
    let mut index = 0;
    while let Some(&byte) = text.as_bytes().get(index) {
        if byte == b'"' || byte == b'\'' {
            let Some(len) = scan_quoted(&text[index..]) else {
                break;
            };
            out.push_str(&text[start..index]);
            out.push(byte as char);
            out.push(byte as char);
            index += len;
            start = index;
            continue;
        }
        index += 1;
    }
    out.push_str(&text[start..]);
    out
}

fn check_balanced(script: &str) -> CompileResult<()> {
    let mut stack = Vec::new();
    let mut index = 0;
    while let Some(&byte) = script.as_bytes().get(index) {
        match byte {
            b'"' | b'\'' => {
                let len = scan_quoted(&script[index..]).ok_or_else(|| {
                    invalid(format!("Unterminated quoted value near index {index}."))
                })?;
                index += len;
                continue;
            }
            b'(' => stack.push(b')'),
            b'{' => stack.push(b'}'),
            b')' | b'}' => {
                if stack.pop() != Some(byte) {
                    return Err(invalid(format!(
                        "Unbalanced delimiters near index {index}."
                    )));
                }
            }
            _ => {}
        }
        index += 1;
    }

    if stack.is_empty() {
        Ok(())
    } else {
        Err(invalid("Unbalanced delimiters: missing closing bracket."))
    }
}

fn check_fragments(script: &str) -> CompileResult<()> {
    for fragment in ASSIGN_FRAGMENT.find_iter(script) {
        let text = fragment.as_str();
        let args: Vec<&str> = text[2..text.len() - 1].split(',').collect();
        if args.len() != 4 {
            return Err(invalid(format!(
                "Malformed {text}: expected 4 arguments."
            )));
        }
        if !VAR_TYPE.is_match(args[0]) {
            return Err(invalid(format!(
                "Malformed {text}: invalid type {}.",
                args[0]
            )));
        }
    }

    for fragment in EXPR_FRAGMENT.find_iter(script) {
        let text = fragment.as_str();
        let operands = text.split_once(',').map_or("", |(_, rest)| rest);
        if operands.split(',').count() != 2 {
            return Err(invalid(format!(
                "Malformed expression {text}: expected 2 operands."
            )));
        }
    }
    Ok(())
}

fn invalid(message: impl Into<String>) -> CompileError {
    CompileError::Validation(message.into())
}
