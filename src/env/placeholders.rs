use anyhow::{anyhow, bail, Result};

use crate::env::EnvMap;

/// Substitutes `{KEY}` references in a settings value.
///
/// Values come from the process environment first and `env` second, so a
/// variable set by the caller shadows the `.env` entry. `\{` and
/// `\}` produce literal braces, and a `{` that is not followed by a key start
/// character is copied through untouched.
pub fn expand_placeholders(input: &str, env: &EnvMap) -> Result<String> {
    let mut output = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(pos) = rest.find(['\\', '{']) {
        output.push_str(&rest[..pos]);
        let tail = &rest[pos..];

        if let Some(escaped) = tail.strip_prefix('\\') {
            match escaped.chars().next() {
                Some(brace @ ('{' | '}')) => {
                    output.push(brace);
                    rest = &escaped[1..];
                }
                _ => {
                    output.push('\\');
                    rest = escaped;
                }
            }
            continue;
        }

        let body = &tail[1..];
        if !body.chars().next().is_some_and(is_start_char) {
            output.push('{');
            rest = body;
            continue;
        }

        let Some(end) = body.find('}') else {
            bail!("Unclosed template placeholder in {input:?}");
        };
        let key = &body[..end];
        if !is_valid_key(key) {
            bail!("Invalid template variable: {key}");
        }

        let value = std::env::var(key)
            .ok()
            .or_else(|| env.get(key).cloned())
            .ok_or_else(|| anyhow!("Missing template variable: {key}"))?;
        output.push_str(&value);
        rest = &body[end + 1..];
    }

    output.push_str(rest);
    Ok(output)
}

fn is_valid_key(key: &str) -> bool {
    let mut chars = key.chars();
    chars.next().is_some_and(is_start_char)
        && chars.all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '_' | '.' | '-'))
}

fn is_start_char(ch: char) -> bool {
    ch.is_ascii_alphabetic() || ch == '_'
}
