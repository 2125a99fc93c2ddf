//! Bracket-aware splitting of a shell call's argument list.

use crate::error::{PipelineError, Result};

fn opener_for(closer: char) -> char {
    match closer {
        '}' => '{',
        ')' => '(',
        _ => '[',
    }
}

/// Splits `input` on commas that sit outside every bracket, brace, paren and
/// string. Whitespace outside strings is dropped; separator commas are not
/// kept. Error positions are byte offsets into `input`.
pub fn split_args(input: &str) -> Result<Vec<String>> {
    if input.trim().is_empty() {
        return Err(PipelineError::ParseError("missing input string".to_string()));
    }

    let mut stack: Vec<(char, usize)> = Vec::new();
    let mut args = Vec::new();
    let mut current = String::new();
    let mut quote: Option<(char, usize)> = None;
    let mut escaped = false;

    for (i, c) in input.char_indices() {
        if let Some((q, _)) = quote {
            current.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }

        match c {
            '"' | '\'' => {
                quote = Some((c, i));
                current.push(c);
            }
            '{' | '(' | '[' => {
                stack.push((c, i));
                current.push(c);
            }
            '}' | ')' | ']' => {
                match stack.pop() {
                    None => {
                        return Err(PipelineError::ParseError(format!(
                            "invalid character at index {}",
                            i
                        )))
                    }
                    Some((open, _)) if open != opener_for(c) => {
                        return Err(PipelineError::ParseError(format!(
                            "invalid parentheses at index {}",
                            i
                        )))
                    }
                    Some(_) => {}
                }
                current.push(c);
            }
            ',' if stack.is_empty() => {
                args.push(std::mem::take(&mut current));
            }
            c if c.is_whitespace() => {}
            _ => current.push(c),
        }
    }

    if let Some((_, at)) = quote {
        return Err(PipelineError::ParseError(format!(
            "unterminated string starting at index {}",
            at
        )));
    }
    if let Some((open, at)) = stack.pop() {
        return Err(PipelineError::ParseError(format!(
            "unclosed '{}' at index {}",
            open, at
        )));
    }
    if !current.is_empty() {
        args.push(current);
    }
    Ok(args)
}
