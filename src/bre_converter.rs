//! BRE to regex-crate converter
//!
//! Scripts use POSIX Basic Regular Expressions unless `-E` is given. The
//! `regex` crate speaks a Perl-like dialect, so every pattern is rewritten
//! before it is compiled.

/// Convert a Basic Regular Expression to `regex` crate syntax
///
/// # Conversion Rules
///
/// - `\(` `\)` `\{` `\}` `\+` `\?` `\|` become the bare operators
/// - bare `(` `)` `{` `}` `+` `?` `|` are literal and get escaped
/// - `*` at the start of an expression (also after `\(`, `\|` or a leading
///   `^`) is a literal asterisk
/// - `^` anchors only at the start of an expression, `$` only at its end
/// - `\<` `\>` `` \` `` `\'` become `\b{start}` `\b{end}` `\A` `\z`
/// - `\1`..`\9` cannot be expressed and are rejected
/// - bracket expressions go through [`convert_bracket`]
pub fn convert_bre(pattern: &str) -> Result<String, String> {
    let chars: Vec<char> = pattern.chars().collect();
    let mut result = String::with_capacity(pattern.len() + 8);
    // True where `*` would have nothing to repeat
    let mut at_start = true;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '\\' => {
                let Some(&next) = chars.get(i + 1) else {
                    return Err("trailing backslash (\\)".to_string());
                };
                i += 2;
                match next {
                    '(' => {
                        result.push('(');
                        at_start = true;
                        continue;
                    }
                    '|' => {
                        result.push('|');
                        at_start = true;
                        continue;
                    }
                    ')' | '{' | '}' | '+' | '?' => result.push(next),
                    _ => push_common_escape(next, &mut result)?,
                }
            }
            '[' => {
                i = convert_bracket(&chars, i, &mut result)?;
            }
            '*' if at_start => {
                result.push_str("\\*");
                i += 1;
            }
            '^' if at_start => {
                result.push('^');
                i += 1;
                // `^*` still has nothing to repeat
                continue;
            }
            '$' => {
                if closes_expression(&chars, i + 1) {
                    result.push('$');
                } else {
                    result.push_str("\\$");
                }
                i += 1;
            }
            '.' | '*' => {
                result.push(c);
                i += 1;
            }
            _ => {
                push_literal(c, &mut result);
                i += 1;
            }
        }
        at_start = false;
    }

    Ok(result)
}

/// True if position `i` ends the pattern or a group/alternative
fn closes_expression(chars: &[char], i: usize) -> bool {
    match chars.get(i) {
        None => true,
        Some('\\') => matches!(chars.get(i + 1), Some(')') | Some('|')),
        Some(_) => false,
    }
}

/// Escapes that mean the same thing in BRE and ERE
pub(crate) fn push_common_escape(c: char, result: &mut String) -> Result<(), String> {
    match c {
        '1'..='9' => {
            return Err(format!(
                "back-reference \\{c} in a pattern is not supported"
            ));
        }
        '<' => result.push_str("\\b{start}"),
        '>' => result.push_str("\\b{end}"),
        '`' => result.push_str("\\A"),
        '\'' => result.push_str("\\z"),
        'w' | 'W' | 's' | 'S' | 'b' | 'B' | 'n' | 't' => {
            result.push('\\');
            result.push(c);
        }
        _ => push_literal(c, result),
    }
    Ok(())
}

pub(crate) fn push_literal(c: char, result: &mut String) {
    let mut buf = [0u8; 4];
    result.push_str(&regex::escape(c.encode_utf8(&mut buf)));
}

/// Rewrite the POSIX bracket expression starting at `chars[start]` (a `[`)
/// and return the index just past its closing `]`.
///
/// Backslash is an ordinary character inside POSIX brackets, apart from the
/// `\n` and `\t` escapes. A `]` first in the list is literal, and `[:class:]`
/// is passed through since the `regex` crate understands it.
pub(crate) fn convert_bracket(
    chars: &[char],
    start: usize,
    result: &mut String,
) -> Result<usize, String> {
    let unterminated = || "unterminated [".to_string();
    let mut i = start + 1;
    result.push('[');

    if chars.get(i) == Some(&'^') {
        result.push('^');
        i += 1;
    }
    if chars.get(i) == Some(&']') {
        result.push_str("\\]");
        i += 1;
    }

    loop {
        let c = *chars.get(i).ok_or_else(unterminated)?;
        match c {
            ']' => {
                result.push(']');
                return Ok(i + 1);
            }
            '[' => match chars.get(i + 1) {
                Some(&kind @ (':' | '.' | '=')) => {
                    let body_start = i + 2;
                    let mut end = body_start;
                    while end + 1 < chars.len() && !(chars[end] == kind && chars[end + 1] == ']') {
                        end += 1;
                    }
                    if end + 1 >= chars.len() {
                        return Err(unterminated());
                    }
                    if kind == ':' {
                        result.push_str("[:");
                        result.extend(&chars[body_start..end]);
                        result.push_str(":]");
                    } else {
                        // Collating symbols and equivalence classes: the
                        // characters themselves
                        for &ch in &chars[body_start..end] {
                            push_bracket_literal(ch, result);
                        }
                    }
                    i = end + 2;
                }
                _ => {
                    result.push_str("\\[");
                    i += 1;
                }
            },
            '\\' => match chars.get(i + 1) {
                Some('n') => {
                    result.push_str("\\n");
                    i += 2;
                }
                Some('t') => {
                    result.push_str("\\t");
                    i += 2;
                }
                _ => {
                    result.push_str("\\\\");
                    i += 1;
                }
            },
            _ => {
                push_bracket_literal(c, result);
                i += 1;
            }
        }
    }
}

fn push_bracket_literal(c: char, result: &mut String) {
    match c {
        '&' | '~' | '[' | ']' | '\\' | '^' => {
            result.push('\\');
            result.push(c);
        }
        _ => result.push(c),
    }
}
