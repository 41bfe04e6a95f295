//! ERE to regex-crate converter
//!
//! Extended Regular Expressions are already close to the `regex` crate's
//! syntax. Operators pass through; only bracket expressions, the GNU word
//! boundary escapes and a few corner cases need rewriting.

use crate::bre_converter::{convert_bracket, push_common_escape, push_literal};

/// Convert an Extended Regular Expression to `regex` crate syntax
///
/// # Conversion Rules
///
/// - `( ) { } + ? | ^ $ . *` keep their meaning
/// - a repetition operator with nothing to repeat is a literal
/// - `\<` `\>` `` \` `` `\'` become `\b{start}` `\b{end}` `\A` `\z`
/// - `\1`..`\9` cannot be expressed and are rejected
/// - bracket expressions are rewritten as for BRE
pub fn convert_ere(pattern: &str) -> Result<String, String> {
    let chars: Vec<char> = pattern.chars().collect();
    let mut result = String::with_capacity(pattern.len() + 8);
    let mut at_start = true;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        i += 1;
        match c {
            '\\' => {
                let Some(&next) = chars.get(i) else {
                    return Err("trailing backslash (\\)".to_string());
                };
                i += 1;
                push_common_escape(next, &mut result)?;
            }
            '[' => {
                i = convert_bracket(&chars, i - 1, &mut result)?;
            }
            '(' | '|' => {
                result.push(c);
                at_start = true;
                continue;
            }
            '^' => {
                result.push('^');
                continue;
            }
            '*' | '+' | '?' | '{' if at_start => push_literal(c, &mut result),
            _ => result.push(c),
        }
        at_start = false;
    }

    Ok(result)
}
