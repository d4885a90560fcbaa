use std::mem;

use thiserror::Error;

/// Error for a line that cannot be split into tokens.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenizeError {
    #[error("unterminated {0} quote")]
    UnterminatedQuote(&'static str),
    #[error("unclosed {0}")]
    Unclosed(char),
    #[error("unexpected {0}")]
    Unexpected(char),
}

/// Splits a shell line into tokens.
///
/// Tokens are separated by whitespace. Single quotes group text and are removed. Double quotes are
/// kept, so that JSON strings survive. Brackets and braces group everything up to their matching
/// closer, so JSON lists and objects may contain spaces.
pub fn tokenize(line: &str) -> Result<Vec<String>, TokenizeError> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut closers = Vec::new();
    let mut chars = line.chars();
    while let Some(c) = chars.next() {
        match c {
            '\'' => {
                in_token = true;
                loop {
                    match chars.next() {
                        Some('\'') => break,
                        Some(c) => current.push(c),
                        None => return Err(TokenizeError::UnterminatedQuote("single")),
                    }
                }
            }
            '"' => {
                in_token = true;
                current.push(c);
                let mut escaped = false;
                loop {
                    let c = chars
                        .next()
                        .ok_or(TokenizeError::UnterminatedQuote("double"))?;
                    current.push(c);
                    if escaped {
                        escaped = false;
                    } else if c == '\\' {
                        escaped = true;
                    } else if c == '"' {
                        break;
                    }
                }
            }
            '[' | '{' => {
                in_token = true;
                closers.push(if c == '[' { ']' } else { '}' });
                current.push(c);
            }
            ']' | '}' => {
                if closers.pop() != Some(c) {
                    return Err(TokenizeError::Unexpected(c));
                }
                current.push(c);
            }
            c if c.is_whitespace() && closers.is_empty() => {
                if in_token {
                    tokens.push(mem::take(&mut current));
                    in_token = false;
                }
            }
            c => {
                in_token = true;
                current.push(c);
            }
        }
    }
    if let Some(closer) = closers.pop() {
        return Err(TokenizeError::Unclosed(if closer == ']' { '[' } else { '{' }));
    }
    if in_token {
        tokens.push(current);
    }
    Ok(tokens)
}

#[cfg(test)]
mod tokenizer_test {
    use crate::tokenizer::{
        TokenizeError,
        tokenize,
    };

    #[test]
    fn splits_on_whitespace() {
        pretty_assertions::assert_eq!(
            tokenize("  call  local.alice   com.example.add ").unwrap(),
            vec!["call", "local.alice", "com.example.add"]
        );
        assert_eq!(tokenize("").unwrap(), Vec::<String>::new());
    }

    #[test]
    fn strips_single_quotes() {
        pretty_assertions::assert_eq!(
            tokenize("publish p 'hello world' ''").unwrap(),
            vec!["publish", "p", "hello world", ""]
        );
    }

    #[test]
    fn keeps_double_quotes_for_json() {
        pretty_assertions::assert_eq!(
            tokenize(r#"invoke c "a b" key="x \" y""#).unwrap(),
            vec!["invoke", "c", r#""a b""#, r#"key="x \" y""#]
        );
    }

    #[test]
    fn groups_brackets_and_braces() {
        pretty_assertions::assert_eq!(
            tokenize(r#"invoke c [1, [2, 3]] {"a": [1, 2], "b": "}"} k={"x": 1}"#).unwrap(),
            vec![
                "invoke",
                "c",
                "[1, [2, 3]]",
                r#"{"a": [1, 2], "b": "}"}"#,
                r#"k={"x": 1}"#,
            ]
        );
    }

    #[test]
    fn rejects_unbalanced_input() {
        assert_eq!(
            tokenize("invoke c [1, 2"),
            Err(TokenizeError::Unclosed('['))
        );
        assert_eq!(tokenize("invoke c [1}"), Err(TokenizeError::Unexpected('}')));
        assert_eq!(
            tokenize("invoke c 'abc"),
            Err(TokenizeError::UnterminatedQuote("single"))
        );
        assert_eq!(
            tokenize(r#"invoke c "abc"#),
            Err(TokenizeError::UnterminatedQuote("double"))
        );
    }
}
