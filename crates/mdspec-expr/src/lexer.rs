//! Tokenizer for the expression language.

use crate::error::{ExprError, Result};

/// A lexical token with its starting byte offset.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    /// Token kind and payload
    pub token: Token,
    /// Byte offset of the first character
    pub offset: usize,
}

/// Token kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Integer literal
    Int(i64),
    /// Floating point literal
    Float(f64),
    /// String literal with escapes resolved
    Str(String),
    /// Identifier or keyword
    Ident(String),
    /// `true`
    True,
    /// `false`
    False,
    /// `null`
    Null,
    /// `in`
    In,
    /// `(`
    LParen,
    /// `)`
    RParen,
    /// `[`
    LBracket,
    /// `]`
    RBracket,
    /// `{`
    LBrace,
    /// `}`
    RBrace,
    /// `.`
    Dot,
    /// `,`
    Comma,
    /// `:`
    Colon,
    /// `?`
    Question,
    /// `!`
    Bang,
    /// `+`
    Plus,
    /// `-`
    Minus,
    /// `*`
    Star,
    /// `/`
    Slash,
    /// `%`
    Percent,
    /// `==`
    EqEq,
    /// `!=`
    NotEq,
    /// `<`
    Lt,
    /// `<=`
    LtEq,
    /// `>`
    Gt,
    /// `>=`
    GtEq,
    /// `&&`
    AndAnd,
    /// `||`
    OrOr,
}

/// Split `source` into tokens.
///
/// # Errors
/// Returns `ExprError::Lex` on an unterminated string, malformed number or
/// unexpected character.
pub fn tokenize(source: &str) -> Result<Vec<Spanned>> {
    let bytes = source.as_bytes();
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < bytes.len() {
        let current = bytes[pos];
        if current.is_ascii_whitespace() {
            pos += 1;
            continue;
        }

        let start = pos;
        let token = match current {
            b'"' | b'\'' => {
                let (text, next) = lex_string(source, pos)?;
                pos = next;
                Token::Str(text)
            }
            b'0'..=b'9' => {
                let (token, next) = lex_number(source, pos)?;
                pos = next;
                token
            }
            byte if byte.is_ascii_alphabetic() || byte == b'_' => {
                let mut end = pos;
                while end < bytes.len() && (bytes[end].is_ascii_alphanumeric() || bytes[end] == b'_')
                {
                    end += 1;
                }
                let word = &source[pos..end];
                pos = end;
                match word {
                    "true" => Token::True,
                    "false" => Token::False,
                    "null" => Token::Null,
                    "in" => Token::In,
                    _ => Token::Ident(word.to_owned()),
                }
            }
            _ => {
                let (token, width) = lex_operator(bytes, pos)?;
                pos += width;
                token
            }
        };
        tokens.push(Spanned {
            token,
            offset: start,
        });
    }

    Ok(tokens)
}

fn lex_operator(bytes: &[u8], pos: usize) -> Result<(Token, usize)> {
    let next = bytes.get(pos + 1).copied();
    let pair = match (bytes[pos], next) {
        (b'=', Some(b'=')) => Some(Token::EqEq),
        (b'!', Some(b'=')) => Some(Token::NotEq),
        (b'<', Some(b'=')) => Some(Token::LtEq),
        (b'>', Some(b'=')) => Some(Token::GtEq),
        (b'&', Some(b'&')) => Some(Token::AndAnd),
        (b'|', Some(b'|')) => Some(Token::OrOr),
        _ => None,
    };
    if let Some(token) = pair {
        return Ok((token, 2));
    }

    let single = match bytes[pos] {
        b'(' => Token::LParen,
        b')' => Token::RParen,
        b'[' => Token::LBracket,
        b']' => Token::RBracket,
        b'{' => Token::LBrace,
        b'}' => Token::RBrace,
        b'.' => Token::Dot,
        b',' => Token::Comma,
        b':' => Token::Colon,
        b'?' => Token::Question,
        b'!' => Token::Bang,
        b'+' => Token::Plus,
        b'-' => Token::Minus,
        b'*' => Token::Star,
        b'/' => Token::Slash,
        b'%' => Token::Percent,
        b'<' => Token::Lt,
        b'>' => Token::Gt,
        other => {
            return Err(ExprError::Lex {
                offset: pos,
                message: format!("unexpected character '{}'", char::from(other)),
            });
        }
    };
    Ok((single, 1))
}

fn lex_number(source: &str, start: usize) -> Result<(Token, usize)> {
    let bytes = source.as_bytes();
    let mut end = start;
    let mut is_float = false;

    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    // A dot only belongs to the number when a digit follows, so `1.size()` stays a call.
    if end + 1 < bytes.len() && bytes[end] == b'.' && bytes[end + 1].is_ascii_digit() {
        is_float = true;
        end += 1;
        while end < bytes.len() && bytes[end].is_ascii_digit() {
            end += 1;
        }
    }
    if end < bytes.len() && (bytes[end] == b'e' || bytes[end] == b'E') {
        let mut exp_end = end + 1;
        if exp_end < bytes.len() && (bytes[exp_end] == b'+' || bytes[exp_end] == b'-') {
            exp_end += 1;
        }
        if exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            is_float = true;
            end = exp_end;
            while end < bytes.len() && bytes[end].is_ascii_digit() {
                end += 1;
            }
        }
    }

    let text = &source[start..end];
    let token = if is_float {
        Token::Float(text.parse().map_err(|err| ExprError::Lex {
            offset: start,
            message: format!("invalid number '{text}': {err}"),
        })?)
    } else {
        Token::Int(text.parse().map_err(|err| ExprError::Lex {
            offset: start,
            message: format!("invalid number '{text}': {err}"),
        })?)
    };
    Ok((token, end))
}

/// Lex a quoted string starting at `start`, returning the unescaped text and
/// the offset just past the closing quote.
///
/// Unknown escapes keep their backslash so regex patterns such as `\d+`
/// survive without double escaping.
fn lex_string(source: &str, start: usize) -> Result<(String, usize)> {
    let mut chars = source[start..].char_indices();
    let Some((_, quote)) = chars.next() else {
        return Err(ExprError::Lex {
            offset: start,
            message: "expected string".to_owned(),
        });
    };

    let mut text = String::new();
    while let Some((idx, current)) = chars.next() {
        if current == quote {
            return Ok((text, start + idx + current.len_utf8()));
        }
        if current != '\\' {
            text.push(current);
            continue;
        }
        match chars.next() {
            Some((_, 'n')) => text.push('\n'),
            Some((_, 't')) => text.push('\t'),
            Some((_, 'r')) => text.push('\r'),
            Some((_, '\\')) => text.push('\\'),
            Some((_, escaped)) if escaped == quote => text.push(escaped),
            Some((_, other)) => {
                text.push('\\');
                text.push(other);
            }
            None => break,
        }
    }

    Err(ExprError::Lex {
        offset: start,
        message: "unterminated string literal".to_owned(),
    })
}
