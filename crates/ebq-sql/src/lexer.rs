//! Converts a query string into a flat token stream for the parser.

use ebq_schema::EbqError;

use crate::keywords::Keyword;

#[derive(Debug, Clone, PartialEq)]
pub enum Lexeme {
    Ident(String),
    Keyword(Keyword),
    Integer(i64),
    Float(f64),
    StringLit(String),
    Star,
    Comma,
    Dot,
    LParen,
    RParen,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Plus,
    Minus,
    Slash,
    Eof,
}

pub fn lex(input: &str) -> Result<Vec<Lexeme>, EbqError> {
    let chars: Vec<char> = input.chars().collect();
    let mut out = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '*' => {
                out.push(Lexeme::Star);
                i += 1;
            }
            ',' => {
                out.push(Lexeme::Comma);
                i += 1;
            }
            '.' if !chars.get(i + 1).is_some_and(|c| c.is_ascii_digit()) => {
                out.push(Lexeme::Dot);
                i += 1;
            }
            '(' => {
                out.push(Lexeme::LParen);
                i += 1;
            }
            ')' => {
                out.push(Lexeme::RParen);
                i += 1;
            }
            '+' => {
                out.push(Lexeme::Plus);
                i += 1;
            }
            '-' => {
                out.push(Lexeme::Minus);
                i += 1;
            }
            '/' => {
                out.push(Lexeme::Slash);
                i += 1;
            }
            '=' => {
                out.push(Lexeme::Eq);
                i += 1;
            }
            '!' if chars.get(i + 1) == Some(&'=') => {
                out.push(Lexeme::NotEq);
                i += 2;
            }
            '<' if chars.get(i + 1) == Some(&'>') => {
                out.push(Lexeme::NotEq);
                i += 2;
            }
            '<' if chars.get(i + 1) == Some(&'=') => {
                out.push(Lexeme::LtEq);
                i += 2;
            }
            '<' => {
                out.push(Lexeme::Lt);
                i += 1;
            }
            '>' if chars.get(i + 1) == Some(&'=') => {
                out.push(Lexeme::GtEq);
                i += 2;
            }
            '>' => {
                out.push(Lexeme::Gt);
                i += 1;
            }
            '\'' => {
                let (lit, consumed) = lex_string(&chars[i..])?;
                out.push(Lexeme::StringLit(lit));
                i += consumed;
            }
            c if c.is_ascii_digit() => {
                let (lex_num, consumed) = lex_number(&chars[i..]);
                out.push(lex_num);
                i += consumed;
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                out.push(match Keyword::from_word(&word) {
                    Some(kw) => Lexeme::Keyword(kw),
                    None => Lexeme::Ident(word),
                });
            }
            other => return Err(EbqError::invalid_query(input, format!("unexpected character {other:?}"))),
        }
    }
    out.push(Lexeme::Eof);
    Ok(out)
}

fn lex_string(chars: &[char]) -> Result<(String, usize), EbqError> {
    debug_assert_eq!(chars[0], '\'');
    let mut out = String::new();
    let mut i = 1;
    while i < chars.len() {
        if chars[i] == '\'' {
            if chars.get(i + 1) == Some(&'\'') {
                out.push('\'');
                i += 2;
                continue;
            }
            return Ok((out, i + 1));
        }
        out.push(chars[i]);
        i += 1;
    }
    Err(EbqError::invalid_query(chars.iter().collect::<String>(), "unterminated string literal"))
}

fn lex_number(chars: &[char]) -> (Lexeme, usize) {
    let mut i = 0;
    while i < chars.len() && chars[i].is_ascii_digit() {
        i += 1;
    }
    let mut is_float = false;
    if chars.get(i) == Some(&'.') && chars.get(i + 1).is_some_and(|c| c.is_ascii_digit()) {
        is_float = true;
        i += 1;
        while i < chars.len() && chars[i].is_ascii_digit() {
            i += 1;
        }
    }
    let text: String = chars[..i].iter().collect();
    if is_float {
        (Lexeme::Float(text.parse().expect("validated digit run")), i)
    } else {
        (Lexeme::Integer(text.parse().expect("validated digit run")), i)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lexes_a_simple_select() {
        let tokens = lex("SELECT Make FROM cars WHERE Year > 2015").unwrap();
        assert_eq!(
            tokens,
            vec![
                Lexeme::Keyword(Keyword::SELECT),
                Lexeme::Ident("Make".into()),
                Lexeme::Keyword(Keyword::FROM),
                Lexeme::Ident("cars".into()),
                Lexeme::Keyword(Keyword::WHERE),
                Lexeme::Ident("Year".into()),
                Lexeme::Gt,
                Lexeme::Integer(2015),
                Lexeme::Eof,
            ]
        );
    }

    #[test]
    fn lexes_string_literal_with_escaped_quote() {
        let tokens = lex("'O''Brien'").unwrap();
        assert_eq!(tokens[0], Lexeme::StringLit("O'Brien".to_string()));
    }

    #[test]
    fn lexes_float_and_comparison_operators() {
        let tokens = lex("Price <= 12.5 AND Price != 0").unwrap();
        assert!(tokens.contains(&Lexeme::LtEq));
        assert!(tokens.contains(&Lexeme::Float(12.5)));
        assert!(tokens.contains(&Lexeme::NotEq));
    }

    #[test]
    fn rejects_unterminated_string() {
        assert!(lex("'abc").is_err());
    }
}
