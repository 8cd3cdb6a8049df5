use crate::error::{ParseError, ParseErrorKind};

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Input code reference
    Code(u32),
    Plus,
    Minus,
    LParen,
    RParen,
    // End of input
    Eof,
}

impl Token {
    /// Human-readable name used in parse error messages.
    pub fn describe(&self) -> String {
        match self {
            Token::Code(n) => format!("code {}", n),
            Token::Plus => "'+'".to_owned(),
            Token::Minus => "'-'".to_owned(),
            Token::LParen => "'('".to_owned(),
            Token::RParen => "')'".to_owned(),
            Token::Eof => "end of formula".to_owned(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Spanned {
    pub token: Token,
    /// 1-based character column of the token's first character.
    pub col: usize,
}

/// Split a formula into tokens. Anything other than digits, `+`, `-`,
/// `(`, `)` and whitespace is rejected here, before any parsing happens.
pub fn lex(formula: &str) -> Result<Vec<Spanned>, ParseError> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = formula.chars().collect();
    let mut pos = 0usize;

    while pos < chars.len() {
        let c = chars[pos];

        if c.is_whitespace() {
            pos += 1;
            continue;
        }

        let col = pos + 1;

        if c.is_ascii_digit() {
            let start = pos;
            while pos < chars.len() && chars[pos].is_ascii_digit() {
                pos += 1;
            }
            let s: String = chars[start..pos].iter().collect();
            let n: u32 = s.parse().map_err(|_| {
                ParseError::new(formula, col, ParseErrorKind::CodeTooLarge { literal: s.clone() })
            })?;
            tokens.push(Spanned {
                token: Token::Code(n),
                col,
            });
            continue;
        }

        let token = match c {
            '+' => Token::Plus,
            '-' => Token::Minus,
            '(' => Token::LParen,
            ')' => Token::RParen,
            other => {
                return Err(ParseError::new(
                    formula,
                    col,
                    ParseErrorKind::UnexpectedChar { ch: other },
                ))
            }
        };
        tokens.push(Spanned { token, col });
        pos += 1;
    }

    tokens.push(Spanned {
        token: Token::Eof,
        col: chars.len() + 1,
    });
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(formula: &str) -> Vec<Token> {
        lex(formula)
            .expect("lex should succeed")
            .into_iter()
            .map(|s| s.token)
            .collect()
    }

    #[test]
    fn lexes_codes_operators_and_parens() {
        assert_eq!(
            kinds("201+(17-517)"),
            vec![
                Token::Code(201),
                Token::Plus,
                Token::LParen,
                Token::Code(17),
                Token::Minus,
                Token::Code(517),
                Token::RParen,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn whitespace_is_skipped_and_columns_are_tracked() {
        let tokens = lex(" 4 +\t376 ").unwrap();
        let cols: Vec<usize> = tokens.iter().map(|t| t.col).collect();
        assert_eq!(cols, vec![2, 4, 6, 10]);
    }

    #[test]
    fn rejects_letters() {
        let err = lex("4+abs(3)").unwrap_err();
        assert_eq!(err.column, 3);
        assert_eq!(err.kind, ParseErrorKind::UnexpectedChar { ch: 'a' });
    }

    #[test]
    fn rejects_decimal_point_and_other_operators() {
        for bad in ["4.5", "4*2", "4/2", "4,5", "__import__"] {
            assert!(lex(bad).is_err(), "'{}' should not lex", bad);
        }
    }

    #[test]
    fn rejects_code_literal_that_overflows() {
        let err = lex("99999999999").unwrap_err();
        assert!(matches!(err.kind, ParseErrorKind::CodeTooLarge { .. }));
    }
}
