//! Expression lexer with the localized keyword table
//!
//! Localized function and operator names are translated per identifier token,
//! so keywords appearing inside string literals are never touched.

use super::ExprError;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Number(f64),
    /// Quoted string literal (content without quotes)
    Str(String),
    /// Function name or unknown word
    Ident(String),
    /// Unresolved `[Name]` placeholder
    Placeholder(String),
    Bool(bool),
    // Punctuation
    LParen,
    RParen,
    Comma,
    // Arithmetic
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    // Comparison
    Eq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,
    // Logic
    And,
    Or,
    Not,
    // Ternary
    If,
    Question,
    Colon,
}

impl Token {
    /// Operators, parentheses and ternary parts; their presence makes text
    /// worth evaluating
    pub fn is_operator(&self) -> bool {
        !matches!(
            self,
            Token::Number(_)
                | Token::Str(_)
                | Token::Ident(_)
                | Token::Placeholder(_)
                | Token::Bool(_)
        )
    }

    pub fn is_ternary(&self) -> bool {
        matches!(self, Token::If | Token::Question | Token::Colon)
    }
}

/// Localized (Russian) and canonical keywords
fn translate_keyword(word: &str) -> Option<Token> {
    let upper = word.to_uppercase();
    let token = match upper.as_str() {
        "ЕСЛИ" | "IF" => Token::If,
        "ТО" | "THEN" => Token::Question,
        "ИНАЧЕ" | "ELSE" => Token::Colon,
        "И" | "AND" => Token::And,
        "ИЛИ" | "OR" => Token::Or,
        "НЕ" | "NOT" => Token::Not,
        "ИСТИНА" | "TRUE" => Token::Bool(true),
        "ЛОЖЬ" | "FALSE" => Token::Bool(false),
        "ОКРВНИЗ" => Token::Ident("floor".into()),
        "ОКРУГЛ" => Token::Ident("round".into()),
        "ОКРВВЕРХ" => Token::Ident("ceiling".into()),
        "МОДУЛЬ" => Token::Ident("abs".into()),
        "КОРЕНЬ" => Token::Ident("sqrt".into()),
        "МИН" => Token::Ident("min".into()),
        "МАКС" => Token::Ident("max".into()),
        "СРЗНАЧ" => Token::Ident("avg".into()),
        "ЧЕТН" => Token::Ident("iseven".into()),
        "ЕЧИСЛО" => Token::Ident("isnumber".into()),
        "СОДЕРЖИТ" => Token::Ident("contains".into()),
        "РАВНО" => Token::Ident("equals".into()),
        "ДИАПАЗОН" => Token::Ident("inrange".into()),
        "ТАБЛИЦА" => Token::Ident("lookup".into()),
        _ => return None,
    };
    Some(token)
}

pub fn lex(src: &str) -> Result<Vec<Token>, ExprError> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = src.chars().collect();
    let mut pos = 0usize;

    while pos < chars.len() {
        let c = chars[pos];

        if c.is_whitespace() {
            pos += 1;
            continue;
        }

        // String literal
        if c == '\'' || c == '"' {
            let quote = c;
            let start = pos;
            pos += 1;
            let mut s = String::new();
            loop {
                if pos >= chars.len() {
                    return Err(ExprError::lex(start, "unterminated string literal"));
                }
                if chars[pos] == quote {
                    pos += 1;
                    break;
                }
                s.push(chars[pos]);
                pos += 1;
            }
            tokens.push(Token::Str(s));
            continue;
        }

        // Leftover placeholder
        if c == '[' {
            let start = pos;
            pos += 1;
            let mut name = String::new();
            loop {
                if pos >= chars.len() {
                    return Err(ExprError::lex(start, "unterminated placeholder"));
                }
                if chars[pos] == ']' {
                    pos += 1;
                    break;
                }
                name.push(chars[pos]);
                pos += 1;
            }
            tokens.push(Token::Placeholder(name));
            continue;
        }

        // Number
        if c.is_ascii_digit()
            || (c == '.' && pos + 1 < chars.len() && chars[pos + 1].is_ascii_digit())
        {
            let start = pos;
            while pos < chars.len() && chars[pos].is_ascii_digit() {
                pos += 1;
            }
            if pos < chars.len()
                && chars[pos] == '.'
                && pos + 1 < chars.len()
                && chars[pos + 1].is_ascii_digit()
            {
                pos += 1;
                while pos < chars.len() && chars[pos].is_ascii_digit() {
                    pos += 1;
                }
            }
            let s: String = chars[start..pos].iter().collect();
            let n: f64 = s
                .parse()
                .map_err(|_| ExprError::lex(start, format!("invalid number '{}'", s)))?;
            tokens.push(Token::Number(n));
            continue;
        }

        // Identifier or keyword
        if c.is_alphabetic() || c == '_' {
            let start = pos;
            while pos < chars.len()
                && (chars[pos].is_alphanumeric() || chars[pos] == '_' || chars[pos] == '.')
            {
                pos += 1;
            }
            let word: String = chars[start..pos].iter().collect();
            tokens.push(translate_keyword(&word).unwrap_or(Token::Ident(word)));
            continue;
        }

        let next = chars.get(pos + 1).copied();
        let (token, width) = match (c, next) {
            ('=', Some('=')) => (Token::Eq, 2),
            ('!', Some('=')) => (Token::Neq, 2),
            ('<', Some('>')) => (Token::Neq, 2),
            ('<', Some('=')) => (Token::Lte, 2),
            ('>', Some('=')) => (Token::Gte, 2),
            ('&', Some('&')) => (Token::And, 2),
            ('|', Some('|')) => (Token::Or, 2),
            ('=', _) => (Token::Eq, 1),
            ('<', _) => (Token::Lt, 1),
            ('>', _) => (Token::Gt, 1),
            ('!', _) => (Token::Not, 1),
            ('+', _) => (Token::Plus, 1),
            ('-', _) => (Token::Minus, 1),
            ('*', _) => (Token::Star, 1),
            ('/', _) => (Token::Slash, 1),
            ('%', _) => (Token::Percent, 1),
            ('(', _) => (Token::LParen, 1),
            (')', _) => (Token::RParen, 1),
            (',', _) | (';', _) => (Token::Comma, 1),
            ('?', _) => (Token::Question, 1),
            (':', _) => (Token::Colon, 1),
            _ => return Err(ExprError::lex(pos, format!("unexpected character '{}'", c))),
        };
        tokens.push(token);
        pos += width;
    }

    Ok(tokens)
}
