use std::fmt;
use std::path::Path;

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::{Diagnostic, Span};

lazy_static! {
    /// One alternative per token class; the capture group that matched decides the class.
    static ref TOKEN_REGEX: Regex = Regex::new(concat!(
        r"(?P<space>\s+)",
        r"|(?P<line_comment>//[^\n]*)",
        r"|(?P<block_comment>/\*(?s:.*?)\*/)",
        r"|(?P<ident>[A-Za-z_][A-Za-z0-9_]*)",
        r"|(?P<int>[0-9]+)",
        r"|(?P<symbol>[{}()<>\[\],;=@.])",
    ))
    .unwrap();
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TokenKind {
    Identifier(String),
    Integer(u64),
    LeftBrace,
    RightBrace,
    LeftParen,
    RightParen,
    LeftAngle,
    RightAngle,
    LeftBracket,
    RightBracket,
    Comma,
    Semicolon,
    Equals,
    At,
    Dot,
    EndOfFile,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Identifier(name) => write!(f, "identifier {name:?}"),
            Self::Integer(value) => write!(f, "integer {value}"),
            Self::LeftBrace => f.write_str("'{'"),
            Self::RightBrace => f.write_str("'}'"),
            Self::LeftParen => f.write_str("'('"),
            Self::RightParen => f.write_str("')'"),
            Self::LeftAngle => f.write_str("'<'"),
            Self::RightAngle => f.write_str("'>'"),
            Self::LeftBracket => f.write_str("'['"),
            Self::RightBracket => f.write_str("']'"),
            Self::Comma => f.write_str("','"),
            Self::Semicolon => f.write_str("';'"),
            Self::Equals => f.write_str("'='"),
            Self::At => f.write_str("'@'"),
            Self::Dot => f.write_str("'.'"),
            Self::EndOfFile => f.write_str("end of file"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

/// Tracks line and column while the tokenizer advances over the source.
struct Cursor {
    line: usize,
    column: usize,
}

impl Cursor {
    fn span(&self) -> Span {
        Span {
            line: self.line,
            column: self.column,
        }
    }

    fn advance(&mut self, text: &str) {
        for c in text.chars() {
            if c == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
    }
}

fn symbol_kind(symbol: &str) -> TokenKind {
    match symbol {
        "{" => TokenKind::LeftBrace,
        "}" => TokenKind::RightBrace,
        "(" => TokenKind::LeftParen,
        ")" => TokenKind::RightParen,
        "<" => TokenKind::LeftAngle,
        ">" => TokenKind::RightAngle,
        "[" => TokenKind::LeftBracket,
        "]" => TokenKind::RightBracket,
        "," => TokenKind::Comma,
        ";" => TokenKind::Semicolon,
        "=" => TokenKind::Equals,
        "@" => TokenKind::At,
        "." => TokenKind::Dot,
        _ => unreachable!("symbol class only matches known symbols"),
    }
}

/// Splits `source` into tokens, ending with [`TokenKind::EndOfFile`].
///
/// Every stretch of unrecognized text is reported; the token stream is only returned if there
/// were none.
pub fn tokenize(file: &Path, source: &str) -> Result<Vec<Token>, Vec<Diagnostic>> {
    let mut tokens = Vec::new();
    let mut errors = Vec::new();
    let mut cursor = Cursor { line: 1, column: 1 };
    let mut last_end = 0;

    let mut report = |cursor: &Cursor, message: String| {
        errors.push(Diagnostic {
            file: file.to_path_buf(),
            span: cursor.span(),
            message,
        });
    };

    for captures in TOKEN_REGEX.captures_iter(source) {
        let Some(whole) = captures.get(0) else {
            continue;
        };

        if whole.start() > last_end {
            let unexpected = &source[last_end..whole.start()];
            if unexpected.starts_with("/*") {
                // a terminated comment would have matched at this position
                report(&cursor, "unterminated block comment".to_string());
                last_end = source.len();
                break;
            }
            report(&cursor, format!("unexpected character(s) {unexpected:?}"));
            cursor.advance(unexpected);
        }

        let span = cursor.span();
        let kind = if let Some(ident) = captures.name("ident") {
            Some(TokenKind::Identifier(ident.as_str().to_string()))
        } else if let Some(int) = captures.name("int") {
            match int.as_str().parse::<u64>() {
                Ok(value) => Some(TokenKind::Integer(value)),
                Err(_) => {
                    report(&cursor, format!("integer literal {} is too large", int.as_str()));
                    None
                }
            }
        } else {
            captures
                .name("symbol")
                .map(|symbol| symbol_kind(symbol.as_str()))
        };

        if let Some(kind) = kind {
            tokens.push(Token { kind, span });
        }

        cursor.advance(whole.as_str());
        last_end = whole.end();
    }

    if last_end < source.len() {
        let unexpected = &source[last_end..];
        let message = if unexpected.starts_with("/*") {
            "unterminated block comment".to_string()
        } else {
            format!("unexpected character(s) {unexpected:?}")
        };
        report(&cursor, message);
        cursor.advance(unexpected);
    }

    if !errors.is_empty() {
        return Err(errors);
    }

    tokens.push(Token {
        kind: TokenKind::EndOfFile,
        span: cursor.span(),
    });
    Ok(tokens)
}
