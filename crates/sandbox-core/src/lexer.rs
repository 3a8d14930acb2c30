//! Tokenizer for the sandbox language.
//!
//! Intra-line tokens come from a `logos` lexer. Layout (`Newline`, `Indent`,
//! `Dedent`) is layered on top line by line: no token spans a line break, and
//! an open bracket suppresses the layout tokens of the lines it continues onto.
//!
//! All line numbers are 1-based lines of the text handed in, which for
//! compiled units is the preamble-prefixed text.

use logos::Logos;

/// Columns a tab advances indentation to (the next multiple of this value).
const TAB_WIDTH: usize = 8;

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\f]+")]
#[logos(skip r"#[^\n]*")]
pub enum Token {
    #[token("def")]
    Def,
    #[token("return")]
    Return,
    #[token("if")]
    If,
    #[token("elif")]
    Elif,
    #[token("else")]
    Else,
    #[token("while")]
    While,
    #[token("for")]
    For,
    #[token("in")]
    In,
    #[token("break")]
    Break,
    #[token("continue")]
    Continue,
    #[token("pass")]
    Pass,
    #[token("raise")]
    Raise,
    #[token("try")]
    Try,
    #[token("except")]
    Except,
    #[token("as")]
    As,
    #[token("assert")]
    Assert,
    #[token("and")]
    And,
    #[token("or")]
    Or,
    #[token("not")]
    Not,
    #[token("is")]
    Is,
    #[token("True")]
    True,
    #[token("False")]
    False,
    #[token("None")]
    None,

    // Reserved words the grammar never accepts. They are lexed as keywords so
    // a policy can name them and so they can never be bound as identifiers.
    #[token("import")]
    Import,
    #[token("from")]
    From,
    #[token("global")]
    Global,
    #[token("nonlocal")]
    Nonlocal,
    #[token("class")]
    Class,
    #[token("with")]
    With,
    #[token("yield")]
    Yield,
    #[token("lambda")]
    Lambda,
    #[token("async")]
    Async,
    #[token("await")]
    Await,
    #[token("del")]
    Del,

    #[regex(r"[A-Za-z_][A-Za-z0-9_]*", |lex| lex.slice().to_string())]
    Ident(String),
    #[regex(r"[0-9]+\.[0-9]*([eE][+-]?[0-9]+)?", parse_float)]
    #[regex(r"\.[0-9]+([eE][+-]?[0-9]+)?", parse_float)]
    #[regex(r"[0-9]+[eE][+-]?[0-9]+", parse_float)]
    Float(f64),
    #[regex(r"[0-9]+", |lex| lex.slice().parse::<i64>().ok())]
    Int(i64),
    #[regex(r#""([^"\\\n]|\\.)*""#, unescape)]
    #[regex(r#"'([^'\\\n]|\\.)*'"#, unescape)]
    Str(String),

    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token(",")]
    Comma,
    #[token(":")]
    Colon,
    #[token(".")]
    Dot,
    #[token("=")]
    Assign,
    #[token("==")]
    EqEq,
    #[token("!=")]
    NotEq,
    #[token("<")]
    Lt,
    #[token("<=")]
    LtEq,
    #[token(">")]
    Gt,
    #[token(">=")]
    GtEq,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("//")]
    DoubleSlash,
    #[token("%")]
    Percent,
    #[token("**")]
    DoubleStar,
    #[token("+=")]
    PlusAssign,
    #[token("-=")]
    MinusAssign,
    #[token("*=")]
    StarAssign,
    #[token("/=")]
    SlashAssign,
    #[token("//=")]
    DoubleSlashAssign,
    #[token("%=")]
    PercentAssign,
}

fn parse_float(lex: &mut logos::Lexer<Token>) -> Option<f64> {
    lex.slice().parse().ok()
}

fn unescape(lex: &mut logos::Lexer<Token>) -> String {
    let slice = lex.slice();
    let inner = &slice[1..slice.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some('\\') => out.push('\\'),
            Some('\'') => out.push('\''),
            Some('"') => out.push('"'),
            // Unknown escapes are kept verbatim.
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

impl Token {
    /// Source spelling of keywords, used by policy checks.
    pub fn keyword(&self) -> Option<&'static str> {
        Some(match self {
            Token::Def => "def",
            Token::Return => "return",
            Token::If => "if",
            Token::Elif => "elif",
            Token::Else => "else",
            Token::While => "while",
            Token::For => "for",
            Token::In => "in",
            Token::Break => "break",
            Token::Continue => "continue",
            Token::Pass => "pass",
            Token::Raise => "raise",
            Token::Try => "try",
            Token::Except => "except",
            Token::As => "as",
            Token::Assert => "assert",
            Token::And => "and",
            Token::Or => "or",
            Token::Not => "not",
            Token::Is => "is",
            Token::True => "True",
            Token::False => "False",
            Token::None => "None",
            Token::Import => "import",
            Token::From => "from",
            Token::Global => "global",
            Token::Nonlocal => "nonlocal",
            Token::Class => "class",
            Token::With => "with",
            Token::Yield => "yield",
            Token::Lambda => "lambda",
            Token::Async => "async",
            Token::Await => "await",
            Token::Del => "del",
            _ => return None,
        })
    }
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(keyword) = self.keyword() {
            return write!(f, "'{}'", keyword);
        }
        match self {
            Token::Ident(name) => write!(f, "name '{}'", name),
            Token::Int(value) => write!(f, "number {}", value),
            Token::Float(value) => write!(f, "number {}", value),
            Token::Str(_) => write!(f, "string literal"),
            Token::LParen => write!(f, "'('"),
            Token::RParen => write!(f, "')'"),
            Token::LBracket => write!(f, "'['"),
            Token::RBracket => write!(f, "']'"),
            Token::LBrace => write!(f, "'{{'"),
            Token::RBrace => write!(f, "'}}'"),
            Token::Comma => write!(f, "','"),
            Token::Colon => write!(f, "':'"),
            Token::Dot => write!(f, "'.'"),
            Token::Assign => write!(f, "'='"),
            Token::EqEq => write!(f, "'=='"),
            Token::NotEq => write!(f, "'!='"),
            Token::Lt => write!(f, "'<'"),
            Token::LtEq => write!(f, "'<='"),
            Token::Gt => write!(f, "'>'"),
            Token::GtEq => write!(f, "'>='"),
            Token::Plus => write!(f, "'+'"),
            Token::Minus => write!(f, "'-'"),
            Token::Star => write!(f, "'*'"),
            Token::Slash => write!(f, "'/'"),
            Token::DoubleSlash => write!(f, "'//'"),
            Token::Percent => write!(f, "'%'"),
            Token::DoubleStar => write!(f, "'**'"),
            Token::PlusAssign => write!(f, "'+='"),
            Token::MinusAssign => write!(f, "'-='"),
            Token::StarAssign => write!(f, "'*='"),
            Token::SlashAssign => write!(f, "'/='"),
            Token::DoubleSlashAssign => write!(f, "'//='"),
            Token::PercentAssign => write!(f, "'%='"),
            _ => write!(f, "{:?}", self),
        }
    }
}

/// A token or a layout marker.
#[derive(Debug, Clone, PartialEq)]
pub enum Tok {
    Token(Token),
    Newline,
    Indent,
    Dedent,
    Eof,
}

impl std::fmt::Display for Tok {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Tok::Token(token) => write!(f, "{}", token),
            Tok::Newline => write!(f, "end of line"),
            Tok::Indent => write!(f, "indent"),
            Tok::Dedent => write!(f, "dedent"),
            Tok::Eof => write!(f, "end of input"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub tok: Tok,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexError {
    pub line: usize,
    pub message: String,
}

/// Measure leading indentation, returning (width, byte offset of content).
fn measure_indent(line: &str) -> (usize, usize) {
    let mut width = 0;
    for (offset, c) in line.char_indices() {
        match c {
            ' ' => width += 1,
            '\t' => width = (width / TAB_WIDTH + 1) * TAB_WIDTH,
            '\x0c' => width = 0,
            _ => return (width, offset),
        }
    }
    (width, line.len())
}

/// Tokenize `text` into a layout-aware stream ending in [`Tok::Eof`].
pub fn tokenize(text: &str) -> Result<Vec<Spanned>, LexError> {
    let mut out = Vec::new();
    let mut indents = vec![0usize];
    let mut bracket_depth = 0usize;
    let mut pending = false;
    let mut last_line = 1;

    for (idx, raw) in text.split('\n').enumerate() {
        let line = idx + 1;

        let segment = if bracket_depth == 0 {
            let (width, start) = measure_indent(raw);
            let content = &raw[start..];
            if content.trim().is_empty() || content.starts_with('#') {
                continue;
            }
            let current = *indents.last().unwrap_or(&0);
            if width > current {
                indents.push(width);
                out.push(Spanned {
                    tok: Tok::Indent,
                    line,
                });
            } else if width < current {
                while indents.last().is_some_and(|level| *level > width) {
                    indents.pop();
                    out.push(Spanned {
                        tok: Tok::Dedent,
                        line,
                    });
                }
                if indents.last() != Some(&width) {
                    return Err(LexError {
                        line,
                        message: "unindent does not match any outer indentation level"
                            .to_string(),
                    });
                }
            }
            content
        } else {
            raw
        };

        let mut lexer = Token::lexer(segment);
        while let Some(result) = lexer.next() {
            let token = result.map_err(|()| LexError {
                line,
                message: format!("invalid syntax near '{}'", lexer.slice()),
            })?;
            match token {
                Token::LParen | Token::LBracket | Token::LBrace => bracket_depth += 1,
                Token::RParen | Token::RBracket | Token::RBrace => {
                    bracket_depth = bracket_depth.saturating_sub(1)
                }
                _ => {}
            }
            pending = true;
            last_line = line;
            out.push(Spanned {
                tok: Tok::Token(token),
                line,
            });
        }

        if bracket_depth == 0 && pending {
            out.push(Spanned {
                tok: Tok::Newline,
                line,
            });
            pending = false;
        }
    }

    if pending {
        out.push(Spanned {
            tok: Tok::Newline,
            line: last_line,
        });
    }
    for _ in 1..indents.len() {
        out.push(Spanned {
            tok: Tok::Dedent,
            line: last_line,
        });
    }
    out.push(Spanned {
        tok: Tok::Eof,
        line: last_line,
    });
    Ok(out)
}

/// Every recognizable token with its line, skipping anything unlexable.
///
/// Used by policy checks, which judge only what they can recognize and leave
/// malformed input for the compiler to reject.
pub fn scan(text: &str) -> Vec<(usize, Token)> {
    text.split('\n')
        .enumerate()
        .flat_map(|(idx, raw)| {
            Token::lexer(raw)
                .filter_map(Result::ok)
                .map(move |token| (idx + 1, token))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(text: &str) -> Vec<Tok> {
        tokenize(text)
            .expect("tokenize")
            .into_iter()
            .map(|spanned| spanned.tok)
            .collect()
    }

    #[test]
    fn keywords_win_over_identifiers() {
        assert_eq!(
            kinds("import os"),
            vec![
                Tok::Token(Token::Import),
                Tok::Token(Token::Ident("os".to_string())),
                Tok::Newline,
                Tok::Eof,
            ]
        );
        assert_eq!(
            kinds("imports"),
            vec![
                Tok::Token(Token::Ident("imports".to_string())),
                Tok::Newline,
                Tok::Eof,
            ]
        );
    }

    #[test]
    fn indentation_produces_layout_tokens() {
        let toks = kinds("if x:\n    y = 1\nz = 2\n");
        assert!(toks.contains(&Tok::Indent));
        let indent = toks.iter().position(|t| *t == Tok::Indent).unwrap();
        let dedent = toks.iter().position(|t| *t == Tok::Dedent).unwrap();
        assert!(indent < dedent);
    }

    #[test]
    fn brackets_join_lines() {
        let spanned = tokenize("x = [1,\n     2]\ny = 3\n").expect("tokenize");
        let newlines: Vec<usize> = spanned
            .iter()
            .filter(|s| s.tok == Tok::Newline)
            .map(|s| s.line)
            .collect();
        assert_eq!(newlines, vec![2, 3]);
    }

    #[test]
    fn comments_and_blank_lines_are_skipped() {
        let spanned = tokenize("# header\n\n   \nx = 1  # trailing\n").expect("tokenize");
        assert_eq!(spanned[0].line, 4);
        assert_eq!(spanned.len(), 5);
    }

    #[test]
    fn string_escapes_are_decoded() {
        let toks = kinds(r#"s = 'a\n\'b\'' + "c\\d\q""#);
        assert!(toks.contains(&Tok::Token(Token::Str("a\n'b'".to_string()))));
        assert!(toks.contains(&Tok::Token(Token::Str("c\\d\\q".to_string()))));
    }

    #[test]
    fn numbers_lex_as_int_or_float() {
        let toks = kinds("a = 10 + 2.5 + 1e3 + .5");
        assert!(toks.contains(&Tok::Token(Token::Int(10))));
        assert!(toks.contains(&Tok::Token(Token::Float(2.5))));
        assert!(toks.contains(&Tok::Token(Token::Float(1000.0))));
        assert!(toks.contains(&Tok::Token(Token::Float(0.5))));
    }

    #[test]
    fn bad_dedent_is_an_error() {
        let err = tokenize("if x:\n    a = 1\n  b = 2\n").unwrap_err();
        assert_eq!(err.line, 3);
    }

    #[test]
    fn unknown_character_is_an_error_with_line() {
        let err = tokenize("a = 1\nb = $\n").unwrap_err();
        assert_eq!(err.line, 2);
        assert!(err.message.contains('$'));
    }

    #[test]
    fn scan_skips_unlexable_input() {
        let tokens = scan("a = $\nimport os\n");
        assert!(tokens.contains(&(2, Token::Import)));
        assert!(tokens.contains(&(1, Token::Ident("a".to_string()))));
    }

    #[test]
    fn tab_indentation_rounds_to_eight() {
        assert_eq!(measure_indent("\tx"), (8, 1));
        assert_eq!(measure_indent("   \tx"), (8, 4));
        assert_eq!(measure_indent("        x"), (8, 8));
    }
}
