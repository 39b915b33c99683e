// Lexer for Mamba source text.
//
// Produces a flat token stream with source positions attached to every token,
// respecting the configurable resource limits in `limits.rs`.

use crate::limits::CompilerLimits;
use crate::source::SourceLocation;
use std::iter::Peekable;
use std::str::CharIndices;

/// The kind of a lexical token. Literal payloads are not carried inline;
/// callers recover the literal text via `Token::text` and parse it at the
/// point of use, mirroring how punctuation tokens carry no payload either.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Integer,
    Float,
    Str,
    Boolean,
    Identifier,
    /// Any of the infix/prefix/postfix operator spellings (`+`, `-`, `*`, `/`,
    /// `%`, `**`, `==`, `!=`, `<`, `<=`, `>`, `>=`, `&&`, `||`, `^`, `.`, `!`).
    /// The exact spelling is recovered from the source text.
    Operator,
    Bind,     // '='
    Or,       // '|' (union type separator)
    Comma,    // ','
    Colon,    // ':'
    Semicolon,
    Arrow,     // '->'
    BoldArrow, // '=>'
    Dollar,    // '$' (the implicit argument reference)
    Underscore,
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Let,
    Func,
    Type,
    If,
    Then,
    Else,
    Match,
    When,
    In,
    Newline,
    Eof,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub start: usize,
    pub end: usize,
    pub line: usize,
    pub column: usize,
}

impl Token {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn text<'s>(&self, source: &'s str) -> &'s str {
        &source[self.start..self.end]
    }

    pub fn location(&self) -> SourceLocation {
        SourceLocation::new(self.line, self.column, self.start)
    }
}

#[derive(Debug, Clone)]
pub struct LexError {
    pub message: String,
    pub line: usize,
    pub column: usize,
    pub pos: usize,
}

impl LexError {
    fn new(message: impl Into<String>, line: usize, column: usize, pos: usize) -> Self {
        Self {
            message: message.into(),
            line,
            column,
            pos,
        }
    }
}

impl std::fmt::Display for LexError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "Lex error at {}:{}: {}",
            self.line, self.column, self.message
        )
    }
}

impl std::error::Error for LexError {}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_ident_continue(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Longest-match-first table of multi-character operator spellings.
/// Single-character operators (`+ - * / % < > ^ . !`) are recognized as a
/// fallback once none of these match.
const MULTI_CHAR_OPERATORS: &[&str] = &["**", "==", "!=", "<=", ">=", "&&", "||"];

const SINGLE_CHAR_OPERATORS: &[char] = &['+', '-', '*', '/', '%', '<', '>', '^', '.', '!'];

pub struct Lexer<'src> {
    source: &'src str,
    chars: Peekable<CharIndices<'src>>,
    pos: usize,
    line: usize,
    column: usize,
    limits: &'src CompilerLimits,
    token_count: usize,
}

impl<'src> Lexer<'src> {
    pub fn new(source: &'src str, limits: &'src CompilerLimits) -> Result<Self, LexError> {
        if source.len() > limits.max_input_size {
            return Err(LexError::new(
                format!(
                    "input too large: {} bytes (max {})",
                    source.len(),
                    limits.max_input_size
                ),
                1,
                1,
                0,
            ));
        }
        Ok(Self {
            source,
            chars: source.char_indices().peekable(),
            pos: 0,
            line: 1,
            column: 1,
            limits,
            token_count: 0,
        })
    }

    fn peek_char(&mut self) -> Option<char> {
        self.chars.peek().map(|&(_, c)| c)
    }

    fn peek_char2(&self) -> Option<char> {
        let mut iter = self.chars.clone();
        iter.next();
        iter.next().map(|(_, c)| c)
    }

    fn consume_char(&mut self) -> Option<char> {
        let (idx, c) = self.chars.next()?;
        self.pos = idx + c.len_utf8();
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn error(&self, message: impl Into<String>) -> LexError {
        LexError::new(message, self.line, self.column, self.pos)
    }

    fn skip_whitespace_and_comments(&mut self) -> Result<(), LexError> {
        loop {
            match self.peek_char() {
                Some(' ') | Some('\t') | Some('\r') => {
                    self.consume_char();
                }
                Some('/') if self.peek_char2() == Some('/') => {
                    let start_line = self.line;
                    let start_col = self.column;
                    let mut len = 0usize;
                    self.consume_char();
                    self.consume_char();
                    while let Some(c) = self.peek_char() {
                        if c == '\n' {
                            break;
                        }
                        len += c.len_utf8();
                        if len > self.limits.max_comment_length {
                            return Err(LexError::new(
                                format!(
                                    "comment exceeds max length of {} bytes",
                                    self.limits.max_comment_length
                                ),
                                start_line,
                                start_col,
                                self.pos,
                            ));
                        }
                        self.consume_char();
                    }
                }
                _ => break,
            }
        }
        Ok(())
    }

    fn make_token(&self, kind: TokenKind, start: usize, line: usize, column: usize) -> Token {
        Token {
            kind,
            start,
            end: self.pos,
            line,
            column,
        }
    }

    fn lex_ident_or_keyword(&mut self) -> Result<Token, LexError> {
        let start = self.pos;
        let line = self.line;
        let column = self.column;
        while let Some(c) = self.peek_char() {
            if !is_ident_continue(c) {
                break;
            }
            self.consume_char();
        }
        let len = self.pos - start;
        if len > self.limits.max_identifier_length {
            return Err(LexError::new(
                format!(
                    "identifier exceeds max length of {} bytes",
                    self.limits.max_identifier_length
                ),
                line,
                column,
                start,
            ));
        }
        let text = &self.source[start..self.pos];
        let kind = match text {
            "let" => TokenKind::Let,
            "func" => TokenKind::Func,
            "type" => TokenKind::Type,
            "if" => TokenKind::If,
            "then" => TokenKind::Then,
            "else" => TokenKind::Else,
            "match" => TokenKind::Match,
            "when" => TokenKind::When,
            "in" => TokenKind::In,
            "true" | "false" => TokenKind::Boolean,
            _ => TokenKind::Identifier,
        };
        Ok(self.make_token(kind, start, line, column))
    }

    fn lex_number(&mut self) -> Result<Token, LexError> {
        let start = self.pos;
        let line = self.line;
        let column = self.column;
        let mut is_float = false;
        while let Some(c) = self.peek_char() {
            if c.is_ascii_digit() {
                self.consume_char();
            } else {
                break;
            }
        }
        if self.peek_char() == Some('.') && self.peek_char2().is_some_and(|c| c.is_ascii_digit()) {
            is_float = true;
            self.consume_char();
            while let Some(c) = self.peek_char() {
                if c.is_ascii_digit() {
                    self.consume_char();
                } else {
                    break;
                }
            }
        }
        let kind = if is_float {
            TokenKind::Float
        } else {
            TokenKind::Integer
        };
        Ok(self.make_token(kind, start, line, column))
    }

    fn lex_string(&mut self) -> Result<Token, LexError> {
        let start = self.pos;
        let line = self.line;
        let column = self.column;
        self.consume_char(); // opening quote
        let mut len = 0usize;
        loop {
            match self.peek_char() {
                None | Some('\n') => {
                    return Err(LexError::new(
                        "unterminated string literal",
                        line,
                        column,
                        start,
                    ));
                }
                Some('"') => {
                    self.consume_char();
                    break;
                }
                Some('\\') => {
                    self.consume_char();
                    if self.peek_char().is_none() {
                        return Err(LexError::new(
                            "unterminated string literal",
                            line,
                            column,
                            start,
                        ));
                    }
                    self.consume_char();
                    len += 2;
                }
                Some(c) => {
                    self.consume_char();
                    len += c.len_utf8();
                }
            }
            if len > self.limits.max_string_length {
                return Err(LexError::new(
                    format!(
                        "string literal exceeds max length of {} bytes",
                        self.limits.max_string_length
                    ),
                    line,
                    column,
                    start,
                ));
            }
        }
        Ok(self.make_token(TokenKind::Str, start, line, column))
    }

    fn lex_operator(&mut self) -> Result<Token, LexError> {
        let start = self.pos;
        let line = self.line;
        let column = self.column;
        let c0 = self.peek_char().unwrap();
        let c1 = self.peek_char2();
        if let Some(c1) = c1 {
            let two: String = [c0, c1].iter().collect();
            if MULTI_CHAR_OPERATORS.contains(&two.as_str()) {
                self.consume_char();
                self.consume_char();
                return Ok(self.make_token(TokenKind::Operator, start, line, column));
            }
        }
        if SINGLE_CHAR_OPERATORS.contains(&c0) {
            self.consume_char();
            return Ok(self.make_token(TokenKind::Operator, start, line, column));
        }
        Err(self.error(format!("unexpected character '{}'", c0)))
    }

    pub fn next_token(&mut self) -> Result<Token, LexError> {
        self.skip_whitespace_and_comments()?;
        self.token_count += 1;
        if self.token_count > self.limits.max_token_count {
            return Err(self.error(format!(
                "token count exceeds max of {}",
                self.limits.max_token_count
            )));
        }

        let start = self.pos;
        let line = self.line;
        let column = self.column;

        let Some(c) = self.peek_char() else {
            return Ok(self.make_token(TokenKind::Eof, start, line, column));
        };

        if c == '\n' {
            self.consume_char();
            return Ok(self.make_token(TokenKind::Newline, start, line, column));
        }
        if is_ident_start(c) {
            return self.lex_ident_or_keyword();
        }
        if c.is_ascii_digit() {
            return self.lex_number();
        }
        if c == '"' {
            return self.lex_string();
        }
        if c == '_' && !self.peek_char2().is_some_and(is_ident_continue) {
            self.consume_char();
            return Ok(self.make_token(TokenKind::Underscore, start, line, column));
        }
        if c == '$' {
            self.consume_char();
            return Ok(self.make_token(TokenKind::Dollar, start, line, column));
        }
        if c == '=' {
            self.consume_char();
            if self.peek_char() == Some('>') {
                self.consume_char();
                return Ok(self.make_token(TokenKind::BoldArrow, start, line, column));
            }
            return Ok(self.make_token(TokenKind::Bind, start, line, column));
        }
        if c == '-' && self.peek_char2() == Some('>') {
            self.consume_char();
            self.consume_char();
            return Ok(self.make_token(TokenKind::Arrow, start, line, column));
        }
        if c == '|' {
            self.consume_char();
            return Ok(self.make_token(TokenKind::Or, start, line, column));
        }
        if c == ',' {
            self.consume_char();
            return Ok(self.make_token(TokenKind::Comma, start, line, column));
        }
        if c == ':' {
            self.consume_char();
            return Ok(self.make_token(TokenKind::Colon, start, line, column));
        }
        if c == ';' {
            self.consume_char();
            return Ok(self.make_token(TokenKind::Semicolon, start, line, column));
        }
        if c == '(' {
            self.consume_char();
            return Ok(self.make_token(TokenKind::LParen, start, line, column));
        }
        if c == ')' {
            self.consume_char();
            return Ok(self.make_token(TokenKind::RParen, start, line, column));
        }
        if c == '{' {
            self.consume_char();
            return Ok(self.make_token(TokenKind::LBrace, start, line, column));
        }
        if c == '}' {
            self.consume_char();
            return Ok(self.make_token(TokenKind::RBrace, start, line, column));
        }
        if c == '[' {
            self.consume_char();
            return Ok(self.make_token(TokenKind::LBracket, start, line, column));
        }
        if c == ']' {
            self.consume_char();
            return Ok(self.make_token(TokenKind::RBracket, start, line, column));
        }
        if SINGLE_CHAR_OPERATORS.contains(&c) {
            return self.lex_operator();
        }

        Err(self.error(format!("unexpected character '{}'", c)))
    }
}

/// Lex the entire source into a token stream, ending with an `Eof` token.
pub fn lex(source: &str, limits: &CompilerLimits) -> Result<Vec<Token>, LexError> {
    let mut lexer = Lexer::new(source, limits)?;
    let mut tokens = Vec::new();
    loop {
        let token = lexer.next_token()?;
        let is_eof = token.kind == TokenKind::Eof;
        tokens.push(token);
        if is_eof {
            break;
        }
    }
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toks(src: &str) -> Vec<TokenKind> {
        let limits = CompilerLimits::default();
        lex(src, &limits)
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn lexes_keywords() {
        assert_eq!(
            toks("func type if then else match when in let"),
            vec![
                TokenKind::Func,
                TokenKind::Type,
                TokenKind::If,
                TokenKind::Then,
                TokenKind::Else,
                TokenKind::Match,
                TokenKind::When,
                TokenKind::In,
                TokenKind::Let,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn lexes_identifiers() {
        assert_eq!(
            toks("identity x1 _underscore"),
            vec![
                TokenKind::Identifier,
                TokenKind::Identifier,
                TokenKind::Identifier,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn lexes_bare_underscore_distinct_from_identifier() {
        assert_eq!(toks("_"), vec![TokenKind::Underscore, TokenKind::Eof]);
    }

    #[test]
    fn lexes_numbers() {
        let limits = CompilerLimits::default();
        let tokens = lex("42 3.14", &limits).unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Integer);
        assert_eq!(tokens[0].text("42 3.14"), "42");
        assert_eq!(tokens[1].kind, TokenKind::Float);
        assert_eq!(tokens[1].text("42 3.14"), "3.14");
    }

    #[test]
    fn lexes_booleans() {
        assert_eq!(
            toks("true false"),
            vec![TokenKind::Boolean, TokenKind::Boolean, TokenKind::Eof]
        );
    }

    #[test]
    fn lexes_strings_with_escapes() {
        let limits = CompilerLimits::default();
        let src = r#""hi \"there\"""#;
        let tokens = lex(src, &limits).unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Str);
    }

    #[test]
    fn unterminated_string_errors() {
        let limits = CompilerLimits::default();
        assert!(lex("\"no closing quote", &limits).is_err());
    }

    #[test]
    fn lexes_operators_longest_match_first() {
        assert_eq!(
            toks("a ** b == c != d <= e >= f && g || h ^ i . j ! + - * / %"),
            vec![
                TokenKind::Identifier,
                TokenKind::Operator, // **
                TokenKind::Identifier,
                TokenKind::Operator, // ==
                TokenKind::Identifier,
                TokenKind::Operator, // !=
                TokenKind::Identifier,
                TokenKind::Operator, // <=
                TokenKind::Identifier,
                TokenKind::Operator, // >=
                TokenKind::Identifier,
                TokenKind::Operator, // &&
                TokenKind::Identifier,
                TokenKind::Operator, // ||
                TokenKind::Identifier,
                TokenKind::Operator, // ^
                TokenKind::Identifier,
                TokenKind::Operator, // .
                TokenKind::Identifier,
                TokenKind::Operator, // !
                TokenKind::Identifier,
                TokenKind::Operator, // +
                TokenKind::Identifier,
                TokenKind::Operator, // -
                TokenKind::Identifier,
                TokenKind::Operator, // *
                TokenKind::Identifier,
                TokenKind::Operator, // /
                TokenKind::Identifier,
                TokenKind::Operator, // %
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn lexes_arrows_and_bind() {
        assert_eq!(
            toks("-> => = |"),
            vec![
                TokenKind::Arrow,
                TokenKind::BoldArrow,
                TokenKind::Bind,
                TokenKind::Or,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn lexes_brackets_and_punctuation() {
        assert_eq!(
            toks("( ) { } [ ] , : ; $"),
            vec![
                TokenKind::LParen,
                TokenKind::RParen,
                TokenKind::LBrace,
                TokenKind::RBrace,
                TokenKind::LBracket,
                TokenKind::RBracket,
                TokenKind::Comma,
                TokenKind::Colon,
                TokenKind::Semicolon,
                TokenKind::Dollar,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn skips_line_comments() {
        assert_eq!(
            toks("x // a comment\ny"),
            vec![
                TokenKind::Identifier,
                TokenKind::Newline,
                TokenKind::Identifier,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn rejects_unknown_character() {
        let limits = CompilerLimits::default();
        assert!(lex("@", &limits).is_err());
    }

    #[test]
    fn identifier_length_limit_enforced() {
        let mut limits = CompilerLimits::default();
        limits.max_identifier_length = 3;
        let long_ident = "abcdefgh";
        assert!(lex(long_ident, &limits).is_err());
    }

    #[test]
    fn input_size_limit_enforced() {
        let mut limits = CompilerLimits::default();
        limits.max_input_size = 2;
        assert!(lex("abc", &limits).is_err());
    }

    mod integration_tests {
        use super::*;

        #[test]
        fn complete_function_declaration() {
            let src = "func identity[ T ] { x: T } -> { y: T } = { y = $.x }";
            let limits = CompilerLimits::default();
            let tokens = lex(src, &limits).unwrap();
            assert_eq!(tokens.last().unwrap().kind, TokenKind::Eof);
            assert!(tokens.iter().any(|t| t.kind == TokenKind::Func));
            assert!(tokens.iter().any(|t| t.kind == TokenKind::Dollar));
            assert!(tokens.iter().any(|t| t.kind == TokenKind::Arrow));
        }

        #[test]
        fn position_tracking_across_lines() {
            let src = "x\ny";
            let limits = CompilerLimits::default();
            let tokens = lex(src, &limits).unwrap();
            // x
            assert_eq!(tokens[0].line, 1);
            assert_eq!(tokens[0].column, 1);
            // newline
            assert_eq!(tokens[1].line, 1);
            // y, after the newline increments line and resets column
            assert_eq!(tokens[2].line, 2);
            assert_eq!(tokens[2].column, 1);
        }

        #[test]
        fn empty_source_yields_only_eof() {
            let limits = CompilerLimits::default();
            let tokens = lex("", &limits).unwrap();
            assert_eq!(tokens.len(), 1);
            assert_eq!(tokens[0].kind, TokenKind::Eof);
        }
    }
}
