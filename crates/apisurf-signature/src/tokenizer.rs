//! Tokenizer for signature file bodies.
//!
//! Types are single tokens: generic argument lists, array brackets, varargs
//! and nullness suffixes stay attached to the name they follow. Annotation
//! occurrences keep their argument list. Values after `=` and `default` are
//! read raw with [`Tokenizer::raw_until`].

use crate::error::SignatureError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum TokenKind {
    /// Keyword, name, or type.
    Word,
    /// `@name` with its optional argument list.
    Annotation,
    /// A `<...>` type parameter list.
    TypeParameters,
    Punct(char),
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct Token<'a> {
    pub kind: TokenKind,
    pub text: &'a str,
    pub line: usize,
    pub column: usize,
    offset: usize,
}

impl Token<'_> {
    pub fn is_punct(&self, c: char) -> bool {
        self.kind == TokenKind::Punct(c)
    }

    pub fn is_word(&self, word: &str) -> bool {
        self.kind == TokenKind::Word && self.text == word
    }
}

const PUNCT: &[char] = &['{', '}', '(', ')', ',', ';', '=', ':'];

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$' || c == '.'
}

pub(crate) struct Tokenizer<'a> {
    file: &'a str,
    src: &'a str,
    pos: usize,
    line: usize,
    column: usize,
    peeked: Option<Token<'a>>,
}

impl<'a> Tokenizer<'a> {
    /// Tokenize `src`, whose first character sits on `first_line`.
    pub fn new(file: &'a str, src: &'a str, first_line: usize) -> Self {
        Self {
            file,
            src,
            pos: 0,
            line: first_line,
            column: 1,
            peeked: None,
        }
    }

    pub fn error(&self, line: usize, column: usize, message: impl Into<String>) -> SignatureError {
        SignatureError::Syntax {
            file: self.file.to_string(),
            line,
            column,
            message: message.into(),
        }
    }

    pub fn error_at(&self, token: &Token<'_>, message: impl Into<String>) -> SignatureError {
        self.error(token.line, token.column, message)
    }

    /// Error at the current position, used for unexpected end of input.
    pub fn error_here(&self, message: impl Into<String>) -> SignatureError {
        match &self.peeked {
            Some(t) => self.error_at(t, message),
            None => self.error(self.line, self.column, message),
        }
    }

    pub fn peek(&mut self) -> Result<Option<Token<'a>>, SignatureError> {
        if self.peeked.is_none() {
            self.peeked = self.scan()?;
        }
        Ok(self.peeked)
    }

    pub fn next_token(&mut self) -> Result<Option<Token<'a>>, SignatureError> {
        match self.peeked.take() {
            Some(t) => Ok(Some(t)),
            None => self.scan(),
        }
    }

    /// The next token, failing at end of input.
    pub fn require(&mut self, what: &str) -> Result<Token<'a>, SignatureError> {
        match self.next_token()? {
            Some(t) => Ok(t),
            None => Err(self.error_here(format!("expected {what}, found end of file"))),
        }
    }

    pub fn expect_punct(&mut self, c: char) -> Result<Token<'a>, SignatureError> {
        let t = self.require(&format!("'{c}'"))?;
        if t.is_punct(c) {
            Ok(t)
        } else {
            Err(self.error_at(&t, format!("expected '{c}', found {:?}", t.text)))
        }
    }

    pub fn expect_word(&mut self, what: &str) -> Result<Token<'a>, SignatureError> {
        let t = self.require(what)?;
        if t.kind == TokenKind::Word {
            Ok(t)
        } else {
            Err(self.error_at(&t, format!("expected {what}, found {:?}", t.text)))
        }
    }

    /// Consume the next token when it is the punctuation `c`.
    pub fn eat_punct(&mut self, c: char) -> Result<bool, SignatureError> {
        if self.peek()?.is_some_and(|t| t.is_punct(c)) {
            self.peeked = None;
            return Ok(true);
        }
        Ok(false)
    }

    /// Consume the next token when it is the word `word`.
    pub fn eat_word(&mut self, word: &str) -> Result<bool, SignatureError> {
        if self.peek()?.is_some_and(|t| t.is_word(word)) {
            self.peeked = None;
            return Ok(true);
        }
        Ok(false)
    }

    /// Read raw text up to (not including) the first of `stops` outside
    /// quotes and brackets. Returns the trimmed text and where it starts.
    pub fn raw_until(&mut self, stops: &[char]) -> Result<(&'a str, usize, usize), SignatureError> {
        if let Some(t) = self.peeked.take() {
            self.pos = t.offset;
            self.line = t.line;
            self.column = t.column;
        }
        self.skip_trivia();
        let (start, line, column) = (self.pos, self.line, self.column);
        let mut depth = 0i32;
        while let Some(c) = self.current() {
            match c {
                '"' | '\'' => {
                    self.skip_quoted(c)?;
                    continue;
                }
                '(' | '{' | '[' => depth += 1,
                ')' | '}' | ']' if depth > 0 => depth -= 1,
                _ if depth == 0 && stops.contains(&c) => break,
                '\n' => return Err(self.error(line, column, "unterminated value")),
                _ => {}
            }
            self.bump();
        }
        if self.current().is_none() {
            return Err(self.error(line, column, "unterminated value"));
        }
        let text = self.src[start..self.pos].trim();
        if text.is_empty() {
            return Err(self.error(line, column, "missing value"));
        }
        Ok((text, line, column))
    }

    fn current(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn lookahead(&self, n: usize) -> Option<char> {
        self.src[self.pos..].chars().nth(n)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.current()?;
        self.pos += c.len_utf8();
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn skip_trivia(&mut self) {
        loop {
            match self.current() {
                Some(c) if c.is_whitespace() => {
                    self.bump();
                }
                Some('/') if self.lookahead(1) == Some('/') => {
                    while self.current().is_some_and(|c| c != '\n') {
                        self.bump();
                    }
                }
                Some('/') if self.lookahead(1) == Some('*') => {
                    self.bump();
                    self.bump();
                    while self.current().is_some()
                        && !(self.current() == Some('*') && self.lookahead(1) == Some('/'))
                    {
                        self.bump();
                    }
                    self.bump();
                    self.bump();
                }
                _ => return,
            }
        }
    }

    fn skip_quoted(&mut self, quote: char) -> Result<(), SignatureError> {
        let (line, column) = (self.line, self.column);
        self.bump();
        loop {
            match self.bump() {
                Some('\\') => {
                    self.bump();
                }
                Some(c) if c == quote => return Ok(()),
                Some('\n') | None => return Err(self.error(line, column, "unterminated literal")),
                Some(_) => {}
            }
        }
    }

    /// Skip a bracketed run starting at `open`, honoring nesting and quotes.
    fn skip_balanced(&mut self, open: char, close: char) -> Result<(), SignatureError> {
        let (line, column) = (self.line, self.column);
        let mut depth = 0usize;
        while let Some(c) = self.current() {
            match c {
                '"' | '\'' => {
                    self.skip_quoted(c)?;
                    continue;
                }
                c if c == open => depth += 1,
                c if c == close => {
                    depth -= 1;
                    if depth == 0 {
                        self.bump();
                        return Ok(());
                    }
                }
                _ => {}
            }
            self.bump();
        }
        Err(self.error(line, column, format!("unbalanced '{open}'")))
    }

    fn skip_name(&mut self) {
        while self.current().is_some_and(is_name_char) {
            self.bump();
        }
    }

    fn scan(&mut self) -> Result<Option<Token<'a>>, SignatureError> {
        self.skip_trivia();
        let Some(c) = self.current() else {
            return Ok(None);
        };
        let (start, line, column) = (self.pos, self.line, self.column);
        let kind = match c {
            c if PUNCT.contains(&c) => {
                self.bump();
                TokenKind::Punct(c)
            }
            '@' => {
                self.bump();
                self.skip_name();
                if self.pos == start + 1 {
                    return Err(self.error(line, column, "expected annotation name after '@'"));
                }
                if self.current() == Some('(') {
                    self.skip_balanced('(', ')')?;
                }
                TokenKind::Annotation
            }
            '<' => {
                self.skip_balanced('<', '>')?;
                TokenKind::TypeParameters
            }
            c if is_name_char(c) || c == '-' => {
                self.bump();
                loop {
                    match self.current() {
                        Some(c) if is_name_char(c) || c == '?' || c == '!' => {
                            self.bump();
                        }
                        Some('<') => self.skip_balanced('<', '>')?,
                        Some('[') if self.lookahead(1) == Some(']') => {
                            self.bump();
                            self.bump();
                        }
                        _ => break,
                    }
                }
                TokenKind::Word
            }
            other => return Err(self.error(line, column, format!("unexpected character {other:?}"))),
        };
        Ok(Some(Token {
            kind,
            text: &self.src[start..self.pos],
            line,
            column,
            offset: start,
        }))
    }
}
