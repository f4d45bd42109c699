//! Lexical analysis.
//!
//! The tokenizer consumes the source one logical line at a time.
//! Each line is first cleaned of comments and redundant whitespace
//! (block comment state carries across lines), then segmented into
//! classified tokens. Two token slots are kept: the current token,
//! inspected through [`Tokenizer::token`], and one token of
//! lookahead which answers [`Tokenizer::has_more`]. [`Tokenizer::advance`]
//! promotes the lookahead into the current slot and refills it.
use std::{collections::VecDeque, io::BufRead};

use itertools::Itertools;
use smol_str::SmolStr;

use crate::{
    error::{CompileError, JackResult},
    tokens::{is_symbol, Keyword, Token, TokenKind},
};

/// Largest value a Jack integer constant may take (non-negative
/// 15-bit range).
pub const INT_MAX: u16 = 32767;

pub struct Tokenizer<R> {
    input: R,
    /// Token returned by the accessors.
    current: Option<Token>,
    /// One token of lookahead; answers `has_more`.
    lookahead: Option<Token>,
    /// Tokens scanned from the current line, not yet promoted.
    pending: VecDeque<Token>,
    /// 1-based number of the most recently read line.
    line_no: usize,
    /// While inside `/* ... */`, the line the comment opened on.
    block_comment_start: Option<usize>,
    /// Set once the reader returns no more bytes.
    exhausted: bool,
}

impl<R: BufRead> Tokenizer<R> {
    /// Creates a tokenizer and primes the lookahead slot from the
    /// stream, so `has_more` can answer before the first `advance`.
    pub fn new(input: R) -> JackResult<Self> {
        let mut tokenizer = Self {
            input,
            current: None,
            lookahead: None,
            pending: VecDeque::new(),
            line_no: 0,
            block_comment_start: None,
            exhausted: false,
        };
        tokenizer.lookahead = tokenizer.next_token()?;
        Ok(tokenizer)
    }

    /// Indicates whether another token exists in the stream.
    #[inline]
    pub fn has_more(&self) -> bool {
        self.lookahead.is_some()
    }

    /// Promotes the lookahead token into the current slot and
    /// refills the lookahead.
    ///
    /// # Errors
    ///
    /// Fails when the stream is exhausted, or when refilling the
    /// lookahead hits a lexical error.
    pub fn advance(&mut self) -> JackResult<()> {
        let token = self
            .lookahead
            .take()
            .ok_or_else(|| CompileError::new(self.line_no.max(1), "unexpected end of input"))?;
        self.current = Some(token);
        self.lookahead = self.next_token()?;
        Ok(())
    }

    /// The current token.
    ///
    /// Only valid after a successful [`advance`](Self::advance).
    #[inline]
    pub fn token(&self) -> &Token {
        self.current
            .as_ref()
            .expect("advance() must succeed before the current token is read")
    }

    /// 1-based line of the current token, or of the read cursor
    /// when no token has been promoted yet.
    pub fn current_line(&self) -> usize {
        self.current
            .as_ref()
            .map(|token| token.line)
            .unwrap_or_else(|| self.line_no.max(1))
    }

    /// Produce the next token, reading further source lines as
    /// needed. Returns `None` at end of input.
    fn next_token(&mut self) -> JackResult<Option<Token>> {
        while self.pending.is_empty() && !self.exhausted {
            self.read_line()?;
        }

        if self.pending.is_empty() {
            if let Some(line) = self.block_comment_start {
                return Err(CompileError::new(line, "unterminated block comment").into());
            }
            return Ok(None);
        }

        Ok(self.pending.pop_front())
    }

    /// Read one source line, clean it and scan it into `pending`.
    fn read_line(&mut self) -> JackResult<()> {
        let mut raw = String::new();
        if self.input.read_line(&mut raw)? == 0 {
            self.exhausted = true;
            return Ok(());
        }
        self.line_no += 1;

        let line = raw.trim_end_matches(|c| c == '\n' || c == '\r');
        let cleaned = self.strip_comments(line)?;
        if !cleaned.is_empty() {
            self.scan(&cleaned)?;
        }
        Ok(())
    }

    /// Remove comments from a line and collapse whitespace runs to
    /// a single space, leaving string literal interiors verbatim.
    /// Tracks block comment state across calls.
    fn strip_comments(&mut self, line: &str) -> JackResult<String> {
        let mut out = String::with_capacity(line.len());
        let mut chars = line.chars().peekable();
        let mut in_string = false;

        while let Some(c) = chars.next() {
            if self.block_comment_start.is_some() {
                if c == '*' && chars.peek() == Some(&'/') {
                    chars.next();
                    self.block_comment_start = None;
                }
                continue;
            }

            if in_string {
                out.push(c);
                if c == '"' {
                    in_string = false;
                }
                continue;
            }

            match c {
                '"' => {
                    in_string = true;
                    out.push(c);
                }
                '/' => match chars.peek() {
                    // Line comment runs to the end of the line.
                    Some(&'/') => break,
                    Some(&'*') => {
                        chars.next();
                        self.block_comment_start = Some(self.line_no);
                    }
                    _ => out.push(c),
                },
                ' ' | '\t' | '\r' => {
                    if !out.ends_with(' ') {
                        out.push(' ');
                    }
                }
                _ => out.push(c),
            }
        }

        if in_string {
            return Err(CompileError::new(
                self.line_no,
                "malformed string literal, missing closing '\"'",
            )
            .into());
        }

        Ok(out)
    }

    /// Segment a cleaned line into tokens. Symbols and whitespace
    /// delimit lexemes; string literals run to their closing quote.
    fn scan(&mut self, line: &str) -> JackResult<()> {
        let mut chars = line.chars().peekable();

        while let Some(c) = chars.next() {
            let kind = match c {
                ' ' => continue,
                '"' => {
                    let text: String = chars.by_ref().take_while(|&c| c != '"').collect();
                    TokenKind::StringConst(text)
                }
                c if is_symbol(c) => TokenKind::Symbol(c),
                c => {
                    let mut word = String::new();
                    word.push(c);
                    word.extend(
                        chars.peeking_take_while(|&c| c != ' ' && c != '"' && !is_symbol(c)),
                    );
                    self.classify(&word)?
                }
            };

            self.pending.push_back(Token {
                kind,
                line: self.line_no,
            });
        }

        Ok(())
    }

    /// Classify a lexeme delimited by symbols and whitespace.
    fn classify(&self, word: &str) -> JackResult<TokenKind> {
        if let Some(keyword) = Keyword::parse(word) {
            return Ok(TokenKind::Keyword(keyword));
        }

        if word.bytes().all(|b| b.is_ascii_digit()) {
            return match word.parse::<u32>() {
                Ok(value) if value <= u32::from(INT_MAX) => Ok(TokenKind::IntConst(value as u16)),
                _ => Err(CompileError::new(
                    self.line_no,
                    format!("integer constant '{word}' exceeds the maximum value {INT_MAX}"),
                )
                .into()),
            };
        }

        if is_identifier(word) {
            return Ok(TokenKind::Identifier(SmolStr::new(word)));
        }

        Err(CompileError::new(self.line_no, format!("unrecognized token '{word}'")).into())
    }
}

fn is_identifier(word: &str) -> bool {
    let mut chars = word.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
