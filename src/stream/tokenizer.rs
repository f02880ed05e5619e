//! Field/row state machine over decoded text.
//!
//! Text is fed incrementally with [`Tokenizer::feed`]; [`Tokenizer::next_row`]
//! either produces a row, asks for more input or reports the end of input.
//! Separators are arbitrary strings matched at the cursor. When the buffer
//! ends in the middle of a possible separator the tokenizer waits for more
//! input instead of guessing.

use std::mem;

use crate::{
    error::{CsvError, Position},
    options::{CsvOptions, DEFAULT_ROW_SEP, RowSeparator},
};

/// Upper bound on text buffered while looking for the first line break.
const AUTO_DETECT_LIMIT: usize = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    FieldStart,
    InUnquotedField,
    InQuotedField,
    AfterClosingQuote,
    RowEnd,
}

/// What sits at the cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lookahead {
    RowSep,
    ColSep,
    Quote,
    Char(char),
    NeedInput,
    End,
}

enum Prefix {
    Full,
    Partial,
    No,
}

/// A row as the tokenizer sees it: field boundaries only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRow {
    pub fields: Vec<String>,
    /// Line the row started on.
    pub line: usize,
}

#[derive(Debug, PartialEq, Eq)]
pub enum Token {
    Row(RawRow),
    NeedInput,
    End,
}

#[derive(Debug)]
pub struct Tokenizer {
    col_sep: String,
    row_sep: Option<String>,
    quote: char,
    liberal: bool,
    strip: bool,

    buf: String,
    pos: usize,
    drained: usize,
    eof: bool,

    state: State,
    field: String,
    fields: Vec<String>,
    row_started: bool,
    lines: usize,
    row_line: usize,
}

impl Tokenizer {
    pub fn new(options: &CsvOptions) -> Self {
        let row_sep = match &options.row_sep {
            RowSeparator::Auto => None,
            RowSeparator::Literal(sep) => Some(sep.clone()),
        };
        Self {
            col_sep: options.col_sep.clone(),
            row_sep,
            quote: options.quote_char,
            liberal: options.liberal_parsing,
            strip: options.strip,
            buf: String::new(),
            pos: 0,
            drained: 0,
            eof: false,
            state: State::FieldStart,
            field: String::new(),
            fields: Vec::new(),
            row_started: false,
            lines: 0,
            row_line: 1,
        }
    }

    pub fn feed(&mut self, text: &str) {
        self.buf.push_str(text);
    }

    /// Marks the end of input.
    pub fn finish(&mut self) {
        self.eof = true;
    }

    /// Current 1-based line.
    pub fn line(&self) -> usize {
        self.lines + 1
    }

    /// The row separator in effect, once known.
    pub fn row_sep(&self) -> Option<&str> {
        self.row_sep.as_deref()
    }

    /// Discards buffered text and ends the input.
    pub fn reset(&mut self) {
        self.buf.clear();
        self.pos = 0;
        self.fields.clear();
        self.field.clear();
        self.state = State::FieldStart;
        self.eof = true;
    }

    pub fn next_row(&mut self) -> Result<Token, CsvError> {
        if self.row_sep.is_none() {
            match detect_row_sep(&self.buf[self.pos..], self.eof) {
                Some(sep) => self.row_sep = Some(sep.to_string()),
                None => return Ok(Token::NeedInput),
            }
        }

        loop {
            let lookahead = self.lookahead();
            if lookahead == Lookahead::NeedInput {
                return Ok(Token::NeedInput);
            }

            match (self.state, lookahead) {
                (State::FieldStart, Lookahead::End) => {
                    if self.fields.is_empty() && !self.row_started {
                        return Ok(Token::End);
                    }
                    self.end_field();
                    self.state = State::RowEnd;
                }
                (State::FieldStart, Lookahead::RowSep) => {
                    if !self.fields.is_empty() || self.row_started {
                        self.end_field();
                    }
                    self.advance_row_sep();
                    self.state = State::RowEnd;
                }
                (State::FieldStart, Lookahead::ColSep) => {
                    self.end_field();
                    self.advance_col_sep();
                }
                (State::FieldStart, Lookahead::Quote) => {
                    self.advance(self.quote.len_utf8());
                    self.state = State::InQuotedField;
                }
                (State::FieldStart, Lookahead::Char(c)) => {
                    if self.strip && is_blank(c) {
                        self.advance(c.len_utf8());
                        continue;
                    }
                    self.check_bare_line_break(c)?;
                    self.field.push(c);
                    self.advance(c.len_utf8());
                    self.state = State::InUnquotedField;
                }

                (State::InUnquotedField, Lookahead::End) => {
                    self.end_field();
                    self.state = State::RowEnd;
                }
                (State::InUnquotedField, Lookahead::RowSep) => {
                    self.end_field();
                    self.advance_row_sep();
                    self.state = State::RowEnd;
                }
                (State::InUnquotedField, Lookahead::ColSep) => {
                    self.end_field();
                    self.advance_col_sep();
                    self.state = State::FieldStart;
                }
                (State::InUnquotedField, Lookahead::Quote) => {
                    if !self.liberal {
                        return Err(self.malformed("Illegal quoting"));
                    }
                    self.field.push(self.quote);
                    self.advance(self.quote.len_utf8());
                }
                (State::InUnquotedField, Lookahead::Char(c)) => {
                    self.check_bare_line_break(c)?;
                    self.field.push(c);
                    self.advance(c.len_utf8());
                }

                (State::InQuotedField, Lookahead::End) => {
                    return Err(CsvError::malformed(
                        "Unclosed quoted field",
                        Position {
                            line: self.row_line,
                            offset: self.offset(),
                        },
                    ));
                }
                (State::InQuotedField, Lookahead::RowSep) => {
                    let sep = self.row_sep.clone().unwrap_or_default();
                    self.field.push_str(&sep);
                    self.advance_row_sep();
                }
                (State::InQuotedField, Lookahead::ColSep) => {
                    self.field.push_str(&self.col_sep);
                    self.advance_col_sep();
                }
                (State::InQuotedField, Lookahead::Quote) => {
                    let after = self.pos + self.quote.len_utf8();
                    match self.buf[after..].chars().next() {
                        Some(c) if c == self.quote => {
                            self.field.push(self.quote);
                            self.advance(2 * self.quote.len_utf8());
                        }
                        None if !self.eof => return Ok(Token::NeedInput),
                        _ => {
                            self.advance(self.quote.len_utf8());
                            self.state = State::AfterClosingQuote;
                        }
                    }
                }
                (State::InQuotedField, Lookahead::Char(c)) => {
                    self.field.push(c);
                    self.advance(c.len_utf8());
                }

                (State::AfterClosingQuote, Lookahead::End) => {
                    self.end_field();
                    self.state = State::RowEnd;
                }
                (State::AfterClosingQuote, Lookahead::RowSep) => {
                    self.end_field();
                    self.advance_row_sep();
                    self.state = State::RowEnd;
                }
                (State::AfterClosingQuote, Lookahead::ColSep) => {
                    self.end_field();
                    self.advance_col_sep();
                    self.state = State::FieldStart;
                }
                (State::AfterClosingQuote, Lookahead::Char(c)) if self.strip && is_blank(c) => {
                    self.advance(c.len_utf8());
                }
                (State::AfterClosingQuote, Lookahead::Quote | Lookahead::Char(_)) => {
                    if !self.liberal {
                        return Err(self.malformed("Any value after quoted field isn't allowed"));
                    }
                    let q = self.quote;
                    let doubled: String = [q, q].iter().collect();
                    let raw = format!("{q}{}{q}", self.field.replace(q, &doubled));
                    self.field = raw;
                    self.state = State::InUnquotedField;
                }

                (State::RowEnd, _) => {
                    let row = RawRow {
                        fields: mem::take(&mut self.fields),
                        line: self.row_line,
                    };
                    self.row_started = false;
                    self.row_line = self.line();
                    self.state = State::FieldStart;
                    self.compact();
                    return Ok(Token::Row(row));
                }

                (_, Lookahead::NeedInput) => return Ok(Token::NeedInput),
            }
        }
    }

    fn lookahead(&self) -> Lookahead {
        if self.state == State::RowEnd {
            return Lookahead::End;
        }
        let rest = &self.buf[self.pos..];
        if rest.is_empty() {
            return if self.eof {
                Lookahead::End
            } else {
                Lookahead::NeedInput
            };
        }
        let row_sep = self.row_sep.as_deref().unwrap_or(DEFAULT_ROW_SEP);
        match prefix(rest, row_sep, self.eof) {
            Prefix::Full => return Lookahead::RowSep,
            Prefix::Partial => return Lookahead::NeedInput,
            Prefix::No => {}
        }
        match prefix(rest, &self.col_sep, self.eof) {
            Prefix::Full => return Lookahead::ColSep,
            Prefix::Partial => return Lookahead::NeedInput,
            Prefix::No => {}
        }
        match rest.chars().next() {
            Some(c) if c == self.quote => Lookahead::Quote,
            Some(c) => Lookahead::Char(c),
            None => Lookahead::End,
        }
    }

    fn end_field(&mut self) {
        let mut field = mem::take(&mut self.field);
        if self.strip && self.state == State::InUnquotedField {
            field.truncate(field.trim_end_matches(is_blank).len());
        }
        self.fields.push(field);
        self.row_started = true;
    }

    fn advance(&mut self, len: usize) {
        self.pos += len;
        self.row_started = true;
    }

    fn advance_row_sep(&mut self) {
        let len = self.row_sep.as_deref().map_or(0, str::len);
        self.pos += len;
        self.lines += 1;
    }

    fn advance_col_sep(&mut self) {
        self.advance(self.col_sep.len());
    }

    fn check_bare_line_break(&self, c: char) -> Result<(), CsvError> {
        if !self.liberal && (c == '\r' || c == '\n') {
            let shown = if c == '\r' { "\\r" } else { "\\n" };
            return Err(self.malformed(format!(
                "Unquoted fields do not allow new line <\"{}\">",
                shown
            )));
        }
        Ok(())
    }

    fn malformed(&self, message: impl Into<String>) -> CsvError {
        CsvError::malformed(
            message,
            Position {
                line: self.line(),
                offset: self.offset(),
            },
        )
    }

    fn offset(&self) -> usize {
        self.drained + self.pos
    }

    fn compact(&mut self) {
        self.buf.drain(..self.pos);
        self.drained += self.pos;
        self.pos = 0;
    }
}

fn is_blank(c: char) -> bool {
    c == ' ' || c == '\t'
}

fn prefix(rest: &str, pattern: &str, eof: bool) -> Prefix {
    if rest.starts_with(pattern) {
        Prefix::Full
    } else if !eof && rest.len() < pattern.len() && pattern.starts_with(rest) {
        Prefix::Partial
    } else {
        Prefix::No
    }
}

/// Picks the row separator from the first line break in `text`.
fn detect_row_sep(text: &str, eof: bool) -> Option<&'static str> {
    match text.find(['\r', '\n']) {
        Some(i) => {
            let rest = &text[i..];
            if rest.starts_with("\r\n") {
                Some("\r\n")
            } else if rest.starts_with('\n') {
                Some("\n")
            } else if rest.len() == 1 && !eof {
                None
            } else {
                Some("\r")
            }
        }
        None if eof || text.len() >= AUTO_DETECT_LIMIT => Some(DEFAULT_ROW_SEP),
        None => None,
    }
}
