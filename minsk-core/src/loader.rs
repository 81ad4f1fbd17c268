//! The octal load-format parser (spec §4.3), ported from
//! `original_source/minsk.c`'s `parse_in`.

use std::io::BufRead;

use thiserror::Error;

use crate::memory::{Loc, Memory};
use crate::word::{Word, SIGN_BIT};

/// A loader parse failure: a line number plus a bilingual message, matching
/// the original's `parse_error(russian_msg, english_msg)`.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum LoadErrorKind {
    LineTooLong,
    InvalidDigit,
    AddressTooLong,
    InvalidSign,
    NumberTooLong,
}

impl LoadErrorKind {
    pub fn english(self) -> &'static str {
        match self {
            LoadErrorKind::LineTooLong => "Line too long",
            LoadErrorKind::InvalidDigit => "Invalid number",
            LoadErrorKind::AddressTooLong => "Address too long",
            LoadErrorKind::InvalidSign => "Invalid sign",
            LoadErrorKind::NumberTooLong => "Number too long",
        }
    }

    pub fn russian(self) -> &'static str {
        match self {
            LoadErrorKind::LineTooLong => "Строка слишком долгая",
            LoadErrorKind::InvalidDigit => "Плохая цифра",
            LoadErrorKind::AddressTooLong => "Адрес слишком долгий",
            LoadErrorKind::InvalidSign => "Плохой знак",
            LoadErrorKind::NumberTooLong => "Номер слишком долгий",
        }
    }
}

/// A loader failure at a specific (1-based) line number.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("parse error at line {line}: {kind:?}")]
pub struct LoadError {
    pub line: u32,
    pub kind: LoadErrorKind,
}

impl LoadError {
    pub fn english(&self) -> String {
        format!("Parse error (line {}): {}", self.line, self.kind.english())
    }

    pub fn russian(&self) -> String {
        format!(
            "Ошибка входа (стр. {}): {}",
            self.line,
            self.kind.russian()
        )
    }
}

const MAX_LINE_LEN: usize = 79;

/// Reads the octal loader format from `input` into `memory`'s bank 0 (the
/// loader only ever targets bank 0 — `@` lines do not select a bank).
///
/// Returns `Ok(())` once it sees a lone `.` line or reaches end of input.
pub fn load(input: &mut impl BufRead, memory: &mut Memory) -> Result<(), LoadError> {
    let mut address: u16 = 0;
    let mut lino: u32 = 0;
    let mut line = String::new();

    loop {
        line.clear();
        let bytes_read = input
            .read_line(&mut line)
            .expect("reading loader input failed");
        if bytes_read == 0 {
            return Ok(());
        }
        lino += 1;

        if !line.ends_with('\n') {
            return Err(LoadError {
                line: lino,
                kind: LoadErrorKind::LineTooLong,
            });
        }

        let mut text = line.trim_end_matches('\n');
        text = text.strip_suffix('\r').unwrap_or(text);
        if text.chars().count() > MAX_LINE_LEN {
            return Err(LoadError {
                line: lino,
                kind: LoadErrorKind::LineTooLong,
            });
        }

        let mut chars = text.chars().peekable();
        match chars.peek() {
            None => continue,
            Some(';') => continue,
            Some('.') => return Ok(()),
            Some('@') => {
                chars.next();
                address = parse_address(&mut chars, lino)?;
                continue;
            }
            Some('+') | Some('-') => {
                let word = parse_data_word(&mut chars, lino)?;
                memory.write(Loc::new(0, address), word);
                address = address.wrapping_add(1) & 0o7777;
            }
            Some(_) => {
                return Err(LoadError {
                    line: lino,
                    kind: LoadErrorKind::InvalidSign,
                })
            }
        }
    }
}

fn skip_spaces(chars: &mut std::iter::Peekable<std::str::Chars>) {
    while chars.peek() == Some(&' ') {
        chars.next();
    }
}

fn parse_address(
    chars: &mut std::iter::Peekable<std::str::Chars>,
    lino: u32,
) -> Result<u16, LoadError> {
    let mut address: u16 = 0;
    for _ in 0..4 {
        skip_spaces(chars);
        match chars.next() {
            Some(c) if ('0'..='7').contains(&c) => {
                address = address * 8 + (c as u16 - '0' as u16);
            }
            _ => {
                return Err(LoadError {
                    line: lino,
                    kind: LoadErrorKind::InvalidDigit,
                })
            }
        }
    }
    skip_spaces(chars);
    if chars.peek().is_some() {
        return Err(LoadError {
            line: lino,
            kind: LoadErrorKind::AddressTooLong,
        });
    }
    Ok(address)
}

fn parse_data_word(
    chars: &mut std::iter::Peekable<std::str::Chars>,
    lino: u32,
) -> Result<Word, LoadError> {
    let sign_char = chars.next().expect("caller peeked a sign char");
    let sign_bit = match sign_char {
        '-' => SIGN_BIT,
        '+' => 0,
        _ => unreachable!("caller only dispatches on '+'/'-'"),
    };

    let mut magnitude: u64 = 0;
    for _ in 0..12 {
        skip_spaces(chars);
        match chars.next() {
            Some(c) if ('0'..='7').contains(&c) => {
                magnitude = magnitude * 8 + (c as u64 - '0' as u64);
            }
            _ => {
                return Err(LoadError {
                    line: lino,
                    kind: LoadErrorKind::InvalidDigit,
                })
            }
        }
    }
    skip_spaces(chars);
    if chars.peek().is_some() {
        return Err(LoadError {
            line: lino,
            kind: LoadErrorKind::NumberTooLong,
        });
    }
    Ok(Word::from_bits(sign_bit | magnitude))
}
