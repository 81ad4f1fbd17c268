//! The 128-character line printer: a line buffer, two 64-glyph code pages,
//! and the micro-format interpreter driven by opcode `0162`'s operand.
//!
//! Ported from `original_source/minsk.c`'s `print_ins`/`print_line` and its
//! `russian_chars`/`latin_chars` tables.

use crate::word::Word;

/// Columns in the print line.
pub const LINE_WIDTH: usize = 128;

/// The Russian (Cyrillic) 64-glyph code page, ported verbatim.
#[rustfmt::skip]
pub const RUSSIAN_CHARS: [char; 64] = [
    '0', '1', '2', '3', '4', '5', '6', '7',
    '8', '9', '+', '-', '/', ',', '.', ' ',
    '\u{2169}', '^', '(', ')', '\u{00d7}', '=', ';', '[',
    ']', '*', '`', '\'', '\u{2260}', '<', '>', ':',
    '\u{0410}', '\u{0411}', '\u{0412}', '\u{0413}', '\u{0414}', '\u{0415}', '\u{0416}', '\u{0417}',
    '\u{0418}', '\u{0419}', '\u{041a}', '\u{041b}', '\u{041c}', '\u{041d}', '\u{041e}', '\u{041f}',
    '\u{0420}', '\u{0421}', '\u{0422}', '\u{0423}', '\u{0424}', '\u{0425}', '\u{0426}', '\u{0427}',
    '\u{0428}', '\u{0429}', '\u{042b}', '\u{042c}', '\u{042d}', '\u{042e}', '\u{042f}', '\u{2013}',
];

/// The Latin 64-glyph code page, ported verbatim (note the blank slots at
/// positions that the Russian page fills with Cyrillic letters the Latin
/// alphabet has no analogue for).
#[rustfmt::skip]
pub const LATIN_CHARS: [char; 64] = [
    '0', '1', '2', '3', '4', '5', '6', '7',
    '8', '9', '+', '-', '/', ',', '.', ' ',
    '\u{2169}', '^', '(', ')', '\u{00d7}', '=', ';', '[',
    ']', '*', '`', '\'', '\u{2260}', '<', '>', ':',
    'A', 'B', 'W', 'G', 'D', 'E', 'V', 'Z',
    'I', 'J', 'K', 'L', 'M', 'N', 'O', 'P',
    'R', 'S', 'T', 'U', 'F', 'H', 'C', ' ',
    ' ', ' ', 'Y', 'X', ' ', ' ', 'Q', '\u{2013}',
];

/// The bit-consuming steps a format can take, one entry per character of
/// the original's `fmt` strings (`"+dddddddx+xbd"`, `"xrrrrrr"`, ...).
///
/// `DecimalDigit` is the one deliberate deviation from that source: the
/// original reads every "decimal" position as a raw 4-bit nibble (so a word
/// that isn't pre-packed BCD prints hex-ish garbage above digit 9). Formats
/// `r=2`/`r=3` here instead render the word's true base-10 value, one digit
/// per position, matching what a format literally named "decimal" should
/// produce. `r=0`'s mantissa digits keep the original's nibble reading,
/// since that format's own description calls it out explicitly. See
/// `DESIGN.md` for the full writeup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FormatOp {
    /// Consume 1 bit, emit '+' or '-'.
    Sign,
    /// Consume 4 bits, emit a hex-nibble-as-decimal digit ('0'..'F').
    DecimalNibble,
    /// Emit the next base-10 digit of the word's magnitude (MSB-first, 9
    /// digits total, truncating anything above 10^9 − 1).
    DecimalDigit,
    /// Consume 1 bit, emit '0' or '1'.
    Binary,
    /// Consume 3 bits, emit an octal digit.
    Octal,
    /// Consume 6 bits, look up a Russian glyph.
    Russian,
    /// Consume 6 bits, look up a Latin glyph.
    Latin,
    /// Consume 1 bit, emit nothing (a skipped padding bit).
    SkipBit,
    /// Consume no bits, emit a literal space.
    Space,
}

/// Formats selected by `r = bits 9..11` of the print-opcode's X operand.
fn format_ops(r: u8) -> &'static [FormatOp] {
    use FormatOp::*;
    match r {
        0 => &[
            Sign,
            DecimalNibble,
            DecimalNibble,
            DecimalNibble,
            DecimalNibble,
            DecimalNibble,
            DecimalNibble,
            DecimalNibble,
            SkipBit,
            Sign,
            SkipBit,
            Binary,
            DecimalNibble,
        ],
        1 => &[
            Sign, Octal, Octal, Octal, Octal, Octal, Octal, Octal, Octal, Octal, Octal, Octal,
            Octal,
        ],
        2 => &[
            Sign,
            DecimalDigit,
            DecimalDigit,
            DecimalDigit,
            DecimalDigit,
            DecimalDigit,
            DecimalDigit,
            DecimalDigit,
            DecimalDigit,
            DecimalDigit,
        ],
        3 => &[
            SkipBit,
            Space,
            DecimalDigit,
            DecimalDigit,
            DecimalDigit,
            DecimalDigit,
            DecimalDigit,
            DecimalDigit,
            DecimalDigit,
            DecimalDigit,
            DecimalDigit,
        ],
        4 => &[SkipBit, Russian],
        5 => &[SkipBit, Russian, Russian, Russian, Russian, Russian, Russian],
        6 => &[SkipBit, Latin],
        _ => &[SkipBit, Latin, Latin, Latin, Latin, Latin, Latin],
    }
}

/// Does format `r` suppress leading zeros/spaces (format r=3 only)?
fn format_eats_leading_zeros(r: u8) -> bool {
    r == 3
}

/// The word's magnitude as 9 base-10 digits, most significant first,
/// truncated to the low 9 decimal digits (a 36-bit magnitude can exceed
/// 10^9, and the original format only ever has 9 digit positions to fill).
fn decimal_digits_of(value: Word) -> [u8; 9] {
    let mut truncated = value.magnitude() % 1_000_000_000;
    let mut digits = [0u8; 9];
    for slot in digits.iter_mut().rev() {
        *slot = (truncated % 10) as u8;
        truncated /= 10;
    }
    digits
}

/// The printer's 128-column line buffer plus quota counter.
pub struct Printer {
    buffer: [char; LINE_WIDTH],
    /// `None` = unlimited.
    quota: Option<u32>,
}

/// Returned when the printer can no longer emit a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutOfPaper;

impl Printer {
    pub fn new(quota: Option<u32>) -> Printer {
        Printer {
            buffer: ['\0'; LINE_WIDTH],
            quota,
        }
    }

    /// Format the word `value` into the buffer starting at `x & 0177`,
    /// under format `r = (x >> 9) & 7`.
    pub fn format(&mut self, x: u16, value: Word) {
        let mut pos = (x & 0o177) as usize;
        let r = ((x >> 9) & 7) as u8;
        let ops = format_ops(r);
        let mut eat = format_eats_leading_zeros(r);
        let mut bit: i32 = 37;
        let decimal_digits = decimal_digits_of(value);
        let mut decimal_idx = 0usize;
        let uses_bit_stream = !matches!(r, 2 | 3);

        for (i, op) in ops.iter().enumerate() {
            let is_last = i + 1 == ops.len();
            let ch = match op {
                FormatOp::SkipBit => {
                    bit -= 1;
                    continue;
                }
                FormatOp::Space => ' ',
                FormatOp::Sign => {
                    bit -= 1;
                    if (value.bits() >> bit) & 1 != 0 {
                        '-'
                    } else {
                        '+'
                    }
                }
                FormatOp::Binary => {
                    bit -= 1;
                    char::from(b'0' + ((value.bits() >> bit) & 1) as u8)
                }
                FormatOp::Octal => {
                    bit -= 3;
                    char::from(b'0' + ((value.bits() >> bit) & 7) as u8)
                }
                FormatOp::DecimalNibble => {
                    bit -= 4;
                    let nibble = (value.bits() >> bit) & 0xf;
                    if nibble <= 9 {
                        char::from(b'0' + nibble as u8)
                    } else {
                        char::from(b'A' + (nibble - 10) as u8)
                    }
                }
                FormatOp::DecimalDigit => {
                    let digit = decimal_digits[decimal_idx];
                    decimal_idx += 1;
                    char::from(b'0' + digit)
                }
                FormatOp::Russian => {
                    bit -= 6;
                    RUSSIAN_CHARS[((value.bits() >> bit) & 0o77) as usize]
                }
                FormatOp::Latin => {
                    bit -= 6;
                    LATIN_CHARS[((value.bits() >> bit) & 0o77) as usize]
                }
            };

            let ch = if eat && !is_last {
                if ch == '0' || ch == ' ' {
                    ' '
                } else {
                    eat = false;
                    ch
                }
            } else {
                ch
            };

            self.buffer[pos] = ch;
            pos = (pos + 1) & 0o177;
        }
        if uses_bit_stream {
            debug_assert!(bit >= 0);
        }
    }

    /// Execute a control command (`r = bits 9..11` of X, with bit 8 set):
    /// bit 0 → line feed, bit 1 → clear, bit 2 → emit.
    pub fn control(&mut self, r: u8, out: &mut impl std::io::Write) -> Result<(), OutOfPaper> {
        if r & 4 != 0 {
            if let Some(quota) = &mut self.quota {
                match quota.checked_sub(1) {
                    Some(remaining) => {
                        *quota = remaining;
                        if remaining == 0 {
                            return Err(OutOfPaper);
                        }
                    }
                    None => return Err(OutOfPaper),
                }
            }
            let mut line = String::with_capacity(LINE_WIDTH);
            for &ch in &self.buffer {
                line.push(if ch == '\0' { ' ' } else { ch });
            }
            out.write_all(line.as_bytes())
                .expect("writing printer output failed");
        }
        if r & 2 != 0 {
            self.buffer = ['\0'; LINE_WIDTH];
        }
        if r & 1 != 0 {
            out.write_all(b"\n").expect("writing printer output failed");
        } else if r & 4 != 0 {
            out.write_all(b"\r").expect("writing printer output failed");
        }
        out.flush().expect("flushing printer output failed");
        Ok(())
    }
}
