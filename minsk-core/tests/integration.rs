//! End-to-end scenarios built as small loader-format programs, run through
//! the real loader and engine. Instruction words are built field-by-field
//! rather than written free-hand in octal: the opcode's top bit is the
//! word's sign bit, and the remaining fields don't line up with any visual
//! grouping of the twelve magnitude digits.

use std::io::Cursor;

use minsk_core::memory::Loc;
use minsk_core::{loader, Engine, EngineConfig, Memory, Trap, Word};

/// Builds one loader data-line for an instruction word from its fields.
/// `op` is the full 7-bit opcode (0..=0o177); its top bit becomes the
/// word's sign.
fn instruction_line(op: u8, ax: u8, ix: u8, x: u16, y: u16) -> String {
    let sign_negative = op & 0o100 != 0;
    let bits = ((op as u64 & 0o77) << 30)
        | ((ax as u64) << 28)
        | ((ix as u64) << 24)
        | (((x & 0o7777) as u64) << 12)
        | (y & 0o7777) as u64;
    format!(
        "{}{:012o}\n",
        if sign_negative { '-' } else { '+' },
        bits & 0o777_777_777_777
    )
}

/// Builds one loader data-line for a plain data word.
fn data_line(value: i64) -> String {
    let magnitude = value.unsigned_abs() & 0o777_777_777_777;
    format!("{}{:012o}\n", if value < 0 { '-' } else { '+' }, magnitude)
}

fn engine_from_program(text: &str) -> Engine {
    let mut memory = Memory::new(1);
    let mut cursor = Cursor::new(text.as_bytes());
    loader::load(&mut cursor, &mut memory).expect("test program should parse");
    Engine::new(memory, EngineConfig::default())
}

/// S1: NOP then Halt with X = Y = 0100.
#[test]
fn s1_nop_then_halt() {
    let mut program = String::from("@ 0 0 5 0\n");
    program.push_str(&instruction_line(0, 0, 0, 0, 0)); // NOP
    program.push_str(&instruction_line(0o100, 0, 0, 0o100, 0o100)); // Halt
    program.push_str(".\n");

    let mut engine = engine_from_program(&program);
    let mut out = Vec::new();
    let trap = engine.run(&mut out);

    assert_eq!(trap, Trap::Halted);
    assert_eq!(engine.prev_ip, 0o51);
    assert_eq!(engine.acc, Word::ZERO);
    assert_eq!(engine.r1, Word::ZERO);
    assert_eq!(engine.r2, Word::ZERO);
}

/// S2: Fixed add, no modifiers. ACC = int(Y) + int(X) = 3 + 5 = 8.
#[test]
fn s2_fixed_add() {
    let mut program = String::from("@ 0 1 0 0\n");
    program.push_str(&data_line(5)); // 0100
    program.push_str(&data_line(3)); // 0101
    program.push_str("@ 0 0 5 0\n");
    program.push_str(&instruction_line(0o10, 0, 0, 0o100, 0o101));
    program.push_str(&instruction_line(0o100, 0, 0, 0, 0)); // Halt
    program.push_str(".\n");

    let mut engine = engine_from_program(&program);
    let mut out = Vec::new();
    let trap = engine.run(&mut out);

    assert_eq!(trap, Trap::Halted);
    assert_eq!(engine.acc.to_int(), 8);
    assert_eq!(engine.r1.to_int(), 5);
    assert_eq!(engine.r2, Word::ZERO);
}

/// S3: Fixed sub with write-back (bit 0 set). ACC = int(Y) - int(X) =
/// 3 - 5 = -2, also stored back to Y.
#[test]
fn s3_fixed_sub_with_write_back() {
    let mut program = String::from("@ 0 1 0 0\n");
    program.push_str(&data_line(5)); // 0100
    program.push_str(&data_line(3)); // 0101
    program.push_str("@ 0 0 5 0\n");
    program.push_str(&instruction_line(0o21, 0, 0, 0o100, 0o101));
    program.push_str(&instruction_line(0o100, 0, 0, 0, 0)); // Halt
    program.push_str(".\n");

    let mut engine = engine_from_program(&program);
    let mut out = Vec::new();
    let trap = engine.run(&mut out);

    assert_eq!(trap, Trap::Halted);
    assert_eq!(engine.acc.to_int(), -2);
    assert_eq!(engine.memory.read(Loc::new(0, 0o101)).to_int(), -2);
}

/// S4: Fixed division with a zero divisor traps Overflow, IP frozen at the
/// faulting instruction.
#[test]
fn s4_division_by_zero_traps_overflow() {
    let mut program = String::from("@ 0 1 0 0\n");
    program.push_str(&data_line(0)); // 0100: divisor b
    program.push_str(&data_line(9)); // 0101: dividend a
    program.push_str("@ 0 0 5 0\n");
    program.push_str(&instruction_line(0o40, 0, 0, 0o100, 0o101));
    program.push_str(".\n");

    let mut engine = engine_from_program(&program);
    let mut out = Vec::new();
    let trap = engine.run(&mut out);

    assert_eq!(trap, Trap::Overflow);
    assert_eq!(engine.prev_ip, 0o50);
    assert_eq!(engine.ip, 0o51);
}

/// S5: Loop counts down from 2, accumulating the delta word's halves into
/// the index cell each pass, then falls through once the count hits zero.
#[test]
fn s5_loop_counts_down_and_falls_through() {
    let mut program = String::from("@ 0 0 0 7\n");
    program.push_str(&data_line(2 << 24)); // index cell: count=2, halves=0
    program.push_str("@ 0 0 6 1\n");
    program.push_str(&data_line((1 << 12) | 2)); // delta: +1 high, +2 low
    program.push_str("@ 0 0 5 0\n");
    // Loop: ix=7, X=050 (jumps back to itself), Y=061 (the delta word).
    program.push_str(&instruction_line(0o120, 0, 7, 0o50, 0o61));
    program.push_str(&instruction_line(0o100, 0, 0, 0, 0)); // Halt
    program.push_str(".\n");

    let mut engine = engine_from_program(&program);
    let mut out = Vec::new();
    let trap = engine.run(&mut out);

    assert_eq!(trap, Trap::Halted);
    let ix_cell = engine.memory.read(Loc::new(0, 7));
    let count = (ix_cell.bits() >> 24) & 0o17777;
    let high = (ix_cell.bits() >> 12) & 0o7777;
    let low = ix_cell.bits() & 0o7777;
    assert_eq!(count, 0, "loop should run exactly until its count hits zero");
    assert_eq!(high, 2, "two passes each added the delta's high half");
    assert_eq!(low, 4, "two passes each added the delta's low half");
}

/// S6: print decimal-unsigned at position 0, then a clear+emit+LF control
/// word. The line begins "        15" (8 spaces, "17" octal = 15 decimal).
#[test]
fn s6_print_decimal_unsigned() {
    let mut program = String::from("@ 0 1 0 0\n");
    program.push_str(&data_line(0o17)); // 0100: the value to print (15)
    program.push_str("@ 0 0 5 0\n");
    program.push_str(&instruction_line(0o162, 0, 0, 3 << 9, 0o100)); // format r=3, pos=0
    program.push_str(&instruction_line(0o162, 0, 0, 0o400 | (5 << 9), 0)); // clear+emit+LF
    program.push_str(&instruction_line(0o100, 0, 0, 0, 0)); // Halt
    program.push_str(".\n");

    let mut engine = engine_from_program(&program);
    let mut out = Vec::new();
    let trap = engine.run(&mut out);

    assert_eq!(trap, Trap::Halted);
    let text = String::from_utf8(out).unwrap();
    assert!(text.starts_with("        15"), "{text:?}");
    assert!(text.ends_with('\n'));
}

/// Property 5: an overflow trap always freezes IP at the faulting
/// instruction, regardless of how many times the run is repeated from the
/// same starting memory.
#[test]
fn overflow_trap_is_deterministic_across_runs() {
    let program = {
        let mut p = String::from("@ 0 1 0 0\n");
        p.push_str(&data_line(0));
        p.push_str(&data_line(9));
        p.push_str("@ 0 0 5 0\n");
        p.push_str(&instruction_line(0o40, 0, 0, 0o100, 0o101));
        p.push_str(".\n");
        p
    };

    for _ in 0..3 {
        let mut engine = engine_from_program(&program);
        let mut out = Vec::new();
        let trap = engine.run(&mut out);
        assert_eq!(trap, Trap::Overflow);
        assert_eq!(engine.prev_ip, 0o50);
        assert_eq!(engine.ip, 0o51);
    }
}

/// Property 6: the low two opcode bits independently control write-back
/// (bit 0) and operand source (bit 1) for every group-of-four arithmetic
/// opcode.
#[test]
fn write_back_and_operand_source_modifiers_are_independent() {
    // Base 004 = XOR. No modifiers: ACC gets the result, Y is untouched.
    let mut program = String::from("@ 0 1 0 0\n");
    program.push_str(&data_line(0o17)); // 0100 = X = b
    program.push_str(&data_line(0o71)); // 0101 = Y = a
    program.push_str("@ 0 0 5 0\n");
    program.push_str(&instruction_line(0o04, 0, 0, 0o100, 0o101));
    program.push_str(&instruction_line(0o100, 0, 0, 0, 0)); // Halt
    program.push_str(".\n");

    let mut engine = engine_from_program(&program);
    let mut out = Vec::new();
    engine.run(&mut out);
    assert_eq!(engine.acc.bits(), 0o17 ^ 0o71);
    assert_eq!(engine.memory.read(Loc::new(0, 0o101)).bits(), 0o71); // Y unchanged

    // Base 005 = XOR with write-back: same result, but also stored to Y.
    let mut program = String::from("@ 0 1 0 0\n");
    program.push_str(&data_line(0o17));
    program.push_str(&data_line(0o71));
    program.push_str("@ 0 0 5 0\n");
    program.push_str(&instruction_line(0o05, 0, 0, 0o100, 0o101));
    program.push_str(&instruction_line(0o100, 0, 0, 0, 0));
    program.push_str(".\n");

    let mut engine = engine_from_program(&program);
    let mut out = Vec::new();
    engine.run(&mut out);
    assert_eq!(engine.memory.read(Loc::new(0, 0o101)).bits(), 0o17 ^ 0o71);

    // Base 006 = XOR with R2 as the A operand instead of Y: since ACC (and
    // so R2, the pre-op snapshot) starts at +0, the result is just B.
    let mut program = String::from("@ 0 1 0 0\n");
    program.push_str(&data_line(0o17));
    program.push_str(&data_line(0o71));
    program.push_str("@ 0 0 5 0\n");
    program.push_str(&instruction_line(0o06, 0, 0, 0o100, 0o101));
    program.push_str(&instruction_line(0o100, 0, 0, 0, 0));
    program.push_str(".\n");

    let mut engine = engine_from_program(&program);
    let mut out = Vec::new();
    engine.run(&mut out);
    assert_eq!(engine.acc.bits(), 0o17); // a (=R2=+0) xor b (=0o17) == 0o17
}

/// Property 7: Loop runs its body exactly `count` times, never more, and
/// leaves the index cell with `count == 0`.
#[test]
fn loop_runs_exactly_count_times() {
    let mut program = String::from("@ 0 0 0 7\n");
    program.push_str(&data_line(5 << 24)); // count = 5
    program.push_str("@ 0 0 6 1\n");
    program.push_str(&data_line(0)); // delta: no accumulation, just count down
    program.push_str("@ 0 0 5 0\n");
    program.push_str(&instruction_line(0o120, 0, 7, 0o50, 0o61));
    program.push_str(&instruction_line(0o100, 0, 0, 0, 0)); // Halt
    program.push_str(".\n");

    let mut engine = engine_from_program(&program);
    let mut out = Vec::new();
    let trap = engine.run(&mut out);

    assert_eq!(trap, Trap::Halted);
    let ix_cell = engine.memory.read(Loc::new(0, 7));
    assert_eq!((ix_cell.bits() >> 24) & 0o17777, 0);
    // Falls through to the Halt right after Loop, so the faulting^H^H
    // final IP is one past the Loop instruction's own address.
    assert_eq!(engine.prev_ip, 0o51);
}

/// Property 8: formatting and emitting the same word twice produces
/// identical output — the printer has no hidden state beyond its buffer
/// and quota.
#[test]
fn printer_formatting_is_idempotent() {
    use minsk_core::printer::Printer;

    let mut first = Printer::new(None);
    first.format(3 << 9, Word::from_int(15));
    let mut out1 = Vec::new();
    first.control(0b101, &mut out1).unwrap();

    let mut second = Printer::new(None);
    second.format(3 << 9, Word::from_int(15));
    let mut out2 = Vec::new();
    second.control(0b101, &mut out2).unwrap();

    assert_eq!(out1, out2);
}
