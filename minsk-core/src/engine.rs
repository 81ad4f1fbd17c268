//! The fetch-decode-execute loop and the full opcode set. Ported from
//! `original_source/minsk.c`'s `run()` and its `afetch`/`astore` helpers.

use std::io::Write;

use crate::config::EngineConfig;
use crate::decode::{Decoded, OP_LOOP};
use crate::memory::{Loc, Memory};
use crate::printer::Printer;
use crate::trap::Trap;
use crate::word::{float_in_range, frac_in_range, int_in_range, Word, MAGNITUDE_MASK, SIGN_BIT, WORD_MASK};

/// Program start location used by the original loader's convention: the
/// first 0o50 words are reserved, user code begins there.
pub const STANDARD_START: u16 = 0o50;

/// Registers, memory, the printer, and the configuration for one run.
pub struct Engine {
    pub memory: Memory,
    pub printer: Printer,
    pub acc: Word,
    pub r1: Word,
    pub r2: Word,
    pub ip: u16,
    pub prev_ip: u16,
    pub current_ins: Word,
    config: EngineConfig,
    cpu_quota_remaining: Option<u32>,
}

impl Engine {
    pub fn new(memory: Memory, config: EngineConfig) -> Engine {
        Engine {
            memory,
            printer: Printer::new(config.print_quota),
            acc: Word::ZERO,
            r1: Word::ZERO,
            r2: Word::ZERO,
            ip: STANDARD_START,
            prev_ip: 0,
            current_ins: Word::ZERO,
            cpu_quota_remaining: config.cpu_quota,
            config,
        }
    }

    /// Runs until a trap ends the program. Printer output goes to `out`.
    pub fn run(&mut self, out: &mut impl Write) -> Trap {
        loop {
            if let Err(trap) = self.step(out) {
                return trap;
            }
        }
    }

    fn step(&mut self, out: &mut impl Write) -> Result<(), Trap> {
        self.r2 = self.acc;
        self.prev_ip = self.ip;
        let w = self.memory.read(Loc::new(0, self.ip));
        self.current_ins = w;

        let decoded = Decoded::decode(w, self.memory.bank_count());
        let (xi, yi) = decoded.indexed(&self.memory);

        if self.config.trace_level >= 1 {
            tracing::info!(
                ip = self.prev_ip,
                bits = format!("{:013o}", w.bits()),
                ax = decoded.ax,
                ix = decoded.ix,
                "fetch"
            );
        }

        self.ip = (self.ip + 1) & 0o7777;

        if let Some(quota) = &mut self.cpu_quota_remaining {
            match quota.checked_sub(1) {
                Some(remaining) => {
                    *quota = remaining;
                    if remaining == 0 {
                        return Err(Trap::CpuQuotaExceeded);
                    }
                }
                None => return Err(Trap::CpuQuotaExceeded),
            }
        }

        let result = match decoded.op {
            None => Err(self.illegal()),
            Some(op) => self.dispatch(op, &decoded, xi, yi, out),
        };

        if self.config.trace_level >= 2 {
            tracing::debug!(acc = ?self.acc, r1 = ?self.r1, r2 = ?self.r2, "registers");
        }

        result
    }

    fn trap_latching_instruction(&mut self, trap: Trap) -> Trap {
        if trap.latches_instruction() {
            self.acc = self.current_ins;
        }
        trap
    }

    fn illegal(&mut self) -> Trap {
        self.trap_latching_instruction(Trap::IllegalInstruction)
    }

    fn not_implemented(&mut self) -> Trap {
        self.trap_latching_instruction(Trap::NotImplemented)
    }

    fn read(&mut self, loc: Loc) -> Word {
        let value = self.memory.read(loc);
        if self.config.trace_level >= 3 {
            tracing::trace!(bank = loc.bank, address = loc.address, value = ?value, "read");
        }
        value
    }

    fn write(&mut self, loc: Loc, value: Word) {
        if self.config.trace_level >= 3 {
            tracing::trace!(bank = loc.bank, address = loc.address, value = ?value, "write");
        }
        self.memory.write(loc, value);
    }

    /// Shared by every group-of-four arithmetic opcode: `b` (and R1) always
    /// comes from indexed X; `a` comes from R2 when bit 1 of the opcode is
    /// set, otherwise from indexed Y.
    fn afetch(&mut self, op: u8, xi: Loc, yi: Loc) -> (Word, Word) {
        let b = self.read(xi);
        self.r1 = b;
        let a = if op & 2 != 0 { self.r2 } else { self.read(yi) };
        (a, b)
    }

    /// Shared write-back: ACC always takes the result; bit 0 of the opcode
    /// additionally stores it to indexed Y.
    fn astore(&mut self, op: u8, yi: Loc, result: Word) {
        self.acc = result;
        if op & 1 != 0 {
            self.write(yi, result);
        }
    }

    fn astore_int(&mut self, op: u8, yi: Loc, x: i64) -> Result<(), Trap> {
        if !int_in_range(x) {
            return Err(Trap::Overflow);
        }
        self.astore(op, yi, Word::from_int(x));
        Ok(())
    }

    fn astore_frac(&mut self, op: u8, yi: Loc, f: f64) -> Result<(), Trap> {
        if !frac_in_range(f) {
            return Err(Trap::Overflow);
        }
        self.astore(op, yi, Word::from_frac(f));
        Ok(())
    }

    fn astore_float(&mut self, op: u8, yi: Loc, f: f64) -> Result<(), Trap> {
        if !float_in_range(f) {
            return Err(Trap::Overflow);
        }
        self.astore(op, yi, Word::from_float(f, false));
        Ok(())
    }

    fn dispatch(
        &mut self,
        op: u8,
        decoded: &Decoded,
        xi: Loc,
        yi: Loc,
        out: &mut impl Write,
    ) -> Result<(), Trap> {
        match op {
            0o000 => Ok(()),

            0o004..=0o007 => {
                let (a, b) = self.afetch(op, xi, yi);
                self.astore(op, yi, Word::from_bits(a.bits() ^ b.bits()));
                Ok(())
            }
            0o010..=0o013 => {
                let (a, b) = self.afetch(op, xi, yi);
                self.astore_int(op, yi, a.to_int() + b.to_int())
            }
            0o014..=0o017 => {
                let (a, b) = self.afetch(op, xi, yi);
                self.astore_float(op, yi, a.to_float() + b.to_float())
            }
            0o020..=0o023 => {
                let (a, b) = self.afetch(op, xi, yi);
                self.astore_int(op, yi, a.to_int() - b.to_int())
            }
            0o024..=0o027 => {
                let (a, b) = self.afetch(op, xi, yi);
                self.astore_float(op, yi, a.to_float() - b.to_float())
            }
            0o030..=0o033 => {
                let (a, b) = self.afetch(op, xi, yi);
                self.astore_frac(op, yi, a.to_frac() * b.to_frac())
            }
            0o034..=0o037 => {
                let (a, b) = self.afetch(op, xi, yi);
                self.astore_float(op, yi, a.to_float() * b.to_float())
            }
            0o040..=0o043 => {
                let (a, b) = self.afetch(op, xi, yi);
                if b.magnitude() == 0 {
                    return Err(Trap::Overflow);
                }
                self.astore_frac(op, yi, a.to_frac() / b.to_frac())
            }
            0o044..=0o047 => {
                let (a, b) = self.afetch(op, xi, yi);
                let bd = b.to_float();
                if bd == 0.0 || b.get_exp() < -63 {
                    return Err(Trap::Overflow);
                }
                self.astore_float(op, yi, a.to_float() / bd)
            }
            0o050..=0o053 => {
                let (a, b) = self.afetch(op, xi, yi);
                self.astore_int(op, yi, a.magnitude() as i64 - b.magnitude() as i64)
            }
            0o054..=0o057 => {
                let (a, b) = self.afetch(op, xi, yi);
                self.astore_float(op, yi, a.to_float().abs() - b.to_float().abs())
            }
            0o060..=0o063 => {
                let (a, b) = self.afetch(op, xi, yi);
                let i = b.get_exp();
                let result = if !(-36..=36).contains(&i) {
                    0
                } else if i >= 0 {
                    (a.bits() << i) & WORD_MASK
                } else {
                    a.bits() >> (-i)
                };
                self.astore(op, yi, Word::from_bits(result));
                Ok(())
            }
            0o064..=0o067 => {
                let (a, b) = self.afetch(op, xi, yi);
                let i = b.get_exp();
                let aa = a.magnitude() as i64;
                let cc = if !(-35..=35).contains(&i) {
                    0
                } else if i >= 0 {
                    (aa << i) & MAGNITUDE_MASK as i64
                } else {
                    aa >> (-i)
                };
                self.astore(
                    op,
                    yi,
                    Word::from_bits((a.bits() & SIGN_BIT) | (cc as u64 & MAGNITUDE_MASK)),
                );
                Ok(())
            }
            0o070..=0o073 => {
                let (a, b) = self.afetch(op, xi, yi);
                self.astore(op, yi, Word::from_bits(a.bits() & b.bits()));
                Ok(())
            }
            0o074..=0o077 => {
                let (a, b) = self.afetch(op, xi, yi);
                self.astore(op, yi, Word::from_bits(a.bits() | b.bits()));
                Ok(())
            }

            0o100 => {
                self.r1 = self.read(xi);
                self.acc = self.read(yi);
                Err(Trap::Halted)
            }
            0o103 | 0o104 | 0o105 | 0o106 | 0o107 => Err(self.not_implemented()),
            0o110 => {
                let v = self.read(xi);
                self.r1 = v;
                self.acc = v;
                self.write(yi, v);
                Ok(())
            }
            0o111 => {
                let v = self.read(xi);
                self.r1 = v;
                self.acc = Word::from_bits(v.bits() ^ SIGN_BIT);
                self.write(yi, self.acc);
                Ok(())
            }
            0o112 => {
                let v = self.read(xi);
                self.r1 = v;
                self.acc = Word::from_bits(v.bits() & MAGNITUDE_MASK);
                self.write(yi, self.acc);
                Ok(())
            }
            0o113 => Err(self.not_implemented()),
            0o114 => {
                let v = self.read(xi);
                self.r1 = v;
                let y_val = self.read(yi);
                self.acc = Word::from_bits(y_val.bits() ^ (v.bits() & SIGN_BIT));
                self.write(yi, self.acc);
                Ok(())
            }
            0o115 => Err(self.not_implemented()),
            0o116 => {
                let v = self.read(xi);
                self.r1 = v;
                let y_val = self.read(yi);
                self.acc = y_val.put_exp(v.get_exp());
                self.write(yi, self.acc);
                Ok(())
            }
            0o117 => Err(self.not_implemented()),
            OP_LOOP => {
                if decoded.ix == 0 {
                    return Err(self.illegal());
                }
                let counter_loc = decoded.loop_counter();
                let a = self.read(counter_loc);
                self.r1 = a;
                let count = (a.bits() >> 24) & 0o17777;
                if count == 0 {
                    return Ok(());
                }
                let b = self.read(yi);
                let high = (((a.bits() >> 12) & 0o7777) + ((b.bits() >> 12) & 0o7777)) & 0o7777;
                let low = ((a.bits() & 0o7777) + (b.bits() & 0o7777)) & 0o7777;
                self.acc = Word::from_bits(((count - 1) << 24) | (high << 12) | low);
                self.write(counter_loc, self.acc);
                self.ip = xi.address;
                Ok(())
            }
            0o130 => {
                self.write(yi, self.r2);
                self.ip = xi.address;
                Ok(())
            }
            0o131 => {
                self.acc = Word::from_bits(
                    (0o130u64 << 30) | ((self.ip as u64 & 0o7777) << 12),
                );
                self.write(yi, self.acc);
                self.ip = xi.address;
                Ok(())
            }
            0o132 => {
                self.ip = if self.r2.sign() >= 0 {
                    xi.address
                } else {
                    yi.address
                };
                Ok(())
            }
            0o133 => {
                // Overflow always traps immediately, so this jump's other
                // branch is unreachable in practice; kept for fidelity.
                self.ip = xi.address;
                Ok(())
            }
            0o134 => {
                self.ip = if self.r2.magnitude() == 0 {
                    yi.address
                } else {
                    xi.address
                };
                Ok(())
            }
            0o135 => {
                // No keys are ever pressed.
                self.ip = yi.address;
                Ok(())
            }
            0o136 | 0o137 => Err(self.not_implemented()),
            0o140..=0o147 | 0o150..=0o154 | 0o160..=0o161 | 0o163 => Err(self.not_implemented()),
            0o162 => {
                // Indexing is applied uniformly here (unlike the historical
                // source, which read the control word unindexed) — see
                // DESIGN.md.
                let x_addr = xi.address;
                if x_addr & 0o400 != 0 {
                    let r = ((x_addr >> 9) & 7) as u8;
                    self.printer.control(r, out).map_err(|_| Trap::OutOfPaper)?;
                } else {
                    let value = self.read(yi);
                    self.printer.format(x_addr, value);
                }
                Ok(())
            }
            0o170 => {
                let (a, b) = self.afetch(op, xi, yi);
                if a.to_frac() * b.to_frac() >= 2f64.powi(-33) {
                    return Err(Trap::Overflow);
                }
                // The original leaves the sign of this product undefined;
                // we follow it in always producing a non-negative result.
                self.acc = Word::from_bits((a.magnitude() * b.magnitude()) & MAGNITUDE_MASK);
                Ok(())
            }
            0o171 => {
                let (a, b) = self.afetch(op, xi, yi);
                let bb = b.magnitude() as i64;
                if bb == 0 {
                    return Err(Trap::Overflow);
                }
                let mut cc = (a.magnitude() as i64) % bb;
                if b.sign() < 0 {
                    cc = -cc;
                }
                self.acc = Word::from_int(cc);
                Ok(())
            }
            0o172 => {
                let a = self.read(xi);
                self.r1 = a;
                let b = self.read(yi);
                let i = a.get_exp() + b.get_exp();
                if !(-63..=63).contains(&i) {
                    return Err(Trap::Overflow);
                }
                self.acc = b.put_exp(i);
                self.write(yi, self.acc);
                Ok(())
            }
            0o173 => {
                let a = self.read(xi);
                self.r1 = a;
                let b = self.read(yi);
                let i = b.get_exp() - a.get_exp();
                if !(-63..=63).contains(&i) {
                    return Err(Trap::Overflow);
                }
                self.acc = b.put_exp(i);
                self.write(yi, self.acc);
                Ok(())
            }
            0o174 => {
                let a = self.read(xi);
                self.r1 = a;
                let b = self.read(yi);
                let mut c = a.bits() + b.bits();
                if c > MAGNITUDE_MASK {
                    c -= MAGNITUDE_MASK;
                }
                let result = Word::from_bits(c);
                self.write(yi, result);
                // The original leaves the accumulator effect undocumented;
                // the most plausible reading is that ACC mirrors the store.
                self.acc = result;
                Ok(())
            }
            0o175 => {
                let a = self.read(xi);
                self.r1 = a;
                if a.magnitude() == 0 {
                    self.write(yi, Word::ZERO);
                    let yinc = Loc::new(yi.bank, (yi.address + 1) & 0o7777);
                    self.write(yinc, Word::ZERO);
                    self.acc = Word::ZERO;
                } else {
                    let sign_bits = a.bits() & SIGN_BIT;
                    let mut mag = a.magnitude();
                    let mut shifts = 0u64;
                    while mag & (SIGN_BIT >> 1) == 0 {
                        mag <<= 1;
                        shifts += 1;
                    }
                    self.acc = Word::from_bits(sign_bits | mag);
                    self.write(yi, self.acc);
                    let yinc = Loc::new(yi.bank, (yi.address + 1) & 0o7777);
                    self.write(yinc, Word::from_int(shifts as i64));
                }
                Ok(())
            }
            0o176 => {
                let a = self.read(xi);
                self.r1 = a;
                let count = (0..36).filter(|i| a.bits() & (1 << i) != 0).count();
                // The original leaves the accumulator effect undocumented;
                // we mirror the value written back.
                self.acc = Word::from_int(count as i64);
                self.write(yi, self.acc);
                Ok(())
            }
            _ => Err(self.illegal()),
        }
    }
}
