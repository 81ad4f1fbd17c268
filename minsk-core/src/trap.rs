//! The flat taxonomy of terminal events that end a run (spec §7).

use thiserror::Error;

/// A terminal event. Every run ends in exactly one of these; there are no
/// recoverable errors inside the execution loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Trap {
    #[error("Halted")]
    Halted,
    #[error("Overflow")]
    Overflow,
    #[error("Illegal instruction")]
    IllegalInstruction,
    #[error("Not implemented")]
    NotImplemented,
    #[error("CPU quota exceeded")]
    CpuQuotaExceeded,
    #[error("Out of paper")]
    OutOfPaper,
}

impl Trap {
    /// English message, used by the status block when `--english` is set.
    pub fn english(self) -> &'static str {
        match self {
            Trap::Halted => "Halted",
            Trap::Overflow => "Overflow",
            Trap::IllegalInstruction => "Illegal instruction",
            Trap::NotImplemented => "Not implemented",
            Trap::CpuQuotaExceeded => "CPU quota exceeded",
            Trap::OutOfPaper => "Out of paper",
        }
    }

    /// Russian message, the default language.
    pub fn russian(self) -> &'static str {
        match self {
            Trap::Halted => "Останов машины",
            Trap::Overflow => "Аварийный останов",
            Trap::IllegalInstruction => "Эту команду не знаю",
            Trap::NotImplemented => "Устройство разбитое",
            Trap::CpuQuotaExceeded => "Тайм-аут",
            Trap::OutOfPaper => "Бумага дошла - нужно ехать в Сибирь про новую",
        }
    }

    /// Does this trap place the offending instruction word in ACC as a
    /// debugging aid (spec §7)?
    pub fn latches_instruction(self) -> bool {
        matches!(self, Trap::IllegalInstruction | Trap::NotImplemented)
    }
}
