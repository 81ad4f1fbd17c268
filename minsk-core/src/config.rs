//! Engine-wide configuration, passed once at construction instead of
//! living as module-level mutable state (spec §9's explicit design note —
//! the original C emulator kept `trace`, `cpu_quota`, `print_quota`,
//! `english`, and `memblocks` as file-scope `static` globals).

/// Construction-time configuration for an [`crate::engine::Engine`].
#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    /// 0 = silent, 1 = per-instruction, 2 = also registers, 3 = also
    /// memory access, per spec §6.
    pub trace_level: u8,
    /// `None` = unlimited.
    pub cpu_quota: Option<u32>,
    /// `None` = unlimited.
    pub print_quota: Option<u32>,
    /// Select English status/error messages instead of Russian.
    pub english: bool,
    /// Minsk-22 mode: two memory banks, `ax` address-extension field live.
    pub upgrade: bool,
    /// Pre-seed memory with the `--set-password` trivia payload.
    pub set_password: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            trace_level: 0,
            cpu_quota: None,
            print_quota: None,
            english: false,
            upgrade: false,
            set_password: false,
        }
    }
}

impl EngineConfig {
    /// Number of memory banks implied by `upgrade`.
    pub fn bank_count(&self) -> usize {
        if self.upgrade {
            2
        } else {
            1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_minsk2_unlimited_silent() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.bank_count(), 1);
        assert_eq!(cfg.trace_level, 0);
        assert!(cfg.cpu_quota.is_none());
    }

    #[test]
    fn upgrade_doubles_bank_count() {
        let cfg = EngineConfig {
            upgrade: true,
            ..Default::default()
        };
        assert_eq!(cfg.bank_count(), 2);
    }
}
