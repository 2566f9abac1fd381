//! Physical registers and the register palette.
//!
//! The palette is the fixed set of K physical registers the allocator may
//! color with. Colors are 1-based: slot 1 is the first palette entry.

use super::error::{CompileError, CompileResult};
use std::fmt;

/// Upper bound on palette size.
pub const MAX_PALETTE_SIZE: usize = 32;

/// Default palette: the MIPS temporaries `$t0`..`$t3`.
pub const DEFAULT_REGISTER_NAMES: [&str; 4] = ["t0", "t1", "t2", "t3"];

/// A physical register, identified by its 1-based palette slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PhysReg(u8);

impl PhysReg {
    /// Slot must be at least 1.
    pub const fn new(slot: u8) -> Option<Self> {
        if slot == 0 {
            None
        } else {
            Some(Self(slot))
        }
    }

    /// 1-based color.
    pub fn slot(self) -> u8 {
        self.0
    }

    /// 0-based index into the palette name table.
    pub fn index(self) -> usize {
        (self.0 - 1) as usize
    }
}

impl fmt::Display for PhysReg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Symbolic names of the K allocatable registers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterPalette {
    names: Vec<String>,
}

impl RegisterPalette {
    /// Build a palette from explicit names. Names must be unique and non-empty.
    pub fn new<I, S>(names: I) -> CompileResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        if names.is_empty() {
            return Err(CompileError::InvalidPalette {
                reason: "palette needs at least one register".to_string(),
            });
        }
        if names.len() > MAX_PALETTE_SIZE {
            return Err(CompileError::InvalidPalette {
                reason: format!(
                    "{} registers requested, at most {MAX_PALETTE_SIZE} supported",
                    names.len()
                ),
            });
        }
        for (i, name) in names.iter().enumerate() {
            if name.is_empty() {
                return Err(CompileError::InvalidPalette {
                    reason: format!("register {} has an empty name", i + 1),
                });
            }
            if names[..i].contains(name) {
                return Err(CompileError::InvalidPalette {
                    reason: format!("register name {name} appears twice"),
                });
            }
        }
        Ok(Self { names })
    }

    /// Palette of `k` temporaries named `t0`..`t{k-1}`.
    pub fn with_size(k: usize) -> CompileResult<Self> {
        Self::new((0..k).map(|i| format!("t{i}")))
    }

    /// K, the number of colors.
    pub fn size(&self) -> usize {
        self.names.len()
    }

    /// All registers in slot order.
    pub fn regs(&self) -> impl Iterator<Item = PhysReg> {
        (1..=self.names.len() as u8).map(PhysReg)
    }

    pub fn contains(&self, reg: PhysReg) -> bool {
        reg.index() < self.names.len()
    }

    /// Bare name, e.g. `t0`.
    pub fn name(&self, reg: PhysReg) -> Option<&str> {
        self.names.get(reg.index()).map(String::as_str)
    }

    /// Assembly spelling, e.g. `$t0`.
    pub fn render(&self, reg: PhysReg) -> Option<String> {
        self.name(reg).map(|n| format!("${n}"))
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }
}

impl Default for RegisterPalette {
    fn default() -> Self {
        Self {
            names: DEFAULT_REGISTER_NAMES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_palette() {
        let palette = RegisterPalette::default();
        assert_eq!(palette.size(), 4);
        let regs: Vec<_> = palette.regs().collect();
        assert_eq!(regs.len(), 4);
        assert_eq!(regs[0].slot(), 1);
        assert_eq!(palette.render(regs[0]).as_deref(), Some("$t0"));
        assert_eq!(palette.render(regs[3]).as_deref(), Some("$t3"));
    }

    #[test]
    fn test_slot_zero_is_not_a_register() {
        assert!(PhysReg::new(0).is_none());
        let r = PhysReg::new(2).unwrap();
        assert_eq!(r.index(), 1);
    }

    #[test]
    fn test_with_size_generates_names() {
        let palette = RegisterPalette::with_size(6).unwrap();
        assert_eq!(palette.size(), 6);
        assert_eq!(palette.name(PhysReg::new(6).unwrap()), Some("t5"));
        assert!(!palette.contains(PhysReg::new(7).unwrap()));
        assert_eq!(palette.render(PhysReg::new(7).unwrap()), None);
    }

    #[test]
    fn test_invalid_palettes() {
        assert!(RegisterPalette::with_size(0).is_err());
        assert!(RegisterPalette::with_size(MAX_PALETTE_SIZE + 1).is_err());
        assert!(RegisterPalette::new(["s0", "s0"]).is_err());
        assert!(RegisterPalette::new(["s0", ""]).is_err());
        let custom = RegisterPalette::new(["s0", "s1"]).unwrap();
        assert_eq!(custom.render(PhysReg::new(2).unwrap()).as_deref(), Some("$s1"));
    }
}
