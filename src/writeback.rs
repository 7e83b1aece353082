//! Writeback records: the unit compared between hardware and reference.

use std::fmt;

use crate::isa::reg_name;

/// One retirement observation from either side of the lockstep pair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WritebackRecord {
    /// The observation corresponds to a real retirement.
    pub has_instruction: bool,
    /// Address of the retired instruction.
    pub pc: u32,
    pub write_enabled: bool,
    pub rd: u8,
    pub value: u32,
    /// False marks end-of-program (or an illegal/unsupported instruction).
    pub instruction_valid: bool,
}

/// A field the comparator can disagree on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Pc,
    WriteEnabled,
    Rd,
    Value,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Field::Pc => "pc",
            Field::WriteEnabled => "wen",
            Field::Rd => "rd",
            Field::Value => "value",
        })
    }
}

impl WritebackRecord {
    /// A retirement that writes `value` to `rd`. Writes to x0 are reported as disabled.
    pub fn retired(pc: u32, rd: u8, value: u32) -> Self {
        Self {
            has_instruction: true,
            pc,
            write_enabled: rd != 0,
            rd,
            value,
            instruction_valid: true,
        }
    }

    /// A retirement with no register write (stores, branches, ecall).
    pub fn retired_no_write(pc: u32) -> Self {
        Self {
            has_instruction: true,
            pc,
            instruction_valid: true,
            ..Self::default()
        }
    }

    /// The all-zero record the reference produces when a run ends.
    pub fn terminated() -> Self {
        Self::default()
    }

    /// Fields in which `self` and `other` disagree.
    ///
    /// With `compare_idle == false`, `rd` and `value` are ignored when neither
    /// side writes a register.
    pub fn diff(&self, other: &Self, compare_idle: bool) -> Vec<Field> {
        let mut fields = Vec::new();
        if self.pc != other.pc {
            fields.push(Field::Pc);
        }
        if self.write_enabled != other.write_enabled {
            fields.push(Field::WriteEnabled);
        }
        let idle = !self.write_enabled && !other.write_enabled;
        if compare_idle || !idle {
            if self.rd != other.rd {
                fields.push(Field::Rd);
            }
            if self.value != other.value {
                fields.push(Field::Value);
            }
        }
        fields
    }
}

impl fmt::Display for WritebackRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PC=0x{:08x}, WBEn = {}, WReg = {}({}), WBValue = 0x{:08x}, valid = {}",
            self.pc,
            self.write_enabled as u8,
            self.rd,
            reg_name(self.rd),
            self.value,
            self.instruction_valid as u8,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_write_to_x0_is_disabled() {
        let rec = WritebackRecord::retired(0x10, 0, 42);
        assert!(!rec.write_enabled);
        assert!(rec.has_instruction);
    }

    #[test]
    fn test_diff_reports_each_field() {
        let a = WritebackRecord::retired(0x0, 5, 7);
        let b = WritebackRecord::retired(0x4, 6, 8);
        assert_eq!(a.diff(&b, false), vec![Field::Pc, Field::Rd, Field::Value]);
        assert!(a.diff(&a, false).is_empty());
    }

    #[test]
    fn test_idle_fields_ignored_by_default() {
        let hw = WritebackRecord {
            rd: 3,
            value: 0xdead,
            ..WritebackRecord::retired_no_write(0x8)
        };
        let reference = WritebackRecord::retired_no_write(0x8);
        assert!(hw.diff(&reference, false).is_empty());
        assert_eq!(hw.diff(&reference, true), vec![Field::Rd, Field::Value]);
    }

    #[test]
    fn test_display_format() {
        let rec = WritebackRecord::retired(0x1c, 5, 7);
        assert_eq!(
            rec.to_string(),
            "PC=0x0000001c, WBEn = 1, WReg = 5(t0), WBValue = 0x00000007, valid = 1"
        );
    }
}
