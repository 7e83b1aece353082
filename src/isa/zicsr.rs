//! Zicsr 扩展
//!
//! 指令编码为 I-type 变体，csr 地址占 imm 字段，立即数版本复用 rs1 字段作 zimm：
//! ```text
//! 31       20 19    15 14  12 11   7 6      0
//! ┌──────────┬────────┬──────┬──────┬────────┐
//! │   csr    │rs1/zimm│funct3│  rd  │ 1110011│
//! └──────────┴────────┴──────┴──────┴────────┘
//! ```

use crate::isa::fields::*;
use crate::isa::instr::RvInstr;
use crate::isa::instr_def::{f3_match, InstrDef, TableDrivenDecoder, F3_MASK};

macro_rules! csr_reg {
    ($name:literal, $f3:expr, $variant:ident) => {
        InstrDef::new($name, F3_MASK, f3_match($f3, OP_SYSTEM), |raw| RvInstr::$variant {
            rd: rd(raw),
            rs1: rs1(raw),
            csr: csr_addr(raw),
        })
    };
}

macro_rules! csr_imm {
    ($name:literal, $f3:expr, $variant:ident) => {
        InstrDef::new($name, F3_MASK, f3_match($f3, OP_SYSTEM), |raw| RvInstr::$variant {
            rd: rd(raw),
            zimm: rs1(raw),
            csr: csr_addr(raw),
        })
    };
}

pub static ZICSR_INSTRS: &[InstrDef] = &[
    csr_reg!("CSRRW", 0b001, Csrrw),
    csr_reg!("CSRRS", 0b010, Csrrs),
    csr_reg!("CSRRC", 0b011, Csrrc),
    csr_imm!("CSRRWI", 0b101, Csrrwi),
    csr_imm!("CSRRSI", 0b110, Csrrsi),
    csr_imm!("CSRRCI", 0b111, Csrrci),
];

pub static ZICSR_OPCODES: [u32; 1] = [OP_SYSTEM];

pub static ZICSR_DECODER: TableDrivenDecoder =
    TableDrivenDecoder::new("Zicsr", ZICSR_INSTRS, &ZICSR_OPCODES);

// ========== 已实现的 CSR ==========
pub const CSR_MSTATUS: u16 = 0x300;
pub const CSR_MEPC: u16 = 0x341;
pub const CSR_MCAUSE: u16 = 0x342;
pub const CSR_MTVAL: u16 = 0x343;

/// CSR 地址到名称，未实现的返回 `None`
pub fn csr_name(csr: u16) -> Option<&'static str> {
    match csr {
        CSR_MSTATUS => Some("mstatus"),
        CSR_MEPC => Some("mepc"),
        CSR_MCAUSE => Some("mcause"),
        CSR_MTVAL => Some("mtval"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::isa::InstrDecoder;

    #[test]
    fn test_decode_csrrw() {
        // csrrw ra, mstatus, sp
        let decoded = ZICSR_DECODER.decode(0x300110F3).unwrap();
        assert_eq!(
            decoded.instr,
            RvInstr::Csrrw {
                rd: 1,
                rs1: 2,
                csr: CSR_MSTATUS
            }
        );
    }

    #[test]
    fn test_decode_csrrwi() {
        // csrrwi t0, mepc, 7
        let decoded = ZICSR_DECODER.decode(0x3413D2F3).unwrap();
        assert_eq!(
            decoded.instr,
            RvInstr::Csrrwi {
                rd: 5,
                zimm: 7,
                csr: CSR_MEPC
            }
        );
    }

    #[test]
    fn test_ecall_is_not_csr() {
        assert!(ZICSR_DECODER.decode(0x00000073).is_none());
    }
}
