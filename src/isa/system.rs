//! 环境调用与 trap 返回指令

use crate::isa::fields::OP_SYSTEM;
use crate::isa::instr::RvInstr;
use crate::isa::instr_def::{InstrDef, TableDrivenDecoder, EXACT_MASK};

pub const ECALL_ENCODING: u32 = 0x0000_0073;
pub const EBREAK_ENCODING: u32 = 0x0010_0073;
pub const URET_ENCODING: u32 = 0x0020_0073;
pub const SRET_ENCODING: u32 = 0x1020_0073;
pub const MRET_ENCODING: u32 = 0x3020_0073;

pub static SYSTEM_INSTRS: &[InstrDef] = &[
    InstrDef::new("ECALL", EXACT_MASK, ECALL_ENCODING, |_| RvInstr::Ecall),
    InstrDef::new("EBREAK", EXACT_MASK, EBREAK_ENCODING, |_| RvInstr::Ebreak),
    InstrDef::new("URET", EXACT_MASK, URET_ENCODING, |_| RvInstr::Uret),
    InstrDef::new("SRET", EXACT_MASK, SRET_ENCODING, |_| RvInstr::Sret),
    InstrDef::new("MRET", EXACT_MASK, MRET_ENCODING, |_| RvInstr::Mret),
];

pub static SYSTEM_OPCODES: [u32; 1] = [OP_SYSTEM];

pub static SYSTEM_DECODER: TableDrivenDecoder =
    TableDrivenDecoder::new("System", SYSTEM_INSTRS, &SYSTEM_OPCODES);
