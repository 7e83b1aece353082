//! 表驱动的指令定义
//!
//! 每条指令用 mask/match 描述其固定位，命中后调用 `decode` 构造 `RvInstr`。

use super::decoder::InstrDecoder;
use super::fields::*;
use super::instr::{DecodedInstr, RvInstr};

/// 指令定义
#[derive(Clone)]
pub struct InstrDef {
    pub name: &'static str,
    pub mask: u32,
    pub match_val: u32,
    pub decode: fn(u32) -> RvInstr,
}

impl InstrDef {
    pub const fn new(
        name: &'static str,
        mask: u32,
        match_val: u32,
        decode: fn(u32) -> RvInstr,
    ) -> Self {
        Self {
            name,
            mask,
            match_val,
            decode,
        }
    }

    #[inline]
    pub fn matches(&self, raw: u32) -> bool {
        (raw & self.mask) == self.match_val
    }

    /// 两个定义冲突当且仅当存在某个指令字同时匹配两者
    pub fn conflicts_with(&self, other: &InstrDef) -> bool {
        let common = self.mask & other.mask;
        (self.match_val & common) == (other.match_val & common)
    }
}

impl std::fmt::Debug for InstrDef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstrDef")
            .field("name", &self.name)
            .field("mask", &format_args!("0x{:08X}", self.mask))
            .field("match_val", &format_args!("0x{:08X}", self.match_val))
            .finish()
    }
}

// ========== 掩码 ==========

/// opcode + funct3 + funct7
pub const R_TYPE_MASK: u32 = 0xFE00_707F;
/// opcode + funct3（I/S/B 型共用）
pub const F3_MASK: u32 = 0x0000_707F;
/// 仅 opcode（U/J 型）
pub const OPCODE_MASK: u32 = 0x0000_007F;
/// opcode + funct3 + imm[11:5]（RV32 移位立即数）
pub const SHIFT_IMM_MASK: u32 = 0xFE00_707F;
/// 全字精确匹配
pub const EXACT_MASK: u32 = 0xFFFF_FFFF;

#[inline]
pub const fn r_match(funct7: u32, funct3: u32, opcode: u32) -> u32 {
    (funct7 << 25) | (funct3 << 12) | opcode
}

#[inline]
pub const fn f3_match(funct3: u32, opcode: u32) -> u32 {
    (funct3 << 12) | opcode
}

// ========== 字段组合 ==========

#[inline]
pub(crate) fn r_fields(raw: u32) -> (u8, u8, u8) {
    (rd(raw), rs1(raw), rs2(raw))
}

#[inline]
pub(crate) fn i_fields(raw: u32) -> (u8, u8, i32) {
    (rd(raw), rs1(raw), imm_i(raw))
}

#[inline]
pub(crate) fn s_fields(raw: u32) -> (u8, u8, i32) {
    (rs1(raw), rs2(raw), imm_s(raw))
}

#[inline]
pub(crate) fn b_fields(raw: u32) -> (u8, u8, i32) {
    (rs1(raw), rs2(raw), imm_b(raw))
}

// ========== 表驱动解码器 ==========

/// 以 `InstrDef` 表为后端的解码器
#[derive(Clone, Copy)]
pub struct TableDrivenDecoder {
    name: &'static str,
    instrs: &'static [InstrDef],
    opcodes: &'static [u32],
}

impl TableDrivenDecoder {
    pub const fn new(
        name: &'static str,
        instrs: &'static [InstrDef],
        opcodes: &'static [u32],
    ) -> Self {
        Self {
            name,
            instrs,
            opcodes,
        }
    }

    pub fn instrs(&self) -> &'static [InstrDef] {
        self.instrs
    }
}

impl InstrDecoder for TableDrivenDecoder {
    fn name(&self) -> &str {
        self.name
    }

    fn decode(&self, raw: u32) -> Option<DecodedInstr> {
        self.instrs
            .iter()
            .find(|def| def.matches(raw))
            .map(|def| DecodedInstr {
                raw,
                instr: (def.decode)(raw),
            })
    }

    fn handled_opcodes(&self) -> &[u32] {
        self.opcodes
    }
}
