//! RISC-V 指令解码与反汇编
//!
//! - `RvInstr`: 指令语义表示
//! - `InstrDef` / `TableDrivenDecoder`: 表驱动解码
//! - `DecoderRegistry`: 按 opcode 分桶的解码器注册表
//! - `disasm`: 反汇编，供日志使用

mod decoder;
mod disasm;
mod fields;
mod instr;
pub(crate) mod instr_def;
mod rv32i;
mod system;
mod zicsr;

use std::sync::LazyLock;

pub use decoder::{DecoderRegistry, InstrDecoder, RegistryConflict};
pub use disasm::{disasm, reg_name, ABI};
pub use instr::{DecodedInstr, RvInstr};
pub use instr_def::{InstrDef, TableDrivenDecoder};
pub use rv32i::{RV32I_DECODER, RV32I_INSTRS};
pub use system::{
    SYSTEM_DECODER, ECALL_ENCODING, EBREAK_ENCODING, MRET_ENCODING, SRET_ENCODING, URET_ENCODING,
};
pub use zicsr::{csr_name, ZICSR_DECODER, CSR_MCAUSE, CSR_MEPC, CSR_MSTATUS, CSR_MTVAL};

static STANDARD: LazyLock<DecoderRegistry> = LazyLock::new(DecoderRegistry::standard);

/// 使用标准解码器组合解码
pub fn decode(raw: u32) -> DecodedInstr {
    STANDARD.decode(raw)
}

#[cfg(test)]
mod tests;
