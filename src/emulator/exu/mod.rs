//! 分 ISA 的执行单元
//!
//! 每个单元返回 `None` 表示该指令不归它处理。

pub mod rv32i;
pub mod system;
pub mod zicsr;

/// 一条指令退休时产生的寄存器写回
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Retire {
    Write { rd: u8, value: u32 },
    NoWrite,
}
