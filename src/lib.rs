//! rvcosim: RV32I 硬件/软件锁步协同仿真
//!
//! 以时钟周期驱动一个硬件模型，每当硬件在写回端口报告一次指令退休，
//! 就让参考模拟器执行恰好一条指令，并逐字段比较双方的写回记录。
//!
//! # 模块结构
//!
//! - `clocked`: 时钟相位、复位与波形采样
//! - `driver`: 锁步驱动与比较结果
//! - `emulator`: 参考模拟器及其 C 接口
//! - `hardware`: 硬件模型接口与行为级流水线核
//! - `isa`: RISC-V 解码与反汇编
//! - `memory`: 指令 ROM、数据存储与 MMIO
//! - `writeback`: 写回记录
//! - `config` / `image` / `trace` / `error`: 配置、镜像加载、VCD 输出与错误类型

pub mod clocked;
pub mod config;
pub mod driver;
pub mod emulator;
pub mod error;
pub mod hardware;
pub mod image;
pub mod isa;
pub mod memory;
pub mod trace;
pub mod writeback;

pub use clocked::{ClockError, ClockedModel};
pub use driver::{LockstepDriver, Outcome, RunSummary};
pub use emulator::{ReferenceEmulator, RvEmu};
pub use error::CosimError;
pub use hardware::HardwareModel;
pub use writeback::WritebackRecord;
