//! 参考模拟器
//!
//! `ReferenceEmulator` 是锁步驱动看到的全部接口；`RvEmu` 是其 RV32I + Zicsr
//! 实现，包含指令 ROM、数据存储窗口、两个 MMIO 寄存器以及四个机器态 CSR。
//!
//! 调用约定：驱动先 `fetch`，再 `step_pc`，最后 `execute`。因此执行时
//! 架构 PC 已经越过当前指令，PC 相对语义一律以 `pc - 4` 为基准。

use std::fmt::Write as _;

use thiserror::Error;

use crate::isa::{self, ABI, CSR_MTVAL, DecodedInstr, RvInstr};
use crate::memory::{DataBus, ImageRom, MemError};
use crate::writeback::WritebackRecord;

mod builder;
mod exu;
pub mod ffi;
mod status;

pub use builder::{DEFAULT_KERNEL_BASE, DEFAULT_MEMORY_SIZE, RvEmuBuilder};
pub use exu::system::CAUSE_ECALL;
pub use status::{CsrEntry, MACHINE_CSRS};

use exu::Retire;
use status::Status;

/// 模拟器错误，同时也是运行终止的原因
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EmuError {
    #[error("instruction fetch failed: {0}")]
    Fetch(#[source] MemError),

    #[error("data access at pc 0x{pc:08x} failed: {source}")]
    Memory {
        pc: u32,
        #[source]
        source: MemError,
    },

    #[error("illegal or unsupported instruction 0x{raw:08x} at pc 0x{pc:08x}")]
    Illegal { pc: u32, raw: u32 },

    #[error("unsupported csr 0x{csr:03x} at pc 0x{pc:08x}")]
    UnsupportedCsr { pc: u32, csr: u16 },

    #[error("breakpoint at pc 0x{pc:08x}")]
    Breakpoint { pc: u32 },

    #[error("trap return at pc 0x{pc:08x} (mepc = 0x{target:08x})")]
    TrapReturn { pc: u32, target: u32 },

    #[error("invalid memory layout: {0}")]
    Layout(String),
}

pub type EmuResult<T> = Result<T, EmuError>;

/// 锁步驱动使用的参考模拟器接口
pub trait ReferenceEmulator {
    /// 当前 PC 处的指令字，无副作用
    fn fetch(&self) -> EmuResult<u32>;

    /// PC 前进到下一条顺序指令
    fn step_pc(&mut self);

    /// 执行一条指令并返回其写回记录
    ///
    /// 出错（包括程序的有意终止）时返回 `WritebackRecord::terminated()`。
    fn execute(&mut self, raw: u32) -> WritebackRecord;

    fn pc(&self) -> u32;

    /// 寄存器与 CSR 的文本快照
    fn dump(&self) -> String;
}

/// RV32I + Zicsr 参考模拟器
pub struct RvEmu {
    status: Status,
    pc: u32,
    irom: ImageRom,
    bus: DataBus,
    stop: Option<EmuError>,
}

impl RvEmu {
    /// 按给定镜像和数据窗口创建模拟器，MMIO 使用默认地址
    ///
    /// ```
    /// use rvcosim::emulator::{ReferenceEmulator, RvEmu};
    ///
    /// let user = 0x00700293u32.to_le_bytes(); // addi t0, zero, 7
    /// let emu = RvEmu::new(&user, 0, &[], 0x1c09_0000, 0, 0x1000).unwrap();
    /// assert_eq!(emu.pc(), 0);
    /// assert_eq!(emu.read_reg(2), 0x1000);
    /// ```
    pub fn new(
        user: &[u8],
        user_base: u32,
        kernel: &[u8],
        kernel_base: u32,
        memory_base: u32,
        memory_size: u32,
    ) -> EmuResult<Self> {
        RvEmuBuilder::new()
            .with_user(user.to_vec(), user_base)
            .with_kernel(kernel.to_vec(), kernel_base)
            .with_memory(memory_base, memory_size)
            .build()
    }

    /// 按配置加载镜像并构建
    pub fn from_config(config: &crate::config::EmulatorConfig) -> crate::error::Result<Self> {
        Ok(RvEmuBuilder::from_config(config)?.build()?)
    }

    pub(crate) fn from_parts(
        irom: ImageRom,
        bus: DataBus,
        entry_pc: u32,
        kernel_base: u32,
    ) -> Self {
        let mut status = Status::new();
        let dram = bus.dram();
        let stack_top = dram.base_addr().wrapping_add(dram.size() as u32);
        status.int.write(2, stack_top);
        // trap handler 入口放在 mtval，ECALL 从这里取跳转目标
        status.csr.write(CSR_MTVAL, kernel_base);
        Self {
            status,
            pc: entry_pc,
            irom,
            bus,
            stop: None,
        }
    }

    pub fn read_reg(&self, reg: u8) -> u32 {
        self.status.int.read(reg)
    }

    pub fn set_pc(&mut self, pc: u32) {
        self.pc = pc;
    }

    /// 读取 CSR，未实现时返回 `None`
    pub fn csr(&self, csr: u16) -> Option<u32> {
        self.status.csr.read(csr)
    }

    /// 最近一次终止运行的原因
    pub fn stop_reason(&self) -> Option<&EmuError> {
        self.stop.as_ref()
    }

    /// 最近一次写入数码管 MMIO 的值
    pub fn last_dig(&self) -> Option<u32> {
        self.bus.last_dig()
    }

    pub(crate) fn csr_read(&self, csr: u16, pc: u32) -> EmuResult<u32> {
        self.status
            .csr
            .read(csr)
            .ok_or(EmuError::UnsupportedCsr { pc, csr })
    }

    pub(crate) fn csr_write(&mut self, csr: u16, value: u32, pc: u32) -> EmuResult<()> {
        self.status
            .csr
            .write(csr, value)
            .ok_or(EmuError::UnsupportedCsr { pc, csr })
    }

    /// 委托到分 ISA 的执行单元
    fn dispatch(&mut self, decoded: DecodedInstr, inst_pc: u32) -> EmuResult<Retire> {
        let instr = decoded.instr;

        if let Some(retire) = exu::rv32i::execute(self, instr, inst_pc)? {
            return Ok(retire);
        }
        if let Some(retire) = exu::zicsr::execute(self, instr, inst_pc)? {
            return Ok(retire);
        }
        if let Some(retire) = exu::system::execute(self, instr, inst_pc)? {
            return Ok(retire);
        }

        let raw = match instr {
            RvInstr::Illegal { raw } => raw,
            _ => decoded.raw,
        };
        Err(EmuError::Illegal { pc: inst_pc, raw })
    }
}

impl ReferenceEmulator for RvEmu {
    fn fetch(&self) -> EmuResult<u32> {
        self.irom.fetch(self.pc).map_err(EmuError::Fetch)
    }

    fn step_pc(&mut self) {
        self.pc = self.pc.wrapping_add(4);
    }

    fn execute(&mut self, raw: u32) -> WritebackRecord {
        let inst_pc = self.pc.wrapping_sub(4);
        let decoded = isa::decode(raw);

        match self.dispatch(decoded, inst_pc) {
            Ok(Retire::Write { rd, value }) => {
                self.status.int.write(rd, value);
                WritebackRecord::retired(inst_pc, rd, value)
            }
            Ok(Retire::NoWrite) => WritebackRecord::retired_no_write(inst_pc),
            Err(err) => {
                log::debug!("reference emulator stopped: {err}");
                self.stop = Some(err);
                WritebackRecord::terminated()
            }
        }
    }

    fn pc(&self) -> u32 {
        self.pc
    }

    fn dump(&self) -> String {
        let mut out = String::new();
        let csrs: Vec<String> = self
            .status
            .csr
            .iter()
            .map(|(addr, name, value)| match name {
                Some(name) => format!("{name}={value:#x}"),
                None => format!("csr[{addr:#05x}]={value:#x}"),
            })
            .collect();
        out.push_str(&csrs.join("\t"));

        let regs = self.status.int.snapshot();
        for row in (0..32).step_by(4) {
            out.push('\n');
            for i in row..row + 4 {
                let _ = write!(out, " x{:02}({:>4})={:#010x}", i, ABI[i], regs[i]);
            }
        }
        let _ = write!(out, "\npc = {:#x}", self.pc);
        out
    }
}
