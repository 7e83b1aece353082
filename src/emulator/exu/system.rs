//! 系统指令执行单元：ECALL、EBREAK 与 xRET

use super::super::{EmuError, EmuResult, ReferenceEmulator, RvEmu};
use super::Retire;
use crate::isa::{CSR_MCAUSE, CSR_MEPC, CSR_MTVAL, RvInstr};

/// mcause 中的 environment call 原因码
pub const CAUSE_ECALL: u32 = 0xb;

/// 执行系统指令。不是系统指令时返回 `Ok(None)`。
pub fn execute(emu: &mut RvEmu, instr: RvInstr, inst_pc: u32) -> EmuResult<Option<Retire>> {
    match instr {
        // mepc 记录步进后的 PC，trap handler 返回时直接落到下一条指令
        RvInstr::Ecall => {
            let handler = emu.csr_read(CSR_MTVAL, inst_pc)?;
            emu.csr_write(CSR_MEPC, emu.pc(), inst_pc)?;
            emu.csr_write(CSR_MCAUSE, CAUSE_ECALL, inst_pc)?;
            emu.set_pc(handler);
            Ok(Some(Retire::NoWrite))
        }
        RvInstr::Ebreak => Err(EmuError::Breakpoint { pc: inst_pc }),
        // 返回地址照常恢复，但一次 trap 返回即结束本次运行
        RvInstr::Uret | RvInstr::Sret | RvInstr::Mret => {
            let target = emu.csr_read(CSR_MEPC, inst_pc)?;
            emu.set_pc(target);
            Err(EmuError::TrapReturn { pc: inst_pc, target })
        }
        _ => Ok(None),
    }
}
