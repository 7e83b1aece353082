//! Zicsr 扩展执行单元
//!
//! 读-改-写一律执行：rd 为 x0 时仍读 CSR，rs1 为 x0 或 zimm 为 0 时仍写 CSR。
//! 访问未实现的 CSR 直接报错。

use super::super::{EmuResult, RvEmu};
use super::Retire;
use crate::isa::RvInstr;

/// 执行 Zicsr 指令。不是 Zicsr 指令时返回 `Ok(None)`。
pub fn execute(emu: &mut RvEmu, instr: RvInstr, inst_pc: u32) -> EmuResult<Option<Retire>> {
    match instr {
        // CSRRW: t = CSR[csr]; CSR[csr] = rs1; rd = t
        RvInstr::Csrrw { rd, rs1, csr } => {
            let src = emu.read_reg(rs1);
            read_modify_write(emu, inst_pc, rd, csr, |_| src)
        }
        // CSRRS: t = CSR[csr]; CSR[csr] = t | rs1; rd = t
        RvInstr::Csrrs { rd, rs1, csr } => {
            let src = emu.read_reg(rs1);
            read_modify_write(emu, inst_pc, rd, csr, |old| old | src)
        }
        // CSRRC: t = CSR[csr]; CSR[csr] = t & ~rs1; rd = t
        RvInstr::Csrrc { rd, rs1, csr } => {
            let src = emu.read_reg(rs1);
            read_modify_write(emu, inst_pc, rd, csr, |old| old & !src)
        }
        RvInstr::Csrrwi { rd, zimm, csr } => {
            read_modify_write(emu, inst_pc, rd, csr, |_| zimm as u32)
        }
        RvInstr::Csrrsi { rd, zimm, csr } => {
            read_modify_write(emu, inst_pc, rd, csr, |old| old | zimm as u32)
        }
        RvInstr::Csrrci { rd, zimm, csr } => {
            read_modify_write(emu, inst_pc, rd, csr, |old| old & !(zimm as u32))
        }
        _ => Ok(None),
    }
}

fn read_modify_write(
    emu: &mut RvEmu,
    inst_pc: u32,
    rd: u8,
    csr: u16,
    update: impl FnOnce(u32) -> u32,
) -> EmuResult<Option<Retire>> {
    let old = emu.csr_read(csr, inst_pc)?;
    emu.csr_write(csr, update(old), inst_pc)?;
    Ok(Some(Retire::Write { rd, value: old }))
}
