use super::super::{EmuError, EmuResult, ReferenceEmulator, RvEmu};
use super::Retire;
use crate::isa::RvInstr;
use crate::memory::{MemError, Memory};

/// Execute RV32I-base instructions. `Ok(None)` if the instruction is not RV32I.
///
/// `inst_pc` is the address of the instruction; the emulator PC has already
/// been stepped past it.
pub fn execute(emu: &mut RvEmu, instr: RvInstr, inst_pc: u32) -> EmuResult<Option<Retire>> {
    let data_err = |source: MemError| EmuError::Memory { pc: inst_pc, source };
    let write = |rd: u8, value: u32| -> EmuResult<Option<Retire>> {
        Ok(Some(Retire::Write { rd, value }))
    };

    match instr {
        // ========== R-type 算术/逻辑指令 ==========
        RvInstr::Add { rd, rs1, rs2 } => {
            write(rd, emu.read_reg(rs1).wrapping_add(emu.read_reg(rs2)))
        }
        RvInstr::Sub { rd, rs1, rs2 } => {
            write(rd, emu.read_reg(rs1).wrapping_sub(emu.read_reg(rs2)))
        }
        RvInstr::And { rd, rs1, rs2 } => write(rd, emu.read_reg(rs1) & emu.read_reg(rs2)),
        RvInstr::Or { rd, rs1, rs2 } => write(rd, emu.read_reg(rs1) | emu.read_reg(rs2)),
        RvInstr::Xor { rd, rs1, rs2 } => write(rd, emu.read_reg(rs1) ^ emu.read_reg(rs2)),
        RvInstr::Slt { rd, rs1, rs2 } => {
            let result = (emu.read_reg(rs1) as i32) < (emu.read_reg(rs2) as i32);
            write(rd, result as u32)
        }
        RvInstr::Sltu { rd, rs1, rs2 } => write(rd, (emu.read_reg(rs1) < emu.read_reg(rs2)) as u32),
        RvInstr::Sll { rd, rs1, rs2 } => {
            let shamt = emu.read_reg(rs2) & 0x1F;
            write(rd, emu.read_reg(rs1) << shamt)
        }
        RvInstr::Srl { rd, rs1, rs2 } => {
            let shamt = emu.read_reg(rs2) & 0x1F;
            write(rd, emu.read_reg(rs1) >> shamt)
        }
        RvInstr::Sra { rd, rs1, rs2 } => {
            let shamt = emu.read_reg(rs2) & 0x1F;
            write(rd, ((emu.read_reg(rs1) as i32) >> shamt) as u32)
        }

        // ========== I-type 立即数算术/逻辑指令 ==========
        RvInstr::Addi { rd, rs1, imm } => write(rd, emu.read_reg(rs1).wrapping_add(imm as u32)),
        RvInstr::Andi { rd, rs1, imm } => write(rd, emu.read_reg(rs1) & (imm as u32)),
        RvInstr::Ori { rd, rs1, imm } => write(rd, emu.read_reg(rs1) | (imm as u32)),
        RvInstr::Xori { rd, rs1, imm } => write(rd, emu.read_reg(rs1) ^ (imm as u32)),
        RvInstr::Slti { rd, rs1, imm } => write(rd, ((emu.read_reg(rs1) as i32) < imm) as u32),
        // 立即数先符号扩展再按无符号比较
        RvInstr::Sltiu { rd, rs1, imm } => write(rd, (emu.read_reg(rs1) < imm as u32) as u32),
        RvInstr::Slli { rd, rs1, shamt } => write(rd, emu.read_reg(rs1) << shamt),
        RvInstr::Srli { rd, rs1, shamt } => write(rd, emu.read_reg(rs1) >> shamt),
        RvInstr::Srai { rd, rs1, shamt } => write(rd, ((emu.read_reg(rs1) as i32) >> shamt) as u32),

        // ========== Load 指令 ==========
        RvInstr::Lb { rd, rs1, offset } => {
            let addr = emu.read_reg(rs1).wrapping_add(offset as u32);
            let value = emu.bus.load8(addr).map_err(data_err)?;
            write(rd, value as i8 as i32 as u32)
        }
        RvInstr::Lh { rd, rs1, offset } => {
            let addr = emu.read_reg(rs1).wrapping_add(offset as u32);
            let value = emu.bus.load16(addr).map_err(data_err)?;
            write(rd, value as i16 as i32 as u32)
        }
        RvInstr::Lw { rd, rs1, offset } => {
            let addr = emu.read_reg(rs1).wrapping_add(offset as u32);
            write(rd, emu.bus.load32(addr).map_err(data_err)?)
        }
        RvInstr::Lbu { rd, rs1, offset } => {
            let addr = emu.read_reg(rs1).wrapping_add(offset as u32);
            write(rd, emu.bus.load8(addr).map_err(data_err)? as u32)
        }
        RvInstr::Lhu { rd, rs1, offset } => {
            let addr = emu.read_reg(rs1).wrapping_add(offset as u32);
            write(rd, emu.bus.load16(addr).map_err(data_err)? as u32)
        }

        // ========== Store 指令 ==========
        RvInstr::Sb { rs1, rs2, offset } => {
            let addr = emu.read_reg(rs1).wrapping_add(offset as u32);
            let value = emu.read_reg(rs2) as u8;
            emu.bus.store8(addr, value).map_err(data_err)?;
            Ok(Some(Retire::NoWrite))
        }
        RvInstr::Sh { rs1, rs2, offset } => {
            let addr = emu.read_reg(rs1).wrapping_add(offset as u32);
            let value = emu.read_reg(rs2) as u16;
            emu.bus.store16(addr, value).map_err(data_err)?;
            Ok(Some(Retire::NoWrite))
        }
        RvInstr::Sw { rs1, rs2, offset } => {
            let addr = emu.read_reg(rs1).wrapping_add(offset as u32);
            let value = emu.read_reg(rs2);
            emu.bus.store32(addr, value).map_err(data_err)?;
            Ok(Some(Retire::NoWrite))
        }

        // ========== U-type 指令 ==========
        RvInstr::Lui { rd, imm } => write(rd, imm),
        RvInstr::Auipc { rd, imm } => write(rd, inst_pc.wrapping_add(imm)),

        // ========== 控制流指令 ==========
        RvInstr::Jal { rd, offset } => {
            let link = emu.pc();
            emu.set_pc(inst_pc.wrapping_add(offset as u32));
            write(rd, link)
        }
        RvInstr::Jalr { rd, rs1, offset } => {
            let link = emu.pc();
            let target = emu.read_reg(rs1).wrapping_add(offset as u32) & !1;
            emu.set_pc(target);
            write(rd, link)
        }
        RvInstr::Beq { rs1, rs2, offset } => {
            let taken = emu.read_reg(rs1) == emu.read_reg(rs2);
            branch(emu, inst_pc, offset, taken)
        }
        RvInstr::Bne { rs1, rs2, offset } => {
            let taken = emu.read_reg(rs1) != emu.read_reg(rs2);
            branch(emu, inst_pc, offset, taken)
        }
        RvInstr::Blt { rs1, rs2, offset } => {
            let taken = (emu.read_reg(rs1) as i32) < (emu.read_reg(rs2) as i32);
            branch(emu, inst_pc, offset, taken)
        }
        RvInstr::Bge { rs1, rs2, offset } => {
            let taken = (emu.read_reg(rs1) as i32) >= (emu.read_reg(rs2) as i32);
            branch(emu, inst_pc, offset, taken)
        }
        RvInstr::Bltu { rs1, rs2, offset } => {
            let taken = emu.read_reg(rs1) < emu.read_reg(rs2);
            branch(emu, inst_pc, offset, taken)
        }
        RvInstr::Bgeu { rs1, rs2, offset } => {
            let taken = emu.read_reg(rs1) >= emu.read_reg(rs2);
            branch(emu, inst_pc, offset, taken)
        }

        _ => Ok(None),
    }
}

fn branch(emu: &mut RvEmu, inst_pc: u32, offset: i32, taken: bool) -> EmuResult<Option<Retire>> {
    if taken {
        emu.set_pc(inst_pc.wrapping_add(offset as u32));
    }
    Ok(Some(Retire::NoWrite))
}
