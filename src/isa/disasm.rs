//! 反汇编：将指令格式化为带 ABI 寄存器名的汇编文本

use std::fmt;

use super::instr::RvInstr;
use super::zicsr::csr_name;

/// 通用寄存器 ABI 名称
pub const ABI: [&str; 32] = [
    "zero", "ra", "sp", "gp", "tp", "t0", "t1", "t2", "s0", "s1", "a0", "a1", "a2", "a3", "a4",
    "a5", "a6", "a7", "s2", "s3", "s4", "s5", "s6", "s7", "s8", "s9", "s10", "s11", "t3", "t4",
    "t5", "t6",
];

/// 寄存器编号转 ABI 名称
pub fn reg_name(reg: u8) -> &'static str {
    ABI[(reg & 0x1F) as usize]
}

struct Csr(u16);

impl fmt::Display for Csr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match csr_name(self.0) {
            Some(name) => f.write_str(name),
            None => write!(f, "{:#x}", self.0),
        }
    }
}

impl fmt::Display for RvInstr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use RvInstr::*;
        let r = reg_name;
        match *self {
            Add { rd, rs1, rs2 } => write!(f, "add {}, {}, {}", r(rd), r(rs1), r(rs2)),
            Sub { rd, rs1, rs2 } => write!(f, "sub {}, {}, {}", r(rd), r(rs1), r(rs2)),
            Sll { rd, rs1, rs2 } => write!(f, "sll {}, {}, {}", r(rd), r(rs1), r(rs2)),
            Slt { rd, rs1, rs2 } => write!(f, "slt {}, {}, {}", r(rd), r(rs1), r(rs2)),
            Sltu { rd, rs1, rs2 } => write!(f, "sltu {}, {}, {}", r(rd), r(rs1), r(rs2)),
            Xor { rd, rs1, rs2 } => write!(f, "xor {}, {}, {}", r(rd), r(rs1), r(rs2)),
            Srl { rd, rs1, rs2 } => write!(f, "srl {}, {}, {}", r(rd), r(rs1), r(rs2)),
            Sra { rd, rs1, rs2 } => write!(f, "sra {}, {}, {}", r(rd), r(rs1), r(rs2)),
            Or { rd, rs1, rs2 } => write!(f, "or {}, {}, {}", r(rd), r(rs1), r(rs2)),
            And { rd, rs1, rs2 } => write!(f, "and {}, {}, {}", r(rd), r(rs1), r(rs2)),

            Addi { rd, rs1, imm } => write!(f, "addi {}, {}, {}", r(rd), r(rs1), imm),
            Slti { rd, rs1, imm } => write!(f, "slti {}, {}, {}", r(rd), r(rs1), imm),
            Sltiu { rd, rs1, imm } => write!(f, "sltiu {}, {}, {}", r(rd), r(rs1), imm),
            Xori { rd, rs1, imm } => write!(f, "xori {}, {}, {}", r(rd), r(rs1), imm),
            Ori { rd, rs1, imm } => write!(f, "ori {}, {}, {}", r(rd), r(rs1), imm),
            Andi { rd, rs1, imm } => write!(f, "andi {}, {}, {}", r(rd), r(rs1), imm),
            Slli { rd, rs1, shamt } => write!(f, "slli {}, {}, {}", r(rd), r(rs1), shamt),
            Srli { rd, rs1, shamt } => write!(f, "srli {}, {}, {}", r(rd), r(rs1), shamt),
            Srai { rd, rs1, shamt } => write!(f, "srai {}, {}, {}", r(rd), r(rs1), shamt),

            Lb { rd, rs1, offset } => write!(f, "lb {}, {}({})", r(rd), offset, r(rs1)),
            Lh { rd, rs1, offset } => write!(f, "lh {}, {}({})", r(rd), offset, r(rs1)),
            Lw { rd, rs1, offset } => write!(f, "lw {}, {}({})", r(rd), offset, r(rs1)),
            Lbu { rd, rs1, offset } => write!(f, "lbu {}, {}({})", r(rd), offset, r(rs1)),
            Lhu { rd, rs1, offset } => write!(f, "lhu {}, {}({})", r(rd), offset, r(rs1)),
            Sb { rs1, rs2, offset } => write!(f, "sb {}, {}({})", r(rs2), offset, r(rs1)),
            Sh { rs1, rs2, offset } => write!(f, "sh {}, {}({})", r(rs2), offset, r(rs1)),
            Sw { rs1, rs2, offset } => write!(f, "sw {}, {}({})", r(rs2), offset, r(rs1)),

            Jal { rd, offset } => write!(f, "jal {}, {}", r(rd), offset),
            Jalr { rd, rs1, offset } => write!(f, "jalr {}, {}({})", r(rd), offset, r(rs1)),
            Beq { rs1, rs2, offset } => write!(f, "beq {}, {}, {}", r(rs1), r(rs2), offset),
            Bne { rs1, rs2, offset } => write!(f, "bne {}, {}, {}", r(rs1), r(rs2), offset),
            Blt { rs1, rs2, offset } => write!(f, "blt {}, {}, {}", r(rs1), r(rs2), offset),
            Bge { rs1, rs2, offset } => write!(f, "bge {}, {}, {}", r(rs1), r(rs2), offset),
            Bltu { rs1, rs2, offset } => write!(f, "bltu {}, {}, {}", r(rs1), r(rs2), offset),
            Bgeu { rs1, rs2, offset } => write!(f, "bgeu {}, {}, {}", r(rs1), r(rs2), offset),

            Lui { rd, imm } => write!(f, "lui {}, {:#x}", r(rd), imm >> 12),
            Auipc { rd, imm } => write!(f, "auipc {}, {:#x}", r(rd), imm >> 12),

            Csrrw { rd, rs1, csr } => write!(f, "csrrw {}, {}, {}", r(rd), Csr(csr), r(rs1)),
            Csrrs { rd, rs1, csr } => write!(f, "csrrs {}, {}, {}", r(rd), Csr(csr), r(rs1)),
            Csrrc { rd, rs1, csr } => write!(f, "csrrc {}, {}, {}", r(rd), Csr(csr), r(rs1)),
            Csrrwi { rd, zimm, csr } => write!(f, "csrrwi {}, {}, {}", r(rd), Csr(csr), zimm),
            Csrrsi { rd, zimm, csr } => write!(f, "csrrsi {}, {}, {}", r(rd), Csr(csr), zimm),
            Csrrci { rd, zimm, csr } => write!(f, "csrrci {}, {}, {}", r(rd), Csr(csr), zimm),

            Ecall => f.write_str("ecall"),
            Ebreak => f.write_str("ebreak"),
            Uret => f.write_str("uret"),
            Sret => f.write_str("sret"),
            Mret => f.write_str("mret"),
            Illegal { raw } => write!(f, "unknown {:#010x}", raw),
        }
    }
}

/// 反汇编一条指令字
///
/// ```
/// assert_eq!(rvcosim::isa::disasm(0x00700293), "addi t0, zero, 7");
/// ```
pub fn disasm(raw: u32) -> String {
    super::decode(raw).instr.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disasm_basic() {
        assert_eq!(disasm(0x002081B3), "add gp, ra, sp");
        assert_eq!(disasm(0x00412083), "lw ra, 4(sp)");
        assert_eq!(disasm(0x00112423), "sw ra, 8(sp)");
        assert_eq!(disasm(0xFE314CE3), "blt sp, gp, -8");
        assert_eq!(disasm(0x000012B7), "lui t0, 0x1");
    }

    #[test]
    fn test_disasm_system() {
        assert_eq!(disasm(0x00000073), "ecall");
        assert_eq!(disasm(0x30200073), "mret");
        assert_eq!(disasm(0x341022F3), "csrrs t0, mepc, zero");
        assert_eq!(disasm(0x7C0022F3), "csrrs t0, 0x7c0, zero");
    }

    #[test]
    fn test_disasm_never_panics() {
        assert_eq!(disasm(0xFFFF_FFFF), "unknown 0xffffffff");
        assert_eq!(disasm(0), "unknown 0x00000000");
    }
}
