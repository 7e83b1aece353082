//! 已解码指令的语义表示

/// 参考模拟器支持的指令
///
/// 覆盖 RV32I（不含 FENCE）、Zicsr 以及 ECALL/EBREAK/xRET。
/// 解码阶段完成字段提取与符号扩展，执行阶段直接使用。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RvInstr {
    // ========== R-type ==========
    Add { rd: u8, rs1: u8, rs2: u8 },
    Sub { rd: u8, rs1: u8, rs2: u8 },
    Sll { rd: u8, rs1: u8, rs2: u8 },
    Slt { rd: u8, rs1: u8, rs2: u8 },
    Sltu { rd: u8, rs1: u8, rs2: u8 },
    Xor { rd: u8, rs1: u8, rs2: u8 },
    Srl { rd: u8, rs1: u8, rs2: u8 },
    Sra { rd: u8, rs1: u8, rs2: u8 },
    Or { rd: u8, rs1: u8, rs2: u8 },
    And { rd: u8, rs1: u8, rs2: u8 },

    // ========== I-type ALU ==========
    Addi { rd: u8, rs1: u8, imm: i32 },
    Slti { rd: u8, rs1: u8, imm: i32 },
    Sltiu { rd: u8, rs1: u8, imm: i32 },
    Xori { rd: u8, rs1: u8, imm: i32 },
    Ori { rd: u8, rs1: u8, imm: i32 },
    Andi { rd: u8, rs1: u8, imm: i32 },
    Slli { rd: u8, rs1: u8, shamt: u8 },
    Srli { rd: u8, rs1: u8, shamt: u8 },
    Srai { rd: u8, rs1: u8, shamt: u8 },

    // ========== Load / Store ==========
    Lb { rd: u8, rs1: u8, offset: i32 },
    Lh { rd: u8, rs1: u8, offset: i32 },
    Lw { rd: u8, rs1: u8, offset: i32 },
    Lbu { rd: u8, rs1: u8, offset: i32 },
    Lhu { rd: u8, rs1: u8, offset: i32 },
    Sb { rs1: u8, rs2: u8, offset: i32 },
    Sh { rs1: u8, rs2: u8, offset: i32 },
    Sw { rs1: u8, rs2: u8, offset: i32 },

    // ========== 控制流 ==========
    Jal { rd: u8, offset: i32 },
    Jalr { rd: u8, rs1: u8, offset: i32 },
    Beq { rs1: u8, rs2: u8, offset: i32 },
    Bne { rs1: u8, rs2: u8, offset: i32 },
    Blt { rs1: u8, rs2: u8, offset: i32 },
    Bge { rs1: u8, rs2: u8, offset: i32 },
    Bltu { rs1: u8, rs2: u8, offset: i32 },
    Bgeu { rs1: u8, rs2: u8, offset: i32 },

    // ========== U-type ==========
    /// `imm` 为已左移 12 位的值
    Lui { rd: u8, imm: u32 },
    Auipc { rd: u8, imm: u32 },

    // ========== Zicsr ==========
    Csrrw { rd: u8, rs1: u8, csr: u16 },
    Csrrs { rd: u8, rs1: u8, csr: u16 },
    Csrrc { rd: u8, rs1: u8, csr: u16 },
    Csrrwi { rd: u8, zimm: u8, csr: u16 },
    Csrrsi { rd: u8, zimm: u8, csr: u16 },
    Csrrci { rd: u8, zimm: u8, csr: u16 },

    // ========== 系统 ==========
    Ecall,
    Ebreak,
    Uret,
    Sret,
    Mret,

    /// 无法解码的指令字
    Illegal { raw: u32 },
}

impl RvInstr {
    /// 是否为 trap 返回指令（uret/sret/mret）
    pub fn is_xret(&self) -> bool {
        matches!(self, RvInstr::Uret | RvInstr::Sret | RvInstr::Mret)
    }
}

/// 原始编码与解码结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedInstr {
    pub raw: u32,
    pub instr: RvInstr,
}
