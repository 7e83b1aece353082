//! RV32I 基础指令集（不含 FENCE 与 ECALL/EBREAK）

use crate::isa::fields::*;
use crate::isa::instr::RvInstr;
use crate::isa::instr_def::{
    b_fields, f3_match, i_fields, r_fields, r_match, s_fields, InstrDef, TableDrivenDecoder,
    F3_MASK, OPCODE_MASK, R_TYPE_MASK, SHIFT_IMM_MASK,
};

macro_rules! r_type {
    ($name:literal, $f7:expr, $f3:expr, $variant:ident) => {
        InstrDef::new($name, R_TYPE_MASK, r_match($f7, $f3, OP_REG), |raw| {
            let (rd, rs1, rs2) = r_fields(raw);
            RvInstr::$variant { rd, rs1, rs2 }
        })
    };
}

macro_rules! i_alu {
    ($name:literal, $f3:expr, $variant:ident) => {
        InstrDef::new($name, F3_MASK, f3_match($f3, OP_IMM), |raw| {
            let (rd, rs1, imm) = i_fields(raw);
            RvInstr::$variant { rd, rs1, imm }
        })
    };
}

macro_rules! shift_imm {
    ($name:literal, $f7:expr, $f3:expr, $variant:ident) => {
        InstrDef::new($name, SHIFT_IMM_MASK, r_match($f7, $f3, OP_IMM), |raw| {
            RvInstr::$variant {
                rd: rd(raw),
                rs1: rs1(raw),
                shamt: shamt(raw),
            }
        })
    };
}

macro_rules! load {
    ($name:literal, $f3:expr, $variant:ident) => {
        InstrDef::new($name, F3_MASK, f3_match($f3, OP_LOAD), |raw| {
            let (rd, rs1, offset) = i_fields(raw);
            RvInstr::$variant { rd, rs1, offset }
        })
    };
}

macro_rules! store {
    ($name:literal, $f3:expr, $variant:ident) => {
        InstrDef::new($name, F3_MASK, f3_match($f3, OP_STORE), |raw| {
            let (rs1, rs2, offset) = s_fields(raw);
            RvInstr::$variant { rs1, rs2, offset }
        })
    };
}

macro_rules! branch {
    ($name:literal, $f3:expr, $variant:ident) => {
        InstrDef::new($name, F3_MASK, f3_match($f3, OP_BRANCH), |raw| {
            let (rs1, rs2, offset) = b_fields(raw);
            RvInstr::$variant { rs1, rs2, offset }
        })
    };
}

/// RV32I 指令定义表
pub static RV32I_INSTRS: &[InstrDef] = &[
    // ========== U/J-type ==========
    InstrDef::new("LUI", OPCODE_MASK, OP_LUI, |raw| RvInstr::Lui {
        rd: rd(raw),
        imm: imm_u(raw),
    }),
    InstrDef::new("AUIPC", OPCODE_MASK, OP_AUIPC, |raw| RvInstr::Auipc {
        rd: rd(raw),
        imm: imm_u(raw),
    }),
    InstrDef::new("JAL", OPCODE_MASK, OP_JAL, |raw| RvInstr::Jal {
        rd: rd(raw),
        offset: imm_j(raw),
    }),
    InstrDef::new("JALR", F3_MASK, f3_match(0b000, OP_JALR), |raw| {
        let (rd, rs1, offset) = i_fields(raw);
        RvInstr::Jalr { rd, rs1, offset }
    }),
    // ========== 分支 ==========
    branch!("BEQ", 0b000, Beq),
    branch!("BNE", 0b001, Bne),
    branch!("BLT", 0b100, Blt),
    branch!("BGE", 0b101, Bge),
    branch!("BLTU", 0b110, Bltu),
    branch!("BGEU", 0b111, Bgeu),
    // ========== 访存 ==========
    load!("LB", 0b000, Lb),
    load!("LH", 0b001, Lh),
    load!("LW", 0b010, Lw),
    load!("LBU", 0b100, Lbu),
    load!("LHU", 0b101, Lhu),
    store!("SB", 0b000, Sb),
    store!("SH", 0b001, Sh),
    store!("SW", 0b010, Sw),
    // ========== 立即数运算 ==========
    i_alu!("ADDI", 0b000, Addi),
    i_alu!("SLTI", 0b010, Slti),
    i_alu!("SLTIU", 0b011, Sltiu),
    i_alu!("XORI", 0b100, Xori),
    i_alu!("ORI", 0b110, Ori),
    i_alu!("ANDI", 0b111, Andi),
    shift_imm!("SLLI", 0b0000000, 0b001, Slli),
    shift_imm!("SRLI", 0b0000000, 0b101, Srli),
    shift_imm!("SRAI", 0b0100000, 0b101, Srai),
    // ========== 寄存器运算 ==========
    r_type!("ADD", 0b0000000, 0b000, Add),
    r_type!("SUB", 0b0100000, 0b000, Sub),
    r_type!("SLL", 0b0000000, 0b001, Sll),
    r_type!("SLT", 0b0000000, 0b010, Slt),
    r_type!("SLTU", 0b0000000, 0b011, Sltu),
    r_type!("XOR", 0b0000000, 0b100, Xor),
    r_type!("SRL", 0b0000000, 0b101, Srl),
    r_type!("SRA", 0b0100000, 0b101, Sra),
    r_type!("OR", 0b0000000, 0b110, Or),
    r_type!("AND", 0b0000000, 0b111, And),
];

/// RV32I 涉及的 opcode
pub static RV32I_OPCODES: [u32; 9] = [
    OP_LUI, OP_AUIPC, OP_JAL, OP_JALR, OP_BRANCH, OP_LOAD, OP_STORE, OP_IMM, OP_REG,
];

pub static RV32I_DECODER: TableDrivenDecoder =
    TableDrivenDecoder::new("RV32I", RV32I_INSTRS, &RV32I_OPCODES);
