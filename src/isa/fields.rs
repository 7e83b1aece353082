//! 指令字段提取
//!
//! 立即数均在此处完成符号扩展，执行阶段只看到最终数值。

#[inline]
pub fn opcode(raw: u32) -> u32 {
    raw & 0x7F
}

#[inline]
pub fn rd(raw: u32) -> u8 {
    ((raw >> 7) & 0x1F) as u8
}

#[inline]
pub fn funct3(raw: u32) -> u32 {
    (raw >> 12) & 0x7
}

#[inline]
pub fn rs1(raw: u32) -> u8 {
    ((raw >> 15) & 0x1F) as u8
}

#[inline]
pub fn rs2(raw: u32) -> u8 {
    ((raw >> 20) & 0x1F) as u8
}

/// I-type: imm[11:0] = raw[31:20]
#[inline]
pub fn imm_i(raw: u32) -> i32 {
    (raw as i32) >> 20
}

/// S-type: imm[11:5] = raw[31:25], imm[4:0] = raw[11:7]
#[inline]
pub fn imm_s(raw: u32) -> i32 {
    (((raw & 0xFE00_0000) as i32) >> 20) | ((raw >> 7) & 0x1F) as i32
}

/// B-type: imm[12|10:5|4:1|11] = raw[31|30:25|11:8|7]
#[inline]
pub fn imm_b(raw: u32) -> i32 {
    let hi = ((raw & 0x8000_0000) as i32) >> 19; // imm[12] 及符号位
    let bit11 = ((raw & 0x80) << 4) as i32;
    let mid = ((raw >> 20) & 0x7E0) as i32;
    let lo = ((raw >> 7) & 0x1E) as i32;
    hi | bit11 | mid | lo
}

/// U-type: imm[31:12] = raw[31:12]
#[inline]
pub fn imm_u(raw: u32) -> u32 {
    raw & 0xFFFF_F000
}

/// J-type: imm[20|10:1|11|19:12] = raw[31|30:21|20|19:12]
#[inline]
pub fn imm_j(raw: u32) -> i32 {
    let hi = ((raw & 0x8000_0000) as i32) >> 11; // imm[20] 及符号位
    let bits_19_12 = (raw & 0x000F_F000) as i32;
    let bit11 = ((raw >> 9) & 0x800) as i32;
    let bits_10_1 = ((raw >> 20) & 0x7FE) as i32;
    hi | bits_19_12 | bit11 | bits_10_1
}

#[inline]
pub fn shamt(raw: u32) -> u8 {
    ((raw >> 20) & 0x1F) as u8
}

#[inline]
pub fn csr_addr(raw: u32) -> u16 {
    ((raw >> 20) & 0xFFF) as u16
}

// ========== Opcode 常量 ==========
pub const OP_LUI: u32 = 0b0110111;
pub const OP_AUIPC: u32 = 0b0010111;
pub const OP_JAL: u32 = 0b1101111;
pub const OP_JALR: u32 = 0b1100111;
pub const OP_BRANCH: u32 = 0b1100011;
pub const OP_LOAD: u32 = 0b0000011;
pub const OP_STORE: u32 = 0b0100011;
pub const OP_IMM: u32 = 0b0010011;
pub const OP_REG: u32 = 0b0110011;
pub const OP_SYSTEM: u32 = 0b1110011;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_imm_b_negative() {
        let raw = 0xFE314CE3; // blt sp, gp, -8
        assert_eq!(imm_b(raw), -8);
    }

    #[test]
    fn test_imm_j_positive() {
        let raw = 0x0040006F; // jal zero, 4
        assert_eq!(imm_j(raw), 4);
    }

    #[test]
    fn test_imm_j_negative() {
        let raw = 0xFFDFF0EF; // jal ra, -4
        assert_eq!(imm_j(raw), -4);
    }

    #[test]
    fn test_imm_s_negative() {
        let raw = 0xFE112E23; // sw ra, -4(sp)
        assert_eq!(imm_s(raw), -4);
    }
}
