//! ISA 模块测试

use super::*;

#[test]
fn test_decode_addi_negative() {
    let decoded = decode(0xFFF00113); // addi sp, zero, -1
    assert_eq!(
        decoded.instr,
        RvInstr::Addi {
            rd: 2,
            rs1: 0,
            imm: -1
        }
    );
}

#[test]
fn test_decode_add_rd5() {
    let decoded = decode(0x006282B3); // add t0, t0, t1
    assert_eq!(
        decoded.instr,
        RvInstr::Add {
            rd: 5,
            rs1: 5,
            rs2: 6
        }
    );
}

#[test]
fn test_decode_sub() {
    assert_eq!(
        decode(0x402081B3).instr,
        RvInstr::Sub {
            rd: 3,
            rs1: 1,
            rs2: 2
        }
    );
}

#[test]
fn test_decode_store_negative_offset() {
    assert_eq!(
        decode(0xFE112E23).instr,
        RvInstr::Sw {
            rs1: 2,
            rs2: 1,
            offset: -4
        }
    );
}

#[test]
fn test_decode_lui_keeps_shifted_imm() {
    assert_eq!(
        decode(0xDEADB2B7).instr,
        RvInstr::Lui {
            rd: 5,
            imm: 0xDEADB000
        }
    );
}

#[test]
fn test_decode_system_bucket() {
    assert_eq!(decode(ECALL_ENCODING).instr, RvInstr::Ecall);
    assert_eq!(decode(EBREAK_ENCODING).instr, RvInstr::Ebreak);
    assert_eq!(decode(MRET_ENCODING).instr, RvInstr::Mret);
    assert!(matches!(decode(0x34102373).instr, RvInstr::Csrrs { rd: 6, .. }));
}

#[test]
fn test_decode_unsupported() {
    // fence / mul / wfi 均不在支持范围内
    for raw in [0x0FF0000F, 0x02208033, 0x10500073] {
        assert_eq!(decode(raw).instr, RvInstr::Illegal { raw });
    }
}

#[test]
fn test_decode_preserves_raw() {
    let decoded = decode(0x00A00093);
    assert_eq!(decoded.raw, 0x00A00093);
}
