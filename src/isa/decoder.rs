//! 解码器框架：按 opcode 分桶的解码器注册表

use std::sync::Arc;

use thiserror::Error;

use crate::isa::{DecodedInstr, RvInstr};

/// 指令解码器
pub trait InstrDecoder: Send + Sync {
    fn name(&self) -> &str;

    /// 能解码时返回 `Some`
    fn decode(&self, raw: u32) -> Option<DecodedInstr>;

    /// 本解码器覆盖的 opcode，注册表据此分桶
    fn handled_opcodes(&self) -> &[u32];
}

/// 注册时发现两个解码器会匹配同一指令字
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("decoder {rejected} overlaps {existing} on opcode 0x{opcode:02X}")]
pub struct RegistryConflict {
    pub rejected: String,
    pub existing: String,
    pub opcode: u32,
}

/// 标准组合的注册顺序
fn standard_tables() -> [super::TableDrivenDecoder; 3] {
    [
        super::rv32i::RV32I_DECODER,
        super::zicsr::ZICSR_DECODER,
        super::system::SYSTEM_DECODER,
    ]
}

/// 解码器注册表
pub struct DecoderRegistry {
    decoders: Vec<Arc<dyn InstrDecoder>>,
    opcode_map: [Vec<usize>; 128],
}

impl DecoderRegistry {
    pub fn new() -> Self {
        Self {
            decoders: Vec::new(),
            opcode_map: std::array::from_fn(|_| Vec::new()),
        }
    }

    /// 参考模拟器使用的完整组合：RV32I + Zicsr + 系统指令
    ///
    /// 各表逐一经过冲突检查，冲突的表不会进入注册表。
    pub fn standard() -> Self {
        let mut registry = Self::new();
        for table in standard_tables() {
            if let Err(e) = registry.register_table(table) {
                log::error!("standard decoder table rejected: {e}");
            }
        }
        registry
    }

    /// 注册一个表驱动解码器
    ///
    /// 与同一 opcode 桶中已有表的任一定义冲突时拒绝注册，注册表保持不变。
    pub fn register_table(
        &mut self,
        decoder: super::TableDrivenDecoder,
    ) -> Result<(), RegistryConflict> {
        for &op in decoder.handled_opcodes() {
            for &idx in &self.opcode_map[(op & 0x7F) as usize] {
                let existing = &self.decoders[idx];
                let clash = decoder.instrs().iter().any(|def| {
                    // 只有可能落在该 opcode 的定义才参与比较
                    (def.match_val & 0x7F) == op
                        && existing.decode(def.match_val).is_some()
                });
                if clash {
                    return Err(RegistryConflict {
                        rejected: decoder.name().to_string(),
                        existing: existing.name().to_string(),
                        opcode: op,
                    });
                }
            }
        }

        let idx = self.decoders.len();
        for &op in decoder.handled_opcodes() {
            self.opcode_map[(op & 0x7F) as usize].push(idx);
        }
        self.decoders.push(Arc::new(decoder));
        Ok(())
    }

    /// 解码指令，无法识别时返回 `RvInstr::Illegal`
    pub fn decode(&self, raw: u32) -> DecodedInstr {
        let opcode = (raw & 0x7F) as usize;
        self.opcode_map[opcode]
            .iter()
            .find_map(|&idx| self.decoders[idx].decode(raw))
            .unwrap_or(DecodedInstr {
                raw,
                instr: RvInstr::Illegal { raw },
            })
    }

    pub fn decoder_names(&self) -> Vec<&str> {
        self.decoders.iter().map(|d| d.name()).collect()
    }
}

impl Default for DecoderRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

impl std::fmt::Debug for DecoderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecoderRegistry")
            .field("decoders", &self.decoder_names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::isa::{InstrDef, TableDrivenDecoder, rv32i::RV32I_DECODER};

    static SHADOW_ADD: &[InstrDef] = &[InstrDef::new(
        "SHADOW_ADD",
        crate::isa::instr_def::R_TYPE_MASK,
        0x0000_0033,
        |raw| RvInstr::Illegal { raw },
    )];
    static SHADOW_OPCODES: [u32; 1] = [0x33];

    #[test]
    fn test_standard_registry_names() {
        let registry = DecoderRegistry::standard();
        assert_eq!(registry.decoder_names(), vec!["RV32I", "Zicsr", "System"]);
    }

    #[test]
    fn test_register_rejects_overlap() {
        let mut registry = DecoderRegistry::new();
        registry.register_table(RV32I_DECODER).unwrap();
        let shadow = TableDrivenDecoder::new("Shadow", SHADOW_ADD, &SHADOW_OPCODES);
        let err = registry.register_table(shadow).unwrap_err();
        assert_eq!(err.opcode, 0x33);
        assert_eq!(err.existing, "RV32I");
        // 注册表未被污染
        assert_eq!(registry.decoder_names(), vec!["RV32I"]);
    }

    #[test]
    fn test_standard_tables_are_disjoint() {
        // 逆序注册同样不冲突：Zicsr 与系统指令共用 SYSTEM opcode 但 funct3 不相交
        let mut registry = DecoderRegistry::new();
        for table in standard_tables().into_iter().rev() {
            registry.register_table(table).unwrap();
        }
        assert_eq!(registry.decoder_names(), vec!["System", "Zicsr", "RV32I"]);
        assert_eq!(registry.decode(0x0000_0073).instr, RvInstr::Ecall);
        assert!(matches!(
            registry.decode(0x3410_2373).instr,
            RvInstr::Csrrs { rd: 6, .. }
        ));
    }

    #[test]
    fn test_unknown_is_illegal() {
        let registry = DecoderRegistry::standard();
        let decoded = registry.decode(0x0000_000F); // fence
        assert_eq!(decoded.instr, RvInstr::Illegal { raw: 0x0000_000F });
    }
}
