//! 运行配置
//!
//! 以 JSON 描述，所有字段均有默认值，缺省的段落与字段按默认值补齐。
//!
//! ```json
//! {
//!   "lockstep": { "reset_cycles": 20, "halt_on_first_mismatch": true },
//!   "emulator": { "user_image": "start.bin", "kernel_base": 470351872 },
//!   "core": { "depth": 5, "stall_every": 3 }
//! }
//! ```

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::emulator::{DEFAULT_KERNEL_BASE, DEFAULT_MEMORY_SIZE};
use crate::error::{CosimError, Result};
use crate::memory::MmioMap;

/// 默认复位周期数
pub const DEFAULT_RESET_CYCLES: u32 = 20;
/// 复位释放后丢弃的周期数
pub const DEFAULT_WARMUP_CYCLES: u32 = 2;

/// 顶层配置
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HarnessConfig {
    pub lockstep: LockstepConfig,
    pub emulator: EmulatorConfig,
    pub core: CoreModelConfig,
}

/// 锁步驱动参数
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LockstepConfig {
    pub reset_cycles: u32,
    pub warmup_cycles: u32,
    /// 首次不一致即停机
    pub halt_on_first_mismatch: bool,
    /// 运行周期上限（不含复位与预热）
    pub max_cycles: Option<u64>,
    /// 双方均不写回时仍比较 rd 与写回值
    pub compare_idle_fields: bool,
}

impl Default for LockstepConfig {
    fn default() -> Self {
        Self {
            reset_cycles: DEFAULT_RESET_CYCLES,
            warmup_cycles: DEFAULT_WARMUP_CYCLES,
            halt_on_first_mismatch: false,
            max_cycles: None,
            compare_idle_fields: false,
        }
    }
}

impl LockstepConfig {
    pub fn with_reset_cycles(mut self, cycles: u32) -> Self {
        self.reset_cycles = cycles;
        self
    }

    pub fn with_warmup_cycles(mut self, cycles: u32) -> Self {
        self.warmup_cycles = cycles;
        self
    }

    pub fn with_halt_on_first_mismatch(mut self, halt: bool) -> Self {
        self.halt_on_first_mismatch = halt;
        self
    }

    pub fn with_max_cycles(mut self, cycles: Option<u64>) -> Self {
        self.max_cycles = cycles;
        self
    }

    pub fn with_compare_idle_fields(mut self, compare: bool) -> Self {
        self.compare_idle_fields = compare;
        self
    }
}

/// 参考模拟器的镜像与存储布局
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EmulatorConfig {
    pub user_image: PathBuf,
    pub user_base: u32,
    pub kernel_image: PathBuf,
    pub kernel_base: u32,
    pub memory_base: u32,
    pub memory_size: u32,
    pub mmio: MmioMap,
}

impl Default for EmulatorConfig {
    fn default() -> Self {
        Self {
            user_image: PathBuf::from("start.bin"),
            user_base: 0,
            kernel_image: PathBuf::from("trap_handle.bin"),
            kernel_base: DEFAULT_KERNEL_BASE,
            memory_base: 0,
            memory_size: DEFAULT_MEMORY_SIZE,
            mmio: MmioMap::default(),
        }
    }
}

impl EmulatorConfig {
    pub fn with_user_image(mut self, path: impl Into<PathBuf>, base: u32) -> Self {
        self.user_image = path.into();
        self.user_base = base;
        self
    }

    pub fn with_kernel_image(mut self, path: impl Into<PathBuf>, base: u32) -> Self {
        self.kernel_image = path.into();
        self.kernel_base = base;
        self
    }

    pub fn with_memory(mut self, base: u32, size: u32) -> Self {
        self.memory_base = base;
        self.memory_size = size;
        self
    }
}

/// 行为级流水线核的参数
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CoreModelConfig {
    /// 流水线级数，至少为 1
    pub depth: usize,
    /// 每隔多少个周期插入一次气泡，0 表示从不停顿
    pub stall_every: u32,
}

impl Default for CoreModelConfig {
    fn default() -> Self {
        Self {
            depth: 5,
            stall_every: 0,
        }
    }
}

impl CoreModelConfig {
    pub fn with_depth(mut self, depth: usize) -> Self {
        self.depth = depth;
        self
    }

    pub fn with_stall_every(mut self, stall_every: u32) -> Self {
        self.stall_every = stall_every;
        self
    }
}

impl HarnessConfig {
    /// 从 JSON 文件读取配置
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|source| CosimError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_reader(BufReader::new(file)).map_err(|source| CosimError::Config {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_json_gives_defaults() {
        let cfg: HarnessConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg, HarnessConfig::default());
        assert_eq!(cfg.lockstep.reset_cycles, 20);
        assert_eq!(cfg.lockstep.warmup_cycles, 2);
        assert_eq!(cfg.emulator.kernel_base, 0x1c09_0000);
        assert_eq!(cfg.core.depth, 5);
    }

    #[test]
    fn test_partial_sections_keep_other_defaults() {
        let cfg: HarnessConfig = serde_json::from_str(
            r#"{
                "lockstep": { "halt_on_first_mismatch": true, "max_cycles": 1000 },
                "emulator": { "user_image": "prog.bin", "mmio": { "switch_value": 5 } },
                "core": { "stall_every": 4 }
            }"#,
        )
        .unwrap();

        assert!(cfg.lockstep.halt_on_first_mismatch);
        assert_eq!(cfg.lockstep.max_cycles, Some(1000));
        assert_eq!(cfg.lockstep.reset_cycles, 20);
        assert_eq!(cfg.emulator.user_image, PathBuf::from("prog.bin"));
        assert_eq!(cfg.emulator.kernel_image, PathBuf::from("trap_handle.bin"));
        assert_eq!(cfg.emulator.mmio.switch_value, 5);
        assert_eq!(cfg.emulator.mmio.dig_addr, crate::memory::DIG_ADDR);
        assert_eq!(cfg.core, CoreModelConfig::default().with_stall_every(4));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = serde_json::from_str::<HarnessConfig>(r#"{ "lockstep": { "reset": 3 } }"#);
        assert!(err.is_err());
    }

    #[test]
    fn test_misspelled_mmio_field_rejected() {
        let err = serde_json::from_str::<HarnessConfig>(
            r#"{ "emulator": { "mmio": { "dig_adr": 1 } } }"#,
        );
        assert!(err.is_err());

        let cfg: HarnessConfig =
            serde_json::from_str(r#"{ "emulator": { "mmio": { "dig_addr": 16 } } }"#).unwrap();
        assert_eq!(cfg.emulator.mmio.dig_addr, 16);
        assert_eq!(cfg.emulator.mmio.switch_addr, crate::memory::SWITCH_ADDR);
    }

    #[test]
    fn test_load_missing_file() {
        let err = HarnessConfig::load(Path::new("/nonexistent/rvcosim.json")).unwrap_err();
        assert!(matches!(err, CosimError::Io { .. }));
    }

    #[test]
    fn test_builders() {
        let cfg = LockstepConfig::default()
            .with_reset_cycles(4)
            .with_warmup_cycles(0)
            .with_max_cycles(Some(10));
        assert_eq!(cfg.reset_cycles, 4);
        assert_eq!(cfg.warmup_cycles, 0);
        assert_eq!(cfg.max_cycles, Some(10));
    }
}
