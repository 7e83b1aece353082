//! 参考模拟器构建器
//!
//! 统一配置镜像位置、数据窗口与 MMIO，并在构建时校验布局。
//!
//! # 示例
//!
//! ```
//! use rvcosim::emulator::{ReferenceEmulator, RvEmuBuilder};
//!
//! let emu = RvEmuBuilder::new()
//!     .with_user(0x00700293u32.to_le_bytes().to_vec(), 0x100)
//!     .with_memory(0, 0x1000)
//!     .build()
//!     .expect("布局合法");
//! assert_eq!(emu.pc(), 0x100);
//! ```

use std::path::Path;

use super::{EmuError, RvEmu};
use crate::config::EmulatorConfig;
use crate::error::Result;
use crate::image::ProgramImage;
use crate::memory::{DataBus, FlatMemory, ImageRom, MmioMap};

/// 默认内核（trap handler）镜像基地址
pub const DEFAULT_KERNEL_BASE: u32 = 0x1c09_0000;
/// 默认数据窗口大小
pub const DEFAULT_MEMORY_SIZE: u32 = 0x1_0000;

/// 模拟器构建器
#[derive(Debug, Clone)]
pub struct RvEmuBuilder {
    user: Vec<u8>,
    user_base: u32,
    kernel: Vec<u8>,
    kernel_base: u32,
    memory_base: u32,
    memory_size: u32,
    mmio: MmioMap,
}

impl RvEmuBuilder {
    pub fn new() -> Self {
        Self {
            user: Vec::new(),
            user_base: 0,
            kernel: Vec::new(),
            kernel_base: DEFAULT_KERNEL_BASE,
            memory_base: 0,
            memory_size: DEFAULT_MEMORY_SIZE,
            mmio: MmioMap::default(),
        }
    }

    /// 用户程序镜像，入口 PC 即 `base`
    pub fn with_user(mut self, image: Vec<u8>, base: u32) -> Self {
        self.user = image;
        self.user_base = base;
        self
    }

    /// 内核镜像，ECALL 跳转到 `base`
    pub fn with_kernel(mut self, image: Vec<u8>, base: u32) -> Self {
        self.kernel = image;
        self.kernel_base = base;
        self
    }

    /// 数据窗口 `[base, base + size)`
    pub fn with_memory(mut self, base: u32, size: u32) -> Self {
        self.memory_base = base;
        self.memory_size = size;
        self
    }

    pub fn with_mmio(mut self, mmio: MmioMap) -> Self {
        self.mmio = mmio;
        self
    }

    /// 按配置读取镜像文件；`kernel_image` 为空路径时不加载内核
    ///
    /// ELF 镜像以其最低段地址为基址，覆盖配置中的基地址。
    pub fn from_config(config: &EmulatorConfig) -> Result<Self> {
        let user = load_image(&config.user_image, config.user_base)?;
        let kernel = if config.kernel_image.as_os_str().is_empty() {
            ProgramImage {
                base: config.kernel_base,
                bytes: Vec::new(),
                entry: None,
            }
        } else {
            load_image(&config.kernel_image, config.kernel_base)?
        };

        Ok(Self::new()
            .with_user(user.bytes, user.base)
            .with_kernel(kernel.bytes, kernel.base)
            .with_memory(config.memory_base, config.memory_size)
            .with_mmio(config.mmio))
    }

    /// 校验布局并构建模拟器
    pub fn build(self) -> Result<RvEmu, EmuError> {
        // 1. 数据窗口
        if self.memory_size == 0 {
            return Err(EmuError::Layout("data memory window is empty".into()));
        }
        let window_end = self.memory_base as u64 + self.memory_size as u64;
        if window_end > 1 << 32 {
            return Err(EmuError::Layout(format!(
                "data memory window 0x{:08x}+0x{:x} wraps the address space",
                self.memory_base, self.memory_size
            )));
        }

        // 2. 指令镜像
        let irom = ImageRom::new(&self.user, self.user_base, &self.kernel, self.kernel_base);
        if irom.has_overlap() {
            return Err(EmuError::Layout(format!(
                "user image at 0x{:08x} ({} bytes) overlaps kernel image at 0x{:08x} ({} bytes)",
                self.user_base,
                self.user.len(),
                self.kernel_base,
                self.kernel.len()
            )));
        }

        // 3. 数据存储，用户镜像落在窗口内时预加载
        let mut dram = FlatMemory::new(self.memory_size as usize, self.memory_base);
        let loaded = dram.preload(self.user_base, &self.user);
        if loaded > 0 && loaded < self.user.len() {
            log::warn!(
                "user image truncated to {} of {} bytes in data memory",
                loaded,
                self.user.len()
            );
        }

        let bus = DataBus::new(dram, self.mmio);
        Ok(RvEmu::from_parts(irom, bus, self.user_base, self.kernel_base))
    }
}

fn load_image(path: &Path, base: u32) -> Result<ProgramImage> {
    let image = ProgramImage::load(path, base)?;
    if let Some(entry) = image.entry.filter(|&entry| entry != image.base) {
        log::warn!(
            "{}: entry 0x{:08x} differs from image base 0x{:08x}, execution starts at the base",
            path.display(),
            entry,
            image.base
        );
    }
    Ok(image)
}

impl Default for RvEmuBuilder {
    fn default() -> Self {
        Self::new()
    }
}
