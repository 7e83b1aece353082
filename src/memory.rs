//! 参考模拟器的存储模型
//!
//! - `ImageRom`: 只读指令存储，容纳用户程序与内核（trap handler）两段镜像
//! - `FlatMemory`: 数据存储窗口 `[base, base + size)`，允许非对齐访问
//! - `DataBus`: 在 `FlatMemory` 之上叠加两个 MMIO 寄存器（拨码开关与数码管）

use thiserror::Error;

/// 访存粒度
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessSize {
    Byte,
    Half,
    Word,
}

impl AccessSize {
    pub fn bytes(self) -> usize {
        match self {
            AccessSize::Byte => 1,
            AccessSize::Half => 2,
            AccessSize::Word => 4,
        }
    }
}

/// 内存访问错误
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MemError {
    /// 地址未映射到数据窗口
    #[error("out-of-range {access:?} access at 0x{addr:08x} (window=0x{base:08x}..0x{end:08x})")]
    OutOfRange {
        addr: u32,
        access: AccessSize,
        base: u32,
        end: u64,
    },
    /// 取指地址不在任何镜像内
    #[error("invalid instruction address: 0x{addr:08x}")]
    UnmappedFetch { addr: u32 },
}

pub type MemResult<T> = Result<T, MemError>;

/// 数据访存接口
pub trait Memory {
    fn load8(&self, addr: u32) -> MemResult<u8>;
    fn load16(&self, addr: u32) -> MemResult<u16>;
    fn load32(&self, addr: u32) -> MemResult<u32>;
    fn store8(&mut self, addr: u32, value: u8) -> MemResult<()>;
    fn store16(&mut self, addr: u32, value: u16) -> MemResult<()>;
    fn store32(&mut self, addr: u32, value: u32) -> MemResult<()>;
}

// ========== 指令存储 ==========

/// 一段按基地址放置的只读镜像
#[derive(Debug, Clone)]
struct RomSegment {
    base: u32,
    bytes: Vec<u8>,
}

impl RomSegment {
    fn new(base: u32, image: &[u8]) -> Self {
        // 补齐到 4 字节，末尾不完整的字按 0 读出
        let mut bytes = image.to_vec();
        bytes.resize(image.len().next_multiple_of(4), 0);
        Self { base, bytes }
    }

    fn end(&self) -> u64 {
        self.base as u64 + self.bytes.len() as u64
    }

    fn contains(&self, addr: u32) -> bool {
        self.base <= addr && (addr as u64) < self.end()
    }

    fn overlaps(&self, other: &RomSegment) -> bool {
        !self.bytes.is_empty()
            && !other.bytes.is_empty()
            && (self.base as u64) < other.end()
            && (other.base as u64) < self.end()
    }

    fn word_at(&self, addr: u32) -> Option<u32> {
        let offset = addr.checked_sub(self.base)? as usize;
        let word = self.bytes.get(offset..offset + 4)?;
        Some(u32::from_le_bytes([word[0], word[1], word[2], word[3]]))
    }
}

/// 指令 ROM：用户镜像 + 内核镜像
#[derive(Debug, Clone)]
pub struct ImageRom {
    user: RomSegment,
    kernel: RomSegment,
}

impl ImageRom {
    pub fn new(user: &[u8], user_base: u32, kernel: &[u8], kernel_base: u32) -> Self {
        Self {
            user: RomSegment::new(user_base, user),
            kernel: RomSegment::new(kernel_base, kernel),
        }
    }

    /// 两段镜像是否有重叠
    pub fn has_overlap(&self) -> bool {
        self.user.overlaps(&self.kernel)
    }

    /// 取出 `addr` 处的 32 位指令字（小端序）
    pub fn fetch(&self, addr: u32) -> MemResult<u32> {
        [&self.user, &self.kernel]
            .into_iter()
            .filter(|seg| seg.contains(addr))
            .find_map(|seg| seg.word_at(addr))
            .ok_or(MemError::UnmappedFetch { addr })
    }
}

// ========== 数据存储 ==========

/// 线性数据存储窗口
///
/// 与硬件访存单元保持一致，不检查对齐；跨越窗口末端的访问视为越界。
pub struct FlatMemory {
    data: Vec<u8>,
    base_addr: u32,
}

impl FlatMemory {
    /// 创建 `[base_addr, base_addr + size)` 的窗口，内容清零
    ///
    /// ```
    /// use rvcosim::memory::FlatMemory;
    ///
    /// let mem = FlatMemory::new(64 * 1024, 0);
    /// assert_eq!(mem.size(), 64 * 1024);
    /// ```
    pub fn new(size: usize, base_addr: u32) -> Self {
        FlatMemory {
            data: vec![0; size],
            base_addr,
        }
    }

    pub fn base_addr(&self) -> u32 {
        self.base_addr
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    fn window_end(&self) -> u64 {
        self.base_addr as u64 + self.data.len() as u64
    }

    fn bounds_check(&self, addr: u32, access: AccessSize) -> MemResult<usize> {
        let out_of_range = MemError::OutOfRange {
            addr,
            access,
            base: self.base_addr,
            end: self.window_end(),
        };
        let relative = addr.checked_sub(self.base_addr).ok_or(out_of_range)? as usize;
        if relative + access.bytes() > self.data.len() {
            return Err(out_of_range);
        }
        Ok(relative)
    }

    /// 批量写入，供镜像预加载使用；超出窗口的尾部被截断
    pub fn preload(&mut self, addr: u32, data: &[u8]) -> usize {
        let Some(start) = addr.checked_sub(self.base_addr).map(|r| r as usize) else {
            return 0;
        };
        if start >= self.data.len() {
            return 0;
        }
        let len = data.len().min(self.data.len() - start);
        self.data[start..start + len].copy_from_slice(&data[..len]);
        len
    }

    fn read_le<const N: usize>(&self, addr: u32, access: AccessSize) -> MemResult<[u8; N]> {
        let idx = self.bounds_check(addr, access)?;
        let mut out = [0u8; N];
        out.copy_from_slice(&self.data[idx..idx + N]);
        Ok(out)
    }

    fn write_le(&mut self, addr: u32, access: AccessSize, bytes: &[u8]) -> MemResult<()> {
        let idx = self.bounds_check(addr, access)?;
        self.data[idx..idx + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }
}

impl Memory for FlatMemory {
    fn load8(&self, addr: u32) -> MemResult<u8> {
        Ok(self.read_le::<1>(addr, AccessSize::Byte)?[0])
    }

    fn load16(&self, addr: u32) -> MemResult<u16> {
        self.read_le(addr, AccessSize::Half).map(u16::from_le_bytes)
    }

    fn load32(&self, addr: u32) -> MemResult<u32> {
        self.read_le(addr, AccessSize::Word).map(u32::from_le_bytes)
    }

    fn store8(&mut self, addr: u32, value: u8) -> MemResult<()> {
        self.write_le(addr, AccessSize::Byte, &[value])
    }

    fn store16(&mut self, addr: u32, value: u16) -> MemResult<()> {
        self.write_le(addr, AccessSize::Half, &value.to_le_bytes())
    }

    fn store32(&mut self, addr: u32, value: u32) -> MemResult<()> {
        self.write_le(addr, AccessSize::Word, &value.to_le_bytes())
    }
}

// ========== MMIO ==========

/// 数码管寄存器默认地址
pub const DIG_ADDR: u32 = 0xFFFF_F000;
/// 拨码开关寄存器默认地址
pub const SWITCH_ADDR: u32 = 0xFFFF_F070;
/// 拨码开关默认读数
pub const SWITCH_DEFAULT: u32 = 0x00A0_0000;

/// 外设寄存器地址与拨码开关读数
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MmioMap {
    pub dig_addr: u32,
    pub switch_addr: u32,
    pub switch_value: u32,
}

impl Default for MmioMap {
    fn default() -> Self {
        Self {
            dig_addr: DIG_ADDR,
            switch_addr: SWITCH_ADDR,
            switch_value: SWITCH_DEFAULT,
        }
    }
}

/// 数据总线：先查 DRAM 窗口，再查 MMIO
pub struct DataBus {
    dram: FlatMemory,
    mmio: MmioMap,
    /// 最近一次写数码管的值
    last_dig: Option<u32>,
}

impl DataBus {
    pub fn new(dram: FlatMemory, mmio: MmioMap) -> Self {
        Self {
            dram,
            mmio,
            last_dig: None,
        }
    }

    pub fn dram(&self) -> &FlatMemory {
        &self.dram
    }

    pub fn last_dig(&self) -> Option<u32> {
        self.last_dig
    }

    fn mmio_load(&self, addr: u32, err: MemError) -> MemResult<u32> {
        if addr == self.mmio.switch_addr {
            Ok(self.mmio.switch_value)
        } else {
            Err(err)
        }
    }

    fn mmio_store(&mut self, addr: u32, value: u32, err: MemError) -> MemResult<()> {
        if addr == self.mmio.dig_addr {
            log::info!("LED: {:#x}", value);
            self.last_dig = Some(value);
            Ok(())
        } else {
            Err(err)
        }
    }
}

impl Memory for DataBus {
    fn load8(&self, addr: u32) -> MemResult<u8> {
        self.dram
            .load8(addr)
            .or_else(|e| self.mmio_load(addr, e).map(|v| v as u8))
    }

    fn load16(&self, addr: u32) -> MemResult<u16> {
        self.dram
            .load16(addr)
            .or_else(|e| self.mmio_load(addr, e).map(|v| v as u16))
    }

    fn load32(&self, addr: u32) -> MemResult<u32> {
        self.dram.load32(addr).or_else(|e| self.mmio_load(addr, e))
    }

    fn store8(&mut self, addr: u32, value: u8) -> MemResult<()> {
        match self.dram.store8(addr, value) {
            Err(e) => self.mmio_store(addr, value as u32, e),
            ok => ok,
        }
    }

    fn store16(&mut self, addr: u32, value: u16) -> MemResult<()> {
        match self.dram.store16(addr, value) {
            Err(e) => self.mmio_store(addr, value as u32, e),
            ok => ok,
        }
    }

    fn store32(&mut self, addr: u32, value: u32) -> MemResult<()> {
        match self.dram.store32(addr, value) {
            Err(e) => self.mmio_store(addr, value, e),
            ok => ok,
        }
    }
}
