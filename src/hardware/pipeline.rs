//! 行为级流水线核
//!
//! 在时钟上升沿寄存：每个未停顿的上升沿发射一条指令，其写回记录在流水线中
//! 移动 `depth - 1` 个周期后出现在调试端口上。指令的架构效果由内部的
//! `RvEmu` 在发射时计算。

use std::collections::VecDeque;

use crate::config::CoreModelConfig;
use crate::emulator::{EmuError, ReferenceEmulator, RvEmu, RvEmuBuilder};
use crate::writeback::WritebackRecord;

use super::HardwareModel;

pub struct PipelinedCore {
    builder: RvEmuBuilder,
    config: CoreModelConfig,
    emu: Option<RvEmu>,
    /// 未写回的级间寄存器，队首为最新发射
    stages: VecDeque<WritebackRecord>,
    port: WritebackRecord,
    clock: bool,
    reset: bool,
    prev_clock: bool,
    /// 复位释放后的上升沿计数，用于插入停顿
    edges: u64,
    /// 已发射终止指令，之后只产生气泡
    idle: bool,
    /// 内部状态自上次复位以来未被修改
    fresh: bool,
}

impl PipelinedCore {
    /// 构建时校验一次镜像布局，复位时按同一配置重建
    pub fn new(builder: RvEmuBuilder, config: CoreModelConfig) -> Result<Self, EmuError> {
        let emu = builder.clone().build()?;
        let depth = config.depth.max(1);
        Ok(Self {
            builder,
            config: CoreModelConfig { depth, ..config },
            emu: Some(emu),
            stages: VecDeque::from(vec![WritebackRecord::default(); depth - 1]),
            port: WritebackRecord::default(),
            clock: false,
            reset: false,
            prev_clock: false,
            edges: 0,
            idle: false,
            fresh: true,
        })
    }

    pub fn depth(&self) -> usize {
        self.config.depth
    }

    fn flush(&mut self) {
        self.stages.iter_mut().for_each(|s| *s = WritebackRecord::default());
        self.port = WritebackRecord::default();
        self.edges = 0;
        self.idle = false;
        if !self.fresh {
            self.emu = match self.builder.clone().build() {
                Ok(emu) => Some(emu),
                Err(e) => {
                    log::error!("core rebuild failed: {e}");
                    None
                }
            };
            self.fresh = true;
        }
    }

    fn stalled(&self) -> bool {
        self.config.stall_every != 0 && self.edges % self.config.stall_every as u64 == 0
    }

    /// 发射一条指令，返回其最终写回记录
    fn issue(&mut self) -> WritebackRecord {
        let Some(emu) = self.emu.as_mut() else {
            return WritebackRecord::default();
        };
        self.fresh = false;

        let pc = emu.pc();
        let retired = match emu.fetch() {
            Ok(raw) => {
                emu.step_pc();
                emu.execute(raw)
            }
            Err(e) => {
                log::debug!("core fetch failed: {e}");
                WritebackRecord::terminated()
            }
        };

        if retired.instruction_valid {
            retired
        } else {
            self.idle = true;
            WritebackRecord {
                has_instruction: true,
                pc,
                ..WritebackRecord::default()
            }
        }
    }

    fn rising_edge(&mut self) {
        if self.reset {
            self.flush();
            return;
        }

        self.edges += 1;
        let entering = if self.idle || self.stalled() {
            WritebackRecord::default()
        } else {
            self.issue()
        };

        self.stages.push_front(entering);
        self.port = self.stages.pop_back().unwrap_or_default();
    }
}

impl HardwareModel for PipelinedCore {
    fn set_clock(&mut self, high: bool) {
        self.clock = high;
    }

    fn set_reset(&mut self, asserted: bool) {
        self.reset = asserted;
    }

    fn eval(&mut self) {
        if self.clock && !self.prev_clock {
            self.rising_edge();
        }
        self.prev_clock = self.clock;
    }

    fn writeback(&self) -> WritebackRecord {
        self.port
    }
}
