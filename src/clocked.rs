//! 时钟驱动的硬件模型包装
//!
//! 每个时钟周期分三个相位：低电平求值、高电平求值、低电平求值，
//! 对应的波形时间戳为 `10*cnt - 1`、`10*cnt`、`10*cnt + 5`（`cnt` 先自增）。

use std::io;

use thiserror::Error;

use crate::hardware::HardwareModel;
use crate::trace::VcdTrace;
use crate::writeback::WritebackRecord;

/// 复位日志中的模型名
pub const MODEL_NAME: &str = "my-cpu";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ClockError {
    #[error("model advanced before reset")]
    NotReset,
    #[error("model was already reset")]
    AlreadyReset,
}

/// 独占持有一个硬件模型与可选的波形
pub struct ClockedModel<M: HardwareModel> {
    model: M,
    trace: Option<VcdTrace>,
    cnt: u64,
    reset_done: bool,
    reset_asserted: bool,
}

impl<M: HardwareModel> ClockedModel<M> {
    pub fn new(model: M, trace: Option<VcdTrace>) -> Self {
        Self {
            model,
            trace,
            cnt: 0,
            reset_done: false,
            reset_asserted: false,
        }
    }

    /// 保持复位 `cycles` 个周期后释放
    pub fn reset(&mut self, cycles: u32) -> Result<(), ClockError> {
        if self.reset_done {
            return Err(ClockError::AlreadyReset);
        }
        log::info!("[{MODEL_NAME}] Resetting ...");
        self.reset_asserted = true;
        self.model.set_reset(true);
        for _ in 0..cycles {
            self.run_period();
        }
        self.reset_asserted = false;
        self.model.set_reset(false);
        self.reset_done = true;
        log::info!("[{MODEL_NAME}] Reset done.");
        Ok(())
    }

    /// 推进一个时钟周期，返回周期结束时的写回端口
    pub fn advance(&mut self) -> Result<WritebackRecord, ClockError> {
        if !self.reset_done {
            return Err(ClockError::NotReset);
        }
        Ok(self.run_period())
    }

    /// 已推进的周期数（含复位周期）
    pub fn period(&self) -> u64 {
        self.cnt
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn trace(&self) -> Option<&VcdTrace> {
        self.trace.as_ref()
    }

    fn run_period(&mut self) -> WritebackRecord {
        self.cnt += 1;
        let base = self.cnt * 10;
        self.phase(false, base - 1);
        self.phase(true, base);
        let wb = self.phase(false, base + 5);
        if let Some(trace) = self.trace.as_mut() {
            if let Err(e) = trace.flush() {
                self.disable_trace(e);
            }
        }
        wb
    }

    fn phase(&mut self, clock: bool, timestamp: u64) -> WritebackRecord {
        self.model.set_clock(clock);
        self.model.eval();
        let wb = self.model.writeback();
        if let Some(trace) = self.trace.as_mut() {
            if let Err(e) = trace.sample(timestamp, clock, self.reset_asserted, &wb) {
                self.disable_trace(e);
            }
        }
        wb
    }

    fn disable_trace(&mut self, err: io::Error) {
        if let Some(trace) = self.trace.take() {
            log::warn!(
                "trace {} disabled after write error: {err}",
                trace.path().display()
            );
        }
    }

    /// 收尾并关闭波形，返回写出错误
    pub fn close(&mut self) -> io::Result<()> {
        match self.trace.take() {
            Some(mut trace) => trace.flush(),
            None => Ok(()),
        }
    }
}

impl<M: HardwareModel> Drop for ClockedModel<M> {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            log::warn!("failed to finish trace: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    /// 记录输入并把上升沿计数放在 pc 上
    #[derive(Default)]
    struct EdgeCounter {
        clock: bool,
        prev: bool,
        reset: bool,
        edges: u32,
        evals: u32,
    }

    impl HardwareModel for EdgeCounter {
        fn set_clock(&mut self, high: bool) {
            self.clock = high;
        }
        fn set_reset(&mut self, asserted: bool) {
            self.reset = asserted;
        }
        fn eval(&mut self) {
            self.evals += 1;
            if self.clock && !self.prev {
                self.edges = if self.reset { 0 } else { self.edges + 1 };
            }
            self.prev = self.clock;
        }
        fn writeback(&self) -> WritebackRecord {
            WritebackRecord {
                pc: self.edges,
                has_instruction: !self.reset,
                ..WritebackRecord::default()
            }
        }
    }

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("rvcosim-{}-{}.vcd", name, std::process::id()))
    }

    #[test]
    fn test_advance_before_reset_rejected() {
        let mut clocked = ClockedModel::new(EdgeCounter::default(), None);
        assert_eq!(clocked.advance(), Err(ClockError::NotReset));
        clocked.reset(2).unwrap();
        assert_eq!(clocked.reset(2), Err(ClockError::AlreadyReset));
    }

    #[test]
    fn test_three_phases_per_period() {
        let mut clocked = ClockedModel::new(EdgeCounter::default(), None);
        clocked.reset(20).unwrap();
        assert_eq!(clocked.period(), 20);
        assert_eq!(clocked.model().evals, 60);

        let wb = clocked.advance().unwrap();
        assert_eq!(wb.pc, 1);
        assert!(wb.has_instruction);
        assert_eq!(clocked.model().evals, 63);
    }

    #[test]
    fn test_trace_timestamps_strictly_increase() {
        let path = temp_path("clocked-ts");
        let trace = VcdTrace::create(&path).unwrap();
        let mut clocked = ClockedModel::new(EdgeCounter::default(), Some(trace));
        clocked.reset(3).unwrap();
        for _ in 0..4 {
            clocked.advance().unwrap();
        }
        assert_eq!(clocked.trace().and_then(|t| t.last_timestamp()), Some(75));
        clocked.close().unwrap();
        assert!(clocked.trace().is_none());

        let text = std::fs::read_to_string(&path).unwrap();
        std::fs::remove_file(&path).ok();
        let stamps: Vec<u64> = text
            .lines()
            .filter_map(|l| l.strip_prefix('#'))
            .map(|t| t.parse().unwrap())
            .collect();
        assert_eq!(stamps.len(), 7 * 3);
        assert_eq!(&stamps[..3], &[9, 10, 15]);
        assert!(stamps.windows(2).all(|w| w[0] < w[1]));
    }
}
