//! 硬件模型接口
//!
//! 锁步驱动只通过 `HardwareModel` 观察硬件：时钟与复位两个输入，
//! 以及一组写回调试信号。`PipelinedCore` 是内置的行为级实现。

use crate::writeback::WritebackRecord;

mod pipeline;

pub use pipeline::PipelinedCore;

/// 可逐相位求值的硬件模型
pub trait HardwareModel {
    fn set_clock(&mut self, high: bool);

    fn set_reset(&mut self, asserted: bool);

    /// 按当前输入传播一次组合/时序逻辑
    fn eval(&mut self);

    /// 写回调试端口的当前取值
    fn writeback(&self) -> WritebackRecord;
}

impl<M: HardwareModel + ?Sized> HardwareModel for Box<M> {
    fn set_clock(&mut self, high: bool) {
        (**self).set_clock(high)
    }

    fn set_reset(&mut self, asserted: bool) {
        (**self).set_reset(asserted)
    }

    fn eval(&mut self) {
        (**self).eval()
    }

    fn writeback(&self) -> WritebackRecord {
        (**self).writeback()
    }
}
