//! 锁步驱动
//!
//! 每步推进硬件一个时钟周期；硬件报告退休时，参考模拟器执行恰好一条指令，
//! 随后比较双方的写回记录。两次比较之间双方各自退休一条指令。

use std::fmt;
use std::io;

use crate::clocked::{ClockError, ClockedModel};
use crate::config::LockstepConfig;
use crate::emulator::ReferenceEmulator;
use crate::hardware::HardwareModel;
use crate::isa;
use crate::writeback::{Field, WritebackRecord};

/// 安装或构造失败时的进程退出码
pub const SETUP_FAILURE_EXIT: u8 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HaltReason {
    /// 双方同时终止
    Finished,
    /// 只有一方终止
    Desync,
    /// `halt_on_first_mismatch` 触发
    MismatchLimit,
    /// 达到 `max_cycles`
    Timeout,
}

impl fmt::Display for HaltReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            HaltReason::Finished => "finished",
            HaltReason::Desync => "desynchronized",
            HaltReason::MismatchLimit => "stopped at first mismatch",
            HaltReason::Timeout => "cycle limit reached",
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DriverState {
    #[default]
    Uninitialized,
    Resetting,
    Running,
    Halted(HaltReason),
}

/// 一次字段不一致
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mismatch {
    /// 比较序号，从 0 开始
    pub index: u64,
    /// 时钟周期序号（含复位），波形时间约为 `10 * cycle`
    pub cycle: u64,
    pub hardware: WritebackRecord,
    pub reference: WritebackRecord,
    pub fields: Vec<Field>,
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields: Vec<String> = self.fields.iter().map(Field::to_string).collect();
        write!(
            f,
            "mismatch #{} at cycle {} [{}]\n  hardware : {}\n  reference: {}",
            self.index,
            self.cycle,
            fields.join(", "),
            self.hardware,
            self.reference
        )
    }
}

/// 只有一方终止
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Desync {
    pub cycle: u64,
    pub hardware: WritebackRecord,
    pub reference: WritebackRecord,
}

impl Desync {
    /// 硬件先于参考模型终止
    pub fn hardware_ended(&self) -> bool {
        !self.hardware.instruction_valid
    }
}

impl fmt::Display for Desync {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (ended, running) = if self.hardware_ended() {
            ("hardware", "reference")
        } else {
            ("reference", "hardware")
        };
        write!(
            f,
            "{ended} terminated while {running} kept running at cycle {}\n  hardware : {}\n  reference: {}",
            self.cycle, self.hardware, self.reference
        )
    }
}

/// `step` 的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepEvent {
    /// 硬件本周期没有退休指令
    Stall,
    Match(WritebackRecord),
    Mismatch(Mismatch),
    Desync(Desync),
    Halted(HaltReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Pass,
    Mismatch,
    Desync,
    Timeout,
}

impl Outcome {
    pub fn exit_code(self) -> u8 {
        match self {
            Outcome::Pass => 0,
            Outcome::Mismatch => 1,
            Outcome::Desync => 2,
            Outcome::Timeout => 3,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Outcome::Pass => "PASS",
            Outcome::Mismatch => "MISMATCH",
            Outcome::Desync => "DESYNC",
            Outcome::Timeout => "TIMEOUT",
        })
    }
}

/// 运行统计
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// 预热之后推进的周期数
    pub cycles: u64,
    pub comparisons: u64,
    pub stalls: u64,
    /// 预热阶段被丢弃的退休记录数
    pub warmup_retirements: u32,
    pub mismatches: Vec<Mismatch>,
    pub desync: Option<Desync>,
    pub halt: Option<HaltReason>,
}

impl RunSummary {
    /// 去同步优先于不一致，不一致优先于超时
    pub fn outcome(&self) -> Outcome {
        if self.desync.is_some() {
            Outcome::Desync
        } else if !self.mismatches.is_empty() {
            Outcome::Mismatch
        } else if self.halt == Some(HaltReason::Timeout) {
            Outcome::Timeout
        } else {
            Outcome::Pass
        }
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} cycles, {} comparisons, {} stalls, {} mismatches",
            self.outcome(),
            self.cycles,
            self.comparisons,
            self.stalls,
            self.mismatches.len()
        )?;
        if let Some(halt) = self.halt {
            write!(f, " ({halt})")?;
        }
        Ok(())
    }
}

/// 硬件模型与参考模拟器的锁步运行
pub struct LockstepDriver<M: HardwareModel, E: ReferenceEmulator> {
    clocked: ClockedModel<M>,
    emulator: E,
    config: LockstepConfig,
    state: DriverState,
    summary: RunSummary,
}

impl<M: HardwareModel, E: ReferenceEmulator> LockstepDriver<M, E> {
    pub fn new(clocked: ClockedModel<M>, emulator: E, config: LockstepConfig) -> Self {
        Self {
            clocked,
            emulator,
            config,
            state: DriverState::Resetting,
            summary: RunSummary::default(),
        }
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    pub fn emulator(&self) -> &E {
        &self.emulator
    }

    pub fn hardware(&self) -> &ClockedModel<M> {
        &self.clocked
    }

    /// 复位并丢弃预热周期
    pub fn start(&mut self) -> Result<(), ClockError> {
        self.clocked.reset(self.config.reset_cycles)?;
        for _ in 0..self.config.warmup_cycles {
            let wb = self.clocked.advance()?;
            if wb.has_instruction {
                self.summary.warmup_retirements += 1;
                log::warn!(
                    "retirement discarded during warm-up ({wb}), warm-up of {} cycles is too long",
                    self.config.warmup_cycles
                );
            }
        }
        self.state = DriverState::Running;
        Ok(())
    }

    /// 推进一个周期并比较
    ///
    /// 停机后再次调用只返回 `StepEvent::Halted`。
    pub fn step(&mut self) -> Result<StepEvent, ClockError> {
        match self.state {
            DriverState::Running => {}
            DriverState::Halted(reason) => return Ok(StepEvent::Halted(reason)),
            DriverState::Uninitialized | DriverState::Resetting => {
                return Err(ClockError::NotReset);
            }
        }

        let hardware = self.clocked.advance()?;
        self.summary.cycles += 1;

        let event = if hardware.has_instruction {
            let reference = self.step_reference();
            self.classify(hardware, reference)
        } else {
            self.summary.stalls += 1;
            StepEvent::Stall
        };

        if let Some(limit) = self.config.max_cycles {
            if self.state == DriverState::Running && self.summary.cycles >= limit {
                self.halt(HaltReason::Timeout);
            }
        }

        Ok(match (event, self.state) {
            (StepEvent::Stall | StepEvent::Match(_), DriverState::Halted(reason)) => {
                StepEvent::Halted(reason)
            }
            (event, _) => event,
        })
    }

    /// 运行到停机
    pub fn run(&mut self) -> Result<RunSummary, ClockError> {
        if self.state == DriverState::Resetting {
            self.start()?;
        }
        while !matches!(self.state, DriverState::Halted(_)) {
            self.step()?;
        }
        log::info!("{}", self.summary);
        Ok(self.summary.clone())
    }

    pub fn summary(&self) -> &RunSummary {
        &self.summary
    }

    /// 结束波形输出
    pub fn close(&mut self) -> io::Result<()> {
        self.clocked.close()
    }

    fn step_reference(&mut self) -> WritebackRecord {
        let pc = self.emulator.pc();
        let raw = match self.emulator.fetch() {
            Ok(raw) => raw,
            Err(e) => {
                log::debug!("reference fetch failed: {e}");
                return WritebackRecord::terminated();
            }
        };
        log::debug!("[{}] 0x{pc:08x}: {}", self.clocked.period(), isa::disasm(raw));

        self.emulator.step_pc();
        let record = self.emulator.execute(raw);
        log::debug!(
            "wen = {}, rd = {}, val = 0x{:08x}",
            record.write_enabled as u8,
            record.rd,
            record.value
        );
        if log::log_enabled!(log::Level::Trace) {
            log::trace!("{}", self.emulator.dump());
        }
        record
    }

    fn classify(&mut self, hardware: WritebackRecord, reference: WritebackRecord) -> StepEvent {
        let cycle = self.clocked.period();
        match (hardware.instruction_valid, reference.instruction_valid) {
            (false, false) => {
                self.halt(HaltReason::Finished);
                StepEvent::Halted(HaltReason::Finished)
            }
            (true, true) => {
                let index = self.summary.comparisons;
                self.summary.comparisons += 1;
                let fields = hardware.diff(&reference, self.config.compare_idle_fields);
                if fields.is_empty() {
                    return StepEvent::Match(hardware);
                }

                let mismatch = Mismatch {
                    index,
                    cycle,
                    hardware,
                    reference,
                    fields,
                };
                log::error!("{mismatch}");
                self.summary.mismatches.push(mismatch.clone());
                if self.config.halt_on_first_mismatch {
                    self.halt(HaltReason::MismatchLimit);
                }
                StepEvent::Mismatch(mismatch)
            }
            _ => {
                let desync = Desync {
                    cycle,
                    hardware,
                    reference,
                };
                log::error!("{desync}");
                self.summary.desync = Some(desync);
                self.halt(HaltReason::Desync);
                StepEvent::Desync(desync)
            }
        }
    }

    fn halt(&mut self, reason: HaltReason) {
        log::info!("halted after {} cycles: {reason}", self.summary.cycles);
        self.state = DriverState::Halted(reason);
        self.summary.halt = Some(reason);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CoreModelConfig;
    use crate::emulator::{RvEmu, RvEmuBuilder};
    use crate::hardware::PipelinedCore;
    use crate::trace::VcdTrace;
    use pretty_assertions::assert_eq;
    use std::collections::VecDeque;
    use std::path::{Path, PathBuf};

    const ILLEGAL: u32 = 0xFFFF_FFFF;
    /// jal zero, 0
    const SPIN: u32 = 0x0000_006f;

    fn addi(rd: u32, imm: u32) -> u32 {
        (imm << 20) | (rd << 7) | 0x13
    }

    fn program(words: &[u32]) -> RvEmuBuilder {
        let image = words.iter().flat_map(|w| w.to_le_bytes()).collect();
        RvEmuBuilder::new().with_user(image, 0).with_memory(0, 0x1000)
    }

    fn driver(
        hw: &[u32],
        reference: &[u32],
        core: CoreModelConfig,
        config: LockstepConfig,
    ) -> LockstepDriver<PipelinedCore, RvEmu> {
        let core = PipelinedCore::new(program(hw), core).unwrap();
        let emu = program(reference).build().unwrap();
        LockstepDriver::new(ClockedModel::new(core, None), emu, config)
    }

    /// 复位释放后每个上升沿按脚本输出一条记录
    struct ScriptedCore {
        script: VecDeque<WritebackRecord>,
        port: WritebackRecord,
        clock: bool,
        reset: bool,
    }

    impl ScriptedCore {
        fn new(script: Vec<WritebackRecord>) -> Self {
            Self {
                script: script.into(),
                port: WritebackRecord::default(),
                clock: false,
                reset: false,
            }
        }
    }

    impl HardwareModel for ScriptedCore {
        fn set_clock(&mut self, high: bool) {
            if high && !self.clock && !self.reset {
                self.port = self.script.pop_front().unwrap_or_default();
            }
            self.clock = high;
        }
        fn set_reset(&mut self, asserted: bool) {
            self.reset = asserted;
        }
        fn eval(&mut self) {}
        fn writeback(&self) -> WritebackRecord {
            self.port
        }
    }

    #[test]
    fn test_add_then_illegal_passes() {
        let words = [addi(5, 7), ILLEGAL];
        let mut drv = driver(
            &words,
            &words,
            CoreModelConfig::default(),
            LockstepConfig::default(),
        );
        assert_eq!(drv.state(), DriverState::Resetting);
        let summary = drv.run().unwrap();

        assert_eq!(summary.comparisons, 1);
        assert!(summary.mismatches.is_empty());
        assert_eq!(summary.halt, Some(HaltReason::Finished));
        assert_eq!(summary.outcome(), Outcome::Pass);
        // 首条退休出现在第 depth 个上升沿，终止记录紧随其后
        let depth = CoreModelConfig::default().depth as u64;
        let warmup = LockstepConfig::default().warmup_cycles as u64;
        assert_eq!(summary.cycles, depth + 1 - warmup);
        assert_eq!(summary.stalls, depth - 1 - warmup);
        assert_eq!(drv.emulator().read_reg(5), 7);
    }

    #[test]
    fn test_corrupted_reference_reports_one_mismatch() {
        let mut drv = driver(
            &[addi(5, 7), ILLEGAL],
            &[addi(5, 8), ILLEGAL],
            CoreModelConfig::default(),
            LockstepConfig::default(),
        );
        let summary = drv.run().unwrap();

        assert_eq!(summary.mismatches.len(), 1);
        let mismatch = &summary.mismatches[0];
        assert_eq!(mismatch.index, 0);
        assert_eq!(mismatch.fields, vec![Field::Value]);
        assert_eq!(mismatch.hardware, WritebackRecord::retired(0, 5, 7));
        assert_eq!(mismatch.reference, WritebackRecord::retired(0, 5, 8));
        assert_eq!(summary.halt, Some(HaltReason::Finished));
        assert_eq!(summary.outcome().exit_code(), 1);
    }

    #[test]
    fn test_halt_on_first_mismatch() {
        let mut drv = driver(
            &[addi(5, 1), addi(6, 2), ILLEGAL],
            &[addi(5, 9), addi(6, 9), ILLEGAL],
            CoreModelConfig::default(),
            LockstepConfig::default().with_halt_on_first_mismatch(true),
        );
        let summary = drv.run().unwrap();

        assert_eq!(summary.mismatches.len(), 1);
        assert_eq!(summary.halt, Some(HaltReason::MismatchLimit));
        assert_eq!(
            drv.step().unwrap(),
            StepEvent::Halted(HaltReason::MismatchLimit)
        );
    }

    #[test]
    fn test_timeout() {
        let mut drv = driver(
            &[SPIN],
            &[SPIN],
            CoreModelConfig::default().with_depth(3),
            LockstepConfig::default().with_max_cycles(Some(10)),
        );
        let summary = drv.run().unwrap();

        assert_eq!(summary.cycles, 10);
        assert_eq!(summary.halt, Some(HaltReason::Timeout));
        assert!(summary.mismatches.is_empty());
        assert_eq!(summary.outcome(), Outcome::Timeout);
        assert_eq!(summary.outcome().exit_code(), 3);
    }

    #[test]
    fn test_stall_leaves_reference_untouched() {
        let words = [addi(5, 1), addi(6, 2), addi(7, 3), ILLEGAL];
        let mut drv = driver(
            &words,
            &words,
            CoreModelConfig::default().with_depth(1).with_stall_every(2),
            LockstepConfig::default().with_warmup_cycles(0),
        );
        drv.start().unwrap();

        assert_eq!(
            drv.step().unwrap(),
            StepEvent::Match(WritebackRecord::retired(0, 5, 1))
        );
        assert_eq!(drv.emulator().pc(), 4);
        let before = drv.emulator().dump();
        assert_eq!(drv.step().unwrap(), StepEvent::Stall);
        assert_eq!(drv.emulator().pc(), 4);
        assert_eq!(drv.emulator().dump(), before);

        let summary = drv.run().unwrap();
        assert_eq!(summary.comparisons, 3);
        assert_eq!(summary.stalls, 3);
        assert_eq!(summary.cycles, 7);
        assert_eq!(summary.outcome(), Outcome::Pass);
    }

    #[test]
    fn test_mismatch_after_stalls_keeps_alignment() {
        let mut drv = driver(
            &[addi(5, 1), addi(6, 2), addi(7, 3), ILLEGAL],
            &[addi(5, 1), addi(6, 2), addi(7, 9), ILLEGAL],
            CoreModelConfig::default().with_depth(1).with_stall_every(2),
            LockstepConfig::default().with_warmup_cycles(0),
        );
        let summary = drv.run().unwrap();

        // 两次气泡之后仍与第三条指令对齐
        assert_eq!(summary.mismatches.len(), 1);
        let mismatch = &summary.mismatches[0];
        assert_eq!(mismatch.index, 2);
        assert_eq!(mismatch.fields, vec![Field::Value]);
        assert_eq!(mismatch.hardware, WritebackRecord::retired(8, 7, 3));
        assert_eq!(mismatch.reference, WritebackRecord::retired(8, 7, 9));
        assert_eq!(summary.comparisons, 3);
        assert_eq!(summary.stalls, 3);
        assert_eq!(summary.halt, Some(HaltReason::Finished));
        assert_eq!(summary.outcome(), Outcome::Mismatch);
    }

    #[test]
    fn test_step_before_start_rejected() {
        let mut drv = driver(
            &[ILLEGAL],
            &[ILLEGAL],
            CoreModelConfig::default(),
            LockstepConfig::default(),
        );
        assert_eq!(drv.step(), Err(ClockError::NotReset));
        assert_eq!(DriverState::default(), DriverState::Uninitialized);
    }

    #[test]
    fn test_reference_ends_first_is_desync() {
        let hw = ScriptedCore::new(vec![WritebackRecord::retired(0, 5, 7)]);
        let emu = program(&[ILLEGAL]).build().unwrap();
        let config = LockstepConfig::default().with_warmup_cycles(0);
        let mut drv = LockstepDriver::new(ClockedModel::new(hw, None), emu, config);
        let summary = drv.run().unwrap();

        let desync = summary.desync.unwrap();
        assert!(!desync.hardware_ended());
        assert_eq!(summary.halt, Some(HaltReason::Desync));
        assert_eq!(summary.outcome().exit_code(), 2);
    }

    #[test]
    fn test_hardware_ends_first_is_desync() {
        let ended = WritebackRecord {
            has_instruction: true,
            ..WritebackRecord::default()
        };
        let hw = ScriptedCore::new(vec![ended]);
        let emu = program(&[addi(5, 7), ILLEGAL]).build().unwrap();
        let config = LockstepConfig::default().with_warmup_cycles(0);
        let mut drv = LockstepDriver::new(ClockedModel::new(hw, None), emu, config);
        drv.start().unwrap();

        match drv.step().unwrap() {
            StepEvent::Desync(desync) => {
                assert!(desync.hardware_ended());
                assert_eq!(desync.reference, WritebackRecord::retired(0, 5, 7));
            }
            other => panic!("expected desync, got {other:?}"),
        }
        assert_eq!(drv.state(), DriverState::Halted(HaltReason::Desync));
    }

    #[test]
    fn test_long_warmup_discards_retirements() {
        let words = [addi(5, 1), addi(6, 2), addi(7, 3), ILLEGAL];
        let mut drv = driver(
            &words,
            &words,
            CoreModelConfig::default().with_depth(1),
            LockstepConfig::default().with_warmup_cycles(2),
        );
        let summary = drv.run().unwrap();

        assert_eq!(summary.warmup_retirements, 2);
        // 硬件领先两条指令：先是一次不一致，随后硬件先终止
        assert_eq!(summary.mismatches.len(), 1);
        assert_eq!(
            summary.mismatches[0].fields,
            vec![Field::Pc, Field::Rd, Field::Value]
        );
        assert!(summary.desync.unwrap().hardware_ended());
        assert_eq!(summary.outcome(), Outcome::Desync);
    }

    fn traced_run(path: &Path) -> RunSummary {
        let words = [addi(5, 7), addi(6, 1), ILLEGAL];
        let core = PipelinedCore::new(
            program(&words),
            CoreModelConfig::default().with_stall_every(3),
        )
        .unwrap();
        let trace = VcdTrace::create(path).unwrap();
        let emu = program(&words).build().unwrap();
        let mut drv = LockstepDriver::new(
            ClockedModel::new(core, Some(trace)),
            emu,
            LockstepConfig::default(),
        );
        let summary = drv.run().unwrap();
        drv.close().unwrap();
        summary
    }

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("rvcosim-{}-{}.vcd", name, std::process::id()))
    }

    #[test]
    fn test_replay_is_deterministic() {
        let (a, b) = (temp_path("replay-a"), temp_path("replay-b"));
        let first = traced_run(&a);
        let second = traced_run(&b);
        let (text_a, text_b) = (
            std::fs::read_to_string(&a).unwrap(),
            std::fs::read_to_string(&b).unwrap(),
        );
        std::fs::remove_file(&a).ok();
        std::fs::remove_file(&b).ok();

        assert_eq!(first, second);
        assert_eq!(first.comparisons, 2);
        assert_eq!(text_a, text_b);
    }

    #[test]
    fn test_exit_codes() {
        let codes: Vec<u8> = [
            Outcome::Pass,
            Outcome::Mismatch,
            Outcome::Desync,
            Outcome::Timeout,
        ]
        .into_iter()
        .map(Outcome::exit_code)
        .collect();
        assert_eq!(codes, vec![0, 1, 2, 3]);
        assert_eq!(SETUP_FAILURE_EXIT, 4);
    }
}
