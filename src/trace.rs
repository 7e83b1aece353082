//! VCD 波形输出
//!
//! 记录时钟、复位与写回调试端口。每个周期三个采样点，时间单位 1ns。

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use vcd_ng::{IdCode, SimulationCommand, TimescaleUnit, Value, VecValue, Writer};

use crate::error::{CosimError, Result};
use crate::writeback::WritebackRecord;

/// 顶层 scope 名
pub const TRACE_SCOPE: &str = "top";

const PC_WIDTH: u32 = 32;
const REG_WIDTH: u32 = 5;
const VALUE_WIDTH: u32 = 32;

struct Wires {
    clock: IdCode,
    reset: IdCode,
    wb_have_inst: IdCode,
    wb_pc: IdCode,
    wb_ena: IdCode,
    wb_reg: IdCode,
    wb_value: IdCode,
    inst_valid: IdCode,
}

/// 一次运行的波形文件
pub struct VcdTrace {
    out: BufWriter<File>,
    path: PathBuf,
    wires: Wires,
    last_timestamp: Option<u64>,
}

fn scalar(bit: bool) -> Value {
    if bit { Value::V1 } else { Value::V0 }
}

/// 按 VCD 约定从最高位到最低位展开
fn vector(value: u32, width: u32) -> VecValue {
    let mut bits = VecValue::new();
    for i in (0..width).rev() {
        bits.push(scalar((value >> i) & 1 != 0));
    }
    bits
}

impl VcdTrace {
    /// 创建文件并写出变量定义
    pub fn create(path: &Path) -> Result<Self> {
        let trace_err = |source: io::Error| CosimError::Trace {
            path: path.to_path_buf(),
            source,
        };
        let file = File::create(path).map_err(trace_err)?;
        let mut out = BufWriter::new(file);
        let wires = Self::write_header(&mut out).map_err(trace_err)?;
        log::info!("tracing to {}", path.display());
        Ok(Self {
            out,
            path: path.to_path_buf(),
            wires,
            last_timestamp: None,
        })
    }

    fn write_header(out: &mut BufWriter<File>) -> io::Result<Wires> {
        let mut writer = Writer::new(out);
        writer.timescale(1, TimescaleUnit::NS)?;
        writer.add_module(TRACE_SCOPE)?;
        let wires = Wires {
            clock: writer.add_wire(1, "clock")?,
            reset: writer.add_wire(1, "reset")?,
            wb_have_inst: writer.add_wire(1, "wb_have_inst")?,
            wb_pc: writer.add_wire(PC_WIDTH, "wb_pc")?,
            wb_ena: writer.add_wire(1, "wb_ena")?,
            wb_reg: writer.add_wire(REG_WIDTH, "wb_reg")?,
            wb_value: writer.add_wire(VALUE_WIDTH, "wb_value")?,
            inst_valid: writer.add_wire(1, "inst_valid")?,
        };
        writer.upscope()?;
        writer.enddefinitions()?;
        Ok(wires)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 最近一次采样的时间戳
    pub fn last_timestamp(&self) -> Option<u64> {
        self.last_timestamp
    }

    /// 在 `timestamp` 处记录所有信号，首个采样点作为 `$dumpvars` 初值
    pub fn sample(
        &mut self,
        timestamp: u64,
        clock: bool,
        reset: bool,
        wb: &WritebackRecord,
    ) -> io::Result<()> {
        let w = &self.wires;
        let initial = self.last_timestamp.is_none();
        let mut writer = Writer::new(&mut self.out);
        writer.timestamp(timestamp)?;
        if initial {
            writer.begin(SimulationCommand::Dumpvars)?;
        }
        writer.change_scalar(w.clock, scalar(clock))?;
        writer.change_scalar(w.reset, scalar(reset))?;
        writer.change_scalar(w.wb_have_inst, scalar(wb.has_instruction))?;
        writer.change_vector(w.wb_pc, &vector(wb.pc, PC_WIDTH))?;
        writer.change_scalar(w.wb_ena, scalar(wb.write_enabled))?;
        writer.change_vector(w.wb_reg, &vector(wb.rd as u32, REG_WIDTH))?;
        writer.change_vector(w.wb_value, &vector(wb.value, VALUE_WIDTH))?;
        writer.change_scalar(w.inst_valid, scalar(wb.instruction_valid))?;
        if initial {
            writer.end()?;
        }

        self.last_timestamp = Some(timestamp);
        Ok(())
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }
}
