//! rvcosim 命令行入口
//!
//! 默认以行为级流水线核为硬件模型进行锁步仿真；`--emu-only` 只运行参考模拟器。

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;

use rvcosim::config::HarnessConfig;
use rvcosim::driver::{LockstepDriver, Outcome, SETUP_FAILURE_EXIT};
use rvcosim::emulator::{ReferenceEmulator, RvEmu, RvEmuBuilder};
use rvcosim::hardware::PipelinedCore;
use rvcosim::isa::disasm;
use rvcosim::trace::VcdTrace;
use rvcosim::ClockedModel;

#[derive(clap::Parser, Debug)]
#[command(name = "rvcosim")]
#[command(about = "Lockstep co-simulation of an RV32I core against a reference emulator")]
struct Args {
    /// Test name, used for the trace file `<PROGRAM>.vcd`.
    program: Option<String>,

    /// JSON configuration file.
    #[clap(long)]
    config: Option<PathBuf>,

    /// User program image (raw binary or ELF).
    #[clap(long)]
    user: Option<PathBuf>,

    /// Load address of a raw user image.
    #[clap(long, value_parser = parse_u32)]
    user_base: Option<u32>,

    /// Trap handler image (raw binary or ELF).
    #[clap(long)]
    kernel: Option<PathBuf>,

    /// Load address of a raw kernel image, also the ECALL target.
    #[clap(long, value_parser = parse_u32)]
    kernel_base: Option<u32>,

    /// Directory for the VCD trace.
    #[clap(long, default_value = ".")]
    trace_dir: PathBuf,

    /// Do not write a VCD trace.
    #[clap(long)]
    no_trace: bool,

    /// Stop at the first writeback mismatch.
    #[clap(long)]
    halt_on_first_mismatch: bool,

    /// Pipeline depth of the behavioral core.
    #[clap(long)]
    depth: Option<usize>,

    /// Insert a bubble every N cycles (0 = never).
    #[clap(long)]
    stall_every: Option<u32>,

    /// Maximum cycles (or instructions with --emu-only) to run.
    #[clap(long)]
    max_cycles: Option<u64>,

    /// Run the reference emulator alone and print every instruction.
    #[clap(long)]
    emu_only: bool,

    /// Increase log verbosity (-v debug, -vv trace).
    #[clap(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Decrease log verbosity (-q warn, -qq error).
    #[clap(short, long, action = clap::ArgAction::Count)]
    quiet: u8,
}

/// 接受十进制或 `0x` 前缀的十六进制
fn parse_u32(s: &str) -> Result<u32, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(&hex.replace('_', ""), 16),
        None => s.parse(),
    };
    parsed.map_err(|e| format!("invalid address {s:?}: {e}"))
}

fn init_logging(verbose: u8, quiet: u8) {
    use simplelog::*;
    let level = match (verbose, quiet) {
        (0, 0) => LevelFilter::Info,
        (1, _) => LevelFilter::Debug,
        (v, _) if v >= 2 => LevelFilter::Trace,
        (_, 1) => LevelFilter::Warn,
        _ => LevelFilter::Error,
    };

    let result = TermLogger::init(
        level,
        ConfigBuilder::new()
            .set_location_level(LevelFilter::Trace)
            .set_thread_level(LevelFilter::Off)
            .set_time_level(LevelFilter::Debug)
            .build(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    );
    if let Err(e) = result {
        eprintln!("failed to initialize logger: {e}");
    }
}

/// 命令行参数覆盖配置文件
fn load_config(args: &Args) -> Result<HarnessConfig> {
    let mut config = match &args.config {
        Some(path) => HarnessConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => HarnessConfig::default(),
    };

    let emu = &mut config.emulator;
    if let Some(user) = &args.user {
        emu.user_image = user.clone();
    }
    if let Some(base) = args.user_base {
        emu.user_base = base;
    }
    if let Some(kernel) = &args.kernel {
        emu.kernel_image = kernel.clone();
    }
    if let Some(base) = args.kernel_base {
        emu.kernel_base = base;
    }

    let lockstep = &mut config.lockstep;
    lockstep.halt_on_first_mismatch |= args.halt_on_first_mismatch;
    if args.max_cycles.is_some() {
        lockstep.max_cycles = args.max_cycles;
    }

    if let Some(depth) = args.depth {
        config.core.depth = depth;
    }
    if let Some(stall_every) = args.stall_every {
        config.core.stall_every = stall_every;
    }
    Ok(config)
}

fn trace_path(dir: &Path, program: Option<&str>) -> PathBuf {
    let name = program
        .and_then(|p| Path::new(p).file_stem())
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "cosim".to_string());
    dir.join(format!("{name}.vcd"))
}

/// 单独运行参考模拟器，逐条打印
fn run_emu_only(mut emu: RvEmu, max_instructions: Option<u64>) -> Outcome {
    let mut retired = 0u64;
    loop {
        if max_instructions.is_some_and(|max| retired >= max) {
            log::warn!("stopped after {retired} instructions");
            return Outcome::Timeout;
        }

        let pc = emu.pc();
        let raw = match emu.fetch() {
            Ok(raw) => raw,
            Err(e) => {
                log::info!("stopped: {e}");
                break;
            }
        };
        println!("0x{pc:08x}: {:08x}  {}", raw, disasm(raw));

        emu.step_pc();
        let wb = emu.execute(raw);
        if !wb.instruction_valid {
            if let Some(reason) = emu.stop_reason() {
                log::info!("stopped: {reason}");
            }
            break;
        }
        println!("    {wb}");
        retired += 1;
    }

    log::info!("{retired} instructions retired");
    if log::log_enabled!(log::Level::Trace) {
        log::trace!("{}", emu.dump());
    }
    Outcome::Pass
}

fn run(args: &Args) -> Result<Outcome> {
    let config = load_config(args)?;
    let builder =
        RvEmuBuilder::from_config(&config.emulator).context("failed to load program images")?;

    if args.emu_only {
        let emu = builder.build().context("invalid memory layout")?;
        return Ok(run_emu_only(emu, config.lockstep.max_cycles));
    }

    let core = PipelinedCore::new(builder.clone(), config.core)
        .context("failed to build hardware model")?;
    let emu = builder.build().context("failed to build reference emulator")?;

    let trace = if args.no_trace {
        None
    } else {
        let path = trace_path(&args.trace_dir, args.program.as_deref());
        Some(VcdTrace::create(&path).context("failed to create trace")?)
    };

    let mut driver = LockstepDriver::new(ClockedModel::new(core, trace), emu, config.lockstep);
    let summary = driver.run().context("lockstep run failed")?;
    if let Err(e) = driver.close() {
        log::warn!("failed to finish trace: {e}");
    }

    if log::log_enabled!(log::Level::Trace) {
        log::trace!("{}", driver.emulator().dump());
    }
    Ok(summary.outcome())
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose, args.quiet);

    match run(&args) {
        Ok(outcome) => {
            log::info!("result: {outcome}");
            ExitCode::from(outcome.exit_code())
        }
        Err(e) => {
            log::error!("{e:#}");
            ExitCode::from(SETUP_FAILURE_EXIT)
        }
    }
}
