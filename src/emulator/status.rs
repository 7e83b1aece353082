//! Architectural state of the reference emulator: integer register file and CSR bank.

use std::collections::BTreeMap;

use crate::isa::{CSR_MCAUSE, CSR_MEPC, CSR_MSTATUS, CSR_MTVAL, csr_name};

/// Register file with a configurable count and zero-hardwire behavior.
///
/// - `N`: number of registers
/// - `ZERO_HARDWIRE`: register 0 reads as zero and ignores writes
#[derive(Clone, Debug)]
pub struct GenericRegFile<const N: usize, const ZERO_HARDWIRE: bool> {
    regs: [u32; N],
}

impl<const N: usize, const ZERO_HARDWIRE: bool> GenericRegFile<N, ZERO_HARDWIRE> {
    pub fn new() -> Self {
        Self { regs: [0; N] }
    }

    #[inline]
    pub fn read(&self, reg: u8) -> u32 {
        if ZERO_HARDWIRE && reg == 0 {
            0
        } else {
            self.regs[reg as usize % N]
        }
    }

    #[inline]
    pub fn write(&mut self, reg: u8, value: u32) {
        if ZERO_HARDWIRE && reg == 0 {
            return;
        }
        self.regs[reg as usize % N] = value;
    }

    pub fn snapshot(&self) -> &[u32; N] {
        &self.regs
    }
}

impl<const N: usize, const ZERO_HARDWIRE: bool> Default for GenericRegFile<N, ZERO_HARDWIRE> {
    fn default() -> Self {
        Self::new()
    }
}

/// Integer register file x0..x31. x0 is hard-wired to zero.
pub type RegFile = GenericRegFile<32, true>;

/// Table entry for CSR declaration: address and reset value.
#[derive(Clone, Copy)]
pub struct CsrEntry {
    pub addr: u16,
    pub reset: u32,
}

/// The machine-mode CSRs the emulator implements.
pub const MACHINE_CSRS: &[CsrEntry] = &[
    CsrEntry { addr: CSR_MSTATUS, reset: 0 },
    CsrEntry { addr: CSR_MEPC, reset: 0 },
    CsrEntry { addr: CSR_MCAUSE, reset: 0 },
    CsrEntry { addr: CSR_MTVAL, reset: 0 },
];

/// CSR bank restricted to a declared set of addresses.
///
/// Accesses to undeclared addresses return `None` instead of silently
/// creating a register.
#[derive(Clone, Debug, Default)]
pub struct CsrBank {
    table: BTreeMap<u16, u32>,
}

impl CsrBank {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a batch of CSRs declared as a table.
    pub fn register(&mut self, entries: &[CsrEntry]) {
        for e in entries {
            self.table.insert(e.addr, e.reset);
        }
    }

    #[inline]
    pub fn read(&self, addr: u16) -> Option<u32> {
        self.table.get(&addr).copied()
    }

    /// Returns `None` when `addr` was never registered.
    #[inline]
    pub fn write(&mut self, addr: u16, value: u32) -> Option<()> {
        self.table.get_mut(&addr).map(|slot| *slot = value)
    }

    /// Registered CSRs in address order, named where a name is known.
    pub fn iter(&self) -> impl Iterator<Item = (u16, Option<&'static str>, u32)> + '_ {
        self.table
            .iter()
            .map(|(&addr, &value)| (addr, csr_name(addr), value))
    }
}

/// Aggregated architectural state.
#[derive(Clone, Debug)]
pub struct Status {
    pub int: RegFile,
    pub csr: CsrBank,
}

impl Default for Status {
    fn default() -> Self {
        Self::new()
    }
}

impl Status {
    pub fn new() -> Self {
        let mut csr = CsrBank::new();
        csr.register(MACHINE_CSRS);
        Self {
            int: RegFile::new(),
            csr,
        }
    }
}
