//! C ABI for the reference emulator
//!
//! Handles are opaque 64-bit values wrapping a boxed `RvEmu`. A zero handle
//! (what `rvemu_new` returns on failure) is inert: every entry point returns
//! its zero value for it. Any other handle must come from `rvemu_new` and not
//! yet have been passed to `rvemu_free`.

use std::slice;

use super::{ReferenceEmulator, RvEmu};
use crate::writeback::WritebackRecord;

/// Writeback outcome in the layout expected by C callers.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WbStatus {
    pub wb_have_inst: u32,
    pub wb_pc: u32,
    pub wb_rd: u32,
    pub wb_val: u32,
    pub wb_ena: u32,
    pub inst_valid: u32,
}

impl From<WritebackRecord> for WbStatus {
    fn from(rec: WritebackRecord) -> Self {
        Self {
            wb_have_inst: rec.has_instruction as u32,
            wb_pc: rec.pc,
            wb_rd: rec.rd as u32,
            wb_val: rec.value,
            wb_ena: rec.write_enabled as u32,
            inst_valid: rec.instruction_valid as u32,
        }
    }
}

impl From<WbStatus> for WritebackRecord {
    fn from(wb: WbStatus) -> Self {
        Self {
            has_instruction: wb.wb_have_inst != 0,
            pc: wb.wb_pc,
            write_enabled: wb.wb_ena != 0,
            rd: (wb.wb_rd & 0x1F) as u8,
            value: wb.wb_val,
            instruction_valid: wb.inst_valid != 0,
        }
    }
}

unsafe fn image<'a>(ptr: *const u8, len: u32) -> &'a [u8] {
    if ptr.is_null() || len == 0 {
        &[]
    } else {
        // SAFETY: caller guarantees `ptr` points to `len` readable bytes.
        unsafe { slice::from_raw_parts(ptr, len as usize) }
    }
}

/// `None` for the zero handle.
unsafe fn handle<'a>(emu: u64) -> Option<&'a mut RvEmu> {
    // SAFETY: caller guarantees a non-zero `emu` came from `rvemu_new` and is live.
    unsafe { (emu as usize as *mut RvEmu).as_mut() }
}

/// Create an emulator. Returns 0 when the layout is rejected.
///
/// # Safety
/// `user_ptr`/`kernel_ptr` must point to `user_len`/`kernel_len` readable bytes
/// (or be null with a zero length).
#[unsafe(no_mangle)]
#[allow(clippy::too_many_arguments)]
pub unsafe extern "C" fn rvemu_new(
    user_ptr: *const u8,
    user_base: u32,
    user_len: u32,
    kernel_ptr: *const u8,
    kernel_base: u32,
    kernel_len: u32,
    dram_base: u32,
    dram_size: u32,
) -> u64 {
    let (user, kernel) = unsafe { (image(user_ptr, user_len), image(kernel_ptr, kernel_len)) };
    match RvEmu::new(user, user_base, kernel, kernel_base, dram_base, dram_size) {
        Ok(emu) => Box::into_raw(Box::new(emu)) as usize as u64,
        Err(e) => {
            log::error!("rvemu_new: {e}");
            0
        }
    }
}

/// # Safety
/// `emu` must be 0 or a live handle; it is invalid afterwards.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn rvemu_free(emu: u64) {
    if emu == 0 {
        return;
    }
    drop(unsafe { Box::from_raw(emu as usize as *mut RvEmu) });
}

/// # Safety
/// `emu` must be 0 or a live handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn rvemu_execute(emu: u64, inst: u32) -> WbStatus {
    match unsafe { handle(emu) } {
        Some(emu) => emu.execute(inst).into(),
        None => WbStatus::default(),
    }
}

/// Returns 0 when the PC is outside both images.
///
/// # Safety
/// `emu` must be 0 or a live handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn rvemu_fetch(emu: u64) -> u32 {
    let Some(emu) = (unsafe { handle(emu) }) else {
        return 0;
    };
    match emu.fetch() {
        Ok(inst) => inst,
        Err(e) => {
            log::warn!("rvemu_fetch: {e}");
            0
        }
    }
}

/// # Safety
/// `emu` must be 0 or a live handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn rvemu_pc_step(emu: u64) {
    if let Some(emu) = unsafe { handle(emu) } {
        emu.step_pc();
    }
}

/// # Safety
/// `emu` must be 0 or a live handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn rvemu_dump(emu: u64) {
    match unsafe { handle(emu) } {
        Some(emu) => println!("{}", emu.dump()),
        None => log::warn!("rvemu_dump: null handle"),
    }
}

/// # Safety
/// `emu` must be 0 or a live handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn rvemu_pc(emu: u64) -> u32 {
    unsafe { handle(emu) }.map_or(0, |emu| emu.pc())
}

#[unsafe(no_mangle)]
pub extern "C" fn disasm(inst: u32) {
    println!("{}", crate::isa::disasm(inst));
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_c_abi_round_trip() {
        // addi t0, zero, 7; then an illegal word
        let user: Vec<u8> = [0x00700293u32, 0xFFFF_FFFF]
            .iter()
            .flat_map(|w| w.to_le_bytes())
            .collect();
        let kernel = [0u8; 0];

        unsafe {
            let emu = rvemu_new(
                user.as_ptr(),
                0,
                user.len() as u32,
                kernel.as_ptr(),
                0x1c09_0000,
                0,
                0,
                0x1000,
            );
            assert_ne!(emu, 0);
            assert_eq!(rvemu_pc(emu), 0);

            let inst = rvemu_fetch(emu);
            assert_eq!(inst, 0x00700293);
            rvemu_pc_step(emu);
            let wb = rvemu_execute(emu, inst);
            assert_eq!(
                wb,
                WbStatus {
                    wb_have_inst: 1,
                    wb_pc: 0,
                    wb_rd: 5,
                    wb_val: 7,
                    wb_ena: 1,
                    inst_valid: 1,
                }
            );

            let inst = rvemu_fetch(emu);
            rvemu_pc_step(emu);
            assert_eq!(rvemu_execute(emu, inst), WbStatus::default());

            rvemu_free(emu);
        }
    }

    #[test]
    fn test_new_rejects_bad_layout() {
        let emu = unsafe { rvemu_new(std::ptr::null(), 0, 0, std::ptr::null(), 0, 0, 0, 0) };
        assert_eq!(emu, 0);
        unsafe { rvemu_free(emu) };
    }

    #[test]
    fn test_zero_handle_is_inert() {
        unsafe {
            assert_eq!(rvemu_execute(0, 0x00700293), WbStatus::default());
            assert_eq!(rvemu_fetch(0), 0);
            assert_eq!(rvemu_pc(0), 0);
            rvemu_pc_step(0);
            rvemu_dump(0);
        }
    }

    #[test]
    fn test_wb_status_conversion() {
        let rec = WritebackRecord::retired(0x40, 10, 0xabc);
        let wb = WbStatus::from(rec);
        assert_eq!(WritebackRecord::from(wb), rec);
    }
}
