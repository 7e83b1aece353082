//! 程序镜像加载
//!
//! 默认按裸二进制读入，放在调用方给定的基地址。文件以 ELF 魔数开头时解析
//! 其 PT_LOAD 段，并展开为一段以最低段地址为基址的连续镜像。

use std::fs;
use std::path::Path;

use elf::ElfBytes;
use elf::abi::{EM_RISCV, PT_LOAD};
use elf::endian::AnyEndian;
use thiserror::Error;

use crate::error::{CosimError, Result};

const ELF_MAGIC: [u8; 4] = [0x7f, b'E', b'L', b'F'];

/// 展开后镜像的最大跨度
pub const MAX_IMAGE_SPAN: u64 = 64 << 20;

#[derive(Debug, Error)]
pub enum ImageError {
    #[error("malformed ELF: {0}")]
    Elf(String),

    #[error("not a RISC-V ELF (machine type 0x{0:x})")]
    NotRiscv(u16),

    #[error("only 32-bit ELF is supported")]
    Not32Bit,

    #[error("ELF has no loadable segments")]
    NoLoadSegments,

    #[error("loadable segments span 0x{span:x} bytes (limit 0x{limit:x})", limit = MAX_IMAGE_SPAN)]
    SpanTooLarge { span: u64 },
}

/// 已加载的程序镜像
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramImage {
    pub base: u32,
    pub bytes: Vec<u8>,
    /// ELF 入口点；裸二进制为 `None`
    pub entry: Option<u32>,
}

impl ProgramImage {
    /// 读取镜像文件，裸二进制放在 `base`
    pub fn load(path: &Path, base: u32) -> Result<Self> {
        let data = fs::read(path).map_err(|source| CosimError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let image = Self::from_bytes(data, base)?;
        log::debug!(
            "loaded {} ({} bytes at 0x{:08x})",
            path.display(),
            image.bytes.len(),
            image.base
        );
        Ok(image)
    }

    pub fn from_bytes(data: Vec<u8>, base: u32) -> Result<Self, ImageError> {
        if data.starts_with(&ELF_MAGIC) {
            Self::from_elf(&data)
        } else {
            Ok(Self {
                base,
                bytes: data,
                entry: None,
            })
        }
    }

    fn from_elf(data: &[u8]) -> Result<Self, ImageError> {
        let elf_file = ElfBytes::<AnyEndian>::minimal_parse(data)
            .map_err(|e| ImageError::Elf(e.to_string()))?;

        let header = &elf_file.ehdr;
        if header.e_machine != EM_RISCV {
            return Err(ImageError::NotRiscv(header.e_machine));
        }
        if header.class != elf::file::Class::ELF32 {
            return Err(ImageError::Not32Bit);
        }

        // (vaddr, memsz, data)
        let mut segments = Vec::new();
        if let Some(phdrs) = elf_file.segments() {
            for phdr in phdrs.iter().filter(|p| p.p_type == PT_LOAD && p.p_memsz > 0) {
                let bytes = elf_file
                    .segment_data(&phdr)
                    .map_err(|e| ImageError::Elf(e.to_string()))?;
                segments.push((phdr.p_vaddr, phdr.p_memsz, bytes));
            }
        }

        let (Some(lo), Some(hi)) = (
            segments.iter().map(|s| s.0).min(),
            segments.iter().map(|s| s.0 + s.1).max(),
        ) else {
            return Err(ImageError::NoLoadSegments);
        };
        let span = hi - lo;
        if span > MAX_IMAGE_SPAN || hi > 1 << 32 {
            return Err(ImageError::SpanTooLarge { span });
        }

        // 段间空洞与 .bss 均补零
        let mut bytes = vec![0u8; span as usize];
        for (vaddr, memsz, data) in &segments {
            let start = (vaddr - lo) as usize;
            let len = data.len().min(*memsz as usize);
            bytes[start..start + len].copy_from_slice(&data[..len]);
        }

        Ok(Self {
            base: lo as u32,
            bytes,
            entry: Some(header.e_entry as u32),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    /// 构造只含一个 PT_LOAD 段的 ELF32 小端 RISC-V 可执行文件
    fn tiny_elf(vaddr: u32, code: &[u8], memsz: u32, machine: u16) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&ELF_MAGIC);
        out.extend_from_slice(&[1, 1, 1, 0]); // ELF32, LE, version 1, SysV
        out.extend_from_slice(&[0; 8]);
        out.extend_from_slice(&2u16.to_le_bytes()); // ET_EXEC
        out.extend_from_slice(&machine.to_le_bytes());
        out.extend_from_slice(&1u32.to_le_bytes());
        out.extend_from_slice(&vaddr.to_le_bytes()); // e_entry
        out.extend_from_slice(&52u32.to_le_bytes()); // e_phoff
        out.extend_from_slice(&0u32.to_le_bytes()); // e_shoff
        out.extend_from_slice(&0u32.to_le_bytes()); // e_flags
        out.extend_from_slice(&52u16.to_le_bytes()); // e_ehsize
        out.extend_from_slice(&32u16.to_le_bytes()); // e_phentsize
        out.extend_from_slice(&1u16.to_le_bytes()); // e_phnum
        out.extend_from_slice(&40u16.to_le_bytes()); // e_shentsize
        out.extend_from_slice(&0u16.to_le_bytes()); // e_shnum
        out.extend_from_slice(&0u16.to_le_bytes()); // e_shstrndx
        assert_eq!(out.len(), 52);

        for field in [
            1u32, // PT_LOAD
            84,   // p_offset
            vaddr,
            vaddr,
            code.len() as u32,
            memsz,
            5, // R+X
            4,
        ] {
            out.extend_from_slice(&field.to_le_bytes());
        }
        out.extend_from_slice(code);
        out
    }

    #[test]
    fn test_raw_binary_keeps_base() {
        let image = ProgramImage::from_bytes(vec![0x13, 0, 0, 0], 0x100).unwrap();
        assert_eq!(image.base, 0x100);
        assert_eq!(image.bytes, vec![0x13, 0, 0, 0]);
        assert_eq!(image.entry, None);
    }

    #[test]
    fn test_elf_segments_flattened() {
        let code = 0x00700293u32.to_le_bytes();
        let data = tiny_elf(0x2000, &code, 8, EM_RISCV);
        let image = ProgramImage::from_bytes(data, 0).unwrap();
        assert_eq!(image.base, 0x2000);
        assert_eq!(image.entry, Some(0x2000));
        // memsz 超出 filesz 的部分补零
        assert_eq!(image.bytes, vec![0x93, 0x02, 0x70, 0x00, 0, 0, 0, 0]);
    }

    #[test]
    fn test_elf_wrong_machine() {
        let data = tiny_elf(0, &[0; 4], 4, 0x3E);
        let err = ProgramImage::from_bytes(data, 0).unwrap_err();
        assert!(matches!(err, ImageError::NotRiscv(0x3E)));
    }

    #[test]
    fn test_load_missing_file() {
        let err = ProgramImage::load(Path::new("/nonexistent/start.bin"), 0).unwrap_err();
        assert!(matches!(err, CosimError::Io { .. }));
    }
}
