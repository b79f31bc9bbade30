//! Symbol resolution for instruction addresses
//!
//! Maps an instruction address to `symbol+offset (file:line)` text using the
//! instrumented binary's symbol table and DWARF line data. The tracking core
//! treats locations as opaque strings behind the `Describe` trait, so hosts
//! with their own debug-info service can plug in a different resolver; this
//! module provides the in-repo implementations used by the replay driver.
//!
//! Uses addr2line crate for robust DWARF parsing.

use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result};
use object::{Object, ObjectSection};

use crate::classifier::Describe;

/// The symbol map carries no sizes; cap how far past a symbol's start an
/// address may be before the attribution is dropped as meaningless.
const MAX_SYMBOL_OFFSET: u64 = 1 << 20;

/// Location resolver backed by the binary's symbol table and DWARF data.
pub struct DwarfDescriber {
    /// addr2line context for DWARF line lookups.
    ///
    /// `addr2line::Context` memoizes lookups through interior `OnceCell`s and
    /// is therefore `!Sync`; the `Mutex` restores the `Sync` the `Describe`
    /// trait requires without altering lookup behavior.
    context: std::sync::Mutex<addr2line::Context<gimli::EndianArcSlice<gimli::RunTimeEndian>>>,
    /// Owned symbol table, sorted by address
    symbols: Vec<(u64, String)>,
}

impl DwarfDescriber {
    /// Load symbols and DWARF debug info from an ELF binary.
    pub fn load(binary_path: &Path) -> Result<Self> {
        if !binary_path.exists() {
            anyhow::bail!("Binary does not exist: {}", binary_path.display());
        }

        let file = File::open(binary_path)
            .with_context(|| format!("Failed to open binary: {}", binary_path.display()))?;

        let mmap = unsafe { memmap2::Mmap::map(&file) }.context("Failed to memory-map binary")?;

        let object = object::File::parse(&*mmap).context("Failed to parse ELF binary")?;

        let mut symbols: Vec<(u64, String)> = object
            .symbol_map()
            .symbols()
            .iter()
            .filter(|sym| sym.address() != 0 && !sym.name().is_empty())
            .map(|sym| (sym.address(), sym.name().to_string()))
            .collect();
        symbols.sort_by_key(|&(addr, _)| addr);

        let endian = if object.is_little_endian() {
            gimli::RunTimeEndian::Little
        } else {
            gimli::RunTimeEndian::Big
        };

        // Helper to load a DWARF section
        let load_section =
            |id: gimli::SectionId| -> Result<gimli::EndianArcSlice<gimli::RunTimeEndian>> {
                let data = object
                    .section_by_name(id.name())
                    .and_then(|section| section.uncompressed_data().ok())
                    .unwrap_or(std::borrow::Cow::Borrowed(&[]));
                let bytes: std::sync::Arc<[u8]> = std::sync::Arc::from(data.into_owned());
                Ok(gimli::EndianArcSlice::new(bytes, endian))
            };

        let dwarf = gimli::Dwarf::load(&load_section).context(
            "Failed to load DWARF sections - binary may not have debug symbols. Compile with -g flag.",
        )?;

        let context =
            addr2line::Context::from_dwarf(dwarf).context("Failed to create DWARF context")?;

        Ok(Self {
            context: std::sync::Mutex::new(context),
            symbols,
        })
    }

    /// Nearest symbol at or before `addr`, rendered as `name` or
    /// `name+0xoff`.
    fn nearest_symbol(&self, addr: u64) -> Option<String> {
        let idx = self.symbols.partition_point(|&(sym_addr, _)| sym_addr <= addr);
        let (sym_addr, name) = self.symbols.get(idx.checked_sub(1)?)?;
        let offset = addr - sym_addr;
        if offset > MAX_SYMBOL_OFFSET {
            return None;
        }
        if offset == 0 {
            Some(name.clone())
        } else {
            Some(format!("{name}+{offset:#x}"))
        }
    }

    /// `file:line` from DWARF line data, if the address resolves.
    fn source_line(&self, addr: u64) -> Option<String> {
        let context = self.context.lock().unwrap();
        let location = context.find_location(addr).ok().flatten()?;
        let file = location.file?;
        let line = location.line.filter(|&line| line != 0)?;
        Some(format!("{file}:{line}"))
    }
}

impl Describe for DwarfDescriber {
    fn describe(&self, addr: u64) -> String {
        match (self.nearest_symbol(addr), self.source_line(addr)) {
            (Some(symbol), Some(source)) => format!("{symbol} ({source})"),
            (Some(symbol), None) => symbol,
            (None, Some(source)) => format!("{addr:#x} ({source})"),
            (None, None) => format!("{addr:#x}"),
        }
    }
}

/// Fallback resolver for binaries without symbols: raw hex addresses.
#[derive(Debug, Clone, Copy, Default)]
pub struct HexDescriber;

impl Describe for HexDescriber {
    fn describe(&self, addr: u64) -> String {
        format!("{addr:#x}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::process::Command;
    use tempfile::TempDir;

    fn compile_test_binary() -> (TempDir, std::path::PathBuf) {
        let temp_dir = TempDir::new().unwrap();
        let src_file = temp_dir.path().join("test.rs");
        let bin_file = temp_dir.path().join("test_bin");

        fs::write(&src_file, "fn main() { println!(\"test\"); }").unwrap();

        Command::new("rustc")
            .arg(&src_file)
            .arg("-o")
            .arg(&bin_file)
            .arg("-g")
            .status()
            .unwrap();

        (temp_dir, bin_file)
    }

    #[test]
    fn test_dwarf_describer_loads() {
        let (_temp_dir, bin_file) = compile_test_binary();
        let result = DwarfDescriber::load(&bin_file);
        assert!(result.is_ok(), "Should load describer: {:?}", result.err());
    }

    #[test]
    fn test_load_rejects_missing_binary() {
        let result = DwarfDescriber::load(Path::new("/no/such/binary"));
        assert!(result.is_err());
    }

    #[test]
    fn test_describe_never_fails() {
        let (_temp_dir, bin_file) = compile_test_binary();
        let describer = DwarfDescriber::load(&bin_file).unwrap();
        // Unmapped address degrades to hex rather than erroring.
        assert_eq!(describer.describe(0x4), "0x4");
        // A real symbol address resolves to its name.
        let &(addr, ref name) = describer.symbols.first().unwrap();
        assert!(describer.describe(addr).starts_with(name.as_str()));
    }

    #[test]
    fn test_hex_describer_formats_address() {
        assert_eq!(HexDescriber.describe(0x2010), "0x2010");
        assert_eq!(HexDescriber.describe(0), "0x0");
    }
}
