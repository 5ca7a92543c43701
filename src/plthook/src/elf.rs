use anyhow::{Context, Result};
use object::elf;
use object::{
    Object, ObjectSegment, ObjectSymbol, ObjectSymbolTable, RelocationFlags, RelocationTarget,
};
use std::fs;
use std::path::Path;

// relocations whose target is a pointer-sized slot holding a symbol's address
#[cfg(target_arch = "aarch64")]
const SLOT_TYPES: [u32; 2] = [elf::R_AARCH64_JUMP_SLOT, elf::R_AARCH64_GLOB_DAT];
#[cfg(target_arch = "x86_64")]
const SLOT_TYPES: [u32; 2] = [elf::R_X86_64_JUMP_SLOT, elf::R_X86_64_GLOB_DAT];
#[cfg(target_arch = "arm")]
const SLOT_TYPES: [u32; 2] = [elf::R_ARM_JUMP_SLOT, elf::R_ARM_GLOB_DAT];
#[cfg(target_arch = "x86")]
const SLOT_TYPES: [u32; 2] = [elf::R_386_JMP_SLOT, elf::R_386_GLOB_DAT];

/// On-disk copy of a mapped ELF image.
pub struct ElfImage {
    data: Vec<u8>,
}

impl ElfImage {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;

        Ok(Self { data })
    }

    fn file(&self) -> Result<object::File<'_>> {
        Ok(object::File::parse(self.data.as_slice())?)
    }

    /// Link-time address of the first loadable segment, rounded down to a page.
    pub fn load_address(&self, page_size: usize) -> Result<usize> {
        let lowest = self
            .file()?
            .segments()
            .map(|segment| segment.address())
            .min()
            .context("no loadable segment")?;

        Ok(lowest as usize & !(page_size - 1))
    }

    /// Link-time addresses of every slot bound to `symbol`.
    pub fn slots(&self, symbol: &str) -> Result<Vec<usize>> {
        let file = self.file()?;
        let dynsym = file
            .dynamic_symbol_table()
            .context("no dynamic symbol table")?;
        let relocations = file
            .dynamic_relocations()
            .context("no dynamic relocations")?;

        let slots = relocations
            .filter(|(_, reloc)| {
                matches!(reloc.flags(), RelocationFlags::Elf { r_type } if SLOT_TYPES.contains(&r_type))
            })
            .filter(|(_, reloc)| match reloc.target() {
                RelocationTarget::Symbol(index) => dynsym
                    .symbol_by_index(index)
                    .and_then(|sym| sym.name())
                    .is_ok_and(|name| name == symbol),
                _ => false,
            })
            .map(|(offset, _)| offset as usize)
            .collect();

        Ok(slots)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_imported_libc_slot() {
        // keep the import alive in this binary
        let _ = unsafe { nix::libc::getppid() };

        let image = ElfImage::open(std::env::current_exe().unwrap()).unwrap();

        assert!(!image.slots("getppid").unwrap().is_empty());
        assert!(image.slots("zyscope_no_such_symbol").unwrap().is_empty());
    }

    #[test]
    fn rejects_non_elf() {
        let image = ElfImage {
            data: b"definitely not an elf".to_vec(),
        };

        assert!(image.slots("getppid").is_err());
    }
}
