use anyhow::Result;
use nix::sys::mman::ProtFlags;
use nix::sys::stat;
use procfs::process::{MMPermissions, MMapPath, MemoryMap, Process};
use std::path::PathBuf;

/// Identity of a mapped file, stable across all of its mappings.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct LibraryId {
    pub dev: u64,
    pub inode: u64,
}

#[derive(Debug, Clone)]
pub struct MapEntry {
    pub path: Option<PathBuf>,
    pub dev: u64,
    pub inode: u64,
    pub start: usize,
    pub end: usize,
    pub offset: u64,
    pub perms: MMPermissions,
}

impl From<MemoryMap> for MapEntry {
    fn from(map: MemoryMap) -> Self {
        let (major, minor) = map.dev;

        Self {
            path: match map.pathname {
                MMapPath::Path(path) => Some(path),
                _ => None,
            },
            dev: stat::makedev(major as _, minor as _) as _,
            inode: map.inode,
            start: map.address.0 as _,
            end: map.address.1 as _,
            offset: map.offset,
            perms: map.perms,
        }
    }
}

impl MapEntry {
    pub fn library_id(&self) -> LibraryId {
        LibraryId {
            dev: self.dev,
            inode: self.inode,
        }
    }

    pub fn contains(&self, addr: usize) -> bool {
        self.start <= addr && addr < self.end
    }

    pub fn protection(&self) -> ProtFlags {
        let mut prot = ProtFlags::PROT_NONE;

        if self.perms.contains(MMPermissions::READ) {
            prot |= ProtFlags::PROT_READ;
        }
        if self.perms.contains(MMPermissions::WRITE) {
            prot |= ProtFlags::PROT_WRITE;
        }
        if self.perms.contains(MMPermissions::EXECUTE) {
            prot |= ProtFlags::PROT_EXEC;
        }

        prot
    }
}

/// Where a file-backed image starts in this process.
#[derive(Debug, Clone)]
pub struct LoadedLibrary {
    pub path: PathBuf,
    pub base: usize,
}

/// Snapshot of `/proc/self/maps`, in address order.
pub struct ProcessMaps(Vec<MapEntry>);

impl ProcessMaps {
    pub fn scan() -> Result<Self> {
        let maps = Process::myself()?.maps()?;
        Ok(Self(maps.into_iter().map(MapEntry::from).collect()))
    }

    /// First file-backed entry whose path contains `fragment`.
    pub fn find_first(&self, fragment: &str) -> Option<&MapEntry> {
        self.0.iter().find(|entry| {
            entry
                .path
                .as_ref()
                .is_some_and(|path| path.to_string_lossy().contains(fragment))
        })
    }

    pub fn find_vma(&self, addr: usize) -> Option<&MapEntry> {
        self.0.iter().find(|entry| entry.contains(addr))
    }

    /// The lowest mapping of `id` that starts at file offset zero.
    pub fn library(&self, id: LibraryId) -> Option<LoadedLibrary> {
        self.0
            .iter()
            .filter(|entry| entry.library_id() == id && entry.offset == 0)
            .min_by_key(|entry| entry.start)
            .and_then(|entry| {
                Some(LoadedLibrary {
                    path: entry.path.clone()?,
                    base: entry.start,
                })
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[inline(never)]
    fn code_address() -> usize {
        code_address as usize
    }

    #[test]
    fn finds_the_running_executable() {
        let maps = ProcessMaps::scan().unwrap();
        let exe = std::env::current_exe().unwrap();
        let name = exe.file_name().unwrap().to_string_lossy();

        let first = maps.find_first(&name).expect("executable not mapped");
        let code = maps.find_vma(code_address()).expect("code not mapped");

        assert_eq!(first.library_id(), code.library_id());
        assert!(code.perms.contains(MMPermissions::EXECUTE));

        let library = maps.library(code.library_id()).unwrap();
        assert!(library.base <= code_address());
        assert!(library.base <= code.start);
    }

    #[test]
    fn unmapped_fragment_is_not_found() {
        let maps = ProcessMaps::scan().unwrap();
        assert!(maps.find_first("/apex/com.android.art/bin/dex2oat").is_none());
    }

    #[test]
    fn unknown_identity_has_no_library() {
        let maps = ProcessMaps::scan().unwrap();
        let id = LibraryId {
            dev: u64::MAX,
            inode: u64::MAX,
        };

        assert!(maps.library(id).is_none());
    }

    #[test]
    fn protection_follows_permissions() {
        let entry = MapEntry {
            path: None,
            dev: 0,
            inode: 0,
            start: 0x1000,
            end: 0x2000,
            offset: 0,
            perms: MMPermissions::READ | MMPermissions::PRIVATE,
        };

        assert_eq!(entry.protection(), ProtFlags::PROT_READ);
        assert!(entry.contains(0x1fff));
        assert!(!entry.contains(0x2000));
    }
}
