use crate::elf::ElfImage;
use crate::maps::{LibraryId, MapEntry, ProcessMaps};
use anyhow::{Context, Result, bail};
use log::{debug, error, info, warn};
use nix::sys::mman::{self, ProtFlags};
use nix::unistd::{self, SysconfVar};
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::ffi::c_void;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicPtr, AtomicUsize, Ordering};
use zyscope_misc::debug_on;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum HookState {
    Registered,
    Committed,
    Failed,
}

struct HookRecord {
    library: LibraryId,
    symbol: String,
    replacement: *mut c_void,
    original: &'static AtomicPtr<c_void>,
    state: HookState,
}

/// Pending and installed redirections, keyed by (library, symbol).
///
/// Nothing is written until [`HookRegistry::commit`]. Installed hooks are
/// never removed.
#[derive(Default)]
pub struct HookRegistry {
    records: Vec<HookRecord>,
}

fn page_size() -> Result<usize> {
    let size = unistd::sysconf(SysconfVar::PAGE_SIZE)?.context("page size unavailable")?;
    Ok(size as usize)
}

/// Points the word at `slot` to `value`, lifting write protection for the duration.
///
/// The value the slot held is published into `original` before the slot
/// changes, so the replacement can always chain. The first real target wins;
/// a second slot normally holds the same address. Returns `false` when the
/// slot already held `value`.
unsafe fn rewrite_slot(
    slot: usize,
    value: usize,
    original: &AtomicPtr<c_void>,
    vma: &MapEntry,
    page_size: usize,
) -> Result<bool> {
    let cell = unsafe { AtomicUsize::from_ptr(slot as *mut usize) };

    let current = cell.load(Ordering::Acquire);
    if current == value {
        return Ok(false);
    }

    let _ = original.compare_exchange(
        std::ptr::null_mut(),
        current as _,
        Ordering::AcqRel,
        Ordering::Acquire,
    );

    let prot = vma.protection();
    let writable = prot.contains(ProtFlags::PROT_WRITE);
    let page = NonNull::new((slot & !(page_size - 1)) as *mut c_void).context("null slot page")?;

    if !writable {
        unsafe { mman::mprotect(page, page_size, prot | ProtFlags::PROT_WRITE)? };
    }

    cell.store(value, Ordering::Release);

    // the redirection is live at this point
    if !writable && let Err(err) = unsafe { mman::mprotect(page, page_size, prot) } {
        warn!("failed to restore protection of {page:p}: {err}");
    }

    Ok(true)
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records intent to send calls of `symbol` made by `library` to `replacement`.
    ///
    /// On commit, the address the slot held before is stored into `original`.
    pub fn register(
        &mut self,
        library: LibraryId,
        symbol: &str,
        replacement: *const c_void,
        original: &'static AtomicPtr<c_void>,
    ) -> &mut Self {
        let duplicate = self
            .records
            .iter()
            .any(|it| it.library == library && it.symbol == symbol);

        if duplicate {
            debug!("{symbol} already registered for {library:?}");
            return self;
        }

        self.records.push(HookRecord {
            library,
            symbol: symbol.into(),
            replacement: replacement as _,
            original,
            state: HookState::Registered,
        });

        self
    }

    pub fn state(&self, library: LibraryId, symbol: &str) -> Option<HookState> {
        self.records
            .iter()
            .find(|it| it.library == library && it.symbol == symbol)
            .map(|it| it.state)
    }

    /// Installs every registered hook.
    ///
    /// Returns `true` when all records are installed. A record that fails stays
    /// failed; the others are still installed.
    pub fn commit(&mut self) -> bool {
        let pending = self
            .records
            .iter()
            .any(|it| it.state == HookState::Registered);

        if pending && let Err(err) = self.commit_pending() {
            error!("hook commit failed: {err:?}");

            self.records
                .iter_mut()
                .filter(|it| it.state == HookState::Registered)
                .for_each(|it| it.state = HookState::Failed);
        }

        self.records.iter().all(|it| it.state == HookState::Committed)
    }

    fn commit_pending(&mut self) -> Result<()> {
        let maps = ProcessMaps::scan().context("failed to scan memory maps")?;
        let page_size = page_size()?;
        let mut images: HashMap<LibraryId, ElfImage> = HashMap::new();

        for record in &mut self.records {
            if record.state != HookState::Registered {
                continue;
            }

            let result = Self::install(record, &maps, &mut images, page_size);

            record.state = match result {
                Ok(()) => HookState::Committed,
                Err(err) => {
                    error!("failed to hook {}: {err:?}", record.symbol);
                    HookState::Failed
                }
            };
        }

        Ok(())
    }

    fn install(
        record: &HookRecord,
        maps: &ProcessMaps,
        images: &mut HashMap<LibraryId, ElfImage>,
        page_size: usize,
    ) -> Result<()> {
        let library = maps
            .library(record.library)
            .with_context(|| format!("{:?} is not mapped", record.library))?;

        let image = match images.entry(record.library) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(ElfImage::open(&library.path)?),
        };

        let slots = image.slots(&record.symbol)?;
        if slots.is_empty() {
            bail!("no slot for {} in {}", record.symbol, library.path.display());
        }

        let bias = library.base.wrapping_sub(image.load_address(page_size)?);
        let replacement = record.replacement as usize;

        for slot in slots {
            let addr = bias.wrapping_add(slot);
            let vma = maps
                .find_vma(addr)
                .with_context(|| format!("slot {addr:#x} is not mapped"))?;

            if debug_on!("plthook") {
                debug!("{} slot {addr:#x} in {vma:?}", record.symbol);
            }

            let redirected =
                unsafe { rewrite_slot(addr, replacement, record.original, vma, page_size)? };

            if !redirected {
                debug!("{} slot {addr:#x} already redirected", record.symbol);
            }
        }

        info!(
            "redirected {} in {} to {:p}",
            record.symbol,
            library.path.display(),
            record.replacement
        );

        Ok(())
    }
}
