//! Replacement for `art::CompilerOptions::CompilerOptions()`.
//!
//! The runtime stores `inline_max_code_units_` as `-1` ("no limit") after
//! construction. Its offset is not stable across builds, so the first word
//! holding that value inside a small window is taken to be the field and
//! set to zero, which disables inlining.

use crate::config::OatHookConfigs;
use log::{debug, error, warn};
use std::env;
use std::ffi::c_void;
use std::mem;
use std::ptr;
use std::slice;
use std::sync::atomic::{AtomicPtr, Ordering};

pub const SENTINEL: usize = usize::MAX;

type CompilerOptionsCtor = unsafe extern "C" fn(*mut c_void);

pub static ORIGINAL_CTOR: AtomicPtr<c_void> = AtomicPtr::new(ptr::null_mut());

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PatchOutcome {
    Patched(usize),
    Miss,
}

/// Zeroes the first word equal to [`SENTINEL`] and stops.
pub fn zero_first_sentinel(words: &mut [usize]) -> PatchOutcome {
    match words.iter().position(|word| *word == SENTINEL) {
        Some(index) => {
            words[index] = 0;
            PatchOutcome::Patched(index)
        }
        None => PatchOutcome::Miss,
    }
}

/// # Safety
///
/// `object` must be word aligned and valid for reads and writes of
/// `words` machine words.
pub unsafe fn patch_object(object: *mut c_void, words: usize) -> PatchOutcome {
    let window = unsafe { slice::from_raw_parts_mut(object as *mut usize, words) };
    zero_first_sentinel(window)
}

pub extern "C" fn compiler_options_ctor(this: *mut c_void) {
    // must not leak into the compiler's own children
    unsafe { env::remove_var("LD_PRELOAD") };

    let original = ORIGINAL_CTOR.load(Ordering::Acquire);
    if original.is_null() {
        error!("original CompilerOptions constructor is not resolved");
        return;
    }

    let original: CompilerOptionsCtor = unsafe { mem::transmute(original) };
    unsafe { original(this) };

    let words = OatHookConfigs::instance().scan_words;

    match unsafe { patch_object(this, words) } {
        PatchOutcome::Patched(index) => debug!("inlining disabled at word {index}"),
        PatchOutcome::Miss => warn!(
            "no word equal to -1 within the first {words} words of CompilerOptions, inlining stays enabled"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zeroes_only_the_sentinel() {
        let mut words = [0usize; 10];
        words[3] = SENTINEL;

        assert_eq!(zero_first_sentinel(&mut words), PatchOutcome::Patched(3));
        assert_eq!(words, [0usize; 10]);
    }

    #[test]
    fn first_match_wins() {
        let mut words = [7, SENTINEL, 9, SENTINEL];

        assert_eq!(zero_first_sentinel(&mut words), PatchOutcome::Patched(1));
        assert_eq!(words, [7, 0, 9, SENTINEL]);
    }

    #[test]
    fn miss_leaves_object_untouched() {
        let mut words: Vec<usize> = (0..10).map(|it| it * 0x1111).collect();
        let before = words.clone();

        assert_eq!(zero_first_sentinel(&mut words), PatchOutcome::Miss);
        assert_eq!(words, before);
    }

    #[test]
    fn window_bounds_the_scan() {
        let mut object = [0usize; 16];
        object[10] = SENTINEL;

        let outcome = unsafe { patch_object(object.as_mut_ptr() as _, 10) };

        assert_eq!(outcome, PatchOutcome::Miss);
        assert_eq!(object[10], SENTINEL);
    }

    static FAKE_CTOR_CALLS: AtomicPtr<c_void> = AtomicPtr::new(ptr::null_mut());

    extern "C" fn fake_ctor(this: *mut c_void) {
        FAKE_CTOR_CALLS.store(this, Ordering::Release);

        let words = unsafe { slice::from_raw_parts_mut(this as *mut usize, 12) };
        words.fill(1);
        words[5] = SENTINEL;
    }

    #[test]
    fn replacement_constructs_then_patches() {
        ORIGINAL_CTOR.store(fake_ctor as *mut c_void, Ordering::Release);

        let mut object = [0usize; 12];
        compiler_options_ctor(object.as_mut_ptr() as _);

        assert_eq!(
            FAKE_CTOR_CALLS.load(Ordering::Acquire),
            object.as_mut_ptr() as *mut c_void
        );
        assert_eq!(object[5], 0);
        assert!(object.iter().enumerate().all(|(i, w)| i == 5 || *w == 1));
        assert!(env::var_os("LD_PRELOAD").is_none());
    }
}
