// mirrors the host's option and flag values
#[allow(dead_code)]
#[repr(i32)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ZygiskOption {
    ForceDenylistUnmount = 0,
    DlcloseModuleLibrary = 1,
}

#[repr(u32)]
#[derive(Debug, Copy, Clone)]
pub enum ZygiskStateFlag {
    ProcessGrantedRoot = 1 << 0,
}

impl ZygiskStateFlag {
    pub fn is_set(self, flags: u32) -> bool {
        flags & self as u32 != 0
    }
}
