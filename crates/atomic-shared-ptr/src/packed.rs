//! The 64-bit word an `AtomicSharedPtr<T>` actually stores.
//!
//! Three fields share one `u64` so a single CAS can move the pointer, bump
//! its version, and adjust the local-reference lane together:
//!
//! ```text
//! bit 63                      19 18        8 7        0
//! |  control-block addr >> 3   |  version    | local ref |
//! |          45 bits           |   11 bits    |  8 bits   |
//! ```
//!
//! The address is stored shifted right by `PTR_ALIGN_SHIFT` bits, relying on
//! every `ControlBlock<T>` being at least 8-byte aligned (guaranteed by
//! `repr(align)` on the control block itself). That buys back 3 bits, so the
//! 45-bit field still addresses the full 48-bit canonical pointer range of
//! x86-64 and aarch64. A zero address means "null".

use lockfree_support::{next_version, MAX_VERSION};

const LOCAL_REF_BITS: u32 = 8;
const VERSION_BITS: u32 = 11;
const PTR_ALIGN_SHIFT: u32 = 3;

const LOCAL_REF_SHIFT: u32 = 0;
const VERSION_SHIFT: u32 = LOCAL_REF_BITS;
const PTR_SHIFT: u32 = LOCAL_REF_BITS + VERSION_BITS;

const LOCAL_REF_MASK: u64 = (1u64 << LOCAL_REF_BITS) - 1;
const VERSION_MASK: u64 = ((1u64 << VERSION_BITS) - 1) << VERSION_SHIFT;
const PTR_MASK: u64 = !(VERSION_MASK | LOCAL_REF_MASK);

/// Maximum number of local (in-flight `load()`) references a single packed
/// word can track before a loader must fall back to backoff-and-retry.
pub const MAX_LOCAL_REFS: u8 = LOCAL_REF_MASK as u8;

/// How many strong-count units a fresh local-ref lane is filled with,
/// whether by `store`/`exchange` publishing a new pointer or by `load`
/// refilling a drained one.
pub const DEFAULT_LOCAL_REFS: u8 = MAX_LOCAL_REFS;

/// Once a lane's remaining count drops below this, the next `load` to
/// notice it tops the lane back up rather than waiting for it to hit zero —
/// keeps the lane from being drained to the point every load has to refill.
pub const LOCAL_REF_FILL_BOUNDARY: u8 = 112;

/// The packed representation of an `AtomicSharedPtr<T>`'s state.
///
/// This is a plain value type; `AtomicSharedPtr` is the one that wraps it in
/// an `AtomicU64` and gives the bit patterns meaning.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Packed(u64);

impl Packed {
    pub const NULL: Packed = Packed(0);

    #[inline]
    #[must_use]
    pub fn new(addr: usize, version: u16, local_refs: u8) -> Self {
        debug_assert_eq!(addr & ((1 << PTR_ALIGN_SHIFT) - 1), 0, "control block address must be 8-byte aligned");
        debug_assert!(version <= MAX_VERSION);
        let shifted_addr = (addr as u64) >> PTR_ALIGN_SHIFT;
        debug_assert_eq!(shifted_addr & !(PTR_MASK >> PTR_SHIFT), 0, "address does not fit the packed field");
        Packed((shifted_addr << PTR_SHIFT) | (u64::from(version) << VERSION_SHIFT) | u64::from(local_refs))
    }

    #[inline]
    #[must_use]
    pub const fn from_bits(bits: u64) -> Self {
        Packed(bits)
    }

    #[inline]
    #[must_use]
    pub const fn to_bits(self) -> u64 {
        self.0
    }

    #[inline]
    #[must_use]
    pub fn addr(self) -> usize {
        (((self.0 & PTR_MASK) >> PTR_SHIFT) << PTR_ALIGN_SHIFT) as usize
    }

    #[inline]
    #[must_use]
    pub fn version(self) -> u16 {
        ((self.0 & VERSION_MASK) >> VERSION_SHIFT) as u16
    }

    #[inline]
    #[must_use]
    pub fn local_refs(self) -> u8 {
        (self.0 & LOCAL_REF_MASK) as u8
    }

    #[inline]
    #[must_use]
    pub fn is_null(self) -> bool {
        self.addr() == 0
    }

    /// Returns the same pointer and version with the local-ref lane
    /// decremented by one. Redeems one prepaid strong-count unit from the
    /// lane; callers must not call this when the lane is already empty.
    #[inline]
    #[must_use]
    pub fn with_decremented_local_ref(self) -> Self {
        debug_assert!(self.local_refs() > 0, "local ref underflow");
        Packed(self.0 - 1)
    }

    /// Builds the replacement word for storing a fresh address: version
    /// advances (skipping zero), local-ref lane starts full (a null target
    /// has no lane to fill).
    #[inline]
    #[must_use]
    pub fn with_new_target(self, addr: usize) -> Self {
        let local_refs = if addr == 0 { 0 } else { DEFAULT_LOCAL_REFS };
        Packed::new(addr, next_version(self.version()), local_refs)
    }
}

impl std::fmt::Debug for Packed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Packed")
            .field("addr", &format_args!("{:#x}", self.addr()))
            .field("version", &self.version())
            .field("local_refs", &self.local_refs())
            .finish()
    }
}
