//! In-band block header
//!
//! Every payload handed out by a [`Pool`](crate::Pool) is preceded by one
//! 8-byte tag word. `free` only receives the payload pointer, so the tag is
//! what tells it which structure owns the block:
//!
//! ```text
//! small:  [ SMALL_MARK | class index ][ payload (class size) ]
//! large:  [ prev | next | size | LARGE_MARK ][ payload (size) ]
//!           ^-------- registry node --------^
//! ```
//!
//! For large blocks the tag is the last field of the registry node, so the
//! node is recovered by stepping back a fixed distance from the payload.

use core::ptr::NonNull;

use crate::size_class::SizeClass;

/// Size of the tag word written before every payload
pub(crate) const HEADER_SIZE: usize = 8;

const MARK_MASK: u64 = 0xFFFF_0000_0000_0000;
const SMALL_MARK: u64 = 0x5A11_0000_0000_0000;
const LARGE_MARK: u64 = 0x1A26_0000_0000_0000;

/// Decoded block classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BlockTag {
    /// Carved from a chunk, belongs to a size class
    Small(SizeClass),
    /// Served by the large-allocation registry
    Large,
}

impl BlockTag {
    /// Tag word for a large block
    pub(crate) const LARGE: u64 = LARGE_MARK;

    /// Encodes the tag into its header word
    #[inline]
    pub(crate) const fn encode(self) -> u64 {
        match self {
            Self::Small(class) => SMALL_MARK | class.index() as u64,
            Self::Large => LARGE_MARK,
        }
    }

    /// Decodes a header word without validation
    ///
    /// Only the large marker is tested; anything else is taken as a small
    /// class index. Used on the release path where headers are trusted.
    #[inline]
    pub(crate) const fn decode(word: u64) -> Self {
        if word & MARK_MASK == LARGE_MARK {
            Self::Large
        } else {
            Self::Small(SizeClass::from_index((word & !MARK_MASK) as usize))
        }
    }

    /// Decodes a header word, rejecting unknown markers and class indices
    /// outside `0..class_count`
    pub(crate) const fn decode_checked(word: u64, class_count: usize) -> Option<Self> {
        match word & MARK_MASK {
            LARGE_MARK if word == LARGE_MARK => Some(Self::Large),
            SMALL_MARK => {
                let index = (word & !MARK_MASK) as usize;
                if index < class_count {
                    Some(Self::Small(SizeClass::from_index(index)))
                } else {
                    None
                }
            }
            _ => None,
        }
    }
}

/// Writes `tag` into the header slot of `payload`
///
/// # Safety
///
/// `payload` must be preceded by at least [`HEADER_SIZE`] writable bytes
/// that belong to the same block, and must be 8-byte aligned.
#[inline]
pub(crate) unsafe fn write(payload: NonNull<u8>, tag: BlockTag) {
    // SAFETY: Writing the tag word before the payload.
    // - Caller guarantees HEADER_SIZE bytes before payload belong to the block
    // - payload is 8-byte aligned, so payload - 8 is aligned for u64
    unsafe {
        payload
            .as_ptr()
            .sub(HEADER_SIZE)
            .cast::<u64>()
            .write(tag.encode());
    }
}

/// Reads the raw header word of `payload`
///
/// # Safety
///
/// `payload` must be a live pointer previously returned by a pool.
#[inline]
pub(crate) unsafe fn read(payload: NonNull<u8>) -> u64 {
    // SAFETY: Reading the tag word before the payload.
    // - Every pool payload has a tag word at payload - HEADER_SIZE
    // - Caller guarantees the block is live (header not reused)
    unsafe { payload.as_ptr().sub(HEADER_SIZE).cast::<u64>().read() }
}
