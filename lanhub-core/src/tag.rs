//! Record type tags.
//!
//! Applications name their record types with strings and hash them into the
//! 32-bit `type_tag` carried by every [`crate::RecordHeader`]. The hash is a
//! `const fn`, so tags are usable as `match` patterns:
//!
//! ```
//! use lanhub_core::type_tag;
//!
//! const CHAT: u32 = type_tag("chat");
//! assert_eq!(CHAT, type_tag("chat"));
//! ```

const BLOCK_MULTIPLIER: u32 = 31;
const BLOCK_COMBINE: u32 = 0x0100_0193;
const SEED: u32 = 0x811C_9DC5;

/// Hashes a type name into a record type tag.
///
/// Bytes are consumed from last to first with a rolling multiply-add; every
/// four bytes the block is folded into the running hash, and the result is
/// XOR-folded with its own upper 16 bits.
#[must_use]
pub const fn type_tag(name: &str) -> u32 {
    let bytes = name.as_bytes();
    let mut hash = SEED;
    let mut block: u32 = 0;
    let mut lanes = 0;
    let mut i = bytes.len();

    while i > 0 {
        i -= 1;
        block = block
            .wrapping_mul(BLOCK_MULTIPLIER)
            .wrapping_add(bytes[i] as u32);
        lanes += 1;
        if lanes == 4 {
            hash = hash.wrapping_mul(BLOCK_COMBINE).wrapping_add(block);
            block = 0;
            lanes = 0;
        }
    }
    if lanes > 0 {
        hash = hash.wrapping_mul(BLOCK_COMBINE).wrapping_add(block);
    }

    hash ^ (hash >> 16)
}
