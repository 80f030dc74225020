use core::fmt::Debug;

use cfg_if::cfg_if;

/// Number of slots in a group.
///
/// One control byte per slot packs the whole group's metadata into a single
/// `u64`, so a probe can test all 8 slots with a handful of integer ops. If
/// you change this, the bitset broadcast constants and the group byte layout
/// all change with it.
pub const GROUP_SLOTS: usize = 8;

/// Maximum average number of occupied slots per group before the owning map
/// should grow.
///
/// 7/8 is the same load factor used by Abseil's Swiss tables. The growth
/// decision itself belongs to the owning map; the constant lives here because
/// it is a property of the group shape.
pub const MAX_AVG_GROUP_LOAD: usize = 7;

/// 0x01 broadcast into every lane.
const BITSET_LSB: u64 = 0x0101_0101_0101_0101;
/// 0x80 broadcast into every lane.
const BITSET_MSB: u64 = 0x8080_8080_8080_8080;

const BITSET_EMPTY: u64 = BITSET_LSB * (Ctrl::EMPTY.0 as u64);

/// One byte of per-slot metadata.
///
/// Three states, distinguished by bit patterns:
///
/// ```text
///    empty: 1 0 0 0 0 0 0 0
///  deleted: 1 1 1 1 1 1 1 0
///     full: 0 t t t t t t t   // t = 7 tag bits of the slot's hash
/// ```
///
/// The top bit is set iff the slot holds no live entry, which is what makes
/// the whole-group match predicates on [`CtrlGroup`] work.
#[derive(Clone, Copy, PartialEq, Eq)]
#[repr(transparent)]
pub struct Ctrl(u8);

impl Ctrl {
    /// A slot that has never held an entry (since the last wipe).
    pub const EMPTY: Ctrl = Ctrl(0b1000_0000);
    /// A tombstone: the slot held an entry that was removed. Kept distinct
    /// from [`Ctrl::EMPTY`] so the owning map's probe-termination logic can
    /// tell "keep probing" from "stop".
    pub const DELETED: Ctrl = Ctrl(0b1111_1110);

    /// Control byte for an occupied slot with the given tag. The tag is
    /// masked to 7 bits.
    #[inline(always)]
    pub const fn full(tag: u8) -> Ctrl {
        Ctrl(tag & 0x7f)
    }

    /// Whether the slot holds a live entry.
    #[inline(always)]
    pub const fn is_full(self) -> bool {
        self.0 & 0x80 == 0
    }

    /// Whether the slot is empty (never occupied).
    #[inline(always)]
    pub const fn is_empty(self) -> bool {
        self.0 == Self::EMPTY.0
    }

    /// Whether the slot is a tombstone.
    #[inline(always)]
    pub const fn is_deleted(self) -> bool {
        self.0 == Self::DELETED.0
    }

    /// The 7-bit hash tag of a full control byte.
    #[inline(always)]
    pub const fn tag(self) -> u8 {
        debug_assert!(self.is_full());
        self.0 & 0x7f
    }

    /// The raw byte value.
    #[inline(always)]
    pub const fn bits(self) -> u8 {
        self.0
    }
}

impl Debug for Ctrl {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        if self.is_empty() {
            f.write_str("Empty")
        } else if self.is_deleted() {
            f.write_str("Deleted")
        } else if self.is_full() {
            write!(f, "Full({:#04x})", self.tag())
        } else {
            write!(f, "Invalid({:#04x})", self.0)
        }
    }
}

/// Extracts the tag from a hash: the low 7 bits, as an occupied control byte.
///
/// The owning map stores this in the slot's control byte on insert and feeds
/// it to [`CtrlGroup::match_h2`] on lookup. The remaining hash bits are the
/// map's to spend on group selection.
#[inline(always)]
pub const fn h2(hash: u64) -> Ctrl {
    Ctrl((hash & 0x7f) as u8)
}

/// A set of slots within a group.
///
/// One byte per slot; after a match operation only the top bit of each lane
/// is meaningful (0x80 = the slot is in the set). Keeping the result in this
/// widened form lets [`first`](BitSet::first) recover a slot index with a
/// single trailing-zeros count.
#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub struct BitSet(u64);

impl BitSet {
    /// Whether no slot is in the set.
    #[inline(always)]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Index of the first slot in the set, assuming only lane top bits can be
    /// set (true for the result of any match predicate).
    ///
    /// Returns [`GROUP_SLOTS`] if the set is empty; callers treat that value
    /// uniformly as "no match in this group".
    #[inline(always)]
    pub const fn first(self) -> usize {
        (self.0.trailing_zeros() as usize) >> 3
    }

    /// Removes the first slot from the set (resets the least significant set
    /// bit). An empty set comes back unchanged.
    #[inline(always)]
    #[must_use]
    pub const fn remove_first(self) -> BitSet {
        BitSet(self.0 & self.0.wrapping_sub(1))
    }

    /// The raw lane-mask word.
    #[inline(always)]
    pub const fn bits(self) -> u64 {
        self.0
    }
}

/// Yields slot indices in ascending order.
impl Iterator for BitSet {
    type Item = usize;

    #[inline(always)]
    fn next(&mut self) -> Option<usize> {
        if self.is_empty() {
            return None;
        }
        let i = self.first();
        *self = self.remove_first();
        Some(i)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = (self.0.count_ones() as usize).min(GROUP_SLOTS);
        (n, Some(n))
    }
}

impl Debug for BitSet {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_set().entries(*self).finish()
    }
}

/// Physical byte index of logical lane `i`, for a simulated byte order.
///
/// Lane `i` must always occupy bits `8i..8i+8` of the control word so that
/// the match arithmetic and [`BitSet::first`] agree on lane numbering. The
/// in-memory representation of a `u64` stores those bits at byte `i` on a
/// little-endian host and byte `7 - i` on a big-endian one. This is the only
/// place in the crate where byte order is consulted.
#[inline(always)]
const fn lane_byte_for(big_endian: bool, i: usize) -> usize {
    if big_endian { (GROUP_SLOTS - 1) - i } else { i }
}

cfg_if! {
    if #[cfg(target_endian = "big")] {
        #[inline(always)]
        const fn lane_byte(i: usize) -> usize {
            lane_byte_for(true, i)
        }
    } else {
        #[inline(always)]
        const fn lane_byte(i: usize) -> usize {
            lane_byte_for(false, i)
        }
    }
}

/// The control bytes of one group, packed into a `u64`.
///
/// Lane `i` holds the control byte of slot `i`. The word is read and written
/// as a unit; the match predicates below answer "which slots satisfy X" for
/// all 8 slots at once using carry/mask arithmetic instead of a per-slot
/// loop.
#[derive(Clone, Copy, PartialEq, Eq)]
#[repr(transparent)]
pub struct CtrlGroup(u64);

impl CtrlGroup {
    /// A control word with every slot empty.
    pub const EMPTY: CtrlGroup = CtrlGroup(BITSET_EMPTY);

    /// Reconstructs a control word from its raw bits (as previously observed
    /// via [`bits`](CtrlGroup::bits)).
    #[inline(always)]
    pub const fn from_bits(bits: u64) -> CtrlGroup {
        CtrlGroup(bits)
    }

    /// The raw word.
    #[inline(always)]
    pub const fn bits(self) -> u64 {
        self.0
    }

    /// Returns the control byte of slot `i`.
    #[inline(always)]
    pub fn get(&self, i: usize) -> Ctrl {
        debug_assert!(i < GROUP_SLOTS);
        Ctrl(self.0.to_ne_bytes()[lane_byte(i)])
    }

    /// Sets the control byte of slot `i`.
    #[inline(always)]
    pub fn set(&mut self, i: usize, c: Ctrl) {
        debug_assert!(i < GROUP_SLOTS);
        let mut bytes = self.0.to_ne_bytes();
        bytes[lane_byte(i)] = c.0;
        self.0 = u64::from_ne_bytes(bytes);
    }

    /// Sets every control byte to [`Ctrl::EMPTY`] with a single store.
    #[inline(always)]
    pub fn set_empty(&mut self) {
        self.0 = BITSET_EMPTY;
    }

    /// Returns the set of slots that are full with the given 7-bit tag.
    ///
    /// May return false positives: when the tag is 2^N and two adjacent lanes
    /// hold 2^N followed by 2^N + 1, the borrow from the subtraction runs
    /// into the second lane. For example, with lanes `0x0302` and tag `0x02`
    /// the XOR gives `0x0100`; subtracting `0x0101` turns both lanes into
    /// `0xff` and both report a match. This only happens next to a real
    /// match, never on empty or deleted lanes, and the caller's full key
    /// comparison filters it out, so it is a rare inefficiency rather than a
    /// correctness problem. False negatives do not occur.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use swiss_group::ctrl::Ctrl;
    /// use swiss_group::ctrl::CtrlGroup;
    ///
    /// let mut g = CtrlGroup::EMPTY;
    /// g.set(3, Ctrl::full(0x41));
    /// assert_eq!(g.match_h2(Ctrl::full(0x41)).collect::<Vec<_>>(), [3]);
    /// assert!(g.match_h2(Ctrl::full(0x42)).is_empty());
    /// ```
    #[inline(always)]
    pub fn match_h2(self, tag: Ctrl) -> BitSet {
        debug_assert!(tag.is_full());
        let v = self.0 ^ (BITSET_LSB * (tag.0 as u64));
        BitSet((v.wrapping_sub(BITSET_LSB) & !v) & BITSET_MSB)
    }

    /// Returns the set of slots that are empty. Exact, no false positives.
    #[inline(always)]
    pub fn match_empty(self) -> BitSet {
        // Empty is 1000 0000, deleted is 1111 1110, full is 0??? ????.
        // A lane is empty iff bit 7 is set and bit 1 is not; shifting bit 1
        // up to bit 7 lets one mask test both. Any of the mid bits would
        // serve equally well.
        let v = self.0;
        BitSet((v & !(v << 6)) & BITSET_MSB)
    }

    /// Returns the set of slots that are empty or deleted. Exact.
    #[inline(always)]
    pub fn match_empty_or_deleted(self) -> BitSet {
        // Both non-full states have bit 7 set; full lanes never do.
        BitSet(self.0 & BITSET_MSB)
    }
}

impl Default for CtrlGroup {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl Debug for CtrlGroup {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("[")?;
        for i in 0..GROUP_SLOTS {
            if i > 0 {
                f.write_str(" ")?;
            }
            let c = self.get(i);
            if c.is_empty() {
                f.write_str("..")?;
            } else if c.is_deleted() {
                f.write_str("xx")?;
            } else {
                write!(f, "{:02x}", c.bits())?;
            }
        }
        f.write_str("]")
    }
}
