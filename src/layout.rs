use crate::ctrl::CtrlGroup;
use crate::ctrl::GROUP_SLOTS;

/// Byte offset of slot 0 within a group: the control word occupies the first
/// 8 bytes.
pub const GROUP_SLOTS_OFFSET: usize = size_of::<CtrlGroup>();

/// Slot sizes are rounded up to this so every group, and therefore every
/// control word, stays aligned for a `u64` access within the arena.
const SLOT_ALIGN: usize = align_of::<CtrlGroup>();

/// Rounds `n` up to a multiple of `a`. `a` must be a power of 2.
#[inline(always)]
pub const fn align_up(n: usize, a: usize) -> usize {
    debug_assert!(a.is_power_of_two());
    (n + a - 1) & !(a - 1)
}

/// Rounds `n` up to the next power of 2. Zero stays zero.
///
/// The second return value is true if the round up overflows `u64`; the
/// caller must check it before using the result to size an allocation.
#[inline(always)]
pub const fn align_up_pow2(n: u64) -> (u64, bool) {
    if n == 0 {
        return (0, false);
    }
    let shift = u64::BITS - (n - 1).leading_zeros();
    if shift == u64::BITS {
        return (0, true);
    }
    (1u64 << shift, false)
}

/// Runtime description of one slot's byte layout.
///
/// The owning map's type descriptor supplies key and element sizes at run
/// time, so a group never stores a statically typed element; all addressing
/// is byte-offset arithmetic driven by one of these. A slot is laid out as
/// `[key bytes][padding][element bytes][padding]`, and a group as the control
/// word followed by [`GROUP_SLOTS`] such slots:
///
/// ```text
/// offset 0..8          control word
/// offset 8 + i*S       key of slot i
/// offset 8 + i*S + E   element of slot i
/// ```
///
/// where `S` is [`slot_size`](SlotLayout::slot_size) and `E` is
/// [`elem_offset`](SlotLayout::elem_offset).
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct SlotLayout {
    key_size: usize,
    elem_size: usize,
    elem_offset: usize,
    slot_size: usize,
    group_size: usize,
}

impl SlotLayout {
    /// Builds a layout for keys of `key_size` bytes immediately followed by
    /// elements of `elem_size` bytes.
    ///
    /// The slot size is rounded up so that consecutive groups keep their
    /// control words 8-byte aligned.
    ///
    /// # Panics
    ///
    /// Panics if the group size overflows `usize`.
    pub const fn new(key_size: usize, elem_size: usize) -> SlotLayout {
        Self::from_raw_parts(
            key_size,
            elem_size,
            key_size,
            align_up(key_size + elem_size, SLOT_ALIGN),
        )
    }

    /// Builds a layout from pre-computed offsets, for descriptors that carry
    /// their own padding (an element aligned past the end of the key, say).
    ///
    /// `slot_size` must be a multiple of 8 and the element must fit:
    /// `key_size <= elem_offset` and `elem_offset + elem_size <= slot_size`.
    ///
    /// # Panics
    ///
    /// Panics if the group size overflows `usize`.
    pub const fn from_raw_parts(
        key_size: usize,
        elem_size: usize,
        elem_offset: usize,
        slot_size: usize,
    ) -> SlotLayout {
        debug_assert!(key_size <= elem_offset);
        debug_assert!(elem_offset + elem_size <= slot_size);
        debug_assert!(slot_size % SLOT_ALIGN == 0);

        let group_size = match slot_size.checked_mul(GROUP_SLOTS) {
            Some(slots) => match slots.checked_add(GROUP_SLOTS_OFFSET) {
                Some(total) => total,
                None => panic!("allocation size overflow"),
            },
            None => panic!("allocation size overflow"),
        };

        SlotLayout {
            key_size,
            elem_size,
            elem_offset,
            slot_size,
            group_size,
        }
    }

    /// Key size in bytes.
    #[inline(always)]
    pub const fn key_size(&self) -> usize {
        self.key_size
    }

    /// Element size in bytes.
    #[inline(always)]
    pub const fn elem_size(&self) -> usize {
        self.elem_size
    }

    /// Byte offset of the element within its slot.
    #[inline(always)]
    pub const fn elem_offset(&self) -> usize {
        self.elem_offset
    }

    /// Slot size in bytes, padding included.
    #[inline(always)]
    pub const fn slot_size(&self) -> usize {
        self.slot_size
    }

    /// Group size in bytes: the control word plus [`GROUP_SLOTS`] slots.
    #[inline(always)]
    pub const fn group_size(&self) -> usize {
        self.group_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn align_up_basic() {
        assert_eq!(align_up(13, 8), 16);
        assert_eq!(align_up(16, 8), 16);
        assert_eq!(align_up(0, 8), 0);
        assert_eq!(align_up(1, 1), 1);
        assert_eq!(align_up(17, 16), 32);
    }

    #[test]
    fn align_up_pow2_basic() {
        assert_eq!(align_up_pow2(0), (0, false));
        assert_eq!(align_up_pow2(1), (1, false));
        assert_eq!(align_up_pow2(5), (8, false));
        assert_eq!(align_up_pow2(8), (8, false));
        assert_eq!(align_up_pow2(1 << 62), (1 << 62, false));
        assert_eq!(align_up_pow2(1 << 63), (1 << 63, false));
    }

    #[test]
    fn align_up_pow2_overflow() {
        let (_, overflow) = align_up_pow2((1 << 63) + 1);
        assert!(overflow);
        let (_, overflow) = align_up_pow2(u64::MAX);
        assert!(overflow);
    }

    #[test]
    fn layout_packs_key_then_elem() {
        let layout = SlotLayout::new(8, 8);
        assert_eq!(layout.key_size(), 8);
        assert_eq!(layout.elem_size(), 8);
        assert_eq!(layout.elem_offset(), 8);
        assert_eq!(layout.slot_size(), 16);
        assert_eq!(layout.group_size(), GROUP_SLOTS_OFFSET + 8 * 16);
    }

    #[test]
    fn layout_rounds_slot_to_word_multiple() {
        let layout = SlotLayout::new(3, 2);
        assert_eq!(layout.elem_offset(), 3);
        assert_eq!(layout.slot_size(), 8);
        assert_eq!(layout.group_size(), 8 + 8 * 8);

        let layout = SlotLayout::new(0, 0);
        assert_eq!(layout.slot_size(), 0);
        assert_eq!(layout.group_size(), GROUP_SLOTS_OFFSET);
    }

    #[test]
    fn layout_from_raw_parts_keeps_padding() {
        // 4-byte key, element aligned to 8 past it.
        let layout = SlotLayout::from_raw_parts(4, 8, 8, 16);
        assert_eq!(layout.key_size(), 4);
        assert_eq!(layout.elem_offset(), 8);
        assert_eq!(layout.slot_size(), 16);
        assert_eq!(layout.group_size(), 8 + 8 * 16);
    }
}
