use alloc::alloc::handle_alloc_error;
use core::alloc::Layout;
use core::fmt::Debug;
use core::marker::PhantomData;
use core::ptr::NonNull;
use core::slice;

use crate::ctrl::CtrlGroup;
use crate::ctrl::GROUP_SLOTS;
use crate::layout::GROUP_SLOTS_OFFSET;
use crate::layout::SlotLayout;

/// A read-only window over one group's memory.
///
/// Layout is `[control word][slot 0][slot 1]..[slot 7]`, with slot shape
/// taken from the array's [`SlotLayout`]. The view borrows from its
/// [`GroupArray`] and cannot outlive it.
#[derive(Clone, Copy)]
pub struct GroupRef<'a> {
    data: NonNull<u8>,
    layout: &'a SlotLayout,
    _marker: PhantomData<&'a [u8]>,
}

impl<'a> GroupRef<'a> {
    /// Loads the group's control word.
    #[inline(always)]
    pub fn ctrls(&self) -> CtrlGroup {
        // SAFETY: The control word sits at offset 0 of a live group whose
        // arena outlives 'a, and SlotLayout keeps every group base 8-byte
        // aligned.
        unsafe { self.data.cast::<CtrlGroup>().read() }
    }

    /// Address of slot `i`'s key: group base + 8 + `i` * slot size.
    #[inline(always)]
    pub fn key(&self, i: usize) -> NonNull<u8> {
        debug_assert!(i < GROUP_SLOTS);
        // SAFETY: i < GROUP_SLOTS, so the offset stays inside this group's
        // region of the arena.
        unsafe { self.data.add(GROUP_SLOTS_OFFSET + i * self.layout.slot_size()) }
    }

    /// Address of slot `i`'s element: the key address plus the element
    /// offset.
    #[inline(always)]
    pub fn elem(&self, i: usize) -> NonNull<u8> {
        debug_assert!(i < GROUP_SLOTS);
        // SAFETY: As for key; elem_offset + elem_size <= slot_size by
        // SlotLayout's contract.
        unsafe {
            self.data.add(
                GROUP_SLOTS_OFFSET + i * self.layout.slot_size() + self.layout.elem_offset(),
            )
        }
    }

    /// The key bytes of slot `i`.
    #[inline(always)]
    pub fn key_bytes(&self, i: usize) -> &'a [u8] {
        // SAFETY: key(i) points at key_size() readable bytes inside the
        // arena, which is borrowed shared for 'a.
        unsafe { slice::from_raw_parts(self.key(i).as_ptr(), self.layout.key_size()) }
    }

    /// The element bytes of slot `i`.
    #[inline(always)]
    pub fn elem_bytes(&self, i: usize) -> &'a [u8] {
        // SAFETY: As for key_bytes, with the element extent.
        unsafe { slice::from_raw_parts(self.elem(i).as_ptr(), self.layout.elem_size()) }
    }
}

impl Debug for GroupRef<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_tuple("GroupRef").field(&self.ctrls()).finish()
    }
}

/// A mutable window over one group's memory.
///
/// Obtained from [`GroupArray::group_mut`], so the borrow checker enforces
/// the single-writer discipline this layer otherwise takes on trust.
pub struct GroupMut<'a> {
    data: NonNull<u8>,
    layout: &'a SlotLayout,
    _marker: PhantomData<&'a mut [u8]>,
}

impl<'a> GroupMut<'a> {
    /// Loads the group's control word.
    #[inline(always)]
    pub fn ctrls(&self) -> CtrlGroup {
        // SAFETY: As in GroupRef::ctrls; we hold the only borrow.
        unsafe { self.data.cast::<CtrlGroup>().read() }
    }

    /// Mutable view of the group's control word.
    #[inline(always)]
    pub fn ctrls_mut(&mut self) -> &mut CtrlGroup {
        // SAFETY: Offset 0 of a live, 8-aligned group that we borrow
        // exclusively; the returned lifetime is pinned to &mut self.
        unsafe { self.data.cast::<CtrlGroup>().as_mut() }
    }

    /// Address of slot `i`'s key.
    #[inline(always)]
    pub fn key(&self, i: usize) -> NonNull<u8> {
        debug_assert!(i < GROUP_SLOTS);
        // SAFETY: i < GROUP_SLOTS keeps the offset inside this group.
        unsafe { self.data.add(GROUP_SLOTS_OFFSET + i * self.layout.slot_size()) }
    }

    /// Address of slot `i`'s element.
    #[inline(always)]
    pub fn elem(&self, i: usize) -> NonNull<u8> {
        debug_assert!(i < GROUP_SLOTS);
        // SAFETY: As for key.
        unsafe {
            self.data.add(
                GROUP_SLOTS_OFFSET + i * self.layout.slot_size() + self.layout.elem_offset(),
            )
        }
    }

    /// The key bytes of slot `i`.
    #[inline(always)]
    pub fn key_bytes(&self, i: usize) -> &[u8] {
        // SAFETY: key(i) points at key_size() bytes we borrow exclusively.
        unsafe { slice::from_raw_parts(self.key(i).as_ptr(), self.layout.key_size()) }
    }

    /// Mutable key bytes of slot `i`.
    #[inline(always)]
    pub fn key_bytes_mut(&mut self, i: usize) -> &mut [u8] {
        // SAFETY: As for key_bytes; &mut self prevents aliasing.
        unsafe { slice::from_raw_parts_mut(self.key(i).as_ptr(), self.layout.key_size()) }
    }

    /// The element bytes of slot `i`.
    #[inline(always)]
    pub fn elem_bytes(&self, i: usize) -> &[u8] {
        // SAFETY: elem(i) points at elem_size() bytes we borrow exclusively.
        unsafe { slice::from_raw_parts(self.elem(i).as_ptr(), self.layout.elem_size()) }
    }

    /// Mutable element bytes of slot `i`.
    #[inline(always)]
    pub fn elem_bytes_mut(&mut self, i: usize) -> &mut [u8] {
        // SAFETY: As for elem_bytes; &mut self prevents aliasing.
        unsafe { slice::from_raw_parts_mut(self.elem(i).as_ptr(), self.layout.elem_size()) }
    }
}

impl Debug for GroupMut<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_tuple("GroupMut").field(&self.ctrls()).finish()
    }
}

/// A contiguous, heap-allocated array of groups.
///
/// Owns one byte arena holding `length` groups, `length` a power of two. The
/// arena is allocated once here and freed on drop; groups are never allocated
/// or freed individually. Shape (length, slot layout) is fixed for the
/// array's lifetime; only contents mutate.
///
/// Index arithmetic is the caller's job: reduce a raw group index with
/// [`length_mask`](GroupArray::length_mask) (and a raw slot index with
/// [`entry_mask`](GroupArray::entry_mask)) before handing it to
/// [`group`](GroupArray::group). This layer does not wrap.
pub struct GroupArray {
    alloc: NonNull<u8>,
    arena: Layout,
    layout: SlotLayout,
    length_mask: u64,
    entry_mask: u64,
}

impl GroupArray {
    /// Allocates an array of `length` groups with slots shaped by `layout`.
    ///
    /// Slot bytes start zeroed and every control word starts all-empty.
    /// `length` must be a power of two (which also makes it at least 1).
    ///
    /// # Panics
    ///
    /// Panics if the arena size overflows, and aborts via
    /// [`handle_alloc_error`] if the allocator fails.
    pub fn new(layout: SlotLayout, length: u64) -> GroupArray {
        debug_assert!(length.is_power_of_two());

        let size = usize::try_from(length)
            .ok()
            .and_then(|length| layout.group_size().checked_mul(length))
            .expect("allocation size overflow");
        let arena = Layout::from_size_align(size, align_of::<CtrlGroup>())
            .expect("allocation size overflow");

        // SAFETY: group_size() is at least the control word, so the arena is
        // never zero sized. Null from the allocator is handled.
        let alloc = unsafe {
            let raw = alloc::alloc::alloc_zeroed(arena);
            if raw.is_null() {
                handle_alloc_error(arena);
            }
            NonNull::new_unchecked(raw)
        };

        let mut groups = GroupArray {
            alloc,
            arena,
            layout,
            length_mask: length - 1,
            entry_mask: length * GROUP_SLOTS as u64 - 1,
        };

        // A zero byte reads as an occupied slot with tag 0, so the control
        // words cannot stay zeroed.
        for i in 0..length {
            groups.group_mut(i).ctrls_mut().set_empty();
        }

        groups
    }

    /// The slot layout the arena was shaped with.
    #[inline(always)]
    pub fn slot_layout(&self) -> &SlotLayout {
        &self.layout
    }

    /// Number of groups.
    #[inline(always)]
    pub fn length(&self) -> u64 {
        self.length_mask + 1
    }

    /// Number of groups minus one, for reducing a group index with `&`.
    #[inline(always)]
    pub fn length_mask(&self) -> u64 {
        self.length_mask
    }

    /// Total number of slots minus one, for reducing a slot index with `&`.
    #[inline(always)]
    pub fn entry_mask(&self) -> u64 {
        self.entry_mask
    }

    #[inline(always)]
    fn group_data(&self, i: u64) -> NonNull<u8> {
        debug_assert!(i <= self.length_mask);
        // SAFETY: i is in range, so the byte offset lands on a group base
        // inside the arena.
        unsafe { self.alloc.add(i as usize * self.layout.group_size()) }
    }

    /// The group at index `i`. `i` must already be reduced modulo
    /// [`length`](GroupArray::length).
    #[inline(always)]
    pub fn group(&self, i: u64) -> GroupRef<'_> {
        GroupRef {
            data: self.group_data(i),
            layout: &self.layout,
            _marker: PhantomData,
        }
    }

    /// The group at index `i`, mutably. `i` must already be reduced modulo
    /// [`length`](GroupArray::length).
    #[inline(always)]
    pub fn group_mut(&mut self, i: u64) -> GroupMut<'_> {
        GroupMut {
            data: self.group_data(i),
            layout: &self.layout,
            _marker: PhantomData,
        }
    }
}

impl Drop for GroupArray {
    fn drop(&mut self) {
        // SAFETY: alloc was produced by alloc_zeroed with this exact layout
        // and has not been freed.
        unsafe {
            alloc::alloc::dealloc(self.alloc.as_ptr(), self.arena);
        }
    }
}

impl Debug for GroupArray {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        struct Ctrls<'a>(&'a GroupArray);

        impl Debug for Ctrls<'_> {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.debug_list()
                    .entries((0..self.0.length()).map(|i| self.0.group(i).ctrls()))
                    .finish()
            }
        }

        f.debug_struct("GroupArray")
            .field("length", &self.length())
            .field("slot_layout", &self.layout)
            .field("ctrls", &Ctrls(self))
            .finish()
    }
}
