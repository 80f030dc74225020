#![warn(missing_docs)]
#![doc = include_str!("../README.md")]
#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

/// Control bytes, the packed control word, and its bit-parallel match
/// predicates.
///
/// This is the probe hot path: one 64-bit word answers "which of these 8
/// slots could hold the key" without a per-slot branch.
pub mod ctrl;

/// Group and group-array views over the caller-described arena.
pub mod group;

/// Alignment helpers and the runtime slot descriptor shared by every group
/// accessor.
pub mod layout;

pub use ctrl::BitSet;
pub use ctrl::Ctrl;
pub use ctrl::CtrlGroup;
pub use ctrl::GROUP_SLOTS;
pub use group::GroupArray;
pub use group::GroupMut;
pub use group::GroupRef;
pub use layout::SlotLayout;
