//! # rheap - A Best-Fit Heap Allocator Library
//!
//! This crate provides a **best-fit allocator with delayed coalescing** over a
//! single fixed region of memory mapped once from the operating system with
//! `mmap(2)`.
//!
//! ## Overview
//!
//! The region is carved into an implicit list of blocks. Every block starts
//! with a one-word header; walking the list means adding each block's size to
//! its address until the end sentinel shows up:
//!
//! ```text
//!   Region Layout:
//!
//!   ┌─────┬────────────┬──────────────────┬──────────┬────────────────────┬─────┐
//!   │ pad │  A (used)  │     B (free)     │ C (used) │      D (free)      │ END │
//!   └─────┴────────────┴──────────────────┴──────────┴────────────────────┴─────┘
//!    4 B  ▲                                                                 4 B
//!         └── first block, header at 4 mod 8 so payloads are 8 aligned
//!
//!   END = size 0, allocated. Every forward scan stops there.
//! ```
//!
//! Headers pack the block size and two status bits into a single `u32`. Free
//! blocks repeat their size in a footer, the last word of the block:
//!
//! ```text
//!   Allocated Block:                      Free Block:
//!   ┌────────────┬──────────────────┐     ┌────────────┬──────────────┬────────┐
//!   │ size | p|a │ payload          │     │ size | p|0 │  free space  │  size  │
//!   └────────────┴──────────────────┘     └────────────┴──────────────┴────────┘
//!                ▲                                                     footer
//!                └── pointer returned to user
//! ```
//!
//! ## Crate Structure
//!
//! ```text
//!   rheap
//!   ├── align      - Alignment macros (align!, align_to!)
//!   ├── block      - Packed header tag and block views (internal)
//!   ├── error      - HeapError
//!   ├── heap       - Heap: allocate, free, coalesce, inspection
//!   └── region     - The mmap'd region (internal)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use rheap::Heap;
//!
//! let mut heap = Heap::init(4096).unwrap();
//!
//! let ptr = heap.allocate(64).unwrap();
//! unsafe { ptr.as_ptr().write_bytes(0xAB, 64) };
//!
//! heap.free(ptr.as_ptr()).unwrap();
//! heap.coalesce();
//! heap.dump();
//! ```
//!
//! ## How It Works
//!
//! - **Allocation** scans every block once and picks the smallest free block
//!   that fits, stopping early on an exact fit. Larger blocks are split.
//! - **Freeing** only flips the block to free and writes its footer.
//! - **Coalescing** is explicit: [`Heap::coalesce`] merges every run of
//!   adjacent free blocks in one forward pass.
//!
//! ## Limitations
//!
//! - **Single-threaded only**: `Heap` is neither `Send` nor `Sync`
//! - **Fixed size**: the region never grows after initialization
//! - **Word alignment only**: payloads are aligned to 8 bytes, nothing more
//! - **Unix-only**: requires `libc` and `mmap`

pub mod align;
mod block;
mod error;
mod heap;
mod region;

/// Size of a header or footer word.
pub const WORD: usize = std::mem::size_of::<u32>();

/// Block sizes and payload addresses are multiples of this.
pub const DOUBLE_WORD: usize = 2 * WORD;

pub use error::HeapError;
pub use heap::{BlockInfo, Heap, HeapStats};
pub use region::page_size;
