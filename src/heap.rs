use std::{
  fmt,
  ptr::NonNull,
  sync::atomic::{AtomicBool, Ordering},
};

use crate::{
  DOUBLE_WORD, WORD, align,
  block::{Block, Tag},
  error::HeapError,
  region::{Region, page_size},
};

/// Claimed by `Heap::init`. Released again only if that call fails to map.
static INITIALIZED: AtomicBool = AtomicBool::new(false);

/// A best-fit allocator over one fixed region with delayed coalescing.
///
/// Blocks are addressed by their offset from the first block. The first word
/// of the mapping is padding so that payloads land on double words, and the
/// end sentinel sits at offset `capacity()`.
pub struct Heap {
  region: Region,
  len: usize,
}

/// One row of the block list, as reported by [`Heap::blocks`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockInfo {
  /// Serial number, starting at 1.
  pub index: usize,
  pub allocated: bool,
  pub prev_allocated: bool,
  /// Address of the header.
  pub begin: usize,
  /// Address of the last byte of the block.
  pub end: usize,
  pub size: usize,
}

/// Running totals over the block list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HeapStats {
  pub used: usize,
  pub free: usize,
  pub blocks: usize,
}

impl HeapStats {
  pub fn total(&self) -> usize {
    self.used + self.free
  }
}

impl Heap {
  /// Maps the process-wide heap. Only the first successful call in the
  /// process gets a heap; every later call fails with
  /// [`HeapError::AlreadyInitialized`].
  pub fn init(size: usize) -> Result<Self, HeapError> {
    if INITIALIZED
      .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
      .is_err()
    {
      let err = HeapError::AlreadyInitialized;
      log::error!("init_heap: {}", err);
      return Err(err);
    }

    // A failed mapping hands the guard back.
    Self::new(size).inspect_err(|err| {
      log::error!("init_heap: {}", err);
      INITIALIZED.store(false, Ordering::Release);
    })
  }

  /// Maps an independent heap of at least `size` bytes, rounded up to the
  /// page size.
  pub fn new(size: usize) -> Result<Self, HeapError> {
    if size == 0 {
      return Err(HeapError::InvalidRegionSize);
    }
    if size > u32::MAX as usize - page_size() {
      return Err(HeapError::RegionTooLarge(size));
    }

    let region = Region::map(size)?;

    // One word of padding in front of the first block, one word for the end
    // sentinel.
    let len = region.len() - DOUBLE_WORD;

    let mut heap = Self { region, len };
    heap.write(len, Tag::END);

    let first = Block::new(0, Tag::new(len as u32, false, true));
    heap.write(first.offset, first.tag);
    heap.write(first.footer_offset(), Tag::footer(len as u32));

    log::debug!("heap of {} usable bytes at {:#x}", len, heap.address(0));

    Ok(heap)
  }

  /// Usable length of the region: the sum of all block sizes.
  pub fn capacity(&self) -> usize {
    self.len
  }

  /// Allocates a block with room for at least `size` payload bytes and
  /// returns the payload address, always a multiple of 8.
  ///
  /// Picks the smallest free block that fits, taking an exact fit as soon as
  /// one shows up. A larger block is split and the rest stays free.
  pub fn allocate(
    &mut self,
    size: usize,
  ) -> Result<NonNull<u8>, HeapError> {
    if size < 1 {
      return Err(HeapError::InvalidSize);
    }
    if size.saturating_add(WORD) > self.len {
      return Err(HeapError::RequestTooLarge {
        requested: size,
        capacity: self.len,
      });
    }

    let needed = align!(WORD + size);
    let best = self.find_best_fit(needed).ok_or_else(|| {
      log::debug!("allocate({}): no free block of {} bytes", size, needed);
      HeapError::OutOfMemory { needed }
    })?;

    if best.size() == needed {
      log::debug!("allocate({}): exact fit at offset {}", size, best.offset);

      let mut tag = best.tag;
      tag.set_allocated(true);
      self.write(best.offset, tag);
      self.set_prev_allocated(best.next_offset(), true);
    } else {
      log::debug!(
        "allocate({}): splitting {} bytes at offset {} into {} + {}",
        size,
        best.size(),
        best.offset,
        needed,
        best.size() - needed
      );

      let used = Tag::new(needed as u32, true, best.tag.prev_is_allocated());
      self.write(best.offset, used);

      let rest = Block::new(
        best.offset + needed,
        Tag::new((best.size() - needed) as u32, false, true),
      );
      self.write(rest.offset, rest.tag);
      self.write(rest.footer_offset(), Tag::footer(rest.size() as u32));
    }

    Ok(self.payload(best.offset))
  }

  fn find_best_fit(
    &self,
    needed: usize,
  ) -> Option<Block> {
    let mut best: Option<Block> = None;

    for block in self.walk() {
      if !block.is_free() || block.size() < needed {
        continue;
      }

      if block.size() == needed {
        return Some(block);
      }

      if best.is_none_or(|current| block.size() < current.size()) {
        best = Some(block);
      }
    }

    best
  }

  /// Frees the block whose payload starts at `ptr`.
  ///
  /// The block only becomes free: merging it with free neighbors is left to
  /// [`Heap::coalesce`]. A rejected call changes nothing.
  pub fn free(
    &mut self,
    ptr: *mut u8,
  ) -> Result<(), HeapError> {
    self
      .release(ptr)
      .inspect_err(|err| log::warn!("free({:?}) rejected: {}", ptr, err))
  }

  fn release(
    &mut self,
    ptr: *mut u8,
  ) -> Result<(), HeapError> {
    if ptr.is_null() {
      return Err(HeapError::NullPointer);
    }

    let addr = ptr as usize;
    if addr % DOUBLE_WORD != 0 {
      return Err(HeapError::Misaligned(addr));
    }

    // Headers live in [first block, end sentinel).
    let first = self.address(0);
    let header = addr - WORD;
    if header < first || header >= first + self.len {
      return Err(HeapError::OutOfRange(addr));
    }

    let offset = header - first;
    let block = self
      .walk()
      .find(|block| block.offset >= offset)
      .filter(|block| block.offset == offset)
      .ok_or(HeapError::NotABlock(addr))?;

    if block.is_free() {
      return Err(HeapError::DoubleFree(addr));
    }

    log::debug!("free: {} bytes at offset {}", block.size(), offset);

    let mut tag = block.tag;
    tag.set_allocated(false);
    self.write(offset, tag);
    self.write(block.footer_offset(), Tag::footer(block.size() as u32));
    self.set_prev_allocated(block.next_offset(), false);

    Ok(())
  }

  /// Merges every run of physically adjacent free blocks in one pass.
  /// Returns whether anything was merged.
  pub fn coalesce(&mut self) -> bool {
    let mut merges = 0;
    let mut offset = 0;

    loop {
      let current = self.block_at(offset);
      if self.terminates(&current) {
        break;
      }

      let next = self.block_at(current.next_offset());
      if self.terminates(&next) {
        break;
      }

      if !current.is_free() {
        offset = next.offset;
        continue;
      }

      if !next.is_free() {
        offset = next.next_offset();
        continue;
      }

      // Absorb the right neighbor and look at the merged block again.
      let size = current.size() + next.size();
      let mut tag = current.tag;
      tag.set_size(size as u32);

      self.write(offset, tag);
      self.write(next.offset, Tag::from_raw(0));
      self.write(offset + size - WORD, Tag::footer(size as u32));

      merges += 1;
    }

    log::debug!("coalesce: {} merges", merges);

    merges > 0
  }

  /// Every block from the lowest address up to the end sentinel.
  pub fn blocks(&self) -> impl Iterator<Item = BlockInfo> + '_ {
    self.walk().enumerate().map(|(i, block)| {
      let begin = self.address(block.offset);
      BlockInfo {
        index: i + 1,
        allocated: block.tag.is_allocated(),
        prev_allocated: block.tag.prev_is_allocated(),
        begin,
        end: begin + block.size() - 1,
        size: block.size(),
      }
    })
  }

  pub fn stats(&self) -> HeapStats {
    self.walk().fold(HeapStats::default(), |mut stats, block| {
      if block.is_free() {
        stats.free += block.size();
      } else {
        stats.used += block.size();
      }
      stats.blocks += 1;
      stats
    })
  }

  /// Verifies the block list: sizes, the `prev_allocated` chain, free block
  /// footers and the end sentinel sitting exactly at the end of the region.
  pub fn check(&self) -> Result<(), HeapError> {
    let corrupted = |offset, reason| Err(HeapError::Corrupted { offset, reason });

    let mut offset = 0;
    let mut prev_allocated = true;

    loop {
      let tag = self.read(offset);

      if offset == self.len {
        if !tag.is_end() {
          return corrupted(offset, "missing end sentinel");
        }
        return Ok(());
      }
      if tag.is_end() {
        return corrupted(offset, "end sentinel before the end of the region");
      }

      let size = tag.size();
      if size == 0 || size % DOUBLE_WORD != 0 {
        return corrupted(offset, "size is not a positive multiple of 8");
      }
      if offset + size > self.len {
        return corrupted(offset, "block overruns the region");
      }
      if tag.prev_is_allocated() != prev_allocated {
        return corrupted(offset, "prev_allocated disagrees with the previous block");
      }
      if !tag.is_allocated() && self.read(offset + size - WORD).raw() as usize != size {
        return corrupted(offset, "footer does not match header");
      }

      prev_allocated = tag.is_allocated();
      offset += size;
    }
  }

  /// Prints the block list to stdout.
  pub fn dump(&self) {
    print!("{}", self);
  }

  fn walk(&self) -> Walk<'_> {
    Walk {
      heap: self,
      offset: 0,
    }
  }

  /// Whether a scan has to stop at `block`: the end sentinel, or a header
  /// that would lead outside the region.
  fn terminates(
    &self,
    block: &Block,
  ) -> bool {
    block.tag.is_end() || block.size() == 0 || block.next_offset() > self.len
  }

  fn set_prev_allocated(
    &mut self,
    offset: usize,
    prev_allocated: bool,
  ) {
    let mut tag = self.read(offset);
    if tag.is_end() {
      return;
    }
    tag.set_prev_allocated(prev_allocated);
    self.write(offset, tag);
  }

  fn block_at(
    &self,
    offset: usize,
  ) -> Block {
    Block::new(offset, self.read(offset))
  }

  fn word(
    &self,
    offset: usize,
  ) -> *mut u32 {
    assert!(
      offset <= self.len && offset % WORD == 0,
      "header offset {} outside of the heap",
      offset
    );
    unsafe { self.region.base().as_ptr().add(WORD + offset) as *mut u32 }
  }

  fn read(
    &self,
    offset: usize,
  ) -> Tag {
    Tag::from_raw(unsafe { self.word(offset).read() })
  }

  fn write(
    &mut self,
    offset: usize,
    tag: Tag,
  ) {
    unsafe { self.word(offset).write(tag.raw()) }
  }

  fn address(
    &self,
    offset: usize,
  ) -> usize {
    self.region.base().as_ptr() as usize + WORD + offset
  }

  fn payload(
    &self,
    offset: usize,
  ) -> NonNull<u8> {
    unsafe { self.region.base().add(WORD + offset + WORD) }
  }
}

impl fmt::Display for Heap {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    let rule = "-".repeat(81);
    let stars = "*".repeat(81);

    writeln!(f, "{:*^81}", " Block List ")?;
    writeln!(f, "No.\tStatus\tPrev\tt_Begin\t\tt_End\t\tt_Size")?;
    writeln!(f, "{}", rule)?;

    for block in self.blocks() {
      let status = |allocated| if allocated { "alloc" } else { "FREE " };
      writeln!(
        f,
        "{}\t{}\t{}\t{:#010x}\t{:#010x}\t{:4}",
        block.index,
        status(block.allocated),
        status(block.prev_allocated),
        block.begin,
        block.end,
        block.size
      )?;
    }

    let stats = self.stats();

    writeln!(f, "{}", rule)?;
    writeln!(f, "{}", stars)?;
    writeln!(f, "Total used size = {:4}", stats.used)?;
    writeln!(f, "Total free size = {:4}", stats.free)?;
    writeln!(f, "Total size      = {:4}", stats.total())?;
    writeln!(f, "{}", stars)
  }
}

impl fmt::Debug for Heap {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    f.debug_struct("Heap")
      .field("base", &self.region.base())
      .field("capacity", &self.len)
      .field("stats", &self.stats())
      .finish()
  }
}

/// Forward scan over the block list, stopping at the end sentinel.
struct Walk<'a> {
  heap: &'a Heap,
  offset: usize,
}

impl Iterator for Walk<'_> {
  type Item = Block;

  fn next(&mut self) -> Option<Block> {
    if self.offset > self.heap.len {
      return None;
    }

    let block = self.heap.block_at(self.offset);
    if self.heap.terminates(&block) {
      self.offset = self.heap.len + 1;
      return None;
    }

    self.offset = block.next_offset();
    Some(block)
  }
}
