use std::fmt;

const ALLOCATED: u32 = 0b01;
const PREV_ALLOCATED: u32 = 0b10;
const FLAGS: u32 = ALLOCATED | PREV_ALLOCATED;

/// Packed block header: the size in the upper bits, two status flags in the
/// lowest two.
///
/// ```text
///   31                                         2   1   0
///   ┌──────────────────────────────────────────┬───┬───┐
///   │              size (multiple of 8)        │ p │ a │
///   └──────────────────────────────────────────┴───┴───┘
///     a = this block is allocated
///     p = the block right below this one is allocated
/// ```
///
/// Footers reuse the same word but only ever carry the size.
#[derive(Clone, Copy, PartialEq, Eq)]
#[repr(transparent)]
pub struct Tag(u32);

impl Tag {
  /// The end sentinel: size 0, allocated.
  pub const END: Tag = Tag(ALLOCATED);

  pub const fn new(
    size: u32,
    allocated: bool,
    prev_allocated: bool,
  ) -> Self {
    let mut raw = size & !FLAGS;
    if allocated {
      raw |= ALLOCATED;
    }
    if prev_allocated {
      raw |= PREV_ALLOCATED;
    }
    Self(raw)
  }

  /// A footer word, size only.
  pub const fn footer(size: u32) -> Self {
    Self(size & !FLAGS)
  }

  pub const fn from_raw(raw: u32) -> Self {
    Self(raw)
  }

  pub const fn raw(self) -> u32 {
    self.0
  }

  pub const fn size(self) -> usize {
    (self.0 & !FLAGS) as usize
  }

  pub const fn is_allocated(self) -> bool {
    self.0 & ALLOCATED != 0
  }

  pub const fn prev_is_allocated(self) -> bool {
    self.0 & PREV_ALLOCATED != 0
  }

  pub const fn is_end(self) -> bool {
    self.0 == Self::END.0
  }

  pub fn set_size(
    &mut self,
    size: u32,
  ) {
    self.0 = (size & !FLAGS) | (self.0 & FLAGS);
  }

  pub fn set_allocated(
    &mut self,
    allocated: bool,
  ) {
    if allocated {
      self.0 |= ALLOCATED;
    } else {
      self.0 &= !ALLOCATED;
    }
  }

  pub fn set_prev_allocated(
    &mut self,
    prev_allocated: bool,
  ) {
    if prev_allocated {
      self.0 |= PREV_ALLOCATED;
    } else {
      self.0 &= !PREV_ALLOCATED;
    }
  }
}

impl fmt::Debug for Tag {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    f.debug_struct("Tag")
      .field("size", &self.size())
      .field("allocated", &self.is_allocated())
      .field("prev_allocated", &self.prev_is_allocated())
      .finish()
  }
}

/// A block as seen during a scan: where its header sits (as an offset from the
/// first block) and what the header says.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block {
  pub offset: usize,
  pub tag: Tag,
}

impl Block {
  pub fn new(
    offset: usize,
    tag: Tag,
  ) -> Self {
    Self { offset, tag }
  }

  pub fn size(&self) -> usize {
    self.tag.size()
  }

  pub fn is_free(&self) -> bool {
    !self.tag.is_allocated()
  }

  /// Offset of the block physically after this one.
  pub fn next_offset(&self) -> usize {
    self.offset + self.size()
  }

  /// Offset of the last word of the block, where a free block keeps its footer.
  pub fn footer_offset(&self) -> usize {
    self.next_offset() - crate::WORD
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_tag_encoding() {
    // Values straight from the header layout: 24-byte blocks.
    assert_eq!(Tag::new(24, true, false).raw(), 25);
    assert_eq!(Tag::new(24, true, true).raw(), 27);
    assert_eq!(Tag::new(24, false, false).raw(), 24);
    assert_eq!(Tag::new(24, false, true).raw(), 26);
    assert_eq!(Tag::footer(24).raw(), 24);
  }

  #[test]
  fn test_tag_accessors() {
    let tag = Tag::from_raw(27);

    assert_eq!(tag.size(), 24);
    assert!(tag.is_allocated());
    assert!(tag.prev_is_allocated());
    assert!(!tag.is_end());

    let free = Tag::from_raw(24);

    assert!(!free.is_allocated());
    assert!(!free.prev_is_allocated());
  }

  #[test]
  fn test_tag_mutators_keep_other_fields() {
    let mut tag = Tag::new(48, false, true);

    tag.set_allocated(true);
    assert_eq!(tag, Tag::new(48, true, true));

    tag.set_prev_allocated(false);
    assert_eq!(tag, Tag::new(48, true, false));

    tag.set_size(96);
    assert_eq!(tag, Tag::new(96, true, false));

    tag.set_allocated(false);
    assert_eq!(tag.raw(), 96);
  }

  #[test]
  fn test_end_sentinel() {
    assert_eq!(Tag::END.raw(), 1);
    assert_eq!(Tag::END.size(), 0);
    assert!(Tag::END.is_allocated());
    assert!(Tag::END.is_end());
    assert!(!Tag::new(8, true, true).is_end());
  }

  #[test]
  fn test_block_offsets() {
    let block = Block::new(16, Tag::new(32, false, true));

    assert!(block.is_free());
    assert_eq!(block.next_offset(), 48);
    assert_eq!(block.footer_offset(), 44);
  }
}
