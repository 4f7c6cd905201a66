/// Rounds `value` up to the next multiple of the 8-byte double word.
///
/// Every block size in the heap goes through this macro.
///
/// # Examples
///
/// ```rust
/// use rheap::align;
///
/// assert_eq!(align!(13), 16);
/// assert_eq!(align!(16), 16);
/// assert_eq!(align!(4 + 1), 8);
/// ```
#[macro_export]
macro_rules! align {
  ($value:expr) => {
    $crate::align_to!($value, $crate::DOUBLE_WORD)
  };
}

/// Rounds `value` up to the next multiple of `align`, which must be a power of two.
///
/// ```rust
/// use rheap::align_to;
///
/// assert_eq!(align_to!(1, 4096), 4096);
/// assert_eq!(align_to!(8192, 4096), 8192);
/// ```
#[macro_export]
macro_rules! align_to {
  ($value:expr, $align:expr) => {
    ($value + $align - 1) & !($align - 1)
  };
}

#[cfg(test)]
mod tests {
  use crate::DOUBLE_WORD;

  #[test]
  fn test_align() {
    let mut alignments = Vec::new();

    for i in 0..10 {
      let sizes = (DOUBLE_WORD * i + 1)..=(DOUBLE_WORD * (i + 1));

      let expected_alignment = DOUBLE_WORD * (i + 1);

      alignments.push((sizes, expected_alignment));
    }

    for (sizes, expected) in alignments {
      for size in sizes {
        assert_eq!(expected, align!(size));
      }
    }
  }

  #[test]
  fn test_align_to_page() {
    assert_eq!(align_to!(1usize, 4096), 4096);
    assert_eq!(align_to!(4095usize, 4096), 4096);
    assert_eq!(align_to!(4096usize, 4096), 4096);
    assert_eq!(align_to!(4097usize, 4096), 8192);
    assert_eq!(align_to!(5usize, 16384), 16384);
  }
}
