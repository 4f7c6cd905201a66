use std::{error, fmt, io};

/// Everything that can go wrong in the heap.
///
/// Failed calls never touch the block list: a caller that gets an `Err` back
/// sees the heap exactly as it was before the call.
#[derive(Debug)]
pub enum HeapError {
  /// `Heap::init` already succeeded once in this process.
  AlreadyInitialized,
  /// The requested region size was zero.
  InvalidRegionSize,
  /// The page-rounded region does not fit the 32-bit size field.
  RegionTooLarge(usize),
  /// The OS refused to map the region.
  MapFailed(io::Error),
  /// `allocate` was asked for zero bytes.
  InvalidSize,
  /// Header plus payload is bigger than the whole region.
  RequestTooLarge { requested: usize, capacity: usize },
  /// No free block can hold `needed` bytes.
  OutOfMemory { needed: usize },
  NullPointer,
  /// The pointer is not a multiple of 8.
  Misaligned(usize),
  /// The header in front of the pointer lies outside the region.
  OutOfRange(usize),
  /// The header in front of the pointer is not the start of any block.
  NotABlock(usize),
  /// The block is already free.
  DoubleFree(usize),
  /// A structural invariant of the block list does not hold.
  Corrupted { offset: usize, reason: &'static str },
}

impl fmt::Display for HeapError {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    match self {
      HeapError::AlreadyInitialized => {
        write!(f, "heap has allocated space during a previous call")
      }
      HeapError::InvalidRegionSize => write!(f, "requested region size is not positive"),
      HeapError::RegionTooLarge(size) => {
        write!(f, "region of {} bytes does not fit a block header", size)
      }
      HeapError::MapFailed(err) => write!(f, "mmap cannot allocate space: {}", err),
      HeapError::InvalidSize => write!(f, "requested payload size is not positive"),
      HeapError::RequestTooLarge {
        requested,
        capacity,
      } => write!(
        f,
        "request of {} bytes exceeds the {} byte region",
        requested, capacity
      ),
      HeapError::OutOfMemory { needed } => {
        write!(f, "no free block of at least {} bytes", needed)
      }
      HeapError::NullPointer => write!(f, "cannot free a null pointer"),
      HeapError::Misaligned(addr) => write!(f, "pointer {:#x} is not 8-byte aligned", addr),
      HeapError::OutOfRange(addr) => write!(f, "pointer {:#x} is outside the heap", addr),
      HeapError::NotABlock(addr) => {
        write!(f, "pointer {:#x} does not start a block payload", addr)
      }
      HeapError::DoubleFree(addr) => write!(f, "block at {:#x} is already free", addr),
      HeapError::Corrupted { offset, reason } => {
        write!(f, "heap corrupted at offset {}: {}", offset, reason)
      }
    }
  }
}

impl error::Error for HeapError {
  fn source(&self) -> Option<&(dyn error::Error + 'static)> {
    match self {
      HeapError::MapFailed(err) => Some(err),
      _ => None,
    }
  }
}

impl From<io::Error> for HeapError {
  fn from(err: io::Error) -> Self {
    HeapError::MapFailed(err)
  }
}

#[cfg(test)]
mod tests {
  use std::error::Error;

  use super::*;

  #[test]
  fn test_display() {
    assert_eq!(
      HeapError::Misaligned(0x1003).to_string(),
      "pointer 0x1003 is not 8-byte aligned"
    );
    assert_eq!(
      HeapError::OutOfMemory { needed: 32 }.to_string(),
      "no free block of at least 32 bytes"
    );
  }

  #[test]
  fn test_source_only_for_os_errors() {
    let err = HeapError::from(io::Error::from_raw_os_error(libc::ENOMEM));

    assert!(err.source().is_some());
    assert!(HeapError::NullPointer.source().is_none());
  }
}
