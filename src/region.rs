use std::{io, ptr, ptr::NonNull};

use libc::{MAP_ANONYMOUS, MAP_FAILED, MAP_PRIVATE, PROT_READ, PROT_WRITE, c_void, mmap, munmap};

use crate::{align_to, error::HeapError};

/// Returns the system page size.
pub fn page_size() -> usize {
  let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };

  // sysconf only fails for unknown names.
  if size <= 0 { 4096 } else { size as usize }
}

/// One private, zero-filled, read-write mapping, page aligned and sized to a
/// whole number of pages. Unmapped on drop.
pub struct Region {
  base: NonNull<u8>,
  len: usize,
}

impl Region {
  /// Maps at least `size` bytes, rounded up to the page size.
  pub fn map(size: usize) -> Result<Self, HeapError> {
    if size == 0 {
      return Err(HeapError::InvalidRegionSize);
    }

    let page = page_size();
    if size > usize::MAX - page {
      return Err(HeapError::RegionTooLarge(size));
    }
    let len = align_to!(size, page);

    let address = unsafe {
      mmap(
        ptr::null_mut(),
        len,
        PROT_READ | PROT_WRITE,
        MAP_PRIVATE | MAP_ANONYMOUS,
        -1,
        0,
      )
    };

    if address == MAP_FAILED {
      return Err(io::Error::last_os_error().into());
    }

    let base = NonNull::new(address as *mut u8)
      .ok_or_else(|| io::Error::from(io::ErrorKind::OutOfMemory))?;

    log::debug!("mapped {} bytes at {:?} (page size {})", len, base, page);

    Ok(Self { base, len })
  }

  pub fn base(&self) -> NonNull<u8> {
    self.base
  }

  /// Length of the mapping in bytes, always a multiple of the page size.
  pub fn len(&self) -> usize {
    self.len
  }
}

impl Drop for Region {
  fn drop(&mut self) {
    let result = unsafe { munmap(self.base.as_ptr() as *mut c_void, self.len) };

    if result != 0 {
      log::warn!(
        "munmap of {} bytes at {:?} failed: {}",
        self.len,
        self.base,
        io::Error::last_os_error()
      );
    }
  }
}
