use rheap::{Heap, HeapError};

// The guard is process-wide, so everything lives in a single test.
#[test]
fn test_init_only_once() {
  let _ = env_logger::builder().is_test(true).try_init();

  assert!(matches!(Heap::init(0), Err(HeapError::InvalidRegionSize)));

  let mut heap = Heap::init(1).unwrap();
  assert_eq!(heap.capacity(), rheap::page_size() - rheap::DOUBLE_WORD);

  let ptr = heap.allocate(16).unwrap();
  heap.free(ptr.as_ptr()).unwrap();
  assert!(heap.coalesce());
  heap.check().unwrap();

  assert!(matches!(Heap::init(4096), Err(HeapError::AlreadyInitialized)));

  drop(heap);
  assert!(matches!(Heap::init(4096), Err(HeapError::AlreadyInitialized)));

  // Independent heaps are not affected by the guard.
  let other = Heap::new(4096).unwrap();
  assert_eq!(other.stats().blocks, 1);
}
