use std::{
  sync::{Arc, Barrier},
  thread,
};

use rheap::{Heap, HeapError};

// Runs in its own process: no other test touches the process-wide guard here.
#[test]
fn test_concurrent_init_claims_once() {
  let _ = env_logger::builder().is_test(true).try_init();

  let threads = 8;
  let barrier = Arc::new(Barrier::new(threads));

  let handles: Vec<_> = (0..threads)
    .map(|_| {
      let barrier = Arc::clone(&barrier);
      thread::spawn(move || {
        barrier.wait();
        match Heap::init(4096) {
          Ok(heap) => heap.check().is_ok(),
          Err(HeapError::AlreadyInitialized) => false,
          Err(err) => panic!("unexpected init failure: {}", err),
        }
      })
    })
    .collect();

  let winners = handles
    .into_iter()
    .map(|handle| handle.join().unwrap())
    .filter(|&won| won)
    .count();

  assert_eq!(winners, 1);
  assert!(matches!(Heap::init(4096), Err(HeapError::AlreadyInitialized)));
}
