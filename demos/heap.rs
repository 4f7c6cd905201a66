use std::{io::Read, ptr::NonNull};

use rheap::Heap;

/// Waits until the user presses ENTER, when running with `--step`.
/// Useful to look at the mapping with `pmap` or `gdb` between steps.
fn block_until_enter_pressed(step: bool) {
  if step {
    println!("\n>>> Press ENTER to continue...");
    let _ = std::io::stdin().bytes().next();
  }
}

fn print_alloc(
  size: usize,
  ptr: NonNull<u8>,
) {
  println!(
    "Allocated {} bytes, address = {:?}, aligned = {}",
    size,
    ptr,
    ptr.as_ptr() as usize % rheap::DOUBLE_WORD == 0
  );
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
  env_logger::init();

  let args: Vec<String> = std::env::args().skip(1).collect();
  let step = args.iter().any(|arg| arg == "--step");
  let size = args
    .iter()
    .find(|arg| !arg.starts_with("--"))
    .map(|arg| arg.parse::<usize>())
    .transpose()?
    .unwrap_or(4096);

  let mut heap = Heap::init(size)?;

  println!("[start] page size = {}, usable bytes = {}", rheap::page_size(), heap.capacity());
  heap.dump();
  block_until_enter_pressed(step);

  // --------------------------------------------------------------------
  // 1) A few allocations of odd sizes. Each block is header + payload,
  //    rounded up to 8 bytes, split off the big free block.
  // --------------------------------------------------------------------
  let first = heap.allocate(4)?;
  print_alloc(4, first);
  unsafe { (first.as_ptr() as *mut u32).write(0xDEADBEEF) };

  let second = heap.allocate(12)?;
  print_alloc(12, second);
  unsafe { second.as_ptr().write_bytes(0xAB, 12) };

  let third = heap.allocate(64)?;
  print_alloc(64, third);

  let fourth = heap.allocate(20)?;
  print_alloc(20, fourth);

  println!("\n[1] After four allocations");
  heap.dump();
  block_until_enter_pressed(step);

  // --------------------------------------------------------------------
  // 2) Free two neighbors. They stay separate blocks until coalesce().
  // --------------------------------------------------------------------
  heap.free(second.as_ptr())?;
  heap.free(third.as_ptr())?;

  println!("\n[2] After freeing the second and third blocks");
  heap.dump();
  block_until_enter_pressed(step);

  // --------------------------------------------------------------------
  // 3) Invalid frees are rejected and change nothing.
  // --------------------------------------------------------------------
  for (label, ptr) in [
    ("null", std::ptr::null_mut()),
    ("misaligned", unsafe { first.as_ptr().add(1) }),
    ("double free", second.as_ptr()),
  ] {
    match heap.free(ptr) {
      Ok(()) => println!("[3] free({}) unexpectedly succeeded", label),
      Err(err) => println!("[3] free({}) failed: {}", label, err),
    }
  }
  block_until_enter_pressed(step);

  // --------------------------------------------------------------------
  // 4) Coalesce and reuse the merged space with a best-fit request.
  // --------------------------------------------------------------------
  println!("\n[4] coalesce() merged blocks: {}", heap.coalesce());
  heap.dump();

  let fifth = heap.allocate(72)?;
  print_alloc(72, fifth);
  println!(
    "[4] fifth == second? {}",
    if fifth == second {
      "Yes, it reused the merged block"
    } else {
      "No, it allocated somewhere else"
    }
  );
  heap.dump();
  block_until_enter_pressed(step);

  // --------------------------------------------------------------------
  // 5) The region never grows: a request bigger than it is refused.
  // --------------------------------------------------------------------
  if let Err(err) = heap.allocate(heap.capacity()) {
    println!("\n[5] allocate({}) failed: {}", heap.capacity(), err);
  }

  heap.check()?;
  println!("\n[6] End of example. The heap is consistent.");

  Ok(())
}
