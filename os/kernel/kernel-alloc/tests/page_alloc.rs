use kernel_alloc::{
    ALLOC_JUNK, AllocError, AllocInitError, FREE_JUNK, PageAllocator, PhysicalAddress,
    PhysicalRange,
};
use kernel_info::memory::PAGE_SIZE;
use kernel_sync::hosted::HostCpu;
use std::alloc::{Layout, alloc_zeroed};
use std::collections::HashSet;
use std::sync::{Arc, Barrier};
use std::thread;

const PAGE: usize = PAGE_SIZE as usize;

/// Leaks `pages` page-aligned pages of host memory and returns their range.
///
/// Also moves the calling thread back to the boot cpu, in case the harness
/// reuses threads between tests.
fn ram(pages: usize) -> PhysicalRange {
    HostCpu::set_current(0);
    let layout = Layout::from_size_align(pages * PAGE, PAGE).unwrap();
    let base = unsafe { alloc_zeroed(layout) };
    assert!(!base.is_null());
    let start = PhysicalAddress::from_ptr(base);
    PhysicalRange::new(start, start + (pages * PAGE) as u64)
}

fn kmem(cpus: usize, pages: usize) -> PageAllocator<HostCpu> {
    unsafe { PageAllocator::new(cpus, ram(pages)) }.expect("allocator")
}

fn bytes<'a>(page: PhysicalAddress) -> &'a [u8] {
    unsafe { std::slice::from_raw_parts(page.as_mut_ptr::<u8>(), PAGE) }
}

#[test]
fn init_puts_every_page_on_the_boot_cpu() {
    let kmem = kmem(4, 16);
    assert_eq!(kmem.cpus(), 4);
    assert_eq!(kmem.free_pages(), 16);
    assert_eq!(kmem.free_pages_on(0), 16);
    for cpu in 1..4 {
        assert_eq!(kmem.free_pages_on(cpu), 0);
    }
}

#[test]
fn init_ignores_leading_partial_page() {
    let whole = ram(4);
    let range = PhysicalRange::new(whole.start() + 8, whole.end());
    let kmem: PageAllocator<HostCpu> = unsafe { PageAllocator::new(1, range) }.unwrap();
    assert_eq!(kmem.free_pages(), 3);
    assert_eq!(kmem.range(), range);
}

#[test]
fn init_rejects_bad_parameters() {
    let range = ram(2);
    assert_eq!(
        unsafe { PageAllocator::<HostCpu>::new(0, range) }.err(),
        Some(AllocInitError::NoCpus)
    );
    assert!(matches!(
        unsafe { PageAllocator::<HostCpu>::new(1000, range) },
        Err(AllocInitError::TooManyCpus { cpus: 1000, .. })
    ));

    let sliver = PhysicalRange::new(range.start() + 1, range.start() + PAGE_SIZE);
    assert_eq!(
        unsafe { PageAllocator::<HostCpu>::new(1, sliver) }.err(),
        Some(AllocInitError::EmptyRange(sliver))
    );
}

#[test]
fn alloc_then_free_keeps_the_count() {
    let kmem = kmem(2, 8);
    let page = kmem.alloc().unwrap();
    assert_eq!(kmem.free_pages(), 7);
    unsafe { kmem.free(page) };
    assert_eq!(kmem.free_pages(), 8);
}

#[test]
fn pages_are_never_handed_out_twice() {
    let kmem = kmem(1, 32);
    let mut seen = HashSet::new();
    while let Ok(page) = kmem.alloc() {
        assert!(page.is_page_aligned());
        assert!(kmem.range().contains_page(page));
        assert!(seen.insert(page), "{page:?} handed out twice");
    }
    assert_eq!(seen.len(), 32);
    assert_eq!(kmem.free_pages(), 0);
}

#[test]
fn exhausted_pool_fails_gracefully() {
    let kmem = kmem(1, 1);
    let page = kmem.alloc().unwrap();
    assert_eq!(kmem.alloc(), Err(AllocError::OutOfMemory));
    assert_eq!(kmem.alloc(), Err(AllocError::OutOfMemory));

    unsafe { kmem.free(page) };
    assert_eq!(kmem.alloc(), Ok(page));
}

#[test]
fn pages_carry_junk_patterns() {
    let kmem = kmem(1, 2);
    let page = kmem.alloc().unwrap();
    assert!(bytes(page).iter().all(|&b| b == ALLOC_JUNK));

    unsafe { page.as_mut_ptr::<u8>().write_bytes(0xAB, PAGE) };
    unsafe { kmem.free(page) };
    // The first word holds the free-list link.
    let tail = &bytes(page)[size_of::<usize>()..];
    assert!(tail.iter().all(|&b| b == FREE_JUNK));

    let again = kmem.alloc().unwrap();
    assert_eq!(again, page);
    assert!(bytes(again).iter().all(|&b| b == ALLOC_JUNK));
}

#[test]
fn second_cpu_steals_the_only_page() {
    let kmem = kmem(2, 1);
    assert_eq!(kmem.free_pages_on(0), 1);

    HostCpu::set_current(1);
    assert!(kmem.alloc().is_ok());
    assert_eq!(kmem.alloc(), Err(AllocError::OutOfMemory));

    HostCpu::set_current(0);
    assert_eq!(kmem.alloc(), Err(AllocError::OutOfMemory));
}

#[test]
fn freed_pages_land_on_the_freeing_cpu() {
    let kmem = kmem(3, 4);
    let page = kmem.alloc().unwrap();

    HostCpu::set_current(2);
    unsafe { kmem.free(page) };
    assert_eq!(kmem.free_pages_on(0), 3);
    assert_eq!(kmem.free_pages_on(2), 1);

    // Own list first: the page just freed here comes back.
    assert_eq!(kmem.alloc(), Ok(page));
}

#[test]
fn preemption_is_restored_after_each_call() {
    let kmem = kmem(2, 2);
    assert_eq!(HostCpu::depth(), 0);
    let page = kmem.alloc().unwrap();
    assert_eq!(HostCpu::depth(), 0);
    unsafe { kmem.free(page) };
    assert_eq!(HostCpu::depth(), 0);
}

#[test]
#[should_panic(expected = "kfree")]
fn freeing_a_misaligned_address_is_fatal() {
    let kmem = kmem(1, 2);
    let page = kmem.alloc().unwrap();
    unsafe { kmem.free(page + 16) };
}

#[test]
#[should_panic(expected = "kfree")]
fn freeing_foreign_memory_is_fatal() {
    let kmem = kmem(1, 2);
    unsafe { kmem.free(kmem.range().end()) };
}

#[test]
#[should_panic(expected = "kfree")]
fn freeing_the_top_page_of_the_address_space_is_fatal() {
    let kmem = kmem(1, 2);
    unsafe { kmem.free(PhysicalAddress::new(0xFFFF_FFFF_FFFF_F000)) };
}

#[test]
#[should_panic(expected = "kalloc: cpu 5")]
fn unknown_cpu_is_fatal() {
    let kmem = kmem(2, 2);
    HostCpu::set_current(5);
    let _ = kmem.alloc();
}

#[test]
fn concurrent_cpus_never_share_a_page() {
    let cpus = 4;
    let per_cpu = 16;
    let rounds = 200;
    let kmem = Arc::new(kmem(cpus, cpus * per_cpu));
    let start = Arc::new(Barrier::new(cpus));

    let handles: Vec<_> = (0..cpus)
        .map(|cpu| {
            let kmem = Arc::clone(&kmem);
            let start = Arc::clone(&start);
            thread::spawn(move || {
                HostCpu::set_current(cpu);
                let tag = u8::try_from(cpu).unwrap() + 0x10;
                start.wait();
                for _ in 0..rounds {
                    let mut held = Vec::new();
                    while held.len() < per_cpu {
                        match kmem.alloc() {
                            Ok(page) => {
                                unsafe { page.as_mut_ptr::<u8>().write_bytes(tag, PAGE) };
                                held.push(page);
                            }
                            Err(AllocError::OutOfMemory) => break,
                        }
                    }
                    thread::yield_now();
                    for page in held {
                        assert!(
                            bytes(page).iter().all(|&b| b == tag),
                            "page shared between cpus"
                        );
                        unsafe { kmem.free(page) };
                    }
                }
            })
        })
        .collect();

    for h in handles {
        h.join().unwrap();
    }
    assert_eq!(kmem.free_pages(), cpus * per_cpu);
}
