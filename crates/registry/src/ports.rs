//! Monotonic port allocation for joining peers.

use std::sync::atomic::{AtomicU16, Ordering};

/// Base value the allocation counter starts from; the first port handed out
/// is `PORT_BASE + 1`.
pub const PORT_BASE: u16 = 3499;

/// Monotonically increasing counter handing out distinct listening ports.
///
/// Ports are never reused and no upper bound is enforced; the counter is
/// process-wide and not persisted.
#[derive(Debug)]
pub struct PortAllocator {
    next: AtomicU16,
}

impl PortAllocator {
    pub fn new() -> Self {
        Self::starting_at(PORT_BASE)
    }

    /// Counter primed so the first allocation returns `base + 1`.
    pub fn starting_at(base: u16) -> Self {
        Self {
            next: AtomicU16::new(base),
        }
    }

    /// Hands out the next port.
    pub fn next_port(&self) -> u16 {
        self.next.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Most recently handed-out port, or the base if none has been yet.
    pub fn last_allocated(&self) -> u16 {
        self.next.load(Ordering::SeqCst)
    }
}

impl Default for PortAllocator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn first_allocation_follows_the_base() {
        let ports = PortAllocator::new();
        assert_eq!(ports.last_allocated(), PORT_BASE);
        assert_eq!(ports.next_port(), 3500);
        assert_eq!(ports.last_allocated(), 3500);
    }

    #[test]
    fn allocations_strictly_increase() {
        let ports = PortAllocator::starting_at(9000);
        assert_eq!(ports.next_port(), 9001);
        assert_eq!(ports.next_port(), 9002);
        assert_eq!(ports.next_port(), 9003);
    }

    #[test]
    fn concurrent_allocations_are_distinct_and_gapless() {
        let ports = Arc::new(PortAllocator::new());
        let (tx, rx) = mpsc::channel();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let ports = Arc::clone(&ports);
                let tx = tx.clone();
                thread::spawn(move || {
                    for _ in 0..50 {
                        tx.send(ports.next_port()).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        drop(tx);

        let mut allocated: Vec<u16> = rx.iter().collect();
        allocated.sort_unstable();
        let expected: Vec<u16> = (3500..3500 + 400).collect();
        assert_eq!(allocated, expected);
    }
}
