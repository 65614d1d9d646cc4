use super::{RootSource, RootWindow};
use std::sync::atomic::{AtomicUsize, Ordering};

/// An explicit root window: a fixed run of word sized slots the embedder
/// fills with the addresses it wants to keep alive.
///
/// Every cycle loads each slot atomically and treats its value as a root, so
/// any value stored in them that equals a tracked block's address keeps that
/// block alive. Slots can be set from any thread, even mid cycle.
pub struct RootSlots {
    slots: Box<[AtomicUsize]>,
}

impl RootSlots {
    pub fn new(len: usize) -> Self {
        Self {
            slots: (0..len.max(1)).map(|_| AtomicUsize::new(0)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn set<T>(&self, index: usize, ptr: *const T) {
        self.slots[index].store(ptr as usize, Ordering::SeqCst);
    }

    pub fn get(&self, index: usize) -> usize {
        self.slots[index].load(Ordering::SeqCst)
    }

    pub fn clear(&self, index: usize) {
        self.slots[index].store(0, Ordering::SeqCst);
    }

    pub fn clear_all(&self) {
        for slot in self.slots.iter() {
            slot.store(0, Ordering::SeqCst);
        }
    }
}

impl RootSource for RootSlots {
    fn capture(&self, _with_registers: bool) -> Option<RootWindow> {
        let values = self
            .slots
            .iter()
            .map(|slot| slot.load(Ordering::SeqCst))
            .collect();

        Some(RootWindow::from_values(values))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_holds_every_slot() {
        let slots = RootSlots::new(4);
        slots.set(2, 0x1000 as *const u8);

        let window = slots.capture(true).unwrap();

        assert_eq!(window.stack_words(), 0);
        assert_eq!(window.values, vec![0, 0, 0x1000, 0]);
    }

    #[test]
    fn set_and_clear() {
        let slots = RootSlots::new(2);
        let x = 5u64;

        slots.set(1, &x);
        assert_eq!(slots.get(1), &x as *const u64 as usize);

        slots.clear_all();
        assert_eq!(slots.get(1), 0);
    }
}
