// Double hashing over a prime modulus. The modulus is always the physical
// capacity of the table, which together with a step in 1..modulus makes every
// probe sequence visit each slot exactly once.

const H1_MUL: u128 = 33;
const H1_ADD: u128 = 39;
const H2_BASE: usize = 31;

/// Linear congruential hash of the address.
pub fn primary(addr: usize, modulus: usize) -> usize {
    ((H1_MUL * addr as u128 + H1_ADD) % modulus as u128) as usize
}

/// Probe stride derived from the decimal digits of the address, Horner style.
pub fn step(addr: usize, modulus: usize) -> usize {
    debug_assert!(modulus > 1);

    let mut digits = addr;
    let mut h: usize = 0;

    loop {
        h = h.wrapping_mul(H2_BASE).wrapping_add(digits % 10);
        digits /= 10;

        if digits == 0 {
            break;
        }
    }

    1 + h % (modulus - 1)
}

/// The slot indexes `(h1 + j * h2) mod modulus` for `j` in `0..modulus`.
///
/// The stride is only computed once the first slot turned out to be a
/// collision, since most lookups during marking stop at their first probe.
pub struct Probe {
    addr: usize,
    modulus: usize,
    pos: usize,
    step: Option<usize>,
    remaining: usize,
}

impl Probe {
    pub fn new(addr: usize, modulus: usize) -> Self {
        Self {
            addr,
            modulus,
            pos: primary(addr, modulus),
            step: None,
            remaining: modulus,
        }
    }
}

impl Iterator for Probe {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        if self.remaining == 0 {
            return None;
        }

        if self.remaining != self.modulus {
            let (addr, modulus) = (self.addr, self.modulus);
            let stride = *self.step.get_or_insert_with(|| step(addr, modulus));

            self.pos = (self.pos + stride) % self.modulus;
        }

        self.remaining -= 1;

        Some(self.pos)
    }
}
