// Integer helpers used to size the allocation table. The table's capacity
// doubles as its probing modulus, so every capacity it takes is prime.

/// Integer square root by Newton's method, rounded down.
pub fn isqrt(n: usize) -> usize {
    if n < 2 {
        return n;
    }

    // start from a power of two no smaller than the root
    let bits = usize::BITS - n.leading_zeros();
    let mut x = 1usize << ((bits + 1) / 2);
    let mut y = (x + n / x) / 2;

    while y < x {
        x = y;
        y = (x + n / x) / 2;
    }

    x
}

pub fn is_prime(n: usize) -> bool {
    if n < 2 {
        return false;
    }

    if n < 4 {
        return true;
    }

    if n % 2 == 0 {
        return false;
    }

    let limit = isqrt(n);
    let mut i = 3;

    while i <= limit {
        if n % i == 0 {
            return false;
        }

        i += 2;
    }

    true
}

/// Returns the largest prime less than or equal to `n`, or `None` if `n < 2`.
pub fn prime_at_most(n: usize) -> Option<usize> {
    (2..=n).rev().find(|&k| is_prime(k))
}
