//! Modular arithmetic operations

/// Modular arithmetic operations over Z_q
pub struct ModQ;

impl ModQ {
    /// Add two values modulo q
    #[inline]
    pub fn add(a: u64, b: u64, q: u64) -> u64 {
        let sum = (a as u128) + (b as u128);
        (sum % (q as u128)) as u64
    }

    /// Subtract two values modulo q
    #[inline]
    pub fn sub(a: u64, b: u64, q: u64) -> u64 {
        if a >= b {
            a - b
        } else {
            q - (b - a)
        }
    }

    /// Multiply two values modulo q
    #[inline]
    pub fn mul(a: u64, b: u64, q: u64) -> u64 {
        let prod = (a as u128) * (b as u128);
        (prod % (q as u128)) as u64
    }

    /// Negate a value modulo q
    #[inline]
    pub fn negate(a: u64, q: u64) -> u64 {
        if a == 0 {
            0
        } else {
            q - a
        }
    }

    /// Convert a signed integer to its representation in Z_q
    #[inline]
    pub fn from_signed(val: i64, q: u64) -> u64 {
        let r = val.unsigned_abs() % q;
        if val < 0 {
            Self::negate(r, q)
        } else {
            r
        }
    }

    /// Convert from Z_q to signed representation in (-q/2, q/2]
    #[inline]
    pub fn to_signed(val: u64, q: u64) -> i64 {
        if val <= q / 2 {
            val as i64
        } else {
            -((q - val) as i64)
        }
    }

    /// base^exp mod m by square-and-multiply
    pub fn pow(base: u64, mut exp: u64, m: u64) -> u64 {
        let mut result = 1u64 % m;
        let mut base = base % m;
        while exp > 0 {
            if exp & 1 == 1 {
                result = Self::mul(result, base, m);
            }
            exp >>= 1;
            base = Self::mul(base, base, m);
        }
        result
    }

    /// Inverse modulo a prime via Fermat's little theorem
    pub fn inverse(a: u64, prime: u64) -> u64 {
        Self::pow(a, prime - 2, prime)
    }
}

/// Find a primitive `order`-th root of unity modulo the prime `q`.
///
/// `order` must be a power of two dividing q - 1. Returns `None` if no small
/// candidate works, which only happens for invalid moduli.
pub fn find_primitive_root(order: u64, q: u64) -> Option<u64> {
    if order < 2 || (q - 1) % order != 0 {
        return None;
    }
    let exp = (q - 1) / order;
    (2..q.min(1 << 16)).find_map(|g| {
        let candidate = ModQ::pow(g, exp, q);
        // ψ^(order/2) = -1 makes ψ primitive for power-of-two orders
        (ModQ::pow(candidate, order / 2, q) == q - 1).then_some(candidate)
    })
}

/// Deterministic Miller-Rabin for 64-bit integers
pub fn is_prime(n: u64) -> bool {
    const WITNESSES: [u64; 12] = [2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37];

    if n < 2 {
        return false;
    }
    for &w in &WITNESSES {
        if n % w == 0 {
            return n == w;
        }
    }

    let mut d = n - 1;
    let mut s = 0;
    while d % 2 == 0 {
        d /= 2;
        s += 1;
    }

    'witness: for &a in &WITNESSES {
        let mut x = ModQ::pow(a, d, n);
        if x == 1 || x == n - 1 {
            continue;
        }
        for _ in 1..s {
            x = ModQ::mul(x, x, n);
            if x == n - 1 {
                continue 'witness;
            }
        }
        return false;
    }
    true
}
