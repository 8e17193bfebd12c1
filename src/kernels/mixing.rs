//! Chained integer mixing (a variant of Bob Jenkins' three-word mix)

const INITIAL_HASH: u32 = 0xDEAD_BEEF;
const INITIAL_SEED: u32 = 0x1234_5678;

/// One rotate/subtract/xor round over three words.
#[inline]
pub fn mix_bits(mut a: u32, mut b: u32, mut c: u32) -> u32 {
    a = a.wrapping_sub(c);
    a ^= c.rotate_left(4);
    c = c.wrapping_add(b);

    b = b.wrapping_sub(a);
    b ^= a.rotate_left(6);
    a = a.wrapping_add(c);

    c = c.wrapping_sub(b);
    c ^= b.rotate_left(8);
    b = b.wrapping_add(a);

    a.wrapping_add(b).wrapping_add(c)
}

/// Run `rounds` dependent mixing rounds seeded from the loop index.
///
/// Each round consumes the previous round's output, so the chain cannot be
/// issued in parallel.
pub fn integer_mix(rounds: u32) -> u32 {
    let mut hash = INITIAL_HASH;
    let mut seed = INITIAL_SEED;

    for i in 0..rounds {
        seed = mix_bits(i, seed, hash);
        hash = seed ^ i;
    }

    hash
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_rounds_returns_initial_hash() {
        assert_eq!(integer_mix(0), INITIAL_HASH);
    }

    #[test]
    fn first_round_matches_manual_mix() {
        let seed = mix_bits(0, INITIAL_SEED, INITIAL_HASH);
        assert_eq!(integer_mix(1), seed);
    }

    #[test]
    fn mixing_is_deterministic_and_order_dependent() {
        assert_eq!(integer_mix(100_000), integer_mix(100_000));
        assert_ne!(integer_mix(1_000), integer_mix(1_001));
    }

    #[test]
    fn mix_bits_is_sensitive_to_every_word() {
        let base = mix_bits(1, 2, 3);
        assert_ne!(base, mix_bits(0, 2, 3));
        assert_ne!(base, mix_bits(1, 0, 3));
        assert_ne!(base, mix_bits(1, 2, 0));
    }
}
