//! Tower height derivation and per-insert random height generation
//! (spec.md §4.3.1/§4.3.2).

use rand::Rng;

/// `H = ceil(log2(expected_size) / 2)`, clamped to at least 1.
#[must_use]
pub(crate) const fn tower_height(expected_size: usize) -> u8 {
    let natural = log2_ceil(expected_size);
    let half = natural / 2 + (natural % 2 != 0) as u8;
    if half == 0 {
        1
    } else {
        half
    }
}

#[must_use]
const fn log2_ceil(value: usize) -> u8 {
    if value <= 1 {
        return 0;
    }
    let high_bit = (usize::BITS - (value - 1).leading_zeros()) as u8;
    high_bit
}

/// Geometric height draw with `p = 1/4`: start at 1, keep promoting while a
/// 4-sided die reads non-zero, up to `max_height`.
#[must_use]
pub(crate) fn random_height(max_height: u8, rng: &mut impl Rng) -> u8 {
    let mut height = 1u8;
    while height < max_height && rng.gen_range(0..4) != 0 {
        height += 1;
    }
    height
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn tower_height_matches_expected_examples() {
        assert_eq!(tower_height(512), 5);
        assert_eq!(tower_height(1), 1);
        assert_eq!(tower_height(2), 1);
        assert_eq!(tower_height(4), 1);
        assert_eq!(tower_height(16), 2);
    }

    #[test]
    fn random_height_never_exceeds_max() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(42);
        for _ in 0..10_000 {
            let h = random_height(5, &mut rng);
            assert!((1..=5).contains(&h));
        }
    }

    #[test]
    fn random_height_is_geometric_mostly_one() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(7);
        let mut at_least_two = 0;
        const N: usize = 100_000;
        for _ in 0..N {
            if random_height(20, &mut rng) >= 2 {
                at_least_two += 1;
            }
        }
        // p=1/4 per promotion: ~25% should reach height >= 2.
        let ratio = at_least_two as f64 / N as f64;
        assert!((0.20..0.30).contains(&ratio), "ratio was {ratio}");
    }
}
