//! Property-based generators for [`IotaTileAssignment`] and
//! permutations.
//!
//! The main entry point is [`gen_iota`], which builds an arbitrary
//! (canonicalized) iota assignment by factoring the element count of
//! a random shape into a random reshape and pairing it with a random
//! permutation:
//!
//! ```ignore
//! use proptest::prelude::*;
//!
//! use crate::strategy::gen_iota;
//!
//! proptest! {
//!     #[test]
//!     fn test_iota(iota in gen_iota(4, 6)) {
//!         // Use `iota` as input to transpose or indexing tests
//!     }
//! }
//! ```
//!
//! This module is only included in test builds (`#[cfg(test)]`).

use proptest::prelude::*;

use crate::iota::prime_factors;
use crate::IotaTileAssignment;

/// A uniformly shuffled permutation of `0..n`.
pub fn gen_perm(n: usize) -> BoxedStrategy<Vec<usize>> {
    Just((0..n).collect::<Vec<_>>()).prop_shuffle().boxed()
}

/// Generates `[dims]<=[reshape_dims]T(perm)` with up to `max_rank`
/// dims, each in `1..=max_dim`.
///
/// The reshape is built from the prime factors of the element count,
/// shuffled and cut into consecutive groups, so it shares no
/// structure with `dims` beyond the element count. Unit dims are
/// allowed in `dims` and exercise the degenerate-axis paths.
pub fn gen_iota(max_rank: usize, max_dim: usize) -> BoxedStrategy<IotaTileAssignment> {
    prop::collection::vec(1..=max_dim, 0..=max_rank)
        .prop_flat_map(|dims| {
            let factors = prime_factors(dims.iter().product());
            let n = factors.len();
            (
                Just(dims),
                Just(factors).prop_shuffle(),
                prop::collection::vec(any::<bool>(), n),
            )
        })
        .prop_flat_map(|(dims, factors, cuts)| {
            let mut reshape_dims: Vec<usize> = Vec::new();
            for (i, factor) in factors.into_iter().enumerate() {
                match reshape_dims.last_mut() {
                    Some(last) if !cuts[i] => *last *= factor,
                    _ => reshape_dims.push(factor),
                }
            }
            if reshape_dims.is_empty() {
                reshape_dims.push(1);
            }
            let n = reshape_dims.len();
            (Just(dims), Just(reshape_dims), gen_perm(n))
        })
        .prop_map(|(dims, reshape_dims, perm)| {
            IotaTileAssignment::new(&dims, &reshape_dims, &perm)
        })
        .boxed()
}

#[cfg(test)]
mod tests {
    use proptest::strategy::ValueTree;
    use proptest::test_runner::Config;
    use proptest::test_runner::TestRunner;

    use super::*;

    #[test]
    fn sample_many() {
        let mut runner = TestRunner::new(Config::default());

        for _ in 0..256 {
            let strat = gen_iota(4, 6);
            let value = strat.new_tree(&mut runner).unwrap().current();
            assert_eq!(
                value.num_elements(),
                value.dims().iter().product::<usize>()
            );
        }
    }

    proptest! {
        #[test]
        fn perm_is_permutation(perm in (0usize..8).prop_flat_map(gen_perm)) {
            let mut sorted = perm.clone();
            sorted.sort();
            prop_assert_eq!(sorted, (0..perm.len()).collect::<Vec<_>>());
        }
    }
}
