//! Uniform shuffling for option and card display order.
//!
//! Options are shown in a random order but selections always refer to the
//! original index, so scoring never depends on the shuffle.

use rand::seq::SliceRandom;
use rand::Rng;

/// Shuffle a slice in place with Fisher-Yates.
pub fn shuffle_in_place<T, R: Rng + ?Sized>(items: &mut [T], rng: &mut R) {
    items.shuffle(rng);
}

/// A random permutation of `0..len`.
///
/// `order[shown]` is the original index of the item displayed at position
/// `shown`.
pub fn display_order<R: Rng + ?Sized>(len: usize, rng: &mut R) -> Vec<usize> {
    let mut order: Vec<usize> = (0..len).collect();
    shuffle_in_place(&mut order, rng);
    order
}

/// Map a displayed position back to the original index.
pub fn original_index(order: &[usize], shown: usize) -> Option<usize> {
    order.get(shown).copied()
}
