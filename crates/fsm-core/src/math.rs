//! Shared set/map aliases, backed by the same `indexmap`/`bit-set` crates
//! the teacher's workspace `Cargo.toml` already depends on.

use bit_set::BitSet;

/// Insertion-ordered set, used wherever iteration order should be stable
/// (e.g. reporting unconfirmed transitions in the order they were found).
pub type Set<T> = indexmap::IndexSet<T>;

/// Insertion-ordered map.
pub type OrderedMap<K, V> = indexmap::IndexMap<K, V>;

/// A dense candidate set over small integer ids (conjecture states or CN
/// ids). Domains are intersected and checked for emptiness constantly
/// during domain reduction, so a bitset is the natural representation —
/// this is the "domain becomes a bitset over state ids" re-architecture the
/// Design Notes recommend.
pub type Domain = BitSet;

/// Builds a [`Domain`] containing exactly `0..n`.
pub fn full_domain(n: usize) -> Domain {
    let mut d = BitSet::with_capacity(n);
    for i in 0..n {
        d.insert(i);
    }
    d
}

/// `true` iff `a` and `b` share no member.
pub fn disjoint(a: &Domain, b: &Domain) -> bool {
    a.is_disjoint(b)
}
