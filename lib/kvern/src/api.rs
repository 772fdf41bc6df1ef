use std::cmp::Ordering;

/// Map side of a client. The engine calls `map` concurrently from its
/// worker threads, once per input pair; each call may emit any number of
/// intermediate pairs through `emit`.
///
/// Input keys and values are opaque to the engine. Intermediate keys carry
/// the ordering the shuffle groups by; two keys belong to the same group
/// when they compare `Ordering::Equal`.
pub trait Mapper {
    type Key: Send + Sync + 'static;
    type Value: Send + Sync + 'static;
    type OutKey: Ord + Send + Sync + 'static;
    type OutValue: Send + Sync + 'static;

    fn map<F>(&self, key: &Self::Key, value: &Self::Value, emit: &mut F)
    where
        F: FnMut(Self::OutKey, Self::OutValue);
}

/// Reduce side of a client. Called concurrently, once per key group; the
/// group is non-empty and all its keys are mutually equal under `Ord`.
pub trait Reducer {
    type Key: Ord + Send + Sync + 'static;
    type Value: Send + Sync + 'static;
    type OutKey: Ord + Send + 'static;
    type OutValue: Send + 'static;

    fn reduce<F>(&self, group: &[(Self::Key, Self::Value)], emit: &mut F)
    where
        F: FnMut(Self::OutKey, Self::OutValue);
}

pub type InputPair<M> = (<M as Mapper>::Key, <M as Mapper>::Value);
pub type MidPair<M> = (<M as Mapper>::OutKey, <M as Mapper>::OutValue);
pub type OutputPair<R> = (<R as Reducer>::OutKey, <R as Reducer>::OutValue);

/// Key equivalence as the shuffle sees it.
pub fn keys_equal<K: Ord>(a: &K, b: &K) -> bool {
    a.cmp(b) == Ordering::Equal
}
