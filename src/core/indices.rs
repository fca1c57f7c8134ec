use hashbrown::HashMap;

use crate::types::OwnershipId;

/// Secondary index from a key to ownership ids in insertion order.
pub type VecIndex<K> = HashMap<K, Vec<OwnershipId>>;
