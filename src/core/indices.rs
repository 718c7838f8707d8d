use hashbrown::HashMap;

use crate::types::EntryId;

/// Secondary index from a key to the entry ids carrying it, in insert order.
pub type VecIndex<K> = HashMap<K, Vec<EntryId>>;
