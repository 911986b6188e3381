use crate::key::KeyId;
use smallvec::SmallVec;

/// Sorted set of `(key, value)` pairs identifying one series of a metric.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct TagSet {
    // Series rarely carry more than four tags.
    pub(crate) tags: SmallVec<[(KeyId, KeyId); 4]>,
}

impl TagSet {
    /// Builds a set from pairs already sorted by key with no duplicate keys.
    pub fn from_sorted_iter(iter: impl IntoIterator<Item = (KeyId, KeyId)>) -> Self {
        Self {
            tags: iter.into_iter().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (KeyId, KeyId)> + '_ {
        self.tags.iter().copied()
    }

    pub fn contains(&self, key: KeyId, value: KeyId) -> bool {
        self.get(key) == Some(value)
    }

    pub fn get(&self, key: KeyId) -> Option<KeyId> {
        let slice: &[(KeyId, KeyId)] = &self.tags;
        let idx = slice.partition_point(|(k, _)| *k < key);
        slice.get(idx).and_then(|(k, v)| (*k == key).then_some(*v))
    }

    /// Keeps only the given keys (those present in this set).
    pub fn project(&self, keys: &[KeyId]) -> TagSet {
        if keys.is_empty() {
            return TagSet::default();
        }

        let mut out = SmallVec::<[(KeyId, KeyId); 4]>::new();
        for key in keys {
            if let Some(value) = self.get(*key) {
                out.push((*key, value));
            }
        }
        out.sort_unstable();

        TagSet { tags: out }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tagset_contains_and_get() {
        let a = KeyId::from(1);
        let b = KeyId::from(2);
        let c = KeyId::from(3);

        let set = TagSet::from_sorted_iter([(a, b), (c, a)]);
        assert!(set.contains(a, b));
        assert!(!set.contains(a, a));
        assert_eq!(set.get(a), Some(b));
        assert_eq!(set.get(c), Some(a));
        assert_eq!(set.get(b), None);
    }

    #[test]
    fn project_keeps_requested_keys_in_order() {
        let k1 = KeyId::from(1);
        let k2 = KeyId::from(2);
        let k3 = KeyId::from(3);
        let v = KeyId::from(9);

        let set = TagSet::from_sorted_iter([(k1, v), (k2, v), (k3, v)]);
        let projected = set.project(&[k3, k1]);
        assert_eq!(projected, TagSet::from_sorted_iter([(k1, v), (k3, v)]));
        assert!(set.project(&[]).is_empty());
    }
}
