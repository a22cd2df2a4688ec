use std::collections::HashMap;

/// Last-value cache: последний payload на каждый topic.
///
/// Одна запись на topic, каждый publish перезаписывает её. Без expiry,
/// живёт столько же, сколько broker.
#[derive(Debug, Default)]
pub struct LastValueCache {
    entries: HashMap<Vec<u8>, Vec<u8>>,
}

impl LastValueCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Сохранить payload для topic'а (overwrite). Возвращает сохранённое значение.
    pub fn store(&mut self, topic: Vec<u8>, payload: Vec<u8>) -> &[u8] {
        let slot = self.entries.entry(topic).or_default();
        *slot = payload;
        slot
    }

    pub fn get(&self, topic: &[u8]) -> Option<&[u8]> {
        self.entries.get(topic).map(Vec::as_slice)
    }

    /// Все записи, чей topic начинается с `prefix`. Пустой prefix: весь cache.
    /// Порядок не определён.
    pub fn matching<'a>(&'a self, prefix: &'a [u8]) -> impl Iterator<Item = (&'a [u8], &'a [u8])> + 'a {
        self.entries
            .iter()
            .filter(move |(topic, _)| topic.starts_with(prefix))
            .map(|(topic, payload)| (topic.as_slice(), payload.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;

    fn replay(cache: &LastValueCache, prefix: &[u8]) -> BTreeSet<(Vec<u8>, Vec<u8>)> {
        cache
            .matching(prefix)
            .map(|(k, v)| (k.to_vec(), v.to_vec()))
            .collect()
    }

    #[test]
    fn publish_overwrites_previous_value() {
        let mut cache = LastValueCache::new();
        cache.store(b"ent.1".to_vec(), b"old".to_vec());
        cache.store(b"ent.1".to_vec(), b"older?".to_vec());
        assert_eq!(cache.store(b"ent.1".to_vec(), b"new".to_vec()), b"new");
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(b"ent.1"), Some(&b"new"[..]));
        assert_eq!(replay(&cache, b"ent."), BTreeSet::from([(b"ent.1".to_vec(), b"new".to_vec())]));
    }

    #[test]
    fn prefix_selects_exactly_matching_keys() {
        let mut cache = LastValueCache::new();
        cache.store(b"ent.0001".to_vec(), b"A".to_vec());
        cache.store(b"ent.0002".to_vec(), b"B".to_vec());
        cache.store(b"other".to_vec(), b"C".to_vec());

        assert_eq!(
            replay(&cache, b"ent."),
            BTreeSet::from([
                (b"ent.0001".to_vec(), b"A".to_vec()),
                (b"ent.0002".to_vec(), b"B".to_vec()),
            ])
        );
        assert_eq!(replay(&cache, b"ent.0002"), BTreeSet::from([(b"ent.0002".to_vec(), b"B".to_vec())]));
        assert!(replay(&cache, b"nothing").is_empty());
        // a prefix longer than the key never matches
        assert!(replay(&cache, b"other-and-more").is_empty());
    }

    #[test]
    fn empty_prefix_replays_everything() {
        let mut cache = LastValueCache::new();
        for i in 0..10u8 {
            cache.store(vec![i], vec![i, i]);
        }
        assert_eq!(replay(&cache, b"").len(), 10);
    }
}
