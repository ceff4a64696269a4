//! Greedy grouping of staff name keys that denote the same person.
//!
//! Each key is compared against the representatives created so far, in
//! creation order, and joins the first one scoring at least the threshold;
//! otherwise it becomes a new representative. Membership is never revisited,
//! so the grouping is not transitive and depends on input order. `build`
//! always clusters in sorted key order so runs are reproducible.

use std::collections::{BTreeSet, HashMap};

use crate::fuzzy;

#[derive(Debug, Clone, Default)]
pub struct KeyClusters {
    representatives: Vec<String>,
    mapping: HashMap<String, String>,
}

impl KeyClusters {
    /// Clusters the distinct keys in lexicographic order.
    pub fn build<'a, I>(keys: I, threshold: u8) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let ordered: BTreeSet<&str> = keys.into_iter().collect();
        Self::build_in_order(ordered, threshold)
    }

    /// Clusters keys in exactly the order given. Repeated keys keep their
    /// first assignment.
    pub fn build_in_order<'a, I>(keys: I, threshold: u8) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut clusters = KeyClusters::default();

        for key in keys {
            if clusters.mapping.contains_key(key) {
                continue;
            }

            let joined = clusters
                .representatives
                .iter()
                .find(|rep| fuzzy::score(key, rep) >= threshold)
                .cloned();

            let rep = match joined {
                Some(rep) => rep,
                None => {
                    clusters.representatives.push(key.to_string());
                    key.to_string()
                }
            };
            clusters.mapping.insert(key.to_string(), rep);
        }

        clusters
    }

    /// Representative for `key`; keys never seen map to themselves.
    pub fn representative<'a>(&'a self, key: &'a str) -> &'a str {
        self.mapping.get(key).map(String::as_str).unwrap_or(key)
    }

    /// Representatives in creation order.
    pub fn representatives(&self) -> &[String] {
        &self.representatives
    }

    /// Member keys of the cluster led by `rep`, sorted.
    pub fn members(&self, rep: &str) -> Vec<&str> {
        let mut members: Vec<&str> = self
            .mapping
            .iter()
            .filter(|(_, r)| r.as_str() == rep)
            .map(|(k, _)| k.as_str())
            .collect();
        members.sort_unstable();
        members
    }

    pub fn len(&self) -> usize {
        self.representatives().len()
    }

    pub fn merged_count(&self) -> usize {
        self.mapping.len() - self.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::name_key;

    #[test]
    fn spelling_variants_with_same_key_share_one_cluster() {
        let a = name_key("Nilsson, Per");
        let b = name_key("Per Nilsson");
        let clusters = KeyClusters::build([a.as_str(), b.as_str()], 95);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters.representative(&a), clusters.representative(&b));
    }

    #[test]
    fn every_key_maps_to_a_representative() {
        let keys = ["andersson eva", "karlsson ulla", "nilsson per"];
        let clusters = KeyClusters::build(keys, 95);
        for key in keys {
            let rep = clusters.representative(key);
            assert!(clusters.representatives().iter().any(|r| r == rep));
        }
        assert_eq!(clusters.len(), 3);
        assert_eq!(clusters.merged_count(), 0);
    }

    #[test]
    fn contained_key_joins_existing_cluster() {
        let clusters = KeyClusters::build(["andersson eva", "andersson eva maria"], 95);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters.representative("andersson eva maria"), "andersson eva");
        assert_eq!(
            clusters.members("andersson eva"),
            vec!["andersson eva", "andersson eva maria"]
        );
    }

    #[test]
    fn grouping_depends_on_input_order() {
        let hub_first = KeyClusters::build_in_order(["eva", "andersson eva", "eva karlsson"], 95);
        assert_eq!(hub_first.len(), 1);

        let hub_last = KeyClusters::build_in_order(["andersson eva", "eva karlsson", "eva"], 95);
        assert_eq!(hub_last.len(), 2);
        assert_eq!(hub_last.representative("eva"), "andersson eva");
    }

    #[test]
    fn build_is_reproducible_regardless_of_caller_order() {
        let forward = KeyClusters::build(["eva", "andersson eva", "eva karlsson"], 95);
        let backward = KeyClusters::build(["eva karlsson", "andersson eva", "eva"], 95);
        assert_eq!(forward.representatives(), backward.representatives());
    }

    #[test]
    fn raising_threshold_never_adds_merges() {
        let keys = [
            "andersson eva",
            "anderson eva",
            "andersson eva maria",
            "nilsson per",
            "nilson per",
            "karlsson ulla",
        ];
        let mut previous = usize::MAX;
        for threshold in [50, 70, 85, 95, 100] {
            let merged = KeyClusters::build(keys, threshold).merged_count();
            assert!(merged <= previous, "threshold {threshold} merged {merged}");
            previous = merged;
        }
    }

    #[test]
    fn full_threshold_keeps_imperfect_matches_apart() {
        let clusters = KeyClusters::build(["nilsson per", "nilson per"], 100);
        assert_eq!(clusters.len(), 2);
    }

    #[test]
    fn unknown_key_maps_to_itself() {
        let clusters = KeyClusters::build(["nilsson per"], 95);
        assert_eq!(clusters.representative("svensson lars"), "svensson lars");
    }
}
