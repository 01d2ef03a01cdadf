//! Node matching between a before-tree and an after-tree.
//!
//! Finding the cheapest alignment of two labeled ordered trees is NP-hard in
//! general, so this is a greedy heuristic. It is deterministic and close to
//! linear on real pages, but it does not promise a globally minimal edit
//! script.
//!
//! Matching runs in three steps:
//!
//! 1. **Identity**: elements that share a unique identity attribute value
//!    (`id`, `data-testid`, ...) or a unique tag + attribute-set signature are
//!    paired with confidence 1.0.
//! 2. **Structural**: the remaining before-nodes are visited one depth level
//!    at a time. A node is first scored against the same-tag children of its
//!    parent's partner, near its own sibling index. Nodes left over are scored
//!    against same-tag nodes below the partner of their nearest paired
//!    ancestor, around the position they would keep there. Both windows hold
//!    at most `max_candidates` nodes, so the phase stays linear in the size of
//!    the trees. Candidates are accepted greedily by descending score (ties in
//!    document order) while they exceed `min_confidence`.
//! 3. **Reorder detection**: children that stay under a paired parent but
//!    whose relative order changed are flagged so a Move is emitted for them.
//!
//! A pair is never accepted if it would invert ancestry with respect to an
//! already accepted pair, so every matching can be replayed as an edit script.

use crate::config::MatchConfig;
use crate::tree::{Attributes, NodeId, NodePath, Tree};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, warn};

const SCORE_EPSILON: f64 = 1e-9;

/// Which phase produced a pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchPhase {
    Root,
    Identity,
    Structural,
}

/// A 1:1 association between a before-node and an after-node.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchPair {
    #[serde(skip)]
    pub before_id: NodeId,
    #[serde(skip)]
    pub after_id: NodeId,
    pub before: NodePath,
    pub after: NodePath,
    pub confidence: f64,
    pub phase: MatchPhase,
}

/// Several after-nodes scored equally well for one before-node. The earliest
/// candidate in document order wins.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchAmbiguity {
    pub before: NodePath,
    pub candidates: Vec<NodePath>,
    pub score: f64,
}

/// The result of matching two trees.
#[derive(Debug, Clone, Default)]
pub struct Matching {
    pairs: Vec<MatchPair>,
    before_to_after: HashMap<NodeId, NodeId>,
    after_to_before: HashMap<NodeId, NodeId>,
    /// Before-nodes without a partner (deletions), in document order.
    pub unmatched_before: Vec<NodeId>,
    /// After-nodes without a partner (insertions), in document order.
    pub unmatched_after: Vec<NodeId>,
    /// Paired before-nodes whose order among their siblings changed.
    pub reordered: BTreeSet<NodeId>,
    pub warnings: Vec<MatchAmbiguity>,
    /// Structural candidate pairs examined.
    pub comparisons: usize,
}

impl Matching {
    /// Pairs ordered by before-tree document order.
    pub fn pairs(&self) -> &[MatchPair] {
        &self.pairs
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn partner_of_before(&self, before: NodeId) -> Option<NodeId> {
        self.before_to_after.get(&before).copied()
    }

    pub fn partner_of_after(&self, after: NodeId) -> Option<NodeId> {
        self.after_to_before.get(&after).copied()
    }

    pub fn contains_before(&self, before: NodeId) -> bool {
        self.before_to_after.contains_key(&before)
    }

    pub fn contains_after(&self, after: NodeId) -> bool {
        self.after_to_before.contains_key(&after)
    }
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    before: NodeId,
    after: NodeId,
    score: f64,
}

/// Scored candidates of one pass, grouped by before-node.
#[derive(Debug, Default)]
struct Candidates {
    found: Vec<(NodeId, Vec<Candidate>)>,
    examined: usize,
}

/// Matches the nodes of two trees.
pub fn compute_matching(before: &Tree, after: &Tree, config: &MatchConfig) -> Matching {
    let mut matcher = Matcher::new(before, after, config);

    if before.get(before.root()).tag == after.get(after.root()).tag {
        matcher.pair(before.root(), after.root(), 1.0, MatchPhase::Root);
    }
    matcher.identity_phase();
    matcher.structural_phase();
    matcher.finish()
}

struct Matcher<'a> {
    before: &'a Tree,
    after: &'a Tree,
    config: &'a MatchConfig,
    before_text: Vec<Vec<char>>,
    after_text: Vec<Vec<char>>,
    /// Last descendant of each after-node in document order.
    after_last: Vec<NodeId>,
    matching: Matching,
    pairs: Vec<MatchPair>,
}

impl<'a> Matcher<'a> {
    fn new(before: &'a Tree, after: &'a Tree, config: &'a MatchConfig) -> Self {
        let limit = config.max_text_compare;
        let texts = |tree: &Tree| -> Vec<Vec<char>> {
            tree.ids()
                .map(|id| tree.direct_text(id).chars().take(limit).collect())
                .collect()
        };
        Self {
            before,
            after,
            config,
            before_text: texts(before),
            after_text: texts(after),
            after_last: last_descendants(after),
            matching: Matching::default(),
            pairs: Vec::new(),
        }
    }

    fn pair(&mut self, before: NodeId, after: NodeId, confidence: f64, phase: MatchPhase) {
        self.matching.before_to_after.insert(before, after);
        self.matching.after_to_before.insert(after, before);
        self.pairs.push(MatchPair {
            before_id: before,
            after_id: after,
            before: self.before.get(before).path.clone(),
            after: self.after.get(after).path.clone(),
            confidence,
            phase,
        });
    }

    fn identity_phase(&mut self) {
        let start = self.pairs.len();
        let config = self.config;

        for attr in &config.identity_attributes {
            let key = |tree: &Tree, id: NodeId| tree.get(id).attr(attr).map(str::to_string);
            self.pair_unique_keys(key);
        }
        self.pair_unique_keys(attribute_signature);

        debug!(pairs = self.pairs.len() - start, "identity phase done");
    }

    /// Pairs element nodes whose key is unique in both trees and whose tags agree.
    fn pair_unique_keys<F>(&mut self, key: F)
    where
        F: Fn(&Tree, NodeId) -> Option<String>,
    {
        let before_keys = unique_keys(self.before, &key);
        let after_keys = unique_keys(self.after, &key);

        for &(ref value, b) in &before_keys.ordered {
            let Some(&a) = after_keys.by_key.get(value) else {
                continue;
            };
            if self.matching.contains_before(b) || self.matching.contains_after(a) {
                continue;
            }
            if self.before.get(b).tag != self.after.get(a).tag {
                debug!(key = %value, "identity key shared by different tags, skipped");
                continue;
            }
            if self.consistent(b, a) {
                self.pair(b, a, 1.0, MatchPhase::Identity);
            }
        }
    }

    fn structural_phase(&mut self) {
        let start = self.pairs.len();

        let mut levels: Vec<Vec<NodeId>> = Vec::new();
        for id in self.before.ids() {
            if self.matching.contains_before(id) {
                continue;
            }
            let depth = self.before.get(id).depth;
            if levels.len() <= depth {
                levels.resize_with(depth + 1, Vec::new);
            }
            levels[depth].push(id);
        }

        let after = self.after;
        let mut pool: HashMap<&str, Vec<NodeId>> = HashMap::new();
        for id in after.ids() {
            if !self.matching.contains_after(id) {
                pool.entry(after.get(id).tag.as_str()).or_default().push(id);
            }
        }

        for level in &levels {
            let candidates = self.sibling_candidates(level);
            self.matching.comparisons += candidates.examined;
            self.accept(candidates.found);

            let leftovers: Vec<NodeId> = level
                .iter()
                .copied()
                .filter(|&b| !self.matching.contains_before(b))
                .collect();
            if leftovers.is_empty() {
                continue;
            }
            for ids in pool.values_mut() {
                ids.retain(|&a| !self.matching.contains_after(a));
            }
            let candidates = self.subtree_candidates(&leftovers, &pool);
            self.matching.comparisons += candidates.examined;
            self.accept(candidates.found);
        }

        debug!(
            pairs = self.pairs.len() - start,
            comparisons = self.matching.comparisons,
            "structural phase done"
        );
    }

    /// Candidates among the children of the parent's partner, within a
    /// window around the node's own sibling index.
    fn sibling_candidates(&self, level: &[NodeId]) -> Candidates {
        let half = self.config.max_candidates / 2;
        let mut candidates = Candidates::default();

        for &b in level {
            let node = self.before.get(b);
            let Some(partner) = node
                .parent
                .and_then(|parent| self.matching.partner_of_before(parent))
            else {
                continue;
            };
            let siblings = self.after.children(partner);
            let lo = node.index.saturating_sub(half).min(siblings.len());
            let hi = (node.index + half + 1).min(siblings.len());

            let mut scored = Vec::new();
            for &a in &siblings[lo..hi] {
                if self.after.get(a).tag == node.tag && !self.matching.contains_after(a) {
                    candidates.examined += 1;
                    self.push_scored(&mut scored, b, a, false);
                }
            }
            if !scored.is_empty() {
                candidates.found.push((b, scored));
            }
        }
        candidates
    }

    /// Candidates anywhere below the partner of the nearest paired ancestor,
    /// limited to `max_candidates` same-tag nodes around the expected spot.
    fn subtree_candidates(
        &self,
        leftovers: &[NodeId],
        pool: &HashMap<&str, Vec<NodeId>>,
    ) -> Candidates {
        let limit = self.config.max_candidates;
        let mut candidates = Candidates::default();

        for &b in leftovers {
            let Some(ids) = pool.get(self.before.get(b).tag.as_str()) else {
                continue;
            };
            let anchor = self
                .before
                .ancestors(b)
                .find_map(|p| self.matching.partner_of_before(p).map(|ap| (p, ap)));
            let (first, last, expected) = match anchor {
                Some((p, ap)) => (ap + 1, self.after_last[ap], ap + (b - p)),
                None => (0, self.after.len().saturating_sub(1), b),
            };

            let lo = ids.partition_point(|&a| a < first);
            let hi = ids.partition_point(|&a| a <= last);
            if lo >= hi {
                continue;
            }
            let pivot = ids[lo..hi].partition_point(|&a| a < expected) + lo;
            let end = (pivot + limit / 2).max(lo + limit).min(hi);
            let start = end.saturating_sub(limit).max(lo);

            let mut scored = Vec::new();
            for &a in &ids[start..end] {
                candidates.examined += 1;
                self.push_scored(&mut scored, b, a, true);
            }
            if !scored.is_empty() {
                candidates.found.push((b, scored));
            }
        }
        candidates
    }

    /// Scores `(b, a)` and keeps it when it clears `min_confidence`. With
    /// `prune`, pairs whose upper bound cannot reach the best score so far are
    /// skipped without running the text comparison.
    fn push_scored(&self, scored: &mut Vec<Candidate>, b: NodeId, a: NodeId, prune: bool) {
        let floor = match scored.iter().map(|c| c.score).reduce(f64::max) {
            Some(best) if prune => best - SCORE_EPSILON,
            _ => f64::NEG_INFINITY,
        };
        if let Some(score) = self.score(b, a, floor) {
            scored.push(Candidate {
                before: b,
                after: a,
                score,
            });
        }
    }

    /// Accepts the candidates of one pass greedily by descending score.
    fn accept(&mut self, found: Vec<(NodeId, Vec<Candidate>)>) {
        let mut ties: HashMap<NodeId, Vec<Candidate>> = HashMap::new();
        let mut candidates = Vec::new();
        for (b, scored) in found {
            let mut best = Vec::new();
            for candidate in &scored {
                track_best(&mut best, *candidate);
            }
            if best.len() > 1 {
                ties.insert(b, best);
            }
            candidates.extend(scored);
        }

        candidates.sort_by(|x, y| {
            y.score
                .total_cmp(&x.score)
                .then(x.before.cmp(&y.before))
                .then(x.after.cmp(&y.after))
        });

        for candidate in candidates {
            if self.matching.contains_before(candidate.before)
                || self.matching.contains_after(candidate.after)
            {
                continue;
            }
            if !self.consistent(candidate.before, candidate.after) {
                continue;
            }
            if let Some(tied) = ties.remove(&candidate.before) {
                if tied.iter().any(|t| t.after == candidate.after) {
                    self.record_ambiguity(candidate.before, &tied);
                }
            }
            self.pair(
                candidate.before,
                candidate.after,
                candidate.score,
                MatchPhase::Structural,
            );
        }
    }

    fn record_ambiguity(&mut self, before: NodeId, tied: &[Candidate]) {
        let ambiguity = MatchAmbiguity {
            before: self.before.get(before).path.clone(),
            candidates: tied
                .iter()
                .map(|c| self.after.get(c.after).path.clone())
                .collect(),
            score: tied[0].score,
        };
        warn!(
            before = %ambiguity.before,
            candidates = ambiguity.candidates.len(),
            score = ambiguity.score,
            "ambiguous match, resolved by document order"
        );
        self.matching.warnings.push(ambiguity);
    }

    /// Weighted similarity in `[0, 1]` of two same-tag nodes, or `None` when
    /// it cannot exceed both `min_confidence` and `floor`.
    fn score(&self, b: NodeId, a: NodeId, floor: f64) -> Option<f64> {
        let weights = &self.config.weights;
        let before_node = self.before.get(b);
        let after_node = self.after.get(a);

        let attributes = jaccard(&before_node.attrs, &after_node.attrs);
        let sibling = 1.0 / (1.0 + before_node.index.abs_diff(after_node.index) as f64);
        let depth = 1.0 / (1.0 + before_node.depth.abs_diff(after_node.depth) as f64);
        let position = (sibling + depth) / 2.0;
        let parent = match (before_node.parent, after_node.parent) {
            (Some(bp), Some(ap)) if self.matching.partner_of_before(bp) == Some(ap) => 1.0,
            (None, None) => 1.0,
            _ => 0.0,
        };
        let total = weights.total();
        let rest = (weights.attributes * attributes
            + weights.position * position
            + weights.parent * parent)
            / total;

        let (before_text, after_text) = (&self.before_text[b], &self.after_text[a]);
        let bound = length_bound(before_text.len(), after_text.len());
        let upper = rest + weights.text * bound / total;
        if upper <= self.config.min_confidence || upper < floor {
            return None;
        }

        let text = char_similarity(before_text, after_text);
        let score = rest + weights.text * text / total;
        (score > self.config.min_confidence).then_some(score)
    }

    /// Rejects pairs that would invert ancestry relative to accepted pairs.
    fn consistent(&self, b: NodeId, a: NodeId) -> bool {
        if (b == self.before.root()) != (a == self.after.root()) {
            return false;
        }
        let before_ok = self.before.ancestors(b).all(|p| {
            self.matching
                .partner_of_before(p)
                .map_or(true, |partner| !self.after.is_ancestor(a, partner))
        });
        let after_ok = self.after.ancestors(a).all(|q| {
            self.matching
                .partner_of_after(q)
                .map_or(true, |partner| !self.before.is_ancestor(b, partner))
        });
        before_ok && after_ok
    }

    fn finish(mut self) -> Matching {
        self.matching.unmatched_before = self
            .before
            .ids()
            .filter(|&id| !self.matching.contains_before(id))
            .collect();
        self.matching.unmatched_after = self
            .after
            .ids()
            .filter(|&id| !self.matching.contains_after(id))
            .collect();

        let mut reordered = BTreeSet::new();
        for pair in &self.pairs {
            let stayed: Vec<(NodeId, usize)> = self
                .before
                .children(pair.before_id)
                .iter()
                .filter_map(|&child| {
                    let partner = self.matching.partner_of_before(child)?;
                    (self.after.parent(partner) == Some(pair.after_id))
                        .then(|| (child, self.after.get(partner).index))
                })
                .collect();
            let positions: Vec<usize> = stayed.iter().map(|&(_, index)| index).collect();
            let keep = longest_increasing_subsequence(&positions);
            for (&(child, _), kept) in stayed.iter().zip(keep) {
                if !kept {
                    reordered.insert(child);
                }
            }
        }
        self.matching.reordered = reordered;

        self.pairs.sort_by_key(|pair| pair.before_id);
        self.matching.pairs = self.pairs;

        debug!(
            pairs = self.matching.pairs.len(),
            deleted = self.matching.unmatched_before.len(),
            inserted = self.matching.unmatched_after.len(),
            reordered = self.matching.reordered.len(),
            "matching done"
        );
        self.matching
    }
}

struct UniqueKeys {
    /// Unique keys in document order.
    ordered: Vec<(String, NodeId)>,
    by_key: HashMap<String, NodeId>,
}

fn unique_keys<F>(tree: &Tree, key: &F) -> UniqueKeys
where
    F: Fn(&Tree, NodeId) -> Option<String>,
{
    let mut seen: HashMap<String, Vec<NodeId>> = HashMap::new();
    let mut order = Vec::new();
    for id in tree.ids() {
        if tree.get(id).is_text() {
            continue;
        }
        if let Some(value) = key(tree, id) {
            let ids = seen.entry(value.clone()).or_default();
            if ids.is_empty() {
                order.push(value);
            }
            ids.push(id);
        }
    }

    let mut unique = UniqueKeys {
        ordered: Vec::new(),
        by_key: HashMap::new(),
    };
    for value in order {
        if let [id] = seen[&value].as_slice() {
            unique.by_key.insert(value.clone(), *id);
            unique.ordered.push((value, *id));
        } else {
            debug!(key = %value, "identity key is not unique, skipped");
        }
    }
    unique
}

/// Tag plus sorted attribute pairs, for elements that have attributes.
fn attribute_signature(tree: &Tree, id: NodeId) -> Option<String> {
    let node = tree.get(id);
    if node.attrs.is_empty() {
        return None;
    }
    let mut attrs: Vec<String> = node
        .attrs
        .iter()
        .map(|(name, value)| format!("{}={:?}", name, value))
        .collect();
    attrs.sort();
    Some(format!("{}[{}]", node.tag, attrs.join(",")))
}

fn track_best(best: &mut Vec<Candidate>, candidate: Candidate) {
    match best.first() {
        Some(top) if candidate.score > top.score + SCORE_EPSILON => {
            best.clear();
            best.push(candidate);
        }
        Some(top) if (candidate.score - top.score).abs() <= SCORE_EPSILON => best.push(candidate),
        Some(_) => {}
        None => best.push(candidate),
    }
}

/// Jaccard index over attribute name/value pairs; two empty sets are equal.
fn jaccard(a: &Attributes, b: &Attributes) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let shared = a.iter().filter(|(k, v)| b.get(*k) == Some(*v)).count();
    let union = a.len() + b.len() - shared;
    shared as f64 / union as f64
}

/// One minus the normalized Levenshtein distance.
fn char_similarity(a: &[char], b: &[char]) -> f64 {
    if a == b {
        return 1.0;
    }
    let longest = a.len().max(b.len());
    1.0 - levenshtein(a, b) as f64 / longest as f64
}

/// Upper bound of [`char_similarity`] from the two lengths alone.
fn length_bound(a: usize, b: usize) -> f64 {
    let longest = a.max(b);
    if longest == 0 {
        return 1.0;
    }
    1.0 - a.abs_diff(b) as f64 / longest as f64
}

fn last_descendants(tree: &Tree) -> Vec<NodeId> {
    let mut last: Vec<NodeId> = tree.ids().collect();
    for id in tree.ids().rev() {
        if let Some(&child) = tree.children(id).last() {
            last[id] = last[child];
        }
    }
    last
}

fn levenshtein(a: &[char], b: &[char]) -> usize {
    let mut previous: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        current[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = previous[j] + usize::from(ca != cb);
            current[j + 1] = substitution.min(previous[j + 1] + 1).min(current[j] + 1);
        }
        std::mem::swap(&mut previous, &mut current);
    }
    previous[b.len()]
}

/// Marks the members of one longest strictly increasing subsequence.
fn longest_increasing_subsequence(values: &[usize]) -> Vec<bool> {
    let mut tails: Vec<usize> = Vec::new();
    let mut previous: Vec<Option<usize>> = vec![None; values.len()];

    for (i, &value) in values.iter().enumerate() {
        let slot = tails.partition_point(|&t| values[t] < value);
        if slot > 0 {
            previous[i] = Some(tails[slot - 1]);
        }
        if slot == tails.len() {
            tails.push(i);
        } else {
            tails[slot] = i;
        }
    }

    let mut keep = vec![false; values.len()];
    let mut cursor = tails.last().copied();
    while let Some(i) = cursor {
        keep[i] = true;
        cursor = previous[i];
    }
    keep
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::build;
    use crate::tree::DomNode;

    fn matching_for(before: &str, after: &str) -> (Tree, Tree, Matching) {
        let before = build(before).unwrap();
        let after = build(after).unwrap();
        let matching = compute_matching(&before, &after, &MatchConfig::default());
        (before, after, matching)
    }

    fn id_of(tree: &Tree, path: &[usize]) -> NodeId {
        tree.lookup(&NodePath::from_indices(path.to_vec())).unwrap()
    }

    #[test]
    fn test_identical_trees_match_completely() {
        let html = "<ul><li>a</li><li>a</li><li>b</li></ul>";
        let (before, after, matching) = matching_for(html, html);
        assert!(matching.unmatched_before.is_empty());
        assert!(matching.unmatched_after.is_empty());
        assert!(matching.reordered.is_empty());
        for pair in matching.pairs() {
            assert_eq!(pair.before, pair.after);
        }
        assert_eq!(matching.len(), before.len());
        assert_eq!(matching.len(), after.len());
    }

    #[test]
    fn test_identity_by_id_survives_relocation() {
        let (before, after, matching) = matching_for(
            r#"<div><button id="go">Go</button></div><p></p>"#,
            r#"<div></div><p><button id="go">Go</button></p>"#,
        );
        let b = id_of(&before, &[1, 0, 0]);
        let a = id_of(&after, &[1, 1, 0]);
        assert_eq!(matching.partner_of_before(b), Some(a));
        let pair = matching.pairs().iter().find(|p| p.before_id == b).unwrap();
        assert_eq!(pair.phase, MatchPhase::Identity);
        assert_eq!(pair.confidence, 1.0);
    }

    #[test]
    fn test_identity_requires_same_tag() {
        let (before, after, matching) = matching_for(
            r#"<div id="x">a</div>"#,
            r#"<section id="x">a</section>"#,
        );
        let b = id_of(&before, &[1, 0]);
        let a = id_of(&after, &[1, 0]);
        assert!(!matching.contains_before(b));
        assert!(!matching.contains_after(a));
    }

    #[test]
    fn test_text_change_keeps_pair() {
        let (before, after, matching) = matching_for(
            r#"<button id="submit">Save</button>"#,
            r#"<button id="submit" class="primary">Save Now</button>"#,
        );
        let b = id_of(&before, &[1, 0, 0]);
        let a = id_of(&after, &[1, 0, 0]);
        assert_eq!(matching.partner_of_before(b), Some(a));
        assert!(matching.unmatched_before.is_empty());
        assert!(matching.unmatched_after.is_empty());
    }

    #[test]
    fn test_unmatched_nodes_are_inserts_and_deletes() {
        let (before, after, matching) = matching_for(
            r#"<form><input id="user"></form>"#,
            r#"<form><a href="/reset">Forgot password?</a></form>"#,
        );
        let input = id_of(&before, &[1, 0, 0]);
        assert_eq!(matching.unmatched_before, vec![input]);
        let link = id_of(&after, &[1, 0, 0]);
        let link_text = id_of(&after, &[1, 0, 0, 0]);
        assert_eq!(matching.unmatched_after, vec![link, link_text]);
    }

    #[test]
    fn test_reorder_detection() {
        let (before, _after, matching) = matching_for(
            r#"<ul><li id="a">A</li><li id="b">B</li><li id="c">C</li></ul>"#,
            r#"<ul><li id="c">C</li><li id="a">A</li><li id="b">B</li></ul>"#,
        );
        let c = id_of(&before, &[1, 0, 2]);
        assert_eq!(matching.reordered.iter().copied().collect::<Vec<_>>(), vec![c]);
    }

    #[test]
    fn test_ancestry_inversion_is_rejected() {
        let (before, after, matching) = matching_for(
            r#"<div id="outer"><div id="inner">x</div></div>"#,
            r#"<div id="inner"><div id="outer">x</div></div>"#,
        );
        let outer = id_of(&before, &[1, 0]);
        let inner = id_of(&before, &[1, 0, 0]);
        let both = matching.contains_before(outer) && matching.contains_before(inner);
        assert!(!both);
        let _ = after;
    }

    #[test]
    fn test_ambiguity_is_reported() {
        let before = Tree::from_dom(
            DomNode::element("html")
                .with_child(DomNode::element("section").with_child(DomNode::element("span"))),
        );
        let after = Tree::from_dom(
            DomNode::element("html")
                .with_child(DomNode::element("article").with_child(DomNode::element("span")))
                .with_child(DomNode::element("aside").with_child(DomNode::element("span"))),
        );
        let matching = compute_matching(&before, &after, &MatchConfig::default());
        assert_eq!(matching.warnings.len(), 1);
        let warning = &matching.warnings[0];
        assert_eq!(warning.before.to_string(), "/0/0");
        assert_eq!(warning.candidates.len(), 2);

        let span = before.lookup(&NodePath::from_indices(vec![0, 0])).unwrap();
        let first = after.lookup(&NodePath::from_indices(vec![0, 0])).unwrap();
        assert_eq!(matching.partner_of_before(span), Some(first));
    }

    fn long_page(blocks: usize, edit_every: usize) -> String {
        (0..blocks)
            .map(|i| {
                if edit_every > 0 && i % edit_every == 0 {
                    format!("<div><p>paragraph {} revised</p></div>", i)
                } else {
                    format!("<div><p>paragraph {}</p></div>", i)
                }
            })
            .collect()
    }

    #[test]
    fn test_long_sibling_lists_pair_in_place() {
        let (before, after, matching) = matching_for(&long_page(400, 0), &long_page(400, 10));
        assert!(matching.unmatched_before.is_empty());
        assert!(matching.unmatched_after.is_empty());
        assert!(matching.reordered.is_empty());
        for pair in matching.pairs() {
            assert_eq!(pair.before, pair.after);
        }
        assert_eq!(matching.len(), before.len());
        assert_eq!(matching.len(), after.len());
    }

    #[test]
    fn test_comparisons_grow_linearly() {
        let config = MatchConfig::default();
        let examined = |blocks: usize| {
            let before = build(&long_page(blocks, 0)).unwrap();
            let after = build(&long_page(blocks, 10)).unwrap();
            let matching = compute_matching(&before, &after, &config);
            assert!(matching.comparisons <= before.len() * config.max_candidates);
            matching.comparisons
        };
        let small = examined(200);
        let large = examined(800);
        assert!(large <= small * 5, "{} vs {}", small, large);
    }

    #[test]
    fn test_insert_before_long_list_still_pairs() {
        let blocks: String = (0..100).map(|i| format!("<div>block {}</div>", i)).collect();
        let (before, after, matching) =
            matching_for(&blocks, &format!("<div>banner</div>{}", blocks));
        for i in 0..100 {
            let b = id_of(&before, &[1, i]);
            let a = id_of(&after, &[1, i + 1]);
            assert_eq!(matching.partner_of_before(b), Some(a));
        }
        assert_eq!(matching.unmatched_after.len(), 2);
    }

    #[test]
    fn test_levenshtein() {
        let chars = |s: &str| s.chars().collect::<Vec<_>>();
        assert_eq!(levenshtein(&chars("kitten"), &chars("sitting")), 3);
        assert_eq!(levenshtein(&chars(""), &chars("abc")), 3);
        assert_eq!(levenshtein(&chars("same"), &chars("same")), 0);
    }

    #[test]
    fn test_text_similarity() {
        let similarity = |a: &str, b: &str| {
            char_similarity(
                &a.chars().collect::<Vec<_>>(),
                &b.chars().collect::<Vec<_>>(),
            )
        };
        assert_eq!(similarity("", ""), 1.0);
        assert_eq!(similarity("Save", "Save Now"), 0.5);
        assert_eq!(similarity("abc", "xyz"), 0.0);
        assert_eq!(length_bound(4, 8), 0.5);
        assert_eq!(length_bound(0, 0), 1.0);
    }

    #[test]
    fn test_jaccard() {
        let mut a = Attributes::new();
        a.insert("id".into(), "x".into());
        a.insert("class".into(), "btn".into());
        let mut b = Attributes::new();
        b.insert("id".into(), "x".into());
        assert_eq!(jaccard(&a, &b), 0.5);
        assert_eq!(jaccard(&Attributes::new(), &Attributes::new()), 1.0);
    }

    #[test]
    fn test_lis_marks_kept_positions() {
        assert_eq!(
            longest_increasing_subsequence(&[2, 0, 1]),
            vec![false, true, true]
        );
        assert_eq!(longest_increasing_subsequence(&[0, 1, 2]), vec![true; 3]);
        assert!(longest_increasing_subsequence(&[]).is_empty());
    }
}
