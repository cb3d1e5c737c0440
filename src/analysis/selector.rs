//! Best-K pair search

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use super::error::DesignError;
use super::generator::{CandidateList, Candidates};
use super::pair::{run_lazy_check, LazyCheck, PairScorer};
use super::scorer::OligoScorer;
use super::types::{PairStats, PrimerPair, SizeRange};

/// Ranking of two pairs: quality, complementarity, then left start
/// descending, right start ascending and the shorter primers.
pub fn compare_pairs(a: &PrimerPair, b: &PrimerPair, candidates: &Candidates) -> Ordering {
    let (al, ar) = (&candidates.left.oligos[a.left], &candidates.right.oligos[a.right]);
    let (bl, br) = (&candidates.left.oligos[b.left], &candidates.right.oligos[b.right]);
    a.quality
        .total_cmp(&b.quality)
        .then_with(|| a.compl_measure.total_cmp(&b.compl_measure))
        .then_with(|| bl.start.cmp(&al.start))
        .then_with(|| ar.start.cmp(&br.start))
        .then_with(|| al.length.cmp(&bl.length))
        .then_with(|| ar.length.cmp(&br.length))
}

/// At most `capacity` pairs, with the worst one tracked.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RankedResultSet {
    capacity: usize,
    pairs: Vec<PrimerPair>,
    worst: usize,
}

impl RankedResultSet {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            pairs: Vec::with_capacity(capacity),
            worst: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.pairs.len() >= self.capacity
    }

    pub fn worst(&self) -> Option<&PrimerPair> {
        self.pairs.get(self.worst)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PrimerPair> {
        self.pairs.iter()
    }

    pub fn as_slice(&self) -> &[PrimerPair] {
        &self.pairs
    }

    pub fn into_vec(self) -> Vec<PrimerPair> {
        self.pairs
    }

    /// True when the same left and right oligos are already held.
    pub fn contains(&self, pair: &PrimerPair) -> bool {
        self.pairs
            .iter()
            .any(|p| p.left == pair.left && p.right == pair.right)
    }

    /// Add a pair. Once full, the worst pair is evicted if the newcomer
    /// ranks strictly better; otherwise the newcomer is dropped.
    pub fn insert(&mut self, pair: PrimerPair, candidates: &Candidates) -> bool {
        if !self.is_full() {
            let replaces_worst = match self.worst() {
                None => true,
                Some(w) => compare_pairs(&pair, w, candidates) == Ordering::Greater,
            };
            if replaces_worst {
                self.worst = self.pairs.len();
            }
            self.pairs.push(pair);
            return true;
        }

        let better = match self.worst() {
            Some(w) => compare_pairs(&pair, w, candidates) == Ordering::Less,
            None => false,
        };
        if !better {
            return false;
        }
        self.pairs[self.worst] = pair;
        self.worst = self
            .pairs
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| compare_pairs(a, b, candidates))
            .map_or(0, |(i, _)| i);
        true
    }

    pub fn sort(&mut self, candidates: &Candidates) {
        self.pairs.sort_by(|a, b| compare_pairs(a, b, candidates));
        self.worst = self.pairs.len().saturating_sub(1);
    }
}

/// Ranked pairs with the pair rejection counters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Selection {
    pub pairs: RankedResultSet,
    pub stats: PairStats,
}

/// Searches left/right combinations for the best pairs
pub struct PairSelector<'s, 'a> {
    scorer: &'s OligoScorer<'a>,
}

impl<'s, 'a> PairSelector<'s, 'a> {
    pub fn new(scorer: &'s OligoScorer<'a>) -> Self {
        Self { scorer }
    }

    /// Try each product-size interval in turn until `num_return` pairs
    /// are held. Candidate lists must be sorted; deferred oligo checks
    /// run on them as pairs are examined.
    pub fn select(&self, candidates: &mut Candidates) -> Result<Selection, DesignError> {
        let config = self.scorer.config();
        let mut best = RankedResultSet::new(config.num_return);
        let mut stats = PairStats::default();

        for range in &config.product_size_ranges {
            let found = self.select_in_range(candidates, *range, &mut stats)?;
            log::debug!(
                "Product size {}-{}: {} pairs",
                range.min,
                range.max,
                found.len()
            );
            for pair in found.into_vec() {
                if best.is_full() {
                    break;
                }
                if !best.contains(&pair) {
                    best.insert(pair, candidates);
                }
            }
            if best.is_full() {
                break;
            }
        }
        best.sort(candidates);
        Ok(Selection { pairs: best, stats })
    }

    fn select_in_range(
        &self,
        candidates: &mut Candidates,
        range: SizeRange,
        stats: &mut PairStats,
    ) -> Result<RankedResultSet, DesignError> {
        let config = self.scorer.config();
        let pair_scorer = PairScorer::new(self.scorer);
        let weigh_internal = config.pair_weights.io_quality != 0.0;
        let internal_order = scan_order(&candidates.internal);
        let mut found = RankedResultSet::new(config.num_return);

        let Some(best_left) = candidates.left.oligos.first().map(|c| c.quality) else {
            return Ok(found);
        };
        let mut n_last = candidates.left.len();

        for i in 0..candidates.right.len() {
            if !candidates.right.oligos[i].is_ok_or_must_use() {
                continue;
            }
            if found.is_full() && exceeds_worst(&found, candidates.right.oligos[i].quality + best_left) {
                break;
            }

            for j in 0..n_last {
                if !candidates.right.oligos[i].is_ok_or_must_use() {
                    break;
                }
                if !candidates.left.oligos[j].is_ok_or_must_use() {
                    continue;
                }
                let bound = candidates.left.oligos[j].quality + candidates.right.oligos[i].quality;
                if found.is_full() && exceeds_worst(&found, bound) {
                    n_last = j;
                    break;
                }

                let Some(mut pair) = pair_scorer.score(candidates, j, i, range, stats)? else {
                    continue;
                };
                if !weigh_internal {
                    pair.quality = pair_scorer.quality(&pair, candidates);
                }
                if config.pick_internal {
                    match self.choose_internal(candidates, &internal_order, j, i)? {
                        Some(m) => pair.internal = Some(m),
                        None => {
                            stats.internal += 1;
                            continue;
                        }
                    }
                }
                stats.ok += 1;
                if weigh_internal {
                    pair.quality = pair_scorer.quality(&pair, candidates);
                }
                found.insert(pair, candidates);
            }
        }
        found.sort(candidates);
        Ok(found)
    }

    /// Lowest-quality internal oligo lying strictly between the two
    /// primers. `order` lists the internal oligos in scan order, which
    /// settles ties in quality.
    fn choose_internal(
        &self,
        candidates: &mut Candidates,
        order: &[usize],
        left: usize,
        right: usize,
    ) -> Result<Option<usize>, DesignError> {
        let after = candidates.left.oligos[left].last();
        let before = candidates.right.oligos[right].first();
        let mut chosen: Option<(usize, f64)> = None;

        for &k in order {
            let m = &candidates.internal.oligos[k];
            let improves = chosen.map_or(true, |(_, min)| m.quality < min);
            if m.first() <= after || m.last() >= before || !improves || !m.is_ok_or_must_use() {
                continue;
            }
            if !run_lazy_check(self.scorer, &mut candidates.internal, k, LazyCheck::SelfComplementarity)?
                || !run_lazy_check(self.scorer, &mut candidates.internal, k, LazyCheck::RepeatSimilarity)?
            {
                continue;
            }
            chosen = Some((k, candidates.internal.oligos[k].quality));
        }
        Ok(chosen.map(|(k, _)| k))
    }
}

/// Indices of a sorted list in the order the scan produced them: 3' end
/// from right to left, shorter windows first.
fn scan_order(list: &CandidateList) -> Vec<usize> {
    let mut order: Vec<usize> = (0..list.len()).collect();
    order.sort_by(|&a, &b| {
        let (x, y) = (&list.oligos[a], &list.oligos[b]);
        y.last().cmp(&x.last()).then_with(|| x.length.cmp(&y.length))
    });
    order
}

fn exceeds_worst(found: &RankedResultSet, bound: f64) -> bool {
    match found.worst() {
        Some(w) => bound > w.quality || w.quality == 0.0,
        None => false,
    }
}

/// Run the pair search over already generated candidate lists.
pub fn select_pairs(scorer: &OligoScorer<'_>, candidates: &mut Candidates) -> Result<Selection, DesignError> {
    PairSelector::new(scorer).select(candidates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::dpal::AlignerSet;
    use crate::analysis::generator::CandidateGenerator;
    use crate::analysis::library::RepeatLibraries;
    use crate::analysis::tm::NearestNeighborTm;
    use crate::analysis::types::{
        DesignInput, OligoCandidate, OligoKind, PrimerConfig, RepeatSimilarity, Violation,
    };

    const TEMPLATE: &[u8] = b"TCAGGATCCATGCTAGCTAGGCTAAGCTAGTCGATCGGATCCGATGCATGCTAGCTAGTCGATCAGTAGCATTGACCTGAGGTACCAGTTGACAGCATCGGATCAGCTTGCATGCAAGTCC";

    fn acgt_config(num_return: usize) -> PrimerConfig {
        let mut config = PrimerConfig::default();
        config.primer.min_size = 18;
        config.primer.opt_size = 20;
        config.primer.max_size = 22;
        config.primer.max_self_any = 100.0;
        config.primer.max_self_end = 100.0;
        config.pair_compl_any = 100.0;
        config.pair_compl_end = 100.0;
        config.product_size_ranges = vec![SizeRange::new(30, 40)];
        config.num_return = num_return;
        config
    }

    fn run(input: &DesignInput, config: &PrimerConfig) -> (Candidates, Selection) {
        let aligners = AlignerSet::new();
        let libraries = RepeatLibraries::default();
        let scorer = OligoScorer::new(input, config, &NearestNeighborTm, &libraries, &aligners);
        let mut candidates = CandidateGenerator::new().generate(&scorer).unwrap();
        let selection = select_pairs(&scorer, &mut candidates).unwrap();
        (candidates, selection)
    }

    fn positions(candidates: &Candidates, selection: &Selection) -> Vec<(usize, usize)> {
        selection
            .pairs
            .iter()
            .map(|p| (candidates.left.oligos[p.left].start, candidates.right.oligos[p.right].start))
            .collect()
    }

    #[test]
    fn test_acgt_best_five() {
        let input = DesignInput::new(&b"ACGT".repeat(10)).unwrap();
        let (candidates, selection) = run(&input, &acgt_config(5));
        assert_eq!(
            positions(&candidates, &selection),
            vec![(9, 38), (5, 34), (5, 38), (1, 30), (1, 34)]
        );
        for p in selection.pairs.iter() {
            assert!((p.quality - 7.3000).abs() < 1e-3);
            assert!(p.product_size >= 30 && p.product_size <= 40);
        }
        assert_eq!(selection.stats.ok, 6);
    }

    #[test]
    fn test_acgt_all_pairs() {
        let input = DesignInput::new(&b"ACGT".repeat(10)).unwrap();
        let (candidates, selection) = run(&input, &acgt_config(10));
        assert_eq!(
            positions(&candidates, &selection),
            vec![(9, 38), (5, 34), (5, 38), (1, 30), (1, 34), (1, 38)]
        );
        let sizes: Vec<usize> = selection.pairs.iter().map(|p| p.product_size).collect();
        assert_eq!(sizes, vec![30, 30, 34, 30, 34, 38]);
        assert_eq!(selection.stats.considered, 9);
        assert_eq!(selection.stats.product, 3);
    }

    #[test]
    fn test_second_range_fills_remaining_slots() {
        let input = DesignInput::new(&b"ACGT".repeat(10)).unwrap();
        let mut config = acgt_config(3);
        config.product_size_ranges = vec![SizeRange::new(38, 40), SizeRange::new(30, 34)];
        let (candidates, selection) = run(&input, &config);
        // (1,38) is the only 38-base product; the second range supplies the rest
        assert_eq!(
            positions(&candidates, &selection),
            vec![(9, 38), (5, 34), (1, 38)]
        );
    }

    #[test]
    fn test_ranked_set_keeps_best() {
        let input = DesignInput::new(&b"ACGT".repeat(10)).unwrap();
        let (candidates, _) = run(&input, &acgt_config(5));
        let pair = |left: usize, right: usize, quality: f64| PrimerPair {
            left,
            right,
            internal: None,
            product_size: 30,
            product_tm: None,
            product_tm_oligo_tm_diff: None,
            diff_tm: 0.0,
            compl_any: 0.0,
            compl_end: 0.0,
            compl_measure: 0.0,
            repeat_sim: 0.0,
            template_mispriming: None,
            quality,
        };

        let mut set = RankedResultSet::new(2);
        assert!(set.insert(pair(0, 0, 3.0), &candidates));
        assert!(set.insert(pair(1, 0, 1.0), &candidates));
        assert_eq!(set.worst().unwrap().quality, 3.0);
        assert!(!set.insert(pair(2, 0, 4.0), &candidates));
        // same quality, but its left primer starts further 5'
        assert!(!set.insert(pair(2, 1, 3.0), &candidates));
        assert!(set.insert(pair(2, 2, 2.0), &candidates));
        assert_eq!(set.len(), 2);
        assert_eq!(set.worst().unwrap().quality, 2.0);
        assert!(set.contains(&pair(1, 0, 0.0)));
        assert!(!set.contains(&pair(0, 0, 0.0)));

        set.sort(&candidates);
        let q: Vec<f64> = set.iter().map(|p| p.quality).collect();
        assert_eq!(q, vec![1.0, 2.0]);
    }

    #[test]
    fn test_internal_oligo_between_primers() {
        let input = DesignInput::new(TEMPLATE).unwrap();
        let mut config = PrimerConfig::default();
        config.primer.min_tm = 40.0;
        config.primer.max_tm = 80.0;
        config.primer.max_self_any = 100.0;
        config.primer.max_self_end = 100.0;
        config.pair_compl_any = 100.0;
        config.pair_compl_end = 100.0;
        config.product_size_ranges = vec![SizeRange::new(60, 100)];
        config.pick_internal = true;
        config.internal.min_tm = 40.0;
        config.internal.max_tm = 80.0;
        config.internal.max_self_any = 100.0;
        config.internal.max_self_end = 100.0;
        let (candidates, selection) = run(&input, &config);

        assert!(!selection.pairs.is_empty());
        assert!(selection.pairs.len() <= 5);
        for p in selection.pairs.iter() {
            let l = &candidates.left.oligos[p.left];
            let r = &candidates.right.oligos[p.right];
            let m = &candidates.internal.oligos[p.internal.unwrap()];
            assert!(m.first() > l.last());
            assert!(m.last() < r.first());
            assert!(p.product_size >= 60 && p.product_size <= 100);
        }
        for w in selection.pairs.as_slice().windows(2) {
            assert!(w[0].quality <= w[1].quality);
        }
    }

    #[test]
    fn test_internal_oligo_ties_follow_scan_order() {
        let input = DesignInput::new(TEMPLATE).unwrap();
        let config = PrimerConfig {
            pick_internal: true,
            ..PrimerConfig::default()
        };
        let aligners = AlignerSet::new();
        let libraries = RepeatLibraries::default();
        let scorer = OligoScorer::new(&input, &config, &NearestNeighborTm, &libraries, &aligners);

        // checked already, so no alignment runs
        let oligo = |kind: OligoKind, start: usize, length: usize, quality: f64| {
            let mut c = OligoCandidate::new(kind, start, length, Vec::new(), false);
            c.violation = Violation::Ok;
            c.quality = quality;
            c.self_any = Some(0.0);
            c.self_end = Some(0.0);
            c.repeat = Some(RepeatSimilarity::default());
            c
        };
        let mut candidates = Candidates {
            left: CandidateList::new(OligoKind::Left),
            right: CandidateList::new(OligoKind::Right),
            internal: CandidateList::new(OligoKind::Internal),
            warnings: Vec::new(),
        };
        candidates.left.oligos.push(oligo(OligoKind::Left, 0, 20, 1.0));
        candidates.right.oligos.push(oligo(OligoKind::Right, 110, 20, 1.0));
        candidates.internal.oligos = vec![
            oligo(OligoKind::Internal, 41, 18, 2.0),
            oligo(OligoKind::Internal, 40, 20, 2.0),
        ];
        assert!(candidates.internal.oligos[0]
            .compare(&candidates.internal.oligos[1])
            .is_lt());

        let selector = PairSelector::new(&scorer);
        let order = scan_order(&candidates.internal);
        assert_eq!(order, vec![1, 0]);
        // equal quality: the window scanned first wins, not the first listed
        assert_eq!(selector.choose_internal(&mut candidates, &order, 0, 0).unwrap(), Some(1));

        candidates.internal.oligos.push(oligo(OligoKind::Internal, 60, 20, 1.5));
        let order = scan_order(&candidates.internal);
        assert_eq!(order, vec![2, 1, 0]);
        assert_eq!(selector.choose_internal(&mut candidates, &order, 0, 0).unwrap(), Some(2));
    }
}
