//! Pair metrics, constraints and penalty

use super::dpal::AlignKind;
use super::error::DesignError;
use super::generator::{CandidateList, Candidates};
use super::iupac::reverse_complement;
use super::scorer::OligoScorer;
use super::types::{Interval, OligoCandidate, PairStats, PrimerPair, SizeRange, TemplateMispriming};

/// Per-oligo checks deferred from candidate generation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LazyCheck {
    SelfComplementarity,
    RepeatSimilarity,
    TemplateMispriming,
}

/// Run a deferred check on one list entry. A candidate that stops being
/// acceptable is taken out of the list's `ok` count.
pub(crate) fn run_lazy_check(
    scorer: &OligoScorer<'_>,
    list: &mut CandidateList,
    index: usize,
    check: LazyCheck,
) -> Result<bool, DesignError> {
    let CandidateList { oligos, stats, .. } = list;
    let c = &mut oligos[index];
    let was_ok = c.is_ok();
    let usable = match check {
        LazyCheck::SelfComplementarity => scorer.ensure_self_complementarity(c, stats)?,
        LazyCheck::RepeatSimilarity => scorer.ensure_repeat_similarity(c, stats)?,
        LazyCheck::TemplateMispriming => scorer.ensure_mispriming(c, stats)?,
    };
    if was_ok && !c.is_ok() {
        stats.ok = stats.ok.saturating_sub(1);
    }
    Ok(usable)
}

/// Left primer ends inside or before the target and the right primer
/// starts inside or after it, without the two crossing.
pub fn pair_spans_target(left: &OligoCandidate, right: &OligoCandidate, target: &Interval) -> bool {
    let last_of_left = left.last();
    let first_of_right = right.first();
    last_of_left < target.end()
        && first_of_right >= target.start
        && last_of_left < first_of_right
}

/// Scores left/right combinations drawn from the candidate lists
pub struct PairScorer<'s, 'a> {
    scorer: &'s OligoScorer<'a>,
}

impl<'s, 'a> PairScorer<'s, 'a> {
    pub fn new(scorer: &'s OligoScorer<'a>) -> Self {
        Self { scorer }
    }

    /// Characterize the pair `(left, right)` of list indices for one
    /// product-size interval. Returns `None` when the pair fails a
    /// constraint; the reason is counted in `stats`.
    ///
    /// The returned pair's `quality` is not yet set; see
    /// [`PairScorer::quality`].
    pub fn score(
        &self,
        candidates: &mut Candidates,
        left: usize,
        right: usize,
        range: SizeRange,
        stats: &mut PairStats,
    ) -> Result<Option<PrimerPair>, DesignError> {
        let config = self.scorer.config();
        let input = self.scorer.input();
        stats.considered += 1;

        let (product_size, product_tm, diff_tm, min_tm) = {
            let l = &candidates.left.oligos[left];
            let r = &candidates.right.oligos[right];

            let product_size = match (r.start + 1).checked_sub(l.start) {
                Some(size) if range.contains(size) => size,
                _ => {
                    stats.product += 1;
                    return Ok(None);
                }
            };

            if !input.targets.is_empty()
                && !input.targets.iter().any(|t| pair_spans_target(l, r, t))
            {
                stats.target += 1;
                return Ok(None);
            }

            let product_tm = self
                .scorer
                .oracle()
                .product_temperature(&input.template[l.start..=r.start], &config.primer.thermo);
            if let Some(min) = config.product_min_tm {
                if product_tm.map_or(true, |tm| tm < min) {
                    stats.low_tm += 1;
                    return Ok(None);
                }
            }
            if let Some(max) = config.product_max_tm {
                if product_tm.map_or(true, |tm| tm > max) {
                    stats.high_tm += 1;
                    return Ok(None);
                }
            }

            let diff_tm = (l.tm - r.tm).abs();
            if diff_tm > config.max_diff_tm {
                stats.temp_diff += 1;
                return Ok(None);
            }
            (product_size, product_tm, diff_tm, l.tm.min(r.tm))
        };

        let mut checks = vec![LazyCheck::SelfComplementarity, LazyCheck::RepeatSimilarity];
        if config.needs_template_mispriming() {
            checks.push(LazyCheck::TemplateMispriming);
        }
        for check in checks {
            if !run_lazy_check(self.scorer, &mut candidates.left, left, check)?
                || !run_lazy_check(self.scorer, &mut candidates.right, right, check)?
            {
                stats.considered -= 1;
                return Ok(None);
            }
        }

        let l = &candidates.left.oligos[left];
        let r = &candidates.right.oligos[right];
        let aligners = self.scorer.aligners();
        // Both strings read 5'->3' on the forward strand.
        let right_forward = reverse_complement(&r.sequence);

        let compl_any = aligners.score(&l.sequence, &right_forward, AlignKind::Local)?;
        if compl_any > config.pair_compl_any {
            stats.compl_any += 1;
            return Ok(None);
        }
        let mut compl_end = aligners.score(&l.sequence, &right_forward, AlignKind::End)?;
        if compl_end > config.pair_compl_end {
            stats.compl_end += 1;
            return Ok(None);
        }
        let reverse_end = aligners.score(&r.sequence, &reverse_complement(&l.sequence), AlignKind::End)?;
        if reverse_end > compl_end {
            if reverse_end > config.pair_compl_end {
                stats.compl_end += 1;
                return Ok(None);
            }
            compl_end = reverse_end;
        }

        let self_any = l.self_any.unwrap_or(0.0) + r.self_any.unwrap_or(0.0);
        let self_end = l.self_end.unwrap_or(0.0) + r.self_end.unwrap_or(0.0);
        let compl_measure = (self_end + compl_end) * 1.1 + self_any + compl_any;

        let repeat_sim = pair_repeat_similarity(l, r);
        if repeat_sim > config.pair_max_repeat_compl {
            stats.repeat_sim += 1;
            return Ok(None);
        }

        let template_mispriming = if config.needs_pair_template_mispriming() {
            let lt = l.template_mispriming.unwrap_or_default();
            let rt = r.template_mispriming.unwrap_or_default();
            let score = pair_template_mispriming(&lt, &rt);
            if config.pair_max_template_mispriming.map_or(false, |max| score > max) {
                stats.template_mispriming += 1;
                return Ok(None);
            }
            Some(score)
        } else {
            None
        };

        Ok(Some(PrimerPair {
            left,
            right,
            internal: None,
            product_size,
            product_tm,
            product_tm_oligo_tm_diff: product_tm.map(|tm| tm - min_tm),
            diff_tm,
            compl_any,
            compl_end,
            compl_measure,
            repeat_sim,
            template_mispriming,
            quality: 0.0,
        }))
    }

    /// Weighted pair penalty; lower is better.
    pub fn quality(&self, pair: &PrimerPair, candidates: &Candidates) -> f64 {
        let config = self.scorer.config();
        let w = &config.pair_weights;
        let l = &candidates.left.oligos[pair.left];
        let r = &candidates.right.oligos[pair.right];
        let mut sum = 0.0;

        sum += w.primer_quality * (l.quality + r.quality);
        if w.io_quality != 0.0 {
            if let Some(m) = pair.internal {
                sum += w.io_quality * candidates.internal.oligos[m].quality;
            }
        }
        sum += w.diff_tm * pair.diff_tm;
        sum += w.compl_any * pair.compl_any;
        sum += w.compl_end * pair.compl_end;

        if let (Some(opt), Some(tm)) = (config.product_opt_tm, pair.product_tm) {
            if tm < opt {
                sum += w.product_tm_lt * (opt - tm);
            } else {
                sum += w.product_tm_gt * (tm - opt);
            }
        }
        if let Some(opt) = config.product_opt_size {
            if pair.product_size < opt {
                sum += w.product_size_lt * (opt - pair.product_size) as f64;
            } else {
                sum += w.product_size_gt * (pair.product_size - opt) as f64;
            }
        }
        sum += w.repeat_sim * pair.repeat_sim;
        sum += w.template_mispriming * pair.template_mispriming.unwrap_or(0.0);
        sum
    }
}

/// Largest summed similarity of both primers to one library entry.
pub fn pair_repeat_similarity(left: &OligoCandidate, right: &OligoCandidate) -> f64 {
    let (Some(ls), Some(rs)) = (&left.repeat, &right.repeat) else {
        return 0.0;
    };
    ls.scores
        .iter()
        .zip(&rs.scores)
        .map(|(a, b)| a + b)
        .fold(0.0, f64::max)
}

/// Each primer priming on the strand the other one binds.
pub fn pair_template_mispriming(left: &TemplateMispriming, right: &TemplateMispriming) -> f64 {
    (left.forward + right.reverse).max(left.reverse + right.forward)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::dpal::AlignerSet;
    use crate::analysis::generator::CandidateGenerator;
    use crate::analysis::library::{LibraryEntry, RepeatLibraries, RepeatLibrary};
    use crate::analysis::tm::NearestNeighborTm;
    use crate::analysis::types::{DesignInput, OligoKind, PrimerConfig, RepeatSimilarity};

    fn acgt_config() -> PrimerConfig {
        let mut config = PrimerConfig::default();
        config.primer.min_size = 18;
        config.primer.opt_size = 20;
        config.primer.max_size = 22;
        config.primer.max_self_any = 100.0;
        config.primer.max_self_end = 100.0;
        config.pair_compl_any = 100.0;
        config.pair_compl_end = 100.0;
        config.product_size_ranges = vec![SizeRange::new(30, 40)];
        config
    }

    fn with_candidates<F>(input: &DesignInput, config: &PrimerConfig, libraries: &RepeatLibraries, f: F)
    where
        F: FnOnce(&PairScorer<'_, '_>, &mut Candidates),
    {
        let aligners = AlignerSet::new();
        let scorer = OligoScorer::new(input, config, &NearestNeighborTm, libraries, &aligners);
        let mut candidates = CandidateGenerator::new().generate(&scorer).unwrap();
        f(&PairScorer::new(&scorer), &mut candidates);
    }

    fn index_of(list: &CandidateList, start: usize) -> usize {
        list.iter().position(|c| c.start == start).unwrap()
    }

    #[test]
    fn test_acgt_pair_metrics() {
        let input = DesignInput::new(&b"ACGT".repeat(10)).unwrap();
        let config = acgt_config();
        with_candidates(&input, &config, &RepeatLibraries::default(), |pairs, candidates| {
            let mut stats = PairStats::default();
            let l = index_of(&candidates.left, 1);
            let r = index_of(&candidates.right, 30);
            let mut pair = pairs
                .score(candidates, l, r, SizeRange::new(30, 40), &mut stats)
                .unwrap()
                .unwrap();
            pair.quality = pairs.quality(&pair, candidates);

            assert_eq!(pair.product_size, 30);
            assert!((pair.product_tm.unwrap() - 61.7696).abs() < 1e-3);
            assert!((pair.product_tm_oligo_tm_diff.unwrap() - 3.4196).abs() < 1e-3);
            assert_eq!(pair.diff_tm, 0.0);
            assert_eq!(pair.compl_any, 22.0);
            assert_eq!(pair.compl_end, 22.0);
            assert!((pair.compl_measure - 138.6).abs() < 1e-9);
            assert_eq!(pair.repeat_sim, 0.0);
            assert!(pair.template_mispriming.is_none());
            assert!((pair.quality - 7.3000).abs() < 1e-3);
            assert_eq!(stats.considered, 1);

            let left = &candidates.left.oligos[l];
            assert_eq!(left.self_any, Some(22.0));
            assert!(left.repeat.is_some());
        });
    }

    #[test]
    fn test_pair_rejections() {
        let input = DesignInput::new(&b"ACGT".repeat(10)).unwrap();
        let config = acgt_config();
        with_candidates(&input, &config, &RepeatLibraries::default(), |pairs, candidates| {
            let mut stats = PairStats::default();
            let l9 = index_of(&candidates.left, 9);
            let r30 = index_of(&candidates.right, 30);
            let r38 = index_of(&candidates.right, 38);

            // 30 - 9 + 1 = 22, below the interval
            assert!(pairs
                .score(candidates, l9, r30, SizeRange::new(30, 40), &mut stats)
                .unwrap()
                .is_none());
            assert_eq!(stats.product, 1);

            assert!(pairs
                .score(candidates, l9, r38, SizeRange::new(31, 40), &mut stats)
                .unwrap()
                .is_none());
            assert_eq!(stats.product, 2);
            assert_eq!(stats.considered, 2);
        });

        let mut strict = acgt_config();
        strict.pair_compl_any = 8.0;
        with_candidates(&input, &strict, &RepeatLibraries::default(), |pairs, candidates| {
            let mut stats = PairStats::default();
            let pair = pairs.score(candidates, 0, 0, SizeRange::new(30, 40), &mut stats).unwrap();
            assert!(pair.is_none());
            assert_eq!(stats.compl_any, 1);
        });

        let mut hot = acgt_config();
        hot.product_min_tm = Some(70.0);
        with_candidates(&input, &hot, &RepeatLibraries::default(), |pairs, candidates| {
            let mut stats = PairStats::default();
            let pair = pairs.score(candidates, 0, 0, SizeRange::new(30, 40), &mut stats).unwrap();
            assert!(pair.is_none());
            assert_eq!(stats.low_tm, 1);
        });
    }

    #[test]
    fn test_lazy_failure_uncounts_pair() {
        let input = DesignInput::new(&b"ACGT".repeat(10)).unwrap();
        let mut config = acgt_config();
        config.primer.max_self_any = 8.0;
        with_candidates(&input, &config, &RepeatLibraries::default(), |pairs, candidates| {
            let mut stats = PairStats::default();
            let before = candidates.left.stats.ok;
            let pair = pairs.score(candidates, 0, 0, SizeRange::new(30, 40), &mut stats).unwrap();
            assert!(pair.is_none());
            assert_eq!(stats.considered, 0);
            assert_eq!(candidates.left.stats.ok, before - 1);
            assert_eq!(candidates.left.stats.compl_any, 1);
            assert!(!candidates.left.oligos[0].is_ok());
            // the right primer was never reached
            assert!(candidates.right.oligos[0].self_any.is_none());
        });
    }

    #[test]
    fn test_pair_repeat_similarity_sums_per_entry() {
        let input = DesignInput::new(&b"ACGT".repeat(10)).unwrap();
        let mut lib = RepeatLibrary::new();
        lib.push(LibraryEntry::new("acgt", &b"ACGT".repeat(10), 1.0));
        let libraries = RepeatLibraries::new(lib.with_reverse_entries(), RepeatLibrary::new());
        let mut config = acgt_config();
        config.primer.max_repeat_compl = 100.0;
        config.pair_max_repeat_compl = 30.0;
        with_candidates(&input, &config, &libraries, |pairs, candidates| {
            let mut stats = PairStats::default();
            let pair = pairs.score(candidates, 0, 0, SizeRange::new(30, 40), &mut stats).unwrap();
            assert!(pair.is_none());
            assert_eq!(stats.repeat_sim, 1);
            assert_eq!(candidates.left.oligos[0].repeat.as_ref().unwrap().max(), 22.0);
        });
    }

    #[test]
    fn test_pair_spans_target() {
        let left = OligoCandidate::new(OligoKind::Left, 10, 20, vec![b'A'; 20], false);
        let right = OligoCandidate::new(OligoKind::Right, 99, 20, vec![b'A'; 20], false);
        assert!(pair_spans_target(&left, &right, &Interval::new(40, 10)));
        assert!(pair_spans_target(&left, &right, &Interval::new(29, 1)));
        assert!(!pair_spans_target(&left, &right, &Interval::new(20, 5)));
        assert!(!pair_spans_target(&left, &right, &Interval::new(95, 10)));
        assert!(pair_spans_target(&left, &right, &Interval::new(80, 10)));
    }

    #[test]
    fn test_combined_scores() {
        let mut left = OligoCandidate::new(OligoKind::Left, 0, 20, Vec::new(), false);
        let mut right = OligoCandidate::new(OligoKind::Right, 99, 20, Vec::new(), false);
        assert_eq!(pair_repeat_similarity(&left, &right), 0.0);
        left.repeat = Some(RepeatSimilarity {
            scores: vec![10.0, 2.0, 7.0],
            max_index: 0,
            max_name: "a".to_string(),
        });
        right.repeat = Some(RepeatSimilarity {
            scores: vec![1.0, 12.0, 8.0],
            max_index: 1,
            max_name: "b".to_string(),
        });
        assert_eq!(pair_repeat_similarity(&left, &right), 15.0);

        let l = TemplateMispriming { forward: 5.0, reverse: 9.0 };
        let r = TemplateMispriming { forward: 4.0, reverse: 3.0 };
        assert_eq!(pair_template_mispriming(&l, &r), 13.0);
    }
}
