//! Candidate window enumeration
//!
//! Slides windows of every allowed length over the included region,
//! anchored at the 3' end, and keeps the windows that pass the eager
//! oligo checks.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::dpal::AlignerSet;
use super::error::DesignError;
use super::iupac::reverse_complement;
use super::library::RepeatLibraries;
use super::scorer::OligoScorer;
use super::tm::MeltingOracle;
use super::types::{DesignInput, OligoCandidate, OligoKind, OligoStats, PrimerConfig};

/// Acceptable oligos of one kind, best first, with rejection counters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateList {
    pub kind: OligoKind,
    pub oligos: Vec<OligoCandidate>,
    pub stats: OligoStats,
}

impl CandidateList {
    pub fn new(kind: OligoKind) -> Self {
        Self {
            kind,
            oligos: Vec::new(),
            stats: OligoStats::default(),
        }
    }

    pub fn len(&self) -> usize {
        self.oligos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.oligos.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &OligoCandidate> {
        self.oligos.iter()
    }

    fn extend(&mut self, oligos: Vec<OligoCandidate>, stats: &OligoStats) {
        self.oligos.extend(oligos);
        self.stats.merge(stats);
    }

    fn finish(&mut self) {
        self.oligos.sort_by(OligoCandidate::compare);
        self.stats.ok = self.oligos.len();
    }
}

/// The three candidate lists of one design run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidates {
    pub left: CandidateList,
    pub right: CandidateList,
    pub internal: CandidateList,
    pub warnings: Vec<String>,
}

impl Candidates {
    pub fn list(&self, kind: OligoKind) -> &CandidateList {
        match kind {
            OligoKind::Left => &self.left,
            OligoKind::Right => &self.right,
            OligoKind::Internal => &self.internal,
        }
    }
}

/// Builds candidate lists.
///
/// By default the length loop for an anchor stops at the first rejection
/// that no 5' extension can clear; [`CandidateGenerator::exhaustive`]
/// scores every window instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CandidateGenerator {
    prune: bool,
}

impl Default for CandidateGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl CandidateGenerator {
    pub fn new() -> Self {
        Self { prune: true }
    }

    pub fn exhaustive() -> Self {
        Self { prune: false }
    }

    /// Build the lists. The configuration and the input are validated
    /// first, so malformed regions or quality scores are reported as
    /// errors.
    pub fn generate(&self, scorer: &OligoScorer<'_>) -> Result<Candidates, DesignError> {
        let config = scorer.config();
        config.validate()?;
        scorer.input().validate(config)?;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.thread_count.get_count())
            .build()
            .map_err(|e| DesignError::ThreadPool(e.to_string()))?;

        let mut warnings = Vec::new();
        let mut build = |pick: bool, kind: OligoKind| -> Result<CandidateList, DesignError> {
            if pick {
                self.build(scorer, kind, &pool, &mut warnings)
            } else {
                Ok(CandidateList::new(kind))
            }
        };
        let left = build(config.pick_left, OligoKind::Left)?;
        let right = build(config.pick_right, OligoKind::Right)?;
        let internal = build(config.pick_internal, OligoKind::Internal)?;

        Ok(Candidates {
            left,
            right,
            internal,
            warnings,
        })
    }

    fn build(
        &self,
        scorer: &OligoScorer<'_>,
        kind: OligoKind,
        pool: &rayon::ThreadPool,
        warnings: &mut Vec<String>,
    ) -> Result<CandidateList, DesignError> {
        let forced = scorer.input().forced(kind);
        let mut list = match forced {
            Some(seq) => forced_oligos(scorer, kind, seq, warnings)?,
            None => pool.install(|| self.scan(scorer, kind))?,
        };
        list.finish();
        log::debug!(
            "{}: {} considered, {} ok",
            kind.description(),
            list.stats.considered,
            list.stats.ok
        );

        if forced.is_some() && scorer.config().pick_anyway {
            if let Some(w) = list.stats.must_use_warning(label(kind)) {
                log::warn!("{}", w);
                warnings.push(w);
            }
        }
        if list.is_empty() {
            let w = format!("No {} found", kind.description());
            log::warn!("{}", w);
            warnings.push(w);
        }
        Ok(list)
    }

    /// Score every anchor in parallel; results are merged in anchor order.
    fn scan(&self, scorer: &OligoScorer<'_>, kind: OligoKind) -> Result<CandidateList, DesignError> {
        let bounds = WindowBounds::new(scorer, kind, true);
        let anchors = bounds.anchors();

        let per_anchor: Vec<Result<(Vec<OligoCandidate>, OligoStats), DesignError>> = anchors
            .par_iter()
            .map(|&anchor| self.scan_anchor(scorer, &bounds, anchor))
            .collect();

        let mut list = CandidateList::new(kind);
        for result in per_anchor {
            let (oligos, stats) = result?;
            list.extend(oligos, &stats);
        }
        Ok(list)
    }

    fn scan_anchor(
        &self,
        scorer: &OligoScorer<'_>,
        bounds: &WindowBounds,
        anchor: usize,
    ) -> Result<(Vec<OligoCandidate>, OligoStats), DesignError> {
        let mut oligos = Vec::new();
        let mut stats = OligoStats::default();

        for length in bounds.min_size..=bounds.max_size {
            let start = match bounds.window(anchor, length) {
                Window::Fits(start) => start,
                Window::Skip => continue,
                Window::OffTemplate => break,
            };
            stats.considered += 1;
            let c = scorer.score(bounds.kind, start, length, false, &mut stats)?;
            if c.is_ok_or_must_use() {
                oligos.push(c);
            } else {
                log::trace!(
                    "{} {}+{} rejected: {}",
                    bounds.kind.description(),
                    start,
                    length,
                    c.violation.description()
                );
                if self.prune && c.violation.is_five_prime_monotonic() {
                    break;
                }
            }
        }
        Ok((oligos, stats))
    }
}

/// Build the candidate lists with the default aligners and pruning.
pub fn generate_candidates(
    input: &DesignInput,
    config: &PrimerConfig,
    oracle: &dyn MeltingOracle,
    libraries: &RepeatLibraries,
) -> Result<Candidates, DesignError> {
    let aligners = AlignerSet::new();
    let scorer = OligoScorer::new(input, config, oracle, libraries, &aligners);
    CandidateGenerator::new().generate(&scorer)
}

fn label(kind: OligoKind) -> &'static str {
    match kind {
        OligoKind::Left => "Left primer",
        OligoKind::Right => "Right primer",
        OligoKind::Internal => "Internal oligo",
    }
}

enum Window {
    Fits(usize),
    Skip,
    OffTemplate,
}

/// Window geometry for one oligo kind, in included-region coordinates.
///
/// Anchors are 3' positions: the last base for left and internal oligos,
/// the first forward-strand base for right oligos.
struct WindowBounds {
    kind: OligoKind,
    offset: usize,
    n: usize,
    min_size: usize,
    max_size: usize,
    /// Smallest product, when windows must leave room for one
    product_min: Option<usize>,
    lowest: usize,
    highest: Option<usize>,
}

impl WindowBounds {
    fn new(scorer: &OligoScorer<'_>, kind: OligoKind, honor_targets: bool) -> Self {
        let config = scorer.config();
        let input = scorer.input();
        let included = input.included_region();
        let n = included.length;
        let args = config.args(kind);
        let pair_mode = config.is_pair_mode();
        let pr_min = config.min_product_size();

        // Targets narrow the primer search only under the default
        // position policy.
        let use_targets =
            honor_targets && config.has_default_position_penalties() && !input.targets.is_empty();
        let rel = |p: usize| p.saturating_sub(included.start) as i64;
        let rightmost_target_start = input.targets.iter().map(|t| rel(t.start)).max();
        let leftmost_target_end = input
            .targets
            .iter()
            .map(|t| rel(t.end()) - 1)
            .min();

        let n_i = n as i64;
        let max_i = args.max_size as i64;
        let (lowest, highest) = match kind {
            OligoKind::Left => {
                let mut hi = n_i - 1;
                if pair_mode {
                    hi = hi.min(n_i - pr_min as i64 + max_i - 1);
                    if use_targets {
                        hi = hi.min(rightmost_target_start.unwrap_or(n_i) - 1);
                    }
                }
                (args.min_size as i64 - 1, hi)
            }
            OligoKind::Right => {
                let mut lo = 0;
                if pair_mode {
                    lo = lo.max(pr_min as i64 - max_i);
                    if use_targets {
                        lo = lo.max(leftmost_target_end.unwrap_or(-1) + 1);
                    }
                }
                (lo, n_i - args.min_size as i64)
            }
            OligoKind::Internal => (args.min_size as i64 - 1, n_i - 1),
        };

        Self {
            kind,
            offset: included.start,
            n,
            min_size: args.min_size,
            max_size: args.max_size,
            product_min: pair_mode.then_some(pr_min),
            lowest: lowest.max(0) as usize,
            highest: usize::try_from(highest).ok(),
        }
    }

    fn admits(&self, anchor: usize, length: usize) -> bool {
        let in_range = anchor >= self.lowest && self.highest.map_or(false, |hi| anchor <= hi);
        in_range && matches!(self.window(anchor, length), Window::Fits(_))
    }

    /// Anchors from the right end of the region to the left.
    fn anchors(&self) -> Vec<usize> {
        match self.highest {
            Some(hi) if hi >= self.lowest => (self.lowest..=hi).rev().collect(),
            _ => Vec::new(),
        }
    }

    fn window(&self, anchor: usize, length: usize) -> Window {
        match self.kind {
            OligoKind::Left | OligoKind::Internal => {
                if anchor + 1 < length {
                    return Window::OffTemplate;
                }
                let first = anchor + 1 - length;
                if self.kind == OligoKind::Left {
                    if let Some(pr_min) = self.product_min {
                        if first + pr_min > self.n {
                            return Window::Skip;
                        }
                    }
                }
                Window::Fits(self.offset + first)
            }
            OligoKind::Right => {
                if anchor + length > self.n {
                    return Window::OffTemplate;
                }
                if let Some(pr_min) = self.product_min {
                    if anchor + length < pr_min {
                        return Window::Skip;
                    }
                }
                Window::Fits(self.offset + anchor + length - 1)
            }
        }
    }
}

/// Score every occurrence of a caller-supplied oligo in the included
/// region, 3'-most first. Occurrences must sit where a scanned window
/// could; with `pick_anyway` the target bounds are lifted.
fn forced_oligos(
    scorer: &OligoScorer<'_>,
    kind: OligoKind,
    seq: &[u8],
    warnings: &mut Vec<String>,
) -> Result<CandidateList, DesignError> {
    let mut list = CandidateList::new(kind);
    let included = scorer.input().included_region();
    let region = &scorer.input().template[included.start..included.end()];
    let probe = match kind {
        OligoKind::Right => reverse_complement(seq),
        OligoKind::Left | OligoKind::Internal => seq.to_vec(),
    };
    let len = probe.len();
    if len == 0 || len > region.len() {
        return Ok(list);
    }

    let must_use = scorer.config().pick_anyway;
    let bounds = WindowBounds::new(scorer, kind, !must_use);
    for first in (0..=region.len() - len).rev() {
        if !region[first..first + len].eq_ignore_ascii_case(&probe) {
            continue;
        }
        let anchor = match kind {
            OligoKind::Right => first,
            OligoKind::Left | OligoKind::Internal => first + len - 1,
        };
        if !bounds.admits(anchor, len) {
            log::debug!("{} at {} lies outside the search bounds", kind.description(), first);
            continue;
        }
        let start = match kind {
            OligoKind::Right => included.start + first + len - 1,
            OligoKind::Left | OligoKind::Internal => included.start + first,
        };
        list.stats.considered += 1;
        let c = scorer.score(kind, start, len, must_use, &mut list.stats)?;
        if c.is_ok_or_must_use() {
            list.oligos.push(c);
        }
    }

    if list.len() > 1 {
        let w = format!(
            "More than one position in template for input oligo {}",
            String::from_utf8_lossy(seq)
        );
        log::warn!("{}", w);
        warnings.push(w);
    }
    Ok(list)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::tm::NearestNeighborTm;
    use crate::analysis::types::{Interval, SizeRange, ThreadCount};

    const TEMPLATE: &[u8] = b"TCAGGATCCATGCTAGCTAGGCTAAGCTAGTCGATCGGATCCGATGCATGCTAGCTAGTCGATCAGTAGCATTGACCTGAGGTACCAGTTGACAGCATCGGATCAGCTTGCATGCAAGTCC";

    fn run(input: &DesignInput, config: &PrimerConfig, generator: CandidateGenerator) -> Candidates {
        let aligners = AlignerSet::new();
        let libraries = RepeatLibraries::default();
        let scorer = OligoScorer::new(input, config, &NearestNeighborTm, &libraries, &aligners);
        generator.generate(&scorer).unwrap()
    }

    fn acgt_config() -> PrimerConfig {
        let mut config = PrimerConfig::default();
        config.primer.min_size = 18;
        config.primer.opt_size = 20;
        config.primer.max_size = 22;
        config.product_size_ranges = vec![SizeRange::new(30, 40)];
        config
    }

    fn loose_config() -> PrimerConfig {
        let mut config = PrimerConfig::default();
        config.primer.min_tm = 40.0;
        config.primer.max_tm = 80.0;
        config.product_size_ranges = vec![SizeRange::new(60, 100)];
        config.pick_internal = true;
        config.internal.min_tm = 40.0;
        config.internal.max_tm = 80.0;
        config
    }

    #[test]
    fn test_acgt_repeat_lists() {
        let input = DesignInput::new(&b"ACGT".repeat(10)).unwrap();
        let candidates = run(&input, &acgt_config(), CandidateGenerator::new());

        let left: Vec<(usize, usize)> = candidates.left.iter().map(|c| (c.start, c.length)).collect();
        assert_eq!(left, vec![(9, 22), (5, 22), (1, 22)]);

        let right: Vec<(usize, usize)> = candidates.right.iter().map(|c| (c.first(), c.length)).collect();
        assert_eq!(right, vec![(17, 22), (13, 22), (9, 22)]);

        for c in candidates.left.iter().chain(candidates.right.iter()) {
            assert_eq!(c.sequence, b"CGTACGTACGTACGTACGTACG".to_vec());
            assert!(c.tm >= 57.0 && c.tm <= 63.0);
        }
        assert!(candidates.internal.is_empty());
        assert_eq!(candidates.left.stats.ok, 3);
    }

    #[test]
    fn test_windows_within_bounds() {
        let input = DesignInput::new(TEMPLATE)
            .unwrap()
            .with_included(Interval::new(5, 110));
        let config = loose_config();
        let candidates = run(&input, &config, CandidateGenerator::new());
        assert!(!candidates.left.is_empty());
        assert!(!candidates.right.is_empty());
        assert!(!candidates.internal.is_empty());

        for list in [&candidates.left, &candidates.right, &candidates.internal] {
            let args = config.args(list.kind);
            for c in list.iter() {
                assert!(c.first() >= 5 && c.last() < 115);
                assert!(c.length >= args.min_size && c.length <= args.max_size);
                assert!(c.is_ok());
            }
            for pair in list.oligos.windows(2) {
                assert!(pair[0].quality <= pair[1].quality);
            }
            assert_eq!(list.stats.ok, list.len());
        }
    }

    #[test]
    fn test_pruning_matches_exhaustive_scan() {
        let input = DesignInput::new(TEMPLATE).unwrap();
        let mut config = loose_config();
        config.primer.max_poly_x = 3;
        config.gc_clamp = 1;
        let pruned = run(&input, &config, CandidateGenerator::new());
        let full = run(&input, &config, CandidateGenerator::exhaustive());
        assert_eq!(pruned.left.oligos, full.left.oligos);
        assert_eq!(pruned.right.oligos, full.right.oligos);
        assert_eq!(pruned.internal.oligos, full.internal.oligos);
        assert!(pruned.left.stats.considered <= full.left.stats.considered);
    }

    #[test]
    fn test_thread_count_does_not_change_results() {
        let input = DesignInput::new(TEMPLATE).unwrap();
        let mut config = loose_config();
        config.thread_count = ThreadCount::Fixed(1);
        let single = run(&input, &config, CandidateGenerator::new());
        config.thread_count = ThreadCount::Fixed(4);
        let multi = run(&input, &config, CandidateGenerator::new());
        assert_eq!(single, multi);
    }

    #[test]
    fn test_target_limits_anchors() {
        let input = DesignInput::new(TEMPLATE)
            .unwrap()
            .with_targets(vec![Interval::new(50, 10)]);
        let candidates = run(&input, &loose_config(), CandidateGenerator::new());
        assert!(candidates.left.iter().all(|c| c.last() < 50));
        assert!(candidates.right.iter().all(|c| c.first() > 59));
    }

    #[test]
    fn test_forced_left_oligo() {
        let forced = &TEMPLATE[10..30];
        let input = DesignInput::new(TEMPLATE).unwrap().with_left(forced);
        let mut config = loose_config();
        config.pick_anyway = true;
        config.primer.min_tm = 75.0;
        config.primer.opt_tm = 78.0;
        let candidates = run(&input, &config, CandidateGenerator::new());

        assert_eq!(candidates.left.len(), 1);
        let c = &candidates.left.oligos[0];
        assert_eq!((c.start, c.length), (10, 20));
        assert!(c.must_use);
        assert_eq!(c.violation, crate::analysis::types::Violation::LowTm);
        assert!(candidates
            .warnings
            .iter()
            .any(|w| w.starts_with("Left primer is unacceptable: Tm too low")));
    }

    #[test]
    fn test_forced_right_oligo_found_by_reverse_complement() {
        let right = reverse_complement(&TEMPLATE[80..100]);
        let input = DesignInput::new(TEMPLATE).unwrap().with_right(&right);
        let candidates = run(&input, &loose_config(), CandidateGenerator::new());
        assert_eq!(candidates.right.len(), 1);
        assert_eq!(candidates.right.oligos[0].start, 99);
        assert_eq!(candidates.right.oligos[0].sequence, right);
    }

    #[test]
    fn test_forced_oligo_repeated_in_template() {
        let input = DesignInput::new(&b"ACGT".repeat(10))
            .unwrap()
            .with_left(b"CGTACGTACGTACGTACGTACG");
        let mut config = acgt_config();
        config.pick_right = false;
        let candidates = run(&input, &config, CandidateGenerator::new());
        assert_eq!(candidates.left.len(), 5);
        assert!(candidates
            .warnings
            .iter()
            .any(|w| w.starts_with("More than one position")));
        assert!(candidates.right.is_empty());
        assert!(!candidates.warnings.iter().any(|w| w == "No right primer found"));
    }

    #[test]
    fn test_forced_oligo_respects_target_bounds() {
        // 3' end at 74, past the target start
        let forced = &TEMPLATE[55..75];
        let input = DesignInput::new(TEMPLATE)
            .unwrap()
            .with_targets(vec![Interval::new(50, 10)])
            .with_left(forced);
        let mut config = loose_config();
        let candidates = run(&input, &config, CandidateGenerator::new());
        assert!(candidates.left.is_empty());
        assert_eq!(candidates.left.stats.considered, 0);
        assert!(candidates.warnings.iter().any(|w| w == "No left primer found"));

        config.pick_anyway = true;
        let candidates = run(&input, &config, CandidateGenerator::new());
        assert_eq!(candidates.left.len(), 1);
        assert_eq!(candidates.left.oligos[0].start, 55);
        assert_eq!(candidates.left.oligos[0].violation, crate::analysis::types::Violation::OverlapsTarget);
    }

    #[test]
    fn test_invalid_input_is_an_error() {
        let short = DesignInput::new(&TEMPLATE[..40])
            .unwrap()
            .with_included(Interval::new(0, 1000));
        let result = generate_candidates(
            &short,
            &PrimerConfig::default(),
            &NearestNeighborTm,
            &RepeatLibraries::default(),
        );
        assert!(matches!(result, Err(DesignError::InvalidInput(_))));

        let input = DesignInput::new(TEMPLATE).unwrap().with_quality(vec![40; 10]);
        let result = generate_candidates(&input, &loose_config(), &NearestNeighborTm, &RepeatLibraries::default());
        assert!(matches!(result, Err(DesignError::InvalidInput(_))));

        let mut config = loose_config();
        config.primer.min_size = 0;
        let input = DesignInput::new(TEMPLATE).unwrap();
        let result = generate_candidates(&input, &config, &NearestNeighborTm, &RepeatLibraries::default());
        assert!(matches!(result, Err(DesignError::InvalidConfig(_))));
    }

    #[test]
    fn test_missing_forced_oligo_gives_empty_list() {
        let input = DesignInput::new(TEMPLATE).unwrap().with_left(b"GGGGGGGGGGGGGGGGGGGG");
        let candidates = run(&input, &loose_config(), CandidateGenerator::new());
        assert!(candidates.left.is_empty());
        assert!(candidates.warnings.iter().any(|w| w == "No left primer found"));
    }
}
