//! Per-oligo metrics, constraint checks and penalty

use super::dpal::{AlignKind, AlignerSet};
use super::error::DesignError;
use super::iupac::{is_gc, reverse_complement};
use super::library::RepeatLibraries;
use super::tm::MeltingOracle;
use super::types::{
    overlaps_any, DesignInput, OligoCandidate, OligoKind, OligoStats, PrimerConfig,
    RepeatSimilarity, TemplateMispriming, Violation,
};

/// Number of 3' bases used for end quality and the 3' GC limit.
const END_WINDOW: usize = 5;

/// Scores oligo windows of one template under one configuration.
///
/// Shared read-only between worker threads; all mutable state lives in the
/// candidates and the stats passed in.
pub struct OligoScorer<'a> {
    input: &'a DesignInput,
    config: &'a PrimerConfig,
    oracle: &'a dyn MeltingOracle,
    libraries: &'a RepeatLibraries,
    aligners: &'a AlignerSet,
    template_rc: Vec<u8>,
}

impl<'a> OligoScorer<'a> {
    pub fn new(
        input: &'a DesignInput,
        config: &'a PrimerConfig,
        oracle: &'a dyn MeltingOracle,
        libraries: &'a RepeatLibraries,
        aligners: &'a AlignerSet,
    ) -> Self {
        Self {
            input,
            config,
            oracle,
            libraries,
            aligners,
            template_rc: reverse_complement(&input.template),
        }
    }

    pub fn config(&self) -> &PrimerConfig {
        self.config
    }

    pub fn input(&self) -> &DesignInput {
        self.input
    }

    pub fn aligners(&self) -> &AlignerSet {
        self.aligners
    }

    pub fn oracle(&self) -> &dyn MeltingOracle {
        self.oracle
    }

    /// Forward-strand extent `(first, last)` of a window given its start.
    pub fn extent(kind: OligoKind, start: usize, length: usize) -> (usize, usize) {
        match kind {
            OligoKind::Right => (start + 1 - length, start),
            OligoKind::Left | OligoKind::Internal => (start, start + length - 1),
        }
    }

    /// Score the window and run every eager check.
    ///
    /// `start` follows [`OligoCandidate::start`]. The window must be
    /// non-empty and lie inside the template.
    pub fn score(
        &self,
        kind: OligoKind,
        start: usize,
        length: usize,
        must_use: bool,
        stats: &mut OligoStats,
    ) -> Result<OligoCandidate, DesignError> {
        let (first, last) = Self::extent(kind, start, length);
        let forward = &self.input.template[first..=last];
        let sequence = match kind {
            OligoKind::Right => reverse_complement(forward),
            OligoKind::Left | OligoKind::Internal => forward.to_vec(),
        };
        let mut c = OligoCandidate::new(kind, start, length, sequence, must_use);
        c.violation = Violation::Ok;
        let args = self.config.args(kind);

        if self.config.lowercase_masking
            && kind.is_primer()
            && self.is_lowercase_masked(c.three_prime())
            && c.reject(Violation::LowercaseMasked, stats)
        {
            return Ok(c);
        }

        let (gc, ns) = gc_and_n_content(forward);
        c.gc_percent = gc;
        c.num_ns = ns;
        if ns > args.max_num_ns && c.reject(Violation::TooManyNs, stats) {
            return Ok(c);
        }

        if kind.is_primer() {
            self.position_penalty(&mut c, first, last);
        }
        if kind.is_primer() && c.overlaps_target && c.reject(Violation::OverlapsTarget, stats) {
            return Ok(c);
        }
        let excluded = match kind {
            OligoKind::Internal => &self.input.excluded_internal,
            OligoKind::Left | OligoKind::Right => &self.input.excluded,
        };
        if overlaps_any(excluded, first, last) && c.reject(Violation::ExcludedRegion, stats) {
            return Ok(c);
        }

        if c.gc_percent < args.min_gc && c.reject(Violation::LowGc, stats) {
            return Ok(c);
        }
        if c.gc_percent > args.max_gc && c.reject(Violation::HighGc, stats) {
            return Ok(c);
        }

        if kind.is_primer() {
            let clamp = self.config.gc_clamp;
            if clamp > 0 {
                let clamped = clamp <= c.sequence.len()
                    && c.sequence.iter().rev().take(clamp).all(|&b| is_gc(b));
                if !clamped && c.reject(Violation::NoGcClamp, stats) {
                    return Ok(c);
                }
            }
            if self.config.max_end_gc < END_WINDOW {
                let end_gc = c.sequence.iter().rev().take(END_WINDOW).filter(|&&b| is_gc(b)).count();
                if end_gc > self.config.max_end_gc && c.reject(Violation::TooManyGcAtEnd, stats) {
                    return Ok(c);
                }
            }
        }

        let (overall, end) = self.sequence_quality(kind, first, last);
        c.seq_quality = overall;
        c.seq_end_quality = end;
        if c.seq_quality < args.min_quality && c.reject(Violation::LowSequenceQuality, stats) {
            return Ok(c);
        }
        if kind.is_primer()
            && c.seq_end_quality < args.min_end_quality
            && c.reject(Violation::LowEndSequenceQuality, stats)
        {
            return Ok(c);
        }

        if args.max_poly_x > 0 && longest_run(forward) > args.max_poly_x && c.reject(Violation::PolyX, stats) {
            return Ok(c);
        }

        match self.oracle.melting_temperature(&c.sequence, &args.thermo) {
            Some(tm) => {
                c.tm = tm;
                if tm < args.min_tm && c.reject(Violation::LowTm, stats) {
                    return Ok(c);
                }
                if tm > args.max_tm && c.reject(Violation::HighTm, stats) {
                    return Ok(c);
                }
            }
            None => {
                if c.reject(Violation::LowTm, stats) {
                    return Ok(c);
                }
            }
        }

        if kind.is_primer() {
            c.end_stability = self.oracle.end_stability(&c.sequence, &args.thermo);
            let stable = c
                .end_stability
                .map_or(false, |dg| dg <= self.config.max_end_stability);
            if !stable && c.reject(Violation::HighEndStability, stats) {
                return Ok(c);
            }
        }

        if (must_use || args.weights.compl_any > 0.0 || args.weights.compl_end > 0.0)
            && !self.ensure_self_complementarity(&mut c, stats)?
        {
            return Ok(c);
        }
        if (must_use || args.weights.repeat_sim > 0.0) && !self.ensure_repeat_similarity(&mut c, stats)? {
            return Ok(c);
        }
        if kind.is_primer()
            && (must_use || args.weights.template_mispriming > 0.0)
            && !self.ensure_mispriming(&mut c, stats)?
        {
            return Ok(c);
        }

        if length > args.max_size && c.reject(Violation::TooLong, stats) {
            return Ok(c);
        }
        if length < args.min_size && c.reject(Violation::TooShort, stats) {
            return Ok(c);
        }

        c.quality = self.penalty(&c);
        Ok(c)
    }

    fn is_lowercase_masked(&self, position: usize) -> bool {
        matches!(self.input.original.get(position), Some(b'a' | b'c' | b'g' | b't'))
    }

    fn position_penalty(&self, c: &mut OligoCandidate, first: usize, last: usize) {
        let targets = &self.input.targets;
        if self.config.has_default_position_penalties() {
            if overlaps_any(targets, first, last) {
                c.position_penalty = 0.0;
                c.position_penalty_infinite = true;
                c.overlaps_target = true;
            }
            return;
        }
        let [target] = targets.as_slice() else {
            return;
        };

        let begin = target.start as i64;
        let end = target.end() as i64 - 1;
        let three = c.three_prime() as i64;
        let (reachable, distance, inside) = match c.kind {
            OligoKind::Left if three < begin => (true, begin - three - 1, false),
            OligoKind::Left => (three <= end, three - begin + 1, true),
            OligoKind::Right if three > end => (true, three - end - 1, false),
            OligoKind::Right => (three >= begin, end - three + 1, true),
            OligoKind::Internal => return,
        };
        let multiplier = if inside {
            self.config.inside_penalty
        } else {
            Some(self.config.outside_penalty)
        };
        match (reachable, multiplier) {
            (true, Some(w)) => {
                c.position_penalty = distance as f64 * w;
                c.position_penalty_infinite = false;
            }
            _ => {
                c.position_penalty = 0.0;
                c.position_penalty_infinite = true;
                c.overlaps_target = true;
            }
        }
    }

    /// `(overall minimum, 3'-end minimum)`; both are the top of the
    /// quality range when no quality scores were given.
    fn sequence_quality(&self, kind: OligoKind, first: usize, last: usize) -> (i32, i32) {
        let max = self.config.quality_range_max;
        let Some(quality) = self.input.quality.as_deref() else {
            return (max, max);
        };
        let window = &quality[first..=last];
        let n = window.len().min(END_WINDOW);
        let end_part = match kind {
            OligoKind::Right => &window[..n],
            OligoKind::Left | OligoKind::Internal => &window[window.len() - n..],
        };
        let end = end_part.iter().copied().min().unwrap_or(max);
        let overall = window.iter().copied().min().unwrap_or(max).min(end);
        (overall, end)
    }

    /// Self-complementarity (any and 3' end). Computed once; returns
    /// whether the oligo is still usable.
    pub fn ensure_self_complementarity(
        &self,
        c: &mut OligoCandidate,
        stats: &mut OligoStats,
    ) -> Result<bool, DesignError> {
        if c.self_any.is_some() && c.self_end.is_some() {
            return Ok(c.is_ok_or_must_use());
        }
        let args = self.config.args(c.kind);
        let revc = reverse_complement(&c.sequence);

        let any = self.aligners.score(&c.sequence, &revc, AlignKind::Local)?;
        c.self_any = Some(any);
        if any > args.max_self_any && c.reject(Violation::HighSelfAny, stats) {
            return Ok(false);
        }
        let end = self.aligners.score(&c.sequence, &revc, AlignKind::End)?;
        c.self_end = Some(end);
        if end > args.max_self_end && c.reject(Violation::HighSelfEnd, stats) {
            return Ok(false);
        }
        Ok(c.is_ok_or_must_use())
    }

    /// Similarity to the repeat library for this oligo kind.
    pub fn ensure_repeat_similarity(
        &self,
        c: &mut OligoCandidate,
        stats: &mut OligoStats,
    ) -> Result<bool, DesignError> {
        if c.repeat.is_some() {
            return Ok(c.is_ok_or_must_use());
        }
        let library = self.libraries.for_kind(c.kind);
        let args = self.config.args(c.kind);
        let consensus = self.config.lib_ambiguity_codes_consensus;
        let (first, last) = Self::extent(c.kind, c.start, c.length);
        let forward = &self.input.template[first..=last];

        let mut sim = RepeatSimilarity {
            scores: Vec::with_capacity(library.len()),
            max_index: 0,
            max_name: library
                .entries()
                .first()
                .map(|e| e.name.clone())
                .unwrap_or_default(),
        };
        let mut best = 0.0;
        for (i, entry) in library.iter().enumerate() {
            let raw = match c.kind {
                OligoKind::Left => {
                    let mode = if consensus { AlignKind::LocalEndAmbig } else { AlignKind::LocalEnd };
                    self.aligners.score(forward, &entry.sequence, mode)?
                }
                OligoKind::Internal => {
                    let mode = if consensus { AlignKind::LocalAmbig } else { AlignKind::Local };
                    self.aligners.score(forward, &entry.sequence, mode)?
                }
                OligoKind::Right => {
                    let mode = if consensus { AlignKind::LocalEndAmbig } else { AlignKind::Local };
                    self.aligners.score(&c.sequence, &entry.reverse_complement, mode)?
                }
            };
            let w = entry.weight * raw;
            if w > best {
                best = w;
                sim.max_index = i;
                sim.max_name = entry.name.clone();
            }
            sim.scores.push(w);
        }
        c.repeat = Some(sim);

        if best > args.max_repeat_compl && c.reject(Violation::HighLibrarySimilarity, stats) {
            return Ok(false);
        }
        Ok(c.is_ok_or_must_use())
    }

    /// Alignment of a primer against the template outside its own site and
    /// against the opposite strand.
    pub fn ensure_mispriming(
        &self,
        c: &mut OligoCandidate,
        stats: &mut OligoStats,
    ) -> Result<bool, DesignError> {
        if c.template_mispriming.is_some() || !c.kind.is_primer() {
            return Ok(c.is_ok_or_must_use());
        }
        let n = self.input.template.len();
        let (first, last) = Self::extent(c.kind, c.start, c.length);
        let (target, target_r, first, last) = match c.kind {
            OligoKind::Right => (
                self.template_rc.as_slice(),
                self.input.template.as_slice(),
                n - 1 - last,
                n - 1 - first,
            ),
            OligoKind::Left | OligoKind::Internal => (
                self.input.template.as_slice(),
                self.template_rc.as_slice(),
                first,
                last,
            ),
        };

        let five = self.aligners.score(&c.sequence, &target[..first], AlignKind::LocalEnd)?;
        let three = self.aligners.score(&c.sequence, &target[last + 1..], AlignKind::LocalEnd)?;
        let reverse = self.aligners.score(&c.sequence, target_r, AlignKind::LocalEnd)?;
        let mispriming = TemplateMispriming {
            forward: five.max(three),
            reverse,
        };
        c.template_mispriming = Some(mispriming);

        if let Some(limit) = self.config.primer.max_template_mispriming {
            if mispriming.max() > limit && c.reject(Violation::HighTemplateMispriming, stats) {
                return Ok(false);
            }
        }
        Ok(c.is_ok_or_must_use())
    }

    /// Weighted penalty of an oligo; lower is better.
    pub fn penalty(&self, c: &OligoCandidate) -> f64 {
        let args = self.config.args(c.kind);
        let w = &args.weights;
        let mut sum = 0.0;

        if c.tm > args.opt_tm {
            sum += w.temp_gt * (c.tm - args.opt_tm);
        } else {
            sum += w.temp_lt * (args.opt_tm - c.tm);
        }
        if c.gc_percent > args.opt_gc {
            sum += w.gc_content_gt * (c.gc_percent - args.opt_gc);
        } else {
            sum += w.gc_content_lt * (args.opt_gc - c.gc_percent);
        }
        if c.length > args.opt_size {
            sum += w.length_gt * (c.length - args.opt_size) as f64;
        } else {
            sum += w.length_lt * (args.opt_size - c.length) as f64;
        }
        sum += w.compl_any * c.self_any.unwrap_or(0.0);
        sum += w.compl_end * c.self_end.unwrap_or(0.0);
        sum += w.num_ns * c.num_ns as f64;
        if w.repeat_sim != 0.0 {
            sum += w.repeat_sim * c.repeat.as_ref().map_or(0.0, RepeatSimilarity::max);
        }
        if w.seq_quality != 0.0 {
            sum += w.seq_quality * f64::from(self.config.quality_range_max - c.seq_quality);
        }

        if c.kind.is_primer() {
            if !c.overlaps_target {
                sum += w.pos_penalty * c.position_penalty;
            }
            sum += w.end_stability * c.end_stability.unwrap_or(0.0);
            if w.template_mispriming != 0.0 {
                sum += w.template_mispriming
                    * c.template_mispriming.as_ref().map_or(0.0, TemplateMispriming::max);
            }
        }
        sum
    }
}

/// GC percentage with N excluded from the denominator, and the N count.
pub fn gc_and_n_content(seq: &[u8]) -> (f64, usize) {
    let ns = seq.iter().filter(|&&b| b == b'N').count();
    let gc = seq.iter().filter(|&&b| is_gc(b)).count();
    let called = seq.len() - ns;
    let percent = if called == 0 {
        0.0
    } else {
        100.0 * gc as f64 / called as f64
    };
    (percent, ns)
}

/// Longest mononucleotide run, with N extending any run.
pub fn longest_run(seq: &[u8]) -> usize {
    let mut longest = usize::from(!seq.is_empty());
    let mut run = 1;
    for i in 1..seq.len() {
        if seq[i] == seq[i - 1] || seq[i] == b'N' {
            run += 1;
        } else {
            run = 1;
        }
        longest = longest.max(run);
    }
    longest
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::library::{LibraryEntry, RepeatLibrary};
    use crate::analysis::tm::NearestNeighborTm;
    use crate::analysis::types::Interval;

    const TEMPLATE: &[u8] = b"GATCTGACGTAGCTAGCTAGGCTAAGCTAGTCGATCGGATCCGATGCATGCTAGCTAGTCGATCAGTAGC";

    struct Fixture {
        input: DesignInput,
        config: PrimerConfig,
        libraries: RepeatLibraries,
        aligners: AlignerSet,
    }

    impl Fixture {
        fn new(input: DesignInput) -> Self {
            Self {
                input,
                config: PrimerConfig::default(),
                libraries: RepeatLibraries::default(),
                aligners: AlignerSet::new(),
            }
        }

        fn scorer(&self) -> OligoScorer<'_> {
            OligoScorer::new(&self.input, &self.config, &NearestNeighborTm, &self.libraries, &self.aligners)
        }
    }

    fn fixture() -> Fixture {
        Fixture::new(DesignInput::new(TEMPLATE).unwrap())
    }

    #[test]
    fn test_gc_and_n_content() {
        assert_eq!(gc_and_n_content(b"GCAT"), (50.0, 0));
        assert_eq!(gc_and_n_content(b"GCNN"), (100.0, 2));
        assert_eq!(gc_and_n_content(b"NNNN"), (0.0, 4));
    }

    #[test]
    fn test_longest_run() {
        assert_eq!(longest_run(b"ACGT"), 1);
        assert_eq!(longest_run(b"AAAAACG"), 5);
        assert_eq!(longest_run(b"ACCNNGT"), 4);
        assert_eq!(longest_run(b""), 0);
    }

    #[test]
    fn test_right_oligo_is_reverse_complement() {
        let f = fixture();
        let mut stats = OligoStats::default();
        let c = f.scorer().score(OligoKind::Right, 29, 20, false, &mut stats).unwrap();
        assert_eq!(c.first(), 10);
        assert_eq!(c.sequence, reverse_complement(&TEMPLATE[10..30]));
    }

    #[test]
    fn test_tm_window_checks() {
        let mut f = fixture();
        f.config.primer.min_tm = 90.0;
        f.config.primer.opt_tm = 95.0;
        f.config.primer.max_tm = 100.0;
        let mut stats = OligoStats::default();
        let c = f.scorer().score(OligoKind::Left, 10, 20, false, &mut stats).unwrap();
        assert_eq!(c.violation, Violation::LowTm);
        assert_eq!(stats.temp_min, 1);
        assert!(!c.is_ok_or_must_use());
    }

    #[test]
    fn test_ok_oligo_penalty() {
        let mut f = fixture();
        f.config.primer.min_tm = 0.0;
        f.config.primer.max_tm = 100.0;
        f.config.max_end_stability = 100.0;
        let mut stats = OligoStats::default();
        let scorer = f.scorer();
        let c = scorer.score(OligoKind::Left, 10, 20, false, &mut stats).unwrap();
        assert_eq!(c.violation, Violation::Ok);
        assert!(c.end_stability.is_some());
        // Default weights: |Tm - 60| plus |length - 20|.
        assert!((c.quality - (c.tm - 60.0).abs()).abs() < 1e-9);
        assert!(c.self_any.is_none());
    }

    #[test]
    fn test_target_overlap() {
        let input = DesignInput::new(TEMPLATE)
            .unwrap()
            .with_targets(vec![Interval::new(25, 3)]);
        let f = Fixture::new(input);
        let mut stats = OligoStats::default();
        let scorer = f.scorer();
        let c = scorer.score(OligoKind::Left, 10, 20, false, &mut stats).unwrap();
        assert_eq!(c.violation, Violation::OverlapsTarget);
        assert!(c.position_penalty_infinite);

        let internal = scorer.score(OligoKind::Internal, 10, 20, false, &mut stats).unwrap();
        assert_ne!(internal.violation, Violation::OverlapsTarget);
        assert_eq!(stats.target, 1);
    }

    #[test]
    fn test_non_default_position_penalty() {
        let input = DesignInput::new(TEMPLATE)
            .unwrap()
            .with_targets(vec![Interval::new(40, 5)]);
        let mut f = Fixture::new(input);
        f.config.outside_penalty = 0.5;
        f.config.inside_penalty = Some(2.0);
        let scorer = f.scorer();
        let mut stats = OligoStats::default();

        // 3' end at 29: ten bases short of the target.
        let left = scorer.score(OligoKind::Left, 10, 20, false, &mut stats).unwrap();
        assert_eq!(left.position_penalty, 5.0);
        assert!(!left.overlaps_target);

        // 3' end at 41: two bases into the target.
        let inside = scorer.score(OligoKind::Left, 22, 20, false, &mut stats).unwrap();
        assert_eq!(inside.position_penalty, 4.0);

        // 3' end past the target.
        let past = scorer.score(OligoKind::Left, 30, 20, false, &mut stats).unwrap();
        assert_eq!(past.violation, Violation::OverlapsTarget);
    }

    #[test]
    fn test_excluded_regions_by_kind() {
        let input = DesignInput::new(TEMPLATE)
            .unwrap()
            .with_excluded(vec![Interval::new(0, 12)])
            .with_excluded_internal(vec![Interval::new(50, 2)]);
        let f = Fixture::new(input);
        let scorer = f.scorer();
        let mut stats = OligoStats::default();
        let left = scorer.score(OligoKind::Left, 5, 20, false, &mut stats).unwrap();
        assert_eq!(left.violation, Violation::ExcludedRegion);
        let internal = scorer.score(OligoKind::Internal, 5, 20, false, &mut stats).unwrap();
        assert_ne!(internal.violation, Violation::ExcludedRegion);
        let internal = scorer.score(OligoKind::Internal, 40, 20, false, &mut stats).unwrap();
        assert_eq!(internal.violation, Violation::ExcludedRegion);
    }

    #[test]
    fn test_lowercase_masking() {
        let mut template = TEMPLATE.to_vec();
        template[29] = template[29].to_ascii_lowercase();
        let mut f = Fixture::new(DesignInput::new(&template).unwrap());
        f.config.lowercase_masking = true;
        let mut stats = OligoStats::default();
        let c = f.scorer().score(OligoKind::Left, 10, 20, false, &mut stats).unwrap();
        assert_eq!(c.violation, Violation::LowercaseMasked);
        assert_eq!(stats.masked, 1);

        // probes are not masked
        let internal = f.scorer().score(OligoKind::Internal, 10, 20, false, &mut stats).unwrap();
        assert_ne!(internal.violation, Violation::LowercaseMasked);
        assert_eq!(stats.masked, 1);
    }

    #[test]
    fn test_sequence_quality() {
        let mut quality = vec![40; TEMPLATE.len()];
        quality[28] = 10;
        let input = DesignInput::new(TEMPLATE).unwrap().with_quality(quality);
        let mut f = Fixture::new(input);
        f.config.primer.min_end_quality = 20;
        let scorer = f.scorer();
        let mut stats = OligoStats::default();
        let left = scorer.score(OligoKind::Left, 10, 20, false, &mut stats).unwrap();
        assert_eq!(left.seq_quality, 10);
        assert_eq!(left.seq_end_quality, 10);
        assert_eq!(left.violation, Violation::LowEndSequenceQuality);

        // Base 28 is at the 5' end of this right primer.
        let right = scorer.score(OligoKind::Right, 28, 20, false, &mut stats).unwrap();
        assert_eq!(right.seq_quality, 10);
        assert_eq!(right.seq_end_quality, 40);
    }

    #[test]
    fn test_gc_clamp_and_end_gc() {
        // The left window 10..=29 ends in ...GCTAG.
        let mut f = fixture();
        f.config.gc_clamp = 2;
        let mut stats = OligoStats::default();
        let c = f.scorer().score(OligoKind::Left, 10, 20, false, &mut stats).unwrap();
        assert_eq!(c.violation, Violation::NoGcClamp);

        let mut f = fixture();
        f.config.max_end_gc = 1;
        let c = f.scorer().score(OligoKind::Left, 10, 20, false, &mut stats).unwrap();
        assert_eq!(c.violation, Violation::TooManyGcAtEnd);
        assert_eq!(stats.gc_end_high, 1);
    }

    #[test]
    fn test_must_use_collects_all_problems() {
        let mut f = fixture();
        f.config.primer.min_tm = 90.0;
        f.config.primer.opt_tm = 95.0;
        f.config.primer.max_tm = 100.0;
        let mut stats = OligoStats::default();
        let c = f.scorer().score(OligoKind::Left, 10, 16, true, &mut stats).unwrap();
        assert!(c.is_ok_or_must_use());
        assert_eq!(stats.temp_min, 1);
        assert_eq!(stats.size_min, 1);
        assert!(c.self_any.is_some());
        assert!(c.repeat.is_some());
        assert!(c.template_mispriming.is_some());
        assert!(c.quality > 0.0);
    }

    #[test]
    fn test_self_complementarity_is_lazy_and_cached() {
        let f = fixture();
        let scorer = f.scorer();
        let mut stats = OligoStats::default();
        let mut c = OligoCandidate::new(OligoKind::Left, 0, 8, b"ACGTACGT".to_vec(), false);
        c.violation = Violation::Ok;
        assert!(!scorer.ensure_self_complementarity(&mut c, &mut stats).unwrap());
        assert_eq!(c.self_any, Some(8.0));
        assert_eq!(c.self_end, Some(8.0));
        assert_eq!(c.violation, Violation::HighSelfEnd);
        assert!(!scorer.ensure_self_complementarity(&mut c, &mut stats).unwrap());
        assert_eq!(stats.compl_any, 0);
        assert_eq!(stats.compl_end, 1);
    }

    #[test]
    fn test_library_identical_candidate() {
        let window = TEMPLATE[10..30].to_vec();
        let mut lib = RepeatLibrary::new();
        lib.push(LibraryEntry::new("repeat", &window, 1.0));
        let mut f = fixture();
        f.libraries = RepeatLibraries::new(lib.with_reverse_entries(), RepeatLibrary::new());
        let scorer = f.scorer();
        let mut stats = OligoStats::default();

        let mut c = OligoCandidate::new(OligoKind::Left, 10, 20, window, false);
        c.violation = Violation::Ok;
        assert!(!scorer.ensure_repeat_similarity(&mut c, &mut stats).unwrap());
        let sim = c.repeat.as_ref().unwrap();
        assert_eq!(sim.max(), 20.0);
        assert_eq!(sim.max_name, "repeat");
        assert_eq!(sim.scores.len(), 2);
        assert_eq!(c.violation, Violation::HighLibrarySimilarity);
        assert_eq!(stats.repeat_score, 1);
    }

    #[test]
    fn test_right_primer_library_similarity() {
        let primer = reverse_complement(&TEMPLATE[30..50]);
        // matches the primer's 5' fifteen bases, then runs off into Ts
        let mut hit = primer[..15].to_vec();
        hit.extend_from_slice(b"TTTTTTTTTT");
        let mut lib = RepeatLibrary::new();
        lib.push(LibraryEntry::new("partial", &reverse_complement(&hit), 1.0));

        let mut f = fixture();
        f.libraries = RepeatLibraries::new(lib.with_reverse_entries(), RepeatLibrary::new());
        f.config.lib_ambiguity_codes_consensus = false;
        let mut stats = OligoStats::default();
        let mut c = OligoCandidate::new(OligoKind::Right, 49, 20, primer.clone(), false);
        c.violation = Violation::Ok;
        assert!(!f.scorer().ensure_repeat_similarity(&mut c, &mut stats).unwrap());
        let sim = c.repeat.as_ref().unwrap();
        assert_eq!(sim.scores, vec![15.0, 10.0]);
        assert_eq!(sim.max_name, "partial");
        assert_eq!(c.violation, Violation::HighLibrarySimilarity);

        // consensus mode anchors the alignment at the primer's 3' end
        f.config.lib_ambiguity_codes_consensus = true;
        let mut c = OligoCandidate::new(OligoKind::Right, 49, 20, primer, false);
        c.violation = Violation::Ok;
        assert!(f.scorer().ensure_repeat_similarity(&mut c, &mut stats).unwrap());
        assert_eq!(c.repeat.as_ref().unwrap().scores, vec![12.0, 9.0]);
    }

    #[test]
    fn test_template_mispriming_skips_own_site() {
        let mut f = fixture();
        f.config.primer.max_template_mispriming = Some(12.0);
        let scorer = f.scorer();
        let mut stats = OligoStats::default();
        let mut c = OligoCandidate::new(OligoKind::Left, 10, 20, TEMPLATE[10..30].to_vec(), false);
        c.violation = Violation::Ok;
        scorer.ensure_mispriming(&mut c, &mut stats).unwrap();
        let tm = c.template_mispriming.unwrap();
        assert!(tm.forward < 20.0);
        assert!(tm.reverse < 20.0);
    }
}
