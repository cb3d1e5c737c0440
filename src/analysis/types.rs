//! Data types for oligo and primer-pair design

use serde::{Deserialize, Serialize};

use super::error::DesignError;
use super::iupac::{is_standard_base, normalize_dna};
use super::tm::{ThermoParams, MAX_NN_TM_LENGTH};

/// Largest number of intervals accepted in any interval list.
pub const MAX_INTERVALS: usize = 200;

/// Longest oligo accepted as forced input.
pub const MAX_OLIGO_LENGTH: usize = MAX_NN_TM_LENGTH;

/// Thread count configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ThreadCount {
    /// Use all available CPU cores
    Auto,
    /// Use a specific number of threads
    Fixed(usize),
}

impl Default for ThreadCount {
    fn default() -> Self {
        Self::Auto
    }
}

impl ThreadCount {
    /// Get the actual number of threads to use
    pub fn get_count(&self) -> usize {
        match self {
            Self::Auto => std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            Self::Fixed(n) => (*n).max(1),
        }
    }
}

/// Inclusive size range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizeRange {
    pub min: usize,
    pub max: usize,
}

impl SizeRange {
    pub fn new(min: usize, max: usize) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, size: usize) -> bool {
        size >= self.min && size <= self.max
    }
}

/// A `(start, length)` region of the template
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interval {
    pub start: usize,
    pub length: usize,
}

impl Interval {
    pub fn new(start: usize, length: usize) -> Self {
        Self { start, length }
    }

    /// One past the last position.
    pub fn end(&self) -> usize {
        self.start + self.length
    }

    /// Whether the inclusive range `first..=last` touches this interval.
    pub fn overlaps(&self, first: usize, last: usize) -> bool {
        first < self.end() && last >= self.start
    }

    /// Whether `first..=last` lies entirely inside this interval.
    pub fn contains_range(&self, first: usize, last: usize) -> bool {
        first >= self.start && last < self.end()
    }
}

/// True if `first..=last` overlaps any interval in the list.
pub fn overlaps_any(intervals: &[Interval], first: usize, last: usize) -> bool {
    intervals.iter().any(|iv| iv.overlaps(first, last))
}

/// Which strand and role an oligo plays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OligoKind {
    /// Forward primer, 3' end to the right
    Left,
    /// Reverse primer, 3' end to the left on the forward strand
    Right,
    /// Hybridization probe between the primers
    Internal,
}

impl OligoKind {
    pub fn description(&self) -> &'static str {
        match self {
            Self::Left => "left primer",
            Self::Right => "right primer",
            Self::Internal => "internal oligo",
        }
    }

    pub fn is_primer(&self) -> bool {
        !matches!(self, Self::Internal)
    }
}

/// Why an oligo was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Violation {
    Ok,
    TooManyNs,
    OverlapsTarget,
    LowGc,
    HighGc,
    NoGcClamp,
    TooManyGcAtEnd,
    LowTm,
    HighTm,
    HighSelfAny,
    HighSelfEnd,
    HighEndStability,
    PolyX,
    ExcludedRegion,
    LowSequenceQuality,
    LowEndSequenceQuality,
    HighLibrarySimilarity,
    HighTemplateMispriming,
    LowercaseMasked,
    TooLong,
    TooShort,
    Uninitialized,
}

impl Default for Violation {
    fn default() -> Self {
        Self::Uninitialized
    }
}

impl Violation {
    /// Whether extending the oligo at its 5' end can never clear this
    /// violation, so longer windows at the same 3' anchor can be skipped.
    pub fn is_five_prime_monotonic(&self) -> bool {
        matches!(
            self,
            Self::TooManyNs
                | Self::OverlapsTarget
                | Self::ExcludedRegion
                | Self::HighSelfAny
                | Self::NoGcClamp
                | Self::HighEndStability
                | Self::PolyX
                | Self::LowSequenceQuality
                | Self::LowEndSequenceQuality
                | Self::HighLibrarySimilarity
                | Self::TooLong
                | Self::TooManyGcAtEnd
        )
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok)
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::TooManyNs => "Too many Ns",
            Self::OverlapsTarget => "Overlaps Target",
            Self::LowGc | Self::HighGc => "Unacceptable GC content",
            Self::NoGcClamp => "No GC clamp",
            Self::TooManyGcAtEnd => "Too many GCs at 3' end",
            Self::LowTm => "Tm too low",
            Self::HighTm => "Tm too high",
            Self::HighSelfAny => "High self complementarity",
            Self::HighSelfEnd => "High end self complementarity",
            Self::HighEndStability => "High 3' stability",
            Self::PolyX => "Long poly-X",
            Self::ExcludedRegion => "Overlaps Excluded Region",
            Self::LowSequenceQuality | Self::LowEndSequenceQuality => "Low sequence quality",
            Self::HighLibrarySimilarity => "High similarity to mispriming or mishyb library",
            Self::HighTemplateMispriming => "High template mispriming score",
            Self::LowercaseMasked => "Masked with lowercase letter",
            Self::TooLong => "Too long",
            Self::TooShort => "Too short",
            Self::Uninitialized => "Not evaluated",
        }
    }
}

/// Penalty weights for a single oligo
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OligoWeights {
    pub temp_gt: f64,
    pub temp_lt: f64,
    pub gc_content_gt: f64,
    pub gc_content_lt: f64,
    pub length_gt: f64,
    pub length_lt: f64,
    pub compl_any: f64,
    pub compl_end: f64,
    pub num_ns: f64,
    pub repeat_sim: f64,
    pub seq_quality: f64,
    pub end_stability: f64,
    pub pos_penalty: f64,
    pub template_mispriming: f64,
}

impl OligoWeights {
    pub fn primer() -> Self {
        Self {
            pos_penalty: 1.0,
            ..Self::internal()
        }
    }

    pub fn internal() -> Self {
        Self {
            temp_gt: 1.0,
            temp_lt: 1.0,
            gc_content_gt: 0.0,
            gc_content_lt: 0.0,
            length_gt: 1.0,
            length_lt: 1.0,
            compl_any: 0.0,
            compl_end: 0.0,
            num_ns: 0.0,
            repeat_sim: 0.0,
            seq_quality: 0.0,
            end_stability: 0.0,
            pos_penalty: 0.0,
            template_mispriming: 0.0,
        }
    }
}

impl Default for OligoWeights {
    fn default() -> Self {
        Self::primer()
    }
}

/// Constraints shared by both primers, or by the internal oligo
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OligoArgs {
    pub min_size: usize,
    pub opt_size: usize,
    pub max_size: usize,
    pub min_tm: f64,
    pub opt_tm: f64,
    pub max_tm: f64,
    pub min_gc: f64,
    pub opt_gc: f64,
    pub max_gc: f64,
    pub thermo: ThermoParams,
    pub max_num_ns: usize,
    /// Longest allowed mononucleotide run; 0 disables the check
    pub max_poly_x: usize,
    pub max_self_any: f64,
    pub max_self_end: f64,
    pub max_repeat_compl: f64,
    /// Template mispriming limit; `None` disables the check
    pub max_template_mispriming: Option<f64>,
    pub min_quality: i32,
    pub min_end_quality: i32,
    pub weights: OligoWeights,
}

impl OligoArgs {
    pub fn primer() -> Self {
        Self {
            min_size: 18,
            opt_size: 20,
            max_size: 27,
            min_tm: 57.0,
            opt_tm: 60.0,
            max_tm: 63.0,
            min_gc: 20.0,
            opt_gc: 50.0,
            max_gc: 80.0,
            thermo: ThermoParams::default(),
            max_num_ns: 0,
            max_poly_x: 5,
            max_self_any: 8.0,
            max_self_end: 3.0,
            max_repeat_compl: 12.0,
            max_template_mispriming: None,
            min_quality: 0,
            min_end_quality: 0,
            weights: OligoWeights::primer(),
        }
    }

    pub fn internal() -> Self {
        Self {
            max_self_any: 12.0,
            max_self_end: 12.0,
            weights: OligoWeights::internal(),
            ..Self::primer()
        }
    }

    pub fn size_range(&self) -> SizeRange {
        SizeRange::new(self.min_size, self.max_size)
    }

    fn validate(&self, label: &str) -> Result<(), DesignError> {
        let invalid = |msg: &str| Err(DesignError::InvalidConfig(format!("{} {}", label, msg)));
        if self.min_size == 0 || self.min_size > self.max_size {
            return invalid("size range is empty");
        }
        if self.opt_size < self.min_size || self.opt_size > self.max_size {
            return invalid("optimum size outside min/max");
        }
        if self.max_size > MAX_OLIGO_LENGTH {
            return invalid(&format!("max size exceeds built-in maximum of {}", MAX_OLIGO_LENGTH));
        }
        if self.opt_tm < self.min_tm || self.opt_tm > self.max_tm {
            return invalid("optimum Tm lower than minimum or higher than maximum");
        }
        if self.min_gc > self.max_gc || self.min_gc > 100.0 || self.max_gc < 0.0 {
            return invalid("has illegal GC limits");
        }
        let shrt = f64::from(i16::MAX);
        if self.max_self_any < 0.0
            || self.max_self_any > shrt
            || self.max_self_end < 0.0
            || self.max_self_end > shrt
        {
            return invalid("has illegal complementarity restrictions");
        }
        if self.thermo.salt_conc <= 0.0 || self.thermo.dna_conc <= 0.0 {
            return invalid("has illegal salt or DNA concentration");
        }
        if self.thermo.divalent_conc < 0.0 || self.thermo.dntp_conc < 0.0 {
            return invalid("has illegal divalent salt or dNTP concentration");
        }
        Ok(())
    }
}

impl Default for OligoArgs {
    fn default() -> Self {
        Self::primer()
    }
}

/// Penalty weights for a primer pair
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PairWeights {
    pub primer_quality: f64,
    pub io_quality: f64,
    pub diff_tm: f64,
    pub compl_any: f64,
    pub compl_end: f64,
    pub product_tm_lt: f64,
    pub product_tm_gt: f64,
    pub product_size_lt: f64,
    pub product_size_gt: f64,
    pub repeat_sim: f64,
    pub template_mispriming: f64,
}

impl Default for PairWeights {
    fn default() -> Self {
        Self {
            primer_quality: 1.0,
            io_quality: 0.0,
            diff_tm: 0.0,
            compl_any: 0.0,
            compl_end: 0.0,
            product_tm_lt: 0.0,
            product_tm_gt: 0.0,
            product_size_lt: 0.0,
            product_size_gt: 0.0,
            repeat_sim: 0.0,
            template_mispriming: 0.0,
        }
    }
}

/// Global design parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrimerConfig {
    pub primer: OligoArgs,
    pub internal: OligoArgs,
    pub pair_weights: PairWeights,
    pub pick_left: bool,
    pub pick_right: bool,
    pub pick_internal: bool,
    /// Number of pairs to return (K)
    pub num_return: usize,
    /// Product-size intervals, tried in order
    pub product_size_ranges: Vec<SizeRange>,
    pub product_min_tm: Option<f64>,
    pub product_max_tm: Option<f64>,
    pub product_opt_tm: Option<f64>,
    pub product_opt_size: Option<usize>,
    pub max_diff_tm: f64,
    pub pair_compl_any: f64,
    pub pair_compl_end: f64,
    pub pair_max_repeat_compl: f64,
    pub pair_max_template_mispriming: Option<f64>,
    /// Number of 3' G/C bases required on primers
    pub gc_clamp: usize,
    /// Largest number of G/C among the five 3' bases of a primer
    pub max_end_gc: usize,
    pub max_end_stability: f64,
    pub quality_range_min: i32,
    pub quality_range_max: i32,
    /// Multiplier for 3' ends inside the target; `None` makes them unacceptable
    pub inside_penalty: Option<f64>,
    pub outside_penalty: f64,
    /// Reject oligos whose 3' base is lowercase in the template
    pub lowercase_masking: bool,
    /// Keep forced oligos even when they violate constraints
    pub pick_anyway: bool,
    /// Treat library ambiguity codes as consensus (match any member base)
    pub lib_ambiguity_codes_consensus: bool,
    pub thread_count: ThreadCount,
}

impl Default for PrimerConfig {
    fn default() -> Self {
        Self {
            primer: OligoArgs::primer(),
            internal: OligoArgs::internal(),
            pair_weights: PairWeights::default(),
            pick_left: true,
            pick_right: true,
            pick_internal: false,
            num_return: 5,
            product_size_ranges: vec![SizeRange::new(100, 300)],
            product_min_tm: None,
            product_max_tm: None,
            product_opt_tm: None,
            product_opt_size: None,
            max_diff_tm: 100.0,
            pair_compl_any: 8.0,
            pair_compl_end: 3.0,
            pair_max_repeat_compl: 24.0,
            pair_max_template_mispriming: None,
            gc_clamp: 0,
            max_end_gc: 5,
            max_end_stability: 100.0,
            quality_range_min: 0,
            quality_range_max: 100,
            inside_penalty: None,
            outside_penalty: 0.0,
            lowercase_masking: false,
            pick_anyway: false,
            lib_ambiguity_codes_consensus: true,
            thread_count: ThreadCount::Auto,
        }
    }
}

impl PrimerConfig {
    /// Parse a (possibly partial) JSON document; missing fields take defaults.
    pub fn from_json(text: &str) -> Result<Self, DesignError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, DesignError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn args(&self, kind: OligoKind) -> &OligoArgs {
        match kind {
            OligoKind::Internal => &self.internal,
            OligoKind::Left | OligoKind::Right => &self.primer,
        }
    }

    pub fn is_pair_mode(&self) -> bool {
        self.pick_left && self.pick_right
    }

    /// True unless inside or outside penalties were changed.
    pub fn has_default_position_penalties(&self) -> bool {
        self.inside_penalty.is_none() && self.outside_penalty == 0.0
    }

    /// Smallest product size over all intervals.
    pub fn min_product_size(&self) -> usize {
        self.product_size_ranges
            .iter()
            .map(|r| r.min)
            .min()
            .unwrap_or(0)
    }

    pub fn needs_template_mispriming(&self) -> bool {
        self.primer.max_template_mispriming.is_some()
            || self.primer.weights.template_mispriming > 0.0
            || self.needs_pair_template_mispriming()
    }

    pub fn needs_pair_template_mispriming(&self) -> bool {
        self.pair_max_template_mispriming.is_some() || self.pair_weights.template_mispriming > 0.0
    }

    pub fn validate(&self) -> Result<(), DesignError> {
        self.primer.validate("primer")?;
        self.internal.validate("internal oligo")?;

        if !(self.pick_left || self.pick_right || self.pick_internal) {
            return Err(DesignError::InvalidConfig(
                "nothing to pick: enable left, right or internal".to_string(),
            ));
        }
        if self.num_return == 0 {
            return Err(DesignError::InvalidConfig("num_return < 1".to_string()));
        }
        if self.product_size_ranges.is_empty() {
            return Err(DesignError::InvalidConfig("no product size ranges".to_string()));
        }
        if self.product_size_ranges.len() > MAX_INTERVALS {
            return Err(DesignError::InvalidConfig(format!(
                "too many product size ranges (max {})",
                MAX_INTERVALS
            )));
        }
        if let Some(r) = self.product_size_ranges.iter().find(|r| r.min > r.max) {
            return Err(DesignError::InvalidConfig(format!(
                "illegal product size range {}-{}",
                r.min, r.max
            )));
        }
        if self.is_pair_mode() && self.primer.max_size > self.min_product_size() {
            return Err(DesignError::InvalidConfig(
                "primer max size > min product size".to_string(),
            ));
        }
        if self.pick_internal && self.is_pair_mode() && self.internal.max_size > self.min_product_size() {
            return Err(DesignError::InvalidConfig(
                "internal oligo max size > min product size".to_string(),
            ));
        }
        let shrt = f64::from(i16::MAX);
        if self.pair_compl_any < 0.0
            || self.pair_compl_any > shrt
            || self.pair_compl_end < 0.0
            || self.pair_compl_end > shrt
        {
            return Err(DesignError::InvalidConfig(
                "illegal pair complementarity restrictions".to_string(),
            ));
        }
        if self.max_end_stability < 0.0 {
            return Err(DesignError::InvalidConfig(
                "max end stability must be non-negative".to_string(),
            ));
        }
        if self.quality_range_min > self.quality_range_max {
            return Err(DesignError::InvalidConfig("empty quality range".to_string()));
        }
        for (label, min_q) in [
            ("primer", self.primer.min_quality),
            ("internal oligo", self.internal.min_quality),
        ] {
            if min_q != 0 && (min_q < self.quality_range_min || min_q > self.quality_range_max) {
                return Err(DesignError::InvalidConfig(format!(
                    "{} min quality outside quality range",
                    label
                )));
            }
        }
        let w = &self.pair_weights;
        if (w.product_tm_lt != 0.0 || w.product_tm_gt != 0.0) && self.product_opt_tm.is_none() {
            return Err(DesignError::InvalidConfig(
                "product Tm is weighted but no optimum is defined".to_string(),
            ));
        }
        if (w.product_size_lt != 0.0 || w.product_size_gt != 0.0) && self.product_opt_size.is_none() {
            return Err(DesignError::InvalidConfig(
                "product size is weighted but no optimum is defined".to_string(),
            ));
        }
        if w.io_quality != 0.0 && !self.pick_internal {
            return Err(DesignError::InvalidConfig(
                "internal oligo quality is weighted but internal oligos are not picked".to_string(),
            ));
        }
        Ok(())
    }
}

/// Template sequence and its annotations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesignInput {
    /// Upper-cased template
    pub template: Vec<u8>,
    /// Template as given, used for lowercase masking
    pub original: Vec<u8>,
    pub targets: Vec<Interval>,
    pub excluded: Vec<Interval>,
    pub excluded_internal: Vec<Interval>,
    /// Region primers must lie in; the whole template when absent
    pub included: Option<Interval>,
    /// Per-base quality scores, same length as the template
    pub quality: Option<Vec<i32>>,
    pub left_input: Option<Vec<u8>>,
    pub right_input: Option<Vec<u8>>,
    pub internal_input: Option<Vec<u8>>,
}

impl DesignInput {
    /// Build an input from a template. Characters outside the IUPAC
    /// alphabet are an error; ambiguity codes are read as N.
    pub fn new(template: &[u8]) -> Result<Self, DesignError> {
        let (upper, offender) = normalize_dna(template);
        if let Some(c) = offender {
            return Err(DesignError::InvalidInput(format!(
                "Unrecognized base in input sequence: {}",
                c as char
            )));
        }
        let upper = upper
            .into_iter()
            .map(|b| if is_standard_base(b) { b } else { b'N' })
            .collect();
        Ok(Self {
            template: upper,
            original: template.to_vec(),
            targets: Vec::new(),
            excluded: Vec::new(),
            excluded_internal: Vec::new(),
            included: None,
            quality: None,
            left_input: None,
            right_input: None,
            internal_input: None,
        })
    }

    pub fn with_targets(mut self, targets: Vec<Interval>) -> Self {
        self.targets = targets;
        self
    }

    pub fn with_excluded(mut self, excluded: Vec<Interval>) -> Self {
        self.excluded = excluded;
        self
    }

    pub fn with_excluded_internal(mut self, excluded: Vec<Interval>) -> Self {
        self.excluded_internal = excluded;
        self
    }

    pub fn with_included(mut self, included: Interval) -> Self {
        self.included = Some(included);
        self
    }

    pub fn with_quality(mut self, quality: Vec<i32>) -> Self {
        self.quality = Some(quality);
        self
    }

    pub fn with_left(mut self, seq: &[u8]) -> Self {
        self.left_input = Some(seq.to_ascii_uppercase());
        self
    }

    pub fn with_right(mut self, seq: &[u8]) -> Self {
        self.right_input = Some(seq.to_ascii_uppercase());
        self
    }

    pub fn with_internal(mut self, seq: &[u8]) -> Self {
        self.internal_input = Some(seq.to_ascii_uppercase());
        self
    }

    pub fn len(&self) -> usize {
        self.template.len()
    }

    pub fn is_empty(&self) -> bool {
        self.template.is_empty()
    }

    pub fn included_region(&self) -> Interval {
        self.included.unwrap_or(Interval::new(0, self.template.len()))
    }

    pub fn forced(&self, kind: OligoKind) -> Option<&[u8]> {
        match kind {
            OligoKind::Left => self.left_input.as_deref(),
            OligoKind::Right => self.right_input.as_deref(),
            OligoKind::Internal => self.internal_input.as_deref(),
        }
    }

    /// Check the annotations against the template and the configuration.
    /// Returns non-fatal warnings.
    pub fn validate(&self, config: &PrimerConfig) -> Result<Vec<String>, DesignError> {
        let mut warnings = Vec::new();
        let n = self.template.len();
        if n == 0 {
            return Err(DesignError::InvalidInput("empty template".to_string()));
        }
        let included = self.included_region();
        if included.end() > n {
            return Err(DesignError::InvalidInput(
                "Illegal value for included region".to_string(),
            ));
        }
        for (label, list) in [
            ("target", &self.targets),
            ("excluded region", &self.excluded),
            ("internal excluded region", &self.excluded_internal),
        ] {
            if list.len() > MAX_INTERVALS {
                return Err(DesignError::InvalidInput(format!(
                    "too many {} intervals (max {})",
                    label, MAX_INTERVALS
                )));
            }
            if list.iter().any(|iv| iv.end() > n) {
                return Err(DesignError::InvalidInput(format!(
                    "{} outside the template",
                    label
                )));
            }
        }
        if self
            .targets
            .iter()
            .any(|t| t.start < included.start || t.end() > included.end())
        {
            return Err(DesignError::InvalidInput(
                "target not in included region".to_string(),
            ));
        }
        if !config.has_default_position_penalties() {
            if self.targets.len() > 1 {
                return Err(DesignError::InvalidInput(
                    "non-default inside or outside penalty is valid only when number of targets <= 1"
                        .to_string(),
                ));
            }
            if self.targets.is_empty() {
                warnings.push(
                    "Non-default inside penalty or outside penalty has no effect when number of targets is 0"
                        .to_string(),
                );
            }
        }
        if config.is_pair_mode() && included.length < config.min_product_size() {
            return Err(DesignError::InvalidInput(
                "included region length < min product size".to_string(),
            ));
        }
        match &self.quality {
            Some(q) => {
                if q.len() != n {
                    return Err(DesignError::InvalidInput(
                        "quality length differs from template length".to_string(),
                    ));
                }
                if q
                    .iter()
                    .any(|&v| v < config.quality_range_min || v > config.quality_range_max)
                {
                    return Err(DesignError::InvalidInput(
                        "Sequence quality score out of range".to_string(),
                    ));
                }
            }
            None => {
                if config.primer.weights.seq_quality != 0.0 || config.internal.weights.seq_quality != 0.0 {
                    return Err(DesignError::InvalidInput(
                        "sequence quality is weighted but no quality is defined".to_string(),
                    ));
                }
            }
        }
        if self.internal_input.is_some() && !config.pick_internal {
            return Err(DesignError::InvalidInput(
                "internal oligo given but internal oligos are not picked".to_string(),
            ));
        }
        for kind in [OligoKind::Left, OligoKind::Right, OligoKind::Internal] {
            let Some(seq) = self.forced(kind) else {
                continue;
            };
            if seq.len() > MAX_OLIGO_LENGTH {
                return Err(DesignError::InvalidInput(format!(
                    "specified {} exceeds built-in maximum of {}",
                    kind.description(),
                    MAX_OLIGO_LENGTH
                )));
            }
            let args = config.args(kind);
            if seq.len() > args.max_size {
                warnings.push(format!("Specified {} > max size", kind.description()));
            }
            if seq.len() < args.min_size {
                warnings.push(format!("Specified {} < min size", kind.description()));
            }
        }
        Ok(warnings)
    }
}

/// Library similarity of one oligo
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RepeatSimilarity {
    /// Weighted score against each library entry, in library order
    pub scores: Vec<f64>,
    pub max_index: usize,
    pub max_name: String,
}

impl RepeatSimilarity {
    pub fn max(&self) -> f64 {
        self.scores.get(self.max_index).copied().unwrap_or(0.0)
    }
}

/// Alignment of a primer against the rest of the template
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TemplateMispriming {
    /// Best of the template 5' and 3' of the primer, same strand
    pub forward: f64,
    /// Opposite strand
    pub reverse: f64,
}

impl TemplateMispriming {
    pub fn max(&self) -> f64 {
        self.forward.max(self.reverse)
    }
}

/// A scored oligo window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OligoCandidate {
    pub kind: OligoKind,
    /// 5' base on the forward strand; for a right oligo its rightmost position
    pub start: usize,
    pub length: usize,
    /// Oligo 5'->3'
    pub sequence: Vec<u8>,
    pub gc_percent: f64,
    pub tm: f64,
    pub num_ns: usize,
    pub self_any: Option<f64>,
    pub self_end: Option<f64>,
    pub end_stability: Option<f64>,
    pub repeat: Option<RepeatSimilarity>,
    pub template_mispriming: Option<TemplateMispriming>,
    pub seq_quality: i32,
    pub seq_end_quality: i32,
    pub position_penalty: f64,
    pub position_penalty_infinite: bool,
    pub overlaps_target: bool,
    pub quality: f64,
    pub must_use: bool,
    pub violation: Violation,
}

impl OligoCandidate {
    pub fn new(kind: OligoKind, start: usize, length: usize, sequence: Vec<u8>, must_use: bool) -> Self {
        Self {
            kind,
            start,
            length,
            sequence,
            gc_percent: 0.0,
            tm: 0.0,
            num_ns: 0,
            self_any: None,
            self_end: None,
            end_stability: None,
            repeat: None,
            template_mispriming: None,
            seq_quality: 0,
            seq_end_quality: 0,
            position_penalty: 0.0,
            position_penalty_infinite: false,
            overlaps_target: false,
            quality: 0.0,
            must_use,
            violation: Violation::Uninitialized,
        }
    }

    /// Leftmost forward-strand position.
    pub fn first(&self) -> usize {
        match self.kind {
            OligoKind::Right => self.start + 1 - self.length,
            OligoKind::Left | OligoKind::Internal => self.start,
        }
    }

    /// Rightmost forward-strand position.
    pub fn last(&self) -> usize {
        match self.kind {
            OligoKind::Right => self.start,
            OligoKind::Left | OligoKind::Internal => self.start + self.length - 1,
        }
    }

    /// Forward-strand position of the 3' base.
    pub fn three_prime(&self) -> usize {
        match self.kind {
            OligoKind::Right => self.first(),
            OligoKind::Left | OligoKind::Internal => self.last(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.violation.is_ok()
    }

    pub fn is_ok_or_must_use(&self) -> bool {
        self.is_ok() || self.must_use
    }

    /// Record a violation; the first one sticks. Returns true when
    /// scoring should stop.
    pub fn reject(&mut self, violation: Violation, stats: &mut OligoStats) -> bool {
        stats.record(violation);
        if matches!(self.violation, Violation::Ok | Violation::Uninitialized) {
            self.violation = violation;
        }
        !self.must_use
    }

    /// Sort key: quality, then start descending, then length.
    pub fn compare(&self, other: &Self) -> std::cmp::Ordering {
        self.quality
            .total_cmp(&other.quality)
            .then_with(|| other.start.cmp(&self.start))
            .then_with(|| self.length.cmp(&other.length))
    }
}

/// Per-list rejection counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OligoStats {
    pub considered: usize,
    pub ns: usize,
    pub target: usize,
    pub excluded: usize,
    pub gc: usize,
    pub gc_clamp: usize,
    pub gc_end_high: usize,
    pub temp_min: usize,
    pub temp_max: usize,
    pub compl_any: usize,
    pub compl_end: usize,
    pub repeat_score: usize,
    pub poly_x: usize,
    pub seq_quality: usize,
    pub stability: usize,
    pub template_mispriming: usize,
    pub masked: usize,
    pub size_min: usize,
    pub size_max: usize,
    pub ok: usize,
}

impl OligoStats {
    pub fn record(&mut self, violation: Violation) {
        let counter = match violation {
            Violation::TooManyNs => &mut self.ns,
            Violation::OverlapsTarget => &mut self.target,
            Violation::ExcludedRegion => &mut self.excluded,
            Violation::LowGc | Violation::HighGc => &mut self.gc,
            Violation::NoGcClamp => &mut self.gc_clamp,
            Violation::TooManyGcAtEnd => &mut self.gc_end_high,
            Violation::LowTm => &mut self.temp_min,
            Violation::HighTm => &mut self.temp_max,
            Violation::HighSelfAny => &mut self.compl_any,
            Violation::HighSelfEnd => &mut self.compl_end,
            Violation::HighLibrarySimilarity => &mut self.repeat_score,
            Violation::PolyX => &mut self.poly_x,
            Violation::LowSequenceQuality | Violation::LowEndSequenceQuality => &mut self.seq_quality,
            Violation::HighEndStability => &mut self.stability,
            Violation::HighTemplateMispriming => &mut self.template_mispriming,
            Violation::LowercaseMasked => &mut self.masked,
            Violation::TooShort => &mut self.size_min,
            Violation::TooLong => &mut self.size_max,
            Violation::Ok | Violation::Uninitialized => return,
        };
        *counter += 1;
    }

    /// Add another set of counters into this one.
    pub fn merge(&mut self, other: &OligoStats) {
        self.considered += other.considered;
        self.ns += other.ns;
        self.target += other.target;
        self.excluded += other.excluded;
        self.gc += other.gc;
        self.gc_clamp += other.gc_clamp;
        self.gc_end_high += other.gc_end_high;
        self.temp_min += other.temp_min;
        self.temp_max += other.temp_max;
        self.compl_any += other.compl_any;
        self.compl_end += other.compl_end;
        self.repeat_score += other.repeat_score;
        self.poly_x += other.poly_x;
        self.seq_quality += other.seq_quality;
        self.stability += other.stability;
        self.template_mispriming += other.template_mispriming;
        self.masked += other.masked;
        self.size_min += other.size_min;
        self.size_max += other.size_max;
        self.ok += other.ok;
    }

    /// Warning listing every problem counted, e.g.
    /// `"Left primer is unacceptable: Too short/Tm too low"`.
    pub fn must_use_warning(&self, label: &str) -> Option<String> {
        let problems: Vec<&str> = [
            (self.size_min, "Too short"),
            (self.size_max, "Too long"),
            (self.ns, "Too many Ns"),
            (self.target, "Overlaps Target"),
            (self.excluded, "Overlaps Excluded Region"),
            (self.gc, "Unacceptable GC content"),
            (self.gc_clamp, "No GC clamp"),
            (self.gc_end_high, "Too many GCs at 3' end"),
            (self.temp_min, "Tm too low"),
            (self.temp_max, "Tm too high"),
            (self.compl_any, "High self complementarity"),
            (self.compl_end, "High end self complementarity"),
            (self.repeat_score, "High similarity to mispriming or mishyb library"),
            (self.poly_x, "Long poly-X"),
            (self.seq_quality, "Low sequence quality"),
            (self.stability, "High 3' stability"),
            (self.template_mispriming, "High template mispriming score"),
            (self.masked, "Masked with lowercase letter"),
        ]
        .into_iter()
        .filter(|(count, _)| *count > 0)
        .map(|(_, text)| text)
        .collect();

        if problems.is_empty() {
            return None;
        }
        Some(format!("{} is unacceptable: {}", label, problems.join("/")))
    }
}

/// Pair rejection counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairStats {
    pub considered: usize,
    pub product: usize,
    pub target: usize,
    pub temp_diff: usize,
    pub compl_any: usize,
    pub compl_end: usize,
    pub internal: usize,
    pub repeat_sim: usize,
    pub high_tm: usize,
    pub low_tm: usize,
    pub template_mispriming: usize,
    pub ok: usize,
}

/// An accepted pair, referring into the candidate lists by index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrimerPair {
    pub left: usize,
    pub right: usize,
    pub internal: Option<usize>,
    pub product_size: usize,
    pub product_tm: Option<f64>,
    /// Product Tm minus the lower primer Tm
    pub product_tm_oligo_tm_diff: Option<f64>,
    pub diff_tm: f64,
    pub compl_any: f64,
    pub compl_end: f64,
    /// Self and cross complementarity of both primers, used to break
    /// quality ties
    pub compl_measure: f64,
    pub repeat_sim: f64,
    pub template_mispriming: Option<f64>,
    pub quality: f64,
}
