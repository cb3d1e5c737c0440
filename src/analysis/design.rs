//! Design driver
//!
//! Validates a request, builds the candidate lists and, when both primers
//! are picked, searches for the best pairs.

use serde::{Deserialize, Serialize};

use super::dpal::AlignerSet;
use super::error::DesignError;
use super::generator::{CandidateGenerator, CandidateList, Candidates};
use super::library::RepeatLibraries;
use super::pair::{run_lazy_check, LazyCheck};
use super::scorer::OligoScorer;
use super::selector::select_pairs;
use super::tm::{MeltingOracle, NearestNeighborTm};
use super::types::{DesignInput, OligoCandidate, PairStats, PrimerConfig, PrimerPair};

/// Everything a design run produces
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesignResult {
    pub left: CandidateList,
    pub right: CandidateList,
    pub internal: CandidateList,
    /// Best first; indices refer into the lists above
    pub pairs: Vec<PrimerPair>,
    pub pair_stats: PairStats,
    pub warnings: Vec<String>,
}

impl DesignResult {
    pub fn left_oligo(&self, pair: &PrimerPair) -> &OligoCandidate {
        &self.left.oligos[pair.left]
    }

    pub fn right_oligo(&self, pair: &PrimerPair) -> &OligoCandidate {
        &self.right.oligos[pair.right]
    }

    pub fn internal_oligo(&self, pair: &PrimerPair) -> Option<&OligoCandidate> {
        pair.internal.map(|m| &self.internal.oligos[m])
    }

    pub fn to_json(&self) -> Result<String, DesignError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Design with the built-in Tm model and no repeat libraries.
pub fn design(input: &DesignInput, config: &PrimerConfig) -> Result<DesignResult, DesignError> {
    design_with(input, config, &NearestNeighborTm, &RepeatLibraries::default())
}

pub fn design_with(
    input: &DesignInput,
    config: &PrimerConfig,
    oracle: &dyn MeltingOracle,
    libraries: &RepeatLibraries,
) -> Result<DesignResult, DesignError> {
    config.validate()?;
    let mut warnings = library_warnings(libraries);
    warnings.extend(input.validate(config)?);

    let aligners = AlignerSet::new();
    let scorer = OligoScorer::new(input, config, oracle, libraries, &aligners);
    let mut candidates = CandidateGenerator::new().generate(&scorer)?;
    warnings.append(&mut candidates.warnings);

    let (pairs, pair_stats) = if config.is_pair_mode() {
        let selection = select_pairs(&scorer, &mut candidates)?;
        (selection.pairs.into_vec(), selection.stats)
    } else {
        finish_single_lists(&scorer, &mut candidates, &mut warnings)?;
        (Vec::new(), PairStats::default())
    };

    log::info!(
        "Selected {} pairs from {} left, {} right and {} internal candidates",
        pairs.len(),
        candidates.left.len(),
        candidates.right.len(),
        candidates.internal.len()
    );

    let Candidates {
        left,
        right,
        internal,
        ..
    } = candidates;
    Ok(DesignResult {
        left,
        right,
        internal,
        pairs,
        pair_stats,
        warnings,
    })
}

fn library_warnings(libraries: &RepeatLibraries) -> Vec<String> {
    let mut warnings = Vec::new();
    if let Some(w) = &libraries.mispriming.warning {
        warnings.push(w.clone());
    }
    if let Some(w) = &libraries.mishyb.warning {
        warnings.push(format!("{} (for internal oligo)", w));
    }
    warnings
}

/// Without pairing, the deferred checks run on every listed oligo and the
/// ones that fail are dropped.
fn finish_single_lists(
    scorer: &OligoScorer<'_>,
    candidates: &mut Candidates,
    warnings: &mut Vec<String>,
) -> Result<(), DesignError> {
    let needs_template = scorer.config().needs_template_mispriming();
    for list in [&mut candidates.left, &mut candidates.right, &mut candidates.internal] {
        if list.is_empty() {
            continue;
        }
        for i in 0..list.len() {
            let mut usable = run_lazy_check(scorer, list, i, LazyCheck::SelfComplementarity)?
                && run_lazy_check(scorer, list, i, LazyCheck::RepeatSimilarity)?;
            if usable && needs_template && list.kind.is_primer() {
                usable = run_lazy_check(scorer, list, i, LazyCheck::TemplateMispriming)?;
            }
            log::trace!("{} {} usable: {}", list.kind.description(), list.oligos[i].start, usable);
        }
        list.oligos.retain(OligoCandidate::is_ok_or_must_use);
        list.stats.ok = list.oligos.iter().filter(|c| c.is_ok()).count();
        if list.is_empty() {
            let w = format!("No {} found", list.kind.description());
            log::warn!("{}", w);
            warnings.push(w);
        }
    }
    Ok(())
}
