//! Repeat libraries for mispriming and mishybridization checks

use std::io::Read;

use bio::io::fasta;
use serde::{Deserialize, Serialize};

use super::error::DesignError;
use super::iupac::{normalize_dna, reverse_complement};
use super::types::OligoKind;

/// Largest weight accepted in a FASTA header.
pub const MAX_LIBRARY_WEIGHT: f64 = 100.0;

/// Prefix given to the names of generated reverse-complement entries.
pub const REVERSE_PREFIX: &str = "reverse ";

/// A single library sequence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LibraryEntry {
    pub name: String,
    pub sequence: Vec<u8>,
    /// Multiplier applied to alignment scores against this entry
    pub weight: f64,
    pub reverse_complement: Vec<u8>,
}

impl LibraryEntry {
    pub fn new(name: impl Into<String>, sequence: &[u8], weight: f64) -> Self {
        let (sequence, _) = normalize_dna(sequence);
        let reverse_complement = reverse_complement(&sequence);
        Self {
            name: name.into(),
            sequence,
            weight,
            reverse_complement,
        }
    }
}

/// Ordered collection of library entries
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RepeatLibrary {
    entries: Vec<LibraryEntry>,
    /// Set when a sequence contained characters that were replaced by N
    pub warning: Option<String>,
}

impl RepeatLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: LibraryEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[LibraryEntry] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = &LibraryEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Append a reverse-complement entry for every current entry, named
    /// `"reverse <name>"` with the same weight.
    pub fn with_reverse_entries(mut self) -> Self {
        let reversed: Vec<LibraryEntry> = self
            .entries
            .iter()
            .map(|e| LibraryEntry {
                name: format!("{}{}", REVERSE_PREFIX, e.name),
                sequence: e.reverse_complement.clone(),
                weight: e.weight,
                reverse_complement: e.sequence.clone(),
            })
            .collect();
        self.entries.extend(reversed);
        self
    }

    /// Read a library from FASTA.
    ///
    /// A header may carry a weight after `*` (`>AluY*2.5`); headers
    /// without one get weight 1. Sequences are upper-cased, whitespace is
    /// dropped and unrecognized characters become N. The result includes
    /// the reverse-complement entries.
    pub fn from_fasta<R: Read>(reader: R) -> Result<Self, DesignError> {
        let mut library = Self::new();
        let mut offender = None;

        for record in fasta::Reader::new(reader).records() {
            let record = record.map_err(|e| DesignError::Library(e.to_string()))?;
            let name = match record.desc() {
                Some(desc) => format!("{} {}", record.id(), desc),
                None => record.id().to_string(),
            };
            let weight = parse_weight(&name)
                .ok_or_else(|| DesignError::Library(format!("illegal weight in entry {}", name)))?;

            let raw: Vec<u8> = record
                .seq()
                .iter()
                .copied()
                .filter(|b| !b.is_ascii_whitespace())
                .collect();
            if raw.is_empty() {
                return Err(DesignError::Library(format!("empty sequence in entry {}", name)));
            }
            let (sequence, bad) = normalize_dna(&raw);
            if offender.is_none() {
                offender = bad;
            }

            library.push(LibraryEntry {
                reverse_complement: reverse_complement(&sequence),
                name,
                sequence,
                weight,
            });
        }

        if library.is_empty() {
            return Err(DesignError::Library("empty library".to_string()));
        }
        if let Some(c) = offender {
            let msg = format!("unrecognized character ({}) in repeat library", c as char);
            log::warn!("{}", msg);
            library.warning = Some(msg);
        }
        log::debug!("Loaded repeat library with {} entries", library.len());
        Ok(library.with_reverse_entries())
    }

    pub fn from_fasta_str(text: &str) -> Result<Self, DesignError> {
        Self::from_fasta(text.as_bytes())
    }
}

/// Libraries checked against primers (mispriming) and internal oligos
/// (mishybridization). Empty libraries disable the check.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RepeatLibraries {
    pub mispriming: RepeatLibrary,
    pub mishyb: RepeatLibrary,
}

impl RepeatLibraries {
    pub fn new(mispriming: RepeatLibrary, mishyb: RepeatLibrary) -> Self {
        Self { mispriming, mishyb }
    }

    pub fn for_kind(&self, kind: OligoKind) -> &RepeatLibrary {
        match kind {
            OligoKind::Internal => &self.mishyb,
            OligoKind::Left | OligoKind::Right => &self.mispriming,
        }
    }
}

/// Weight encoded in an entry name after `*`.
///
/// Returns 1 when there is no `*`, and `None` when the text after it does
/// not start with a number or the number exceeds [`MAX_LIBRARY_WEIGHT`].
pub fn parse_weight(name: &str) -> Option<f64> {
    let Some((_, rest)) = name.split_once('*') else {
        return Some(1.0);
    };
    let rest = rest.trim_start();
    let candidate: String = rest
        .chars()
        .take_while(|c| c.is_ascii_digit() || matches!(c, '.' | '+' | '-' | 'e' | 'E'))
        .collect();
    // Longest numeric prefix, as a C-style parse would take.
    let weight = (1..=candidate.len())
        .rev()
        .find_map(|n| candidate[..n].parse::<f64>().ok())?;
    if weight > MAX_LIBRARY_WEIGHT {
        return None;
    }
    Some(weight)
}
