//! Melting temperature and duplex stability
//!
//! Nearest-neighbor Tm for short oligos (SantaLucia 1998 or Breslauer 1986
//! parameters), a GC-content formula for long sequences such as PCR
//! products, and the ΔG of disruption of a sequence's 3' end.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// Longest sequence for which the nearest-neighbor model is used.
pub const MAX_NN_TM_LENGTH: usize = 36;

/// Number of 3' bases used for end stability.
pub const END_STABILITY_BASES: usize = 5;

/// Nearest-neighbor parameter table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TmMethod {
    /// Breslauer et al. 1986
    Breslauer,
    /// SantaLucia 1998
    SantaLucia,
}

impl Default for TmMethod {
    fn default() -> Self {
        Self::Breslauer
    }
}

impl TmMethod {
    pub fn description(&self) -> &'static str {
        match self {
            Self::Breslauer => "Breslauer et al. 1986",
            Self::SantaLucia => "SantaLucia 1998",
        }
    }
}

/// Salt correction formula
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SaltCorrection {
    /// Schildkraut and Lifson 1965
    Schildkraut,
    /// SantaLucia 1998
    SantaLucia,
    /// Owczarzy et al. 2004
    Owczarzy,
}

impl Default for SaltCorrection {
    fn default() -> Self {
        Self::Schildkraut
    }
}

impl SaltCorrection {
    pub fn description(&self) -> &'static str {
        match self {
            Self::Schildkraut => "Schildkraut and Lifson 1965",
            Self::SantaLucia => "SantaLucia 1998",
            Self::Owczarzy => "Owczarzy et al. 2004",
        }
    }
}

/// Reaction conditions for Tm calculation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThermoParams {
    /// Monovalent cation concentration (mM)
    pub salt_conc: f64,
    /// Divalent cation concentration (mM)
    pub divalent_conc: f64,
    /// dNTP concentration (mM)
    pub dntp_conc: f64,
    /// Annealing oligo concentration (nM)
    pub dna_conc: f64,
    pub tm_method: TmMethod,
    pub salt_correction: SaltCorrection,
}

impl Default for ThermoParams {
    fn default() -> Self {
        Self {
            salt_conc: 50.0,
            divalent_conc: 0.0,
            dntp_conc: 0.0,
            dna_conc: 50.0,
            tm_method: TmMethod::Breslauer,
            salt_correction: SaltCorrection::Schildkraut,
        }
    }
}

impl ThermoParams {
    /// Monovalent concentration with divalent cations converted
    /// (free Mg2+ after dNTP chelation, 120 * sqrt([Mg2+] - [dNTP])).
    pub fn effective_monovalent(&self) -> f64 {
        if self.divalent_conc > self.dntp_conc {
            self.salt_conc + 120.0 * (self.divalent_conc - self.dntp_conc).sqrt()
        } else {
            self.salt_conc
        }
    }
}

/// Thermodynamic service used by the scorers.
///
/// Implementations return `None` when a value cannot be computed (too
/// short, or a base outside A/C/G/T/N).
pub trait MeltingOracle: Send + Sync {
    /// Tm of an oligo in °C.
    fn melting_temperature(&self, seq: &[u8], params: &ThermoParams) -> Option<f64>;

    /// Tm of a long duplex such as a PCR product, in °C.
    fn product_temperature(&self, seq: &[u8], params: &ThermoParams) -> Option<f64>;

    /// ΔG of disruption (kcal/mol) of the last five bases.
    fn end_stability(&self, seq: &[u8], params: &ThermoParams) -> Option<f64>;
}

/// Default oracle built on the nearest-neighbor tables below.
#[derive(Debug, Clone, Copy, Default)]
pub struct NearestNeighborTm;

impl MeltingOracle for NearestNeighborTm {
    fn melting_temperature(&self, seq: &[u8], params: &ThermoParams) -> Option<f64> {
        seq_tm(seq, params)
    }

    fn product_temperature(&self, seq: &[u8], params: &ThermoParams) -> Option<f64> {
        long_seq_tm(seq, params.effective_monovalent())
    }

    fn end_stability(&self, seq: &[u8], params: &ThermoParams) -> Option<f64> {
        end_oligo_dg(seq, END_STABILITY_BASES, params.tm_method)
    }
}

/// Dinucleotide parameters indexed [first][second] in A, C, G, T, N order.
struct NeighborTable {
    /// Entropy, 0.1 cal/K/mol
    ds: [[i32; 5]; 5],
    /// Enthalpy, 100 cal/mol
    dh: [[i32; 5]; 5],
    /// Free energy of disruption, cal/mol
    dg: [[i32; 5]; 5],
}

static BRESLAUER: Lazy<NeighborTable> = Lazy::new(|| NeighborTable {
    ds: [
        [240, 173, 208, 239, 215],
        [129, 266, 278, 208, 220],
        [135, 267, 266, 173, 210],
        [169, 135, 129, 240, 168],
        [168, 210, 220, 215, 203],
    ],
    dh: [
        [91, 65, 78, 86, 80],
        [58, 110, 119, 78, 91],
        [56, 111, 110, 65, 85],
        [60, 56, 58, 91, 66],
        [66, 85, 91, 80, 80],
    ],
    dg: [
        [1900, 1300, 1600, 1500, 1575],
        [1900, 3100, 3600, 1600, 2550],
        [1600, 3100, 3100, 1300, 2275],
        [900, 1600, 1900, 1900, 1575],
        [1575, 2275, 2550, 1575, 1994],
    ],
});

static SANTALUCIA: Lazy<NeighborTable> = Lazy::new(|| NeighborTable {
    ds: [
        [222, 224, 210, 204, 224],
        [227, 199, 272, 210, 272],
        [222, 244, 199, 224, 244],
        [213, 222, 227, 222, 227],
        [168, 210, 220, 215, 220],
    ],
    dh: [
        [79, 84, 78, 72, 72],
        [85, 80, 106, 78, 78],
        [82, 98, 80, 84, 80],
        [72, 82, 85, 79, 72],
        [72, 80, 78, 72, 72],
    ],
    dg: [
        [1000, 1440, 1280, 880, 880],
        [1450, 1840, 2170, 1280, 1450],
        [1300, 2240, 1840, 1440, 1300],
        [580, 1300, 1450, 1000, 580],
        [580, 1300, 1280, 880, 580],
    ],
});

fn table(method: TmMethod) -> &'static NeighborTable {
    match method {
        TmMethod::Breslauer => &BRESLAUER,
        TmMethod::SantaLucia => &SANTALUCIA,
    }
}

#[inline]
fn nn_index(b: u8) -> Option<usize> {
    match b.to_ascii_uppercase() {
        b'A' => Some(0),
        b'C' => Some(1),
        b'G' => Some(2),
        b'T' => Some(3),
        b'N' => Some(4),
        _ => None,
    }
}

/// Sum a dinucleotide table over all neighbors.
fn neighbor_sum(seq: &[u8], values: &[[i32; 5]; 5]) -> Option<i32> {
    if seq.len() < 2 {
        return None;
    }
    let mut total = 0;
    for pair in seq.windows(2) {
        total += values[nn_index(pair[0])?][nn_index(pair[1])?];
    }
    Some(total)
}

#[inline]
fn is_weak(b: u8) -> bool {
    matches!(b.to_ascii_uppercase(), b'A' | b'T')
}

#[inline]
fn is_strong(b: u8) -> bool {
    matches!(b.to_ascii_uppercase(), b'C' | b'G')
}

/// True when the sequence equals its own reverse complement over A/C/G/T.
pub fn is_self_complementary(seq: &[u8]) -> bool {
    if seq.len() % 2 == 1 {
        return false;
    }
    let n = seq.len();
    (0..n / 2).all(|i| {
        let s = seq[i].to_ascii_uppercase();
        let e = seq[n - 1 - i].to_ascii_uppercase();
        matches!((s, e), (b'A', b'T') | (b'T', b'A') | (b'C', b'G') | (b'G', b'C'))
    })
}

/// Nearest-neighbor Tm of an oligo.
pub fn oligo_tm(seq: &[u8], params: &ThermoParams) -> Option<f64> {
    let nn = table(params.tm_method);
    let symmetric = is_self_complementary(seq);

    let mut ds = neighbor_sum(seq, &nn.ds)?;
    let mut dh = neighbor_sum(seq, &nn.dh)?;

    match params.tm_method {
        TmMethod::Breslauer => ds += 108,
        TmMethod::SantaLucia => {
            if symmetric {
                ds += 14;
            }
            for end in [seq[0], seq[seq.len() - 1]] {
                if is_weak(end) {
                    ds -= 41;
                    dh -= 23;
                } else if is_strong(end) {
                    ds += 28;
                    dh -= 1;
                }
            }
        }
    }

    let delta_h = dh as f64 * -100.0;
    let mut delta_s = ds as f64 * -0.1;
    let len = seq.len() as f64;
    let salt = params.effective_monovalent();
    let strands = if symmetric { 1.0e9 } else { 4.0e9 };

    let tm = match params.salt_correction {
        SaltCorrection::Schildkraut => {
            delta_h / (delta_s + 1.987 * (params.dna_conc / 4.0e9).ln()) - 273.15
                + 16.6 * (salt / 1000.0).log10()
        }
        SaltCorrection::SantaLucia => {
            delta_s += 0.368 * (len - 1.0) * (salt / 1000.0).ln();
            delta_h / (delta_s + 1.987 * (params.dna_conc / strands).ln()) - 273.15
        }
        SaltCorrection::Owczarzy => {
            let gc = seq.iter().filter(|&&b| is_strong(b)).count() as f64 / len;
            let ln_salt = (salt / 1000.0).ln();
            let correction =
                (4.29 * gc - 3.95) * 1e-5 * ln_salt + 9.40e-6 * ln_salt * ln_salt;
            let uncorrected = delta_h / (delta_s + 1.9872 * (params.dna_conc / strands).ln());
            1.0 / (1.0 / uncorrected + correction) - 273.15
        }
    };
    Some(tm)
}

/// ΔG of disruption of the whole sequence, in kcal/mol.
pub fn oligo_dg(seq: &[u8], method: TmMethod) -> Option<f64> {
    let nn = table(method);
    let mut dg = neighbor_sum(seq, &nn.dg)?;
    if method == TmMethod::SantaLucia {
        dg -= 1960;
        if is_weak(seq[0]) {
            dg -= 50;
        }
        if is_weak(seq[seq.len() - 1]) {
            dg -= 50;
        }
        if is_self_complementary(seq) {
            dg -= 430;
        }
    }
    Some(dg as f64 / 1000.0)
}

/// ΔG of the last `len` bases (or the whole sequence if shorter).
pub fn end_oligo_dg(seq: &[u8], len: usize, method: TmMethod) -> Option<f64> {
    let tail = &seq[seq.len().saturating_sub(len)..];
    oligo_dg(tail, method)
}

/// GC-content Tm estimate for long sequences.
pub fn long_seq_tm(seq: &[u8], salt_conc: f64) -> Option<f64> {
    if seq.is_empty() {
        return None;
    }
    let len = seq.len() as f64;
    let gc = seq.iter().filter(|&&b| is_strong(b)).count() as f64;
    Some(81.5 + 16.6 * (salt_conc / 1000.0).log10() + 41.0 * (gc / len) - 600.0 / len)
}

/// Tm of an oligo, switching to the long-sequence formula past
/// [`MAX_NN_TM_LENGTH`].
pub fn seq_tm(seq: &[u8], params: &ThermoParams) -> Option<f64> {
    if seq.len() > MAX_NN_TM_LENGTH {
        long_seq_tm(seq, params.effective_monovalent())
    } else {
        oligo_tm(seq, params)
    }
}
