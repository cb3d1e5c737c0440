//! Dynamic-programming alignment of short oligos
//!
//! Scores (and optionally reconstructs) the best alignment of two byte
//! strings under one of four modes. Gaps are modelled as skips of up to
//! `max_gap` characters between two aligned pairs; a skip of `k - 1`
//! characters costs `gap + gap_extend * (k - 2)`. Scores are integers in
//! hundredths so that comparisons never involve floating point.
//!
//! Two strategies are used internally: a full score table with
//! predecessor pointers (needed for path reconstruction) and a rolling
//! window of `max_gap + 2` rows that keeps memory linear in the length of
//! the second sequence. Both share the same cell recurrence and tie
//! policy, so they report identical scores and end coordinates.

use std::fmt;
use std::sync::Arc;

use bio::alignment::{Alignment, AlignmentMode, AlignmentOperation};
use serde::{Deserialize, Serialize};

use super::error::AlignError;
use super::iupac::{concrete_bases, AMBIGUITY_CODES, STANDARD_BASES};

/// Largest sequence length for which a path can be reconstructed.
pub const MAX_PATH_ALIGN: usize = 1600;

/// Score used for illegal pairs.
pub const ILLEGAL_SCORE: i32 = i32::MIN;

/// Where an alignment may start and end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AlignMode {
    /// Best local alignment anywhere in the table.
    Local,
    /// Ends in the last row or the last column.
    Global,
    /// Ends on the last character of the first sequence, no restarts.
    GlobalEnd,
    /// Ends on the last character of the first sequence, with restarts.
    LocalEnd,
}

impl Default for AlignMode {
    fn default() -> Self {
        Self::Local
    }
}

impl AlignMode {
    pub fn description(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Global => "global",
            Self::GlobalEnd => "global, anchored at the 3' end of the first sequence",
            Self::LocalEnd => "local, anchored at the 3' end of the first sequence",
        }
    }

    /// Whether cell scores are clamped at zero.
    #[inline]
    pub fn is_local(&self) -> bool {
        matches!(self, Self::Local | Self::LocalEnd)
    }

    #[inline]
    fn may_end_at(&self, i: usize, j: usize, xlen: usize, ylen: usize) -> bool {
        match self {
            Self::Local => true,
            Self::GlobalEnd | Self::LocalEnd => i == xlen - 1,
            Self::Global => i == xlen - 1 || j == ylen - 1,
        }
    }
}

/// Substitution scores for every pair of bytes.
#[derive(Clone, PartialEq, Eq)]
pub struct ScoringMatrix {
    scores: Vec<i32>,
}

impl fmt::Debug for ScoringMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let legal: String = (0u8..=255)
            .filter(|&c| self.is_legal(c))
            .map(char::from)
            .collect();
        f.debug_struct("ScoringMatrix").field("legal", &legal).finish()
    }
}

impl ScoringMatrix {
    /// A matrix where every pair is illegal.
    pub fn illegal() -> Self {
        Self {
            scores: vec![ILLEGAL_SCORE; 256 * 256],
        }
    }

    /// Default DNA matrix: match 100, mismatch -100, N against anything -25.
    pub fn nucleotide() -> Self {
        Self::from_bases(|a, b| {
            if a == b'N' || b == b'N' {
                -25
            } else if a == b {
                100
            } else {
                -100
            }
        })
    }

    /// Hybridization matrix: CC/GG 300, AA/TT 200, everything else -50.
    pub fn hybridization() -> Self {
        Self::from_bases(|a, b| match (a, b) {
            (b'C', b'C') | (b'G', b'G') => 300,
            (b'A', b'A') | (b'T', b'T') => 200,
            _ => -50,
        })
    }

    fn from_bases(score: impl Fn(u8, u8) -> i32) -> Self {
        let mut matrix = Self::illegal();
        let alphabet = b"ACGTN";
        for &a in alphabet {
            for &b in alphabet {
                matrix.set(a, b, score(a, b));
            }
        }
        matrix
    }

    /// Score every ambiguity code pair (and code/base pair) as the best
    /// score over the concrete bases each side represents.
    pub fn with_ambiguity_codes(mut self) -> Self {
        for &c1 in &AMBIGUITY_CODES {
            let bases1 = concrete_bases(c1);
            for &c2 in &AMBIGUITY_CODES {
                let bases2 = concrete_bases(c2);
                let best = bases1
                    .iter()
                    .flat_map(|&b1| bases2.iter().map(move |&b2| (b1, b2)))
                    .map(|(b1, b2)| self.score(b1, b2))
                    .max()
                    .unwrap_or(ILLEGAL_SCORE);
                self.set(c1, c2, best);
            }
            for &b2 in &STANDARD_BASES {
                let best = bases1
                    .iter()
                    .map(|&b1| self.score(b1, b2))
                    .max()
                    .unwrap_or(ILLEGAL_SCORE);
                self.set(c1, b2, best);
                self.set(b2, c1, best);
            }
        }
        self
    }

    #[inline]
    pub fn score(&self, a: u8, b: u8) -> i32 {
        self.scores[(a as usize) << 8 | b as usize]
    }

    pub fn set(&mut self, a: u8, b: u8, score: i32) {
        self.scores[(a as usize) << 8 | b as usize] = score;
    }

    /// A byte is legal when its self-score is finite.
    #[inline]
    pub fn is_legal(&self, c: u8) -> bool {
        self.score(c, c) != ILLEGAL_SCORE
    }

    fn first_illegal(&self, seq: &[u8]) -> Option<u8> {
        seq.iter().copied().find(|&c| !self.is_legal(c))
    }
}

impl Default for ScoringMatrix {
    fn default() -> Self {
        Self::nucleotide()
    }
}

/// Parameters of one alignment request.
#[derive(Debug, Clone)]
pub struct AlignArgs {
    pub mode: AlignMode,
    /// Cost of the first skipped character (negative).
    pub gap: i32,
    /// Cost of every further skipped character (negative).
    pub gap_extend: i32,
    /// Longest gap; 0 disables gaps, negative means unbounded.
    pub max_gap: i32,
    /// Reject sequences containing bytes without a finite self-score.
    pub check_chars: bool,
    /// Reconstruct the aligned pairs.
    pub want_path: bool,
    pub matrix: Arc<ScoringMatrix>,
}

impl AlignArgs {
    /// Score-only settings used for oligo complementarity checks.
    pub fn primer(mode: AlignMode, matrix: Arc<ScoringMatrix>) -> Self {
        Self {
            mode,
            gap: -200,
            gap_extend: -200,
            max_gap: 1,
            check_chars: false,
            want_path: false,
            matrix,
        }
    }

    /// General nucleotide settings with path reconstruction.
    pub fn nucleotide() -> Self {
        Self {
            mode: AlignMode::Local,
            gap: -100,
            gap_extend: -100,
            max_gap: 3,
            check_chars: true,
            want_path: true,
            matrix: Arc::new(ScoringMatrix::nucleotide()),
        }
    }

    pub fn with_mode(mut self, mode: AlignMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_max_gap(mut self, max_gap: i32) -> Self {
        self.max_gap = max_gap;
        self
    }

    pub fn with_path(mut self, want_path: bool) -> Self {
        self.want_path = want_path;
        self
    }
}

impl Default for AlignArgs {
    fn default() -> Self {
        Self::nucleotide()
    }
}

/// Outcome of a successful call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlignStatus {
    Ok,
    /// One of the sequences was empty; the score is 0.
    EmptyInput,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlignResult {
    /// Score in hundredths.
    pub score: i32,
    /// Last aligned position in the first sequence.
    pub end_a: Option<usize>,
    /// Last aligned position in the second sequence.
    pub end_b: Option<usize>,
    /// Aligned index pairs, first pair first.
    pub path: Option<Vec<(usize, usize)>>,
    pub status: AlignStatus,
}

impl AlignResult {
    fn empty() -> Self {
        Self {
            score: 0,
            end_a: None,
            end_b: None,
            path: None,
            status: AlignStatus::EmptyInput,
        }
    }

    fn no_alignment() -> Self {
        Self {
            score: 0,
            end_a: None,
            end_b: None,
            path: None,
            status: AlignStatus::Ok,
        }
    }

    /// Score in units (score / 100).
    pub fn units(&self) -> f64 {
        self.score as f64 / 100.0
    }

    /// Express the path as a `bio` alignment of `a` (x) against `b` (y).
    /// Returns `None` when no path was recorded.
    pub fn to_bio_alignment(&self, a: &[u8], b: &[u8], mode: AlignMode) -> Option<Alignment> {
        let path = self.path.as_ref()?;
        let (&(xstart, ystart), &(xlast, ylast)) = (path.first()?, path.last()?);

        let mut operations = Vec::with_capacity(path.len() * 2);
        let mut prev: Option<(usize, usize)> = None;
        for &(i, j) in path {
            if let Some((pi, pj)) = prev {
                operations.extend(std::iter::repeat(AlignmentOperation::Ins).take(i - pi - 1));
                operations.extend(std::iter::repeat(AlignmentOperation::Del).take(j - pj - 1));
            }
            if a[i].eq_ignore_ascii_case(&b[j]) {
                operations.push(AlignmentOperation::Match);
            } else {
                operations.push(AlignmentOperation::Subst);
            }
            prev = Some((i, j));
        }

        Some(Alignment {
            score: self.score,
            xstart,
            ystart,
            xend: xlast + 1,
            yend: ylast + 1,
            xlen: a.len(),
            ylen: b.len(),
            operations,
            mode: if mode.is_local() {
                AlignmentMode::Local
            } else {
                AlignmentMode::Custom
            },
        })
    }
}

/// Memory strategy chosen from the shape of the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TableStrategy {
    FullTable,
    Rolling { rows: usize },
    /// Unbounded gaps, score only: running gap maxima per column
    Unbounded,
}

fn choose_strategy(args: &AlignArgs, xlen: usize, ylen: usize) -> TableStrategy {
    if args.want_path {
        return TableStrategy::FullTable;
    }
    if args.max_gap < 0 {
        return TableStrategy::Unbounded;
    }
    let long = xlen >= MAX_PATH_ALIGN || ylen >= MAX_PATH_ALIGN;
    if args.max_gap == 1 || long {
        TableStrategy::Rolling {
            rows: args.max_gap as usize + 2,
        }
    } else {
        TableStrategy::FullTable
    }
}

/// Align `a` against `b`.
///
/// Empty input is not an error: it yields score 0 with
/// [`AlignStatus::EmptyInput`].
pub fn align(a: &[u8], b: &[u8], args: &AlignArgs) -> Result<AlignResult, AlignError> {
    if args.check_chars {
        if let Some(c) = args
            .matrix
            .first_illegal(a)
            .or_else(|| args.matrix.first_illegal(b))
        {
            return Err(AlignError::IllegalCharacter(c as char));
        }
    }
    if a.is_empty() || b.is_empty() {
        return Ok(AlignResult::empty());
    }
    if args.want_path && (a.len() > MAX_PATH_ALIGN || b.len() > MAX_PATH_ALIGN) {
        return Err(AlignError::SequenceTooLong {
            len: a.len().max(b.len()),
            max: MAX_PATH_ALIGN,
        });
    }

    check_gap_penalties(args, a.len(), b.len())?;

    let result = match choose_strategy(args, a.len(), b.len()) {
        TableStrategy::FullTable => full_table(a, b, args),
        TableStrategy::Rolling { rows } => rolling(a, b, args, rows),
        TableStrategy::Unbounded => unbounded(a, b, args),
    };

    if result.score > i16::MAX as i32 || result.score < i16::MIN as i32 {
        return Err(AlignError::ScoreOverflow(result.score));
    }
    Ok(result)
}

/// The longest gap the request can open must have a representable cost;
/// every shorter gap then does too.
fn check_gap_penalties(args: &AlignArgs, xlen: usize, ylen: usize) -> Result<(), AlignError> {
    let longest = xlen.max(ylen);
    let reach = if args.max_gap < 0 {
        longest
    } else {
        longest.min(args.max_gap as usize + 1)
    };
    if reach < 2 {
        return Ok(());
    }
    let overflow = AlignError::GapPenaltyOverflow {
        gap: args.gap,
        gap_extend: args.gap_extend,
        length: reach,
    };
    let steps = i32::try_from(reach - 2).map_err(|_| overflow.clone())?;
    args.gap_extend
        .checked_mul(steps)
        .and_then(|extension| args.gap.checked_add(extension))
        .map(|_| ())
        .ok_or(overflow)
}

/// Running optimum and its cell.
struct Best {
    score: i32,
    i: usize,
    j: usize,
}

/// Seed the optimum from row 0 and column 0, in the order the full table
/// fills them. `first_col(i)` and `first_row(j)` return the stored
/// (possibly clamped) scores.
fn seed_best(
    mode: AlignMode,
    xlen: usize,
    ylen: usize,
    first_col: impl Fn(usize) -> i32,
    first_row: impl Fn(usize) -> i32,
) -> Best {
    let mut best = Best {
        score: ILLEGAL_SCORE,
        i: 0,
        j: 0,
    };
    if mode == AlignMode::Local {
        for i in 0..xlen {
            let s = first_col(i);
            if s > best.score {
                best = Best { score: s, i, j: 0 };
            }
        }
        for j in 0..ylen {
            let s = first_row(j);
            if s > best.score {
                best = Best { score: s, i: 0, j };
            }
        }
    } else {
        best = Best {
            score: first_col(xlen - 1),
            i: xlen - 1,
            j: 0,
        };
        if mode == AlignMode::Global && first_row(ylen - 1) > best.score {
            best = Best {
                score: first_row(ylen - 1),
                i: 0,
                j: ylen - 1,
            };
        }
    }
    best
}

#[inline]
fn edge_score(args: &AlignArgs, x: u8, y: u8) -> i32 {
    let s = args.matrix.score(x, y);
    if args.mode.is_local() {
        s.max(0)
    } else {
        s
    }
}

/// Best predecessor of cell (i, j), i >= 1 and j >= 1.
///
/// Ties go to the diagonal, then the vertical gap (skipping characters of
/// the first sequence), then the horizontal gap.
#[inline]
fn best_predecessor(
    get: impl Fn(usize, usize) -> i32,
    i: usize,
    j: usize,
    args: &AlignArgs,
) -> (i32, usize, usize) {
    let diag = get(i - 1, j - 1);

    let reach = |n: usize| {
        if args.max_gap < 0 {
            n
        } else {
            n.min(args.max_gap as usize + 1)
        }
    };

    let mut vert = ILLEGAL_SCORE;
    let mut vert_i = 0;
    for k in 2..=reach(i) {
        let c = get(i - k, j - 1).saturating_add(args.gap + args.gap_extend * (k as i32 - 2));
        if c > vert {
            vert = c;
            vert_i = i - k;
        }
    }

    let mut horiz = ILLEGAL_SCORE;
    let mut horiz_j = 0;
    for k in 2..=reach(j) {
        let c = get(i - 1, j - k).saturating_add(args.gap + args.gap_extend * (k as i32 - 2));
        if c > horiz {
            horiz = c;
            horiz_j = j - k;
        }
    }

    if diag >= vert && diag >= horiz {
        (diag, i - 1, j - 1)
    } else if vert > diag && vert >= horiz {
        (vert, vert_i, j - 1)
    } else {
        (horiz, i - 1, horiz_j)
    }
}

fn full_table(x: &[u8], y: &[u8], args: &AlignArgs) -> AlignResult {
    let (xlen, ylen) = (x.len(), y.len());
    let mode = args.mode;
    let idx = |i: usize, j: usize| i * ylen + j;

    let mut s = vec![0i32; xlen * ylen];
    let mut pred = if args.want_path {
        vec![(0usize, 0usize); xlen * ylen]
    } else {
        Vec::new()
    };

    for i in 0..xlen {
        s[idx(i, 0)] = edge_score(args, x[i], y[0]);
    }
    for j in 0..ylen {
        s[idx(0, j)] = edge_score(args, x[0], y[j]);
    }
    let mut best = seed_best(mode, xlen, ylen, |i| s[idx(i, 0)], |j| s[idx(0, j)]);

    for i in 1..xlen {
        for j in 1..ylen {
            let (prev, pi, pj) = best_predecessor(|r, c| s[idx(r, c)], i, j, args);
            let mut score = prev.saturating_add(args.matrix.score(x[i], y[j]));
            if args.want_path {
                pred[idx(i, j)] = (pi, pj);
            }
            if score >= best.score && mode.may_end_at(i, j, xlen, ylen) {
                best = Best { score, i, j };
            }
            if mode.is_local() && score < 0 {
                score = 0;
            }
            s[idx(i, j)] = score;
        }
    }

    if mode.is_local() && s[idx(best.i, best.j)] <= 0 {
        return AlignResult::no_alignment();
    }

    let path = if args.want_path {
        let mut rev = vec![(best.i, best.j)];
        let (mut i, mut j) = (best.i, best.j);
        while i != 0 && j != 0 {
            if mode.is_local() && s[idx(i, j)] == 0 {
                rev.pop();
                break;
            }
            let (pi, pj) = pred[idx(i, j)];
            rev.push((pi, pj));
            i = pi;
            j = pj;
        }
        rev.reverse();
        Some(rev)
    } else {
        None
    };

    AlignResult {
        score: best.score,
        end_a: Some(best.i),
        end_b: Some(best.j),
        path,
        status: AlignStatus::Ok,
    }
}

/// Score-only alignment keeping the last `rows` rows of the table.
fn rolling(x: &[u8], y: &[u8], args: &AlignArgs, rows: usize) -> AlignResult {
    let (xlen, ylen) = (x.len(), y.len());
    let mode = args.mode;
    let rows = rows.max(2);
    let mut ring = vec![vec![0i32; ylen]; rows];

    let mut best = seed_best(
        mode,
        xlen,
        ylen,
        |i| edge_score(args, x[i], y[0]),
        |j| edge_score(args, x[0], y[j]),
    );

    for j in 0..ylen {
        ring[0][j] = edge_score(args, x[0], y[j]);
    }

    for i in 1..xlen {
        let mut cur = std::mem::take(&mut ring[i % rows]);
        cur[0] = edge_score(args, x[i], y[0]);
        for j in 1..ylen {
            let (prev, _, _) = best_predecessor(|r, c| ring[r % rows][c], i, j, args);
            let mut score = prev.saturating_add(args.matrix.score(x[i], y[j]));
            if score >= best.score && mode.may_end_at(i, j, xlen, ylen) {
                best = Best { score, i, j };
            }
            if mode.is_local() && score < 0 {
                score = 0;
            }
            cur[j] = score;
        }
        ring[i % rows] = cur;
    }

    if mode.is_local() && best.score <= 0 {
        return AlignResult::no_alignment();
    }

    AlignResult {
        score: best.score,
        end_a: Some(best.i),
        end_b: Some(best.j),
        path: None,
        status: AlignStatus::Ok,
    }
}

/// Score-only alignment with unbounded gaps in linear memory.
///
/// The best vertical gap into column `j` is carried down the rows and the
/// best horizontal gap along the row, each growing by one extension per
/// step, so no cell looks further back than two rows.
fn unbounded(x: &[u8], y: &[u8], args: &AlignArgs) -> AlignResult {
    let (xlen, ylen) = (x.len(), y.len());
    let mode = args.mode;

    let mut best = seed_best(
        mode,
        xlen,
        ylen,
        |i| edge_score(args, x[i], y[0]),
        |j| edge_score(args, x[0], y[j]),
    );

    let mut older = vec![ILLEGAL_SCORE; ylen];
    let mut prev: Vec<i32> = y.iter().map(|&b| edge_score(args, x[0], b)).collect();
    let mut vert = vec![ILLEGAL_SCORE; ylen];

    for i in 1..xlen {
        let mut cur = vec![0i32; ylen];
        cur[0] = edge_score(args, x[i], y[0]);
        let mut horiz = ILLEGAL_SCORE;
        for j in 1..ylen {
            if i >= 2 {
                vert[j] = older[j - 1]
                    .saturating_add(args.gap)
                    .max(vert[j].saturating_add(args.gap_extend));
            }
            if j >= 2 {
                horiz = prev[j - 2]
                    .saturating_add(args.gap)
                    .max(horiz.saturating_add(args.gap_extend));
            }
            let prev_best = prev[j - 1].max(vert[j]).max(horiz);
            let mut score = prev_best.saturating_add(args.matrix.score(x[i], y[j]));
            if score >= best.score && mode.may_end_at(i, j, xlen, ylen) {
                best = Best { score, i, j };
            }
            if mode.is_local() && score < 0 {
                score = 0;
            }
            cur[j] = score;
        }
        older = std::mem::replace(&mut prev, cur);
    }

    if mode.is_local() && best.score <= 0 {
        return AlignResult::no_alignment();
    }

    AlignResult {
        score: best.score,
        end_a: Some(best.i),
        end_b: Some(best.j),
        path: None,
        status: AlignStatus::Ok,
    }
}

/// The argument sets used by primer design.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlignKind {
    Local,
    End,
    LocalEnd,
    LocalAmbig,
    LocalEndAmbig,
}

impl AlignKind {
    pub fn mode(&self) -> AlignMode {
        match self {
            Self::Local | Self::LocalAmbig => AlignMode::Local,
            Self::End => AlignMode::GlobalEnd,
            Self::LocalEnd | Self::LocalEndAmbig => AlignMode::LocalEnd,
        }
    }
}

/// Preconfigured score-only aligners shared by the oligo and pair scorers.
#[derive(Debug, Clone)]
pub struct AlignerSet {
    local: AlignArgs,
    end: AlignArgs,
    local_end: AlignArgs,
    local_ambig: AlignArgs,
    local_end_ambig: AlignArgs,
}

impl AlignerSet {
    pub fn new() -> Self {
        let plain = Arc::new(ScoringMatrix::nucleotide());
        let ambig = Arc::new(ScoringMatrix::nucleotide().with_ambiguity_codes());
        Self {
            local: AlignArgs::primer(AlignMode::Local, Arc::clone(&plain)),
            end: AlignArgs::primer(AlignMode::GlobalEnd, Arc::clone(&plain)),
            local_end: AlignArgs::primer(AlignMode::LocalEnd, plain),
            local_ambig: AlignArgs::primer(AlignMode::Local, Arc::clone(&ambig)),
            local_end_ambig: AlignArgs::primer(AlignMode::LocalEnd, ambig),
        }
    }

    pub fn args(&self, kind: AlignKind) -> &AlignArgs {
        match kind {
            AlignKind::Local => &self.local,
            AlignKind::End => &self.end,
            AlignKind::LocalEnd => &self.local_end,
            AlignKind::LocalAmbig => &self.local_ambig,
            AlignKind::LocalEndAmbig => &self.local_end_ambig,
        }
    }

    /// Alignment score of `a` against `b` in units, floored at zero.
    ///
    /// Local alignments against fewer than three bases report the length
    /// of `b`.
    pub fn score(&self, a: &[u8], b: &[u8], kind: AlignKind) -> Result<f64, AlignError> {
        if kind.mode().is_local() && b.len() < 3 {
            return Ok(b.len() as f64);
        }
        let result = align(a, b, self.args(kind))?;
        Ok(result.units().max(0.0))
    }
}

impl Default for AlignerSet {
    fn default() -> Self {
        Self::new()
    }
}
