//! Edit-distance alignment of two token sequences.
//!
//! Unit-cost Levenshtein (substitution, insertion and deletion each cost 1)
//! with a count of how many distinct alignments reach the optimal cost. A
//! count above one means the best alignment is not unique; the caller
//! decides whether that is an error or whether a hint breaks the tie.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How to pick among equally good alignments.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AlignmentHint {
    /// Require a unique optimal alignment.
    #[default]
    Strict,
    /// Match source tokens to the earliest equal target tokens.
    PreferEarlierMatch,
    /// Match source tokens to the latest equal target tokens.
    PreferLaterMatch,
}

impl fmt::Display for AlignmentHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Strict => write!(f, "strict"),
            Self::PreferEarlierMatch => write!(f, "prefer-earlier"),
            Self::PreferLaterMatch => write!(f, "prefer-later"),
        }
    }
}

impl FromStr for AlignmentHint {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "strict" => Ok(Self::Strict),
            "prefer-earlier" | "prefer-earlier-match" => Ok(Self::PreferEarlierMatch),
            "prefer-later" | "prefer-later-match" => Ok(Self::PreferLaterMatch),
            other => Err(format!("unknown alignment hint '{}'", other)),
        }
    }
}

/// Alignment settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlignmentConfig {
    /// Tie-breaking policy.
    #[serde(default)]
    pub hint: AlignmentHint,
}

/// Kind of an aligned position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PairKind {
    /// Equal tokens.
    Equal,
    /// Different tokens at the same position.
    Substitute,
    /// Source token with no target counterpart.
    Insert,
    /// Target token with no source counterpart.
    Delete,
}

/// One aligned position: indices into the target and source token slices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AlignedPair {
    /// Index into the target tokens.
    pub target: Option<usize>,
    /// Index into the source tokens.
    pub source: Option<usize>,
    /// What happened at this position.
    pub kind: PairKind,
}

/// Result of aligning two sequences.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alignment {
    /// Optimal edit cost.
    pub cost: usize,
    /// Number of distinct optimal alignments (saturating).
    pub optimal_alignments: u64,
    /// The chosen alignment, in document order.
    pub pairs: Vec<AlignedPair>,
}

impl Alignment {
    /// Whether the chosen alignment is the only optimal one.
    pub fn is_unique(&self) -> bool {
        self.optimal_alignments <= 1
    }
}

#[derive(Clone, Copy)]
enum Step {
    Diagonal,
    Up,
    Left,
}

/// Align `target` against `source`.
pub fn align<T: PartialEq>(target: &[T], source: &[T], hint: AlignmentHint) -> Alignment {
    let (n, m) = (target.len(), source.len());
    let width = m + 1;
    let mut cost = vec![0usize; (n + 1) * width];
    let mut count = vec![0u64; (n + 1) * width];
    let at = |i: usize, j: usize| i * width + j;

    for i in 0..=n {
        cost[at(i, 0)] = i;
        count[at(i, 0)] = 1;
    }
    for j in 0..=m {
        cost[at(0, j)] = j;
        count[at(0, j)] = 1;
    }

    for i in 1..=n {
        for j in 1..=m {
            let substitution = usize::from(target[i - 1] != source[j - 1]);
            let diagonal = cost[at(i - 1, j - 1)] + substitution;
            let up = cost[at(i - 1, j)] + 1;
            let left = cost[at(i, j - 1)] + 1;
            let best = diagonal.min(up).min(left);

            let mut paths = 0u64;
            if diagonal == best {
                paths = paths.saturating_add(count[at(i - 1, j - 1)]);
            }
            if up == best {
                paths = paths.saturating_add(count[at(i - 1, j)]);
            }
            if left == best {
                paths = paths.saturating_add(count[at(i, j - 1)]);
            }
            cost[at(i, j)] = best;
            count[at(i, j)] = paths;
        }
    }

    // Walking backwards, taking gaps first pushes matches towards the start.
    let preference: [Step; 3] = match hint {
        AlignmentHint::PreferEarlierMatch => [Step::Up, Step::Left, Step::Diagonal],
        AlignmentHint::Strict | AlignmentHint::PreferLaterMatch => {
            [Step::Diagonal, Step::Up, Step::Left]
        }
    };

    let mut pairs = Vec::with_capacity(n.max(m));
    let (mut i, mut j) = (n, m);
    while i > 0 || j > 0 {
        let here = cost[at(i, j)];
        let step = preference.iter().copied().find(|step| match step {
            Step::Diagonal => {
                i > 0
                    && j > 0
                    && cost[at(i - 1, j - 1)] + usize::from(target[i - 1] != source[j - 1]) == here
            }
            Step::Up => i > 0 && cost[at(i - 1, j)] + 1 == here,
            Step::Left => j > 0 && cost[at(i, j - 1)] + 1 == here,
        });
        match step {
            Some(Step::Diagonal) => {
                let kind = if target[i - 1] == source[j - 1] {
                    PairKind::Equal
                } else {
                    PairKind::Substitute
                };
                pairs.push(AlignedPair { target: Some(i - 1), source: Some(j - 1), kind });
                i -= 1;
                j -= 1;
            }
            Some(Step::Up) => {
                pairs.push(AlignedPair { target: Some(i - 1), source: None, kind: PairKind::Delete });
                i -= 1;
            }
            Some(Step::Left) | None => {
                // The table always admits one of the three steps; `None` is unreachable.
                pairs.push(AlignedPair { target: None, source: Some(j - 1), kind: PairKind::Insert });
                j -= 1;
            }
        }
    }
    pairs.reverse();

    Alignment {
        cost: cost[at(n, m)],
        optimal_alignments: count[at(n, m)],
        pairs,
    }
}
