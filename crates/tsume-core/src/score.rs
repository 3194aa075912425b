//! USI-style score derived from a [`SearchResult`], for progress reporting
//! while the search is still running and for the final `mate N` line.

use crate::engine::options::ScoreCalculationMethod;
use crate::search_result::SearchResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Unknown,
    Win,
    Lose,
}

/// A root-relative evaluation: `mate N` / `mate -N` once the result is
/// final, otherwise a `cp`-shaped number derived from the live pn/dn
/// according to the configured [`ScoreCalculationMethod`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Score {
    kind: Kind,
    value: i32,
}

const PONANZA: f64 = 600.0;

impl Score {
    /// Builds the score from `result`, computed from the root side's point
    /// of view and then flipped if the root itself is an AND node.
    pub fn make(method: ScoreCalculationMethod, result: &SearchResult, is_root_or_node: bool) -> Score {
        let score = if result.is_final() {
            if result.is_proven() {
                Score {
                    kind: Kind::Win,
                    value: result.len().len() as i32,
                }
            } else {
                Score {
                    kind: Kind::Lose,
                    value: result.len().len() as i32,
                }
            }
        } else {
            let value = match method {
                ScoreCalculationMethod::Dn => result.dn() as i32,
                ScoreCalculationMethod::MinusPn => -(result.pn() as i32),
                ScoreCalculationMethod::Ponanza => {
                    let pn = result.pn() as f64;
                    let dn = result.dn() as f64;
                    let r = dn / (pn + dn);
                    let val_real = -PONANZA * ((1.0 - r) / r).ln();
                    val_real as i32
                }
                ScoreCalculationMethod::None => 0,
            };
            Score {
                kind: Kind::Unknown,
                value,
            }
        };

        if is_root_or_node {
            score
        } else {
            -score
        }
    }

    pub fn to_usi_string(self) -> String {
        match self.kind {
            Kind::Win => format!("mate {}", self.value),
            Kind::Lose => format!("mate -{}", self.value),
            Kind::Unknown => format!("cp {}", self.value),
        }
    }
}

impl std::ops::Neg for Score {
    type Output = Score;

    fn neg(self) -> Score {
        match self.kind {
            Kind::Win => Score {
                kind: Kind::Lose,
                value: self.value,
            },
            Kind::Lose => Score {
                kind: Kind::Win,
                value: self.value,
            },
            Kind::Unknown => Score {
                kind: Kind::Unknown,
                value: -self.value,
            },
        }
    }
}
