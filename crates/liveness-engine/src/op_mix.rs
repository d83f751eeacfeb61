//! Operation kinds, the configured mix and weighted selection.

use rand::{Rng, RngCore};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use tracing::warn;

/// A kind of workload operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OpKind {
    Find,
    Insert,
    Update,
}

impl OpKind {
    pub const ALL: [OpKind; 3] = [OpKind::Find, OpKind::Insert, OpKind::Update];

    pub fn as_str(self) -> &'static str {
        match self {
            OpKind::Find => "find",
            OpKind::Insert => "insert",
            OpKind::Update => "update",
        }
    }

    /// Dense index, for per-kind counters.
    pub(crate) fn index(self) -> usize {
        match self {
            OpKind::Find => 0,
            OpKind::Insert => 1,
            OpKind::Update => 2,
        }
    }
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OpKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "find" => Ok(OpKind::Find),
            "insert" => Ok(OpKind::Insert),
            "update" => Ok(OpKind::Update),
            other => Err(format!("Unknown operation kind: {other}")),
        }
    }
}

/// Ordered `(kind, weight)` list whose weights sum to 1.0.
///
/// Order is preserved from the input and drives selection, so the same mix
/// and the same random draw always pick the same kind.
#[derive(Debug, Clone, PartialEq)]
pub struct OpMix {
    entries: Vec<(OpKind, f64)>,
}

impl Default for OpMix {
    fn default() -> Self {
        Self {
            entries: vec![
                (OpKind::Find, 0.7),
                (OpKind::Insert, 0.2),
                (OpKind::Update, 0.1),
            ],
        }
    }
}

impl OpMix {
    /// Parse a `kind=weight,kind=weight` string.
    ///
    /// Unparseable entries are skipped with a warning. A repeated kind
    /// replaces the earlier weight in place. Falls back to the default mix
    /// when nothing usable remains.
    pub fn parse(mix: &str) -> Self {
        let mut weights = Vec::new();

        for part in mix.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let Some((name, weight)) = part.split_once('=') else {
                warn!("Skipping op-mix entry without '=': '{part}'");
                continue;
            };
            let kind = match name.parse::<OpKind>() {
                Ok(kind) => kind,
                Err(e) => {
                    warn!("Skipping op-mix entry '{part}': {e}");
                    continue;
                }
            };
            let weight = match weight.trim().parse::<f64>() {
                Ok(w) if w.is_finite() && w >= 0.0 => w,
                _ => {
                    warn!("Skipping op-mix entry '{part}': invalid weight");
                    continue;
                }
            };
            weights.push((kind, weight));
        }

        Self::from_weights(weights)
    }

    /// Build a mix from raw weights, normalizing them to sum to 1.0.
    pub fn from_weights<I>(weights: I) -> Self
    where
        I: IntoIterator<Item = (OpKind, f64)>,
    {
        let mut entries: Vec<(OpKind, f64)> = Vec::new();
        for (kind, weight) in weights {
            if !(weight.is_finite() && weight >= 0.0) {
                continue;
            }
            match entries.iter_mut().find(|(k, _)| *k == kind) {
                Some(entry) => entry.1 = weight,
                None => entries.push((kind, weight)),
            }
        }

        let total: f64 = entries.iter().map(|(_, w)| w).sum();
        if entries.is_empty() || total <= 0.0 {
            warn!("Operation mix is empty, using default find=0.7,insert=0.2,update=0.1");
            return Self::default();
        }

        for entry in &mut entries {
            entry.1 /= total;
        }
        Self { entries }
    }

    pub fn entries(&self) -> &[(OpKind, f64)] {
        &self.entries
    }

    /// Normalized weight of `kind`, zero when absent.
    pub fn weight(&self, kind: OpKind) -> f64 {
        self.entries
            .iter()
            .find(|(k, _)| *k == kind)
            .map_or(0.0, |(_, w)| *w)
    }
}

impl fmt::Display for OpMix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (kind, weight)) in self.entries.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{kind}={weight:.3}")?;
        }
        Ok(())
    }
}

/// Weighted random choice over an [`OpMix`].
#[derive(Debug, Clone)]
pub struct OperationSelector {
    cumulative: Vec<(OpKind, f64)>,
}

impl OperationSelector {
    pub fn new(mix: &OpMix) -> Self {
        let mut acc = 0.0;
        let cumulative = mix
            .entries()
            .iter()
            .map(|(kind, weight)| {
                acc += weight;
                (*kind, acc)
            })
            .collect();
        Self { cumulative }
    }

    /// Draw a kind using a uniform value from `rng`.
    pub fn select(&self, rng: &mut dyn RngCore) -> OpKind {
        self.select_with(rng.random::<f64>())
    }

    /// The first kind whose cumulative weight is at least `r`; the first kind
    /// when rounding leaves `r` above the last cumulative weight.
    pub fn select_with(&self, r: f64) -> OpKind {
        self.cumulative
            .iter()
            .find(|(_, cumulative)| *cumulative >= r)
            .or_else(|| self.cumulative.first())
            .map_or(OpKind::Find, |(kind, _)| *kind)
    }
}
