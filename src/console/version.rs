//! Fabric version selection
//!
//! Callers may pin an exact version (`2.2.1`) or give a range such as
//! `>=2.2,<3.0`. A range resolves to the highest version the console offers
//! that satisfies every clause.

use std::cmp::Ordering;

use crate::error::{Error, Result};

/// A dotted numeric version; missing components compare as zero
#[derive(Clone, Debug)]
pub struct FabricVersion(Vec<u64>);

impl FabricVersion {
    pub fn parse(version: &str) -> Option<Self> {
        let trimmed = version.trim().trim_start_matches('v');
        // Pre-release and build suffixes do not take part in ordering
        let core = trimmed
            .split(|c| c == '-' || c == '+')
            .next()
            .unwrap_or_default();
        if core.is_empty() {
            return None;
        }
        core.split('.')
            .map(|part| part.parse::<u64>().ok())
            .collect::<Option<Vec<_>>>()
            .map(Self)
    }

    fn component(&self, index: usize) -> u64 {
        self.0.get(index).copied().unwrap_or(0)
    }
}

impl Ord for FabricVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.0.len().max(other.0.len());
        (0..len)
            .map(|i| self.component(i).cmp(&other.component(i)))
            .find(|ordering| ordering.is_ne())
            .unwrap_or(Ordering::Equal)
    }
}

impl PartialEq for FabricVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other).is_eq()
    }
}

impl Eq for FabricVersion {}

impl PartialOrd for FabricVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Comparator {
    Ge,
    Gt,
    Le,
    Lt,
    Eq,
    Ne,
}

#[derive(Clone, Debug)]
struct Clause {
    comparator: Comparator,
    version: FabricVersion,
}

impl Clause {
    fn parse(clause: &str) -> Option<Self> {
        let clause = clause.trim();
        let (comparator, rest) = [
            (">=", Comparator::Ge),
            ("<=", Comparator::Le),
            ("==", Comparator::Eq),
            ("!=", Comparator::Ne),
            (">", Comparator::Gt),
            ("<", Comparator::Lt),
            ("=", Comparator::Eq),
        ]
        .iter()
        .find_map(|(prefix, comparator)| {
            clause
                .strip_prefix(prefix)
                .map(|rest| (*comparator, rest))
        })
        .unwrap_or((Comparator::Eq, clause));

        Some(Self {
            comparator,
            version: FabricVersion::parse(rest)?,
        })
    }

    fn matches(&self, version: &FabricVersion) -> bool {
        let ordering = version.cmp(&self.version);
        match self.comparator {
            Comparator::Ge => ordering.is_ge(),
            Comparator::Gt => ordering.is_gt(),
            Comparator::Le => ordering.is_le(),
            Comparator::Lt => ordering.is_lt(),
            Comparator::Eq => ordering.is_eq(),
            Comparator::Ne => ordering.is_ne(),
        }
    }
}

/// Whether `spec` is a range rather than an exact version
pub fn is_range(spec: &str) -> bool {
    spec.contains(|c| matches!(c, '<' | '>' | '=' | '!' | ','))
}

/// Pick the version to deploy for `spec` out of `available`.
///
/// Exact versions are returned unchanged without consulting `available`.
pub fn resolve_version(spec: &str, available: &[String]) -> Result<String> {
    if !is_range(spec) {
        return Ok(spec.trim().to_string());
    }

    let clauses = spec
        .split(',')
        .map(|clause| {
            Clause::parse(clause).ok_or_else(|| {
                Error::ValidationError(format!("invalid version range clause '{clause}' in {spec}"))
            })
        })
        .collect::<Result<Vec<_>>>()?;

    available
        .iter()
        .filter_map(|candidate| FabricVersion::parse(candidate).map(|parsed| (parsed, candidate)))
        .filter(|(parsed, _)| clauses.iter().all(|clause| clause.matches(parsed)))
        .max_by(|(a, _), (b, _)| a.cmp(b))
        .map(|(_, candidate)| candidate.clone())
        .ok_or_else(|| {
            Error::ValidationError(format!(
                "no available version matches {spec} (available: {})",
                available.join(", ")
            ))
        })
}
