use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::models::{CoreError, CoreErrorKind, Version, VersionPart};

const CLAUSE_SEPARATOR: char = ',';
const RANGE_SEPARATOR: &str = " - ";
const WILDCARD: char = '*';
const VERSION_SEPARATOR: char = '.';

/// A version range expression restricting the versions a gating pin admits.
///
/// Accepted forms, which may be combined with `,` (all clauses must match):
///
/// - `1.2.*` matches every version whose leading parts are `1.2`
/// - `1.0 - 2.0` is an inclusive range
/// - `<2.0`, `<=2.0`, `>1.0`, `>=1.0`, `=1.5`
/// - `1.5` matches that exact version
///
/// An empty gated version matches nothing.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct GatedVersion {
    raw: String,
    clauses: Vec<GateClause>,
}

#[derive(Clone, Debug)]
enum GateClause {
    Compare(Comparator, Version),
    Range { min: Version, max: Version },
    Wildcard(Vec<VersionPart>),
    Exact(Version),
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Comparator {
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
    Equal,
}

const COMPARATORS: [(&str, Comparator); 6] = [
    ("<=", Comparator::LessOrEqual),
    (">=", Comparator::GreaterOrEqual),
    ("==", Comparator::Equal),
    ("<", Comparator::Less),
    (">", Comparator::Greater),
    ("=", Comparator::Equal),
];

impl GatedVersion {
    pub fn parse(expression: &str) -> Result<Self, CoreError> {
        let raw = expression.trim().to_string();
        if raw.is_empty() {
            return Ok(Self::default());
        }

        let clauses = raw
            .split(CLAUSE_SEPARATOR)
            .map(parse_clause)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { raw, clauses })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Whether `version` falls within this gate.
    pub fn is_valid_version(&self, version: &Version) -> bool {
        !self.clauses.is_empty() && self.clauses.iter().all(|clause| clause.matches(version))
    }
}

impl GateClause {
    fn matches(&self, version: &Version) -> bool {
        match self {
            Self::Compare(comparator, operand) => match comparator {
                Comparator::Less => version < operand,
                Comparator::LessOrEqual => version <= operand,
                Comparator::Greater => version > operand,
                Comparator::GreaterOrEqual => version >= operand,
                Comparator::Equal => version == operand,
            },
            Self::Range { min, max } => version >= min && version <= max,
            Self::Wildcard(prefix) => prefix
                .iter()
                .enumerate()
                .all(|(index, part)| version.part_at(index) == part),
            Self::Exact(expected) => version == expected,
        }
    }
}

fn parse_clause(clause: &str) -> Result<GateClause, CoreError> {
    let clause = clause.trim();
    if clause.is_empty() {
        return Err(invalid_gate(clause, "empty clause"));
    }

    // Padding lets a dangling "1.0 -" still be recognized as a range.
    let padded = format!(" {clause} ");
    if let Some((min, max)) = padded.split_once(RANGE_SEPARATOR) {
        return Ok(GateClause::Range {
            min: parse_operand(clause, min)?,
            max: parse_operand(clause, max)?,
        });
    }

    for (symbol, comparator) in COMPARATORS {
        if let Some(operand) = clause.strip_prefix(symbol) {
            return Ok(GateClause::Compare(
                comparator,
                parse_operand(clause, operand)?,
            ));
        }
    }

    if clause.contains(WILDCARD) {
        // Checked on the raw text: parsing drops trailing zero parts.
        let mut raw_parts = clause.rsplit(VERSION_SEPARATOR);
        let wildcard_last = raw_parts.next().is_some_and(|part| part.trim() == "*");
        let wildcard_elsewhere = raw_parts.any(|part| part.contains(WILDCARD));
        if !wildcard_last || wildcard_elsewhere {
            return Err(invalid_gate(
                clause,
                "wildcard must be the final version part",
            ));
        }

        let version = Version::parse(clause);
        let parts = version.parts();
        if !parts.last().is_some_and(VersionPart::is_wildcard) {
            return Err(invalid_gate(
                clause,
                "wildcard must be the final version part",
            ));
        }
        return Ok(GateClause::Wildcard(parts[..parts.len() - 1].to_vec()));
    }

    Ok(GateClause::Exact(Version::parse(clause)))
}

fn parse_operand(clause: &str, operand: &str) -> Result<Version, CoreError> {
    let operand = operand.trim();
    if operand.is_empty() {
        return Err(invalid_gate(clause, "missing version operand"));
    }
    if operand.contains(WILDCARD) {
        return Err(invalid_gate(
            clause,
            "wildcards are not allowed in comparisons or ranges",
        ));
    }
    Ok(Version::parse(operand))
}

fn invalid_gate(clause: &str, reason: &str) -> CoreError {
    CoreError::new(
        CoreErrorKind::InvalidInput,
        format!("invalid gated version clause '{clause}': {reason}"),
    )
}

impl PartialEq for GatedVersion {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl Eq for GatedVersion {}

impl Display for GatedVersion {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}

impl TryFrom<String> for GatedVersion {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<GatedVersion> for String {
    fn from(value: GatedVersion) -> Self {
        value.raw
    }
}

impl std::str::FromStr for GatedVersion {
    type Err = CoreError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value)
    }
}

#[cfg(test)]
mod tests {
    use super::GatedVersion;
    use crate::models::{CoreErrorKind, Version};

    fn gate(expression: &str) -> GatedVersion {
        GatedVersion::parse(expression).unwrap()
    }

    fn admits(expression: &str, version: &str) -> bool {
        gate(expression).is_valid_version(&Version::parse(version))
    }

    #[test]
    fn wildcard_matches_leading_parts() {
        assert!(admits("1.2.*", "1.2"));
        assert!(admits("1.2.*", "1.2.7"));
        assert!(admits("1.2.*", "1.2.7.1"));
        assert!(!admits("1.2.*", "1.3"));
        assert!(!admits("1.2.*", "2.2.0"));
    }

    #[test]
    fn wildcard_treats_missing_parts_as_zero() {
        assert!(admits("1.0.*", "1"));
        assert!(!admits("1.1.*", "1"));
    }

    #[test]
    fn zero_parts_before_the_wildcard_are_significant() {
        assert!(admits("1.0.*", "1.0.5"));
        assert!(!admits("1.0.*", "1.5"));
    }

    #[test]
    fn bare_wildcard_matches_everything() {
        assert!(admits("*", "0.1"));
        assert!(admits("*", "99"));
    }

    #[test]
    fn inclusive_range_bounds() {
        assert!(admits("1.0 - 2.0", "1.5"));
        assert!(admits("1.0 - 2.0", "1.0"));
        assert!(admits("1.0 - 2.0", "2.0"));
        assert!(!admits("1.0 - 2.0", "3.0"));
        assert!(!admits("1.0 - 2.0", "0.9"));
    }

    #[test]
    fn comparison_operators() {
        assert!(admits("<2.0", "1.9.9"));
        assert!(!admits("<2.0", "2.0"));
        assert!(admits("<=2.0", "2.0.0"));
        assert!(admits(">1.0", "1.0.1"));
        assert!(!admits(">1.0", "1.0"));
        assert!(admits(">=1.0", "1.0"));
        assert!(admits("= 1.5", "1.5.0"));
        assert!(admits("==1.5", "1.5"));
    }

    #[test]
    fn clauses_are_conjunctive() {
        assert!(admits(">=1.0, <2.0", "1.5"));
        assert!(!admits(">=1.0, <2.0", "2.0"));
        assert!(!admits(">=1.0, <2.0", "0.5"));
    }

    #[test]
    fn plain_version_is_exact() {
        assert!(admits("1.5", "1.5.0"));
        assert!(!admits("1.5", "1.5.1"));
    }

    #[test]
    fn empty_gate_matches_nothing() {
        let empty = gate("   ");
        assert!(empty.is_empty());
        assert!(!empty.is_valid_version(&Version::parse("1.0")));
    }

    #[test]
    fn malformed_expressions_are_rejected() {
        for expression in [
            "<", "1.0 - ", "1.*.3", "1.*.0", "1.*.0.0", "1.2*", ">=1.*", "1.0,,2.0",
        ] {
            let error = GatedVersion::parse(expression).unwrap_err();
            assert_eq!(error.kind, CoreErrorKind::InvalidInput, "{expression}");
        }
    }

    #[test]
    fn equality_and_display_use_trimmed_expression() {
        assert_eq!(gate(" 1.2.* "), gate("1.2.*"));
        assert_eq!(gate(" 1.2.* ").to_string(), "1.2.*");
    }
}
