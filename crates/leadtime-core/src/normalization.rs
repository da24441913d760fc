//! Manufacturer-name normalization.
//!
//! Raw manufacturer strings arrive with inconsistent casing, stray
//! whitespace, misspellings and placeholder tokens. A [`ManufacturerNormalizer`]
//! maps each raw string to its canonical name (or to nothing) *before* the
//! record expander sees it, so aggregation only ever groups canonical names.

use std::collections::HashMap;
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{AnalyzerError, Result};

/// Tokens that mean "no manufacturer given". Compared case-insensitively.
const PLACEHOLDERS: &[&str] = &["", "none", "null", "undefined", "n/a", "na", "-", "tbd"];

// ── Normalizer trait ──────────────────────────────────────────────────────────

/// A swappable policy that turns a raw manufacturer string into its
/// canonical form.
pub trait ManufacturerNormalizer {
    /// Canonical name for `raw`, or `None` when `raw` is a placeholder or
    /// normalizes to nothing.
    fn normalize(&self, raw: &str) -> Option<String>;

    /// Data-quality warnings found while building the policy.
    fn collisions(&self) -> &[NormalizerCollision] {
        &[]
    }
}

/// Trims whitespace and drops placeholders; no renaming.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityNormalizer;

impl ManufacturerNormalizer for IdentityNormalizer {
    fn normalize(&self, raw: &str) -> Option<String> {
        let trimmed = raw.trim();
        if is_placeholder(trimmed) {
            None
        } else {
            Some(trimmed.to_string())
        }
    }
}

/// Normalize every element of `raw` in order, dropping placeholders.
/// Repeated names are kept so each one still fans out.
pub fn normalize_list<N>(normalizer: &N, raw: &[String]) -> Vec<String>
where
    N: ManufacturerNormalizer + ?Sized,
{
    raw.iter().filter_map(|r| normalizer.normalize(r)).collect()
}

// ── TableNormalizer ───────────────────────────────────────────────────────────

/// Two table keys that differ only in case but map to different canonical
/// names. Neither is used for case-insensitive lookups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NormalizerCollision {
    pub folded_key: String,
    pub canonical_names: Vec<String>,
}

/// Lookup-table normalizer.
///
/// Resolution order:
/// 1. exact match on the trimmed input;
/// 2. case-insensitive match, but only for folded keys that resolve to a
///    single canonical name (ambiguous keys are reported in
///    [`collisions`](Self::collisions) and skipped);
/// 3. heuristic cleanup: collapse runs of whitespace, and title-case names
///    written entirely in capitals (longer than two characters).
#[derive(Debug, Clone)]
pub struct TableNormalizer {
    exact: HashMap<String, String>,
    folded: HashMap<String, String>,
    collisions: Vec<NormalizerCollision>,
}

impl TableNormalizer {
    /// Build a table from `(raw, canonical)` pairs. Later pairs override
    /// earlier ones with the same raw key.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut exact: HashMap<String, String> = HashMap::new();
        for (raw, canonical) in pairs {
            exact.insert(raw.into().trim().to_string(), canonical.into());
        }

        let mut candidates: HashMap<String, Vec<String>> = HashMap::new();
        for (raw, canonical) in &exact {
            let names = candidates.entry(fold(raw)).or_default();
            if !names.contains(canonical) {
                names.push(canonical.clone());
            }
        }

        let mut folded = HashMap::new();
        let mut collisions = Vec::new();
        for (key, mut names) in candidates {
            if names.len() == 1 {
                folded.insert(key, names.remove(0));
            } else {
                names.sort();
                warn!(
                    "manufacturer table key \"{}\" maps to {} different names ({}); \
                     case-insensitive lookup disabled for it",
                    key,
                    names.len(),
                    names.join(", ")
                );
                collisions.push(NormalizerCollision {
                    folded_key: key,
                    canonical_names: names,
                });
            }
        }
        collisions.sort_by(|a, b| a.folded_key.cmp(&b.folded_key));

        Self {
            exact,
            folded,
            collisions,
        }
    }

    /// The built-in HVAC / electrical manufacturer table.
    pub fn builtin() -> Self {
        Self::from_pairs(BUILTIN_TABLE.iter().copied())
    }

    /// Load a `{ "raw name": "Canonical Name", ... }` JSON object.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| AnalyzerError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        let map: HashMap<String, String> = serde_json::from_str(&content)?;
        debug!(
            "loaded {} manufacturer mappings from {}",
            map.len(),
            path.display()
        );
        Ok(Self::from_pairs(map))
    }

    /// Number of raw keys in the table.
    pub fn len(&self) -> usize {
        self.exact.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exact.is_empty()
    }
}

impl ManufacturerNormalizer for TableNormalizer {
    fn normalize(&self, raw: &str) -> Option<String> {
        let trimmed = raw.trim();
        if is_placeholder(trimmed) {
            return None;
        }

        let resolved = if let Some(canonical) = self.exact.get(trimmed) {
            canonical.clone()
        } else if let Some(canonical) = self.folded.get(&fold(trimmed)) {
            canonical.clone()
        } else {
            heuristic_cleanup(trimmed)
        };

        let resolved = resolved.trim();
        if resolved.is_empty() {
            None
        } else {
            Some(resolved.to_string())
        }
    }

    /// Folded keys whose entries disagree on the canonical name.
    fn collisions(&self) -> &[NormalizerCollision] {
        &self.collisions
    }
}

// ── Internal helpers ──────────────────────────────────────────────────────────

fn whitespace_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("regex is valid"))
}

fn collapse_whitespace(s: &str) -> String {
    whitespace_re().replace_all(s.trim(), " ").into_owned()
}

/// Lowercased, whitespace-collapsed form used for case-insensitive lookup.
fn fold(s: &str) -> String {
    collapse_whitespace(s).to_lowercase()
}

fn is_placeholder(trimmed: &str) -> bool {
    let folded = fold(trimmed);
    PLACEHOLDERS.contains(&folded.as_str())
}

fn heuristic_cleanup(s: &str) -> String {
    let cleaned = collapse_whitespace(s);
    let has_letters = cleaned.chars().any(char::is_alphabetic);
    if has_letters && cleaned == cleaned.to_uppercase() && cleaned.chars().count() > 2 {
        title_case(&cleaned)
    } else {
        cleaned
    }
}

fn title_case(s: &str) -> String {
    s.split(' ')
        .map(|word| {
            let lower = word.to_lowercase();
            let mut chars = lower.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

// ── Built-in table ────────────────────────────────────────────────────────────

/// Raw spellings seen in quote exports. Case variants are covered by the
/// case-insensitive pass, so only distinct spellings are listed.
const BUILTIN_TABLE: &[(&str, &str)] = &[
    ("aaon", "AAON"),
    ("stulz", "Stulz"),
    ("vertiv", "Vertiv"),
    ("trane", "Trane"),
    ("daikin", "Daikin"),
    ("daikin applied", "Daikin Applied"),
    ("mitsubishi", "Mitsubishi"),
    ("mitusbishi", "Mitsubishi"),
    ("trane-mitsubishi", "Trane-Mitsubishi"),
    ("trane/mitsubishi", "Trane/Mitsubishi"),
    ("armstrong", "Armstrong"),
    ("armstrong fluid technology", "Armstrong Fluid Technology"),
    ("above air", "Above Air"),
    ("above-air", "Above Air"),
    ("krueger", "Krueger"),
    ("twin city", "Twin City Fan"),
    ("twin city fan", "Twin City Fan"),
    ("twin city fans", "Twin City Fan"),
    ("twin city fan/ abb vfds", "Twin City Fan"),
    ("twin city fans & abb vfds", "Twin City Fan"),
    ("twin city fan/ abb", "Twin City Fan"),
    ("greenheck", "Greenheck"),
    ("greenheck fans & franklin controls starters", "Greenheck"),
    ("loren cook", "Loren Cook"),
    ("cook", "Loren Cook"),
    ("indeeco", "Indeeco"),
    ("anemostat", "Anemostat"),
    ("pennbarry", "PennBarry"),
    ("pennberry", "PennBarry"),
    ("york", "York"),
    ("carrier", "Carrier"),
    ("lennox", "Lennox"),
    ("rheem", "Rheem"),
    ("goodman", "Goodman"),
    ("samsung", "Samsung"),
    ("lg", "LG"),
    ("lg electronics", "LG Electronics"),
    ("siemens", "Siemens"),
    ("square d", "Square D"),
    ("square d by schneider electric", "Square D by Schneider Electric"),
    ("eaton", "Eaton"),
    ("abb", "ABB"),
    ("schneider electric", "Schneider Electric"),
    ("general electric", "General Electric"),
    ("ge", "General Electric"),
    ("honeywell", "Honeywell"),
    ("johnson controls", "Johnson Controls"),
    ("emerson", "Emerson"),
    ("rockwell automation", "Rockwell Automation"),
    ("cutler hammer", "Cutler Hammer"),
    ("westinghouse", "Westinghouse"),
    ("allen bradley", "Allen Bradley"),
    ("baldor", "Baldor"),
    ("leeson", "Leeson"),
    ("marathon", "Marathon"),
    ("bell & gossett", "Bell & Gossett"),
    ("bell and gossett", "Bell & Gossett"),
    ("grundfos", "Grundfos"),
    ("itt", "ITT"),
    ("flowserve", "Flowserve"),
    ("alfa laval", "Alfa Laval"),
    ("markel", "Markel"),
    ("tutco", "Tutco"),
    ("price", "Price"),
    ("titus", "Titus"),
    ("titus/ price", "Titus/Price"),
    ("titus/price", "Titus/Price"),
    ("titus - included in ao $", "Titus"),
    ("metalaire", "Metalaire"),
    ("condair", "Condair"),
    ("dri-steem", "Dri-Steem"),
    ("dristeem", "Dri-Steem"),
    ("cambridge air solutions", "Cambridge Air Solutions"),
    ("mammoth", "Mammoth"),
    ("captiveaire", "CaptiveAire"),
    ("haakon", "Haakon"),
    ("robatherm", "Robatherm"),
    ("quantech", "Quantech"),
    ("chillmaster", "Chillmaster"),
    ("galletti manufacturing", "Galletti Manufacturing"),
    ("spx cooling tech, llc", "SPX Cooling Tech"),
    ("spx cooling technologies", "SPX Cooling Tech"),
    ("marley", "Marley"),
    ("evapco", "Evapco"),
    ("baltimore aircoil", "Baltimore Aircoil"),
    ("caterpillar", "Caterpillar"),
    ("kohler", "Kohler"),
    ("kohler [rehlko]", "Kohler"),
    ("generac", "Generac"),
    ("cummins", "Cummins"),
];

// ── Tests ─────────────────────────────────────────────────────────────────────
