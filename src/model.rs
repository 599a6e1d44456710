/// Record types shared by the harvest, matching, and linking stages.
///
/// `ObituaryRecord` is the on-disk shape of the harvested input list,
/// `QueryRecord` is its immutable matching view, `CandidateRecord` is one
/// directory hit, and `PersonProfile` is what gets persisted for a link.
use serde::{Deserialize, Serialize};

// ── Constants ────────────────────────────────────────────────────────

/// Canonical type tag for person listings in a directory result set.
pub const PERSON_TAG: &str = "person";

pub const NAME_PLACEHOLDER: &str = "N/A";
pub const AGE_PLACEHOLDER: &str = "Age not available";
pub const LOCATION_PLACEHOLDER: &str = "Location not available";
pub const EMAIL_PLACEHOLDER: &str = "Next of kin email not provided";
pub const PHONE_PLACEHOLDER: &str = "Phone number not available";

// ── Input records ────────────────────────────────────────────────────

/// One obituary listing row, as written by `harvest` and read by `link`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObituaryRecord {
    #[serde(rename = "Name")]
    pub name: String,

    #[serde(rename = "Birth Date", default)]
    pub birth_date: Option<String>,

    #[serde(rename = "Death Date", default)]
    pub death_date: Option<String>,

    #[serde(rename = "Publication Place", default)]
    pub publication_place: Option<String>,

    #[serde(rename = "Relatives", default)]
    pub relatives: Vec<String>,
}

/// The source-of-truth person being searched for.
///
/// Built once from an [`ObituaryRecord`]; the original name string is kept
/// verbatim as the checkpoint key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryRecord {
    key: String,
    name_parts: Vec<String>,
    birthdate: Option<String>,
    relatives: Vec<String>,
    location_hint: Option<String>,
}

impl QueryRecord {
    /// Build a query record. Returns `None` when the name has no tokens.
    pub fn new(
        name: &str,
        birthdate: Option<&str>,
        relatives: &[String],
        location_hint: Option<&str>,
    ) -> Option<Self> {
        let name_parts: Vec<String> = name.split_whitespace().map(str::to_string).collect();
        if name_parts.is_empty() {
            return None;
        }

        let mut unique: Vec<String> = Vec::with_capacity(relatives.len());
        for relative in relatives {
            let relative = relative.trim();
            if !relative.is_empty() && !unique.iter().any(|r| r == relative) {
                unique.push(relative.to_string());
            }
        }

        Some(Self {
            key: name.to_string(),
            name_parts,
            birthdate: non_empty(birthdate),
            relatives: unique,
            location_hint: non_empty(location_hint),
        })
    }

    pub fn from_obituary(record: &ObituaryRecord) -> Option<Self> {
        Self::new(
            &record.name,
            record.birth_date.as_deref(),
            &record.relatives,
            record.publication_place.as_deref(),
        )
    }

    /// Checkpoint key: the original, unmodified name string.
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn name_parts(&self) -> &[String] {
        &self.name_parts
    }

    pub fn full_name(&self) -> String {
        self.name_parts.join(" ")
    }

    pub fn first_name(&self) -> &str {
        &self.name_parts[0]
    }

    /// Last token of the name; equal to the first name for single-token names.
    pub fn last_name(&self) -> &str {
        &self.name_parts[self.name_parts.len() - 1]
    }

    /// Tokens between first and last, joined by a space.
    pub fn middle_name(&self) -> Option<String> {
        if self.name_parts.len() > 2 {
            Some(self.name_parts[1..self.name_parts.len() - 1].join(" "))
        } else {
            None
        }
    }

    pub fn birthdate(&self) -> Option<&str> {
        self.birthdate.as_deref()
    }

    /// Relative names, deduplicated, in first-seen order.
    pub fn relatives(&self) -> &[String] {
        &self.relatives
    }

    pub fn location_hint(&self) -> Option<&str> {
        self.location_hint.as_deref()
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

// ── Directory records ────────────────────────────────────────────────

/// A raw hit from an external directory, not yet confirmed to match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CandidateRecord {
    pub raw_name: String,
    pub type_tag: String,
    /// Opaque locator for the detail page (absolute URL or path).
    pub detail_reference: String,
    pub birthdate: Option<String>,
    pub relatives: Vec<String>,
}

impl CandidateRecord {
    pub fn person(raw_name: &str, detail_reference: &str) -> Self {
        Self {
            raw_name: raw_name.to_string(),
            type_tag: PERSON_TAG.to_string(),
            detail_reference: detail_reference.to_string(),
            ..Self::default()
        }
    }
}

/// A candidate paired with its similarity score, used only while ranking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoredCandidate<'a> {
    pub candidate: &'a CandidateRecord,
    pub score: i32,
}

// ── Link results ─────────────────────────────────────────────────────

/// Person linked to an obituary, as persisted in the checkpoint.
///
/// Scalar fields are never empty: missing values carry an explicit
/// placeholder string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonProfile {
    #[serde(default = "default_full_name")]
    pub full_name: String,

    #[serde(default = "default_age")]
    pub age: String,

    #[serde(default = "default_location")]
    pub location: String,

    #[serde(default = "default_email")]
    pub email: String,

    #[serde(default = "default_phone")]
    pub phone_number: String,

    #[serde(default)]
    pub associated_persons: Vec<AssociatedPerson>,
}

impl Default for PersonProfile {
    fn default() -> Self {
        Self {
            full_name: default_full_name(),
            age: default_age(),
            location: default_location(),
            email: default_email(),
            phone_number: default_phone(),
            associated_persons: Vec::new(),
        }
    }
}

fn default_full_name() -> String {
    NAME_PLACEHOLDER.to_string()
}

fn default_age() -> String {
    AGE_PLACEHOLDER.to_string()
}

fn default_location() -> String {
    LOCATION_PLACEHOLDER.to_string()
}

fn default_email() -> String {
    EMAIL_PLACEHOLDER.to_string()
}

fn default_phone() -> String {
    PHONE_PLACEHOLDER.to_string()
}

/// A relative or associate listed on a profile page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssociatedPerson {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

/// Outcome persisted per query key: a profile, or `None` for "searched,
/// nothing matched". Keys absent from the checkpoint were never attempted.
pub type MatchResult = Option<PersonProfile>;

// ── Tests ────────────────────────────────────────────────────────────
