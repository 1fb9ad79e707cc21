//! Classified extraction records
//!
//! A ClassifiedRecord is what the extraction pipeline produces for one article
//! and what the gold labels store: exactly one of Merger, Acquisition or Other.
//! The JSON form is tagged by `article_type`, matching the label files.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{DealscoreError, Result};

/// Currency of a deal
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Currency {
    #[serde(rename = "USD")]
    Usd,
    #[serde(rename = "CAD")]
    Cad,
    #[serde(rename = "AUD")]
    Aud,
    #[default]
    Unknown,
}

impl Currency {
    /// The currency code as it appears in labels
    pub fn as_str(&self) -> &'static str {
        match self {
            Currency::Usd => "USD",
            Currency::Cad => "CAD",
            Currency::Aud => "AUD",
            Currency::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A merger between two companies
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Merger {
    pub article_id: Option<u32>,
    /// First company in the merger
    pub company_1: Option<String>,
    /// Stock tickers of the first company, in order
    pub company_1_ticker: Option<Vec<String>>,
    /// Second company in the merger
    pub company_2: Option<String>,
    /// Stock tickers of the second company, in order
    pub company_2_ticker: Option<Vec<String>>,
    /// Name of the merged entity
    pub merged_entity: Option<String>,
    /// Total monetary amount of the deal, as written
    pub deal_amount: Option<String>,
    pub deal_currency: Currency,
}

/// An acquisition of a child company by a parent company
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Acquisition {
    pub article_id: Option<u32>,
    /// Acquiring company
    pub parent_company: Option<String>,
    pub parent_company_ticker: Option<Vec<String>>,
    /// Company being acquired
    pub child_company: Option<String>,
    pub child_company_ticker: Option<Vec<String>>,
    /// Total monetary amount of the deal, as written
    pub deal_amount: Option<String>,
    pub deal_currency: Currency,
}

/// An article that is neither a merger nor an acquisition
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Other {
    pub article_id: Option<u32>,
}

/// Which of the three shapes a record has
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    Merger,
    Acquisition,
    Other,
}

impl RecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Merger => "Merger",
            RecordKind::Acquisition => "Acquisition",
            RecordKind::Other => "Other",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A classified extraction result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "article_type", rename_all = "lowercase")]
pub enum ClassifiedRecord {
    Merger(Merger),
    Acquisition(Acquisition),
    Other(Other),
}

impl ClassifiedRecord {
    /// Fallback record used when no prediction is available
    pub fn other(article_id: Option<u32>) -> Self {
        ClassifiedRecord::Other(Other { article_id })
    }

    pub fn kind(&self) -> RecordKind {
        match self {
            ClassifiedRecord::Merger(_) => RecordKind::Merger,
            ClassifiedRecord::Acquisition(_) => RecordKind::Acquisition,
            ClassifiedRecord::Other(_) => RecordKind::Other,
        }
    }

    pub fn article_id(&self) -> Option<u32> {
        match self {
            ClassifiedRecord::Merger(m) => m.article_id,
            ClassifiedRecord::Acquisition(a) => a.article_id,
            ClassifiedRecord::Other(o) => o.article_id,
        }
    }

    /// Comparable fields in declared order.
    ///
    /// The article id and the tag are never included; Other has no fields.
    pub fn fields(&self) -> Vec<Field<'_>> {
        match self {
            ClassifiedRecord::Merger(m) => vec![
                Field::text("company_1", &m.company_1),
                Field::tickers("company_1_ticker", &m.company_1_ticker),
                Field::text("company_2", &m.company_2),
                Field::tickers("company_2_ticker", &m.company_2_ticker),
                Field::text("merged_entity", &m.merged_entity),
                Field::text("deal_amount", &m.deal_amount),
                Field::currency("deal_currency", m.deal_currency),
            ],
            ClassifiedRecord::Acquisition(a) => vec![
                Field::text("parent_company", &a.parent_company),
                Field::tickers("parent_company_ticker", &a.parent_company_ticker),
                Field::text("child_company", &a.child_company),
                Field::tickers("child_company_ticker", &a.child_company_ticker),
                Field::text("deal_amount", &a.deal_amount),
                Field::currency("deal_currency", a.deal_currency),
            ],
            ClassifiedRecord::Other(_) => Vec::new(),
        }
    }
}

impl From<Merger> for ClassifiedRecord {
    fn from(merger: Merger) -> Self {
        ClassifiedRecord::Merger(merger)
    }
}

impl From<Acquisition> for ClassifiedRecord {
    fn from(acquisition: Acquisition) -> Self {
        ClassifiedRecord::Acquisition(acquisition)
    }
}

impl From<Other> for ClassifiedRecord {
    fn from(other: Other) -> Self {
        ClassifiedRecord::Other(other)
    }
}

/// A named, borrowed field value taken from a record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field<'a> {
    pub name: &'static str,
    pub value: FieldValue<'a>,
}

impl<'a> Field<'a> {
    fn text(name: &'static str, value: &'a Option<String>) -> Self {
        Self {
            name,
            value: FieldValue::Text(value.as_deref()),
        }
    }

    fn tickers(name: &'static str, value: &'a Option<Vec<String>>) -> Self {
        Self {
            name,
            value: FieldValue::Tickers(value.as_deref()),
        }
    }

    fn currency(name: &'static str, value: Currency) -> Self {
        Self {
            name,
            value: FieldValue::Currency(value),
        }
    }
}

/// Raw value of a comparable field.
///
/// Rendering keeps the raw shape (`None` vs `[]`); equivalence of the two is
/// decided by the scorer, not here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldValue<'a> {
    Text(Option<&'a str>),
    Tickers(Option<&'a [String]>),
    Currency(Currency),
}

impl fmt::Display for FieldValue<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text(None) | FieldValue::Tickers(None) => write!(f, "None"),
            FieldValue::Text(Some(text)) => write!(f, "{:?}", text),
            FieldValue::Tickers(Some(tickers)) => write!(f, "{:?}", tickers),
            FieldValue::Currency(currency) => write!(f, "{:?}", currency.as_str()),
        }
    }
}

/// Load a JSON array of records from a file
pub fn load_records(path: impl AsRef<Path>) -> Result<Vec<ClassifiedRecord>> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)?;
    serde_json::from_str(&content).map_err(|e| DealscoreError::InvalidRecord(format!("{}: {}", path.display(), e)))
}
