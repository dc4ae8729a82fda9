use serde::Serialize;
use std::fmt;

/// Value shown for a field that could not be read off the label.
pub const NOT_AVAILABLE: &str = "N/A";

/// The three fields printed on a product label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    BatchNo,
    MfgDate,
    ExpDate,
}

impl Field {
    /// All fields, in the order they appear when assigned positionally.
    pub const ALL: [Field; 3] = [Field::BatchNo, Field::MfgDate, Field::ExpDate];

    pub fn key(self) -> &'static str {
        match self {
            Field::BatchNo => "batch_no",
            Field::MfgDate => "mfg_date",
            Field::ExpDate => "exp_date",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Classification output: one value per [`Field`], never empty.
///
/// Missing values are always the [`NOT_AVAILABLE`] sentinel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldRecord {
    batch_no: String,
    mfg_date: String,
    exp_date: String,
}

impl FieldRecord {
    /// Build a record from possibly-unresolved slots. `None` and empty strings
    /// both become the sentinel.
    pub fn from_slots(
        batch_no: Option<String>,
        mfg_date: Option<String>,
        exp_date: Option<String>,
    ) -> Self {
        Self {
            batch_no: or_sentinel(batch_no),
            mfg_date: or_sentinel(mfg_date),
            exp_date: or_sentinel(exp_date),
        }
    }

    /// A record with every field set to the sentinel.
    pub fn unavailable() -> Self {
        Self::from_slots(None, None, None)
    }

    pub fn get(&self, field: Field) -> &str {
        match field {
            Field::BatchNo => &self.batch_no,
            Field::MfgDate => &self.mfg_date,
            Field::ExpDate => &self.exp_date,
        }
    }

    pub fn batch_no(&self) -> &str {
        &self.batch_no
    }

    pub fn mfg_date(&self) -> &str {
        &self.mfg_date
    }

    pub fn exp_date(&self) -> &str {
        &self.exp_date
    }

    pub fn is_available(&self, field: Field) -> bool {
        self.get(field) != NOT_AVAILABLE
    }

    /// `(key, value)` pairs in [`Field::ALL`] order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> + '_ {
        Field::ALL.into_iter().map(move |f| (f.key(), self.get(f)))
    }
}

impl Default for FieldRecord {
    fn default() -> Self {
        Self::unavailable()
    }
}

impl fmt::Display for FieldRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (key, value) in self.iter() {
            writeln!(f, "{key}: {value}")?;
        }
        Ok(())
    }
}

fn or_sentinel(slot: Option<String>) -> String {
    match slot {
        Some(v) if !v.is_empty() => v,
        _ => NOT_AVAILABLE.to_string(),
    }
}
