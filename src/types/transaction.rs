//! Transaction record structures and boundary validation

use crate::error::{DetectionError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Account identifier as carried by `from_acct`, `to_acct` and `id`
pub type AccountId = i64;

/// Ground-truth class value (1 = confirmed risk, 0 = confirmed clean)
pub type Label = i64;

/// Wire sentinel for "label unknown"
pub const UNKNOWN_LABEL: Label = -1;

/// A validated transaction between two accounts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// Labeling unit this record belongs to
    pub id: AccountId,
    /// Sending account
    pub from_acct: AccountId,
    /// Receiving account
    pub to_acct: AccountId,
    /// Transferred amount
    pub amount: f64,
    /// Known label, `None` when unknown
    pub label: Option<Label>,
}

impl TransactionRecord {
    pub fn new(
        id: AccountId,
        from_acct: AccountId,
        to_acct: AccountId,
        amount: f64,
        label: Option<Label>,
    ) -> Self {
        Self {
            id,
            from_acct,
            to_acct,
            amount,
            label,
        }
    }

    pub fn is_self_loop(&self) -> bool {
        self.from_acct == self.to_acct
    }
}

/// A record as it arrives on the wire, before validation.
///
/// Fields are kept as raw JSON so that numeric strings (`"10"`) and
/// float-typed integers (`1.0`) from dataframe exports are accepted,
/// while anything else is rejected with the offending field named.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawRecord {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub from_acct: Option<Value>,
    #[serde(default)]
    pub to_acct: Option<Value>,
    #[serde(default)]
    pub amount: Option<Value>,
    #[serde(default)]
    pub label: Option<Value>,
}

impl From<&TransactionRecord> for RawRecord {
    fn from(record: &TransactionRecord) -> Self {
        Self {
            id: Some(Value::from(record.id)),
            from_acct: Some(Value::from(record.from_acct)),
            to_acct: Some(Value::from(record.to_acct)),
            amount: Some(Value::from(record.amount)),
            label: record.label.map(Value::from),
        }
    }
}

impl RawRecord {
    /// Validate into a [`TransactionRecord`]; `index` is the record's
    /// position in its batch and is carried in the error.
    pub fn validate(&self, index: usize) -> Result<TransactionRecord> {
        let malformed = |reason: String| DetectionError::MalformedRecord { index, reason };

        let id = parse_integer("id", self.id.as_ref()).map_err(malformed)?;
        let from_acct = parse_integer("from_acct", self.from_acct.as_ref()).map_err(malformed)?;
        let to_acct = parse_integer("to_acct", self.to_acct.as_ref()).map_err(malformed)?;
        let amount = parse_amount(self.amount.as_ref()).map_err(malformed)?;
        let label = match self.label.as_ref() {
            None | Some(Value::Null) => None,
            Some(value) => match parse_integer("label", Some(value)).map_err(malformed)? {
                UNKNOWN_LABEL => None,
                label => Some(label),
            },
        };

        Ok(TransactionRecord {
            id,
            from_acct,
            to_acct,
            amount,
            label,
        })
    }
}

/// Validate a whole batch; the first malformed record fails it.
pub fn validate_records(raw: &[RawRecord]) -> Result<Vec<TransactionRecord>> {
    raw.iter()
        .enumerate()
        .map(|(index, record)| record.validate(index))
        .collect()
}

const I64_LOWER: f64 = -9_223_372_036_854_775_808.0;
const I64_UPPER: f64 = 9_223_372_036_854_775_808.0;

fn parse_integer(field: &str, value: Option<&Value>) -> std::result::Result<i64, String> {
    match value {
        None | Some(Value::Null) => Err(format!("missing field `{field}`")),
        Some(Value::Number(n)) => {
            if let Some(i) = n.as_i64() {
                return Ok(i);
            }
            if n.is_u64() {
                return Err(format!("`{field}` is out of range: {n}"));
            }
            match n.as_f64() {
                Some(f) if f.is_finite() && f.fract() == 0.0 => {
                    // `as` saturates; reject instead of merging distinct ids
                    if (I64_LOWER..I64_UPPER).contains(&f) {
                        Ok(f as i64)
                    } else {
                        Err(format!("`{field}` is out of range: {n}"))
                    }
                }
                _ => Err(format!("`{field}` is not an integer: {n}")),
            }
        }
        Some(Value::String(s)) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| format!("`{field}` is not an integer: {s:?}")),
        Some(other) => Err(format!("`{field}` has unexpected type: {other}")),
    }
}

fn parse_amount(value: Option<&Value>) -> std::result::Result<f64, String> {
    let amount = match value {
        None | Some(Value::Null) => return Err("missing field `amount`".to_string()),
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        Some(_) => None,
    };

    amount
        .filter(|a| a.is_finite())
        .ok_or_else(|| format!("`amount` is not numeric: {}", value.map_or(Value::Null, Clone::clone)))
}

/// Ingress message: one batch of records to analyse together
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransactionBatch {
    /// Caller-supplied batch identifier
    #[serde(default)]
    pub batch_id: Option<String>,
    /// Records in their original order
    pub records: Vec<RawRecord>,
}

impl TransactionBatch {
    pub fn from_records(records: &[TransactionRecord]) -> Self {
        Self {
            batch_id: Some(uuid::Uuid::new_v4().to_string()),
            records: records.iter().map(RawRecord::from).collect(),
        }
    }
}
