//! Ordered, named extractors for CRM response shapes.
//!
//! Several responses carry the same value under different keys depending on
//! endpoint version. Each lookup is an explicit list tried in order; the first
//! extractor that yields a non-empty value wins.

use serde_json::Value;

/// A named way of pulling one value out of a JSON document.
#[derive(Clone, Copy)]
pub struct Extractor<T: 'static> {
    pub name: &'static str,
    pub extract: fn(&Value) -> Option<T>,
}

impl<T> std::fmt::Debug for Extractor<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Extractor").field("name", &self.name).finish()
    }
}

/// Run `extractors` in order and return the first hit.
pub fn first_match<T>(extractors: &[Extractor<T>], value: &Value) -> Option<T> {
    extractors.iter().find_map(|e| (e.extract)(value))
}

/// Picks one representative out of a job's representative list.
#[derive(Clone, Copy)]
pub struct RepSelector {
    pub name: &'static str,
    pub select: fn(&[Value]) -> Option<&Value>,
}

impl std::fmt::Debug for RepSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RepSelector").field("name", &self.name).finish()
    }
}

// ---------------------------------------------------------------------------
// Status name
// ---------------------------------------------------------------------------

/// Status name on a current-milestone response.
pub const STATUS_NAME: &[Extractor<String>] = &[
    Extractor {
        name: "statusName",
        extract: status_name_field,
    },
    Extractor {
        name: "status.name",
        extract: nested_status_name,
    },
    Extractor {
        name: "name",
        extract: bare_name,
    },
];

fn status_name_field(v: &Value) -> Option<String> {
    non_empty_str(v.get("statusName"))
}

fn nested_status_name(v: &Value) -> Option<String> {
    non_empty_str(v.get("status").and_then(|s| s.get("name")))
}

fn bare_name(v: &Value) -> Option<String> {
    non_empty_str(v.get("name"))
}

/// Status name, or empty when no extractor matches.
pub fn status_name(response: &Value) -> String {
    first_match(STATUS_NAME, response).unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Representatives
// ---------------------------------------------------------------------------

/// Representative priority: sales owner, then company rep, then whoever is first.
pub const REP_PRIORITY: &[RepSelector] = &[
    RepSelector {
        name: "SalesOwner",
        select: sales_owner_rep,
    },
    RepSelector {
        name: "CompanyRepresentative",
        select: company_rep,
    },
    RepSelector {
        name: "first",
        select: first_rep,
    },
];

fn rep_of_type<'a>(reps: &'a [Value], rep_type: &str) -> Option<&'a Value> {
    reps.iter()
        .find(|r| r.get("type").and_then(Value::as_str) == Some(rep_type))
}

fn sales_owner_rep(reps: &[Value]) -> Option<&Value> {
    rep_of_type(reps, "SalesOwner")
}

fn company_rep(reps: &[Value]) -> Option<&Value> {
    rep_of_type(reps, "CompanyRepresentative")
}

fn first_rep(reps: &[Value]) -> Option<&Value> {
    reps.first()
}

/// Pick the representative that owns the sale.
pub fn select_rep(reps: &[Value]) -> Option<&Value> {
    REP_PRIORITY.iter().find_map(|s| (s.select)(reps))
}

/// `user.id` of a representative entry.
pub fn rep_user_id(rep: &Value) -> Option<String> {
    lenient_id(rep.get("user").and_then(|u| u.get("id")))
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

/// Display name of a directory user.
pub const USER_NAME: &[Extractor<String>] = &[
    Extractor {
        name: "displayName",
        extract: display_name,
    },
    Extractor {
        name: "firstName lastName",
        extract: full_name,
    },
    Extractor {
        name: "name",
        extract: bare_name,
    },
];

fn display_name(v: &Value) -> Option<String> {
    non_empty_str(v.get("displayName"))
}

fn full_name(v: &Value) -> Option<String> {
    let parts: Vec<String> = [v.get("firstName"), v.get("lastName")]
        .into_iter()
        .filter_map(non_empty_str)
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(" "))
    }
}

/// Identifier of a directory user.
pub fn user_id(user: &Value) -> Option<String> {
    lenient_id(user.get("id"))
}

// ---------------------------------------------------------------------------
// Money
// ---------------------------------------------------------------------------

/// Amount of one invoice, first non-zero field wins.
pub const INVOICE_AMOUNT: &[Extractor<f64>] = &[
    Extractor {
        name: "invoiceTotal",
        extract: invoice_total,
    },
    Extractor {
        name: "amount",
        extract: amount,
    },
    Extractor {
        name: "total",
        extract: total,
    },
    Extractor {
        name: "invoiceAmount",
        extract: invoice_amount,
    },
];

fn invoice_total(v: &Value) -> Option<f64> {
    non_zero_amount(v.get("invoiceTotal"))
}

fn amount(v: &Value) -> Option<f64> {
    non_zero_amount(v.get("amount"))
}

fn total(v: &Value) -> Option<f64> {
    non_zero_amount(v.get("total"))
}

fn invoice_amount(v: &Value) -> Option<f64> {
    non_zero_amount(v.get("invoiceAmount"))
}

/// Invoice amount, 0 when no field carries one.
pub fn invoice_amount_of(invoice: &Value) -> f64 {
    first_match(INVOICE_AMOUNT, invoice).unwrap_or(0.0)
}

/// Where a job's contract value lives on a financials response.
#[derive(Debug, Clone, PartialEq)]
pub enum ContractValue {
    /// `approvedJobValue` is present.
    Direct(f64),
    /// Only a reference to the full financials record is present.
    Reference(String),
    Missing,
}

/// Read the contract value from a financials response.
pub fn contract_value(financials: &Value) -> ContractValue {
    match financials.get("approvedJobValue") {
        Some(v) if !v.is_null() => match as_amount(v) {
            Some(amount) => ContractValue::Direct(amount),
            None => ContractValue::Missing,
        },
        _ => match lenient_id(financials.get("id")) {
            Some(id) => ContractValue::Reference(id),
            None => ContractValue::Missing,
        },
    }
}

/// Numeric value of a JSON number or numeric string.
pub fn as_amount(v: &Value) -> Option<f64> {
    let amount = match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    amount.filter(|n| n.is_finite())
}

// ---------------------------------------------------------------------------
// Shapes
// ---------------------------------------------------------------------------

/// List payload of a response: its `items` array, or the response itself when
/// it is a bare array.
pub fn items_of(response: &Value) -> &[Value] {
    match response {
        Value::Array(list) => list.as_slice(),
        _ => match response.get("items") {
            Some(Value::Array(list)) => list.as_slice(),
            _ => &[],
        },
    }
}

/// The string as sent, unless it is empty or all whitespace.
fn non_empty_str(v: Option<&Value>) -> Option<String> {
    v.and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .map(str::to_string)
}

fn non_zero_amount(v: Option<&Value>) -> Option<f64> {
    v.and_then(as_amount).filter(|n| *n != 0.0)
}

fn lenient_id(v: Option<&Value>) -> Option<String> {
    match v? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
