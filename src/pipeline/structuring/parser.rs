use chrono::NaiveDate;
use serde_json::{Map, Value};

use super::json_extract::extract_json_object;
use super::types::{ClassifiedReceipt, ExpenseCategory, LineItem};
use super::StructuringError;

/// Parse the classifier's reply into a receipt.
///
/// `total` and `categoria` are required and strict. The descriptive fields
/// (`comercio`, `fecha`, `subtotal`, `descuento`, `items`) are lenient:
/// anything unreadable is dropped rather than failing the receipt.
pub fn parse_classification_response(response: &str) -> Result<ClassifiedReceipt, StructuringError> {
    let json_str = extract_json_object(response)?;
    let value: Value = serde_json::from_str(&json_str)
        .map_err(|e| StructuringError::JsonParsing(e.to_string()))?;
    let obj = value
        .as_object()
        .ok_or_else(|| StructuringError::MalformedResponse("Top-level value is not an object".into()))?;

    let total = parse_total(obj)?;
    let category = parse_category(obj)?;

    Ok(ClassifiedReceipt {
        total,
        category,
        merchant: optional_str(obj, "comercio"),
        date: optional_str(obj, "fecha").and_then(|s| parse_receipt_date(&s)),
        subtotal: optional_amount(obj, "subtotal"),
        discount: optional_amount(obj, "descuento"),
        items: parse_items(obj),
    })
}

fn parse_total(obj: &Map<String, Value>) -> Result<f64, StructuringError> {
    let raw = obj.get("total").ok_or(StructuringError::MissingField("total"))?;
    let total = raw.as_f64().ok_or_else(|| StructuringError::InvalidField {
        field: "total",
        reason: format!("expected a number, got {raw}"),
    })?;
    if !total.is_finite() || total < 0.0 {
        return Err(StructuringError::InvalidField {
            field: "total",
            reason: format!("must be a non-negative amount, got {total}"),
        });
    }
    Ok(total)
}

fn parse_category(obj: &Map<String, Value>) -> Result<ExpenseCategory, StructuringError> {
    let raw = obj
        .get("categoria")
        .ok_or(StructuringError::MissingField("categoria"))?;
    let label = raw.as_str().ok_or_else(|| StructuringError::InvalidField {
        field: "categoria",
        reason: format!("expected a string, got {raw}"),
    })?;
    ExpenseCategory::from_label(label)
        .ok_or_else(|| StructuringError::UnknownCategory(label.to_string()))
}

fn optional_str(obj: &Map<String, Value>, key: &str) -> Option<String> {
    obj.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

fn optional_amount(obj: &Map<String, Value>, key: &str) -> Option<f64> {
    obj.get(key)
        .and_then(Value::as_f64)
        .filter(|v| v.is_finite())
}

/// Accepts `YYYY-MM-DD` only.
pub fn parse_receipt_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok()
}

fn parse_items(obj: &Map<String, Value>) -> Vec<LineItem> {
    let Some(items) = obj.get("items").and_then(Value::as_array) else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| {
            let description = item.get("descripcion")?.as_str()?.trim();
            let price = item.get("precio")?.as_f64()?;
            if description.is_empty() || !price.is_finite() {
                return None;
            }
            Some(LineItem {
                description: description.to_string(),
                price,
            })
        })
        .collect()
}
