use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::StructuringError;

/// Closed set of spending categories accepted by the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExpenseCategory {
    #[serde(rename = "Materia Prima")]
    MateriaPrima,
    #[serde(rename = "Bebidas")]
    Bebidas,
    #[serde(rename = "Limpieza y Descartables")]
    LimpiezaYDescartables,
    #[serde(rename = "Mantenimiento")]
    Mantenimiento,
    #[serde(rename = "Servicios")]
    Servicios,
    #[serde(rename = "Administrativo")]
    Administrativo,
    #[serde(rename = "Otro")]
    Otro,
}

impl ExpenseCategory {
    pub const ALL: [ExpenseCategory; 7] = [
        Self::MateriaPrima,
        Self::Bebidas,
        Self::LimpiezaYDescartables,
        Self::Mantenimiento,
        Self::Servicios,
        Self::Administrativo,
        Self::Otro,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Self::MateriaPrima => "Materia Prima",
            Self::Bebidas => "Bebidas",
            Self::LimpiezaYDescartables => "Limpieza y Descartables",
            Self::Mantenimiento => "Mantenimiento",
            Self::Servicios => "Servicios",
            Self::Administrativo => "Administrativo",
            Self::Otro => "Otro",
        }
    }

    /// Match a model-supplied label. Case and inner whitespace are ignored;
    /// anything outside the set is rejected.
    pub fn from_label(raw: &str) -> Option<Self> {
        let wanted = normalize_label(raw);
        Self::ALL
            .into_iter()
            .find(|c| normalize_label(c.label()) == wanted)
    }
}

impl std::fmt::Display for ExpenseCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

fn normalize_label(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// One purchased line on a receipt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub description: String,
    pub price: f64,
}

/// Classifier output for a single receipt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedReceipt {
    /// Finite and non-negative.
    pub total: f64,
    pub category: ExpenseCategory,
    pub merchant: Option<String>,
    pub date: Option<NaiveDate>,
    pub subtotal: Option<f64>,
    pub discount: Option<f64>,
    pub items: Vec<LineItem>,
}

/// Render line items as `desc ($price), ...` for operator logs.
pub fn render_items(items: &[LineItem]) -> String {
    items
        .iter()
        .map(|i| format!("{} (${:.2})", i.description, i.price))
        .collect::<Vec<_>>()
        .join(", ")
}

/// LLM client abstraction (allows mocking for tests)
pub trait LlmClient {
    fn generate(
        &self,
        model: &str,
        prompt: &str,
        system: &str,
    ) -> Result<String, StructuringError>;

    fn is_model_available(&self, model: &str) -> Result<bool, StructuringError>;
}

/// Raw receipt text → amount + category.
pub trait ReceiptClassifier {
    fn classify(&self, text: &str) -> Result<ClassifiedReceipt, StructuringError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_labels_roundtrip() {
        for category in ExpenseCategory::ALL {
            assert_eq!(ExpenseCategory::from_label(category.label()), Some(category));
        }
    }

    #[test]
    fn category_match_ignores_case_and_spacing() {
        assert_eq!(
            ExpenseCategory::from_label("materia prima"),
            Some(ExpenseCategory::MateriaPrima)
        );
        assert_eq!(
            ExpenseCategory::from_label("  LIMPIEZA   y descartables "),
            Some(ExpenseCategory::LimpiezaYDescartables)
        );
    }

    #[test]
    fn unknown_category_rejected() {
        assert_eq!(ExpenseCategory::from_label("Viajes"), None);
        assert_eq!(ExpenseCategory::from_label(""), None);
    }

    #[test]
    fn category_serializes_as_label() {
        let json = serde_json::to_string(&ExpenseCategory::LimpiezaYDescartables).unwrap();
        assert_eq!(json, "\"Limpieza y Descartables\"");
    }

    #[test]
    fn render_items_formats_prices() {
        let items = vec![
            LineItem { description: "Harina 000".into(), price: 1250.0 },
            LineItem { description: "Levadura".into(), price: 310.5 },
        ];
        assert_eq!(render_items(&items), "Harina 000 ($1250.00), Levadura ($310.50)");
        assert_eq!(render_items(&[]), "");
    }
}
