use super::types::ExpenseCategory;

pub const CLASSIFICATION_SYSTEM_PROMPT: &str = r#"
You convert the OCR text of a purchase receipt into one JSON object.
Do not explain, summarise or comment. Your reply MUST be the JSON object only.
If a field cannot be read from the text, use null (or an empty list for items).
"#;

/// Build the classification prompt for one receipt.
pub fn build_classification_prompt(receipt_text: &str) -> String {
    let categories = ExpenseCategory::ALL
        .iter()
        .map(|c| format!("\"{}\"", c.label()))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        r#"Follow this structure exactly:
{{
  "comercio": "string",
  "fecha": "string formatted YYYY-MM-DD",
  "items": [
    {{ "descripcion": "string", "precio": number }}
  ],
  "subtotal": number,
  "descuento": number,
  "total": number,
  "categoria": "string"
}}

"categoria" MUST be exactly one of: [{categories}].

<receipt>
{receipt_text}
</receipt>

JSON output:"#
    )
}
