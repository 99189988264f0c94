use super::parser::parse_classification_response;
use super::prompt::{build_classification_prompt, CLASSIFICATION_SYSTEM_PROMPT};
use super::types::{render_items, ClassifiedReceipt, LlmClient, ReceiptClassifier};
use super::StructuringError;

/// Characters of a rejected reply kept in the warning log.
const RESPONSE_PREVIEW_CHARS: usize = 200;

/// Classifies receipt text with a single LLM call.
pub struct LlmReceiptClassifier {
    llm: Box<dyn LlmClient + Send + Sync>,
    model: String,
}

impl LlmReceiptClassifier {
    pub fn new(llm: Box<dyn LlmClient + Send + Sync>, model: &str) -> Self {
        Self {
            llm,
            model: model.to_string(),
        }
    }
}

impl ReceiptClassifier for LlmReceiptClassifier {
    fn classify(&self, text: &str) -> Result<ClassifiedReceipt, StructuringError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(StructuringError::InputEmpty);
        }

        let _span = tracing::info_span!("classify_receipt", model = %self.model).entered();

        let prompt = build_classification_prompt(text);
        let response = self
            .llm
            .generate(&self.model, &prompt, CLASSIFICATION_SYSTEM_PROMPT)?;

        let receipt = parse_classification_response(&response).inspect_err(|e| {
            let preview: String = response.chars().take(RESPONSE_PREVIEW_CHARS).collect();
            tracing::warn!(error = %e, response = %preview, "Classifier reply rejected");
        })?;

        tracing::info!(
            total = receipt.total,
            category = %receipt.category,
            merchant = receipt.merchant.as_deref().unwrap_or("-"),
            items = %render_items(&receipt.items),
            "Receipt classified"
        );

        Ok(receipt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::structuring::{ExpenseCategory, MockLlmClient};
    use std::sync::Arc;

    struct SharedLlm(Arc<MockLlmClient>);

    impl LlmClient for SharedLlm {
        fn generate(&self, model: &str, prompt: &str, system: &str) -> Result<String, StructuringError> {
            self.0.generate(model, prompt, system)
        }
        fn is_model_available(&self, model: &str) -> Result<bool, StructuringError> {
            self.0.is_model_available(model)
        }
    }

    #[test]
    fn classifies_valid_reply() {
        let classifier = LlmReceiptClassifier::new(
            Box::new(MockLlmClient::new(r#"{"total": 340.0, "categoria": "Materia Prima"}"#)),
            "gemini-1.5-flash",
        );
        let receipt = classifier.classify("HARINA 25KG 340,00").unwrap();
        assert_eq!(receipt.total, 340.0);
        assert_eq!(receipt.category, ExpenseCategory::MateriaPrima);
    }

    #[test]
    fn prompt_carries_receipt_text() {
        let mock = Arc::new(MockLlmClient::new(r#"{"total": 1, "categoria": "Otro"}"#));
        let classifier = LlmReceiptClassifier::new(Box::new(SharedLlm(mock.clone())), "m");
        classifier.classify("  FERRETERIA EL CLAVO  ").unwrap();
        assert!(mock.last_prompt().unwrap().contains("FERRETERIA EL CLAVO"));
    }

    #[test]
    fn empty_text_never_calls_llm() {
        let mock = Arc::new(MockLlmClient::new("{}"));
        let classifier = LlmReceiptClassifier::new(Box::new(SharedLlm(mock.clone())), "m");
        assert!(matches!(
            classifier.classify(" \n "),
            Err(StructuringError::InputEmpty)
        ));
        assert_eq!(mock.call_count(), 0);
    }

    #[test]
    fn prose_reply_is_rejected() {
        let classifier =
            LlmReceiptClassifier::new(Box::new(MockLlmClient::new("I cannot help with that.")), "m");
        assert!(matches!(
            classifier.classify("text"),
            Err(StructuringError::MalformedResponse(_))
        ));
    }

    #[test]
    fn llm_failure_propagates() {
        let classifier =
            LlmReceiptClassifier::new(Box::new(MockLlmClient::unreachable("http://x")), "m");
        assert!(matches!(
            classifier.classify("text"),
            Err(StructuringError::Connection(_))
        ));
    }
}
