//! Simulated document store backend.

use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::Mutex;

type Document = Map<String, Value>;

/// Simulated client document storage, keyed by `(client_id, doc_type)`.
pub struct DocumentStore {
    documents: Mutex<HashMap<String, HashMap<String, Document>>>,
}

impl DocumentStore {
    pub fn new() -> Self {
        Self {
            documents: Mutex::new(HashMap::new()),
        }
    }

    /// Store seeded with the sample document set.
    pub fn sample() -> Self {
        let store = Self::new();
        for client in ["john_smith_123", "test_client_complete"] {
            store.seed_document(
                client,
                "drivers_license",
                obj(json!({"status": "valid", "uploaded": true, "verified": true})),
            );
            let income = if client == "john_smith_123" { 145_000 } else { 120_000 };
            store.seed_document(
                client,
                "tax_return_2023",
                obj(json!({"status": "valid", "income": income, "year": 2023})),
            );
            store.seed_document(
                client,
                "ira_application",
                obj(json!({"status": "valid", "signature_complete": true, "submitted": true})),
            );
        }
        store
    }

    /// Map free-form document type names onto stored keys.
    ///
    /// Agents describe documents in prose ("driver's license", "tax
    /// return"); the store answers for the canonical key.
    pub fn normalize_doc_type(doc_type: &str) -> String {
        let lower = doc_type.to_lowercase();
        let lower = lower.trim();
        if lower.contains("driver") || lower.contains("license") {
            "drivers_license".into()
        } else if lower.contains("tax") || lower.contains("return") || lower.contains("income") {
            "tax_return_2023".into()
        } else if lower.contains("application") || (lower.contains("ira") && lower.contains("form"))
        {
            "ira_application".into()
        } else if matches!(
            lower,
            "roth_ira" | "traditional_ira" | "roth ira" | "traditional ira"
        ) {
            "ira_application".into()
        } else {
            doc_type.to_string()
        }
    }

    /// Insert or replace a document.
    pub fn seed_document(&self, client_id: &str, doc_type: &str, data: Document) {
        let key = Self::normalize_doc_type(doc_type);
        self.documents
            .lock()
            .unwrap()
            .entry(client_id.to_string())
            .or_default()
            .insert(key, data);
    }

    /// Fetch a document, resolving doc-type aliases.
    pub fn document(&self, client_id: &str, doc_type: &str) -> Option<Document> {
        let key = Self::normalize_doc_type(doc_type);
        self.documents
            .lock()
            .unwrap()
            .get(client_id)
            .and_then(|docs| docs.get(&key))
            .cloned()
    }

    /// Idempotent create-or-replace.
    pub fn upsert(&self, client_id: &str, doc_type: &str, data: Document) {
        self.seed_document(client_id, doc_type, data);
    }

    /// Replace an existing document. Returns `false` when absent.
    pub fn update(&self, client_id: &str, doc_type: &str, data: Document) -> bool {
        let key = Self::normalize_doc_type(doc_type);
        let mut all = self.documents.lock().unwrap();
        match all.get_mut(client_id) {
            Some(docs) if docs.contains_key(&key) => {
                docs.insert(key, data);
                true
            }
            _ => false,
        }
    }

    /// All document type keys stored for a client.
    pub fn list(&self, client_id: &str) -> Vec<String> {
        self.documents
            .lock()
            .unwrap()
            .get(client_id)
            .map(|docs| {
                let mut keys: Vec<String> = docs.keys().cloned().collect();
                keys.sort();
                keys
            })
            .unwrap_or_default()
    }
}

impl Default for DocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

fn obj(value: Value) -> Document {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_doc_type_normalization() {
        assert_eq!(
            DocumentStore::normalize_doc_type("Driver's License"),
            "drivers_license"
        );
        assert_eq!(DocumentStore::normalize_doc_type("tax return"), "tax_return_2023");
        assert_eq!(
            DocumentStore::normalize_doc_type("IRA application form"),
            "ira_application"
        );
        assert_eq!(DocumentStore::normalize_doc_type("roth_ira"), "ira_application");
        assert_eq!(DocumentStore::normalize_doc_type("w2_2022"), "w2_2022");
    }

    #[test]
    fn test_sample_and_lookup() {
        let store = DocumentStore::sample();
        let doc = store.document("john_smith_123", "tax return").unwrap();
        assert_eq!(doc.get("income"), Some(&json!(145_000)));
        assert!(store.document("john_smith_123", "w2_2022").is_none());
        assert_eq!(store.list("john_smith_123").len(), 3);
    }

    #[test]
    fn test_update_requires_existing() {
        let store = DocumentStore::new();
        let data = obj(json!({"status": "draft"}));
        assert!(!store.update("c1", "ira_application", data.clone()));
        store.upsert("c1", "ira_application", data);
        assert!(store.update("c1", "ira_application", obj(json!({"status": "submitted"}))));
        let doc = store.document("c1", "ira_application").unwrap();
        assert_eq!(doc.get("status"), Some(&json!("submitted")));
    }
}
