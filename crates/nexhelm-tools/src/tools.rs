//! The standard tool set over the simulated backends.
//!
//! One struct per tool; [`standard_registry`] wires them all against a
//! shared set of backends and a clock.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use crate::backends::{AccountSystem, Crm, DocumentStore, NotificationSink};
use crate::clock::Clock;
use crate::error::ToolError;
use crate::registry::{Tool, ToolOutput, ToolRegistry};

/// Roth IRA income limit for a single filer (2024).
const ROTH_IRA_INCOME_LIMIT: u64 = 161_000;

/// Build a registry with every standard tool registered.
pub fn standard_registry(
    crm: Arc<Crm>,
    documents: Arc<DocumentStore>,
    accounts: Arc<AccountSystem>,
    notifier: Arc<NotificationSink>,
    clock: Arc<dyn Clock>,
) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(GetClientInfo {
        crm: crm.clone(),
        documents: documents.clone(),
    });
    registry.register(CheckEligibility {
        crm: crm.clone(),
        documents: documents.clone(),
    });
    registry.register(GetDocument {
        documents: documents.clone(),
    });
    registry.register(ValidateDocument {
        crm: crm.clone(),
        documents: documents.clone(),
    });
    registry.register(CreateDocument {
        documents: documents.clone(),
    });
    registry.register(UpdateDocument { documents });
    registry.register(OpenAccount {
        crm: crm.clone(),
        accounts: accounts.clone(),
        clock: clock.clone(),
    });
    registry.register(SendNotification {
        crm,
        notifier,
        clock,
    });
    registry.register(GetAccount {
        accounts: accounts.clone(),
    });
    registry.register(ListAccounts { accounts });
    registry
}

fn require_str<'a>(params: &'a ToolOutput, key: &str) -> Result<&'a str, ToolError> {
    params
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ToolError::InvalidArgument(format!("Missing or invalid parameter: {key}")))
}

fn require_object<'a>(params: &'a ToolOutput, key: &str) -> Result<&'a Map<String, Value>, ToolError> {
    params
        .get(key)
        .and_then(Value::as_object)
        .ok_or_else(|| ToolError::InvalidArgument(format!("Parameter {key} must be an object")))
}

fn out(value: Value) -> ToolOutput {
    match value {
        Value::Object(map) => map,
        other => {
            let mut map = Map::new();
            map.insert("value".into(), other);
            map
        }
    }
}

/// `get_client_info` — CRM record plus the client's document inventory.
struct GetClientInfo {
    crm: Arc<Crm>,
    documents: Arc<DocumentStore>,
}

#[async_trait]
impl Tool for GetClientInfo {
    fn name(&self) -> &str {
        "get_client_info"
    }

    fn description(&self) -> &str {
        "Get comprehensive client information including documents"
    }

    async fn invoke(&self, params: &ToolOutput) -> Result<ToolOutput, ToolError> {
        let client_id = require_str(params, "client_id")?;
        let client = self
            .crm
            .client(client_id)
            .ok_or_else(|| ToolError::NotFound(format!("Client {client_id} not found")))?;

        let available = self.documents.list(client_id);
        let mut docs = Map::new();
        for doc_type in &available {
            if let Some(doc) = self.documents.document(client_id, doc_type) {
                docs.insert(doc_type.clone(), Value::Object(doc));
            }
        }

        Ok(out(json!({
            "client": client,
            "documents": docs,
            "available_documents": available,
        })))
    }
}

/// `check_eligibility` — product eligibility from the client's tax return.
struct CheckEligibility {
    crm: Arc<Crm>,
    documents: Arc<DocumentStore>,
}

#[async_trait]
impl Tool for CheckEligibility {
    fn name(&self) -> &str {
        "check_eligibility"
    }

    fn description(&self) -> &str {
        "Check client eligibility for financial products"
    }

    async fn invoke(&self, params: &ToolOutput) -> Result<ToolOutput, ToolError> {
        let client_id = require_str(params, "client_id")?;
        let product_type = require_str(params, "product_type")?;

        if !self.crm.contains(client_id) {
            return Err(ToolError::NotFound(format!("Client {client_id} not found")));
        }

        if product_type.to_lowercase() != "roth_ira" {
            return Ok(out(json!({
                "eligible": true,
                "reason": format!("No eligibility constraints configured for {product_type}"),
            })));
        }

        // Income is verified against the filed tax return, not the CRM field.
        let Some(tax_doc) = self.documents.document(client_id, "tax_return_2023") else {
            return Ok(out(json!({
                "eligible": false,
                "reason": "No tax return found for income verification",
            })));
        };

        let income = tax_doc.get("income").and_then(Value::as_u64).unwrap_or(0);
        if income >= ROTH_IRA_INCOME_LIMIT {
            return Ok(out(json!({
                "eligible": false,
                "reason": format!(
                    "Income ${income} exceeds Roth IRA limit of ${ROTH_IRA_INCOME_LIMIT}"
                ),
                "income": income,
                "limit": ROTH_IRA_INCOME_LIMIT,
            })));
        }

        Ok(out(json!({
            "eligible": true,
            "reason": format!("Income ${income} is within Roth IRA limit"),
            "income": income,
            "limit": ROTH_IRA_INCOME_LIMIT,
        })))
    }
}

/// `get_document` — fetch a single client document.
struct GetDocument {
    documents: Arc<DocumentStore>,
}

#[async_trait]
impl Tool for GetDocument {
    fn name(&self) -> &str {
        "get_document"
    }

    fn description(&self) -> &str {
        "Get a specific document for a client"
    }

    async fn invoke(&self, params: &ToolOutput) -> Result<ToolOutput, ToolError> {
        let client_id = require_str(params, "client_id")?;
        let doc_type = require_str(params, "doc_type")?;

        let doc = self.documents.document(client_id, doc_type).ok_or_else(|| {
            ToolError::NotFound(format!("Document {doc_type} not found for client {client_id}"))
        })?;

        Ok(out(json!({
            "document": doc,
            "doc_type": DocumentStore::normalize_doc_type(doc_type),
            "client_id": client_id,
        })))
    }
}

/// `validate_document` — completeness rules per document family.
struct ValidateDocument {
    crm: Arc<Crm>,
    documents: Arc<DocumentStore>,
}

#[async_trait]
impl Tool for ValidateDocument {
    fn name(&self) -> &str {
        "validate_document"
    }

    fn description(&self) -> &str {
        "Validate a document for completeness and accuracy"
    }

    async fn invoke(&self, params: &ToolOutput) -> Result<ToolOutput, ToolError> {
        let client_id = require_str(params, "client_id")?;
        let doc_type = require_str(params, "doc_type")?;

        if !self.crm.contains(client_id) {
            return Err(ToolError::NotFound(format!("Client {client_id} not found")));
        }
        let doc = self.documents.document(client_id, doc_type).ok_or_else(|| {
            ToolError::NotFound(format!("Document {doc_type} not found for client {client_id}"))
        })?;

        let key = DocumentStore::normalize_doc_type(doc_type);
        let mut errors: Vec<String> = Vec::new();
        let mut warnings: Vec<String> = Vec::new();

        match key.as_str() {
            "ira_application" => {
                if !doc.get("signature_complete").and_then(Value::as_bool).unwrap_or(false) {
                    errors.push("Missing client signature".into());
                }
                if !doc.get("submitted").and_then(Value::as_bool).unwrap_or(false) {
                    warnings.push("Application not yet submitted".into());
                }
            }
            "tax_return_2023" => {
                if doc.get("income").and_then(Value::as_u64).is_none() {
                    errors.push("Income information missing".into());
                }
                if doc.get("year").and_then(Value::as_i64) != Some(2023) {
                    errors.push("Tax return year must be 2023".into());
                }
            }
            _ => {
                if doc.get("status").and_then(Value::as_str) == Some("invalid") {
                    errors.push(format!("Document {key} is marked invalid"));
                }
            }
        }

        // Any document may be force-failed by fixture data.
        if doc.get("valid").and_then(Value::as_bool) == Some(false) {
            errors.push(format!("Document {key} failed verification"));
        }

        Ok(out(json!({
            "valid": errors.is_empty(),
            "errors": errors,
            "warnings": warnings,
            "document": doc,
        })))
    }
}

/// `create_document` — idempotent upsert.
struct CreateDocument {
    documents: Arc<DocumentStore>,
}

#[async_trait]
impl Tool for CreateDocument {
    fn name(&self) -> &str {
        "create_document"
    }

    fn description(&self) -> &str {
        "Create a new document for a client"
    }

    async fn invoke(&self, params: &ToolOutput) -> Result<ToolOutput, ToolError> {
        let client_id = require_str(params, "client_id")?;
        let doc_type = require_str(params, "doc_type")?;
        let data = require_object(params, "data")?;

        self.documents.upsert(client_id, doc_type, data.clone());
        let doc = self
            .documents
            .document(client_id, doc_type)
            .unwrap_or_default();

        Ok(out(json!({
            "document": doc,
            "doc_type": DocumentStore::normalize_doc_type(doc_type),
            "client_id": client_id,
        })))
    }
}

/// `update_document` — replace an existing document.
struct UpdateDocument {
    documents: Arc<DocumentStore>,
}

#[async_trait]
impl Tool for UpdateDocument {
    fn name(&self) -> &str {
        "update_document"
    }

    fn description(&self) -> &str {
        "Update a document for a client"
    }

    async fn invoke(&self, params: &ToolOutput) -> Result<ToolOutput, ToolError> {
        let client_id = require_str(params, "client_id")?;
        let doc_type = require_str(params, "doc_type")?;
        let data = require_object(params, "data")?;

        if !self.documents.update(client_id, doc_type, data.clone()) {
            return Err(ToolError::NotFound(format!(
                "Document {doc_type} not found for client {client_id}"
            )));
        }
        let doc = self
            .documents
            .document(client_id, doc_type)
            .unwrap_or_default();

        Ok(out(json!({
            "document": doc,
            "doc_type": DocumentStore::normalize_doc_type(doc_type),
            "client_id": client_id,
        })))
    }
}

/// `open_account` — create an account, at most one of a type per client.
struct OpenAccount {
    crm: Arc<Crm>,
    accounts: Arc<AccountSystem>,
    clock: Arc<dyn Clock>,
}

#[async_trait]
impl Tool for OpenAccount {
    fn name(&self) -> &str {
        "open_account"
    }

    fn description(&self) -> &str {
        "Open a new account for a client"
    }

    async fn invoke(&self, params: &ToolOutput) -> Result<ToolOutput, ToolError> {
        let client_id = require_str(params, "client_id")?;
        let account_type = require_str(params, "account_type")?;

        if !self.crm.contains(client_id) {
            return Err(ToolError::NotFound(format!("Client {client_id} not found")));
        }

        let record = self
            .accounts
            .open_account(client_id, account_type, self.clock.now())?;

        Ok(out(json!({
            "account_number": record.account_number,
            "account_type": record.account_type,
            "status": record.status,
            "created_at": record.created_at,
        })))
    }
}

/// `send_notification` — append to the notification log.
struct SendNotification {
    crm: Arc<Crm>,
    notifier: Arc<NotificationSink>,
    clock: Arc<dyn Clock>,
}

#[async_trait]
impl Tool for SendNotification {
    fn name(&self) -> &str {
        "send_notification"
    }

    fn description(&self) -> &str {
        "Send a notification to a client"
    }

    async fn invoke(&self, params: &ToolOutput) -> Result<ToolOutput, ToolError> {
        let client_id = require_str(params, "client_id")?;
        let kind = require_str(params, "type")?;
        let content = require_str(params, "content")?;

        if !self.crm.contains(client_id) {
            return Err(ToolError::NotFound(format!("Client {client_id} not found")));
        }

        let notification = self.notifier.send(client_id, kind, content, self.clock.now());

        Ok(out(json!({
            "sent": true,
            "type": notification.kind,
            "content": notification.content,
        })))
    }
}

/// `get_account` — look up an account by number.
struct GetAccount {
    accounts: Arc<AccountSystem>,
}

#[async_trait]
impl Tool for GetAccount {
    fn name(&self) -> &str {
        "get_account"
    }

    fn description(&self) -> &str {
        "Get account information by account number"
    }

    async fn invoke(&self, params: &ToolOutput) -> Result<ToolOutput, ToolError> {
        let account_number = require_str(params, "account_number")?;
        let account = self.accounts.account(account_number).ok_or_else(|| {
            ToolError::NotFound(format!("Account {account_number} not found"))
        })?;
        Ok(out(json!({ "account": account })))
    }
}

/// `list_accounts` — audit listing, optionally filtered by client.
struct ListAccounts {
    accounts: Arc<AccountSystem>,
}

#[async_trait]
impl Tool for ListAccounts {
    fn name(&self) -> &str {
        "list_accounts"
    }

    fn description(&self) -> &str {
        "List all accounts, optionally filtered by client"
    }

    async fn invoke(&self, params: &ToolOutput) -> Result<ToolOutput, ToolError> {
        let accounts = match params.get("client_id").and_then(Value::as_str) {
            Some(client_id) => self.accounts.accounts_for(client_id),
            None => self.accounts.all_accounts(),
        };
        Ok(out(json!({
            "total": accounts.len(),
            "accounts": accounts,
        })))
    }
}
