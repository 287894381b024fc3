use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Direction of an invoice: issued to a client or received from a supplier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum InvoiceType {
    Emis,
    Recus,
}

impl InvoiceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceType::Emis => "EMIS",
            InvoiceType::Recus => "RECUS",
        }
    }
}

/// Invoice record as returned by the backend.
///
/// `file_path` and `invoice_data` are filled in asynchronously by the
/// backend (upload, then OCR and LLM extraction).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Invoice {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub file_path: Option<String>,
    pub created_at: DateTime<Utc>,
    pub date: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: InvoiceType,
    #[serde(default)]
    pub user_id: Option<i64>,
    #[serde(default)]
    pub invoice_data: Option<Vec<InvoiceData>>,
}

impl Invoice {
    /// Sum of the extracted line items, zero while nothing was extracted.
    pub fn total_amount(&self) -> f64 {
        self.invoice_data
            .as_deref()
            .unwrap_or_default()
            .iter()
            .map(|item| item.amount)
            .sum()
    }
}

/// Line item extracted from the source document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceData {
    pub id: i64,
    pub content: String,
    pub amount: f64,
    #[serde(default)]
    pub invoice_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateInvoiceInput {
    pub name: String,
    pub date: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: InvoiceType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag_ids: Option<Vec<i64>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateInvoiceInput {
    pub id: i64,
    #[serde(flatten)]
    pub fields: CreateInvoiceInput,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginatedInvoiceResponse {
    pub invoices: Vec<Invoice>,
    pub total: u64,
    pub page: u32,
    pub limit: u32,
    pub total_pages: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub total_pages: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Pagination {
            page: 1,
            limit: 10,
            total: 0,
            total_pages: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub token: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginCredentials {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub remember_me: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterCredentials {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub accept_terms: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyTotals {
    pub month: String,
    pub revenue: f64,
    pub expenses: f64,
    pub profit: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardStats {
    pub total_invoices: usize,
    pub uploaded: usize,
    pub processing: usize,
    pub completed: usize,
    pub revenue_total: f64,
    pub expense_total: f64,
    pub revenue_month: f64,
    pub expense_month: f64,
    pub profit_month: f64,
    pub chart: Vec<MonthlyTotals>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invoice_deserializes_backend_payload() {
        let payload = r#"{
            "id": 7,
            "name": "Hosting March",
            "filePath": "uploads/7.pdf",
            "createdAt": "2024-03-02T10:00:00.000Z",
            "date": "2024-03-01T00:00:00.000Z",
            "type": "RECUS",
            "invoiceData": [
                {"id": 1, "content": "VPS", "amount": 12.5},
                {"id": 2, "content": "Backup", "amount": 3.0}
            ]
        }"#;

        let invoice: Invoice = serde_json::from_str(payload).unwrap();
        assert_eq!(invoice.kind, InvoiceType::Recus);
        assert_eq!(invoice.file_path.as_deref(), Some("uploads/7.pdf"));
        assert_eq!(invoice.user_id, None);
        assert!((invoice.total_amount() - 15.5).abs() < f64::EPSILON);
    }

    #[test]
    fn update_input_flattens_fields() {
        let input = UpdateInvoiceInput {
            id: 3,
            fields: CreateInvoiceInput {
                name: "Design work".to_string(),
                date: "2024-05-10T00:00:00Z".parse().unwrap(),
                kind: InvoiceType::Emis,
                tag_ids: None,
            },
        };

        let value = serde_json::to_value(&input).unwrap();
        assert_eq!(value["id"], 3);
        assert_eq!(value["name"], "Design work");
        assert_eq!(value["type"], "EMIS");
        assert!(value.get("tagIds").is_none());
    }
}
