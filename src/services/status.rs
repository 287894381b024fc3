use serde::Serialize;

use crate::models::Invoice;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum InvoiceProcessingStatus {
    Uploaded,
    Processing,
    Completed,
    /// Declared for display; no record field produces it yet.
    Error,
}

impl InvoiceProcessingStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            InvoiceProcessingStatus::Completed | InvoiceProcessingStatus::Error
        )
    }

    pub fn label(&self) -> &'static str {
        match self {
            InvoiceProcessingStatus::Uploaded => "Uploaded",
            InvoiceProcessingStatus::Processing => "Processing...",
            InvoiceProcessingStatus::Completed => "Processed",
            InvoiceProcessingStatus::Error => "Error",
        }
    }
}

/// First match wins: no document, then no extracted lines, then done.
pub fn classify(invoice: &Invoice) -> InvoiceProcessingStatus {
    let has_file = invoice
        .file_path
        .as_deref()
        .map(|path| !path.is_empty())
        .unwrap_or(false);
    if !has_file {
        return InvoiceProcessingStatus::Uploaded;
    }

    match invoice.invoice_data.as_deref() {
        None | Some([]) => InvoiceProcessingStatus::Processing,
        Some(_) => InvoiceProcessingStatus::Completed,
    }
}

pub fn is_pending(invoice: &Invoice) -> bool {
    classify(invoice) == InvoiceProcessingStatus::Processing
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{InvoiceData, InvoiceType};

    fn invoice(file_path: Option<&str>, invoice_data: Option<Vec<InvoiceData>>) -> Invoice {
        Invoice {
            id: 1,
            name: "test".to_string(),
            file_path: file_path.map(str::to_string),
            created_at: "2024-01-01T00:00:00Z".parse().unwrap(),
            date: "2024-01-01T00:00:00Z".parse().unwrap(),
            kind: InvoiceType::Emis,
            user_id: None,
            invoice_data,
        }
    }

    fn line() -> InvoiceData {
        InvoiceData {
            id: 1,
            content: "a".to_string(),
            amount: 10.0,
            invoice_id: None,
        }
    }

    #[test]
    fn classify_follows_precedence() {
        use InvoiceProcessingStatus::*;

        let cases = [
            (None, None, Uploaded),
            (None, Some(vec![]), Uploaded),
            (None, Some(vec![line()]), Uploaded),
            (Some("x"), None, Processing),
            (Some("x"), Some(vec![]), Processing),
            (Some("x"), Some(vec![line()]), Completed),
        ];

        for (file_path, data, expected) in cases {
            assert_eq!(classify(&invoice(file_path, data.clone())), expected);
        }
    }

    #[test]
    fn empty_file_path_counts_as_missing() {
        let inv = invoice(Some(""), Some(vec![line()]));
        assert_eq!(classify(&inv), InvoiceProcessingStatus::Uploaded);
        assert!(!is_pending(&inv));
    }

    #[test]
    fn terminal_states() {
        assert!(InvoiceProcessingStatus::Completed.is_terminal());
        assert!(InvoiceProcessingStatus::Error.is_terminal());
        assert!(!InvoiceProcessingStatus::Processing.is_terminal());
        assert!(!InvoiceProcessingStatus::Uploaded.is_terminal());
    }
}
