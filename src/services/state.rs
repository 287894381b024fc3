use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;

use crate::models::{Invoice, PaginatedInvoiceResponse, Pagination};
use crate::services::status::is_pending;

pub const STORAGE_FILE: &str = "invoice-storage.json";

#[derive(Debug, Clone, Default)]
pub struct InvoiceState {
    pub invoices: Vec<Invoice>,
    pub current_invoice: Option<Invoice>,
    pub loading: bool,
    pub error: Option<String>,
    pub pagination: Pagination,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PersistedState {
    invoices: Vec<Invoice>,
    current_invoice: Option<Invoice>,
    pagination: Pagination,
}

#[derive(Clone)]
pub struct InvoiceStore {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    state: Mutex<InvoiceState>,
    changes: watch::Sender<u64>,
    persist_path: Option<PathBuf>,
}

impl InvoiceStore {
    pub fn in_memory() -> Self {
        Self::with_state(InvoiceState::default(), None)
    }

    /// Opens a store backed by `path`, hydrating from it when it exists.
    pub fn persistent(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let state = match hydrate(&path) {
            Ok(Some(state)) => state,
            Ok(None) => InvoiceState::default(),
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "Ignoring unreadable invoice storage");
                InvoiceState::default()
            }
        };
        Self::with_state(state, Some(path))
    }

    fn with_state(state: InvoiceState, persist_path: Option<PathBuf>) -> Self {
        let (changes, _) = watch::channel(0);
        InvoiceStore {
            inner: Arc::new(StoreInner {
                state: Mutex::new(state),
                changes,
                persist_path,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, InvoiceState> {
        match self.inner.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn snapshot(&self) -> InvoiceState {
        self.lock().clone()
    }

    pub fn invoices(&self) -> Vec<Invoice> {
        self.lock().invoices.clone()
    }

    pub fn current_invoice(&self) -> Option<Invoice> {
        self.lock().current_invoice.clone()
    }

    pub fn find(&self, id: i64) -> Option<Invoice> {
        self.lock().invoices.iter().find(|inv| inv.id == id).cloned()
    }

    /// Ids of the invoices still waiting for backend extraction.
    pub fn pending_ids(&self) -> Vec<i64> {
        self.lock()
            .invoices
            .iter()
            .filter(|inv| is_pending(inv))
            .map(|inv| inv.id)
            .collect()
    }

    /// Receiver whose value increments on every change.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.inner.changes.subscribe()
    }

    /// Applies `f`, persisting while the lock is still held.
    pub fn update<R>(&self, f: impl FnOnce(&mut InvoiceState) -> R) -> R {
        let result = {
            let mut state = self.lock();
            let result = f(&mut state);
            if let Some(path) = &self.inner.persist_path {
                let persisted = PersistedState {
                    invoices: state.invoices.clone(),
                    current_invoice: state.current_invoice.clone(),
                    pagination: state.pagination.clone(),
                };
                if let Err(err) = write_state(path, &persisted) {
                    tracing::warn!(path = %path.display(), error = %err, "Failed to persist invoice storage");
                }
            }
            result
        };

        self.inner.changes.send_modify(|version| *version += 1);
        result
    }

    pub fn set_invoices(&self, invoices: Vec<Invoice>) {
        self.update(|state| state.invoices = invoices);
    }

    pub fn load_page(&self, page: PaginatedInvoiceResponse) {
        self.update(|state| {
            state.invoices = page.invoices;
            state.pagination = Pagination {
                page: page.page,
                limit: page.limit,
                total: page.total,
                total_pages: page.total_pages,
            };
            state.loading = false;
        });
    }

    pub fn prepend_invoice(&self, invoice: Invoice) {
        self.update(|state| {
            state.invoices.insert(0, invoice.clone());
            state.current_invoice = Some(invoice);
            state.loading = false;
        });
    }

    /// Replaces the entry with the same id by the canonical record.
    ///
    /// Returns false when the invoice is no longer in the list; the list is
    /// left untouched in that case.
    pub fn replace_invoice(&self, invoice: Invoice) -> bool {
        self.update(|state| {
            if state
                .current_invoice
                .as_ref()
                .is_some_and(|current| current.id == invoice.id)
            {
                state.current_invoice = Some(invoice.clone());
            }
            match state.invoices.iter_mut().find(|inv| inv.id == invoice.id) {
                Some(slot) => {
                    *slot = invoice;
                    true
                }
                None => false,
            }
        })
    }

    pub fn remove_invoice(&self, id: i64) -> bool {
        self.update(|state| {
            let before = state.invoices.len();
            state.invoices.retain(|inv| inv.id != id);
            if state.current_invoice.as_ref().is_some_and(|inv| inv.id == id) {
                state.current_invoice = None;
            }
            state.loading = false;
            state.invoices.len() != before
        })
    }

    pub fn set_current(&self, invoice: Option<Invoice>) {
        self.update(|state| state.current_invoice = invoice);
    }

    pub fn set_loading(&self, loading: bool) {
        self.update(|state| {
            state.loading = loading;
            if loading {
                state.error = None;
            }
        });
    }

    pub fn set_error(&self, message: impl Into<String>) {
        let message = message.into();
        self.update(|state| {
            state.loading = false;
            state.error = Some(message);
        });
    }

    pub fn clear_error(&self) {
        self.update(|state| state.error = None);
    }
}

fn hydrate(path: &Path) -> Result<Option<InvoiceState>> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = std::fs::read(path)?;
    let persisted: PersistedState = serde_json::from_slice(&raw)?;
    Ok(Some(InvoiceState {
        invoices: persisted.invoices,
        current_invoice: persisted.current_invoice,
        pagination: persisted.pagination,
        loading: false,
        error: None,
    }))
}

fn write_state(path: &Path, persisted: &PersistedState) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_vec_pretty(persisted)?;
    std::fs::write(path, json)?;
    Ok(())
}
