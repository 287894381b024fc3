use anyhow::{anyhow, Result};
use std::collections::HashMap;
use std::path::Path;

use crate::commands::App;
use crate::models::{CreateInvoiceInput, Invoice, UpdateInvoiceInput};
use crate::services::importer::{collect_documents, default_name};
use crate::services::poller::{InvoicePoller, PollerOptions};
use crate::services::status::{classify, InvoiceProcessingStatus};
use crate::utils::format_amount;

pub async fn list(app: &App, page: u32, limit: u32) -> Result<()> {
    app.require_session()?;
    app.store.set_loading(true);
    match app.client.list_invoices(page, limit).await {
        Ok(response) => app.store.load_page(response),
        Err(err) => {
            app.store.set_error(err.to_string());
            return Err(err.into());
        }
    }

    let state = app.store.snapshot();
    for invoice in &state.invoices {
        print_summary(invoice);
    }
    println!(
        "Page {}/{} ({} invoices)",
        state.pagination.page, state.pagination.total_pages, state.pagination.total
    );
    Ok(())
}

pub async fn show(app: &App, id: i64) -> Result<()> {
    app.require_session()?;
    let invoice = fetch_current(app, id).await?;

    print_summary(&invoice);
    println!("  date:     {}", invoice.date.format("%Y-%m-%d"));
    println!("  created:  {}", invoice.created_at.format("%Y-%m-%d %H:%M"));
    if let Some(path) = &invoice.file_path {
        println!("  document: {}", path);
    }
    for line in invoice.invoice_data.as_deref().unwrap_or_default() {
        println!("  - {:<40} {:>10}", line.content, format_amount(line.amount));
    }
    Ok(())
}

pub async fn create(app: &App, input: CreateInvoiceInput, file: Option<&Path>) -> Result<()> {
    app.require_session()?;
    app.store.set_loading(true);
    let result = match file {
        Some(path) => app.client.create_invoice_with_file(path, &input).await,
        None => app.client.create_invoice(&input).await,
    };
    let invoice = match result {
        Ok(invoice) => invoice,
        Err(err) => {
            app.store.set_error(err.to_string());
            return Err(err.into());
        }
    };

    tracing::info!(invoice_id = invoice.id, "Invoice created");
    app.store.prepend_invoice(invoice.clone());
    println!("Created invoice {} ({})", invoice.id, classify(&invoice).label());
    Ok(())
}

pub async fn update(app: &App, input: UpdateInvoiceInput, file: Option<&Path>) -> Result<()> {
    app.require_session()?;
    app.store.set_loading(true);
    let result = match file {
        Some(path) => {
            app.client
                .update_invoice_with_file(input.id, path, &input.fields)
                .await
        }
        None => app.client.update_invoice(&input).await,
    };
    let invoice = match result {
        Ok(invoice) => invoice,
        Err(err) => {
            app.store.set_error(err.to_string());
            return Err(err.into());
        }
    };

    app.store.replace_invoice(invoice.clone());
    app.store.set_current(Some(invoice.clone()));
    app.store.set_loading(false);
    println!("Updated invoice {} ({})", invoice.id, classify(&invoice).label());
    Ok(())
}

pub async fn delete(app: &App, id: i64) -> Result<()> {
    app.require_session()?;
    app.store.set_loading(true);
    match app.client.delete_invoice(id).await {
        Ok(true) => {
            app.store.remove_invoice(id);
            println!("Deleted invoice {}", id);
            Ok(())
        }
        Ok(false) => {
            app.store.set_error(format!("Invoice {} was not deleted", id));
            Err(anyhow!("Invoice {} was not deleted", id))
        }
        Err(err) => {
            app.store.set_error(err.to_string());
            Err(err.into())
        }
    }
}

/// Uploads every document of `folder`; one failed upload does not stop
/// the others.
pub async fn import(app: &App, folder: &Path, template: CreateInvoiceInput) -> Result<()> {
    app.require_session()?;
    let documents = collect_documents(folder)?;
    if documents.is_empty() {
        println!("No importable document in {}", folder.display());
        return Ok(());
    }

    let mut imported = 0;
    for path in &documents {
        let input = CreateInvoiceInput {
            name: default_name(path),
            ..template.clone()
        };
        match app.client.create_invoice_with_file(path, &input).await {
            Ok(invoice) => {
                imported += 1;
                app.store.prepend_invoice(invoice);
            }
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "Import failed");
            }
        }
    }

    println!("Imported {}/{} documents", imported, documents.len());
    Ok(())
}

pub async fn open_document(app: &App, id: i64) -> Result<()> {
    app.require_session()?;
    let invoice = match app.store.find(id) {
        Some(invoice) => invoice,
        None => fetch_current(app, id).await?,
    };
    let path = invoice
        .file_path
        .filter(|path| !path.is_empty())
        .ok_or_else(|| anyhow!("Invoice {} has no document", id))?;

    let url = if path.starts_with("http://") || path.starts_with("https://") {
        path
    } else {
        app.client.rest_url(&path)
    };
    open::that(&url).map_err(|e| anyhow!("Open {}: {}", url, e))?;
    Ok(())
}

/// Loads the first page and keeps processing invoices fresh until all of
/// them are processed or Ctrl-C is pressed.
pub async fn watch(app: &App, options: PollerOptions, limit: u32) -> Result<()> {
    app.require_session()?;
    let page = app.client.list_invoices(1, limit).await?;
    app.store.load_page(page);

    let poller = InvoicePoller::new(app.client.clone(), app.store.clone(), options);
    poller.start();
    println!("{} invoice(s) processing", poller.pending_count());

    let end = follow_progress(&poller, async {
        let _ = tokio::signal::ctrl_c().await;
    })
    .await;
    match end {
        WatchEnd::NothingPending => println!("Nothing to poll"),
        WatchEnd::NotScheduled => println!("Polling not scheduled"),
        WatchEnd::Drained => println!("All invoices processed"),
        WatchEnd::Interrupted => {}
    }

    poller.stop();
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WatchEnd {
    NothingPending,
    NotScheduled,
    Drained,
    Interrupted,
}

/// Prints status transitions until the poller has nothing left to do or
/// `shutdown` resolves.
async fn follow_progress(poller: &InvoicePoller, shutdown: impl std::future::Future<Output = ()>) -> WatchEnd {
    let store = poller.store();
    let mut changes = store.subscribe();
    let mut last_seen = statuses(&store.invoices());
    let mut refreshed = false;

    tokio::pin!(shutdown);
    loop {
        if poller.pending_count() == 0 {
            return if refreshed { WatchEnd::Drained } else { WatchEnd::NothingPending };
        }
        if !poller.is_scheduled() {
            return WatchEnd::NotScheduled;
        }

        tokio::select! {
            _ = &mut shutdown => return WatchEnd::Interrupted,
            changed = changes.changed() => {
                if changed.is_err() {
                    return WatchEnd::Interrupted;
                }
                let current = statuses(&store.invoices());
                for (id, status) in &current {
                    if last_seen.get(id).is_some_and(|previous| previous != status) {
                        println!("Invoice {}: {}", id, status.label());
                    }
                }
                last_seen = current;
                refreshed = true;
            }
        }
    }
}

async fn fetch_current(app: &App, id: i64) -> Result<Invoice> {
    app.store.set_loading(true);
    match app.client.get_invoice(id).await {
        Ok(invoice) => {
            app.store.replace_invoice(invoice.clone());
            app.store.set_current(Some(invoice.clone()));
            app.store.set_loading(false);
            Ok(invoice)
        }
        Err(err) => {
            app.store.set_error(err.to_string());
            Err(err.into())
        }
    }
}

fn statuses(invoices: &[Invoice]) -> HashMap<i64, InvoiceProcessingStatus> {
    invoices.iter().map(|inv| (inv.id, classify(inv))).collect()
}

fn print_summary(invoice: &Invoice) {
    println!(
        "{:>6}  {:<5}  {:<30}  {:>10}  {}",
        invoice.id,
        invoice.kind.as_str(),
        invoice.name,
        format_amount(invoice.total_amount()),
        classify(invoice).label()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiError;
    use crate::models::{InvoiceData, InvoiceType};
    use crate::services::poller::InvoiceFetcher;
    use crate::services::state::InvoiceStore;
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::time::Duration;

    struct Extracted;

    #[async_trait]
    impl InvoiceFetcher for Extracted {
        async fn fetch_invoice(&self, id: i64) -> Result<Invoice, ApiError> {
            let mut invoice = processing(id);
            invoice.invoice_data = Some(vec![InvoiceData {
                id: 1,
                content: "line".to_string(),
                amount: 12.5,
                invoice_id: Some(id),
            }]);
            Ok(invoice)
        }
    }

    fn processing(id: i64) -> Invoice {
        Invoice {
            id,
            name: format!("invoice {}", id),
            file_path: Some("uploads/doc.pdf".to_string()),
            created_at: "2024-06-01T08:00:00Z".parse().unwrap(),
            date: "2024-06-01T00:00:00Z".parse().unwrap(),
            kind: InvoiceType::Emis,
            user_id: None,
            invoice_data: Some(vec![]),
        }
    }

    fn started_poller(invoices: Vec<Invoice>, interval_ms: i64) -> InvoicePoller {
        let store = InvoiceStore::in_memory();
        store.set_invoices(invoices);
        let poller = InvoicePoller::new(
            Arc::new(Extracted),
            store,
            PollerOptions {
                enabled: true,
                interval_ms,
                fetch_timeout: Some(Duration::from_secs(10)),
            },
        );
        poller.start();
        poller
    }

    #[tokio::test(start_paused = true)]
    async fn follow_returns_when_interval_is_not_positive() {
        let poller = started_poller(vec![processing(1)], 0);
        assert!(poller.is_polling());

        let end = follow_progress(&poller, std::future::pending()).await;
        assert_eq!(end, WatchEnd::NotScheduled);
    }

    #[tokio::test(start_paused = true)]
    async fn follow_returns_when_disabled() {
        let poller = started_poller(vec![processing(1)], 5_000);
        poller.set_enabled(false);

        let end = follow_progress(&poller, std::future::pending()).await;
        assert_eq!(end, WatchEnd::NotScheduled);
    }

    #[tokio::test(start_paused = true)]
    async fn follow_returns_once_everything_is_extracted() {
        let poller = started_poller(vec![processing(1), processing(2)], 1_000);

        let end = follow_progress(&poller, std::future::pending()).await;
        assert_eq!(end, WatchEnd::Drained);
        assert_eq!(poller.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn follow_with_empty_list_has_nothing_to_do() {
        let poller = started_poller(vec![], 1_000);

        let end = follow_progress(&poller, std::future::pending()).await;
        assert_eq!(end, WatchEnd::NothingPending);
    }

    #[tokio::test(start_paused = true)]
    async fn follow_stops_on_shutdown() {
        let poller = started_poller(vec![processing(1)], 60_000);

        let end = follow_progress(&poller, tokio::time::sleep(Duration::from_secs(1))).await;
        assert_eq!(end, WatchEnd::Interrupted);
    }
}
