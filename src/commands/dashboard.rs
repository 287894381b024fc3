use anyhow::Result;
use chrono::{Datelike, Local};

use crate::commands::App;
use crate::services::dashboard::build_dashboard;
use crate::utils::format_amount;

pub async fn stats(app: &App, year_month: Option<String>) -> Result<()> {
    app.require_session()?;
    let now = Local::now();
    let year_month = year_month.unwrap_or_else(|| format!("{}-{:02}", now.year(), now.month()));

    app.store.set_loading(true);
    let page = match app.client.list_invoices(1, 100).await {
        Ok(page) => page,
        Err(err) => {
            app.store.set_error(err.to_string());
            return Err(err.into());
        }
    };
    app.store.load_page(page);

    let stats = build_dashboard(&app.store.invoices(), &year_month)?;
    println!(
        "Invoices: {} ({} uploaded, {} processing, {} processed)",
        stats.total_invoices, stats.uploaded, stats.processing, stats.completed
    );
    println!("Revenue {}: {}", year_month, format_amount(stats.revenue_month));
    println!("Expenses {}: {}", year_month, format_amount(stats.expense_month));
    println!("Profit {}: {}", year_month, format_amount(stats.profit_month));
    println!(
        "Total revenue: {}  total expenses: {}",
        format_amount(stats.revenue_total),
        format_amount(stats.expense_total)
    );
    println!();
    for month in &stats.chart {
        println!(
            "{}  revenue {:>10}  expenses {:>10}  profit {:>10}",
            month.month,
            format_amount(month.revenue),
            format_amount(month.expenses),
            format_amount(month.profit)
        );
    }
    Ok(())
}
