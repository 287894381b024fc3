use anyhow::{anyhow, Result};
use chrono::{Datelike, Months, NaiveDate};

use crate::models::{DashboardStats, Invoice, InvoiceType, MonthlyTotals};
use crate::services::status::{classify, InvoiceProcessingStatus};

const CHART_MONTHS: u32 = 12;

/// Aggregates the invoice list for `year_month` (`YYYY-MM`).
///
/// Issued invoices count as revenue, received ones as expenses. The chart
/// covers the twelve months ending at `year_month`.
pub fn build_dashboard(invoices: &[Invoice], year_month: &str) -> Result<DashboardStats> {
    let base_date = NaiveDate::parse_from_str(&format!("{}-01", year_month), "%Y-%m-%d")
        .map_err(|e| anyhow!("Invalid month {:?}: {}", year_month, e))?;

    let mut stats = DashboardStats {
        total_invoices: invoices.len(),
        uploaded: 0,
        processing: 0,
        completed: 0,
        revenue_total: 0.0,
        expense_total: 0.0,
        revenue_month: 0.0,
        expense_month: 0.0,
        profit_month: 0.0,
        chart: Vec::new(),
    };

    for invoice in invoices {
        match classify(invoice) {
            InvoiceProcessingStatus::Uploaded => stats.uploaded += 1,
            InvoiceProcessingStatus::Processing => stats.processing += 1,
            InvoiceProcessingStatus::Completed => stats.completed += 1,
            InvoiceProcessingStatus::Error => {}
        }
        match invoice.kind {
            InvoiceType::Emis => stats.revenue_total += invoice.total_amount(),
            InvoiceType::Recus => stats.expense_total += invoice.total_amount(),
        }
    }

    for offset in (0..CHART_MONTHS).rev() {
        let date = base_date
            .checked_sub_months(Months::new(offset))
            .ok_or_else(|| anyhow!("Invalid date"))?;
        let ym = format!("{}-{:02}", date.year(), date.month());
        let (revenue, expenses) = monthly_sums(invoices, date.year(), date.month());
        stats.chart.push(MonthlyTotals {
            month: ym,
            revenue,
            expenses,
            profit: revenue - expenses,
        });
    }

    if let Some(current) = stats.chart.last() {
        stats.revenue_month = current.revenue;
        stats.expense_month = current.expenses;
        stats.profit_month = current.profit;
    }

    Ok(stats)
}

fn monthly_sums(invoices: &[Invoice], year: i32, month: u32) -> (f64, f64) {
    invoices
        .iter()
        .filter(|inv| inv.date.year() == year && inv.date.month() == month)
        .fold((0.0, 0.0), |(revenue, expenses), inv| match inv.kind {
            InvoiceType::Emis => (revenue + inv.total_amount(), expenses),
            InvoiceType::Recus => (revenue, expenses + inv.total_amount()),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::InvoiceData;

    fn invoice(id: i64, kind: InvoiceType, date: &str, amounts: &[f64]) -> Invoice {
        Invoice {
            id,
            name: format!("#{}", id),
            file_path: Some(format!("uploads/{}.pdf", id)),
            created_at: date.parse().unwrap(),
            date: date.parse().unwrap(),
            kind,
            user_id: None,
            invoice_data: Some(
                amounts
                    .iter()
                    .enumerate()
                    .map(|(n, amount)| InvoiceData {
                        id: n as i64,
                        content: "item".to_string(),
                        amount: *amount,
                        invoice_id: Some(id),
                    })
                    .collect(),
            ),
        }
    }

    #[test]
    fn month_figures_and_chart_window() {
        let invoices = vec![
            invoice(1, InvoiceType::Emis, "2024-03-05T00:00:00Z", &[1000.0, 200.0]),
            invoice(2, InvoiceType::Recus, "2024-03-20T00:00:00Z", &[300.0]),
            invoice(3, InvoiceType::Emis, "2023-04-10T00:00:00Z", &[50.0]),
            invoice(4, InvoiceType::Emis, "2023-03-10T00:00:00Z", &[75.0]),
            invoice(5, InvoiceType::Recus, "2024-02-01T00:00:00Z", &[]),
        ];

        let stats = build_dashboard(&invoices, "2024-03").unwrap();
        assert_eq!(stats.total_invoices, 5);
        assert_eq!(stats.completed, 4);
        assert_eq!(stats.processing, 1);
        assert_eq!(stats.revenue_month, 1200.0);
        assert_eq!(stats.expense_month, 300.0);
        assert_eq!(stats.profit_month, 900.0);
        assert_eq!(stats.revenue_total, 1325.0);

        assert_eq!(stats.chart.len(), 12);
        assert_eq!(stats.chart[0].month, "2023-04");
        assert_eq!(stats.chart[0].revenue, 50.0);
        assert_eq!(stats.chart[11].month, "2024-03");
        assert!(stats.chart.iter().all(|m| m.month != "2023-03"));
    }

    #[test]
    fn rejects_malformed_month() {
        assert!(build_dashboard(&[], "2024-13").is_err());
        assert!(build_dashboard(&[], "March").is_err());
    }
}
