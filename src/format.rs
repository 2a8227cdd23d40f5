//! Text rendering of server-computed portfolio and budget figures.

use std::collections::BTreeSet;
use std::fmt::Write;

use crate::types::{BudgetChartData, BudgetSummary, CategoryKind, CategoryTotal, PortfolioSummary};

const BAR_WIDTH: usize = 30;

/// `$1,234.50`, `-$12.00`, or `-` when the value is unknown
pub fn currency(value: Option<f64>) -> String {
    match value {
        Some(v) => money(v, "$"),
        None => "-".to_string(),
    }
}

/// Two-decimal amount with thousands separators and a leading symbol
pub fn money(value: f64, symbol: &str) -> String {
    let cents = (value.abs() * 100.0).round() as u64;
    let sign = if value < 0.0 && cents > 0 { "-" } else { "" };
    let whole = group_thousands(cents / 100);
    format!("{}{}{}.{:02}", sign, symbol, whole, cents % 100)
}

/// `+12.34%` / `-3.10%`, empty when unknown
pub fn percent(value: Option<f64>) -> String {
    match value {
        Some(v) => {
            let rounded = (v * 100.0).round() / 100.0;
            if rounded < 0.0 {
                format!("{:.2}%", rounded)
            } else {
                // -0.0 and tiny negatives render as zero
                format!("+{:.2}%", rounded.abs())
            }
        }
        None => String::new(),
    }
}

fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Portfolio positions with per-symbol expandable transaction rows.
#[derive(Debug)]
pub struct PnlTable<'a> {
    summary: &'a PortfolioSummary,
    expanded: BTreeSet<String>,
}

impl<'a> PnlTable<'a> {
    pub fn new(summary: &'a PortfolioSummary) -> Self {
        Self {
            summary,
            expanded: BTreeSet::new(),
        }
    }

    /// Symbols are matched case-insensitively
    pub fn expand(&mut self, symbol: &str) {
        self.expanded.insert(symbol.to_uppercase());
    }

    pub fn collapse(&mut self, symbol: &str) {
        self.expanded.remove(&symbol.to_uppercase());
    }

    pub fn toggle(&mut self, symbol: &str) {
        let key = symbol.to_uppercase();
        if !self.expanded.remove(&key) {
            self.expanded.insert(key);
        }
    }

    pub fn expand_all(&mut self) {
        for item in &self.summary.items {
            self.expanded.insert(item.symbol.to_uppercase());
        }
    }

    pub fn is_expanded(&self, symbol: &str) -> bool {
        self.expanded.contains(&symbol.to_uppercase())
    }

    pub fn render(&self) -> String {
        let mut out = String::new();

        if let Some(portfolio) = &self.summary.portfolio {
            let _ = writeln!(out, "{} [{}]", portfolio.name, portfolio.kind.label());
        }

        if self.summary.items.is_empty() {
            out.push_str("No assets yet\n");
        } else {
            let _ = writeln!(
                out,
                "{:<10} {:>14} {:>14} {:>14} {:>16} {:>16} {:>9}",
                "SYMBOL", "AMOUNT", "AVG PRICE", "PRICE", "VALUE", "P/L", "P/L %"
            );
        }

        for item in &self.summary.items {
            let marker = match (item.transactions.is_empty(), self.is_expanded(&item.symbol)) {
                (true, _) => ' ',
                (false, true) => '-',
                (false, false) => '+',
            };
            let _ = writeln!(
                out,
                "{}{:<9} {:>14} {:>14} {:>14} {:>16} {:>16} {:>9}",
                marker,
                item.symbol,
                format_amount(item.amount),
                currency(item.avg_purchase_price),
                currency(item.current_price),
                currency(item.total_value),
                currency(item.profit_loss),
                percent(item.profit_loss_percentage),
            );

            if marker == '-' {
                for tx in &item.transactions {
                    let _ = writeln!(
                        out,
                        "    {:<4} {:>14} @ {:>12} {}  invested {}  now {}  {} {}",
                        tx.side.as_str(),
                        format_amount(tx.quantity),
                        currency(Some(tx.price)),
                        tx.date.format("%Y-%m-%d %H:%M"),
                        currency(tx.invested),
                        currency(tx.current_value),
                        currency(tx.profit_loss),
                        percent(tx.profit_loss_percentage),
                    );
                }
            }
        }

        let _ = writeln!(
            out,
            "Invested {}  Value {}  P/L {} {}",
            currency(Some(self.summary.total_invested)),
            currency(Some(self.summary.total_current_value)),
            currency(Some(self.summary.total_profit_loss)),
            percent(Some(self.summary.total_profit_loss_percentage)),
        );
        out
    }
}

fn format_amount(value: f64) -> String {
    let text = format!("{:.8}", value);
    let text = text.trim_end_matches('0').trim_end_matches('.');
    if text.is_empty() || text == "-" {
        "0".to_string()
    } else {
        text.to_string()
    }
}

/// Totals plus the most recent transactions, optionally limited to one kind
pub fn render_budget_summary(summary: &BudgetSummary, kind: Option<CategoryKind>, symbol: &str) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Income {}  Expense {}  Balance {}",
        money(summary.total_income, symbol),
        money(summary.total_expense, symbol),
        money(summary.balance, symbol),
    );

    let rows: Vec<_> = summary
        .transactions
        .iter()
        .filter(|tx| kind.is_none() || tx.kind() == kind)
        .collect();

    if rows.is_empty() {
        out.push_str("No transactions in this period\n");
        return out;
    }

    for tx in rows {
        let (icon, name) = match &tx.category {
            Some(category) => (category.icon.as_deref().unwrap_or(" "), category.name.as_str()),
            None => (" ", "Unknown"),
        };
        let signed = match tx.kind() {
            Some(CategoryKind::Expense) => -tx.amount,
            _ => tx.amount,
        };
        let _ = writeln!(
            out,
            "#{:<5} {}  {} {:<18} {:>14}  {}",
            tx.id,
            tx.date.format("%Y-%m-%d"),
            icon,
            name,
            money(signed, symbol),
            tx.description,
        );
    }
    out
}

/// Category breakdowns as bars plus the daily running balance
pub fn render_chart(chart: &BudgetChartData, symbol: &str) -> String {
    let mut out = String::new();
    render_category_bars(&mut out, "Expenses", &chart.expense_by_category, chart.total_expense, symbol);
    render_category_bars(&mut out, "Income", &chart.income_by_category, chart.total_income, symbol);

    if !chart.daily_totals.is_empty() {
        out.push_str("Daily\n");
        for day in &chart.daily_totals {
            let _ = writeln!(
                out,
                "  {}  +{:>12}  -{:>12}  = {:>14}",
                day.date,
                money(day.income, symbol),
                money(day.expense, symbol),
                money(day.balance, symbol),
            );
        }
    }
    out
}

fn render_category_bars(out: &mut String, title: &str, totals: &[CategoryTotal], grand_total: f64, symbol: &str) {
    if totals.is_empty() {
        return;
    }

    let _ = writeln!(out, "{} ({})", title, money(grand_total, symbol));
    let mut sorted: Vec<&CategoryTotal> = totals.iter().collect();
    sorted.sort_by(|a, b| b.total.total_cmp(&a.total));

    let max = sorted.first().map(|c| c.total).unwrap_or(0.0);
    for entry in sorted {
        let width = if max > 0.0 {
            ((entry.total / max) * BAR_WIDTH as f64).round() as usize
        } else {
            0
        };
        let share = if grand_total > 0.0 {
            entry.total / grand_total * 100.0
        } else {
            0.0
        };
        let _ = writeln!(
            out,
            "  {} {:<18} {:<width$} {:>14} {:>5.1}%",
            entry.icon.as_deref().unwrap_or(" "),
            entry.category,
            "#".repeat(width),
            money(entry.total, symbol),
            share,
            width = BAR_WIDTH,
        );
    }
}
