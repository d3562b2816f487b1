//! Rendering of notification texts.
//!
//! All messages use Telegram's HTML subset (`<b>`, `<a href>`); every
//! interpolated product field is escaped.

use std::fmt::Write;

use crate::diff::PriceChange;
use crate::models::Product;
use crate::stats::RunStats;

/// Which way a price moved.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PriceDirection {
    Increase(f64),
    Decrease(f64),
    /// Either price failed to parse, or the values are numerically equal.
    Changed,
}

impl PriceDirection {
    pub fn between(old_price: &str, new_price: &str) -> Self {
        match (old_price.trim().parse::<f64>(), new_price.trim().parse::<f64>()) {
            (Ok(old), Ok(new)) if old.is_finite() && new.is_finite() => {
                let delta = new - old;
                if delta > 0.0 {
                    PriceDirection::Increase(delta)
                } else if delta < 0.0 {
                    PriceDirection::Decrease(-delta)
                } else {
                    PriceDirection::Changed
                }
            }
            _ => PriceDirection::Changed,
        }
    }

    fn icon(&self) -> &'static str {
        match self {
            PriceDirection::Increase(_) => "📈",
            PriceDirection::Decrease(_) => "📉",
            PriceDirection::Changed => "💰",
        }
    }

    fn describe(&self) -> String {
        match self {
            PriceDirection::Increase(d) => format!("+{d:.2} SAR (increase)"),
            PriceDirection::Decrease(d) => format!("-{d:.2} SAR (decrease)"),
            PriceDirection::Changed => "price changed".to_string(),
        }
    }
}

/// Escape the characters Telegram's HTML parser treats specially.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

fn product_message(icon: &str, title: &str, product: &Product, timestamp: &str) -> String {
    format!(
        "{icon} <b>{title}</b>\n\n\
         📦 {name}\n\
         💵 Price: {price} SAR\n\
         🔗 <a href=\"{url}\">View product</a>\n\n\
         🕐 {timestamp}",
        name = escape_html(&product.name),
        price = escape_html(&product.price),
        url = escape_html(&product.url),
    )
}

pub fn new_product(product: &Product, timestamp: &str) -> String {
    product_message("🆕", "New product", product, timestamp)
}

pub fn out_of_stock(product: &Product, timestamp: &str) -> String {
    product_message("⚠️", "Out of stock", product, timestamp)
}

pub fn back_in_stock(product: &Product, timestamp: &str) -> String {
    product_message("✅", "Back in stock", product, timestamp)
}

pub fn deleted(product: &Product, timestamp: &str) -> String {
    product_message("🗑️", "Product removed", product, timestamp)
}

pub fn price_change(change: &PriceChange, timestamp: &str) -> String {
    let direction = PriceDirection::between(&change.old_price, &change.new_price);
    format!(
        "{icon} <b>Price change</b>\n\n\
         📦 {name}\n\
         Old: {old} SAR\n\
         New: {new} SAR\n\
         {diff}\n\
         🔗 <a href=\"{url}\">View product</a>\n\n\
         🕐 {timestamp}",
        icon = direction.icon(),
        name = escape_html(&change.product.name),
        old = escape_html(&change.old_price),
        new = escape_html(&change.new_price),
        diff = direction.describe(),
        url = escape_html(&change.product.url),
    )
}

/// End-of-run report, sent even when nothing changed.
pub fn summary(stats: &RunStats, timestamp: &str) -> String {
    let total_changes = stats.total_changes();
    let status_line = if total_changes == 0 {
        "✅ No new changes".to_string()
    } else {
        format!("🔔 {total_changes} change(s) detected")
    };

    let mut msg = String::new();
    let _ = writeln!(msg, "📊 <b>Check summary</b>");
    let _ = writeln!(msg, "🕐 {timestamp}\n");
    let _ = writeln!(msg, "📦 Total products: {}", stats.total);
    let _ = writeln!(msg, "✅ Available: {}", stats.available);
    let _ = writeln!(msg, "❌ Out of stock: {}\n", stats.out_of_stock);
    let _ = writeln!(msg, "<b>Changes</b>");
    let _ = writeln!(msg, "• New: {}", stats.new);
    let _ = writeln!(msg, "• Went out of stock: {}", stats.went_out);
    let _ = writeln!(msg, "• Back in stock: {}", stats.back_in);
    let _ = writeln!(msg, "• Removed: {}", stats.deleted);
    let _ = writeln!(msg, "• Price changes: {}\n", stats.price_changes);
    if stats.errors > 0 {
        let _ = writeln!(msg, "⚠️ Scan stopped early after a page failed to load\n");
    }
    msg.push_str(&status_line);
    msg
}

/// Single message replacing per-item notifications on the first run.
pub fn cold_start(new_products: &[Product], timestamp: &str) -> String {
    let total = new_products.len();
    let available = new_products.iter().filter(|p| p.is_available()).count();
    format!(
        "🚀 <b>Monitoring started</b>\n\n\
         Initial catalog snapshot recorded.\n\n\
         📦 Total products: {total}\n\
         ✅ Available: {available}\n\
         ❌ Out of stock: {out}\n\n\
         Changes will be reported from the next check.\n\n\
         🕐 {timestamp}",
        out = total - available,
    )
}

pub fn failure(error: &str, timestamp: &str) -> String {
    format!(
        "🚨 <b>Check failed</b>\n\n<code>{}</code>\n\n🕐 {timestamp}",
        escape_html(error)
    )
}
