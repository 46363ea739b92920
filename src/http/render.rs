//! HTML outcome pages for the approval callbacks.

use std::fmt::Write;

use crate::workflow::{BatchOutcome, RejectOutcome, SingleOutcome};

const STYLE: &str = "body{font-family:sans-serif;max-width:40rem;margin:3rem auto;padding:0 1rem}\
.ok{color:#1a7f37}.err{color:#cf222e}table{border-collapse:collapse}\
td,th{border:1px solid #d0d7de;padding:.3rem .6rem;text-align:left}";

fn page(title: &str, class: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html><html><head><meta charset=\"utf-8\"><title>{title}</title>\
         <style>{STYLE}</style></head><body><h1 class=\"{class}\">{title}</h1>{body}</body></html>",
        title = escape(title),
    )
}

/// Escape text for inclusion in HTML.
#[must_use]
pub fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Page shown after a single reorder was approved and ordered.
#[must_use]
pub fn single_approved(outcome: &SingleOutcome) -> String {
    let delivery = outcome
        .order
        .delivery_date
        .map_or_else(|| "not provided".to_owned(), |d| d.to_string());
    let body = format!(
        "<p>Ordered {qty} units of <b>{sku}</b> from {vendor}.</p>\
         <p>Order id: <code>{order}</code><br>Expected delivery: {delivery}</p>",
        qty = outcome.quantity,
        sku = escape(&outcome.sku),
        vendor = escape(&outcome.vendor),
        order = escape(&outcome.order.order_id),
    );
    page("Order approved", "ok", &body)
}

/// Page listing the per-line result of a batch approval.
#[must_use]
pub fn batch_approved(outcome: &BatchOutcome) -> String {
    let mut body = format!(
        "<p>{} of {} orders placed.</p>",
        outcome.approved.len(),
        outcome.approved.len() + outcome.failed.len()
    );
    if !outcome.approved.is_empty() {
        body.push_str("<h2>Ordered</h2><table><tr><th>SKU</th><th>Vendor</th><th>Qty</th><th>Order id</th></tr>");
        for line in &outcome.approved {
            let _ = write!(
                body,
                "<tr><td>{}</td><td>{}</td><td>{}</td><td><code>{}</code></td></tr>",
                escape(&line.item.sku),
                escape(&line.item.vendor),
                line.item.quantity,
                escape(&line.order.order_id)
            );
        }
        body.push_str("</table>");
    }
    if !outcome.failed.is_empty() {
        body.push_str("<h2 class=\"err\">Failed</h2><table><tr><th>SKU</th><th>Vendor</th><th>Qty</th><th>Error</th></tr>");
        for line in &outcome.failed {
            let _ = write!(
                body,
                "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
                escape(&line.item.sku),
                escape(&line.item.vendor),
                line.item.quantity,
                escape(&line.error)
            );
        }
        body.push_str("</table>");
    }
    let (title, class) = if outcome.failed.is_empty() {
        ("Batch approved", "ok")
    } else {
        ("Batch approved with failures", "err")
    };
    page(title, class, &body)
}

/// Page shown after a rejection.
#[must_use]
pub fn rejected(outcome: &RejectOutcome) -> String {
    let skus: Vec<String> = outcome.skus.iter().map(|s| escape(s)).collect();
    let body = format!(
        "<p>No order was placed for: {}.</p><p>Alternative vendors will be evaluated in the next cycle.</p>",
        skus.join(", ")
    );
    page("Request rejected", "ok", &body)
}

/// Generic error page.
#[must_use]
pub fn error(status: u16, message: &str) -> String {
    let title = match status {
        400 => "Bad request",
        403 => "Forbidden",
        404 => "Not found",
        _ => "Something went wrong",
    };
    page(title, "err", &format!("<p>{}</p>", escape(message)))
}
