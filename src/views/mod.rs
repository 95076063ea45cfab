//! HTML pages

use std::fmt::Write as _;

use crate::models::DateGroups;

pub const NO_DATA: &str = "No data found";

/// Plain-text body for a ticker without usable estimates.
pub fn no_data_for_ticker(ticker: &str) -> String {
    format!("No data found for ticker: {}", ticker)
}

/// Escape text for HTML element and attribute content.
pub fn escape_html(raw: &str) -> String {
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

const STYLE: &str = "body{font-family:sans-serif;margin:2rem;color:#222}\
table{border-collapse:collapse;margin-bottom:1.5rem;min-width:24rem}\
th,td{border:1px solid #ccc;padding:.3rem .6rem;text-align:left}\
th{background:#f3f3f3}\
.summary{white-space:pre-wrap;background:#fafafa;border:1px solid #eee;padding:1rem}";

fn page(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <title>{title}</title>\n<style>{STYLE}</style>\n</head>\n<body>\n{body}</body>\n</html>\n",
        title = escape_html(title),
    )
}

/// Blank when the score is missing.
fn format_score(value: Option<f64>) -> String {
    match value {
        Some(v) if v.fract() == 0.0 => format!("{:.0}", v),
        Some(v) => format!("{}", v),
        None => String::new(),
    }
}

/// Dashboard of upcoming earnings, one table per date.
pub fn render_dashboard(groups: &DateGroups) -> String {
    let mut body = String::from("<h1>Most Anticipated Earnings</h1>\n");
    for (date, rows) in groups.iter() {
        let _ = writeln!(body, "<h2>{}</h2>", escape_html(date));
        body.push_str("<table>\n<thead><tr><th>Symbol</th><th>Rank</th><th>Growth</th></tr></thead>\n<tbody>\n");
        for row in rows {
            let symbol = escape_html(&row.symbol);
            let _ = writeln!(
                body,
                "<tr><td><a href=\"/stock/{symbol}\">{symbol}</a></td><td>{}</td><td>{}</td></tr>",
                format_score(row.rank),
                format_score(row.growth),
            );
        }
        body.push_str("</tbody>\n</table>\n");
    }
    page("Most Anticipated Earnings", &body)
}

/// Detail page for one ticker.
///
/// `chart_path` is relative to the static root; `None` means rendering
/// failed and the page says so instead of showing a broken image.
pub fn render_stock_details(ticker: &str, chart_path: Option<&str>, summary: Option<&str>) -> String {
    let ticker_html = escape_html(ticker);
    let mut body = format!("<h1>EPS Estimates for {}</h1>\n", ticker_html);

    match chart_path {
        Some(path) => {
            let _ = writeln!(
                body,
                "<img src=\"/static/{}\" alt=\"EPS chart for {}\">",
                escape_html(path),
                ticker_html
            );
        }
        None => body.push_str("<p>Chart unavailable.</p>\n"),
    }

    if let Some(summary) = summary {
        let _ = writeln!(
            body,
            "<h2>Summary</h2>\n<div class=\"summary\">{}</div>",
            escape_html(summary)
        );
    }

    body.push_str("<p><a href=\"/most-anticipated\">Back to most anticipated</a></p>\n");
    page(&format!("{} details", ticker), &body)
}
