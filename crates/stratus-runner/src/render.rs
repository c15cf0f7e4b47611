//! Static HTML and JSON views over reports and the report index.
//!
//! Every page is a self-contained document written next to the JSON it
//! was derived from, so the store can be served as-is by any web server.

use stratus_core::{Report, ReportEntry, ReportIndex, SuiteStatus, TestOutcome};

const PAGE_STYLE: &str = "body{font-family:sans-serif;margin:2em}\
table{border-collapse:collapse}\
td,th{border:1px solid #ccc;padding:4px 10px;text-align:left}\
.PASS{color:#2e7d32}.FAIL{color:#c62828}.NONE{color:#757575}.SKIP{color:#f9a825}";

fn html_escape(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn page(title: &str, body: &str) -> String {
    let mut html = String::new();
    html.push_str("<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\">");
    html.push_str(&format!("<title>{}</title>", html_escape(title)));
    html.push_str(&format!("<style>{PAGE_STYLE}</style>"));
    html.push_str("</head>\n<body>\n");
    html.push_str(body);
    html.push_str("</body></html>\n");
    html
}

fn status_cell(status: SuiteStatus) -> String {
    let tag = status.as_str();
    format!("<td class=\"{tag}\">{tag}</td>")
}

fn outcome_cell(outcome: TestOutcome) -> String {
    let tag = match outcome {
        TestOutcome::Pass => "PASS",
        TestOutcome::Fail => "FAIL",
        TestOutcome::Skip => "SKIP",
    };
    format!("<td class=\"{tag}\">{tag}</td>")
}

fn json_scalar(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Table of index entries. `link_prefix` rebases report links for pages
/// that do not live at the store root.
fn entry_table(providers: &[String], entries: &[&ReportEntry], link_prefix: &str) -> String {
    let mut table = String::new();
    table.push_str("<table>\n<tr><th>Bundle</th><th>Date</th>");
    for provider in providers {
        table.push_str(&format!("<th>{}</th>", html_escape(provider)));
    }
    table.push_str("<th>Test id</th></tr>\n");
    for entry in entries {
        table.push_str("<tr>");
        table.push_str(&format!(
            "<td><a href=\"{}{}\">{}</a></td>",
            link_prefix,
            entry.report_html_filename(),
            html_escape(&entry.bundle_name)
        ));
        table.push_str(&format!("<td>{}</td>", entry.date.format("%Y-%m-%d %H:%M")));
        for provider in providers {
            match entry.results.get(provider) {
                Some(status) => table.push_str(&status_cell(*status)),
                None => table.push_str("<td></td>"),
            }
        }
        table.push_str(&format!("<td>{}</td>", html_escape(&entry.test_id)));
        table.push_str("</tr>\n");
    }
    table.push_str("</table>\n");
    table
}

/// Full HTML page for a single report, one result table per provider.
pub fn report_page(report: &Report) -> String {
    let mut body = String::new();
    body.push_str(&format!("<h1>{}</h1>\n", html_escape(&report.bundle_name)));
    if let Some(url) = &report.url {
        body.push_str(&format!(
            "<p><a href=\"{0}\">{0}</a></p>\n",
            html_escape(url)
        ));
    }
    if let Some(label) = &report.test_label {
        body.push_str(&format!("<p>{}</p>\n", html_escape(label)));
    }
    body.push_str(&format!(
        "<p>Test id {} &middot; {}</p>\n",
        html_escape(&report.test_id),
        report.date.format("%Y-%m-%d %H:%M")
    ));

    for (provider, result) in &report.results {
        body.push_str(&format!("<h2>{}</h2>\n", html_escape(provider)));
        body.push_str("<table>\n<tr><th>Test</th><th>Result</th><th>Duration (s)</th></tr>\n");
        for test in &result.tests {
            body.push_str(&format!(
                "<tr><td>{}</td>{}<td>{:.2}</td></tr>\n",
                html_escape(&test.name),
                outcome_cell(test.outcome),
                test.duration_secs
            ));
        }
        table_close_with_status(&mut body, result.status);
    }

    if !report.benchmarks.is_empty() {
        body.push_str("<h2>Benchmarks</h2>\n");
        body.push_str(
            "<table>\n<tr><th>Benchmark</th><th>Provider</th><th>Value</th>\
             <th>Units</th><th>Direction</th></tr>\n",
        );
        for benchmark in &report.benchmarks {
            body.push_str(&format!(
                "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
                html_escape(&benchmark.name),
                html_escape(&benchmark.provider),
                html_escape(&json_scalar(&benchmark.value)),
                html_escape(benchmark.units.as_deref().unwrap_or("")),
                html_escape(benchmark.direction.as_deref().unwrap_or(""))
            ));
        }
        body.push_str("</table>\n");
    }

    page(&report.bundle_name, &body)
}

fn table_close_with_status(body: &mut String, status: SuiteStatus) {
    let tag = status.as_str();
    body.push_str(&format!(
        "<tr><td>overall</td><td class=\"{tag}\">{tag}</td><td></td></tr>\n</table>\n"
    ));
}

/// Front page listing every report, newest first.
pub fn index_page(index: &ReportIndex) -> String {
    let entries: Vec<&ReportEntry> = index.reports.iter().collect();
    let mut body = String::new();
    body.push_str("<h1>Test results</h1>\n");
    body.push_str(&format!(
        "<p><a href=\"{}\">Summary</a></p>\n",
        ReportIndex::SUMMARY_HTML
    ));
    body.push_str(&entry_table(&index.providers, &entries, ""));
    page("Test results", &body)
}

/// History page for one bundle, capped at the most recent
/// `results_per_bundle` entries.
pub fn bundle_page(index: &ReportIndex, bundle_name: &str, results_per_bundle: usize) -> String {
    let entries: Vec<&ReportEntry> = index
        .entries_for_bundle(bundle_name)
        .into_iter()
        .take(results_per_bundle)
        .collect();
    let mut body = String::new();
    body.push_str(&format!("<h1>{}</h1>\n", html_escape(bundle_name)));
    body.push_str(&entry_table(&index.providers, &entries, "../"));
    page(bundle_name, &body)
}

/// Per-provider pass/fail/none tallies as pretty-printed JSON.
pub fn summary_json(index: &ReportIndex) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&index.provider_summary())
}

/// Per-provider pass/fail/none tallies as an HTML table.
pub fn summary_page(index: &ReportIndex) -> String {
    let mut body = String::new();
    body.push_str("<h1>Summary</h1>\n");
    body.push_str("<table>\n<tr><th>Provider</th><th>PASS</th><th>FAIL</th><th>NONE</th></tr>\n");
    for (provider, tally) in index.provider_summary() {
        body.push_str(&format!(
            "<tr><td>{}</td><td class=\"PASS\">{}</td><td class=\"FAIL\">{}</td>\
             <td class=\"NONE\">{}</td></tr>\n",
            html_escape(&provider),
            tally.pass,
            tally.fail,
            tally.none
        ));
    }
    body.push_str("</table>\n");
    page("Summary", &body)
}
