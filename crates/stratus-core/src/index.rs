//! The report index: one durable document summarizing every report the
//! store holds, merged under an at-most-one-entry-per-(bundle, test id)
//! rule.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::report::{Report, SuiteStatus};

/// Filesystem-safe rendition of a bundle or test name.
pub fn safe_name(raw: &str) -> String {
    raw.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// One report's summary line in the index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportEntry {
    pub bundle_name: String,
    #[serde(default = "crate::time::default_now", with = "crate::time::iso")]
    pub date: DateTime<Utc>,
    #[serde(default)]
    pub results: BTreeMap<String, SuiteStatus>,
    pub test_id: String,
    #[serde(default)]
    pub test_label: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

impl ReportEntry {
    /// Storage key of the report document this entry summarizes.
    pub fn report_json_filename(&self) -> String {
        format!("{}/{}.json", self.test_id, safe_name(&self.bundle_name))
    }

    /// Storage key of the rendered report page.
    pub fn report_html_filename(&self) -> String {
        format!("{}/{}.html", self.test_id, safe_name(&self.bundle_name))
    }
}

/// Per-provider PASS/FAIL/NONE tally across the whole index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProviderTally {
    pub pass: usize,
    pub fail: usize,
    pub none: usize,
}

impl ProviderTally {
    fn record(&mut self, status: SuiteStatus) {
        match status {
            SuiteStatus::Pass => self.pass += 1,
            SuiteStatus::Fail => self.fail += 1,
            SuiteStatus::None => self.none += 1,
        }
    }
}

/// The global index document. `reports` is kept newest first.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ReportIndex {
    #[serde(default)]
    pub providers: Vec<String>,
    #[serde(default)]
    pub reports: Vec<ReportEntry>,
}

impl ReportIndex {
    pub const FULL_INDEX_JSON: &'static str = "index.json";
    pub const FULL_INDEX_HTML: &'static str = "index.html";
    pub const SUMMARY_JSON: &'static str = "summary.json";
    pub const SUMMARY_HTML: &'static str = "summary.html";

    /// Folds a report into the index. An entry with the same
    /// (bundle_name, test_id) is replaced in place; otherwise the new entry
    /// goes to the front. Providers seen in the report are registered.
    pub fn upsert_report(&mut self, report: &Report) {
        let entry = ReportEntry {
            bundle_name: report.bundle_name.clone(),
            date: report.date,
            results: report.provider_statuses(),
            test_id: report.test_id.clone(),
            test_label: report.test_label.clone(),
            url: report.url.clone(),
        };
        for provider in entry.results.keys() {
            self.register_provider(provider);
        }
        let existing = self.reports.iter_mut().find(|candidate| {
            candidate.bundle_name == entry.bundle_name && candidate.test_id == entry.test_id
        });
        match existing {
            Some(slot) => *slot = entry,
            None => self.reports.insert(0, entry),
        }
    }

    /// Appends a provider name if it has not been seen before. Display
    /// order follows first registration.
    pub fn register_provider(&mut self, provider: &str) {
        if !self.providers.iter().any(|known| known == provider) {
            self.providers.push(provider.to_string());
        }
    }

    /// Most recent entry for a bundle that carries a result for the given
    /// provider, optionally skipping one test id.
    pub fn find_previous_report(
        &self,
        bundle_name: &str,
        provider: &str,
        exclude_test_id: Option<&str>,
    ) -> Option<&ReportEntry> {
        self.reports
            .iter()
            .filter(|entry| {
                entry.bundle_name == bundle_name
                    && entry.results.contains_key(provider)
                    && exclude_test_id != Some(entry.test_id.as_str())
            })
            .max_by_key(|entry| entry.date)
    }

    /// Bundle names in first-seen order, without duplicates.
    pub fn bundle_names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for entry in &self.reports {
            if !names.iter().any(|known| known == &entry.bundle_name) {
                names.push(entry.bundle_name.clone());
            }
        }
        names
    }

    /// Storage key of the per-bundle index page.
    pub fn bundle_index_filename(&self, bundle_name: &str) -> String {
        format!("{}/index.html", safe_name(bundle_name))
    }

    /// Entries for one bundle, in index order (newest first).
    pub fn entries_for_bundle(&self, bundle_name: &str) -> Vec<&ReportEntry> {
        self.reports
            .iter()
            .filter(|entry| entry.bundle_name == bundle_name)
            .collect()
    }

    /// Drops every entry for the named bundle. Returns how many were
    /// removed. Registered providers are left alone.
    pub fn remove_test_by_bundle_name(&mut self, bundle_name: &str) -> usize {
        let before = self.reports.len();
        self.reports.retain(|entry| entry.bundle_name != bundle_name);
        before - self.reports.len()
    }

    /// Per-provider status tallies over every entry.
    pub fn provider_summary(&self) -> BTreeMap<String, ProviderTally> {
        let mut summary: BTreeMap<String, ProviderTally> = BTreeMap::new();
        for entry in &self.reports {
            for (provider, status) in &entry.results {
                summary.entry(provider.clone()).or_default().record(*status);
            }
        }
        summary
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(raw: &str) -> Result<ReportIndex, serde_json::Error> {
        serde_json::from_str(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn mk_report(bundle_name: &str, test_id: &str, provider: &str, status: SuiteStatus) -> Report {
        let mut report = Report::new(test_id, bundle_name, None);
        report.results.insert(
            provider.to_string(),
            crate::report::ProviderResult {
                requested_provider: provider.to_ascii_lowercase(),
                status,
                tests: Vec::new(),
                date: report.date,
            },
        );
        report
    }

    fn sample_index_json() -> &'static str {
        r#"{
            "providers": [
                "GCE"
            ],
            "reports": [
                {
                    "bundle_name": "foo",
                    "date": "2017-12-06T21:15:56",
                    "results": {
                        "AWS": "FAIL"
                    },
                    "test_id": "11",
                    "test_label": null,
                    "url": null
                },
                {
                    "bundle_name": "bar",
                    "date": "2017-11-15T17:44:01",
                    "results": {
                        "Azure": "NONE"
                    },
                    "test_id": "22",
                    "test_label": null,
                    "url": null
                }
            ]
        }"#
    }

    #[test]
    fn safe_name_replaces_unsafe_characters() {
        assert_eq!(safe_name("wiki simple/beta"), "wiki_simple_beta");
        assert_eq!(safe_name("ok-1.2_three"), "ok-1.2_three");
    }

    #[test]
    fn upsert_inserts_new_entries_at_the_front() {
        let mut index = ReportIndex::default();
        index.upsert_report(&mk_report("first", "11", "AWS", SuiteStatus::Pass));
        index.upsert_report(&mk_report("second", "22", "AWS", SuiteStatus::Pass));

        let bundles: Vec<&str> = index
            .reports
            .iter()
            .map(|entry| entry.bundle_name.as_str())
            .collect();
        assert_eq!(bundles, vec!["second", "first"]);
    }

    #[test]
    fn upsert_replaces_matching_entries_in_place() {
        let mut index = ReportIndex::default();
        index.upsert_report(&mk_report("first", "11", "AWS", SuiteStatus::Pass));
        index.upsert_report(&mk_report("second", "22", "AWS", SuiteStatus::Pass));
        index.upsert_report(&mk_report("first", "11", "AWS", SuiteStatus::Fail));

        assert_eq!(index.reports.len(), 2);
        assert_eq!(index.reports[1].bundle_name, "first");
        assert_eq!(index.reports[1].results["AWS"], SuiteStatus::Fail);
    }

    #[test]
    fn same_bundle_new_test_id_is_a_new_entry() {
        let mut index = ReportIndex::default();
        index.upsert_report(&mk_report("first", "11", "AWS", SuiteStatus::Pass));
        index.upsert_report(&mk_report("first", "12", "AWS", SuiteStatus::Pass));
        assert_eq!(index.reports.len(), 2);
        assert_eq!(index.reports[0].test_id, "12");
    }

    #[test]
    fn provider_registration_is_append_only_and_unique() {
        let mut index = ReportIndex::default();
        index.register_provider("GCE");
        index.upsert_report(&mk_report("first", "11", "AWS", SuiteStatus::Pass));
        index.upsert_report(&mk_report("second", "22", "AWS", SuiteStatus::Fail));
        assert_eq!(index.providers, vec!["GCE", "AWS"]);
    }

    #[test]
    fn find_previous_report_picks_most_recent_for_the_provider() {
        let mut index = ReportIndex::from_json(sample_index_json()).expect("parse index");
        index.reports.push(ReportEntry {
            bundle_name: "foo".to_string(),
            date: Utc.with_ymd_and_hms(2017, 10, 1, 0, 0, 0).unwrap(),
            results: BTreeMap::from([("AWS".to_string(), SuiteStatus::Pass)]),
            test_id: "10".to_string(),
            test_label: None,
            url: None,
        });

        let found = index
            .find_previous_report("foo", "AWS", None)
            .expect("previous report");
        assert_eq!(found.test_id, "11");

        let excluded = index
            .find_previous_report("foo", "AWS", Some("11"))
            .expect("previous report before 11");
        assert_eq!(excluded.test_id, "10");

        assert!(index.find_previous_report("foo", "GCE", None).is_none());
        assert!(index.find_previous_report("missing", "AWS", None).is_none());
    }

    #[test]
    fn partial_index_documents_hydrate_with_defaults() {
        let index = ReportIndex::from_json("{\"providers\": [\"foo\"]}").expect("parse partial");
        assert_eq!(index.providers, vec!["foo"]);
        assert!(index.reports.is_empty());
    }

    #[test]
    fn remove_test_by_bundle_name_strips_only_matches() {
        let mut index = ReportIndex::from_json(sample_index_json()).expect("parse index");
        let removed = index.remove_test_by_bundle_name("foo");
        assert_eq!(removed, 1);
        assert_eq!(index.reports.len(), 1);
        assert_eq!(index.reports[0].bundle_name, "bar");
        assert_eq!(index.providers, vec!["GCE"]);

        assert_eq!(index.remove_test_by_bundle_name("missing"), 0);
    }

    #[test]
    fn bundle_names_are_unique_in_first_seen_order() {
        let mut index = ReportIndex::default();
        index.upsert_report(&mk_report("first", "11", "AWS", SuiteStatus::Pass));
        index.upsert_report(&mk_report("second", "22", "AWS", SuiteStatus::Pass));
        index.upsert_report(&mk_report("first", "33", "AWS", SuiteStatus::Pass));

        assert_eq!(index.bundle_names(), vec!["first", "second"]);
    }

    #[test]
    fn bundle_index_filename_sanitizes() {
        let index = ReportIndex::default();
        assert_eq!(
            index.bundle_index_filename("wiki simple"),
            "wiki_simple/index.html"
        );
    }

    #[test]
    fn entries_for_bundle_keeps_index_order() {
        let mut index = ReportIndex::default();
        index.upsert_report(&mk_report("first", "11", "AWS", SuiteStatus::Pass));
        index.upsert_report(&mk_report("first", "12", "AWS", SuiteStatus::Fail));
        index.upsert_report(&mk_report("other", "13", "AWS", SuiteStatus::Pass));

        let entries = index.entries_for_bundle("first");
        let ids: Vec<&str> = entries.iter().map(|entry| entry.test_id.as_str()).collect();
        assert_eq!(ids, vec!["12", "11"]);
    }

    #[test]
    fn provider_summary_tallies_statuses() {
        let index = ReportIndex::from_json(sample_index_json()).expect("parse index");
        let summary = index.provider_summary();
        assert_eq!(summary["AWS"].fail, 1);
        assert_eq!(summary["Azure"].none, 1);
        assert!(!summary.contains_key("GCE"));
    }

    #[test]
    fn entry_filenames_derive_from_test_id_and_bundle() {
        let index = ReportIndex::from_json(sample_index_json()).expect("parse index");
        assert_eq!(index.reports[0].report_json_filename(), "11/foo.json");
        assert_eq!(index.reports[0].report_html_filename(), "11/foo.html");
    }
}
