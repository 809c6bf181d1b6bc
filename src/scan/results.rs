//! Scanner result model and CSV rendering.
//!
//! The external scanner emits a single JSON document on stdout. Only the
//! fields relevant to findings are deserialized; everything else in the
//! report is ignored.

use serde::{Deserialize, Serialize};

/// CSV header for rendered scan results.
pub const CSV_HEADER: &str = "\"ArtifactName\",\"VulnerabilityID\",\"PkgName\",\"InstalledVersion\",\"FixedVersion\",\"Severity\",\"Description\"";

/// A single vulnerability finding as reported by the scanner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VulnerabilityFinding {
    #[serde(rename = "VulnerabilityID")]
    pub vulnerability_id: String,
    #[serde(rename = "PkgName", default)]
    pub pkg_name: String,
    #[serde(rename = "InstalledVersion", default)]
    pub installed_version: String,
    #[serde(rename = "FixedVersion", default)]
    pub fixed_version: String,
    #[serde(rename = "Severity", default)]
    pub severity: String,
    #[serde(rename = "Description", default)]
    pub description: String,
}

/// Findings for one scanned artifact. Zero findings is a valid, clean result.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanResult {
    pub artifact_name: String,
    pub findings: Vec<VulnerabilityFinding>,
}

/// Wire shape of the scanner's JSON report.
#[derive(Debug, Deserialize)]
struct ScannerReport {
    #[serde(rename = "ArtifactName", default)]
    artifact_name: String,
    #[serde(rename = "Results", default)]
    results: Vec<ReportResult>,
}

#[derive(Debug, Deserialize)]
struct ReportResult {
    #[serde(rename = "Vulnerabilities", default)]
    vulnerabilities: Vec<VulnerabilityFinding>,
}

impl ScanResult {
    /// Parse a scanner JSON report. The scanner may emit one result set per
    /// detected ecosystem; findings are flattened across all of them in
    /// input order.
    pub fn from_report_json(bytes: &[u8]) -> serde_json::Result<Self> {
        let report: ScannerReport = serde_json::from_slice(bytes)?;
        let findings = report
            .results
            .into_iter()
            .flat_map(|r| r.vulnerabilities)
            .collect();
        Ok(Self {
            artifact_name: report.artifact_name,
            findings,
        })
    }

    /// Render one CSV row per finding, in input order, without the header.
    #[must_use]
    pub fn csv_rows(&self) -> Vec<String> {
        self.findings
            .iter()
            .map(|v| {
                [
                    &self.artifact_name,
                    &v.vulnerability_id,
                    &v.pkg_name,
                    &v.installed_version,
                    &v.fixed_version,
                    &v.severity,
                    &v.description,
                ]
                .iter()
                .map(|field| quote(field))
                .collect::<Vec<_>>()
                .join(",")
            })
            .collect()
    }

    /// Render the result as CSV: header plus one row per finding. A clean
    /// artifact renders header-only output.
    #[must_use]
    pub fn to_csv(&self) -> String {
        let mut out = String::from(CSV_HEADER);
        out.push('\n');
        for row in self.csv_rows() {
            out.push_str(&row);
            out.push('\n');
        }
        out
    }
}

/// Double-quote a CSV field, doubling embedded quotes.
fn quote(field: &str) -> String {
    format!("\"{}\"", field.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finding(id: &str) -> VulnerabilityFinding {
        VulnerabilityFinding {
            vulnerability_id: id.to_string(),
            pkg_name: "openssl".to_string(),
            installed_version: "3.0.1".to_string(),
            fixed_version: "3.0.7".to_string(),
            severity: "CRITICAL".to_string(),
            description: "test finding".to_string(),
        }
    }

    #[test]
    fn parse_report_flattens_result_sets() {
        let raw = br#"{
            "ArtifactName": "docker.io/library/nginx:1.25",
            "Results": [
                {"Vulnerabilities": [
                    {"VulnerabilityID": "CVE-2023-0001", "PkgName": "libc",
                     "InstalledVersion": "2.36", "Severity": "HIGH"}
                ]},
                {"Vulnerabilities": [
                    {"VulnerabilityID": "CVE-2023-0002", "PkgName": "zlib",
                     "InstalledVersion": "1.2.13", "Severity": "LOW"}
                ]}
            ]
        }"#;

        let result = ScanResult::from_report_json(raw).unwrap();
        assert_eq!(result.artifact_name, "docker.io/library/nginx:1.25");
        assert_eq!(result.findings.len(), 2);
        assert_eq!(result.findings[0].vulnerability_id, "CVE-2023-0001");
        assert_eq!(result.findings[1].vulnerability_id, "CVE-2023-0002");
        assert_eq!(result.findings[0].fixed_version, "");
    }

    #[test]
    fn parse_report_with_no_results_is_clean() {
        let result = ScanResult::from_report_json(br#"{"ArtifactName": "x"}"#).unwrap();
        assert!(result.findings.is_empty());
    }

    #[test]
    fn clean_result_renders_header_only() {
        let result = ScanResult {
            artifact_name: "clean".to_string(),
            findings: vec![],
        };
        assert_eq!(result.to_csv(), format!("{CSV_HEADER}\n"));
    }

    #[test]
    fn csv_rows_preserve_input_order() {
        let result = ScanResult {
            artifact_name: "app".to_string(),
            findings: vec![finding("CVE-1"), finding("CVE-2"), finding("CVE-3")],
        };
        let csv = result.to_csv();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], CSV_HEADER);
        assert!(lines[1].contains("CVE-1"));
        assert!(lines[2].contains("CVE-2"));
        assert!(lines[3].contains("CVE-3"));
    }

    #[test]
    fn embedded_quotes_are_doubled() {
        let mut f = finding("CVE-9");
        f.description = "a \"quoted\" description".to_string();
        let result = ScanResult {
            artifact_name: "app".to_string(),
            findings: vec![f],
        };
        assert!(result.to_csv().contains("\"a \"\"quoted\"\" description\""));
    }
}
