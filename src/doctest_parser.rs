//! Doctest Parser: reconciles doctest's textual summary against the
//! requested test IDs.
//!
//! Regex/marker-scanning in the same spirit as other stdout parsers in
//! this codebase, but with the opposite failure posture: those degrade
//! gracefully when their markers don't match; this parser raises its three
//! invariants as hard [`CoreError::Parse`] failures, because the only
//! trustworthy link back to a request-level test ID is the name the
//! generator embedded, and silent drift must never be miscounted.

use std::sync::OnceLock;

use regex::Regex;

use crate::error::{CoreError, CoreResult, ParseErrorKind};
use crate::model::TestResult;

fn summary_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"test cases:\s*(\d+)\s*\|\s*(\d+)\s*passed\s*\|\s*(\d+)\s*failed")
            .expect("summary regex is a compile-time constant")
    })
}

fn header_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?m)^[ \t]*(?:\[doctest\]\s*)?TEST CASE:\s*"?([^"\n]+?)"?\s*$"#)
            .expect("header regex is a compile-time constant")
    })
}

fn failure_marker_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?m)^.*is NOT correct!\s*$|^\s*ERROR:.*$")
            .expect("failure marker regex is a compile-time constant")
    })
}

fn values_line_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?m)^\s*values:.*$").expect("values-line regex is a compile-time constant")
    })
}

struct Header<'a> {
    test_id: &'a str,
    /// Byte offset, in the full output, where this header's body starts.
    body_start: usize,
}

/// Parses the combined stdout/stderr of a sandbox run into an ordered list
/// of [`TestResult`]s, one per `requested_test_ids`, in that order.
pub fn parse_doctest_output(
    output: &str,
    requested_test_ids: &[String],
    execution_time_ms: u64,
) -> CoreResult<Vec<TestResult>> {
    let (total, passed, failed) = parse_summary(output)?;

    if total != requested_test_ids.len() {
        return Err(CoreError::parse(
            ParseErrorKind::TestCountMismatch,
            format!(
                "doctest reported {total} cases but {} were requested",
                requested_test_ids.len()
            ),
        ));
    }

    let headers = locate_headers(output);
    let mut failed_ids = Vec::new();
    let mut error_messages: std::collections::HashMap<String, String> = std::collections::HashMap::new();

    for (i, header) in headers.iter().enumerate() {
        let body_end = headers.get(i + 1).map(|h| h.body_start).unwrap_or(output.len());
        let body = &output[header.body_start..body_end];

        if !requested_test_ids.iter().any(|id| id == header.test_id) {
            if failure_marker_regex().is_match(body) {
                return Err(CoreError::parse(
                    ParseErrorKind::UnknownTestCase,
                    format!("failure reported for unrequested test case '{}'", header.test_id),
                ));
            }
            continue;
        }

        if let Some(marker) = failure_marker_regex().find(body) {
            let mut message = marker.as_str().trim().to_string();
            if let Some(values) = values_line_regex().find(body) {
                message.push('\n');
                message.push_str(values.as_str().trim());
            }
            failed_ids.push(header.test_id.to_string());
            error_messages.insert(header.test_id.to_string(), message);
        }
    }

    if failed_ids.len() != failed || (requested_test_ids.len() - failed_ids.len()) != passed {
        return Err(CoreError::parse(
            ParseErrorKind::ResultMismatch,
            format!(
                "doctest summary reported {passed} passed / {failed} failed but parsing found {} failed",
                failed_ids.len()
            ),
        ));
    }

    Ok(requested_test_ids
        .iter()
        .map(|test_id| {
            let did_fail = failed_ids.contains(test_id);
            TestResult {
                test_id: test_id.clone(),
                passed: !did_fail,
                expected_output: None,
                actual_output: Some(output.to_string()),
                error_message: if did_fail {
                    error_messages.get(test_id).cloned()
                } else {
                    None
                },
                execution_time_ms,
            }
        })
        .collect())
}

fn parse_summary(output: &str) -> CoreResult<(usize, usize, usize)> {
    let caps = summary_regex().captures(output).ok_or_else(|| {
        CoreError::parse(
            ParseErrorKind::TestCountMismatch,
            "no doctest summary line found in sandbox output",
        )
    })?;
    let total: usize = caps[1].parse().unwrap_or(0);
    let passed: usize = caps[2].parse().unwrap_or(0);
    let failed: usize = caps[3].parse().unwrap_or(0);
    Ok((total, passed, failed))
}

fn locate_headers(output: &str) -> Vec<Header<'_>> {
    header_regex()
        .captures_iter(output)
        .map(|caps| {
            let whole = caps.get(0).unwrap();
            Header {
                test_id: caps.get(1).unwrap().as_str().trim(),
                body_start: whole.end(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn all_pass_when_no_failure_markers() {
        let output = "\
TEST CASE: t1
TEST CASE: t2

===============================================================================
test cases: 2 | 2 passed | 0 failed
";
        let results = parse_doctest_output(output, &ids(&["t1", "t2"]), 42).unwrap();
        assert!(results.iter().all(|r| r.passed));
        assert_eq!(results[0].execution_time_ms, 42);
    }

    #[test]
    fn failing_case_captures_values_line() {
        let output = "\
TEST CASE: t1
  solution.cpp:10: ERROR: CHECK( add(1, 2) == 4 ) is NOT correct!
  values: CHECK( 3 == 4 )

TEST CASE: t2

===============================================================================
test cases: 2 | 1 passed | 1 failed
";
        let results = parse_doctest_output(output, &ids(&["t1", "t2"]), 10).unwrap();
        assert!(!results[0].passed);
        assert!(results[0].error_message.as_ref().unwrap().contains("values:"));
        assert!(results[1].passed);
    }

    #[test]
    fn bracketed_doctest_header_variant_recognized() {
        let output = "\
[doctest] TEST CASE: t1

===============================================================================
test cases: 1 | 1 passed | 0 failed
";
        let results = parse_doctest_output(output, &ids(&["t1"]), 5).unwrap();
        assert!(results[0].passed);
    }

    #[test]
    fn quoted_header_variant_recognized() {
        let output = "\
TEST CASE: \"t1\"

===============================================================================
test cases: 1 | 1 passed | 0 failed
";
        let results = parse_doctest_output(output, &ids(&["t1"]), 5).unwrap();
        assert_eq!(results[0].test_id, "t1");
    }

    #[test]
    fn total_mismatch_is_parse_error() {
        let output = "\
TEST CASE: t1

===============================================================================
test cases: 1 | 1 passed | 0 failed
";
        let err = parse_doctest_output(output, &ids(&["t1", "t2"]), 5).unwrap_err();
        assert_eq!(
            err.kind(),
            crate::error::ErrorKind::ParseError
        );
    }

    #[test]
    fn unknown_failing_test_case_is_parse_error() {
        let output = "\
TEST CASE: unexpected
  solution.cpp:5: ERROR: CHECK( 1 == 2 ) is NOT correct!

===============================================================================
test cases: 1 | 0 passed | 1 failed
";
        let err = parse_doctest_output(output, &ids(&["t1"]), 5).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::ParseError);
    }

    #[test]
    fn missing_summary_line_is_parse_error() {
        let err = parse_doctest_output("no summary here", &ids(&["t1"]), 5).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::ParseError);
    }
}
