//! C++ / doctest reference implementation of [`super::HarnessGenerator`].

use std::fmt::Write as _;

use crate::error::{CoreError, CoreResult};
use crate::model::{FunctionInfo, TestCase};
use crate::parser::{parse_function, parse_input};

use super::HarnessGenerator;

pub struct CppDoctestGenerator;

impl HarnessGenerator for CppDoctestGenerator {
    fn kind(&self) -> &'static str {
        "cpp_doctest"
    }

    fn file_name(&self) -> &'static str {
        "solution.cpp"
    }

    fn build_command(&self) -> &'static str {
        "g++ -std=c++17 solution.cpp -o solution && ./solution"
    }

    fn generate(
        &self,
        code: &str,
        test_cases: &[TestCase],
        function_info: &FunctionInfo,
    ) -> CoreResult<(String, usize)> {
        generate(code, test_cases, function_info)
    }
}

/// Emits the harness source per the  template. Only `test_cases` already
/// known to be valid (see `TestCase::is_valid`) should be passed in; the
/// caller is responsible for filtering and for logging skipped cases.
fn generate(
    code: &str,
    test_cases: &[TestCase],
    function_info: &FunctionInfo,
) -> CoreResult<(String, usize)> {
    let mut out = String::new();
    out.push_str("// Start Test\n");
    out.push_str("#define DOCTEST_CONFIG_IMPLEMENT_WITH_MAIN\n");
    out.push_str("#include \"doctest.h\"\n");
    out.push_str("#include <cstring>\n\n");

    out.push_str("// Solution - Start\n");
    out.push_str(code.trim_end());
    out.push('\n');
    out.push_str("// Solution - End\n\n");

    out.push_str("// Tests - Start\n");
    let mut array_index = 0usize;
    for case in test_cases {
        write_test_case(&mut out, case, function_info, &mut array_index)?;
    }
    out.push_str("// Tests - End\n");

    Ok((out, test_cases.len()))
}

fn write_test_case(
    out: &mut String,
    case: &TestCase,
    function_info: &FunctionInfo,
    array_index: &mut usize,
) -> CoreResult<()> {
    writeln!(out, "TEST_CASE(\"{}\") {{", escape_doctest_name(&case.test_id))
        .expect("writing to a String never fails");

    if let Some(custom) = case
        .custom_validation_code
        .as_deref()
        .filter(|c| !c.trim().is_empty())
    {
        for line in custom.lines() {
            writeln!(out, "    {line}").expect("writing to a String never fails");
        }
    } else {
        let input = case.input.as_deref().unwrap_or("");
        let expected = case.expected_output.as_deref().ok_or_else(|| {
            CoreError::Generation(format!(
                "test case '{}' has neither custom validation nor an expected output",
                case.test_id
            ))
        })?;

        let parsed = parse_input(input, array_index)?;
        for stmt in &parsed.setup_code {
            writeln!(out, "    {stmt}").expect("writing to a String never fails");
        }

        let call_expr = format!("{}({})", function_info.name, parsed.call_args.join(", "));
        let expected_literal = format_expected_literal(expected);

        if function_info.return_type == "char*" {
            writeln!(out, "    CHECK(strcmp({call_expr}, {expected_literal}) == 0);")
        } else {
            writeln!(out, "    CHECK({call_expr} == {expected_literal});")
        }
        .expect("writing to a String never fails");
    }

    out.push_str("}\n\n");
    Ok(())
}

/// Doctest test-case names are free text but a literal `"` would terminate
/// the string early; escape it so the display name still round-trips to the
/// original `test_id` when the doctest parser reads it back.
fn escape_doctest_name(test_id: &str) -> String {
    test_id.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Mirrors the Input Parser's literal classification for the expected
/// value on the right-hand side of `CHECK`.
fn format_expected_literal(expected: &str) -> String {
    let trimmed = expected.trim();
    if is_quoted(trimmed) || is_numeric_or_bool(trimmed) {
        trimmed.to_string()
    } else {
        format!("\"{trimmed}\"")
    }
}

fn is_quoted(s: &str) -> bool {
    s.len() >= 2 && ((s.starts_with('"') && s.ends_with('"')) || (s.starts_with('\'') && s.ends_with('\'')))
}

fn is_numeric_or_bool(s: &str) -> bool {
    if s == "true" || s == "false" {
        return true;
    }
    let stripped = s.strip_prefix(['+', '-']).unwrap_or(s);
    if stripped.is_empty() {
        return false;
    }
    let mut seen_dot = false;
    let mut seen_digit = false;
    for c in stripped.chars() {
        match c {
            '0'..='9' => seen_digit = true,
            '.' if !seen_dot => seen_dot = true,
            _ => return false,
        }
    }
    seen_digit
}

/// Parses the primary function out of submitted code, then generates the harness.
/// Used by the Pipeline Coordinator so parsing and generation stay in one step:
/// a function-not-found error propagates as a generation error.
pub fn parse_and_generate(
    code: &str,
    test_cases: &[TestCase],
) -> CoreResult<(String, usize, FunctionInfo)> {
    let function_info = parse_function(code)?;
    let (source, count) = generate(code, test_cases, &function_info)?;
    Ok((source, count, function_info))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn case(id: &str, input: &str, expected: &str) -> TestCase {
        TestCase {
            test_id: id.to_string(),
            input: Some(input.to_string()),
            expected_output: Some(expected.to_string()),
            custom_validation_code: None,
        }
    }

    #[test]
    fn emits_template_sections_in_order() {
        let code = "int add(int a, int b){ return a + b; }";
        let info = FunctionInfo {
            name: "add".into(),
            return_type: "int".into(),
        };
        let (source, count) = generate(code, &[case("t1", "1, 2", "3")], &info).unwrap();
        assert_eq!(count, 1);
        let start = source.find("// Start Test").unwrap();
        let solution_start = source.find("// Solution - Start").unwrap();
        let solution_end = source.find("// Solution - End").unwrap();
        let tests_start = source.find("// Tests - Start").unwrap();
        assert!(start < solution_start);
        assert!(solution_start < solution_end);
        assert!(solution_end < tests_start);
        assert!(source.contains("TEST_CASE(\"t1\")"));
        assert!(source.contains("CHECK(add(1, 2) == 3);"));
    }

    #[test]
    fn char_pointer_return_uses_strcmp() {
        let code = "const char* hello(){ return \"Hello\"; }";
        let info = FunctionInfo {
            name: "hello".into(),
            return_type: "char*".into(),
        };
        let (source, _) = generate(code, &[case("t1", "", "Hello")], &info).unwrap();
        assert!(source.contains("CHECK(strcmp(hello(), \"Hello\") == 0);"));
    }

    #[test]
    fn custom_validation_code_is_inserted_verbatim() {
        let code = "int add(int a, int b){ return a + b; }";
        let info = FunctionInfo {
            name: "add".into(),
            return_type: "int".into(),
        };
        let custom = TestCase {
            test_id: "t1".into(),
            input: None,
            expected_output: None,
            custom_validation_code: Some("CHECK(add(2, 2) == 4);".into()),
        };
        let (source, _) = generate(code, &[custom], &info).unwrap();
        assert!(source.contains("CHECK(add(2, 2) == 4);"));
    }

    #[test]
    fn blank_custom_validation_falls_back_to_input_expected() {
        let code = "int add(int a, int b){ return a + b; }";
        let info = FunctionInfo {
            name: "add".into(),
            return_type: "int".into(),
        };
        let blank_custom = TestCase {
            test_id: "t1".into(),
            input: Some("1, 2".into()),
            expected_output: Some("3".into()),
            custom_validation_code: Some("   ".into()),
        };
        let (source, _) = generate(code, &[blank_custom], &info).unwrap();
        assert!(source.contains("CHECK(add(1, 2) == 3);"));
    }

    #[test]
    fn multiple_test_cases_all_present() {
        let code = "int add(int a, int b){ return a + b; }";
        let info = FunctionInfo {
            name: "add".into(),
            return_type: "int".into(),
        };
        let cases = vec![case("t1", "1, 2", "3"), case("t2", "2, 2", "4")];
        let (source, count) = generate(code, &cases, &info).unwrap();
        assert_eq!(count, 2);
        assert!(source.contains("TEST_CASE(\"t1\")"));
        assert!(source.contains("TEST_CASE(\"t2\")"));
    }

    #[test]
    fn array_input_declares_local_before_check() {
        let code = "int sum(int* a, int n){ int s=0; for(int i=0;i<n;++i) s+=a[i]; return s; }";
        let info = FunctionInfo {
            name: "sum".into(),
            return_type: "int".into(),
        };
        let (source, _) = generate(code, &[case("t1", "[1,2,3]", "6")], &info).unwrap();
        assert!(source.contains("int arr0[] = {1, 2, 3};"));
        assert!(source.contains("CHECK(sum(arr0, 3) == 6);"));
    }

    #[test]
    fn missing_expected_output_without_custom_validation_is_generation_error() {
        let code = "int add(int a, int b){ return a + b; }";
        let info = FunctionInfo {
            name: "add".into(),
            return_type: "int".into(),
        };
        let broken = TestCase {
            test_id: "t1".into(),
            input: Some("1, 2".into()),
            expected_output: None,
            custom_validation_code: None,
        };
        let err = generate(code, &[broken], &info).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::GenerationError);
    }

    #[test]
    fn parse_and_generate_propagates_function_not_found() {
        let err = parse_and_generate("// nothing", &[]).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::GenerationError);
    }
}
