//! Input Parser: turns a `TestCase.input` string into harness setup
//! statements plus a function-call expression.

use crate::error::CoreResult;

/// Setup code (zero or more local-variable declarations) plus the list of
/// call arguments to splice into the generated invocation, in order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedInput {
    pub setup_code: Vec<String>,
    pub call_args: Vec<String>,
}

/// Parses `input` into setup statements and call arguments for C++.
///
/// `array_index` is the harness-local counter used to name array locals
/// (`arr0`, `arr1`, ...) uniquely across the whole generated file.
pub fn parse_input(input: &str, array_index: &mut usize) -> CoreResult<ParsedInput> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Ok(ParsedInput::default());
    }

    let mut result = ParsedInput::default();
    for param in split_top_level_commas(trimmed) {
        let param = param.trim();
        if param.is_empty() {
            continue;
        }
        classify_param(param, array_index, &mut result)?;
    }
    Ok(result)
}

/// Splits on top-level commas; commas inside `[ ]` are not separators.
/// Array nesting is a single level, per the grammar.
fn split_top_level_commas(s: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut start = 0usize;
    for (i, c) in s.char_indices() {
        match c {
            '[' => depth += 1,
            ']' => depth -= 1,
            ',' if depth == 0 => {
                parts.push(&s[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&s[start..]);
    parts
}

fn classify_param(
    param: &str,
    array_index: &mut usize,
    result: &mut ParsedInput,
) -> CoreResult<()> {
    if let Some(inner) = param
        .strip_prefix('[')
        .and_then(|p| p.strip_suffix(']'))
    {
        emit_array(inner, array_index, result);
        return Ok(());
    }

    if is_numeric_literal(param) || param == "true" || param == "false" || is_already_quoted(param)
    {
        result.call_args.push(param.to_string());
        return Ok(());
    }

    // Anything else gets wrapped in double quotes as a string literal.
    result.call_args.push(format!("\"{param}\""));
    Ok(())
}

fn emit_array(inner: &str, array_index: &mut usize, result: &mut ParsedInput) {
    let elements = split_array_elements(inner);
    let is_string_array = elements.first().is_some_and(|e| e.trim_start().starts_with('"'));

    let var_name = format!("arr{}", *array_index);
    *array_index += 1;

    let (decl_type, literal_elements): (&str, Vec<String>) = if is_string_array {
        (
            "const char*",
            elements.iter().map(|e| e.trim().to_string()).collect(),
        )
    } else {
        ("int", elements.iter().map(|e| e.trim().to_string()).collect())
    };

    let count = elements.len();
    result.setup_code.push(format!(
        "{decl_type} {var_name}[] = {{{}}};",
        literal_elements.join(", ")
    ));
    result.call_args.push(var_name);
    result.call_args.push(count.to_string());
}

/// Splits array contents into elements. For string arrays, elements may
/// contain commas inside their quotes, so counting uses paired-quote
/// scanning (closing quotes) rather than naive comma splitting.
fn split_array_elements(inner: &str) -> Vec<&str> {
    let trimmed = inner.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }
    if trimmed.starts_with('"') {
        split_quoted_elements(trimmed)
    } else {
        trimmed.split(',').map(str::trim).collect()
    }
}

fn split_quoted_elements(s: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let bytes = s.as_bytes();
    let mut i = 0usize;
    while i < bytes.len() {
        while i < bytes.len() && (bytes[i] as char).is_whitespace() || bytes.get(i) == Some(&b',')
        {
            i += 1;
        }
        if i >= bytes.len() || bytes[i] != b'"' {
            break;
        }
        let start = i;
        i += 1;
        while i < bytes.len() && bytes[i] != b'"' {
            i += 1;
        }
        if i < bytes.len() {
            i += 1; // consume the closing quote
        }
        parts.push(&s[start..i]);
    }
    parts
}

fn is_numeric_literal(s: &str) -> bool {
    let s = s.strip_prefix(['+', '-']).unwrap_or(s);
    if s.is_empty() {
        return false;
    }
    let mut seen_dot = false;
    let mut seen_digit = false;
    for c in s.chars() {
        match c {
            '0'..='9' => seen_digit = true,
            '.' if !seen_dot => seen_dot = true,
            _ => return false,
        }
    }
    seen_digit
}

fn is_already_quoted(s: &str) -> bool {
    s.len() >= 2
        && ((s.starts_with('"') && s.ends_with('"')) || (s.starts_with('\'') && s.ends_with('\'')))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_yields_empty_call() {
        let mut idx = 0;
        let parsed = parse_input("", &mut idx).unwrap();
        assert!(parsed.setup_code.is_empty());
        assert!(parsed.call_args.is_empty());
    }

    #[test]
    fn single_numeric_argument() {
        let mut idx = 0;
        let parsed = parse_input("5", &mut idx).unwrap();
        assert_eq!(parsed.call_args, vec!["5".to_string()]);
    }

    #[test]
    fn negative_and_float_numeric_literals() {
        let mut idx = 0;
        let parsed = parse_input("-3, 2.5", &mut idx).unwrap();
        assert_eq!(parsed.call_args, vec!["-3".to_string(), "2.5".to_string()]);
    }

    #[test]
    fn boolean_literals_pass_through() {
        let mut idx = 0;
        let parsed = parse_input("true, false", &mut idx).unwrap();
        assert_eq!(parsed.call_args, vec!["true".to_string(), "false".to_string()]);
    }

    #[test]
    fn bare_word_is_quoted_as_string() {
        let mut idx = 0;
        let parsed = parse_input("hello", &mut idx).unwrap();
        assert_eq!(parsed.call_args, vec!["\"hello\"".to_string()]);
    }

    #[test]
    fn already_quoted_string_passes_through_unchanged() {
        let mut idx = 0;
        let parsed = parse_input("\"hello\"", &mut idx).unwrap();
        assert_eq!(parsed.call_args, vec!["\"hello\"".to_string()]);
    }

    #[test]
    fn integer_array_declares_local_and_pairs_size() {
        let mut idx = 0;
        let parsed = parse_input("[1,2,3,4]", &mut idx).unwrap();
        assert_eq!(parsed.setup_code, vec!["int arr0[] = {1, 2, 3, 4};".to_string()]);
        assert_eq!(
            parsed.call_args,
            vec!["arr0".to_string(), "4".to_string()]
        );
    }

    #[test]
    fn string_array_uses_paired_quote_scanning() {
        let mut idx = 0;
        // A comma inside the quoted element must not split it.
        let parsed = parse_input(r#"["a,b", "c"]"#, &mut idx).unwrap();
        assert_eq!(parsed.call_args[1], "2");
        assert!(parsed.setup_code[0].starts_with("const char* arr0[]"));
    }

    #[test]
    fn array_index_counter_advances_across_calls() {
        let mut idx = 0;
        let _ = parse_input("[1,2]", &mut idx).unwrap();
        assert_eq!(idx, 1);
        let parsed = parse_input("[3,4,5]", &mut idx).unwrap();
        assert!(parsed.setup_code[0].starts_with("int arr1[]"));
    }

    #[test]
    fn commas_inside_brackets_are_not_top_level_separators() {
        let parts = split_top_level_commas("[1,2,3], 5");
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0], "[1,2,3]");
        assert_eq!(parts[1].trim(), "5");
    }
}
