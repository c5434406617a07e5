//! Function Parser: regex-driven extraction of the primary
//! function's name and return type from submitted source.
//!
//! Only a finite, curated set of declaration shapes is recognized — the
//! parse tree is never built. This mirrors the framework output parsers
//! elsewhere in the pipeline: keep the grammar explicit, fail loudly on
//! anything outside it rather than guess.

use std::sync::OnceLock;

use regex::Regex;

use crate::error::{CoreError, CoreResult};
use crate::model::FunctionInfo;

/// Recognized return types, longest/most-specific alternatives first so the
/// alternation doesn't short-circuit on a shared prefix (e.g. `int` before
/// `int32_t` would swallow the `32_t` suffix as part of the identifier).
const RETURN_TYPE_ALT: &str = concat!(
    r"std::vector<[^>]*>|vector<[^>]*>|std::string|",
    r"int8_t|int16_t|int32_t|int64_t|uint8_t|uint16_t|uint32_t|uint64_t|",
    r"size_t|string|double|float|char|bool|auto|long|short|void|int",
);

fn function_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        let pattern = format!(
            r"(?m)^[ \t]*(?:const\s+)?(?:unsigned\s+)?({RETURN_TYPE_ALT})\s*([*&]\s*)?([A-Za-z_][A-Za-z0-9_]*)\s*\(([^)]*)\)\s*\{{"
        );
        Regex::new(&pattern).expect("function parser regex is a compile-time constant")
    })
}

/// Extracts `FunctionInfo` for the primary function in `code`.
///
/// The first matching declaration wins. `return_type` includes a trailing
/// `*`/`&` if present, since the Harness Generator needs to know whether the
/// function returns a pointer (to choose `strcmp` over `==`).
pub fn parse_function(code: &str) -> CoreResult<FunctionInfo> {
    let caps = function_regex()
        .captures(code)
        .ok_or_else(|| CoreError::Generation("no_function_found".to_string()))?;

    let base_type = caps.get(1).unwrap().as_str().trim();
    let pointer_or_ref = caps.get(2).map(|m| m.as_str().trim()).unwrap_or("");
    let name = caps.get(3).unwrap().as_str().to_string();

    let return_type = if pointer_or_ref.is_empty() {
        base_type.to_string()
    } else {
        format!("{base_type}{pointer_or_ref}")
    };

    Ok(FunctionInfo { name, return_type })
}
