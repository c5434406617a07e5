//! Harness Generator: the language-agnostic contract, with the C++
//! reference implementation in [`cpp`].

pub mod cpp;

use crate::error::CoreResult;
use crate::model::{FunctionInfo, TestCase};

/// `generate(code, test_cases, function_info) → (source_text, case_count)`.
///
/// Each target language provides the file name to use inside the sandbox,
/// the build/run command line, and this function. Only [`cpp::CppDoctestGenerator`]
/// is shipped; the trait exists so a second language can be added without
/// touching the Pipeline Coordinator.
pub trait HarnessGenerator {
    /// Identifies this generator in `GeneratedHarness.generator_kind`.
    fn kind(&self) -> &'static str;

    /// File name the generated source is written under inside the sandbox
    /// working directory (e.g. `solution.cpp`).
    fn file_name(&self) -> &'static str;

    /// Shell command that compiles and runs the file returned by `file_name`.
    fn build_command(&self) -> &'static str;

    /// Produces the harness source and the number of test cases it embeds.
    fn generate(
        &self,
        code: &str,
        test_cases: &[TestCase],
        function_info: &FunctionInfo,
    ) -> CoreResult<(String, usize)>;

    /// `true` iff any test case used `custom_validation_code`.
    fn has_custom_validation(&self, test_cases: &[TestCase]) -> bool {
        test_cases.iter().any(|tc| {
            tc.custom_validation_code
                .as_deref()
                .is_some_and(|c| !c.trim().is_empty())
        })
    }
}
