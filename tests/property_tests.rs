//! Property-based tests for minised
//!
//! This module uses proptest to verify core invariants of script execution.
//! Property-based testing generates hundreds of random inputs to verify
//! that certain properties always hold true.

use std::fs;
use tempfile::TempDir;

use minised::{process_text, FileProcessor, Parser, ProcessingOptions, RegexFlavor, StreamProcessor};

// Import proptest macro
use proptest::prelude::*;

fn run(script: &str, input: &str) -> String {
    process_text(script, input, &ProcessingOptions::default()).unwrap()
}

/// Lines of lowercase text, optionally without a final newline
fn text_strategy() -> impl Strategy<Value = String> {
    (prop::collection::vec("[a-z ]{0,20}", 0..30), any::<bool>()).prop_map(|(lines, trailing)| {
        let mut text = lines.join("\n");
        if trailing && !lines.is_empty() {
            text.push('\n');
        }
        text
    })
}

// ============================================================================
// Property 1: Identity
// ============================================================================
// Scripts that change nothing reproduce the input byte for byte

proptest! {
    /// An empty script is the identity, including a missing final newline
    #[test]
    fn prop_empty_script_is_identity(text in text_strategy()) {
        prop_assert_eq!(run("", &text), text);
    }

    /// Comments and blank lines compile to nothing
    #[test]
    fn prop_comment_only_script_is_identity(text in text_strategy()) {
        prop_assert_eq!(run("# nothing here\n\n;;", &text), text);
    }

    /// `h;g` copies the pattern space out and back unchanged
    #[test]
    fn prop_hold_and_get_is_identity(text in text_strategy()) {
        prop_assert_eq!(run("h;g", &text), text);
    }

    /// A substitution whose pattern never occurs leaves the text alone
    #[test]
    fn prop_substitution_no_match_is_identity(
        text in "[a-w\n]{0,100}",
        pattern in "[x-z]{1,5}"
    ) {
        let script = format!("s/{}/REPLACED/g", pattern);
        prop_assert_eq!(run(&script, &text), text);
    }
}

// ============================================================================
// Property 2: Substitution
// ============================================================================

proptest! {
    /// Without `g` only the first occurrence on each line changes
    #[test]
    fn prop_substitution_replaces_first_only(
        prefix in "[a-z]{0,10}",
        suffix in "[a-z]{0,10}",
        count in 1usize..10
    ) {
        let line = format!("{}{}{}", prefix, "foo".repeat(count), suffix);
        let output = run("s/foo/QUUX/", &line);
        prop_assert_eq!(output, line.replacen("foo", "QUUX", 1));
    }

    /// With `g` every occurrence changes
    #[test]
    fn prop_global_substitution_replaces_all(
        prefix in "[a-z]{0,10}",
        suffix in "[a-z]{0,10}",
        count in 1usize..10
    ) {
        let line = format!("{}{}{}", prefix, "foo".repeat(count), suffix);
        let expected_count = line.matches("foo").count();

        let output = run("s/foo/QUUX_REPLACED/g", &line);
        prop_assert!(!output.contains("foo"));
        prop_assert_eq!(output.matches("QUUX_REPLACED").count(), expected_count);
    }

    /// Swapping two groups reverses a two-part match
    #[test]
    fn prop_group_swap(a in "[a-m]{1,8}", b in "[n-z]{1,8}") {
        let script = r"s/\([a-m]*\)\([n-z]*\)/\2\1/";
        let output = run(script, &format!("{}{}", a, b));
        prop_assert_eq!(output, format!("{}{}", b, a));
    }

    /// `s/^/X/g` inserts exactly one X at the start of each line
    #[test]
    fn prop_anchored_global_inserts_once(lines in prop::collection::vec("[a-z]{0,10}", 1..20)) {
        let text = lines.join("\n") + "\n";
        let expected: String = lines.iter().map(|l| format!("X{}\n", l)).collect();
        prop_assert_eq!(run("s/^/X/g", &text), expected);
    }

    /// A substitute-and-branch loop always terminates
    #[test]
    fn prop_branch_loop_terminates(line in "[a-z]{0,40}") {
        let output = run(":top\ns/x/y/\nt top", &line);
        prop_assert!(!output.contains('x'));
        prop_assert_eq!(output.len(), line.len());
    }
}

// ============================================================================
// Property 3: Transliteration
// ============================================================================

proptest! {
    /// Applying the same `y` twice equals applying it once when the
    /// destination characters map to themselves
    #[test]
    fn prop_translate_is_idempotent(text in "[a-f\n]{0,60}") {
        let script = "y/abc/def/";
        let once = run(script, &text);
        let twice = run(script, &once);
        prop_assert_eq!(once, twice);
    }
}

// ============================================================================
// Property 4: Line selection
// ============================================================================

proptest! {
    /// `2,4d` keeps line 1 and everything from line 5 on
    #[test]
    fn prop_delete_range(lines in prop::collection::vec("[a-z]{1,20}", 1..50)) {
        let text = lines.join("\n") + "\n";
        let expected: String = lines
            .iter()
            .enumerate()
            .filter(|(i, _)| !(1..=3).contains(i))
            .map(|(_, l)| format!("{}\n", l))
            .collect();
        prop_assert_eq!(run("2,4d", &text), expected);
    }

    /// `$d` drops exactly the last line
    #[test]
    fn prop_delete_last_line(lines in prop::collection::vec("[a-z]{1,20}", 1..50)) {
        let text = lines.join("\n") + "\n";
        let expected: String = lines[..lines.len() - 1]
            .iter()
            .map(|l| format!("{}\n", l))
            .collect();
        prop_assert_eq!(run("$d", &text), expected);
    }

    /// `-n` with `$=` counts the lines
    #[test]
    fn prop_line_count(lines in prop::collection::vec("[a-z]{0,20}", 1..50)) {
        let text = lines.join("\n") + "\n";
        let options = ProcessingOptions {
            quiet: true,
            ..ProcessingOptions::default()
        };
        let output = process_text("$=", &text, &options).unwrap();
        prop_assert_eq!(output, format!("{}\n", lines.len()));
    }
}

// ============================================================================
// Property 5: Compilation
// ============================================================================

proptest! {
    /// An `s` command missing its closing delimiter never compiles
    #[test]
    fn prop_unterminated_substitution_fails(pattern in "[a-z]{1,10}", replacement in "[a-z]{0,10}") {
        let script = format!("s/{}/{}", pattern, replacement);
        prop_assert!(Parser::new(RegexFlavor::BRE).parse(&script).is_err());
    }

    /// Compiling never panics, whatever the script text (`w` is left out
    /// so no files get created)
    #[test]
    fn prop_parser_never_panics(script in "[ -vx-~\n]{0,40}") {
        let _ = Parser::new(RegexFlavor::BRE).parse(&script);
        let _ = Parser::new(RegexFlavor::ERE).parse(&script);
    }
}

// ============================================================================
// Property 6: In-place editing matches stdout output
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_in_place_matches_stream_output(text in text_strategy()) {
        let script = "s/a/A/g;2d";
        let expected = run(script, &text);

        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("test.txt");
        fs::write(&file_path, &text).unwrap();

        let options = ProcessingOptions {
            separate: true,
            ..ProcessingOptions::default()
        };
        let compiled = Parser::new(RegexFlavor::BRE).parse(script).unwrap();
        let mut editor = FileProcessor::new(StreamProcessor::new(compiled, options), None);
        editor.apply_to_file(&file_path).unwrap();
        editor.finish().unwrap();

        prop_assert_eq!(fs::read_to_string(&file_path).unwrap(), expected);
    }
}

// ============================================================================
// Regression tests
// ============================================================================

#[test]
fn test_unterminated_substitution_example() {
    assert!(Parser::new(RegexFlavor::BRE).parse("s/a/b").is_err());
}

#[test]
fn test_zero_width_global_example() {
    assert_eq!(run("s/^/X/g", "ab"), "Xab");
    assert_eq!(run("s/x*/-/g", "abc\n"), "-a-b-c-\n");
}
