//! FileCheck-style test validation for TIR files.
//!
//! A `.tir` test carries its own expectations in comment directives:
//!
//! ```text
//! ; RUN: tripc --eval %s
//! ; RUN: not tripc --max-temps=1 %s
//! ; CHECK: Listing:
//! ; CHECK-NEXT: t0: lit "abc" -> val[0]
//! ```
//!
//! Every RUN line compiles the unit with the options it names and the output
//! is matched against the CHECK directives, the way LLVM's FileCheck does. A
//! RUN line prefixed with `not` expects the compile to fail.

use super::eval::Evaluator;
use crate::core::compiler::{CompileKind, CompileOptions, Compiler, FullBool};
use crate::core::emitter::{write_listing, ListingEmitter};
use crate::core::error::CompileError;
use std::collections::VecDeque;

/// A CHECK directive extracted from a TIR file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckDirective {
    /// CHECK: pattern - Match a later line
    Check(String),
    /// CHECK-LABEL: pattern - Label for a section
    CheckLabel(String),
    /// CHECK-NEXT: pattern - Match on the next line
    CheckNext(String),
    /// CHECK-NOT: pattern - No line up to the next match contains the pattern
    CheckNot(String),
    /// CHECK-EMPTY - Match empty line
    CheckEmpty,
    /// COM: comment - Comment, ignored
    Comment(String),
}

/// A RUN directive specifying how to execute the test
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunDirective {
    pub command: String,
    pub args: Vec<String>,
    pub expect_failure: bool,
}

/// Test specification extracted from a TIR file
#[derive(Debug)]
pub struct TestSpec {
    pub run_directives: Vec<RunDirective>,
    pub check_directives: Vec<CheckDirective>,
    pub tir_content: String,
}

impl TestSpec {
    /// Parse a TIR file to extract test specifications
    pub fn parse(content: &str) -> Result<Self, String> {
        let mut run_directives = Vec::new();
        let mut check_directives = Vec::new();
        let mut tir_lines = Vec::new();

        for line in content.lines() {
            let trimmed = line.trim();

            if let Some(run_cmd) = trimmed.strip_prefix("; RUN:") {
                let (expect_failure, run_cmd) = match run_cmd.trim().strip_prefix("not ") {
                    Some(cmd) => (true, cmd),
                    None => (false, run_cmd),
                };
                let parts: Vec<&str> = run_cmd.split_whitespace().collect();
                let Some((command, args)) = parts.split_first() else {
                    return Err(format!("empty RUN directive: '{trimmed}'"));
                };
                run_directives.push(RunDirective {
                    command: command.to_string(),
                    args: args.iter().map(|s| s.to_string()).collect(),
                    expect_failure,
                });
            } else if let Some(pattern) = trimmed.strip_prefix("; CHECK-LABEL:") {
                check_directives.push(CheckDirective::CheckLabel(pattern.trim().to_string()));
            } else if let Some(pattern) = trimmed.strip_prefix("; CHECK-NEXT:") {
                check_directives.push(CheckDirective::CheckNext(pattern.trim().to_string()));
            } else if let Some(pattern) = trimmed.strip_prefix("; CHECK-NOT:") {
                check_directives.push(CheckDirective::CheckNot(pattern.trim().to_string()));
            } else if trimmed.starts_with("; CHECK-EMPTY") {
                check_directives.push(CheckDirective::CheckEmpty);
            } else if let Some(pattern) = trimmed.strip_prefix("; CHECK:") {
                check_directives.push(CheckDirective::Check(pattern.trim().to_string()));
            } else if let Some(comment) = trimmed.strip_prefix("; COM:") {
                check_directives.push(CheckDirective::Comment(comment.trim().to_string()));
            } else {
                // Regular TIR content
                tir_lines.push(line);
            }
        }

        if run_directives.is_empty() {
            return Err("no RUN directive".to_string());
        }

        Ok(TestSpec {
            run_directives,
            check_directives,
            tir_content: tir_lines.join("\n"),
        })
    }
}

/// Settings decoded from the arguments of one RUN line.
#[derive(Debug, Clone, Default)]
struct RunConfig {
    options: CompileOptions,
    kind: Option<CompileKind>,
    print_lowered: bool,
    eval: bool,
    truth: bool,
    stats: bool,
    noops: bool,
}

impl RunConfig {
    fn from_args(args: &[String]) -> Result<Self, String> {
        let mut config = RunConfig::default();
        for arg in args {
            let (flag, value) = match arg.split_once('=') {
                Some((flag, value)) => (flag, Some(value)),
                None => (arg.as_str(), None),
            };
            let number = |v: Option<&str>| -> Result<u64, String> {
                v.and_then(|v| v.parse().ok())
                    .ok_or_else(|| format!("{flag} expects a number"))
            };
            match flag {
                "--full-bool" => {
                    let mode = match value {
                        Some("standard") => FullBool::Standard,
                        Some("full") => FullBool::Full,
                        Some("ext") => FullBool::Ext,
                        _ => return Err(format!("bad value in '{arg}'")),
                    };
                    config.options = config.options.with_full_bool(mode);
                }
                "--var-count" => {
                    let n = u32::try_from(number(value)?).map_err(|e| e.to_string())?;
                    config.options = config.options.with_var_count(n);
                }
                "--max-temps" => {
                    let n = usize::try_from(number(value)?).map_err(|e| e.to_string())?;
                    config.options = config.options.with_max_temps(n);
                }
                "--no-inline-literals" => config.options = config.options.with_inline_literals(false),
                "--no-line-entry" => config.options = config.options.with_line_entry(false),
                "--indirect" => config.kind = Some(CompileKind::Indirect),
                "--print-lowered" => config.print_lowered = true,
                "--eval" => config.eval = true,
                "--truth" => config.truth = true,
                "--stats" => config.stats = true,
                "--noops" => config.noops = true,
                other if other.starts_with("--") => return Err(format!("unknown RUN option '{arg}'")),
                // File placeholders such as %s.
                _ => {}
            }
        }
        Ok(config)
    }
}

/// Test runner that executes TIR tests
pub struct TestRunner {
    verbose: bool,
}

impl TestRunner {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    /// Run a TIR test and validate output
    pub fn run_test(&self, spec: &TestSpec) -> Result<(), String> {
        for run_dir in &spec.run_directives {
            let output = self.execute_command(&spec.tir_content, run_dir)?;
            if self.verbose {
                println!("RUN: {} {}\n{}", run_dir.command, run_dir.args.join(" "), output);
            }
            self.validate_output(&output, &spec.check_directives)?;
        }
        Ok(())
    }

    /// Compile `source` as one RUN line asks and return the output to check.
    pub fn execute_command(&self, source: &str, run_dir: &RunDirective) -> Result<String, String> {
        let config = RunConfig::from_args(&run_dir.args)?;
        let mut compiler = Compiler::new(
            config.options.clone(),
            ListingEmitter::new().with_noops(config.noops),
        );

        let mut output = Vec::new();
        let result = compiler.compile(
            config.kind.unwrap_or(CompileKind::Normal),
            source,
            |ctx, source| {
                let parsed = super::front_end(ctx, source)?;

                if config.print_lowered {
                    let mut listing = String::new();
                    write_listing(&mut listing, &ctx.graph, &ctx.literals, config.noops)
                        .map_err(|e| CompileError::Emit {
                            reason: e.to_string(),
                        })?;
                    output.push("Lowered:".to_string());
                    output.extend(listing.lines().map(str::to_string));
                }

                if config.eval {
                    output.push("Eval:".to_string());
                    match Evaluator::new(ctx).with_test(config.truth).run(parsed.ret) {
                        Ok(outcome) => {
                            output.extend(outcome.output.iter().map(|line| format!("write: {line}")));
                            match outcome.result {
                                Some(value) => output.push(format!("result: {value}")),
                                None => output.push("result: none".to_string()),
                            }
                        }
                        Err(e) => output.push(format!("eval error: {e}")),
                    }
                }
                Ok(parsed)
            },
        );

        match (result, run_dir.expect_failure) {
            (Ok(object), false) => {
                output.push("Listing:".to_string());
                let listing = object
                    .listing()
                    .ok_or_else(|| "listing is not valid UTF-8".to_string())?;
                output.extend(listing.lines().map(str::to_string));
                if config.stats {
                    output.extend(object.stats.to_string().lines().map(str::to_string));
                }
            }
            (Ok(_), true) => return Err("expected compilation to fail but it succeeded".to_string()),
            (Err(e), true) => output.push(format!("error: {e}")),
            (Err(e), false) => return Err(format!("compilation failed: {e}")),
        }

        Ok(output.join("\n"))
    }

    /// Validate output against CHECK directives
    pub fn validate_output(&self, output: &str, directives: &[CheckDirective]) -> Result<(), String> {
        let output_lines: VecDeque<_> = output.lines().collect();
        let mut line_idx = 0;
        let mut pending_not: Vec<&str> = Vec::new();

        // Lines between the previous match and `end` must not contain any
        // pending CHECK-NOT pattern.
        let check_nots = |pending: &mut Vec<&str>, start: usize, end: usize| -> Result<(), String> {
            for pattern in pending.drain(..) {
                let end = end.min(output_lines.len());
                if let Some(line) = output_lines.range(start..end).find(|line| line.contains(pattern)) {
                    return Err(format!("CHECK-NOT: pattern '{pattern}' found in '{line}'"));
                }
            }
            Ok(())
        };

        for directive in directives {
            match directive {
                CheckDirective::Comment(_) => continue,

                CheckDirective::CheckNot(pattern) => pending_not.push(pattern.as_str()),

                CheckDirective::Check(pattern) | CheckDirective::CheckLabel(pattern) => {
                    let found = output_lines
                        .iter()
                        .skip(line_idx)
                        .position(|line| line.contains(pattern.as_str()));

                    let kind = match directive {
                        CheckDirective::CheckLabel(_) => "CHECK-LABEL",
                        _ => "CHECK",
                    };
                    match found {
                        Some(idx) => {
                            check_nots(&mut pending_not, line_idx, line_idx + idx)?;
                            line_idx += idx + 1;
                            if self.verbose {
                                println!("{kind}: '{}' found at line {}", pattern, line_idx - 1);
                            }
                        }
                        None => {
                            return Err(format!("{kind}: pattern '{pattern}' not found in output"));
                        }
                    }
                }

                CheckDirective::CheckNext(pattern) => {
                    if line_idx >= output_lines.len() {
                        return Err(format!("CHECK-NEXT: no more lines, expected '{}'", pattern));
                    }

                    let line = output_lines[line_idx];
                    if !line.contains(pattern.as_str()) {
                        return Err(format!("CHECK-NEXT: expected '{}' but got '{}'", pattern, line));
                    }

                    if self.verbose {
                        println!("CHECK-NEXT: '{}' matches at line {}", pattern, line_idx);
                    }
                    line_idx += 1;
                }

                CheckDirective::CheckEmpty => {
                    if line_idx >= output_lines.len() {
                        continue; // End of output counts as empty
                    }

                    let line = output_lines[line_idx];
                    if !line.trim().is_empty() {
                        return Err(format!("CHECK-EMPTY: expected empty line but got '{}'", line));
                    }
                    line_idx += 1;
                }
            }
        }

        check_nots(&mut pending_not, line_idx, output_lines.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_directives() {
        let content = r#"; RUN: tripc --eval %s
; RUN: not tripc --max-temps=1 %s
; CHECK: Listing:
; CHECK-LABEL: t0
; CHECK-NEXT: t1
; CHECK-NOT: cobool
; COM: This is a comment
%a = lit "x"
ret %a"#;

        let spec = TestSpec::parse(content).unwrap();
        assert_eq!(spec.run_directives.len(), 2);
        assert!(!spec.run_directives[0].expect_failure);
        assert!(spec.run_directives[1].expect_failure);
        assert_eq!(spec.run_directives[1].command, "tripc");
        assert_eq!(spec.run_directives[1].args, vec!["--max-temps=1", "%s"]);
        assert_eq!(spec.check_directives.len(), 5);
        assert!(spec.tir_content.contains("%a = lit"));
        assert!(!spec.tir_content.contains("CHECK"));
    }

    #[test]
    fn test_missing_run_is_rejected() {
        assert!(TestSpec::parse("; CHECK: x\nret").is_err());
    }

    #[test]
    fn test_check_matching() {
        let runner = TestRunner::new(false);
        let output = "Listing:\nt0: lit\nt1: ret\n";

        let directives = vec![
            CheckDirective::Check("Listing:".to_string()),
            CheckDirective::CheckLabel("t0".to_string()),
            CheckDirective::CheckNext("t1".to_string()),
            CheckDirective::CheckEmpty,
        ];

        runner.validate_output(output, &directives).unwrap();
    }

    #[test]
    fn test_check_next_failure() {
        let runner = TestRunner::new(false);
        let output = "Line 1\nLine 2\nLine 3\n";

        let directives = vec![
            CheckDirective::Check("Line 1".to_string()),
            CheckDirective::CheckNext("Line 3".to_string()),
        ];

        let result = runner.validate_output(output, &directives);
        assert!(result.unwrap_err().contains("CHECK-NEXT"));
    }

    #[test]
    fn test_check_not() {
        let runner = TestRunner::new(false);
        let output = "a\nb\nc\n";

        let between = vec![
            CheckDirective::Check("a".to_string()),
            CheckDirective::CheckNot("b".to_string()),
            CheckDirective::Check("c".to_string()),
        ];
        assert!(runner.validate_output(output, &between).is_err());

        let trailing = vec![
            CheckDirective::Check("b".to_string()),
            CheckDirective::CheckNot("a".to_string()),
        ];
        runner.validate_output(output, &trailing).unwrap();
    }

    #[test]
    fn test_run_options() {
        let args: Vec<String> = ["--full-bool=ext", "--var-count=3", "--no-line-entry", "%s"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let config = RunConfig::from_args(&args).unwrap();
        assert_eq!(config.options.full_bool, FullBool::Ext);
        assert_eq!(config.options.var_count, 3);
        assert!(!config.options.line_entry);

        assert!(RunConfig::from_args(&["--full-bool=maybe".to_string()]).is_err());
        assert!(RunConfig::from_args(&["--bogus".to_string()]).is_err());
    }

    #[test]
    fn test_execute_listing_and_failure() {
        let runner = TestRunner::new(false);
        let source = "%a = lit \"x\"\n%b = lit \"y\"\n%c = cat %a, %b\nret %c\n";

        let run = RunDirective {
            command: "tripc".to_string(),
            args: vec!["--eval".to_string()],
            expect_failure: false,
        };
        let output = runner.execute_command(source, &run).unwrap();
        assert!(output.contains("result: xy"), "{output}");
        assert!(output.contains("Listing:"), "{output}");
        assert!(output.contains("retarg"), "{output}");

        let failing = RunDirective {
            command: "tripc".to_string(),
            args: vec![],
            expect_failure: true,
        };
        let err = runner.execute_command(source, &failing).unwrap_err();
        assert!(err.contains("expected compilation to fail"));

        let extra = runner
            .execute_command("ret \"x\" junk\n", &failing)
            .unwrap();
        assert!(extra.contains("error: extra characters"), "{extra}");
    }
}
