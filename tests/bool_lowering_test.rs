//! Boolean lowering checked against the reference evaluator.
//!
//! Every case builds the same expression twice: once evaluated as a value and
//! once lowered to a jump chain towards `hit`. The chain must reach `hit`
//! exactly when the value equals the requested sense.

use bumpalo::Bump;
use tribe::tir::{parse_into, Evaluator, Outcome, TirUnit, Value};
use tribe::{CompileContext, CompileOptions, FullBool, Opcode};

fn run(text: &str, options: CompileOptions, truth: bool) -> (Outcome, TirUnit, Vec<Opcode>) {
    let _ = env_logger::builder().is_test(true).try_init();
    let arena = Bump::new();
    let mut ctx = CompileContext::new(&arena, options);
    let unit = parse_into(&mut ctx, text).unwrap_or_else(|e| panic!("{e}\n{text}"));
    let outcome = Evaluator::new(&ctx)
        .with_test(truth)
        .run(unit.parsed.ret)
        .unwrap_or_else(|e| panic!("{e}\n{text}"));
    let opcodes = ctx.graph.exec_order().map(|id| ctx.graph[id].opcode).collect();
    (outcome, unit, opcodes)
}

/// Value of `%e` after `body`.
fn value_of(body: &str) -> bool {
    let text = format!("{body}ret %e\n");
    let (outcome, _, _) = run(&text, CompileOptions::default(), false);
    outcome.result.map_or(false, |v| v.truth())
}

/// Whether lowering `%e` with `sense` reaches the target.
fn reaches_target(body: &str, sense: bool, options: CompileOptions) -> (bool, Outcome, TirUnit) {
    let text = format!(
        "{body}lower %e, {sense}, ^hit\nwrite \"miss\"\njmp ^end\nhit:\nwrite \"hit\"\nend:\nret\n"
    );
    let (outcome, unit, _) = run(&text, options, false);
    let hit = match outcome.output.as_slice() {
        [line] if line == "hit" => true,
        [line] if line == "miss" => false,
        other => panic!("unexpected output {other:?}\n{text}"),
    };
    (hit, outcome, unit)
}

fn binary(op: &str, a: &str, b: &str) -> String {
    format!("%a = lit {a:?}\n%b = lit {b:?}\n%e = {op} %a, %b\n")
}

#[test]
fn test_relational_lowering_matches_values() {
    let ops = [
        "equ", "nequ", "follow", "nfollow", "sortsafter", "nsortsafter", "contain", "ncontain", "gt",
        "ngt", "lt", "nlt",
    ];
    let pairs = [
        ("abc", "abc"),
        ("abc", "b"),
        ("b", "abc"),
        ("10", "9"),
        ("9", "10"),
        ("-3", "2x"),
        ("", "a"),
    ];

    for op in ops {
        for (a, b) in pairs {
            let body = binary(op, a, b);
            let expected = value_of(&body);
            for sense in [true, false] {
                let (hit, _, _) = reaches_target(&body, sense, CompileOptions::default());
                assert_eq!(hit, expected == sense, "{op} {a:?} {b:?} sense={sense}");
            }
        }
    }
}

#[test]
fn test_pattern_lowering_matches_values() {
    let pairs = [("123", "3N"), ("12a", "3N"), ("Abc", "1U.L"), ("abc", "1U.L")];
    for op in ["pattern", "npattern"] {
        for (subject, pattern) in pairs {
            let body = binary(op, subject, pattern);
            let expected = value_of(&body);
            for sense in [true, false] {
                let (hit, _, _) = reaches_target(&body, sense, CompileOptions::default());
                assert_eq!(hit, expected == sense, "{op} {subject:?} {pattern:?} sense={sense}");
            }
        }
    }
}

/// `%l = equ p, "1"` and `%r = equ q, "1"` combined by `op`.
fn connective(op: &str, p: bool, q: bool) -> String {
    format!(
        "%one = lit \"1\"\n%p = lit \"{}\"\n%l = equ %p, %one\n%q = lit \"{}\"\n%r = equ %q, %one\n%e = {op} %l, %r\n",
        p as u8, q as u8
    )
}

#[test]
fn test_and_or_short_circuit() {
    for op in ["and", "nand", "or", "nor"] {
        for p in [false, true] {
            for q in [false, true] {
                let body = connective(op, p, q);
                let expected = value_of(&body);
                for sense in [true, false] {
                    let (hit, outcome, unit) = reaches_target(&body, sense, CompileOptions::default());
                    assert_eq!(hit, expected == sense, "{op} p={p} q={q} sense={sense}");

                    // The right operand only runs when the left one does not
                    // decide the result.
                    let decided = match op {
                        "and" | "nand" => !p,
                        _ => p,
                    };
                    assert_eq!(
                        outcome.ran(unit.id("%r")),
                        !decided,
                        "{op} p={p} q={q} sense={sense}"
                    );
                }
            }
        }
    }
}

/// `(p AND NOT q) OR (q NOR r)` with every Boolean leaf its own compare.
fn nested(p: bool, q: bool, r: bool) -> String {
    let leaf = |name: &str, v: bool| format!("%{name}v = lit \"{}\"\n%{name} = equ %{name}v, %one\n", v as u8);
    format!(
        "%one = lit \"1\"\n{}{}%nq = com %q1\n%left = and %p, %nq\n{}{}%right = nor %q2, %r\n%e = or %left, %right\n",
        leaf("p", p),
        leaf("q1", q),
        leaf("q2", q),
        leaf("r", r)
    )
}

#[test]
fn test_nested_expression_in_every_mode() {
    for mode in [FullBool::Standard, FullBool::Full, FullBool::Ext] {
        for bits in 0..8u8 {
            let (p, q, r) = (bits & 1 != 0, bits & 2 != 0, bits & 4 != 0);
            let body = nested(p, q, r);
            let expected = (p && !q) || !(q || r);
            assert_eq!(value_of(&body), expected, "value p={p} q={q} r={r}");
            for sense in [true, false] {
                let options = CompileOptions::default().with_full_bool(mode);
                let (hit, _, _) = reaches_target(&body, sense, options);
                assert_eq!(hit, expected == sense, "{mode:?} p={p} q={q} r={r} sense={sense}");
            }
        }
    }
}

#[test]
fn test_negation_flips_polarity_only() {
    // Lowering a negated relation with one sense produces the same chain as
    // the plain relation with the other sense.
    let plain = "%a = lit \"x\"\n%b = lit \"y\"\n%e = equ %a, %b\nlower %e, false, ^t\nt:\nret\n";
    let negated = "%a = lit \"x\"\n%b = lit \"y\"\n%e = nequ %a, %b\nlower %e, true, ^t\nt:\nret\n";
    let (_, _, plain_ops) = run(plain, CompileOptions::default(), false);
    let (_, _, negated_ops) = run(negated, CompileOptions::default(), false);
    assert_eq!(plain_ops, negated_ops);
    assert!(plain_ops.contains(&Opcode::JmpEqu));
}

#[test]
fn test_ext_mode_evaluates_both_operands() {
    let body = connective("and", false, true);
    let options = CompileOptions::default().with_full_bool(FullBool::Ext);
    let (hit, outcome, unit) = reaches_target(&body, true, options);
    assert!(!hit);
    assert!(outcome.ran(unit.id("%r")));
}

#[test]
fn test_truth_fetch_collapses_into_truth_jump() {
    let text = "%g = gettruth\n%e = cobool %g\nlower %e, true, ^hit\nwrite \"miss\"\njmp ^end\nhit:\nwrite \"hit\"\nend:\nret\n";
    for truth in [true, false] {
        let (outcome, _, ops) = run(text, CompileOptions::default(), truth);
        assert!(ops.contains(&Opcode::JmpTSet));
        assert!(!ops.contains(&Opcode::GetTruth));
        assert!(!ops.contains(&Opcode::CoBool));
        assert_eq!(outcome.output, vec![if truth { "hit" } else { "miss" }]);
    }
}

#[test]
fn test_value_truth_tests() {
    for op in ["cobool", "scobool"] {
        for (text, truthy) in [("5", true), ("0", false), ("abc", false), ("2x", true)] {
            let body = format!("%v = lit {text:?}\n%e = {op} %v\n");
            for sense in [true, false] {
                let (hit, _, _) = reaches_target(&body, sense, CompileOptions::default());
                assert_eq!(hit, truthy == sense, "{op} {text:?} sense={sense}");
            }
        }
    }
}

#[test]
fn test_saved_truth_value_keeps_its_fetch() {
    let text = "%g = gettruth\n%e = scobool %g\nlower %e, false, ^hit\nhit:\nret %g\n";
    let (outcome, _, ops) = run(text, CompileOptions::default(), true);
    assert!(ops.contains(&Opcode::GetTruth));
    assert!(ops.contains(&Opcode::JmpEqu));
    assert_eq!(outcome.result, Some(Value::Int(1)));
}
