//! End-to-end REPL scenarios (§8's concrete transcripts) driven
//! through the public `Interpreter`/`Repl` surface, the way the
//! teacher's `tests/interpreter_tests.rs` drives its `Context` end to
//! end rather than poking at internals.

use ulogo::host::NullHost;
use ulogo::interface::Repl;
use ulogo::value::{Status, Value};
use ulogo::Interpreter;

fn eval(text: &str) -> (Status, Vec<u8>) {
    let mut interp = Interpreter::new();
    let mut host = NullHost::default();
    let status = interp.eval_text(&mut host, text);
    (status, host.output)
}

#[test]
fn print_sum_of_two_numbers() {
    let (status, out) = eval("print sum 3 4");
    assert!(matches!(status, Status::None));
    assert_eq!(out, b"7\n".to_vec());
}

#[test]
fn make_and_read_back_a_global() {
    let (status, out) = eval("make \"x 10 print :x + :x");
    assert!(matches!(status, Status::None));
    assert_eq!(out, b"20\n".to_vec());
}

#[test]
fn repeat_runs_a_bracketed_body_n_times() {
    let (status, out) = eval("repeat 3 [print \"hi]");
    assert!(matches!(status, Status::None));
    assert_eq!(out, b"hi\nhi\nhi\n".to_vec());
}

#[test]
fn quotient_by_zero_reports_the_documented_message() {
    let (status, _out) = eval("quotient 5 0");
    match status {
        Status::Error(e) => assert_eq!(e.message(), "Can't divide by zero"),
        other => panic!("expected a divide-by-zero error, got {other:?}"),
    }
}

#[test]
fn caught_throw_value_surfaces_as_an_unused_top_level_value() {
    // `throw` takes its optional return value only through the
    // parenthesized variadic call form; the bare `throw "e "caught`
    // form consumes just the tag per its default arity.
    let (status, _out) = eval("catch \"e [(throw \"e \"caught)]");
    match status {
        Status::Error(e) => assert_eq!(e.message(), "I don't know what to do with caught"),
        other => panic!("expected an unused-value error, got {other:?}"),
    }
}

#[test]
fn tail_recursive_countdown_prints_in_order_and_stays_in_bounded_frames() {
    let mut interp = Interpreter::new();
    let mut host = NullHost::default();
    let status =
        interp.eval_text(&mut host, "to f :n if :n < 1 [stop] print :n f :n - 1 end");
    assert!(matches!(status, Status::None));

    let status = interp.eval_text(&mut host, "f 3");
    assert!(matches!(status, Status::None));
    assert_eq!(host.output, b"3\n2\n1\n".to_vec());
}

#[test]
fn self_recursive_tail_call_does_not_grow_the_frame_depth() {
    let mut interp = Interpreter::new();
    let mut host = NullHost::default();
    interp.eval_text(&mut host, "to count_down :n if :n < 1 [stop] count_down :n - 1 end");
    let before = interp.frames.depth();
    let status = interp.eval_text(&mut host, "count_down 10000");
    assert!(matches!(status, Status::None));
    assert_eq!(interp.frames.depth(), before);
}

#[test]
fn round_trips_a_procedure_definition_through_po_and_the_repl_parser() {
    let mut repl = Repl::new();
    let mut host = NullHost::default();
    repl.load_text(&mut host, "to sq :n\noutput :n * :n\nend\n");
    assert!(repl.interpreter().procs.is_defined("sq"));

    host.output.clear();
    let status = repl.interpreter_mut().eval_text(&mut host, "po \"sq");
    assert!(matches!(status, Status::None));
    let rendered = String::from_utf8(host.output.clone()).unwrap();
    assert!(rendered.starts_with("to sq :n\n"));
    assert!(rendered.trim_end().ends_with("end"));

    let mut repl2 = Repl::new();
    let mut host2 = NullHost::default();
    repl2.load_text(&mut host2, &rendered);
    assert!(repl2.interpreter().procs.is_defined("sq"));
    host2.output.clear();
    let status = repl2.interpreter_mut().eval_text(&mut host2, "print sq 6");
    assert!(matches!(status, Status::None));
    assert_eq!(host2.output, b"36\n".to_vec());
}

#[test]
fn make_printed_via_pons_restores_an_equal_value() {
    let mut interp = Interpreter::new();
    let mut host = NullHost::default();
    interp.eval_text(&mut host, "make \"x 10");
    host.output.clear();
    interp.eval_text(&mut host, "pons");
    let rendered = String::from_utf8(host.output.clone()).unwrap();
    assert_eq!(rendered, "make \"x 10\n");

    let mut interp2 = Interpreter::new();
    let mut host2 = NullHost::default();
    interp2.eval_text(&mut host2, rendered.trim_end());
    match interp2.eval_text(&mut host2, "thing \"x") {
        Status::Ok(Value::Number(n)) => assert_eq!(n, 10.0),
        other => panic!("expected 10, got {other:?}"),
    }
}

#[test]
fn variable_scoping_chain_shadows_then_unwinds_to_global_or_undefined() {
    use ulogo::vars::Variables;

    let mut vars = Variables::new();
    vars.push_scope().unwrap();
    vars.local("x", Value::Number(1.0)).unwrap();
    vars.push_scope().unwrap();
    vars.local("x", Value::Number(2.0)).unwrap();
    assert_eq!(vars.get("x"), Some(Value::Number(2.0)));
    vars.pop_scope();
    assert_eq!(vars.get("x"), Some(Value::Number(1.0)));
    vars.pop_scope();
    assert_eq!(vars.get("x"), None);

    vars.make("x", Value::Number(42.0)).unwrap();
    vars.push_scope().unwrap();
    vars.local("x", Value::Number(1.0)).unwrap();
    assert_eq!(vars.get("x"), Some(Value::Number(1.0)));
    vars.pop_scope();
    assert_eq!(vars.get("x"), Some(Value::Number(42.0)));
}

#[test]
fn variable_names_are_case_insensitive() {
    let (status, out) = eval("make \"Count 1 print :count");
    assert!(matches!(status, Status::None));
    assert_eq!(out, b"1\n".to_vec());
}

#[test]
fn procedure_names_are_case_insensitive() {
    let mut interp = Interpreter::new();
    let mut host = NullHost::default();
    interp.eval_text(&mut host, "to Square :n\noutput :n * :n\nend\n");
    let status = interp.eval_text(&mut host, "print square 5");
    assert!(matches!(status, Status::None));
    assert_eq!(host.output, b"25\n".to_vec());
}

#[test]
fn local_binds_into_the_calling_frame_without_panicking() {
    let mut interp = Interpreter::new();
    let mut host = NullHost::default();
    interp.eval_text(&mut host, "to f\nlocal \"x\nmake \"x 5\noutput :x\nend\n");
    let status = interp.eval_text(&mut host, "print f");
    assert!(matches!(status, Status::None));
    assert_eq!(host.output, b"5\n".to_vec());
}

#[test]
fn unbury_reaches_a_buried_variable() {
    let mut interp = Interpreter::new();
    let mut host = NullHost::default();
    interp.eval_text(&mut host, "make \"x 1");
    interp.eval_text(&mut host, "bury \"x");
    assert!(interp.vars.is_global_buried("x"));
    interp.eval_text(&mut host, "unbury \"x");
    assert!(!interp.vars.is_global_buried("x"));
}

#[test]
fn ern_erases_a_global_variable() {
    let mut interp = Interpreter::new();
    let mut host = NullHost::default();
    interp.eval_text(&mut host, "make \"x 1");
    assert!(interp.vars.is_defined("x"));
    interp.eval_text(&mut host, "ern \"x");
    assert!(!interp.vars.is_defined("x"));
}

#[test]
fn every_documented_error_kind_is_reachable() {
    use ulogo::ErrorKind;

    let cases: &[(&str, ErrorKind)] = &[
        ("thing \"nope", ErrorKind::NoValue),
        ("quotient 1 0", ErrorKind::DivideByZero),
        ("nosuchproc 1 2", ErrorKind::DontKnowHow),
        ("print [1 2", ErrorKind::BracketMismatch),
    ];
    for (text, expected) in cases {
        let (status, _) = eval(text);
        match status {
            Status::Error(e) => assert_eq!(&e.kind, expected, "for input {text:?}"),
            other => panic!("input {text:?}: expected error, got {other:?}"),
        }
    }

    let (status, _) = eval("print 3 4");
    match status {
        Status::Error(e) => assert_eq!(e.kind, ErrorKind::DontKnowWhat),
        other => panic!("expected DontKnowWhat, got {other:?}"),
    }

    let (status, _) = eval("to print :x end");
    match status {
        Status::Error(e) => assert_eq!(e.kind, ErrorKind::IsPrimitive),
        other => panic!("expected IsPrimitive, got {other:?}"),
    }
}
