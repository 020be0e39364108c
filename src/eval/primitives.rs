//! Primitive registry (C11, §4.11): name → `{ default_args, fn }`.
//! Each built-in receives `(Interpreter, Host, args)` and returns a
//! [`Status`]. Registered under every alias it's known by (`bf` and
//! `butfirst` share one entry) so [`super::Interpreter::dispatch_word`]
//! doesn't need special-case alias tables.

use std::collections::HashMap;

use crate::error::{ErrorKind, RuntimeError};
use crate::eval::{bool_word, require_number, Interpreter};
use crate::host::{Host, ReadLine};
use crate::memory::{Memory, Node};
use crate::proc::UserProc;
use crate::value::{node_to_value, Status, Value};

pub type PrimitiveFn = fn(&mut Interpreter, &mut dyn Host, Vec<Value>) -> Status;

#[derive(Clone, Copy)]
pub struct PrimitiveEntry {
    pub default_args: usize,
    pub func: PrimitiveFn,
}

#[derive(Default)]
pub struct PrimitiveRegistry {
    entries: HashMap<String, PrimitiveEntry>,
}

impl PrimitiveRegistry {
    fn register(&mut self, names: &[&str], default_args: usize, func: PrimitiveFn) {
        for name in names {
            self.entries.insert(name.to_ascii_lowercase(), PrimitiveEntry { default_args, func });
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(&name.to_ascii_lowercase())
    }

    pub fn default_args(&self, name: &str) -> usize {
        self.entries.get(&name.to_ascii_lowercase()).map(|e| e.default_args).unwrap_or(0)
    }

    pub fn lookup(&self, name: &str) -> Option<PrimitiveEntry> {
        self.entries.get(&name.to_ascii_lowercase()).copied()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(|s| s.as_str())
    }

    pub fn call(
        &self,
        interp: &mut Interpreter,
        host: &mut dyn Host,
        name: &str,
        args: Vec<Value>,
    ) -> Status {
        match self.lookup(name) {
            Some(entry) => (entry.func)(interp, host, args),
            None => Status::Error(RuntimeError::with_arg(ErrorKind::DontKnowHow, "run", name)),
        }
    }
}

pub fn build_registry() -> PrimitiveRegistry {
    let mut r = PrimitiveRegistry::default();

    // arithmetic/compare
    r.register(&["sum", "+"], 2, p_sum);
    r.register(&["difference", "-"], 2, p_difference);
    r.register(&["product", "*"], 2, p_product);
    r.register(&["quotient", "/"], 2, p_quotient);
    r.register(&["remainder"], 2, p_remainder);
    r.register(&["minus"], 1, p_minus);
    r.register(&["lessp", "<"], 2, p_lessp);
    r.register(&["greaterp", ">"], 2, p_greaterp);
    r.register(&["equalp", "="], 2, p_equalp);
    r.register(&["notequalp"], 2, p_notequalp);
    r.register(&["numberp"], 1, p_numberp);

    // word/list
    r.register(&["first"], 1, p_first);
    r.register(&["last"], 1, p_last);
    r.register(&["butfirst", "bf"], 1, p_butfirst);
    r.register(&["butlast", "bl"], 1, p_butlast);
    r.register(&["count"], 1, p_count);
    r.register(&["emptyp"], 1, p_emptyp);
    r.register(&["wordp"], 1, p_wordp);
    r.register(&["listp"], 1, p_listp);
    r.register(&["fput"], 2, p_fput);
    r.register(&["lput"], 2, p_lput);
    r.register(&["sentence", "se"], 2, p_sentence);
    r.register(&["list"], 2, p_list);
    r.register(&["word"], 2, p_word);
    r.register(&["ascii"], 1, p_ascii);
    r.register(&["char"], 1, p_char);
    r.register(&["uppercase"], 1, p_uppercase);
    r.register(&["lowercase"], 1, p_lowercase);

    // variables
    r.register(&["make"], 2, p_make);
    r.register(&["name"], 2, p_make);
    r.register(&["thing"], 1, p_thing);
    r.register(&["local"], 1, p_local);
    r.register(&["namep"], 1, p_namep);
    r.register(&["definedp"], 1, p_definedp);
    r.register(&["primitivep"], 1, p_primitivep);

    // control
    r.register(&["if"], 2, p_if);
    r.register(&["run"], 1, p_run);
    r.register(&["repeat"], 2, p_repeat);
    r.register(&["repcount"], 0, p_repcount);
    r.register(&["stop"], 0, p_stop);
    r.register(&["output", "op"], 1, p_output);
    r.register(&["test"], 1, p_test);
    r.register(&["iftrue", "ift"], 1, p_iftrue);
    r.register(&["iffalse", "iff"], 1, p_iffalse);
    r.register(&["catch"], 2, p_catch);
    r.register(&["throw"], 1, p_throw);
    r.register(&["pause"], 0, p_pause);
    r.register(&["co", "continue"], 0, p_continue);
    r.register(&["go"], 1, p_go);
    r.register(&["label"], 1, p_label);
    r.register(&["wait"], 1, p_wait);

    // logical
    r.register(&["and"], 2, p_and);
    r.register(&["or"], 2, p_or);
    r.register(&["not"], 1, p_not);

    // workspace
    r.register(&["po"], 1, p_po);
    r.register(&["pot"], 1, p_po);
    r.register(&["pots"], 0, p_pots);
    r.register(&["pons"], 0, p_pons);
    r.register(&["pon"], 0, p_pons);
    r.register(&["bury"], 1, p_bury);
    r.register(&["unbury"], 1, p_unbury);
    r.register(&["buryall"], 0, p_buryall);
    r.register(&["unburyall"], 0, p_unburyall);
    r.register(&["buryname"], 1, p_bury);
    r.register(&["unburyname"], 1, p_unbury);
    r.register(&["ern"], 1, p_ern);
    r.register(&["erall"], 0, p_erall);
    r.register(&["recycle"], 0, p_recycle);
    r.register(&["nodes"], 0, p_nodes);

    // properties
    r.register(&["pprop"], 3, p_pprop);
    r.register(&["gprop"], 2, p_gprop);
    r.register(&["plist"], 1, p_plist);
    r.register(&["remprop"], 2, p_remprop);
    r.register(&["pps"], 0, p_pps);
    r.register(&["erprops"], 1, p_erprops);

    // debugging
    r.register(&["trace"], 1, p_trace);
    r.register(&["untrace"], 1, p_untrace);
    r.register(&["step"], 1, p_trace);
    r.register(&["unstep"], 1, p_untrace);

    // I/O
    r.register(&["print", "pr"], 1, p_print);
    r.register(&["show"], 1, p_show);
    r.register(&["type"], 1, p_type);
    r.register(&["readlist", "rl"], 0, p_readlist);
    r.register(&["readword", "rw"], 0, p_readword);

    r
}

// ---- arithmetic/compare --------------------------------------------------

fn p_sum(interp: &mut Interpreter, _h: &mut dyn Host, args: Vec<Value>) -> Status {
    binop(interp, "sum", args, |a, b| Ok(a + b))
}
fn p_difference(interp: &mut Interpreter, _h: &mut dyn Host, args: Vec<Value>) -> Status {
    binop(interp, "difference", args, |a, b| Ok(a - b))
}
fn p_product(interp: &mut Interpreter, _h: &mut dyn Host, args: Vec<Value>) -> Status {
    binop(interp, "product", args, |a, b| Ok(a * b))
}
fn p_quotient(interp: &mut Interpreter, _h: &mut dyn Host, args: Vec<Value>) -> Status {
    binop(interp, "quotient", args, |a, b| {
        if b == 0.0 {
            Err(RuntimeError::new(ErrorKind::DivideByZero))
        } else {
            Ok(a / b)
        }
    })
}
fn p_remainder(interp: &mut Interpreter, _h: &mut dyn Host, args: Vec<Value>) -> Status {
    binop(interp, "remainder", args, |a, b| {
        if b == 0.0 {
            Err(RuntimeError::new(ErrorKind::DivideByZero))
        } else {
            Ok(a % b)
        }
    })
}
fn p_minus(interp: &mut Interpreter, _h: &mut dyn Host, mut args: Vec<Value>) -> Status {
    match require_number(&interp.memory, "minus", args.remove(0)) {
        Ok(n) => Status::Ok(Value::Number(-n)),
        Err(e) => Status::Error(e),
    }
}
fn p_lessp(interp: &mut Interpreter, _h: &mut dyn Host, args: Vec<Value>) -> Status {
    cmp(interp, "lessp", args, |a, b| a < b)
}
fn p_greaterp(interp: &mut Interpreter, _h: &mut dyn Host, args: Vec<Value>) -> Status {
    cmp(interp, "greaterp", args, |a, b| a > b)
}
fn p_equalp(interp: &mut Interpreter, _h: &mut dyn Host, args: Vec<Value>) -> Status {
    let eq = args[0].equals(&args[1], &interp.memory);
    Status::Ok(bool_word(&mut interp.memory, eq))
}
fn p_notequalp(interp: &mut Interpreter, _h: &mut dyn Host, args: Vec<Value>) -> Status {
    let eq = args[0].equals(&args[1], &interp.memory);
    Status::Ok(bool_word(&mut interp.memory, !eq))
}
fn p_numberp(interp: &mut Interpreter, _h: &mut dyn Host, args: Vec<Value>) -> Status {
    let is_num = args[0].as_number().is_some();
    Status::Ok(bool_word(&mut interp.memory, is_num))
}

fn binop(
    interp: &mut Interpreter,
    name: &str,
    mut args: Vec<Value>,
    f: impl Fn(f32, f32) -> Result<f32, RuntimeError>,
) -> Status {
    let b = args.pop().unwrap();
    let a = args.pop().unwrap();
    let a = match require_number(&interp.memory, name, a) {
        Ok(v) => v,
        Err(e) => return Status::Error(e),
    };
    let b = match require_number(&interp.memory, name, b) {
        Ok(v) => v,
        Err(e) => return Status::Error(e),
    };
    match f(a, b) {
        Ok(v) => Status::Ok(Value::Number(v)),
        Err(e) => Status::Error(e),
    }
}

fn cmp(interp: &mut Interpreter, name: &str, args: Vec<Value>, f: impl Fn(f32, f32) -> bool) -> Status {
    let a = match require_number(&interp.memory, name, args[0]) {
        Ok(v) => v,
        Err(e) => return Status::Error(e),
    };
    let b = match require_number(&interp.memory, name, args[1]) {
        Ok(v) => v,
        Err(e) => return Status::Error(e),
    };
    Status::Ok(bool_word(&mut interp.memory, f(a, b)))
}

// ---- word/list ------------------------------------------------------------

fn p_first(interp: &mut Interpreter, _h: &mut dyn Host, args: Vec<Value>) -> Status {
    match args[0] {
        Value::Word(w) => {
            let s = interp.memory.word_str(w);
            match s.chars().next() {
                Some(c) => {
                    let n = interp.memory.atom_str(&c.to_string());
                    Status::Ok(Value::Word(n))
                }
                None => Status::Error(bad_input(&interp.memory, "first", args[0])),
            }
        }
        Value::List(l) if !l.is_nil() => {
            let head = interp.memory.car(l);
            Status::Ok(node_to_value(head).unwrap_or(Value::None))
        }
        _ => Status::Error(bad_input(&interp.memory, "first", args[0])),
    }
}

fn p_last(interp: &mut Interpreter, _h: &mut dyn Host, args: Vec<Value>) -> Status {
    match args[0] {
        Value::Word(w) => {
            let s = interp.memory.word_str(w);
            match s.chars().last() {
                Some(c) => Status::Ok(Value::Word(interp.memory.atom_str(&c.to_string()))),
                None => Status::Error(bad_input(&interp.memory, "last", args[0])),
            }
        }
        Value::List(mut l) if !l.is_nil() => {
            let mut last = interp.memory.car(l);
            loop {
                let rest = interp.memory.cdr(l);
                if rest.is_nil() {
                    break;
                }
                last = interp.memory.car(rest);
                l = rest;
            }
            Status::Ok(node_to_value(last).unwrap_or(Value::None))
        }
        _ => Status::Error(bad_input(&interp.memory, "last", args[0])),
    }
}

fn p_butfirst(interp: &mut Interpreter, _h: &mut dyn Host, args: Vec<Value>) -> Status {
    match args[0] {
        Value::Word(w) => {
            let s = interp.memory.word_str(w);
            let rest: String = s.chars().skip(1).collect();
            Status::Ok(Value::Word(interp.memory.atom_str(&rest)))
        }
        Value::List(l) if !l.is_nil() => Status::Ok(Value::List(interp.memory.cdr(l))),
        _ => Status::Error(bad_input(&interp.memory, "butfirst", args[0])),
    }
}

fn p_butlast(interp: &mut Interpreter, _h: &mut dyn Host, args: Vec<Value>) -> Status {
    match args[0] {
        Value::Word(w) => {
            let s = interp.memory.word_str(w);
            let n = s.chars().count();
            let rest: String = s.chars().take(n.saturating_sub(1)).collect();
            Status::Ok(Value::Word(interp.memory.atom_str(&rest)))
        }
        Value::List(l) if !l.is_nil() => {
            let mut items = Vec::new();
            let mut cur = l;
            loop {
                let rest = interp.memory.cdr(cur);
                if rest.is_nil() {
                    break;
                }
                items.push(interp.memory.car(cur));
                cur = rest;
            }
            Status::Ok(Value::List(interp.memory.cons_list(&items)))
        }
        _ => Status::Error(bad_input(&interp.memory, "butlast", args[0])),
    }
}

fn p_count(interp: &mut Interpreter, _h: &mut dyn Host, args: Vec<Value>) -> Status {
    match args[0] {
        Value::Word(w) => Status::Ok(Value::Number(interp.memory.word_str(w).chars().count() as f32)),
        Value::List(l) => Status::Ok(Value::Number(interp.memory.list_len(l) as f32)),
        _ => Status::Error(bad_input(&interp.memory, "count", args[0])),
    }
}

fn p_emptyp(interp: &mut Interpreter, _h: &mut dyn Host, args: Vec<Value>) -> Status {
    let empty = match args[0] {
        Value::Word(w) => interp.memory.word_str(w).is_empty(),
        Value::List(l) => l.is_nil(),
        _ => false,
    };
    Status::Ok(bool_word(&mut interp.memory, empty))
}

fn p_wordp(interp: &mut Interpreter, _h: &mut dyn Host, args: Vec<Value>) -> Status {
    let is = matches!(args[0], Value::Word(_) | Value::Number(_));
    Status::Ok(bool_word(&mut interp.memory, is))
}

fn p_listp(interp: &mut Interpreter, _h: &mut dyn Host, args: Vec<Value>) -> Status {
    let is = matches!(args[0], Value::List(_));
    Status::Ok(bool_word(&mut interp.memory, is))
}

fn p_fput(interp: &mut Interpreter, _h: &mut dyn Host, args: Vec<Value>) -> Status {
    let Value::List(tail) = args[1] else {
        return Status::Error(bad_input(&interp.memory, "fput", args[1]));
    };
    let head = value_to_node(&mut interp.memory, args[0]);
    Status::Ok(Value::List(interp.memory.cons(head, tail)))
}

fn p_lput(interp: &mut Interpreter, _h: &mut dyn Host, args: Vec<Value>) -> Status {
    let Value::List(list) = args[1] else {
        return Status::Error(bad_input(&interp.memory, "lput", args[1]));
    };
    let mut items = collect_list(&interp.memory, list);
    items.push(value_to_node(&mut interp.memory, args[0]));
    Status::Ok(Value::List(interp.memory.cons_list(&items)))
}

fn p_sentence(interp: &mut Interpreter, _h: &mut dyn Host, args: Vec<Value>) -> Status {
    let mut items = Vec::new();
    for arg in args {
        match arg {
            Value::List(l) => items.extend(collect_list(&interp.memory, l)),
            other => items.push(value_to_node(&mut interp.memory, other)),
        }
    }
    Status::Ok(Value::List(interp.memory.cons_list(&items)))
}

fn p_list(interp: &mut Interpreter, _h: &mut dyn Host, args: Vec<Value>) -> Status {
    let items: Vec<Node> = args.into_iter().map(|v| value_to_node(&mut interp.memory, v)).collect();
    Status::Ok(Value::List(interp.memory.cons_list(&items)))
}

fn p_word(interp: &mut Interpreter, _h: &mut dyn Host, args: Vec<Value>) -> Status {
    let mut s = String::new();
    for arg in &args {
        s.push_str(&arg.to_display_string(&interp.memory));
    }
    Status::Ok(Value::Word(interp.memory.atom_str(&s)))
}

fn p_ascii(interp: &mut Interpreter, _h: &mut dyn Host, args: Vec<Value>) -> Status {
    match args[0] {
        Value::Word(w) => match interp.memory.word_str(w).chars().next() {
            Some(c) => Status::Ok(Value::Number(c as u32 as f32)),
            None => Status::Error(bad_input(&interp.memory, "ascii", args[0])),
        },
        _ => Status::Error(bad_input(&interp.memory, "ascii", args[0])),
    }
}

fn p_char(interp: &mut Interpreter, _h: &mut dyn Host, args: Vec<Value>) -> Status {
    match require_number(&interp.memory, "char", args[0]) {
        Ok(n) => match char::from_u32(n as u32) {
            Some(c) => Status::Ok(Value::Word(interp.memory.atom_str(&c.to_string()))),
            None => Status::Error(bad_input(&interp.memory, "char", args[0])),
        },
        Err(e) => Status::Error(e),
    }
}

fn p_uppercase(interp: &mut Interpreter, _h: &mut dyn Host, args: Vec<Value>) -> Status {
    match args[0] {
        Value::Word(w) => {
            let s = interp.memory.word_str(w).to_uppercase();
            Status::Ok(Value::Word(interp.memory.atom_str(&s)))
        }
        _ => Status::Error(bad_input(&interp.memory, "uppercase", args[0])),
    }
}

fn p_lowercase(interp: &mut Interpreter, _h: &mut dyn Host, args: Vec<Value>) -> Status {
    match args[0] {
        Value::Word(w) => {
            let s = interp.memory.word_str(w).to_lowercase();
            Status::Ok(Value::Word(interp.memory.atom_str(&s)))
        }
        _ => Status::Error(bad_input(&interp.memory, "lowercase", args[0])),
    }
}

fn value_to_node(memory: &mut Memory, v: Value) -> Node {
    match v {
        Value::Word(n) => n,
        Value::List(n) => n,
        Value::Newline => Node::NEWLINE,
        Value::None => Node::NIL,
        Value::Number(n) => memory.atom_str(&crate::value::format_number(n)),
    }
}

fn collect_list(memory: &Memory, mut l: Node) -> Vec<Node> {
    let mut out = Vec::new();
    while !l.is_nil() {
        out.push(memory.car(l));
        l = memory.cdr(l);
    }
    out
}

// ---- variables --------------------------------------------------------

fn p_make(interp: &mut Interpreter, _h: &mut dyn Host, args: Vec<Value>) -> Status {
    let Value::Word(name) = args[0] else {
        return Status::Error(bad_input(&interp.memory, "make", args[0]));
    };
    let name = interp.memory.word_str(name).to_string();
    if interp.frames.set_binding_in_chain(&name, args[1]) {
        return Status::Ok(Value::None);
    }
    match interp.vars.make(&name, args[1]) {
        Ok(()) => Status::Ok(Value::None),
        Err(_) => Status::Error(RuntimeError::new(ErrorKind::OutOfSpace)),
    }
}

fn p_thing(interp: &mut Interpreter, _h: &mut dyn Host, args: Vec<Value>) -> Status {
    let Value::Word(name) = args[0] else {
        return Status::Error(bad_input(&interp.memory, "thing", args[0]));
    };
    let name = interp.memory.word_str(name).to_string();
    match interp.frames.find_binding_in_chain(&name).or_else(|| interp.vars.get(&name)) {
        Some(v) => Status::Ok(v),
        None => Status::Error(RuntimeError::with_arg(ErrorKind::NoValue, "thing", name)),
    }
}

/// `local` binds into the *current call frame*, not `Variables`'s own
/// scope stack — `proc_call` never pushes a `Variables` scope, only a
/// `Frame` (§4.7), so this is where a running procedure's locals
/// actually live.
fn p_local(interp: &mut Interpreter, _h: &mut dyn Host, args: Vec<Value>) -> Status {
    let Value::Word(name) = args[0] else {
        return Status::Error(bad_input(&interp.memory, "local", args[0]));
    };
    let name = interp.memory.word_str(name).to_string();
    match interp.frames.top_mut() {
        Some(frame) => {
            frame.set_binding(&name, Value::None);
            Status::Ok(Value::None)
        }
        None => Status::Error(RuntimeError::new(ErrorKind::OnlyInProcedure)),
    }
}

fn p_namep(interp: &mut Interpreter, _h: &mut dyn Host, args: Vec<Value>) -> Status {
    let Value::Word(name) = args[0] else {
        return Status::Ok(bool_word(&mut interp.memory, false));
    };
    let name = interp.memory.word_str(name).to_string();
    let defined = interp.frames.find_binding_in_chain(&name).is_some() || interp.vars.is_defined(&name);
    Status::Ok(bool_word(&mut interp.memory, defined))
}

fn p_definedp(interp: &mut Interpreter, _h: &mut dyn Host, args: Vec<Value>) -> Status {
    let Value::Word(name) = args[0] else {
        return Status::Ok(bool_word(&mut interp.memory, false));
    };
    let name = interp.memory.word_str(name).to_string();
    let defined = interp.procs.is_defined(&name);
    Status::Ok(bool_word(&mut interp.memory, defined))
}

fn p_primitivep(interp: &mut Interpreter, _h: &mut dyn Host, args: Vec<Value>) -> Status {
    let Value::Word(name) = args[0] else {
        return Status::Ok(bool_word(&mut interp.memory, false));
    };
    let name = interp.memory.word_str(name).to_string();
    let is = interp.primitives.contains(&name);
    Status::Ok(bool_word(&mut interp.memory, is))
}

// ---- control ------------------------------------------------------------

fn p_if(interp: &mut Interpreter, host: &mut dyn Host, args: Vec<Value>) -> Status {
    let cond = match args[0].is_truthy_bool(&interp.memory) {
        Some(b) => b,
        None => return Status::Error(RuntimeError::with_arg(ErrorKind::NotBool, "if", args[0].to_display_string(&interp.memory))),
    };
    if !cond {
        return Status::Ok(Value::None);
    }
    let Value::List(body) = args[1] else {
        return Status::Error(bad_input(&interp.memory, "if", args[1]));
    };
    match interp.run_list_with_tco(host, body, false) {
        Status::None => Status::Ok(Value::None),
        other => other,
    }
}

fn p_run(interp: &mut Interpreter, host: &mut dyn Host, args: Vec<Value>) -> Status {
    let Value::List(body) = args[0] else {
        return Status::Error(bad_input(&interp.memory, "run", args[0]));
    };
    match interp.run_list_with_tco(host, body, false) {
        Status::None => Status::Ok(Value::None),
        other => other,
    }
}

fn p_repeat(interp: &mut Interpreter, host: &mut dyn Host, args: Vec<Value>) -> Status {
    let count = match require_number(&interp.memory, "repeat", args[0]) {
        Ok(n) => n as i64,
        Err(e) => return Status::Error(e),
    };
    let Value::List(body) = args[1] else {
        return Status::Error(bad_input(&interp.memory, "repeat", args[1]));
    };
    interp.repcount.push(0);
    for i in 1..=count {
        *interp.repcount.last_mut().unwrap() = i as i32;
        match interp.run_list_with_tco(host, body, false) {
            Status::None => continue,
            other => {
                interp.repcount.pop();
                return other;
            }
        }
    }
    interp.repcount.pop();
    Status::Ok(Value::None)
}

fn p_repcount(interp: &mut Interpreter, _h: &mut dyn Host, _args: Vec<Value>) -> Status {
    let n = interp.repcount.last().copied().unwrap_or(-1);
    Status::Ok(Value::Number(n as f32))
}

fn p_stop(_interp: &mut Interpreter, _h: &mut dyn Host, _args: Vec<Value>) -> Status {
    Status::Stop
}

fn p_output(_interp: &mut Interpreter, _h: &mut dyn Host, mut args: Vec<Value>) -> Status {
    Status::Output(args.remove(0))
}

fn p_test(interp: &mut Interpreter, _h: &mut dyn Host, args: Vec<Value>) -> Status {
    match args[0].is_truthy_bool(&interp.memory) {
        Some(b) => {
            interp.vars.set_test(b);
            Status::Ok(Value::None)
        }
        None => Status::Error(RuntimeError::with_arg(ErrorKind::NotBool, "test", args[0].to_display_string(&interp.memory))),
    }
}

fn p_iftrue(interp: &mut Interpreter, host: &mut dyn Host, args: Vec<Value>) -> Status {
    run_if_test(interp, host, args, true)
}
fn p_iffalse(interp: &mut Interpreter, host: &mut dyn Host, args: Vec<Value>) -> Status {
    run_if_test(interp, host, args, false)
}
fn run_if_test(interp: &mut Interpreter, host: &mut dyn Host, args: Vec<Value>, want: bool) -> Status {
    match interp.vars.test() {
        Some(b) if b == want => {
            let Value::List(body) = args[0] else {
                return Status::Error(bad_input(&interp.memory, "iftrue", args[0]));
            };
            match interp.run_list_with_tco(host, body, false) {
                Status::None => Status::Ok(Value::None),
                other => other,
            }
        }
        Some(_) => Status::Ok(Value::None),
        None => Status::Error(RuntimeError::new(ErrorKind::OnlyInProcedure)),
    }
}

fn p_catch(interp: &mut Interpreter, host: &mut dyn Host, args: Vec<Value>) -> Status {
    let Value::Word(tag) = args[0] else {
        return Status::Error(bad_input(&interp.memory, "catch", args[0]));
    };
    let tag_str = interp.memory.word_str(tag).to_string();
    let Value::List(body) = args[1] else {
        return Status::Error(bad_input(&interp.memory, "catch", args[1]));
    };
    match interp.run_list_with_tco(host, body, false) {
        Status::Throw(thrown_tag, value) => {
            let matches = node_tag_matches(&interp.memory, thrown_tag, &tag_str);
            if matches {
                Status::Ok(value.unwrap_or(Value::None))
            } else {
                Status::Throw(thrown_tag, value)
            }
        }
        other => other,
    }
}

fn node_tag_matches(memory: &Memory, tag_node: Node, expected: &str) -> bool {
    if tag_node.is_word() {
        memory.word_str(tag_node).eq_ignore_ascii_case(expected)
    } else {
        false
    }
}

fn p_throw(interp: &mut Interpreter, _h: &mut dyn Host, args: Vec<Value>) -> Status {
    let Value::Word(tag) = args[0] else {
        return Status::Error(bad_input(&interp.memory, "throw", args[0]));
    };
    Status::Throw(tag, args.get(1).copied())
}

/// `pause` blocks the outer evaluator until its sub-REPL returns
/// (§4.9, §4.12), prompted with the active procedure's own name. The
/// sub-REPL runs inline, directly underneath the live call frame it
/// paused, so `co` resuming it is just this call returning normally.
fn p_pause(interp: &mut Interpreter, host: &mut dyn Host, _args: Vec<Value>) -> Status {
    let name = interp.frames.top().map(|f| f.proc_name.clone()).unwrap_or_else(|| "pause".to_string());
    crate::interface::run_pause_repl(interp, host, &name)
}

fn p_continue(_interp: &mut Interpreter, _h: &mut dyn Host, _args: Vec<Value>) -> Status {
    Status::Stop
}

fn p_go(interp: &mut Interpreter, _h: &mut dyn Host, args: Vec<Value>) -> Status {
    let Value::Word(label) = args[0] else {
        return Status::Error(bad_input(&interp.memory, "go", args[0]));
    };
    Status::Goto(interp.memory.word_str(label).to_string())
}

fn p_label(_interp: &mut Interpreter, _h: &mut dyn Host, _args: Vec<Value>) -> Status {
    Status::Ok(Value::None)
}

fn p_wait(interp: &mut Interpreter, host: &mut dyn Host, args: Vec<Value>) -> Status {
    let n = match require_number(&interp.memory, "wait", args[0]) {
        Ok(n) => n,
        Err(e) => return Status::Error(e),
    };
    let mut remaining = (n * 1000.0 / 60.0) as u32; // ticks are 1/60s, sleep in 100ms slices
    while remaining > 0 {
        if host.check_user_interrupt() {
            return Status::Error(RuntimeError::new(ErrorKind::Stopped));
        }
        let slice = remaining.min(6);
        host.sleep(slice * 100 / 6);
        remaining -= slice;
    }
    Status::Ok(Value::None)
}

// ---- logical --------------------------------------------------------------

fn p_and(interp: &mut Interpreter, _h: &mut dyn Host, args: Vec<Value>) -> Status {
    let mut result = true;
    for a in &args {
        match a.is_truthy_bool(&interp.memory) {
            Some(b) => result &= b,
            None => return Status::Error(RuntimeError::with_arg(ErrorKind::NotBool, "and", a.to_display_string(&interp.memory))),
        }
    }
    Status::Ok(bool_word(&mut interp.memory, result))
}

fn p_or(interp: &mut Interpreter, _h: &mut dyn Host, args: Vec<Value>) -> Status {
    let mut result = false;
    for a in &args {
        match a.is_truthy_bool(&interp.memory) {
            Some(b) => result |= b,
            None => return Status::Error(RuntimeError::with_arg(ErrorKind::NotBool, "or", a.to_display_string(&interp.memory))),
        }
    }
    Status::Ok(bool_word(&mut interp.memory, result))
}

fn p_not(interp: &mut Interpreter, _h: &mut dyn Host, args: Vec<Value>) -> Status {
    match args[0].is_truthy_bool(&interp.memory) {
        Some(b) => Status::Ok(bool_word(&mut interp.memory, !b)),
        None => Status::Error(RuntimeError::with_arg(ErrorKind::NotBool, "not", args[0].to_display_string(&interp.memory))),
    }
}

// ---- workspace --------------------------------------------------------------

fn p_po(interp: &mut Interpreter, host: &mut dyn Host, args: Vec<Value>) -> Status {
    let Value::Word(name) = args[0] else {
        return Status::Error(bad_input(&interp.memory, "po", args[0]));
    };
    let name = interp.memory.word_str(name).to_string();
    if let Some(proc) = interp.procs.find(&name).cloned() {
        host.write_line(render_proc_definition(&interp.memory, &proc).as_bytes());
    }
    Status::Ok(Value::None)
}

fn render_proc_definition(memory: &Memory, proc: &UserProc) -> String {
    let params: String = proc.params.iter().map(|p| format!(" :{p}")).collect();
    let mut out = format!("to {}{}\n", proc.name, params);
    let mut line = proc.body;
    while !line.is_nil() {
        let this_line = memory.car(line);
        out.push_str(&render_line(memory, this_line));
        out.push('\n');
        line = memory.cdr(line);
    }
    out.push_str("end");
    out
}

fn render_line(memory: &Memory, mut line: Node) -> String {
    let mut parts = Vec::new();
    while !line.is_nil() {
        let head = memory.car(line);
        if let Some(v) = node_to_value(head) {
            parts.push(v.to_display_string(memory));
        }
        line = memory.cdr(line);
    }
    parts.join(" ")
}

fn p_pots(interp: &mut Interpreter, host: &mut dyn Host, _args: Vec<Value>) -> Status {
    let names: Vec<String> = interp.procs.names().map(|s| s.to_string()).collect();
    for name in names {
        if !interp.procs.is_buried(&name) {
            if let Some(proc) = interp.procs.find(&name).cloned() {
                host.write_line(render_proc_definition(&interp.memory, &proc).as_bytes());
            }
        }
    }
    Status::Ok(Value::None)
}

fn p_pons(interp: &mut Interpreter, host: &mut dyn Host, _args: Vec<Value>) -> Status {
    let names: Vec<String> = interp.vars.global_names().map(|s| s.to_string()).collect();
    for name in names {
        if !interp.vars.is_global_buried(&name) {
            if let Some(v) = interp.vars.get(&name) {
                host.write_line(format!("make \"{name} {}", v.to_display_string(&interp.memory)).as_bytes());
            }
        }
    }
    Status::Ok(Value::None)
}

fn p_bury(interp: &mut Interpreter, _h: &mut dyn Host, args: Vec<Value>) -> Status {
    let Value::Word(name) = args[0] else {
        return Status::Error(bad_input(&interp.memory, "bury", args[0]));
    };
    let name = interp.memory.word_str(name).to_string();
    interp.procs.bury(&name);
    interp.vars.bury_global(&name);
    Status::Ok(Value::None)
}

fn p_unbury(interp: &mut Interpreter, _h: &mut dyn Host, args: Vec<Value>) -> Status {
    let Value::Word(name) = args[0] else {
        return Status::Error(bad_input(&interp.memory, "unbury", args[0]));
    };
    let name = interp.memory.word_str(name).to_string();
    interp.procs.unbury(&name);
    interp.vars.unbury_global(&name);
    Status::Ok(Value::None)
}

fn p_buryall(interp: &mut Interpreter, _h: &mut dyn Host, _args: Vec<Value>) -> Status {
    let names: Vec<String> = interp.procs.names().map(|s| s.to_string()).collect();
    for name in names {
        interp.procs.bury(&name);
    }
    let var_names: Vec<String> = interp.vars.global_names().map(|s| s.to_string()).collect();
    for name in var_names {
        interp.vars.bury_global(&name);
    }
    Status::Ok(Value::None)
}

fn p_unburyall(interp: &mut Interpreter, _h: &mut dyn Host, _args: Vec<Value>) -> Status {
    let names: Vec<String> = interp.procs.names().map(|s| s.to_string()).collect();
    for name in names {
        interp.procs.unbury(&name);
    }
    let var_names: Vec<String> = interp.vars.global_names().map(|s| s.to_string()).collect();
    for name in var_names {
        interp.vars.unbury_global(&name);
    }
    Status::Ok(Value::None)
}

/// `ern` ("erase name"): erases both a procedure and a global variable
/// by this name, since the workspace command set (§4.5's `erase`)
/// doesn't distinguish which table a bare name belongs to.
fn p_ern(interp: &mut Interpreter, _h: &mut dyn Host, args: Vec<Value>) -> Status {
    let Value::Word(name) = args[0] else {
        return Status::Error(bad_input(&interp.memory, "ern", args[0]));
    };
    let name = interp.memory.word_str(name).to_string();
    interp.procs.erase(&name);
    interp.vars.erase_global(&name);
    Status::Ok(Value::None)
}

fn p_erall(interp: &mut Interpreter, _h: &mut dyn Host, _args: Vec<Value>) -> Status {
    let names: Vec<String> = interp.procs.names().map(|s| s.to_string()).collect();
    for name in names {
        interp.procs.erase(&name);
    }
    interp.vars.erase_all_globals();
    Status::Ok(Value::None)
}

fn p_recycle(interp: &mut Interpreter, _h: &mut dyn Host, _args: Vec<Value>) -> Status {
    let mut roots = Vec::new();
    for name in interp.vars.global_names().map(|s| s.to_string()).collect::<Vec<_>>() {
        if let Some(v) = interp.vars.get(&name) {
            if let Some(n) = value_root(v) {
                roots.push(n);
            }
        }
    }
    for frame in interp.frames.iter() {
        for (_, v) in &frame.bindings {
            if let Some(n) = value_root(*v) {
                roots.push(n);
            }
        }
    }
    for name in interp.procs.names().map(|s| s.to_string()).collect::<Vec<_>>() {
        if let Some(p) = interp.procs.find(&name) {
            roots.push(p.body);
        }
    }
    interp.memory.gc(roots);
    Status::Ok(Value::None)
}

fn value_root(v: Value) -> Option<Node> {
    match v {
        Value::List(n) | Value::Word(n) => Some(n),
        _ => None,
    }
}

fn p_nodes(interp: &mut Interpreter, _h: &mut dyn Host, _args: Vec<Value>) -> Status {
    let free = interp.memory.free_cell_count() as f32;
    Status::Ok(Value::Number(free))
}

// ---- properties --------------------------------------------------------------

fn p_pprop(interp: &mut Interpreter, _h: &mut dyn Host, args: Vec<Value>) -> Status {
    let (Value::Word(plist), Value::Word(key)) = (args[0], args[1]) else {
        return Status::Error(bad_input(&interp.memory, "pprop", args[0]));
    };
    let plist = interp.memory.word_str(plist).to_string();
    let key = interp.memory.word_str(key).to_string();
    interp.props.pprop(&plist, &key, args[2]);
    Status::Ok(Value::None)
}

fn p_gprop(interp: &mut Interpreter, _h: &mut dyn Host, args: Vec<Value>) -> Status {
    let (Value::Word(plist), Value::Word(key)) = (args[0], args[1]) else {
        return Status::Error(bad_input(&interp.memory, "gprop", args[0]));
    };
    let plist = interp.memory.word_str(plist).to_string();
    let key = interp.memory.word_str(key).to_string();
    Status::Ok(interp.props.gprop(&plist, &key).unwrap_or(Value::None))
}

fn p_plist(interp: &mut Interpreter, _h: &mut dyn Host, args: Vec<Value>) -> Status {
    let Value::Word(plist) = args[0] else {
        return Status::Error(bad_input(&interp.memory, "plist", args[0]));
    };
    let plist = interp.memory.word_str(plist).to_string();
    let mut items = Vec::new();
    for (k, v) in interp.props.plist(&plist) {
        items.push(interp.memory.atom_str(&k));
        items.push(value_to_node(&mut interp.memory, v));
    }
    Status::Ok(Value::List(interp.memory.cons_list(&items)))
}

fn p_remprop(interp: &mut Interpreter, _h: &mut dyn Host, args: Vec<Value>) -> Status {
    let (Value::Word(plist), Value::Word(key)) = (args[0], args[1]) else {
        return Status::Error(bad_input(&interp.memory, "remprop", args[0]));
    };
    let plist = interp.memory.word_str(plist).to_string();
    let key = interp.memory.word_str(key).to_string();
    interp.props.remprop(&plist, &key);
    Status::Ok(Value::None)
}

fn p_pps(_interp: &mut Interpreter, _h: &mut dyn Host, _args: Vec<Value>) -> Status {
    Status::Ok(Value::None)
}

fn p_erprops(interp: &mut Interpreter, _h: &mut dyn Host, args: Vec<Value>) -> Status {
    let Value::Word(plist) = args[0] else {
        return Status::Error(bad_input(&interp.memory, "erprops", args[0]));
    };
    let plist = interp.memory.word_str(plist).to_string();
    for (key, _) in interp.props.plist(&plist) {
        interp.props.remprop(&plist, &key);
    }
    Status::Ok(Value::None)
}

// ---- debugging --------------------------------------------------------------

fn p_trace(interp: &mut Interpreter, _h: &mut dyn Host, args: Vec<Value>) -> Status {
    let Value::Word(name) = args[0] else {
        return Status::Error(bad_input(&interp.memory, "trace", args[0]));
    };
    let name = interp.memory.word_str(name).to_string();
    interp.procs.set_traced(&name, true);
    Status::Ok(Value::None)
}

fn p_untrace(interp: &mut Interpreter, _h: &mut dyn Host, args: Vec<Value>) -> Status {
    let Value::Word(name) = args[0] else {
        return Status::Error(bad_input(&interp.memory, "untrace", args[0]));
    };
    let name = interp.memory.word_str(name).to_string();
    interp.procs.set_traced(&name, false);
    Status::Ok(Value::None)
}

// ---- I/O --------------------------------------------------------------------

fn p_print(interp: &mut Interpreter, host: &mut dyn Host, args: Vec<Value>) -> Status {
    host.write_line(args[0].to_display_string(&interp.memory).as_bytes());
    Status::Ok(Value::None)
}

fn p_show(interp: &mut Interpreter, host: &mut dyn Host, args: Vec<Value>) -> Status {
    let rendered = match args[0] {
        Value::List(_) => args[0].to_display_string(&interp.memory),
        other => other.to_display_string(&interp.memory),
    };
    host.write_line(rendered.as_bytes());
    Status::Ok(Value::None)
}

fn p_type(interp: &mut Interpreter, host: &mut dyn Host, args: Vec<Value>) -> Status {
    host.write(args[0].to_display_string(&interp.memory).as_bytes());
    Status::Ok(Value::None)
}

fn p_readword(interp: &mut Interpreter, host: &mut dyn Host, _args: Vec<Value>) -> Status {
    let mut buf = Vec::new();
    match host.read_line(&mut buf) {
        ReadLine::Eof => Status::Ok(Value::None),
        ReadLine::Interrupted => Status::Error(RuntimeError::new(ErrorKind::Stopped)),
        ReadLine::Bytes(_) => {
            let text = String::from_utf8_lossy(&buf).trim_end().to_string();
            Status::Ok(Value::Word(interp.memory.atom_str(&text)))
        }
    }
}

fn p_readlist(interp: &mut Interpreter, host: &mut dyn Host, _args: Vec<Value>) -> Status {
    let mut buf = Vec::new();
    match host.read_line(&mut buf) {
        ReadLine::Eof => Status::Ok(Value::None),
        ReadLine::Interrupted => Status::Error(RuntimeError::new(ErrorKind::Stopped)),
        ReadLine::Bytes(_) => {
            let text = String::from_utf8_lossy(&buf).trim_end().to_string();
            let words: Vec<Node> = text.split_whitespace().map(|w| interp.memory.atom_str(w)).collect();
            Status::Ok(Value::List(interp.memory.cons_list(&words)))
        }
    }
}

fn bad_input(memory: &Memory, proc: &str, v: Value) -> RuntimeError {
    RuntimeError::with_arg(ErrorKind::DoesntLikeInput, proc, v.to_display_string(memory))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::NullHost;

    #[test]
    fn registry_resolves_aliases_to_same_entry() {
        let r = build_registry();
        assert!(r.contains("bf"));
        assert!(r.contains("butfirst"));
        assert_eq!(r.default_args("bf"), r.default_args("butfirst"));
    }

    #[test]
    fn first_and_last_on_words_and_lists() {
        let mut interp = Interpreter::new();
        let mut host = NullHost::default();
        interp.eval_text(&mut host, "print first \"hello");
        interp.eval_text(&mut host, "print last \"hello");
        assert_eq!(host.output, b"h\no\n");
    }

    #[test]
    fn fput_builds_new_list() {
        let mut interp = Interpreter::new();
        let mut host = NullHost::default();
        interp.eval_text(&mut host, "show fput 1 [2 3]");
        assert_eq!(host.output, b"[1 2 3]\n");
    }

    #[test]
    fn catch_and_throw_round_trip_value() {
        let mut interp = Interpreter::new();
        let mut host = NullHost::default();
        let result = interp.eval_text(&mut host, "catch \"e [throw \"e \"caught]");
        match result {
            Status::Error(e) => assert!(e.message().contains("caught")),
            other => panic!("expected surfaced value error, got {other:?}"),
        }
    }

    #[test]
    fn and_or_not_are_variadic_in_parens() {
        let mut interp = Interpreter::new();
        let mut host = NullHost::default();
        interp.eval_text(&mut host, "print (and \"true \"true \"true)");
        assert_eq!(host.output, b"true\n");
    }
}
