//! Tree-walking evaluator for compiled units.
//!
//! Top-level code reads and writes the guarded context directly, so new
//! top-level bindings land in the caller's context. Every write goes through
//! [`GuardedContext::insert`]; a refused binding surfaces inside the running
//! code as a `SafetyError`.
//!
//! Line numbers recorded here are in compiled-text coordinates. Translation
//! back to source lines happens once, in [`crate::module`].

pub mod builtins;
pub mod methods;
pub mod ops;

use std::sync::Arc;

use sandbox_types::{ExceptionKind, SandboxError, TraceFrame};
use tracing::warn;

use crate::ast::{BinOp, Expr, FunctionDef, Handler, Program, Stmt, StmtKind, Target};
use crate::guard::GuardedContext;
use crate::value::{range_item, range_len, ExceptionValue, Namespace, NativeError, Value};
use builtins::Builtin;

/// Deepest chain of sandboxed function calls before `RecursionError`.
pub const MAX_CALL_DEPTH: usize = 64;

/// Nested expression evaluations and statement blocks, counted across
/// calls, before `RecursionError`.
pub const MAX_EVAL_NESTING: usize = 1024;

/// Stack reserved for the thread a program runs on. Sized so that
/// [`MAX_EVAL_NESTING`] levels fit with room to spare in debug builds.
const EVAL_STACK_SIZE: usize = 64 * 1024 * 1024;

/// An exception unwinding through sandboxed frames.
#[derive(Debug, Clone)]
pub(crate) struct Raised {
    pub exception: Arc<ExceptionValue>,
    /// Innermost frame first.
    pub frames: Vec<TraceFrame>,
    /// Call depth of the newest recorded frame.
    recorded_to: Option<usize>,
}

impl Raised {
    fn new(exception: Arc<ExceptionValue>) -> Self {
        Self {
            exception,
            frames: Vec::new(),
            recorded_to: None,
        }
    }
}

/// Non-sequential control flow.
enum Flow {
    Raise(Box<Raised>),
    Return(Value),
    Break,
    Continue,
}

impl From<NativeError> for Flow {
    fn from(err: NativeError) -> Self {
        Flow::Raise(Box::new(Raised::new(Arc::new(ExceptionValue {
            kind: err.kind,
            message: err.message,
        }))))
    }
}

type Exec<T> = Result<T, Flow>;

/// Per-call state: function locals, or `None` at module top level.
struct Frame {
    locals: Option<Namespace>,
    function: Option<Arc<FunctionDef>>,
    module: Arc<str>,
}

pub(crate) struct Interpreter<'a> {
    context: &'a mut GuardedContext,
    depth: usize,
    nesting: usize,
    /// Exceptions being handled, innermost last; bare `raise` re-raises the top.
    handling: Vec<Raised>,
}

impl<'a> Interpreter<'a> {
    pub fn new(context: &'a mut GuardedContext) -> Self {
        Self {
            context,
            depth: 0,
            nesting: 0,
            handling: Vec::new(),
        }
    }

    /// Run a whole program at top level, on a thread with a stack sized for
    /// [`MAX_EVAL_NESTING`].
    pub fn run(self, program: &Program, module: Arc<str>) -> Result<(), Raised> {
        std::thread::scope(|scope| {
            let spawned = std::thread::Builder::new()
                .name("sandbox-eval".to_string())
                .stack_size(EVAL_STACK_SIZE)
                .spawn_scoped(scope, move || self.run_here(program, module));
            match spawned {
                Ok(handle) => handle
                    .join()
                    .unwrap_or_else(|panic| std::panic::resume_unwind(panic)),
                Err(err) => {
                    warn!(error = %err, "could not start evaluation thread");
                    Err(Raised::new(Arc::new(ExceptionValue {
                        kind: ExceptionKind::RuntimeError,
                        message: format!("could not start evaluation: {}", err),
                    })))
                }
            }
        })
    }

    fn run_here(mut self, program: &Program, module: Arc<str>) -> Result<(), Raised> {
        let mut frame = Frame {
            locals: None,
            function: None,
            module,
        };
        match self.exec_block(&mut frame, &program.body) {
            Ok(()) => Ok(()),
            Err(Flow::Raise(raised)) => Err(*raised),
            // The parser refuses these outside loops and functions.
            Err(Flow::Return(_) | Flow::Break | Flow::Continue) => Ok(()),
        }
    }

    fn exec_block(&mut self, frame: &mut Frame, body: &[Stmt]) -> Exec<()> {
        self.nest()?;
        let result = self.exec_statements(frame, body);
        self.nesting -= 1;
        result
    }

    fn exec_statements(&mut self, frame: &mut Frame, body: &[Stmt]) -> Exec<()> {
        for stmt in body {
            if let Err(flow) = self.exec_stmt(frame, stmt) {
                return Err(self.annotate(flow, frame, stmt.line));
            }
        }
        Ok(())
    }

    /// Count one more level of evaluation; pair with `self.nesting -= 1`.
    fn nest(&mut self) -> Exec<()> {
        if self.nesting >= MAX_EVAL_NESTING {
            return Err(NativeError::new(
                ExceptionKind::RecursionError,
                "maximum recursion depth exceeded",
            )
            .into());
        }
        self.nesting += 1;
        Ok(())
    }

    /// Record the statement that was executing in this frame when an
    /// exception passed through it. Only the innermost statement per frame
    /// is recorded.
    fn annotate(&self, flow: Flow, frame: &Frame, line: usize) -> Flow {
        match flow {
            Flow::Raise(mut raised) if raised.recorded_to != Some(self.depth) => {
                raised.frames.push(TraceFrame {
                    module: frame.module.to_string(),
                    function: frame.function.as_ref().map(|def| def.name.clone()),
                    line,
                });
                raised.recorded_to = Some(self.depth);
                Flow::Raise(raised)
            }
            other => other,
        }
    }

    fn exec_stmt(&mut self, frame: &mut Frame, stmt: &Stmt) -> Exec<()> {
        match &stmt.kind {
            StmtKind::Expr(expr) => {
                self.eval(frame, expr)?;
            }
            StmtKind::Assign { target, value } => {
                let value = self.eval(frame, value)?;
                self.assign(frame, target, value)?;
            }
            StmtKind::AugAssign { target, op, value } => self.aug_assign(frame, target, *op, value)?,
            StmtKind::If { branches, orelse } => {
                for (test, body) in branches {
                    if self.eval(frame, test)?.is_truthy() {
                        return self.exec_block(frame, body);
                    }
                }
                self.exec_block(frame, orelse)?;
            }
            StmtKind::While { test, body } => {
                while self.eval(frame, test)?.is_truthy() {
                    match self.exec_block(frame, body) {
                        Ok(()) | Err(Flow::Continue) => {}
                        Err(Flow::Break) => break,
                        Err(other) => return Err(other),
                    }
                }
            }
            StmtKind::For { var, iter, body } => {
                let iterable = self.eval(frame, iter)?;
                self.exec_for(frame, var, &iterable, body)?;
            }
            StmtKind::FunctionDef(def) => {
                self.bind(frame, &def.name, Value::Function(def.clone()))?;
            }
            StmtKind::Return(value) => {
                let value = match value {
                    Some(expr) => self.eval(frame, expr)?,
                    None => Value::None,
                };
                return Err(Flow::Return(value));
            }
            StmtKind::Raise(value) => return Err(self.raise(frame, value.as_ref())?),
            StmtKind::Try { body, handlers } => self.exec_try(frame, body, handlers)?,
            StmtKind::Assert { test, message } => {
                if !self.eval(frame, test)?.is_truthy() {
                    let message = match message {
                        Some(expr) => self.eval(frame, expr)?.to_display(),
                        None => String::new(),
                    };
                    return Err(NativeError::new(ExceptionKind::AssertionError, message).into());
                }
            }
            StmtKind::Pass => {}
            StmtKind::Break => return Err(Flow::Break),
            StmtKind::Continue => return Err(Flow::Continue),
        }
        Ok(())
    }

    fn exec_for(
        &mut self,
        frame: &mut Frame,
        var: &str,
        iterable: &Value,
        body: &[Stmt],
    ) -> Exec<()> {
        // Ranges are walked lazily; everything else is a snapshot, so the body
        // may mutate the container it iterates.
        let items: Box<dyn Iterator<Item = Value>> = match iterable {
            Value::Range { .. } => {
                let len = range_len(iterable).unwrap_or(0);
                let range = iterable.clone();
                Box::new((0..len).filter_map(move |i| range_item(&range, i).map(Value::Int)))
            }
            other => Box::new(ops::iterate(other)?.into_iter()),
        };
        for item in items {
            self.bind(frame, var, item)?;
            match self.exec_block(frame, body) {
                Ok(()) | Err(Flow::Continue) => {}
                Err(Flow::Break) => break,
                Err(other) => return Err(other),
            }
        }
        Ok(())
    }

    fn exec_try(&mut self, frame: &mut Frame, body: &[Stmt], handlers: &[Handler]) -> Exec<()> {
        let raised = match self.exec_block(frame, body) {
            Err(Flow::Raise(raised)) => raised,
            other => return other,
        };
        for handler in handlers {
            if !self.handler_matches(frame, handler, &raised)? {
                continue;
            }
            if let Some(name) = &handler.binding {
                self.bind(frame, name, Value::Exception(raised.exception.clone()))?;
            }
            self.handling.push((*raised).clone());
            let result = self.exec_block(frame, &handler.body);
            self.handling.pop();
            return result;
        }
        Err(Flow::Raise(raised))
    }

    fn handler_matches(&mut self, frame: &mut Frame, handler: &Handler, raised: &Raised) -> Exec<bool> {
        let Some(kind) = &handler.kind else {
            return Ok(true);
        };
        match self.eval(frame, kind)? {
            Value::ExceptionType(kind) => Ok(kind.catches(raised.exception.kind)),
            Value::List(kinds) => {
                let kinds = kinds.read_recursive().clone();
                let mut caught = false;
                for kind in &kinds {
                    let Value::ExceptionType(kind) = kind else {
                        return Err(catch_type_error());
                    };
                    caught |= kind.catches(raised.exception.kind);
                }
                Ok(caught)
            }
            _ => Err(catch_type_error()),
        }
    }

    fn raise(&mut self, frame: &mut Frame, value: Option<&Expr>) -> Exec<Flow> {
        let Some(expr) = value else {
            return match self.handling.last() {
                Some(active) => Ok(Flow::Raise(Box::new(active.clone()))),
                None => Err(NativeError::new(
                    ExceptionKind::RuntimeError,
                    "No active exception to reraise",
                )
                .into()),
            };
        };
        let exception = match self.eval(frame, expr)? {
            Value::Exception(exception) => exception,
            Value::ExceptionType(kind) => Arc::new(ExceptionValue {
                kind,
                message: String::new(),
            }),
            _ => {
                return Err(NativeError::type_error("exceptions must derive from BaseException").into())
            }
        };
        Ok(Flow::Raise(Box::new(Raised::new(exception))))
    }

    // ------------------------------------------------------------------
    // Bindings
    // ------------------------------------------------------------------

    fn bind(&mut self, frame: &mut Frame, name: &str, value: Value) -> Exec<()> {
        match &mut frame.locals {
            Some(locals) => {
                locals.insert(name.to_string(), value);
                Ok(())
            }
            None => match self.context.insert(name, value) {
                Ok(_) => Ok(()),
                Err(SandboxError::ContextUnsafe(reason)) => {
                    Err(NativeError::new(ExceptionKind::SafetyError, reason).into())
                }
                Err(other) => {
                    Err(NativeError::new(ExceptionKind::SafetyError, other.to_string()).into())
                }
            },
        }
    }

    fn lookup(&self, frame: &Frame, name: &str) -> Exec<Value> {
        if let Some(value) = frame.locals.as_ref().and_then(|locals| locals.get(name)) {
            return Ok(value.clone());
        }
        if let Some(value) = self.context.get(name) {
            return Ok(value.clone());
        }
        if let Some(builtin) = Builtin::from_name(name) {
            return Ok(Value::Builtin(builtin));
        }
        if let Some(kind) = ExceptionKind::from_name(name) {
            return Ok(Value::ExceptionType(kind));
        }
        Err(NativeError::new(
            ExceptionKind::NameError,
            format!("name '{}' is not defined", name),
        )
        .into())
    }

    fn assign(&mut self, frame: &mut Frame, target: &Target, value: Value) -> Exec<()> {
        match target {
            Target::Name(name) => self.bind(frame, name, value),
            Target::Index { object, index } => {
                let object = self.eval(frame, object)?;
                let index = self.eval(frame, index)?;
                ops::set_item(&object, &index, value)?;
                Ok(())
            }
        }
    }

    fn aug_assign(&mut self, frame: &mut Frame, target: &Target, op: BinOp, value: &Expr) -> Exec<()> {
        match target {
            Target::Name(name) => {
                let current = self.lookup(frame, name)?;
                let value = self.eval(frame, value)?;
                let updated = in_place(op, &current, &value)?;
                self.bind(frame, name, updated)
            }
            Target::Index { object, index } => {
                let object = self.eval(frame, object)?;
                let index = self.eval(frame, index)?;
                let current = ops::get_item(&object, &index)?;
                let value = self.eval(frame, value)?;
                let updated = in_place(op, &current, &value)?;
                ops::set_item(&object, &index, updated)?;
                Ok(())
            }
        }
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    fn eval(&mut self, frame: &mut Frame, expr: &Expr) -> Exec<Value> {
        self.nest()?;
        let result = self.eval_nested(frame, expr);
        self.nesting -= 1;
        result
    }

    fn eval_nested(&mut self, frame: &mut Frame, expr: &Expr) -> Exec<Value> {
        Ok(match expr {
            Expr::Int(i) => Value::Int(*i),
            Expr::Float(f) => Value::Float(*f),
            Expr::Str(s) => Value::Str(s.clone()),
            Expr::Bool(b) => Value::Bool(*b),
            Expr::None => Value::None,
            Expr::Name(name) => self.lookup(frame, name)?,
            Expr::List(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(self.eval(frame, item)?);
                }
                Value::list(values)
            }
            Expr::Dict(entries) => {
                let mut map = indexmap::IndexMap::with_capacity(entries.len());
                for (key, value) in entries {
                    let key = ops::hash_key(&self.eval(frame, key)?)?;
                    let value = self.eval(frame, value)?;
                    map.insert(key, value);
                }
                Value::dict(map)
            }
            Expr::Unary { op, operand } => ops::unary(*op, &self.eval(frame, operand)?)?,
            Expr::Binary { op, left, right } => {
                let left = self.eval(frame, left)?;
                let right = self.eval(frame, right)?;
                ops::binary(*op, &left, &right)?
            }
            Expr::Compare { first, rest } => {
                let mut left = self.eval(frame, first)?;
                for (op, right) in rest {
                    let right = self.eval(frame, right)?;
                    if !ops::compare(*op, &left, &right)? {
                        return Ok(Value::Bool(false));
                    }
                    left = right;
                }
                Value::Bool(true)
            }
            Expr::And(left, right) => {
                let left = self.eval(frame, left)?;
                if !left.is_truthy() {
                    return Ok(left);
                }
                self.eval(frame, right)?
            }
            Expr::Or(left, right) => {
                let left = self.eval(frame, left)?;
                if left.is_truthy() {
                    return Ok(left);
                }
                self.eval(frame, right)?
            }
            Expr::Conditional { test, body, orelse } => {
                if self.eval(frame, test)?.is_truthy() {
                    self.eval(frame, body)?
                } else {
                    self.eval(frame, orelse)?
                }
            }
            Expr::Call { func, args } => {
                let callee = self.eval(frame, func)?;
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(self.eval(frame, arg)?);
                }
                self.call(&callee, values)?
            }
            Expr::Attribute { object, name } => methods::lookup(&self.eval(frame, object)?, name)?,
            Expr::Index { object, index } => {
                let object = self.eval(frame, object)?;
                let index = self.eval(frame, index)?;
                ops::get_item(&object, &index)?
            }
        })
    }

    fn call(&mut self, callee: &Value, args: Vec<Value>) -> Exec<Value> {
        match callee {
            Value::Function(def) => self.call_function(def, args),
            Value::Builtin(builtin) => Ok(builtin.call(&args)?),
            Value::Native(native) => Ok(native.call(&args)?),
            Value::Method(method) => Ok(methods::call(method, &args)?),
            Value::ExceptionType(kind) => Ok(Value::exception(*kind, exception_message(&args))),
            other => Err(NativeError::type_error(format!(
                "'{}' object is not callable",
                other.type_name()
            ))
            .into()),
        }
    }

    fn call_function(&mut self, def: &Arc<FunctionDef>, args: Vec<Value>) -> Exec<Value> {
        if args.len() != def.params.len() {
            return Err(NativeError::type_error(format!(
                "{}() takes {} positional argument{} but {} {} given",
                def.name,
                def.params.len(),
                if def.params.len() == 1 { "" } else { "s" },
                args.len(),
                if args.len() == 1 { "was" } else { "were" }
            ))
            .into());
        }
        if self.depth >= MAX_CALL_DEPTH {
            return Err(NativeError::new(
                ExceptionKind::RecursionError,
                "maximum recursion depth exceeded",
            )
            .into());
        }
        let mut frame = Frame {
            locals: Some(def.params.iter().cloned().zip(args).collect()),
            function: Some(def.clone()),
            module: def.module.clone(),
        };
        self.depth += 1;
        let result = self.exec_block(&mut frame, &def.body);
        self.depth -= 1;
        match result {
            Ok(()) => Ok(Value::None),
            Err(Flow::Return(value)) => Ok(value),
            Err(other) => Err(other),
        }
    }
}

/// `+=` extends a list in place; every other operator rebinds.
fn in_place(op: BinOp, current: &Value, value: &Value) -> Result<Value, NativeError> {
    if let (BinOp::Add, Value::List(items)) = (op, current) {
        let extra = ops::iterate(value)?;
        let mut items = items.write();
        if items.len() + extra.len() > ops::MAX_SEQUENCE_LEN {
            return Err(NativeError::new(ExceptionKind::OverflowError, "list is too large"));
        }
        items.extend(extra);
        return Ok(current.clone());
    }
    ops::binary(op, current, value)
}

fn exception_message(args: &[Value]) -> String {
    match args {
        [] => String::new(),
        [single] => single.to_display(),
        many => format!(
            "({})",
            many.iter().map(Value::repr).collect::<Vec<_>>().join(", ")
        ),
    }
}

fn catch_type_error() -> Flow {
    NativeError::type_error("catching classes that do not inherit from BaseException is not allowed")
        .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guard::PolicyContextGuard;
    use crate::parser::parse;

    fn run(source: &str) -> (GuardedContext, Result<(), Raised>) {
        let program = parse(source, Arc::from("test")).expect("parse");
        let mut context = GuardedContext::empty(Arc::new(PolicyContextGuard::default()));
        let result = Interpreter::new(&mut context).run(&program, Arc::from("test"));
        (context, result)
    }

    fn run_ok(source: &str) -> GuardedContext {
        let (context, result) = run(source);
        if let Err(raised) = result {
            panic!("unexpected exception: {:?}", raised.exception);
        }
        context
    }

    fn run_err(source: &str) -> Raised {
        run(source).1.expect_err("expected an exception")
    }

    #[test]
    fn top_level_bindings_land_in_context() {
        let context = run_ok("x = 1 + 1\ndef f(a):\n    y = a * 2\n    return y\nz = f(x)\n");
        assert_eq!(context.get("x"), Some(&Value::Int(2)));
        assert_eq!(context.get("z"), Some(&Value::Int(4)));
        assert!(context.get("y").is_none());
    }

    #[test]
    fn loops_and_control_flow() {
        let context = run_ok(
            "total = 0\nfor i in range(10):\n    if i % 2 == 0:\n        continue\n    if i > 7:\n        break\n    total += i\n",
        );
        assert_eq!(context.get("total"), Some(&Value::Int(1 + 3 + 5 + 7)));
    }

    #[test]
    fn handlers_catch_by_kind_and_bind() {
        let context = run_ok(
            "try:\n    {}['k']\nexcept ValueError:\n    r = 'value'\nexcept KeyError as e:\n    r = str(e)\n",
        );
        assert_eq!(context.get("r"), Some(&Value::str("'k'")));
    }

    #[test]
    fn bare_raise_rethrows_active_exception() {
        let raised = run_err("try:\n    raise ValueError('x')\nexcept Exception:\n    raise\n");
        assert_eq!(raised.exception.kind, ExceptionKind::ValueError);
        assert_eq!(raised.exception.message, "x");
        assert_eq!(raised.frames[0].line, 2);
    }

    #[test]
    fn bare_raise_outside_handler() {
        let raised = run_err("raise\n");
        assert_eq!(raised.exception.kind, ExceptionKind::RuntimeError);
    }

    #[test]
    fn traceback_records_each_call_frame() {
        let raised = run_err("def inner():\n    raise ValueError('deep')\ndef outer():\n    inner()\nouter()\n");
        let lines: Vec<usize> = raised.frames.iter().map(|frame| frame.line).collect();
        assert_eq!(lines, vec![2, 4, 5]);
        assert_eq!(raised.frames[0].function.as_deref(), Some("inner"));
        assert_eq!(raised.frames[2].function, None);
    }

    #[test]
    fn nested_blocks_record_innermost_statement() {
        let raised = run_err("x = 0\nif True:\n    while True:\n        x = 1 / 0\n");
        assert_eq!(raised.frames.len(), 1);
        assert_eq!(raised.frames[0].line, 4);
        assert_eq!(raised.exception.kind, ExceptionKind::ZeroDivisionError);
    }

    #[test]
    fn unbounded_recursion_is_an_exception() {
        let raised = run_err("def f(n):\n    return f(n + 1)\nf(0)\n");
        assert_eq!(raised.exception.kind, ExceptionKind::RecursionError);
    }

    /// `def name(n):` whose return wraps `call` in `levels` parenthesised sums.
    fn nested_sum_function(name: &str, levels: usize, call: &str) -> String {
        format!(
            "def {}(n):\n    if n == 0:\n        return 0\n    return {}{}{}\n",
            name,
            "1 + (".repeat(levels),
            call,
            ")".repeat(levels)
        )
    }

    #[test]
    fn nested_expressions_count_toward_recursion_limit() {
        let source = nested_sum_function("f", 60, "f(n + 1)") + "f(1)\n";
        let raised = run_err(&source);
        assert_eq!(raised.exception.kind, ExceptionKind::RecursionError);

        let source = nested_sum_function("g", 60, "g(n - 1)") + "total = g(10)\n";
        let context = run_ok(&source);
        assert_eq!(context.get("total"), Some(&Value::Int(600)));
    }

    #[test]
    fn recursion_error_can_be_handled() {
        let source = nested_sum_function("f", 60, "f(n + 1)")
            + "try:\n    f(1)\nexcept RecursionError:\n    stopped = True\n";
        let context = run_ok(&source);
        assert_eq!(context.get("stopped"), Some(&Value::Bool(true)));
    }

    #[test]
    fn str_of_list_holding_itself_twice() {
        let context = run_ok("a = [1]\na.append(a)\na.append(a)\ntext = str(a)\nsame = a == a\n");
        assert_eq!(context.get("text"), Some(&Value::str("[1, [...], [...]]")));
        assert_eq!(context.get("same"), Some(&Value::Bool(true)));
    }

    #[test]
    fn oversized_rendering_is_an_overflow_error() {
        let raised = run_err("x = []\nfor i in range(30):\n    x = [x, x]\ntext = repr(x)\n");
        assert_eq!(raised.exception.kind, ExceptionKind::OverflowError);
    }

    #[test]
    fn refused_binding_is_a_safety_error() {
        let program = parse("secret = 1\n", Arc::from("test")).expect("parse");
        let policy = sandbox_types::PolicyConfig {
            reserved_keys: ["secret".to_string()].into_iter().collect(),
            ..Default::default()
        };
        let mut context = GuardedContext::empty(Arc::new(PolicyContextGuard::new(Arc::new(policy))));
        let raised = Interpreter::new(&mut context)
            .run(&program, Arc::from("test"))
            .expect_err("binding must be refused");
        assert_eq!(raised.exception.kind, ExceptionKind::SafetyError);
        assert!(!context.contains_key("secret"));
    }

    #[test]
    fn augmented_list_add_mutates_in_place() {
        let context = run_ok("a = [1]\nb = a\na += [2]\nn = len(b)\n");
        assert_eq!(context.get("n"), Some(&Value::Int(2)));
    }

    #[test]
    fn context_shadows_builtins() {
        let context = run_ok("len = 3\nx = len\n");
        assert_eq!(context.get("x"), Some(&Value::Int(3)));
    }

    #[test]
    fn wrong_arity_is_a_type_error() {
        let raised = run_err("def f(a):\n    return a\nf()\n");
        assert_eq!(raised.exception.kind, ExceptionKind::TypeError);
        assert_eq!(
            raised.exception.message,
            "f() takes 1 positional argument but 0 were given"
        );
    }

    #[test]
    fn assert_failure_carries_message() {
        let raised = run_err("assert 1 == 2, 'mismatch'\n");
        assert_eq!(raised.exception.kind, ExceptionKind::AssertionError);
        assert_eq!(raised.exception.message, "mismatch");
    }

    #[test]
    fn short_circuit_returns_operands() {
        let context = run_ok("a = 0 or 'x'\nb = [] and missing\n");
        assert_eq!(context.get("a"), Some(&Value::str("x")));
        assert_eq!(context.get("b"), Some(&Value::list(vec![])));
    }
}
