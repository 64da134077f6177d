use std::error::Error as _;

use wasmtime::*;
use wat::parse_str;
use webassembly_frontend::{
    CompileError, Compiler, CompilerConfig, MiddlewareError, ModuleMiddleware, Stage,
    middleware::RegistrationError,
};

mod common;
use common::{EMPTY_MODULE, ExportConstant, ScriptedPass};

/// Three passes, the second one fails.
///
/// Expected: the first ran once, the third never ran, and the error names
/// the second pass with its message untouched.
#[test]
fn failing_pass_halts_the_pipeline() {
    common::init_tracing();
    let first = ScriptedPass::succeeding("first");
    let second = ScriptedPass::failing("second", "local index out of range");
    let third = ScriptedPass::succeeding("third");

    let config = CompilerConfig::default()
        .with_middleware(first.clone())
        .and_then(|config| config.with_middleware(second.clone()))
        .and_then(|config| config.with_middleware(third.clone()))
        .unwrap();
    let error = Compiler::new(config).compile(EMPTY_MODULE).unwrap_err();

    assert_eq!(error.stage(), Stage::Middleware);
    let middleware = error.middleware_error().unwrap();
    assert_eq!(middleware.name(), "second");
    assert_eq!(middleware.message(), "local index out of range");
    assert_eq!(
        error.to_string(),
        "Middleware error: error in middleware `second`: local index out of range"
    );

    assert_eq!(first.calls(), 1);
    assert_eq!(second.calls(), 1);
    assert_eq!(third.calls(), 0);
}

#[test]
fn every_pass_runs_on_success() {
    let passes = ["a", "b", "c"].map(ScriptedPass::succeeding);
    let mut config = CompilerConfig::default();
    for pass in &passes {
        config = config.with_middleware(pass.clone()).unwrap();
    }

    let compiled = Compiler::new(config).compile(EMPTY_MODULE).unwrap();
    assert_eq!(compiled.passes_run(), 3);
    assert!(passes.iter().all(|pass| pass.calls() == 1));
}

/// A pass adding `(export "answer" (func (result i32) i32.const 42))`.
///
/// Expected: the compiled output runs and the new export yields 42.
#[test]
fn transformed_module_runs() {
    const WAT: &str = r#"
      (module
        (func $double (export "double") (param i32) (result i32)
          local.get 0
          i32.const 2
          i32.mul))
      "#;

    let config = CompilerConfig::default()
        .with_middleware(ExportConstant {
            name: "answer",
            value: 42,
        })
        .unwrap();
    let compiled = Compiler::new(config)
        .compile(&parse_str(WAT).unwrap())
        .unwrap();

    let mut store = Store::<()>::default();
    let instance = {
        let module = Module::from_binary(store.engine(), compiled.bytes()).unwrap();
        Instance::new(&mut store, &module, &[]).unwrap()
    };

    let answer = instance
        .get_typed_func::<(), i32>(&mut store, "answer")
        .expect("Export 'answer' not found");
    assert_eq!(answer.call(&mut store, ()).unwrap(), 42);

    let double = instance
        .get_typed_func::<i32, i32>(&mut store, "double")
        .expect("Export 'double' not found");
    assert_eq!(double.call(&mut store, 21).unwrap(), 42);
}

/// A pass that runs a helper pipeline of its own and forwards its failure.
#[derive(Debug)]
struct Delegating {
    helper: Compiler,
    forward_whole_error: bool,
}

impl Delegating {
    fn new(forward_whole_error: bool) -> Self {
        let config = CompilerConfig::default()
            .with_middleware(ScriptedPass::failing("helper", "helper gave up"))
            .unwrap();
        Self {
            helper: Compiler::new(config),
            forward_whole_error,
        }
    }
}

impl ModuleMiddleware for Delegating {
    fn name(&self) -> &str {
        "delegating"
    }

    fn transform(&self, _module: &mut walrus::Module) -> anyhow::Result<()> {
        match self.helper.compile(EMPTY_MODULE) {
            Ok(_) => Ok(()),
            Err(CompileError::Middleware(inner)) if !self.forward_whole_error => {
                Err(anyhow::Error::new(inner).context("while running the helper pipeline"))
            }
            Err(error) => Err(error.into()),
        }
    }
}

fn has_nested_middleware_error(error: &MiddlewareError) -> bool {
    std::iter::successors(error.source(), |error| (*error).source())
        .any(|error| error.is::<MiddlewareError>())
}

/// The delegating pass is the one that failed, and the context it added
/// around the helper's failure is kept.
#[test]
fn delegated_failures_are_not_nested() {
    let config = CompilerConfig::default()
        .with_middleware(Delegating::new(false))
        .unwrap();
    let error = Compiler::new(config).compile(EMPTY_MODULE).unwrap_err();
    assert_eq!(
        error.to_string(),
        "Middleware error: error in middleware `delegating`: \
         while running the helper pipeline: helper gave up"
    );

    let middleware = error.middleware_error().unwrap();
    assert_eq!(middleware.name(), "delegating");
    assert_eq!(
        middleware.message(),
        "while running the helper pipeline: helper gave up"
    );
    assert_eq!(middleware.cause().unwrap().to_string(), "helper gave up");
    assert!(!has_nested_middleware_error(middleware));
}

/// Forwarding the helper's whole `CompileError` buries the inner
/// `MiddlewareError` below a wrapper; it is still taken out of the chain.
#[test]
fn wrapped_middleware_errors_are_not_nested() {
    let config = CompilerConfig::default()
        .with_middleware(Delegating::new(true))
        .unwrap();
    let error = Compiler::new(config).compile(EMPTY_MODULE).unwrap_err();

    let middleware = error.middleware_error().unwrap();
    assert_eq!(middleware.name(), "delegating");
    assert!(middleware.message().starts_with("Middleware error: "));
    assert!(middleware.message().ends_with("helper gave up"));
    assert!(!has_nested_middleware_error(middleware));
}

#[test]
fn native_cause_is_reachable() {
    #[derive(Debug)]
    struct Io;

    impl ModuleMiddleware for Io {
        fn name(&self) -> &str {
            "io"
        }

        fn transform(&self, _module: &mut walrus::Module) -> anyhow::Result<()> {
            Err(std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only").into())
        }
    }

    let config = CompilerConfig::default().with_middleware(Io).unwrap();
    let error = Compiler::new(config).compile(EMPTY_MODULE).unwrap_err();
    let cause = error.middleware_error().and_then(MiddlewareError::cause).unwrap();
    let io = cause.downcast_ref::<std::io::Error>().unwrap();
    assert_eq!(io.kind(), std::io::ErrorKind::PermissionDenied);
}

#[test]
fn registration_errors_are_compile_errors() {
    let error = CompilerConfig::default()
        .with_middleware(ScriptedPass::succeeding("twice"))
        .and_then(|config| config.with_middleware(ScriptedPass::succeeding("twice")))
        .unwrap_err();

    assert_eq!(error.stage(), Stage::Configuration);
    assert!(matches!(
        error,
        CompileError::Registration(RegistrationError::DuplicateName(ref name)) if name == "twice"
    ));
}

#[test]
fn invalid_modules_never_reach_the_pipeline() {
    let pass = ScriptedPass::succeeding("never");
    let config = CompilerConfig::default()
        .with_middleware(pass.clone())
        .unwrap();
    let bytes = parse_str("(module (func (result i32)))").unwrap();

    let error = Compiler::new(config).compile(&bytes).unwrap_err();
    assert_eq!(error.stage(), Stage::Validation);
    assert_eq!(pass.calls(), 0);
}
