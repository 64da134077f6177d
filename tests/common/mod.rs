#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use walrus::{FunctionBuilder, Module, ValType};
use webassembly_frontend::ModuleMiddleware;

/// Route `tracing` output through the test harness; `RUST_LOG` selects levels.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A pass that counts its invocations and optionally fails.
#[derive(Debug, Clone)]
pub struct ScriptedPass {
    pub name: &'static str,
    pub failure: Option<&'static str>,
    pub calls: Arc<AtomicUsize>,
}

impl ScriptedPass {
    pub fn succeeding(name: &'static str) -> Self {
        Self {
            name,
            failure: None,
            calls: Arc::default(),
        }
    }

    pub fn failing(name: &'static str, message: &'static str) -> Self {
        Self {
            failure: Some(message),
            ..Self::succeeding(name)
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ModuleMiddleware for ScriptedPass {
    fn name(&self) -> &str {
        self.name
    }

    fn transform(&self, _module: &mut Module) -> anyhow::Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.failure {
            Some(message) => Err(anyhow::anyhow!(message)),
            None => Ok(()),
        }
    }
}

/// Adds an exported function `name` returning `value`.
#[derive(Debug)]
pub struct ExportConstant {
    pub name: &'static str,
    pub value: i32,
}

impl ModuleMiddleware for ExportConstant {
    fn name(&self) -> &str {
        "export-constant"
    }

    fn transform(&self, module: &mut Module) -> anyhow::Result<()> {
        let mut builder = FunctionBuilder::new(&mut module.types, &[], &[ValType::I32]);
        builder.func_body().i32_const(self.value);
        let function = builder.finish(vec![], &mut module.funcs);
        module.exports.add(self.name, function);
        Ok(())
    }
}

pub const EMPTY_MODULE: &[u8] = b"\0asm\x01\0\0\0";
