use std::fmt::Debug;

use derive_more::{Display, Into};
use walrus::Module;

pub mod error;
pub use error::{MiddlewareError, RegistrationError};

/// The non-empty name a middleware is registered under.
#[derive(Debug, Clone, Hash, PartialEq, Eq, PartialOrd, Ord, Display, Into)]
pub struct PassName(String);

impl PassName {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Option<Self> {
        let name = name.into();
        (!name.is_empty()).then_some(Self(name))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        let Self(name) = self;
        name
    }
}

/// A named transformation over a lowered module.
///
/// Passes run sequentially in registration order; a pass may assume every
/// pass registered before it succeeded.
pub trait ModuleMiddleware: Debug + Send + Sync {
    /// Unique within a chain, stable across compilations.
    fn name(&self) -> &str;

    /// Names of passes that must be registered before this one.
    fn dependencies(&self) -> &[&str] {
        &[]
    }

    /// # Errors
    /// Any failure aborts the compilation.
    fn transform(&self, module: &mut Module) -> anyhow::Result<()>;
}

#[derive(Debug)]
struct RegisteredMiddleware {
    name: PassName,
    middleware: Box<dyn ModuleMiddleware>,
}

/// The ordered middleware pipeline of a compiler.
#[derive(Debug, Default)]
pub struct MiddlewareChain {
    passes: Vec<RegisteredMiddleware>,
}

impl MiddlewareChain {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `middleware` to the pipeline under the name it reports.
    ///
    /// # Errors
    /// When the name is empty or taken, or a dependency is not registered yet.
    pub fn register(
        &mut self,
        middleware: impl ModuleMiddleware + 'static,
    ) -> Result<&mut Self, RegistrationError> {
        let name = PassName::new(middleware.name()).ok_or(RegistrationError::EmptyName)?;
        if self.contains(name.as_str()) {
            return Err(RegistrationError::DuplicateName(name.into()));
        }
        if let Some(dependency) = middleware
            .dependencies()
            .iter()
            .find(|dependency| !self.contains(dependency))
        {
            return Err(RegistrationError::MissingDependency {
                pass: name.into(),
                dependency: (*dependency).to_string(),
            });
        }

        tracing::trace!(%name, position = self.passes.len(), "registered middleware");
        self.passes.push(RegisteredMiddleware {
            name,
            middleware: Box::new(middleware),
        });
        Ok(self)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.passes.iter().any(|pass| pass.name.as_str() == name)
    }

    /// Registered names, in execution order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.passes.iter().map(|pass| pass.name.as_str())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.passes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.passes.is_empty()
    }

    /// Run every pass in order, stopping at the first failure.
    ///
    /// Returns the number of passes that ran.
    pub(crate) fn run(&self, module: &mut Module) -> Result<usize, MiddlewareError> {
        for (position, pass) in self.passes.iter().enumerate() {
            let _span = tracing::debug_span!("middleware", name = %pass.name, position).entered();
            tracing::debug!("running middleware");
            if let Err(error) = pass.middleware.transform(module) {
                let error = MiddlewareError::with_source(pass.name.clone(), error);
                tracing::debug!(%error, "middleware failed, halting pipeline");
                return Err(error);
            }
        }
        Ok(self.passes.len())
    }
}
