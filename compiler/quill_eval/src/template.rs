//! Template configuration and execution.
//!
//! A [`Template`] owns its named trees, functions, per-type methods and
//! error-manager registry. Configuration takes `&mut self`; execution takes
//! `&self` and keeps all render state in a private executor, so one
//! configured template can render on many threads at once. The registry is
//! an `Arc` snapshot copied on write, which keeps clones cheap.

use std::fmt;
use std::sync::Arc;

use quill_ir::{Pos, Tree};
use quill_value::{EvalError, Value};
use rustc_hash::FxHashMap;

use crate::builtins::builtins;
use crate::callable::{Callable, IntoCallable};
use crate::exec::Executor;
use crate::handlers;
use crate::manager::{ErrorManager, ManagerRegistry};
use crate::options::{group, MissingMode, Options};
use crate::output::OutputBuffer;

/// A failed render: where it failed and why.
#[derive(Clone, Debug, PartialEq)]
pub struct ExecError {
    /// Name of the tree being walked when the error escaped.
    pub template: String,
    pub pos: Option<Pos>,
    /// Template-source rendering of the failing node; may be empty.
    pub node: String,
    pub cause: EvalError,
}

impl fmt::Display for ExecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "template: {}", self.template)?;
        if let Some(pos) = self.pos {
            write!(f, ":{pos}")?;
        }
        if !self.node.is_empty() {
            write!(f, ": executing {:?} at <{}>", self.template, self.node)?;
        }
        write!(f, ": {}", self.cause)
    }
}

impl std::error::Error for ExecError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.cause)
    }
}

/// Errors of the configuration and execution API.
#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    #[error(transparent)]
    Exec(#[from] ExecError),

    #[error("invalid error filter: {0}")]
    Filter(#[from] regex::Error),

    #[error("template: no template {name:?} associated with template {owner:?}")]
    Undefined { name: String, owner: String },
}

/// A configured set of named templates.
#[derive(Clone)]
pub struct Template {
    name: String,
    trees: FxHashMap<String, Arc<Tree>>,
    funcs: FxHashMap<String, Callable>,
    builtins: Arc<FxHashMap<String, Callable>>,
    methods: FxHashMap<String, FxHashMap<String, Callable>>,
    registry: Arc<ManagerRegistry>,
    options: Options,
    missing: MissingMode,
}

impl Template {
    pub fn new(name: impl Into<String>) -> Self {
        Template {
            name: name.into(),
            trees: FxHashMap::default(),
            funcs: FxHashMap::default(),
            builtins: Arc::new(builtins()),
            methods: FxHashMap::default(),
            registry: Arc::new(ManagerRegistry::new()),
            options: Options::empty(),
            missing: MissingMode::DEFAULT,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Add or replace the tree with the same name.
    pub fn add_tree(&mut self, tree: Tree) -> &mut Self {
        self.trees.insert(tree.name.clone(), Arc::new(tree));
        self
    }

    /// Register one function; user functions shadow built-ins.
    pub fn func<M>(&mut self, name: impl Into<String>, f: impl IntoCallable<M>) -> &mut Self {
        self.funcs.insert(name.into(), f.into_callable());
        self
    }

    pub fn funcs<S: Into<String>>(
        &mut self,
        funcs: impl IntoIterator<Item = (S, Callable)>,
    ) -> &mut Self {
        for (name, callable) in funcs {
            self.funcs.insert(name.into(), callable);
        }
        self
    }

    /// Like [`Template::funcs`], also enabling
    /// [`Options::NON_STANDARD_RESULTS`] when any function needs it.
    pub fn extra_funcs<S: Into<String>>(
        &mut self,
        funcs: impl IntoIterator<Item = (S, Callable)>,
    ) -> Result<&mut Self, TemplateError> {
        let mut non_standard = false;
        for (name, callable) in funcs {
            non_standard |= !callable.is_contextual() && !callable.signature().is_standard();
            self.funcs.insert(name.into(), callable);
        }
        if non_standard {
            self.option(Options::NON_STANDARD_RESULTS)?;
        }
        Ok(self)
    }

    /// Register a method callable as `.name` on values whose type name is
    /// `type_name`. The receiver is passed as the first argument.
    pub fn method<M>(
        &mut self,
        type_name: impl Into<String>,
        name: impl Into<String>,
        f: impl IntoCallable<M>,
    ) -> &mut Self {
        self.methods
            .entry(type_name.into())
            .or_default()
            .insert(name.into(), f.into_callable());
        self
    }

    /// Install or replace manager group `name`; an empty list removes it.
    pub fn error_managers(&mut self, name: impl Into<String>, managers: Vec<ErrorManager>) -> &mut Self {
        Arc::make_mut(&mut self.registry).register(name, managers);
        self
    }

    pub fn missing_key(&mut self, mode: MissingMode) -> &mut Self {
        self.missing = mode;
        self
    }

    /// Enable extended features.
    pub fn option(&mut self, options: Options) -> Result<&mut Self, TemplateError> {
        if options.contains(Options::FUNCTIONS_AS_METHODS) {
            self.error_managers(group::FUNCS_AS_METHODS, handlers::functions_as_methods()?);
        }
        if options.contains(Options::PUBLIC_FUNCTIONS) {
            self.error_managers(group::PUBLIC_FUNCS, handlers::public_functions()?);
        }
        if options.contains(Options::NON_STANDARD_RESULTS) {
            self.error_managers(group::NON_STANDARD_RESULTS, handlers::non_standard_results()?);
        }
        if options.contains(Options::TRAP) {
            self.funcs.insert("trap".to_string(), handlers::trap());
            self.error_managers(group::CALL_FAIL, handlers::call_fail()?);
        }
        if options.contains(Options::FLOW_CONTROL) {
            for (name, callable) in handlers::flow_control() {
                self.funcs.insert(name.to_string(), callable);
            }
        }
        self.options |= options;
        tracing::debug!(options = ?self.options, "template options");
        Ok(self)
    }

    pub fn options(&self) -> Options {
        self.options
    }

    pub fn missing_mode(&self) -> MissingMode {
        self.missing
    }

    pub fn registry(&self) -> &ManagerRegistry {
        &self.registry
    }

    /// Built-in function names, sorted.
    pub fn builtins(&self) -> Vec<&str> {
        sorted(self.builtins.keys())
    }

    /// Registered (non built-in) function names, sorted.
    pub fn func_names(&self) -> Vec<&str> {
        sorted(self.funcs.keys())
    }

    /// Manager group names in evaluation order.
    pub fn registered_groups(&self) -> Vec<&str> {
        self.registry.names().collect()
    }

    pub fn tree_names(&self) -> Vec<&str> {
        sorted(self.trees.keys())
    }

    pub(crate) fn lookup_func(&self, name: &str) -> Option<&Callable> {
        self.funcs.get(name).or_else(|| self.builtins.get(name))
    }

    pub(crate) fn lookup_method(&self, type_name: &str, name: &str) -> Option<&Callable> {
        self.methods.get(type_name)?.get(name)
    }

    pub(crate) fn lookup_tree(&self, name: &str) -> Option<&Tree> {
        self.trees.get(name).map(AsRef::as_ref)
    }

    /// Render the template's own tree.
    pub fn execute(&self, data: impl Into<Value>) -> Result<String, TemplateError> {
        self.execute_template(&self.name, data)
    }

    /// Render the tree called `name`.
    pub fn execute_template(&self, name: &str, data: impl Into<Value>) -> Result<String, TemplateError> {
        let tree = self.tree(name)?;
        Ok(Executor::new(self, tree, OutputBuffer::buffer(), data.into()).run()?)
    }

    /// Render without keeping output; reports only failures.
    pub fn validate(&self, data: impl Into<Value>) -> Result<(), TemplateError> {
        let tree = self.tree(&self.name)?;
        Executor::new(self, tree, OutputBuffer::Silent, data.into()).run()?;
        Ok(())
    }

    fn tree(&self, name: &str) -> Result<&Tree, TemplateError> {
        self.lookup_tree(name).ok_or_else(|| TemplateError::Undefined {
            name: name.to_string(),
            owner: self.name.clone(),
        })
    }
}

impl fmt::Debug for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Template")
            .field("name", &self.name)
            .field("trees", &self.tree_names())
            .field("funcs", &self.func_names())
            .field("groups", &self.registered_groups())
            .field("options", &self.options)
            .field("missing", &self.missing)
            .finish_non_exhaustive()
    }
}

fn sorted<'a>(names: impl Iterator<Item = &'a String>) -> Vec<&'a str> {
    let mut names: Vec<&str> = names.map(String::as_str).collect();
    names.sort_unstable();
    names
}
