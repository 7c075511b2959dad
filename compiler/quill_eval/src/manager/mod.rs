//! Error managers: conditional handlers offered every recoverable failure.
//!
//! A manager declares which failures it wants (context source, missing-key
//! mode, member name, receiver kind, error-text filters) and a handler
//! that may replace the failing result. Managers are grouped by name in a
//! [`ManagerRegistry`]; see [`crate::Context`] for the recovery loop.

mod registry;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use quill_value::{ControlAction, Kind, Value};
use regex::Regex;

use crate::options::{ContextSource, MissingMode};
use crate::Context;

pub use registry::ManagerRegistry;

/// What a handler did with the failure.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum ErrorAction {
    /// Decline; the next manager is consulted.
    NoReplace,
    /// The returned value replaces the failing result.
    ResultReplaced,
    /// The returned value is a list; the member is re-applied to each
    /// element and the list of outcomes becomes the result.
    ResultAsArray,
}

impl fmt::Display for ErrorAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ErrorAction::NoReplace => "NoReplace",
            ErrorAction::ResultReplaced => "ResultReplaced",
            ErrorAction::ResultAsArray => "ResultAsArray",
        })
    }
}

/// Outcome of a handler.
pub type HandlerResult = Result<(Value, ErrorAction), ControlAction>;

type Handler = dyn for<'e, 't> Fn(&mut Context<'e, 't>) -> HandlerResult + Send + Sync;

/// A conditional failure handler.
///
/// Empty criteria match everything. Filters are tested in order against
/// the error text; a manager with filters never matches a context without
/// a failure. The first match supplies the capture groups readable through
/// [`Context::matched`].
#[derive(Clone)]
pub struct ErrorManager {
    handler: Arc<Handler>,
    sources: ContextSource,
    modes: MissingMode,
    members: Vec<String>,
    kinds: Vec<Kind>,
    filters: Vec<Regex>,
}

impl ErrorManager {
    pub fn new<F>(handler: F) -> Self
    where
        F: for<'e, 't> Fn(&mut Context<'e, 't>) -> HandlerResult + Send + Sync + 'static,
    {
        ErrorManager {
            handler: Arc::new(handler),
            sources: ContextSource::empty(),
            modes: MissingMode::empty(),
            members: Vec::new(),
            kinds: Vec::new(),
            filters: Vec::new(),
        }
    }

    #[must_use]
    pub fn on_sources(mut self, sources: ContextSource) -> Self {
        self.sources = sources;
        self
    }

    #[must_use]
    pub fn on_modes(mut self, modes: MissingMode) -> Self {
        self.modes = modes;
        self
    }

    #[must_use]
    pub fn on_members<S: Into<String>>(mut self, members: impl IntoIterator<Item = S>) -> Self {
        self.members = members.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn on_kinds(mut self, kinds: impl IntoIterator<Item = Kind>) -> Self {
        self.kinds = kinds.into_iter().collect();
        self
    }

    /// Compile and append error-text filters.
    pub fn filters(mut self, patterns: &[&str]) -> Result<Self, regex::Error> {
        for pattern in patterns {
            self.filters.push(Regex::new(pattern)?);
        }
        Ok(self)
    }

    #[must_use]
    pub fn filter(mut self, regex: Regex) -> Self {
        self.filters.push(regex);
        self
    }

    /// Whether this manager applies to `ctx`.
    ///
    /// On a filter match the captures are recorded on the context, by index
    /// (`"0"` is the whole match) and by group name.
    pub fn can_manage(&self, ctx: &mut Context<'_, '_>) -> bool {
        if !self.sources.is_empty() && !self.sources.intersects(ctx.source()) {
            return false;
        }
        if !self.modes.is_empty() && !self.modes.intersects(ctx.mode()) {
            return false;
        }
        if !self.members.is_empty() && !self.members.iter().any(|m| m == ctx.member_name()) {
            return false;
        }
        if !self.kinds.is_empty() && !self.kinds.contains(&ctx.receiver().kind()) {
            return false;
        }
        if self.filters.is_empty() {
            return true;
        }
        let Some(text) = ctx.error().map(|e| e.message.clone()) else {
            return false;
        };
        for filter in &self.filters {
            if let Some(matches) = captures(filter, &text) {
                ctx.set_matches(matches);
                return true;
            }
        }
        false
    }

    pub(crate) fn handle(&self, ctx: &mut Context<'_, '_>) -> HandlerResult {
        (self.handler)(ctx)
    }
}

impl fmt::Debug for ErrorManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorManager")
            .field("sources", &self.sources)
            .field("modes", &self.modes)
            .field("members", &self.members)
            .field("kinds", &self.kinds)
            .field("filters", &self.filters.iter().map(Regex::as_str).collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

fn captures(regex: &Regex, text: &str) -> Option<BTreeMap<String, String>> {
    let caps = regex.captures(text)?;
    let mut matches = BTreeMap::new();
    for (i, group) in caps.iter().enumerate() {
        if let Some(group) = group {
            matches.insert(i.to_string(), group.as_str().to_string());
        }
    }
    for name in regex.capture_names().flatten() {
        if let Some(group) = caps.name(name) {
            matches.insert(name.to_string(), group.as_str().to_string());
        }
    }
    Some(matches)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, reason = "Tests use unwrap for brevity")]
mod tests;
