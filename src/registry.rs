use std::collections::HashMap;

use crate::ast::Node;
use crate::error::UnreplResult;
use crate::render::Unparser;
use crate::tags;

/// Renders one tagged literal.
///
/// A reader receives the whole tag node and decides everything about its
/// output, including how many levels of the payload it renders itself.
pub trait TagRenderer: Send + Sync {
    /// # Errors
    /// Errors for which [`crate::UnreplError::is_contained`] holds only drop
    /// this node's output; any other error aborts the render.
    fn render(&self, node: &Node, out: &mut Unparser<'_>) -> UnreplResult<()>;
}

struct FnRenderer<F>(F);

impl<F> TagRenderer for FnRenderer<F>
where
    F: Fn(&Node, &mut Unparser<'_>) -> UnreplResult<()> + Send + Sync,
{
    fn render(&self, node: &Node, out: &mut Unparser<'_>) -> UnreplResult<()> {
        (self.0)(node, out)
    }
}

struct Entry {
    interactive: Box<dyn TagRenderer>,
    muted: Option<Box<dyn TagRenderer>>,
}

/// Table from tag identifier to reader.
///
/// Built once (usually from [`Registry::builtin`] plus whatever collaborators
/// register), then shared read-only.
#[derive(Default)]
pub struct Registry {
    entries: HashMap<String, Entry>,
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("tags", &self.tags())
            .finish()
    }
}

impl Registry {
    /// An empty registry: every tag renders generically.
    pub fn new() -> Self {
        Self::default()
    }

    /// The readers for server responses.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        tags::register_builtins(&mut registry, false);
        registry
    }

    /// The readers for captured `*out*`/`*err*` text, where strings print
    /// without quotes.
    pub fn builtin_stdout() -> Self {
        let mut registry = Self::new();
        tags::register_builtins(&mut registry, true);
        registry
    }

    /// Adds or replaces the reader for `tag`.
    pub fn register<T, R>(&mut self, tag: T, renderer: R) -> &mut Self
    where
        T: Into<String>,
        R: TagRenderer + 'static,
    {
        self.entries.insert(
            tag.into(),
            Entry {
                interactive: Box::new(renderer),
                muted: None,
            },
        );
        self
    }

    /// Adds or replaces the reader for `tag` with a closure.
    pub fn register_fn<T, F>(&mut self, tag: T, renderer: F) -> &mut Self
    where
        T: Into<String>,
        F: Fn(&Node, &mut Unparser<'_>) -> UnreplResult<()> + Send + Sync + 'static,
    {
        self.register(tag, FnRenderer(renderer))
    }

    /// Adds or replaces the reader for `tag`, with a separate reader used when
    /// the UI is muted.
    pub fn register_muted<T, R, M>(&mut self, tag: T, interactive: R, muted: M) -> &mut Self
    where
        T: Into<String>,
        R: TagRenderer + 'static,
        M: TagRenderer + 'static,
    {
        self.entries.insert(
            tag.into(),
            Entry {
                interactive: Box::new(interactive),
                muted: Some(Box::new(muted)),
            },
        );
        self
    }

    /// The reader for `tag`, preferring its muted variant when `mute_ui`.
    pub fn lookup(&self, tag: &str, mute_ui: bool) -> Option<&dyn TagRenderer> {
        let entry = self.entries.get(tag)?;
        let renderer = match (&entry.muted, mute_ui) {
            (Some(muted), true) => muted,
            (Some(_) | None, _) => &entry.interactive,
        };
        Some(renderer.as_ref())
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.entries.contains_key(tag)
    }

    /// Registered tags, sorted.
    pub fn tags(&self) -> Vec<&str> {
        let mut tags: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        tags.sort_unstable();
        tags
    }
}
