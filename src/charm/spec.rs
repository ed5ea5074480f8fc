//! charm::spec
//!
//! Declarative command specs and the parent/child registry.
//!
//! # Design
//!
//! A [`Spec`] describes a command: its name, help text, which flags are
//! hidden or redacted, and a factory that builds the command value and
//! binds its flags. Specs are linked into a tree with [`Spec::add`] at
//! program start and are read-only afterwards.
//!
//! The same leaf spec may be attached under several parents (for example
//! `zed query` and `zed api query`). The registry does not deduplicate;
//! the back-pointer records the most recent parent.
//!
//! Sibling names are not checked for uniqueness. When two siblings share a
//! name, [`Spec::lookup_sub`] returns the first one attached.

use std::any::Any;
use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, Weak};

use async_trait::async_trait;

use super::flags::FlagSet;

/// Constructs a command value and binds its flags.
///
/// The first argument is the command value of the parent instance (`None`
/// for the root).
pub type Factory = Box<
    dyn Fn(Option<Arc<dyn Command>>, &mut FlagSet) -> anyhow::Result<Arc<dyn Command>>
        + Send
        + Sync,
>;

/// Conversion to `Any` so children can recover their parent's concrete type.
pub trait AsAny {
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<T: Any + Send + Sync> AsAny for T {
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// A constructed command.
///
/// `run` receives the positional arguments left over after flag parsing
/// and sub-command resolution.
#[async_trait]
pub trait Command: AsAny + Send + Sync {
    async fn run(&self, args: Vec<String>) -> anyhow::Result<()>;
}

/// Recover the concrete type of a parent command.
///
/// Returns `None` when there is no parent or the parent has another type.
pub fn downcast<T>(parent: Option<Arc<dyn Command>>) -> Option<Arc<T>>
where
    T: Command + Any,
{
    parent?.into_any().downcast::<T>().ok()
}

/// Declarative descriptor of a command.
pub struct Spec {
    pub name: String,
    pub usage: String,
    pub short: String,
    pub long: String,
    pub hidden: bool,
    /// Comma-separated flag names omitted from non-verbose help.
    pub hidden_flags: String,
    /// Comma-separated flag names whose default is masked in help.
    pub redacted_flags: String,
    factory: Factory,
    children: RwLock<Vec<Arc<Spec>>>,
    parent: RwLock<Weak<Spec>>,
}

impl Spec {
    /// Create a spec with the given name and factory.
    pub fn new<F>(name: impl Into<String>, factory: F) -> Self
    where
        F: Fn(Option<Arc<dyn Command>>, &mut FlagSet) -> anyhow::Result<Arc<dyn Command>>
            + Send
            + Sync
            + 'static,
    {
        Self {
            name: name.into(),
            usage: String::new(),
            short: String::new(),
            long: String::new(),
            hidden: false,
            hidden_flags: String::new(),
            redacted_flags: String::new(),
            factory: Box::new(factory),
            children: RwLock::new(Vec::new()),
            parent: RwLock::new(Weak::new()),
        }
    }

    pub fn usage(mut self, usage: impl Into<String>) -> Self {
        self.usage = usage.into();
        self
    }

    pub fn short(mut self, short: impl Into<String>) -> Self {
        self.short = short.into();
        self
    }

    pub fn long(mut self, long: impl Into<String>) -> Self {
        self.long = long.into();
        self
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    pub fn hidden_flags(mut self, names: impl Into<String>) -> Self {
        self.hidden_flags = names.into();
        self
    }

    pub fn redacted_flags(mut self, names: impl Into<String>) -> Self {
        self.redacted_flags = names.into();
        self
    }

    /// Wrap the finished spec for registration.
    pub fn build(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Attach `child` under this spec and record the back-pointer.
    pub fn add(self: &Arc<Self>, child: Arc<Spec>) {
        *child.parent.write().unwrap_or_else(PoisonError::into_inner) = Arc::downgrade(self);
        self.children
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(child);
    }

    /// Children in registration order.
    pub fn children(&self) -> Vec<Arc<Spec>> {
        self.children
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// First child with the given name.
    pub fn lookup_sub(&self, name: &str) -> Option<Arc<Spec>> {
        self.children
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|child| child.name == name)
            .cloned()
    }

    /// The most recently recorded parent.
    pub fn parent(&self) -> Option<Arc<Spec>> {
        self.parent
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .upgrade()
    }

    /// Follow parent pointers to the top of the tree.
    pub fn root(self: &Arc<Self>) -> Arc<Spec> {
        let mut seen: HashSet<*const Spec> = HashSet::new();
        let mut current = Arc::clone(self);
        seen.insert(Arc::as_ptr(&current));
        while let Some(parent) = current.parent() {
            if !seen.insert(Arc::as_ptr(&parent)) {
                break;
            }
            current = parent;
        }
        current
    }

    /// Returns true if some spec is reachable from itself through child links.
    pub fn has_cycle(self: &Arc<Self>) -> bool {
        fn visit(spec: &Arc<Spec>, ancestors: &mut Vec<*const Spec>) -> bool {
            let ptr = Arc::as_ptr(spec);
            if ancestors.contains(&ptr) {
                return true;
            }
            ancestors.push(ptr);
            let cyclic = spec.children().iter().any(|child| visit(child, ancestors));
            ancestors.pop();
            cyclic
        }
        visit(self, &mut Vec::new())
    }

    /// Visit every spec below and including this one, depth first.
    ///
    /// `visit` receives the command path from this spec down. A spec that
    /// is already on the current path is not entered again.
    pub fn walk<F>(self: &Arc<Self>, mut visit: F)
    where
        F: FnMut(&[Arc<Spec>]),
    {
        fn descend<F: FnMut(&[Arc<Spec>])>(path: &mut Vec<Arc<Spec>>, visit: &mut F) {
            visit(path);
            let Some(current) = path.last().cloned() else {
                return;
            };
            for child in current.children() {
                if path.iter().any(|spec| Arc::ptr_eq(spec, &child)) {
                    continue;
                }
                path.push(child);
                descend(path, visit);
                path.pop();
            }
        }
        descend(&mut vec![Arc::clone(self)], &mut visit);
    }

    /// Returns true if this spec has no children.
    pub fn is_leaf(&self) -> bool {
        self.children
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_empty()
    }

    pub(crate) fn hidden_flag_set(&self) -> HashSet<String> {
        split_names(&self.hidden_flags)
    }

    pub(crate) fn redacted_flag_set(&self) -> HashSet<String> {
        split_names(&self.redacted_flags)
    }

    pub(crate) fn construct(
        &self,
        parent: Option<Arc<dyn Command>>,
        flags: &mut FlagSet,
    ) -> anyhow::Result<Arc<dyn Command>> {
        (self.factory)(parent, flags)
    }
}

impl fmt::Debug for Spec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Spec")
            .field("name", &self.name)
            .field("hidden", &self.hidden)
            .field(
                "children",
                &self.children().iter().map(|c| c.name.clone()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// Split a comma-separated name list, trimming whitespace and dropping blanks.
fn split_names(names: &str) -> HashSet<String> {
    names
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Noop;

    #[async_trait]
    impl Command for Noop {
        async fn run(&self, _args: Vec<String>) -> anyhow::Result<()> {
            Ok(())
        }
    }

    fn leaf(name: &str) -> Arc<Spec> {
        Spec::new(name, |_, _| Ok(Arc::new(Noop) as Arc<dyn Command>)).build()
    }

    #[test]
    fn add_links_child_and_parent() {
        let root = leaf("root");
        let child = leaf("child");
        root.add(child.clone());

        assert_eq!(root.children().len(), 1);
        assert!(Arc::ptr_eq(&child.parent().unwrap(), &root));
        assert!(Arc::ptr_eq(&child.root(), &root));
        assert!(!root.is_leaf());
        assert!(child.is_leaf());
    }

    #[test]
    fn lookup_sub_returns_first_duplicate() {
        let root = leaf("root");
        let first = Spec::new("dup", |_, _| Ok(Arc::new(Noop) as Arc<dyn Command>))
            .short("first")
            .build();
        let second = Spec::new("dup", |_, _| Ok(Arc::new(Noop) as Arc<dyn Command>))
            .short("second")
            .build();
        root.add(first);
        root.add(second);

        assert_eq!(root.lookup_sub("dup").unwrap().short, "first");
        assert!(root.lookup_sub("missing").is_none());
    }

    #[test]
    fn shared_leaf_records_latest_parent() {
        let root = leaf("root");
        let a = leaf("a");
        let b = leaf("b");
        let shared = leaf("shared");
        root.add(a.clone());
        root.add(b.clone());
        a.add(shared.clone());
        b.add(shared.clone());

        assert!(Arc::ptr_eq(&shared.parent().unwrap(), &b));
        assert!(a.lookup_sub("shared").is_some());
        assert!(!root.has_cycle());
    }

    #[test]
    fn walk_visits_shared_leaf_under_each_parent() {
        let root = leaf("root");
        let a = leaf("a");
        let b = leaf("b");
        let shared = leaf("shared");
        root.add(a.clone());
        root.add(b.clone());
        a.add(shared.clone());
        b.add(shared);

        let mut paths = Vec::new();
        root.walk(|path| {
            let names: Vec<&str> = path.iter().map(|spec| spec.name.as_str()).collect();
            paths.push(names.join(" "));
        });
        assert_eq!(
            paths,
            ["root", "root a", "root a shared", "root b", "root b shared"]
        );
    }

    #[test]
    fn detects_cycles() {
        let a = leaf("a");
        let b = leaf("b");
        a.add(b.clone());
        b.add(a.clone());
        assert!(a.has_cycle());
        // root() terminates even on a cyclic chain
        let _ = a.root();
    }

    #[test]
    fn flag_name_lists_are_trimmed() {
        let spec = Spec::new("x", |_, _| Ok(Arc::new(Noop) as Arc<dyn Command>))
            .hidden_flags(" a, b ,,c")
            .redacted_flags("");
        let hidden = spec.hidden_flag_set();
        assert_eq!(hidden.len(), 3);
        assert!(hidden.contains("b"));
        assert!(spec.redacted_flag_set().is_empty());
    }

    #[test]
    fn downcast_recovers_concrete_parent() {
        let parent: Arc<dyn Command> = Arc::new(Noop);
        assert!(downcast::<Noop>(Some(parent)).is_some());
        assert!(downcast::<Noop>(None).is_none());
    }
}
