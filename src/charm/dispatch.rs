//! charm::dispatch
//!
//! Walks the spec tree for a command line, building one command instance per
//! level, and runs the deepest command found.

use std::fmt;
use std::future::Future;
use std::io::{self, Write};
use std::pin::Pin;
use std::sync::Arc;

use thiserror::Error;

use super::flags::{FlagError, FlagSet, ParseMode};
use super::help;
use super::spec::{Command, Spec};
use super::terminal;

/// Sentinel and usage errors raised by the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CharmError {
    /// Returned by a command's `run` to ask for its help text.
    #[error("help requested")]
    NeedHelp,

    /// Returned by a command's `run` when it only groups sub-commands.
    #[error("command has no action")]
    NoRun,

    #[error("{path}: no such sub-command \"{name}\"{}", list_available(.available))]
    NoSuchSubcommand {
        path: String,
        name: String,
        available: Vec<String>,
    },

    #[error("{path}: requires a sub-command{}", list_available(.available))]
    RequiresSubcommand { path: String, available: Vec<String> },

    #[error("no such command: {0}")]
    NoSuchCommand(String),
}

impl CharmError {
    /// True for errors that describe a malformed command line.
    pub fn is_usage(&self) -> bool {
        matches!(
            self,
            CharmError::NoSuchSubcommand { .. }
                | CharmError::RequiresSubcommand { .. }
                | CharmError::NoSuchCommand(_)
        )
    }
}

fn list_available(names: &[String]) -> String {
    if names.is_empty() {
        String::new()
    } else {
        format!("\navailable sub-commands: {}", names.join(", "))
    }
}

/// Returns true if `err` is the help sentinel.
pub fn is_need_help(err: &anyhow::Error) -> bool {
    matches!(err.downcast_ref::<CharmError>(), Some(CharmError::NeedHelp))
        || matches!(err.downcast_ref::<FlagError>(), Some(FlagError::Help))
}

fn is_no_run(err: &anyhow::Error) -> bool {
    matches!(err.downcast_ref::<CharmError>(), Some(CharmError::NoRun))
}

/// One level of a resolved command line.
pub struct Instance {
    spec: Arc<Spec>,
    command: Arc<dyn Command>,
    flags: FlagSet,
}

impl Instance {
    /// Construct the command for `spec` and merge in the parent's flags.
    pub fn new(spec: &Arc<Spec>, parent: Option<&Instance>) -> anyhow::Result<Self> {
        let mut flags = FlagSet::new(spec.name.clone());
        let command = spec.construct(parent.map(|p| Arc::clone(&p.command)), &mut flags)?;
        if let Some(parent) = parent {
            flags.inherit(&parent.flags);
        }
        Ok(Self {
            spec: Arc::clone(spec),
            command,
            flags,
        })
    }

    pub fn spec(&self) -> &Arc<Spec> {
        &self.spec
    }

    pub fn command(&self) -> &Arc<dyn Command> {
        &self.command
    }

    pub fn flags(&self) -> &FlagSet {
        &self.flags
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let flags: Vec<&str> = self.flags.all().map(|def| def.name.as_str()).collect();
        f.debug_struct("Instance")
            .field("spec", &self.spec.name)
            .field("flags", &flags)
            .finish()
    }
}

/// Space-separated command names along a path, e.g. `zed auth store`.
pub fn path_name(path: &[Instance]) -> String {
    path.iter()
        .map(|inst| inst.spec.name.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

fn visible_children(spec: &Spec) -> Vec<String> {
    spec.children()
        .iter()
        .filter(|child| !child.hidden)
        .map(|child| child.name.clone())
        .collect()
}

type ExecFuture<'a> = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'a>>;

/// Dispatch `args` against the tree rooted at `root`, writing help to stderr.
pub async fn exec(root: &Arc<Spec>, args: Vec<String>) -> anyhow::Result<()> {
    let mut stderr = io::stderr();
    exec_to(root, args, &mut stderr).await
}

/// Dispatch `args`, writing any help text to `out`.
pub async fn exec_to<W>(root: &Arc<Spec>, args: Vec<String>, out: &mut W) -> anyhow::Result<()>
where
    W: Write + Send,
{
    let mut path = Vec::new();
    match exec_sub(Arc::clone(root), args.clone(), &mut path).await {
        Err(err) if is_need_help(&err) => {
            drop(path);
            let path = search_help(root, &args)?;
            help::render(&path, false, terminal::width(), out)?;
            Ok(())
        }
        other => other,
    }
}

/// Build the instance for `spec`, parse its flags, and either descend into a
/// matching child or run the command with what is left.
pub fn exec_sub<'a>(
    spec: Arc<Spec>,
    args: Vec<String>,
    path: &'a mut Vec<Instance>,
) -> ExecFuture<'a> {
    Box::pin(async move {
        let instance = Instance::new(&spec, path.last())?;
        let parsed = instance.flags.parse(&args, ParseMode::Strict);
        let command = Arc::clone(&instance.command);
        path.push(instance);
        let rest = match parsed {
            Ok(rest) => rest,
            Err(FlagError::Help) => return Err(CharmError::NeedHelp.into()),
            Err(err) => return Err(err.into()),
        };

        if let Some(child) = rest.first().and_then(|name| spec.lookup_sub(name)) {
            tracing::trace!(command = %child.name, "descending");
            return exec_sub(child, rest[1..].to_vec(), path).await;
        }

        match command.run(rest.clone()).await {
            Err(err) if is_no_run(&err) => {
                let available = visible_children(&spec);
                let path = path_name(path);
                Err(match rest.first() {
                    Some(name) => CharmError::NoSuchSubcommand {
                        path,
                        name: name.clone(),
                        available,
                    },
                    None => CharmError::RequiresSubcommand { path, available },
                }
                .into())
            }
            other => other,
        }
    })
}

/// Resolve as deep a path as possible without running anything.
///
/// Unknown flags and bad values stop the walk at the current level instead
/// of failing, so help can still be shown for a partly malformed line.
pub fn search_help(root: &Arc<Spec>, args: &[String]) -> anyhow::Result<Vec<Instance>> {
    let mut path: Vec<Instance> = Vec::new();
    let mut spec = Arc::clone(root);
    let mut args = args.to_vec();
    loop {
        let instance = Instance::new(&spec, path.last())?;
        let rest = instance
            .flags
            .parse(&args, ParseMode::Lenient)
            .unwrap_or_default();
        path.push(instance);
        match rest.first().and_then(|name| spec.lookup_sub(name)) {
            Some(child) => {
                spec = child;
                args = rest[1..].to_vec();
            }
            None => return Ok(path),
        }
    }
}

/// Resolve a path of command names strictly, as `zed help a b` does.
pub fn search(root: &Arc<Spec>, names: &[String]) -> anyhow::Result<Vec<Instance>> {
    let mut path = vec![Instance::new(root, None)?];
    let mut spec = Arc::clone(root);
    for (index, name) in names.iter().enumerate() {
        let Some(child) = spec.lookup_sub(name) else {
            return Err(CharmError::NoSuchCommand(names[..=index].join(" ")).into());
        };
        let instance = Instance::new(&child, path.last())?;
        path.push(instance);
        spec = child;
    }
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::charm::flags::Flag;
    use crate::charm::spec::downcast;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Log(Mutex<Vec<String>>);

    impl Log {
        fn push(&self, line: String) {
            self.0.lock().unwrap().push(line);
        }
        fn lines(&self) -> Vec<String> {
            self.0.lock().unwrap().clone()
        }
    }

    struct Root {
        log: Arc<Log>,
        lake: Flag<String>,
    }

    #[async_trait]
    impl Command for Root {
        async fn run(&self, _args: Vec<String>) -> anyhow::Result<()> {
            Err(CharmError::NoRun.into())
        }
    }

    struct Leaf {
        root: Arc<Root>,
        name: &'static str,
        verbose: Flag<bool>,
    }

    #[async_trait]
    impl Command for Leaf {
        async fn run(&self, args: Vec<String>) -> anyhow::Result<()> {
            if args.first().map(String::as_str) == Some("help-me") {
                return Err(CharmError::NeedHelp.into());
            }
            self.root.log.push(format!(
                "{} lake={} verbose={} args={}",
                self.name,
                self.root.lake.get(),
                self.verbose.get(),
                args.join(",")
            ));
            Ok(())
        }
    }

    fn leaf(name: &'static str) -> Spec {
        Spec::new(name, move |parent, flags| {
            let root = downcast::<Root>(parent).ok_or_else(|| anyhow::anyhow!("bad parent"))?;
            Ok(Arc::new(Leaf {
                root,
                name,
                verbose: flags.bool("v", false, "verbose output"),
            }) as Arc<dyn Command>)
        })
        .usage(format!("{name} [options]"))
        .short(format!("the {name} command"))
    }

    fn tree(log: Arc<Log>) -> Arc<Spec> {
        let root = Spec::new("prog", move |_, flags| {
            Ok(Arc::new(Root {
                log: Arc::clone(&log),
                lake: flags.string("lake", "default", "lake location"),
            }) as Arc<dyn Command>)
        })
        .usage("prog <command>")
        .short("test program")
        .build();
        root.add(leaf("load").build());
        root.add(leaf("query").build());
        root.add(leaf("secret").hidden().build());
        root
    }

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn runs_leaf_with_inherited_flags_before_or_after_keyword() {
        let log = Arc::new(Log::default());
        let root = tree(Arc::clone(&log));
        let mut out = Vec::new();

        exec_to(&root, args(&["-lake", "a", "load", "-v", "x"]), &mut out)
            .await
            .unwrap();
        exec_to(&root, args(&["load", "-lake", "b", "y", "z"]), &mut out)
            .await
            .unwrap();

        assert_eq!(
            log.lines(),
            vec![
                "load lake=a verbose=true args=x".to_string(),
                "load lake=b verbose=false args=y,z".to_string(),
            ]
        );
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn unknown_subcommand_lists_visible_children() {
        let root = tree(Arc::new(Log::default()));
        let err = exec_to(&root, args(&["bogus"]), &mut Vec::new())
            .await
            .unwrap_err();
        let err = err.downcast::<CharmError>().unwrap();
        assert!(err.is_usage());
        let text = err.to_string();
        assert!(text.starts_with("prog: no such sub-command \"bogus\""));
        assert!(text.contains("load, query"));
        assert!(!text.contains("secret"));
    }

    #[tokio::test]
    async fn bare_group_requires_subcommand() {
        let root = tree(Arc::new(Log::default()));
        let err = exec_to(&root, Vec::new(), &mut Vec::new())
            .await
            .unwrap_err();
        assert!(err.to_string().starts_with("prog: requires a sub-command"));
    }

    #[tokio::test]
    async fn flag_errors_surface_unchanged() {
        let root = tree(Arc::new(Log::default()));
        let err = exec_to(&root, args(&["load", "-nope"]), &mut Vec::new())
            .await
            .unwrap_err();
        assert_eq!(
            err.downcast_ref::<FlagError>(),
            Some(&FlagError::Undefined("nope".into()))
        );
    }

    #[tokio::test]
    async fn help_flag_renders_deepest_path() {
        let root = tree(Arc::new(Log::default()));
        let mut out = Vec::new();
        exec_to(&root, args(&["load", "--help"]), &mut out)
            .await
            .unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("prog load - the load command"));
        assert!(text.contains("-v"));
        assert!(text.contains("[prog flags]"));
    }

    #[tokio::test]
    async fn need_help_from_run_renders_help() {
        let root = tree(Arc::new(Log::default()));
        let mut out = Vec::new();
        exec_to(&root, args(&["query", "help-me"]), &mut out)
            .await
            .unwrap();
        assert!(String::from_utf8(out).unwrap().contains("prog query"));
    }

    #[test]
    fn search_is_strict() {
        let root = tree(Arc::new(Log::default()));
        let path = search(&root, &args(&["load"])).unwrap();
        assert_eq!(path_name(&path), "prog load");

        let err = search(&root, &args(&["load", "deeper"])).unwrap_err();
        assert_eq!(err.to_string(), "no such command: load deeper");
    }

    #[test]
    fn instance_debug_names_spec() {
        let root = tree(Arc::new(Log::default()));
        let path = search(&root, &args(&["load"])).unwrap();
        let shown = format!("{:?}", path.last().unwrap());
        assert!(shown.contains("\"load\""), "{shown}");
    }

    #[test]
    fn search_help_stops_at_unknown_flag() {
        let root = tree(Arc::new(Log::default()));
        let path = search_help(&root, &args(&["-bogus", "load"])).unwrap();
        assert_eq!(path_name(&path), "prog");
        let path = search_help(&root, &args(&["-lake", "x", "load", "-h"])).unwrap();
        assert_eq!(path_name(&path), "prog load");
    }
}
