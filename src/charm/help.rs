//! charm::help
//!
//! Renders NAME / USAGE / OPTIONS / COMMANDS / DESCRIPTION help for a
//! resolved command path, and provides the built-in `help` command.

use std::io::{self, Write};
use std::sync::{Arc, Weak};

use anyhow::anyhow;
use async_trait::async_trait;

use super::dispatch::{path_name, search, Instance};
use super::flags::{Flag, FlagDef};
use super::spec::{Command, Spec};
use super::terminal;

const TAB: &str = "    ";
const REDACTED: &str = "*****";

const HELP_LONG: &str = "
The help command displays the usage, options, sub-commands and description
of the command named by its arguments. With no arguments it describes the
top-level command.

Hidden commands and flags are listed, in brackets, when -v is given.";

/// The `help` spec. Attach it under the root of a command tree.
pub fn help_spec() -> Arc<Spec> {
    Arc::new_cyclic(|me: &Weak<Spec>| {
        let me = me.clone();
        Spec::new("help", move |_, flags| {
            Ok(Arc::new(HelpCommand {
                spec: me.clone(),
                verbose: flags.bool("v", false, "show hidden commands and flags"),
            }) as Arc<dyn Command>)
        })
        .usage("help [command ...]")
        .short("display help for a command")
        .long(HELP_LONG)
        .hidden_flags("v")
    })
}

struct HelpCommand {
    spec: Weak<Spec>,
    verbose: Flag<bool>,
}

#[async_trait]
impl Command for HelpCommand {
    async fn run(&self, args: Vec<String>) -> anyhow::Result<()> {
        let spec = self
            .spec
            .upgrade()
            .ok_or_else(|| anyhow!("help is not attached to a command tree"))?;
        let path = search(&spec.root(), &args)?;
        let mut stderr = io::stderr();
        render(&path, self.verbose.get(), terminal::width(), &mut stderr)?;
        Ok(())
    }
}

fn header(out: &mut dyn Write, title: &str) -> io::Result<()> {
    writeln!(out, "\x1b[1m{title}\x1b[0m")
}

/// Write help for the last instance of `path`.
pub fn render<W>(path: &[Instance], verbose: bool, width: usize, out: &mut W) -> io::Result<()>
where
    W: Write + ?Sized,
{
    let Some(leaf) = path.last() else {
        return Ok(());
    };
    let spec = leaf.spec();
    let line_width = width.saturating_sub(TAB.len() + 5).max(20);
    let mut text: Vec<u8> = Vec::new();

    header(&mut text, "NAME")?;
    let mut name = path_name(path);
    if !spec.short.is_empty() {
        name.push_str(" - ");
        name.push_str(&spec.short);
    }
    writeln!(text, "{TAB}{name}\n")?;

    header(&mut text, "USAGE")?;
    writeln!(text, "{TAB}{}\n", format_paragraph(&spec.usage, TAB, line_width))?;

    header(&mut text, "OPTIONS")?;
    for line in build_options(path, verbose) {
        if line.is_empty() {
            writeln!(text)?;
        } else {
            writeln!(text, "{TAB}{line}")?;
        }
    }
    writeln!(text)?;

    let children = spec.children();
    if !children.is_empty() {
        header(&mut text, "COMMANDS")?;
        for child in children {
            if child.hidden && !verbose {
                continue;
            }
            let name = if child.hidden {
                format!("[{}]", child.name)
            } else {
                child.name.clone()
            };
            writeln!(text, "{TAB}{name} - {}", child.short)?;
        }
        writeln!(text)?;
    }

    header(&mut text, "DESCRIPTION")?;
    let long = if spec.long.trim().is_empty() {
        &spec.short
    } else {
        &spec.long
    };
    writeln!(text, "{TAB}{}\n", format_paragraph(long, TAB, line_width))?;

    out.write_all(&text)?;
    out.flush()
}

/// Leaf flags first, then each ancestor's flags under a `[path flags]` heading.
fn build_options(path: &[Instance], verbose: bool) -> Vec<String> {
    let mut lines = Vec::new();
    let Some((leaf, ancestors)) = path.split_last() else {
        return lines;
    };
    lines.extend(instance_options(leaf, verbose));

    for depth in (0..ancestors.len()).rev() {
        let options = instance_options(&path[depth], verbose);
        if options.is_empty() {
            continue;
        }
        if !lines.is_empty() {
            lines.push(String::new());
        }
        lines.push(format!("[{} flags]", path_name(&path[..=depth])));
        lines.extend(options);
    }

    if lines.is_empty() {
        lines.push("no flags for this command".to_string());
    }
    lines
}

fn instance_options(instance: &Instance, verbose: bool) -> Vec<String> {
    let hidden = instance.spec().hidden_flag_set();
    let redacted = instance.spec().redacted_flag_set();
    instance
        .flags()
        .local()
        .filter(|def| verbose || !hidden.contains(&def.name))
        .map(|def| {
            let line = flag_line(def, redacted.contains(&def.name));
            if hidden.contains(&def.name) {
                format!("[{line}]")
            } else {
                line
            }
        })
        .collect()
}

fn flag_line(def: &FlagDef, redacted: bool) -> String {
    let value = def.value();
    let mut line = format!("-{}", def.name);
    if !value.is_bool() {
        line.push(' ');
        line.push_str(value.type_name());
    }
    if !def.usage.is_empty() {
        line.push_str("  ");
        line.push_str(&def.usage);
    }
    if redacted {
        line.push_str(&format!(" (default \"{REDACTED}\")"));
    } else if !def.zero_default {
        if value.type_name() == "string" {
            line.push_str(&format!(" (default {:?})", def.default));
        } else {
            line.push_str(&format!(" (default {})", def.default));
        }
    }
    line
}

/// Reflow `body` to `width` columns, keeping blank-line paragraph breaks.
/// Continuation lines are prefixed with `tab`.
pub fn format_paragraph(body: &str, tab: &str, width: usize) -> String {
    let body = body.trim_matches('\n');
    let paragraphs: Vec<String> = body
        .split("\n\n")
        .map(|paragraph| wrap(paragraph, width).join(&format!("\n{tab}")))
        .filter(|paragraph| !paragraph.is_empty())
        .collect();
    paragraphs.join(&format!("\n\n{tab}"))
}

fn wrap(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        if !current.is_empty() && current.chars().count() + 1 + word.chars().count() > width {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}
