//! charm::flags
//!
//! Single-dash flag sets with inheritance from ancestor commands.
//!
//! Each command instance owns a [`FlagSet`]. Factories bind flags with the
//! typed helpers ([`FlagSet::string`], [`FlagSet::bool`], ...) and keep the
//! returned [`Flag`] handle. After construction the dispatcher merges in the
//! flags of every ancestor so `zed load -lake x` and `zed -lake x load` set
//! the same value. Inherited flags share storage with the ancestor's handle;
//! a flag defined locally shadows an inherited one of the same name.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use thiserror::Error;

/// Errors produced while parsing command-line flags.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FlagError {
    /// `-h`, `-help` or `--help` was given and the command defines no such flag.
    #[error("help requested")]
    Help,

    #[error("flag provided but not defined: -{0}")]
    Undefined(String),

    #[error("flag needs an argument: -{0}")]
    MissingArgument(String),

    #[error("bad flag syntax: {0}")]
    BadSyntax(String),

    #[error("invalid value \"{value}\" for flag -{name}: {reason}")]
    InvalidValue {
        name: String,
        value: String,
        reason: String,
    },
}

/// How [`FlagSet::parse`] treats flags it does not recognize.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseMode {
    /// Unknown flags and bad values are errors.
    Strict,
    /// Parsing stops quietly at the first token it cannot consume.
    Lenient,
}

/// A type that can be bound to a flag.
pub trait FlagType: Clone + Default + Send + Sync + 'static {
    /// Shown after the flag name in help. Empty for booleans.
    const TYPE_NAME: &'static str;
    const IS_BOOL: bool = false;

    fn parse(raw: &str) -> Result<Self, String>;

    fn render(&self) -> String;

    /// Apply a raw command-line value to the current one.
    fn apply(slot: &mut Self, raw: &str) -> Result<(), String> {
        *slot = Self::parse(raw)?;
        Ok(())
    }
}

/// Type-erased access to a bound flag's storage.
pub trait Value: Send + Sync {
    fn set(&self, raw: &str) -> Result<(), String>;
    fn is_bool(&self) -> bool;
    fn type_name(&self) -> &'static str;
}

/// Handle to a flag's value, shared with every flag set that inherits it.
pub struct Flag<T> {
    cell: Arc<RwLock<T>>,
}

impl<T> Clone for Flag<T> {
    fn clone(&self) -> Self {
        Self {
            cell: Arc::clone(&self.cell),
        }
    }
}

impl<T: FlagType> Flag<T> {
    fn new(value: T) -> Self {
        Self {
            cell: Arc::new(RwLock::new(value)),
        }
    }

    pub fn get(&self) -> T {
        self.cell
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl<T: FlagType + fmt::Debug> fmt::Debug for Flag<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Flag").field(&self.get()).finish()
    }
}

impl<T: FlagType> Value for Flag<T> {
    fn set(&self, raw: &str) -> Result<(), String> {
        let mut slot = self.cell.write().unwrap_or_else(PoisonError::into_inner);
        T::apply(&mut slot, raw)
    }

    fn is_bool(&self) -> bool {
        T::IS_BOOL
    }

    fn type_name(&self) -> &'static str {
        T::TYPE_NAME
    }
}

/// Definition of one flag within a set.
#[derive(Clone)]
pub struct FlagDef {
    pub name: String,
    pub usage: String,
    /// Rendered default value.
    pub default: String,
    /// True when the default is the type's zero value.
    pub zero_default: bool,
    /// True when the flag came from an ancestor command.
    pub inherited: bool,
    value: Arc<dyn Value>,
}

impl FlagDef {
    pub fn value(&self) -> &Arc<dyn Value> {
        &self.value
    }
}

impl fmt::Debug for FlagDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlagDef")
            .field("name", &self.name)
            .field("default", &self.default)
            .field("inherited", &self.inherited)
            .finish()
    }
}

/// The flags of one command instance, keyed and listed by name.
#[derive(Debug, Default)]
pub struct FlagSet {
    name: String,
    flags: BTreeMap<String, FlagDef>,
}

impl FlagSet {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            flags: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Bind a flag of any [`FlagType`].
    pub fn define<T: FlagType>(&mut self, name: &str, default: T, usage: &str) -> Flag<T> {
        let flag = Flag::new(default.clone());
        let rendered = default.render();
        self.flags.insert(
            name.to_string(),
            FlagDef {
                name: name.to_string(),
                usage: usage.to_string(),
                zero_default: rendered == T::default().render(),
                default: rendered,
                inherited: false,
                value: Arc::new(flag.clone()),
            },
        );
        flag
    }

    pub fn bool(&mut self, name: &str, default: bool, usage: &str) -> Flag<bool> {
        self.define(name, default, usage)
    }

    pub fn string(&mut self, name: &str, default: &str, usage: &str) -> Flag<String> {
        self.define(name, default.to_string(), usage)
    }

    pub fn int(&mut self, name: &str, default: i64, usage: &str) -> Flag<i64> {
        self.define(name, default, usage)
    }

    pub fn duration(&mut self, name: &str, default: Duration, usage: &str) -> Flag<Duration> {
        self.define(name, default, usage)
    }

    pub fn bytes(&mut self, name: &str, default: u64, usage: &str) -> Flag<ByteSize> {
        self.define(name, ByteSize(default), usage)
    }

    /// A repeatable flag: each occurrence appends to the list.
    pub fn strings(&mut self, name: &str, usage: &str) -> Flag<Vec<String>> {
        self.define(name, Vec::new(), usage)
    }

    /// Merge in the flags of an ancestor. Local definitions win.
    pub fn inherit(&mut self, ancestor: &FlagSet) {
        for (name, def) in &ancestor.flags {
            if !self.flags.contains_key(name) {
                let mut def = def.clone();
                def.inherited = true;
                self.flags.insert(name.clone(), def);
            }
        }
    }

    pub fn lookup(&self, name: &str) -> Option<&FlagDef> {
        self.flags.get(name)
    }

    /// All flags, sorted by name.
    pub fn all(&self) -> impl Iterator<Item = &FlagDef> {
        self.flags.values()
    }

    /// Flags defined by this command itself, sorted by name.
    pub fn local(&self) -> impl Iterator<Item = &FlagDef> {
        self.flags.values().filter(|def| !def.inherited)
    }

    /// Parse leading flags and return the remaining positional arguments.
    ///
    /// Parsing stops at the first non-flag token, at a lone `-`, or after
    /// `--`. Both `-name` and `--name` spellings are accepted, with the value
    /// either attached (`-name=value`) or in the next argument.
    pub fn parse(&self, args: &[String], mode: ParseMode) -> Result<Vec<String>, FlagError> {
        let mut index = 0;
        while index < args.len() {
            let arg = &args[index];
            if arg.len() < 2 || !arg.starts_with('-') {
                break;
            }
            if arg == "--" {
                index += 1;
                break;
            }
            let body = arg
                .strip_prefix("--")
                .unwrap_or_else(|| &arg[1..]);
            if body.is_empty() || body.starts_with('-') || body.starts_with('=') {
                match mode {
                    ParseMode::Strict => return Err(FlagError::BadSyntax(arg.clone())),
                    ParseMode::Lenient => break,
                }
            }
            let (name, attached) = match body.split_once('=') {
                Some((name, value)) => (name, Some(value)),
                None => (body, None),
            };

            let Some(def) = self.flags.get(name) else {
                if name == "h" || name == "help" {
                    match mode {
                        ParseMode::Strict => return Err(FlagError::Help),
                        ParseMode::Lenient => {
                            index += 1;
                            continue;
                        }
                    }
                }
                match mode {
                    ParseMode::Strict => return Err(FlagError::Undefined(name.to_string())),
                    ParseMode::Lenient => break,
                }
            };

            let consumed;
            let raw = if def.value.is_bool() {
                consumed = 1;
                attached.unwrap_or("true").to_string()
            } else if let Some(value) = attached {
                consumed = 1;
                value.to_string()
            } else if let Some(next) = args.get(index + 1) {
                consumed = 2;
                next.clone()
            } else {
                match mode {
                    ParseMode::Strict => return Err(FlagError::MissingArgument(name.to_string())),
                    ParseMode::Lenient => break,
                }
            };

            if let Err(reason) = def.value.set(&raw) {
                match mode {
                    ParseMode::Strict => {
                        return Err(FlagError::InvalidValue {
                            name: name.to_string(),
                            value: raw,
                            reason,
                        })
                    }
                    ParseMode::Lenient => break,
                }
            }
            index += consumed;
        }
        Ok(args[index..].to_vec())
    }
}

impl FlagType for bool {
    const TYPE_NAME: &'static str = "";
    const IS_BOOL: bool = true;

    fn parse(raw: &str) -> Result<Self, String> {
        match raw {
            "1" | "t" | "T" | "true" | "TRUE" | "True" => Ok(true),
            "0" | "f" | "F" | "false" | "FALSE" | "False" => Ok(false),
            _ => Err("parse error".to_string()),
        }
    }

    fn render(&self) -> String {
        self.to_string()
    }
}

impl FlagType for String {
    const TYPE_NAME: &'static str = "string";

    fn parse(raw: &str) -> Result<Self, String> {
        Ok(raw.to_string())
    }

    fn render(&self) -> String {
        self.clone()
    }
}

impl FlagType for i64 {
    const TYPE_NAME: &'static str = "int";

    fn parse(raw: &str) -> Result<Self, String> {
        raw.parse().map_err(|_| "parse error".to_string())
    }

    fn render(&self) -> String {
        self.to_string()
    }
}

impl FlagType for Duration {
    const TYPE_NAME: &'static str = "duration";

    fn parse(raw: &str) -> Result<Self, String> {
        parse_duration(raw)
    }

    fn render(&self) -> String {
        format_duration(*self)
    }
}

impl FlagType for Vec<String> {
    const TYPE_NAME: &'static str = "value";

    fn parse(raw: &str) -> Result<Self, String> {
        Ok(vec![raw.to_string()])
    }

    fn render(&self) -> String {
        self.join(",")
    }

    fn apply(slot: &mut Self, raw: &str) -> Result<(), String> {
        slot.push(raw.to_string());
        Ok(())
    }
}

/// A byte count written with optional binary units (`64KiB`, `2M`, `1.5GB`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct ByteSize(pub u64);

const KIB: u64 = 1024;
const MIB: u64 = 1024 * KIB;
const GIB: u64 = 1024 * MIB;
const TIB: u64 = 1024 * GIB;

impl ByteSize {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ByteSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let n = self.0;
        for (unit, suffix) in [(TIB, "TiB"), (GIB, "GiB"), (MIB, "MiB"), (KIB, "KiB")] {
            if n >= unit && n % unit == 0 {
                return write!(f, "{}{}", n / unit, suffix);
            }
        }
        write!(f, "{n}B")
    }
}

impl FlagType for ByteSize {
    const TYPE_NAME: &'static str = "bytes";

    fn parse(raw: &str) -> Result<Self, String> {
        let raw = raw.trim();
        let split = raw
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(raw.len());
        let (number, unit) = raw.split_at(split);
        if number.is_empty() {
            return Err(format!("missing number in {raw:?}"));
        }
        let multiplier = match unit.trim().to_ascii_lowercase().as_str() {
            "" | "b" => 1,
            "k" | "kb" | "kib" => KIB,
            "m" | "mb" | "mib" => MIB,
            "g" | "gb" | "gib" => GIB,
            "t" | "tb" | "tib" => TIB,
            other => return Err(format!("unknown unit {other:?}")),
        };
        if let Ok(whole) = number.parse::<u64>() {
            return whole
                .checked_mul(multiplier)
                .map(ByteSize)
                .ok_or_else(|| "value out of range".to_string());
        }
        let value: f64 = number
            .parse()
            .map_err(|_| format!("invalid number {number:?}"))?;
        let bytes = value * multiplier as f64;
        if !bytes.is_finite() || bytes < 0.0 || bytes > u64::MAX as f64 {
            return Err("value out of range".to_string());
        }
        Ok(ByteSize(bytes.round() as u64))
    }

    fn render(&self) -> String {
        self.to_string()
    }
}

/// Parse a duration such as `300ms`, `1.5h` or `2h45m`.
pub fn parse_duration(raw: &str) -> Result<Duration, String> {
    if raw == "0" {
        return Ok(Duration::ZERO);
    }
    let invalid = || format!("invalid duration {raw:?}");
    if raw.is_empty() {
        return Err(invalid());
    }
    let mut rest = raw;
    let mut total: u128 = 0;
    while !rest.is_empty() {
        let digits = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        if digits == 0 {
            return Err(invalid());
        }
        let (whole, frac) = match rest[..digits].split_once('.') {
            Some((whole, frac)) => (whole, frac),
            None => (&rest[..digits], ""),
        };
        if (whole.is_empty() && frac.is_empty()) || frac.contains('.') {
            return Err(invalid());
        }
        rest = &rest[digits..];
        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let scale: u128 = match &rest[..unit_len] {
            "ns" => 1,
            "us" | "µs" | "μs" => 1_000,
            "ms" => 1_000_000,
            "s" => 1_000_000_000,
            "m" => 60_000_000_000,
            "h" => 3_600_000_000_000,
            "" => return Err(format!("missing unit in duration {raw:?}")),
            unit => return Err(format!("unknown unit {unit:?} in duration {raw:?}")),
        };
        rest = &rest[unit_len..];

        let whole: u128 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| invalid())?
        };
        let mut nanos = whole.checked_mul(scale).ok_or_else(invalid)?;
        // Digits beyond nanosecond precision are dropped.
        let frac = &frac[..frac.len().min(18)];
        if !frac.is_empty() {
            let numerator: u128 = frac.parse().map_err(|_| invalid())?;
            nanos += numerator * scale / 10u128.pow(frac.len() as u32);
        }
        total = total.checked_add(nanos).ok_or_else(invalid)?;
    }
    let secs = u64::try_from(total / 1_000_000_000).map_err(|_| invalid())?;
    Ok(Duration::new(secs, (total % 1_000_000_000) as u32))
}

/// Render a duration the way [`parse_duration`] reads it.
pub fn format_duration(d: Duration) -> String {
    let nanos = d.as_nanos();
    if nanos == 0 {
        return "0s".to_string();
    }
    if nanos < 1_000 {
        return format!("{nanos}ns");
    }
    if nanos < 1_000_000 {
        return format!("{}µs", fraction(nanos, 1_000));
    }
    if nanos < 1_000_000_000 {
        return format!("{}ms", fraction(nanos, 1_000_000));
    }
    let secs = d.as_secs();
    let (hours, minutes, seconds) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    let mut out = String::new();
    if hours > 0 {
        out.push_str(&format!("{hours}h"));
    }
    if hours > 0 || minutes > 0 {
        out.push_str(&format!("{minutes}m"));
    }
    let sub = u128::from(seconds) * 1_000_000_000 + u128::from(d.subsec_nanos());
    out.push_str(&format!("{}s", fraction(sub, 1_000_000_000)));
    out
}

fn fraction(value: u128, unit: u128) -> String {
    let whole = value / unit;
    let rem = value % unit;
    if rem == 0 {
        return whole.to_string();
    }
    let width = unit.to_string().len() - 1;
    let digits = format!("{rem:0width$}");
    format!("{whole}.{}", digits.trim_end_matches('0'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn parses_single_and_double_dash() {
        let mut fs = FlagSet::new("t");
        let name = fs.string("name", "", "a name");
        let quiet = fs.bool("q", false, "quiet");

        let rest = fs
            .parse(&args(&["--name", "x", "-q", "file"]), ParseMode::Strict)
            .unwrap();
        assert_eq!(rest, args(&["file"]));
        assert_eq!(name.get(), "x");
        assert!(quiet.get());

        fs.parse(&args(&["-name=y", "-q=false"]), ParseMode::Strict)
            .unwrap();
        assert_eq!(name.get(), "y");
        assert!(!quiet.get());
    }

    #[test]
    fn stops_at_lone_dash_and_double_dash() {
        let mut fs = FlagSet::new("t");
        fs.bool("q", false, "");
        assert_eq!(
            fs.parse(&args(&["-q", "-", "-q"]), ParseMode::Strict).unwrap(),
            args(&["-", "-q"])
        );
        assert_eq!(
            fs.parse(&args(&["--", "-q"]), ParseMode::Strict).unwrap(),
            args(&["-q"])
        );
    }

    #[test]
    fn strict_errors() {
        let mut fs = FlagSet::new("t");
        fs.string("s", "", "");
        fs.int("n", 0, "");

        let err = fs.parse(&args(&["-bogus"]), ParseMode::Strict).unwrap_err();
        assert_eq!(err.to_string(), "flag provided but not defined: -bogus");

        let err = fs.parse(&args(&["-s"]), ParseMode::Strict).unwrap_err();
        assert_eq!(err.to_string(), "flag needs an argument: -s");

        let err = fs.parse(&args(&["-n", "ten"]), ParseMode::Strict).unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid value \"ten\" for flag -n: parse error"
        );

        for help in ["-h", "-help", "--help"] {
            assert_eq!(
                fs.parse(&args(&[help]), ParseMode::Strict).unwrap_err(),
                FlagError::Help
            );
        }
    }

    #[test]
    fn lenient_stops_instead_of_failing() {
        let mut fs = FlagSet::new("t");
        fs.bool("q", false, "");
        let rest = fs
            .parse(&args(&["-q", "-h", "-bogus", "sub"]), ParseMode::Lenient)
            .unwrap();
        assert_eq!(rest, args(&["-bogus", "sub"]));
    }

    #[test]
    fn defined_help_flag_is_not_intercepted() {
        let mut fs = FlagSet::new("t");
        let h = fs.bool("h", false, "human readable");
        fs.parse(&args(&["-h"]), ParseMode::Strict).unwrap();
        assert!(h.get());
    }

    #[test]
    fn inherited_flags_share_storage_and_local_wins() {
        let mut parent = FlagSet::new("parent");
        let lake = parent.string("lake", "default", "");
        let parent_q = parent.bool("q", false, "");

        let mut child = FlagSet::new("child");
        let child_q = child.bool("q", false, "");
        child.inherit(&parent);

        child
            .parse(&args(&["-lake", "http://x", "-q"]), ParseMode::Strict)
            .unwrap();
        assert_eq!(lake.get(), "http://x");
        assert!(child_q.get());
        assert!(!parent_q.get());

        let local: Vec<_> = child.local().map(|d| d.name.clone()).collect();
        assert_eq!(local, vec!["q".to_string()]);
        assert!(child.lookup("lake").unwrap().inherited);
    }

    #[test]
    fn repeatable_flags_append() {
        let mut fs = FlagSet::new("t");
        let includes = fs.strings("I", "include");
        fs.parse(&args(&["-I", "a.zed", "-I", "b.zed"]), ParseMode::Strict)
            .unwrap();
        assert_eq!(includes.get(), args(&["a.zed", "b.zed"]));
    }

    #[test]
    fn zero_defaults_are_flagged() {
        let mut fs = FlagSet::new("t");
        fs.string("empty", "", "");
        fs.duration("wait", Duration::from_secs(5), "");
        assert!(fs.lookup("empty").unwrap().zero_default);
        let wait = fs.lookup("wait").unwrap();
        assert!(!wait.zero_default);
        assert_eq!(wait.default, "5s");
    }

    #[test]
    fn durations() {
        assert_eq!(parse_duration("5s").unwrap(), Duration::from_secs(5));
        assert_eq!(parse_duration("1m30s").unwrap(), Duration::from_secs(90));
        assert_eq!(parse_duration("250ms").unwrap(), Duration::from_millis(250));
        assert_eq!(parse_duration("1.5h").unwrap(), Duration::from_secs(5400));
        assert!(parse_duration("5").is_err());
        assert!(parse_duration("5x").is_err());
        assert!(parse_duration("-1s").is_err());

        assert_eq!(format_duration(Duration::from_secs(90)), "1m30s");
        assert_eq!(format_duration(Duration::from_millis(1500)), "1.5s");
        assert_eq!(format_duration(Duration::from_millis(250)), "250ms");
        assert_eq!(format_duration(Duration::from_secs(3600)), "1h0m0s");
    }

    #[test]
    fn byte_sizes() {
        assert_eq!(ByteSize::parse("512").unwrap(), ByteSize(512));
        assert_eq!(ByteSize::parse("64KiB").unwrap(), ByteSize(64 * 1024));
        assert_eq!(ByteSize::parse("2M").unwrap(), ByteSize(2 * MIB));
        assert_eq!(ByteSize::parse("1.5GB").unwrap(), ByteSize(3 * GIB / 2));
        assert!(ByteSize::parse("MB").is_err());
        assert!(ByteSize::parse("3 parsecs").is_err());

        assert_eq!(ByteSize(512 * KIB).to_string(), "512KiB");
        assert_eq!(ByteSize(1000).to_string(), "1000B");
    }

    proptest! {
        #[test]
        fn duration_render_parses_back(ms in 0u64..10_000_000) {
            let d = Duration::from_millis(ms);
            prop_assert_eq!(parse_duration(&format_duration(d)).unwrap(), d);
        }
    }
}
