//! runc-compatible argument normalization.
//!
//! Container managers (containerd's shims in particular) invoke the runtime
//! the way they would invoke `runc`, with global flags in front of the
//! command, flags this runtime has no use for, and a few alternative
//! spellings. [`normalize`] rewrites such an argv into the small canonical
//! form the `clap` parser in `bin/runproc.rs` understands:
//!
//! ```text
//! --root /run/x --log /l.json --log-format json create --bundle=/b --no-pivot c1
//!   → create --bundle /b c1            overrides { root: /run/x, log: /l.json, .. }
//!
//! kill -a SIGKILL c1   →  kill c1 SIGKILL
//! kill -9 c1           →  kill c1 9
//! delete --force c1    →  delete c1
//! ```
//!
//! Unknown flags are dropped. A separate token following an unknown flag is
//! taken as its value (and dropped too) unless it itself looks like a flag.

use std::path::PathBuf;

/// Global options pulled out of argv.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overrides {
    /// `--root`: state root.
    pub root: Option<PathBuf>,
    /// `--log`: diagnostic log path.
    pub log_path: Option<PathBuf>,
    /// `--log-format`: accepted, recorded, not acted on.
    pub log_format: Option<String>,
}

/// Result of [`normalize`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Normalized {
    /// Canonical arguments, without the program name.
    pub args: Vec<String>,
    /// Extracted global options.
    pub overrides: Overrides,
}

impl Normalized {
    /// Returns the command word, if any.
    pub fn command(&self) -> Option<&str> {
        self.args.first().map(String::as_str)
    }
}

/// Flags forwarded with their value.
const FORWARDED_VALUE_FLAGS: &[&str] = &["--bundle", "--pid-file", "--poll-interval-ms"];

/// Flags forwarded as-is for `clap` to handle.
const FORWARDED_SWITCHES: &[&str] = &["-h", "--help", "-V", "--version"];

/// runc switches that never take a value.
const IGNORED_SWITCHES: &[&str] = &[
    "--all",
    "-a",
    "--force",
    "-f",
    "--detach",
    "-d",
    "--systemd-cgroup",
    "--no-pivot",
    "--no-new-keyring",
    "--no-subreaper",
    "--debug",
];

/// Normalizes `args` (program name excluded).
pub fn normalize<I, S>(args: I) -> Normalized
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let args: Vec<String> = args.into_iter().map(Into::into).collect();
    let mut out = Vec::with_capacity(args.len());
    let mut overrides = Overrides::default();

    let mut i = 0;
    while i < args.len() {
        let arg = &args[i];
        i += 1;

        if arg == "--" {
            out.extend(args[i - 1..].iter().cloned());
            break;
        }
        if !arg.starts_with('-') || arg == "-" || is_numeric_flag(arg) {
            out.push(arg.clone());
            continue;
        }

        let (name, inline) = match arg.split_once('=') {
            Some((name, value)) => (name, Some(value.to_string())),
            None => (arg.as_str(), None),
        };
        let name = if name == "-b" { "--bundle" } else { name };

        // Value from `--flag=value`, or else the next token.
        let take_value = |i: &mut usize| -> String {
            inline.clone().unwrap_or_else(|| {
                let value = args.get(*i).cloned().unwrap_or_default();
                if *i < args.len() {
                    *i += 1;
                }
                value
            })
        };

        match name {
            "--root" => overrides.root = Some(PathBuf::from(take_value(&mut i))),
            "--log" => overrides.log_path = Some(PathBuf::from(take_value(&mut i))),
            "--log-format" => overrides.log_format = Some(take_value(&mut i)),
            _ if FORWARDED_VALUE_FLAGS.contains(&name) => {
                let value = take_value(&mut i);
                out.push(name.to_string());
                out.push(value);
            }
            _ if FORWARDED_SWITCHES.contains(&name) => out.push(arg.clone()),
            _ if IGNORED_SWITCHES.contains(&name) => {}
            _ => {
                if inline.is_none() && args.get(i).is_some_and(|next| !next.starts_with('-')) {
                    i += 1;
                }
            }
        }
    }

    if out.first().is_some_and(|cmd| cmd == "kill") {
        reorder_kill(&mut out);
    }

    Normalized {
        args: out,
        overrides,
    }
}

/// Rewrites `kill <signal> <id>` as `kill <id> <signal>` and strips the dash
/// from numeric signals.
fn reorder_kill(args: &mut Vec<String>) {
    if args.len() == 3 && looks_like_signal(&args[1]) && !looks_like_signal(&args[2]) {
        args.swap(1, 2);
    }
    for arg in args.iter_mut().skip(1) {
        if is_numeric_flag(arg) {
            arg.remove(0);
        }
    }
}

fn looks_like_signal(s: &str) -> bool {
    s.starts_with("SIG") || is_numeric_flag(s) || is_digits(s)
}

fn is_numeric_flag(s: &str) -> bool {
    s.strip_prefix('-').is_some_and(is_digits)
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}
