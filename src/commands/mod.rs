//! Built-in shell commands.
//!
//! Commands live in a static table mapping a name to its metadata and an
//! async handler. Handlers receive the full argument vector (command name
//! first) and parse their own flags with clap.

mod cat;
mod cd;
mod fileops;
mod local;
pub(crate) mod ls;
mod transfer;
mod words;

use parking_lot::Mutex;
use std::future::Future;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;

use crate::error::ShellError;
use crate::output::SharedSink;
use crate::session::{SessionMap, SessionRegistry};
use crate::target::TargetSet;

pub use words::split_words;

/// Future returned by command handlers.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + 'a>>;

pub type CommandResult = Result<CommandOutcome, ShellError>;

type Handler = for<'a> fn(&'a ShellContext, Vec<String>) -> BoxFuture<'a, CommandResult>;

/// What the interactive loop should do after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    Continue,
    Exit,
}

/// Completion class of one positional argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgKind {
    /// `[hosts:]path` on the remote side.
    Remote,
    /// Remote path on the hosts chosen by the previous operand.
    RemotePinned,
    Local,
    RemoteOrLocal,
    /// Three-digit octal mode.
    Mode,
    None,
}

/// Static metadata plus handler for one built-in.
#[derive(Clone, Copy)]
pub struct CommandSpec {
    pub name: &'static str,
    pub description: &'static str,
    /// Completion kind per positional argument; the last one repeats.
    pub args: &'static [ArgKind],
    /// Short flags offered by completion.
    pub flags: &'static [(&'static str, &'static str)],
    handler: Handler,
}

impl CommandSpec {
    /// Completion kind for the positional argument at `index`.
    pub fn arg_kind(&self, index: usize) -> ArgKind {
        match self.args {
            [] => ArgKind::None,
            kinds => kinds[index.min(kinds.len() - 1)],
        }
    }
}

impl std::fmt::Debug for CommandSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandSpec")
            .field("name", &self.name)
            .finish()
    }
}

macro_rules! boxed_handler {
    ($name:ident => $target:path) => {
        fn $name(ctx: &ShellContext, args: Vec<String>) -> BoxFuture<'_, CommandResult> {
            Box::pin($target(ctx, args))
        }
    };
}

boxed_handler!(ls_handler => ls::run);
boxed_handler!(cat_handler => cat::run);
boxed_handler!(cd_handler => cd::run_cd);
boxed_handler!(pwd_handler => cd::run_pwd);
boxed_handler!(mkdir_handler => fileops::run_mkdir);
boxed_handler!(rmdir_handler => fileops::run_rmdir);
boxed_handler!(rm_handler => fileops::run_rm);
boxed_handler!(rename_handler => fileops::run_rename);
boxed_handler!(ln_handler => fileops::run_ln);
boxed_handler!(symlink_handler => fileops::run_symlink);
boxed_handler!(chmod_handler => fileops::run_chmod);
boxed_handler!(chown_handler => fileops::run_chown);
boxed_handler!(chgrp_handler => fileops::run_chgrp);
boxed_handler!(df_handler => fileops::run_df);
boxed_handler!(get_handler => transfer::run_get);
boxed_handler!(put_handler => transfer::run_put);
boxed_handler!(lcat_handler => local::run_lcat);
boxed_handler!(lcd_handler => local::run_lcd);
boxed_handler!(lls_handler => local::run_lls);
boxed_handler!(lmkdir_handler => local::run_lmkdir);
boxed_handler!(lpwd_handler => local::run_lpwd);
boxed_handler!(lumask_handler => local::run_lumask);
boxed_handler!(help_handler => run_help);
boxed_handler!(bye_handler => run_bye);

const LS_FLAGS: &[(&str, &str)] = &[
    ("-1", "one entry per line"),
    ("-a", "show hidden entries"),
    ("-f", "do not sort"),
    ("-h", "human-readable sizes"),
    ("-l", "long listing"),
    ("-n", "numeric user and group ids"),
    ("-r", "reverse sort order"),
    ("-S", "sort by size"),
    ("-t", "sort by modification time"),
];

const MKDIR_FLAGS: &[(&str, &str)] = &[("-p", "create parent directories")];

/// Every built-in, in help order.
pub static COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        name: "bye",
        description: "Quit msftp",
        args: &[],
        flags: &[],
        handler: bye_handler,
    },
    CommandSpec {
        name: "cat",
        description: "Print remote file contents",
        args: &[ArgKind::Remote],
        flags: &[],
        handler: cat_handler,
    },
    CommandSpec {
        name: "cd",
        description: "Change remote directory",
        args: &[ArgKind::Remote],
        flags: &[],
        handler: cd_handler,
    },
    CommandSpec {
        name: "chgrp",
        description: "Change group of remote files",
        args: &[ArgKind::None, ArgKind::Remote],
        flags: &[],
        handler: chgrp_handler,
    },
    CommandSpec {
        name: "chmod",
        description: "Change permissions of remote files",
        args: &[ArgKind::Mode, ArgKind::Remote],
        flags: &[],
        handler: chmod_handler,
    },
    CommandSpec {
        name: "chown",
        description: "Change owner of remote files",
        args: &[ArgKind::None, ArgKind::Remote],
        flags: &[],
        handler: chown_handler,
    },
    CommandSpec {
        name: "df",
        description: "Show remote filesystem usage",
        args: &[ArgKind::Remote],
        flags: &[("-h", "human-readable sizes"), ("-i", "inode usage")],
        handler: df_handler,
    },
    CommandSpec {
        name: "exit",
        description: "Quit msftp",
        args: &[],
        flags: &[],
        handler: bye_handler,
    },
    CommandSpec {
        name: "get",
        description: "Download remote files to a local directory",
        args: &[ArgKind::Remote, ArgKind::RemoteOrLocal],
        flags: &[],
        handler: get_handler,
    },
    CommandSpec {
        name: "help",
        description: "Show this command list",
        args: &[],
        flags: &[],
        handler: help_handler,
    },
    CommandSpec {
        name: "lcat",
        description: "Print local file contents",
        args: &[ArgKind::Local],
        flags: &[],
        handler: lcat_handler,
    },
    CommandSpec {
        name: "lcd",
        description: "Change local directory",
        args: &[ArgKind::Local],
        flags: &[],
        handler: lcd_handler,
    },
    CommandSpec {
        name: "lls",
        description: "List local directory contents",
        args: &[ArgKind::Local],
        flags: LS_FLAGS,
        handler: lls_handler,
    },
    CommandSpec {
        name: "lmkdir",
        description: "Create local directories",
        args: &[ArgKind::Local],
        flags: MKDIR_FLAGS,
        handler: lmkdir_handler,
    },
    CommandSpec {
        name: "ln",
        description: "Link remote files (-s for symbolic)",
        args: &[ArgKind::Remote, ArgKind::RemotePinned],
        flags: &[("-s", "symbolic link")],
        handler: ln_handler,
    },
    CommandSpec {
        name: "lpwd",
        description: "Print local directory",
        args: &[],
        flags: &[],
        handler: lpwd_handler,
    },
    CommandSpec {
        name: "ls",
        description: "List remote directory contents",
        args: &[ArgKind::Remote],
        flags: LS_FLAGS,
        handler: ls_handler,
    },
    CommandSpec {
        name: "lumask",
        description: "Print or set local umask",
        args: &[ArgKind::Mode],
        flags: &[],
        handler: lumask_handler,
    },
    CommandSpec {
        name: "mkdir",
        description: "Create remote directories",
        args: &[ArgKind::Remote],
        flags: MKDIR_FLAGS,
        handler: mkdir_handler,
    },
    CommandSpec {
        name: "put",
        description: "Upload local files to a remote directory",
        args: &[ArgKind::Local, ArgKind::RemoteOrLocal],
        flags: &[],
        handler: put_handler,
    },
    CommandSpec {
        name: "pwd",
        description: "Print remote directory",
        args: &[],
        flags: &[],
        handler: pwd_handler,
    },
    CommandSpec {
        name: "quit",
        description: "Quit msftp",
        args: &[],
        flags: &[],
        handler: bye_handler,
    },
    CommandSpec {
        name: "rename",
        description: "Rename a remote file",
        args: &[ArgKind::Remote, ArgKind::RemotePinned],
        flags: &[],
        handler: rename_handler,
    },
    CommandSpec {
        name: "rm",
        description: "Remove remote files",
        args: &[ArgKind::Remote],
        flags: &[],
        handler: rm_handler,
    },
    CommandSpec {
        name: "rmdir",
        description: "Remove empty remote directories",
        args: &[ArgKind::Remote],
        flags: &[],
        handler: rmdir_handler,
    },
    CommandSpec {
        name: "symlink",
        description: "Create a remote symbolic link",
        args: &[ArgKind::Remote, ArgKind::RemotePinned],
        flags: &[],
        handler: symlink_handler,
    },
    CommandSpec {
        name: "?",
        description: "Show this command list",
        args: &[],
        flags: &[],
        handler: help_handler,
    },
];

pub fn lookup(name: &str) -> Option<&'static CommandSpec> {
    COMMANDS.iter().find(|spec| spec.name == name)
}

/// Local-side state mutated by `lcd` and `lumask`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalState {
    pub cwd: PathBuf,
    pub umask: u32,
}

/// Everything a command handler may touch.
pub struct ShellContext {
    registry: Arc<SessionRegistry>,
    stdout: SharedSink,
    stderr: SharedSink,
    local: Mutex<LocalState>,
    width: Option<usize>,
}

impl ShellContext {
    pub fn new(
        registry: Arc<SessionRegistry>,
        stdout: SharedSink,
        stderr: SharedSink,
        local: LocalState,
    ) -> Self {
        Self {
            registry,
            stdout,
            stderr,
            local: Mutex::new(local),
            width: None,
        }
    }

    /// Pin the column width used for multi-column listings.
    pub fn with_width(mut self, width: usize) -> Self {
        self.width = Some(width);
        self
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    pub fn snapshot(&self) -> Arc<SessionMap> {
        self.registry.snapshot()
    }

    pub fn out_line(&self, text: &str) {
        let mut sink = self.stdout.lock();
        let _ = writeln!(sink, "{text}");
        let _ = sink.flush();
    }

    pub fn out_bytes(&self, data: &[u8]) {
        let mut sink = self.stdout.lock();
        let _ = sink.write_all(data);
        let _ = sink.flush();
    }

    pub fn err_line(&self, text: &str) {
        let mut sink = self.stderr.lock();
        let _ = writeln!(sink, "{text}");
        let _ = sink.flush();
    }

    pub fn report(&self, errors: &[ShellError]) {
        for err in errors {
            self.err_line(&format!("Error: {err}"));
        }
    }

    /// Resolve operands against the current pool, reporting unknown hosts.
    pub fn resolve(&self, operands: &[String]) -> TargetSet {
        let (set, errors) = TargetSet::resolve(&self.snapshot(), operands);
        self.report(&errors);
        set
    }

    pub fn local(&self) -> LocalState {
        self.local.lock().clone()
    }

    pub fn set_local_cwd(&self, cwd: PathBuf) {
        self.local.lock().cwd = cwd;
    }

    pub fn set_umask(&self, umask: u32) {
        self.local.lock().umask = umask;
    }

    /// Expand `~` and resolve relative paths against the local directory.
    pub fn local_path(&self, raw: &str) -> PathBuf {
        let expanded = expand_home(raw);
        if expanded.is_absolute() {
            expanded
        } else {
            self.local.lock().cwd.join(expanded)
        }
    }

    pub fn term_width(&self) -> usize {
        self.width.unwrap_or_else(|| {
            crossterm::terminal::size()
                .map(|(cols, _)| cols as usize)
                .unwrap_or(80)
        })
    }
}

/// Replace a leading `~` with the local home directory.
pub fn expand_home(raw: &str) -> PathBuf {
    let home = dirs::home_dir();
    match (raw, home) {
        ("~", Some(home)) => home,
        (rest, Some(home)) if rest.starts_with("~/") => home.join(&rest[2..]),
        (other, _) => Path::new(other).to_path_buf(),
    }
}

/// Parse a command's flags with clap, mapping failures to usage errors.
pub(crate) fn parse_flags<P: clap::Parser>(args: &[String]) -> Result<P, ShellError> {
    P::try_parse_from(args).map_err(|e| ShellError::Usage(e.to_string().trim_end().to_string()))
}

/// Split one line and run the named command.
pub async fn execute_line(ctx: &ShellContext, line: &str) -> CommandResult {
    let words = split_words(line)?;
    let Some(name) = words.first() else {
        return Ok(CommandOutcome::Continue);
    };
    match lookup(name) {
        Some(spec) => {
            tracing::debug!(command = spec.name, "execute");
            (spec.handler)(ctx, words).await
        }
        None => {
            ctx.err_line(&format!("Command not found: {name}"));
            Ok(CommandOutcome::Continue)
        }
    }
}

async fn run_help(ctx: &ShellContext, _args: Vec<String>) -> CommandResult {
    let width = COMMANDS.iter().map(|c| c.name.len()).max().unwrap_or(0);
    for spec in COMMANDS {
        ctx.out_line(&format!("{:<width$}  {}", spec.name, spec.description));
    }
    Ok(CommandOutcome::Continue)
}

async fn run_bye(_ctx: &ShellContext, _args: Vec<String>) -> CommandResult {
    Ok(CommandOutcome::Exit)
}

#[cfg(test)]
pub(crate) mod test_util {
    use super::*;
    use crate::testsupport::{capture_sink, mock_registry, CaptureBuffer, MockFs};

    /// Context over mock hosts with captured stdout/stderr.
    pub struct Harness {
        pub ctx: ShellContext,
        pub out: CaptureBuffer,
        pub err: CaptureBuffer,
    }

    impl Harness {
        pub fn new(hosts: &[(&str, Arc<MockFs>)]) -> Self {
            let (stdout, out) = capture_sink();
            let (stderr, err) = capture_sink();
            let registry = Arc::new(mock_registry(hosts, &stdout));
            let local = LocalState {
                cwd: std::env::temp_dir(),
                umask: 0o022,
            };
            let ctx = ShellContext::new(registry, stdout, stderr, local).with_width(40);
            Self { ctx, out, err }
        }

        pub async fn run(&self, line: &str) -> CommandResult {
            execute_line(&self.ctx, line).await
        }
    }
}
