//! CLI argument definitions for the automation engine.
//!
//! Each subcommand maps onto one [`Operation`]; parsing stays here so the
//! binary only wires arguments to the engine.

use crate::engine::Operation;
use automation_common::OsTag;
use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};

/// Automate stub, artifact, and environment chores for template projects.
#[derive(Parser, Debug)]
#[command(name = "automation-cli")]
#[command(version, about)]
#[command(long_about = concat!(
    "Automate stub, artifact, and environment chores for template projects.\n\n",
    "Every subcommand runs against a project root holding pyproject.toml, ",
    "tox.ini, a source directory with one library package, and an envs ",
    "directory. Directory names can be overridden under ",
    "[tool.ataraxis-automation] in pyproject.toml.\n\n",
    "Exit status is 0 on success, 3 when some files failed while the rest ",
    "completed, and 1 when the operation could not run.",
))]
#[command(after_help = concat!(
    "EXAMPLES:\n",
    "  Generate stubs and place them next to the sources:\n",
    "    $ automation-cli stubs --generate\n\n",
    "  Move wheels for the host OS into dist/:\n",
    "    $ automation-cli move-artifacts\n\n",
    "  Export the host environment of the `demo` family:\n",
    "    $ automation-cli export-env --base-name demo\n\n",
    "  Show the resolved layout as JSON:\n",
    "    $ automation-cli layout --json",
))]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,

    /// Project root [default: current directory].
    #[arg(short = 'C', long, value_name = "DIR", global = true)]
    pub project_dir: Option<Utf8PathBuf>,

    /// Increase log verbosity (repeatable: -v, -vv, -vvv).
    #[arg(
        short,
        long = "verbose",
        action = clap::ArgAction::Count,
        global = true,
        conflicts_with = "quiet"
    )]
    pub verbosity: u8,

    /// Only report errors.
    #[arg(short, long, global = true, conflicts_with = "verbosity")]
    pub quiet: bool,
}

/// Available subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Place generated stubs into the library package.
    Stubs(StubsArgs),

    /// Delete every stub file from the library package.
    PurgeStubs,

    /// Keep `py.typed` only at the library root.
    ProcessTypedMarkers,

    /// Move wheels and source distributions into the dist directory.
    MoveArtifacts(MoveArtifactsArgs),

    /// Export an environment to `{base}_{os}.yml` and `{base}_{os}_spec.txt`.
    ExportEnv(ExportEnvArgs),

    /// Create or update an environment from its stored descriptor.
    ImportEnv(ImportEnvArgs),

    /// Rename a family of environment descriptors.
    RenameEnvs(RenameEnvsArgs),

    /// Recreate an empty recipe directory.
    RecipeFolder,

    /// Validate or store the PyPI upload token in `.pypirc`.
    PypiToken(PypiTokenArgs),

    /// Print the resolved project layout.
    Layout(LayoutArgs),
}

/// Arguments for `stubs`.
#[derive(Args, Debug, Clone, Default)]
pub struct StubsArgs {
    /// Run stubgen before placing stubs.
    #[arg(long)]
    pub generate: bool,
}

/// Arguments for `move-artifacts`.
#[derive(Args, Debug, Clone, Default)]
pub struct MoveArtifactsArgs {
    /// Build tree to search [default: configured build directory].
    #[arg(short, long, value_name = "DIR")]
    pub build_dir: Option<Utf8PathBuf>,

    /// OS tag to keep [default: host OS].
    #[arg(long, value_name = "TAG")]
    pub os_tag: Option<OsTag>,

    /// Keep wheels for every runtime version, not just those in tox.ini.
    #[arg(long)]
    pub all_versions: bool,
}

/// Arguments for `export-env`.
#[derive(Args, Debug, Clone)]
pub struct ExportEnvArgs {
    /// Environment base name; the environment exported is `{base}_{os}`.
    #[arg(short, long, value_name = "NAME")]
    pub base_name: String,

    /// OS tag to use [default: host OS].
    #[arg(long, value_name = "TAG")]
    pub os_tag: Option<OsTag>,
}

/// Arguments for `import-env`.
#[derive(Args, Debug, Clone, Default)]
pub struct ImportEnvArgs {
    /// Only consider `{base}_{os}.yml` [default: newest descriptor for the OS].
    #[arg(short, long, value_name = "NAME")]
    pub base_name: Option<String>,

    /// OS tag to use [default: host OS].
    #[arg(long, value_name = "TAG")]
    pub os_tag: Option<OsTag>,

    /// Report the descriptor that would be imported without running conda.
    #[arg(long)]
    pub resolve_only: bool,
}

/// Arguments for `rename-envs`.
#[derive(Args, Debug, Clone)]
pub struct RenameEnvsArgs {
    /// Current base name.
    #[arg(long, value_name = "NAME")]
    pub old_base: String,

    /// Replacement base name.
    #[arg(long, value_name = "NAME")]
    pub new_base: String,
}

/// Arguments for `pypi-token`.
#[derive(Args, Debug, Clone, Default)]
pub struct PypiTokenArgs {
    /// Token to store when no valid one exists.
    #[arg(long, value_name = "TOKEN")]
    pub token: Option<String>,

    /// Store `--token` even if a valid token exists.
    #[arg(long, requires = "token")]
    pub replace: bool,
}

/// Arguments for `layout`.
#[derive(Args, Debug, Clone, Default)]
pub struct LayoutArgs {
    /// Print JSON to stdout instead of text.
    #[arg(long)]
    pub json: bool,
}

impl Command {
    /// Returns the engine operation for this subcommand.
    #[must_use]
    pub fn operation(&self) -> Operation {
        match self {
            Self::Stubs(args) => Operation::Stubs {
                generate: args.generate,
            },
            Self::PurgeStubs => Operation::PurgeStubs,
            Self::ProcessTypedMarkers => Operation::ProcessTypedMarkers,
            Self::MoveArtifacts(args) => Operation::MoveArtifacts {
                build_dir: args.build_dir.clone(),
                os_tag: args.os_tag.clone(),
                all_versions: args.all_versions,
            },
            Self::ExportEnv(args) => Operation::ExportEnv {
                base_name: args.base_name.clone(),
                os_tag: args.os_tag.clone(),
            },
            Self::ImportEnv(args) => Operation::ImportEnv {
                base_name: args.base_name.clone(),
                os_tag: args.os_tag.clone(),
                resolve_only: args.resolve_only,
            },
            Self::RenameEnvs(args) => Operation::RenameEnvs {
                old_base: args.old_base.clone(),
                new_base: args.new_base.clone(),
            },
            Self::RecipeFolder => Operation::RecipeFolder,
            Self::PypiToken(args) => Operation::PypiToken {
                token: args.token.clone(),
                replace: args.replace,
            },
            Self::Layout(_) => Operation::Layout,
        }
    }

    /// Returns `true` when the layout should be printed as JSON.
    #[must_use]
    pub const fn wants_json(&self) -> bool {
        matches!(self, Self::Layout(LayoutArgs { json: true }))
    }
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;
