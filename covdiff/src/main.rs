//! # covdiff
//!
//! A CLI for incremental coverage, built on covdifflib.
//!
//! ## Overview
//!
//! covdiff merges coverage profiles recorded on different commits and
//! reports, per label, how much of the code base and how much of the code
//! changed between two revisions is covered.
//!
//! ## Usage
//!
//! ```bash
//! # Line mapping between two versions of a file
//! covdiff diff old.go new.go
//!
//! # Parse and re-format a profile, clamping set-mode counts
//! covdiff profile cover.out --normalize
//!
//! # Carry counters recorded on an older commit over to HEAD
//! covdiff merge --old old.out --new new.out --repo . --from HEAD~3 --to HEAD -o merged.out
//!
//! # Coverage of the changes since main
//! covdiff summary --profile merged.out --from main --to HEAD --uncovered
//! ```

mod render;

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::process::ExitCode;

use anyhow::{bail, Context};
use clap::{Arg, ArgAction, ArgMatches, Command};
use covdifflib::annotation::{load, ChangeDetail};
use covdifflib::compute::LabelOptions;
use covdifflib::diff::{range_mapping, split_lines, ExternalDiffConfig};
use covdifflib::merge::MemorySources;
use covdifflib::source::{discover_files, resolve};
use covdifflib::{
    annotate_with, summarize, AnnotateOptions, CounterProfile, DiffBackend, ExternalDiffClient,
    FileChange, FileInput, FilterConfig, GitSources, MergeOptions, Merger, MyersBackend, Profile,
    SourceProvider, SummaryOptions, SyntaxFile,
};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

fn output_arg() -> Arg {
    Arg::new("output")
        .short('o')
        .long("output")
        .value_parser(["table", "json"])
        .default_value("table")
        .help("Output format")
}

fn strip_prefix_arg() -> Arg {
    Arg::new("strip-prefix")
        .long("strip-prefix")
        .help("Prefix removed from profile file names, such as the module path")
}

/// Build the clap Command structure
fn build_command() -> Command {
    Command::new("covdiff")
        .version(env!("CARGO_PKG_VERSION"))
        .author("Arthur Debert")
        .about("Incremental coverage: merge profiles across commits and summarize changed code")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::Count)
                .global(true)
                .help("Log more (-v info, -vv debug)"),
        )
        .arg(
            Arg::new("diff-cmd")
                .long("diff-cmd")
                .global(true)
                .help("External line diff program to use instead of the built-in one"),
        )
        .subcommand(
            Command::new("diff")
                .about("Show the line mapping between two versions of a file")
                .arg(Arg::new("old").required(true).help("Old version"))
                .arg(Arg::new("new").required(true).help("New version"))
                .arg(output_arg()),
        )
        .subcommand(
            Command::new("profile")
                .about("Parse and re-format a coverage profile")
                .arg(Arg::new("file").required(true).help("Profile to read"))
                .arg(
                    Arg::new("normalize")
                        .long("normalize")
                        .action(ArgAction::SetTrue)
                        .help("Clamp set-mode counts to 0/1"),
                ),
        )
        .subcommand(
            Command::new("merge")
                .about("Add counters recorded on an older commit into a newer profile")
                .arg(
                    Arg::new("old")
                        .long("old")
                        .required(true)
                        .help("Profile recorded on the older commit"),
                )
                .arg(
                    Arg::new("new")
                        .long("new")
                        .required(true)
                        .help("Profile recorded on the newer commit"),
                )
                .arg(Arg::new("repo").long("repo").help("Path to repository"))
                .arg(Arg::new("from").long("from").help("Commit of the old profile"))
                .arg(Arg::new("to").long("to").help("Commit of the new profile"))
                .arg(strip_prefix_arg())
                .arg(
                    Arg::new("require-old")
                        .long("require-old")
                        .action(ArgAction::SetTrue)
                        .help("Fail when a file that is not new has no old counters"),
                )
                .arg(
                    Arg::new("out")
                        .short('o')
                        .long("out")
                        .help("Write the merged profile here instead of stdout"),
                ),
        )
        .subcommand(
            Command::new("summary")
                .about("Summarize total and incremental coverage per label")
                .arg(
                    Arg::new("profile")
                        .short('p')
                        .long("profile")
                        .required(true)
                        .help("Coverage profile"),
                )
                .arg(
                    Arg::new("repo")
                        .long("repo")
                        .default_value(".")
                        .help("Path to repository"),
                )
                .arg(Arg::new("from").long("from").help("Base commit"))
                .arg(Arg::new("to").long("to").help("Target commit"))
                .arg(strip_prefix_arg())
                .arg(
                    Arg::new("labels")
                        .long("labels")
                        .help("JSON file with per-label options"),
                )
                .arg(
                    Arg::new("trees")
                        .long("trees")
                        .help("Directory of syntax trees, one <path>.json per source file"),
                )
                .arg(
                    Arg::new("uncovered")
                        .long("uncovered")
                        .action(ArgAction::SetTrue)
                        .help("List uncovered changed lines"),
                )
                .arg(
                    Arg::new("no-func")
                        .long("no-func")
                        .action(ArgAction::SetTrue)
                        .help("Skip function coverage"),
                )
                .arg(
                    Arg::new("include")
                        .short('i')
                        .long("include")
                        .action(ArgAction::Append)
                        .help("Include files matching glob pattern"),
                )
                .arg(
                    Arg::new("exclude")
                        .short('e')
                        .long("exclude")
                        .action(ArgAction::Append)
                        .help("Exclude files matching glob pattern"),
                )
                .arg(
                    Arg::new("jobs")
                        .short('j')
                        .long("jobs")
                        .value_parser(clap::value_parser!(usize))
                        .default_value("0")
                        .help("Worker threads (0 for one per core)"),
                )
                .arg(output_arg()),
        )
}

fn init_tracing(verbosity: u8) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| match verbosity {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        _ => EnvFilter::new("debug"),
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Build filter config from matches
fn build_filter(matches: &ArgMatches) -> anyhow::Result<FilterConfig> {
    let mut filter = FilterConfig::new();

    if let Some(includes) = matches.get_many::<String>("include") {
        for pattern in includes {
            filter = filter.include(pattern)?;
        }
    }

    if let Some(excludes) = matches.get_many::<String>("exclude") {
        for pattern in excludes {
            filter = filter.exclude(pattern)?;
        }
    }

    Ok(filter)
}

fn build_backend(matches: &ArgMatches) -> anyhow::Result<Box<dyn DiffBackend>> {
    match matches.get_one::<String>("diff-cmd") {
        Some(program) => {
            let client = ExternalDiffClient::spawn(&ExternalDiffConfig::new(program))
                .with_context(|| format!("Failed to start diff program '{}'", program))?;
            Ok(Box::new(client))
        }
        None => Ok(Box::new(MyersBackend)),
    }
}

fn is_json(matches: &ArgMatches) -> bool {
    matches.get_one::<String>("output").map(String::as_str) == Some("json")
}

fn read_text(path: &str) -> anyhow::Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read '{}'", path))
}

/// `--strip-prefix` with a trailing slash, empty when absent
fn prefix_of(matches: &ArgMatches) -> String {
    match matches.get_one::<String>("strip-prefix") {
        Some(p) if !p.is_empty() && !p.ends_with('/') => format!("{}/", p),
        Some(p) => p.clone(),
        None => String::new(),
    }
}

/// Both or neither of `--from` and `--to`
fn revisions(matches: &ArgMatches) -> anyhow::Result<Option<(String, String)>> {
    match (
        matches.get_one::<String>("from"),
        matches.get_one::<String>("to"),
    ) {
        (Some(from), Some(to)) => Ok(Some((from.clone(), to.clone()))),
        (None, None) => Ok(None),
        _ => bail!("--from and --to must be given together"),
    }
}

/// Handler for diff command
fn diff_handler(matches: &ArgMatches, backend: &dyn DiffBackend) -> anyhow::Result<()> {
    let old = read_text(required(matches, "old")?)?;
    let new = read_text(required(matches, "new")?)?;
    let ranges = range_mapping(backend, &split_lines(&old), &split_lines(&new))?;

    if is_json(matches) {
        println!("{}", serde_json::to_string_pretty(&ranges)?);
    } else {
        print!("{}", render::render_ranges(&ranges));
    }
    Ok(())
}

/// Handler for profile command
fn profile_handler(matches: &ArgMatches) -> anyhow::Result<()> {
    let profile = Profile::read(required(matches, "file")?)?;
    print!("{}", profile.format(matches.get_flag("normalize")));
    Ok(())
}

/// Repository paths seen through profile paths
struct PrefixedSources<'a> {
    inner: &'a GitSources,
    prefix: &'a str,
}

impl PrefixedSources<'_> {
    fn repo_path<'p>(&self, path: &'p str) -> &'p str {
        path.strip_prefix(self.prefix).unwrap_or(path)
    }
}

impl SourceProvider for PrefixedSources<'_> {
    fn old_source(&self, path: &str) -> covdifflib::Result<Option<String>> {
        self.inner.old_source(self.repo_path(path))
    }

    fn new_source(&self, path: &str) -> covdifflib::Result<Option<String>> {
        self.inner.new_source(self.repo_path(path))
    }
}

/// Files the repository diff does not know about are treated as unchanged
fn file_change(details: &BTreeMap<String, ChangeDetail>, prefix: &str, path: &str) -> FileChange {
    let repo_path = path.strip_prefix(prefix).unwrap_or(path);
    match details.get(repo_path) {
        None => FileChange::unchanged(),
        Some(d) if d.is_new => FileChange::new_file(),
        Some(d) => match &d.renamed_from {
            Some(from) => FileChange::renamed(format!("{}{}", prefix, from), d.content_changed),
            None if d.content_changed => FileChange::modified(),
            None => FileChange::unchanged(),
        },
    }
}

/// Handler for merge command
fn merge_handler(matches: &ArgMatches, backend: &dyn DiffBackend) -> anyhow::Result<()> {
    let old = CounterProfile::from_profile(&Profile::read(required(matches, "old")?)?);
    let new = CounterProfile::from_profile(&Profile::read(required(matches, "new")?)?);
    let options = MergeOptions::new().require_old_files(matches.get_flag("require-old"));
    let prefix = prefix_of(matches);

    let merged = match revisions(matches)? {
        Some((from, to)) => {
            let repo = matches
                .get_one::<String>("repo")
                .map(String::as_str)
                .unwrap_or(".");
            let git = GitSources::open(repo, &from, &to)?;
            let details = git.change_details();
            let sources = PrefixedSources {
                inner: &git,
                prefix: &prefix,
            };
            Merger::new(backend, &sources, options)
                .merge(&old, &new, |path| Ok(file_change(details, &prefix, path)))?
        }
        None => {
            debug!("no revisions given, treating every file as unchanged");
            let sources = MemorySources::new();
            Merger::new(backend, &sources, options)
                .merge(&old, &new, |_| Ok(FileChange::unchanged()))?
        }
    };

    let profile = merged.into_profile();
    match matches.get_one::<String>("out") {
        Some(out) => {
            profile.write(out, true)?;
            info!(out = %out, blocks = profile.blocks.len(), "wrote merged profile");
        }
        None => print!("{}", profile.format(true)),
    }
    Ok(())
}

fn load_labels(matches: &ArgMatches) -> anyhow::Result<LabelOptions> {
    match matches.get_one::<String>("labels") {
        Some(path) => {
            let text = read_text(path)?;
            serde_json::from_str(&text)
                .with_context(|| format!("Invalid label options in '{}'", path))
        }
        None => Ok(LabelOptions::new()),
    }
}

/// Attach `<trees>/<path>.json` when it exists
fn with_tree(input: FileInput, trees: Option<&String>) -> anyhow::Result<FileInput> {
    let Some(dir) = trees else {
        return Ok(input);
    };
    let path = Path::new(dir).join(format!("{}.json", input.path));
    if !path.exists() {
        return Ok(input);
    }
    let text = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read '{}'", path.display()))?;
    let tree: SyntaxFile = serde_json::from_str(&text)
        .with_context(|| format!("Invalid syntax tree in '{}'", path.display()))?;
    Ok(input.tree(tree))
}

/// Files of the profile, read at the `to` revision with their change detail
fn git_inputs(
    repo: &str,
    from: &str,
    to: &str,
    files: &BTreeSet<String>,
    trees: Option<&String>,
) -> anyhow::Result<Vec<FileInput>> {
    let git = GitSources::open(repo, from, to)?;
    let mut inputs = Vec::new();
    for (path, detail) in git.change_details() {
        if detail.deleted || !files.contains(path) {
            continue;
        }
        let Some(content) = git.new_source(path)? else {
            continue;
        };
        let mut input = FileInput::new(path.as_str(), content).change(detail.clone());
        if detail.content_changed && !detail.is_new {
            let old_path = detail.renamed_from.as_deref().unwrap_or(path);
            if let Some(old) = git.old_source(old_path)? {
                input = input.old_content(old);
            }
        }
        inputs.push(with_tree(input, trees)?);
    }
    Ok(inputs)
}

/// Files of the profile, read from the working tree
fn workdir_inputs(
    root: &str,
    filter: &FilterConfig,
    files: &BTreeSet<String>,
    trees: Option<&String>,
) -> anyhow::Result<Vec<FileInput>> {
    let root = Path::new(root);
    let mut inputs = Vec::new();
    for path in discover_files(root, filter)? {
        if !files.contains(&path) {
            continue;
        }
        let full = resolve(root, &path);
        let content = std::fs::read_to_string(&full)
            .with_context(|| format!("Failed to read '{}'", full.display()))?;
        inputs.push(with_tree(FileInput::new(path, content), trees)?);
    }
    Ok(inputs)
}

/// Handler for summary command
fn summary_handler(matches: &ArgMatches, backend: &dyn DiffBackend) -> anyhow::Result<()> {
    let profile = Profile::read(required(matches, "profile")?)?;
    let prefix = prefix_of(matches);
    let filter = build_filter(matches)?;
    let repo = required(matches, "repo")?;
    let trees = matches.get_one::<String>("trees");

    let load_options = load::ProfileLoadOptions::new().strip_prefix(prefix.as_str());
    let mut exec = load::from_profile(&profile, &load_options);
    exec.files.retain(|path, _| filter.matches(path));
    let files: BTreeSet<String> = exec.files.keys().cloned().collect();

    let inputs = match revisions(matches)? {
        Some((from, to)) => git_inputs(repo, &from, &to, &files, trees)?,
        None => workdir_inputs(repo, &filter, &files, trees)?,
    };
    info!(files = inputs.len(), "annotating");

    let options = AnnotateOptions::new()
        .threads(*matches.get_one::<usize>("jobs").unwrap_or(&0))
        .tree_blocks(false);
    let mut project = annotate_with(inputs, vec![exec], &options, backend)?;

    let summary_options = SummaryOptions::new()
        .labels(load_labels(matches)?)
        .disable_func(matches.get_flag("no-func"))
        .need_uncovered_list(matches.get_flag("uncovered"));
    let summaries = summarize(&mut project, &summary_options)?;

    if is_json(matches) {
        println!("{}", serde_json::to_string_pretty(&summaries)?);
    } else {
        print!(
            "{}",
            render::render_summary(&summaries, matches.get_flag("uncovered"))
        );
    }
    Ok(())
}

fn required<'a>(matches: &'a ArgMatches, name: &str) -> anyhow::Result<&'a str> {
    matches
        .get_one::<String>(name)
        .map(String::as_str)
        .with_context(|| format!("missing argument '{}'", name))
}

fn run(matches: &ArgMatches) -> anyhow::Result<()> {
    let Some((name, sub)) = matches.subcommand() else {
        bail!("no command given");
    };
    match name {
        "profile" => profile_handler(sub),
        _ => {
            let backend = build_backend(sub)?;
            match name {
                "diff" => diff_handler(sub, backend.as_ref()),
                "merge" => merge_handler(sub, backend.as_ref()),
                "summary" => summary_handler(sub, backend.as_ref()),
                other => bail!("unknown command '{}'", other),
            }
        }
    }
}

fn main() -> ExitCode {
    let matches = build_command().get_matches();
    let verbosity = matches
        .subcommand()
        .map(|(_, sub)| sub.get_count("verbose"))
        .unwrap_or_else(|| matches.get_count("verbose"));
    init_tracing(verbosity);

    match run(&matches) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
