//! Batch front end for the texdown engine: canonicalize markup files, list
//! the magic-block markers they contain, and check them against a template's
//! command catalog.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use texdown_config::Config;
use texdown_engine::{
    CommandCatalog, Document, MarkerToken, Node, Pairing, TemplateMeta, normalize, parse_token,
    serialize,
};

#[derive(Parser)]
#[command(name = "texdown", version, about = "texdown markup tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Canonicalize a markup file (whitespace, blank-line runs, NBSP)
    Normalize {
        /// Input markup file
        input: PathBuf,
        /// Write here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// List the magic-block markers in a markup file
    Markers {
        /// Input markup file
        input: PathBuf,
        /// Emit JSON instead of a human-readable table
        #[arg(long)]
        json: bool,
    },
    /// Check a markup file against a template's command catalog
    Check {
        /// Input markup file
        input: PathBuf,
        /// Template metadata JSON (variables + magic_commands). Defaults to
        /// the configured template under the configured projects dir.
        #[arg(short, long)]
        template: Option<PathBuf>,
    },
}

/// Resolve the template metadata path from config when none was given on the
/// command line, mirroring `<projects_dir>/templates/<default_template>.json`.
fn resolve_template(template: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(path) = template {
        return Ok(path);
    }
    let config = Config::load()
        .context("failed to load config")?
        .with_context(|| {
            format!(
                "no --template given and no config file at {}",
                Config::config_path().display()
            )
        })?;
    Ok(config
        .projects_dir
        .join("templates")
        .join(format!("{}.json", config.default_template)))
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Normalize { input, output } => normalize_file(&input, output.as_deref()),
        Commands::Markers { input, json } => list_markers(&input, json),
        Commands::Check { input, template } => {
            let template = resolve_template(template)?;
            let problems = check_file(&input, &template)?;
            if !problems.is_empty() {
                for problem in &problems {
                    eprintln!("{problem}");
                }
                process::exit(1);
            }
            println!("{}: ok", input.display());
            Ok(())
        }
    }
}

fn read_markup(input: &Path) -> Result<String> {
    fs::read_to_string(input).with_context(|| format!("failed to read {}", input.display()))
}

fn normalize_file(input: &Path, output: Option<&Path>) -> Result<()> {
    let markup = read_markup(input)?;
    let canonical = normalize(&markup);
    match output {
        Some(path) => fs::write(path, canonical)
            .with_context(|| format!("failed to write {}", path.display()))?,
        None => println!("{canonical}"),
    }
    Ok(())
}

/// Marker tokens with their 1-based line numbers in the raw input, so the
/// numbers agree with what `check` reports for the same file.
fn collect_markers(markup: &str) -> Vec<(usize, MarkerToken)> {
    markup
        .lines()
        .enumerate()
        .filter_map(|(index, line)| parse_token(line).map(|token| (index + 1, token)))
        .collect()
}

fn list_markers(input: &Path, json: bool) -> Result<()> {
    let markup = read_markup(input)?;
    let entries = collect_markers(&markup);

    if json {
        let values: Vec<serde_json::Value> = entries
            .iter()
            .map(|(line, token)| {
                let args: serde_json::Map<String, serde_json::Value> = token
                    .args
                    .iter()
                    .map(|(name, value)| (name.clone(), serde_json::Value::from(value.as_str())))
                    .collect();
                serde_json::json!({
                    "line": line,
                    "label": token.label,
                    "args": args,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&values)?);
    } else {
        for (line, token) in &entries {
            let args: Vec<String> = token
                .args
                .iter()
                .map(|(name, value)| format!("{name}={value}"))
                .collect();
            println!("{line}: {} {}", token.label, args.join(" "));
        }
    }
    Ok(())
}

/// Problems are reported, never fixed: unknown labels, and begin/end
/// imbalance per pairing group in document order.
fn check_file(input: &Path, template: &Path) -> Result<Vec<String>> {
    let meta_text = fs::read_to_string(template)
        .with_context(|| format!("failed to read {}", template.display()))?;
    let meta: TemplateMeta = serde_json::from_str(&meta_text)
        .with_context(|| format!("failed to parse {}", template.display()))?;
    let catalog = CommandCatalog::from_meta(&meta);

    let markup = read_markup(input)?;
    let doc = Document::from_markup(&markup, &catalog);

    let mut problems = Vec::new();
    let mut open: HashMap<String, usize> = HashMap::new();

    for (index, node) in doc.nodes().iter().enumerate() {
        let Node::Magic(block) = node else { continue };
        let line = index + 1;

        if catalog.find(&block.label).is_none() {
            problems.push(format!(
                "{}:{line}: unknown command {:?}",
                input.display(),
                block.label
            ));
            continue;
        }

        match (block.pairing, block.group.as_deref()) {
            (Some(Pairing::Begin), Some(group)) => {
                *open.entry(group.to_string()).or_insert(0) += 1;
            }
            (Some(Pairing::End), Some(group)) => {
                let depth = open.entry(group.to_string()).or_insert(0);
                if *depth == 0 {
                    let expected = catalog
                        .begin_partner(group)
                        .map(|begin| format!(" (expected {} above)", begin.label))
                        .unwrap_or_default();
                    problems.push(format!(
                        "{}:{line}: {} closes group {group:?} with no open begin{expected}",
                        input.display(),
                        block.label
                    ));
                } else {
                    *depth -= 1;
                }
            }
            _ => {}
        }
    }

    for (group, depth) in open {
        if depth > 0 {
            problems.push(format!(
                "{}: group {group:?} has {depth} unclosed begin(s)",
                input.display()
            ));
        }
    }

    // Canonical-form drift is worth flagging too, since saves always
    // rewrite the canonical form.
    if serialize(&doc) != markup {
        problems.push(format!(
            "{}: not in canonical form (run `texdown normalize`)",
            input.display()
        ));
    }

    Ok(problems)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const META_JSON: &str = r#"{
        "variables": [],
        "magic_commands": [
            {"label": "Figure", "args": "path:image:|caption:text:", "tab": "Media"},
            {"label": "BeginQuote", "tab": "Format", "pairing": "begin", "group": "quote"},
            {"label": "EndQuote", "tab": "Format", "pairing": "end", "group": "quote"}
        ]
    }"#;

    fn write_files(markup: &str) -> (TempDir, PathBuf, PathBuf) {
        let dir = TempDir::new().unwrap();
        let markup_path = dir.path().join("doc.txt");
        let meta_path = dir.path().join("meta.json");
        fs::write(&markup_path, markup).unwrap();
        fs::write(&meta_path, META_JSON).unwrap();
        (dir, markup_path, meta_path)
    }

    #[test]
    fn balanced_canonical_file_passes_check() {
        let markup = "--[[--[[--[[#######-[[MAGIC:BeginQuote]]-#######]]--]]--]]--\n\nwords\n\n--[[--[[--[[#######-[[MAGIC:EndQuote]]-#######]]--]]--]]--";
        let (_dir, markup_path, meta_path) = write_files(markup);

        let problems = check_file(&markup_path, &meta_path).unwrap();
        assert!(problems.is_empty(), "{problems:?}");
    }

    #[test]
    fn lone_end_is_reported() {
        let markup = "--[[--[[--[[#######-[[MAGIC:EndQuote]]-#######]]--]]--]]--";
        let (_dir, markup_path, meta_path) = write_files(markup);

        let problems = check_file(&markup_path, &meta_path).unwrap();
        assert_eq!(problems.len(), 1);
        assert!(problems[0].contains("no open begin"));
        assert!(problems[0].contains("expected BeginQuote above"));
    }

    #[test]
    fn unclosed_begin_is_reported() {
        let markup = "--[[--[[--[[#######-[[MAGIC:BeginQuote]]-#######]]--]]--]]--";
        let (_dir, markup_path, meta_path) = write_files(markup);

        let problems = check_file(&markup_path, &meta_path).unwrap();
        assert_eq!(problems.len(), 1);
        assert!(problems[0].contains("unclosed begin"));
    }

    #[test]
    fn unknown_label_is_reported() {
        let markup = "--[[--[[--[[#######-[[MAGIC:Mystery]]-#######]]--]]--]]--";
        let (_dir, markup_path, meta_path) = write_files(markup);

        let problems = check_file(&markup_path, &meta_path).unwrap();
        assert_eq!(problems.len(), 1);
        assert!(problems[0].contains("unknown command"));
    }

    #[test]
    fn non_canonical_whitespace_is_reported() {
        let markup = "hello\u{a0}world\n\n\n\ntrailing   ";
        let (_dir, markup_path, meta_path) = write_files(markup);

        let problems = check_file(&markup_path, &meta_path).unwrap();
        assert_eq!(problems.len(), 1);
        assert!(problems[0].contains("canonical"));
    }

    #[test]
    fn markers_are_numbered_by_raw_input_lines() {
        // Non-canonical input: leading blanks and indentation must not shift
        // the reported numbers away from what `check` prints for this file.
        let markup =
            "\n\n  --[[--[[--[[#######-[[MAGIC:BeginQuote]]-#######]]--]]--]]--\nprose\n--[[--[[--[[#######-[[MAGIC:EndQuote]]-#######]]--]]--]]--";

        let entries = collect_markers(markup);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].0, 3);
        assert_eq!(entries[0].1.label, "BeginQuote");
        assert_eq!(entries[1].0, 5);
        assert_eq!(entries[1].1.label, "EndQuote");
    }

    #[test]
    fn normalize_writes_canonical_output() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("in.txt");
        let output = dir.path().join("out.txt");
        fs::write(&input, "  messy\u{a0}text  \n\n\n\nend").unwrap();

        normalize_file(&input, Some(output.as_path())).unwrap();
        assert_eq!(fs::read_to_string(&output).unwrap(), "messy text\n\nend");
    }
}
