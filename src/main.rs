//! Tessera CLI - command-line tool for cleaning plugins and unpacking archives.
//!
//! This is the main entry point for the Tessera command-line application.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use log::LevelFilter;

use tessera::plugin::codec;
use tessera::plugin::report::{compare, CompareOptions};
use tessera::prelude::*;

/// Tessera - plugin cleaning and archive extraction tool
#[derive(Parser)]
#[command(name = "tessera")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show record, group and field counts of a plugin
    PluginInfo {
        /// Path to the plugin file
        #[arg(short, long, env = "INPUT_PLUGIN")]
        input: PathBuf,
    },

    /// Parse a plugin and write it back unchanged
    PluginRoundtrip {
        /// Path to the plugin file
        #[arg(short, long, env = "INPUT_PLUGIN")]
        input: PathBuf,

        /// Output file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Apply edit instructions to plugins
    PluginClean {
        /// JSON file with per-plugin edit instructions
        #[arg(short, long, env = "CLEAN_CONFIG")]
        config: PathBuf,

        /// Directory holding the plugins and their donors
        #[arg(short, long, env = "INPUT_FOLDER")]
        data: PathBuf,

        /// Output directory
        #[arg(short, long, env = "OUTPUT_FOLDER")]
        output: PathBuf,

        /// Only clean this plugin
        #[arg(short, long)]
        plugin: Option<String>,
    },

    /// Print a structural diff of two plugins
    PluginDiff {
        left: PathBuf,
        right: PathBuf,

        /// Compare in file order instead of canonical order
        #[arg(long)]
        unsorted: bool,

        /// List every removed descendant, not only subtree roots
        #[arg(long)]
        expand: bool,
    },

    /// List the minimal deletions turning one plugin into another
    PluginDeletions {
        old: PathBuf,
        new: PathBuf,
    },

    /// List contents of a BSA archive
    BsaList {
        /// Path to the archive
        #[arg(short, long, env = "INPUT_BSA")]
        bsa: PathBuf,

        /// Filter pattern (glob-style)
        #[arg(short, long)]
        filter: Option<String>,

        /// Show detailed information
        #[arg(short, long)]
        detailed: bool,
    },

    /// Extract files from a BSA archive
    BsaExtract {
        /// Path to the archive
        #[arg(short, long, env = "INPUT_BSA")]
        bsa: PathBuf,

        /// Output directory
        #[arg(short, long, env = "OUTPUT_FOLDER")]
        output: PathBuf,
    },

    /// Print the archive hash of a path
    BsaHash {
        path: String,

        /// Hash as a folder path
        #[arg(long)]
        folder: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .init();

    match cli.command {
        Commands::PluginInfo { input } => {
            cmd_plugin_info(&input)?;
        }
        Commands::PluginRoundtrip { input, output } => {
            cmd_plugin_roundtrip(&input, &output)?;
        }
        Commands::PluginClean {
            config,
            data,
            output,
            plugin,
        } => {
            cmd_plugin_clean(&config, &data, &output, plugin.as_deref())?;
        }
        Commands::PluginDiff {
            left,
            right,
            unsorted,
            expand,
        } => {
            cmd_plugin_diff(&left, &right, !unsorted, expand)?;
        }
        Commands::PluginDeletions { old, new } => {
            cmd_plugin_deletions(&old, &new)?;
        }
        Commands::BsaList {
            bsa,
            filter,
            detailed,
        } => {
            cmd_bsa_list(&bsa, filter.as_deref(), detailed)?;
        }
        Commands::BsaExtract { bsa, output } => {
            cmd_bsa_extract(&bsa, &output)?;
        }
        Commands::BsaHash { path, folder } => {
            println!("{:016X}", hash_path(&path, folder));
        }
    }

    Ok(())
}

fn open_plugin(path: &Path) -> Result<Plugin> {
    Plugin::open(path).with_context(|| format!("Failed to read plugin {}", path.display()))
}

fn cmd_plugin_info(input: &Path) -> Result<()> {
    let start = Instant::now();
    let plugin = open_plugin(input)?;
    let counts = plugin.count_nodes();

    println!("Loaded {} in {:?}", input.display(), start.elapsed());
    println!("Records:    {}", counts.records);
    println!("Groups:     {}", counts.groups);
    println!("Fields:     {}", counts.fields);
    println!("Compressed: {}", counts.compressed);
    match plugin.record_count() {
        Some(count) => println!("Header record count: {}", count),
        None => println!("Header record count: missing"),
    }

    let overrides = tessera::plugin::patch::overrides(&plugin);
    if !overrides.is_empty() {
        println!("Overrides:  {}", overrides.len());
    }
    for group in plugin.groups() {
        println!(
            "  {:<24} {:>8} nodes",
            codec::describe_label(group.group_type, group.label),
            group.descendant_count() + 1
        );
    }

    Ok(())
}

fn cmd_plugin_roundtrip(input: &Path, output: &Path) -> Result<()> {
    let original = fs::read(input).context("Failed to read input file")?;
    let mut plugin = Plugin::parse(&original).context("Failed to parse plugin")?;
    let bytes = serialize(&mut plugin).context("Failed to serialize plugin")?;

    let summary = codec::validate(&bytes).context("Serialized output failed validation")?;
    fs::write(output, &bytes).context("Failed to write output file")?;

    println!(
        "Wrote {} bytes: {} records, {} groups, {} fields",
        bytes.len(),
        summary.records,
        summary.groups,
        summary.fields
    );
    if bytes == original {
        println!("Output is byte-identical to input");
    } else {
        println!("Output differs from input");
    }

    Ok(())
}

fn cmd_plugin_clean(
    config_path: &Path,
    data: &Path,
    output: &Path,
    only: Option<&str>,
) -> Result<()> {
    let config = CleaningConfig::from_path(config_path).context("Failed to load configuration")?;

    let names: Vec<&str> = match only {
        Some(name) => {
            config.instructions(name)?;
            vec![name]
        }
        None => config.plugins.keys().map(String::as_str).collect(),
    };

    fs::create_dir_all(output)?;

    let pb = ProgressBar::new(names.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
            )?
            .progress_chars("#>-"),
    );

    let start = Instant::now();
    let mut failed = 0;
    for name in &names {
        pb.set_message(name.to_string());
        let instructions = config.instructions(name)?;
        let input = data.join(name);
        let target = tessera::clean::output_path(&input, output);

        match clean_file(&input, &target, instructions, data) {
            Ok(report) => pb.println(format!(
                "{}: {} removed, {} restored, {} stripped, {} overrides",
                name, report.deleted, report.udr.restored, report.stripped, report.overrides
            )),
            Err(e) => {
                pb.println(format!("Error cleaning {}: {}", name, e));
                failed += 1;
            }
        }
        pb.inc(1);
    }

    pb.finish_with_message("Done");
    println!(
        "Cleaned {} plugins in {:?} ({} errors)",
        names.len() - failed,
        start.elapsed(),
        failed
    );

    if failed > 0 {
        anyhow::bail!("{} plugins failed", failed);
    }
    Ok(())
}

fn cmd_plugin_diff(left: &Path, right: &Path, sort: bool, expand: bool) -> Result<()> {
    let left_plugin = open_plugin(left)?;
    let right_plugin = open_plugin(right)?;

    let result = compare(&left_plugin, &right_plugin, CompareOptions { sort, expand });
    if result.identical() {
        println!("Plugins are structurally identical");
    } else {
        print!("{}", result);
        println!(
            "\n{} only in {}, {} only in {}, {} differing",
            result.only_left.len(),
            left.display(),
            result.only_right.len(),
            right.display(),
            result.differing.len()
        );
    }

    Ok(())
}

fn cmd_plugin_deletions(old: &Path, new: &Path) -> Result<()> {
    let old_plugin = open_plugin(old)?;
    let new_plugin = open_plugin(new)?;

    let deletions = compute_deletions(&old_plugin, &new_plugin);
    for ident in &deletions {
        println!("{}", ident);
    }
    println!("\nTotal: {} deletions", deletions.len());

    Ok(())
}

fn cmd_bsa_list(bsa_path: &Path, filter: Option<&str>, detailed: bool) -> Result<()> {
    let archive = BsaArchive::open(bsa_path).context("Failed to open archive")?;

    let mut count = 0;
    for entry in archive.list() {
        if let Some(pattern) = filter {
            if !glob_match(pattern, &entry.path) {
                continue;
            }
        }

        if detailed {
            println!(
                "{:>12} {} {:016X} {}",
                entry.size,
                if entry.compressed { "C" } else { " " },
                entry.hash,
                entry.path
            );
        } else {
            println!("{}", entry.path);
        }
        count += 1;
    }

    println!("\nTotal: {} entries", count);

    Ok(())
}

fn cmd_bsa_extract(bsa_path: &Path, output: &Path) -> Result<()> {
    println!("Opening archive: {}", bsa_path.display());

    let start = Instant::now();
    let mut archive = BsaArchive::open(bsa_path).context("Failed to open archive")?;
    println!("Loaded {} entries in {:?}", archive.len(), start.elapsed());

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")?,
    );
    pb.set_message(format!("Extracting to {}", output.display()));
    pb.enable_steady_tick(Duration::from_millis(100));

    let start = Instant::now();
    let stats = extract_to_dir(&mut archive, output, &CancelToken::new())
        .context("Extraction failed")?;

    pb.finish_with_message("Done");
    println!(
        "Extracted {} files ({} bytes, {} empty) in {:?}",
        stats.extracted,
        stats.bytes,
        stats.empty,
        start.elapsed()
    );

    Ok(())
}

/// Simple glob matching for filtering, ignoring case and slash direction.
fn glob_match(pattern: &str, name: &str) -> bool {
    let pattern = pattern.to_lowercase().replace('/', "\\");
    let name = name.to_lowercase();

    if !pattern.contains('*') {
        return name.contains(&pattern);
    }

    // Anchored at both ends: the first part is a prefix, the last a suffix
    // of what the middle parts leave.
    let parts: Vec<&str> = pattern.split('*').collect();
    let (first, last) = (parts[0], parts[parts.len() - 1]);
    let Some(mut rest) = name.strip_prefix(first) else {
        return false;
    };
    for part in &parts[1..parts.len() - 1] {
        match rest.find(part) {
            Some(found) => rest = &rest[found + part.len()..],
            None => return false,
        }
    }
    rest.ends_with(last)
}

#[cfg(test)]
mod tests {
    use super::glob_match;

    #[test]
    fn test_glob_match() {
        assert!(glob_match("a*b", "abab"));
        assert!(glob_match("meshes/*.nif", "meshes\\armor\\iron.NIF"));
        assert!(glob_match("*.dds", "textures\\a.dds"));
        assert!(glob_match("armor", "meshes\\armor\\iron.nif"));
        assert!(!glob_match("a*a", "a"));
        assert!(!glob_match("*.dds", "a.dds.bak"));
        assert!(!glob_match("x*", "meshes\\x.nif"));
    }
}
