use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{CommandFactory, Parser};
use clap_complete::generate;
use colored::Colorize;
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use modman_core::config::Config;
use modman_core::descriptor::normalize_path;
use modman_core::{
    AttributeKey, DescriptorSummary, Locator, ManagerContext, ModManError, ModuleEntry,
    ModuleIdentity, ModuleManager, Result, MODULE_PATH_VAR,
};

mod args;
use args::{Cli, Commands, ConfigAction, ModuleTarget, Shell};

/// Host values given on the command line
struct HostOptions {
    module_paths: Vec<PathBuf>,
    maya_version: Option<String>,
    platform: Option<String>,
    locale: Option<String>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    let base_dir = resolve_base_dir(cli.base_dir);
    let host = HostOptions {
        module_paths: cli.module_paths,
        maya_version: cli.maya_version,
        platform: cli.platform,
        locale: cli.locale,
    };

    let result = match cli.command {
        Some(Commands::Files) => handle_files(&base_dir, &host),
        Some(Commands::List { all, json }) => handle_list(&base_dir, &host, all, json),
        Some(Commands::Show { name }) => handle_show(&base_dir, &host, &name),
        Some(Commands::Enable { target }) => handle_set_state(&base_dir, &host, &target, true),
        Some(Commands::Disable { target }) => handle_set_state(&base_dir, &host, &target, false),
        Some(Commands::Config { action }) => handle_config(action, &base_dir),
        Some(Commands::Completions { shell }) => {
            handle_completions(shell);
            Ok(())
        }
        None => {
            Cli::command().print_help().ok();
            Ok(())
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", "[ERROR]".red().bold(), e);
            ExitCode::from(e.exit_code() as u8)
        }
    }
}

fn init_tracing(verbose: bool, quiet: bool) {
    let level = if verbose {
        "debug"
    } else if quiet {
        "error"
    } else {
        "warn"
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(io::stderr),
        )
        .init();
}

fn handle_completions(shell: Shell) {
    let mut cmd = Cli::command();
    let shell = match shell {
        Shell::Bash => clap_complete::Shell::Bash,
        Shell::Zsh => clap_complete::Shell::Zsh,
        Shell::Fish => clap_complete::Shell::Fish,
        Shell::PowerShell => clap_complete::Shell::PowerShell,
        Shell::Elvish => clap_complete::Shell::Elvish,
    };
    generate(shell, &mut cmd, "modman", &mut io::stdout());
}

fn resolve_base_dir(cli_base: Option<PathBuf>) -> PathBuf {
    if let Some(base) = cli_base {
        return base;
    }

    if let Ok(base) = std::env::var("MODMAN_BASE") {
        return PathBuf::from(base);
    }

    dirs::home_dir()
        .map(|h| h.join(".modman"))
        .unwrap_or_else(|| PathBuf::from(".modman"))
}

/// Search paths: command line, then MAYA_MODULE_PATH, then config
fn resolve_search_paths(
    cli_paths: &[PathBuf],
    env_value: Option<OsString>,
    config: &Config,
) -> Vec<PathBuf> {
    if !cli_paths.is_empty() {
        return cli_paths.to_vec();
    }

    if let Some(value) = env_value {
        let paths = Locator::search_paths_from_env(&value);
        if !paths.is_empty() {
            return paths;
        }
    }

    config.search.paths.clone()
}

fn build_manager(base_dir: &Path, host: &HostOptions) -> Result<ModuleManager> {
    let mut config = Config::load(base_dir)?;

    // Command line values override the config file
    if let Some(version) = &host.maya_version {
        config.environment.maya_version = Some(version.clone());
    }
    if let Some(platform) = &host.platform {
        config.environment.platform = Some(platform.clone());
    }
    if let Some(locale) = &host.locale {
        config.environment.locale = Some(locale.clone());
    }

    let search_paths = resolve_search_paths(
        &host.module_paths,
        std::env::var_os(MODULE_PATH_VAR),
        &config,
    );
    debug!(paths = ?search_paths, "module search path");

    Ok(ModuleManager::new(ManagerContext::from_config(
        &config,
        search_paths,
    )))
}

fn handle_files(base_dir: &Path, host: &HostOptions) -> Result<()> {
    let manager = build_manager(base_dir, host)?;
    let files = manager.list_descriptor_files();

    if files.is_empty() {
        print_no_files(&manager);
        return Ok(());
    }

    for file in files {
        println!("{}", file.display());
    }
    Ok(())
}

fn handle_list(base_dir: &Path, host: &HostOptions, all: bool, json: bool) -> Result<()> {
    let manager = build_manager(base_dir, host)?;
    let mut summaries = manager.scan();

    let mut hidden = vec![0; summaries.len()];
    if !all {
        for (summary, hidden) in summaries.iter_mut().zip(hidden.iter_mut()) {
            let before = summary.records.len();
            summary.records.retain(|entry| entry.compatible);
            *hidden = before - summary.records.len();
        }
    }

    if json {
        let output = serde_json::to_string_pretty(&summaries).map_err(io::Error::from)?;
        println!("{}", output);
        return Ok(());
    }

    if summaries.is_empty() {
        print_no_files(&manager);
        return Ok(());
    }

    println!();
    for (summary, hidden) in summaries.iter().zip(hidden) {
        print_summary(summary, hidden);
        println!();
    }
    Ok(())
}

fn print_no_files(manager: &ModuleManager) {
    println!("No module files found.");
    let paths = manager.context().locator.search_paths();
    if paths.is_empty() {
        println!();
        println!(
            "Set {} or: modman config set search.paths <dir>",
            MODULE_PATH_VAR
        );
    } else {
        println!();
        println!("Searched:");
        for path in paths {
            println!("  {}", path.display());
        }
    }
}

fn print_summary(summary: &DescriptorSummary, hidden: usize) {
    let name = summary
        .path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let mut header = format!(
        "{}  {}",
        name.yellow().bold(),
        summary.path.display().to_string().dimmed()
    );
    if !summary.writable {
        header.push_str(&format!("  {}", "[read-only]".red()));
    }
    println!("{}", header);

    if let Some(error) = &summary.error {
        println!("  {} {}", "[WARN]".yellow(), error);
        return;
    }

    if summary.records.is_empty() && hidden == 0 {
        println!("  (no modules)");
        return;
    }

    for entry in &summary.records {
        println!("  {}", format_entry(entry));
    }
    if hidden > 0 {
        println!(
            "  {}",
            format!("({} incompatible module(s) hidden, use --all to show)", hidden).dimmed()
        );
    }
}

fn format_entry(entry: &ModuleEntry) -> String {
    let record = &entry.record;
    let checkbox = if record.enabled { "[x]" } else { "[ ]" };
    let name = if entry.compatible {
        record.name.cyan().bold()
    } else {
        record.name.dimmed()
    };

    let attributes: Vec<String> = AttributeKey::ALL
        .iter()
        .map(|key| format!("{}: {}", key.label(), record.attribute(*key).unwrap_or("-")))
        .collect();

    format!(
        "{} {:<24} {:<10} {}  {}",
        checkbox,
        name,
        record.version,
        attributes.join("  "),
        entry.content_path.display().to_string().dimmed()
    )
}

fn handle_show(base_dir: &Path, host: &HostOptions, name: &str) -> Result<()> {
    let manager = build_manager(base_dir, host)?;
    let matches = manager.find(name);

    if matches.is_empty() {
        return Err(ModManError::ModuleNotFound {
            name: name.to_string(),
        });
    }

    for found in matches {
        let record = &found.entry.record;
        let state = if record.enabled {
            "enabled".green()
        } else {
            "disabled".red()
        };
        let compatible = if found.entry.compatible {
            "yes".green()
        } else {
            "no".yellow()
        };

        println!();
        println!("Module: {} {}", record.name.cyan().bold(), record.version);
        println!("State: {}", state);
        println!("File: {}", found.file.display());
        println!("Path: {}", record.path);
        println!("Content: {}", found.entry.content_path.display());
        for key in AttributeKey::ALL {
            println!("{}: {}", key.label(), record.attribute(key).unwrap_or("-"));
        }
        println!("Compatible: {}", compatible);
    }
    println!();
    Ok(())
}

fn handle_set_state(
    base_dir: &Path,
    host: &HostOptions,
    target: &ModuleTarget,
    enabled: bool,
) -> Result<()> {
    let manager = build_manager(base_dir, host)?;
    let wanted_file = target.file.as_deref().map(absolute);

    let mut selected: Vec<(PathBuf, ModuleIdentity, bool)> = Vec::new();
    for found in manager.find(&target.name) {
        let record = &found.entry.record;
        if target.version.as_ref().is_some_and(|v| v != &record.version) {
            continue;
        }
        if wanted_file
            .as_ref()
            .is_some_and(|f| f != &absolute(&found.file))
        {
            continue;
        }
        if !target.all && !found.entry.compatible {
            continue;
        }

        // Duplicate lines are updated by a single rewrite
        let identity = record.identity();
        let stale = record.enabled != enabled;
        match selected
            .iter_mut()
            .find(|(file, id, _)| file == &found.file && id == &identity)
        {
            Some((_, _, needs_write)) => *needs_write |= stale,
            None => selected.push((found.file, identity, stale)),
        }
    }

    if selected.is_empty() {
        return Err(ModManError::ModuleNotFound {
            name: target.name.clone(),
        });
    }

    let verb = if enabled { "Enabled:" } else { "Disabled:" };
    for (file, identity, needs_write) in selected {
        let file_name = file
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        if !needs_write {
            println!(
                "{} {} {} ({})",
                "Unchanged:".dimmed(),
                identity.name,
                identity.version,
                file_name
            );
            continue;
        }

        let matched = manager.set_enabled(&file, &identity, enabled)?;
        if matched == 0 {
            println!(
                "{} {} {} changed on disk, nothing updated in {}",
                "[WARN]".yellow(),
                identity.name,
                identity.version,
                file.display()
            );
        } else {
            println!(
                "{} {} {} ({})",
                verb.green(),
                identity.name.cyan(),
                identity.version,
                file_name
            );
        }
    }

    Ok(())
}

/// Absolute, normalized form of a path given on the command line
fn absolute(path: &Path) -> PathBuf {
    let path = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };
    normalize_path(&path)
}

fn handle_config(action: ConfigAction, base_dir: &Path) -> Result<()> {
    match action {
        ConfigAction::Get { key } => {
            let config = Config::load(base_dir)?;
            match config.get(&key) {
                Some(value) => {
                    println!("{}", value);
                }
                None => {
                    return Err(ModManError::ConfigKeyNotFound { key });
                }
            }
        }
        ConfigAction::Set { key, value } => {
            let mut config = Config::load(base_dir)?;
            config.set(&key, &value)?;
            config.save(base_dir)?;
            println!("{} {} = {}", "Set:".green(), key, value);
        }
        ConfigAction::List => {
            let config = Config::load(base_dir)?;
            println!();
            for (key, value) in config.list() {
                println!("{} = {}", key.cyan(), value);
            }
            println!();
        }
        ConfigAction::Path => {
            let path = Config::path(base_dir);
            println!("{}", path.display());
        }
        ConfigAction::Init => {
            let path = Config::init(base_dir)?;
            println!("{} {}", "Initialized:".green(), path.display());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use modman_core::descriptor::parse_line;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn search_paths_prefer_command_line() {
        let mut config = Config::default();
        config.search.paths = vec![PathBuf::from("/from/config")];

        let cli = vec![PathBuf::from("/from/cli")];
        let paths = resolve_search_paths(&cli, Some(OsString::from("/from/env")), &config);
        assert_eq!(paths, cli);
    }

    #[test]
    fn search_paths_fall_back_to_env_then_config() {
        let mut config = Config::default();
        config.search.paths = vec![PathBuf::from("/from/config")];

        let paths = resolve_search_paths(&[], Some(OsString::from("/from/env")), &config);
        assert_eq!(paths, vec![PathBuf::from("/from/env")]);

        let paths = resolve_search_paths(&[], Some(OsString::new()), &config);
        assert_eq!(paths, vec![PathBuf::from("/from/config")]);

        let paths = resolve_search_paths(&[], None, &config);
        assert_eq!(paths, vec![PathBuf::from("/from/config")]);
    }

    #[test]
    fn command_line_environment_overrides_config() {
        let temp = TempDir::new().unwrap();
        let mut config = Config::default();
        config.set("environment.maya_version", "2023").unwrap();
        config.save(temp.path()).unwrap();

        let host = HostOptions {
            module_paths: vec![temp.path().join("modules")],
            maya_version: Some("2024".to_string()),
            platform: None,
            locale: Some("ja_JP".to_string()),
        };
        let manager = build_manager(temp.path(), &host).unwrap();
        let environment = manager.environment();
        assert_eq!(environment.value(AttributeKey::MayaVersion), Some("2024"));
        assert_eq!(environment.value(AttributeKey::Locale), Some("ja_JP"));
        assert_eq!(
            manager.context().locator.search_paths(),
            &[temp.path().join("modules")]
        );
    }

    #[test]
    fn set_state_filters_by_version_and_compatibility() {
        let temp = TempDir::new().unwrap();
        let modules = temp.path().join("modules");
        fs::create_dir(&modules).unwrap();
        let descriptor = modules.join("tool.mod");
        fs::write(
            &descriptor,
            "- MAYAVERSION:2024 Tool 1.0 ../a\n- MAYAVERSION:2025 Tool 1.0 ../b\n- Tool 2.0 ../c\n",
        )
        .unwrap();

        let host = HostOptions {
            module_paths: vec![modules],
            maya_version: Some("2024".to_string()),
            platform: None,
            locale: None,
        };
        let target = ModuleTarget {
            name: "Tool".to_string(),
            version: Some("1.0".to_string()),
            file: None,
            all: false,
        };
        handle_set_state(temp.path(), &host, &target, true).unwrap();

        assert_eq!(
            fs::read_to_string(&descriptor).unwrap(),
            "+ MAYAVERSION:2024 Tool 1.0 ../a\n- MAYAVERSION:2025 Tool 1.0 ../b\n- Tool 2.0 ../c\n"
        );
    }

    #[test]
    fn set_state_updates_mixed_duplicates() {
        let temp = TempDir::new().unwrap();
        let descriptor = temp.path().join("dup.mod");
        fs::write(&descriptor, "+ Tool 1.0 path\n- Tool 1.0 path\n").unwrap();

        let host = HostOptions {
            module_paths: vec![temp.path().to_path_buf()],
            maya_version: None,
            platform: None,
            locale: None,
        };
        let target = ModuleTarget {
            name: "Tool".to_string(),
            version: None,
            file: Some(descriptor.clone()),
            all: false,
        };
        handle_set_state(temp.path(), &host, &target, true).unwrap();

        assert_eq!(
            fs::read_to_string(&descriptor).unwrap(),
            "+ Tool 1.0 path\n+ Tool 1.0 path\n"
        );
    }

    #[test]
    fn set_state_unknown_module_is_not_found() {
        let temp = TempDir::new().unwrap();
        let host = HostOptions {
            module_paths: vec![temp.path().to_path_buf()],
            maya_version: None,
            platform: None,
            locale: None,
        };
        let target = ModuleTarget {
            name: "Missing".to_string(),
            version: None,
            file: None,
            all: true,
        };
        let err = handle_set_state(temp.path(), &host, &target, true).unwrap_err();
        assert!(matches!(err, ModManError::ModuleNotFound { .. }));
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn format_entry_shows_missing_attributes_as_dash() {
        let record = parse_line("+ PLATFORM:linux Tool 1.0 ../content").unwrap();
        let entry = ModuleEntry {
            record,
            compatible: true,
            content_path: PathBuf::from("/content"),
        };
        colored::control::set_override(false);
        let line = format_entry(&entry);
        assert!(line.starts_with("[x] Tool"));
        assert!(line.contains("Maya Version: -"));
        assert!(line.contains("Platform: linux"));
        assert!(line.contains("/content"));
    }
}
