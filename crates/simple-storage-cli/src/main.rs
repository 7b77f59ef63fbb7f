mod browser;

use anyhow::{Context, Result, bail};
use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::CrosstermBackend};
use simple_storage_config::{Config, FileCollision};
use simple_storage_engine::{CollisionPolicy, GrantTable, LocalStore, Node, StorageAccess};
use std::{env, io::stdout, path::PathBuf, process, sync::Arc};

const USAGE: &str = "\
Usage: simple-storage-cli [--config <path>] <command> [arguments]

Commands:
  resolve  <storage-id> [path]              find an existing file or folder
  mkdirs   <storage-id> <path>              find or create every folder of path
  create   <storage-id> <path> [mime-type]  create a file and its parent folders
  recreate <storage-id> <path> [mime-type]  replace a file with an empty one
  space    <storage-id>                     capacity, free and used bytes
  uri      <storage-id> [path]              tree URI a volume grant lives under
  browse   <storage-id> [path]              browse a volume in the terminal";

#[derive(Debug, PartialEq)]
enum Command {
    Resolve { storage_id: String, path: String },
    Mkdirs { storage_id: String, path: String },
    Create { storage_id: String, path: String, mime_type: Option<String> },
    Recreate { storage_id: String, path: String, mime_type: Option<String> },
    Space { storage_id: String },
    Uri { storage_id: String, path: String },
    Browse { storage_id: String, path: String },
}

#[derive(Debug, PartialEq)]
struct Invocation {
    config_path: Option<PathBuf>,
    command: Command,
}

fn parse_args(args: &[String]) -> Result<Invocation> {
    let mut config_path = None;
    let mut positional = Vec::new();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" => {
                let path = iter.next().context("--config needs a path")?;
                config_path = Some(PathBuf::from(path));
            }
            _ => positional.push(arg.as_str()),
        }
    }

    let Some((&name, rest)) = positional.split_first() else {
        bail!("no command given");
    };
    let Some((&storage_id, rest)) = rest.split_first() else {
        bail!("{name} needs a storage id");
    };
    let storage_id = storage_id.to_string();
    let path = rest.first().map(|p| p.to_string()).unwrap_or_default();
    let mime_type = rest.get(1).map(|m| m.to_string());
    let needs_path = |path: String| {
        if rest.is_empty() {
            bail!("{name} needs a path");
        }
        Ok(path)
    };

    let command = match name {
        "resolve" => Command::Resolve { storage_id, path },
        "mkdirs" => Command::Mkdirs {
            storage_id,
            path: needs_path(path)?,
        },
        "create" => Command::Create {
            storage_id,
            path: needs_path(path)?,
            mime_type,
        },
        "recreate" => Command::Recreate {
            storage_id,
            path: needs_path(path)?,
            mime_type,
        },
        "space" => Command::Space { storage_id },
        "uri" => Command::Uri { storage_id, path },
        "browse" => Command::Browse { storage_id, path },
        other => bail!("unknown command {other:?}"),
    };
    Ok(Invocation {
        config_path,
        command,
    })
}

fn collision_policy(file_collision: FileCollision) -> CollisionPolicy {
    match file_collision {
        FileCollision::Fail => CollisionPolicy::Fail,
        FileCollision::CreateSibling => CollisionPolicy::CreateSibling,
    }
}

/// Build the service from configuration, granting every configured volume.
fn build_access(config: &Config) -> StorageAccess {
    let grants = Arc::new(GrantTable::new());
    let mut access = StorageAccess::new(config.primary_root.clone(), grants.clone())
        .with_authority(config.authority.clone())
        .with_collision_policy(collision_policy(config.file_collision));
    if let Some(app_directory) = &config.app_directory {
        access = access.with_app_directory(app_directory.clone());
    }

    for (storage_id, root) in &config.volumes {
        log::debug!("Granting volume {storage_id} at {}", root.display());
        grants.grant(
            access.tree_uri(storage_id, ""),
            Arc::new(LocalStore::new(root.clone())),
        );
    }
    access
}

fn print_node(node: &Node) {
    let kind = if node.is_directory() { "dir" } else { "file" };
    println!("{kind}\t{}\t{}", node.name(), node.uri());
}

/// Run one command. Returns `false` when the result is absent.
fn run(access: &StorageAccess, command: Command) -> Result<bool> {
    let node = match command {
        Command::Resolve { storage_id, path } => access.resolve(&storage_id, &path),
        Command::Mkdirs { storage_id, path } => access.materialize(&storage_id, &path),
        Command::Create {
            storage_id,
            path,
            mime_type,
        } => access.create_file(&storage_id, &path, mime_type.as_deref()),
        Command::Recreate {
            storage_id,
            path,
            mime_type,
        } => access.recreate_file(&storage_id, &path, mime_type.as_deref()),
        Command::Space { storage_id } => {
            let space = access.try_space(&storage_id);
            return match space {
                Ok(space) => {
                    println!("capacity\t{}", space.capacity);
                    println!("free\t{}", space.free);
                    println!("used\t{}", space.used());
                    Ok(true)
                }
                Err(e) => {
                    eprintln!("Error: {e}");
                    Ok(false)
                }
            };
        }
        Command::Uri { storage_id, path } => {
            println!("{}", access.tree_uri(&storage_id, &path));
            return Ok(true);
        }
        Command::Browse { storage_id, path } => {
            let start = match access.try_resolve(&storage_id, &path) {
                Ok(node) if node.is_directory() => node,
                Ok(_) => bail!("{storage_id}:{path} is not a folder"),
                Err(e) => {
                    eprintln!("Error: {e}");
                    return Ok(false);
                }
            };
            browse(browser::App::new(start, &path))?;
            return Ok(true);
        }
    };

    match node {
        Some(node) => {
            print_node(&node);
            Ok(true)
        }
        None => {
            eprintln!("No result (run with RUST_LOG=debug for details)");
            Ok(false)
        }
    }
}

fn browse(mut app: browser::App) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = browser::run_app(&mut terminal, &mut app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    res
}

fn main() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    let args: Vec<String> = env::args().skip(1).collect();
    let invocation = match parse_args(&args) {
        Ok(invocation) => invocation,
        Err(e) => {
            eprintln!("Error: {e}");
            eprintln!("{USAGE}");
            process::exit(2);
        }
    };

    let config_path = invocation
        .config_path
        .unwrap_or_else(Config::config_path);
    let config = match Config::load_from_path(&config_path) {
        Ok(Some(config)) => config,
        Ok(None) => {
            eprintln!("Error: No config file found at {}", config_path.display());
            eprintln!("Create one with at least: primary_root = \"/path/to/storage\"");
            process::exit(1);
        }
        Err(e) => {
            eprintln!("Error: Failed to load config file: {e}");
            process::exit(1);
        }
    };

    let access = build_access(&config);
    if !run(&access, invocation.command)? {
        process::exit(1);
    }
    Ok(())
}
