use clap::Parser;
use snipkeep::cli::{BackupCommand, Cli, Command, SnapshotCommand};
use snipkeep::config::Config;
use snipkeep::error::Result;
use snipkeep::logging;
use snipkeep::manager::{SnippetInput, SnippetManager};
use snipkeep::prune::PruneMode;
use snipkeep::report::{self, table};

fn prune_mode(dry_run: bool) -> PruneMode {
    if dry_run {
        PruneMode::DryRun
    } else {
        PruneMode::Execute
    }
}

fn run(cli: Cli, config: Config) -> Result<()> {
    let mut manager = SnippetManager::open(config.db_path(), config.manager_options())?;

    match cli.command {
        Command::Add(args) => {
            let input = SnippetInput::new(args.name, args.command)
                .with_description(args.description)
                .with_tags(args.tags);
            let id = manager.add(&input, !args.unique)?;
            println!("added snippet #{id}");
        }
        Command::List(args) => {
            report::print_snippets(&manager.all()?, args.json)?;
        }
        Command::Search(args) => {
            report::print_snippets(&manager.find(&args.term, &args.tags)?, args.json)?;
        }
        Command::Show(args) => {
            report::print_snippet(&manager.details(args.id)?, args.json)?;
        }
        Command::Edit(args) => {
            let current = manager.details(args.id)?;
            let input = SnippetInput {
                name: args.name.unwrap_or(current.name),
                description: args.description.unwrap_or(current.description),
                command_text: args.command.unwrap_or(current.command_text),
                tags: args.tags.unwrap_or(current.tags),
            };
            manager.update(args.id, &input)?;
            println!("updated snippet #{}", args.id);
        }
        Command::Delete(args) => {
            if manager.delete(args.id)? {
                println!("deleted snippet #{}", args.id);
            } else {
                println!("no snippet #{}", args.id);
            }
        }
        Command::Use(args) => {
            let snippet = manager.details(args.id)?;
            manager.record_usage(args.id)?;
            println!("{}", snippet.command_text);
        }
        Command::Tags => {
            print!("{}", table::render_tags(&manager.tags()?));
        }
        Command::Backup(command) => match command {
            BackupCommand::Create(args) => {
                let path = manager.backup(args.dir.as_deref())?;
                println!("backup written to {}", path.display());
            }
            BackupCommand::List(args) => {
                print!("{}", table::render_backups(&manager.list_backups(args.dir.as_deref())?));
            }
            BackupCommand::Restore(args) => {
                let safety = manager.restore_backup(&args.path, !args.discard)?;
                println!("database restored from {}", args.path.display());
                if let Some(safety) = safety {
                    println!("previous database saved to {}", safety.display());
                }
            }
            BackupCommand::Prune(args) => {
                let keep = args.keep.unwrap_or(config.backup_keep);
                let result = manager.prune_backups(None, keep, prune_mode(args.dry_run))?;
                print!("{}", table::render_prune(&result, args.dry_run));
                report_prune_errors(&result.errors);
            }
        },
        Command::Snapshot(command) => match command {
            SnapshotCommand::List(args) => {
                print!("{}", table::render_snapshots(&manager.list_snapshots(args.limit)?));
            }
            SnapshotCommand::Show(args) => {
                let snapshot = manager.snapshot(&args.id)?;
                let diff = manager.snapshot_diff(&args.id)?;
                print!("{}", table::render_snapshot(&snapshot, &diff));
            }
            SnapshotCommand::Restore(args) => {
                let safety = manager.restore_snapshot(&args.id, !args.after)?;
                let side = if args.after { "after" } else { "before" };
                println!("database restored to the state {side} snapshot {}", args.id);
                if let Some(safety) = safety {
                    println!("previous database saved to {}", safety.display());
                }
            }
            SnapshotCommand::Prune(args) => {
                let keep = args.keep.unwrap_or(config.snapshot_keep);
                let result = manager.prune_snapshots(keep, prune_mode(args.dry_run));
                print!("{}", table::render_prune(&result, args.dry_run));
                report_prune_errors(&result.errors);
            }
        },
        Command::Export(args) => {
            let path = manager.export_to_file(args.output.as_deref())?;
            println!("exported {} snippet(s) to {}", manager.count()?, path.display());
        }
        Command::Import(args) => {
            let stats = manager.import_from_file(&args.file, args.replace)?;
            print!("{}", table::render_import(&stats));
        }
    }

    Ok(())
}

fn report_prune_errors(errors: &[String]) {
    if !errors.is_empty() {
        eprintln!("\nerrors encountered:");
        for error in errors {
            eprintln!("  {error}");
        }
    }
}

fn main() {
    let cli = Cli::parse();

    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config.with_data_dir(cli.data_dir.clone()),
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    };

    logging::init(&config.log_level, cli.verbose);

    if let Err(e) = run(cli, config) {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
