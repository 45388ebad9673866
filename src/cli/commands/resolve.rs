//! Resolve command - resolve a ref to a commit and its submodules

use crate::cache::{create_treeish_resolver, Treeish};
use crate::cli::args::{OutputFormat, ResolveArgs};
use crate::cli::commands::run_blocking;
use crate::config::Config;
use crate::deadline::Deadline;
use crate::error::MorphResult;
use crate::ui::{self, TaskSpinner, UiContext};
use console::style;

/// Execute the resolve command
pub async fn execute(args: ResolveArgs, config: &Config) -> MorphResult<()> {
    let ignore = args.ignore_submodules || config.git.ignore_submodules;
    let resolver = create_treeish_resolver(config)?.ignore_submodules(ignore);
    let deadline = Deadline::from_secs(config.git.timeout_secs);

    let ctx = UiContext::detect();
    let mut spinner = TaskSpinner::new(&ctx);
    spinner.start(&format!("Resolving {} {}...", args.repo, args.reference));

    let (repo, reference) = (args.repo.clone(), args.reference.clone());
    let treeish = match run_blocking(deadline, move |d| {
        resolver.get_treeish(&repo, &reference, d)
    })
    .await
    {
        Ok(t) => {
            spinner.stop(&format!("Resolved {}", args.reference));
            t
        }
        Err(e) => {
            spinner.stop_error(&format!("Could not resolve {}", args.reference));
            return Err(e);
        }
    };

    match args.format {
        OutputFormat::Table => print_treeish_table(&treeish),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&treeish)?),
        OutputFormat::Plain => println!("{}", treeish.sha1),
    }

    Ok(())
}

fn print_treeish_table(treeish: &Treeish) {
    ui::key_value("Repo", &treeish.repo);
    ui::key_value("URL", &treeish.url);
    ui::key_value("Commit", &treeish.sha1);
    ui::key_value("Ref", treeish.ref_path.as_deref().unwrap_or("-"));

    if treeish.submodules.is_empty() {
        return;
    }

    println!();
    println!("{:<30} {:<42} {}", "SUBMODULE", "COMMIT", "URL");
    println!("{}", "-".repeat(100));
    for sub in &treeish.submodules {
        println!(
            "{:<30} {:<42} {}",
            style(&sub.path).cyan(),
            sub.commit,
            sub.url
        );
    }
}
