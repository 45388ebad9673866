//! Repo command - manage repository mirrors

use crate::cache::create_repo_cache;
use crate::cli::args::{RepoAction, RepoArgs};
use crate::cli::commands::run_blocking;
use crate::config::Config;
use crate::deadline::Deadline;
use crate::error::{MorphError, MorphResult};
use crate::ui::{self, TaskSpinner, UiContext};

/// Execute the repo command
pub async fn execute(args: RepoArgs, config: &Config) -> MorphResult<()> {
    let cache = create_repo_cache(config)?;
    let deadline = Deadline::from_secs(config.git.timeout_secs);
    let ctx = UiContext::detect();

    match args.action {
        RepoAction::Has { name } => {
            if !cache.has_repo(&name)? {
                return Err(MorphError::NotCached { repo: name });
            }
            let repo = cache.get_repo(&name)?;
            println!("{}", repo.path().display());
        }
        RepoAction::Cache { name } => {
            if cache.has_repo(&name)? {
                let repo = cache.get_repo(&name)?;
                ui::step_ok_detail(&ctx, "Already cached", &repo.path().display().to_string());
                println!("{}", repo.path().display());
                return Ok(());
            }

            let mut spinner = TaskSpinner::new(&ctx);
            spinner.start(&format!("Caching {}...", name));
            let label = name.clone();
            match run_blocking(deadline, move |d| cache.cache_repo(&name, d)).await {
                Ok(repo) => {
                    spinner.stop(&format!("Cached {}", label));
                    println!("{}", repo.path().display());
                }
                Err(e) => {
                    spinner.stop_error(&format!("Could not cache {}", label));
                    return Err(e);
                }
            }
        }
        RepoAction::Update { name } => {
            let mut spinner = TaskSpinner::new(&ctx);
            spinner.start(&format!("Updating {}...", name));
            let label = name.clone();
            match run_blocking(deadline, move |d| cache.update_repo(&name, d)).await {
                Ok(_) => spinner.stop(&format!("Updated {}", label)),
                Err(e) => {
                    spinner.stop_error(&format!("Could not update {}", label));
                    return Err(e);
                }
            }
        }
    }

    Ok(())
}
