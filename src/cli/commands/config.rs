//! Config command - show or initialize configuration

use crate::cli::args::{ConfigAction, ConfigArgs};
use crate::config::{Config, ConfigManager};
use crate::error::MorphResult;
use crate::ui::{self, UiContext};

/// Execute the config command
pub async fn execute(
    args: ConfigArgs,
    manager: &ConfigManager,
    config: &Config,
) -> MorphResult<()> {
    match args.action {
        None | Some(ConfigAction::Show) => show_config(config)?,
        Some(ConfigAction::Path) => println!("{}", manager.path().display()),
        Some(ConfigAction::Init { force }) => init_config(manager, force).await?,
    }

    Ok(())
}

/// Print the effective configuration, defaults filled in
fn show_config(config: &Config) -> MorphResult<()> {
    let mut effective = config.clone();
    effective.cache.dir = Some(config.cache_dir());
    println!("{}", toml::to_string_pretty(&effective)?);
    Ok(())
}

async fn init_config(manager: &ConfigManager, force: bool) -> MorphResult<()> {
    let ctx = UiContext::detect();
    let path = manager.path();

    if path.exists() && !force {
        ui::step_warn_hint(
            &ctx,
            &format!("Config already exists at {}", path.display()),
            "Use --force to overwrite",
        );
        return Ok(());
    }

    manager.save(&Config::default()).await?;

    ui::step_ok_detail(
        &ctx,
        "Configuration initialized",
        &path.display().to_string(),
    );
    ui::step_info(&ctx, "Set cache.bundle_server to seed mirrors from bundles");

    Ok(())
}
