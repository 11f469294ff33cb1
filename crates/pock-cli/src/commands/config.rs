use std::path::{Path, PathBuf};

use crate::cli::ConfigCommands;
use crate::commands::common::CliContext;
use crate::config_profiles::{default_config_path, CliProfilesConfig};
use crate::error::CliError;

pub fn run_config(
    command: ConfigCommands,
    global_profile: Option<&str>,
    cli_db_path: Option<PathBuf>,
) -> Result<(), CliError> {
    match command {
        ConfigCommands::Init {
            profile,
            storage_dir,
            page_size,
            no_activate,
        } => {
            let path = default_config_path();
            let profile_name = run_config_init(
                &path,
                profile.as_deref().or(global_profile),
                storage_dir,
                page_size,
                no_activate,
            )?;
            println!(
                "Profile '{}' initialized at {}",
                profile_name,
                path.display()
            );
            Ok(())
        }
        ConfigCommands::Show => {
            let ctx = CliContext::load(cli_db_path, global_profile)?;
            for line in describe_context(&ctx)? {
                println!("{line}");
            }
            Ok(())
        }
    }
}

/// Merge the given settings into a profile and save the config file.
///
/// Returns the resolved profile name.
pub fn run_config_init(
    config_path: &Path,
    profile_name: Option<&str>,
    storage_dir: Option<PathBuf>,
    page_size: Option<usize>,
    no_activate: bool,
) -> Result<String, CliError> {
    let mut config = CliProfilesConfig::load_from_path(config_path).map_err(CliError::Config)?;
    let profile_name = config.resolve_profile_name(profile_name);

    if let Some(size) = page_size {
        pock_core::config::parse_page_size(&size.to_string())?;
    }

    let profile = config.profile_mut_or_default(&profile_name);
    if let Some(dir) = storage_dir {
        profile.storage_dir = Some(dir.to_string_lossy().into_owned());
    }
    if let Some(size) = page_size {
        profile.page_size = Some(size);
    }

    if !no_activate {
        config.active_profile = Some(profile_name.clone());
    }

    config.save_to_path(config_path).map_err(CliError::Config)?;
    tracing::debug!(profile = %profile_name, "Saved CLI profile");
    Ok(profile_name)
}

pub fn describe_context(ctx: &CliContext) -> Result<Vec<String>, CliError> {
    Ok(vec![
        format!("profile:    {}", ctx.profile_name),
        format!("database:   {}", ctx.db_path.display()),
        format!(
            "replica:    {}",
            ctx.client_config
                .replica
                .as_ref()
                .and_then(|replica| replica.url.as_deref())
                .unwrap_or("(local only)")
        ),
        format!("page size:  {}", ctx.page_size(None)?),
        format!("storage:    {}", ctx.storage().describe()),
        format!("config:     {}", default_config_path().display()),
    ])
}
