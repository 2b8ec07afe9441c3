//! Config subcommand handlers.

use secrecy::SecretString;

use duetlapse_config::{Config, render_config, save_config, starter_config, store_webcam_password};

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config;
use crate::error::CliError;

const MASK: &str = "********";

/// Copy of `cfg` safe to print.
fn redacted(cfg: &Config) -> Config {
    let mut shown = cfg.clone();
    if shown.webcam.password.is_some() {
        shown.webcam.password = Some(MASK.into());
    }
    shown
}

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Init { force } => {
            let path = config::config_file(global);
            if path.exists() && !force {
                return Err(CliError::Validation {
                    field: "config".into(),
                    reason: format!("{} already exists (use --force to overwrite)", path.display()),
                });
            }

            save_config(&starter_config(), &path)?;
            eprintln!("✓ Config written to {}", path.display());
            eprintln!("  Edit the printer host, webcam URL and output folder, then run: duetlapse run");
            Ok(())
        }

        ConfigCommand::Show => {
            let cfg = config::load(global)?;
            print!("{}", render_config(&redacted(&cfg))?);
            Ok(())
        }

        ConfigCommand::Path => {
            println!("{}", config::config_file(global).display());
            Ok(())
        }

        ConfigCommand::SetPassword => {
            let password = rpassword::prompt_password("Webcam password: ").map_err(|e| {
                CliError::Validation {
                    field: "password".into(),
                    reason: format!("prompt failed: {e}"),
                }
            })?;
            if password.is_empty() {
                return Err(CliError::Validation {
                    field: "password".into(),
                    reason: "password cannot be empty".into(),
                });
            }

            store_webcam_password(&SecretString::from(password))?;
            eprintln!("✓ Webcam password stored in system keyring");
            Ok(())
        }
    }
}
