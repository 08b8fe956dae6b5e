use clap::Subcommand;
use mindwell_core::error::ConfigError;
use mindwell_core::Config;

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print one value by dot-separated key (e.g. "timer.focus_minutes")
    Get { key: String },
    /// Change one value and save; the result must still validate
    Set { key: String, value: String },
    /// Print the whole configuration as TOML
    List,
    /// Overwrite the configuration file with defaults
    Reset,
}

pub fn run(action: ConfigAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        ConfigAction::Get { key } => {
            let value = Config::load_or_default()
                .get(&key)
                .ok_or(ConfigError::UnknownKey(key))?;
            println!("{value}");
        }
        ConfigAction::Set { key, value } => {
            Config::load()?.set(&key, &value)?;
            tracing::debug!("saved {} = {}", key, value);
            println!("ok");
        }
        ConfigAction::List => {
            println!("{}", toml::to_string_pretty(&Config::load_or_default())?);
        }
        ConfigAction::Reset => {
            Config::default().save()?;
            println!("config reset to defaults");
        }
    }
    Ok(())
}
