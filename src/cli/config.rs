use crate::config::generate::generate_starter_config;
use crate::source::TimestampMatcher;
use std::fs;
use std::path::PathBuf;

pub fn init(stdout: bool) -> Result<(), Box<dyn std::error::Error>> {
    write_config(&generate_starter_config(), stdout)
}

fn write_config(config_content: &str, stdout: bool) -> Result<(), Box<dyn std::error::Error>> {
    if stdout {
        print!("{}", config_content);
        return Ok(());
    }

    // Prefer ~/.config/logcrunch/config.yml, fall back to /etc/logcrunch
    let user_config = dirs::home_dir().map(|home| home.join(".config/logcrunch/config.yml"));
    let config_path = match user_config {
        Some(path) => match path.parent().map(fs::create_dir_all) {
            Some(Err(e)) => {
                eprintln!("Warning: could not create {}: {}", path.display(), e);
                eprintln!("Falling back to /etc/logcrunch/config.yml");
                PathBuf::from("/etc/logcrunch/config.yml")
            }
            _ => path,
        },
        None => PathBuf::from("/etc/logcrunch/config.yml"),
    };

    if config_path.exists() {
        return Err(format!(
            "config file already exists at {}; remove it first or use --stdout",
            config_path.display()
        )
        .into());
    }

    if let Some(parent) = config_path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&config_path, config_content)?;

    println!("Config file written to {}", config_path.display());
    Ok(())
}

pub fn validate(config_path: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let path = config_path.ok_or("No config file found. Use --config to specify a path.")?;

    println!("Validating config file: {}", path.display());

    let config = crate::config::load_config(&path)?;
    TimestampMatcher::from_config(&config.timestamps)?;

    println!(
        "Config is valid ({} timestamp pattern(s))",
        config.timestamps.len()
    );
    Ok(())
}
