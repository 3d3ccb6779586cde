//! Interactive first-run configuration
//!
//! Walks the operator through the keys a fresh install needs and persists
//! the result. Existing values are offered as defaults.

use std::io::{self, Write};
use std::path::Path;

use anyhow::{Context, Result};

use sl_core::config;

/// Run the setup wizard and save the resulting configuration
pub fn run_setup(path: &Path) -> Result<()> {
    let mut config = config::load_config(path);

    println!("=== Screenlink agent setup ===");
    config.server_url = prompt("Coordinator URL", &config.server_url)?;
    config.register_token = prompt("Registration token", &config.register_token)?;
    config.machine_name = prompt("Machine name", &config.machine_name)?;
    config.vnc_port = prompt_port("Screen-share port", config.vnc_port)?;

    config.ssh_enabled = prompt_yes_no("Report direct SSH access?", config.ssh_enabled)?;
    if config.ssh_enabled {
        config.ssh_username = prompt("SSH username", &config.ssh_username)?;
        config.ssh_password = prompt("SSH password (empty to use a key)", &config.ssh_password)?;
        if config.ssh_password.is_empty() {
            config.ssh_private_key_path =
                prompt("Private key path", &config.ssh_private_key_path)?;
        }
    }

    config.reverse_tunnel_enabled =
        prompt_yes_no("Open a reverse tunnel?", config.reverse_tunnel_enabled)?;
    if config.reverse_tunnel_enabled {
        config.server_ssh_host = prompt(
            "Tunnel host (empty to derive from the coordinator URL)",
            &config.server_ssh_host,
        )?;
        config.server_ssh_username = prompt("Tunnel username", &config.server_ssh_username)?;
        config.server_ssh_password = prompt("Tunnel password", &config.server_ssh_password)?;
    }

    config::save_config(path, &config).context("Failed to save configuration")?;
    println!("Configuration saved to {}", path.display());
    Ok(())
}

fn prompt(label: &str, default: &str) -> io::Result<String> {
    print!("{} [{}]: ", label, default);
    io::stdout().flush()?;

    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    let line = line.trim();

    Ok(if line.is_empty() {
        default.to_string()
    } else {
        line.to_string()
    })
}

fn prompt_port(label: &str, default: u16) -> io::Result<u16> {
    loop {
        let answer = prompt(label, &default.to_string())?;
        match answer.parse() {
            Ok(port) => return Ok(port),
            Err(_) => println!("Not a valid port: {}", answer),
        }
    }
}

fn prompt_yes_no(label: &str, default: bool) -> io::Result<bool> {
    let hint = if default { "Y/n" } else { "y/N" };
    let answer = prompt(&format!("{} [{}]", label, hint), "")?;
    Ok(match answer.to_lowercase().as_str() {
        "y" | "yes" => true,
        "n" | "no" => false,
        _ => default,
    })
}
