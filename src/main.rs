#![cfg_attr(not(test), deny(clippy::panic))]

use anyhow::Context;
use clap::Parser;
use server_identity::config::{self, Config, TlsServerConfig};
use server_identity::identity::{
    load_identity, Identity, IdentityProvisioner, JsonFileStore, SelfSignedIssuer, SharedIdentity,
};
use server_identity::logging;
use server_identity::security::{build_server_config, hardened_provider, install_process_default};
use std::fs;

/// Provision the TLS identity of every configured server and print its fingerprint
#[derive(Parser, Debug)]
#[command(name = "server-identity")]
#[command(
    about = "Ensures each configured server has a usable TLS certificate and prints its SHA-256 fingerprint"
)]
#[command(version)]
struct Cli {
    /// Validate configuration and exit without provisioning anything.
    /// Useful for CI/CD pipelines and pre-deployment checks.
    #[arg(long, short = 'c', conflicts_with = "print_config")]
    validate_config: bool,

    /// Print the loaded configuration to stdout (as JSON) and exit.
    /// Useful for debugging configuration loading from multiple sources.
    #[arg(long, conflicts_with = "validate_config")]
    print_config: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let cfg = config::load();

    if cli.print_config {
        let json = serde_json::to_string_pretty(&cfg)
            .map_err(|e| anyhow::anyhow!("Failed to serialize config: {e}"))?;
        println!("{json}");
        return Ok(());
    }

    // load() only reports validation problems; here they are fatal.
    let validation_result = config::validate_config(&cfg);

    if cli.validate_config {
        match validation_result {
            Ok(()) => {
                println!("Configuration validation passed");
                println!();
                println!("Configuration summary:");
                println!("  Servers: {}", cfg.identity.servers.join(", "));
                println!("  State file: {}", cfg.identity.state_path);
                println!(
                    "  Self-signed keys: RSA-{} / {:?}",
                    cfg.identity.key_bits, cfg.identity.signature_hash
                );
                println!(
                    "  Default identity configured: {}",
                    cfg.tls.has_default_identity()
                );
                println!("  Minimum cipher strength: {} bits", cfg.tls.min_cipher_bits);
                return Ok(());
            }
            Err(e) => {
                eprintln!("Configuration validation failed:\n{e}");
                std::process::exit(1);
            }
        }
    }

    validation_result?;

    logging::init_with_config(&cfg.logging);

    run(&cfg).inspect_err(|err| tracing::error!(error = %format!("{err:#}"), "Startup failed"))
}

fn run(cfg: &Config) -> anyhow::Result<()> {
    let provider = hardened_provider(
        rustls::crypto::aws_lc_rs::default_provider(),
        cfg.tls.min_cipher_bits,
    )?;
    let provider = install_process_default(provider)?;

    let shared = match default_identity(&cfg.tls)? {
        Some(identity) => SharedIdentity::seeded(identity),
        None => SharedIdentity::new(),
    };
    let provisioner = IdentityProvisioner::new(
        SelfSignedIssuer::new(cfg.identity.issuer_options()),
        shared,
    );

    for server_id in &cfg.identity.servers {
        let mut store = JsonFileStore::open(&cfg.identity.state_path, server_id.as_str())
            .with_context(|| format!("failed to open identity state for server {server_id}"))?;

        let provisioned = provisioner.provision(server_id, &mut store)?;
        build_server_config(provisioned.identity(), provider.clone())
            .with_context(|| format!("failed to configure TLS for server {server_id}"))?;

        println!("{server_id} {}", provisioned.digest());
    }

    Ok(())
}

/// Read the process-wide default identity named by `tls.*`, if any.
///
/// Unreadable files are fatal; unusable contents are not.
fn default_identity(tls: &TlsServerConfig) -> anyhow::Result<Option<Identity>> {
    let (Some(cert_path), Some(key_path)) = (&tls.certificate_path, &tls.private_key_path) else {
        return Ok(None);
    };

    let certificate = fs::read(cert_path)
        .with_context(|| format!("failed to read TLS certificate at {cert_path}"))?;
    let key =
        fs::read(key_path).with_context(|| format!("failed to read TLS private key at {key_path}"))?;
    let passphrase = tls.passphrase.as_deref().unwrap_or_default();

    let identity = load_identity(&certificate, &key, passphrase.as_bytes());
    match &identity {
        Some(identity) => tracing::info!(
            common_name = identity.certificate().common_name().unwrap_or_default(),
            "Loaded default server certificate"
        ),
        None => tracing::warn!(
            certificate_path = %cert_path,
            private_key_path = %key_path,
            "Default server certificate is unusable, servers without their own will fall back"
        ),
    }
    Ok(identity)
}

#[cfg(test)]
mod cli_tests {
    use super::Cli;
    use clap::Parser;

    #[test]
    fn test_cli_default_no_flags() {
        let cli = Cli::try_parse_from(["server-identity"]).unwrap();
        assert!(!cli.validate_config);
        assert!(!cli.print_config);
    }

    #[test]
    fn test_cli_validate_config_short() {
        let cli = Cli::try_parse_from(["server-identity", "-c"]).unwrap();
        assert!(cli.validate_config);
        assert!(!cli.print_config);
    }

    #[test]
    fn test_cli_print_config() {
        let cli = Cli::try_parse_from(["server-identity", "--print-config"]).unwrap();
        assert!(!cli.validate_config);
        assert!(cli.print_config);
    }

    #[test]
    fn test_cli_validate_and_print_config_conflict() {
        let result = Cli::try_parse_from(["server-identity", "--validate-config", "--print-config"]);
        let err = result.unwrap_err();
        assert!(err.to_string().contains("cannot be used with"));
    }

    #[test]
    fn test_cli_help_contains_flags() {
        // --help exits early, which clap reports as an error
        let err = Cli::try_parse_from(["server-identity", "--help"]).unwrap_err();
        let help_text = err.to_string();
        assert!(help_text.contains("--validate-config"));
        assert!(help_text.contains("--print-config"));
    }
}
