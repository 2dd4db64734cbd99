use std::path::Path;
use std::str::FromStr;

use anyhow::Context;
use tokio::runtime;

mod app;
mod cli;
mod config;
mod dns;
mod dns_conf;
mod dns_error;
mod error;
mod forward;
mod libdns;
mod log;
mod resolver;
mod zone;

use crate::{
    app::App,
    cli::{Cli, Commands},
    dns::{build_message, DnsResponse, Name, RecordType},
    dns_conf::RuntimeConfig,
    libdns::proto::op::Query,
    log::{error, info, Level},
    resolver::Resolver,
    zone::ZoneKind,
};

/// Returns a version as specified in Cargo.toml
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

fn main() {
    use clap::Parser;

    let cli = Cli::parse();
    let _guard = log::default(cli.log_level().unwrap_or(Level::ERROR));

    if let Err(err) = cli.run() {
        error!("{:#}", err);
        std::process::exit(1);
    }
}

impl Cli {
    pub fn run(self) -> anyhow::Result<()> {
        let console_level = self.log_level().unwrap_or(Level::ERROR);

        let runtime = runtime::Builder::new_multi_thread()
            .enable_all()
            .worker_threads(2)
            .thread_name("zonekeeper-runtime")
            .build()
            .context("failed to initialize Tokio Runtime")?;

        match self.command {
            Commands::Check { conf } => {
                let (cfg, _guard) = load_config(&conf, false, console_level)?;
                runtime.block_on(check(&cfg))
            }
            Commands::Resolve {
                conf,
                name,
                record_type,
                tcp,
            } => {
                let (cfg, _guard) = load_config(&conf, tcp, console_level)?;
                runtime.block_on(resolve(&cfg, &name, &record_type))
            }
        }
    }
}

/// Reads `path` and installs logging with the levels it asks for.
fn load_config(
    path: &Path,
    force_tcp: bool,
    console_level: Level,
) -> anyhow::Result<(RuntimeConfig, log::subscriber::DefaultGuard)> {
    let mut cfg = RuntimeConfig::load(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;

    if force_tcp {
        cfg.force_tcp();
    }

    let guard = log::init_global_default(
        cfg.log_level().unwrap_or(console_level),
        cfg.log_filter(),
    );

    cfg.summary();
    Ok((cfg, guard))
}

async fn check(cfg: &RuntimeConfig) -> anyhow::Result<()> {
    let app = App::build(cfg).await?;
    for zone in app.zones().zones() {
        let kind = match zone.kind() {
            ZoneKind::Primary => "primary".to_string(),
            ZoneKind::Secondary {
                primary_dns,
                downloaded,
            } => match downloaded {
                Some(at) => format!("secondary of {}, downloaded {}", primary_dns, at),
                None => format!("secondary of {}", primary_dns),
            },
        };
        println!(
            "zone {} {} ({}): {} records, serial {}",
            zone.origin(),
            zone.class(),
            kind,
            zone.records().len(),
            zone.serial()
                .map(|s| s.to_string())
                .unwrap_or_else(|| "-".to_string())
        );
    }

    for forwarder in app.forwarders() {
        println!(
            "resolver {}: {}, failover detection {}",
            forwarder.name(),
            if forwarder.is_online() { "online" } else { "offline" },
            if forwarder.detects_failures() { "on" } else { "off" }
        );
    }

    app.unload().await;
    info!("configuration OK");
    Ok(())
}

async fn resolve(cfg: &RuntimeConfig, name: &str, record_type: &str) -> anyhow::Result<()> {
    let mut name = Name::from_str(name).with_context(|| format!("invalid domain name {}", name))?;
    name.set_fqdn(true);

    let record_type = RecordType::from_str(&record_type.to_ascii_uppercase())
        .with_context(|| format!("invalid record type {}", record_type))?;

    let app = App::build(cfg).await?;
    let request = build_message(Query::query(name, record_type));

    match app.resolve(&request).await {
        Some(response) => print_response(&response),
        None => println!("no answer"),
    }

    app.unload().await;
    Ok(())
}

fn print_response(response: &DnsResponse) {
    println!(
        ";; {} id {} aa {}",
        response.response_code(),
        response.id(),
        response.authoritative()
    );

    let sections = [
        ("ANSWER", response.answers()),
        ("AUTHORITY", response.name_servers()),
        ("ADDITIONAL", response.additionals()),
    ];

    for (title, records) in sections {
        if records.is_empty() {
            continue;
        }
        println!();
        println!(";; {} SECTION:", title);
        for record in records {
            println!("{}", record);
        }
    }
}
