use std::process::ExitCode;

use clap::Parser;

use edge_syncer::config::SyncConfig;
use edge_syncer::error::{Error, Result};
use edge_syncer::sync::{PullOptions, SyncOptions, SyncReport, Syncer};

mod config;

#[derive(Parser)]
#[command(name = "edge-syncer", version, about = "Sync DNS zones, pull zones and edge rules from a YAML configuration")]
struct Args {
    /// Path to the YAML configuration file (required unless pulling).
    #[arg(short, long, required_unless_present = "pull")]
    config: Option<String>,

    /// Restrict the run to one configured domain.
    #[arg(short, long)]
    domain: Option<String>,

    /// Report planned changes without applying them.
    #[arg(short = 'n', long)]
    dry_run: bool,

    /// Sync DNS zones only.
    #[arg(long, conflicts_with = "pullzones_only")]
    dns_only: bool,

    /// Sync pull zones and edge rules only.
    #[arg(long)]
    pullzones_only: bool,

    /// Keep remote DNS records that are absent from the configuration.
    #[arg(long)]
    no_delete: bool,

    /// Account access key.
    #[arg(long, env = "BUNNY_API_KEY", hide_env_values = true)]
    api_key: String,

    /// Print remote state as YAML instead of syncing (--domain or --all).
    #[arg(long)]
    pull: bool,

    /// With --pull: export every DNS zone and pull zone on the account.
    #[arg(long, requires = "pull")]
    all: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<()> {
    let syncer = Syncer::new(&args.api_key);

    if args.pull {
        return pull(&syncer, &args).await;
    }

    let config_path = args
        .config
        .as_deref()
        .ok_or_else(|| Error::Config("--config is required to sync".to_string()))?;
    let config = config::Parser::parse_yaml(config_path)?;
    let options = SyncOptions {
        dry_run: args.dry_run,
        delete_extra_records: !args.no_delete,
        domain: args.domain.clone(),
    };

    let report = if args.dns_only {
        syncer.sync_dns_only(&config, &options).await?
    } else if args.pullzones_only {
        syncer.sync_pull_zones_only(&config, &options).await?
    } else {
        syncer.sync(&config, &options).await?
    };

    print_report(&report);
    Ok(())
}

async fn pull(syncer: &Syncer, args: &Args) -> Result<()> {
    let options = PullOptions {
        dns_only: args.dns_only,
        pullzones_only: args.pullzones_only,
    };

    let config = if args.all {
        syncer.pull_all_domains(&options).await?
    } else if let Some(domain) = args.domain.as_deref() {
        let Some(domain_config) = syncer.pull_domain(domain, &options).await? else {
            return Err(Error::NotFound(format!(
                "no dns zone or pull zone found for domain '{domain}'"
            )));
        };
        let mut config = SyncConfig::default();
        config.domains.insert(domain.to_string(), domain_config);
        config
    } else {
        return Err(Error::Config(
            "--pull requires either --domain or --all".to_string(),
        ));
    };

    print!("{}", serde_yaml::to_string(&config)?);
    Ok(())
}

fn print_report(report: &SyncReport) {
    if report.dry_run {
        println!("Dry run: no changes were applied");
    }

    for zone in &report.dns_zones {
        println!("DNS zone {}:", zone.zone);
        if zone.zone_created {
            println!("  + zone created");
        }
        for record in &zone.created {
            println!("  + {record}");
        }
        for record in &zone.updated {
            println!("  ~ {record}");
        }
        for record in &zone.deleted {
            println!("  - {record}");
        }
        if !zone.zone_created
            && zone.created.is_empty()
            && zone.updated.is_empty()
            && zone.deleted.is_empty()
        {
            println!("  no changes");
        }
    }

    for zone in &report.pull_zones {
        println!("Pull zone {}:", zone.zone);
        for change in &zone.changes {
            println!("  {change}");
        }
        if let Some(rules) = &zone.edge_rules {
            for change in &rules.changes {
                println!("  {change}");
            }
        }
        if zone.changes.is_empty()
            && zone.edge_rules.as_ref().is_none_or(|r| r.changes.is_empty())
        {
            println!("  no changes");
        }
    }

    let s = &report.summary;
    println!(
        "Summary: dns records {}+/{}~/{}-, pull zones {}+/{}~, hostnames {}+/{}-, edge rules {}+/{}-",
        s.dns_records_created,
        s.dns_records_updated,
        s.dns_records_deleted,
        s.pull_zones_created,
        s.pull_zones_updated,
        s.hostnames_added,
        s.hostnames_removed,
        s.edge_rules_created,
        s.edge_rules_deleted,
    );
}
