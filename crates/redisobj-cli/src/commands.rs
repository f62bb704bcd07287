use std::path::Path;
use std::time::Duration;

use anyhow::Context as _;
use colored::Colorize;
use redisobj::{KeyLayout, KeyRole, Options, PlanSummary, Store, StoreConfig};
use redisobj_client::{Context, InMemoryClient};
use serde::Serialize;

use crate::cli::*;
use crate::demo::{Order, Root, Sample};

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(cli.config.as_deref())?;
    match cli.command {
        Command::Plan(args) => match args.record {
            DemoRecord::Root => cmd_plan::<Root>(&config, cli.format),
            DemoRecord::Order => cmd_plan::<Order>(&config, cli.format),
        },
        Command::Keys(args) => match args.record {
            DemoRecord::Root => cmd_keys::<Root>(&config, cli.format),
            DemoRecord::Order => cmd_keys::<Order>(&config, cli.format),
        },
        Command::Demo(args) => match args.record {
            DemoRecord::Root => cmd_demo::<Root>(&config, &args, cli.format),
            DemoRecord::Order => cmd_demo::<Order>(&config, &args, cli.format),
        },
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<StoreConfig> {
    let Some(path) = path else {
        return Ok(StoreConfig::default());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let config = StoreConfig::from_toml_str(&text)
        .with_context(|| format!("parsing {}", path.display()))?;
    Ok(config)
}

fn open_store(config: &StoreConfig) -> anyhow::Result<Store<InMemoryClient>> {
    Ok(Store::with_config(InMemoryClient::new(), config.clone())?)
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn cmd_plan<R: Sample>(config: &StoreConfig, format: OutputFormat) -> anyhow::Result<()> {
    let store = open_store(config)?;
    let summary: PlanSummary = store.plan::<R>()?.summary();
    match format {
        OutputFormat::Json => print_json(&summary),
        OutputFormat::Text => {
            print!("{summary}");
            Ok(())
        }
    }
}

fn cmd_keys<R: Sample>(config: &StoreConfig, format: OutputFormat) -> anyhow::Result<()> {
    let store = open_store(config)?;
    let layout = store.keys_of(&R::sample())?;
    match format {
        OutputFormat::Json => print_json(&layout),
        OutputFormat::Text => {
            print_layout(&layout);
            Ok(())
        }
    }
}

fn role_label(role: &KeyRole) -> String {
    match role {
        KeyRole::Record { type_name } => format!("hash   {type_name}"),
        KeyRole::List { field } => format!("zset   {field}"),
        KeyRole::Map { field } => format!("hash   {field}"),
        KeyRole::Freshness => "string digest".to_string(),
    }
}

fn print_layout(layout: &KeyLayout) {
    for entry in &layout.entries {
        println!("  {:<48} {}", entry.key.cyan(), role_label(&entry.role).dimmed());
    }
}

#[derive(Debug, Serialize)]
struct PassReport {
    pass: usize,
    round_trips: u64,
    commands: usize,
    writes: usize,
}

#[derive(Debug, Serialize)]
struct KeyReport {
    key: String,
    kind: &'static str,
    ttl_secs: Option<u64>,
}

#[derive(Debug, Serialize)]
struct DemoReport {
    record: &'static str,
    caching: bool,
    passes: Vec<PassReport>,
    read_round_trips: u64,
    read_back_matches: bool,
    keys: Vec<KeyReport>,
}

fn key_kind(client: &InMemoryClient, key: &str) -> &'static str {
    if client.string(key).is_some() {
        "string"
    } else if client.sorted_set(key).is_some() {
        "zset"
    } else if client.hash(key).is_some() {
        "hash"
    } else {
        "none"
    }
}

fn run_demo<R: Sample>(config: &StoreConfig, args: &DemoArgs) -> anyhow::Result<DemoReport> {
    let store = open_store(config)?;
    let ctx = Context::background();
    let mut options = Options::new().with_caching(args.cache);
    if let Some(secs) = args.ttl {
        options = options.with_ttl(Duration::from_secs(secs));
    }

    let value = R::sample();
    let client = store.client();
    let mut passes = Vec::with_capacity(args.passes);
    for pass in 1..=args.passes {
        client.clear_log();
        let before = client.round_trips();
        store
            .write(&ctx, &value, &options)
            .with_context(|| format!("write pass {pass}"))?;
        let log = client.command_log();
        passes.push(PassReport {
            pass,
            round_trips: client.round_trips() - before,
            commands: log.len(),
            writes: log.iter().filter(|c| c.is_write()).count(),
        });
    }

    let before = client.round_trips();
    let mut read_back = value.stub();
    store.read(&ctx, &mut read_back, &options).context("read")?;
    let read_round_trips = client.round_trips() - before;

    let keys = client
        .keys()
        .into_iter()
        .map(|key| KeyReport {
            kind: key_kind(client, &key),
            ttl_secs: client.ttl(&key).map(|ttl| ttl.as_secs()),
            key,
        })
        .collect();

    Ok(DemoReport {
        record: R::TYPE_NAME,
        caching: args.cache,
        passes,
        read_round_trips,
        read_back_matches: read_back == value,
        keys,
    })
}

fn cmd_demo<R: Sample>(
    config: &StoreConfig,
    args: &DemoArgs,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let report = run_demo::<R>(config, args)?;
    if format == OutputFormat::Json {
        return print_json(&report);
    }

    let caching = if report.caching { "on".green() } else { "off".yellow() };
    println!("Record {} (caching {})", report.record.bold(), caching);
    for pass in &report.passes {
        println!(
            "  write #{}: {} round trips, {} commands ({} writes)",
            pass.pass,
            pass.round_trips.to_string().bold(),
            pass.commands,
            pass.writes
        );
    }
    let status = if report.read_back_matches {
        "✓".green().bold()
    } else {
        "✗".red().bold()
    };
    println!(
        "{} read back in {} round trip(s)",
        status,
        report.read_round_trips.to_string().bold()
    );
    println!("\nKeyspace:");
    for key in &report.keys {
        let ttl = match key.ttl_secs {
            Some(secs) => format!("ttl {secs}s"),
            None => "no ttl".to_string(),
        };
        println!("  {:<48} {:<6} {}", key.key.cyan(), key.kind, ttl.dimmed());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(cache: bool, ttl: Option<u64>) -> DemoArgs {
        DemoArgs {
            record: DemoRecord::Root,
            cache,
            ttl,
            passes: 2,
        }
    }

    #[test]
    fn uncached_demo_rewrites_every_pass() {
        let report = run_demo::<Root>(&StoreConfig::default(), &args(false, Some(60))).unwrap();
        assert!(report.read_back_matches);
        assert_eq!(report.read_round_trips, 1);
        assert_eq!(report.passes[0].commands, report.passes[1].commands);
        assert_eq!(report.passes[1].round_trips, 1);
        assert!(report.keys.iter().all(|k| k.ttl_secs == Some(60)));
        let names: Vec<_> = report.keys.iter().map(|k| k.key.as_str()).collect();
        assert_eq!(
            names,
            [
                "{redisobj:NestedWithOwnKey:c1}",
                "{redisobj:Root:u1}",
                "{redisobj:Root:u1}.Scores",
                "{redisobj:Root:u1}.Tags",
            ]
        );
    }

    #[test]
    fn cached_demo_skips_field_writes() {
        let report = run_demo::<Root>(&StoreConfig::default(), &args(true, None)).unwrap();
        assert!(report.read_back_matches);
        assert!(report.passes[1].writes < report.passes[0].writes);
        assert!(report
            .keys
            .iter()
            .any(|k| k.key == "{redisobj:Root:u1}.__HASH__" && k.kind == "string"));
    }

    #[test]
    fn embedded_order_round_trips() {
        let config = StoreConfig::default().with_root_prefix("shop");
        let report = run_demo::<Order>(&config, &args(false, None)).unwrap();
        assert!(report.read_back_matches);
        assert!(report.keys.iter().any(|k| k.key == "{shop:Order:1001}:Shipping"));
    }

    #[test]
    fn missing_config_file_is_reported() {
        let err = load_config(Some(Path::new("/nonexistent/redisobj.toml"))).unwrap_err();
        assert!(err.to_string().contains("reading"));
    }
}
