use std::path::PathBuf;

use disambig_rs::descriptor::disambiguation_weight;
use disambig_rs::EngineConfig;

fn parse_arg(flag: &str) -> Option<String> {
    let mut args = std::env::args();
    while let Some(arg) = args.next() {
        if arg == flag {
            return args.next();
        }
    }
    None
}

fn has_flag(flag: &str) -> bool {
    std::env::args().any(|arg| arg == flag)
}

fn print_help() {
    println!("schema_check - validate a disambiguation schema registry");
    println!();
    println!("USAGE:");
    println!("    schema_check [--config <file.toml>] [--schema <schema.json>] [--verbose]");
    println!();
    println!("Without --schema the configured (or built-in) registry is checked.");
    println!("Environment overrides use the DISAMBIG_ prefix.");
}

fn main() -> anyhow::Result<()> {
    if has_flag("-h") || has_flag("--help") {
        print_help();
        return Ok(());
    }

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config_path = parse_arg("--config").map(PathBuf::from);
    let mut config = EngineConfig::load(config_path.as_deref())?;
    if let Some(schema) = parse_arg("--schema") {
        config.schema = Some(PathBuf::from(schema));
    }

    let registry = config.registry()?;
    let source = config
        .schema
        .as_ref()
        .map(|path| path.display().to_string())
        .unwrap_or_else(|| "built-in scholarly schema".to_string());
    println!(
        "{}: version {:?}, {} types, OK",
        source,
        registry.version(),
        registry.len()
    );

    if has_flag("--verbose") {
        for name in registry.type_names() {
            let info = registry.get(name)?;
            let weight = disambiguation_weight(&registry, name, &config.ignored_relations);
            let descriptor = match &info.descriptor {
                Some(d) if !d.is_empty() => format!(
                    "all={:?} any={:?}{}",
                    d.all,
                    d.any,
                    if d.constrain_types { " constrained" } else { "" }
                ),
                _ => "-".to_string(),
            };
            println!(
                "  {:<28} {:<26} weight {:>2}  {}",
                name, info.concrete, weight, descriptor
            );
        }
    }

    Ok(())
}
