use chatnoir_retrieve::cli::{Cli, Commands, ConfigAction, RunFormat, SearchOptions};
use chatnoir_retrieve::client::ChatNoirClient;
use chatnoir_retrieve::config::{Config, ConfigValidator};
use chatnoir_retrieve::error::{Result, RetrieveError};
use chatnoir_retrieve::retrieval::Retriever;
use chatnoir_retrieve::table::{
    read_topics, write_jsonl, write_trec_run, Row, Table, TopicsFormat, DOCNO, QID, QUERY, RANK,
    SCORE,
};
use serde_json::Value;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse_args();

    // Initialize logging
    init_logging(cli.verbose);

    // Handle commands
    match cli.command {
        Commands::Search {
            query,
            options,
            json,
        } => {
            cmd_search(cli.config, cli.verbose, &query, &options, json)?;
        }
        Commands::Run {
            topics,
            output,
            format,
            tag,
            options,
        } => {
            cmd_run(cli.config, cli.verbose, &topics, output, format, tag, &options)?;
        }
        Commands::Config { action } => {
            cmd_config(cli.config, action)?;
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default = if verbose {
        "chatnoir_retrieve=debug"
    } else {
        "chatnoir_retrieve=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn build_retriever(config: &Config, verbose: bool, options: &SearchOptions) -> Result<Retriever> {
    let api_key = config.resolve_api_key()?;
    let mut retriever_config = config.retriever_config(api_key);
    options.apply(&mut retriever_config)?;
    if verbose {
        retriever_config.verbose = true;
    }

    let client = ChatNoirClient::new(&config.api.base_url, config.timeout())?;
    tracing::debug!(
        "Using ChatNoir at {} (config {})",
        client.base_url(),
        &retriever_config.fingerprint()[..12]
    );

    Ok(Retriever::new(retriever_config, Arc::new(client)))
}

fn cmd_search(
    config_path: Option<PathBuf>,
    verbose: bool,
    query: &str,
    options: &SearchOptions,
    json: bool,
) -> Result<()> {
    let config = load_config(config_path)?;
    let retriever = build_retriever(&config, verbose, options)?;

    let mut topic = Row::new();
    topic.insert(QID.to_string(), Value::String("1".to_string()));
    topic.insert(QUERY.to_string(), Value::String(query.to_string()));
    let results = retriever.transform(&Table::from_rows(vec![topic]))?;

    if json {
        let json = serde_json::to_string_pretty(&results.to_json()).map_err(|e| {
            RetrieveError::Json {
                source: e,
                context: "Failed to serialize results".to_string(),
            }
        })?;
        println!("{}", json);
        return Ok(());
    }

    if results.is_empty() {
        println!("No results for: {}", query);
        return Ok(());
    }

    println!("Results for: {}", query);
    for row in results.rows() {
        let rank = row.get(RANK).and_then(Value::as_u64).unwrap_or_default();
        let score = row.get(SCORE).and_then(Value::as_f64).unwrap_or_default();
        let docno = row
            .get(DOCNO)
            .and_then(Value::as_str)
            .unwrap_or("(unknown)");
        println!("  {:>3}. {:>10.3}  {}", rank + 1, score, docno);

        // Show any selected text attributes underneath
        for (column, value) in row {
            if [QID, QUERY, DOCNO, SCORE, RANK].contains(&column.as_str()) {
                continue;
            }
            if let Some(text) = value.as_str() {
                println!("       {}: {}", column, text);
            } else if !value.is_null() {
                println!("       {}: {}", column, value);
            }
        }
    }

    Ok(())
}

fn cmd_run(
    config_path: Option<PathBuf>,
    verbose: bool,
    topics_path: &Path,
    output: Option<PathBuf>,
    format: Option<RunFormat>,
    tag: Option<String>,
    options: &SearchOptions,
) -> Result<()> {
    let config = load_config(config_path)?;
    let retriever = build_retriever(&config, verbose, options)?;

    let topics = read_topics(topics_path, TopicsFormat::from_path(topics_path))?;
    tracing::info!(
        "Retrieving for {} topic rows from {}",
        topics.len(),
        topics_path.display()
    );

    let results = retriever.transform(&topics)?;

    let format = match format {
        Some(format) => format,
        None if config.output.format == "jsonl" => RunFormat::Jsonl,
        None => RunFormat::Trec,
    };
    let tag = tag.unwrap_or_else(|| config.output.tag.clone());

    let mut writer: Box<dyn Write> = match &output {
        Some(path) => Box::new(std::io::BufWriter::new(
            std::fs::File::create(path).map_err(|e| RetrieveError::Io {
                source: e,
                context: format!("Failed to create output file: {}", path.display()),
            })?,
        )),
        None => Box::new(std::io::stdout().lock()),
    };

    let written = match format {
        RunFormat::Trec => write_trec_run(&results, &mut writer, &tag)?,
        RunFormat::Jsonl => write_jsonl(&results, &mut writer)?,
    };
    writer.flush().map_err(|e| RetrieveError::Io {
        source: e,
        context: "Failed to flush run output".to_string(),
    })?;

    tracing::info!("Wrote {} result lines", written);
    if let Some(path) = output {
        println!("✓ Run written to: {}", path.display());
    }

    Ok(())
}

fn cmd_config(config_path: Option<PathBuf>, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config = load_config(config_path)?;
            let toml = toml::to_string_pretty(&config)?;
            println!("{}", toml);
        }
        ConfigAction::Validate { file } => {
            let path = match file.or(config_path) {
                Some(path) => path,
                None => Config::default_path()?,
            };
            let config = Config::load(&path)?;
            println!("✓ Configuration is valid");
            println!("  Schema version: {}", config.meta.schema_version);
        }
        ConfigAction::Init { force } => {
            let path = match config_path {
                Some(path) => path,
                None => Config::default_path()?,
            };

            if path.exists() && !force {
                println!("Configuration file already exists at: {}", path.display());
                println!("Use --force to overwrite");
                return Ok(());
            }

            // Create parent directory
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| RetrieveError::Io {
                    source: e,
                    context: format!("Failed to create config directory: {:?}", parent),
                })?;
            }

            let config = Config::default();
            config.save(&path)?;

            println!("✓ Configuration initialized at: {}", path.display());
            println!(
                "  Set {} to your ChatNoir API key before searching",
                config.api.api_key_env
            );
        }
    }

    Ok(())
}

fn load_config(config_path: Option<PathBuf>) -> Result<Config> {
    let path = match config_path {
        Some(path) => path,
        None => Config::default_path()?,
    };

    let mut config = if path.exists() {
        Config::load(&path)?
    } else {
        tracing::debug!(
            "Config file not found, using defaults. Run 'chatnoir-retrieve config init' to create one."
        );
        Config::default()
    };

    config.apply_env_overrides();
    ConfigValidator::validate(&config)?;
    Ok(config)
}
