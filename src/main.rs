mod cli;

use rawdrop::{
    config,
    conversion::{self, ConversionService, ServiceSettings},
    media::MediaStore,
    server::{self, auth, AppContext},
};
use rawdrop_codec::RawCodec;
use rawdrop_common::paths::is_raw_file;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use std::path::{Path, PathBuf};
use std::sync::Arc;

async fn start_server(
    host: Option<String>,
    port: Option<u16>,
    config_path: Option<&Path>,
) -> Result<()> {
    // Load config
    let mut config = config::load_config_or_default(config_path)?;

    // Override host/port from CLI if specified
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }
    config::validate_config(&config)?;

    tracing::info!("Starting rawdrop server");
    tracing::info!(
        "Server will listen on {}:{}",
        config.server.host,
        config.server.port
    );

    let media = MediaStore::open(&config.media.directory)
        .await
        .with_context(|| format!("Unusable media directory: {:?}", config.media.directory))?;
    tracing::info!("Media directory: {:?}", media.root());

    // Workers must be running before the listener accepts uploads
    let codec = conversion::codec_from_config(&config)?;
    tracing::info!(
        codec = codec.name(),
        workers = config.conversion.max_workers,
        queue_capacity = config.conversion.queue_capacity,
        backpressure = %config.conversion.backpressure,
        "Starting conversion workers"
    );
    let conversion = Arc::new(ConversionService::start(
        ServiceSettings::from(&config.conversion),
        codec,
    )?);

    let ctx = AppContext {
        config: Arc::new(config),
        conversion: Arc::clone(&conversion),
        media,
    };
    let server_result = server::start_server(ctx).await;

    // Cleanup
    tracing::info!("Shutting down...");
    if let Some(report) = conversion.shutdown().await {
        tracing::info!(
            abandoned = report.abandoned,
            unfinished_workers = report.unfinished_workers,
            "Conversion workers stopped"
        );
    }

    server_result
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "rawdrop=trace,rawdrop_codec=trace,rawdrop_common=debug,tower_http=debug".to_string()
        } else {
            "rawdrop=info,rawdrop_codec=info,tower_http=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Start { host, port } => {
            // Create tokio runtime
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(start_server(host, port, cli.config.as_deref()))
        }
        Commands::Convert {
            file,
            out_dir,
            quality,
        } => convert_file(&file, out_dir, quality, cli.config.as_deref()),
        Commands::CheckTools => check_tools(),
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("rawdrop {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Commands::HashPassword { password } => hash_password(&password),
        Commands::GenerateSecret => generate_secret(),
    }
}

fn convert_file(
    file: &Path,
    out_dir: Option<PathBuf>,
    quality: Option<u8>,
    config_path: Option<&Path>,
) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;

    if !file.exists() {
        anyhow::bail!("Input file does not exist: {:?}", file);
    }
    if !is_raw_file(file) {
        anyhow::bail!("Not a RAW file: {:?}", file);
    }

    let out_dir = match out_dir {
        Some(dir) => dir,
        None => file
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(".")),
    };
    let quality = quality.unwrap_or(config.conversion.jpeg_quality);

    let codec = conversion::codec_from_config(&config)?;
    tracing::info!(codec = codec.name(), quality, "Converting {:?}", file);

    let output = codec
        .convert(file, &out_dir, quality)
        .with_context(|| format!("Failed to convert {:?}", file))?;

    println!("{}", output.display());
    Ok(())
}

fn check_tools() -> Result<()> {
    println!("Checking external tools...\n");

    println!("✓ embedded-preview (built in)");

    let tools = rawdrop_codec::check_tools();
    let mut all_ok = true;

    for tool in &tools {
        let status = if tool.available {
            "✓"
        } else {
            all_ok = false;
            "✗"
        };

        print!("{} {}", status, tool.name);

        if let Some(ref version) = tool.version {
            print!(" ({})", version.lines().next().unwrap_or(""));
        }

        if let Some(ref path) = tool.path {
            print!(" - {}", path.display());
        }

        println!();
    }

    println!();
    if all_ok {
        println!("All optional tools are available!");
    } else {
        println!("Some tools are missing. The embedded codec works without them.");
    }

    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    let path = path.map(Path::to_path_buf).or_else(config::find_config_file);
    let config = match &path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            config::load_config(p)?
        }
        None => {
            println!("No config file found, validating defaults");
            let config = config::Config::default();
            config::validate_config(&config)?;
            config
        }
    };

    println!("✓ Configuration is valid");
    println!("  Server: {}:{}", config.server.host, config.server.port);
    println!("  Auth enabled: {}", config.auth.enabled);
    println!("  Media directory: {:?}", config.media.directory);
    println!("  Workers: {}", config.conversion.max_workers);
    println!(
        "  Queue: {} ({})",
        config.conversion.queue_capacity, config.conversion.backpressure
    );
    println!("  JPEG quality: {}", config.conversion.jpeg_quality);

    Ok(())
}

fn hash_password(password: &str) -> Result<()> {
    let hash = auth::hash_password(password)?;
    println!("{}", hash);
    Ok(())
}

fn generate_secret() -> Result<()> {
    let secret = auth::generate_secret();
    println!("{}", secret);
    Ok(())
}
