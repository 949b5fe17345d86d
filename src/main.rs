use anyhow::Error;
use clap::Parser;
use imagebundle::{
    cli::{Cli, Commands, CreateCommands, ServeCommands},
    service::{BundleService, CreateOptions, ServeOptions, ServeService},
    BundleError,
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize logging to stderr; RUST_LOG wins when set
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Create {
            command: CreateCommands::ImageBundle(args),
        } => {
            let output_file = args.output_file.clone();
            BundleService::create(CreateOptions {
                images_file: args.images_file,
                platforms: args.platform,
                output_file: args.output_file,
                overwrite: args.overwrite,
                skopeo_binary: cli.skopeo_binary,
                registry_binary: cli.registry_binary,
                verbose: cli.verbose,
            })
            .await
            .map(|_| ())
            .map_err(|e| (format!("Failed to create image bundle {}", output_file.display()), e))
        }
        Commands::Serve {
            command: ServeCommands::ImageBundle(args),
        } => {
            let image_bundle = args.image_bundle.clone();
            ServeService::serve(ServeOptions {
                image_bundle: args.image_bundle,
                listen_address: args.listen_address,
                listen_port: args.listen_port,
                registry_binary: cli.registry_binary,
            })
            .await
            .map_err(|e| (format!("Failed to serve image bundle {}", image_bundle.display()), e))
        }
        Commands::Version => {
            println!("imagebundle {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    };

    // Exit only after the services have returned and removed their temp dirs
    if let Err((context, err)) = result {
        exit_with(context, err);
    }
}

fn exit_with(context: String, err: BundleError) -> ! {
    let code = err.exit_code();
    eprintln!("Error: {:?}", Error::new(err).context(context));
    std::process::exit(code);
}
