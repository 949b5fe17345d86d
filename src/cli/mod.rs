use crate::constants::{
    bundle::DEFAULT_OUTPUT_FILE,
    platform::DEFAULT,
    serve::{DEFAULT_LISTEN_ADDRESS, DEFAULT_LISTEN_PORT},
};
use crate::platform::{parse_platform_arg, PlatformSpec};
use clap::{Args, Parser, Subcommand};
use std::net::IpAddr;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "imagebundle")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// skopeo binary used to inspect and copy images
    #[arg(long, global = true, env = "IMAGEBUNDLE_SKOPEO", default_value = "skopeo")]
    pub skopeo_binary: String,

    /// Distribution registry binary used as the staging registry
    #[arg(long, global = true, env = "IMAGEBUNDLE_REGISTRY", default_value = "registry")]
    pub registry_binary: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create bundles for air-gapped environments
    Create {
        #[command(subcommand)]
        command: CreateCommands,
    },

    /// Serve bundles to local clients
    Serve {
        #[command(subcommand)]
        command: ServeCommands,
    },

    /// Show version information
    Version,
}

#[derive(Subcommand)]
pub enum CreateCommands {
    /// Create an image bundle from a list of registries, images and tags
    ImageBundle(ImageBundleArgs),
}

#[derive(Subcommand)]
pub enum ServeCommands {
    /// Serve an image bundle as a Docker registry
    ImageBundle(ServeImageBundleArgs),
}

#[derive(Args, Debug)]
pub struct ServeImageBundleArgs {
    /// Image bundle tarball to serve
    #[arg(long, required = true)]
    pub image_bundle: PathBuf,

    /// Address to listen on
    #[arg(long, default_value = DEFAULT_LISTEN_ADDRESS)]
    pub listen_address: IpAddr,

    /// Port to listen on
    #[arg(long, default_value_t = DEFAULT_LISTEN_PORT)]
    pub listen_port: u16,
}

#[derive(Args, Debug)]
pub struct ImageBundleArgs {
    /// YAML file containing list of images to create bundle from
    #[arg(long, required = true)]
    pub images_file: PathBuf,

    /// Platforms to download images for (required format: <os>/<arch>[/<variant>])
    /// Can be specified multiple times or as a comma-separated list
    #[arg(
        long,
        value_delimiter = ',',
        value_parser = parse_platform_arg,
        default_value = DEFAULT
    )]
    pub platform: Vec<PlatformSpec>,

    /// Output file to write image bundle to
    #[arg(long, default_value = DEFAULT_OUTPUT_FILE)]
    pub output_file: PathBuf,

    /// Overwrite image bundle file if it already exists
    #[arg(long)]
    pub overwrite: bool,
}
