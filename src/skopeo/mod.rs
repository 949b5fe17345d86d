//! `CopyTool` backed by the skopeo binary

use crate::auth::{ecr_region, is_ecr_registry};
use crate::constants::transport;
use crate::copy::{CopyOption, CopyTool};
use crate::error::{BundleError, ToolError};
use crate::manifest::ManifestList;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tempfile::TempDir;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;


/// Version marker skopeo expects in a `dir:` transport directory
const DIR_TRANSPORT_VERSION: &str = "Directory Transport Version: 1.1\n";

pub struct SkopeoRunner {
    program: PathBuf,
    // Holds manifest lists staged for `copy_manifest`; removed on drop
    work_dir: TempDir,
}

#[derive(Debug)]
struct CommandOutput {
    stdout: Vec<u8>,
    stderr: Vec<u8>,
}

impl CommandOutput {
    fn combined(self) -> Vec<u8> {
        let mut out = self.stdout;
        out.extend(self.stderr);
        out
    }
}

impl SkopeoRunner {
    /// Locate `binary` (a name on `PATH` or a path) and prepare a work directory
    pub fn new(binary: &str) -> Result<Self, BundleError> {
        let program = which::which(binary).map_err(|e| BundleError::ToolNotFound {
            name: binary.to_string(),
            reason: e.to_string(),
        })?;
        let work_dir = tempfile::Builder::new().prefix("skopeo-").tempdir()?;

        debug!("Using skopeo at {}", program.display());
        Ok(Self { program, work_dir })
    }

    async fn run(&self, args: &[String], stdin: Option<&[u8]>) -> Result<CommandOutput, ToolError> {
        run_command(&self.program, args, stdin).await
    }

    async fn ecr_login(&self, registry: &str) -> Result<(), ToolError> {
        let mut aws_args = vec!["ecr".to_string(), "get-login-password".to_string()];
        if let Some(region) = ecr_region(registry) {
            aws_args.push("--region".to_string());
            aws_args.push(region.to_string());
        }
        let token = run_command(Path::new("aws"), &aws_args, None).await?;

        let login_args = vec![
            "login".to_string(),
            "--username".to_string(),
            "AWS".to_string(),
            "--password-stdin".to_string(),
            registry.to_string(),
        ];
        let output = self.run(&login_args, Some(token.stdout.trim_ascii())).await?;
        debug!("{}", String::from_utf8_lossy(&output.combined()));
        Ok(())
    }
}

async fn run_command(
    program: &Path,
    args: &[String],
    stdin: Option<&[u8]>,
) -> Result<CommandOutput, ToolError> {
    let program_name = program.display().to_string();
    debug!("Running {} {}", program_name, redact(args).join(" "));

    let mut child = Command::new(program)
        .args(args)
        .stdin(if stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| ToolError::Spawn {
            program: program_name.clone(),
            source,
        })?;

    if let (Some(input), Some(mut pipe)) = (stdin, child.stdin.take()) {
        pipe.write_all(input).await?;
        pipe.write_all(b"\n").await?;
    }

    let output = child.wait_with_output().await?;
    let result = CommandOutput {
        stdout: output.stdout,
        stderr: output.stderr,
    };

    if !output.status.success() {
        return Err(ToolError::Failed {
            program: program_name,
            status: output.status.to_string(),
            output: result.combined(),
        });
    }
    Ok(result)
}

/// Hide credential values in logged command lines
fn redact(args: &[String]) -> Vec<String> {
    let mut redacted = Vec::with_capacity(args.len());
    let mut hide_next = false;
    for arg in args {
        if hide_next {
            redacted.push("*****".to_string());
        } else {
            redacted.push(arg.clone());
        }
        hide_next = arg == "--src-creds" || arg == "--creds";
    }
    redacted
}

fn docker_ref(reference: &str) -> String {
    format!("{}{}", transport::DOCKER, reference)
}

/// Global flags go before the subcommand
fn global_args(options: &[CopyOption]) -> Vec<String> {
    if options.contains(&CopyOption::Debug) {
        vec!["--debug".to_string()]
    } else {
        Vec::new()
    }
}

fn copy_flags(options: &[CopyOption]) -> Vec<String> {
    let mut flags = Vec::new();
    for option in options {
        match option {
            CopyOption::DisableSrcTlsVerify => flags.push("--src-tls-verify=false".to_string()),
            CopyOption::DisableDestTlsVerify => flags.push("--dest-tls-verify=false".to_string()),
            CopyOption::SrcCredentials { username, password } => {
                flags.push("--src-creds".to_string());
                flags.push(format!("{}:{}", username, password));
            }
            CopyOption::Os(os) if !os.is_empty() => {
                flags.push("--override-os".to_string());
                flags.push(os.clone());
            }
            CopyOption::Arch(arch) if !arch.is_empty() => {
                flags.push("--override-arch".to_string());
                flags.push(arch.clone());
            }
            CopyOption::Variant(variant) if !variant.is_empty() => {
                flags.push("--override-variant".to_string());
                flags.push(variant.clone());
            }
            _ => {}
        }
    }
    flags
}

fn copy_args(src: &str, dst: &str, options: &[CopyOption]) -> Vec<String> {
    let mut args = global_args(options);
    args.push("copy".to_string());
    args.extend(copy_flags(options));
    args.push(src.to_string());
    args.push(dst.to_string());
    args
}

fn inspect_args(src: &str, options: &[CopyOption]) -> Vec<String> {
    let mut args = global_args(options);
    args.push("inspect".to_string());
    args.push("--raw".to_string());
    for option in options {
        match option {
            CopyOption::DisableSrcTlsVerify => args.push("--tls-verify=false".to_string()),
            CopyOption::SrcCredentials { username, password } => {
                args.push("--creds".to_string());
                args.push(format!("{}:{}", username, password));
            }
            _ => {}
        }
    }
    args.push(docker_ref(src));
    args
}

fn copy_manifest_args(dir: &Path, dst: &str, options: &[CopyOption]) -> Vec<String> {
    // The list is read from a local directory, so source options do not apply
    let options: Vec<CopyOption> = options
        .iter()
        .filter(|o| {
            !matches!(
                o,
                CopyOption::DisableSrcTlsVerify | CopyOption::SrcCredentials { .. }
            )
        })
        .cloned()
        .collect();

    let mut args = global_args(&options);
    args.push("copy".to_string());
    args.push("--multi-arch".to_string());
    args.push("index-only".to_string());
    args.extend(copy_flags(&options));
    args.push(format!("{}{}", transport::DIR, dir.display()));
    args.push(docker_ref(dst));
    args
}

#[async_trait]
impl CopyTool for SkopeoRunner {
    async fn copy(
        &self,
        src: &str,
        dst: &str,
        options: &[CopyOption],
    ) -> Result<Vec<u8>, ToolError> {
        let args = copy_args(&docker_ref(src), &docker_ref(dst), options);
        Ok(self.run(&args, None).await?.combined())
    }

    async fn copy_manifest(
        &self,
        manifest_list: &ManifestList,
        dst: &str,
        options: &[CopyOption],
    ) -> Result<Vec<u8>, ToolError> {
        let dir = tempfile::Builder::new()
            .prefix("manifest-list-")
            .tempdir_in(self.work_dir.path())?;

        let manifest = serde_json::to_vec(manifest_list)
            .map_err(|e| ToolError::InvalidManifest(e.to_string()))?;
        tokio::fs::write(dir.path().join("manifest.json"), manifest).await?;
        tokio::fs::write(dir.path().join("version"), DIR_TRANSPORT_VERSION).await?;

        let args = copy_manifest_args(dir.path(), dst, options);
        Ok(self.run(&args, None).await?.combined())
    }

    async fn inspect_manifest(
        &self,
        src: &str,
        options: &[CopyOption],
    ) -> Result<(Option<ManifestList>, Vec<u8>), ToolError> {
        let output = self.run(&inspect_args(src, options), None).await?;
        let list = ManifestList::from_raw(&output.stdout)
            .map_err(|e| ToolError::InvalidManifest(e.to_string()))?;
        Ok((list, output.combined()))
    }

    async fn login(&self, registry: &str) -> Result<(), ToolError> {
        if is_ecr_registry(registry) {
            debug!("Logging in to ECR registry {}", registry);
            return self.ecr_login(registry).await;
        }
        Ok(())
    }
}
