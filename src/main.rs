use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use sshvault::{Algorithm, Artifact, CostParams, Storage, auth, crypto, format, keyfile, remote, storage};
use std::path::{Path, PathBuf};

#[derive(Debug, clap::Args)]
struct KdfArgs {
    /// Argon2 iterations (default: preset value)
    #[arg(long)]
    iterations: Option<u32>,

    /// Argon2 memory cost in MB (default: preset value)
    #[arg(long)]
    memory: Option<u32>,

    /// Argon2 parallelism (default: preset value)
    #[arg(long)]
    threads: Option<u8>,
}

impl KdfArgs {
    fn to_cost_params(&self, fast: bool) -> Result<CostParams> {
        let base = if fast {
            CostParams::fast()
        } else {
            CostParams::strong()
        };

        Ok(CostParams::new(
            self.iterations.unwrap_or(base.iterations()),
            self.memory.unwrap_or(base.memory_mb()),
            self.threads.unwrap_or(base.threads()),
        )?)
    }
}

#[derive(Debug, Parser)]
#[command(name = "sshvault")]
#[command(
    version,
    about = "Encrypt, verify, and restore SSH key backups protected by a passphrase."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Encrypt an SSH key into a backup artifact
    #[command(arg_required_else_help = true)]
    Backup {
        /// Input SSH key file
        #[arg(short, long)]
        input: PathBuf,

        /// Output encrypted file (default: <input>.enc)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Comment/description stored in the artifact header
        #[arg(short, long, default_value = "")]
        comment: String,

        /// Encryption algorithm: aes-gcm or chacha20
        #[arg(short, long, default_value = "aes-gcm")]
        algorithm: Algorithm,

        /// Use low-cost key derivation (development/testing only)
        #[arg(short, long, default_value_t = false)]
        fast: bool,

        #[command(flatten)]
        kdf: KdfArgs,

        /// Environment variable holding the passphrase
        #[arg(long, value_name = "VAR")]
        passphrase_env: Option<String>,

        /// Mirror the artifact to the configured remote repository
        #[arg(long, default_value_t = false)]
        remote: bool,
    },

    /// Decrypt a backup artifact and restore the SSH key
    #[command(arg_required_else_help = true)]
    Restore {
        /// Input encrypted artifact
        #[arg(short, long)]
        input: PathBuf,

        /// Path for the restored SSH key
        #[arg(short, long)]
        output: PathBuf,

        /// Overwrite an existing output file
        #[arg(long, default_value_t = false)]
        force: bool,

        /// Environment variable holding the passphrase
        #[arg(long, value_name = "VAR")]
        passphrase_env: Option<String>,
    },

    /// List discoverable SSH keys and encrypted backups
    List {
        /// Directory to search (default: ~/.ssh)
        #[arg(short, long)]
        directory: Option<PathBuf>,

        /// Show detailed information
        #[arg(short, long, default_value_t = false)]
        verbose: bool,
    },

    /// Validate a backup artifact without decrypting it
    #[command(arg_required_else_help = true)]
    Verify {
        /// Input encrypted artifact
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Manage the remote backup repository
    Remote {
        #[command(subcommand)]
        command: RemoteCommands,
    },
}

#[derive(Debug, Subcommand)]
enum RemoteCommands {
    /// Configure the remote repository artifacts are mirrored to
    #[command(arg_required_else_help = true)]
    Login {
        /// Git URL of the backup repository
        #[arg(long)]
        url: String,

        /// Branch to commit artifacts to (default: main)
        #[arg(long)]
        branch: Option<String>,

        /// Directory inside the repository (default: ssh-keys)
        #[arg(long)]
        folder: Option<String>,
    },

    /// Show the current remote configuration
    Status,

    /// Remove the remote configuration
    Logout,

    /// Mirror an existing artifact to the remote repository
    #[command(arg_required_else_help = true)]
    Push {
        /// Encrypted artifact to upload
        #[arg(short, long)]
        input: PathBuf,

        /// Commit message (default: derived from the file name)
        #[arg(short, long)]
        message: Option<String>,
    },
}

fn main() -> Result<()> {
    let args = Cli::parse();

    match args.command {
        Commands::Backup {
            input,
            output,
            comment,
            algorithm,
            fast,
            kdf,
            passphrase_env,
            remote,
        } => run_backup(
            &input,
            output,
            comment,
            algorithm,
            fast,
            &kdf,
            passphrase_env.as_deref(),
            remote,
        ),
        Commands::Restore {
            input,
            output,
            force,
            passphrase_env,
        } => run_restore(&input, &output, force, passphrase_env.as_deref()),
        Commands::List { directory, verbose } => run_list(directory, verbose),
        Commands::Verify { input } => run_verify(&input),
        Commands::Remote { command } => run_remote(command),
    }
}

#[allow(clippy::too_many_arguments)]
fn run_backup(
    input: &Path,
    output: Option<PathBuf>,
    comment: String,
    algorithm: Algorithm,
    fast: bool,
    kdf: &KdfArgs,
    passphrase_env: Option<&str>,
    mirror: bool,
) -> Result<()> {
    storage::validate_path(input).context("invalid input path")?;

    let key_data = keyfile::read_key_file(input).context("failed to read SSH key")?;

    let output = output.unwrap_or_else(|| storage::backup_path(input, None));
    storage::validate_path(&output).context("invalid output path")?;

    let store = Storage::new(output.clone());
    if store.exists() {
        bail!("output file already exists: {}", output.display());
    }

    let params = kdf.to_cost_params(fast)?;
    if fast {
        println!("using fast mode (development): low-cost key derivation");
    }

    let passphrase = auth::read_new_passphrase(passphrase_env)?;

    println!("encrypting {} with {algorithm}...", input.display());
    let artifact = sshvault::encrypt_key(
        &key_data,
        passphrase.as_bytes(),
        algorithm,
        params,
        comment.clone(),
    )?;
    drop(passphrase);

    let bytes = artifact
        .to_json()
        .context("failed to serialize encrypted file")?;
    store.save(&bytes).context("failed to save encrypted file")?;

    println!("key encrypted and saved to: {}", output.display());
    if !comment.is_empty() {
        println!("  comment: {comment}");
    }
    println!(
        "  encryption: {algorithm} with Argon2id ({} iterations)",
        params.iterations()
    );

    // A failed mirror never discards a successful local save.
    if mirror {
        match mirror_artifact(&output, &bytes, &comment) {
            Ok(destination) => println!("mirrored to remote: {destination}"),
            Err(e) => {
                eprintln!("warning: remote push failed: {e:#}");
                eprintln!("  the artifact was saved locally");
            }
        }
    }

    Ok(())
}

fn mirror_artifact(local_path: &Path, bytes: &[u8], comment: &str) -> Result<String> {
    let config_path = remote::config_path()?;
    let config = remote::RemoteConfig::load_from(&config_path)?
        .context("remote is not configured; run 'sshvault remote login' first")?;

    let file_name = local_path
        .file_name()
        .context("artifact path has no file name")?
        .to_string_lossy();

    let mut message = format!("Backup SSH key: {file_name}");
    if !comment.is_empty() {
        message = format!("{message} - {comment}");
    }

    remote::push(&config, bytes, &file_name, &message)?;
    Ok(format!("{}/{}/{}", config.url, config.folder, file_name))
}

fn run_restore(
    input: &Path,
    output: &Path,
    force: bool,
    passphrase_env: Option<&str>,
) -> Result<()> {
    storage::validate_path(input).context("invalid input path")?;
    storage::validate_path(output).context("invalid output path")?;

    let store = Storage::new(input.to_path_buf());
    if !store.exists() {
        bail!("encrypted file not found: {}", input.display());
    }

    if output.exists() && !force {
        bail!(
            "output file already exists: {} (use --force to overwrite)",
            output.display()
        );
    }

    let data = store.load()?;
    let artifact = Artifact::from_json(&data).context("failed to parse encrypted file")?;
    format::validate(&artifact)?;

    let passphrase = auth::read_passphrase(passphrase_env, "Enter passphrase for decryption: ")?;

    println!("decrypting {}...", input.display());
    let key_data = crypto::decrypt(&artifact, passphrase.as_bytes())?;
    drop(passphrase);

    let is_private = keyfile::is_private_key(&key_data);
    keyfile::write_key_file(output, &key_data, is_private)
        .context("failed to write restored key")?;

    println!("key decrypted and restored to: {}", output.display());
    if !artifact.header.comment.is_empty() {
        println!("  comment: {}", artifact.header.comment);
    }
    println!("  key type: {}", keyfile::detect_key_type(&key_data));
    println!(
        "  permissions: {}",
        if is_private {
            "0600 (private key)"
        } else {
            "0644 (public key)"
        }
    );
    println!(
        "  encrypted: {}",
        artifact.header.timestamp.format("%Y-%m-%d %H:%M:%S UTC")
    );

    Ok(())
}

fn run_list(directory: Option<PathBuf>, verbose: bool) -> Result<()> {
    let dir = match directory {
        Some(d) => d,
        None => directories::BaseDirs::new()
            .context("could not determine home directory")?
            .home_dir()
            .join(".ssh"),
    };

    if !dir.exists() {
        println!("directory not found: {}", dir.display());
        return Ok(());
    }

    let keys = keyfile::find_keys(&dir)?;

    if keys.is_empty() {
        println!("no SSH keys found in {}", dir.display());
    } else {
        println!("SSH keys in {} ({}):", dir.display(), keys.len());
        for key in &keys {
            let name = key.path.file_name().unwrap_or_default().to_string_lossy();
            if verbose {
                println!(
                    "  {name}  type={}  size={}  {}{}",
                    key.key_type,
                    key.size,
                    if key.is_private { "private" } else { "public" },
                    if key.has_public { "  (has .pub)" } else { "" }
                );
            } else {
                println!("  {name}");
            }
        }
    }

    let backups = find_backups(&dir)?;
    if !backups.is_empty() {
        println!("encrypted backups ({}):", backups.len());
        for path in &backups {
            let name = path.file_name().unwrap_or_default().to_string_lossy();
            if verbose {
                match load_header(path) {
                    Ok(header) => println!(
                        "  {name}  {}  created {}",
                        header.algorithm,
                        header.timestamp.format("%Y-%m-%d")
                    ),
                    Err(_) => println!("  {name}  (unreadable)"),
                }
            } else {
                println!("  {name}");
            }
        }
    }

    Ok(())
}

fn find_backups(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut backups: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "enc"))
        .collect();
    backups.sort();
    Ok(backups)
}

fn load_header(path: &Path) -> Result<sshvault::Header> {
    let data = Storage::new(path.to_path_buf()).load()?;
    let artifact = Artifact::from_json(&data)?;
    Ok(artifact.header)
}

fn run_verify(input: &Path) -> Result<()> {
    storage::validate_path(input).context("invalid input path")?;

    let store = Storage::new(input.to_path_buf());
    if !store.exists() {
        bail!("file not found: {}", input.display());
    }

    let data = store.load()?;
    let artifact = Artifact::from_json(&data).context("failed to parse encrypted file")?;

    if let Err(e) = format::validate(&artifact) {
        bail!("validation failed: {e}");
    }

    println!("file format validation passed");
    println!();
    println!("file information:");
    println!("  version: {}", artifact.header.version);
    println!("  algorithm: {}", artifact.header.algorithm);
    println!("  kdf: {}", artifact.header.kdf);
    println!("  kdf iterations: {}", artifact.header.iterations);
    println!("  kdf memory: {} MB", artifact.header.memory);
    println!("  kdf threads: {}", artifact.header.threads);
    println!(
        "  created: {}",
        artifact.header.timestamp.format("%Y-%m-%d %H:%M:%S UTC")
    );
    if !artifact.header.comment.is_empty() {
        println!("  comment: {}", artifact.header.comment);
    }
    println!();
    println!("cryptographic parameters:");
    println!("  salt length: {} bytes", artifact.salt.len());
    println!("  nonce length: {} bytes", artifact.nonce.len());
    println!("  ciphertext length: {} bytes", artifact.ciphertext.len());
    println!("  authentication tag length: {} bytes", artifact.tag.len());
    println!();
    println!("{} is a valid encrypted key backup", input.display());

    Ok(())
}

fn run_remote(command: RemoteCommands) -> Result<()> {
    let config_path = remote::config_path()?;

    match command {
        RemoteCommands::Login {
            url,
            branch,
            folder,
        } => {
            let config = remote::RemoteConfig::new(url, branch, folder);
            config.save_to(&config_path)?;
            println!("remote configured: {} (branch {})", config.url, config.branch);

            match remote::check_reachable(&config) {
                Ok(()) => println!("repository is reachable"),
                Err(e) => eprintln!("warning: {e:#}"),
            }
        }
        RemoteCommands::Status => match remote::RemoteConfig::load_from(&config_path)? {
            Some(config) => {
                println!("remote: {}", config.url);
                println!("  branch: {}", config.branch);
                println!("  folder: {}", config.folder);
                match remote::check_reachable(&config) {
                    Ok(()) => println!("  reachable: yes"),
                    Err(_) => println!("  reachable: no"),
                }
            }
            None => println!("remote is not configured; run 'sshvault remote login'"),
        },
        RemoteCommands::Logout => {
            if remote::clear_config(&config_path)? {
                println!("remote configuration removed");
            } else {
                println!("remote is not configured");
            }
        }
        RemoteCommands::Push { input, message } => {
            let config = remote::RemoteConfig::load_from(&config_path)?
                .context("remote is not configured; run 'sshvault remote login' first")?;

            let store = Storage::new(input.clone());
            let data = store.load()?;

            // Only structurally valid artifacts are worth mirroring.
            let artifact = Artifact::from_json(&data).context("failed to parse encrypted file")?;
            format::validate(&artifact)?;

            let file_name = input
                .file_name()
                .context("artifact path has no file name")?
                .to_string_lossy();
            let message = message.unwrap_or_else(|| format!("Backup SSH key: {file_name}"));

            remote::push(&config, &data, &file_name, &message)?;
            println!("mirrored {} to {}", input.display(), config.url);
        }
    }

    Ok(())
}
