use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use savekit_core::{
    DEFAULT_KEY, LoadOptions, Progress, SaveManager, SaveOptions, SaveProfile, StaticKey, cipher,
};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::Level;

#[derive(Parser)]
#[command(name = "savekit-cli")]
#[command(about = "Encrypted save profile store – CLI tool", long_about = None)]
#[command(version)]
struct Cli {
    /// Save directory (defaults to the platform data directory of the application)
    #[arg(long, global = true, env = "SAVEKIT_DIR")]
    dir: Option<PathBuf>,

    /// Encryption key (16, 24 or 32 bytes)
    #[arg(long, global = true, env = "SAVEKIT_KEY", default_value = DEFAULT_KEY, hide_default_value = true)]
    key: String,

    /// Company part of the default save directory
    #[arg(long, global = true, default_value = "DefaultCompany")]
    company: String,

    /// Product part of the default save directory
    #[arg(long, global = true, default_value = "DefaultProduct")]
    product: String,

    /// Show debug logging and progress
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Save a JSON payload as a profile
    Save {
        /// Profile name (also the file name)
        name: String,

        /// Path to the JSON payload
        payload: PathBuf,

        /// Replace an existing profile of the same name
        #[arg(long)]
        overwrite: bool,

        /// Write plaintext JSON instead of ciphertext
        #[arg(long)]
        plain: bool,
    },

    /// Load a profile and print its payload as JSON
    Load {
        /// Profile name
        name: String,

        /// The profile was saved with --plain
        #[arg(long)]
        plain: bool,

        /// Write the payload to a file instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Delete a profile
    Delete {
        /// Profile name
        name: String,
    },

    /// List stored profiles, newest first
    List,

    /// Decrypt a base64 cipher file to plaintext
    Decrypt {
        /// Path to the encrypted file
        cipher: PathBuf,

        /// Path to write the decrypted plaintext
        out_plain: PathBuf,
    },

    /// Encrypt a plaintext file to base64 cipher text
    Encrypt {
        /// Path to the plaintext file
        plain: PathBuf,

        /// Path to write the encrypted cipher file
        out_cipher: PathBuf,
    },
}

/// Prints milestones to stderr
struct StderrProgress;

impl Progress for StderrProgress {
    fn show(&self, current: u32, total: u32) {
        eprint!("[progress] {}/{}", current, total);
    }

    fn report(&self, step: u32) {
        eprint!(" {}", step);
    }

    fn hide(&self) {
        eprintln!();
    }
}

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {:?}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::WARN })
        .with_writer(std::io::stderr)
        .init();

    match &cli.command {
        Commands::Save {
            name,
            payload,
            overwrite,
            plain,
        } => {
            let manager = manager(&cli)?;
            cmd_save(&manager, name, payload, *overwrite, *plain)?;
        }
        Commands::Load { name, plain, out } => {
            let manager = manager(&cli)?;
            cmd_load(&manager, name, *plain, out.as_deref())?;
        }
        Commands::Delete { name } => {
            let manager = manager(&cli)?;
            manager.delete(name)?;
            println!("[ok] deleted {}", name);
        }
        Commands::List => {
            let manager = manager(&cli)?;
            cmd_list(&manager)?;
        }
        Commands::Decrypt { cipher, out_plain } => {
            cmd_decrypt(cli.key.as_bytes(), cipher, out_plain)?;
        }
        Commands::Encrypt { plain, out_cipher } => {
            cmd_encrypt(cli.key.as_bytes(), plain, out_cipher)?;
        }
    }

    Ok(())
}

fn manager(cli: &Cli) -> Result<SaveManager> {
    let manager = match &cli.dir {
        Some(dir) => SaveManager::new(dir),
        None => match SaveManager::for_application(&cli.company, &cli.product) {
            Some(manager) => manager,
            None => bail!("could not determine the save directory, pass --dir"),
        },
    };

    let manager = manager.with_key_provider(StaticKey::new(cli.key.as_bytes()));

    Ok(if cli.verbose {
        manager.with_progress(StderrProgress)
    } else {
        manager
    })
}

fn cmd_save(
    manager: &SaveManager,
    name: &str,
    payload_path: &Path,
    overwrite: bool,
    plain: bool,
) -> Result<()> {
    let text = fs::read_to_string(payload_path)
        .with_context(|| format!("Failed to read payload file: {}", payload_path.display()))?;
    let payload: serde_json::Value = serde_json::from_str(&text)
        .with_context(|| format!("Payload is not valid JSON: {}", payload_path.display()))?;

    let options = SaveOptions::default().overwrite(overwrite).encrypt(!plain);
    manager.save(&SaveProfile::new(name, payload), options)?;

    println!(
        "[ok] saved {} -> {}",
        name,
        manager.profile_path(name)?.display()
    );

    Ok(())
}

fn cmd_load(manager: &SaveManager, name: &str, plain: bool, out: Option<&Path>) -> Result<()> {
    let profile: SaveProfile<serde_json::Value> =
        manager.load(name, LoadOptions::default().encrypt(!plain))?;

    let json = serde_json::to_string_pretty(profile.data())?;

    match out {
        Some(path) => {
            fs::write(path, &json)
                .with_context(|| format!("Failed to write payload file: {}", path.display()))?;
            println!("[ok] wrote payload -> {}", path.display());
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            writeln!(stdout, "{}", json)?;
        }
    }

    Ok(())
}

fn cmd_list(manager: &SaveManager) -> Result<()> {
    let profiles = manager.list()?;

    if profiles.is_empty() {
        println!(
            "[info] no profiles in {}",
            manager.save_directory().display()
        );
        return Ok(());
    }

    for info in profiles {
        println!(
            "{:<24} {:>8} B  {}",
            info.name,
            info.size,
            info.modified.format("%Y-%m-%d %H:%M:%S")
        );
    }

    Ok(())
}

fn cmd_decrypt(key: &[u8], cipher_path: &Path, out_plain_path: &Path) -> Result<()> {
    // Read encrypted file
    let enc = fs::read_to_string(cipher_path)
        .with_context(|| format!("Failed to read cipher file: {}", cipher_path.display()))?;

    println!("[info] len(enc)={}", enc.trim().len());

    // Decrypt
    let plain = cipher::decrypt(key, &enc).context("Failed to decrypt cipher file")?;

    // Write decrypted payload
    fs::write(out_plain_path, &plain)
        .with_context(|| format!("Failed to write plaintext file: {}", out_plain_path.display()))?;

    println!("[ok] wrote plaintext -> {}", out_plain_path.display());

    Ok(())
}

fn cmd_encrypt(key: &[u8], plain_path: &Path, out_cipher_path: &Path) -> Result<()> {
    // Read plaintext payload
    let plain = fs::read_to_string(plain_path)
        .with_context(|| format!("Failed to read plaintext file: {}", plain_path.display()))?;

    // Encrypt
    let enc = cipher::encrypt(key, &plain).context("Failed to encrypt plaintext file")?;

    // Write encrypted file
    fs::write(out_cipher_path, &enc)
        .with_context(|| format!("Failed to write cipher file: {}", out_cipher_path.display()))?;

    println!("[ok] wrote cipher text -> {}", out_cipher_path.display());

    Ok(())
}
