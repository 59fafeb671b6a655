use clap::{Parser, Subcommand};
use photo_gal::imaging::RustBackend;
use photo_gal::pipeline::{self, BuildOptions};
use photo_gal::{config, output};
use std::path::PathBuf;
use std::process::ExitCode;

/// Exit status when at least one gallery failed.
const EXIT_GALLERY_FAILED: u8 = 3;

fn version_string() -> &'static str {
    let on_tag = env!("ON_RELEASE_TAG");
    if on_tag == "true" {
        env!("CARGO_PKG_VERSION")
    } else {
        let hash = env!("GIT_HASH");
        if hash.is_empty() {
            "dev@unknown"
        } else {
            Box::leak(format!("dev@{hash}").into_boxed_str())
        }
    }
}

#[derive(Parser)]
#[command(name = "photo-gal")]
#[command(about = "Static photo gallery generator with password protected and encrypted galleries")]
#[command(long_about = "\
Static photo gallery generator with password protected and encrypted galleries

Every directory under the source root that holds a gallery.yaml is a gallery.

Source structure:

  galleries/
  ├── config.toml                # Site config (optional)
  ├── lisbon/
  │   ├── gallery.yaml           # title, date, tags, cover, visibility flags
  │   ├── sunset.jpg
  │   └── sunset.yaml            # Image sidecar: title, caption, tags
  └── family/
      ├── gallery.yaml           # password: ..., encrypted: true
      └── IMG_0042.jpg

Output structure:

  output/
  ├── metadata/                  # galleries.json, {gallery}/index.json, {image}.json
  └── public_html/               # index.html, static/, galleries/{gallery}/

Password protected galleries publish a login page at index.html and the real
gallery under an unguessable {private id}.html. Encrypted galleries also store
every derivative as AES-256-CBC ciphertext, decrypted in the browser.

Run 'photo-gal gen-config' to generate a documented config.toml.")]
#[command(version = version_string())]
struct Cli {
    /// Directory holding the gallery folders
    #[arg(long, default_value = "galleries", global = true)]
    source: PathBuf,

    /// Output directory
    #[arg(long, default_value = "output", global = true)]
    output: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build every gallery, the site index and the metadata JSON
    Build {
        /// Build only this gallery; the others keep their published output
        gallery: Option<String>,

        /// Disable the derivative cache and re-encode every image
        #[arg(long)]
        no_cache: bool,
    },
    /// Validate galleries without writing any output
    Check {
        /// Check only this gallery
        gallery: Option<String>,
    },
    /// Print a stock config.toml with all options documented
    GenConfig,
}

fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Command::Build { gallery, no_cache } => {
            let site = config::load_config(&cli.source)?;
            init_thread_pool(&site.processing);

            println!(
                "==> Building {} → {}",
                cli.source.display(),
                cli.output.display()
            );
            let (tx, rx) = std::sync::mpsc::channel();
            let printer = std::thread::spawn(move || {
                for event in rx {
                    output::print_build_event(&event);
                }
            });
            let result = pipeline::build_with_config(
                &RustBackend::new(),
                &site,
                &cli.source,
                &cli.output,
                BuildOptions { no_cache, gallery },
                Some(tx),
            );
            if printer.join().is_err() {
                eprintln!("warning: progress printer panicked");
            }
            let summary = result?;
            output::print_build_summary(&summary);
            if summary.has_failures() {
                return Ok(ExitCode::from(EXIT_GALLERY_FAILED));
            }
        }
        Command::Check { gallery } => {
            println!("==> Checking {}", cli.source.display());
            let report = pipeline::check(&cli.source, gallery.as_deref())?;
            output::print_check_output(&report);
            if report.has_failures() {
                return Ok(ExitCode::from(EXIT_GALLERY_FAILED));
            }
            println!("==> All galleries are valid");
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(ExitCode::SUCCESS)
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores; the user can constrain down, not up.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
