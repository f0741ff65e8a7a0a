use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tack::graph::PageGraph;
use tack::serve::{self, ServeOptions};
use tack::{config, output};
use tracing_subscriber::EnvFilter;

/// Environment variable holding a `tracing` filter directive, e.g. `tack=debug`.
const LOG_ENV: &str = "TACK_LOG";

#[derive(clap::Args, Clone)]
struct SiteArgs {
    /// Site directory (holds content/, templates/, public/)
    #[arg(default_value = ".")]
    dir: PathBuf,
}

#[derive(Parser)]
#[command(name = "tack")]
#[command(version)]
#[command(about = "Static site generator: directories become pages, YAML becomes data")]
#[command(long_about = "\
Static site generator: directories become pages, YAML becomes data

Every directory under content/ is a page. YAML files in it become template
variables, markdown is rendered to HTML, and the name of the first YAML file
picks the template. Anything else is copied next to the generated page.

Site structure:

  site/
  ├── tack.toml            # Optional config ('tack gen-config' prints one)
  ├── site.yaml            # Global variables, visible from every page
  ├── content/
  │   ├── index/           # Unordered page: /, not in navigation
  │   │   └── home.yaml    # Renders with templates/home.html
  │   ├── 1.docs/          # Ordered page: /docs, first in navigation
  │   │   ├── page.yaml    # title: Documentation
  │   │   ├── body.md      # Available as {{ body }}
  │   │   └── 1.install/   # Child page: /docs/install
  │   └── 2.blog/
  ├── templates/           # Jinja templates, looked up by name
  └── public/              # Copied into output/, .scss compiled to .css

Templates see page variables, global variables, and the reserved names
permalink, slug, name, parent, siblings, children, ancestors, navigation,
current, root and assets.")]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    /// Log debug details (overridden by TACK_LOG)
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(flatten)]
    site: SiteArgs,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Generate the site into its output directory (the default)
    Build(SiteArgs),
    /// Build, serve the output, and rebuild on every change
    Serve {
        #[command(flatten)]
        site: SiteArgs,
        /// Port to listen on (overrides [serve] port)
        #[arg(short, long)]
        port: Option<u16>,
        /// Interface to bind (overrides [serve] interface)
        #[arg(short, long)]
        interface: Option<String>,
    },
    /// List the pages of a site without writing anything
    Check(SiteArgs),
    /// Print a stock tack.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.debug);

    match cli.command {
        None => build(&cli.site)?,
        Some(Command::Build(site)) => build(&site)?,
        Some(Command::Serve {
            site,
            port,
            interface,
        }) => {
            serve::serve_site(&site.dir, &ServeOptions { interface, port })?;
        }
        Some(Command::Check(site)) => {
            println!("==> Checking {}", site.dir.display());
            let graph = PageGraph::open(&site.dir)?;
            output::print_check_output(&graph);
            if graph.init_failures().is_empty() {
                println!("==> Site is valid");
            }
        }
        Some(Command::GenConfig) => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

fn build(site: &SiteArgs) -> Result<(), Box<dyn std::error::Error>> {
    let graph = PageGraph::open(&site.dir)?;
    let output_dir = &graph.dirs().output;
    println!("==> Tacking {} → {}", site.dir.display(), output_dir.display());
    let report = graph.tack()?;
    output::print_tack_report(&report, output_dir);
    Ok(())
}

fn init_logging(debug: bool) {
    let default_directive = if debug { "warn,tack=debug" } else { "warn,tack=info" };
    let filter =
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default_directive));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
