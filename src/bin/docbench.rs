use clap::{Parser, Subcommand, ValueEnum};
use docbench::bench::{self, RunOptions};
use docbench::{Backend, BenchConfig, BenchError, Layout, logger};
use std::io::Write;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "docbench", version, about = "Person- vs company-centric document layout benchmark", long_about = None)]
struct Cli {
    #[arg(long, help = "Path to a config file (TOML, or JSON by extension). If omitted, the search path is used.")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(about = "Generate, load and time Q1..Q4 for the selected layouts")]
    Run {
        #[arg(long, value_enum, default_value_t = LayoutArg::Both, help = "Which layout to run")]
        layout: LayoutArg,
        #[arg(long, value_enum, help = "Override the configured backend")]
        backend: Option<BackendArg>,
        #[arg(long, help = "Number of companies to generate")]
        companies: Option<usize>,
        #[arg(long, help = "Number of persons per company")]
        persons_per_company: Option<usize>,
        #[arg(long, help = "Seed for reproducible data")]
        seed: Option<u64>,
        #[arg(long, help = "Check the loaded data and query effects; fail on a violation")]
        verify: bool,
        #[arg(long, help = "Write a JSON report to this path")]
        report: Option<PathBuf>,
    },
    #[command(name = "show-config", about = "Print the resolved configuration as TOML")]
    ShowConfig,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum LayoutArg {
    Person,
    Company,
    Both,
}

impl LayoutArg {
    fn layouts(self) -> Vec<Layout> {
        match self {
            Self::Person => vec![Layout::PersonCentric],
            Self::Company => vec![Layout::CompanyCentric],
            Self::Both => Layout::ALL.to_vec(),
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum BackendArg {
    Mongodb,
    Memory,
}

impl From<BackendArg> for Backend {
    fn from(b: BackendArg) -> Self {
        match b {
            BackendArg::Mongodb => Self::Mongodb,
            BackendArg::Memory => Self::Memory,
        }
    }
}

fn main() -> Result<(), BenchError> {
    let cli = Cli::parse();
    let (mut cfg, source) = BenchConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::ShowConfig => {
            print!("{}", cfg.to_toml()?);
            Ok(())
        }
        Commands::Run { layout, backend, companies, persons_per_company, seed, verify, report } => {
            if let Some(b) = backend {
                cfg.backend = b.into();
            }
            if let Some(n) = companies {
                cfg.data.num_companies = n;
            }
            if let Some(n) = persons_per_company {
                cfg.data.num_persons_per_company = n;
            }
            if seed.is_some() {
                cfg.data.seed = seed;
            }
            logger::configure_from_env(&cfg.logging)?;
            match &source {
                Some(p) => log::info!("config loaded from {}", p.display()),
                None => log::info!("no config file found; using defaults"),
            }
            log::info!(
                "docbench run: {} companies x {} persons, backend {:?}",
                cfg.data.num_companies,
                cfg.data.num_persons_per_company,
                cfg.backend
            );

            let opts = RunOptions { layouts: layout.layouts(), verify };
            let stdout = std::io::stdout();
            let mut out = stdout.lock();
            let result = bench::run(&cfg, &opts, &mut out)?;
            out.flush()?;
            if let Some(path) = report {
                result.save(&path)?;
                log::info!("report written to {}", path.display());
            }
            Ok(())
        }
    }
}
