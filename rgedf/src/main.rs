use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};
use rgecore::physics::pid::PidListing;

use rgedf::config::RgeConfig;
use rgedf::pipeline::acc_corr::acc_corr;
use rgedf::pipeline::ntuples::make_ntuples;

#[derive(Parser)]
#[command(name = "rge")]
#[command(about = "CLAS12 RG-E particle reconstruction and acceptance correction", long_about = None)]
struct Cli {
    /// Config TOML file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconstruct the particles of an event store and write them to an ntuple
    MakeNtuples {
        /// Event store, named <text><run number>.<extension>
        input: PathBuf,

        /// FMT layers a track must cross: 0, 2 or 3
        #[arg(short = 'f', long)]
        fmt_layers: Option<u8>,

        /// Reject particles outside the FMT polar acceptance
        #[arg(short = 'c', long, action = ArgAction::SetTrue)]
        fmt_cut: bool,

        /// Number of events to process
        #[arg(short = 'n', long)]
        n_events: Option<usize>,

        /// Output directory
        #[arg(short = 'w', long)]
        work_dir: Option<PathBuf>,

        /// Directory holding the sampling fraction files
        #[arg(short = 'd', long)]
        data_dir: Option<PathBuf>,

        /// Beam energy in GeV, required for runs missing from the run table
        #[arg(short = 'e', long)]
        beam_energy: Option<f64>,

        /// Apply track quality and vertex cuts
        #[arg(long, action = ArgAction::SetTrue)]
        quality_cuts: bool,
    },

    /// Bin thrown and simulated samples and write the acceptance table
    AccCorr {
        /// Ntuple of generated events
        thrown: PathBuf,

        /// Ntuple of reconstructed simulated events
        simulated: PathBuf,

        /// Output directory
        #[arg(short = 'w', long)]
        work_dir: Option<PathBuf>,

        /// Q2 bin edges
        #[arg(long, num_args = 1..)]
        q2: Option<Vec<f64>>,

        /// nu bin edges
        #[arg(long, num_args = 1..)]
        nu: Option<Vec<f64>>,

        /// z_h bin edges
        #[arg(long, num_args = 1..)]
        zh: Option<Vec<f64>>,

        /// Pt2 bin edges
        #[arg(long, num_args = 1.., allow_negative_numbers = true)]
        pt2: Option<Vec<f64>>,

        /// phi_PQ bin edges, in radians
        #[arg(long, num_args = 1.., allow_negative_numbers = true)]
        phipq: Option<Vec<f64>>,

        /// phi_PQ of the thrown sample is stored in degrees
        #[arg(long, action = ArgAction::SetTrue)]
        thrown_degrees: bool,

        /// phi_PQ of the simulated sample is stored in degrees
        #[arg(long, action = ArgAction::SetTrue)]
        simulated_degrees: bool,

        /// Worker threads
        #[arg(short = 't', long)]
        threads: Option<usize>,
    },

    /// List the supported particle ids
    Pids,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let mut config = RgeConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::MakeNtuples { input, fmt_layers, fmt_cut, n_events, work_dir, data_dir, beam_energy, quality_cuts } => {
            // command line flags override the configuration file
            let ntuples = &mut config.ntuples;
            if let Some(fmt_layers) = fmt_layers {
                ntuples.fmt_layers = fmt_layers;
            }
            ntuples.fmt_cut |= fmt_cut;
            ntuples.quality_cuts |= quality_cuts;
            ntuples.n_events = n_events.or(ntuples.n_events);
            ntuples.beam_energy = beam_energy.or(ntuples.beam_energy);
            if let Some(work_dir) = work_dir {
                ntuples.work_dir = work_dir;
            }
            if let Some(data_dir) = data_dir {
                ntuples.data_dir = data_dir;
            }

            let summary = make_ntuples(&input, ntuples)?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Commands::AccCorr { thrown, simulated, work_dir, q2, nu, zh, pt2, phipq, thrown_degrees, simulated_degrees, threads } => {
            let binning = &mut config.binning;
            binning.q2 = q2.or(binning.q2.take());
            binning.nu = nu.or(binning.nu.take());
            binning.zh = zh.or(binning.zh.take());
            binning.pt2 = pt2.or(binning.pt2.take());
            binning.phipq = phipq.or(binning.phipq.take());
            binning.thrown_phipq_in_degrees |= thrown_degrees;
            binning.simulated_phipq_in_degrees |= simulated_degrees;
            binning.threads = threads.or(binning.threads);
            let work_dir = work_dir.unwrap_or_else(|| config.ntuples.work_dir.clone());

            let summary = acc_corr(&thrown, &simulated, &work_dir, &config.binning, &config.cuts)?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Commands::Pids => print!("{}", PidListing),
    }
    Ok(())
}
