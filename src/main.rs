use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use log::info;
use std::path::PathBuf;

use colorspotter::config::DEFAULT_CONFIG_FILE;
use colorspotter::image_ops::ImageLoader;
use colorspotter::{
    AddOutcome, ColorApiClient, ColorList, ColorSampler, Config, FileStore, ItemStore,
    SamplingStrategy, SpotState, Spotter, StillCamera,
};

#[derive(Debug, Parser)]
#[command(name = "colorspotter", about = "Spot, name and collect colors")]
struct Args {
    /// Configuration file; created with defaults when missing.
    #[arg(long, short, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Capture a photo (or read one from disk), sample its color and name it.
    Spot {
        /// Use this image instead of the camera.
        #[arg(long)]
        image: Option<PathBuf>,
        /// Override the configured sampling strategy.
        #[arg(long, value_enum)]
        strategy: Option<StrategyArg>,
        /// Use the front lens.
        #[arg(long, action, default_value = "false")]
        front: bool,
        /// Add the named color to the saved list.
        #[arg(long, action, default_value = "false")]
        save: bool,
    },
    /// Look up the name of a hex color.
    Name {
        hex: String,
        #[arg(long, action, default_value = "false")]
        save: bool,
    },
    /// Print the saved colors.
    List {
        #[arg(long, action, default_value = "false")]
        desc: bool,
    },
    /// Remove saved colors by hex value or by position in the ascending list.
    Delete {
        #[arg(long, conflicts_with = "index")]
        hex: Option<String>,
        #[arg(long, num_args = 1..)]
        index: Vec<usize>,
    },
    /// Write the default configuration file.
    Config {
        /// Replace an existing file.
        #[arg(long, action, default_value = "false")]
        force: bool,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum StrategyArg {
    Modal,
    Average,
}

impl From<StrategyArg> for SamplingStrategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::Modal => SamplingStrategy::ModalWindow,
            StrategyArg::Average => SamplingStrategy::AreaAverage,
        }
    }
}

type CliSpotter = Spotter<StillCamera, ColorApiClient>;

fn build_spotter(config: &Config, strategy: SamplingStrategy) -> CliSpotter {
    let sampler = ColorSampler::new(strategy)
        .with_window(config.sampling.window_size, config.sampling.window_size);
    Spotter::new(
        StillCamera::new(&config.camera),
        ColorApiClient::from_config(&config.lookup),
        sampler,
    )
    .with_crop(config.sampling.crop_side)
}

fn open_list(config: &Config) -> ColorList<FileStore> {
    let store = ItemStore::new(FileStore::new(&config.storage.data_dir), &config.storage.items_key);
    ColorList::load(store)
}

fn print_state(state: &SpotState) {
    match (&state.hex, &state.color_name) {
        (Some(hex), Some(name)) => println!("{}  {}", hex, name),
        (Some(hex), None) => println!("{}  (name unavailable)", hex),
        (None, _) => println!("No color could be sampled"),
    }
    if let Some(alert) = &state.alert {
        eprintln!("{}: {}", alert.title(), alert.message());
    }
}

async fn save_last(spotter: &CliSpotter, config: &Config) -> Result<()> {
    let mut list = open_list(config);
    match spotter.store_last_color(&mut list).await? {
        Some(AddOutcome::Added) => println!("Saved ({} colors)", list.len()),
        Some(AddOutcome::AlreadyInList) => {
            if let Some(alert) = spotter.state().await.alert {
                eprintln!("{}: {}", alert.title(), alert.message());
            }
        }
        None => eprintln!("Nothing to save: the color has no name yet"),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    if let Command::Config { force } = args.command {
        if Config::write_default(&args.config, force)? {
            println!("Wrote default configuration to {}", args.config.display());
        } else {
            println!("{} already exists, use --force to replace it", args.config.display());
        }
        return Ok(());
    }

    let mut config = Config::load_or_create(&args.config)?;
    info!("Configuration loaded from {}", args.config.display());

    match args.command {
        Command::Spot { image, strategy, front, save } => {
            if front {
                config.camera.position = colorspotter::CameraPosition::Front;
            }
            let strategy = strategy.map(Into::into).unwrap_or(config.sampling.strategy);
            let spotter = build_spotter(&config, strategy);

            let state = match image {
                Some(path) => {
                    let still = ImageLoader::new().load_image(&path)?;
                    spotter.identify_image(still).await?
                }
                None => {
                    if spotter.start_session().await.is_err() {
                        print_state(&spotter.state().await);
                        return Ok(());
                    }
                    let result = spotter.capture().await;
                    spotter.stop_session().await;
                    match result {
                        Ok(state) => state,
                        Err(_) => spotter.state().await,
                    }
                }
            };
            print_state(&state);

            if save {
                save_last(&spotter, &config).await?;
            }
        }
        Command::Name { hex, save } => {
            let spotter = build_spotter(&config, config.sampling.strategy);
            spotter.set_hex(&hex).await?;
            spotter.identify().await;
            print_state(&spotter.state().await);

            if save {
                save_last(&spotter, &config).await?;
            }
        }
        Command::List { desc } => {
            let mut list = open_list(&config);
            list.set_ascending(!desc);
            if list.is_empty() {
                println!("No saved colors");
            }
            for (index, item) in list.items().iter().enumerate() {
                let exact = if item.name.exact_match_name { "" } else { " ~" };
                println!("{:>3}  {}  {}{}", index, item.hex.value, item.name.value, exact);
            }
        }
        Command::Delete { hex, index } => {
            let mut list = open_list(&config);
            let removed = match hex {
                Some(hex) => {
                    let code = colorspotter::color::clean_hex_code(&hex)
                        .with_context(|| format!("Not a 6-digit hex color: {:?}", hex))?;
                    usize::from(list.delete_hex(&format!("#{}", code))?)
                }
                None => list.delete_at(index)?,
            };
            println!("Removed {} color(s), {} left", removed, list.len());
        }
        Command::Config { .. } => unreachable!("handled before the configuration is loaded"),
    }

    Ok(())
}
