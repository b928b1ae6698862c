use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::sync::mpsc;
use weatherdash_core::config::API_KEY_ENV;
use weatherdash_core::{AppError, Config, ConfigError, TemperatureUnit, WidgetError};
use weatherdash_services::{
    CityCatalog, LocalWidgetStore, Notice, NoticeKind, SavedView, SearchView, Widget, WidgetId,
};
use weatherdash_weather::WeatherProvider;

#[derive(Debug, Parser)]
#[command(name = "weatherdash", version, about = "Search cities, save weather cards, watch them refresh")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Show current conditions for a city from the catalog
    Search {
        city: Option<String>,
        /// Temperature unit: c or f (defaults to the configured unit)
        #[arg(long, short)]
        unit: Option<TemperatureUnit>,
        /// Add the result to the saved widgets
        #[arg(long)]
        save: bool,
    },
    /// List catalog cities starting with a prefix
    Cities {
        prefix: Option<String>,
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Show saved widgets
    Saved {
        /// Keep refreshing until interrupted
        #[arg(long)]
        watch: bool,
    },
    /// Remove a saved widget by id
    Remove { id: WidgetId },
}

type Result<T> = std::result::Result<T, AppError>;

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(e) = weatherdash_core::init() {
        eprintln!("{:#}", e);
        return ExitCode::FAILURE;
    }
    let cli = Cli::parse();

    match run(cli.command).await {
        Ok(code) => code,
        Err(e) => {
            tracing::debug!("Command failed: {}", e);
            eprintln!("{}", e.user_message());
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Command) -> Result<ExitCode> {
    match command {
        Command::Search { city, unit, save } => search(&config()?, city.as_deref(), unit, save).await,
        Command::Cities { prefix, limit } => cities(prefix.as_deref().unwrap_or(""), limit),
        Command::Saved { watch } => saved(&config()?, watch).await,
        Command::Remove { id } => remove(&config()?, id),
    }
}

fn config() -> Result<Config> {
    let (config, _) = Config::load_validated().map_err(AppError::from_anyhow)?;
    tracing::debug!("Using data directory {}", config.data_dir.display());
    Ok(config)
}

fn catalog() -> Result<CityCatalog> {
    CityCatalog::builtin().map_err(|e| AppError::Other(e.into()))
}

fn provider(config: &Config) -> Result<Arc<WeatherProvider>> {
    let api_key = config.weather.resolved_api_key().ok_or_else(|| {
        ConfigError::MissingSetting(format!("weather.api_key (or {})", API_KEY_ENV))
    })?;
    let provider = WeatherProvider::with_base_url(api_key, config.weather.api_base_url.as_str())
        .map_err(WidgetError::from)?;
    Ok(Arc::new(provider))
}

fn store(config: &Config) -> Result<Arc<LocalWidgetStore<weatherdash_services::FileKeyValueStore>>> {
    Ok(Arc::new(LocalWidgetStore::open(config.storage_dir())?))
}

async fn search(
    config: &Config,
    input: Option<&str>,
    unit: Option<TemperatureUnit>,
    save: bool,
) -> Result<ExitCode> {
    let catalog = catalog()?;
    let city = input.and_then(|i| catalog.resolve(i)).map(|o| o.title.as_str());

    let mut view = SearchView::new(provider(config)?, store(config)?, config.weather.default_unit);
    if let Some(unit) = unit {
        view.set_unit(unit);
    }

    let widget = match view.search(city).await {
        Ok(widget) => widget,
        Err(e) => return Ok(show_notice(&Notice::from(&e))),
    };
    print_card(&widget);

    if save {
        return Ok(match view.save_to_user() {
            Ok(_) => show_notice(&Notice::saved()),
            Err(e) => show_notice(&Notice::from(&e)),
        });
    }
    Ok(ExitCode::SUCCESS)
}

fn cities(prefix: &str, limit: usize) -> Result<ExitCode> {
    for option in catalog()?.suggest(prefix, limit) {
        println!("{}", option.title);
    }
    Ok(ExitCode::SUCCESS)
}

async fn saved(config: &Config, watch: bool) -> Result<ExitCode> {
    let store = store(config)?;
    let mut view = SavedView::new(store);

    if !watch {
        view.load();
        print_cards(&view.widgets());
        return Ok(ExitCode::SUCCESS);
    }

    let (tx, mut rx) = mpsc::unbounded_channel();
    view.start(provider(config)?, config.refresh.interval(), Some(tx));
    print_cards(&view.widgets());

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            report = rx.recv() => {
                let Some(report) = report else { break };
                println!(
                    "--- refresh #{}: {} updated, {} failed ---",
                    report.tick, report.updated, report.failed
                );
                print_cards(&view.widgets());
            }
        }
    }

    view.close().await;
    Ok(ExitCode::SUCCESS)
}

fn remove(config: &Config, id: WidgetId) -> Result<ExitCode> {
    let mut view = SavedView::new(store(config)?);
    view.load();
    match view.remove(id)? {
        Some(widget) => println!("Removed {} ({})", widget.city, widget.id),
        None => println!("No saved widget with id {}", id),
    }
    Ok(ExitCode::SUCCESS)
}

fn show_notice(notice: &Notice) -> ExitCode {
    match notice.kind {
        NoticeKind::Info => {
            println!("{}", notice.message);
            ExitCode::SUCCESS
        }
        NoticeKind::Error => {
            eprintln!("{}", notice.message);
            ExitCode::FAILURE
        }
    }
}

fn print_cards(widgets: &[Widget]) {
    if widgets.is_empty() {
        println!("No saved widgets. Use `weatherdash search <city> --save` to add one.");
    }
    for widget in widgets {
        print_card(widget);
    }
}

fn print_card(widget: &Widget) {
    let symbol = widget.unit.symbol();
    let Some(data) = &widget.weather_data else {
        println!("[{}] {}", widget.id, widget.city);
        println!("    (no data yet)");
        return;
    };
    println!("[{}] {}  ({})", widget.id, widget.city, data.condition.icon_name());
    let wind = match widget.unit {
        TemperatureUnit::Celsius => "m/s",
        TemperatureUnit::Fahrenheit => "mph",
    };
    println!(
        "    {:.1}°{} (feels like {:.1}°{})  {}: {}",
        data.temperature, symbol, data.feels_like, symbol, data.summary, data.description
    );
    println!("    wind {:.1} {}  updated {}", data.wind_speed, wind, data.fetched_at.format("%H:%M:%S"));
    println!("    icon {}", data.icon_url());
}
