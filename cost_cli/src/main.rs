//! # Estimator CLI
//!
//! Command-line front end for `cost_core`. Owns the referential and the
//! project state for the duration of a command: loads them from the store,
//! applies edits, recomputes, prints and persists.

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand, ValueEnum};
use log::{info, warn};
use serde_json::{json, Map, Value};

use cost_core::calculations::lots::ratios_sum_to_hundred;
use cost_core::state::NEW_LOT_NAME;
use cost_core::{
    build_csv, build_export_payload, estimate, import_payload, normalize_state, CostError, CostResult,
    Estimate, ProjectState, RateBranch, Referential, Store, StoreConfig,
};

#[derive(Parser)]
#[command(name = "cost_cli")]
#[command(about = "Building construction and lifecycle cost estimator", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Directory holding the saved referential and project state
    #[arg(long, global = true, env = "ESTIMATOR_STORE", default_value = ".estimator")]
    store: PathBuf,

    /// Show debug logs (normalization repairs, store writes)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Recompute and print the estimate, optionally editing the project first
    Estimate(EstimateArgs),

    /// Export referential, state and results
    Export(ExportArgs),

    /// Import a JSON export and save it
    Import(ImportArgs),

    /// Replace the lots with the preset of the selected typology
    #[command(name = "preset-lots")]
    PresetLots,

    /// Add, edit or remove trade line items (lots)
    #[command(subcommand)]
    Lot(LotCommand),

    /// Edit professional fee lines
    #[command(subcommand)]
    Honos(HonosCommand),

    /// Show or edit the referential (prints it as JSON by default)
    Referential {
        #[command(subcommand)]
        action: Option<ReferentialCommand>,
    },

    /// Remove saved data
    Reset(ResetArgs),
}

#[derive(Args)]
struct EstimateArgs {
    #[arg(long)]
    typologie: Option<String>,

    /// Floor area (m²)
    #[arg(long)]
    surface: Option<f64>,

    /// Geographic cost index
    #[arg(long)]
    indice_geo: Option<f64>,

    #[arg(long)]
    reglementation: Option<String>,

    #[arg(long)]
    type_constructif: Option<String>,

    #[arg(long)]
    contrainte_sol: Option<String>,

    #[arg(long)]
    contrainte_terrain: Option<String>,

    #[arg(long)]
    chauffage: Option<String>,

    #[arg(long)]
    ventilation: Option<String>,

    /// Custom addition (€/m²)
    #[arg(long)]
    ajout_perso: Option<f64>,

    /// Opex horizon (years)
    #[arg(long)]
    opex_horizon: Option<f64>,

    /// Year-1 energy cost (€/m²/year)
    #[arg(long, conflicts_with = "suggest_energy")]
    opex_energy_base: Option<f64>,

    /// Yearly maintenance (% of works cost)
    #[arg(long)]
    opex_maint_pct: Option<f64>,

    /// Energy cost growth (%/year)
    #[arg(long)]
    inflation_energy: Option<f64>,

    /// Maintenance cost growth (%/year)
    #[arg(long)]
    inflation_maint: Option<f64>,

    /// Discount rate (%/year)
    #[arg(long)]
    discount_rate: Option<f64>,

    /// Use the suggested energy cost for the selected heating and ventilation
    #[arg(long)]
    suggest_energy: bool,

    /// Print the full estimate as JSON
    #[arg(long)]
    json: bool,

    /// Save the edited project state
    #[arg(long)]
    save: bool,
}

#[derive(Subcommand)]
enum LotCommand {
    /// List lots with their ratios
    List,

    /// Append a lot
    Add {
        #[arg(default_value = NEW_LOT_NAME)]
        name: String,

        /// Share of works cost (%)
        #[arg(long, default_value_t = 0.0)]
        ratio: f64,
    },

    /// Rename a lot or change its ratio
    Set {
        /// Lot number as shown by `lot list` (from 1)
        number: usize,

        #[arg(long)]
        name: Option<String>,

        /// Share of works cost (%)
        #[arg(long)]
        ratio: Option<f64>,
    },

    /// Delete a lot
    Remove {
        /// Lot number as shown by `lot list` (from 1)
        number: usize,
    },
}

#[derive(Subcommand)]
enum HonosCommand {
    /// List fee lines
    List,

    /// Set a role's fee, adding the role when missing
    Set {
        role: String,

        /// Fee as a percentage of works cost
        percent: f64,
    },
}

#[derive(Subcommand)]
enum ReferentialCommand {
    /// Print the normalized referential as JSON
    Show,

    /// Set one rate, as stored (fractions for surcharges and fees, €/m² otherwise)
    Set {
        /// typologies, reglementation, typeConstructif, contrainteSol,
        /// contrainteTerrain, chauffage, ventilation or honoraires
        branch: String,
        key: String,
        value: f64,
    },

    /// Set one lot ratio (%) of a typology's preset
    Preset {
        typologie: String,
        lot: String,
        ratio: f64,
    },

    /// List lot presets with their ratio totals
    Presets,
}

#[derive(Clone, Copy, ValueEnum)]
enum ExportFormat {
    Json,
    Csv,
}

#[derive(Args)]
struct ExportArgs {
    #[arg(long, value_enum, default_value = "json")]
    format: ExportFormat,

    /// Write to a file instead of stdout
    #[arg(long, short)]
    output: Option<PathBuf>,
}

#[derive(Args)]
struct ImportArgs {
    /// JSON file with REF and/or STATE
    file: PathBuf,
}

#[derive(Args)]
struct ResetArgs {
    /// Keep the saved referential
    #[arg(long)]
    state_only: bool,
}

/// Referential and state for one command.
struct Session {
    store: Store,
    referential: Referential,
    state: ProjectState,
}

impl Session {
    fn load(config: StoreConfig) -> Self {
        let store = Store::open(config);
        let referential = store.load_referential();
        let mut state = store.load_state(&referential);
        state.initialize_lines(&referential);
        Session {
            store,
            referential,
            state,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Stderr).init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            if let Ok(json) = serde_json::to_string_pretty(&e) {
                eprintln!();
                eprintln!("Error JSON:");
                eprintln!("{}", json);
            }
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> CostResult<()> {
    let config = StoreConfig::new(cli.store);
    match cli.command {
        Commands::Estimate(args) => run_estimate(config, &args),
        Commands::Export(args) => run_export(config, &args),
        Commands::Import(args) => run_import(config, &args),
        Commands::PresetLots => run_preset_lots(config),
        Commands::Lot(command) => run_lot(config, command),
        Commands::Honos(command) => run_honos(config, command),
        Commands::Referential { action } => run_referential(config, action.unwrap_or(ReferentialCommand::Show)),
        Commands::Reset(args) => {
            let store = Store::open(config);
            if args.state_only {
                store.clear_state()?;
                println!("Saved project state removed.");
            } else {
                store.clear_all()?;
                println!("Saved referential and project state removed.");
            }
            info!("store reset in {}", store.config().dir.display());
            Ok(())
        }
    }
}

/// A failed save leaves the in-memory result valid; report it and go on.
fn persist(result: CostResult<()>) {
    if let Err(e) = result {
        warn!("changes not saved: {}", e);
    }
}

fn run_estimate(config: StoreConfig, args: &EstimateArgs) -> CostResult<()> {
    let mut session = Session::load(config);
    apply_overrides(&mut session, args);

    let result = estimate(&session.referential, &session.state);
    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_summary(&session, &result);
    }

    if args.save {
        persist(session.store.save_state(&session.state));
    }
    Ok(())
}

/// Overlay command-line edits and renormalize, so edits get the same
/// coercion as loaded data.
fn apply_overrides(session: &mut Session, args: &EstimateArgs) {
    let mut edits = Map::new();
    let mut text = |key: &str, value: &Option<String>| {
        if let Some(value) = value {
            edits.insert(key.to_string(), json!(value));
        }
    };
    text("typologie", &args.typologie);
    text("reglementation", &args.reglementation);
    text("typeConstructif", &args.type_constructif);
    text("contrainteSol", &args.contrainte_sol);
    text("contrainteTerrain", &args.contrainte_terrain);
    text("chauffage", &args.chauffage);
    text("ventilation", &args.ventilation);

    let numbers = [
        ("surface", args.surface),
        ("indiceGeo", args.indice_geo),
        ("ajoutPerso", args.ajout_perso),
        ("opexHorizon", args.opex_horizon),
        ("opexEnergyBase", args.opex_energy_base),
        ("opexMaintPct", args.opex_maint_pct),
        ("inflationEnergy", args.inflation_energy),
        ("inflationMaint", args.inflation_maint),
        ("discountRate", args.discount_rate),
    ];
    for (key, value) in numbers {
        if let Some(value) = value {
            edits.insert(key.to_string(), json!(value));
        }
    }

    if edits.is_empty() && !args.suggest_energy {
        return;
    }

    let mut candidate = session.state.to_value();
    if let Value::Object(map) = &mut candidate {
        map.extend(edits);
    }
    let mut state = normalize_state(&candidate, &session.referential);
    if args.suggest_energy {
        state.opex_energy_base = state.suggested_energy_base(&session.referential);
    }
    state.initialize_lines(&session.referential);
    session.state = state;
}

fn run_export(config: StoreConfig, args: &ExportArgs) -> CostResult<()> {
    let session = Session::load(config);
    let text = match args.format {
        ExportFormat::Json => build_export_payload(&session.referential, &session.state).to_json_pretty()?,
        ExportFormat::Csv => build_csv(&session.referential, &session.state),
    };

    match &args.output {
        Some(path) => {
            fs::write(path, text)
                .map_err(|e| CostError::file_error("write export", path.display().to_string(), e.to_string()))?;
            println!("Exported to {}", path.display());
        }
        None => println!("{}", text),
    }
    Ok(())
}

fn run_import(config: StoreConfig, args: &ImportArgs) -> CostResult<()> {
    let text = fs::read_to_string(&args.file)
        .map_err(|e| CostError::file_error("read import", args.file.display().to_string(), e.to_string()))?;

    let mut session = Session::load(config);
    let summary = import_payload(&text, &mut session.referential, &mut session.state)?;

    if summary.referential_replaced {
        persist(session.store.save_referential(&session.referential));
    }
    // lots and fee lines may have been initialised even for a REF-only import
    persist(session.store.save_state(&session.state));

    println!(
        "Imported {}: referential {}, state {}",
        args.file.display(),
        status_icon(summary.referential_replaced),
        status_icon(summary.state_replaced)
    );
    Ok(())
}

fn run_preset_lots(config: StoreConfig) -> CostResult<()> {
    let mut session = Session::load(config);
    session.state.apply_lots_preset(&session.referential)?;
    persist(session.store.save_state(&session.state));

    println!("Lots reset to the \"{}\" preset:", session.state.typologie);
    for lot in &session.state.lots {
        println!("  {:<32} {:>6.1} %", lot.name, lot.ratio);
    }
    Ok(())
}

/// Convert a 1-based lot number to an index.
fn lot_index(number: usize) -> CostResult<usize> {
    number
        .checked_sub(1)
        .ok_or_else(|| CostError::invalid_input("lot", "0", "Lot numbers start at 1"))
}

fn run_lot(config: StoreConfig, command: LotCommand) -> CostResult<()> {
    let mut session = Session::load(config);
    let edited = !matches!(command, LotCommand::List);
    match command {
        LotCommand::List => {}
        LotCommand::Add { name, ratio } => {
            let index = session.state.add_lot(name, ratio);
            println!("Added lot {}", index + 1);
        }
        LotCommand::Set { number, name, ratio } => {
            let lot = session.state.update_lot(lot_index(number)?, name, ratio)?;
            println!("Lot {} is now \"{}\" at {} %", number, lot.name, lot.ratio);
        }
        LotCommand::Remove { number } => {
            let lot = session.state.remove_lot(lot_index(number)?)?;
            println!("Removed \"{}\"", lot.name);
        }
    }
    if edited {
        persist(session.store.save_state(&session.state));
    }
    print_lots(&session);
    Ok(())
}

fn print_lots(session: &Session) {
    let result = estimate(&session.referential, &session.state);
    for (number, lot) in result.lots.items.iter().enumerate() {
        println!("  {:>3}. {:<32} {:>6.1} % {:>14.0} €", number + 1, lot.name, lot.ratio, lot.amount);
    }
    println!(
        "  Total: {:.1} % {}",
        result.lots.total_ratio,
        status_icon(result.lots.ratios_valid())
    );
}

fn run_honos(config: StoreConfig, command: HonosCommand) -> CostResult<()> {
    let mut session = Session::load(config);
    if let HonosCommand::Set { role, percent } = command {
        session.state.set_hono(role, percent / 100.0);
        persist(session.store.save_state(&session.state));
    }

    let result = estimate(&session.referential, &session.state);
    for fee in &result.fees.lines {
        println!("  {:<32} {:>6.2} % {:>14.0} €", fee.role, fee.fraction * 100.0, fee.amount);
    }
    println!("  Total: {:.0} €", result.fees.total);
    Ok(())
}

fn run_referential(config: StoreConfig, command: ReferentialCommand) -> CostResult<()> {
    let mut session = Session::load(config);
    match command {
        ReferentialCommand::Show => {
            println!("{}", serde_json::to_string_pretty(&session.referential)?);
        }
        ReferentialCommand::Set { branch, key, value } => {
            let rate_branch = RateBranch::from_key(&branch)
                .ok_or_else(|| CostError::invalid_input("branch", branch.as_str(), "Unknown referential branch"))?;
            session.referential.set_rate(rate_branch, key.as_str(), value)?;
            persist(session.store.save_referential(&session.referential));
            if rate_branch == RateBranch::Honoraires {
                // a new role reaches the project's fee lines
                session.state.ensure_honos_initialized(&session.referential);
                persist(session.store.save_state(&session.state));
            }
            println!("{}.{} = {}", branch, key, value);
        }
        ReferentialCommand::Preset { typologie, lot, ratio } => {
            session.referential.set_preset_ratio(typologie.as_str(), lot.as_str(), ratio)?;
            persist(session.store.save_referential(&session.referential));
            print_preset_total(&session.referential, &typologie);
        }
        ReferentialCommand::Presets => {
            for (typologie, preset) in &session.referential.lots_presets {
                println!("{}:", typologie);
                for (lot, ratio) in preset {
                    println!("  {:<32} {:>6.1} %", lot, ratio);
                }
                print_preset_total(&session.referential, typologie);
            }
        }
    }
    Ok(())
}

fn print_preset_total(referential: &Referential, typologie: &str) {
    if let Some(total) = referential.preset_ratio_total(typologie) {
        println!("  {} total: {:.1} % {}", typologie, total, status_icon(ratios_sum_to_hundred(total)));
    }
}

fn print_summary(session: &Session, result: &Estimate) {
    let state = &session.state;
    let details = &result.unit_cost.details;

    println!("═══════════════════════════════════════");
    println!("  COST ESTIMATE");
    println!("═══════════════════════════════════════");
    println!();
    println!("Project:");
    println!("  Typologie:    {}", state.typologie);
    println!("  Surface:      {:.0} m²", state.surface);
    println!("  Indice géo:   {:.2}", state.indice_geo);
    println!("  Systèmes:     {} / {}", state.chauffage, state.ventilation);
    println!();
    println!("Unit cost:");
    println!("  Base:         {:.2} €/m²", details.base);
    println!("  Surcoûts:     {:+.1} %", details.surcouts * 100.0);
    println!("  Additions:    {:.2} €/m²", details.additions);
    println!("  Base ajustée: {:.2} €/m²", result.unit_cost.base_ajustee);
    println!();
    println!("Lots (total {:.1} %) {}:", result.lots.total_ratio, status_icon(result.lots.ratios_valid()));
    for lot in &result.lots.items {
        println!("  {:<32} {:>6.1} % {:>14.0} €", lot.name, lot.ratio, lot.amount);
    }
    println!();
    println!("Honoraires:");
    for fee in &result.fees.lines {
        println!("  {:<32} {:>6.2} % {:>14.0} €", fee.role, fee.fraction * 100.0, fee.amount);
    }
    println!();
    println!(
        "OPEX: {} years, energy {:.2} €/m² (suggested {:.2})",
        result.opex.years.len(),
        state.opex_energy_base,
        state.suggested_energy_base(&session.referential)
    );
    println!();
    println!("═══════════════════════════════════════");
    println!("  Coût travaux:      {:>16.0} €", result.works_cost);
    println!("  Total honoraires:  {:>16.0} €", result.fees.total);
    println!("  OPEX actualisées:  {:>16.0} €", result.opex.present_value);
    println!("  Coût global:       {:>16.0} €", result.global);
    println!("  Coût global / m²:  {:>16.0} €", result.global_per_m2);
    println!("═══════════════════════════════════════");
}

fn status_icon(ok: bool) -> &'static str {
    if ok {
        "[OK]"
    } else {
        "[--]"
    }
}
