// Entry point and high-level CLI flow.
//
// - Option [1] loads the census and region tables and runs the cleaning
//   pipeline, printing diagnostics.
// - Option [2] writes both dataset snapshots plus every report and previews
//   them on the console.
// - Option [3] runs the stressor significance tests for a typed grouping key.
// With `--batch` the binary runs [1] and [2] once and exits.
use clap::Parser;
use colony_census::cli::Cli;
use colony_census::config::AppConfig;
use colony_census::loader;
use colony_census::output;
use colony_census::pipeline::{self, PipelineOutput};
use colony_census::reports;
use colony_census::significance::{GroupSignificance, GroupSignificanceClassifier};
use colony_census::types::GroupingKey;
use colony_census::util::{format_int, format_number};
use once_cell::sync::Lazy;
use serde::Serialize;
use std::io::{self, Write};
use std::path::Path;
use std::process;
use std::sync::{Mutex, MutexGuard};
use tracing::error;
use tracing_subscriber::EnvFilter;

// Loaded once per run, reused by every report request.
static APP_STATE: Lazy<Mutex<AppState>> = Lazy::new(|| Mutex::new(AppState { output: None }));

struct AppState {
    output: Option<PipelineOutput>,
}

fn app_state() -> MutexGuard<'static, AppState> {
    APP_STATE.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Print `prompt` and read one trimmed line from stdin.
fn read_line(prompt: &str) -> String {
    print!("{}", prompt);
    let _ = io::stdout().flush();
    let mut buf = String::new();
    io::stdin().read_line(&mut buf).ok();
    buf.trim().to_string()
}

/// Returns `true` if the user chose `Y`, `false` if they chose `N`.
fn prompt_back_to_menu() -> bool {
    loop {
        match read_line("Back to menu (Y/N): ").to_uppercase().as_str() {
            "Y" => return true,
            "N" => return false,
            _ => println!("Invalid choice. Please enter Y or N."),
        }
    }
}

fn handle_load(cli: &Cli) -> bool {
    let loaded = loader::load_regions(&cli.regions).and_then(|regions| {
        let (rows, load_report) = loader::load_census(&cli.census)?;
        pipeline::run(rows, &regions).map(|out| (out, load_report))
    });
    let (out, load_report) = match loaded {
        Ok(v) => v,
        Err(e) => {
            error!(error = %e, "load failed");
            eprintln!("Failed to load data: {}\n", e);
            return false;
        }
    };

    println!(
        "Processing dataset... ({} rows loaded, {} states, {} records after interpolation)",
        format_int(load_report.kept_rows),
        format_int(out.canonical.states().len()),
        format_int(out.canonical.len())
    );
    if load_report.parse_errors > 0 {
        println!(
            "Note: {} rows skipped due to parse errors.",
            format_int(load_report.parse_errors)
        );
    }
    let inserted: usize = out.fills.iter().map(|f| f.inserted_rows).sum();
    let filled: usize = out
        .fills
        .iter()
        .map(|f| f.counts.interpolated + f.counts.boundary_filled)
        .sum();
    println!(
        "Info: Filled {} missing values ({} absent periods inserted).",
        format_int(filled),
        format_int(inserted)
    );
    if !out.issues.is_empty() {
        println!(
            "Warning: {} data-quality issues; see data_quality_issues.csv after generating reports.",
            format_int(out.issues.len())
        );
    }
    println!();
    app_state().output = Some(out);
    true
}

fn write_report<T: Serialize>(dir: &Path, name: &str, rows: &[T]) {
    if let Err(e) = output::write_csv(dir.join(name), rows) {
        eprintln!("Write error ({}): {}", name, e);
    }
}

fn loaded_output() -> Option<PipelineOutput> {
    let out = app_state().output.clone();
    if out.is_none() {
        println!("Error: No data loaded. Please load the census data first (option 1).\n");
    }
    out
}

fn report_significance(dir: &Path, result: &GroupSignificance, preview_rows: usize) {
    let key = result.key.name();
    write_report(dir, &format!("group_means_{}.csv", key), &result.mean_rows());
    write_report(dir, &format!("stressor_tests_{}.csv", key), &result.test_rows());
    output::preview_table(
        &format!("Stressor Impact by {}", key),
        Some("Welch t-test of each group against all records"),
        &result.test_rows(),
        preview_rows,
    );
}

fn handle_generate_reports(cli: &Cli, config: &AppConfig, classifier: &GroupSignificanceClassifier) {
    let Some(out) = loaded_output() else {
        return;
    };
    let dir = cli.out_dir.as_path();
    if let Err(e) = std::fs::create_dir_all(dir) {
        eprintln!("Cannot create {}: {}", dir.display(), e);
        return;
    }
    let preview = config.report.preview_rows;

    println!("Generating reports...");
    println!("Outputs saved to {}\n", dir.display());

    for (name, data) in [
        ("pre_interpolation.csv", &out.pre_interpolation),
        ("colony_data_interpolated.csv", &out.canonical),
    ] {
        if let Err(e) = output::write_dataset(dir.join(name), data) {
            eprintln!("Write error ({}): {}", name, e);
        }
    }

    let fills: Vec<_> = out.fills.iter().map(|f| f.to_row()).collect();
    write_report(dir, "interpolation_fills.csv", &fills);
    output::preview_table("Interpolation Summary", Some("values filled per state"), &fills, preview);

    let issues = reports::issue_rows(&out.issues);
    write_report(dir, "data_quality_issues.csv", &issues);
    if !issues.is_empty() {
        output::preview_table("Data Quality Issues", None, &issues, preview);
    }

    let means: Vec<_> = reports::state_stressor_means(&out.canonical)
        .iter()
        .map(|m| m.to_row())
        .collect();
    write_report(dir, "state_stressor_means.csv", &means);
    output::preview_table("Stressor Averages by State", Some("% of colonies destroyed"), &means, preview);

    if let Some(ex) = reports::stressor_extremes(&out.canonical, cli.stressor) {
        println!(
            "{} has the highest average of {} % of colonies destroyed by {}",
            ex.highest.state,
            format_number(ex.highest.value, 1),
            ex.stressor.label()
        );
        println!(
            "{} has the lowest average of {} % of colonies destroyed by {}\n",
            ex.lowest.state,
            format_number(ex.lowest.value, 1),
            ex.stressor.label()
        );
    }

    let rates = reports::restoration_rates(&out.canonical);
    let rate_rows: Vec<_> = rates.iter().map(|r| r.to_row()).collect();
    write_report(dir, "restoration_rates.csv", &rate_rows);
    if let Some(state) = &cli.state {
        match reports::restoration_rate(&out.canonical, state) {
            Some(r) => println!(
                "{} % of colony populations end a quarter above the initial count in {}\n",
                format_number(r.percentage, 0),
                r.state
            ),
            None => println!("No records for state '{}'.\n", state),
        }
    }
    output::preview_table("Restoration Rate by State", Some("end count > initial count"), &rate_rows, preview);

    for key in [GroupingKey::Quarter, GroupingKey::Region] {
        let result = classifier.classify(&out.canonical, key);
        report_significance(dir, &result, preview);
    }

    let summary = reports::generate_summary(&out.pre_interpolation, &out.canonical, &out.fills, &out.issues);
    if let Err(e) = output::write_json(dir.join("summary.json"), &summary) {
        eprintln!("Write error: {}", e);
    }
    println!("Summary Stats (summary.json):");
    println!(
        "{{\"records\": {}, \"states\": {}, \"most_impactful_stressor\": \"{}\"}}\n",
        summary.canonical_records,
        summary.total_states,
        summary.most_impactful_stressor.as_deref().unwrap_or("NA")
    );
}

fn handle_significance(cli: &Cli, config: &AppConfig, classifier: &GroupSignificanceClassifier) {
    let Some(out) = loaded_output() else {
        return;
    };
    let key = read_line("Group by (quarter/region): ");
    match classifier.classify_by_name(&out.canonical, &key) {
        Ok(result) => {
            if let Err(e) = std::fs::create_dir_all(&cli.out_dir) {
                eprintln!("Cannot create {}: {}", cli.out_dir.display(), e);
                return;
            }
            report_significance(&cli.out_dir, &result, config.report.preview_rows.max(result.len()));
        }
        Err(e) => println!("{}\n", e),
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => AppConfig::load(path),
        None => Ok(AppConfig::default()),
    };
    let classifier = config
        .and_then(|config| GroupSignificanceClassifier::new(config.classifier.clone()).map(|c| (config, c)));
    let (config, classifier) = match classifier {
        Ok(v) => v,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            process::exit(1);
        }
    };

    if cli.batch {
        if !handle_load(&cli) {
            process::exit(1);
        }
        handle_generate_reports(&cli, &config, &classifier);
        return;
    }

    loop {
        println!("Honeybee Colony Census:");
        println!("[1] Load the data");
        println!("[2] Generate Reports");
        println!("[3] Test Stressors by Group\n");
        match read_line("Enter choice: ").as_str() {
            "1" => {
                handle_load(&cli);
            }
            choice @ ("2" | "3") => {
                println!();
                if choice == "2" {
                    handle_generate_reports(&cli, &config, &classifier);
                } else {
                    handle_significance(&cli, &config, &classifier);
                }
                if !prompt_back_to_menu() {
                    println!("Exiting the program.");
                    break;
                }
            }
            _ => {
                println!("Invalid choice. Please enter 1, 2 or 3.\n");
            }
        }
    }
}
