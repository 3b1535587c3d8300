// Entry point and interactive menu.
//
// - Option [1] fetches the top-level rows and prints a load summary.
// - Option [2] builds the pivot table, exports it as CSV and JSON and
//   prints a preview.
// - Option [3] expands one sorting center into its child breakdown.
// After a report the user can go back to the menu or exit.
use anyhow::Result;
use chrono::Utc;
use clap::Parser;
use sorting_deviation::config::{Args, Settings};
use sorting_deviation::drilldown::MergedRow;
use sorting_deviation::output;
use sorting_deviation::util::format_int;
use sorting_deviation::{logging, Board};
use std::io::{self, Write};
use tracing::error;

const PREVIEW_ROWS: usize = 10;
const PREVIEW_DATES: usize = 3;

/// Print `prompt` and read one trimmed line.
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
        match read_line("Back to Report Selection (Y/N): ").to_uppercase().as_str() {
            "Y" => return true,
            "N" => return false,
            _ => println!("Invalid choice. Please enter Y or N."),
        }
    }
}

async fn handle_load(board: &mut Board) {
    match board.refresh().await {
        Ok(report) => {
            println!(
                "Processing dataset... ({} rows received, {} mapped)",
                format_int(report.total_rows),
                format_int(report.mapped_rows)
            );
            if report.skipped_rows > 0 {
                println!(
                    "Note: {} rows skipped (missing sorting center or date).",
                    format_int(report.skipped_rows)
                );
            }
            println!();
        }
        Err(e) => {
            error!(error = %e, "top-level fetch failed");
            eprintln!("Failed to load data: {}\n", e);
        }
    }
}

fn handle_generate_report(board: &Board, settings: &Settings) {
    let params = settings.schema_params(Utc::now().date_naive());
    let table = match board.table(&params) {
        Ok(t) => t,
        Err(e) => {
            println!("Error: {}. Please load the data first (option 1).\n", e);
            return;
        }
    };
    let merged = match board.merged_rows(&params, &settings.search, settings.sort.as_ref()) {
        Ok(rows) => rows,
        Err(e) => {
            eprintln!("Failed to build report: {}\n", e);
            return;
        }
    };

    println!("Generating report...");
    if let Err(e) = std::fs::create_dir_all(&settings.out_dir) {
        eprintln!("Failed to create {}: {}\n", settings.out_dir.display(), e);
        return;
    }
    let csv_path = settings.out_dir.join("sorting_deviation.csv");
    if let Err(e) = output::write_csv(&csv_path, &table.columns, &merged) {
        eprintln!("Write error: {}", e);
    }
    let json_path = settings.out_dir.join("sorting_deviation.json");
    if let Err(e) = output::write_json(&json_path, &table.to_json()) {
        eprintln!("Write error: {}", e);
    }

    println!("Sorting Deviation Report");
    println!(
        "({} days, mode: {}, {} sorting centers)\n",
        settings.days,
        settings.mode,
        format_int(table.rows.len())
    );
    output::print_preview(&table.columns, &merged, PREVIEW_ROWS, PREVIEW_DATES);
    println!("(Full table exported to {} and {})\n", csv_path.display(), json_path.display());
}

async fn handle_expand(board: &Board, settings: &Settings) {
    let entity = read_line("Sorting center: ");
    if entity.is_empty() {
        return;
    }
    let params = settings.schema_params(Utc::now().date_naive());
    match board.expand(&entity, &params).await {
        Ok(children) => {
            println!("{} breakdown ({} rows)\n", entity, format_int(children.len()));
            let merged: Vec<_> = children
                .into_iter()
                .map(|row| MergedRow {
                    parent: Some(entity.clone()),
                    row,
                })
                .collect();
            output::print_preview(&sorting_deviation::build_columns(&params), &merged, PREVIEW_ROWS, PREVIEW_DATES);
        }
        Err(e) => {
            error!(entity = %entity, error = %e, "drill-down failed");
            eprintln!("Failed to expand {}: {}\n", entity, e);
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init();
    let settings = Settings::from_args(Args::parse())?;
    let mut board = Board::new(settings.build_source())
        .with_fields(settings.top_level_fields.clone(), settings.drill_down_fields.clone());

    loop {
        println!("Sorting Deviation Report:");
        println!("[1] Load data");
        println!("[2] Generate report");
        println!("[3] Expand sorting center\n");
        match read_line("Enter choice: ").as_str() {
            "1" => handle_load(&mut board).await,
            "2" => {
                println!();
                handle_generate_report(&board, &settings);
                if !prompt_back_to_menu() {
                    println!("Exiting the program.");
                    break;
                }
            }
            "3" => handle_expand(&board, &settings).await,
            _ => println!("Invalid choice. Please enter 1, 2 or 3.\n"),
        }
    }
    Ok(())
}
