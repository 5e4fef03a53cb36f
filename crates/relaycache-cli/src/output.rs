use crate::cli::OutputFormat;
use colored::Colorize;
use serde_json::Value;
use tabled::builder::Builder;
use tabled::settings::Style;

pub fn print_success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

pub fn print_warning(msg: &str) {
    println!("{} {}", "!".yellow(), msg);
}

pub fn print_error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

pub fn print_json(value: &Value) {
    println!(
        "{}",
        serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
    );
}

/// Print rows under `header`, or the equivalent JSON array of objects.
pub fn print_rows(header: &[&str], rows: &[Vec<String>], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let items: Vec<Value> = rows
                .iter()
                .map(|row| {
                    let obj = header
                        .iter()
                        .zip(row)
                        .map(|(h, cell)| ((*h).to_string(), Value::String(cell.clone())))
                        .collect();
                    Value::Object(obj)
                })
                .collect();
            print_json(&Value::Array(items));
        }
        OutputFormat::Table => {
            let mut builder = Builder::default();
            builder.push_record(header.iter().copied());
            for row in rows {
                builder.push_record(row.iter().map(String::as_str));
            }
            let table = builder.build().with(Style::rounded()).to_string();
            println!("{table}");
        }
    }
}
