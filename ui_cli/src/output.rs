//! Terminal output helpers.

use colored::Colorize;
use serde::Serialize;
use tabled::settings::Style;
use tabled::{Table, Tabled};

use crate::OutputFormat;

pub fn info(msg: &str) {
    println!("{} {}", "info".blue().bold(), msg);
}

pub fn success(msg: &str) {
    println!("{} {}", "ok".green().bold(), msg);
}

pub fn warn(msg: &str) {
    eprintln!("{} {}", "warn".yellow().bold(), msg);
}

pub fn error(msg: &str) {
    eprintln!("{} {}", "error".red().bold(), msg);
}

pub fn section(title: &str) {
    println!("\n{}", title.bold().underline());
}

fn render<T: Serialize + ?Sized>(
    value: &T,
    format: OutputFormat,
) -> anyhow::Result<Option<String>> {
    Ok(match format {
        OutputFormat::Table => None,
        OutputFormat::Json => Some(serde_json::to_string_pretty(value)?),
        OutputFormat::Yaml => Some(serde_yaml_ng::to_string(value)?),
    })
}

/// Print a list, as a table of `to_row` rows or as serialized `items`.
pub fn print_data<T, R>(
    items: &[T],
    format: OutputFormat,
    to_row: impl Fn(&T) -> R,
) -> anyhow::Result<()>
where
    T: Serialize,
    R: Tabled,
{
    if let Some(text) = render(items, format)? {
        println!("{}", text);
        return Ok(());
    }

    if items.is_empty() {
        println!("  (none)");
    } else {
        let mut table = Table::new(items.iter().map(to_row));
        table.with(Style::rounded());
        println!("{}", table);
    }
    Ok(())
}

pub fn print_item<T, R>(
    item: &T,
    format: OutputFormat,
    to_row: impl Fn(&T) -> R,
) -> anyhow::Result<()>
where
    T: Serialize,
    R: Tabled,
{
    if let Some(text) = render(item, format)? {
        println!("{}", text);
        return Ok(());
    }

    let mut table = Table::new([to_row(item)]);
    table.with(Style::rounded());
    println!("{}", table);
    Ok(())
}
