use std::collections::HashMap;

use comfy_table::{presets::NOTHING, *};
use happiness::{
    catalog::MetricCatalog,
    query::MetricValue,
    view_request::{ContextRow, View},
    COL,
};
use itertools::Itertools;

fn new_table<S: AsRef<str>>(header: &[S]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(NOTHING)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(
            header
                .iter()
                .map(|name| Cell::new(name.as_ref()).add_attribute(Attribute::Bold))
                .collect_vec(),
        )
        .set_style(comfy_table::TableComponent::BottomBorder, '─')
        .set_style(comfy_table::TableComponent::MiddleHeaderIntersections, '─')
        .set_style(comfy_table::TableComponent::HeaderLines, '─')
        .set_style(comfy_table::TableComponent::BottomBorderIntersections, '─')
        .set_style(comfy_table::TableComponent::TopBorder, '─')
        .set_style(comfy_table::TableComponent::TopBorderIntersections, '─');
    table
}

fn format_value(value: Option<f64>) -> String {
    value.map(|v| format!("{v:.2}")).unwrap_or_else(|| "-".into())
}

pub fn display_countries(countries: &[&str]) {
    let mut table = new_table(&[COL::COUNTRY]);
    for country in countries {
        table.add_row(vec![*country]);
    }
    println!("\n{}", table);
}

pub fn display_years(years: &[i32]) {
    let mut table = new_table(&[COL::YEAR]);
    for year in years {
        table.add_row(vec![year.to_string()]);
    }
    println!("\n{}", table);
}

/// Print each metric with what it measures, one bordered block per metric.
pub fn display_metrics(catalog: &MetricCatalog) {
    for metric in catalog.iter() {
        let mut table = Table::new();
        table
            .load_preset(NOTHING)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_style(comfy_table::TableComponent::BottomBorder, '─')
            .set_style(comfy_table::TableComponent::BottomBorderIntersections, '─')
            .set_style(comfy_table::TableComponent::TopBorder, '─')
            .set_style(comfy_table::TableComponent::TopBorderIntersections, '─')
            .add_row(vec![
                Cell::new("Metric").add_attribute(Attribute::Bold),
                metric.name.into(),
            ])
            .add_row(vec![
                Cell::new("Kind").add_attribute(Attribute::Bold),
                metric.kind.to_string().into(),
            ])
            .add_row(vec![
                Cell::new("Direction").add_attribute(Attribute::Bold),
                metric.direction.to_string().into(),
            ])
            .add_row(vec![
                Cell::new("Description").add_attribute(Attribute::Bold),
                metric.description.into(),
            ]);
        if let Some(column) = table.column_mut(0) {
            column.set_cell_alignment(CellAlignment::Right);
        }
        println!("\n{}", table);
    }
}

fn display_values(values: &[MetricValue], metric: &str) {
    let mut table = new_table(&[COL::COUNTRY, COL::YEAR, metric]);
    for value in values {
        table.add_row(vec![
            value.country.clone(),
            value.year.to_string(),
            format_value(value.value),
        ]);
    }
    println!("\n{}", table);
}

fn display_ranked(
    heading: &str,
    values: &[MetricValue],
    metric: &str,
    position_changes: Option<&HashMap<String, i32>>,
) {
    let mut header = vec![heading, COL::COUNTRY, metric];
    if position_changes.is_some() {
        header.push(COL::POSITION_CHANGES_YOY);
    }
    let mut table = new_table(header.as_slice());
    for (place, value) in values.iter().enumerate() {
        let mut row = vec![
            (place + 1).to_string(),
            value.country.clone(),
            format_value(value.value),
        ];
        if let Some(changes) = position_changes {
            row.push(
                changes
                    .get(&value.country)
                    .map(|change| format!("{change:+}"))
                    .unwrap_or_else(|| "-".into()),
            );
        }
        table.add_row(row);
    }
    println!("\n{}", table);
}

fn display_context(rows: &[ContextRow], metric: &str, average: f64) {
    let mut table = new_table(&[COL::COUNTRY, metric, "Against average"]);
    for row in rows {
        table.add_row(vec![
            row.country.clone(),
            format_value(row.value),
            if row.above_average { "above" } else { "below" }.to_string(),
        ]);
    }
    println!("\nGlobal average of '{metric}': {average:.2}");
    println!("\n{}", table);
}

/// Render a view as terminal tables. `position_changes` adds a column to the top/bottom view.
pub fn display_view(view: &View, position_changes: Option<&HashMap<String, i32>>) {
    match view {
        View::Map {
            year,
            metric,
            values,
        } => {
            println!("\n'{metric}' by country in {year}:");
            display_values(values, metric);
        }
        View::Trend { metric, series } => {
            println!("\n'{metric}' over time:");
            display_values(series, metric);
        }
        View::Correlation {
            year,
            metric_x,
            metric_y,
            pairs,
            coefficient,
        } => {
            let mut table = new_table(&[
                COL::COUNTRY,
                metric_x.as_str(),
                metric_y.as_str(),
                COL::LADDER_SCORE,
            ]);
            for pair in pairs {
                table.add_row(vec![
                    pair.country.clone(),
                    format!("{:.2}", pair.x),
                    format!("{:.2}", pair.y),
                    format!("{:.2}", pair.size_hint),
                ]);
            }
            println!("\n'{metric_x}' against '{metric_y}' in {year}:");
            println!("\n{}", table);
            match coefficient {
                Some(r) => println!("Pearson correlation: {r:.3}"),
                None => println!("Pearson correlation: not defined for these points"),
            }
        }
        View::TopBottom {
            year,
            metric,
            top,
            bottom,
        } => {
            println!("\nBest by '{metric}' in {year}:");
            display_ranked("Top", top, metric, position_changes);
            println!("\nWorst by '{metric}' in {year}:");
            display_ranked("Bottom", bottom, metric, position_changes);
        }
        View::GlobalAverage {
            metric,
            average,
            rows,
            ..
        } => display_context(rows, metric, *average),
    }
}
