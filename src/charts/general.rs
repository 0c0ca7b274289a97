use std::path::Path;

use anyhow::{Context, Result};
use plotters::{
    prelude::{BitMapBackend, IntoDrawingArea},
    series::{AreaSeries, LineSeries},
    style::{Color, BLACK, BLUE, GREEN, RED, WHITE},
};

use crate::{constants::files::CHART_IMAGE_FORMAT, utils::finite_bounds};

fn y_range(values: &[f64]) -> Result<(f64, f64)> {
    let (min, max) = finite_bounds(values).context("no finite values to chart")?;
    let pad = ((max - min) * 0.05).max(max.abs() * 0.01).max(1e-9);
    Ok((min - pad, max + pad))
}

/// A single area series written to `{dir}/{name}.png`
pub fn simple_chart(dir: &Path, name: &str, data: &[f64]) -> Result<()> {
    let path = dir.join(format!("{name}.{CHART_IMAGE_FORMAT}"));
    let (y_min, y_max) = y_range(data)?;

    let root = BitMapBackend::new(&path, (1600, 600)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = plotters::chart::ChartBuilder::on(&root)
        .caption(name, ("sans-serif", 20))
        .margin(5)
        .x_label_area_size(30)
        .y_label_area_size(60)
        .build_cartesian_2d(0..data.len() as u32, y_min..y_max)?;

    chart.configure_mesh().light_line_style(WHITE).draw()?;

    chart.draw_series(
        AreaSeries::new(
            data.iter()
                .enumerate()
                .map(|(index, value)| (index as u32, *value)),
            y_min,
            BLUE.mix(0.2),
        )
        .border_style(BLUE),
    )?;

    root.present()
        .with_context(|| format!("unable to write chart to {}", path.display()))?;

    Ok(())
}

/// Total portfolio value split into the savings and stock holdings of each step
pub fn assets_chart(dir: &Path, name: &str, savings: &[f64], stock: &[f64]) -> Result<()> {
    let path = dir.join(format!("{name}.{CHART_IMAGE_FORMAT}"));
    let total: Vec<f64> = savings.iter().zip(stock).map(|(a, b)| a + b).collect();
    let (_, y_max) = y_range(&total)?;

    let root = BitMapBackend::new(&path, (1600, 600)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = plotters::chart::ChartBuilder::on(&root)
        .caption("Assets: Total; Savings; Stock", ("sans-serif", 20))
        .margin(5)
        .x_label_area_size(30)
        .y_label_area_size(60)
        .build_cartesian_2d(0..total.len() as u32, 0.0..y_max)?;

    chart.configure_mesh().light_line_style(WHITE).draw()?;

    chart.draw_series(LineSeries::new(
        total.iter().enumerate().map(|(index, value)| (index as u32, *value)),
        &BLACK,
    ))?;

    chart.draw_series(
        AreaSeries::new(
            savings.iter().enumerate().map(|(index, value)| (index as u32, *value)),
            0.0,
            GREEN.mix(0.2),
        )
        .border_style(GREEN),
    )?;

    chart.draw_series(
        AreaSeries::new(
            stock.iter().enumerate().map(|(index, value)| (index as u32, *value)),
            0.0,
            RED.mix(0.2),
        )
        .border_style(RED),
    )?;

    root.present()
        .with_context(|| format!("unable to write chart to {}", path.display()))?;

    Ok(())
}
