//! Plain PNG charts drawn with plotters.
use crate::error::SweepError;
use nalgebra::{DMatrix, DVector};
use plotters::prelude::*;
use std::ops::Range;
use std::path::Path;

const SIZE: (u32, u32) = (800, 600);

fn plot_err<E: std::fmt::Display>(e: E) -> SweepError {
    SweepError::Plot(e.to_string())
}

/// data range padded by 5%; a flat range is widened so the axis stays drawable
fn padded_range<'a, I: IntoIterator<Item = &'a f64>>(values: I) -> Result<Range<f64>, SweepError> {
    let (min, max) = values
        .into_iter()
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    if min > max {
        return Err(SweepError::Plot("no finite data to plot".to_string()));
    }
    let span = max - min;
    let pad = if span > 0.0 {
        0.05 * span
    } else {
        0.5 * min.abs().max(1.0)
    };
    Ok(min - pad..max + pad)
}

/// every column of `y` against `t` on one chart
pub fn plot_trajectory(
    arg: &str,
    names: &[String],
    t: &DVector<f64>,
    y: &DMatrix<f64>,
    path: &Path,
) -> Result<(), SweepError> {
    if t.is_empty() || y.nrows() != t.len() || names.len() != y.ncols() {
        return Err(SweepError::Plot(
            "trajectory shape does not match its labels".to_string(),
        ));
    }
    let x_range = padded_range(t.iter())?;
    let y_range = padded_range(y.iter())?;
    let root = BitMapBackend::new(path, SIZE).into_drawing_area();
    root.fill(&WHITE).map_err(plot_err)?;
    let mut chart = ChartBuilder::on(&root)
        .caption("trajectory", ("sans-serif", 30))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d(x_range, y_range)
        .map_err(plot_err)?;
    chart
        .configure_mesh()
        .x_desc(arg)
        .y_desc("fraction")
        .draw()
        .map_err(plot_err)?;
    for (col, name) in names.iter().enumerate() {
        let series: Vec<(f64, f64)> = t.iter().zip(y.column(col).iter()).map(|(&x, &v)| (x, v)).collect();
        let color = Palette99::pick(col);
        chart
            .draw_series(LineSeries::new(series, &color))
            .map_err(plot_err)?
            .label(name.as_str())
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], Palette99::pick(col)));
    }
    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()
        .map_err(plot_err)?;
    root.present().map_err(plot_err)?;
    Ok(())
}

pub fn plot_scatter(
    x_name: &str,
    y_name: &str,
    x: &[f64],
    y: &[f64],
    path: &Path,
) -> Result<(), SweepError> {
    let points: Vec<(f64, f64)> = x
        .iter()
        .zip(y)
        .filter(|(a, b)| a.is_finite() && b.is_finite())
        .map(|(&a, &b)| (a, b))
        .collect();
    if points.is_empty() {
        return Err(SweepError::Plot(format!(
            "nothing to plot for {} against {}",
            y_name, x_name
        )));
    }
    let x_range = padded_range(points.iter().map(|p| &p.0))?;
    let y_range = padded_range(points.iter().map(|p| &p.1))?;
    let root = BitMapBackend::new(path, SIZE).into_drawing_area();
    root.fill(&WHITE).map_err(plot_err)?;
    let mut chart = ChartBuilder::on(&root)
        .caption(format!("{} vs {}", y_name, x_name), ("sans-serif", 30))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d(x_range, y_range)
        .map_err(plot_err)?;
    chart
        .configure_mesh()
        .x_desc(x_name)
        .y_desc(y_name)
        .draw()
        .map_err(plot_err)?;
    chart
        .draw_series(
            points
                .iter()
                .map(|&(a, b)| Circle::new((a, b), 3, BLUE.filled())),
        )
        .map_err(plot_err)?;
    root.present().map_err(plot_err)?;
    Ok(())
}

pub fn plot_line(
    x_name: &str,
    y_name: &str,
    x: &[f64],
    y: &[f64],
    path: &Path,
) -> Result<(), SweepError> {
    let points: Vec<(f64, f64)> = x
        .iter()
        .zip(y)
        .filter(|(a, b)| a.is_finite() && b.is_finite())
        .map(|(&a, &b)| (a, b))
        .collect();
    if points.len() < 2 {
        return Err(SweepError::Plot(format!(
            "a line of {} needs at least two points",
            y_name
        )));
    }
    let x_range = padded_range(points.iter().map(|p| &p.0))?;
    let y_range = padded_range(points.iter().map(|p| &p.1))?;
    let root = BitMapBackend::new(path, SIZE).into_drawing_area();
    root.fill(&WHITE).map_err(plot_err)?;
    let mut chart = ChartBuilder::on(&root)
        .caption(format!("{} vs {}", y_name, x_name), ("sans-serif", 30))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d(x_range, y_range)
        .map_err(plot_err)?;
    chart
        .configure_mesh()
        .x_desc(x_name)
        .y_desc(y_name)
        .draw()
        .map_err(plot_err)?;
    chart
        .draw_series(LineSeries::new(points.clone(), &RED))
        .map_err(plot_err)?;
    chart
        .draw_series(points.iter().map(|&(a, b)| Circle::new((a, b), 3, RED.filled())))
        .map_err(plot_err)?;
    root.present().map_err(plot_err)?;
    Ok(())
}

/// `z[(i, j)]` is the value at (`xs[i]`, `ys[j]`); cells are coloured from blue (low) to
/// red (high), NaN cells are left grey
pub fn plot_heatmap(
    x_name: &str,
    y_name: &str,
    xs: &[f64],
    ys: &[f64],
    z: &DMatrix<f64>,
    title: &str,
    path: &Path,
) -> Result<(), SweepError> {
    if xs.is_empty() || ys.is_empty() || z.shape() != (xs.len(), ys.len()) {
        return Err(SweepError::Plot(
            "heatmap values do not match the axis levels".to_string(),
        ));
    }
    let (z_min, z_max) = z
        .iter()
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    if z_min > z_max {
        return Err(SweepError::Plot("heatmap has no finite values".to_string()));
    }
    let root = BitMapBackend::new(path, SIZE).into_drawing_area();
    root.fill(&WHITE).map_err(plot_err)?;
    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", 30))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d(0..xs.len(), 0..ys.len())
        .map_err(plot_err)?;
    chart
        .configure_mesh()
        .disable_mesh()
        .x_desc(x_name)
        .y_desc(y_name)
        .x_labels(xs.len().min(10))
        .y_labels(ys.len().min(10))
        .x_label_formatter(&|i| xs.get(*i).map(|v| format!("{:.3}", v)).unwrap_or_default())
        .y_label_formatter(&|j| ys.get(*j).map(|v| format!("{:.3}", v)).unwrap_or_default())
        .draw()
        .map_err(plot_err)?;
    let span = if z_max > z_min { z_max - z_min } else { 1.0 };
    let cells = (0..xs.len()).flat_map(|i| (0..ys.len()).map(move |j| (i, j)));
    chart
        .draw_series(cells.map(|(i, j)| {
            let v = z[(i, j)];
            let style = if v.is_finite() {
                let s = (v - z_min) / span;
                HSLColor(0.66 * (1.0 - s), 0.9, 0.5).filled()
            } else {
                RGBColor(180, 180, 180).filled()
            };
            Rectangle::new([(i, j), (i + 1, j + 1)], style)
        }))
        .map_err(plot_err)?;
    root.present().map_err(plot_err)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_padded_range() {
        let r = padded_range([0.0, 10.0, f64::NAN].iter()).unwrap();
        assert_eq!(r, -0.5..10.5);
        let flat = padded_range([2.0, 2.0].iter()).unwrap();
        assert!(flat.start < 2.0 && flat.end > 2.0);
        assert!(padded_range([f64::NAN].iter()).is_err());
    }

    #[test]
    fn test_shape_errors_before_drawing() {
        let path = Path::new("never_written.png");
        assert!(matches!(
            plot_scatter("a", "b", &[], &[], path),
            Err(SweepError::Plot(_))
        ));
        assert!(plot_line("a", "b", &[1.0], &[1.0], path).is_err());
        let z = DMatrix::from_element(2, 3, 1.0);
        assert!(plot_heatmap("a", "b", &[1.0, 2.0], &[1.0, 2.0], &z, "t", path).is_err());
        let t = DVector::from_vec(vec![0.0, 1.0]);
        let y = DMatrix::from_element(2, 2, 0.5);
        assert!(plot_trajectory("t", &["S".to_string()], &t, &y, path).is_err());
        assert!(!path.exists());
    }

    fn written(path: &Path) -> bool {
        std::fs::metadata(path).map(|m| m.len() > 0).unwrap_or(false)
    }

    #[test]
    fn test_charts_are_written() {
        let dir = tempfile::tempdir().unwrap();

        let t = DVector::from_fn(50, |i, _| i as f64);
        let y = DMatrix::from_fn(50, 2, |i, c| {
            let s = (-(i as f64) / 10.0).exp();
            if c == 0 { s } else { 1.0 - s }
        });
        let names = vec!["S".to_string(), "R".to_string()];
        let path = dir.path().join("trajectory.png");
        plot_trajectory("t", &names, &t, &y, &path).unwrap();
        assert!(written(&path));

        // NaN points of failed runs are skipped
        let x = [0.1, 0.4, 0.7, 0.9];
        let v = [0.2, f64::NAN, 0.5, 0.8];
        let path = dir.path().join("scatter.png");
        plot_scatter("beta", "peak_infected", &x, &v, &path).unwrap();
        assert!(written(&path));

        let path = dir.path().join("line.png");
        plot_line("R0", "peak_infected", &x, &v, &path).unwrap();
        assert!(written(&path));

        let mut z = DMatrix::from_fn(3, 2, |i, j| (i + 2 * j) as f64);
        z[(1, 1)] = f64::NAN;
        let path = dir.path().join("heatmap.png");
        plot_heatmap("R0", "infectious_period", &[1.0, 2.0, 3.0], &[5.0, 10.0], &z, "peak", &path)
            .unwrap();
        assert!(written(&path));
    }
}
