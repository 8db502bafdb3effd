//! Plots of calibration convergence.
use crate::calibrate::CalibrationStep;
use plotters::prelude::*;

/// Plot the modeled mean fire size per calibration round against the
/// ecozone target.
pub fn convergence(
    steps: &[CalibrationStep],
    target: f64,
    title: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let pts: Vec<(f64, f64)> = steps
        .iter()
        .enumerate()
        .map(|(i, s)| (i as f64 + 1.0, s.modeled))
        .collect();
    let ymin = pts
        .iter()
        .map(|xi| xi.1)
        .fold(target, f64::min);
    let ymax = pts
        .iter()
        .map(|xi| xi.1)
        .fold(target, f64::max);
    let xmax = pts.len() as f64;
    let root = BitMapBackend::new(title, (640, 480)).into_drawing_area();
    root.fill(&WHITE)?;
    root.margin(10, 10, 10, 10);
    // construct a chart context
    let mut chart = ChartBuilder::on(&root)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(0.0..(xmax + 1.0), (ymin * 0.9)..(ymax * 1.1))?;

    chart
        .configure_mesh()
        .x_labels(5)
        .y_labels(5)
        .y_label_formatter(&|x| format!("{:.0}", x))
        .x_label_formatter(&|x| format!("{:.0}", x))
        .x_desc("Round")
        .y_desc("Mean Fire Size (ha)")
        .draw()?;

    chart
        .draw_series(LineSeries::new(pts.clone(), &BLACK))?
        .label("modeled")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], &BLUE));
    chart.draw_series(PointSeries::of_element(pts, 3, &BLUE, &|c, s, st| {
        return EmptyElement::at(c) + Circle::new((0, 0), s, st.filled());
    }))?;

    chart
        .draw_series(LineSeries::new(
            vec![(0.0, target), (xmax + 1.0, target)],
            &GREEN,
        ))?
        .label("target")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], &GREEN));
    chart
        .configure_series_labels()
        .background_style(WHITE.filled())
        .draw()?;
    Ok(())
}
