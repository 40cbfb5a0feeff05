use crate::app::{Message, PulseMonitorApp};
use crate::review::SeriesExt;
use plotters::chart::ChartBuilder;
use plotters::series::LineSeries;
use plotters::style::{RGBColor, BLUE};
use plotters_iced::{Chart, DrawingBackend};

// Keep a flat trace from collapsing the y axis to a single value
const MIN_SPAN: f64 = 2.0;

pub struct Spo2ReviewChart<'a> {
    pub state: &'a PulseMonitorApp,
}

impl<'a> Chart<Message> for Spo2ReviewChart<'a> {
    type State = ();

    fn build_chart<DB: DrawingBackend>(&self, _state: &Self::State, mut builder: ChartBuilder<DB>) {
        let series = self.state.review_series();

        let (min, max) = series.min_max().unwrap_or((90.0, 100.0));
        let pad = ((MIN_SPAN - (max - min)) / 2.0).max(0.0) + 0.5;
        let max_x = series.len().max(2) as f64 - 1.0;

        let Ok(mut chart) = builder
            .margin(15)
            .caption("SpO2 (smoothed)", ("sans-serif", 18))
            .x_label_area_size(0)
            .y_label_area_size(30)
            .build_cartesian_2d(0.0..max_x, (min - pad)..(max + pad))
        else {
            log::warn!("Failed to build SpO2 chart");
            return;
        };

        if chart.plotting_area().fill(&RGBColor(245, 245, 240)).is_err() {
            return;
        }

        let _ = chart.configure_mesh().axis_style(RGBColor(60, 60, 60)).draw();

        let _ = chart.draw_series(LineSeries::new(
            series.iter().enumerate().map(|(i, v)| (i as f64, *v)),
            &BLUE,
        ));
    }
}
