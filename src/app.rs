use crate::charts::Spo2ReviewChart;
use crate::config::Config;
use crate::monitor::{LoopState, Monitor};
use crate::review;
use crate::smoother::Reading;
use crate::ui::styles;
use iced::widget::{button, column, container, row, text};
use iced::{Element, Length, Subscription, Task};
use plotters_iced::ChartWidget;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

// Iced Application State
pub struct PulseMonitorApp {
    monitor: Monitor,
    reading: Reading,
    review: Vec<f64>,
    status: Option<String>,
    finger_present: Arc<AtomicBool>,
    config: Config,
}

#[derive(Debug, Clone)]
pub enum Message {
    Tick,
    Start,
    Stop,
    ToggleFinger,
}

pub fn bpm_label(bpm: f64) -> String {
    if bpm > 0.0 {
        format!("BPM: {:.2}", bpm)
    } else {
        "BPM: --".to_string()
    }
}

pub fn spo2_label(spo2: f64) -> String {
    if spo2 > 0.0 {
        format!("SpO2: {:.2}%", spo2)
    } else {
        "SpO2: --%".to_string()
    }
}

impl PulseMonitorApp {
    pub fn new(monitor: Monitor, finger_present: Arc<AtomicBool>, config: Config) -> (Self, Task<Message>) {
        (
            PulseMonitorApp {
                monitor,
                reading: Reading::default(),
                review: Vec::new(),
                status: None,
                finger_present,
                config,
            },
            Task::none(),
        )
    }

    pub fn review_series(&self) -> &[f64] {
        &self.review
    }

    pub fn update(&mut self, message: Message) -> Task<Message> {
        match message {
            Message::Tick => {
                self.reading = self.monitor.reading();
                if let Some(fault) = self.monitor.poll() {
                    self.status = Some(fault.to_string());
                }
                let published = self.monitor.published();
                self.review = review::smooth(
                    &published.spo2_history(),
                    self.config.review_window,
                    self.config.review_order,
                );
            }
            Message::Start => match self.monitor.start() {
                Ok(()) => self.status = None,
                Err(e) => {
                    log::warn!("UI: start failed: {}", e);
                    self.status = Some(e.to_string());
                }
            },
            Message::Stop => {
                if let Err(e) = self.monitor.stop(self.config.stop_timeout()) {
                    log::warn!("UI: stop failed: {}", e);
                    self.status = Some(e.to_string());
                }
                self.reading = self.monitor.reading();
                let recorded = self.monitor.published().history_len();
                if recorded > 0 {
                    log::info!("UI: session recorded {} readings", recorded);
                }
            }
            Message::ToggleFinger => {
                let present = !self.finger_present.load(Ordering::Relaxed);
                self.finger_present.store(present, Ordering::Relaxed);
                log::info!("UI: finger {}", if present { "placed" } else { "removed" });
            }
        }
        Task::none()
    }

    pub fn subscription(&self) -> Subscription<Message> {
        iced::time::every(self.config.display_refresh()).map(|_| Message::Tick)
    }

    pub fn view(&'_ self) -> Element<'_, Message> {
        let state = self.monitor.state();

        let bpm = text(bpm_label(self.reading.bpm)).size(24);
        let spo2 = text(spo2_label(self.reading.spo2)).size(24);

        let start_button = button(text("Start"))
            .on_press_maybe((state == LoopState::Idle).then_some(Message::Start))
            .padding(10)
            .width(Length::Fill)
            .style(styles::start_button_style());

        let stop_button = button(text("Stop"))
            .on_press_maybe((state != LoopState::Idle).then_some(Message::Stop))
            .padding(10)
            .width(Length::Fill)
            .style(styles::stop_button_style());

        let finger_present = self.finger_present.load(Ordering::Relaxed);
        let finger_button = button(text(if finger_present { "Finger: on sensor" } else { "Finger: removed" }))
            .on_press(Message::ToggleFinger)
            .padding(10)
            .width(Length::Fill)
            .style(styles::finger_button_style(finger_present));

        let status = text(self.status.clone().unwrap_or_default()).size(14);

        let chart = ChartWidget::new(Spo2ReviewChart { state: self })
            .width(Length::Fill)
            .height(Length::Fill);

        let content = column![
            bpm,
            spo2,
            row![start_button, stop_button].spacing(10),
            finger_button,
            status,
            chart
        ]
        .spacing(20)
        .padding(20);

        container(content)
            .width(Length::Fill)
            .height(Length::Fill)
            .into()
    }
}
