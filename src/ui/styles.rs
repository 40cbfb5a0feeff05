//! # UI Styling Module
//!
//! Button styles for the monitor controls, kept out of the view code.

use iced::widget::button;
use iced::{Background, Border, Color};

fn filled(background: Color, border: Color, width: f32) -> button::Style {
    button::Style {
        background: Some(Background::Color(background)),
        text_color: Color::WHITE,
        border: Border {
            color: border,
            width,
            radius: 4.0.into(),
        },
        ..Default::default()
    }
}

/// Muted appearance shared by every disabled control
fn disabled() -> button::Style {
    button::Style {
        background: Some(Background::Color(Color::from_rgb(0.3, 0.3, 0.3))),
        text_color: Color::from_rgb(0.6, 0.6, 0.6),
        border: Border {
            color: Color::from_rgb(0.4, 0.4, 0.4),
            width: 1.0,
            radius: 4.0.into(),
        },
        ..Default::default()
    }
}

/// Style for the start button (green theme)
pub fn start_button_style() -> impl Fn(&iced::Theme, button::Status) -> button::Style {
    |_theme: &iced::Theme, status: button::Status| match status {
        button::Status::Active => filled(Color::from_rgb(0.2, 0.7, 0.2), Color::from_rgb(0.3, 0.8, 0.3), 1.0),
        button::Status::Hovered => filled(Color::from_rgb(0.3, 0.8, 0.3), Color::from_rgb(0.4, 0.9, 0.4), 1.0),
        button::Status::Pressed => filled(Color::from_rgb(0.15, 0.6, 0.15), Color::from_rgb(0.2, 0.7, 0.2), 1.0),
        button::Status::Disabled => disabled(),
    }
}

/// Style for the stop button (red theme)
pub fn stop_button_style() -> impl Fn(&iced::Theme, button::Status) -> button::Style {
    |_theme: &iced::Theme, status: button::Status| match status {
        button::Status::Active => filled(Color::from_rgb(0.8, 0.2, 0.2), Color::from_rgb(0.9, 0.3, 0.3), 1.0),
        button::Status::Hovered => filled(Color::from_rgb(0.9, 0.3, 0.3), Color::from_rgb(1.0, 0.4, 0.4), 1.0),
        button::Status::Pressed => filled(Color::from_rgb(0.7, 0.15, 0.15), Color::from_rgb(0.8, 0.2, 0.2), 1.0),
        button::Status::Disabled => disabled(),
    }
}

/// Style for the simulated finger switch, teal while the finger is on the sensor
pub fn finger_button_style(finger_present: bool) -> impl Fn(&iced::Theme, button::Status) -> button::Style {
    move |_theme: &iced::Theme, status: button::Status| {
        let (active, hovered, pressed) = if finger_present {
            (
                Color::from_rgb(0.2, 0.6, 0.7),
                Color::from_rgb(0.3, 0.7, 0.8),
                Color::from_rgb(0.15, 0.5, 0.6),
            )
        } else {
            (
                Color::from_rgb(0.4, 0.4, 0.4),
                Color::from_rgb(0.5, 0.5, 0.5),
                Color::from_rgb(0.35, 0.35, 0.35),
            )
        };
        let width = if finger_present { 2.0 } else { 1.0 };
        match status {
            button::Status::Active => filled(active, hovered, width),
            button::Status::Hovered => filled(hovered, hovered, width),
            button::Status::Pressed => filled(pressed, active, width),
            button::Status::Disabled => disabled(),
        }
    }
}
